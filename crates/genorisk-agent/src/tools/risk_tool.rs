//! Tool: polygenic risk assessment of one patient's genotype file.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use genorisk_common::VariantInfo;
use genorisk_scorer::{GenotypeLoader, GenotypeSet, RiskScorer, ScoreError, WeightTable};
use serde_json::Value;

use super::{required_str, GenoriskTool, ToolError};

/// `{condition: {rsid: VariantInfo}}` as supplied by callers.
type ConditionProfiles = BTreeMap<String, BTreeMap<String, VariantInfo>>;

/// Where a request's variant weights come from.
enum WeightSource {
    Profiles(ConditionProfiles),
    Reference(Arc<WeightTable>, Vec<String>),
}

impl WeightSource {
    fn conditions(&self) -> Vec<String> {
        match self {
            Self::Profiles(p) => p.keys().cloned().collect(),
            Self::Reference(_, conditions) => conditions.clone(),
        }
    }
}

pub struct RiskProfileTool {
    loader: GenotypeLoader,
    reference: Option<Arc<WeightTable>>,
}

impl RiskProfileTool {
    pub fn new(loader: GenotypeLoader, reference: Option<Arc<WeightTable>>) -> Self {
        Self { loader, reference }
    }

    fn score_profiles(&self, genotypes: &GenotypeSet, profiles: ConditionProfiles) -> Value {
        let results: serde_json::Map<String, Value> = profiles
            .into_iter()
            .map(|(condition, variants)| {
                let hits: Vec<VariantInfo> = variants
                    .into_iter()
                    .map(|(rsid, mut info)| {
                        if info.rsid.trim().is_empty() {
                            info.rsid = rsid;
                        }
                        info
                    })
                    .collect();
                let scorer = RiskScorer::new(WeightTable::from_catalogue(&condition, &hits));
                let entry = condition_entry(scorer.score(genotypes, &condition));
                (condition, entry)
            })
            .collect();
        Value::Object(results)
    }

    fn score_reference(&self, table: &WeightTable, genotypes: &GenotypeSet, conditions: &[String]) -> Value {
        let scorer = RiskScorer::new(table.clone());
        let results: serde_json::Map<String, Value> = scorer
            .score_conditions(genotypes, conditions)
            .into_iter()
            .map(|(condition, result)| (condition, condition_entry(result)))
            .collect();
        Value::Object(results)
    }
}

fn condition_entry(result: genorisk_scorer::Result<genorisk_scorer::RiskProfile>) -> Value {
    match result {
        Ok(profile) => serde_json::to_value(profile)
            .unwrap_or_else(|e| error_entry(&e.to_string(), "Serialization Failed")),
        Err(e @ ScoreError::Configuration(_)) => error_entry(&e.to_string(), "No Usable Variants"),
        Err(e) => error_entry(&e.to_string(), "Scoring Failed"),
    }
}

fn error_entry(error: &str, status: &str) -> Value {
    serde_json::json!({ "error": error, "status": status })
}

fn condition_names(params: &Value) -> Result<Vec<String>> {
    let invalid = || ToolError::InvalidParams("'conditions' must be a non-empty array of strings".into());
    let names: Vec<String> = params["conditions"]
        .as_array()
        .ok_or_else(invalid)?
        .iter()
        .map(|c| c.as_str().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
        .collect::<Option<_>>()
        .ok_or_else(invalid)?;
    if names.is_empty() {
        return Err(invalid().into());
    }
    Ok(names)
}

#[async_trait]
impl GenoriskTool for RiskProfileTool {
    fn name(&self) -> &str { "assess_patient_genetic_risk_profile" }

    fn description(&self) -> &str {
        "Score a patient's genotype file against per-condition variant profiles. \
         Each profile entry weights its risk allele (or protective allele) by \
         ln(odds ratio), or by beta. Entries that cannot be weighted and variants \
         the patient was not tested for are listed, never assumed zero-risk. \
         Only use rsIDs obtained from research tools; never invent variant ids."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "patient_dna_file_path": {
                    "type": "string",
                    "description": "Path to a delimited genotype file with columns rsid, chromosome, position, allele1, allele2."
                },
                "condition_risk_profiles": {
                    "type": "object",
                    "description": "{condition: {rsid: {risk_allele | protective_allele, odds_ratio, beta, ...}}}",
                    "additionalProperties": {
                        "type": "object",
                        "additionalProperties": { "type": "object" }
                    }
                },
                "conditions": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Conditions to score against the configured reference weight table."
                }
            },
            "required": ["patient_dna_file_path"]
        })
    }

    async fn invoke(&self, params: Value) -> Result<Value> {
        let path = required_str(&params, "patient_dna_file_path")?;

        let source = match &params["condition_risk_profiles"] {
            Value::Null => {
                let conditions = condition_names(&params).map_err(|_| {
                    ToolError::InvalidParams("supply either 'condition_risk_profiles' or 'conditions'".into())
                })?;
                let table = self.reference.clone().ok_or_else(|| {
                    ToolError::InvalidParams(
                        "no reference weight table is configured; supply 'condition_risk_profiles' instead".into(),
                    )
                })?;
                WeightSource::Reference(table, conditions)
            }
            raw => {
                let profiles: ConditionProfiles = serde_json::from_value(raw.clone()).map_err(|e| {
                    ToolError::InvalidParams(format!("'condition_risk_profiles' is malformed: {e}"))
                })?;
                if profiles.is_empty() {
                    return Err(ToolError::InvalidParams("'condition_risk_profiles' is empty".into()).into());
                }
                WeightSource::Profiles(profiles)
            }
        };
        let conditions = source.conditions();

        tracing::info!(
            tool = "assess_patient_genetic_risk_profile",
            path,
            conditions = ?conditions,
            "Starting risk assessment"
        );

        let genotypes = match self.loader.load(path).await {
            Ok(set) if set.is_empty() => {
                let msg = "Failed to load patient DNA data or no valid genotypes found.";
                return Ok(load_failure(&conditions, msg));
            }
            Ok(set) => set,
            Err(e) => {
                tracing::warn!(tool = "assess_patient_genetic_risk_profile", error = %e, "Genotype load failed");
                return Ok(load_failure(&conditions, &format!("Failed to load patient DNA data: {e}")));
            }
        };

        Ok(match source {
            WeightSource::Profiles(p) => self.score_profiles(&genotypes, p),
            WeightSource::Reference(table, conditions) => self.score_reference(&table, &genotypes, &conditions),
        })
    }

    fn output_data_class(&self) -> &str { "CONFIDENTIAL" }
}

fn load_failure(conditions: &[String], message: &str) -> Value {
    let results: serde_json::Map<String, Value> = conditions
        .iter()
        .map(|c| (c.clone(), error_entry(message, "Patient DNA Load Failed")))
        .collect();
    Value::Object(results)
}
