//! Condition-to-variant weight table.
//!
//! Rows come either from a precompiled reference table (CSV or JSON) or from
//! catalogue hits, where the per-allele weight is the log odds ratio.

use std::collections::HashMap;
use std::path::Path;

use genorisk_common::{Nucleotide, VariantInfo};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::catalogue::VariantCatalogueLookup;
use crate::error::{Result, ScoreError};
use crate::genotype::{normalise_header, normalise_variant_id};

/// One variant's effect on one condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantWeight {
    pub variant_id: String,
    pub condition_name: String,
    /// Signed effect per copy of `risk_allele`.
    pub effect_weight: f64,
    pub risk_allele: Nucleotide,
}

/// A catalogue hit that names a variant for a condition but lacks a
/// single-base effect allele or a usable effect size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnweightedVariant {
    pub variant_id: String,
    pub risk_allele: Option<Nucleotide>,
    pub problem: String,
}

/// Raw CSV row before validation.
#[derive(Debug, Deserialize)]
struct WeightRow {
    #[serde(alias = "variant_id")]
    rsid: String,
    #[serde(alias = "condition_name")]
    condition: String,
    effect_weight: String,
    risk_allele: String,
}

fn condition_key(condition: &str) -> String {
    condition.trim().to_lowercase()
}

/// All weight rows, grouped by condition (matched case-insensitively).
#[derive(Debug, Clone, Default)]
pub struct WeightTable {
    by_condition: HashMap<String, Vec<VariantWeight>>,
    /// Catalogue hits that could not be weighted, kept so scoring can report them.
    unweighted: HashMap<String, Vec<UnweightedVariant>>,
}

impl WeightTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a row. A second row for the same (condition, variant) pair is rejected.
    pub fn insert(&mut self, mut weight: VariantWeight) -> Result<()> {
        weight.variant_id = normalise_variant_id(&weight.variant_id);
        let rows = self.by_condition.entry(condition_key(&weight.condition_name)).or_default();
        if rows.iter().any(|w| w.variant_id == weight.variant_id) {
            return Err(ScoreError::Configuration(format!(
                "duplicate weight for variant '{}' in condition '{}'",
                weight.variant_id, weight.condition_name
            )));
        }
        rows.push(weight);
        Ok(())
    }

    pub fn from_weights(weights: impl IntoIterator<Item = VariantWeight>) -> Result<Self> {
        let mut table = Self::new();
        for w in weights {
            table.insert(w)?;
        }
        Ok(table)
    }

    /// Parse a CSV table with columns `rsid, condition, effect_weight, risk_allele`.
    pub fn from_csv_str(content: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let headers: csv::StringRecord = reader
            .headers()
            .map_err(ScoreError::from_csv)?
            .iter()
            .map(normalise_header)
            .collect();

        let mut table = Self::new();
        for result in reader.records() {
            let record = result.map_err(ScoreError::from_csv)?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            let row: WeightRow = record
                .deserialize(Some(&headers))
                .map_err(|e| ScoreError::data_format(line, format!("invalid weight row: {e}")))?;
            table.insert(parse_weight_row(row, line)?)?;
        }
        debug!(conditions = table.by_condition.len(), rows = table.len(), "Parsed weight table");
        Ok(table)
    }

    /// Parse a JSON array of [`VariantWeight`].
    pub fn from_json_str(content: &str) -> Result<Self> {
        let weights: Vec<VariantWeight> = serde_json::from_str(content)?;
        Self::from_weights(weights)
    }

    /// Load a reference table from disk; `.json` files are read as JSON, anything else as CSV.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        let table = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json_str(&content)?,
            _ => Self::from_csv_str(&content)?,
        };
        info!(path = %path.display(), rows = table.len(), "Loaded reference weight table");
        Ok(table)
    }

    /// Build one condition's rows from catalogue hits.
    ///
    /// Hits lacking a single-base effect allele or any usable effect size
    /// cannot be weighted. They are kept as [`UnweightedVariant`]s (see
    /// [`WeightTable::unweighted_for`]) so a profile still counts them.
    pub fn from_catalogue(condition: &str, variants: &[VariantInfo]) -> Self {
        let mut table = Self::new();
        for info in variants {
            let risk_allele = info.risk_nucleotide();
            let (Some(allele), Some(effect_weight)) = (risk_allele, info.effect_weight()) else {
                let problem = match risk_allele {
                    None => "no single-base risk or protective allele",
                    Some(_) => "no usable odds ratio or beta",
                };
                warn!(
                    condition,
                    rsid = %info.rsid,
                    risk_allele = ?info.risk_allele,
                    odds_ratio = ?info.odds_ratio,
                    problem,
                    "Catalogue variant cannot be weighted"
                );
                table.push_unweighted(condition, &info.rsid, risk_allele, problem);
                continue;
            };
            let weight = VariantWeight {
                variant_id: info.rsid.clone(),
                condition_name: condition.to_string(),
                effect_weight,
                risk_allele: allele,
            };
            if let Err(e) = table.insert(weight) {
                warn!(condition, rsid = %info.rsid, error = %e, "Ignoring repeated catalogue variant");
            }
        }
        table
    }

    fn push_unweighted(&mut self, condition: &str, rsid: &str, risk_allele: Option<Nucleotide>, problem: &str) {
        let variant_id = normalise_variant_id(rsid);
        let key = condition_key(condition);
        let known = self.for_condition(condition).iter().any(|w| w.variant_id == variant_id);
        let skipped = self.unweighted.entry(key).or_default();
        if known || skipped.iter().any(|u| u.variant_id == variant_id) {
            return;
        }
        skipped.push(UnweightedVariant { variant_id, risk_allele, problem: problem.to_string() });
    }

    /// Query a catalogue and weight whatever it returns for `condition`.
    pub async fn from_lookup(lookup: &dyn VariantCatalogueLookup, condition: &str) -> anyhow::Result<Self> {
        let variants = lookup.find_variants(condition).await?;
        Ok(Self::from_catalogue(condition, &variants))
    }

    /// Rows for one condition; empty if the condition is unknown.
    pub fn for_condition(&self, condition: &str) -> &[VariantWeight] {
        self.by_condition
            .get(&condition_key(condition))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Catalogue hits for `condition` that could not be weighted, in input order.
    pub fn unweighted_for(&self, condition: &str) -> &[UnweightedVariant] {
        self.unweighted
            .get(&condition_key(condition))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Condition names as first written in the table, sorted.
    pub fn conditions(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .by_condition
            .values()
            .filter_map(|rows| rows.first().map(|w| w.condition_name.as_str()))
            .collect();
        names.sort_unstable();
        names
    }

    /// Total number of rows across all conditions.
    pub fn len(&self) -> usize {
        self.by_condition.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn parse_weight_row(row: WeightRow, line: u64) -> Result<VariantWeight> {
    if row.rsid.is_empty() || row.condition.is_empty() {
        return Err(ScoreError::data_format(line, "weight row needs both rsid and condition"));
    }
    let effect_weight: f64 = row.effect_weight.parse().map_err(|_| {
        ScoreError::data_format(line, format!("malformed effect_weight '{}'", row.effect_weight))
    })?;
    if !effect_weight.is_finite() {
        return Err(ScoreError::data_format(line, format!("effect_weight '{}' is not finite", row.effect_weight)));
    }
    let risk_allele: Nucleotide = row
        .risk_allele
        .parse()
        .map_err(|e: String| ScoreError::data_format(line, format!("invalid risk_allele: {e}")))?;

    Ok(VariantWeight {
        variant_id: row.rsid,
        condition_name: row.condition,
        effect_weight,
        risk_allele,
    })
}
