//! Polygenic risk score computation.
//!
//! For one condition the score is
//!
//!   PRS = Σ dosage(v) × effect_weight(v)
//!
//! over every weighted variant `v` the patient was genotyped for, where
//! `dosage` is the number of risk alleles carried (0, 1 or 2). Variants the
//! patient was not tested for are reported separately and never treated as
//! zero-risk.

use std::cmp::Ordering;

use genorisk_common::Nucleotide;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, ScoreError};
use crate::genotype::GenotypeSet;
use crate::weights::{UnweightedVariant, VariantWeight, WeightTable};

/// A weighted variant the patient was genotyped for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredVariant {
    pub variant_id: String,
    pub risk_allele: Nucleotide,
    /// Copies of the risk allele carried (0..=2).
    pub matched_allele_count: u8,
    pub weight: f64,
    pub contribution: f64,
    /// Patient genotype as `A/G`.
    pub genotype: String,
}

/// Why a weighted variant could not be scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UntestedReason {
    /// The variant is not in the patient's genotype table.
    NotGenotyped,
    /// The variant is present but at least one allele is a no-call.
    NoCall,
    /// The profile entry has no usable effect allele or effect size.
    Unweighted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UntestedVariant {
    pub variant_id: String,
    /// `None` only for unweighted entries that never named a single base.
    pub risk_allele: Option<Nucleotide>,
    pub reason: UntestedReason,
}

/// Per-condition result for one patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskProfile {
    pub condition_name: String,
    /// Unbounded, not normalised.
    pub aggregate_score: f64,
    /// Ordered by descending |contribution|, ties by variant id.
    pub contributing_variants: Vec<ScoredVariant>,
    /// In weight-table order, followed by unweighted entries.
    pub untested_variants: Vec<UntestedVariant>,
    pub total_variants_in_profile: usize,
    pub partial_coverage: bool,
    /// Scored variants with at least one copy of a positively weighted allele.
    pub risk_variants_carried: usize,
    /// Scored variants with at least one copy of a negatively weighted allele.
    pub protective_variants_carried: usize,
    pub notes: Vec<String>,
}

impl RiskProfile {
    pub fn tested_count(&self) -> usize {
        self.contributing_variants.len()
    }

    /// Fraction of the condition's weighted variants that could be scored.
    pub fn coverage(&self) -> f64 {
        if self.total_variants_in_profile == 0 {
            return 0.0;
        }
        self.tested_count() as f64 / self.total_variants_in_profile as f64
    }
}

/// Applies a [`WeightTable`] to patient genotypes.
#[derive(Debug, Clone)]
pub struct RiskScorer {
    weights: WeightTable,
}

impl RiskScorer {
    pub fn new(weights: WeightTable) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    /// Score one condition.
    ///
    /// Fails with [`ScoreError::Configuration`] when the table knows no
    /// variants at all for `condition`; no partial profile is returned in
    /// that case. Variants known only as unweighted catalogue hits still
    /// yield a profile, with every entry untested.
    pub fn score(&self, genotypes: &GenotypeSet, condition: &str) -> Result<RiskProfile> {
        let rows = self.weights.for_condition(condition);
        let unweighted = self.weights.unweighted_for(condition);
        if rows.is_empty() && unweighted.is_empty() {
            return Err(ScoreError::Configuration(format!(
                "no variant weights defined for condition '{}'",
                condition.trim()
            )));
        }
        let profile = score_rows(genotypes, condition.trim(), rows, unweighted);
        debug!(
            condition = %profile.condition_name,
            score = profile.aggregate_score,
            tested = profile.tested_count(),
            untested = profile.untested_variants.len(),
            "Scored condition"
        );
        Ok(profile)
    }

    /// Score several conditions independently, keeping each result.
    pub fn score_conditions<S: AsRef<str>>(
        &self,
        genotypes: &GenotypeSet,
        conditions: &[S],
    ) -> Vec<(String, Result<RiskProfile>)> {
        conditions
            .iter()
            .map(|c| {
                let condition = c.as_ref();
                let result = self.score(genotypes, condition);
                if let Err(e) = &result {
                    warn!(condition, error = %e, "Condition could not be scored");
                }
                (condition.to_string(), result)
            })
            .collect()
    }
}

fn score_rows(
    genotypes: &GenotypeSet,
    condition: &str,
    rows: &[VariantWeight],
    unweighted: &[UnweightedVariant],
) -> RiskProfile {
    let mut scored = Vec::new();
    let mut untested = Vec::new();

    for row in rows {
        let Some(record) = genotypes.get(&row.variant_id) else {
            untested.push(UntestedVariant {
                variant_id: row.variant_id.clone(),
                risk_allele: Some(row.risk_allele),
                reason: UntestedReason::NotGenotyped,
            });
            continue;
        };
        let Some(count) = record.dosage(row.risk_allele) else {
            untested.push(UntestedVariant {
                variant_id: row.variant_id.clone(),
                risk_allele: Some(row.risk_allele),
                reason: UntestedReason::NoCall,
            });
            continue;
        };
        scored.push(ScoredVariant {
            variant_id: row.variant_id.clone(),
            risk_allele: row.risk_allele,
            matched_allele_count: count,
            weight: row.effect_weight,
            contribution: f64::from(count) * row.effect_weight,
            genotype: record.genotype(),
        });
    }

    untested.extend(unweighted.iter().map(|u| UntestedVariant {
        variant_id: u.variant_id.clone(),
        risk_allele: u.risk_allele,
        reason: UntestedReason::Unweighted,
    }));
    let total = rows.len() + unweighted.len();

    let aggregate_score = scored.iter().map(|v| v.contribution).sum();

    scored.sort_by(|a, b| {
        b.contribution
            .abs()
            .partial_cmp(&a.contribution.abs())
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.variant_id.cmp(&b.variant_id))
    });

    let carried = |pred: fn(f64) -> bool| {
        scored
            .iter()
            .filter(|v| v.matched_allele_count > 0 && pred(v.weight))
            .count()
    };
    let risk_variants_carried = carried(|w| w > 0.0);
    let protective_variants_carried = carried(|w| w < 0.0);

    let mut notes = Vec::new();
    if !untested.is_empty() {
        notes.push(format!(
            "Partial coverage: {} of {} profile variants were not tested; the score covers only the remaining {}.",
            untested.len(),
            total,
            scored.len()
        ));
    }
    if !unweighted.is_empty() {
        let ids: Vec<&str> = unweighted.iter().map(|u| u.variant_id.as_str()).collect();
        notes.push(format!(
            "{} profile variants had no usable effect allele or effect size and were not scored: {}.",
            unweighted.len(),
            ids.join(", ")
        ));
    }
    if scored.is_empty() {
        notes.push("None of the profile variants could be scored; the aggregate score carries no information.".to_string());
    }

    RiskProfile {
        condition_name: condition.to_string(),
        aggregate_score,
        partial_coverage: !untested.is_empty(),
        total_variants_in_profile: total,
        contributing_variants: scored,
        untested_variants: untested,
        risk_variants_carried,
        protective_variants_carried,
        notes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genotype::GenotypeLoader;
    use genorisk_test_utils::{assert_eq, fixtures};

    fn weight(rsid: &str, condition: &str, effect_weight: f64, risk: Nucleotide) -> VariantWeight {
        VariantWeight {
            variant_id: rsid.to_string(),
            condition_name: condition.to_string(),
            effect_weight,
            risk_allele: risk,
        }
    }

    fn genotypes(rows: &[(&str, &str, &str)]) -> GenotypeSet {
        GenotypeLoader::new().parse_str(&fixtures::genotype_csv(rows)).unwrap()
    }

    fn single(effect_weight: f64, risk: Nucleotide) -> RiskScorer {
        RiskScorer::new(WeightTable::from_weights([weight("rs1", "asthma", effect_weight, risk)]).unwrap())
    }

    #[test]
    fn test_heterozygous_counts_once() {
        let profile = single(0.4, Nucleotide::A).score(&genotypes(&[("rs1", "A", "G")]), "asthma").unwrap();
        let v = &profile.contributing_variants[0];
        assert_eq!(v.matched_allele_count, 1);
        assert_eq!(v.contribution, 0.4);
        assert_eq!(profile.aggregate_score, 0.4);
        assert!(!profile.partial_coverage);
    }

    #[test]
    fn test_homozygous_counts_twice() {
        let profile = single(0.4, Nucleotide::A).score(&genotypes(&[("rs1", "A", "A")]), "asthma").unwrap();
        assert_eq!(profile.contributing_variants[0].matched_allele_count, 2);
        assert_eq!(profile.aggregate_score, 0.8);
    }

    #[test]
    fn test_allele_order_irrelevant() {
        let scorer = single(0.25, Nucleotide::G);
        let ag = scorer.score(&genotypes(&[("rs1", "A", "G")]), "asthma").unwrap();
        let ga = scorer.score(&genotypes(&[("rs1", "G", "A")]), "asthma").unwrap();
        assert_eq!(ag.aggregate_score, ga.aggregate_score);
        assert_eq!(
            ag.contributing_variants[0].matched_allele_count,
            ga.contributing_variants[0].matched_allele_count
        );
    }

    #[test]
    fn test_non_carrier_scored_with_zero_contribution() {
        let profile = single(0.4, Nucleotide::T).score(&genotypes(&[("rs1", "A", "G")]), "asthma").unwrap();
        assert_eq!(profile.contributing_variants.len(), 1);
        assert_eq!(profile.contributing_variants[0].contribution, 0.0);
        assert_eq!(profile.risk_variants_carried, 0);
    }

    #[test]
    fn test_absent_variant_listed_as_untested() {
        let table = WeightTable::from_weights([
            weight("rs1", "asthma", 0.4, Nucleotide::A),
            weight("rs2", "asthma", 9.0, Nucleotide::C),
        ])
        .unwrap();
        let profile = RiskScorer::new(table).score(&genotypes(&[("rs1", "A", "G")]), "asthma").unwrap();

        assert_eq!(profile.aggregate_score, 0.4);
        assert!(profile.partial_coverage);
        assert_eq!(profile.total_variants_in_profile, 2);
        assert_eq!(
            profile.untested_variants,
            vec![UntestedVariant {
                variant_id: "rs2".into(),
                risk_allele: Some(Nucleotide::C),
                reason: UntestedReason::NotGenotyped,
            }]
        );
        assert!(profile.notes[0].starts_with("Partial coverage"));
        assert_eq!(profile.coverage(), 0.5);
    }

    #[test]
    fn test_no_call_listed_as_untested() {
        let profile = single(0.4, Nucleotide::A).score(&genotypes(&[("rs1", "A", "--")]), "asthma").unwrap();
        assert!(profile.contributing_variants.is_empty());
        assert_eq!(profile.untested_variants[0].reason, UntestedReason::NoCall);
        assert_eq!(profile.aggregate_score, 0.0);
        assert_eq!(profile.notes.len(), 2);
    }

    #[test]
    fn test_unknown_condition_is_configuration_error() {
        let err = single(0.4, Nucleotide::A).score(&genotypes(&[("rs1", "A", "G")]), "gout").unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("gout"), "{err}");
    }

    #[test]
    fn test_condition_lookup_is_case_insensitive() {
        let profile = single(0.4, Nucleotide::A).score(&genotypes(&[("rs1", "A", "G")]), " ASTHMA ").unwrap();
        assert_eq!(profile.condition_name, "ASTHMA");
    }

    #[test]
    fn test_contributions_ordered_by_magnitude() {
        let table = WeightTable::from_weights([
            weight("rs1", "asthma", 0.1, Nucleotide::A),
            weight("rs2", "asthma", -0.5, Nucleotide::A),
            weight("rs3", "asthma", 0.3, Nucleotide::A),
            weight("rs0", "asthma", 0.1, Nucleotide::A),
        ])
        .unwrap();
        let set = genotypes(&[("rs0", "A", "G"), ("rs1", "A", "G"), ("rs2", "A", "G"), ("rs3", "A", "G")]);
        let profile = RiskScorer::new(table).score(&set, "asthma").unwrap();

        let order: Vec<&str> = profile.contributing_variants.iter().map(|v| v.variant_id.as_str()).collect();
        assert_eq!(order, vec!["rs2", "rs3", "rs0", "rs1"]);
        assert_eq!(profile.risk_variants_carried, 3);
        assert_eq!(profile.protective_variants_carried, 1);
    }

    #[test]
    fn test_sample_fixtures() {
        let set = GenotypeLoader::new().parse_str(fixtures::SAMPLE_GENOTYPES_CSV).unwrap();
        let scorer = RiskScorer::new(WeightTable::from_csv_str(fixtures::SAMPLE_WEIGHTS_CSV).unwrap());

        let alz = scorer.score(&set, "Alzheimer's disease").unwrap();
        assert!((alz.aggregate_score - 1.12).abs() < 1e-9);
        assert_eq!(alz.untested_variants.len(), 1);
        assert_eq!(alz.untested_variants[0].variant_id, "rs75932628");

        let t2d = scorer.score(&set, "type 2 diabetes").unwrap();
        assert!((t2d.aggregate_score - 0.54).abs() < 1e-9);
        assert!(!t2d.partial_coverage);
    }

    #[test]
    fn test_score_conditions_keeps_each_result() {
        let set = GenotypeLoader::new().parse_str(fixtures::SAMPLE_GENOTYPES_CSV).unwrap();
        let scorer = RiskScorer::new(WeightTable::from_csv_str(fixtures::SAMPLE_WEIGHTS_CSV).unwrap());

        let results = scorer.score_conditions(&set, &["type 2 diabetes", "migraine"]);
        assert_eq!(results.len(), 2);
        assert!(results[0].1.is_ok());
        assert_eq!(results[1].0, "migraine");
        assert!(results[1].1.as_ref().unwrap_err().is_configuration());
    }

    #[test]
    fn test_unweighted_catalogue_hits_reported_as_untested() {
        let hits = vec![
            fixtures::variant("rs1", Some("A"), Some(std::f64::consts::E)),
            fixtures::variant("rs2", None, Some(1.3)),
            fixtures::variant("rs3", Some("G"), None),
        ];
        let scorer = RiskScorer::new(WeightTable::from_catalogue("asthma", &hits));
        let set = genotypes(&[("rs1", "A", "G"), ("rs2", "A", "A"), ("rs3", "G", "G")]);

        let profile = scorer.score(&set, "asthma").unwrap();

        assert!((profile.aggregate_score - 1.0).abs() < 1e-9);
        assert_eq!(profile.total_variants_in_profile, 3);
        assert!(profile.partial_coverage);
        assert_eq!(
            profile.untested_variants,
            vec![
                UntestedVariant { variant_id: "rs2".into(), risk_allele: None, reason: UntestedReason::Unweighted },
                UntestedVariant {
                    variant_id: "rs3".into(),
                    risk_allele: Some(Nucleotide::G),
                    reason: UntestedReason::Unweighted,
                },
            ]
        );
        assert!(profile.notes.iter().any(|n| n.contains("rs2, rs3")), "{:?}", profile.notes);
    }

    #[test]
    fn test_only_unweighted_hits_still_yield_profile() {
        let scorer = RiskScorer::new(WeightTable::from_catalogue("gout", &[fixtures::variant("rs9", None, None)]));
        let profile = scorer.score(&genotypes(&[("rs9", "A", "G")]), "gout").unwrap();
        assert_eq!(profile.aggregate_score, 0.0);
        assert_eq!(profile.total_variants_in_profile, 1);
        assert!(profile.contributing_variants.is_empty());
        assert_eq!(profile.untested_variants[0].reason, UntestedReason::Unweighted);
        assert!(profile.notes.iter().any(|n| n.starts_with("None of the profile variants")));
    }
}
