//! Variant association details as reported by a catalogue such as the GWAS Catalog.

use serde::{Deserialize, Serialize};

use crate::genotype::Nucleotide;

/// One variant's association with a condition.
///
/// Every field except `rsid` is optional because catalogue entries are
/// frequently incomplete; consumers decide what they can use.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariantInfo {
    #[serde(default)]
    pub rsid: String,
    #[serde(default)]
    pub risk_allele: Option<String>,
    /// Effect allele reported as protective; used when `risk_allele` is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protective_allele: Option<String>,
    #[serde(default)]
    pub odds_ratio: Option<f64>,
    #[serde(default)]
    pub beta: Option<f64>,
    #[serde(default)]
    pub pvalue: Option<f64>,
    #[serde(default)]
    pub reported_gene: Option<String>,
    /// Number of distinct studies reporting this variant.
    #[serde(default = "default_mention_count")]
    pub mention_count: u32,
    #[serde(default)]
    pub study_ids: Vec<String>,
}

fn default_mention_count() -> u32 { 1 }

impl VariantInfo {
    pub fn new(rsid: impl Into<String>) -> Self {
        Self {
            rsid: rsid.into(),
            mention_count: default_mention_count(),
            ..Default::default()
        }
    }

    /// The effect allele as a single base.
    ///
    /// `risk_allele` when one is reported, otherwise `protective_allele`.
    /// Either way the weight is ln(OR), so a protective allele with OR < 1
    /// contributes negatively.
    pub fn risk_nucleotide(&self) -> Option<Nucleotide> {
        fn reported(a: &Option<String>) -> Option<&str> {
            a.as_deref().map(str::trim).filter(|a| !a.is_empty())
        }
        reported(&self.risk_allele)
            .or_else(|| reported(&self.protective_allele))?
            .parse()
            .ok()
    }

    /// Per-allele effect size on the log-odds scale.
    ///
    /// `ln(odds_ratio)` when a positive odds ratio is known, otherwise `beta`.
    pub fn effect_weight(&self) -> Option<f64> {
        match self.odds_ratio {
            Some(or) if or > 0.0 => Some(or.ln()),
            _ => self.beta,
        }
    }
}
