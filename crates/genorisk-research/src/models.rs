//! Research report types.

use std::collections::BTreeMap;

use genorisk_common::VariantInfo;
use serde::{Deserialize, Serialize};

/// Everything gathered about one condition before summarisation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchReport {
    pub condition_researched: String,
    /// Ranked by study count, then p-value.
    pub identified_rsids: Vec<String>,
    pub variant_details: BTreeMap<String, VariantInfo>,
    /// Search term (rsID or condition) to joined result snippets.
    pub web_research_summary: BTreeMap<String, String>,
}

impl ResearchReport {
    pub fn compile(
        condition: &str,
        variants: &[VariantInfo],
        web_research_summary: BTreeMap<String, String>,
    ) -> Self {
        Self {
            condition_researched: condition.to_string(),
            identified_rsids: variants.iter().map(|v| v.rsid.clone()).collect(),
            variant_details: variants.iter().map(|v| (v.rsid.clone(), v.clone())).collect(),
            web_research_summary,
        }
    }
}

/// Result of one deep-research run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchOutcome {
    pub condition: String,
    pub report: ResearchReport,
    pub llm_summary: Option<String>,
    /// First failure encountered; the run still completes.
    pub error: Option<String>,
    /// One message per pipeline step, in order.
    pub status: Vec<String>,
}
