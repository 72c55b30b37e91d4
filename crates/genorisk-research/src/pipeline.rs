//! Deep research pipeline for one condition.
//!
//! Steps, run in order:
//!   1. Catalogue search for associated variants
//!   2. Web research per rsID (or for the condition itself when none were found)
//!   3. Compile the findings into a [`ResearchReport`]
//!   4. Ask a hosted model for a structured summary of the report
//!
//! No step aborts the run. Failures are recorded in the outcome and the
//! remaining steps continue with whatever was gathered.

use std::sync::Arc;
use std::time::Instant;

use genorisk_common::VariantInfo;
use genorisk_llm::{InferenceAuditEntry, InferenceEndpoint, InferenceRequest};
use genorisk_scorer::catalogue::VariantCatalogueLookup;
use tracing::{info, instrument, warn};

use crate::models::{ResearchOutcome, ResearchReport};
use crate::search::{SearchKind, WebSearch};

/// Medical-domain model used for the final summary.
pub const DEFAULT_SUMMARY_MODEL: &str = "palmyra";

const SUMMARY_PROMPT: &str = r#"You are given a genetic research report about a medical condition, in JSON.

Write a structured summary of the key findings as JSON with this shape:
{
  "condition_summary": "short overview of the condition",
  "genetic_findings": {
    "overview": "what the genetic associations show overall",
    "variants_by_significance": [
      {
        "rsid": "rsID",
        "risk_allele": "risk allele",
        "significance": "p-value",
        "effect_size": "odds ratio or beta",
        "reported_gene": "associated gene",
        "biological_impact": "likely role of the variant"
      }
    ]
  },
  "clinical_relevance": "what the findings may mean clinically",
  "research_implications": "where further research should look"
}

Prioritise variants with the lowest p-values, say which risk alleles raise
risk (odds ratio above 1 or positive beta), explain what the reported genes
do, and point out patterns shared by several variants.

JSON report:
"#;

pub struct ResearchPipeline {
    catalogue: Arc<dyn VariantCatalogueLookup>,
    search: Arc<dyn WebSearch>,
    llm: Option<Arc<dyn InferenceEndpoint>>,
    summary_model: String,
}

impl ResearchPipeline {
    pub fn new(
        catalogue: Arc<dyn VariantCatalogueLookup>,
        search: Arc<dyn WebSearch>,
        llm: Option<Arc<dyn InferenceEndpoint>>,
    ) -> Self {
        Self { catalogue, search, llm, summary_model: DEFAULT_SUMMARY_MODEL.to_string() }
    }

    pub fn with_summary_model(mut self, model: impl Into<String>) -> Self {
        self.summary_model = model.into();
        self
    }

    #[instrument(skip(self))]
    pub async fn run(&self, condition: &str) -> ResearchOutcome {
        let condition = condition.trim();
        let mut status = Vec::new();
        let mut error = None;

        // 1. Catalogue
        let variants: Vec<VariantInfo> = match self.catalogue.find_variants(condition).await {
            Ok(v) if v.is_empty() => {
                status.push(format!(
                    "No rsIDs found in GWAS Catalog for '{condition}'. Subsequent steps might yield limited results."
                ));
                v
            }
            Ok(v) => {
                status.push(format!("Found {} potential rsIDs from GWAS Catalog.", v.len()));
                v
            }
            Err(e) => {
                warn!(error = %e, "Catalogue search failed");
                let msg = format!("GWAS Catalog search failed: {e:#}");
                status.push(msg.clone());
                error = Some(msg);
                Vec::new()
            }
        };

        // 2. Web research
        let web = if !variants.is_empty() {
            let rsids: Vec<String> = variants.iter().map(|v| v.rsid.clone()).collect();
            let web = self.search.research(&rsids, SearchKind::Variant).await;
            status.push(format!("Completed web research for {} rsIDs.", rsids.len()));
            web
        } else if !condition.is_empty() {
            let web = self.search.research(&[condition.to_string()], SearchKind::Condition).await;
            status.push(format!(
                "Completed general web research for condition '{condition}' as no specific rsIDs were found by GWAS."
            ));
            web
        } else {
            status.push("Skipping web research, no rsIDs and no condition specified.".to_string());
            Default::default()
        };

        // 3. Compile
        let report = ResearchReport::compile(condition, &variants, web);
        status.push("Report compiled.".to_string());

        // 4. Summarise
        let llm_summary = self.summarise(&report).await;
        status.push("LLM summary generated.".to_string());

        info!(variants = report.identified_rsids.len(), failed = error.is_some(), "Research complete");
        ResearchOutcome {
            condition: condition.to_string(),
            report,
            llm_summary: Some(llm_summary),
            error,
            status,
        }
    }

    async fn summarise(&self, report: &ResearchReport) -> String {
        let Some(llm) = &self.llm else {
            return "LLM summarisation skipped (NVIDIA_API_KEY not configured).".to_string();
        };
        let report_json = match serde_json::to_string_pretty(report) {
            Ok(json) => json,
            Err(e) => return format!("LLM summarisation failed: {e}"),
        };

        let req = InferenceRequest::user(format!("{SUMMARY_PROMPT}{report_json}\n\nSummary:\n"))
            .with_model(self.summary_model.clone());
        let started = Instant::now();
        match llm.complete(req).await {
            Ok(resp) => {
                InferenceAuditEntry::new("deep_genetic_research", &resp, started.elapsed().as_millis() as u64)
                    .record();
                resp.content
            }
            Err(e) => {
                warn!(error = %e, "Summarisation failed");
                format!("LLM summarisation failed: {e}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use genorisk_llm::ScriptedBackend;
    use genorisk_scorer::catalogue::MockCatalogue;
    use genorisk_test_utils::fixtures;

    use crate::search::MockWebSearch;

    struct FailingCatalogue;

    #[async_trait]
    impl VariantCatalogueLookup for FailingCatalogue {
        async fn find_variants(&self, _condition: &str) -> anyhow::Result<Vec<VariantInfo>> {
            anyhow::bail!("catalogue unreachable")
        }
    }

    fn catalogue() -> Arc<MockCatalogue> {
        Arc::new(
            MockCatalogue::new()
                .with("asthma", fixtures::variant("rs1", Some("A"), Some(1.3)))
                .with("asthma", fixtures::variant("rs2", Some("G"), Some(0.8))),
        )
    }

    #[tokio::test]
    async fn test_full_run_with_variants() {
        let llm = Arc::new(ScriptedBackend::new("{\"condition_summary\": \"ok\"}"));
        let search = Arc::new(MockWebSearch::new().with("rs1", "rs1 snippet"));
        let pipeline = ResearchPipeline::new(catalogue(), search, Some(llm.clone() as Arc<dyn InferenceEndpoint>));

        let outcome = pipeline.run(" asthma ").await;

        assert_eq!(outcome.condition, "asthma");
        assert!(outcome.error.is_none());
        assert_eq!(outcome.report.identified_rsids, vec!["rs1", "rs2"]);
        assert_eq!(outcome.report.web_research_summary["rs1"], "rs1 snippet");
        assert!(outcome.report.variant_details.contains_key("rs2"));
        assert_eq!(outcome.llm_summary.as_deref(), Some("{\"condition_summary\": \"ok\"}"));
        assert_eq!(outcome.status.len(), 4);
        assert_eq!(outcome.status[0], "Found 2 potential rsIDs from GWAS Catalog.");

        let requests = llm.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model.as_deref(), Some("palmyra"));
        assert!(requests[0].messages[0].content.contains("\"rs1\""));
    }

    #[tokio::test]
    async fn test_condition_search_when_no_variants() {
        let search = Arc::new(MockWebSearch::new().with("gout", "gout background"));
        let pipeline = ResearchPipeline::new(Arc::new(MockCatalogue::new()), search, None);

        let outcome = pipeline.run("gout").await;

        assert!(outcome.report.identified_rsids.is_empty());
        assert_eq!(outcome.report.web_research_summary["gout"], "gout background");
        assert!(outcome.status[0].starts_with("No rsIDs found"));
        assert!(outcome.status[1].contains("general web research"));
        assert_eq!(
            outcome.llm_summary.as_deref(),
            Some("LLM summarisation skipped (NVIDIA_API_KEY not configured).")
        );
    }

    #[tokio::test]
    async fn test_catalogue_failure_recorded_and_run_continues() {
        let llm: Arc<dyn InferenceEndpoint> = Arc::new(ScriptedBackend::new("summary"));
        let pipeline = ResearchPipeline::new(Arc::new(FailingCatalogue), Arc::new(MockWebSearch::new()), Some(llm));

        let outcome = pipeline.run("asthma").await;

        let error = outcome.error.expect("error recorded");
        assert!(error.contains("catalogue unreachable"), "{error}");
        assert!(outcome.report.web_research_summary.contains_key("asthma"));
        assert_eq!(outcome.llm_summary.as_deref(), Some("summary"));
    }

    #[tokio::test]
    async fn test_llm_failure_becomes_text() {
        let llm: Arc<dyn InferenceEndpoint> = Arc::new(ScriptedBackend::new("unused").then_fail("model overloaded"));
        let pipeline = ResearchPipeline::new(catalogue(), Arc::new(MockWebSearch::new()), Some(llm));

        let outcome = pipeline.run("asthma").await;

        let summary = outcome.llm_summary.unwrap_or_default();
        assert!(summary.starts_with("LLM summarisation failed"), "{summary}");
        assert!(summary.contains("model overloaded"), "{summary}");
        assert!(outcome.error.is_none());
    }
}
