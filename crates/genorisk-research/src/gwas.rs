//! GWAS Catalog REST API client.
//!
//! Endpoint: https://www.ebi.ac.uk/gwas/rest/api
//!
//! A condition is resolved to studies by disease trait, then each study's
//! associations are read and their strongest risk alleles merged into one
//! [`VariantInfo`] per rsID.

use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use genorisk_common::VariantInfo;
use genorisk_scorer::catalogue::VariantCatalogueLookup;
use regex::Regex;
use tracing::{debug, info, instrument, warn};

pub const GWAS_CATALOG_BASE_URL: &str = "https://www.ebi.ac.uk/gwas/rest/api";

const DEFAULT_MAX_STUDIES: usize = 50;
const DEFAULT_MAX_RESULTS: usize = 50;
const DEFAULT_REQUEST_DELAY: Duration = Duration::from_millis(300);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(45);

/// Split a risk allele name such as `rs3764147-G` into a lower-cased rsID
/// and the allele letters, if any.
pub fn parse_risk_allele_name(name: &str) -> Option<(String, Option<String>)> {
    let caps = risk_allele_regex().captures(name.trim())?;
    let rsid = caps.get(1)?.as_str().to_lowercase();
    let allele = caps.get(2).map(|m| m.as_str().to_string());
    Some((rsid, allele))
}

fn risk_allele_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // rs3764147-G, rs3764147-?, rs3764147
    RE.get_or_init(|| Regex::new(r"^(rs\d+)(?:-([A-Z]+))?").unwrap())
}

/// Number from either a JSON number or a numeric string.
fn json_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Study accession ids from a `findByDiseaseTrait` response.
pub fn study_accessions(json: &serde_json::Value) -> Vec<String> {
    json["_embedded"]["studies"]
        .as_array()
        .map(|studies| {
            studies
                .iter()
                .filter_map(|s| s["accessionId"].as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

/// Merges associations from many studies, keeping first-seen order.
#[derive(Debug, Default)]
pub struct VariantAccumulator {
    variants: Vec<VariantInfo>,
    index: HashMap<String, usize>,
}

impl VariantAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one study's `associations` response into the running set.
    pub fn add_study(&mut self, accession: &str, json: &serde_json::Value) -> usize {
        let Some(associations) = json["_embedded"]["associations"].as_array() else {
            return 0;
        };
        for assoc in associations {
            let pvalue = json_number(&assoc["pvalue"]);
            for locus in assoc["loci"].as_array().into_iter().flatten() {
                let gene = locus["authorReportedGenes"][0]["geneName"]
                    .as_str()
                    .filter(|g| !g.is_empty() && *g != "Unknown")
                    .map(String::from);
                for allele in locus["strongestRiskAlleles"].as_array().into_iter().flatten() {
                    let Some((rsid, letter)) = allele["riskAlleleName"].as_str().and_then(parse_risk_allele_name)
                    else {
                        continue;
                    };
                    self.merge(accession, rsid, letter, pvalue, gene.clone(), assoc);
                }
            }
        }
        associations.len()
    }

    fn merge(
        &mut self,
        accession: &str,
        rsid: String,
        letter: Option<String>,
        pvalue: Option<f64>,
        gene: Option<String>,
        assoc: &serde_json::Value,
    ) {
        if let Some(&i) = self.index.get(&rsid) {
            let current = &mut self.variants[i];
            if !current.study_ids.iter().any(|s| s == accession) {
                current.study_ids.push(accession.to_string());
                current.mention_count = current.study_ids.len() as u32;
            }
            if let Some(p) = pvalue {
                if current.pvalue.map_or(true, |cur| p < cur) {
                    current.pvalue = Some(p);
                }
            }
            if current.reported_gene.is_none() {
                current.reported_gene = gene;
            }
            if current.risk_allele.is_none() {
                current.risk_allele = letter;
            }
            return;
        }

        debug!(rsid = %rsid, risk_allele = ?letter, study = accession, "New catalogue variant");
        self.index.insert(rsid.clone(), self.variants.len());
        self.variants.push(VariantInfo {
            rsid,
            risk_allele: letter,
            protective_allele: None,
            odds_ratio: json_number(&assoc["orPerCopyNum"]),
            beta: json_number(&assoc["betaNum"]),
            pvalue,
            reported_gene: gene,
            mention_count: 1,
            study_ids: vec![accession.to_string()],
        });
    }

    /// Most-replicated first, then most significant; missing p-values rank as 1.0.
    pub fn into_ranked(self, max_results: usize) -> Vec<VariantInfo> {
        let mut variants = self.variants;
        variants.sort_by(|a, b| {
            b.mention_count.cmp(&a.mention_count).then_with(|| {
                let pa = a.pvalue.unwrap_or(1.0);
                let pb = b.pvalue.unwrap_or(1.0);
                pa.partial_cmp(&pb).unwrap_or(std::cmp::Ordering::Equal)
            })
        });
        variants.truncate(max_results);
        variants
    }
}

pub struct GwasCatalogClient {
    base_url: String,
    max_studies: usize,
    max_results: usize,
    request_delay: Duration,
    client: reqwest::Client,
}

impl GwasCatalogClient {
    pub fn new() -> Self {
        Self::with_base_url(GWAS_CATALOG_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_studies: DEFAULT_MAX_STUDIES,
            max_results: DEFAULT_MAX_RESULTS,
            request_delay: DEFAULT_REQUEST_DELAY,
            client,
        }
    }

    pub fn with_limits(mut self, max_studies: usize, max_results: usize) -> Self {
        self.max_studies = max_studies;
        self.max_results = max_results;
        self
    }

    /// Pause between association requests.
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> anyhow::Result<serde_json::Value> {
        let json = self
            .client
            .get(url)
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .json::<serde_json::Value>()
            .await?;
        Ok(json)
    }

    /// Ranked catalogue hits for a disease trait.
    ///
    /// Fails only if the study search itself fails; a study whose
    /// associations cannot be fetched is logged and skipped.
    #[instrument(skip(self))]
    pub async fn search(&self, condition: &str) -> anyhow::Result<Vec<VariantInfo>> {
        let study_url = format!("{}/studies/search/findByDiseaseTrait", self.base_url);
        let studies = self
            .get_json(&study_url, &[("diseaseTrait", condition)])
            .await
            .with_context(|| format!("GWAS Catalog study search failed for '{condition}'"))?;

        let accessions = study_accessions(&studies);
        if accessions.is_empty() {
            info!("No GWAS Catalog studies found");
            return Ok(Vec::new());
        }
        info!(studies = accessions.len(), "Found GWAS Catalog studies");

        let mut acc = VariantAccumulator::new();
        for (i, accession) in accessions.iter().take(self.max_studies).enumerate() {
            if i > 0 && !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }
            let url = format!("{}/studies/{}/associations", self.base_url, accession);
            match self.get_json(&url, &[]).await {
                Ok(json) => {
                    let n = acc.add_study(accession, &json);
                    debug!(study = %accession, associations = n, "Read study associations");
                }
                Err(e) => warn!(study = %accession, error = %e, "Skipping study; associations unavailable"),
            }
        }

        let ranked = acc.into_ranked(self.max_results);
        info!(variants = ranked.len(), "Extracted catalogue variants");
        Ok(ranked)
    }
}

impl Default for GwasCatalogClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VariantCatalogueLookup for GwasCatalogClient {
    async fn find_variants(&self, condition: &str) -> anyhow::Result<Vec<VariantInfo>> {
        self.search(condition).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn association(pvalue: f64, or: Option<f64>, allele: &str, gene: &str) -> serde_json::Value {
        json!({
            "pvalue": pvalue,
            "orPerCopyNum": or,
            "betaNum": null,
            "loci": [{
                "strongestRiskAlleles": [{"riskAlleleName": allele}],
                "authorReportedGenes": [{"geneName": gene}]
            }]
        })
    }

    fn study(associations: Vec<serde_json::Value>) -> serde_json::Value {
        json!({"_embedded": {"associations": associations}})
    }

    #[test]
    fn test_parse_risk_allele_name() {
        assert_eq!(parse_risk_allele_name("rs3764147-G"), Some(("rs3764147".into(), Some("G".into()))));
        assert_eq!(parse_risk_allele_name("rs12345-?"), Some(("rs12345".into(), None)));
        assert_eq!(parse_risk_allele_name("rs7"), Some(("rs7".into(), None)));
        assert_eq!(parse_risk_allele_name("chr1:12345-A"), None);
    }

    #[test]
    fn test_study_accessions() {
        let json = json!({"_embedded": {"studies": [
            {"accessionId": "GCST1", "title": "a"},
            {"title": "no accession"},
            {"accessionId": "GCST2"}
        ]}});
        assert_eq!(study_accessions(&json), vec!["GCST1", "GCST2"]);
        assert!(study_accessions(&json!({})).is_empty());
    }

    #[test]
    fn test_merge_across_studies() {
        let mut acc = VariantAccumulator::new();
        acc.add_study("GCST1", &study(vec![association(1e-6, Some(1.4), "rs1-A", "Unknown")]));
        acc.add_study("GCST2", &study(vec![association(1e-9, Some(2.0), "rs1-G", "APOE")]));
        acc.add_study("GCST2", &study(vec![association(1e-3, None, "rs1-G", "TOMM40")]));

        let ranked = acc.into_ranked(10);
        assert_eq!(ranked.len(), 1);
        let v = &ranked[0];
        assert_eq!(v.mention_count, 2);
        assert_eq!(v.study_ids, vec!["GCST1", "GCST2"]);
        assert_eq!(v.pvalue, Some(1e-9));
        assert_eq!(v.risk_allele.as_deref(), Some("A"));
        assert_eq!(v.odds_ratio, Some(1.4));
        assert_eq!(v.reported_gene.as_deref(), Some("APOE"));
    }

    #[test]
    fn test_ranking_by_mentions_then_pvalue() {
        let mut acc = VariantAccumulator::new();
        acc.add_study("S1", &study(vec![
            association(1e-4, None, "rs10-A", "G1"),
            association(1e-8, None, "rs20-C", "G2"),
            association(1e-2, None, "rs30-T", "G3"),
        ]));
        acc.add_study("S2", &study(vec![association(1e-2, None, "rs30-T", "G3")]));
        acc.add_study("S3", &study(vec![json!({"loci": [{"strongestRiskAlleles": [{"riskAlleleName": "rs40-G"}]}]})]));

        let ids: Vec<String> = acc.into_ranked(10).into_iter().map(|v| v.rsid).collect();
        assert_eq!(ids, vec!["rs30", "rs20", "rs10", "rs40"]);
    }

    #[test]
    fn test_ranking_truncates() {
        let mut acc = VariantAccumulator::new();
        acc.add_study("S1", &study(vec![
            association(1e-4, None, "rs1-A", "G"),
            association(1e-5, None, "rs2-A", "G"),
        ]));
        let ranked = acc.into_ranked(1);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].rsid, "rs2");
    }

    #[test]
    fn test_numeric_strings_accepted() {
        let mut acc = VariantAccumulator::new();
        acc.add_study("S1", &study(vec![json!({
            "pvalue": "5e-8",
            "orPerCopyNum": "1.25",
            "betaNum": "n/a",
            "loci": [{"strongestRiskAlleles": [{"riskAlleleName": "RS5-T"}, {"riskAlleleName": "rs6-T"}]}]
        })]));
        let ranked = acc.into_ranked(10);
        assert_eq!(ranked.len(), 1, "upper-case RS prefix is not an rsID");
        assert_eq!(ranked[0].odds_ratio, Some(1.25));
        assert_eq!(ranked[0].beta, None);
        assert_eq!(ranked[0].pvalue, Some(5e-8));
    }

    mod http {
        use super::*;
        use axum::{extract::Path, routing::get, Json, Router};

        async fn serve(router: Router) -> String {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, router).await.unwrap();
            });
            format!("http://{addr}")
        }

        #[tokio::test]
        async fn test_search_skips_failing_study() {
            let router = Router::new()
                .route(
                    "/studies/search/findByDiseaseTrait",
                    get(|| async {
                        Json(json!({"_embedded": {"studies": [
                            {"accessionId": "GOOD"}, {"accessionId": "BAD"}
                        ]}}))
                    }),
                )
                .route(
                    "/studies/{acc}/associations",
                    get(|Path(acc): Path<String>| async move {
                        if acc == "GOOD" {
                            Ok(Json(study(vec![association(1e-9, Some(1.5), "rs99-C", "BRCA1")])))
                        } else {
                            Err(axum::http::StatusCode::INTERNAL_SERVER_ERROR)
                        }
                    }),
                );
            let base = serve(router).await;

            let client = GwasCatalogClient::with_base_url(base).with_request_delay(Duration::ZERO);
            let ids = client.candidate_ids("breast cancer").await.unwrap();
            assert_eq!(ids, vec!["rs99"]);
        }

        #[tokio::test]
        async fn test_search_failure_is_error() {
            let base = serve(Router::new()).await;
            let client = GwasCatalogClient::with_base_url(base);
            let err = client.search("gout").await.unwrap_err();
            assert!(err.to_string().contains("study search failed"), "{err}");
        }
    }
}
