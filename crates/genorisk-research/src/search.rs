//! Web search for variant and condition background.
//!
//! Endpoint: https://www.googleapis.com/customsearch/v1
//!
//! Search never fails as a whole: each term maps to either its joined result
//! snippets or a short message describing what went wrong.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, instrument, warn};

pub const GOOGLE_SEARCH_URL: &str = "https://www.googleapis.com/customsearch/v1";

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const TERM_DELAY: Duration = Duration::from_secs(1);
const SNIPPETS_PER_TERM: usize = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// What a search term names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    Variant,
    Condition,
}

impl SearchKind {
    pub fn query(self, term: &str) -> String {
        match self {
            SearchKind::Variant => format!("{term} genomics significance OR association OR function"),
            SearchKind::Condition => format!("{term} genetic basis OR overview OR symptoms OR genetic risk factors"),
        }
    }
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    /// One entry per term, keyed by the term itself.
    async fn research(&self, terms: &[String], kind: SearchKind) -> BTreeMap<String, String>;
}

/// First few result snippets joined with spaces, or `None` if there are none.
pub fn joined_snippets(json: &serde_json::Value) -> Option<String> {
    let joined = json["items"]
        .as_array()?
        .iter()
        .take(SNIPPETS_PER_TERM)
        .filter_map(|item| item["snippet"].as_str())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let joined = joined.trim();
    (!joined.is_empty()).then(|| joined.to_string())
}

struct Credentials {
    api_key: SecretString,
    cx: String,
}

/// Google Custom Search JSON API client.
pub struct GoogleSearchClient {
    credentials: Option<Credentials>,
    url: String,
    initial_backoff: Duration,
    term_delay: Duration,
    client: reqwest::Client,
}

impl GoogleSearchClient {
    /// Both the API key and the search engine id are needed; with either
    /// missing the client answers every term with a "not configured" note.
    pub fn new(api_key: Option<SecretString>, cx: Option<String>) -> Self {
        let credentials = match (api_key, cx) {
            (Some(api_key), Some(cx)) if !cx.is_empty() => Some(Credentials { api_key, cx }),
            _ => None,
        };
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            credentials,
            url: GOOGLE_SEARCH_URL.to_string(),
            initial_backoff: INITIAL_BACKOFF,
            term_delay: TERM_DELAY,
            client,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Override the 429 backoff start and the pause between terms.
    pub fn with_delays(mut self, initial_backoff: Duration, term_delay: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self.term_delay = term_delay;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    async fn search_term(&self, creds: &Credentials, term: &str, kind: SearchKind) -> String {
        let query = kind.query(term);
        let params = [
            ("key", creds.api_key.expose_secret()),
            ("cx", creds.cx.as_str()),
            ("q", query.as_str()),
        ];

        let mut backoff = self.initial_backoff;
        for attempt in 1..=MAX_RETRIES {
            let resp = match self.client.get(&self.url).query(&params).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    warn!(term, error = %e, "Web search request failed");
                    return format!("General error searching web for {term}: {e}");
                }
            };

            let status = resp.status();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                if attempt == MAX_RETRIES {
                    warn!(term, attempts = attempt, "Rate limited; giving up");
                    return format!("Error searching web for {term} after {attempt} attempts: rate limited (429)");
                }
                warn!(term, attempt, backoff_ms = backoff.as_millis() as u64, "Rate limited; retrying");
                tokio::time::sleep(backoff).await;
                backoff *= 2;
                continue;
            }
            if !status.is_success() {
                warn!(term, status = status.as_u16(), "Web search returned an error status");
                return format!("Error searching web for {term} after {attempt} attempts: HTTP {status}");
            }

            return match resp.json::<serde_json::Value>().await {
                Ok(json) => joined_snippets(&json)
                    .unwrap_or_else(|| format!("No significant web results found for {term}.")),
                Err(e) => format!("General error searching web for {term}: {e}"),
            };
        }
        format!("Error searching web for {term}: retries exhausted")
    }
}

#[async_trait]
impl WebSearch for GoogleSearchClient {
    #[instrument(skip(self, terms, kind), fields(terms = terms.len(), kind = ?kind))]
    async fn research(&self, terms: &[String], kind: SearchKind) -> BTreeMap<String, String> {
        let Some(creds) = &self.credentials else {
            return match (kind, terms.first()) {
                (SearchKind::Condition, Some(first)) => BTreeMap::from([(
                    first.clone(),
                    "Google Search not configured for condition research.".to_string(),
                )]),
                _ => terms
                    .iter()
                    .map(|t| (t.clone(), "Google Search not configured".to_string()))
                    .collect(),
            };
        };

        info!("Searching web");
        let mut out = BTreeMap::new();
        for (i, term) in terms.iter().enumerate() {
            if i > 0 && !self.term_delay.is_zero() {
                tokio::time::sleep(self.term_delay).await;
            }
            debug!(term = %term, n = i + 1, "Searching term");
            let text = self.search_term(creds, term, kind).await;
            out.insert(term.clone(), text);
        }
        out
    }
}

// ── Mock Implementation for Testing ────────────────────────────────────────

/// Returns canned text per term and "no results" for anything else.
#[derive(Debug, Clone, Default)]
pub struct MockWebSearch {
    answers: HashMap<String, String>,
}

impl MockWebSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, term: &str, text: &str) -> Self {
        self.answers.insert(term.to_string(), text.to_string());
        self
    }
}

#[async_trait]
impl WebSearch for MockWebSearch {
    async fn research(&self, terms: &[String], _kind: SearchKind) -> BTreeMap<String, String> {
        terms
            .iter()
            .map(|t| {
                let text = self
                    .answers
                    .get(t)
                    .cloned()
                    .unwrap_or_else(|| format!("No significant web results found for {t}."));
                (t.clone(), text)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn terms(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_query_templates() {
        assert_eq!(
            SearchKind::Variant.query("rs429358"),
            "rs429358 genomics significance OR association OR function"
        );
        assert_eq!(
            SearchKind::Condition.query("gout"),
            "gout genetic basis OR overview OR symptoms OR genetic risk factors"
        );
    }

    #[test]
    fn test_joined_snippets_takes_top_three() {
        let json = json!({"items": [
            {"snippet": "one"}, {"snippet": ""}, {"snippet": "three"}, {"snippet": "four"}
        ]});
        assert_eq!(joined_snippets(&json).as_deref(), Some("one three"));
        assert_eq!(joined_snippets(&json!({"items": []})), None);
        assert_eq!(joined_snippets(&json!({})), None);
    }

    #[tokio::test]
    async fn test_unconfigured_client() {
        let client = GoogleSearchClient::new(None, Some("cx".into()));
        assert!(!client.is_configured());

        let out = client.research(&terms(&["rs1", "rs2"]), SearchKind::Variant).await;
        assert_eq!(out.len(), 2);
        assert_eq!(out["rs1"], "Google Search not configured");

        let out = client.research(&terms(&["gout"]), SearchKind::Condition).await;
        assert_eq!(out["gout"], "Google Search not configured for condition research.");
    }

    #[tokio::test]
    async fn test_mock_web_search() {
        let search = MockWebSearch::new().with("rs1", "APOE variant");
        let out = search.research(&terms(&["rs1", "rs2"]), SearchKind::Variant).await;
        assert_eq!(out["rs1"], "APOE variant");
        assert!(out["rs2"].starts_with("No significant web results"));
    }

    mod http {
        use super::*;
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        use axum::{extract::State, http::StatusCode, routing::get, Json, Router};

        async fn serve(router: Router) -> String {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, router).await.unwrap();
            });
            format!("http://{addr}/customsearch/v1")
        }

        fn client(url: String) -> GoogleSearchClient {
            GoogleSearchClient::new(Some(SecretString::from("key".to_string())), Some("cx".into()))
                .with_url(url)
                .with_delays(Duration::from_millis(1), Duration::ZERO)
        }

        /// Rate-limits the first `limit` calls, then answers with snippets.
        fn flaky_router(limit: usize, calls: Arc<AtomicUsize>) -> Router {
            Router::new()
                .route(
                    "/customsearch/v1",
                    get(|State((calls, limit)): State<(Arc<AtomicUsize>, usize)>| async move {
                        if calls.fetch_add(1, Ordering::SeqCst) < limit {
                            return Err(StatusCode::TOO_MANY_REQUESTS);
                        }
                        Ok(Json(json!({"items": [{"snippet": "found it"}]})))
                    }),
                )
                .with_state((calls, limit))
        }

        #[tokio::test]
        async fn test_retries_after_rate_limit() {
            let calls = Arc::new(AtomicUsize::new(0));
            let url = serve(flaky_router(2, calls.clone())).await;

            let out = client(url).research(&terms(&["rs1"]), SearchKind::Variant).await;
            assert_eq!(out["rs1"], "found it");
            assert_eq!(calls.load(Ordering::SeqCst), 3);
        }

        #[tokio::test]
        async fn test_gives_up_after_three_attempts() {
            let calls = Arc::new(AtomicUsize::new(0));
            let url = serve(flaky_router(10, calls.clone())).await;

            let out = client(url).research(&terms(&["rs1"]), SearchKind::Variant).await;
            assert!(out["rs1"].contains("after 3 attempts"), "{}", out["rs1"]);
            assert_eq!(calls.load(Ordering::SeqCst), 3);
        }

        #[tokio::test]
        async fn test_server_error_becomes_entry() {
            let router = Router::new().route(
                "/customsearch/v1",
                get(|| async { StatusCode::FORBIDDEN }),
            );
            let url = serve(router).await;

            let out = client(url).research(&terms(&["gout"]), SearchKind::Condition).await;
            assert!(out["gout"].contains("403"), "{}", out["gout"]);
        }
    }
}
