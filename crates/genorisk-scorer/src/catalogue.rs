//! Trait for variant catalogue access.
//!
//! Lets the weight table be built from whatever source knows which variants
//! are associated with a condition, without the scorer depending on any
//! particular HTTP client.

use std::collections::HashMap;

use async_trait::async_trait;
use genorisk_common::VariantInfo;

/// Source of condition-to-variant associations.
///
/// Implementations can use:
/// - the GWAS Catalog REST API (remote)
/// - a curated reference file (local)
/// - mock data (testing)
#[async_trait]
pub trait VariantCatalogueLookup: Send + Sync {
    /// Variants reported as associated with `condition`, most relevant first.
    async fn find_variants(&self, condition: &str) -> anyhow::Result<Vec<VariantInfo>>;

    /// Just the rsIDs of [`find_variants`](Self::find_variants).
    async fn candidate_ids(&self, condition: &str) -> anyhow::Result<Vec<String>> {
        Ok(self
            .find_variants(condition)
            .await?
            .into_iter()
            .map(|v| v.rsid)
            .collect())
    }
}

// ── Mock Implementation for Testing ────────────────────────────────────────

/// Mock catalogue with hardcoded hits for unit tests.
#[derive(Debug, Clone, Default)]
pub struct MockCatalogue {
    data: HashMap<String, Vec<VariantInfo>>,
}

impl MockCatalogue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a hit for a condition (matched case-insensitively).
    pub fn with(mut self, condition: &str, info: VariantInfo) -> Self {
        self.data.entry(condition.to_lowercase()).or_default().push(info);
        self
    }
}

#[async_trait]
impl VariantCatalogueLookup for MockCatalogue {
    async fn find_variants(&self, condition: &str) -> anyhow::Result<Vec<VariantInfo>> {
        Ok(self.data.get(&condition.to_lowercase()).cloned().unwrap_or_default())
    }
}
