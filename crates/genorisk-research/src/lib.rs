//! genorisk-research: condition research against public sources.
//!
//! GWAS Catalog lookups, web-search snippets and the deep-research pipeline
//! that compiles both into a report summarised by a hosted model.

pub mod models;
pub mod gwas;
pub mod search;
pub mod pipeline;

pub use gwas::GwasCatalogClient;
pub use models::{ResearchOutcome, ResearchReport};
pub use pipeline::ResearchPipeline;
pub use search::{GoogleSearchClient, MockWebSearch, SearchKind, WebSearch};
