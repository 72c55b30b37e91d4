//! genorisk-common: Shared types and errors used across all Genorisk crates.

pub mod error;
pub mod genotype;
pub mod variant;

// Re-export commonly used types
pub use error::{ApiError, ApiResult};
pub use genotype::{Allele, Nucleotide};
pub use variant::VariantInfo;
