//! genorisk-scorer: Polygenic risk scoring engine.
//!
//! Loads a patient's genotype table, applies a condition's variant weights
//! and reports the aggregate score together with the variants that could
//! not be scored.

pub mod error;
pub mod genotype;
pub mod weights;
pub mod scorer;
pub mod catalogue;

pub use error::{Result, ScoreError};
pub use genotype::{GenotypeLoader, GenotypeRecord, GenotypeSet};
pub use scorer::{RiskProfile, RiskScorer, ScoredVariant, UntestedReason, UntestedVariant};
pub use weights::{UnweightedVariant, VariantWeight, WeightTable};
