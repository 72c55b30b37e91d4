//! Shared fixtures for Genorisk tests.

pub mod fixtures;

pub use pretty_assertions::{assert_eq, assert_ne};
