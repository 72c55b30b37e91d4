//! Nucleotide and allele codes shared by the scorer and the catalogue clients.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the four DNA bases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Nucleotide {
    A,
    C,
    G,
    T,
}

impl Nucleotide {
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'A' => Some(Nucleotide::A),
            'C' => Some(Nucleotide::C),
            'G' => Some(Nucleotide::G),
            'T' => Some(Nucleotide::T),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Nucleotide::A => 'A',
            Nucleotide::C => 'C',
            Nucleotide::G => 'G',
            Nucleotide::T => 'T',
        }
    }
}

impl fmt::Display for Nucleotide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl FromStr for Nucleotide {
    type Err = String;

    /// Parses a single-base code such as `"a"` or `" G "`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Nucleotide::from_char(c)
                .ok_or_else(|| format!("'{trimmed}' is not one of A, C, G, T")),
            _ => Err(format!("'{trimmed}' is not a single nucleotide code")),
        }
    }
}

/// Markers genotyping chips and exports use when a call could not be made.
pub const NO_CALL_MARKERS: [&str; 4] = ["-", "--", "0", "?"];

/// A called base or a no-call, as read from a genotype row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Allele {
    Base(Nucleotide),
    NoCall,
}

impl Allele {
    /// Parses a trimmed, case-insensitive allele cell.
    /// Returns `None` for anything outside `{A, C, G, T}` and the no-call markers.
    pub fn parse(cell: &str) -> Option<Self> {
        let cell = cell.trim();
        if NO_CALL_MARKERS.contains(&cell) {
            return Some(Allele::NoCall);
        }
        cell.parse::<Nucleotide>().ok().map(Allele::Base)
    }

    pub fn is_no_call(&self) -> bool {
        matches!(self, Allele::NoCall)
    }

    pub fn base(&self) -> Option<Nucleotide> {
        match self {
            Allele::Base(n) => Some(*n),
            Allele::NoCall => None,
        }
    }
}

impl fmt::Display for Allele {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Allele::Base(n) => write!(f, "{n}"),
            Allele::NoCall => write!(f, "-"),
        }
    }
}
