//! Patient genotype table loading.
//!
//! Expected layout: one header row then one record per variant, with the
//! columns `rsid, chromosome, position, allele1, allele2` (any order).
//! Lines starting with `#` are treated as comments, which lets raw
//! consumer-chip exports be loaded without pre-processing.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use genorisk_common::{Allele, Nucleotide};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::{Result, ScoreError};

const COL_RSID: &str = "rsid";
const COL_CHROMOSOME: &str = "chromosome";
const COL_POSITION: &str = "position";
const COL_ALLELE1: &str = "allele1";
const COL_ALLELE2: &str = "allele2";

const REQUIRED_COLUMNS: [&str; 5] = [COL_RSID, COL_CHROMOSOME, COL_POSITION, COL_ALLELE1, COL_ALLELE2];

/// Header spellings accepted for the variant id column.
const RSID_ALIASES: [&str; 3] = ["rs id", "snp id", "marker"];

/// Normalised variant id: trimmed and lower-cased, so `RS123` and `rs123` match.
pub fn normalise_variant_id(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// One genotyped variant for one patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenotypeRecord {
    pub variant_id: String,
    pub chromosome: String,
    pub position: u64,
    pub allele_one: Allele,
    pub allele_two: Allele,
}

impl GenotypeRecord {
    /// Number of copies of `risk` carried (0, 1 or 2).
    ///
    /// Returns `None` when either allele is a no-call, since the dosage is
    /// then unknown rather than zero.
    pub fn dosage(&self, risk: Nucleotide) -> Option<u8> {
        let one = self.allele_one.base()?;
        let two = self.allele_two.base()?;
        Some((one == risk) as u8 + (two == risk) as u8)
    }

    pub fn has_no_call(&self) -> bool {
        self.allele_one.is_no_call() || self.allele_two.is_no_call()
    }

    /// Genotype rendered as `A/G`.
    pub fn genotype(&self) -> String {
        format!("{}/{}", self.allele_one, self.allele_two)
    }
}

/// All genotype records of one patient, keyed by normalised variant id.
#[derive(Debug, Clone, Default)]
pub struct GenotypeSet {
    records: HashMap<String, GenotypeRecord>,
}

impl GenotypeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record under its normalised id. Returns `false`, leaving the
    /// set untouched, if the variant id is already present.
    pub fn insert(&mut self, mut record: GenotypeRecord) -> bool {
        record.variant_id = normalise_variant_id(&record.variant_id);
        if self.records.contains_key(&record.variant_id) {
            return false;
        }
        self.records.insert(record.variant_id.clone(), record);
        true
    }

    pub fn get(&self, variant_id: &str) -> Option<&GenotypeRecord> {
        self.records.get(&normalise_variant_id(variant_id))
    }

    pub fn contains(&self, variant_id: &str) -> bool {
        self.get(variant_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GenotypeRecord> {
        self.records.values()
    }
}

/// Header cell as matched against column names: BOM stripped, trimmed, lower-cased.
pub(crate) fn normalise_header(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}').trim().to_lowercase()
}

/// Column positions resolved from the header row.
struct ColumnMap {
    rsid: usize,
    chromosome: usize,
    position: usize,
    allele1: usize,
    allele2: usize,
}

impl ColumnMap {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let names: Vec<String> = headers
            .iter()
            .map(|h| {
                let h = normalise_header(h);
                if RSID_ALIASES.contains(&h.as_str()) { COL_RSID.to_string() } else { h }
            })
            .collect();

        let find = |col: &str| names.iter().position(|n| n == col);

        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|col| find(col).is_none())
            .collect();

        if !missing.is_empty() {
            let line = headers.position().map(|p| p.line()).unwrap_or(1);
            let found: Vec<&str> = headers.iter().collect();
            return Err(ScoreError::data_format(
                line,
                format!(
                    "genotype table is missing required columns {:?} (found {:?}, expected {:?})",
                    missing, found, REQUIRED_COLUMNS
                ),
            ));
        }

        // All present, checked above.
        Ok(Self {
            rsid: find(COL_RSID).unwrap_or_default(),
            chromosome: find(COL_CHROMOSOME).unwrap_or_default(),
            position: find(COL_POSITION).unwrap_or_default(),
            allele1: find(COL_ALLELE1).unwrap_or_default(),
            allele2: find(COL_ALLELE2).unwrap_or_default(),
        })
    }
}

/// Reads delimited genotype tables into a [`GenotypeSet`].
#[derive(Debug, Clone)]
pub struct GenotypeLoader {
    delimiter: u8,
}

impl Default for GenotypeLoader {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl GenotypeLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different field delimiter, e.g. `b'\t'` for chip exports.
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Load a genotype file from disk.
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub async fn load(&self, path: impl AsRef<Path>) -> Result<GenotypeSet> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;
        let set = self.parse_str(&content)?;
        info!(genotypes = set.len(), "Loaded patient genotypes");
        Ok(set)
    }

    pub fn parse_str(&self, content: &str) -> Result<GenotypeSet> {
        self.parse_reader(content.as_bytes())
    }

    /// Parse every row, failing on the first malformed one.
    ///
    /// The whole set is rejected on error so that no score is ever computed
    /// from a partially-read table.
    pub fn parse_reader<R: Read>(&self, reader: R) -> Result<GenotypeSet> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = reader.headers().map_err(ScoreError::from_csv)?.clone();
        let columns = ColumnMap::from_headers(&headers)?;

        let mut set = GenotypeSet::new();
        let mut first_seen: HashMap<String, u64> = HashMap::new();

        for result in reader.records() {
            let record = result.map_err(ScoreError::from_csv)?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            let parsed = parse_row(&record, &columns, line)?;
            if let Some(first) = first_seen.insert(parsed.variant_id.clone(), line) {
                return Err(ScoreError::data_format(
                    line,
                    format!("duplicate variant id '{}' (first seen on line {})", parsed.variant_id, first),
                ));
            }
            set.insert(parsed);
        }

        debug!(records = set.len(), "Parsed genotype table");
        Ok(set)
    }
}

fn required_field<'r>(record: &'r csv::StringRecord, idx: usize, name: &str, line: u64) -> Result<&'r str> {
    match record.get(idx).map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ScoreError::data_format(line, format!("missing required field '{name}'"))),
    }
}

fn parse_allele(raw: &str, name: &str, line: u64) -> Result<Allele> {
    Allele::parse(raw).ok_or_else(|| {
        ScoreError::data_format(
            line,
            format!("{name} '{raw}' is outside the accepted alphabet (A, C, G, T or a no-call marker)"),
        )
    })
}

fn parse_row(record: &csv::StringRecord, columns: &ColumnMap, line: u64) -> Result<GenotypeRecord> {
    let variant_id = normalise_variant_id(required_field(record, columns.rsid, COL_RSID, line)?);
    let chromosome = required_field(record, columns.chromosome, COL_CHROMOSOME, line)?.to_string();

    let position_raw = required_field(record, columns.position, COL_POSITION, line)?;
    let position = position_raw.parse::<u64>().map_err(|_| {
        ScoreError::data_format(line, format!("malformed position '{position_raw}' for {variant_id}"))
    })?;

    let allele_one = parse_allele(required_field(record, columns.allele1, COL_ALLELE1, line)?, COL_ALLELE1, line)?;
    let allele_two = parse_allele(required_field(record, columns.allele2, COL_ALLELE2, line)?, COL_ALLELE2, line)?;

    Ok(GenotypeRecord { variant_id, chromosome, position, allele_one, allele_two })
}
