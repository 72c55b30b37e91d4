//! Sample genotype and weight tables plus small builders.

use std::path::PathBuf;

use genorisk_common::VariantInfo;

/// Five genotyped variants, including one full no-call.
pub const SAMPLE_GENOTYPES_CSV: &str = "\
# sample patient export
rsid,chromosome,position,allele1,allele2
rs429358,19,44908684,C,T
rs7412,19,44908822,C,C
rs7903146,10,112998590,T,T
rs1801282,3,12351626,C,G
rs6025,1,169549811,--,--
";

/// Three Alzheimer's disease rows (one not genotyped in the sample) and two
/// type 2 diabetes rows.
pub const SAMPLE_WEIGHTS_CSV: &str = "\
rsid,condition,effect_weight,risk_allele
rs429358,Alzheimer's disease,1.12,C
rs7412,Alzheimer's disease,-0.47,T
rs75932628,Alzheimer's disease,0.98,T
rs7903146,type 2 diabetes,0.34,T
rs1801282,type 2 diabetes,-0.14,C
";

/// Build a genotype table from `(rsid, allele1, allele2)` triples.
///
/// The header is line 1, so row `i` (0-based) lands on line `i + 2`.
pub fn genotype_csv(rows: &[(&str, &str, &str)]) -> String {
    let mut out = String::from("rsid,chromosome,position,allele1,allele2\n");
    for (i, (rsid, a1, a2)) in rows.iter().enumerate() {
        out.push_str(&format!("{rsid},1,{},{a1},{a2}\n", 1000 + i));
    }
    out
}

/// Catalogue hit with just the fields weighting cares about.
pub fn variant(rsid: &str, risk_allele: Option<&str>, odds_ratio: Option<f64>) -> VariantInfo {
    VariantInfo {
        risk_allele: risk_allele.map(str::to_string),
        odds_ratio,
        ..VariantInfo::new(rsid)
    }
}

/// `{condition: {rsid: VariantInfo}}` payload as accepted by the risk tool.
pub fn condition_profiles_json(condition: &str, variants: &[VariantInfo]) -> serde_json::Value {
    let inner: serde_json::Map<String, serde_json::Value> = variants
        .iter()
        .map(|v| (v.rsid.clone(), serde_json::to_value(v).unwrap_or_default()))
        .collect();
    serde_json::json!({ condition: inner })
}

/// Write `contents` to a uniquely named file in the temp dir.
pub fn write_fixture(name: &str, contents: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("genorisk-test-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create fixture dir");
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("write fixture");
    path
}
