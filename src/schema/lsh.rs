//! MinHash/LSH index over example column values, used to surface candidate
//! `(table, column, value)` triples for a set of extracted keywords.
//!
//! Availability is critical per the orchestrator's phase 3 (§4.6): a missing
//! index file aborts the run with a structured error rather than degrading.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::AppError;

const NUM_HASHES: usize = 32;
const BAND_SIZE: usize = 4;
const SHINGLE_SIZE: usize = 3;

/// One indexed value and where it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedValue {
    pub table: String,
    pub column: String,
    pub value: String,
    signature: Vec<u64>,
}

/// Persisted index: bucket key (one per LSH band) -> indexed values sharing
/// that band's minhash slice.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LshIndex {
    buckets: HashMap<u64, Vec<usize>>,
    values: Vec<IndexedValue>,
}

impl LshIndex {
    pub fn build<I: IntoIterator<Item = (String, String, String)>>(entries: I) -> Self {
        let mut index = LshIndex::default();
        for (table, column, value) in entries {
            index.insert(table, column, value);
        }
        index
    }

    fn insert(&mut self, table: String, column: String, value: String) {
        let signature = minhash_signature(&value);
        let idx = self.values.len();
        for band in signature.chunks(BAND_SIZE) {
            let key = band_key(band);
            self.buckets.entry(key).or_default().push(idx);
        }
        self.values.push(IndexedValue { table, column, value, signature });
    }

    /// Candidate `(table, column, value)` triples whose minhash signature
    /// shares at least one LSH band with `keyword`.
    pub fn lookup(&self, keyword: &str, limit: usize) -> Vec<IndexedValue> {
        let signature = minhash_signature(keyword);
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for band in signature.chunks(BAND_SIZE) {
            let key = band_key(band);
            if let Some(indices) = self.buckets.get(&key) {
                for &idx in indices {
                    if seen.insert(idx) {
                        out.push(self.values[idx].clone());
                        if out.len() >= limit {
                            return out;
                        }
                    }
                }
            }
        }
        out
    }

    /// True for an index with nothing indexed — the shape `LshIndex::build`
    /// produces when the on-disk index file couldn't be loaded and the
    /// caller chose to degrade rather than fail session warming outright.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        let bytes = std::fs::read(path).map_err(|e| {
            AppError::ai_agent(format!(
                "Failed to extract schema using LSH: index file missing at {}: {e}",
                path.display()
            ))
            .with_context("component", "lsh_extraction")
        })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            AppError::ai_agent(format!("Failed to extract schema using LSH: corrupt index at {}: {e}", path.display()))
                .with_context("component", "lsh_extraction")
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::internal(e.to_string()))?;
        }
        let bytes = serde_json::to_vec(self).map_err(|e| AppError::internal(e.to_string()))?;
        std::fs::write(path, bytes).map_err(|e| AppError::internal(e.to_string()))
    }
}

pub fn index_path(db_root: &str, sqldb_name: &str) -> PathBuf {
    PathBuf::from(db_root).join("lsh_indices").join(format!("{sqldb_name}.json"))
}

fn shingles(text: &str) -> Vec<String> {
    let normalized = text.to_lowercase();
    let chars: Vec<char> = normalized.chars().collect();
    if chars.len() < SHINGLE_SIZE {
        return vec![normalized];
    }
    chars
        .windows(SHINGLE_SIZE)
        .map(|w| w.iter().collect())
        .collect()
}

fn minhash_signature(text: &str) -> Vec<u64> {
    let shingle_set = shingles(text);
    (0..NUM_HASHES)
        .map(|i| {
            shingle_set
                .iter()
                .map(|s| hash_with_seed(s, i as u64))
                .min()
                .unwrap_or(u64::MAX)
        })
        .collect()
}

fn hash_with_seed(text: &str, seed: u64) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325 ^ seed.wrapping_mul(0x9e3779b97f4a7c15);
    for byte in text.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn band_key(band: &[u64]) -> u64 {
    band.iter().fold(0xcbf29ce484222325u64, |acc, &v| (acc ^ v).wrapping_mul(0x100000001b3))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_is_found() {
        let index = LshIndex::build(vec![
            ("schools".to_string(), "county".to_string(), "Alameda".to_string()),
            ("schools".to_string(), "county".to_string(), "Fresno".to_string()),
        ]);
        let hits = index.lookup("Alameda", 10);
        assert!(hits.iter().any(|h| h.value == "Alameda"));
    }

    #[test]
    fn unrelated_keyword_does_not_explode_result_set() {
        let index = LshIndex::build(vec![(
            "schools".to_string(),
            "county".to_string(),
            "Alameda".to_string(),
        )]);
        let hits = index.lookup("zzz_nonexistent_xyz", 10);
        assert!(hits.len() <= 1);
    }

    #[test]
    fn missing_index_file_is_a_critical_error() {
        let err = LshIndex::load(Path::new("/nonexistent/path/db.json")).unwrap_err();
        assert!(err.is_critical());
    }
}
