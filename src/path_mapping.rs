//! CP949/EUC-KR ↔ UTF-8 path mapping, loaded once at startup.
//!
//! The mapping document is produced offline by a generator tool (out of
//! scope here, per §1) and is read-only at runtime. `resolve` tries a small,
//! explicit set of key variants rather than attempting locale-sensitive
//! best-effort conversion, per §9's "explicit enumeration" design note.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PathMappingError {
    #[error("io error reading path mapping file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed path mapping document: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Document {
    Wrapped { paths: HashMap<String, String> },
    Flat(HashMap<String, String>),
}

#[derive(Debug, Default)]
pub struct MappingStats {
    pub lookups: AtomicU64,
    pub hits: AtomicU64,
    pub misses: AtomicU64,
}

pub struct PathMapping {
    table: HashMap<String, String>,
    pub stats: MappingStats,
}

/// Lowercase + forward-slash + strip one leading slash.
pub fn normalize(path: &str) -> String {
    let replaced = path.replace('\\', "/").to_lowercase();
    replaced.strip_prefix('/').map(str::to_owned).unwrap_or(replaced)
}

impl PathMapping {
    pub fn empty() -> Self {
        Self { table: HashMap::new(), stats: MappingStats::default() }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PathMappingError> {
        let text = fs::read_to_string(path)?;
        let doc: Document = serde_json::from_str(&text)?;
        let raw = match doc {
            Document::Wrapped { paths } => paths,
            Document::Flat(paths) => paths,
        };
        let table = raw.into_iter().map(|(k, v)| (normalize(&k), v)).collect();
        Ok(Self { table, stats: MappingStats::default() })
    }

    /// Tries, in order: the normalized key, the raw lowercase form, the
    /// backslash-converted form, and the forward-slash-converted form.
    pub fn resolve(&self, path: &str) -> Option<&str> {
        self.stats.lookups.fetch_add(1, Ordering::Relaxed);

        let candidates = [
            normalize(path),
            path.to_lowercase(),
            path.replace('/', "\\"),
            path.replace('\\', "/"),
        ];

        for candidate in candidates {
            if let Some(v) = self.table.get(&candidate) {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                return Some(v);
            }
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Interpret `s`'s Unicode scalar values as raw 8-bit bytes (only valid for
/// codepoints ≤ 0xFF), then decode those bytes as CP949/EUC-KR.
pub fn decode_mojibake(s: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(s.len());
    for c in s.chars() {
        let cp = c as u32;
        if cp > 0xFF {
            return None;
        }
        bytes.push(cp as u8);
    }
    let (decoded, _, had_errors) = encoding_rs::EUC_KR.decode(&bytes);
    if had_errors {
        None
    } else {
        Some(decoded.into_owned())
    }
}

/// Inverse of [`decode_mojibake`]: encode `s` as CP949/EUC-KR, then
/// reinterpret the resulting bytes as Latin-1 codepoints.
pub fn encode_to_mojibake(s: &str) -> String {
    let (encoded, _, _) = encoding_rs::EUC_KR.encode(s);
    encoded.iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_lowercases_and_forward_slashes() {
        assert_eq!(normalize("DATA\\Foo.BMP"), "data/foo.bmp");
        assert_eq!(normalize("/data/foo.bmp"), "data/foo.bmp");
    }

    #[test]
    fn resolve_flat_document() {
        let mapping = PathMapping {
            table: HashMap::from([("data/logo.bmp".to_string(), "stored_raw".to_string())]),
            stats: MappingStats::default(),
        };
        assert_eq!(mapping.resolve("DATA/LOGO.BMP"), Some("stored_raw"));
        assert_eq!(mapping.stats.hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn resolve_miss_counts() {
        let mapping = PathMapping::empty();
        assert_eq!(mapping.resolve("nope"), None);
        assert_eq!(mapping.stats.misses.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn mojibake_round_trip() {
        let original = "유저인터페이스";
        let mojibake = encode_to_mojibake(original);
        let recovered = decode_mojibake(&mojibake).unwrap();
        assert_eq!(recovered, original);
    }
}
