//! Overlay resolver and file index — merges a local directory and N
//! stacked archives into one normalized-key lookup table.

pub mod cache;

use crate::archive::GrfArchive;
use crate::path_mapping::normalize;
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub archive_id: usize,
    pub stored_name: Vec<u8>,
}

/// Read-only after `build()`. Later archives overwrite earlier ones on key
/// collision, encoding the overlay "later archive wins" rule.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct FileIndex {
    map: HashMap<String, IndexEntry>,
    #[serde(skip)]
    local_files: Vec<String>,
}

impl FileIndex {
    /// Streams `listEntries()` from every archive in manifest order.
    /// `encoding` is used to decode a stored name only when its raw bytes
    /// are not already valid UTF-8.
    pub fn build(archives: &[GrfArchive], encoding: &'static Encoding) -> Self {
        let mut map = HashMap::new();
        for (archive_id, archive) in archives.iter().enumerate() {
            for stored_name in archive.list_entries() {
                let decoded = decode_name(stored_name, encoding);
                let key = normalize(&decoded);
                map.insert(key, IndexEntry { archive_id, stored_name: stored_name.to_vec() });
            }
        }
        info!(entries = map.len(), archives = archives.len(), "file index built");
        Self { map, local_files: Vec::new() }
    }

    /// Search-only: populates the local-overlay file list used by `search`.
    pub fn scan_local_overlay(&mut self, dir: &Path) {
        self.local_files = walk_relative_files(dir);
    }

    pub fn lookup(&self, normalized_path: &str) -> Option<&IndexEntry> {
        self.map.get(normalized_path)
    }

    pub fn local_files(&self) -> &[String] {
        &self.local_files
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    #[cfg(test)]
    pub(crate) fn from_map(map: HashMap<String, IndexEntry>) -> Self {
        Self { map, local_files: Vec::new() }
    }
}

fn decode_name(raw: &[u8], encoding: &'static Encoding) -> String {
    if let Ok(s) = std::str::from_utf8(raw) {
        return s.to_owned();
    }
    let (decoded, _, _) = encoding.decode(raw);
    decoded.into_owned()
}

fn walk_relative_files(root: &Path) -> Vec<String> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else { continue };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if let Ok(rel) = path.strip_prefix(root) {
                out.push(normalize(&rel.to_string_lossy()));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_archive_wins_on_collision() {
        let mut map = HashMap::new();
        map.insert("x.dat".to_string(), IndexEntry { archive_id: 0, stored_name: b"x.dat".to_vec() });
        map.insert("x.dat".to_string(), IndexEntry { archive_id: 1, stored_name: b"x.dat".to_vec() });
        let idx = FileIndex { map, local_files: Vec::new() };
        assert_eq!(idx.lookup("x.dat").unwrap().archive_id, 1);
    }

    #[test]
    fn decode_name_prefers_utf8() {
        assert_eq!(decode_name("héllo".as_bytes(), encoding_rs::EUC_KR), "héllo");
    }
}
