//! Persistent, digest-keyed cache of a built [`FileIndex`].
//!
//! Startup cost of re-scanning every archive's directory table is avoided by
//! serializing the built index to disk once, keyed by a digest over the
//! archive manifest (paths, sizes, mtimes) and the configured encoding. Any
//! mismatch — a different manifest, a changed archive, a corrupt or
//! foreign-format file — is treated as a silent miss; the caller simply
//! rebuilds from the archives.

use super::FileIndex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum IndexCacheError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize index cache: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Serialize, Deserialize)]
struct PersistedBlob {
    digest: String,
    index: FileIndex,
}

/// One digest input per archive: its path, modification time, and size.
pub type ArchiveStamp = (PathBuf, u64, u64);

/// Digest over the encoding name and every archive's `(path, mtime, size)`,
/// in manifest order — reordering or touching any archive invalidates it.
pub fn compute_digest(grf_encoding: &str, archives: &[ArchiveStamp]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(grf_encoding.as_bytes());
    for (path, mtime, size) in archives {
        hasher.update(path.to_string_lossy().as_bytes());
        hasher.update(&mtime.to_le_bytes());
        hasher.update(&size.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Loads the cached index if its stored digest matches `digest_expected`.
/// Returns `None` on any I/O error, parse failure, or digest mismatch.
pub fn load(dir: &Path, digest_expected: &str) -> Option<FileIndex> {
    let bytes = fs::read(blob_path(dir)).ok()?;
    let blob: PersistedBlob = serde_json::from_slice(&bytes).ok()?;
    if blob.digest != digest_expected {
        warn!("persistent index digest mismatch, discarding cache");
        return None;
    }
    info!(entries = blob.index.len(), "persistent index cache hit");
    Some(blob.index)
}

/// Serializes `index` to a temp file under `dir` then renames it into place,
/// so a reader never observes a partially-written blob.
pub fn save(dir: &Path, digest: &str, index: &FileIndex) -> Result<(), IndexCacheError> {
    fs::create_dir_all(dir)?;
    let blob = PersistedBlob { digest: digest.to_owned(), index: index.clone() };
    let bytes = serde_json::to_vec(&blob)?;

    let tmp_path = dir.join(format!(".index-cache-{}.tmp", std::process::id()));
    fs::write(&tmp_path, &bytes)?;
    fs::rename(&tmp_path, blob_path(dir))?;
    info!(entries = index.len(), "persistent index cache written");
    Ok(())
}

fn blob_path(dir: &Path) -> PathBuf {
    dir.join("index_cache.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexEntry;
    use std::collections::HashMap;

    fn sample_index() -> FileIndex {
        let mut map = HashMap::new();
        map.insert("data/a.txt".to_string(), IndexEntry { archive_id: 0, stored_name: b"data/a.txt".to_vec() });
        FileIndex::from_map(map)
    }

    #[test]
    fn digest_changes_with_archive_stamp() {
        let a = compute_digest("euc-kr", &[(PathBuf::from("x.grf"), 1, 100)]);
        let b = compute_digest("euc-kr", &[(PathBuf::from("x.grf"), 2, 100)]);
        assert_ne!(a, b);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let index = sample_index();
        let digest = compute_digest("euc-kr", &[]);
        save(dir.path(), &digest, &index).unwrap();
        let loaded = load(dir.path(), &digest).unwrap();
        assert_eq!(loaded.len(), index.len());
    }

    #[test]
    fn digest_mismatch_is_a_silent_miss() {
        let dir = tempfile::tempdir().unwrap();
        let index = sample_index();
        save(dir.path(), "digest-a", &index).unwrap();
        assert!(load(dir.path(), "digest-b").is_none());
    }

    #[test]
    fn missing_file_is_a_silent_miss() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(dir.path(), "whatever").is_none());
    }
}
