//! Wire glue: configuration → archives → index → cache → `getAsset`/`search`.
//!
//! `Orchestrator` is the single owned value threaded through request
//! handling — no module-global mutable state, per §9.

use crate::archive::GrfArchive;
use crate::cache::Cache;
use crate::config::{self, Config};
use crate::index::{cache as index_cache, FileIndex};
use crate::path_mapping::{self, PathMapping};
use encoding_rs::Encoding;
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("path mapping error: {0}")]
    PathMapping(#[from] path_mapping::PathMappingError),
    #[error("index cache error: {0}")]
    IndexCache(#[from] index_cache::IndexCacheError),
    #[error("no archive could be opened and local scanning is disabled")]
    NoUsableSource,
    #[error("invalid search pattern: {0}")]
    BadPattern(#[from] regex::Error),
}

/// Tracks unique not-found request paths — the "missing-files log
/// collaborator" of §7. Not-found is a soft miss, never an error signal.
#[derive(Default)]
struct MissingFilesLog {
    seen: Mutex<HashSet<String>>,
}

impl MissingFilesLog {
    fn record(&self, path: &str) {
        let mut seen = self.seen.lock().unwrap();
        if seen.insert(path.to_owned()) {
            info!(path, "asset not found (first occurrence)");
        }
    }
}

pub struct Orchestrator {
    config: Config,
    archives: Vec<Mutex<GrfArchive>>,
    index: FileIndex,
    path_mapping: PathMapping,
    cache: Option<Cache>,
    missing: MissingFilesLog,
    encoding: &'static Encoding,
}

impl Orchestrator {
    /// Startup order per §5: config → open archives + build/load index →
    /// wire → serve. An archive that fails to open is logged and skipped;
    /// startup continues as long as at least one source (archive or local
    /// overlay) remains usable.
    pub fn build(config: Config) -> Result<Self, AssetError> {
        let encoding = resolve_encoding(&config.grf_encoding);

        let archive_paths = match &config.data_manifest {
            Some(manifest) => config::load_data_manifest(manifest)?,
            None => Vec::new(),
        };

        let mut archives = Vec::new();
        let mut stamps = Vec::new();
        for rel in &archive_paths {
            let full = config.resource_path.join(rel);
            match GrfArchive::open(&full) {
                Ok(archive) => {
                    if let Ok(meta) = fs::metadata(&full) {
                        let mtime = meta
                            .modified()
                            .ok()
                            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                            .map(|d| d.as_secs())
                            .unwrap_or(0);
                        stamps.push((full.clone(), mtime, meta.len()));
                    }
                    archives.push(archive);
                }
                Err(e) => warn!(path = %full.display(), error = %e, "archive failed to open, skipping"),
            }
        }

        if archives.is_empty() && !config.local_scan {
            return Err(AssetError::NoUsableSource);
        }

        let index = if config.index_cache_enabled {
            let digest = index_cache::compute_digest(&config.grf_encoding, &stamps);
            match index_cache::load(&config.index_cache_dir, &digest) {
                Some(index) => index,
                None => {
                    let built = FileIndex::build(&archives, encoding);
                    if let Err(e) = index_cache::save(&config.index_cache_dir, &digest, &built) {
                        warn!(error = %e, "failed to persist index cache");
                    }
                    built
                }
            }
        } else {
            FileIndex::build(&archives, encoding)
        };

        let mut index = index;
        if config.local_scan {
            index.scan_local_overlay(&config.resource_path);
        }

        let path_mapping = if config.path_mapping_enabled {
            match &config.path_mapping_file {
                Some(file) => PathMapping::load(file)?,
                None => PathMapping::empty(),
            }
        } else {
            PathMapping::empty()
        };

        let cache = config
            .cache_enabled
            .then(|| Cache::new(config.cache_max_items, config.cache_max_bytes));

        info!(
            archives = archives.len(),
            indexed = index.len(),
            cache_enabled = cache.is_some(),
            "orchestrator ready"
        );

        Ok(Self {
            config,
            archives: archives.into_iter().map(Mutex::new).collect(),
            index,
            path_mapping,
            cache,
            missing: MissingFilesLog::default(),
            encoding,
        })
    }

    /// The seven-step fallback chain of §4.G. Never returns an error for a
    /// missing asset — only `Some(bytes)` or `None`.
    pub fn get_asset(&self, path: &str) -> Option<Vec<u8>> {
        let key = path_mapping::normalize(path);

        // 1. cache
        if let Some(cache) = &self.cache {
            if let Some(bytes) = cache.get(&key) {
                return Some(bytes);
            }
        }

        // 2. local filesystem overlay, checked at the raw requested path —
        // not the normalized key, so mixed-case/backslashed local filenames
        // are found on a case-sensitive filesystem.
        if self.config.local_scan {
            let candidate = self.config.resource_path.join(path);
            if candidate.is_file() {
                if let Ok(bytes) = fs::read(&candidate) {
                    self.populate_cache(&key, &bytes);
                    return Some(bytes);
                }
            }
        }

        // 3. index lookup + decode via archive reader
        if let Some(bytes) = self.lookup_and_decode(&key) {
            self.populate_cache(&key, &bytes);
            self.auto_extract(path, &bytes);
            return Some(bytes);
        }

        // 4. path-mapping retry
        if let Some(mapped) = self.path_mapping.resolve(path) {
            let mapped = mapped.to_owned();
            let mapped_key = path_mapping::normalize(&mapped);
            if let Some(bytes) = self.lookup_and_decode(&mapped_key) {
                self.populate_cache(&key, &bytes);
                self.auto_extract(path, &bytes);
                return Some(bytes);
            }

            // 5. linear byte-exact fallback on the mapped name
            if let Some(bytes) = self.linear_fallback(mapped.as_bytes()) {
                self.populate_cache(&key, &bytes);
                self.auto_extract(path, &bytes);
                return Some(bytes);
            }
        }

        // 6. linear byte-exact fallback on the original request path
        if let Some(bytes) = self.linear_fallback(path.as_bytes()) {
            self.populate_cache(&key, &bytes);
            self.auto_extract(path, &bytes);
            return Some(bytes);
        }

        // 7. not-found
        self.missing.record(path);
        None
    }

    fn lookup_and_decode(&self, normalized_key: &str) -> Option<Vec<u8>> {
        let entry = self.index.lookup(normalized_key)?;
        let mut archive = self.archives.get(entry.archive_id)?.lock().unwrap();
        match archive.read_entry(&entry.stored_name) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(key = normalized_key, error = %e, "entry fault during decode");
                None
            }
        }
    }

    fn linear_fallback(&self, candidate: &[u8]) -> Option<Vec<u8>> {
        for archive in &self.archives {
            let mut archive = archive.lock().unwrap();
            if let Ok(bytes) = archive.read_entry(candidate) {
                return Some(bytes);
            }
        }
        None
    }

    fn populate_cache(&self, key: &str, bytes: &[u8]) {
        if let Some(cache) = &self.cache {
            cache.set(key, bytes.to_vec());
        }
    }

    /// §6: "On read hit from an archive, also write to local overlay."
    /// Writes the decoded bytes under `resource_path` at the requested path
    /// so a subsequent request is satisfied by step 2 without touching an
    /// archive again. Failures are logged, not propagated — extraction is a
    /// side effect of a successful read, never a reason to fail the read.
    fn auto_extract(&self, path: &str, bytes: &[u8]) {
        if !self.config.auto_extract {
            return;
        }
        let dest = self.config.resource_path.join(path);
        if let Some(parent) = dest.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!(path, error = %e, "auto_extract: failed to create local overlay directory");
                return;
            }
        }
        if let Err(e) = fs::write(&dest, bytes) {
            warn!(path, error = %e, "auto_extract: failed to write local overlay copy");
        }
    }

    /// Regex search over every indexed archive path plus the local overlay
    /// file list.
    pub fn search(&self, pattern: &str) -> Result<Vec<String>, AssetError> {
        let re = Regex::new(pattern)?;
        let mut out: Vec<String> = self
            .index
            .keys()
            .chain(self.index.local_files().iter().map(String::as_str))
            .filter(|p| re.is_match(p))
            .map(str::to_owned)
            .collect();
        out.sort();
        out.dedup();
        Ok(out)
    }

    pub fn encoding_name(&self) -> &str {
        self.encoding.name()
    }

    pub fn cache_stats(&self) -> Option<crate::cache::CacheStats> {
        self.cache.as_ref().map(Cache::stats)
    }

    pub fn indexed_count(&self) -> usize {
        self.index.len()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

fn resolve_encoding(name: &str) -> &'static Encoding {
    match name.to_ascii_lowercase().as_str() {
        "cp949" | "euc-kr" | "euckr" => encoding_rs::EUC_KR,
        other => {
            warn!(requested = other, "unrecognized grf_encoding, defaulting to EUC-KR/CP949");
            encoding_rs::EUC_KR
        }
    }
}

/// Extension-based MIME hint. The HTTP front-end owns the rest of content
/// negotiation (§6); this is the small lookup table it can build on.
pub fn mime_from_extension(path: &str) -> &'static str {
    let ext = match path.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => return "application/octet-stream",
    };
    match ext.as_str() {
        "bmp" => "image/bmp",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "tga" => "image/x-tga",
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "txt" | "lua" | "xml" | "ini" => "text/plain",
        "gnd" | "gat" | "act" | "str" | "rsw" | "spr" => "application/octet-stream",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_encoding_defaults_to_euc_kr() {
        assert_eq!(resolve_encoding("CP949").name(), "EUC-KR");
        assert_eq!(resolve_encoding("bogus").name(), "EUC-KR");
    }

    #[test]
    fn mime_from_extension_known_and_unknown() {
        assert_eq!(mime_from_extension("data/foo.BMP"), "image/bmp");
        assert_eq!(mime_from_extension("data/foo.weird"), "application/octet-stream");
        assert_eq!(mime_from_extension("noext"), "application/octet-stream");
    }
}
