//! Configuration bundle and INI data-manifest parsing.
//!
//! Configuration faults are fatal at startup (§7): a malformed data manifest
//! or path-mapping file aborts `wire glue` construction rather than limping
//! along with partial state.

use ini::Ini;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("io error reading data manifest: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed data manifest: {0}")]
    Ini(#[from] ini::ParseError),
    #[error("data manifest has no [Data] section")]
    MissingDataSection,
    #[error("data manifest priority key {0:?} is not an integer")]
    BadPriorityKey(String),
}

/// Mirrors §6's configuration table.
#[derive(Debug, Clone)]
pub struct Config {
    pub resource_path: PathBuf,
    pub data_manifest: Option<PathBuf>,
    pub auto_extract: bool,
    pub local_scan: bool,
    pub cache_enabled: bool,
    pub cache_max_items: usize,
    pub cache_max_bytes: usize,
    pub index_cache_enabled: bool,
    pub index_cache_dir: PathBuf,
    pub path_mapping_enabled: bool,
    pub path_mapping_file: Option<PathBuf>,
    pub grf_encoding: String,
    pub memory_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            resource_path: PathBuf::from("."),
            data_manifest: None,
            auto_extract: false,
            local_scan: true,
            cache_enabled: true,
            cache_max_items: 4096,
            cache_max_bytes: 256 * 1024 * 1024,
            index_cache_enabled: true,
            index_cache_dir: PathBuf::from(".grfserve-cache"),
            path_mapping_enabled: false,
            path_mapping_file: None,
            grf_encoding: "euc-kr".to_string(),
            memory_limit: 512 * 1024 * 1024,
        }
    }
}

/// Reads the `[Data]` section (matched case-insensitively) of an INI data
/// manifest. Keys are ascending integer priorities; lower priority loads
/// first in the overlay, so the returned list is in "load this, then this"
/// order and the *last* entry is the one that wins on collision.
pub fn load_data_manifest(path: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let ini = Ini::load_from_file(path).map_err(|e| match e {
        ini::Error::Io(io) => ConfigError::Io(io),
        ini::Error::Parse(p) => ConfigError::Ini(p),
    })?;

    let props = ini
        .iter()
        .find(|(name, _)| name.map(|n| n.eq_ignore_ascii_case("Data")).unwrap_or(false))
        .map(|(_, props)| props)
        .ok_or(ConfigError::MissingDataSection)?;

    let mut entries: Vec<(i64, PathBuf)> = Vec::new();
    for (key, value) in props.iter() {
        let priority: i64 = key
            .trim()
            .parse()
            .map_err(|_| ConfigError::BadPriorityKey(key.to_string()))?;
        entries.push((priority, PathBuf::from(value)));
    }
    entries.sort_by_key(|(priority, _)| *priority);
    Ok(entries.into_iter().map(|(_, path)| path).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_ascending_priority_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[Data]\n20=patch.grf\n0=base.grf\n10=addon.grf").unwrap();
        let entries = load_data_manifest(file.path()).unwrap();
        assert_eq!(entries, vec![PathBuf::from("base.grf"), PathBuf::from("addon.grf"), PathBuf::from("patch.grf")]);
    }

    #[test]
    fn section_name_is_case_insensitive() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[data]\n0=base.grf").unwrap();
        let entries = load_data_manifest(file.path()).unwrap();
        assert_eq!(entries, vec![PathBuf::from("base.grf")]);
    }

    #[test]
    fn missing_data_section_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[Other]\n0=base.grf").unwrap();
        assert!(matches!(load_data_manifest(file.path()), Err(ConfigError::MissingDataSection)));
    }

    #[test]
    fn non_integer_priority_key_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[Data]\nfirst=base.grf").unwrap();
        assert!(matches!(load_data_manifest(file.path()), Err(ConfigError::BadPriorityKey(_))));
    }

    #[test]
    fn default_config_has_sane_bounds() {
        let cfg = Config::default();
        assert!(cfg.cache_max_items > 0);
        assert!(cfg.cache_max_bytes > 0);
    }
}
