//! # grfserve — read-only asset server core for GRF-family archives
//!
//! Fronts one or more legacy `.grf` archives (versions `0x200`/`0x300`) plus
//! an optional local-directory overlay, and resolves logical asset paths to
//! bytes through a cache → local overlay → archive index → path-mapping →
//! linear-fallback chain. The HTTP transport, image conversion, CLI
//! diagnostic tool, and encoding-mapping generator are external
//! collaborators; this crate is the core they sit on top of.

pub mod archive;
pub mod cache;
pub mod config;
pub mod des;
pub mod index;
pub mod orchestrator;
pub mod path_mapping;

pub use archive::{ArchiveError, GrfArchive};
pub use cache::{Cache, CacheStats};
pub use config::{Config, ConfigError};
pub use index::{FileIndex, IndexEntry};
pub use orchestrator::{mime_from_extension, AssetError, Orchestrator};
pub use path_mapping::{PathMapping, PathMappingError};
