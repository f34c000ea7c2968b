//! GRF archive reader — one open archive file, read-only.
//!
//! ```no_run
//! use grfserve::archive::GrfArchive;
//!
//! let mut archive = GrfArchive::open("data.grf")?;
//! for name in archive.list_entries() {
//!     println!("{}", String::from_utf8_lossy(name));
//! }
//! let bytes = archive.read_entry(b"data/texture/foo.bmp")?;
//! # Ok::<(), grfserve::archive::ArchiveError>(())
//! ```

mod entry;
mod header;

pub use entry::{EntryFlag, EntryMeta};
pub use header::GrfHeader;

use flate2::read::ZlibDecoder;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, trace, warn};

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("invalid archive signature")]
    InvalidSignature,
    #[error("unsupported archive version {0:#x}")]
    UnsupportedVersion(u32),
    #[error("directory table inflate failed: {0}")]
    TableInflate(String),
    #[error("entry not found")]
    NotFound,
    #[error("unknown encryption flag {0:#x}")]
    UnknownFlag(u8),
    #[error("short read: expected {expected} bytes, got {got}")]
    ShortRead { expected: usize, got: usize },
    #[error("payload inflate failed: {0}")]
    PayloadInflate(String),
    #[error("entry payload region [{position}, {end}) exceeds archive bounds ({filesize} bytes)")]
    OutOfBounds { position: u64, end: u64, filesize: u64 },
    #[error("v0x300 offset {0} exceeds native address range on this platform")]
    OffsetOverflow(u64),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct GrfArchive {
    file: File,
    filesize: u64,
    pub header: GrfHeader,
    entries: Vec<(Vec<u8>, EntryMeta)>,
}

impl GrfArchive {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ArchiveError> {
        let mut file = File::open(path.as_ref())?;
        let filesize = file.metadata()?.len();
        let header = GrfHeader::read(&mut file)?;
        debug!(version = header.version, file_count = header.file_count, "grf header parsed");
        let entries = Self::load_table(&mut file, &header)?;
        Ok(Self { file, filesize, header, entries })
    }

    fn load_table(
        file: &mut File,
        header: &GrfHeader,
    ) -> Result<Vec<(Vec<u8>, EntryMeta)>, ArchiveError> {
        let table_start = header::HEADER_SIZE as u64 + header.table_offset;
        file.seek(SeekFrom::Start(table_start))?;

        if header.version == header::VERSION_0X300 {
            let mut skip = [0u8; 4];
            file.read_exact(&mut skip)?; // unknown field, ignored per §9
        }

        let mut size_prefix = [0u8; 8];
        file.read_exact(&mut size_prefix)?;
        let compressed_size = u32::from_le_bytes(size_prefix[0..4].try_into().unwrap()) as usize;
        let uncompressed_size = u32::from_le_bytes(size_prefix[4..8].try_into().unwrap()) as usize;

        // An empty directory table (0x200 header with no entries) has no
        // zlib stream to inflate at all; ZlibDecoder would fail on zero
        // input bytes, so short-circuit before ever constructing one.
        if compressed_size == 0 || uncompressed_size == 0 {
            return Ok(Vec::new());
        }

        let mut compressed = vec![0u8; compressed_size];
        file.read_exact(&mut compressed)?;

        let mut table = Vec::with_capacity(uncompressed_size);
        ZlibDecoder::new(&compressed[..])
            .read_to_end(&mut table)
            .map_err(|e| ArchiveError::TableInflate(e.to_string()))?;

        Ok(entry::parse_entries(&table, header.version))
    }

    /// Single linear scan over the cached table; yields every stored name
    /// exactly as it appears in the archive's native encoding.
    pub fn list_entries(&self) -> impl Iterator<Item = &[u8]> {
        self.entries.iter().map(|(name, _)| name.as_slice())
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Byte-exact then case-insensitive lookup, followed by positional read,
    /// decryption dispatch, and inflate to `real_size`.
    pub fn read_entry(&mut self, stored_name: &[u8]) -> Result<Vec<u8>, ArchiveError> {
        let meta = self.find_entry(stored_name)?;
        self.extract(stored_name, &meta)
    }

    fn find_entry(&self, stored_name: &[u8]) -> Result<EntryMeta, ArchiveError> {
        if let Some((_, m)) = self.entries.iter().find(|(n, _)| n.as_slice() == stored_name) {
            return Ok(m.clone());
        }
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(stored_name))
            .map(|(_, m)| m.clone())
            .ok_or(ArchiveError::NotFound)
    }

    fn extract(&mut self, name: &[u8], meta: &EntryMeta) -> Result<Vec<u8>, ArchiveError> {
        let flag = EntryFlag::from_u8(meta.flags).ok_or(ArchiveError::UnknownFlag(meta.flags))?;

        let read_size = match flag {
            EntryFlag::Plain => meta.pack_size,
            _ => meta.length_aligned,
        } as u64;
        let position = header::HEADER_SIZE as u64 + meta.position;
        let end = position + read_size.max(meta.length_aligned as u64).max(meta.pack_size as u64);
        if end > self.filesize {
            return Err(ArchiveError::OutOfBounds { position: meta.position, end, filesize: self.filesize });
        }
        // v0x300 positions are read as a 64-bit LE quantity (§3); on a
        // 32-bit target the eventual in-memory buffer length and any
        // address-space-sized indexing into it must fail loudly rather than
        // silently truncate, per §4.B/§9.
        usize::try_from(position).map_err(|_| ArchiveError::OffsetOverflow(meta.position))?;
        usize::try_from(end).map_err(|_| ArchiveError::OffsetOverflow(meta.position))?;

        self.file.seek(SeekFrom::Start(position))?;
        let mut buf = vec![0u8; read_size as usize];
        match self.file.read_exact(&mut buf) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(ArchiveError::ShortRead { expected: read_size as usize, got: 0 });
            }
            Err(e) => return Err(e.into()),
        }

        match flag {
            EntryFlag::Plain => {}
            EntryFlag::HeaderEncrypted => crate::des::decrypt_header(&mut buf),
            EntryFlag::Mixed | EntryFlag::MixedAlt => {
                let ext = extension_of(name);
                let (cycle, data_crypted) = crate::des::cycle_for(&ext, meta.pack_size);
                crate::des::decrypt_mixed(&mut buf, cycle, data_crypted);
            }
            EntryFlag::Reserved => return Err(ArchiveError::UnknownFlag(meta.flags)),
        }

        buf.truncate(meta.pack_size as usize);

        let mut out = Vec::with_capacity(meta.real_size as usize);
        ZlibDecoder::new(&buf[..])
            .read_to_end(&mut out)
            .map_err(|e| ArchiveError::PayloadInflate(e.to_string()))?;

        if out.len() != meta.real_size as usize {
            warn!(
                name = %String::from_utf8_lossy(name),
                expected = meta.real_size,
                got = out.len(),
                "inflated size mismatch"
            );
            return Err(ArchiveError::PayloadInflate(format!(
                "expected {} bytes, got {}",
                meta.real_size,
                out.len()
            )));
        }

        trace!(name = %String::from_utf8_lossy(name), bytes = out.len(), "entry extracted");
        Ok(out)
    }
}

fn extension_of(name: &[u8]) -> String {
    match name.iter().rposition(|&b| b == b'.') {
        Some(idx) => String::from_utf8_lossy(&name[idx..]).into_owned(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn extension_of_finds_last_dot() {
        assert_eq!(extension_of(b"data/a.grf.gnd"), ".gnd");
        assert_eq!(extension_of(b"noext"), "");
    }

    /// §8 boundary case: a bare 46-byte v0x200 header immediately followed
    /// by a zero-length directory table (compressed_size = uncompressed_size
    /// = 0) must open cleanly and list zero entries, not fail with a
    /// table-inflate error.
    #[test]
    fn empty_directory_table_opens_and_lists_no_entries() {
        let mut bytes = Vec::with_capacity(header::HEADER_SIZE + 8);
        bytes.extend_from_slice(b"Master of Magic\0");
        bytes.extend_from_slice(&[0u8; 14]);
        bytes.extend_from_slice(&0u32.to_le_bytes()); // table_offset
        bytes.extend_from_slice(&0u32.to_le_bytes()); // seed
        bytes.extend_from_slice(&0u32.to_le_bytes()); // file_count
        bytes.extend_from_slice(&header::VERSION_0X200.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes()); // compressed_size
        bytes.extend_from_slice(&0u32.to_le_bytes()); // uncompressed_size

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&bytes).unwrap();

        let archive = GrfArchive::open(file.path()).unwrap();
        assert_eq!(archive.entry_count(), 0);
        assert_eq!(archive.list_entries().next(), None);
    }
}
