//! GRF header — 46 bytes at offset 0.
//!
//! ```text
//! Offset  Size  Field
//!    0     16   signature      "Master of Magic" or "Event Horizon", NUL-padded
//!   16     14   key_bytes      archive-specific key material, unused by readEntry
//!   30      4   table_offset   LE u32 (v0x200) — reinterpreted as LE u64 for v0x300,
//!                               consuming the seed field's bytes too
//!   34      4   seed           LE u32 (v0x200 only; undefined for v0x300)
//!   38      4   file_count     LE u32
//!   42      4   version        LE u32 — 0x200 or 0x300
//! ```

use super::ArchiveError;
use std::io::Read;

pub const HEADER_SIZE: usize = 46;
pub const VERSION_0X200: u32 = 0x200;
pub const VERSION_0X300: u32 = 0x300;

const SIGNATURE_MOM: &[u8; 16] = b"Master of Magic\0";
const SIGNATURE_EH: &[u8; 16] = b"Event Horizon\0\0\0";

#[derive(Debug, Clone)]
pub struct GrfHeader {
    pub signature: [u8; 16],
    pub key_bytes: [u8; 14],
    pub table_offset: u64,
    pub seed: u32,
    pub file_count: u32,
    pub version: u32,
}

impl GrfHeader {
    pub fn read<R: Read>(r: &mut R) -> Result<Self, ArchiveError> {
        let mut buf = [0u8; HEADER_SIZE];
        r.read_exact(&mut buf)?;

        let signature: [u8; 16] = buf[0..16].try_into().unwrap();
        if &signature != SIGNATURE_MOM && &signature != SIGNATURE_EH {
            return Err(ArchiveError::InvalidSignature);
        }

        let key_bytes: [u8; 14] = buf[16..30].try_into().unwrap();
        let version = u32::from_le_bytes(buf[42..46].try_into().unwrap());

        let (table_offset, seed, file_count) = match version {
            VERSION_0X200 => {
                let table_offset = u32::from_le_bytes(buf[30..34].try_into().unwrap()) as u64;
                let seed = u32::from_le_bytes(buf[34..38].try_into().unwrap());
                let file_count = u32::from_le_bytes(buf[38..42].try_into().unwrap());
                (table_offset, seed, file_count)
            }
            VERSION_0X300 => {
                let table_offset = u64::from_le_bytes(buf[30..38].try_into().unwrap());
                let file_count = u32::from_le_bytes(buf[38..42].try_into().unwrap());
                (table_offset, 0, file_count)
            }
            other => return Err(ArchiveError::UnsupportedVersion(other)),
        };

        Ok(Self { signature, key_bytes, table_offset, seed, file_count, version })
    }
}
