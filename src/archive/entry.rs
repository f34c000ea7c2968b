//! Directory-table entry records.

use super::header;

/// Encryption scheme selected by an entry's `flags` byte.
///
/// Flag 0x02 is "header-encrypted" and 0x03/0x05 are "mixed-encrypted" per
/// the newest archive-reader revision; 0x04 is reserved and always fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryFlag {
    Plain = 0x01,
    HeaderEncrypted = 0x02,
    Mixed = 0x03,
    Reserved = 0x04,
    MixedAlt = 0x05,
}

impl EntryFlag {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0x01 => Some(EntryFlag::Plain),
            0x02 => Some(EntryFlag::HeaderEncrypted),
            0x03 => Some(EntryFlag::Mixed),
            0x04 => Some(EntryFlag::Reserved),
            0x05 => Some(EntryFlag::MixedAlt),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EntryMeta {
    pub pack_size: u32,
    pub length_aligned: u32,
    pub real_size: u32,
    pub flags: u8,
    /// Offset of the payload, relative to the end of the 46-byte header.
    pub position: u64,
}

impl EntryMeta {
    /// Checks the invariants in §3/§8 testable property 4: `pack_size ≤
    /// length_aligned`, `length_aligned` a multiple of 8, `real_size > 0`,
    /// and `flags` in the known range. Does not check the file-size bound,
    /// which requires the archive's total length and is enforced separately
    /// in `extract` once the entry has already passed this check.
    pub fn is_structurally_valid(&self) -> bool {
        self.pack_size <= self.length_aligned
            && self.length_aligned % 8 == 0
            && self.real_size > 0
            && EntryFlag::from_u8(self.flags).is_some()
    }
}

/// Linear scan of the inflated directory table: NUL-terminated name followed
/// by a fixed-size metadata record (17 bytes for v0x200, 21 for v0x300).
/// Truncated trailing bytes that can't hold a full record are dropped
/// silently, matching the archive format's tolerance for a short final scan.
/// A record that parses but fails `EntryMeta::is_structurally_valid` (§8
/// testable property 4) is dropped too — it names no instance the spec
/// requires `readEntry` to serve, so it is equivalent to not being listed.
pub fn parse_entries(
    table: &[u8],
    version: u32,
) -> Vec<(Vec<u8>, EntryMeta)> {
    let position_size = if version == header::VERSION_0X300 { 8 } else { 4 };
    let record_tail = 4 + 4 + 4 + 1 + position_size; // 17 or 21

    let mut entries = Vec::new();
    let mut i = 0usize;

    while i < table.len() {
        let name_start = i;
        while i < table.len() && table[i] != 0 {
            i += 1;
        }
        if i >= table.len() {
            break; // unterminated trailing name, not a full record
        }
        let name = table[name_start..i].to_vec();
        i += 1; // skip NUL

        if i + record_tail > table.len() {
            break;
        }

        let pack_size = u32::from_le_bytes(table[i..i + 4].try_into().unwrap());
        i += 4;
        let length_aligned = u32::from_le_bytes(table[i..i + 4].try_into().unwrap());
        i += 4;
        let real_size = u32::from_le_bytes(table[i..i + 4].try_into().unwrap());
        i += 4;
        let flags = table[i];
        i += 1;
        let position = if position_size == 8 {
            let v = u64::from_le_bytes(table[i..i + 8].try_into().unwrap());
            i += 8;
            v
        } else {
            let v = u32::from_le_bytes(table[i..i + 4].try_into().unwrap()) as u64;
            i += 4;
            v
        };

        let meta = EntryMeta { pack_size, length_aligned, real_size, flags, position };
        if meta.is_structurally_valid() {
            entries.push((name, meta));
        }
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_record(buf: &mut Vec<u8>, name: &[u8], meta: (u32, u32, u32, u8, u64), pos8: bool) {
        buf.extend_from_slice(name);
        buf.push(0);
        buf.extend_from_slice(&meta.0.to_le_bytes());
        buf.extend_from_slice(&meta.1.to_le_bytes());
        buf.extend_from_slice(&meta.2.to_le_bytes());
        buf.push(meta.3);
        if pos8 {
            buf.extend_from_slice(&meta.4.to_le_bytes());
        } else {
            buf.extend_from_slice(&(meta.4 as u32).to_le_bytes());
        }
    }

    #[test]
    fn parses_v0x200_records() {
        let mut table = Vec::new();
        push_record(&mut table, b"data/a.txt", (5, 8, 5, 0x01, 0), false);
        push_record(&mut table, b"DATA/B.TXT", (5, 8, 5, 0x01, 8), false);
        let entries = parse_entries(&table, header::VERSION_0X200);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, b"data/a.txt");
        assert_eq!(entries[1].1.position, 8);
    }

    #[test]
    fn parses_v0x300_records_with_64bit_position() {
        let mut table = Vec::new();
        push_record(&mut table, b"x.dat", (4, 8, 4, 0x01, 0x1_0000_0000), true);
        let entries = parse_entries(&table, header::VERSION_0X300);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].1.position, 0x1_0000_0000);
    }

    #[test]
    fn empty_table_yields_no_entries() {
        assert!(parse_entries(&[], header::VERSION_0X200).is_empty());
    }

    #[test]
    fn structural_validity_rejects_misaligned_length() {
        let meta = EntryMeta { pack_size: 4, length_aligned: 9, real_size: 4, flags: 1, position: 0 };
        assert!(!meta.is_structurally_valid());
    }

    #[test]
    fn structural_validity_rejects_zero_real_size() {
        let meta = EntryMeta { pack_size: 4, length_aligned: 8, real_size: 0, flags: 1, position: 0 };
        assert!(!meta.is_structurally_valid());
    }

    #[test]
    fn parse_entries_drops_structurally_invalid_records() {
        let mut table = Vec::new();
        push_record(&mut table, b"good.txt", (4, 8, 4, 0x01, 0), false);
        push_record(&mut table, b"bad.txt", (4, 8, 0, 0x01, 8), false); // real_size = 0
        let entries = parse_entries(&table, header::VERSION_0X200);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, b"good.txt");
    }
}
