//! Persistent metadata of the linear-hash index.
//!
//! Stored next to the two heap files, read once at open, rewritten
//! after every mutating operation and on close. Layout (little-endian):
//!
//! ```text
//! u32  magic                  u32  level
//! u32  version                u32  split_ptr
//! u32  initial_group_count    u32  group_count
//! f64  d_max                  u64  total_records
//! f64  d_min
//! u32  len_P, u32 primary_block_of_group[len_P]
//! u32  len_F, i32 first_overflow_of_group[len_F]   (-1 = none)
//! u32  len_O, i32 overflow_next[len_O]             (-1 = none)
//! ```

use assay_common::{AssayError, Result};
use bytes::{Buf, BufMut};
use std::path::Path;

/// Magic constant identifying the meta-file format ("LHM1").
pub const META_MAGIC: u32 = 0x4C48_4D31;

/// Current meta-file format version.
pub const META_VERSION: u32 = 1;

/// Snapshot of the index's directory and split state.
#[derive(Debug, Clone, PartialEq)]
pub struct LinHashMeta {
    pub initial_group_count: u32,
    pub d_max: f64,
    pub d_min: f64,
    pub level: u32,
    pub split_ptr: u32,
    pub group_count: u32,
    pub total_records: u64,
    /// Primary heap-file block index per group.
    pub primary_block_of_group: Vec<u32>,
    /// First overflow block per group, if any.
    pub first_overflow_of_group: Vec<Option<u32>>,
    /// Chain successor per overflow block, if any. Grows monotonically;
    /// entries for truncated tail blocks stay `None`.
    pub overflow_next: Vec<Option<u32>>,
}

fn put_opt(buf: &mut impl BufMut, value: Option<u32>) {
    match value {
        Some(v) => buf.put_i32_le(v as i32),
        None => buf.put_i32_le(-1),
    }
}

fn get_opt(buf: &mut impl Buf) -> Option<u32> {
    let v = buf.get_i32_le();
    if v < 0 {
        None
    } else {
        Some(v as u32)
    }
}

impl LinHashMeta {
    /// Serializes the meta snapshot.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.put_u32_le(META_MAGIC);
        buf.put_u32_le(META_VERSION);

        buf.put_u32_le(self.initial_group_count);
        buf.put_f64_le(self.d_max);
        buf.put_f64_le(self.d_min);

        buf.put_u32_le(self.level);
        buf.put_u32_le(self.split_ptr);
        buf.put_u32_le(self.group_count);
        buf.put_u64_le(self.total_records);

        buf.put_u32_le(self.primary_block_of_group.len() as u32);
        for &index in &self.primary_block_of_group {
            buf.put_u32_le(index);
        }

        buf.put_u32_le(self.first_overflow_of_group.len() as u32);
        for &entry in &self.first_overflow_of_group {
            put_opt(&mut buf, entry);
        }

        buf.put_u32_le(self.overflow_next.len() as u32);
        for &entry in &self.overflow_next {
            put_opt(&mut buf, entry);
        }

        buf
    }

    /// Deserializes and validates a meta snapshot. `path` is only used
    /// in error messages.
    pub fn decode(data: &[u8], path: &Path) -> Result<Self> {
        let corrupt = |reason: &str| AssayError::MetaCorrupted {
            path: path.display().to_string(),
            reason: reason.to_string(),
        };

        let mut buf = data;
        // Fixed-size prefix through total_records.
        if buf.remaining() < 48 {
            return Err(corrupt("truncated header"));
        }

        let magic = buf.get_u32_le();
        if magic != META_MAGIC {
            return Err(corrupt("bad magic"));
        }
        let version = buf.get_u32_le();
        if version != META_VERSION {
            return Err(corrupt(&format!("unsupported version {}", version)));
        }

        let initial_group_count = buf.get_u32_le();
        let d_max = buf.get_f64_le();
        let d_min = buf.get_f64_le();

        let level = buf.get_u32_le();
        let split_ptr = buf.get_u32_le();
        let group_count = buf.get_u32_le();
        let total_records = buf.get_u64_le();

        let read_len = |buf: &mut &[u8]| -> Result<usize> {
            if buf.remaining() < 4 {
                return Err(corrupt("truncated array length"));
            }
            Ok(buf.get_u32_le() as usize)
        };

        let len_p = read_len(&mut buf)?;
        if buf.remaining() < len_p * 4 {
            return Err(corrupt("truncated primary block table"));
        }
        let mut primary_block_of_group = Vec::with_capacity(len_p);
        for _ in 0..len_p {
            primary_block_of_group.push(buf.get_u32_le());
        }

        let len_f = read_len(&mut buf)?;
        if buf.remaining() < len_f * 4 {
            return Err(corrupt("truncated overflow head table"));
        }
        let mut first_overflow_of_group = Vec::with_capacity(len_f);
        for _ in 0..len_f {
            first_overflow_of_group.push(get_opt(&mut buf));
        }

        let len_o = read_len(&mut buf)?;
        if buf.remaining() < len_o * 4 {
            return Err(corrupt("truncated overflow chain table"));
        }
        let mut overflow_next = Vec::with_capacity(len_o);
        for _ in 0..len_o {
            overflow_next.push(get_opt(&mut buf));
        }

        if len_p as u32 != group_count || len_f as u32 != group_count {
            return Err(corrupt(&format!(
                "directory length mismatch: groups={}, primaries={}, overflow heads={}",
                group_count, len_p, len_f
            )));
        }

        Ok(Self {
            initial_group_count,
            d_max,
            d_min,
            level,
            split_ptr,
            group_count,
            total_records,
            primary_block_of_group,
            first_overflow_of_group,
            overflow_next,
        })
    }

    /// Reads and validates the meta file at `path`.
    pub fn read_from(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::decode(&data, path)
    }

    /// Writes the meta snapshot to `path`, replacing any previous
    /// content.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.encode())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sample_meta() -> LinHashMeta {
        LinHashMeta {
            initial_group_count: 4,
            d_max: 0.75,
            d_min: 0.40,
            level: 1,
            split_ptr: 2,
            group_count: 5,
            total_records: 123,
            primary_block_of_group: vec![0, 1, 2, 3, 4],
            first_overflow_of_group: vec![None, Some(0), None, Some(2), None],
            overflow_next: vec![Some(1), None, None],
        }
    }

    fn meta_path() -> PathBuf {
        PathBuf::from("index_lhmeta.dat")
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let meta = sample_meta();
        let decoded = LinHashMeta::decode(&meta.encode(), &meta_path()).unwrap();
        assert_eq!(decoded, meta);
    }

    #[test]
    fn test_roundtrip_empty_tables() {
        let meta = LinHashMeta {
            initial_group_count: 4,
            d_max: 0.75,
            d_min: 0.40,
            level: 0,
            split_ptr: 0,
            group_count: 0,
            total_records: 0,
            primary_block_of_group: vec![],
            first_overflow_of_group: vec![],
            overflow_next: vec![],
        };
        let decoded = LinHashMeta::decode(&meta.encode(), &meta_path()).unwrap();
        assert_eq!(decoded, meta);
    }

    #[test]
    fn test_decode_rejects_bad_magic() {
        let mut data = sample_meta().encode();
        data[0] ^= 0xFF;
        let result = LinHashMeta::decode(&data, &meta_path());
        assert!(matches!(result, Err(AssayError::MetaCorrupted { .. })));
    }

    #[test]
    fn test_decode_rejects_bad_version() {
        let mut data = sample_meta().encode();
        data[4..8].copy_from_slice(&9u32.to_le_bytes());
        let result = LinHashMeta::decode(&data, &meta_path());
        assert!(matches!(result, Err(AssayError::MetaCorrupted { .. })));
    }

    #[test]
    fn test_decode_rejects_truncation() {
        let data = sample_meta().encode();
        for cut in [0, 10, 47, data.len() - 1] {
            let result = LinHashMeta::decode(&data[..cut], &meta_path());
            assert!(result.is_err(), "cut at {} should fail", cut);
        }
    }

    #[test]
    fn test_decode_rejects_directory_length_mismatch() {
        let mut meta = sample_meta();
        meta.group_count = 4; // tables still hold 5 entries
        let result = LinHashMeta::decode(&meta.encode(), &meta_path());
        assert!(matches!(result, Err(AssayError::MetaCorrupted { .. })));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index_lhmeta.dat");

        let meta = sample_meta();
        meta.write_to(&path).unwrap();
        let read_back = LinHashMeta::read_from(&path).unwrap();
        assert_eq!(read_back, meta);
    }

    #[test]
    fn test_read_missing_file_is_io_error() {
        let result = LinHashMeta::read_from(Path::new("/nonexistent/lhmeta.dat"));
        assert!(matches!(result, Err(AssayError::Io(_))));
    }
}
