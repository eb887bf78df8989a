//! Heap file: a sequence of fixed-size blocks on one file.
//!
//! The file is a concatenation of block images. In memory the heap file
//! keeps derived state (free and partially filled block lists, the live
//! record count) that is rebuilt from the on-disk block headers at open
//! and updated on every mutation. Every externally visible operation is
//! exclusive: the mutable core lives behind a mutex.

use super::block::Block;
use super::constants::{block_size_for, capacity_for, BLOCK_HEADER_SIZE};
use assay_common::{Address, AssayError, Record, Result};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// How to treat a file whose length is not a multiple of the block size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Truncate to the nearest block multiple and drop trailing empty
    /// blocks at open (standalone heap files).
    BestEffort,
    /// Refuse to open a torn file and never truncate at open. Used for
    /// index-owned heaps, where an empty block may still belong to a
    /// live bucket group.
    Strict,
}

/// Persistent collection of fixed-size records with stable addresses.
pub struct HeapFile<R: Record> {
    core: Mutex<HeapCore<R>>,
}

struct HeapCore<R: Record> {
    file: File,
    path: PathBuf,
    capacity: usize,
    block_size: usize,
    block_count: u32,
    /// Indices of fully empty blocks. Consumed by `insert` only, never
    /// by `allocate_empty_block`.
    free_blocks: Vec<u32>,
    /// Indices of partially filled blocks.
    partial_blocks: Vec<u32>,
    total_valid: u64,
    _record: PhantomData<R>,
}

impl<R: Record> HeapFile<R> {
    /// Opens or creates a heap file.
    ///
    /// `cluster_size` bounds the on-disk block size; the actual block
    /// size is `4 + capacity * (1 + R::SIZE)` for the largest capacity
    /// that fits.
    pub fn open(path: impl AsRef<Path>, cluster_size: usize, mode: OpenMode) -> Result<Self> {
        let capacity = capacity_for(cluster_size, R::SIZE);
        if capacity == 0 {
            return Err(AssayError::ClusterTooSmall {
                cluster: cluster_size,
                record: R::SIZE,
            });
        }
        let block_size = block_size_for(capacity, R::SIZE);

        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let len = file.metadata()?.len();
        let remainder = len % block_size as u64;
        if remainder != 0 {
            match mode {
                OpenMode::Strict => {
                    return Err(AssayError::HeapCorrupted {
                        path: path.display().to_string(),
                        reason: format!(
                            "length {} is not a multiple of block size {}",
                            len, block_size
                        ),
                    });
                }
                OpenMode::BestEffort => {
                    file.set_len(len - remainder)?;
                }
            }
        }

        let block_count = (file.metadata()?.len() / block_size as u64) as u32;

        let mut core = HeapCore {
            file,
            path,
            capacity,
            block_size,
            block_count,
            free_blocks: Vec::new(),
            partial_blocks: Vec::new(),
            total_valid: 0,
            _record: PhantomData,
        };
        core.rebuild_lists()?;
        if mode == OpenMode::BestEffort {
            core.shrink_empty_tail()?;
        }

        Ok(Self {
            core: Mutex::new(core),
        })
    }

    /// Number of blocks currently in the file.
    pub fn block_count(&self) -> u32 {
        self.core.lock().block_count
    }

    /// Number of record slots per block.
    pub fn records_per_block(&self) -> usize {
        self.core.lock().capacity
    }

    /// Total number of live records in the file.
    pub fn total_valid_records(&self) -> u64 {
        self.core.lock().total_valid
    }

    /// Inserts a record into the first partial block, else the first
    /// free block, else a freshly appended one. Returns its address.
    pub fn insert(&self, record: R) -> Result<Address> {
        self.core.lock().insert(record)
    }

    /// Inserts iff no record with the same id exists anywhere in the
    /// file; returns `DuplicateKey` otherwise.
    pub fn insert_unique(&self, record: R) -> Result<Address> {
        let mut core = self.core.lock();
        if core.exists_id(record.id())? {
            return Err(AssayError::DuplicateKey(record.id().to_string()));
        }
        core.insert(record)
    }

    /// Returns the record at the given address, or `None` for an empty
    /// slot or an out-of-range address.
    pub fn get(&self, address: Address) -> Result<Option<R>> {
        self.core.lock().get(address)
    }

    /// Clears the slot at the given address, then shrinks any trailing
    /// run of empty blocks. Returns true if a record was removed.
    pub fn delete(&self, address: Address) -> Result<bool> {
        self.core.lock().delete(address)
    }

    /// Whether a record with the given id exists anywhere in the file.
    pub fn exists_id(&self, id: &str) -> Result<bool> {
        self.core.lock().exists_id(id)
    }

    /// Addresses of all live records, in block-then-slot order.
    pub fn all_addresses(&self) -> Result<Vec<Address>> {
        self.core.lock().all_addresses()
    }

    /// All live records, in block-then-slot order.
    pub fn all_records(&self) -> Result<Vec<R>> {
        self.core.lock().all_records()
    }

    /// Reads a block for the index layer.
    pub fn read_block(&self, index: u32) -> Result<Block<R>> {
        self.core.lock().read_block(index)
    }

    /// Writes a block for the index layer, keeping the free/partial
    /// lists and the live record count exact.
    pub fn write_block(&self, index: u32, block: &Block<R>) -> Result<()> {
        self.core.lock().write_block(index, block)
    }

    /// Appends a new empty block at end-of-file and returns its index.
    ///
    /// This NEVER hands out a block from the free list: a bucket
    /// group's primary block may be temporarily empty and must not be
    /// re-assigned to another group. Only `insert` reuses free blocks.
    pub fn allocate_empty_block(&self) -> Result<u32> {
        self.core.lock().append_empty_block()
    }

    /// Truncates the maximal trailing run of empty blocks. If every
    /// block is empty, one block is kept.
    pub fn shrink_empty_tail(&self) -> Result<()> {
        self.core.lock().shrink_empty_tail()
    }

    /// Like `shrink_empty_tail`, but never truncates below
    /// `min_blocks`. The index uses this to drop a merged-away group's
    /// block while keeping every live group's (possibly empty) block.
    pub fn shrink_empty_tail_to(&self, min_blocks: u32) -> Result<()> {
        self.core.lock().shrink_tail_with_floor(min_blocks)
    }

    /// Structural text dump of the whole file.
    pub fn dump_debug_info(&self) -> Result<String>
    where
        R: std::fmt::Display,
    {
        self.core.lock().dump_debug_info()
    }
}

impl<R: Record> HeapCore<R> {
    fn block_offset(&self, index: u32) -> u64 {
        index as u64 * self.block_size as u64
    }

    fn check_index(&self, index: u32) -> Result<()> {
        if index >= self.block_count {
            return Err(AssayError::BlockOutOfRange {
                index,
                count: self.block_count,
            });
        }
        Ok(())
    }

    fn read_block(&mut self, index: u32) -> Result<Block<R>> {
        self.check_index(index)?;
        let mut buf = vec![0u8; self.block_size];
        self.file.seek(SeekFrom::Start(self.block_offset(index)))?;
        self.file.read_exact(&mut buf)?;
        Block::from_bytes(index, self.capacity, &buf)
    }

    /// Reads only a block's 4-byte header. An out-of-range count is
    /// clamped to zero (best-effort recovery).
    fn read_valid_count(&mut self, index: u32) -> Result<u32> {
        self.check_index(index)?;
        let mut buf = [0u8; BLOCK_HEADER_SIZE];
        self.file.seek(SeekFrom::Start(self.block_offset(index)))?;
        self.file.read_exact(&mut buf)?;
        let count = u32::from_le_bytes(buf);
        if count as usize > self.capacity {
            return Ok(0);
        }
        Ok(count)
    }

    fn write_block_raw(&mut self, block: &Block<R>) -> Result<()> {
        let data = block.to_bytes()?;
        if data.len() != self.block_size {
            return Err(AssayError::BlockSizeMismatch {
                expected: self.block_size,
                actual: data.len(),
            });
        }
        self.file
            .seek(SeekFrom::Start(self.block_offset(block.index())))?;
        self.file.write_all(&data)?;
        Ok(())
    }

    fn write_block(&mut self, index: u32, block: &Block<R>) -> Result<()> {
        if index != block.index() {
            return Err(AssayError::Internal(format!(
                "write_block index {} != block index {}",
                index,
                block.index()
            )));
        }
        self.check_index(index)?;

        let old_count = self.read_valid_count(index)? as u64;
        self.write_block_raw(block)?;
        self.update_lists(index, block);
        self.total_valid = self.total_valid - old_count + block.valid_count() as u64;
        Ok(())
    }

    /// Appends a new empty block at end-of-file.
    fn append_empty_block(&mut self) -> Result<u32> {
        let index = self.block_count;
        let block: Block<R> = Block::new_empty(index, self.capacity);
        self.write_block_raw(&block)?;
        self.block_count += 1;
        self.free_blocks.push(index);
        Ok(index)
    }

    /// Recomputes the free/partial lists and the live record count from
    /// the on-disk block headers.
    fn rebuild_lists(&mut self) -> Result<()> {
        self.free_blocks.clear();
        self.partial_blocks.clear();
        self.total_valid = 0;

        for index in 0..self.block_count {
            let count = self.read_valid_count(index)? as usize;
            self.total_valid += count as u64;

            if count == 0 {
                self.free_blocks.push(index);
            } else if count < self.capacity {
                self.partial_blocks.push(index);
            }
        }
        Ok(())
    }

    fn update_lists(&mut self, index: u32, block: &Block<R>) {
        self.free_blocks.retain(|&i| i != index);
        self.partial_blocks.retain(|&i| i != index);

        if block.is_empty() {
            self.free_blocks.push(index);
        } else if !block.is_full() {
            self.partial_blocks.push(index);
        }
    }

    fn insert(&mut self, record: R) -> Result<Address> {
        let index = if let Some(&i) = self.partial_blocks.first() {
            i
        } else if let Some(&i) = self.free_blocks.first() {
            i
        } else {
            self.append_empty_block()?
        };

        let mut block = self.read_block(index)?;
        let (index, block, slot) = match block.insert(record.clone()) {
            Some(slot) => (index, block, slot),
            None => {
                // The chosen block turned out full; fall back to a fresh one.
                let fresh = self.append_empty_block()?;
                let mut fresh_block = self.read_block(fresh)?;
                let slot = fresh_block.insert(record).ok_or_else(|| {
                    AssayError::Internal("cannot insert record even into a new block".to_string())
                })?;
                (fresh, fresh_block, slot)
            }
        };

        self.write_block_raw(&block)?;
        self.update_lists(index, &block);
        self.total_valid += 1;

        Ok(Address::new(index, slot as u32))
    }

    fn get(&mut self, address: Address) -> Result<Option<R>> {
        if address.block >= self.block_count || address.slot as usize >= self.capacity {
            return Ok(None);
        }
        let block = self.read_block(address.block)?;
        Ok(block.get(address.slot as usize).cloned())
    }

    fn delete(&mut self, address: Address) -> Result<bool> {
        if address.block >= self.block_count || address.slot as usize >= self.capacity {
            return Ok(false);
        }

        let mut block = self.read_block(address.block)?;
        if !block.delete(address.slot as usize) {
            return Ok(false);
        }

        self.write_block_raw(&block)?;
        self.update_lists(address.block, &block);
        self.total_valid -= 1;

        self.shrink_empty_tail()?;
        Ok(true)
    }

    fn exists_id(&mut self, id: &str) -> Result<bool> {
        if id.is_empty() {
            return Ok(false);
        }
        for index in 0..self.block_count {
            let block = self.read_block(index)?;
            if block.find_by_id(id).is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn all_addresses(&mut self) -> Result<Vec<Address>> {
        let mut result = Vec::new();
        for index in 0..self.block_count {
            let block = self.read_block(index)?;
            for (slot, _) in block.iter() {
                result.push(Address::new(index, slot as u32));
            }
        }
        Ok(result)
    }

    fn all_records(&mut self) -> Result<Vec<R>> {
        let mut result = Vec::new();
        for index in 0..self.block_count {
            let block = self.read_block(index)?;
            for (_, record) in block.iter() {
                result.push(record.clone());
            }
        }
        Ok(result)
    }

    /// Truncates the file past the last non-empty block in one
    /// `set_len` call, purging stale free/partial entries.
    fn shrink_empty_tail(&mut self) -> Result<()> {
        // Keep one block when every block is empty.
        self.shrink_tail_with_floor(1)
    }

    fn shrink_tail_with_floor(&mut self, floor: u32) -> Result<()> {
        if self.block_count == 0 {
            return Ok(());
        }

        let mut last_non_empty: Option<u32> = None;
        for index in (0..self.block_count).rev() {
            if self.read_valid_count(index)? > 0 {
                last_non_empty = Some(index);
                break;
            }
        }

        if last_non_empty == Some(self.block_count - 1) {
            return Ok(());
        }

        let new_count = last_non_empty
            .map(|i| i + 1)
            .unwrap_or(0)
            .max(floor.max(1).min(self.block_count));
        if new_count == self.block_count {
            return Ok(());
        }

        self.file
            .set_len(new_count as u64 * self.block_size as u64)?;
        self.free_blocks.retain(|&i| i < new_count);
        self.partial_blocks.retain(|&i| i < new_count);
        self.block_count = new_count;
        Ok(())
    }

    fn dump_debug_info(&mut self) -> Result<String>
    where
        R: std::fmt::Display,
    {
        let mut out = String::new();
        out.push_str("HeapFile dump:\n");
        out.push_str(&format!("  path={}\n", self.path.display()));
        out.push_str(&format!("  block_size={}\n", self.block_size));
        out.push_str(&format!("  record_size={}\n", R::SIZE));
        out.push_str(&format!("  records_per_block={}\n", self.capacity));
        out.push_str(&format!("  block_count={}\n", self.block_count));
        out.push_str(&format!("  total_valid_records={}\n", self.total_valid));
        out.push_str(&format!("  free_blocks={:?}\n", self.free_blocks));
        out.push_str(&format!("  partial_blocks={:?}\n\n", self.partial_blocks));

        for index in 0..self.block_count {
            let block = self.read_block(index)?;
            out.push_str(&block.debug_string());
            out.push('\n');
        }
        Ok(out)
    }
}
