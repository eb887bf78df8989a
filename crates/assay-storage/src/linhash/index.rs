//! Dynamic linear-hash index over two heap files.
//!
//! Each bucket group owns exactly one primary block in the primary heap
//! file and an optional singly-linked chain of blocks in the overflow
//! heap file. The group directory, split state, and chain links are
//! persisted in a side meta file after every mutating operation.
//!
//! Growth and shrink are driven by the keyed density
//! `total_records / ((primary_blocks + overflow_blocks) * capacity)`:
//! exceeding `d_max` after an insert splits the group at the split
//! pointer; falling below `d_min` after a delete merges the last group
//! back into its split parent (never below the initial group count).

use crate::heap::{Block, HeapFile, OpenMode};
use crate::linhash::meta::LinHashMeta;
use assay_common::{AssayError, LinHashConfig, Record, Result};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

/// Non-negative string hash: the canonical 31-polynomial hash with the
/// sign bit cleared (the minimum-value edge maps to zero).
fn positive_hash(key: &str) -> u32 {
    let mut h: i32 = 0;
    for unit in key.encode_utf16() {
        h = h.wrapping_mul(31).wrapping_add(unit as i32);
    }
    (h & 0x7fff_ffff) as u32
}

/// Linear-hash index keyed by `Record::id`.
pub struct LinHashIndex<R: Record> {
    core: Mutex<LinHashCore<R>>,
}

struct LinHashCore<R: Record> {
    config: LinHashConfig,
    primary: HeapFile<R>,
    overflow: HeapFile<R>,
    meta_path: PathBuf,

    level: u32,
    split_ptr: u32,
    group_count: u32,
    total_records: u64,

    /// Primary heap-file block index per group. Primary blocks are
    /// never shared between groups.
    primary_block_of_group: Vec<u32>,
    /// First overflow block per group, if any.
    first_overflow_of_group: Vec<Option<u32>>,
    /// Chain successor per overflow block. Grows monotonically; entries
    /// for blocks truncated by a tail shrink stay `None`.
    overflow_next: Vec<Option<u32>>,
}

impl<R: Record> LinHashIndex<R> {
    /// Opens or creates an index at `base_path`.
    ///
    /// Files used: `<base>_lh_primary.dat`, `<base>_lh_overflow.dat`,
    /// `<base>_lhmeta.dat`. A missing or empty meta file initializes a
    /// fresh structure with `config.initial_group_count` empty primary
    /// blocks; a corrupt meta file refuses to open.
    pub fn open(
        base_path: impl AsRef<Path>,
        cluster_size: usize,
        config: LinHashConfig,
    ) -> Result<Self> {
        config.validate()?;

        let base = base_path.as_ref().display().to_string();
        let primary_path = PathBuf::from(format!("{}_lh_primary.dat", base));
        let overflow_path = PathBuf::from(format!("{}_lh_overflow.dat", base));
        let meta_path = PathBuf::from(format!("{}_lhmeta.dat", base));

        let primary = HeapFile::open(&primary_path, cluster_size, OpenMode::Strict)?;
        let overflow = HeapFile::open(&overflow_path, cluster_size, OpenMode::Strict)?;

        let mut core = LinHashCore {
            config,
            primary,
            overflow,
            meta_path,
            level: 0,
            split_ptr: 0,
            group_count: 0,
            total_records: 0,
            primary_block_of_group: Vec::new(),
            first_overflow_of_group: Vec::new(),
            overflow_next: Vec::new(),
        };

        let meta_len = std::fs::metadata(&core.meta_path).map(|m| m.len()).unwrap_or(0);
        if meta_len > 0 {
            core.load_meta()?;
        } else {
            core.init_new_structure()?;
            core.save_meta()?;
        }

        Ok(Self {
            core: Mutex::new(core),
        })
    }

    /// Number of live records in the index.
    pub fn total_records(&self) -> u64 {
        self.core.lock().total_records
    }

    /// Current doubling level.
    pub fn level(&self) -> u32 {
        self.core.lock().level
    }

    /// Index of the next group to split at this level.
    pub fn split_ptr(&self) -> u32 {
        self.core.lock().split_ptr
    }

    /// Number of live bucket groups.
    pub fn group_count(&self) -> u32 {
        self.core.lock().group_count
    }

    /// Current keyed density across both heap files.
    pub fn density(&self) -> f64 {
        self.core.lock().density()
    }

    /// Number of blocks in the primary heap file.
    pub fn primary_block_count(&self) -> u32 {
        self.core.lock().primary.block_count()
    }

    /// Number of blocks in the overflow heap file.
    pub fn overflow_block_count(&self) -> u32 {
        self.core.lock().overflow.block_count()
    }

    /// Inserts a record. Uniqueness of the key is not enforced here;
    /// that is the caller's contract.
    pub fn insert(&self, record: R) -> Result<()> {
        let mut core = self.core.lock();
        let group = core.group_of(record.id());
        core.insert_into_group(group, record)?;
        core.total_records += 1;

        core.try_split_if_needed()?;
        core.save_meta()
    }

    /// Looks up a record by key.
    pub fn find_by_id(&self, id: &str) -> Result<Option<R>> {
        if id.is_empty() {
            return Ok(None);
        }
        self.core.lock().find_by_id(id)
    }

    /// Rewrites the stored record whose key equals `updated.id()` in
    /// place (same block, same slot). Returns false if no such record
    /// exists; nothing is written in that case.
    pub fn edit_by_id(&self, updated: &R) -> Result<bool> {
        self.core.lock().edit_by_id(updated)
    }

    /// Deletes a record by key. After a successful removal the group's
    /// overflow chain is compacted, the overflow file tail-shrunk, and
    /// a merge performed if the density allows one.
    pub fn delete_by_id(&self, id: &str) -> Result<bool> {
        if id.is_empty() {
            return Ok(false);
        }

        let mut core = self.core.lock();
        let group = core.group_of(id);
        if group >= core.group_count {
            return Ok(false);
        }

        let (removed, unlinked) = core.delete_from_group(group, id)?;
        if !removed {
            return Ok(false);
        }
        core.total_records -= 1;

        let compacted = core.try_compact_overflow_after_delete(group)?;
        if unlinked || compacted {
            core.overflow.shrink_empty_tail()?;
        }

        core.try_merge_if_needed()?;
        core.save_meta()?;
        Ok(true)
    }

    /// All live records from both heap files, in file-scan order.
    /// The bulk-scan hook for callers that post-filter by other fields.
    pub fn all_records(&self) -> Result<Vec<R>> {
        let core = self.core.lock();
        let mut records = core.primary.all_records()?;
        records.extend(core.overflow.all_records()?);
        Ok(records)
    }

    /// Structural text dump: split-state counters followed by every
    /// group's primary block and overflow chain in order.
    pub fn dump_structure(&self) -> Result<String>
    where
        R: std::fmt::Display,
    {
        self.core.lock().dump_structure()
    }

    /// Persists the meta file. Heap-file handles close on drop.
    pub fn close(self) -> Result<()> {
        self.core.lock().save_meta()
    }
}

impl<R: Record> Drop for LinHashIndex<R> {
    fn drop(&mut self) {
        // Final snapshot; mutating operations have already persisted.
        let _ = self.core.lock().save_meta();
    }
}

impl<R: Record> LinHashCore<R> {
    // ===== setup and metadata =====

    /// Fresh structure: M empty groups, each with its own primary block.
    fn init_new_structure(&mut self) -> Result<()> {
        self.level = 0;
        self.split_ptr = 0;
        self.total_records = 0;
        self.group_count = self.config.initial_group_count;

        self.primary_block_of_group.clear();
        self.first_overflow_of_group.clear();
        self.overflow_next.clear();

        for _ in 0..self.config.initial_group_count {
            let block_index = self.primary.allocate_empty_block()?;
            self.primary_block_of_group.push(block_index);
            self.first_overflow_of_group.push(None);
        }

        // A leftover overflow file may already hold blocks.
        self.overflow_next
            .resize(self.overflow.block_count() as usize, None);
        Ok(())
    }

    fn load_meta(&mut self) -> Result<()> {
        let meta = LinHashMeta::read_from(&self.meta_path)?;

        if meta.initial_group_count != self.config.initial_group_count {
            return Err(AssayError::MetaCorrupted {
                path: self.meta_path.display().to_string(),
                reason: format!(
                    "initial group count mismatch: meta={}, requested={}",
                    meta.initial_group_count, self.config.initial_group_count
                ),
            });
        }

        self.level = meta.level;
        self.split_ptr = meta.split_ptr;
        self.group_count = meta.group_count;
        self.total_records = meta.total_records;
        self.primary_block_of_group = meta.primary_block_of_group;
        self.first_overflow_of_group = meta.first_overflow_of_group;
        self.overflow_next = meta.overflow_next;
        Ok(())
    }

    fn save_meta(&self) -> Result<()> {
        let meta = LinHashMeta {
            initial_group_count: self.config.initial_group_count,
            d_max: self.config.d_max,
            d_min: self.config.d_min,
            level: self.level,
            split_ptr: self.split_ptr,
            group_count: self.group_count,
            total_records: self.total_records,
            primary_block_of_group: self.primary_block_of_group.clone(),
            first_overflow_of_group: self.first_overflow_of_group.clone(),
            overflow_next: self.overflow_next.clone(),
        };
        meta.write_to(&self.meta_path)
    }

    // ===== keying =====

    /// Base group count at the current level: `M * 2^level`.
    fn base_group_count(&self) -> u32 {
        self.config.initial_group_count << self.level
    }

    /// Group index for a key: `h mod B`, re-hashed `mod 2B` for groups
    /// already split at this level.
    fn group_of(&self, id: &str) -> u32 {
        let h = positive_hash(id);
        let base = self.base_group_count();
        let mut group = h % base;
        if group < self.split_ptr {
            group = h % (base * 2);
        }
        group
    }

    fn density(&self) -> f64 {
        let capacity = self.primary.records_per_block() as u64;
        let blocks = self.primary.block_count() as u64 + self.overflow.block_count() as u64;
        let slots = blocks * capacity;
        if slots == 0 {
            return 0.0;
        }
        self.total_records as f64 / slots as f64
    }

    // ===== directory and chain bookkeeping =====

    /// Appends groups (with fresh primary blocks) until `group` exists.
    fn ensure_group_exists(&mut self, group: u32) -> Result<()> {
        while group >= self.group_count {
            let block_index = self.primary.allocate_empty_block()?;
            self.primary_block_of_group.push(block_index);
            self.first_overflow_of_group.push(None);
            self.group_count += 1;
        }
        Ok(())
    }

    fn overflow_next(&self, index: u32) -> Option<u32> {
        self.overflow_next.get(index as usize).copied().flatten()
    }

    fn set_overflow_next(&mut self, index: u32, next: Option<u32>) {
        let index = index as usize;
        if self.overflow_next.len() <= index {
            self.overflow_next.resize(index + 1, None);
        }
        self.overflow_next[index] = next;
    }

    /// Overflow block indices of a group's chain, in chain order.
    fn chain_of(&self, group: u32) -> Vec<u32> {
        let mut chain = Vec::new();
        let mut current = self.first_overflow_of_group[group as usize];
        while let Some(index) = current {
            chain.push(index);
            current = self.overflow_next(index);
        }
        chain
    }

    /// All live records of a group: primary block first, then the chain
    /// in order.
    fn collect_group_records(&mut self, group: u32) -> Result<Vec<R>> {
        let mut records = Vec::new();

        let primary_index = self.primary_block_of_group[group as usize];
        let primary_block = self.primary.read_block(primary_index)?;
        records.extend(primary_block.iter().map(|(_, r)| r.clone()));

        for index in self.chain_of(group) {
            let block = self.overflow.read_block(index)?;
            records.extend(block.iter().map(|(_, r)| r.clone()));
        }
        Ok(records)
    }

    /// Builds a block at `index` filled with as many records as fit.
    fn fill_block(index: u32, capacity: usize, records: &mut impl Iterator<Item = R>) -> Block<R> {
        let mut block = Block::new_empty(index, capacity);
        while !block.is_full() {
            match records.next() {
                Some(record) => {
                    block.insert(record);
                }
                None => break,
            }
        }
        block
    }

    // ===== core operations =====

    fn find_by_id(&mut self, id: &str) -> Result<Option<R>> {
        let group = self.group_of(id);
        if group >= self.group_count {
            return Ok(None);
        }

        let primary_index = self.primary_block_of_group[group as usize];
        let primary_block = self.primary.read_block(primary_index)?;
        if let Some(record) = primary_block.find_by_id(id) {
            return Ok(Some(record.clone()));
        }

        let mut current = self.first_overflow_of_group[group as usize];
        while let Some(index) = current {
            let block = self.overflow.read_block(index)?;
            if let Some(record) = block.find_by_id(id) {
                return Ok(Some(record.clone()));
            }
            current = self.overflow_next(index);
        }

        Ok(None)
    }

    fn edit_by_id(&mut self, updated: &R) -> Result<bool> {
        let id = updated.id();
        let group = self.group_of(id);
        if group >= self.group_count {
            return Ok(false);
        }

        let primary_index = self.primary_block_of_group[group as usize];
        let mut primary_block = self.primary.read_block(primary_index)?;
        if let Some(slot) = primary_block.slot_of_id(id) {
            primary_block.replace(slot, updated.clone());
            self.primary.write_block(primary_index, &primary_block)?;
            return Ok(true);
        }

        let mut current = self.first_overflow_of_group[group as usize];
        while let Some(index) = current {
            let mut block = self.overflow.read_block(index)?;
            if let Some(slot) = block.slot_of_id(id) {
                block.replace(slot, updated.clone());
                self.overflow.write_block(index, &block)?;
                return Ok(true);
            }
            current = self.overflow_next(index);
        }

        Ok(false)
    }

    /// Inserts into a group: primary block first, then the first
    /// non-full chain block, else a fresh overflow block linked at the
    /// chain tail.
    fn insert_into_group(&mut self, group: u32, record: R) -> Result<()> {
        self.ensure_group_exists(group)?;

        let primary_index = self.primary_block_of_group[group as usize];
        let mut primary_block = self.primary.read_block(primary_index)?;

        if !primary_block.is_full() {
            primary_block.insert(record);
            return self.primary.write_block(primary_index, &primary_block);
        }

        let first = self.first_overflow_of_group[group as usize];
        let Some(first) = first else {
            let new_index = self.overflow.allocate_empty_block()?;
            let mut new_block = self.overflow.read_block(new_index)?;
            new_block.insert(record);
            self.overflow.write_block(new_index, &new_block)?;

            self.first_overflow_of_group[group as usize] = Some(new_index);
            self.set_overflow_next(new_index, None);
            return Ok(());
        };

        let mut current = first;
        loop {
            let mut block = self.overflow.read_block(current)?;
            if !block.is_full() {
                block.insert(record);
                return self.overflow.write_block(current, &block);
            }
            match self.overflow_next(current) {
                Some(next) => current = next,
                None => {
                    let new_index = self.overflow.allocate_empty_block()?;
                    let mut new_block = self.overflow.read_block(new_index)?;
                    new_block.insert(record);
                    self.overflow.write_block(new_index, &new_block)?;

                    self.set_overflow_next(current, Some(new_index));
                    self.set_overflow_next(new_index, None);
                    return Ok(());
                }
            }
        }
    }

    /// Removes the key from a group. An overflow block emptied by the
    /// removal is unlinked from the chain.
    ///
    /// Returns `(removed, unlinked)`; `unlinked` reports a freed
    /// overflow block so the caller can tail-shrink the overflow file.
    fn delete_from_group(&mut self, group: u32, id: &str) -> Result<(bool, bool)> {
        let primary_index = self.primary_block_of_group[group as usize];
        let mut primary_block = self.primary.read_block(primary_index)?;

        if primary_block.delete_by_id(id) {
            self.primary.write_block(primary_index, &primary_block)?;
            return Ok((true, false));
        }

        let mut prev: Option<u32> = None;
        let mut current = self.first_overflow_of_group[group as usize];

        while let Some(index) = current {
            let mut block = self.overflow.read_block(index)?;
            if block.delete_by_id(id) {
                self.overflow.write_block(index, &block)?;

                let mut unlinked = false;
                if block.is_empty() {
                    let next = self.overflow_next(index);
                    match prev {
                        None => self.first_overflow_of_group[group as usize] = next,
                        Some(prev) => self.set_overflow_next(prev, next),
                    }
                    self.set_overflow_next(index, None);
                    unlinked = true;
                }
                return Ok((true, unlinked));
            }

            prev = Some(index);
            current = self.overflow_next(index);
        }

        Ok((false, false))
    }

    // ===== chain compaction after delete =====

    /// Re-packs a group's live records into its primary block and the
    /// minimum prefix of its existing chain. Blocks are only rewritten
    /// when at least one overflow block can be freed.
    ///
    /// Returns true if any overflow blocks were freed.
    fn try_compact_overflow_after_delete(&mut self, group: u32) -> Result<bool> {
        if group >= self.group_count {
            return Ok(false);
        }

        let chain = self.chain_of(group);
        if chain.is_empty() {
            self.first_overflow_of_group[group as usize] = None;
            return Ok(false);
        }

        let primary_index = self.primary_block_of_group[group as usize];
        let records = self.collect_group_records(group)?;

        let chain_len = chain.len();
        let live = records.len();
        let primary_cap = self.primary.records_per_block();
        let overflow_cap = self.overflow.records_per_block();

        // Nothing left in the group: empty every block and detach the chain.
        if live == 0 {
            let empty_primary = Block::new_empty(primary_index, primary_cap);
            self.primary.write_block(primary_index, &empty_primary)?;

            for &index in &chain {
                let empty = Block::new_empty(index, overflow_cap);
                self.overflow.write_block(index, &empty)?;
                self.set_overflow_next(index, None);
            }
            self.first_overflow_of_group[group as usize] = None;
            return Ok(chain_len > 0);
        }

        let needed = live.saturating_sub(primary_cap).div_ceil(overflow_cap);
        if needed >= chain_len {
            return Ok(false);
        }

        for &index in &chain {
            self.set_overflow_next(index, None);
        }

        let mut remaining = records.into_iter();

        let new_primary = Self::fill_block(primary_index, primary_cap, &mut remaining);
        self.primary.write_block(primary_index, &new_primary)?;

        let used = &chain[..needed];
        for (pos, &index) in used.iter().enumerate() {
            let block = Self::fill_block(index, overflow_cap, &mut remaining);
            self.overflow.write_block(index, &block)?;

            let next = used.get(pos + 1).copied();
            self.set_overflow_next(index, next);
        }
        self.first_overflow_of_group[group as usize] = used.first().copied();

        for &index in &chain[needed..] {
            let empty = Block::new_empty(index, overflow_cap);
            self.overflow.write_block(index, &empty)?;
            self.set_overflow_next(index, None);
        }

        Ok(true)
    }

    // ===== split and merge =====

    fn try_split_if_needed(&mut self) -> Result<()> {
        if self.density() <= self.config.d_max {
            return Ok(());
        }

        self.split_group(self.split_ptr)?;

        self.split_ptr += 1;
        if self.split_ptr >= self.base_group_count() {
            self.split_ptr = 0;
            self.level += 1;
        }
        Ok(())
    }

    /// Splits group `p` into `p` and `p + B`.
    ///
    /// Every block of the group (primary and chain) is read exactly
    /// once and written once in its final state. Chain blocks are
    /// recycled at their existing indices; surplus blocks are emptied
    /// and detached.
    fn split_group(&mut self, group: u32) -> Result<()> {
        let base = self.base_group_count();
        let sibling = group + base;

        self.ensure_group_exists(sibling)?;

        let primary_index = self.primary_block_of_group[group as usize];
        let sibling_primary_index = self.primary_block_of_group[sibling as usize];
        let primary_cap = self.primary.records_per_block();
        let overflow_cap = self.overflow.records_per_block();

        let mut chain = self.chain_of(group);
        let records = self.collect_group_records(group)?;

        if records.is_empty() {
            let empty_old = Block::new_empty(primary_index, primary_cap);
            self.primary.write_block(primary_index, &empty_old)?;
            let empty_new = Block::new_empty(sibling_primary_index, primary_cap);
            self.primary.write_block(sibling_primary_index, &empty_new)?;

            for &index in &chain {
                let empty = Block::new_empty(index, overflow_cap);
                self.overflow.write_block(index, &empty)?;
                self.set_overflow_next(index, None);
            }
            self.first_overflow_of_group[group as usize] = None;
            self.first_overflow_of_group[sibling as usize] = None;
            return Ok(());
        }

        // Partition by the doubled modulus.
        let doubled = base * 2;
        let mut stay = Vec::new();
        let mut moved = Vec::new();
        for record in records {
            if positive_hash(record.id()) % doubled == sibling {
                moved.push(record);
            } else {
                stay.push(record);
            }
        }

        let stay_needed = stay.len().saturating_sub(primary_cap).div_ceil(overflow_cap);
        let moved_needed = moved.len().saturating_sub(primary_cap).div_ceil(overflow_cap);

        // The existing chain normally suffices; allocate the difference
        // if both halves together need more blocks than it holds.
        while chain.len() < stay_needed + moved_needed {
            chain.push(self.overflow.allocate_empty_block()?);
        }

        let stay_chain: Vec<u32> = chain[..stay_needed].to_vec();
        let moved_chain: Vec<u32> = chain[stay_needed..stay_needed + moved_needed].to_vec();
        let leftover: Vec<u32> = chain[stay_needed + moved_needed..].to_vec();

        for &index in &chain {
            self.set_overflow_next(index, None);
        }

        let mut stay_records = stay.into_iter();
        let new_old_primary = Self::fill_block(primary_index, primary_cap, &mut stay_records);
        self.primary.write_block(primary_index, &new_old_primary)?;

        let mut moved_records = moved.into_iter();
        let new_sibling_primary =
            Self::fill_block(sibling_primary_index, primary_cap, &mut moved_records);
        self.primary
            .write_block(sibling_primary_index, &new_sibling_primary)?;

        self.rebuild_chain(group, &stay_chain, &mut stay_records)?;
        self.rebuild_chain(sibling, &moved_chain, &mut moved_records)?;

        for &index in &leftover {
            let empty = Block::new_empty(index, overflow_cap);
            self.overflow.write_block(index, &empty)?;
            self.set_overflow_next(index, None);
        }

        Ok(())
    }

    /// Fills and links a group's overflow chain from an iterator of
    /// leftover records.
    fn rebuild_chain(
        &mut self,
        group: u32,
        chain: &[u32],
        records: &mut impl Iterator<Item = R>,
    ) -> Result<()> {
        let overflow_cap = self.overflow.records_per_block();

        for (pos, &index) in chain.iter().enumerate() {
            let block = Self::fill_block(index, overflow_cap, records);
            self.overflow.write_block(index, &block)?;
            self.set_overflow_next(index, chain.get(pos + 1).copied());
        }
        self.first_overflow_of_group[group as usize] = chain.first().copied();
        Ok(())
    }

    fn try_merge_if_needed(&mut self) -> Result<()> {
        if self.density() >= self.config.d_min {
            return Ok(());
        }
        if self.group_count <= self.config.initial_group_count {
            return Ok(());
        }

        let base = self.base_group_count();
        if self.split_ptr > 0 {
            let to = self.split_ptr - 1;
            let from = to + base;
            self.merge_groups(from, to)?;
            self.split_ptr -= 1;
        } else if self.level > 0 {
            self.level -= 1;
            let halved = self.base_group_count();
            let to = halved - 1;
            let from = to + halved;
            self.merge_groups(from, to)?;
            self.split_ptr = halved - 1;
        }
        Ok(())
    }

    /// Merges the last group into its split parent and drops its
    /// directory entry.
    fn merge_groups(&mut self, from: u32, to: u32) -> Result<()> {
        if from >= self.group_count || to >= self.group_count {
            return Err(AssayError::Internal(format!(
                "merge groups out of range: from={}, to={}, groups={}",
                from, to, self.group_count
            )));
        }
        if from == to {
            return Ok(());
        }
        if from != self.group_count - 1 {
            return Err(AssayError::Internal(format!(
                "merge source {} is not the last group {}",
                from,
                self.group_count - 1
            )));
        }

        let to_move = self.collect_group_records(from)?;
        self.clear_group_blocks(from)?;

        for record in to_move {
            self.insert_into_group(to, record)?;
        }

        self.primary_block_of_group.remove(from as usize);
        self.first_overflow_of_group.remove(from as usize);
        self.group_count -= 1;

        // The merged-away group's primary block sits at the tail and is
        // no longer referenced; drop it without touching live groups.
        self.primary.shrink_empty_tail_to(self.group_count)?;
        Ok(())
    }

    /// Empties a group's primary block and every chain block, clearing
    /// the chain links. The blocks stay allocated.
    fn clear_group_blocks(&mut self, group: u32) -> Result<()> {
        let primary_index = self.primary_block_of_group[group as usize];
        let primary_cap = self.primary.records_per_block();
        let overflow_cap = self.overflow.records_per_block();

        let empty_primary = Block::new_empty(primary_index, primary_cap);
        self.primary.write_block(primary_index, &empty_primary)?;

        let mut current = self.first_overflow_of_group[group as usize];
        while let Some(index) = current {
            let empty = Block::new_empty(index, overflow_cap);
            self.overflow.write_block(index, &empty)?;

            let next = self.overflow_next(index);
            self.set_overflow_next(index, None);
            current = next;
        }

        self.first_overflow_of_group[group as usize] = None;
        Ok(())
    }

    // ===== debug =====

    fn dump_structure(&mut self) -> Result<String>
    where
        R: std::fmt::Display,
    {
        let mut out = String::new();
        out.push_str("LinHashIndex dump:\n");
        out.push_str(&format!(
            "M={}, level={}, split_ptr={}, group_count={}, total_records={}\n",
            self.config.initial_group_count,
            self.level,
            self.split_ptr,
            self.group_count,
            self.total_records
        ));
        out.push_str(&format!(
            "primary_blocks={}, overflow_blocks={}\n\n",
            self.primary.block_count(),
            self.overflow.block_count()
        ));

        for group in 0..self.group_count {
            let primary_index = self.primary_block_of_group[group as usize];
            let primary_block = self.primary.read_block(primary_index)?;

            out.push_str(&format!("Group {}:\n", group));
            out.push_str(&format!(
                "  primary_index={}, valid_count={}, capacity={}\n",
                primary_index,
                primary_block.valid_count(),
                primary_block.capacity()
            ));
            for slot in 0..primary_block.capacity() {
                match primary_block.get(slot) {
                    Some(record) => out.push_str(&format!("    [P {}] {}\n", slot, record)),
                    None => out.push_str(&format!("    [P {}] <empty>\n", slot)),
                }
            }

            match self.first_overflow_of_group[group as usize] {
                Some(first) => out.push_str(&format!("  first_overflow={}\n", first)),
                None => out.push_str("  first_overflow=none\n"),
            }

            let mut current = self.first_overflow_of_group[group as usize];
            let mut chain_pos = 0;
            while let Some(index) = current {
                let block = self.overflow.read_block(index)?;
                out.push_str(&format!(
                    "    Overflow #{} block_index={}, valid_count={}\n",
                    chain_pos,
                    index,
                    block.valid_count()
                ));
                for slot in 0..block.capacity() {
                    match block.get(slot) {
                        Some(record) => out.push_str(&format!("      [O {}] {}\n", slot, record)),
                        None => out.push_str(&format!("      [O {}] <empty>\n", slot)),
                    }
                }
                current = self.overflow_next(index);
                chain_pos += 1;
            }
            out.push('\n');
        }

        Ok(out)
    }
}
