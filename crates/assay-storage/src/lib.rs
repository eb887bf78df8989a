//! Storage engine for AssayDB.
//!
//! This crate provides:
//! - Fixed-size record blocks and heap files with free-space tracking
//! - A dynamic linear-hash index over a primary and an overflow heap file
//! - The persisted index meta file
//! - Best-effort numeric ID counters for the domain layer

mod counter;
mod heap;
mod linhash;

pub use counter::IdCounter;
pub use heap::{constants, Block, HeapFile, OpenMode};
pub use linhash::{LinHashIndex, LinHashMeta, META_MAGIC, META_VERSION};
