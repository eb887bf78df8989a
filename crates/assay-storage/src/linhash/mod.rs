//! Linear hashing over two heap files.
//!
//! - `LinHashIndex`: the index operations (insert, find, edit, delete,
//!   split, merge, chain compaction)
//! - `meta`: the persisted directory and split-state snapshot

mod index;
mod meta;

pub use index::LinHashIndex;
pub use meta::{LinHashMeta, META_MAGIC, META_VERSION};
