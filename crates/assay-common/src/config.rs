//! Configuration structures for AssayDB.

use serde::{Deserialize, Serialize};

/// Default cluster (block) size in bytes.
pub const DEFAULT_CLUSTER_SIZE: usize = 256;

/// Tuning parameters for the linear-hash index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinHashConfig {
    /// Initial number of bucket groups M. The index never merges below
    /// this count.
    pub initial_group_count: u32,
    /// Upper density threshold; exceeding it after an insert triggers a
    /// bucket split.
    pub d_max: f64,
    /// Lower density threshold; falling below it after a delete triggers
    /// a merge (while more than `initial_group_count` groups exist).
    pub d_min: f64,
}

impl Default for LinHashConfig {
    fn default() -> Self {
        Self {
            initial_group_count: 4,
            d_max: 0.75,
            d_min: 0.40,
        }
    }
}

impl LinHashConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if self.initial_group_count == 0 {
            return Err(crate::AssayError::InvalidParameter {
                name: "initial_group_count".to_string(),
                value: self.initial_group_count.to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.d_max) || !(0.0..=1.0).contains(&self.d_min) {
            return Err(crate::AssayError::InvalidParameter {
                name: "d_max/d_min".to_string(),
                value: format!("{}/{}", self.d_max, self.d_min),
            });
        }
        if self.d_min >= self.d_max {
            return Err(crate::AssayError::InvalidParameter {
                name: "d_min".to_string(),
                value: self.d_min.to_string(),
            });
        }
        Ok(())
    }
}
