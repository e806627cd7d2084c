//! FILENAME: core/engine/src/config.rs
//! PURPOSE: Tunables of the batch resolver.

use serde::{Deserialize, Serialize};

/// Missing fields take their default when deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Resolve batch indices on the rayon thread pool.
    pub parallel: bool,
    /// Smallest batch worth fanning out; smaller ones run sequentially.
    pub parallel_min_batch: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            parallel: true,
            parallel_min_batch: 2,
        }
    }
}

impl ResolverConfig {
    /// Default settings with the thread pool turned off.
    pub fn sequential() -> Self {
        ResolverConfig {
            parallel: false,
            ..ResolverConfig::default()
        }
    }

    /// Whether a batch of `size` indices should be resolved in parallel.
    pub fn use_parallel(&self, size: usize) -> bool {
        self.parallel && size >= self.parallel_min_batch
    }
}
