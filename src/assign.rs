// src/assign.rs
//
// Deterministic sharding of sources across worker nodes. Every node computes
// the same partition independently, so splitting the source set needs no
// coordination service, no locking and no leader election.

use sha2::{Digest, Sha256};

/// Stable partition point for a source identifier: the first 8 bytes of
/// SHA-256 over the UTF-8 identifier, read big-endian.
///
/// This value is part of the wire contract between nodes. A fleet may mix
/// binaries, languages and restarts, and all of them must agree on who owns
/// which source, so a language-default seeded hash is not usable here.
pub fn partition_point(source: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    let digest = hasher.finalize();
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

/// One worker's view of the fleet: `node_count` active workers, this one at
/// 0-based `node_index`. Owns a source iff the partition point lands on its
/// index.
#[derive(Debug, Clone, Copy)]
pub struct NodeAssigner {
    node_count: u32,
    node_index: u32,
}

impl NodeAssigner {
    pub fn new(node_count: u32, node_index: u32) -> anyhow::Result<Self> {
        if node_count == 0 {
            anyhow::bail!("node_count must be at least 1");
        }
        if node_index >= node_count {
            anyhow::bail!(
                "node_index {} out of range for node_count {}",
                node_index,
                node_count
            );
        }
        Ok(Self {
            node_count,
            node_index,
        })
    }

    /// Which node index a source belongs to, for the current fleet size.
    pub fn node_for(&self, source: &str) -> u32 {
        (partition_point(source) % u64::from(self.node_count)) as u32
    }

    pub fn owns(&self, source: &str) -> bool {
        self.node_for(source) == self.node_index
    }

    pub fn node_count(&self) -> u32 {
        self.node_count
    }

    pub fn node_index(&self) -> u32 {
        self.node_index
    }
}
