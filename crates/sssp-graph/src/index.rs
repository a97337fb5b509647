// SPDX-License-Identifier: AGPL-3.0-only

//! External id → node lookup
//!
//! Two strategies live behind [`IdIndex`]:
//!
//! - [`HashedIndex`]: fixed bucket table (`id % buckets`) with chains of
//!   entries taken from a pre-sized slab, newest first. Suits sparse ids.
//! - [`DenseIndex`]: a flat `id → node` table covering `0..=max_id`. Suits
//!   small contiguous ids and is what a bare-metal loader writes directly.
//!
//! Both keep their tables in the arena.

use crate::error::{GraphError, Result};
use crate::records::{IndexEntry, NodeRef};
use crate::store::reserve;
use sssp_chip::layout::{index_entry, HASH_BUCKETS, NULL_ADDRESS};
use sssp_driver::{Arena, PhysicalMemory};
use std::fmt::Debug;

/// Lookup/insert capability over an arena-resident table
pub trait IdIndex: Debug + Send {
    /// Node registered for `id`, if any
    ///
    /// # Errors
    ///
    /// Returns error if the table cannot be read or a chain is corrupt.
    fn lookup(&self, arena: &Arena, id: u32) -> Result<Option<NodeRef>>;

    /// Register `node` for `id`. The caller guarantees `id` is not present.
    ///
    /// # Errors
    ///
    /// Returns error if the table has no room for `id`.
    fn insert(&mut self, arena: &mut Arena, id: u32, node: NodeRef) -> Result<()>;

    /// Strategy in use
    fn strategy(&self) -> IndexStrategy;
}

/// Index strategy selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStrategy {
    /// Chained hash table
    Hashed {
        /// Bucket count, independent of graph size
        buckets: u32,
    },

    /// Direct table over `0..=max_id`
    Dense {
        /// Largest accepted id
        max_id: u32,
    },
}

impl Default for IndexStrategy {
    fn default() -> Self {
        Self::Hashed {
            buckets: HASH_BUCKETS,
        }
    }
}

impl std::fmt::Display for IndexStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hashed { buckets } => write!(f, "hashed ({buckets} buckets)"),
            Self::Dense { max_id } => write!(f, "dense (ids 0..={max_id})"),
        }
    }
}

/// Build the index for `strategy`, sized for `node_bound` nodes
///
/// # Errors
///
/// Returns error if the configuration is unusable or the arena is too small.
pub fn build_index(
    arena: &mut Arena,
    strategy: IndexStrategy,
    node_bound: u32,
) -> Result<Box<dyn IdIndex>> {
    match strategy {
        IndexStrategy::Hashed { buckets } => {
            Ok(Box::new(HashedIndex::new(arena, buckets, node_bound)?))
        }
        IndexStrategy::Dense { max_id } => Ok(Box::new(DenseIndex::new(arena, max_id)?)),
    }
}

/// Chained hash index
#[derive(Debug)]
pub struct HashedIndex {
    buckets_base: u32,
    buckets: u32,
    entries_base: u32,
    entry_capacity: u32,
    entries_used: u32,
}

impl HashedIndex {
    /// Reserve `buckets` heads and `entry_capacity` entries
    ///
    /// # Errors
    ///
    /// Returns error if `buckets` is zero or the arena is too small.
    pub fn new(arena: &mut Arena, buckets: u32, entry_capacity: u32) -> Result<Self> {
        if buckets == 0 {
            return Err(GraphError::invalid_config("hash index needs at least one bucket"));
        }
        let buckets_base = reserve(arena, buckets as usize * 4)?;
        let entries_base = reserve(arena, entry_capacity.max(1) as usize * index_entry::SIZE)?;
        Ok(Self {
            buckets_base,
            buckets,
            entries_base,
            entry_capacity,
            entries_used: 0,
        })
    }

    fn bucket_address(&self, id: u32) -> u32 {
        self.buckets_base + (id % self.buckets) * 4
    }
}

impl IdIndex for HashedIndex {
    fn lookup(&self, arena: &Arena, id: u32) -> Result<Option<NodeRef>> {
        let mut entry: u32 = arena.load(self.bucket_address(id))?;
        let mut hops = 0;
        while entry != NULL_ADDRESS {
            if hops > self.entries_used {
                return Err(GraphError::corrupt(entry, "index chain does not terminate"));
            }
            let record: IndexEntry = arena.load(entry)?;
            if record.id == id {
                return Ok(NodeRef::from_raw(record.node));
            }
            entry = record.next;
            hops += 1;
        }
        Ok(None)
    }

    fn insert(&mut self, arena: &mut Arena, id: u32, node: NodeRef) -> Result<()> {
        if self.entries_used == self.entry_capacity {
            return Err(GraphError::bounds_exceeded("index entries", self.entry_capacity));
        }
        let bucket = self.bucket_address(id);
        let entry = self.entries_base + self.entries_used * index_entry::SIZE as u32;
        let head: u32 = arena.load(bucket)?;
        arena.store(
            entry,
            &IndexEntry {
                id,
                node: node.address(),
                next: head,
            },
        )?;
        arena.store(bucket, &entry)?;
        self.entries_used += 1;
        Ok(())
    }

    fn strategy(&self) -> IndexStrategy {
        IndexStrategy::Hashed {
            buckets: self.buckets,
        }
    }
}

/// Direct-indexed table
#[derive(Debug)]
pub struct DenseIndex {
    table_base: u32,
    max_id: u32,
}

impl DenseIndex {
    /// Reserve a table for ids `0..=max_id`
    ///
    /// # Errors
    ///
    /// Returns error if the arena is too small.
    pub fn new(arena: &mut Arena, max_id: u32) -> Result<Self> {
        let entries = max_id as usize + 1;
        let table_base = reserve(arena, entries * 4)?;
        Ok(Self { table_base, max_id })
    }

    fn slot_address(&self, id: u32) -> u32 {
        self.table_base + id * 4
    }
}

impl IdIndex for DenseIndex {
    fn lookup(&self, arena: &Arena, id: u32) -> Result<Option<NodeRef>> {
        if id > self.max_id {
            return Ok(None);
        }
        let node: u32 = arena.load(self.slot_address(id))?;
        Ok(NodeRef::from_raw(node))
    }

    fn insert(&mut self, arena: &mut Arena, id: u32, node: NodeRef) -> Result<()> {
        if id > self.max_id {
            return Err(GraphError::IdOutOfRange {
                id,
                limit: self.max_id,
            });
        }
        arena.store(self.slot_address(id), &node.address())?;
        Ok(())
    }

    fn strategy(&self) -> IndexStrategy {
        IndexStrategy::Dense {
            max_id: self.max_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sssp_driver::ArenaConfig;

    fn arena() -> Arena {
        Arena::open(&ArenaConfig::default()).expect("arena")
    }

    fn node(n: u32) -> NodeRef {
        NodeRef::from_raw(0x3000_0000 + n * 16).expect("non-zero")
    }

    #[test]
    fn hashed_chains_colliding_ids() {
        let mut arena = arena();
        let mut index = HashedIndex::new(&mut arena, 4, 8).expect("index");
        // 1, 5 and 9 share bucket 1
        for id in [1, 5, 9] {
            index.insert(&mut arena, id, node(id)).expect("insert");
        }
        for id in [1, 5, 9] {
            assert_eq!(index.lookup(&arena, id).expect("lookup"), Some(node(id)));
        }
        assert_eq!(index.lookup(&arena, 13).expect("lookup"), None);
        assert_eq!(index.lookup(&arena, 2).expect("lookup"), None);
    }

    #[test]
    fn hashed_entry_slab_is_bounded() {
        let mut arena = arena();
        let mut index = HashedIndex::new(&mut arena, 16, 1).expect("index");
        index.insert(&mut arena, 10, node(10)).expect("insert");
        let err = index.insert(&mut arena, 11, node(11)).expect_err("slab full");
        assert!(matches!(err, GraphError::BoundsExceeded { .. }));
    }

    #[test]
    fn zero_buckets_rejected() {
        let mut arena = arena();
        let err = HashedIndex::new(&mut arena, 0, 4).expect_err("no buckets");
        assert!(matches!(err, GraphError::InvalidConfig { .. }));
    }

    #[test]
    fn dense_covers_inclusive_range() {
        let mut arena = arena();
        let mut index = DenseIndex::new(&mut arena, 10).expect("index");
        index.insert(&mut arena, 0, node(1)).expect("id 0");
        index.insert(&mut arena, 10, node(2)).expect("id 10");
        assert_eq!(index.lookup(&arena, 0).expect("lookup"), Some(node(1)));
        assert_eq!(index.lookup(&arena, 10).expect("lookup"), Some(node(2)));
        assert_eq!(index.lookup(&arena, 5).expect("lookup"), None);
        assert_eq!(index.lookup(&arena, 11).expect("lookup"), None);
        let err = index.insert(&mut arena, 11, node(3)).expect_err("out of range");
        assert!(matches!(err, GraphError::IdOutOfRange { id: 11, limit: 10 }));
    }

    #[test]
    fn build_index_follows_strategy() {
        let mut arena = arena();
        let hashed = build_index(&mut arena, IndexStrategy::default(), 16).expect("hashed");
        assert_eq!(hashed.strategy(), IndexStrategy::Hashed { buckets: HASH_BUCKETS });
        let dense = build_index(&mut arena, IndexStrategy::Dense { max_id: 99 }, 16).expect("dense");
        assert_eq!(dense.strategy(), IndexStrategy::Dense { max_id: 99 });
    }
}
