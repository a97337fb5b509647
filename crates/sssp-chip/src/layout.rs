// SPDX-License-Identifier: AGPL-3.0-only

//! Arena record layouts.
//!
//! Every reference stored in a record is a 32-bit physical address, with 0
//! meaning "absent". All fields are little-endian `u32`, so each record is a
//! flat block the accelerator can fetch with fixed-size bursts.
//!
//! ```text
//! Node (16 B)        Page (8 + 8·PAGE_EDGES B)     Heap slot (8 B)
//! ┌──────────────┐   ┌──────────────┐              ┌──────────────┐
//! │ parent       │   │ count        │              │ cost         │
//! │ cost         │   │ next page    │              │ node         │
//! │ first page   │   │ edge[0]      │──▶ target    └──────────────┘
//! │ visited      │   │ ...          │    cost
//! └──────────────┘   └──────────────┘
//! ```

/// Cost of a node that has not been reached.
pub const UNREACHED: u32 = u32::MAX;

/// Encoding of an absent reference.
pub const NULL_ADDRESS: u32 = 0;

/// Edges stored inline in one adjacency page.
pub const PAGE_EDGES: usize = 8;

/// Default bucket count of the chained ID index.
pub const HASH_BUCKETS: u32 = 1024;

/// Node record field offsets.
pub mod node {
    /// Parent node on the best known path.
    pub const PARENT: usize = 0;
    /// Best known cost.
    pub const COST: usize = 4;
    /// Head of the adjacency page chain.
    pub const FIRST_PAGE: usize = 8;
    /// Visited flag (0 or 1).
    pub const VISITED: usize = 12;
    /// Record size.
    pub const SIZE: usize = 16;
}

/// Edge field offsets (inline in a page).
pub mod edge {
    /// Target node.
    pub const TARGET: usize = 0;
    /// Edge cost.
    pub const COST: usize = 4;
    /// Edge size.
    pub const SIZE: usize = 8;
}

/// Adjacency page field offsets.
pub mod page {
    use super::{edge, PAGE_EDGES};

    /// Edges in use.
    pub const COUNT: usize = 0;
    /// Next page in the chain.
    pub const NEXT: usize = 4;
    /// First inline edge.
    pub const EDGES: usize = 8;
    /// Page size.
    pub const SIZE: usize = EDGES + PAGE_EDGES * edge::SIZE;
}

/// Frontier heap slot field offsets. Slot 0 is unused; the root is slot 1.
pub mod heap_slot {
    /// Queued cost.
    pub const COST: usize = 0;
    /// Queued node.
    pub const NODE: usize = 4;
    /// Slot size.
    pub const SIZE: usize = 8;
}

/// Chained ID index entry field offsets.
pub mod index_entry {
    /// External identifier.
    pub const ID: usize = 0;
    /// Node the identifier resolves to.
    pub const NODE: usize = 4;
    /// Next entry in the same bucket.
    pub const NEXT: usize = 8;
    /// Entry size.
    pub const SIZE: usize = 12;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_word_multiples() {
        for size in [node::SIZE, edge::SIZE, page::SIZE, heap_slot::SIZE, index_entry::SIZE] {
            assert_eq!(size % 4, 0);
        }
    }

    #[test]
    fn page_holds_header_plus_edges() {
        assert_eq!(page::SIZE, 8 + 8 * PAGE_EDGES);
    }

    #[test]
    fn sentinel_is_never_a_finite_sum_of_small_costs() {
        assert_eq!(UNREACHED, 0xffff_ffff);
        assert_ne!(NULL_ADDRESS, UNREACHED);
    }
}
