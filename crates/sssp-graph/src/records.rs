// SPDX-License-Identifier: AGPL-3.0-only

//! Arena record types
//!
//! Host-side mirrors of the layouts in [`sssp_chip::layout`]. The
//! assertions below pin each struct to the byte layout the accelerator
//! walks, so a field reorder fails the build rather than the hardware.

use bytemuck::{Pod, Zeroable};
use sssp_chip::layout::{self, NULL_ADDRESS, PAGE_EDGES, UNREACHED};
use std::num::NonZeroU32;

/// Reference to a node record: its non-zero physical address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeRef(NonZeroU32);

impl NodeRef {
    /// Decode a stored reference; 0 means absent
    pub const fn from_raw(address: u32) -> Option<Self> {
        match NonZeroU32::new(address) {
            Some(address) => Some(Self(address)),
            None => None,
        }
    }

    /// Physical address of the record
    pub const fn address(self) -> u32 {
        self.0.get()
    }

    /// Encode an optional reference for storage
    pub const fn to_raw(node: Option<Self>) -> u32 {
        match node {
            Some(node) => node.address(),
            None => NULL_ADDRESS,
        }
    }
}

impl std::fmt::Display for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node@{:#010x}", self.0)
    }
}

/// Reference to an adjacency page: its non-zero physical address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageRef(NonZeroU32);

impl PageRef {
    /// Decode a stored reference; 0 means absent
    pub const fn from_raw(address: u32) -> Option<Self> {
        match NonZeroU32::new(address) {
            Some(address) => Some(Self(address)),
            None => None,
        }
    }

    /// Physical address of the page
    pub const fn address(self) -> u32 {
        self.0.get()
    }
}

/// Node record
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct NodeRecord {
    /// Predecessor on the best known path (0 = none)
    pub parent: u32,
    /// Best known cost ([`UNREACHED`] until relaxed)
    pub cost: u32,
    /// First adjacency page (0 = no outgoing edges)
    pub first_page: u32,
    /// 1 once settled
    pub visited: u32,
}

impl NodeRecord {
    /// Freshly created node: unreached, unvisited, no parent, no edges
    pub const fn unreached() -> Self {
        Self {
            parent: NULL_ADDRESS,
            cost: UNREACHED,
            first_page: NULL_ADDRESS,
            visited: 0,
        }
    }

    /// Same node with search state cleared and edges kept
    #[must_use]
    pub const fn reset(self) -> Self {
        Self {
            first_page: self.first_page,
            ..Self::unreached()
        }
    }

    /// Settled flag
    pub const fn is_visited(&self) -> bool {
        self.visited != 0
    }

    /// Parent reference
    pub const fn parent(&self) -> Option<NodeRef> {
        NodeRef::from_raw(self.parent)
    }

    /// First adjacency page
    pub const fn first_page(&self) -> Option<PageRef> {
        PageRef::from_raw(self.first_page)
    }
}

/// Edge stored inline in a page
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct EdgeRecord {
    /// Target node address
    pub target: u32,
    /// Edge cost
    pub cost: u32,
}

/// Fixed-capacity adjacency page
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct PageRecord {
    /// Edges in use
    pub count: u32,
    /// Next page (0 = tail)
    pub next: u32,
    /// Inline edges; only the first `count` are meaningful
    pub edges: [EdgeRecord; PAGE_EDGES],
}

impl PageRecord {
    /// Whether no more edges fit
    pub const fn is_full(&self) -> bool {
        self.count as usize >= PAGE_EDGES
    }

    /// Next page in the chain
    pub const fn next(&self) -> Option<PageRef> {
        PageRef::from_raw(self.next)
    }
}

/// Frontier heap slot
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct HeapSlot {
    /// Queued cost
    pub cost: u32,
    /// Queued node address
    pub node: u32,
}

/// Chained index entry
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct IndexEntry {
    /// External identifier
    pub id: u32,
    /// Node address
    pub node: u32,
    /// Next entry in the bucket (0 = end)
    pub next: u32,
}

// ── Layout agreement with the accelerator ────────────────────────────────────

const _: () = {
    use std::mem::{offset_of, size_of};

    assert!(size_of::<NodeRecord>() == layout::node::SIZE);
    assert!(offset_of!(NodeRecord, parent) == layout::node::PARENT);
    assert!(offset_of!(NodeRecord, cost) == layout::node::COST);
    assert!(offset_of!(NodeRecord, first_page) == layout::node::FIRST_PAGE);
    assert!(offset_of!(NodeRecord, visited) == layout::node::VISITED);

    assert!(size_of::<EdgeRecord>() == layout::edge::SIZE);
    assert!(offset_of!(EdgeRecord, target) == layout::edge::TARGET);
    assert!(offset_of!(EdgeRecord, cost) == layout::edge::COST);

    assert!(size_of::<PageRecord>() == layout::page::SIZE);
    assert!(offset_of!(PageRecord, count) == layout::page::COUNT);
    assert!(offset_of!(PageRecord, next) == layout::page::NEXT);
    assert!(offset_of!(PageRecord, edges) == layout::page::EDGES);

    assert!(size_of::<HeapSlot>() == layout::heap_slot::SIZE);
    assert!(offset_of!(HeapSlot, cost) == layout::heap_slot::COST);
    assert!(offset_of!(HeapSlot, node) == layout::heap_slot::NODE);

    assert!(size_of::<IndexEntry>() == layout::index_entry::SIZE);
    assert!(offset_of!(IndexEntry, id) == layout::index_entry::ID);
    assert!(offset_of!(IndexEntry, node) == layout::index_entry::NODE);
    assert!(offset_of!(IndexEntry, next) == layout::index_entry::NEXT);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_absent() {
        assert_eq!(NodeRef::from_raw(0), None);
        assert_eq!(PageRef::from_raw(0), None);
        assert_eq!(NodeRef::to_raw(None), 0);
        let node = NodeRef::from_raw(0x1000_0040).expect("non-zero");
        assert_eq!(NodeRef::to_raw(Some(node)), 0x1000_0040);
    }

    #[test]
    fn reset_keeps_adjacency() {
        let node = NodeRecord {
            parent: 0x40,
            cost: 12,
            first_page: 0x80,
            visited: 1,
        };
        let reset = node.reset();
        assert_eq!(reset.first_page, 0x80);
        assert_eq!(reset.cost, UNREACHED);
        assert!(!reset.is_visited());
        assert_eq!(reset.parent(), None);
    }

    #[test]
    #[cfg(target_endian = "little")]
    fn records_serialise_fields_in_order() {
        let slot = HeapSlot { cost: 1, node: 2 };
        assert_eq!(bytemuck::bytes_of(&slot), &[1, 0, 0, 0, 2, 0, 0, 0][..]);
    }
}
