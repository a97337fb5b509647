// SPDX-License-Identifier: AGPL-3.0-only

//! Arena-resident sparse directed graph
//!
//! Everything the accelerator walks lives in the arena:
//!
//! ```text
//! node slab     node_bound × 16 B   NodeRecord per node, in creation order
//! id slab       node_bound × 4 B    external id of each slab slot
//! index         IdIndex tables      id → node address
//! queue slots   (capacity + 1) × 8  frontier heap, slot 0 unused
//! pages         72 B each           allocated lazily as chains grow
//! ```
//!
//! Edges are append-only. Adding an edge walks the source's page chain to
//! the tail and starts a new page when the chain is empty or the tail is
//! full.

use crate::error::{GraphError, Result};
use crate::index::{build_index, IdIndex, IndexStrategy};
use crate::queue::FrontierQueue;
use crate::records::{EdgeRecord, NodeRecord, NodeRef, PageRecord, PageRef};
use sssp_chip::layout::{node, page};
use sssp_driver::{Arena, ArenaStats, PhysicalMemory};

/// Reserve `bytes` in the arena and return the physical address
pub(crate) fn reserve(arena: &mut Arena, bytes: usize) -> Result<u32> {
    arena
        .allocate(bytes)
        .map(|region| arena.translate(region))
        .ok_or_else(|| GraphError::OutOfMemory {
            requested: bytes,
            remaining: arena.remaining(),
        })
}

/// Graph sizing and index selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphConfig {
    /// Most nodes the graph may hold
    pub node_bound: u32,
    /// Most edges the graph may hold
    pub edge_bound: u32,
    /// Id lookup strategy
    pub index: IndexStrategy,
}

impl GraphConfig {
    /// Bounds with the default (hashed) index
    pub fn new(node_bound: u32, edge_bound: u32) -> Self {
        Self {
            node_bound,
            edge_bound,
            index: IndexStrategy::default(),
        }
    }

    /// Select the id index strategy
    #[must_use]
    pub const fn with_index(mut self, index: IndexStrategy) -> Self {
        self.index = index;
        self
    }

    /// Frontier slots needed: one push per successful relaxation plus the
    /// start, never fewer than one per node
    pub fn queue_capacity(&self) -> u32 {
        self.node_bound.max(self.edge_bound.saturating_add(1))
    }
}

/// Outgoing edge as seen by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    /// Target node
    pub target: NodeRef,
    /// Edge cost
    pub cost: u32,
}

/// Sparse directed graph stored in an arena
#[derive(Debug)]
pub struct GraphStore {
    arena: Arena,
    config: GraphConfig,
    index: Box<dyn IdIndex>,
    queue: FrontierQueue,
    nodes_base: u32,
    ids_base: u32,
    node_count: u32,
    edge_count: u32,
    page_count: u32,
}

impl GraphStore {
    /// Lay out the fixed tables for `config` in `arena`
    ///
    /// # Errors
    ///
    /// Returns error if the bounds are zero or the tables do not fit.
    pub fn new(mut arena: Arena, config: GraphConfig) -> Result<Self> {
        if config.node_bound == 0 {
            return Err(GraphError::invalid_config("node bound must be at least 1"));
        }
        let slots = config.node_bound as usize;
        let nodes_base = reserve(&mut arena, slots * node::SIZE)?;
        let ids_base = reserve(&mut arena, slots * 4)?;
        let index = build_index(&mut arena, config.index, config.node_bound)?;
        let queue = FrontierQueue::new(&mut arena, config.queue_capacity())?;

        tracing::debug!(
            "Graph store: {} nodes, {} edges, {} index, {}",
            config.node_bound,
            config.edge_bound,
            config.index,
            arena.stats()
        );

        Ok(Self {
            arena,
            config,
            index,
            queue,
            nodes_base,
            ids_base,
            node_count: 0,
            edge_count: 0,
            page_count: 0,
        })
    }

    /// Node for `id`, created on first use
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::BoundsExceeded`] once `node_bound` nodes exist,
    /// or an index error if `id` cannot be registered.
    pub fn add_node(&mut self, id: u32) -> Result<NodeRef> {
        if let Some(existing) = self.index.lookup(&self.arena, id)? {
            return Ok(existing);
        }
        if self.node_count == self.config.node_bound {
            return Err(GraphError::bounds_exceeded("nodes", self.config.node_bound));
        }

        let slot = self.node_count;
        let address = self.nodes_base + slot * node::SIZE as u32;
        let node = NodeRef::from_raw(address)
            .ok_or_else(|| GraphError::corrupt(address, "node slab at address 0"))?;
        self.index.insert(&mut self.arena, id, node)?;
        self.arena.store(address, &NodeRecord::unreached())?;
        self.arena.store(self.ids_base + slot * 4, &id)?;
        self.node_count += 1;

        tracing::trace!("Node {id} -> {node}");
        Ok(node)
    }

    /// Append `from → to` with `cost`, creating either endpoint if needed
    ///
    /// # Errors
    ///
    /// Returns error if the edge or node bounds are exceeded or the arena
    /// cannot hold a new page.
    pub fn add_edge(&mut self, from: u32, to: u32, cost: u32) -> Result<()> {
        if self.edge_count == self.config.edge_bound {
            return Err(GraphError::bounds_exceeded("edges", self.config.edge_bound));
        }
        let source = self.add_node(from)?;
        let target = self.add_node(to)?;
        let edge = EdgeRecord {
            target: target.address(),
            cost,
        };

        let mut record = self.node(source)?;
        let tail = match record.first_page() {
            None => {
                let fresh = self.new_page()?;
                record.first_page = fresh.address();
                self.arena.store(source.address(), &record)?;
                fresh
            }
            Some(first) => {
                let tail = self.tail_page(first)?;
                let tail_record: PageRecord = self.arena.load(tail.address())?;
                if tail_record.is_full() {
                    let fresh = self.new_page()?;
                    let linked = PageRecord {
                        next: fresh.address(),
                        ..tail_record
                    };
                    self.arena.store(tail.address(), &linked)?;
                    fresh
                } else {
                    tail
                }
            }
        };

        let mut page_record: PageRecord = self.arena.load(tail.address())?;
        page_record.edges[page_record.count as usize] = edge;
        page_record.count += 1;
        self.arena.store(tail.address(), &page_record)?;
        self.edge_count += 1;
        Ok(())
    }

    fn new_page(&mut self) -> Result<PageRef> {
        let address = reserve(&mut self.arena, page::SIZE)?;
        self.page_count += 1;
        PageRef::from_raw(address).ok_or_else(|| GraphError::corrupt(address, "page at address 0"))
    }

    fn tail_page(&self, first: PageRef) -> Result<PageRef> {
        let mut current = first;
        for _ in 0..=self.page_count {
            let record: PageRecord = self.arena.load(current.address())?;
            match record.next() {
                Some(next) => current = next,
                None => return Ok(current),
            }
        }
        Err(GraphError::corrupt(first.address(), "page chain does not terminate"))
    }

    /// Node for `id`, if it was ever added
    ///
    /// # Errors
    ///
    /// Returns error if the index cannot be read.
    pub fn get_node(&self, id: u32) -> Result<Option<NodeRef>> {
        self.index.lookup(&self.arena, id)
    }

    /// Current record of `node`
    ///
    /// # Errors
    ///
    /// Returns error if `node` is not inside the arena.
    pub fn node(&self, node: NodeRef) -> Result<NodeRecord> {
        Ok(self.arena.load(node.address())?)
    }

    /// External id of `node`
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Corrupt`] if `node` is not a slab slot.
    pub fn id_of(&self, node: NodeRef) -> Result<u32> {
        let slot = self.slot_of(node)?;
        Ok(self.arena.load(self.ids_base + slot * 4)?)
    }

    fn slot_of(&self, node: NodeRef) -> Result<u32> {
        let offset = node
            .address()
            .checked_sub(self.nodes_base)
            .filter(|offset| offset % node::SIZE as u32 == 0)
            .ok_or_else(|| GraphError::corrupt(node.address(), "not a node slot"))?;
        let slot = offset / node::SIZE as u32;
        if slot >= self.node_count {
            return Err(GraphError::corrupt(node.address(), "not a node slot"));
        }
        Ok(slot)
    }

    /// Outgoing edges of `node`, in insertion order
    ///
    /// # Errors
    ///
    /// Returns error if a page cannot be read or is malformed.
    pub fn edges(&self, node: NodeRef) -> Result<Vec<Edge>> {
        let mut edges = Vec::new();
        let mut next = self.node(node)?.first_page();
        let mut pages = 0;
        while let Some(current) = next {
            if pages > self.page_count {
                return Err(GraphError::corrupt(current.address(), "page chain does not terminate"));
            }
            let record: PageRecord = self.arena.load(current.address())?;
            for edge in record.edges.iter().take(record.count as usize) {
                let target = NodeRef::from_raw(edge.target)
                    .ok_or_else(|| GraphError::corrupt(current.address(), "edge without target"))?;
                edges.push(Edge {
                    target,
                    cost: edge.cost,
                });
            }
            next = record.next();
            pages += 1;
        }
        Ok(edges)
    }

    /// Every node in creation order
    pub fn nodes(&self) -> impl Iterator<Item = NodeRef> + '_ {
        (0..self.node_count)
            .filter_map(move |slot| NodeRef::from_raw(self.nodes_base + slot * node::SIZE as u32))
    }

    /// Put every node back to unreached/unvisited/no parent and empty the
    /// frontier; edges are untouched
    ///
    /// # Errors
    ///
    /// Returns error if a node record cannot be accessed.
    pub fn reset_search_state(&mut self) -> Result<()> {
        for slot in 0..self.node_count {
            let address = self.nodes_base + slot * node::SIZE as u32;
            let record: NodeRecord = self.arena.load(address)?;
            self.arena.store(address, &record.reset())?;
        }
        self.queue.clear();
        Ok(())
    }

    /// Arena and frontier, borrowed together for a search
    pub fn search_parts(&mut self) -> (&mut Arena, &mut FrontierQueue) {
        (&mut self.arena, &mut self.queue)
    }

    /// Nodes added so far
    pub const fn node_count(&self) -> u32 {
        self.node_count
    }

    /// Edges added so far
    pub const fn edge_count(&self) -> u32 {
        self.edge_count
    }

    /// Adjacency pages allocated so far
    pub const fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Sizing in effect
    pub const fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Backing arena
    pub const fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Frontier queue
    pub const fn queue(&self) -> &FrontierQueue {
        &self.queue
    }

    /// Arena usage
    pub fn arena_stats(&self) -> ArenaStats {
        self.arena.stats()
    }

    /// Give the arena back
    pub fn into_arena(self) -> Arena {
        self.arena
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sssp_chip::layout::{PAGE_EDGES, UNREACHED};
    use sssp_driver::{ArenaBacking, ArenaConfig};

    fn store(nodes: u32, edges: u32) -> GraphStore {
        let arena = Arena::open(&ArenaConfig::new(ArenaBacking::heap(1 << 20))).expect("arena");
        GraphStore::new(arena, GraphConfig::new(nodes, edges)).expect("store")
    }

    #[test]
    fn add_node_is_idempotent() {
        let mut graph = store(4, 4);
        let first = graph.add_node(77).expect("add");
        let used = graph.arena_stats().used;
        let again = graph.add_node(77).expect("add again");
        assert_eq!(first, again);
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.arena_stats().used, used);
    }

    #[test]
    fn new_nodes_start_unreached() {
        let mut graph = store(4, 4);
        let node = graph.add_node(3).expect("add");
        let record = graph.node(node).expect("record");
        assert_eq!(record.cost, UNREACHED);
        assert!(!record.is_visited());
        assert_eq!(record.parent(), None);
        assert_eq!(record.first_page(), None);
        assert_eq!(graph.id_of(node).expect("id"), 3);
    }

    #[test]
    fn node_bound_is_enforced() {
        let mut graph = store(2, 4);
        graph.add_node(1).expect("1");
        graph.add_node(2).expect("2");
        let err = graph.add_node(3).expect_err("third node");
        assert!(matches!(err, GraphError::BoundsExceeded { what: "nodes", limit: 2 }));
        // Existing ids are still found
        assert!(graph.add_node(2).is_ok());
    }

    #[test]
    fn edge_bound_is_enforced() {
        let mut graph = store(4, 1);
        graph.add_edge(1, 2, 5).expect("edge");
        let err = graph.add_edge(2, 3, 5).expect_err("second edge");
        assert!(matches!(err, GraphError::BoundsExceeded { what: "edges", limit: 1 }));
    }

    #[test]
    fn chains_grow_page_by_page() {
        let fan_out = PAGE_EDGES as u32 * 2 + 1;
        let mut graph = store(fan_out + 1, fan_out);
        for to in 1..=fan_out {
            graph.add_edge(0, to, to * 10).expect("edge");
        }
        assert_eq!(graph.page_count(), 3);

        let source = graph.get_node(0).expect("lookup").expect("present");
        let edges = graph.edges(source).expect("edges");
        assert_eq!(edges.len(), fan_out as usize);
        for (i, edge) in edges.iter().enumerate() {
            let to = i as u32 + 1;
            assert_eq!(graph.id_of(edge.target).expect("id"), to);
            assert_eq!(edge.cost, to * 10);
        }
    }

    #[test]
    fn get_node_is_absent_until_added() {
        let mut graph = store(4, 4);
        assert_eq!(graph.get_node(9).expect("lookup"), None);
        graph.add_edge(9, 10, 1).expect("edge");
        assert!(graph.get_node(9).expect("lookup").is_some());
        assert!(graph.get_node(10).expect("lookup").is_some());
    }

    #[test]
    fn reset_clears_search_state_only() {
        let mut graph = store(4, 4);
        graph.add_edge(1, 2, 3).expect("edge");
        let node = graph.get_node(1).expect("lookup").expect("present");
        let dirty = NodeRecord {
            parent: node.address(),
            cost: 0,
            visited: 1,
            ..graph.node(node).expect("record")
        };
        let (arena, _) = graph.search_parts();
        arena.store(node.address(), &dirty).expect("store");

        graph.reset_search_state().expect("reset");
        let record = graph.node(node).expect("record");
        assert_eq!(record.cost, UNREACHED);
        assert!(!record.is_visited());
        assert_eq!(graph.edges(node).expect("edges").len(), 1);
    }

    #[test]
    fn dense_index_rejects_large_ids() {
        let arena = Arena::open(&ArenaConfig::new(ArenaBacking::heap(1 << 20))).expect("arena");
        let config = GraphConfig::new(4, 4).with_index(IndexStrategy::Dense { max_id: 8 });
        let mut graph = GraphStore::new(arena, config).expect("store");
        graph.add_edge(1, 8, 1).expect("in range");
        let err = graph.add_edge(1, 9, 1).expect_err("id 9");
        assert!(matches!(err, GraphError::IdOutOfRange { id: 9, limit: 8 }));
    }

    #[test]
    fn tiny_arena_reports_out_of_memory() {
        let arena = Arena::open(&ArenaConfig::new(ArenaBacking::heap(4096))).expect("arena");
        let err = GraphStore::new(arena, GraphConfig::new(1000, 1000)).expect_err("too big");
        assert!(matches!(err, GraphError::OutOfMemory { .. }));
    }
}
