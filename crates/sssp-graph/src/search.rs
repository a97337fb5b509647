// SPDX-License-Identifier: AGPL-3.0-only

//! Dijkstra over arena records
//!
//! ```text
//! INIT ──▶ RELAXING ──┬──▶ FOUND      goal popped
//!                     └──▶ EXHAUSTED  frontier empty
//! ```
//!
//! The search reads and writes nothing but physical addresses through
//! [`PhysicalMemory`], so the host runs it against its [`Arena`] and a device
//! model runs the very same code against a [`DeviceMemory`] view.
//!
//! Node records must be in their reset state (unreached, unvisited) and the
//! queue empty on entry.
//!
//! [`Arena`]: sssp_driver::Arena
//! [`DeviceMemory`]: sssp_driver::DeviceMemory

use crate::error::{GraphError, Result};
use crate::queue::FrontierQueue;
use crate::records::{NodeRecord, NodeRef, PageRecord};
use sssp_chip::layout::PAGE_EDGES;
use sssp_driver::PhysicalMemory;

/// How a search ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Goal settled with this total cost
    Found {
        /// Total cost from start to goal
        cost: u32,
    },

    /// Frontier ran dry before the goal was settled
    Exhausted,
}

impl SearchOutcome {
    /// Total cost, if the goal was reached
    pub const fn cost(self) -> Option<u32> {
        match self {
            Self::Found { cost } => Some(cost),
            Self::Exhausted => None,
        }
    }
}

/// Outcome plus work counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchReport {
    /// How the search ended
    pub outcome: SearchOutcome,
    /// Nodes settled
    pub steps: u64,
    /// Successful relaxations (one push each)
    pub relaxations: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Init,
    Relaxing,
    Found(u32),
    Exhausted,
}

/// Run Dijkstra from `start` until `goal` is settled or the frontier empties
///
/// Parents and costs are left in the node records for route reconstruction.
/// Candidate costs saturate at `u32::MAX`, which never beats an unreached
/// node.
///
/// # Errors
///
/// Returns error if a record cannot be accessed, a record is malformed, or
/// the frontier overflows.
pub fn shortest_path<M: PhysicalMemory>(
    mem: &mut M,
    queue: &mut FrontierQueue,
    start: NodeRef,
    goal: NodeRef,
) -> Result<SearchReport> {
    let mut state = State::Init;
    let mut steps = 0;
    let mut relaxations = 0;

    loop {
        state = match state {
            State::Init => {
                let mut record: NodeRecord = mem.load(start.address())?;
                record.cost = 0;
                mem.store(start.address(), &record)?;
                queue.push(mem, 0, start)?;
                State::Relaxing
            }
            State::Relaxing => match queue.pop(mem)? {
                None => State::Exhausted,
                Some((_, current)) => {
                    let mut record: NodeRecord = mem.load(current.address())?;
                    if record.is_visited() {
                        continue;
                    }
                    record.visited = 1;
                    mem.store(current.address(), &record)?;
                    steps += 1;

                    if current == goal {
                        State::Found(record.cost)
                    } else {
                        relaxations += relax(mem, queue, current, &record)?;
                        State::Relaxing
                    }
                }
            },
            State::Found(cost) => {
                tracing::debug!("Goal settled at cost {cost} after {steps} steps");
                return Ok(SearchReport {
                    outcome: SearchOutcome::Found { cost },
                    steps,
                    relaxations,
                });
            }
            State::Exhausted => {
                tracing::debug!("Frontier exhausted after {steps} steps");
                return Ok(SearchReport {
                    outcome: SearchOutcome::Exhausted,
                    steps,
                    relaxations,
                });
            }
        };
    }
}

/// Relax every outgoing edge of `current`; returns the number of improvements
fn relax<M: PhysicalMemory>(
    mem: &mut M,
    queue: &mut FrontierQueue,
    current: NodeRef,
    record: &NodeRecord,
) -> Result<u64> {
    let mut improved = 0;
    let mut next_page = record.first_page();
    while let Some(page_ref) = next_page {
        let page: PageRecord = mem.load(page_ref.address())?;
        if page.count as usize > PAGE_EDGES {
            return Err(GraphError::corrupt(
                page_ref.address(),
                format!("page claims {} edges", page.count),
            ));
        }
        for edge in page.edges.iter().take(page.count as usize) {
            let target = NodeRef::from_raw(edge.target)
                .ok_or_else(|| GraphError::corrupt(page_ref.address(), "edge without target"))?;
            let candidate = record.cost.saturating_add(edge.cost);
            let mut target_record: NodeRecord = mem.load(target.address())?;
            if candidate < target_record.cost {
                target_record.cost = candidate;
                target_record.parent = current.address();
                mem.store(target.address(), &target_record)?;
                queue.push(mem, candidate, target)?;
                improved += 1;
            }
        }
        next_page = page.next();
    }
    Ok(improved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{GraphConfig, GraphStore};
    use sssp_driver::{Arena, ArenaBacking, ArenaConfig};

    fn graph(edges: &[(u32, u32, u32)]) -> GraphStore {
        let arena = Arena::open(&ArenaConfig::new(ArenaBacking::heap(1 << 20))).expect("arena");
        let mut graph = GraphStore::new(arena, GraphConfig::new(16, 32)).expect("store");
        for &(from, to, cost) in edges {
            graph.add_edge(from, to, cost).expect("edge");
        }
        graph
    }

    fn search(graph: &mut GraphStore, start: u32, goal: u32) -> SearchReport {
        let start = graph.get_node(start).expect("lookup").expect("start");
        let goal = graph.get_node(goal).expect("lookup").expect("goal");
        graph.reset_search_state().expect("reset");
        let (arena, queue) = graph.search_parts();
        shortest_path(arena, queue, start, goal).expect("search")
    }

    #[test]
    fn picks_cheaper_two_hop_route() {
        let mut g = graph(&[(1, 2, 10), (2, 3, 5), (1, 3, 20)]);
        let report = search(&mut g, 1, 3);
        assert_eq!(report.outcome, SearchOutcome::Found { cost: 15 });
        assert_eq!(report.steps, 3);
        // 1→2, 1→3 (20), 2→3 (15)
        assert_eq!(report.relaxations, 3);
    }

    #[test]
    fn start_equals_goal_costs_nothing() {
        let mut g = graph(&[(1, 2, 4)]);
        let report = search(&mut g, 1, 1);
        assert_eq!(report.outcome, SearchOutcome::Found { cost: 0 });
        assert_eq!(report.relaxations, 0);
    }

    #[test]
    fn disconnected_goal_exhausts() {
        let mut g = graph(&[(1, 2, 1), (3, 4, 1)]);
        let report = search(&mut g, 1, 4);
        assert_eq!(report.outcome, SearchOutcome::Exhausted);
        assert_eq!(report.steps, 2);
    }

    #[test]
    fn stale_entries_are_skipped() {
        // 3 is pushed at 9 then improved to 2; the stale entry must not resettle it
        let mut g = graph(&[(1, 3, 9), (1, 2, 1), (2, 3, 1), (3, 4, 10)]);
        let report = search(&mut g, 1, 4);
        assert_eq!(report.outcome, SearchOutcome::Found { cost: 12 });
        assert_eq!(report.steps, 4);
    }

    #[test]
    fn huge_costs_saturate_instead_of_wrapping() {
        let mut g = graph(&[(1, 2, u32::MAX - 1), (2, 3, 5)]);
        let report = search(&mut g, 1, 3);
        assert_eq!(report.outcome, SearchOutcome::Exhausted);
    }
}
