// SPDX-License-Identifier: AGPL-3.0-only

//! Single-source shortest paths over an accelerator-shareable graph.
//!
//! The graph, its id index and the frontier heap all live in an
//! [`Arena`](sssp_driver::Arena) and refer to each other only by 32-bit
//! physical addresses. The same bytes can therefore be searched by the host
//! or handed to the accelerator by address.
//!
//! ```text
//! edge list ──▶ GraphStore ──▶ PathEngine ──┬──▶ shortest_path (host)
//!                                           └──▶ AcceleratorChannel (device)
//!                                                      │
//!                              route + cost ◀──────────┘
//! ```
//!
//! # Quick start
//!
//! ```
//! use sssp_graph::prelude::*;
//! use sssp_driver::{Arena, ArenaBacking, ArenaConfig};
//!
//! # fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let arena = Arena::open(&ArenaConfig::new(ArenaBacking::heap(1 << 20)))?;
//! let mut graph = GraphStore::new(arena, GraphConfig::new(3, 3))?;
//! graph.add_edge(1, 2, 10)?;
//! graph.add_edge(2, 3, 5)?;
//! graph.add_edge(1, 3, 20)?;
//!
//! let result = PathEngine::new(&mut graph).run(&Query::new(1, 3))?;
//! assert_eq!(result.cost(), 15);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]

pub mod engine;
mod error;
pub mod index;
pub mod input;
pub mod queue;
pub mod records;
pub mod replay;
pub mod search;
pub mod store;

pub use engine::{ExecutionMode, PathEngine, Query, QueryResult, RouteStep};
pub use error::{GraphError, Result};
pub use index::{build_index, DenseIndex, HashedIndex, IdIndex, IndexStrategy};
pub use input::{read_graph, read_graph_file};
pub use queue::FrontierQueue;
pub use records::{NodeRecord, NodeRef, PageRef};
pub use replay::ReplayAccelerator;
pub use search::{shortest_path, SearchOutcome, SearchReport};
pub use store::{Edge, GraphConfig, GraphStore};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        ExecutionMode, GraphConfig, GraphError, GraphStore, IndexStrategy, PathEngine, Query,
        QueryResult, ReplayAccelerator, RouteStep, SearchOutcome,
    };
}
