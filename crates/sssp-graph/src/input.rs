// SPDX-License-Identifier: AGPL-3.0-only

//! Graph input
//!
//! Two text formats are accepted and told apart by the first meaningful
//! token:
//!
//! ```text
//! plain                DIMACS shortest path
//! 3 3                  c comment
//! 1 2 10               p sp 3 3
//! 2 3 5                a 1 2 10
//! 1 3 20               a 2 3 5
//!                      a 1 3 20
//! ```
//!
//! The header gives the node and edge bounds the store is sized for.
//! Exceeding them while reading is a fatal error, as is any malformed line.

use crate::error::{GraphError, Result};
use crate::index::IndexStrategy;
use crate::store::{GraphConfig, GraphStore};
use sssp_driver::Arena;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Plain,
    Dimacs,
}

impl Format {
    fn detect(first_token: &str) -> Self {
        match first_token {
            "c" | "p" => Self::Dimacs,
            _ => Self::Plain,
        }
    }
}

/// Builds a [`GraphStore`] line by line
struct Loader {
    arena: Option<Arena>,
    index: IndexStrategy,
    graph: Option<GraphStore>,
}

impl Loader {
    fn header(&mut self, line: usize, nodes: &str, edges: &str) -> Result<()> {
        if self.graph.is_some() {
            return Err(GraphError::parse(line, "second header"));
        }
        let node_bound = number(line, nodes, "node count")?;
        let edge_bound = number(line, edges, "edge count")?;
        let arena = self
            .arena
            .take()
            .ok_or_else(|| GraphError::parse(line, "second header"))?;
        let config = GraphConfig::new(node_bound, edge_bound).with_index(self.index);
        self.graph = Some(GraphStore::new(arena, config)?);
        Ok(())
    }

    fn edge(&mut self, line: usize, from: &str, to: &str, cost: &str) -> Result<()> {
        let graph = self
            .graph
            .as_mut()
            .ok_or_else(|| GraphError::parse(line, "edge before header"))?;
        let from = number(line, from, "source id")?;
        let to = number(line, to, "target id")?;
        let cost = number(line, cost, "cost")?;
        graph.add_edge(from, to, cost)
    }
}

fn number(line: usize, token: &str, what: &str) -> Result<u32> {
    token
        .parse()
        .map_err(|e| GraphError::parse(line, format!("bad {what} {token:?}: {e}")))
}

/// Read a graph from `reader` into a store laid out in `arena`
///
/// # Errors
///
/// Returns error on I/O failure, malformed input, a missing header, bounds
/// exceeded, or arena exhaustion.
pub fn read_graph<R: BufRead>(reader: R, arena: Arena, index: IndexStrategy) -> Result<GraphStore> {
    let mut loader = Loader {
        arena: Some(arena),
        index,
        graph: None,
    };
    let mut format = None;
    let mut last_line = 0;

    for (number, text) in reader.lines().enumerate() {
        let text = text?;
        let line = number + 1;
        last_line = line;
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let Some(first) = tokens.first() else {
            continue;
        };

        match *format.get_or_insert_with(|| Format::detect(first)) {
            Format::Plain => match tokens.as_slice() {
                [nodes, edges] => loader.header(line, nodes, edges)?,
                [from, to, cost] => loader.edge(line, from, to, cost)?,
                _ => {
                    return Err(GraphError::parse(
                        line,
                        format!("expected `from to cost`, found {} fields", tokens.len()),
                    ))
                }
            },
            Format::Dimacs => match tokens.as_slice() {
                ["c", ..] => {}
                ["p", "sp", nodes, edges] => loader.header(line, nodes, edges)?,
                ["a", from, to, cost] => loader.edge(line, from, to, cost)?,
                _ => return Err(GraphError::parse(line, format!("unrecognised line {text:?}"))),
            },
        }
    }

    let graph = loader
        .graph
        .ok_or_else(|| GraphError::parse(last_line, "missing header"))?;
    tracing::info!(
        "Loaded {} nodes, {} edges in {} pages; arena {}",
        graph.node_count(),
        graph.edge_count(),
        graph.page_count(),
        graph.arena_stats()
    );
    Ok(graph)
}

/// Read a graph file
///
/// # Errors
///
/// See [`read_graph`]; also fails if the file cannot be opened.
pub fn read_graph_file(path: &Path, arena: Arena, index: IndexStrategy) -> Result<GraphStore> {
    let file = File::open(path)?;
    tracing::debug!("Reading graph from {}", path.display());
    read_graph(BufReader::new(file), arena, index)
}
