// SPDX-License-Identifier: AGPL-3.0-only

//! Path engine: run a query locally or on the accelerator, then report the route
//!
//! Every run starts by resetting the search state of the graph, so running
//! the same query twice on an unmodified graph gives the same answer.
//!
//! A delegated run hands the accelerator three physical addresses (frontier
//! base, start, goal) and takes its `(cost, cycles)` answer as authoritative.
//! The route is read back from the parent references it left in the arena.

use crate::error::{GraphError, Result};
use crate::records::NodeRef;
use crate::search::{shortest_path, SearchOutcome};
use crate::store::GraphStore;
use sssp_chip::layout::UNREACHED;
use sssp_driver::{AcceleratorChannel, SyncDirection};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Who runs the search and where the graph lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Host search over host memory
    #[default]
    Software,

    /// Host search over device-shared memory
    SoftwareOnDevice,

    /// Accelerator search over device-shared memory
    Delegated,
}

impl ExecutionMode {
    /// Whether the arena must be shared with the accelerator
    pub const fn needs_device_memory(self) -> bool {
        !matches!(self, Self::Software)
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Software => write!(f, "software"),
            Self::SoftwareOnDevice => write!(f, "software-on-device"),
            Self::Delegated => write!(f, "delegated"),
        }
    }
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "software" | "sw" | "0" => Ok(Self::Software),
            "software-on-device" | "device" | "timed" | "1" => Ok(Self::SoftwareOnDevice),
            "delegated" | "hardware" | "hw" | "2" => Ok(Self::Delegated),
            other => Err(format!("unknown execution mode: {other}")),
        }
    }
}

/// One shortest-path question
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Query {
    /// Start id
    pub start: u32,
    /// Goal id
    pub goal: u32,
    /// Execution mode
    pub mode: ExecutionMode,
}

impl Query {
    /// Software query from `start` to `goal`
    pub fn new(start: u32, goal: u32) -> Self {
        Self {
            start,
            goal,
            mode: ExecutionMode::default(),
        }
    }

    /// Select the execution mode
    #[must_use]
    pub const fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }
}

/// One hop of a route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteStep {
    /// External id
    pub id: u32,
    /// Cost from the start to this node
    pub cost: u32,
}

/// Answer to a [`Query`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    /// Question asked
    pub query: Query,
    /// How the search ended
    pub outcome: SearchOutcome,
    /// Hops from start to goal; empty unless found
    pub route: Vec<RouteStep>,
    /// Wall-clock time of the search itself
    pub elapsed: Duration,
    /// Cycle count reported by the accelerator
    pub cycles: Option<u32>,
    /// Nodes settled by a local search
    pub steps: Option<u64>,
}

impl QueryResult {
    /// Total cost, [`UNREACHED`] if the goal was not reached
    pub fn cost(&self) -> u32 {
        self.outcome.cost().unwrap_or(UNREACHED)
    }

    /// Whether the goal was reached
    pub fn is_found(&self) -> bool {
        matches!(self.outcome, SearchOutcome::Found { .. })
    }

    fn unreachable(query: Query) -> Self {
        Self {
            query,
            outcome: SearchOutcome::Exhausted,
            route: Vec::new(),
            elapsed: Duration::ZERO,
            cycles: None,
            steps: None,
        }
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "start:{} goal:{}", self.query.start, self.query.goal)?;
        match self.outcome {
            SearchOutcome::Found { cost } => {
                writeln!(f, "route:")?;
                for step in &self.route {
                    writeln!(f, "{} {}", step.id, step.cost)?;
                }
                writeln!(f, "cost: {cost}")?;
            }
            SearchOutcome::Exhausted => writeln!(f, "cost: unreachable")?,
        }
        if let Some(cycles) = self.cycles {
            writeln!(f, "cycles: {cycles}")?;
        }
        write!(f, "execution time: {:.6} s", self.elapsed.as_secs_f64())
    }
}

/// Runs queries against one graph
pub struct PathEngine<'g> {
    graph: &'g mut GraphStore,
    channel: Option<&'g mut dyn AcceleratorChannel>,
}

impl fmt::Debug for PathEngine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathEngine")
            .field("nodes", &self.graph.node_count())
            .field("edges", &self.graph.edge_count())
            .field("channel", &self.channel.as_ref().map(|c| c.channel_type()))
            .finish()
    }
}

impl<'g> PathEngine<'g> {
    /// Engine that can only run local searches
    pub fn new(graph: &'g mut GraphStore) -> Self {
        Self {
            graph,
            channel: None,
        }
    }

    /// Engine that can also delegate to `channel`
    pub fn with_channel(graph: &'g mut GraphStore, channel: &'g mut dyn AcceleratorChannel) -> Self {
        Self {
            graph,
            channel: Some(channel),
        }
    }

    /// Graph the engine runs on
    pub fn graph(&self) -> &GraphStore {
        &*self.graph
    }

    /// Answer `query`
    ///
    /// An id that was never added yields an unreachable result, not an error.
    ///
    /// # Errors
    ///
    /// Returns error if the arena or channel fails, a record is corrupt, or
    /// a delegated query is run without a channel.
    pub fn run(&mut self, query: &Query) -> Result<QueryResult> {
        let start = self.graph.get_node(query.start)?;
        let goal = self.graph.get_node(query.goal)?;
        let (Some(start), Some(goal)) = (start, goal) else {
            tracing::warn!(
                "Query {} -> {}: id not in graph, treating as unreachable",
                query.start,
                query.goal
            );
            return Ok(QueryResult::unreachable(*query));
        };

        self.graph.reset_search_state()?;
        let result = match query.mode {
            ExecutionMode::Software | ExecutionMode::SoftwareOnDevice => {
                self.run_local(query, start, goal)?
            }
            ExecutionMode::Delegated => self.run_delegated(query, start, goal)?,
        };

        tracing::info!(
            "Query {} -> {} ({}): cost {}, {} hops, {:?}",
            query.start,
            query.goal,
            query.mode,
            result.cost(),
            result.route.len(),
            result.elapsed
        );
        Ok(result)
    }

    fn run_local(&mut self, query: &Query, start: NodeRef, goal: NodeRef) -> Result<QueryResult> {
        let (arena, queue) = self.graph.search_parts();
        let began = Instant::now();
        let report = shortest_path(arena, queue, start, goal)?;
        let elapsed = began.elapsed();

        let route = match report.outcome {
            SearchOutcome::Found { .. } => self.route(start, goal)?,
            SearchOutcome::Exhausted => Vec::new(),
        };
        Ok(QueryResult {
            query: *query,
            outcome: report.outcome,
            route,
            elapsed,
            cycles: None,
            steps: Some(report.steps),
        })
    }

    fn run_delegated(&mut self, query: &Query, start: NodeRef, goal: NodeRef) -> Result<QueryResult> {
        let channel = self
            .channel
            .as_deref_mut()
            .ok_or_else(|| GraphError::invalid_config("delegated run needs an accelerator channel"))?;

        self.graph.arena().synchronize_all(SyncDirection::ToDevice)?;
        let queue_base = self.graph.queue().base_address();
        tracing::debug!(
            "Delegating via {}: queue {queue_base:#010x}, {start} -> {goal}",
            channel.channel_type()
        );
        channel.write_word(queue_base)?;
        channel.write_word(start.address())?;
        channel.write_word(goal.address())?;

        let began = Instant::now();
        let cost = channel.read_word()?;
        let cycles = channel.read_word()?;
        let elapsed = began.elapsed();
        self.graph.arena().synchronize_all(SyncDirection::FromDevice)?;

        let (outcome, route) = if cost == UNREACHED {
            (SearchOutcome::Exhausted, Vec::new())
        } else {
            (SearchOutcome::Found { cost }, self.route(start, goal)?)
        };
        Ok(QueryResult {
            query: *query,
            outcome,
            route,
            elapsed,
            cycles: Some(cycles),
            steps: None,
        })
    }

    /// Walk parents from `goal` back to `start`, then reverse
    fn route(&self, start: NodeRef, goal: NodeRef) -> Result<Vec<RouteStep>> {
        let mut route = Vec::new();
        let mut current = goal;
        for _ in 0..=self.graph.node_count() {
            let record = self.graph.node(current)?;
            route.push(RouteStep {
                id: self.graph.id_of(current)?,
                cost: record.cost,
            });
            if current == start {
                route.reverse();
                return Ok(route);
            }
            current = record
                .parent()
                .ok_or_else(|| GraphError::corrupt(current.address(), "route breaks before start"))?;
        }
        Err(GraphError::corrupt(goal.address(), "parent chain does not reach start"))
    }
}
