// SPDX-License-Identifier: AGPL-3.0-only

//! Software stand-in for the accelerator
//!
//! Speaks the word protocol of [`AcceleratorChannel`]: it collects the
//! three request words, walks the arena through a [`DeviceMemory`] view using
//! the same relaxation order as the host search, and queues
//! `[cost, settled nodes]` as the response. Nothing is shared with the host
//! except the arena bytes, so it exercises the delegated path end to end.

use crate::error::GraphError;
use crate::queue::FrontierQueue;
use crate::records::NodeRef;
use crate::search::shortest_path;
use crate::store::GraphStore;
use sssp_chip::layout::UNREACHED;
use sssp_chip::REQUEST_WORDS;
use sssp_driver::channel::ChannelType;
use sssp_driver::{AcceleratorChannel, DeviceMemory, DriverError};
use std::collections::VecDeque;

/// Replaying accelerator model
#[derive(Debug)]
pub struct ReplayAccelerator {
    memory: DeviceMemory,
    queue_capacity: u32,
    request: Vec<u32>,
    response: VecDeque<u32>,
    queries: u32,
}

impl ReplayAccelerator {
    /// Model over `memory` whose frontier holds `queue_capacity` slots
    pub fn new(memory: DeviceMemory, queue_capacity: u32) -> Self {
        Self {
            memory,
            queue_capacity,
            request: Vec::with_capacity(REQUEST_WORDS),
            response: VecDeque::new(),
            queries: 0,
        }
    }

    /// Model wired to `graph`'s arena and frontier size
    pub fn for_graph(graph: &GraphStore) -> Self {
        Self::new(graph.arena().device_view(), graph.queue().capacity())
    }

    /// Requests answered so far
    pub const fn queries(&self) -> u32 {
        self.queries
    }

    fn execute(&mut self) -> sssp_driver::Result<()> {
        let [queue_base, start, goal] = [self.request[0], self.request[1], self.request[2]];
        self.request.clear();

        let start = NodeRef::from_raw(start)
            .ok_or_else(|| DriverError::protocol_violation("request names a null start node"))?;
        let goal = NodeRef::from_raw(goal)
            .ok_or_else(|| DriverError::protocol_violation("request names a null goal node"))?;
        tracing::debug!("Replay: queue {queue_base:#010x}, {start} -> {goal}");

        let mut queue = FrontierQueue::at(queue_base, self.queue_capacity);
        let report =
            shortest_path(&mut self.memory, &mut queue, start, goal).map_err(into_driver_error)?;

        let cost = report.outcome.cost().unwrap_or(UNREACHED);
        let cycles = u32::try_from(report.steps).unwrap_or(u32::MAX);
        self.response.extend([cost, cycles]);
        self.queries += 1;
        Ok(())
    }
}

fn into_driver_error(err: GraphError) -> DriverError {
    match err {
        GraphError::Driver(inner) => inner,
        other => DriverError::protocol_violation(other.to_string()),
    }
}

impl AcceleratorChannel for ReplayAccelerator {
    fn write_word(&mut self, word: u32) -> sssp_driver::Result<()> {
        if !self.response.is_empty() {
            return Err(DriverError::protocol_violation(
                "request word written while a response is pending",
            ));
        }
        tracing::trace!("Replay <- {word:#010x}");
        self.request.push(word);
        if self.request.len() == REQUEST_WORDS {
            self.execute()?;
        }
        Ok(())
    }

    fn read_word(&mut self) -> sssp_driver::Result<u32> {
        let word = self
            .response
            .pop_front()
            .ok_or_else(|| DriverError::protocol_violation("read with no response pending"))?;
        tracing::trace!("Replay -> {word:#010x}");
        Ok(word)
    }

    fn channel_type(&self) -> ChannelType {
        ChannelType::Replay
    }
}
