// SPDX-License-Identifier: AGPL-3.0-only

//! Contract model for the shortest-path accelerator.
//!
//! This crate has **no dependencies** and **no hardware access**. It pins down
//! everything the host and the accelerator must agree on without talking to
//! each other: where the latches sit in the register window, what the status
//! bits mean, how many words a request and a response carry, and the byte
//! layout of every record the accelerator walks inside the arena.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`regs`] | Register window offsets, status bits, default device paths |
//! | [`layout`] | Node / edge / page / heap slot / index entry layouts |
//!
//! # Request / response protocol
//!
//! ```text
//! host  ──▶ word 0: frontier queue base (physical)
//! host  ──▶ word 1: start node        (physical)
//! host  ──▶ word 2: goal node         (physical)
//! host  ◀── word 0: total cost        (u32::MAX = unreachable)
//! host  ◀── word 1: elapsed cycles
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod layout;
pub mod regs;

/// Words the host writes to start one query.
pub const REQUEST_WORDS: usize = 3;

/// Words the accelerator returns for one query.
pub const RESPONSE_WORDS: usize = 2;
