// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The filter engine.
//!
//! Leaf first: [`ether`] and [`headers`] interpret the first beat of a
//! packet, [`rule`] evaluates it, [`classify`] and [`forward`] are the
//! two pipeline stages built on the [`stream`] registers, [`stat`]
//! counts, [`regs`] is the register surface, and [`pipeline`] ties
//! them together.
pub mod classify;
pub mod ether;
pub mod forward;
pub mod headers;
pub mod packet;
pub mod pipeline;
pub mod regs;
pub mod rule;
pub mod stat;
pub mod stream;

pub use pipeline::Pipeline;
pub use pipeline::Tick;
pub use rule::MatchResult;
pub use rule::Rule;
pub use rule::RuleTable;
pub use stream::Beat;
