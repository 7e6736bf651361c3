// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! A line-rate receive filter.
//!
//! The engine models a two-stage hardware pipeline which classifies
//! Ethernet frames arriving as fixed-width beats on a valid/ready
//! stream. Each packet is matched against a small, ordered table of
//! destination address/port rules on its first beat; the decision is
//! latched for the remainder of the packet and only passing packets
//! are forwarded downstream.
//!
//! The engine is driven one clock tick at a time via
//! [`engine::pipeline::Pipeline::tick`].

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

#[macro_use]
extern crate alloc;

#[macro_use]
extern crate cfg_if;

pub mod api;
pub mod engine;
#[cfg(feature = "std")]
pub mod print;
pub mod provider;

/// Return a mask with the low `n` bits set.
pub const fn low_mask_u64(n: u32) -> u64 {
    if n >= 64 { u64::MAX } else { (1u64 << n) - 1 }
}
