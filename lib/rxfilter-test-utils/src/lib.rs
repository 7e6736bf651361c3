// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Common routines for integration tests.

// This type of pedantry is more trouble than it's worth here.
#![allow(dead_code)]

pub mod arb;
#[macro_use]
pub mod filter_state;
pub mod harness;
pub mod model;
pub mod pkt;

// Let's make our lives easier and pub use a bunch of stuff.
pub use filter_state::*;
pub use harness::Harness;
pub use harness::OutFrame;
pub use harness::Pattern;
pub use harness::RunResult;
pub use pkt::*;
pub use rxfilter::api::CounterId;
pub use rxfilter::api::CounterSnapshot;
pub use rxfilter::engine::MatchResult;
pub use rxfilter::engine::Pipeline;
pub use rxfilter::engine::Rule;
pub use rxfilter::engine::RuleTable;
pub use rxfilter::engine::packet::beats_from_frame;
pub use rxfilter::engine::packet::frame_from_beats;
pub use rxfilter::engine::stream::Beat;
pub use rxfilter::provider::PrintlnLog;
pub use rxfilter::provider::Providers;
pub use std::net::Ipv4Addr;
pub use std::net::Ipv6Addr;

/// Build a pipeline logging to stdout with the given rules installed.
pub fn pipeline_with(rules: &[Rule]) -> Pipeline {
    let providers = Providers { log: Box::new(PrintlnLog) };
    let mut pipe = Pipeline::new("test", rules.len(), providers);
    for (idx, rule) in rules.iter().enumerate() {
        pipe.set_rule(idx, *rule);
    }
    pipe
}

/// The canonical two-rule configuration: web traffic to one host,
/// plus HTTPS to anyone.
pub fn canonical_rules() -> [Rule; 2] {
    [
        Rule::new().ipv4(Ipv4Addr::new(192, 168, 1, 1)).port(80),
        Rule::new().port(443),
    ]
}
