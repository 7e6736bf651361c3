// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Workloads for benchmarking the filter.

use rxfilter::engine::Beat;
use rxfilter::engine::Pipeline;
use rxfilter::engine::Rule;
use rxfilter::engine::packet::beats_from_frame;
use rxfilter::provider::Providers;
use rxfilter_test_utils::canonical_rules;
use rxfilter_test_utils::pkt::raw_ether;
use rxfilter_test_utils::pkt::tcp4;
use rxfilter_test_utils::pkt::udp6;
use std::net::Ipv4Addr;
use std::net::Ipv6Addr;

/// A traffic mix with `n` frames: mostly passing IPv4 and IPv6, plus
/// some traffic every rule misses.
pub fn mixed_frames(n: usize) -> Vec<Vec<u8>> {
    let web4 = Ipv4Addr::new(192, 168, 1, 1);
    let web6 = Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1);

    (0..n)
        .map(|i| match i % 4 {
            0 => tcp4(web4, 80, 1400),
            1 => udp6(web6, 443, 200),
            2 => tcp4(web4, 22, 64),
            _ => raw_ether(0x0806, 60),
        })
        .collect()
}

pub fn mixed_beats(n: usize) -> Vec<Beat> {
    mixed_frames(n)
        .iter()
        .enumerate()
        .flat_map(|(i, f)| beats_from_frame(f, i as u64))
        .collect()
}

/// A pipeline of `rule_count` rules, the canonical two first and the
/// rest specific to addresses no workload uses.
pub fn pipeline(rule_count: usize) -> Pipeline {
    let mut pipe = Pipeline::new("bench", rule_count, Providers::null());
    for idx in 0..rule_count {
        let rule = match canonical_rules().get(idx) {
            Some(rule) => *rule,
            None => Rule::new()
                .ipv4(Ipv4Addr::new(10, 1, (idx >> 8) as u8, idx as u8))
                .port(9000),
        };
        pipe.set_rule(idx, rule);
    }
    pipe
}

/// Push every beat through with the output always ready. Returns the
/// number of cycles taken.
pub fn drive(pipe: &mut Pipeline, beats: &[Beat]) -> u64 {
    let mut next = 0;
    let mut cycles = 0;
    while next < beats.len() || !pipe.is_drained() {
        if pipe.tick(beats.get(next), true).accepted {
            next += 1;
        }
        cycles += 1;
    }
    cycles
}
