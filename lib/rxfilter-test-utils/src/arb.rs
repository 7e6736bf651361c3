// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Property test strategies.
//!
//! Addresses and ports are drawn mostly from small pools so that
//! generated rules and generated traffic actually meet.

use crate::harness::Pattern;
use crate::pkt::FrameSpec;
use crate::pkt::L3;
use crate::pkt::L4;
use crate::pkt::build_frame;
use crate::pkt::raw_ether;
use proptest::prelude::*;
use rxfilter::engine::Rule;
use std::net::Ipv4Addr;
use std::net::Ipv6Addr;

const V4_POOL: [Ipv4Addr; 3] = [
    Ipv4Addr::new(192, 168, 1, 1),
    Ipv4Addr::new(10, 0, 0, 1),
    Ipv4Addr::new(172, 16, 0, 9),
];

const V6_POOL: [Ipv6Addr; 3] = [
    Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1),
    Ipv6Addr::new(0xfd00, 0, 0, 0, 0, 0, 0, 5),
    Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 0x77),
];

const PORT_POOL: [u16; 4] = [80, 443, 22, 53];

pub fn arb_ipv4() -> impl Strategy<Value = Ipv4Addr> {
    prop_oneof![
        4 => prop::sample::select(V4_POOL.to_vec()),
        1 => any::<u32>().prop_map(Ipv4Addr::from),
    ]
}

pub fn arb_ipv6() -> impl Strategy<Value = Ipv6Addr> {
    prop_oneof![
        4 => prop::sample::select(V6_POOL.to_vec()),
        1 => any::<u128>().prop_map(Ipv6Addr::from),
    ]
}

pub fn arb_port() -> impl Strategy<Value = u16> {
    prop_oneof![
        4 => prop::sample::select(PORT_POOL.to_vec()),
        1 => any::<u16>(),
    ]
}

prop_compose! {
    pub fn arb_rule()(
        ipv4 in prop::option::weighted(0.5, arb_ipv4()),
        ipv6 in prop::option::weighted(0.3, arb_ipv6()),
        port in prop::option::weighted(0.6, arb_port()),
    ) -> Rule {
        let mut rule = Rule::new();
        if let Some(addr) = ipv4 {
            rule = rule.ipv4(addr);
        }
        if let Some(addr) = ipv6 {
            rule = rule.ipv6(addr);
        }
        if let Some(port) = port {
            rule = rule.port(port);
        }
        rule
    }
}

pub fn arb_rules(count: usize) -> impl Strategy<Value = Vec<Rule>> {
    prop::collection::vec(arb_rule(), count)
}

fn arb_l4() -> impl Strategy<Value = L4> {
    prop_oneof![Just(L4::Udp), Just(L4::Tcp)]
}

fn arb_ip_frame() -> impl Strategy<Value = Vec<u8>> {
    let l3 = prop_oneof![
        3 => arb_ipv4().prop_map(|dst| L3::Ipv4 { src: crate::CLIENT_IP4, dst }),
        2 => arb_ipv6().prop_map(|dst| L3::Ipv6 { src: crate::CLIENT_IP6, dst }),
    ];

    (l3, arb_l4(), arb_port(), 0..300usize).prop_map(
        |(l3, l4, port, len)| {
            build_frame(&FrameSpec::new(l3, l4, port).payload_len(len))
        },
    )
}

/// Any frame the filter may see: mostly IPv4 and IPv6, with some
/// ARP, unknown EtherTypes and VLAN-tagged traffic.
pub fn arb_frame() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        8 => arb_ip_frame(),
        1 => (60..200usize).prop_map(|len| raw_ether(0x0806, len)),
        1 => (arb_ipv4(), arb_port(), any::<u16>()).prop_map(
            |(dst, port, tci)| {
                let l3 = L3::Ipv4 { src: crate::CLIENT_IP4, dst };
                build_frame(&FrameSpec::new(l3, L4::Udp, port).vlan(tci))
            }
        ),
    ]
}

pub fn arb_frames(max: usize) -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(arb_frame(), 1..max)
}

/// A valid/ready waveform that is asserted at least some of the time.
pub fn arb_pattern() -> impl Strategy<Value = Pattern> {
    prop_oneof![
        2 => Just(Pattern::Always),
        1 => (2..5u64).prop_map(Pattern::DropEvery),
        1 => (2..4u64).prop_map(Pattern::OnlyEvery),
        2 => prop::collection::vec(any::<bool>(), 1..16).prop_map(|mut v| {
            v.push(true);
            Pattern::Cycle(v)
        }),
    ]
}
