// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! A reference model of the filter.
//!
//! The model works on whole frames rather than beats and parses them
//! with smoltcp rather than at fixed offsets, so that it shares no
//! decoding logic with the engine under test. It only agrees with the
//! engine for frames without IP options or extension headers.

use rxfilter::api::CounterSnapshot;
use rxfilter::engine::rule::MatchResult;
use rxfilter::engine::rule::Rule;
use smoltcp::wire::EthernetFrame;
use smoltcp::wire::EthernetProtocol;
use smoltcp::wire::Ipv4Packet;
use smoltcp::wire::Ipv6Packet;
use std::net::Ipv4Addr;
use std::net::Ipv6Addr;

/// The destination of a frame, as far as the filter is concerned.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Dest {
    V4(Ipv4Addr, u16),
    V6(Ipv6Addr, u16),
}

fn l4_dst_port(l4: &[u8]) -> u16 {
    match l4.get(2..4) {
        Some(b) => u16::from_be_bytes([b[0], b[1]]),
        None => 0,
    }
}

/// Parse the destination of an IPv4 or IPv6 frame. Anything else,
/// including VLAN-tagged frames, yields `None`.
pub fn parse_dest(frame: &[u8]) -> Option<Dest> {
    let eth = EthernetFrame::new_checked(frame).ok()?;

    match eth.ethertype() {
        EthernetProtocol::Ipv4 => {
            let ip = Ipv4Packet::new_checked(eth.payload()).ok()?;
            let dst = Ipv4Addr::from(ip.dst_addr().0);
            Some(Dest::V4(dst, l4_dst_port(ip.payload())))
        }

        EthernetProtocol::Ipv6 => {
            let ip = Ipv6Packet::new_checked(eth.payload()).ok()?;
            let dst = Ipv6Addr::from(ip.dst_addr().0);
            Some(Dest::V6(dst, l4_dst_port(ip.payload())))
        }

        _ => None,
    }
}

fn rule_matches(rule: &Rule, dest: &Dest) -> bool {
    let (addr_ok, port) = match *dest {
        Dest::V4(addr, port) => {
            let want = Ipv4Addr::from(rule.ipv4_addr);
            (want.is_unspecified() || want == addr, port)
        }
        Dest::V6(addr, port) => {
            let want = Ipv6Addr::from(rule.ipv6_addr);
            (want.is_unspecified() || want == addr, port)
        }
    };

    addr_ok && (rule.port == 0 || rule.port == port)
}

/// The decision the filter should make for `frame`.
pub fn classify(rules: &[Rule], frame: &[u8]) -> MatchResult {
    let Some(dest) = parse_dest(frame) else {
        return MatchResult::NO_MATCH;
    };

    for (idx, rule) in rules.iter().enumerate() {
        if rule_matches(rule, &dest) {
            return MatchResult::hit(idx);
        }
    }

    MatchResult::NO_MATCH
}

/// The expected outcome of pushing a sequence of frames through a
/// freshly reset filter.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Prediction {
    /// Indices of the frames expected at the output, in order.
    pub passed: Vec<usize>,
    pub decisions: Vec<MatchResult>,
    pub counters: CounterSnapshot,
}

pub fn predict(rules: &[Rule], frames: &[Vec<u8>]) -> Prediction {
    let mut pred = Prediction {
        counters: CounterSnapshot {
            rule_hits: vec![0; rules.len()],
            ..Default::default()
        },
        ..Default::default()
    };

    for (i, frame) in frames.iter().enumerate() {
        // An empty frame never appears on the stream.
        if frame.is_empty() {
            continue;
        }

        let res = classify(rules, frame);
        let c = &mut pred.counters;
        c.total_packets = c.total_packets.wrapping_add(1);
        match res.rule_index {
            Some(idx) => {
                c.rule_hits[idx] = c.rule_hits[idx].wrapping_add(1);
                pred.passed.push(i);
            }
            None => c.dropped_packets = c.dropped_packets.wrapping_add(1),
        }
        pred.decisions.push(res);
    }

    pred
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pkt::*;

    #[test]
    fn parse_builder_frames() {
        let dst = Ipv4Addr::new(192, 168, 1, 1);
        assert_eq!(parse_dest(&udp4(dst, 80, 0)), Some(Dest::V4(dst, 80)));

        let dst: Ipv6Addr = "2001:db8::1".parse().unwrap();
        assert_eq!(parse_dest(&tcp6(dst, 443, 0)), Some(Dest::V6(dst, 443)));

        assert_eq!(parse_dest(&raw_ether(0x0806, 60)), None);
        assert_eq!(parse_dest(&vlan_udp4(5, Ipv4Addr::LOCALHOST, 80)), None);
    }

    #[test]
    fn prediction_counts() {
        let rules = [
            Rule::new().ipv4(Ipv4Addr::new(192, 168, 1, 1)).port(80),
            Rule::new().port(443),
        ];
        let frames = vec![
            udp4(Ipv4Addr::new(192, 168, 1, 1), 80, 0),
            udp4(Ipv4Addr::new(10, 0, 0, 1), 443, 0),
            udp4(Ipv4Addr::new(10, 0, 0, 1), 22, 0),
            vec![],
        ];

        let pred = predict(&rules, &frames);
        assert_eq!(pred.passed, vec![0, 1]);
        assert_eq!(pred.counters.total_packets, 3);
        assert_eq!(pred.counters.dropped_packets, 1);
        assert_eq!(pred.counters.rule_hits, vec![1, 1]);
    }
}
