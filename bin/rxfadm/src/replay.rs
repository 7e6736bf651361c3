// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Replay captured frames through a pipeline, one beat per cycle.

use crate::Error;
use crate::pcap::Frame;
use rxfilter::engine::MatchResult;
use rxfilter::engine::Pipeline;
use rxfilter::engine::ether::EtherType;
use rxfilter::engine::headers::HeaderView;
use rxfilter::engine::packet::Reassembler;
use rxfilter::engine::packet::beats_from_frame;
use rxfilter::engine::packet::frame_from_beats;
use rxfilter::engine::stream::Beat;
use std::fmt;
use std::fmt::Display;

/// How the far end of the output port behaves.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Sink {
    #[default]
    AlwaysReady,
    /// Deassert ready on every `k`th cycle.
    StallEvery(u64),
}

impl Sink {
    fn ready(&self, cycle: u64) -> bool {
        match self {
            Self::AlwaysReady => true,
            Self::StallEvery(k) => *k < 2 || (cycle + 1) % k != 0,
        }
    }
}

/// What happened to one input frame.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FrameResult {
    pub index: usize,
    pub len: usize,
    pub ether_type: EtherType,
    /// The IP protocol number, for IPv4 and IPv6 frames.
    pub l4_proto: Option<u8>,
    /// `None` for a zero-length frame, which carries no beats.
    pub decision: Option<MatchResult>,
}

impl FrameResult {
    pub fn passed(&self) -> bool {
        self.decision.is_some_and(|d| d.matched)
    }
}

/// The rule column of the classify listing.
pub struct RuleCol(pub Option<MatchResult>);

impl Display for RuleCol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0.and_then(|d| d.rule_index) {
            Some(idx) => write!(f, "{idx}"),
            None => write!(f, "-"),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Outcome {
    pub results: Vec<FrameResult>,
    /// Frames seen on the output port, in order.
    pub passed: Vec<Frame>,
    pub cycles: u64,
}

/// Drive every frame through `pipe`, tagging each beat with its
/// frame's index, and run until the pipeline drains.
pub fn replay(
    pipe: &mut Pipeline,
    frames: &[Frame],
    sink: Sink,
) -> Result<Outcome, Error> {
    let beats: Vec<Beat> = frames
        .iter()
        .enumerate()
        .flat_map(|(i, f)| beats_from_frame(&f.data, i as u64))
        .collect();

    // The sink is ready at least every other cycle, so a healthy
    // pipeline never needs more than this.
    let limit = 2 * (beats.len() as u64 + 4);

    let mut out = Outcome::default();
    let mut ra = Reassembler::new();
    let mut decisions = vec![];
    let mut next = 0;

    while next < beats.len() || !pipe.is_drained() {
        if out.cycles >= limit {
            return Err(Error::Stalled(out.cycles));
        }

        let m_ready = sink.ready(out.cycles);
        let tick = pipe.tick(beats.get(next), m_ready);
        if tick.accepted {
            next += 1;
        }

        if let Some(pkt) = tick.emitted.and_then(|beat| ra.push(beat)) {
            let src = &frames[pkt[0].user() as usize];
            out.passed.push(Frame {
                ts_sec: src.ts_sec,
                ts_usec: src.ts_usec,
                data: frame_from_beats(&pkt),
            });
        }

        decisions.extend(tick.packet_start);
        out.cycles += 1;
    }

    let mut decisions = decisions.into_iter();
    for (index, frame) in frames.iter().enumerate() {
        let hdr = beats_from_frame(&frame.data, 0)
            .first()
            .map(|beat| HeaderView::decode(beat.data()));
        let decision = hdr.and_then(|_| decisions.next());

        out.results.push(FrameResult {
            index,
            len: frame.data.len(),
            ether_type: hdr.map_or(EtherType::Unknown(0), |h| h.ether_type),
            l4_proto: hdr.and_then(|h| h.l4_proto()),
            decision,
        });
    }

    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;
    use rxfilter::provider::Providers;
    use rxfilter_test_utils::canonical_rules;
    use rxfilter_test_utils::pkt::raw_ether;
    use rxfilter_test_utils::pkt::tcp6;
    use rxfilter_test_utils::pkt::udp4;
    use std::net::Ipv4Addr;
    use std::net::Ipv6Addr;

    fn canonical() -> Pipeline {
        let mut pipe = Pipeline::new("replay", 2, Providers::null());
        for (idx, rule) in canonical_rules().into_iter().enumerate() {
            pipe.set_rule(idx, rule);
        }
        pipe
    }

    fn traffic() -> Vec<Frame> {
        let web4 = Ipv4Addr::new(192, 168, 1, 1);
        let web6 = Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1);
        vec![
            Frame::new(udp4(web4, 80, 100)),
            Frame::new(udp4(web4, 81, 100)),
            Frame::new(vec![]),
            Frame::new(raw_ether(0x0806, 60)),
            Frame::new(tcp6(web6, 443, 300)),
        ]
    }

    #[test]
    fn decisions_and_output() {
        let frames = traffic();
        let mut pipe = canonical();
        let out = replay(&mut pipe, &frames, Sink::AlwaysReady).unwrap();

        let rules: Vec<String> = out
            .results
            .iter()
            .map(|r| RuleCol(r.decision).to_string())
            .collect();
        assert_eq!(rules, ["0", "-", "-", "-", "1"]);

        let passed: Vec<bool> = out.results.iter().map(|r| r.passed()).collect();
        assert_eq!(passed, [true, false, false, false, true]);
        assert_eq!(out.results[2].decision, None);
        assert_eq!(out.results[3].ether_type, EtherType::Arp);
        assert_eq!(out.results[4].ether_type, EtherType::Ipv6);

        let protos: Vec<Option<u8>> =
            out.results.iter().map(|r| r.l4_proto).collect();
        assert_eq!(protos, [Some(17), Some(17), None, None, Some(6)]);

        assert_eq!(out.passed, vec![frames[0].clone(), frames[4].clone()]);

        let snap = pipe.snapshot();
        assert_eq!(snap.total_packets, 4);
        assert_eq!(snap.dropped_packets, 2);
        assert_eq!(snap.rule_hits, vec![1, 1]);
    }

    #[test]
    fn stalls_change_timing_only() {
        let frames = traffic();

        let mut fast = canonical();
        let a = replay(&mut fast, &frames, Sink::AlwaysReady).unwrap();
        let mut slow = canonical();
        let b = replay(&mut slow, &frames, Sink::StallEvery(3)).unwrap();

        assert_eq!(a.passed, b.passed);
        assert_eq!(a.results, b.results);
        assert_eq!(fast.snapshot(), slow.snapshot());
        assert!(b.cycles > a.cycles);
        assert!(slow.activity().out_stalls > 0);
        assert_eq!(fast.activity().out_stalls, 0);
    }

    #[test]
    fn sink_pattern() {
        let sink = Sink::StallEvery(3);
        let got: Vec<bool> = (0..6).map(|c| sink.ready(c)).collect();
        assert_eq!(got, [true, true, false, true, true, false]);
        assert!(Sink::StallEvery(1).ready(0));
    }
}
