// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The classification stage.
//!
//! The stage tracks packet boundaries on the accepted input stream.
//! The first beat of each packet is decoded and evaluated against the
//! rule table; the result is latched and attached, unchanged, to every
//! beat of that packet. The rule table is consulted only at that
//! moment, so reconfiguration while a packet is in flight affects only
//! the packets that start afterwards.

use super::headers::HeaderView;
use super::rule::MatchResult;
use super::rule::RuleTable;
use super::stream::Beat;
use super::stream::PipeReg;

/// A beat along with the latched decision of the packet it belongs
/// to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Classified {
    pub beat: Beat,
    pub filter_pass: bool,
    pub rule_hit: Option<usize>,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ClassifyState {
    #[default]
    Idle,
    InPacket,
}

/// Emitted once per packet, on the tick its first beat is accepted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PacketStart {
    pub header: HeaderView,
    pub result: MatchResult,
}

/// What happened on one clock edge of the stage.
#[derive(Clone, Copy, Debug, Default)]
pub struct ClassifyStep {
    /// The beat handed to the next stage, if any.
    pub out: Option<Classified>,
    pub start: Option<PacketStart>,
}

#[derive(Clone, Debug, Default)]
pub struct ClassifyStage {
    state: ClassifyState,
    latched: MatchResult,
    reg: PipeReg<Classified>,
}

impl ClassifyStage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ClassifyState {
        self.state
    }

    /// The decision held for the packet currently in progress.
    pub fn latched(&self) -> MatchResult {
        self.latched
    }

    pub fn ready(&self, downstream_ready: bool) -> bool {
        self.reg.ready(downstream_ready)
    }

    pub fn is_valid(&self) -> bool {
        self.reg.is_valid()
    }

    pub fn peek(&self) -> Option<&Classified> {
        self.reg.peek()
    }

    /// Advance one clock edge. `input` is the beat accepted from
    /// upstream on this tick; it must be `None` unless
    /// [`Self::ready`] was true for the same `downstream_ready`.
    pub fn clock(
        &mut self,
        rules: &RuleTable,
        downstream_ready: bool,
        input: Option<&Beat>,
    ) -> ClassifyStep {
        let mut start = None;

        let load = input.map(|beat| {
            if self.state == ClassifyState::Idle {
                let header = HeaderView::decode(beat.data());
                let result = rules.evaluate(&header);
                self.latched = result;
                start = Some(PacketStart { header, result });
            }

            self.state = if beat.is_last() {
                ClassifyState::Idle
            } else {
                ClassifyState::InPacket
            };

            Classified {
                beat: *beat,
                filter_pass: self.latched.matched,
                rule_hit: self.latched.rule_index,
            }
        });

        let out = self.reg.clock(downstream_ready, load);
        ClassifyStep { out, start }
    }

    pub fn reset(&mut self) {
        self.state = ClassifyState::Idle;
        self.latched = MatchResult::NO_MATCH;
        self.reg.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::engine::packet::beats_from_frame;
    use crate::engine::rule::Rule;

    fn ipv4_frame(dst: [u8; 4], port: u16, len: usize) -> alloc::vec::Vec<u8> {
        let mut frame = vec![0u8; len];
        frame[12..14].copy_from_slice(&0x0800u16.to_be_bytes());
        frame[14] = 0x45;
        frame[30..34].copy_from_slice(&dst);
        frame[36..38].copy_from_slice(&port.to_be_bytes());
        frame
    }

    fn table() -> RuleTable {
        let mut rules = RuleTable::new(2);
        rules.set(0, Rule::new().ipv4([192, 168, 1, 1].into()).port(80));
        // A zero rule would take everything.
        rules.set(1, Rule::new().ipv4([10, 9, 9, 9].into()).port(443));
        rules
    }

    #[test]
    fn decision_latched_for_whole_packet() {
        let mut rules = table();
        let mut stage = ClassifyStage::new();
        let beats = beats_from_frame(&ipv4_frame([192, 168, 1, 1], 80, 200), 0);
        assert_eq!(beats.len(), 4);

        let step = stage.clock(&rules, true, Some(&beats[0]));
        let start = step.start.unwrap();
        assert_eq!(start.result, MatchResult::hit(0));
        assert_eq!(stage.state(), ClassifyState::InPacket);

        // Reconfiguring mid-packet must not alter the held decision.
        rules.set(0, Rule::new().port(9999));

        let mut out = vec![];
        for beat in &beats[1..] {
            let step = stage.clock(&rules, true, Some(beat));
            assert!(step.start.is_none());
            out.extend(step.out);
        }
        out.extend(stage.clock(&rules, true, None).out);

        assert_eq!(out.len(), 4);
        assert!(out.iter().all(|c| c.filter_pass && c.rule_hit == Some(0)));
        assert_eq!(stage.state(), ClassifyState::Idle);

        // The next packet sees the new configuration.
        let beats = beats_from_frame(&ipv4_frame([192, 168, 1, 1], 80, 64), 0);
        let step = stage.clock(&rules, true, Some(&beats[0]));
        assert_eq!(step.start.unwrap().result, MatchResult::NO_MATCH);
    }

    #[test]
    fn single_beat_packet_returns_to_idle() {
        let rules = table();
        let mut stage = ClassifyStage::new();
        let beats = beats_from_frame(&ipv4_frame([192, 168, 1, 1], 80, 60), 7);

        let step = stage.clock(&rules, true, Some(&beats[0]));
        assert!(step.start.is_some());
        assert_eq!(stage.state(), ClassifyState::Idle);
        assert_eq!(stage.peek().unwrap().beat.user(), 7);
    }

    #[test]
    fn stalled_register_is_not_ready() {
        let rules = table();
        let mut stage = ClassifyStage::new();
        let beats = beats_from_frame(&ipv4_frame([10, 0, 0, 1], 80, 128), 0);

        stage.clock(&rules, false, Some(&beats[0]));
        assert!(!stage.ready(false));
        assert!(stage.ready(true));

        // Holding while stalled.
        let step = stage.clock(&rules, false, None);
        assert!(step.out.is_none());
        assert!(stage.is_valid());

        let step = stage.clock(&rules, true, Some(&beats[1]));
        let out = step.out.unwrap();
        assert!(!out.filter_pass);
        assert_eq!(out.rule_hit, None);
    }

    #[test]
    fn reset_forgets_packet_in_progress() {
        let rules = table();
        let mut stage = ClassifyStage::new();
        let beats = beats_from_frame(&ipv4_frame([192, 168, 1, 1], 80, 128), 0);

        stage.clock(&rules, true, Some(&beats[0]));
        assert_eq!(stage.state(), ClassifyState::InPacket);
        stage.reset();
        assert_eq!(stage.state(), ClassifyState::Idle);
        assert!(!stage.is_valid());
        assert_eq!(stage.latched(), MatchResult::NO_MATCH);
    }
}
