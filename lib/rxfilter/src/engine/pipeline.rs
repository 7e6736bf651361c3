// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The composed filter pipeline.
//!
//! ```text
//!              +----------+  Classified  +---------+
//!  s_axis ---->| classify |------------->| forward |----> m_axis
//!  s_ready <---|  (reg 1) |<-------------| (reg 2) |<---- m_ready
//!              +----------+              +---------+
//!                   |  PacketStart
//!                   v
//!               Counters
//! ```
//!
//! All readiness is resolved combinationally at the start of a tick
//! from the register occupancy and the consumer's ready; both
//! registers are then clocked with those values.

use super::classify::ClassifyStage;
use super::classify::ClassifyState;
use super::forward::ForwardStage;
use super::regs::RegisterMap;
use super::rule::MatchResult;
use super::rule::Rule;
use super::rule::RuleField;
use super::rule::RuleTable;
use super::stat::ActivityStats;
use super::stat::Counters;
use super::stream::Beat;
use super::stream::fire;
use crate::api::CounterId;
use crate::api::CounterSnapshot;
use crate::api::DumpRulesResp;
use crate::api::RuleDump;
use crate::provider::LogLevel;
use crate::provider::LogProvider;
use crate::provider::Providers;
use alloc::boxed::Box;
use alloc::string::String;
use alloc::string::ToString;

/// The observable result of one clock tick.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Tick {
    /// The input port's ready for this tick.
    pub s_ready: bool,
    /// True if the input beat transferred on this tick.
    pub accepted: bool,
    /// The beat transferred on the output port, if any.
    pub emitted: Option<Beat>,
    /// Set on the tick a packet's first beat is accepted.
    pub packet_start: Option<MatchResult>,
}

pub struct Pipeline {
    name: String,
    rules: RuleTable,
    map: RegisterMap,
    classify: ClassifyStage,
    forward: ForwardStage,
    counters: Counters,
    activity: ActivityStats,
    in_reset: bool,
    log: Box<dyn LogProvider>,
}

impl Pipeline {
    /// Create a pipeline with `rule_count` rules, all zero.
    ///
    /// Note that a zero rule is a catch-all: until it is configured
    /// the pipeline passes every IPv4 and IPv6 packet.
    pub fn new(name: &str, rule_count: usize, providers: Providers) -> Self {
        Self {
            name: name.to_string(),
            rules: RuleTable::new(rule_count),
            map: RegisterMap::new(rule_count),
            classify: ClassifyStage::new(),
            forward: ForwardStage::new(),
            counters: Counters::new(rule_count),
            activity: ActivityStats::default(),
            in_reset: false,
            log: providers.log,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn register_map(&self) -> &RegisterMap {
        &self.map
    }

    /// The input port's ready, given the consumer's ready on this same
    /// tick.
    pub fn s_ready(&self, m_ready: bool) -> bool {
        !self.in_reset && self.classify.ready(self.forward.ready(m_ready))
    }

    /// The output port's valid.
    pub fn m_valid(&self) -> bool {
        !self.in_reset && self.forward.is_valid()
    }

    /// The beat currently presented on the output port.
    pub fn peek_output(&self) -> Option<&Beat> {
        if self.in_reset { None } else { self.forward.peek() }
    }

    /// True if a packet has been started on the input but its last
    /// beat has not yet been accepted.
    pub fn in_packet(&self) -> bool {
        self.classify.state() == ClassifyState::InPacket
    }

    /// True if no beat is held anywhere in the pipeline.
    pub fn is_drained(&self) -> bool {
        !self.classify.is_valid() && !self.forward.is_valid()
    }

    /// Advance the pipeline one clock tick.
    ///
    /// `s_axis` is the beat the producer presents (its valid), and
    /// `m_ready` is the consumer's ready. The producer must keep
    /// presenting the same beat until [`Tick::accepted`] is true.
    pub fn tick(&mut self, s_axis: Option<&Beat>, m_ready: bool) -> Tick {
        if self.in_reset {
            return Tick::default();
        }

        let fwd_ready = self.forward.ready(m_ready);
        let s_ready = self.classify.ready(fwd_ready);
        let input = s_axis.filter(|_| fire(true, s_ready));
        let out_held = self.forward.is_valid();

        let cls = self.classify.clock(&self.rules, fwd_ready, input);
        let fwd = self.forward.clock(m_ready, cls.out);

        let packet_start = cls.start.map(|start| start.result);
        if let Some(res) = &packet_start {
            self.counters.record(res);
        }

        let stats = &mut self.activity;
        stats.cycles += 1;
        if input.is_some() {
            stats.beats_in += 1;
        } else if s_axis.is_some() {
            stats.in_stalls += 1;
        }
        if fwd.emitted.is_some() {
            stats.beats_out += 1;
        } else if out_held {
            stats.out_stalls += 1;
        }
        if fwd.dropped {
            stats.beats_dropped += 1;
        }

        Tick {
            s_ready,
            accepted: input.is_some(),
            emitted: fwd.emitted,
            packet_start,
        }
    }

    /// Drive the level-sensitive reset.
    ///
    /// While asserted every pipeline register, the packet latch, the
    /// counters and the activity stats are held at zero and the input
    /// is not ready. The rule table is configuration and survives.
    pub fn set_reset(&mut self, asserted: bool) {
        if asserted != self.in_reset {
            let edge = if asserted { "asserted" } else { "released" };
            let msg = format!("{}: reset {edge}", self.name);
            self.log.log(LogLevel::Note, &msg);
        }

        self.in_reset = asserted;
        if asserted {
            self.classify.reset();
            self.forward.reset();
            self.counters.clear();
            self.activity = ActivityStats::default();
        }
    }

    pub fn in_reset(&self) -> bool {
        self.in_reset
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Replace a whole rule. The change applies from the next packet
    /// start onwards.
    pub fn set_rule(&mut self, idx: usize, rule: Rule) -> bool {
        if !self.rules.set(idx, rule) {
            let msg = format!(
                "{}: ignoring rule {idx}: table has {} rules",
                self.name,
                self.rules.len()
            );
            self.log.log(LogLevel::Warn, &msg);
            return false;
        }

        let msg = format!("{}: rule {idx} = {rule}", self.name);
        self.log.log(LogLevel::Note, &msg);
        true
    }

    /// Update one field of one rule.
    pub fn write_rule_field(
        &mut self,
        idx: usize,
        field: RuleField,
        value: u128,
    ) -> bool {
        if !self.rules.set_field(idx, field, value) {
            let msg =
                format!("{}: ignoring {field:?} write to rule {idx}", self.name);
            self.log.log(LogLevel::Warn, &msg);
            return false;
        }

        self.log.log(
            LogLevel::Note,
            &format!("{}: rule {idx} {field:?} = {value:#x}", self.name),
        );
        true
    }

    /// Read the register at byte address `addr`. Unmapped and
    /// unaligned addresses read as zero.
    pub fn reg_read(&self, addr: u32) -> u32 {
        match self.map.decode(addr) {
            Ok(reg) => self.map.read(reg, &self.rules, &self.counters),
            Err(_) => 0,
        }
    }

    /// Write the register at byte address `addr`. Writes to read-only,
    /// unmapped or unaligned addresses change nothing. Returns true if
    /// the write was applied.
    pub fn reg_write(&mut self, addr: u32, val: u32) -> bool {
        let map = self.map;
        let res = map
            .decode(addr)
            .and_then(|reg| map.write(reg, &mut self.rules, val).map(|_| reg));

        match res {
            Ok(reg) => {
                self.log.log(
                    LogLevel::Note,
                    &format!("{}: {reg} <- {val:#010x}", self.name),
                );
                true
            }

            Err(e) => {
                self.log.log(
                    LogLevel::Warn,
                    &format!(
                        "{}: ignoring write of {val:#010x} to {addr:#x}: {e}",
                        self.name
                    ),
                );
                false
            }
        }
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Read one counter. A rule index outside the table reads as zero.
    pub fn read_counter(&self, id: CounterId) -> u32 {
        match id {
            CounterId::TotalPackets => self.counters.total_packets(),
            CounterId::DroppedPackets => self.counters.dropped_packets(),
            CounterId::RuleHits(idx) => self.counters.rule_hit(idx).unwrap_or(0),
        }
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    pub fn activity(&self) -> &ActivityStats {
        &self.activity
    }

    pub fn dump_rules(&self) -> DumpRulesResp {
        let rules = self
            .rules
            .iter()
            .enumerate()
            .map(|(idx, rule)| RuleDump {
                idx,
                hits: self.counters.rule_hit(idx).unwrap_or(0),
                rule: *rule,
            })
            .collect();

        DumpRulesResp { name: self.name.clone(), rules }
    }

    #[cfg(any(feature = "test-help", test))]
    pub fn preload_counters(&mut self, total: u32, dropped: u32, hits: &[u32]) {
        self.counters.preload(total, dropped, hits);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::engine::packet::beats_from_frame;
    use crate::engine::regs::RuleWord;
    use crate::engine::regs::Reg;
    use alloc::vec::Vec;
    use std::sync::Arc;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct CaptureLog(Arc<Mutex<Vec<(LogLevel, String)>>>);

    impl LogProvider for CaptureLog {
        fn log(&self, level: LogLevel, msg: &str) {
            self.0.lock().unwrap().push((level, msg.to_string()));
        }
    }

    impl CaptureLog {
        fn count(&self, level: LogLevel) -> usize {
            self.0.lock().unwrap().iter().filter(|(l, _)| *l == level).count()
        }
    }

    fn ipv4_frame(dst: [u8; 4], port: u16, len: usize) -> Vec<u8> {
        let mut frame = vec![0u8; len];
        frame[12..14].copy_from_slice(&0x0800u16.to_be_bytes());
        frame[14] = 0x45;
        frame[30..34].copy_from_slice(&dst);
        frame[36..38].copy_from_slice(&port.to_be_bytes());
        frame
    }

    fn web_pipeline() -> Pipeline {
        let mut pipe = Pipeline::new("test", 2, Providers::null());
        pipe.set_rule(0, Rule::new().ipv4([192, 168, 1, 1].into()).port(80));
        pipe.set_rule(1, Rule::new().port(443));
        pipe
    }

    fn run(pipe: &mut Pipeline, beats: &[Beat]) -> Vec<Beat> {
        let mut out = Vec::new();
        let mut i = 0;
        for _ in 0..(beats.len() + 10) {
            let tick = pipe.tick(beats.get(i), true);
            if tick.accepted {
                i += 1;
            }
            out.extend(tick.emitted);
        }
        assert_eq!(i, beats.len());
        out
    }

    #[test]
    fn one_beat_per_cycle_with_two_cycle_latency() {
        let mut pipe = web_pipeline();
        let beats = beats_from_frame(&ipv4_frame([192, 168, 1, 1], 80, 640), 3);
        assert_eq!(beats.len(), 10);

        for (cycle, beat) in beats.iter().enumerate() {
            let tick = pipe.tick(Some(beat), true);
            assert!(tick.accepted);
            assert_eq!(tick.packet_start.is_some(), cycle == 0);
            if cycle >= 2 {
                assert_eq!(tick.emitted.as_ref(), Some(&beats[cycle - 2]));
            }
        }

        assert_eq!(pipe.snapshot().rule_hits, vec![1, 0]);
    }

    #[test]
    fn dropped_packet_produces_no_output() {
        let mut pipe = web_pipeline();
        let beats = beats_from_frame(&ipv4_frame([10, 0, 0, 1], 22, 200), 0);
        assert!(run(&mut pipe, &beats).is_empty());

        let snap = pipe.snapshot();
        assert_eq!(snap.total_packets, 1);
        assert_eq!(snap.dropped_packets, 1);
        assert_eq!(pipe.activity().beats_dropped, 4);
        assert_eq!(pipe.activity().beats_out, 0);
    }

    #[test]
    fn backpressure_holds_and_blocks_input() {
        let mut pipe = web_pipeline();
        let beats = beats_from_frame(&ipv4_frame([192, 168, 1, 1], 80, 256), 0);

        // Fill both registers with the consumer stalled.
        assert!(pipe.tick(Some(&beats[0]), false).accepted);
        assert!(pipe.tick(Some(&beats[1]), false).accepted);
        assert!(pipe.m_valid());
        assert!(!pipe.s_ready(false));

        let tick = pipe.tick(Some(&beats[2]), false);
        assert!(!tick.accepted);
        assert!(!tick.s_ready);
        assert_eq!(pipe.peek_output(), Some(&beats[0]));

        // Releasing the consumer opens the input on the same tick.
        assert!(pipe.s_ready(true));
        let tick = pipe.tick(Some(&beats[2]), true);
        assert!(tick.accepted);
        assert_eq!(tick.emitted, Some(beats[0]));

        assert_eq!(pipe.activity().in_stalls, 1);
        assert_eq!(pipe.activity().out_stalls, 1);
    }

    #[test]
    fn reset_clears_state_but_keeps_rules() {
        let log = CaptureLog::default();
        let mut pipe =
            Pipeline::new("test", 2, Providers { log: Box::new(log.clone()) });
        pipe.set_rule(1, Rule::new().port(80));

        let beats = beats_from_frame(&ipv4_frame([1, 2, 3, 4], 80, 128), 0);
        pipe.tick(Some(&beats[0]), false);
        assert!(pipe.in_packet());
        assert_eq!(pipe.read_counter(CounterId::TotalPackets), 1);

        pipe.set_reset(true);
        assert!(!pipe.s_ready(true));
        assert!(!pipe.m_valid());
        assert!(!pipe.tick(Some(&beats[1]), true).accepted);
        assert_eq!(pipe.snapshot(), Counters::new(2).snapshot());

        pipe.set_reset(false);
        assert!(!pipe.in_packet());
        assert!(pipe.is_drained());
        assert_eq!(pipe.rules().get(1), Some(&Rule::new().port(80)));
        assert_eq!(log.count(LogLevel::Note), 3);
    }

    #[test]
    fn register_writes() {
        let log = CaptureLog::default();
        let mut pipe =
            Pipeline::new("test", 2, Providers { log: Box::new(log.clone()) });
        let map = *pipe.register_map();

        let ipv4 = map.addr_of(Reg::Rule { idx: 0, word: RuleWord::Ipv4 }).unwrap();
        assert!(pipe.reg_write(ipv4, 0xC0A8_0101));
        assert_eq!(pipe.reg_read(ipv4), 0xC0A8_0101);

        let total = map.addr_of(Reg::Counter(CounterId::TotalPackets)).unwrap();
        assert!(!pipe.reg_write(total, 5));
        assert!(!pipe.reg_write(0x1000, 5));
        assert!(!pipe.reg_write(ipv4 + 1, 5));
        assert_eq!(pipe.reg_read(total), 0);
        assert_eq!(pipe.reg_read(0x1000), 0);
        assert_eq!(log.count(LogLevel::Warn), 3);

        let dump = pipe.dump_rules();
        assert_eq!(dump.rules[0].rule, Rule::new().ipv4([192, 168, 1, 1].into()));
    }

    #[test]
    fn field_writes_out_of_range_are_ignored() {
        let mut pipe = web_pipeline();
        let before = pipe.rules().clone();
        assert!(!pipe.write_rule_field(2, RuleField::Port, 80));
        assert!(!pipe.set_rule(9, Rule::WILDCARD));
        assert_eq!(pipe.rules(), &before);
        assert_eq!(pipe.read_counter(CounterId::RuleHits(7)), 0);
    }
}
