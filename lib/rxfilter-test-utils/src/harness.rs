// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! A cycle-by-cycle stream harness.
//!
//! The harness plays the part of both the producer on the input port
//! and the consumer on the output port. It checks the stream protocol
//! on every tick: a presented beat is held until accepted, and the
//! output beat does not change while the consumer stalls it.

use rxfilter::engine::MatchResult;
use rxfilter::engine::Pipeline;
use rxfilter::engine::packet::Reassembler;
use rxfilter::engine::packet::beats_from_frame;
use rxfilter::engine::packet::frame_from_beats;
use rxfilter::engine::stream::Beat;

/// A valid or ready waveform.
#[derive(Clone, Debug)]
pub enum Pattern {
    Always,
    /// Deasserted on every `n`th cycle.
    DropEvery(u64),
    /// Asserted on every `n`th cycle only.
    OnlyEvery(u64),
    /// Repeats the given sequence.
    Cycle(Vec<bool>),
}

impl Pattern {
    pub fn at(&self, cycle: u64) -> bool {
        match self {
            Self::Always => true,
            Self::DropEvery(n) => *n == 0 || (cycle + 1) % n != 0,
            Self::OnlyEvery(n) => *n <= 1 || cycle % n == 0,
            Self::Cycle(seq) if seq.is_empty() => true,
            Self::Cycle(seq) => seq[(cycle % seq.len() as u64) as usize],
        }
    }
}

/// A frame seen at the output port.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OutFrame {
    pub data: Vec<u8>,
    pub user: u64,
    pub beats: Vec<Beat>,
}

#[derive(Clone, Debug, Default)]
pub struct RunResult {
    pub frames: Vec<OutFrame>,
    pub decisions: Vec<MatchResult>,
    pub cycles: u64,
    /// The input port's ready, one entry per cycle.
    pub s_ready: Vec<bool>,
}

pub struct Harness {
    pub src_valid: Pattern,
    pub sink_ready: Pattern,
    pub max_cycles: u64,
    cycle: u64,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    pub fn new() -> Self {
        Self {
            src_valid: Pattern::Always,
            sink_ready: Pattern::Always,
            max_cycles: 1_000_000,
            cycle: 0,
        }
    }

    pub fn src_valid(mut self, pattern: Pattern) -> Self {
        self.src_valid = pattern;
        self
    }

    pub fn sink_ready(mut self, pattern: Pattern) -> Self {
        self.sink_ready = pattern;
        self
    }

    /// Push `frames` through the pipeline, tagging each beat with the
    /// index of its frame, and run until the pipeline drains.
    pub fn run(&mut self, pipe: &mut Pipeline, frames: &[Vec<u8>]) -> RunResult {
        let beats: Vec<Beat> = frames
            .iter()
            .enumerate()
            .flat_map(|(i, f)| beats_from_frame(f, i as u64))
            .collect();
        self.run_beats(pipe, &beats)
    }

    /// Push raw beats through the pipeline and run until it drains.
    pub fn run_beats(&mut self, pipe: &mut Pipeline, beats: &[Beat]) -> RunResult {
        let mut res = RunResult::default();
        let mut ra = Reassembler::new();
        let mut next = 0;
        let mut presenting = false;
        let start = self.cycle;

        while next < beats.len() || !pipe.is_drained() {
            let elapsed = self.cycle - start;
            assert!(
                elapsed < self.max_cycles,
                "pipeline did not drain after {elapsed} cycles"
            );

            let valid = next < beats.len()
                && (presenting || self.src_valid.at(self.cycle));
            let m_ready = self.sink_ready.at(self.cycle);
            let s_axis = if valid { Some(&beats[next]) } else { None };

            let held = pipe.peek_output().copied();
            let s_ready = pipe.s_ready(m_ready);
            let tick = pipe.tick(s_axis, m_ready);

            assert_eq!(tick.s_ready, s_ready, "cycle {}", self.cycle);
            res.s_ready.push(tick.s_ready);

            if tick.accepted {
                next += 1;
                presenting = false;
            } else {
                presenting = valid;
            }

            match (held, tick.emitted) {
                (Some(h), Some(e)) => assert_eq!(h, e),
                (None, Some(e)) => panic!("emitted {e:?} without valid"),
                (Some(h), None) => {
                    assert!(!m_ready, "valid output not taken while ready");
                    assert_eq!(pipe.peek_output(), Some(&h));
                }
                (None, None) => {}
            }

            if let Some(beat) = tick.emitted {
                if let Some(pkt) = ra.push(beat) {
                    res.frames.push(OutFrame {
                        data: frame_from_beats(&pkt),
                        user: pkt[0].user(),
                        beats: pkt,
                    });
                }
            }

            res.decisions.extend(tick.packet_start);
            self.cycle += 1;
            res.cycles += 1;
        }

        assert!(!ra.in_packet(), "output ended mid-packet");
        res
    }
}
