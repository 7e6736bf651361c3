// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The forwarding stage.
//!
//! Beats of passing packets are captured into the output register and
//! held until the consumer takes them. Beats of dropped packets are
//! accepted under exactly the same readiness but never captured, so a
//! dropped packet paces the upstream identically to a passing one.

use super::classify::Classified;
use super::stream::Beat;
use super::stream::PipeReg;

#[derive(Clone, Copy, Debug, Default)]
pub struct ForwardStep {
    /// The beat delivered to the consumer on this tick.
    pub emitted: Option<Beat>,
    /// True if a beat of a dropped packet was consumed on this tick.
    pub dropped: bool,
}

#[derive(Clone, Debug, Default)]
pub struct ForwardStage {
    reg: PipeReg<Beat>,
}

impl ForwardStage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ready(&self, m_ready: bool) -> bool {
        self.reg.ready(m_ready)
    }

    /// The output port's valid.
    pub fn is_valid(&self) -> bool {
        self.reg.is_valid()
    }

    pub fn peek(&self) -> Option<&Beat> {
        self.reg.peek()
    }

    /// Advance one clock edge. `input` is the classified beat moving
    /// into this stage on this tick.
    pub fn clock(&mut self, m_ready: bool, input: Option<Classified>) -> ForwardStep {
        let dropped = matches!(input, Some(c) if !c.filter_pass);
        let load = input.filter(|c| c.filter_pass).map(|c| c.beat);
        let emitted = self.reg.clock(m_ready, load);

        ForwardStep { emitted, dropped }
    }

    pub fn reset(&mut self) {
        self.reg.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::engine::stream::BEAT_BYTES;

    fn classified(pass: bool, last: bool, user: u64) -> Classified {
        Classified {
            beat: Beat::new([0xEE; BEAT_BYTES], u64::MAX, last, user),
            filter_pass: pass,
            rule_hit: pass.then_some(0),
        }
    }

    #[test]
    fn passing_beat_is_forwarded_unchanged() {
        let mut stage = ForwardStage::new();
        let c = classified(true, true, 42);

        let step = stage.clock(true, Some(c));
        assert!(step.emitted.is_none());
        assert!(!step.dropped);
        assert_eq!(stage.peek(), Some(&c.beat));

        let step = stage.clock(true, None);
        assert_eq!(step.emitted, Some(c.beat));
    }

    #[test]
    fn dropped_beat_is_consumed() {
        let mut stage = ForwardStage::new();
        let step = stage.clock(true, Some(classified(false, true, 0)));
        assert!(step.dropped);
        assert!(!stage.is_valid());
    }

    #[test]
    fn holds_under_backpressure() {
        let mut stage = ForwardStage::new();
        let c = classified(true, false, 1);
        stage.clock(false, Some(c));

        for _ in 0..5 {
            assert!(!stage.ready(false));
            let step = stage.clock(false, None);
            assert!(step.emitted.is_none());
        }

        assert!(stage.ready(true));
        let step = stage.clock(true, None);
        assert_eq!(step.emitted, Some(c.beat));
    }
}
