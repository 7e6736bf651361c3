// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Packet statistics.
//!
//! [`Counters`] are the architectural counters visible through the
//! register surface. They are 32 bits wide and wrap modulo 2^32, so
//! `total == dropped + sum(rule_hits)` holds in modular arithmetic at
//! all times.
//!
//! [`ActivityStats`] are wide, software-only counters describing how
//! busy the pipeline has been. They are not part of the register map.

use super::rule::MatchResult;
use crate::api::CounterSnapshot;
use alloc::vec::Vec;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Counters {
    total_packets: u32,
    dropped_packets: u32,
    rule_hits: Vec<u32>,
}

impl Counters {
    pub fn new(rule_count: usize) -> Self {
        Self { total_packets: 0, dropped_packets: 0, rule_hits: vec![0; rule_count] }
    }

    /// Record the decision for one packet. Called exactly once per
    /// packet, when its first beat is accepted.
    pub fn record(&mut self, res: &MatchResult) {
        self.total_packets = self.total_packets.wrapping_add(1);

        // A hit on a rule we have no counter for is booked as a drop
        // so that the totals still balance.
        let hits = res
            .rule_index
            .filter(|_| res.matched)
            .and_then(|idx| self.rule_hits.get_mut(idx));

        match hits {
            Some(hits) => *hits = hits.wrapping_add(1),
            None => {
                self.dropped_packets = self.dropped_packets.wrapping_add(1);
            }
        }
    }

    pub fn total_packets(&self) -> u32 {
        self.total_packets
    }

    pub fn dropped_packets(&self) -> u32 {
        self.dropped_packets
    }

    pub fn rule_hits(&self) -> &[u32] {
        &self.rule_hits
    }

    pub fn rule_hit(&self, idx: usize) -> Option<u32> {
        self.rule_hits.get(idx).copied()
    }

    /// Check the accounting invariant (modulo 2^32).
    pub fn is_consistent(&self) -> bool {
        let hits =
            self.rule_hits.iter().fold(0u32, |acc, h| acc.wrapping_add(*h));
        self.total_packets == self.dropped_packets.wrapping_add(hits)
    }

    pub fn clear(&mut self) {
        self.total_packets = 0;
        self.dropped_packets = 0;
        self.rule_hits.iter_mut().for_each(|h| *h = 0);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            total_packets: self.total_packets,
            dropped_packets: self.dropped_packets,
            rule_hits: self.rule_hits.clone(),
        }
    }

    /// Preload counter values, e.g. to exercise wraparound without
    /// pushing 2^32 packets. The caller is responsible for loading a
    /// consistent set.
    #[cfg(any(feature = "test-help", test))]
    pub fn preload(&mut self, total: u32, dropped: u32, hits: &[u32]) {
        self.total_packets = total;
        self.dropped_packets = dropped;
        for (dst, src) in self.rule_hits.iter_mut().zip(hits) {
            *dst = *src;
        }
    }
}

/// How busy the pipeline has been since the last reset.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ActivityStats {
    /// Ticks with reset deasserted.
    pub cycles: u64,
    /// Beats accepted at the input port.
    pub beats_in: u64,
    /// Beats delivered at the output port.
    pub beats_out: u64,
    /// Beats consumed without forwarding because their packet was
    /// dropped.
    pub beats_dropped: u64,
    /// Ticks where the input presented a beat but was not ready.
    pub in_stalls: u64,
    /// Ticks where the output held a beat but the consumer was not
    /// ready.
    pub out_stalls: u64,
}

impl ActivityStats {
    /// Output beats per cycle, in percent of line rate.
    pub fn efficiency_pct(&self) -> f64 {
        if self.cycles == 0 {
            return 0.0;
        }
        (self.beats_out as f64 / self.cycles as f64) * 100.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn outcomes_are_exclusive() {
        let mut c = Counters::new(2);
        c.record(&MatchResult::hit(0));
        c.record(&MatchResult::hit(1));
        c.record(&MatchResult::hit(1));
        c.record(&MatchResult::NO_MATCH);

        assert_eq!(c.total_packets(), 4);
        assert_eq!(c.dropped_packets(), 1);
        assert_eq!(c.rule_hits(), &[1, 2]);
        assert!(c.is_consistent());
    }

    #[test]
    fn counters_wrap() {
        let mut c = Counters::new(2);
        c.preload(u32::MAX, 0, &[u32::MAX, 0]);
        assert!(c.is_consistent());

        c.record(&MatchResult::hit(0));
        assert_eq!(c.total_packets(), 0);
        assert_eq!(c.rule_hit(0), Some(0));
        assert!(c.is_consistent());

        c.record(&MatchResult::NO_MATCH);
        assert_eq!(c.total_packets(), 1);
        assert_eq!(c.dropped_packets(), 1);
        assert!(c.is_consistent());
    }

    #[test]
    fn hit_beyond_table_is_a_drop() {
        let mut c = Counters::new(2);
        c.record(&MatchResult::hit(3));
        assert_eq!(c.total_packets(), 1);
        assert_eq!(c.dropped_packets(), 1);
        assert_eq!(c.rule_hits(), &[0, 0]);
        assert!(c.is_consistent());
    }

    #[test]
    fn clear_zeroes_everything() {
        let mut c = Counters::new(3);
        c.record(&MatchResult::hit(2));
        c.clear();
        assert_eq!(c, Counters::new(3));
    }

    #[test]
    fn efficiency() {
        let stats = ActivityStats { cycles: 200, beats_out: 150, ..Default::default() };
        assert_eq!(stats.efficiency_pct(), 75.0);
        assert_eq!(ActivityStats::default().efficiency_pct(), 0.0);
    }
}
