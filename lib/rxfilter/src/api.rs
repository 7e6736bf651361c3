// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Types shared between the engine and whoever administers it.

use crate::engine::rule::Rule;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::fmt::Display;
use core::str::FromStr;
use serde::Deserialize;
use serde::Serialize;

pub use crate::engine::rule::RuleField;

/// A read-only counter of the register surface.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum CounterId {
    RuleHits(usize),
    TotalPackets,
    DroppedPackets,
}

impl Display for CounterId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::RuleHits(idx) => write!(f, "rule{idx}_hit_count"),
            Self::TotalPackets => write!(f, "total_packets"),
            Self::DroppedPackets => write!(f, "dropped_packets"),
        }
    }
}

impl FromStr for CounterId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "total_packets" => Ok(Self::TotalPackets),
            "dropped_packets" => Ok(Self::DroppedPackets),
            _ => s
                .strip_prefix("rule")
                .and_then(|rest| rest.strip_suffix("_hit_count"))
                .and_then(|idx| idx.parse().ok())
                .map(Self::RuleHits)
                .ok_or_else(|| format!("unknown counter: {s}")),
        }
    }
}

/// A point-in-time copy of all counters.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct CounterSnapshot {
    pub total_packets: u32,
    pub dropped_packets: u32,
    pub rule_hits: Vec<u32>,
}

impl CounterSnapshot {
    pub fn get(&self, id: CounterId) -> Option<u32> {
        match id {
            CounterId::TotalPackets => Some(self.total_packets),
            CounterId::DroppedPackets => Some(self.dropped_packets),
            CounterId::RuleHits(idx) => self.rule_hits.get(idx).copied(),
        }
    }
}

/// The rule table, along with the hits for each rule.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DumpRulesResp {
    pub name: String,
    pub rules: Vec<RuleDump>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RuleDump {
    pub idx: usize,
    pub hits: u32,
    pub rule: Rule,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn counter_names_round_trip() {
        for id in [
            CounterId::RuleHits(0),
            CounterId::RuleHits(11),
            CounterId::TotalPackets,
            CounterId::DroppedPackets,
        ] {
            let s = id.to_string();
            assert_eq!(s.parse::<CounterId>(), Ok(id));
        }

        assert!("rule_hit_count".parse::<CounterId>().is_err());
        assert!("bogus".parse::<CounterId>().is_err());
    }

    #[test]
    fn snapshot_lookup() {
        let snap = CounterSnapshot {
            total_packets: 3,
            dropped_packets: 1,
            rule_hits: vec![2, 0],
        };
        assert_eq!(snap.get(CounterId::RuleHits(0)), Some(2));
        assert_eq!(snap.get(CounterId::RuleHits(2)), None);
        assert_eq!(snap.get(CounterId::TotalPackets), Some(3));
    }
}
