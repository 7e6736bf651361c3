// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The address-mapped register surface.
//!
//! Registers are 32-bit words at byte addresses. For a table of N
//! rules the layout is:
//!
//! ```text
//! word 6i + 0      rule i IPv4 address                 rw
//! word 6i + 1..=4  rule i IPv6 address, MS word first  rw
//! word 6i + 5      rule i port (low 16 bits)           rw
//! word 6N + i      rule i hit count                    ro
//! word 7N          total packets                       ro
//! word 7N + 1      dropped packets                     ro
//! ```

use super::rule::RuleField;
use super::rule::RuleTable;
use super::stat::Counters;
use crate::api::CounterId;
use core::fmt;
use core::fmt::Display;

/// Size of a register in bytes.
pub const REG_WORD_SZ: u32 = 4;

/// Register words occupied by each rule.
pub const WORDS_PER_RULE: u32 = 6;

/// The number of 32-bit words making up an IPv6 address.
pub const IPV6_WORDS: u8 = 4;

/// One word of a rule.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum RuleWord {
    Ipv4,
    /// Word `n` of the IPv6 address, 0 being the most significant.
    Ipv6(u8),
    Port,
}

impl RuleWord {
    pub fn field(&self) -> RuleField {
        match self {
            Self::Ipv4 => RuleField::Ipv4Addr,
            Self::Ipv6(_) => RuleField::Ipv6Addr,
            Self::Port => RuleField::Port,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Reg {
    Rule { idx: usize, word: RuleWord },
    Counter(CounterId),
}

impl Reg {
    pub fn is_writable(&self) -> bool {
        matches!(self, Self::Rule { .. })
    }
}

impl Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Rule { idx, word: RuleWord::Ipv4 } => {
                write!(f, "rule{idx}_ipv4_addr")
            }
            Self::Rule { idx, word: RuleWord::Ipv6(n) } => {
                write!(f, "rule{idx}_ipv6_addr_{n}")
            }
            Self::Rule { idx, word: RuleWord::Port } => {
                write!(f, "rule{idx}_port")
            }
            Self::Counter(id) => write!(f, "{id}"),
        }
    }
}

/// Why a register access could not be applied.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RegError {
    Unaligned,
    Unmapped,
    ReadOnly(Reg),
}

impl Display for RegError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Unaligned => write!(f, "unaligned address"),
            Self::Unmapped => write!(f, "no register at address"),
            Self::ReadOnly(reg) => write!(f, "{reg} is read-only"),
        }
    }
}

/// The register layout for a given rule count.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RegisterMap {
    rule_count: usize,
}

impl RegisterMap {
    pub fn new(rule_count: usize) -> Self {
        Self { rule_count }
    }

    pub fn rule_count(&self) -> usize {
        self.rule_count
    }

    /// The number of words in the map.
    pub fn len_words(&self) -> u32 {
        (self.rule_count as u32) * (WORDS_PER_RULE + 1) + 2
    }

    fn counters_base(&self) -> u32 {
        (self.rule_count as u32) * WORDS_PER_RULE
    }

    /// Find the register at the byte address `addr`.
    pub fn decode(&self, addr: u32) -> Result<Reg, RegError> {
        if addr % REG_WORD_SZ != 0 {
            return Err(RegError::Unaligned);
        }

        let word = addr / REG_WORD_SZ;
        let base = self.counters_base();
        let n = self.rule_count as u32;

        if word < base {
            let idx = (word / WORDS_PER_RULE) as usize;
            let word = match word % WORDS_PER_RULE {
                0 => RuleWord::Ipv4,
                5 => RuleWord::Port,
                w => RuleWord::Ipv6((w - 1) as u8),
            };
            return Ok(Reg::Rule { idx, word });
        }

        let off = word - base;
        let id = if off < n {
            CounterId::RuleHits(off as usize)
        } else if off == n {
            CounterId::TotalPackets
        } else if off == n + 1 {
            CounterId::DroppedPackets
        } else {
            return Err(RegError::Unmapped);
        };

        Ok(Reg::Counter(id))
    }

    /// The byte address of `reg`, if it exists in this map.
    pub fn addr_of(&self, reg: Reg) -> Option<u32> {
        let n = self.rule_count as u32;
        let word = match reg {
            Reg::Rule { idx, word } => {
                if idx >= self.rule_count {
                    return None;
                }
                let off = match word {
                    RuleWord::Ipv4 => 0,
                    RuleWord::Ipv6(w) if w < IPV6_WORDS => 1 + u32::from(w),
                    RuleWord::Ipv6(_) => return None,
                    RuleWord::Port => 5,
                };
                (idx as u32) * WORDS_PER_RULE + off
            }
            Reg::Counter(CounterId::RuleHits(idx)) => {
                if idx >= self.rule_count {
                    return None;
                }
                self.counters_base() + idx as u32
            }
            Reg::Counter(CounterId::TotalPackets) => self.counters_base() + n,
            Reg::Counter(CounterId::DroppedPackets) => {
                self.counters_base() + n + 1
            }
        };

        Some(word * REG_WORD_SZ)
    }

    /// Every register in address order, with its byte address.
    pub fn iter(&self) -> impl Iterator<Item = (u32, Reg)> + '_ {
        (0..self.len_words()).filter_map(move |w| {
            let addr = w * REG_WORD_SZ;
            self.decode(addr).ok().map(|reg| (addr, reg))
        })
    }

    /// Read a register's current value.
    pub fn read(&self, reg: Reg, rules: &RuleTable, counters: &Counters) -> u32 {
        match reg {
            Reg::Rule { idx, word } => {
                let Some(rule) = rules.get(idx) else {
                    return 0;
                };
                match word {
                    RuleWord::Ipv4 => rule.ipv4_addr,
                    RuleWord::Ipv6(n) => match ipv6_word_shift(n) {
                        Some(shift) => (rule.ipv6_addr >> shift) as u32,
                        None => 0,
                    },
                    RuleWord::Port => u32::from(rule.port),
                }
            }

            Reg::Counter(CounterId::TotalPackets) => counters.total_packets(),
            Reg::Counter(CounterId::DroppedPackets) => {
                counters.dropped_packets()
            }
            Reg::Counter(CounterId::RuleHits(idx)) => {
                counters.rule_hit(idx).unwrap_or(0)
            }
        }
    }

    /// Apply a write of `val` to `reg`.
    pub fn write(
        &self,
        reg: Reg,
        rules: &mut RuleTable,
        val: u32,
    ) -> Result<(), RegError> {
        let Reg::Rule { idx, word } = reg else {
            return Err(RegError::ReadOnly(reg));
        };

        let Some(rule) = rules.get(idx) else {
            return Err(RegError::Unmapped);
        };

        let new = match word {
            RuleWord::Ipv4 | RuleWord::Port => u128::from(val),
            RuleWord::Ipv6(n) => {
                let shift = ipv6_word_shift(n).ok_or(RegError::Unmapped)?;
                let mask = u128::from(u32::MAX) << shift;
                (rule.ipv6_addr & !mask) | (u128::from(val) << shift)
            }
        };

        if rules.set_field(idx, word.field(), new) {
            Ok(())
        } else {
            Err(RegError::Unmapped)
        }
    }
}

fn ipv6_word_shift(n: u8) -> Option<u32> {
    let from_low = IPV6_WORDS.checked_sub(1)?.checked_sub(n)?;
    Some(32 * u32::from(from_low))
}
