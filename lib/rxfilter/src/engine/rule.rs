// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Filter rules and the rule table.
//!
//! A [`Rule`] names a destination IPv4 address, a destination IPv6
//! address, and a destination port. Zero in any field is a wildcard.
//! A packet matches a rule when its address matches the field for its
//! own protocol AND its destination port matches. Rules live in a
//! fixed-size [`RuleTable`]; the lowest index that matches wins.

use super::headers::HeaderView;
use super::headers::L3Proto;
use alloc::vec::Vec;
use core::fmt;
use core::fmt::Display;
use core::net::Ipv4Addr;
use core::net::Ipv6Addr;
use serde::Deserialize;
use serde::Serialize;

/// The rule count of the canonical configuration.
pub const DEFAULT_RULE_COUNT: usize = 2;

/// A single filter rule. The all-zero rule is a catch-all for IPv4
/// and IPv6 traffic.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize,
)]
pub struct Rule {
    pub ipv4_addr: u32,
    pub ipv6_addr: u128,
    pub port: u16,
}

impl Rule {
    pub const WILDCARD: Self = Self { ipv4_addr: 0, ipv6_addr: 0, port: 0 };

    pub fn new() -> Self {
        Self::WILDCARD
    }

    pub fn ipv4(mut self, addr: Ipv4Addr) -> Self {
        self.ipv4_addr = u32::from(addr);
        self
    }

    pub fn ipv6(mut self, addr: Ipv6Addr) -> Self {
        self.ipv6_addr = u128::from(addr);
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn is_wildcard(&self) -> bool {
        *self == Self::WILDCARD
    }

    /// Does this rule match the given header?
    pub fn is_match(&self, hdr: &HeaderView) -> bool {
        let ip_match = match hdr.l3() {
            Some(L3Proto::Ipv4) => {
                self.ipv4_addr == 0 || self.ipv4_addr == hdr.dst_ipv4
            }
            Some(L3Proto::Ipv6) => {
                self.ipv6_addr == 0 || self.ipv6_addr == hdr.dst_ipv6
            }
            None => return false,
        };
        let port_match = self.port == 0 || self.port == hdr.dst_port;

        ip_match && port_match
    }

    /// Update a single field. Values wider than the field are
    /// truncated to its width.
    pub fn set_field(&mut self, field: RuleField, value: u128) {
        match field {
            RuleField::Ipv4Addr => self.ipv4_addr = value as u32,
            RuleField::Ipv6Addr => self.ipv6_addr = value,
            RuleField::Port => self.port = value as u16,
        }
    }

    pub fn field(&self, field: RuleField) -> u128 {
        match field {
            RuleField::Ipv4Addr => u128::from(self.ipv4_addr),
            RuleField::Ipv6Addr => self.ipv6_addr,
            RuleField::Port => u128::from(self.port),
        }
    }
}

impl Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_wildcard() {
            return write!(f, "WILDCARD");
        }

        let mut sep = "";
        if self.ipv4_addr != 0 {
            write!(f, "IPv4:{}", Ipv4Addr::from(self.ipv4_addr))?;
            sep = ", ";
        }
        if self.ipv6_addr != 0 {
            write!(f, "{sep}IPv6:{}", Ipv6Addr::from(self.ipv6_addr))?;
            sep = ", ";
        }
        if self.port != 0 {
            write!(f, "{sep}Port:{}", self.port)?;
        }
        Ok(())
    }
}

/// The writable fields of a rule.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum RuleField {
    Ipv4Addr,
    Ipv6Addr,
    Port,
}

/// The outcome of evaluating a header against the rule table.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize,
)]
pub struct MatchResult {
    pub matched: bool,
    pub rule_index: Option<usize>,
}

impl MatchResult {
    pub const NO_MATCH: Self = Self { matched: false, rule_index: None };

    pub fn hit(idx: usize) -> Self {
        Self { matched: true, rule_index: Some(idx) }
    }
}

/// A fixed-size, ordered table of rules. Index 0 has the highest
/// priority.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    /// Create a table of `count` rules, all zero.
    pub fn new(count: usize) -> Self {
        Self { rules: vec![Rule::WILDCARD; count] }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Rule> {
        self.rules.get(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    /// Replace the rule at `idx`. Returns false, changing nothing,
    /// when `idx` is outside the table.
    pub fn set(&mut self, idx: usize, rule: Rule) -> bool {
        match self.rules.get_mut(idx) {
            Some(slot) => {
                *slot = rule;
                true
            }
            None => false,
        }
    }

    /// Update one field of the rule at `idx`. Returns false, changing
    /// nothing, when `idx` is outside the table.
    pub fn set_field(&mut self, idx: usize, field: RuleField, value: u128) -> bool {
        match self.rules.get_mut(idx) {
            Some(rule) => {
                rule.set_field(field, value);
                true
            }
            None => false,
        }
    }

    /// Find the first (highest priority) rule matching `hdr`.
    pub fn evaluate(&self, hdr: &HeaderView) -> MatchResult {
        self.rules
            .iter()
            .position(|rule| rule.is_match(hdr))
            .map(MatchResult::hit)
            .unwrap_or(MatchResult::NO_MATCH)
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::new(DEFAULT_RULE_COUNT)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::engine::ether::EtherType;

    fn v4_hdr(dst: &str, port: u16) -> HeaderView {
        let dst: Ipv4Addr = dst.parse().unwrap();
        let mut hdr = HeaderView::decode(&[0u8; 64]);
        hdr.ether_type = EtherType::Ipv4;
        hdr.dst_ipv4 = u32::from(dst);
        hdr.dst_port = port;
        hdr
    }

    fn v6_hdr(dst: &str, port: u16) -> HeaderView {
        let dst: Ipv6Addr = dst.parse().unwrap();
        let mut hdr = HeaderView::decode(&[0u8; 64]);
        hdr.ether_type = EtherType::Ipv6;
        hdr.dst_ipv6 = u128::from(dst);
        hdr.dst_port = port;
        hdr
    }

    #[test]
    fn address_and_port_must_both_match() {
        let rule = Rule::new().ipv4("192.168.1.1".parse().unwrap()).port(80);

        assert!(rule.is_match(&v4_hdr("192.168.1.1", 80)));
        assert!(!rule.is_match(&v4_hdr("192.168.1.1", 81)));
        assert!(!rule.is_match(&v4_hdr("192.168.1.2", 80)));
    }

    #[test]
    fn wildcard_address_specific_port() {
        let rule = Rule::new().port(80);

        for dst in ["10.0.0.1", "172.16.0.9", "192.168.1.200"] {
            assert!(rule.is_match(&v4_hdr(dst, 80)));
        }
        assert!(!rule.is_match(&v4_hdr("10.0.0.1", 443)));
        assert!(rule.is_match(&v6_hdr("2001:db8::77", 80)));
    }

    #[test]
    fn catch_all_matches_ip_only() {
        let rule = Rule::WILDCARD;
        assert!(rule.is_match(&v4_hdr("1.2.3.4", 9)));
        assert!(rule.is_match(&v6_hdr("fe80::1", 0)));

        let mut arp = v4_hdr("1.2.3.4", 9);
        arp.ether_type = EtherType::Arp;
        assert!(!rule.is_match(&arp));

        let mut vlan = v4_hdr("1.2.3.4", 9);
        vlan.ether_type = EtherType::Vlan(0x8100);
        assert!(!rule.is_match(&vlan));
    }

    #[test]
    fn ipv4_field_ignored_for_ipv6_packets() {
        // Only the field for the packet's own protocol is consulted.
        let rule = Rule::new().ipv4("10.0.0.1".parse().unwrap());
        assert!(rule.is_match(&v6_hdr("2001:db8::1", 443)));

        let rule = Rule::new().ipv6("2001:db8::1".parse().unwrap()).port(443);
        assert!(rule.is_match(&v6_hdr("2001:db8::1", 443)));
        assert!(!rule.is_match(&v6_hdr("2001:db8::2", 443)));
        assert!(rule.is_match(&v4_hdr("10.9.9.9", 443)));
    }

    #[test]
    fn lowest_index_wins() {
        let mut table = RuleTable::new(2);
        table.set(0, Rule::new().port(80));
        table.set(1, Rule::new().ipv4("192.168.1.1".parse().unwrap()));

        let res = table.evaluate(&v4_hdr("192.168.1.1", 80));
        assert_eq!(res, MatchResult::hit(0));

        let res = table.evaluate(&v4_hdr("192.168.1.1", 22));
        assert_eq!(res, MatchResult::hit(1));

        let res = table.evaluate(&v4_hdr("192.168.1.2", 22));
        assert_eq!(res, MatchResult::NO_MATCH);
        assert!(!res.matched);
    }

    #[test]
    fn out_of_range_writes_are_refused() {
        let mut table = RuleTable::new(2);
        assert!(!table.set(2, Rule::new().port(1)));
        assert!(!table.set_field(5, RuleField::Port, 1));
        assert!(table.iter().all(Rule::is_wildcard));
    }

    #[test]
    fn set_field_truncates() {
        let mut rule = Rule::new();
        rule.set_field(RuleField::Port, 0x1_0050);
        assert_eq!(rule.port, 80);
        rule.set_field(RuleField::Ipv4Addr, 0xFFFF_0A00_0001);
        assert_eq!(rule.ipv4_addr, 0x0A00_0001);
    }

    #[test]
    fn display() {
        assert_eq!(format!("{}", Rule::WILDCARD), "WILDCARD");
        let rule = Rule::new().ipv4("192.168.1.1".parse().unwrap()).port(80);
        assert_eq!(format!("{rule}"), "IPv4:192.168.1.1, Port:80");
        let rule = Rule::new().ipv6("2001:db8::1".parse().unwrap());
        assert_eq!(format!("{rule}"), "IPv6:2001:db8::1");
    }
}
