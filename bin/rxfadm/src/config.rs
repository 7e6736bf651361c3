// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The TOML rule file.
//!
//! ```toml
//! [[rule]]
//! ipv4 = "192.168.1.1"
//! port = 80
//!
//! [[rule]]
//! ipv6 = "2001:db8::1"
//! port = 443
//! ```
//!
//! Any field left out of a rule is a wildcard. Rules beyond those
//! listed in the file are left all-zero.

use crate::Error;
use rxfilter::engine::Pipeline;
use rxfilter::engine::Rule;
use rxfilter::engine::regs::IPV6_WORDS;
use rxfilter::engine::regs::Reg;
use rxfilter::engine::regs::RuleWord;
use serde::Deserialize;
use slog::warn;
use std::net::Ipv4Addr;
use std::net::Ipv6Addr;
use std::path::Path;
use std::str::FromStr;

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default, rename = "rule")]
    pub rules: Vec<RuleCfg>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RuleCfg {
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
    pub port: Option<u16>,
}

impl From<&RuleCfg> for Rule {
    fn from(cfg: &RuleCfg) -> Self {
        let mut rule = Rule::new();
        if let Some(addr) = cfg.ipv4 {
            rule = rule.ipv4(addr);
        }
        if let Some(addr) = cfg.ipv6 {
            rule = rule.ipv6(addr);
        }
        if let Some(port) = cfg.port {
            rule = rule.port(port);
        }
        rule
    }
}

impl FromStr for Config {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, Error> {
        std::fs::read_to_string(path)?.parse()
    }

    /// Program these rules into `pipe` through its register surface.
    pub fn apply(
        &self,
        pipe: &mut Pipeline,
        log: &slog::Logger,
    ) -> Result<(), Error> {
        let limit = pipe.rule_count();
        if self.rules.len() > limit {
            return Err(Error::TooManyRules {
                configured: self.rules.len(),
                limit,
            });
        }

        for (idx, cfg) in self.rules.iter().enumerate() {
            let rule = Rule::from(cfg);
            if rule.is_wildcard() {
                warn!(log, "rule matches all IP traffic"; "rule" => idx);
            }

            for (word, val) in rule_words(&rule) {
                let reg = Reg::Rule { idx, word };
                let addr = pipe
                    .register_map()
                    .addr_of(reg)
                    .ok_or(Error::RuleIndex(idx))?;
                if !pipe.reg_write(addr, val) {
                    return Err(Error::RegWrite(reg.to_string()));
                }
            }
        }

        Ok(())
    }
}

/// The register words that hold `rule`, in address order.
fn rule_words(rule: &Rule) -> Vec<(RuleWord, u32)> {
    let mut words = vec![(RuleWord::Ipv4, rule.ipv4_addr)];
    let v6 = rule.ipv6_addr.to_be_bytes();
    for (n, chunk) in v6.chunks_exact(4).enumerate() {
        let val = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        words.push((RuleWord::Ipv6(n as u8), val));
    }
    debug_assert_eq!(words.len(), 1 + usize::from(IPV6_WORDS));
    words.push((RuleWord::Port, u32::from(rule.port)));
    words
}

#[cfg(test)]
mod test {
    use super::*;
    use rxfilter::provider::Providers;

    const CANONICAL: &str = r#"
[[rule]]
ipv4 = "192.168.1.1"
port = 80

[[rule]]
ipv6 = "2001:db8::1"
port = 443
"#;

    fn quiet() -> slog::Logger {
        slog::Logger::root(slog::Discard, slog::o!())
    }

    #[test]
    fn parse_canonical() {
        let cfg: Config = CANONICAL.parse().unwrap();
        assert_eq!(cfg.rules.len(), 2);
        assert_eq!(cfg.rules[0].ipv4, Some(Ipv4Addr::new(192, 168, 1, 1)));
        assert_eq!(cfg.rules[0].ipv6, None);
        assert_eq!(cfg.rules[1].port, Some(443));
    }

    #[test]
    fn parse_empty() {
        let cfg: Config = "".parse().unwrap();
        assert!(cfg.rules.is_empty());
    }

    #[test]
    fn parse_rejects_junk() {
        let res = "[[rule]]\nproto = 6\n".parse::<Config>();
        assert!(matches!(res, Err(Error::Config(_))));

        let res = "[[rule]]\nipv4 = \"300.1.1.1\"\n".parse::<Config>();
        assert!(matches!(res, Err(Error::Config(_))));
    }

    #[test]
    fn apply_through_registers() {
        let cfg: Config = CANONICAL.parse().unwrap();
        let mut pipe = Pipeline::new("cfg", 2, Providers::null());
        cfg.apply(&mut pipe, &quiet()).unwrap();

        let expected = [
            Rule::new().ipv4(Ipv4Addr::new(192, 168, 1, 1)).port(80),
            Rule::new()
                .ipv6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1))
                .port(443),
        ];
        let got: Vec<Rule> = pipe.rules().iter().copied().collect();
        assert_eq!(got, expected);

        assert_eq!(pipe.reg_read(0x00), 0xC0A8_0101);
        assert_eq!(pipe.reg_read(0x14), 80);
        assert_eq!(pipe.reg_read(0x1C), 0x2001_0DB8);
        assert_eq!(pipe.reg_read(0x28), 0x0000_0001);
    }

    #[test]
    fn apply_leaves_unlisted_rules() {
        let cfg: Config = "[[rule]]\nport = 22\n".parse().unwrap();
        let mut pipe = Pipeline::new("cfg", 3, Providers::null());
        cfg.apply(&mut pipe, &quiet()).unwrap();
        assert_eq!(pipe.rules().get(0), Some(&Rule::new().port(22)));
        assert_eq!(pipe.rules().get(1), Some(&Rule::WILDCARD));
        assert_eq!(pipe.rules().get(2), Some(&Rule::WILDCARD));
    }

    #[test]
    fn apply_too_many_rules() {
        let cfg: Config = CANONICAL.parse().unwrap();
        let mut pipe = Pipeline::new("cfg", 1, Providers::null());
        let res = cfg.apply(&mut pipe, &quiet());
        assert!(matches!(
            res,
            Err(Error::TooManyRules { configured: 2, limit: 1 })
        ));
        assert_eq!(pipe.rules().get(0), Some(&Rule::WILDCARD));
    }
}
