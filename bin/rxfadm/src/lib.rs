// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The userland side of rxfadm: rule files, packet captures, and
//! replaying captures through a simulated filter.

pub mod config;
pub mod log;
pub mod pcap;
pub mod replay;

use rxfilter::engine::Pipeline;
use rxfilter::provider::Providers;
use std::path::Path;

/// Errors related to administering the filter.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse rule file: {0}")]
    Config(#[from] toml::de::Error),

    #[error("pcap error: {0}")]
    Pcap(String),

    #[error("rule file has {configured} rules but the filter has {limit}")]
    TooManyRules { configured: usize, limit: usize },

    #[error("no register for {0}")]
    RuleIndex(usize),

    #[error("register write refused: {0}")]
    RegWrite(String),

    #[error("pipeline failed to drain after {0} cycles")]
    Stalled(u64),
}

/// Build a pipeline of `rule_count` rules, logging to `log`, and load
/// the rules found in the file at `config`.
pub fn load_pipeline(
    config: &Path,
    rule_count: usize,
    log: &slog::Logger,
) -> Result<Pipeline, Error> {
    let cfg = config::Config::load(config)?;
    let providers = Providers { log: Box::new(log::SlogLog::new(log)) };
    let mut pipe = Pipeline::new("rxf0", rule_count, providers);
    cfg.apply(&mut pipe, log)?;
    Ok(pipe)
}
