// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Logging for rxfadm, and the engine's log provider on top of it.

use rxfilter::provider::LogLevel;
use rxfilter::provider::LogProvider;
use slog::Drain;
use slog::Logger;
use slog::error;
use slog::info;
use slog::o;
use slog::warn;

/// A terminal logger filtered by `RUST_LOG`.
pub fn init() -> Logger {
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_envlogger::new(drain).ignore_res();
    let drain = slog_async::Async::new(drain).build().fuse();
    Logger::root(drain, o!())
}

/// Routes engine messages to a [`Logger`].
pub struct SlogLog {
    log: Logger,
}

impl SlogLog {
    pub fn new(log: &Logger) -> Self {
        Self { log: log.new(o!("component" => "engine")) }
    }
}

impl LogProvider for SlogLog {
    fn log(&self, level: LogLevel, msg: &str) {
        match level {
            LogLevel::Note => info!(self.log, "{}", msg),
            LogLevel::Warn => warn!(self.log, "{}", msg),
            LogLevel::Error => error!(self.log, "{}", msg),
        }
    }
}
