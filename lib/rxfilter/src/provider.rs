// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Providers allow the engine to run in different contexts by letting
//! the host plug in implementations of core services. Today that is
//! only logging: a unit test maps it to `println!`, the userland
//! driver maps it to `slog`, and an embedded host may discard it.

use alloc::boxed::Box;
use core::fmt;
use core::fmt::Display;

/// The set of all host-specific providers required by a pipeline.
pub struct Providers {
    pub log: Box<dyn LogProvider>,
}

impl Providers {
    /// Providers which discard everything.
    pub fn null() -> Self {
        Self { log: Box::new(NullLog) }
    }
}

/// A logging provider provides the means to log messages to some
/// destination based on the context in which the engine is running.
///
/// Logging levels are provided by [`LogLevel`]. These levels will map
/// to the underlying provider with varying degrees of success.
pub trait LogProvider: Send + Sync {
    /// Log a message at the specified level.
    fn log(&self, level: LogLevel, msg: &str);
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LogLevel {
    Note,
    Warn,
    Error,
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let level_s = match self {
            Self::Note => "[NOTE]",
            Self::Warn => "[WARN]",
            Self::Error => "[ERROR]",
        };
        write!(f, "{level_s}")
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NullLog;

impl LogProvider for NullLog {
    fn log(&self, _level: LogLevel, _msg: &str) {}
}

cfg_if! {
    if #[cfg(any(feature = "std", test))] {
        #[derive(Clone, Copy, Debug, Default)]
        pub struct PrintlnLog;

        impl LogProvider for PrintlnLog {
            fn log(&self, level: LogLevel, msg: &str) {
                println!("{level} {msg}");
            }
        }
    }
}
