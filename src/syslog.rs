// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Diagnostic logging setup.
//!
//! The driver logs through the `log` macros. `init` installs an `env_logger` backend writing to
//! stderr; it is safe to call once per driver instance since only the first call in the process
//! installs a logger. `RUST_LOG` takes precedence over the configured level.

use log::debug;
use log::LevelFilter;

use crate::config::DriverConfig;

/// Target used for entry point tracing.
pub const TRACE_TARGET: &str = "va_trace";

fn level(config: &DriverConfig) -> LevelFilter {
    if config.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    }
}

pub fn init(config: &DriverConfig) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level(config));
    if config.trace {
        builder.filter_module(TRACE_TARGET, LevelFilter::Trace);
    }
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    // An error only means that a logger is already installed, either by an earlier driver
    // instance or by the host process.
    if builder.try_init().is_err() {
        debug!("logger already installed");
    }
}
