// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Driver configuration.
//!
//! The configuration is built once when the driver is loaded and handed to
//! [`Driver::initialize`](crate::Driver::initialize). It starts from the defaults, is overlaid
//! with the JSON file named by `VDPAU_VIDEO_CONFIG` if any, and then with the individual
//! `VDPAU_VIDEO_*` environment variables.

use std::env;
use std::fs;
use std::path::Path;

use anyhow::bail;
use anyhow::Context;
use log::warn;
use serde::Deserialize;
use serde::Serialize;

pub const CONFIG_FILE_ENV: &str = "VDPAU_VIDEO_CONFIG";
pub const DEBUG_ENV: &str = "VDPAU_VIDEO_DEBUG";
pub const TRACE_ENV: &str = "VDPAU_VIDEO_TRACE";
pub const OUTPUT_BUFFERS_ENV: &str = "VDPAU_VIDEO_OUTPUT_BUFFERS";
pub const OUTPUT_GRANULARITY_ENV: &str = "VDPAU_VIDEO_OUTPUT_GRANULARITY";

pub const MIN_OUTPUT_BUFFERS: usize = 2;
pub const MAX_OUTPUT_BUFFERS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct DriverConfig {
    /// Log at debug level instead of warnings only.
    pub debug: bool,
    /// Log every entry point with its arguments and result.
    pub trace: bool,
    /// Presentation buffers per drawable: 2 for double buffering, 3 for triple buffering.
    pub output_buffers: usize,
    /// Presentation buffer sizes are rounded up to a multiple of this. Power of two.
    pub output_granularity: u32,
    /// Slots added to an object heap each time it runs out.
    pub heap_increment: usize,
    /// Number of past source surfaces kept by each video mixer for deinterlacing.
    pub deinterlace_history: usize,
    /// Whether subpictures may be blended with a global alpha value.
    pub subpicture_global_alpha: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            debug: false,
            trace: false,
            output_buffers: MIN_OUTPUT_BUFFERS,
            output_granularity: 128,
            heap_increment: 16,
            deinterlace_history: 3,
            subpicture_global_alpha: true,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "1" | "yes" | "true" | "on" => Some(true),
        "0" | "no" | "false" | "off" => Some(false),
        _ => None,
    }
}

impl DriverConfig {
    /// Builds the configuration from the process environment.
    ///
    /// Unreadable files and invalid values are reported and ignored.
    pub fn from_env() -> DriverConfig {
        let mut config = match env::var_os(CONFIG_FILE_ENV) {
            Some(path) => DriverConfig::from_file(Path::new(&path)).unwrap_or_else(|e| {
                warn!("ignoring configuration file: {:#}", e);
                DriverConfig::default()
            }),
            None => DriverConfig::default(),
        };
        config.apply_overrides(|name| env::var(name).ok());
        config
    }

    /// Reads a JSON configuration file. Missing fields keep their default value.
    pub fn from_file(path: &Path) -> anyhow::Result<DriverConfig> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: DriverConfig = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Overrides fields from variables looked up with `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(DEBUG_ENV) {
            match parse_bool(&value) {
                Some(debug) => self.debug = debug,
                None => warn!("invalid {} value {:?}", DEBUG_ENV, value),
            }
        }
        if let Some(value) = lookup(TRACE_ENV) {
            match parse_bool(&value) {
                Some(trace) => self.trace = trace,
                None => warn!("invalid {} value {:?}", TRACE_ENV, value),
            }
        }
        if let Some(value) = lookup(OUTPUT_BUFFERS_ENV) {
            match value.trim().parse::<usize>() {
                Ok(count) => self.output_buffers = count,
                Err(_) => warn!("invalid {} value {:?}", OUTPUT_BUFFERS_ENV, value),
            }
        }
        if let Some(value) = lookup(OUTPUT_GRANULARITY_ENV) {
            match value.trim().parse::<u32>() {
                Ok(granularity) if granularity.is_power_of_two() => {
                    self.output_granularity = granularity
                }
                _ => warn!("invalid {} value {:?}", OUTPUT_GRANULARITY_ENV, value),
            }
        }
        self.output_buffers = self
            .output_buffers
            .clamp(MIN_OUTPUT_BUFFERS, MAX_OUTPUT_BUFFERS);
    }

    /// Checks the invariants the scheduler and registry rely on.
    pub(crate) fn validate(&self) -> anyhow::Result<()> {
        if !(MIN_OUTPUT_BUFFERS..=MAX_OUTPUT_BUFFERS).contains(&self.output_buffers) {
            bail!(
                "output-buffers must be between {} and {}",
                MIN_OUTPUT_BUFFERS,
                MAX_OUTPUT_BUFFERS
            );
        }
        if !self.output_granularity.is_power_of_two() {
            bail!("output-granularity must be a power of two");
        }
        if self.heap_increment == 0 {
            bail!("heap-increment must not be zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::io::Write;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: BTreeMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let config = DriverConfig::default();
        assert_eq!(config.output_buffers, 2);
        assert_eq!(config.output_granularity, 128);
        assert!(!config.trace);
    }

    #[test]
    fn environment_overrides() {
        let mut config = DriverConfig::default();
        config.apply_overrides(lookup(&[
            (DEBUG_ENV, "yes"),
            (TRACE_ENV, "1"),
            (OUTPUT_BUFFERS_ENV, "3"),
            (OUTPUT_GRANULARITY_ENV, "64"),
        ]));
        assert!(config.debug);
        assert!(config.trace);
        assert_eq!(config.output_buffers, 3);
        assert_eq!(config.output_granularity, 64);
    }

    #[test]
    fn invalid_overrides_are_ignored() {
        let mut config = DriverConfig::default();
        config.apply_overrides(lookup(&[
            (DEBUG_ENV, "maybe"),
            (OUTPUT_BUFFERS_ENV, "8"),
            (OUTPUT_GRANULARITY_ENV, "100"),
        ]));
        assert!(!config.debug);
        // Out of range counts are clamped.
        assert_eq!(config.output_buffers, 3);
        assert_eq!(config.output_granularity, 128);
    }

    #[test]
    fn config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "trace": true, "output-buffers": 3 }}"#).unwrap();
        let config = DriverConfig::from_file(file.path()).unwrap();
        assert!(config.trace);
        assert_eq!(config.output_buffers, 3);
        assert_eq!(config.heap_increment, 16);
    }

    #[test]
    fn config_file_rejects_bad_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "output-granularity": 100 }}"#).unwrap();
        assert!(DriverConfig::from_file(file.path()).is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "unknown": 1 }}"#).unwrap();
        assert!(DriverConfig::from_file(file.path()).is_err());
    }
}
