// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

use abstr_int::{AnalysisConfig, ConfigError};
use helper::num::parse_hex;
use lifted_il::Address;

/// Settings of an analysis run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunConfig {
    pub absint: AnalysisConfig,
    /// Number of worker threads.
    pub threads: usize,
    /// Seconds until the run is cancelled. 0 disables the timeout.
    pub timeout: u64,
    /// Functions to analyse. If empty the entries of the program are used.
    pub entries: Vec<Address>,
    /// flexi_logger specification.
    pub log_spec: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            absint: AnalysisConfig::default(),
            threads: 4,
            timeout: 0,
            entries: Vec::new(),
            log_spec: "info".to_owned(),
        }
    }
}

fn invalid(key: &str, val: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_owned(),
        val: val.to_owned(),
    }
}

fn parse_entries(key: &str, val: &str) -> Result<Vec<Address>, ConfigError> {
    val.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_hex(s).ok_or_else(|| invalid(key, val)))
        .collect()
}

impl RunConfig {
    pub const KEY_THREADS: &'static str = "provenance.threads";
    pub const KEY_TIMEOUT: &'static str = "provenance.timeout";
    pub const KEY_ENTRIES: &'static str = "provenance.entries";
    pub const KEY_LOG: &'static str = "provenance.log";

    /// Sets the configuration value of [key].
    /// Keys of the interpreter (`absint.*`) are forwarded.
    pub fn set_conf_val(&mut self, key: &str, val: &str) -> Result<(), ConfigError> {
        match key {
            RunConfig::KEY_THREADS => {
                self.threads = match val.trim().parse::<usize>() {
                    Ok(n) if n > 0 => n,
                    _ => return Err(invalid(key, val)),
                }
            }
            RunConfig::KEY_TIMEOUT => {
                self.timeout = val.trim().parse::<u64>().map_err(|_| invalid(key, val))?
            }
            RunConfig::KEY_ENTRIES => self.entries = parse_entries(key, val)?,
            RunConfig::KEY_LOG => {
                if val.trim().is_empty() {
                    return Err(invalid(key, val));
                }
                self.log_spec = val.trim().to_owned();
            }
            _ if key.starts_with("absint.") => self.absint.set_conf_val(key, val)?,
            _ => return Err(ConfigError::UnknownKey(key.to_owned())),
        }
        Ok(())
    }

    pub fn get_conf_val(&self, key: &str) -> Option<String> {
        match key {
            RunConfig::KEY_THREADS => Some(self.threads.to_string()),
            RunConfig::KEY_TIMEOUT => Some(self.timeout.to_string()),
            RunConfig::KEY_ENTRIES => Some(
                self.entries
                    .iter()
                    .map(|e| format!("{:#x}", e))
                    .collect::<Vec<String>>()
                    .join(","),
            ),
            RunConfig::KEY_LOG => Some(self.log_spec.clone()),
            _ => self.absint.get_conf_val(key),
        }
    }

    /// Reads `key = value` lines. Empty lines and lines starting
    /// with `#` are skipped.
    pub fn from_text(text: &str) -> Result<RunConfig, ConfigError> {
        let mut config = RunConfig::default();
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else {
                return Err(invalid(line, ""));
            };
            config.set_conf_val(key.trim(), val.trim())?;
        }
        Ok(config)
    }
}
