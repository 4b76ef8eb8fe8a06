// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

use std::fmt::Display;

use crate::error::ConfigError;

/// Order in which pending blocks are taken from the worklist.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WorklistOrder {
    ReversePostorder,
    Fifo,
    /// Random order with the given seed.
    Shuffled(u64),
}

impl Display for WorklistOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorklistOrder::ReversePostorder => write!(f, "rpo"),
            WorklistOrder::Fifo => write!(f, "fifo"),
            WorklistOrder::Shuffled(seed) => write!(f, "shuffle:{}", seed),
        }
    }
}

impl WorklistOrder {
    pub fn parse(s: &str) -> Option<WorklistOrder> {
        match s {
            "rpo" => Some(WorklistOrder::ReversePostorder),
            "fifo" => Some(WorklistOrder::Fifo),
            _ => s
                .strip_prefix("shuffle:")
                .and_then(|seed| seed.parse::<u64>().ok())
                .map(WorklistOrder::Shuffled),
        }
    }
}

/// Settings of the interpreter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalysisConfig {
    /// How often a function is cloned in a single call chain
    /// before its shared summary is used.
    pub clone_depth: u32,
    /// Maximum length of a call chain.
    pub max_call_depth: usize,
    /// Visits of a loop header before widening is applied.
    pub widen_after: usize,
    pub worklist_order: WorklistOrder,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            clone_depth: 2,
            max_call_depth: 24,
            widen_after: 3,
            worklist_order: WorklistOrder::ReversePostorder,
        }
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, val: &str) -> Result<T, ConfigError> {
    val.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
        key: key.to_owned(),
        val: val.to_owned(),
    })
}

impl AnalysisConfig {
    pub const KEY_CLONE_DEPTH: &'static str = "absint.clone_depth";
    pub const KEY_CALL_DEPTH: &'static str = "absint.call_depth";
    pub const KEY_WIDEN_AFTER: &'static str = "absint.widen_after";
    pub const KEY_WORKLIST: &'static str = "absint.worklist";

    pub fn set_conf_val(&mut self, key: &str, val: &str) -> Result<(), ConfigError> {
        match key {
            AnalysisConfig::KEY_CLONE_DEPTH => {
                let k: u32 = parse_num(key, val)?;
                if k == 0 {
                    return Err(ConfigError::InvalidValue {
                        key: key.to_owned(),
                        val: val.to_owned(),
                    });
                }
                self.clone_depth = k;
            }
            AnalysisConfig::KEY_CALL_DEPTH => self.max_call_depth = parse_num(key, val)?,
            AnalysisConfig::KEY_WIDEN_AFTER => self.widen_after = parse_num(key, val)?,
            AnalysisConfig::KEY_WORKLIST => {
                self.worklist_order =
                    WorklistOrder::parse(val.trim()).ok_or_else(|| ConfigError::InvalidValue {
                        key: key.to_owned(),
                        val: val.to_owned(),
                    })?
            }
            _ => return Err(ConfigError::UnknownKey(key.to_owned())),
        }
        Ok(())
    }

    pub fn get_conf_val(&self, key: &str) -> Option<String> {
        match key {
            AnalysisConfig::KEY_CLONE_DEPTH => Some(self.clone_depth.to_string()),
            AnalysisConfig::KEY_CALL_DEPTH => Some(self.max_call_depth.to_string()),
            AnalysisConfig::KEY_WIDEN_AFTER => Some(self.widen_after.to_string()),
            AnalysisConfig::KEY_WORKLIST => Some(self.worklist_order.to_string()),
            _ => None,
        }
    }
}
