// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

use lifted_il::{Address, IlError};
use thiserror::Error;

/// Errors which abort the analysis of a function.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("malformed input: {0}")]
    MalformedInput(#[from] IlError),
    #[error("no function body at {0:#x}")]
    UnknownFunction(Address),
    #[error("analysis of {func:#x} cancelled after {visits} block visits")]
    Cancelled { func: Address, visits: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),
    #[error("invalid value '{val}' for '{key}'")]
    InvalidValue { key: String, val: String },
}
