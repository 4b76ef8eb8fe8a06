// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

use abstr_int::ConfigError;
use flexi_logger::FlexiLoggerError;
use lifted_il::Address;
use thiserror::Error;

/// Errors which prevent an analysis run from starting.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("logger setup failed: {0}")]
    Logger(#[from] FlexiLoggerError),
    #[error("entry {0:#x} is not a function with body")]
    UnknownEntry(Address),
}
