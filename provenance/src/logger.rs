// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

use std::path::Path;

use flexi_logger::{Duplicate, FileSpec, Logger, LoggerHandle};

use crate::error::RunError;

fn start_logger(spec: &str, file_spec: FileSpec) -> Result<LoggerHandle, RunError> {
    let handle = Logger::try_with_str(spec)?
        .log_to_file(file_spec)
        .duplicate_to_stderr(Duplicate::Warn)
        .start()?;
    Ok(handle)
}

/// Starts logging to a file in the working directory.
/// Warnings and errors are duplicated to stderr.
/// The returned handle must be kept alive for the duration of the run.
pub fn init_logger(spec: &str) -> Result<LoggerHandle, RunError> {
    start_logger(spec, FileSpec::default())
}

/// Like [init_logger] but the log file is written to [dir].
pub fn init_logger_in(spec: &str, dir: &Path) -> Result<LoggerHandle, RunError> {
    start_logger(spec, FileSpec::default().directory(dir))
}
