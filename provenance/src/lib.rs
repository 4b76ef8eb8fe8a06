// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

//! Runs the abstract interpreter over a whole program.
//!
//! The call graph is split into independent components which are
//! analysed on a pool of worker threads.

pub mod components;
pub mod config;
pub mod error;
pub mod logger;
pub mod run;
pub mod state;
mod test_components;
mod test_config;

pub use components::{partition, Component};
pub use config::RunConfig;
pub use error::RunError;
pub use logger::{init_logger, init_logger_in};
pub use run::{run_analysis, run_analysis_cancellable, RunReport};
