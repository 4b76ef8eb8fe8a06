// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

//! Context sensitive abstract interpretation of lifted functions.
//!
//! Values are tracked as constants, pointers into stack frames or heap
//! objects, and function pointer sets. Calls are analysed by cloning the
//! callee per call site up to a bounded depth. Deeper and recursive calls
//! use a per function summary.

mod call_handler;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
mod fixpoint;
pub mod heap;
pub mod icall;
pub mod memory;
mod op_handler;
pub mod products;
pub mod stack;
pub mod store;
mod test_interpreter;
mod test_store;
mod test_value;
pub mod value;

pub use config::{AnalysisConfig, WorklistOrder};
pub use context::{CallContext, CallSummary, SummaryCache};
pub use engine::{CancelToken, Engine};
pub use error::{AnalysisError, ConfigError};
pub use heap::{AllocationObject, HeapModel, SizeFact};
pub use icall::Resolution;
pub use memory::{AllocId, CallSiteId, FrameId, Location, MemObject, ProgramPoint};
pub use products::{
    AnalysisProducts, ConcreteCall, DiagKind, Diagnostic, FunctionResult, LocationClass, MemXref,
    StackXref,
};
pub use store::Store;
pub use value::{AbstrVal, Const, FuncTargets, Offset};
