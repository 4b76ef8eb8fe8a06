// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

//! Architecture neutral representation of lifted machine code.
//!
//! A [Program] is a set of [FunctionCfg]s made of [BasicBlock]s, the
//! signatures of routines without body, the static data and the calling
//! convention used to pass arguments.

pub mod cc;
pub mod cfg;
pub mod error;
pub mod insn;
pub mod program;
pub mod signature;
mod test_cfg;

pub use cc::CallingConvention;
pub use cfg::{BasicBlock, FunctionCfg};
pub use error::IlError;
pub use insn::{BinOp, CallTarget, CmpOp, Insn, Op, Operand, Terminator, UnOp};
pub use program::{DataCell, Program};
pub use signature::{ParamType, RetType, SigFlags, Signature, SignatureTable};

pub type Address = u64;
pub type RegName = String;
