// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

use thiserror::Error;

use crate::Address;

/// Structural defects of the lifted input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IlError {
    #[error("function {func:#x} has no entry block")]
    MissingEntry { func: Address },
    #[error("function {func:#x}: block {from:#x} jumps to the unknown block {to:#x}")]
    DanglingEdge {
        func: Address,
        from: Address,
        to: Address,
    },
    #[error("function {func:#x}: call at {at:#x} has neither a callee value nor candidates")]
    CallWithoutTarget { func: Address, at: Address },
}
