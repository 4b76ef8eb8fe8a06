// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

use crate::RegName;

/// How arguments are passed to a procedure.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CallingConvention {
    pub name: String,
    /// Registers for the first arguments, in order.
    pub arg_regs: Vec<RegName>,
    pub ret_reg: RegName,
    /// Stack pointer register.
    pub sp_reg: RegName,
    /// Offset of the first stack argument relative to the
    /// stack pointer at procedure entry.
    pub stack_arg_base: i64,
    /// Size of a single stack argument slot in bytes.
    pub slot_size: u64,
    pub addr_width: u64,
}

impl CallingConvention {
    /// System V AMD64. The return address occupies `[rsp]` at entry.
    pub fn sysv_amd64() -> CallingConvention {
        CallingConvention {
            name: "amd64".to_owned(),
            arg_regs: ["rdi", "rsi", "rdx", "rcx", "r8", "r9"]
                .iter()
                .map(|r| r.to_string())
                .collect(),
            ret_reg: "rax".to_owned(),
            sp_reg: "rsp".to_owned(),
            stack_arg_base: 8,
            slot_size: 8,
            addr_width: 64,
        }
    }

    /// 32bit cdecl. Everything is passed on the stack.
    pub fn cdecl_x86() -> CallingConvention {
        CallingConvention {
            name: "cdecl".to_owned(),
            arg_regs: Vec::new(),
            ret_reg: "eax".to_owned(),
            sp_reg: "esp".to_owned(),
            stack_arg_base: 4,
            slot_size: 4,
            addr_width: 32,
        }
    }

    pub fn num_reg_args(&self) -> usize {
        self.arg_regs.len()
    }

    /// Stack offset of the argument with index [arg_idx].
    /// None if the argument is passed in a register.
    pub fn stack_arg_offset(&self, arg_idx: usize) -> Option<i64> {
        if arg_idx < self.arg_regs.len() {
            return None;
        }
        let slot = (arg_idx - self.arg_regs.len()) as i64;
        Some(self.stack_arg_base + slot * self.slot_size as i64)
    }
}
