// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

use lifted_il::CallingConvention;

use crate::{
    memory::{FrameId, Location},
    store::Store,
    value::AbstrVal,
};

/// The stack frame of a callee while it is analysed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StackFrame {
    pub frame_id: FrameId,
    /// Argument bindings in source order.
    pub arg_slots: Vec<(Location, AbstrVal)>,
}

impl StackFrame {
    /// Binds the arguments of a call to their locations in the callee.
    /// The first arguments go to the argument registers of [cc], all
    /// others to stack slots of the new frame at increasing offsets.
    /// Declared parameters without an argument are bound to Top.
    pub fn classify_args(
        cc: &CallingConvention,
        frame_id: FrameId,
        declared: usize,
        args: &[AbstrVal],
    ) -> StackFrame {
        let n = declared.max(args.len());
        let mut arg_slots = Vec::with_capacity(n);
        for i in 0..n {
            let val = args.get(i).cloned().unwrap_or(AbstrVal::Top);
            let loc = match cc.stack_arg_offset(i) {
                None => Location::Reg(cc.arg_regs[i].clone()),
                Some(off) => Location::stack(&frame_id, off),
            };
            arg_slots.push((loc, val));
        }
        StackFrame {
            frame_id,
            arg_slots,
        }
    }

    /// Value of the stack pointer at procedure entry.
    pub fn stack_pointer(&self) -> AbstrVal {
        AbstrVal::new_stack(self.frame_id.clone(), 0)
    }

    /// The store at procedure entry: [memory] of the caller, the
    /// stack pointer and the argument bindings.
    pub fn entry_store(&self, cc: &CallingConvention, memory: Store) -> Store {
        let mut store = memory;
        store.write(Location::Reg(cc.sp_reg.clone()), self.stack_pointer());
        for (loc, val) in self.arg_slots.iter() {
            store.write(loc.clone(), val.clone());
        }
        store
    }
}
