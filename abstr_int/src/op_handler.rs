// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

use helper::num::signed_hex;
use lifted_il::{DataCell, Op, Operand, RegName};
use log::warn;

use crate::{
    call_handler::handle_call,
    error::AnalysisError,
    fixpoint::FnAnalysis,
    memory::{AllocId, Location, MemObject, ProgramPoint},
    products::{DiagKind, MemXref, StackXref},
    store::Store,
    value::{AbstrVal, Offset},
};

pub(crate) fn eval_operand(op: &Operand, store: &Store) -> AbstrVal {
    match op {
        Operand::Reg(r) => store.read(&Location::Reg(r.clone())),
        Operand::Imm { value, width } => AbstrVal::new_u64(*value, *width),
        Operand::Func(addr) => AbstrVal::new_fptr(*addr),
    }
}

/// Interprets [op] at [pp] on [store].
/// Returns false if execution does not continue after [op].
pub(crate) fn eval_op(
    fa: &mut FnAnalysis,
    pp: ProgramPoint,
    op: &Op,
    store: &mut Store,
) -> Result<bool, AnalysisError> {
    match op {
        Op::Assign { dst, src } => {
            let v = eval_operand(src, store);
            set_reg(store, dst, v);
        }
        Op::Load {
            dst,
            base,
            offset,
            bytes,
        } => {
            let addr = eval_operand(base, store).add_displacement(*offset);
            let v = read_memory(fa, pp, &addr, *bytes, store);
            set_reg(store, dst, v);
        }
        Op::Store {
            base,
            offset,
            src,
            bytes,
        } => {
            let addr = eval_operand(base, store).add_displacement(*offset);
            let v = eval_operand(src, store);
            write_memory(fa, pp, &addr, v, *bytes, store);
        }
        Op::Binary { dst, op, lhs, rhs } => {
            let v = eval_operand(lhs, store).binary(*op, &eval_operand(rhs, store));
            set_reg(store, dst, v);
        }
        Op::Unary { dst, op, src } => {
            let v = eval_operand(src, store).unary(*op);
            set_reg(store, dst, v);
        }
        Op::Cmp { dst, op, lhs, rhs } => {
            let v = eval_operand(lhs, store).compare(*op, &eval_operand(rhs, store));
            set_reg(store, dst, v);
        }
        Op::Call { target, args, dst } => {
            return handle_call(fa, pp, target, args, dst.as_ref(), store);
        }
        Op::Nop => {}
    }
    Ok(true)
}

fn set_reg(store: &mut Store, reg: &RegName, v: AbstrVal) {
    store.write(Location::Reg(reg.clone()), v);
}

/// Uninitialized memory holds some value.
fn top_if_undefined(v: AbstrVal) -> AbstrVal {
    if v.is_undefined() {
        return AbstrVal::Top;
    }
    v
}

fn check_bounds(
    fa: &mut FnAnalysis,
    pp: ProgramPoint,
    alloc: &AllocId,
    offset: Offset,
    bytes: u64,
) {
    let Offset::Known(off) = offset else {
        return;
    };
    if !fa.engine.get_heap().is_out_of_bounds(alloc, off, bytes) {
        return;
    }
    fa.products.add_diag(
        DiagKind::OutOfBoundsAccess,
        pp,
        format!(
            "{} bytes at {} of the object allocated at {:#x}",
            bytes,
            signed_hex(off),
            alloc.site.addr
        ),
    );
}

fn read_memory(
    fa: &mut FnAnalysis,
    pp: ProgramPoint,
    addr: &AbstrVal,
    bytes: u64,
    store: &Store,
) -> AbstrVal {
    match addr {
        AbstrVal::StackRef { frame, offset } => {
            if let Offset::Known(o) = offset {
                fa.products.stack_xrefs.insert(StackXref {
                    at: pp.addr,
                    base: frame.func,
                    offset: *o,
                });
            }
            top_if_undefined(store.read_object(
                &MemObject::Frame(frame.clone()),
                *offset,
                bytes,
            ))
        }
        AbstrVal::HeapRef { alloc, offset } => {
            check_bounds(fa, pp, alloc, *offset, bytes);
            top_if_undefined(store.read_object(
                &MemObject::Alloc(alloc.clone()),
                *offset,
                bytes,
            ))
        }
        AbstrVal::Const(c) => {
            let to = c.as_u64();
            fa.products.mem_xrefs.insert(MemXref {
                from: pp.addr,
                to,
                size: bytes,
            });
            let v = store.read_sized(&Location::Global(to), bytes);
            if !v.is_undefined() {
                return v;
            }
            if fa.ctx.is_summary() {
                // Unknown caller state.
                return AbstrVal::Top;
            }
            match fa.engine.get_program().get_data(to) {
                Some(DataCell::Word { value, bytes: b }) => {
                    AbstrVal::new_u64(*value, b * 8).truncate(bytes * 8)
                }
                Some(DataCell::FuncAddr(f)) => AbstrVal::new_fptr(*f),
                None => AbstrVal::Top,
            }
        }
        AbstrVal::Top | AbstrVal::Undefined | AbstrVal::FuncPtr(_) => AbstrVal::Top,
    }
}

fn write_memory(
    fa: &mut FnAnalysis,
    pp: ProgramPoint,
    addr: &AbstrVal,
    val: AbstrVal,
    bytes: u64,
    store: &mut Store,
) {
    let val = val.truncate(bytes * 8);
    let loc = match addr {
        AbstrVal::StackRef { frame, offset } => {
            if let Offset::Known(o) = offset {
                fa.products.stack_xrefs.insert(StackXref {
                    at: pp.addr,
                    base: frame.func,
                    offset: *o,
                });
            }
            Location::Stack {
                frame: frame.clone(),
                offset: *offset,
            }
        }
        AbstrVal::HeapRef { alloc, offset } => {
            check_bounds(fa, pp, alloc, *offset, bytes);
            Location::Heap {
                alloc: alloc.clone(),
                offset: *offset,
            }
        }
        AbstrVal::Const(c) => {
            let to = c.as_u64();
            fa.products.mem_xrefs.insert(MemXref {
                from: pp.addr,
                to,
                size: bytes,
            });
            Location::Global(to)
        }
        AbstrVal::Top | AbstrVal::Undefined | AbstrVal::FuncPtr(_) => {
            warn!("{}: store of {} through {} dropped", pp, val, addr);
            fa.unknown_writes = true;
            return;
        }
    };
    match loc {
        Location::Stack {
            offset: Offset::Unknown,
            ..
        }
        | Location::Heap {
            offset: Offset::Unknown,
            ..
        } => store.join_write_sized(loc, val, Some(bytes)),
        _ => store.write_sized(loc, val, bytes),
    }
}
