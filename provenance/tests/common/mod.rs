// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

#![allow(dead_code)]

use lifted_il::{
    Address, BasicBlock, BinOp, CallTarget, CallingConvention, CmpOp, DataCell, FunctionCfg, Insn,
    Op, Operand, Program, Signature, Terminator,
};

pub const MAIN: Address = 0x1000;
pub const FILL: Address = 0x2000;
pub const FN0: Address = 0x3000;
pub const FN1: Address = 0x3100;
pub const REC: Address = 0x4300;
pub const BAD: Address = 0x5000;
pub const TABLE: Address = 0x6000;
pub const UNMAPPED: Address = 0x7777;
pub const SECOND: Address = 0x8000;
pub const DISPATCH: Address = 0x8100;
pub const MALLOC: Address = 0x9000;
pub const RAND: Address = 0x9010;

pub fn r(name: &str) -> Operand {
    Operand::reg(name)
}

pub fn i(v: u64) -> Operand {
    Operand::imm(v, 64)
}

pub fn call(at: Address, to: Address, args: Vec<Operand>, dst: Option<&str>) -> Insn {
    Insn::new(
        at,
        Op::Call {
            target: CallTarget::Direct(to),
            args,
            dst: dst.map(|d| d.to_owned()),
        },
    )
}

pub fn icall(
    at: Address,
    value: Option<Operand>,
    candidates: Vec<Address>,
    dst: Option<&str>,
) -> Insn {
    Insn::new(
        at,
        Op::Call {
            target: CallTarget::Indirect { value, candidates },
            args: Vec::new(),
            dst: dst.map(|d| d.to_owned()),
        },
    )
}

pub fn mov(at: Address, dst: &str, src: Operand) -> Insn {
    Insn::new(
        at,
        Op::Assign {
            dst: dst.to_owned(),
            src,
        },
    )
}

pub fn bin(at: Address, dst: &str, op: BinOp, lhs: Operand, rhs: Operand) -> Insn {
    Insn::new(
        at,
        Op::Binary {
            dst: dst.to_owned(),
            op,
            lhs,
            rhs,
        },
    )
}

pub fn cmp(at: Address, dst: &str, op: CmpOp, lhs: Operand, rhs: Operand) -> Insn {
    Insn::new(
        at,
        Op::Cmp {
            dst: dst.to_owned(),
            op,
            lhs,
            rhs,
        },
    )
}

pub fn ld(at: Address, dst: &str, base: Operand, offset: i64, bytes: u64) -> Insn {
    Insn::new(
        at,
        Op::Load {
            dst: dst.to_owned(),
            base,
            offset,
            bytes,
        },
    )
}

pub fn st(at: Address, base: Operand, offset: i64, src: Operand, bytes: u64) -> Insn {
    Insn::new(
        at,
        Op::Store {
            base,
            offset,
            src,
            bytes,
        },
    )
}

pub fn ret(v: Operand) -> Terminator {
    Terminator::Return(Some(v))
}

pub fn bb(addr: Address, insns: Vec<Insn>, term: Terminator) -> BasicBlock {
    BasicBlock::new(addr, insns, term)
}

pub fn func(entry: Address, name: &str, params: usize, blocks: Vec<BasicBlock>) -> FunctionCfg {
    let mut f = FunctionCfg::new(entry, name, params);
    for b in blocks {
        f.add_block(b);
    }
    f
}

/// Three independent parts:
///
/// - main allocates an object, lets fill write 7 into it and
///   calls fn0 through a function table.
/// - second calls rec(1) and dispatch. dispatch calls fn1 or an
///   unmapped address in a loop.
/// - bad jumps to a block which does not exist.
#[cfg_attr(rustfmt, rustfmt_skip)]
pub fn get_mixed_program() -> Program {
    let mut program = Program::new(CallingConvention::sysv_amd64());
    program.add_external(MALLOC, Signature::malloc());
    program.add_external(RAND, Signature::rand());
    program.add_data(TABLE, DataCell::FuncAddr(FN0));
    program.add_entry(MAIN);
    program.add_entry(SECOND);

    program.add_function(func(MAIN, "main", 0, vec![
        bb(0x1000, vec![
            call(0x1000, MALLOC, vec![i(16)], Some("rax")),
            mov(0x1004, "rbx", r("rax")),
            mov(0x1008, "rsi", i(7)),
            call(0x100c, FILL, vec![r("rbx"), r("rsi")], None),
            ld(0x1010, "r12", r("rbx"), 0, 8),
            ld(0x1014, "rax", i(TABLE), 0, 8),
            icall(0x1018, Some(r("rax")), vec![], Some("r13")),
        ], ret(r("r12"))),
    ]));
    program.add_function(func(FILL, "fill", 2, vec![
        bb(FILL, vec![st(0x2000, r("rdi"), 0, r("rsi"), 8)], Terminator::Return(None)),
    ]));
    program.add_function(func(FN0, "fn0", 0, vec![bb(FN0, vec![], ret(i(0)))]));
    program.add_function(func(FN1, "fn1", 0, vec![bb(FN1, vec![], ret(i(1)))]));

    program.add_function(func(SECOND, "second", 0, vec![
        bb(0x8000, vec![
            call(0x8000, REC, vec![i(1)], Some("rbx")),
            call(0x8004, DISPATCH, vec![], Some("rax")),
        ], ret(r("rbx"))),
    ]));
    program.add_function(func(REC, "rec", 1, vec![
        bb(0x4300, vec![cmp(0x4300, "r8", CmpOp::Eq, r("rdi"), i(0))], Terminator::Branch { cond: r("r8"), taken: 0x4310, fallthrough: 0x4320 }),
        bb(0x4310, vec![], ret(i(0))),
        bb(0x4320, vec![
            bin(0x4320, "rdi", BinOp::Sub, r("rdi"), i(1)),
            call(0x4324, REC, vec![r("rdi")], Some("rax")),
            bin(0x4328, "rax", BinOp::Add, r("rax"), i(1)),
        ], ret(r("rax"))),
    ]));
    program.add_function(func(DISPATCH, "dispatch", 0, vec![
        bb(0x8100, vec![mov(0x8100, "rcx", i(0))], Terminator::Jump(0x8110)),
        bb(0x8110, vec![cmp(0x8110, "r8", CmpOp::Ult, r("rcx"), i(3))], Terminator::Branch { cond: r("r8"), taken: 0x8120, fallthrough: 0x8130 }),
        bb(0x8120, vec![
            icall(0x8120, None, vec![FN1, UNMAPPED], Some("rdx")),
            bin(0x8124, "rcx", BinOp::Add, r("rcx"), i(1)),
        ], Terminator::Jump(0x8110)),
        bb(0x8130, vec![], ret(i(0))),
    ]));

    program.add_function(func(BAD, "bad", 0, vec![bb(BAD, vec![], Terminator::Jump(0x5010))]));
    program
}
