// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

use std::fmt::Display;

use crate::{Address, RegName};

/// An operand of a lifted instruction.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Operand {
    /// Value of a register.
    Reg(RegName),
    /// Immediate with its raw bits and bit width.
    Imm { value: u64, width: u64 },
    /// Address of a function. E.g. `lea rax, [fcn.main]`.
    Func(Address),
}

impl Operand {
    pub fn reg(name: &str) -> Operand {
        Operand::Reg(name.to_owned())
    }

    pub fn imm(value: u64, width: u64) -> Operand {
        Operand::Imm { value, width }
    }

    /// Immediate from a signed value. Stored in two's complement.
    pub fn imm_i64(value: i64, width: u64) -> Operand {
        Operand::Imm {
            value: value as u64,
            width,
        }
    }

    pub fn func(addr: Address) -> Operand {
        Operand::Func(addr)
    }
}

impl Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Reg(r) => write!(f, "{}", r),
            Operand::Imm { value, width } => write!(f, "{:#x}:{}", value, width),
            Operand::Func(a) => write!(f, "fcn.{:#x}", a),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    UDiv,
    SDiv,
    URem,
    SRem,
    And,
    Or,
    Xor,
    Shl,
    LShr,
    AShr,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnOp {
    /// Bitwise complement
    Not,
    /// Two's complement negation
    Neg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    Ne,
    Ult,
    Ule,
    Slt,
    Sle,
}

/// The callee of a call instruction.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CallTarget {
    Direct(Address),
    /// Call through a value. [candidates] is the target set the lifter
    /// could determine statically (e.g. from a jump table). It is
    /// empty if nothing is known.
    Indirect {
        value: Option<Operand>,
        candidates: Vec<Address>,
    },
}

/// The effect of a single instruction.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    Assign {
        dst: RegName,
        src: Operand,
    },
    /// `dst = mem[base + offset]` reading [bytes] bytes.
    Load {
        dst: RegName,
        base: Operand,
        offset: i64,
        bytes: u64,
    },
    /// `mem[base + offset] = src` writing [bytes] bytes.
    Store {
        base: Operand,
        offset: i64,
        src: Operand,
        bytes: u64,
    },
    Binary {
        dst: RegName,
        op: BinOp,
        lhs: Operand,
        rhs: Operand,
    },
    Unary {
        dst: RegName,
        op: UnOp,
        src: Operand,
    },
    /// Comparison. [dst] is set to a 1 bit value.
    Cmp {
        dst: RegName,
        op: CmpOp,
        lhs: Operand,
        rhs: Operand,
    },
    Call {
        target: CallTarget,
        args: Vec<Operand>,
        dst: Option<RegName>,
    },
    Nop,
}

/// An instruction at [addr].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Insn {
    pub addr: Address,
    pub op: Op,
}

impl Insn {
    pub fn new(addr: Address, op: Op) -> Insn {
        Insn { addr, op }
    }

    pub fn is_call(&self) -> bool {
        matches!(self.op, Op::Call { .. })
    }
}

impl Op {
    /// All operands read by the operation.
    pub fn operands(&self) -> Vec<&Operand> {
        match self {
            Op::Assign { src, .. } | Op::Unary { src, .. } => vec![src],
            Op::Load { base, .. } => vec![base],
            Op::Store { base, src, .. } => vec![base, src],
            Op::Binary { lhs, rhs, .. } | Op::Cmp { lhs, rhs, .. } => vec![lhs, rhs],
            Op::Call { target, args, .. } => {
                let mut ops: Vec<&Operand> = args.iter().collect();
                if let CallTarget::Indirect {
                    value: Some(v), ..
                } = target
                {
                    ops.push(v);
                }
                ops
            }
            Op::Nop => Vec::new(),
        }
    }
}

/// The last instruction of a basic block.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Terminator {
    Jump(Address),
    /// Continues at [taken] if [cond] is not zero, at [fallthrough] otherwise.
    Branch {
        cond: Operand,
        taken: Address,
        fallthrough: Address,
    },
    Return(Option<Operand>),
    /// Leaves the procedure without returning. E.g. a call to `exit()`.
    Exit,
}

impl Terminator {
    pub fn successors(&self) -> Vec<Address> {
        match self {
            Terminator::Jump(t) => vec![*t],
            Terminator::Branch {
                taken, fallthrough, ..
            } => {
                if taken == fallthrough {
                    vec![*taken]
                } else {
                    vec![*taken, *fallthrough]
                }
            }
            Terminator::Return(_) | Terminator::Exit => Vec::new(),
        }
    }
}
