// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

use std::{
    collections::BTreeSet,
    fmt::{Display, LowerHex},
};

use helper::num::{signed_hex, subscript};
use lifted_il::{Address, BinOp, CmpOp, UnOp};
use num_bigint::{BigInt, BigUint};

use crate::memory::{AllocId, FrameId, MemObject};

/// Function pointer sets with more targets than this
/// are treated as [FuncTargets::Unknown].
pub const MAX_FPTR_TARGETS: usize = 64;

/// A constant of fixed bit width.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Const {
    v: BigUint,
    /// Width of constant in bits
    width: u64,
}

impl LowerHex for Const {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}{}", self.v, subscript(self.width))
    }
}

impl Const {
    /// Returns a bit mask with the lower [width] bits set.
    pub fn get_masku(width: u64) -> BigUint {
        (BigUint::from(1u8) << width) - 1u8
    }

    /// Two's complement representation of [v] with [width] bits.
    pub fn bigint_to_biguint(v: BigInt, width: u64) -> BigUint {
        let modulus = BigInt::from(1u8) << width;
        let r = ((v % &modulus) + &modulus) % &modulus;
        r.into_parts().1
    }

    /// Creates a new Const from an BigUint with a bit width of [width]
    /// Any bits of [v] at [width] onwards are dropped.
    pub fn new(v: BigUint, width: u64) -> Const {
        Const {
            v: v & Const::get_masku(width),
            width,
        }
    }

    pub fn newi(v: BigInt, width: u64) -> Const {
        Const {
            v: Const::bigint_to_biguint(v, width),
            width,
        }
    }

    pub fn new_u64(v: u64, width: u64) -> Const {
        Const::new(BigUint::from(v), width)
    }

    pub fn new_i64(v: i64, width: u64) -> Const {
        Const::newi(BigInt::from(v), width)
    }

    pub fn get_true() -> Const {
        Const::new_u64(1, 1)
    }

    pub fn get_false() -> Const {
        Const::new_u64(0, 1)
    }

    pub fn get_zero(width: u64) -> Const {
        Const::new_u64(0, width)
    }

    /// Returns a constant of [width] bits with all bits set to true.
    pub fn get_umax(width: u64) -> Const {
        Const::new(Const::get_masku(width), width)
    }

    /// Returns the signed value of this constant
    pub fn v(&self) -> BigInt {
        let u = BigInt::from(self.v.clone());
        if self.msb() {
            return u - (BigInt::from(1u8) << self.width);
        }
        u
    }

    /// Returns the BigUint representation of this constant
    pub fn vu(&self) -> BigUint {
        self.v.clone()
    }

    pub fn width(&self) -> u64 {
        self.width
    }

    pub fn msb(&self) -> bool {
        self.width > 0 && self.v.bit(self.width - 1)
    }

    pub fn is_zero(&self) -> bool {
        self.v.bits() == 0
    }

    /// The lower 64 bits.
    pub fn as_u64(&self) -> u64 {
        self.v.iter_u64_digits().next().unwrap_or(0)
    }

    /// The lower 64 bits, sign extended from [width].
    pub fn as_i64(&self) -> i64 {
        let lo = self.as_u64();
        if self.width >= 64 || !self.msb() {
            return lo as i64;
        }
        (lo | (u64::MAX << self.width)) as i64
    }

    pub fn trunc(&self, width: u64) -> Const {
        Const::new(self.v.clone(), width)
    }

    /// Shift amounts at or above [width] shift everything out.
    fn shift_amount(&self, width: u64) -> u64 {
        if self.v >= BigUint::from(width) {
            return width;
        }
        self.as_u64()
    }

    /// Exact result of [op]. The result has the width of the wider operand.
    /// Returns None for a division by zero.
    pub fn binop(&self, op: BinOp, rhs: &Const) -> Option<Const> {
        let w = self.width.max(rhs.width);
        let (a, b) = (&self.v, &rhs.v);
        let r = match op {
            BinOp::Add => Const::new(a + b, w),
            BinOp::Sub => Const::newi(BigInt::from(a.clone()) - BigInt::from(b.clone()), w),
            BinOp::Mul => Const::new(a * b, w),
            BinOp::UDiv | BinOp::URem | BinOp::SDiv | BinOp::SRem if rhs.is_zero() => {
                return None
            }
            BinOp::UDiv => Const::new(a / b, w),
            BinOp::URem => Const::new(a % b, w),
            BinOp::SDiv => Const::newi(self.v() / rhs.v(), w),
            BinOp::SRem => Const::newi(self.v() % rhs.v(), w),
            BinOp::And => Const::new(a & b, w),
            BinOp::Or => Const::new(a | b, w),
            BinOp::Xor => Const::new(a ^ b, w),
            BinOp::Shl => Const::new(a << rhs.shift_amount(w), w),
            BinOp::LShr => Const::new(a >> rhs.shift_amount(w), w),
            BinOp::AShr => Const::newi(self.v() >> rhs.shift_amount(w), w),
        };
        Some(r)
    }

    pub fn unop(&self, op: UnOp) -> Const {
        match op {
            UnOp::Not => Const::new(&self.v ^ Const::get_masku(self.width), self.width),
            UnOp::Neg => Const::newi(-self.v(), self.width),
        }
    }

    /// Compares both constants. The result is a 1 bit constant.
    pub fn cmp_op(&self, op: CmpOp, rhs: &Const) -> Const {
        let r = match op {
            CmpOp::Eq => self.v == rhs.v,
            CmpOp::Ne => self.v != rhs.v,
            CmpOp::Ult => self.v < rhs.v,
            CmpOp::Ule => self.v <= rhs.v,
            CmpOp::Slt => self.v() < rhs.v(),
            CmpOp::Sle => self.v() <= rhs.v(),
        };
        if r {
            Const::get_true()
        } else {
            Const::get_false()
        }
    }
}

/// Offset of a pointer into its memory object.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Offset {
    Known(i64),
    /// Some offset into the object.
    Unknown,
}

impl Display for Offset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Offset::Known(o) => write!(f, "{}", signed_hex(*o)),
            Offset::Unknown => write!(f, "+⊤"),
        }
    }
}

impl Offset {
    pub fn join(&self, other: &Offset) -> Offset {
        if self == other {
            return *self;
        }
        Offset::Unknown
    }

    pub fn add(&self, delta: i64) -> Offset {
        match self {
            Offset::Known(o) => Offset::Known(o.wrapping_add(delta)),
            Offset::Unknown => Offset::Unknown,
        }
    }

    pub fn known(&self) -> Option<i64> {
        match self {
            Offset::Known(o) => Some(*o),
            Offset::Unknown => None,
        }
    }
}

/// Possible targets of a function pointer.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum FuncTargets {
    Set(BTreeSet<Address>),
    Unknown,
}

impl FuncTargets {
    pub fn join(&self, other: &FuncTargets) -> FuncTargets {
        match (self, other) {
            (FuncTargets::Set(a), FuncTargets::Set(b)) => {
                let u: BTreeSet<Address> = a.union(b).copied().collect();
                if u.len() > MAX_FPTR_TARGETS {
                    return FuncTargets::Unknown;
                }
                FuncTargets::Set(u)
            }
            _ => FuncTargets::Unknown,
        }
    }
}

/// The abstract value of a location.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum AbstrVal {
    /// Never written. Bottom of the lattice.
    Undefined,
    /// Any value.
    Top,
    Const(Const),
    /// Pointer into a stack frame.
    StackRef { frame: FrameId, offset: Offset },
    /// Pointer into an allocated object.
    HeapRef { alloc: AllocId, offset: Offset },
    FuncPtr(FuncTargets),
}

impl Display for AbstrVal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbstrVal::Undefined => write!(f, "⊥"),
            AbstrVal::Top => write!(f, "⊤"),
            AbstrVal::Const(c) => write!(f, "{:#x}", c),
            AbstrVal::StackRef { frame, offset } => write!(f, "〈𝑺 {}, {}〉", frame, offset),
            AbstrVal::HeapRef { alloc, offset } => write!(f, "〈𝑯 {}, {}〉", alloc, offset),
            AbstrVal::FuncPtr(FuncTargets::Unknown) => write!(f, "𝑭⊤"),
            AbstrVal::FuncPtr(FuncTargets::Set(s)) => {
                let targets: Vec<String> = s.iter().map(|a| format!("{:#x}", a)).collect();
                write!(f, "𝑭{{{}}}", targets.join(", "))
            }
        }
    }
}

impl AbstrVal {
    pub fn new_const(c: Const) -> AbstrVal {
        AbstrVal::Const(c)
    }

    pub fn new_u64(v: u64, width: u64) -> AbstrVal {
        AbstrVal::Const(Const::new_u64(v, width))
    }

    pub fn new_i64(v: i64, width: u64) -> AbstrVal {
        AbstrVal::Const(Const::new_i64(v, width))
    }

    pub fn new_stack(frame: FrameId, offset: i64) -> AbstrVal {
        AbstrVal::StackRef {
            frame,
            offset: Offset::Known(offset),
        }
    }

    pub fn new_heap(alloc: AllocId, offset: i64) -> AbstrVal {
        AbstrVal::HeapRef {
            alloc,
            offset: Offset::Known(offset),
        }
    }

    pub fn new_fptr(addr: Address) -> AbstrVal {
        AbstrVal::FuncPtr(FuncTargets::Set(BTreeSet::from([addr])))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, AbstrVal::Undefined)
    }

    pub fn is_top(&self) -> bool {
        matches!(self, AbstrVal::Top)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, AbstrVal::StackRef { .. } | AbstrVal::HeapRef { .. })
    }

    pub fn as_const(&self) -> Option<&Const> {
        match self {
            AbstrVal::Const(c) => Some(c),
            _ => None,
        }
    }

    /// The memory object this value points into.
    pub fn pointee(&self) -> Option<MemObject> {
        match self {
            AbstrVal::StackRef { frame, .. } => Some(MemObject::Frame(frame.clone())),
            AbstrVal::HeapRef { alloc, .. } => Some(MemObject::Alloc(alloc.clone())),
            _ => None,
        }
    }

    /// Same pointer base with another offset.
    fn with_offset(&self, offset: Offset) -> AbstrVal {
        match self {
            AbstrVal::StackRef { frame, .. } => AbstrVal::StackRef {
                frame: frame.clone(),
                offset,
            },
            AbstrVal::HeapRef { alloc, .. } => AbstrVal::HeapRef {
                alloc: alloc.clone(),
                offset,
            },
            _ => AbstrVal::Top,
        }
    }

    fn offset(&self) -> Option<Offset> {
        match self {
            AbstrVal::StackRef { offset, .. } | AbstrVal::HeapRef { offset, .. } => Some(*offset),
            _ => None,
        }
    }

    fn same_base(&self, other: &AbstrVal) -> bool {
        self.pointee().is_some() && self.pointee() == other.pointee()
    }

    /// Adds a byte displacement. Used for memory operand offsets.
    pub fn add_displacement(&self, delta: i64) -> AbstrVal {
        match self {
            AbstrVal::Undefined => AbstrVal::Undefined,
            AbstrVal::Const(c) => AbstrVal::Const(Const::newi(
                BigInt::from(c.vu()) + BigInt::from(delta),
                c.width(),
            )),
            AbstrVal::StackRef { offset, .. } | AbstrVal::HeapRef { offset, .. } => {
                self.with_offset(offset.add(delta))
            }
            AbstrVal::Top | AbstrVal::FuncPtr(_) => AbstrVal::Top,
        }
    }

    /// Truncates constants to [bits]. Other values are unchanged.
    pub fn truncate(&self, bits: u64) -> AbstrVal {
        match self {
            AbstrVal::Const(c) if c.width() > bits => AbstrVal::Const(c.trunc(bits)),
            _ => self.clone(),
        }
    }

    /// Least upper bound of both values.
    pub fn join(&self, other: &AbstrVal) -> AbstrVal {
        match (self, other) {
            (AbstrVal::Undefined, v) | (v, AbstrVal::Undefined) => v.clone(),
            (AbstrVal::Top, _) | (_, AbstrVal::Top) => AbstrVal::Top,
            (AbstrVal::Const(a), AbstrVal::Const(b)) => {
                if a == b {
                    return self.clone();
                }
                AbstrVal::Top
            }
            (
                AbstrVal::StackRef { offset: oa, .. },
                AbstrVal::StackRef { offset: ob, .. },
            )
            | (AbstrVal::HeapRef { offset: oa, .. }, AbstrVal::HeapRef { offset: ob, .. })
                if self.same_base(other) =>
            {
                self.with_offset(oa.join(ob))
            }
            (AbstrVal::FuncPtr(a), AbstrVal::FuncPtr(b)) => AbstrVal::FuncPtr(a.join(b)),
            _ => AbstrVal::Top,
        }
    }

    /// Widening of [self] (the previous value) with [newer].
    /// A function pointer set that keeps growing is set to Unknown.
    /// Constants and offsets reach their top with a single join already.
    pub fn widen(&self, newer: &AbstrVal) -> AbstrVal {
        let joined = self.join(newer);
        if joined == *self {
            return joined;
        }
        match (self, &joined) {
            (AbstrVal::FuncPtr(FuncTargets::Set(_)), AbstrVal::FuncPtr(FuncTargets::Set(_))) => {
                AbstrVal::FuncPtr(FuncTargets::Unknown)
            }
            _ => joined,
        }
    }

    /// Partial order of the lattice.
    pub fn leq(&self, other: &AbstrVal) -> bool {
        self.join(other) == *other
    }

    /// Abstract transfer of a binary operation.
    pub fn binary(&self, op: BinOp, rhs: &AbstrVal) -> AbstrVal {
        match (self, rhs) {
            (AbstrVal::Undefined, _) | (_, AbstrVal::Undefined) => AbstrVal::Undefined,
            (AbstrVal::Const(a), AbstrVal::Const(b)) => match a.binop(op, b) {
                Some(c) => AbstrVal::Const(c),
                None => AbstrVal::Top,
            },
            (p, AbstrVal::Const(c)) if p.is_pointer() && op == BinOp::Add => {
                p.add_displacement(c.as_i64())
            }
            (AbstrVal::Const(c), p) if p.is_pointer() && op == BinOp::Add => {
                p.add_displacement(c.as_i64())
            }
            (p, AbstrVal::Const(c)) if p.is_pointer() && op == BinOp::Sub => {
                p.add_displacement(c.as_i64().wrapping_neg())
            }
            (p, q) if op == BinOp::Sub && p.same_base(q) => {
                match (p.offset(), q.offset()) {
                    (Some(Offset::Known(a)), Some(Offset::Known(b))) => {
                        AbstrVal::new_i64(a.wrapping_sub(b), 64)
                    }
                    _ => AbstrVal::Top,
                }
            }
            // Base stays, the offset dimension is lost.
            (p, AbstrVal::Top) if p.is_pointer() && matches!(op, BinOp::Add | BinOp::Sub) => {
                p.with_offset(Offset::Unknown)
            }
            (AbstrVal::Top, p) if p.is_pointer() && op == BinOp::Add => {
                p.with_offset(Offset::Unknown)
            }
            _ => AbstrVal::Top,
        }
    }

    pub fn unary(&self, op: UnOp) -> AbstrVal {
        match self {
            AbstrVal::Undefined => AbstrVal::Undefined,
            AbstrVal::Const(c) => AbstrVal::Const(c.unop(op)),
            _ => AbstrVal::Top,
        }
    }

    pub fn compare(&self, op: CmpOp, rhs: &AbstrVal) -> AbstrVal {
        match (self, rhs) {
            (AbstrVal::Undefined, _) | (_, AbstrVal::Undefined) => AbstrVal::Undefined,
            (AbstrVal::Const(a), AbstrVal::Const(b)) => AbstrVal::Const(a.cmp_op(op, b)),
            (p, q) if p.same_base(q) => match (p.offset(), q.offset()) {
                (Some(Offset::Known(a)), Some(Offset::Known(b))) => AbstrVal::Const(
                    Const::new_i64(a, 64).cmp_op(op, &Const::new_i64(b, 64)),
                ),
                _ => AbstrVal::Top,
            },
            _ => AbstrVal::Top,
        }
    }
}
