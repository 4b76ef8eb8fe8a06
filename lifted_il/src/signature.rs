// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

use std::collections::BTreeMap;

use bitflags::bitflags;

use crate::Address;

bitflags! {
    /// Behaviour flags of routines without a body.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct SigFlags: u32 {
        /// Returns nondeterministic input (e.g. `rand()`, `read()`).
        const NONDET_INPUT = 1 << 0;
        /// Never returns to its caller (e.g. `exit()`).
        const NO_RETURN = 1 << 1;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamType {
    Scalar,
    /// A size in bytes.
    Size,
    Pointer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RetType {
    Void,
    Scalar,
    Pointer,
}

/// Signature of a routine the program calls but has no CFG for.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Signature {
    pub name: String,
    pub params: Vec<ParamType>,
    pub ret: RetType,
    pub flags: SigFlags,
}

impl Signature {
    pub fn new(name: &str, params: Vec<ParamType>, ret: RetType) -> Signature {
        Signature {
            name: name.to_owned(),
            params,
            ret,
            flags: SigFlags::empty(),
        }
    }

    pub fn with_flags(mut self, flags: SigFlags) -> Signature {
        self.flags |= flags;
        self
    }

    pub fn malloc() -> Signature {
        Signature::new("malloc", vec![ParamType::Size], RetType::Pointer)
    }

    pub fn rand() -> Signature {
        Signature::new("rand", Vec::new(), RetType::Scalar).with_flags(SigFlags::NONDET_INPUT)
    }

    pub fn exit() -> Signature {
        Signature::new("exit", vec![ParamType::Scalar], RetType::Void)
            .with_flags(SigFlags::NO_RETURN)
    }

    /// Allocation routines return a pointer and take exactly one
    /// size parameter.
    pub fn is_allocator(&self) -> bool {
        self.ret == RetType::Pointer && self.params.len() == 1 && self.params[0] == ParamType::Size
    }

    /// Index of the size parameter of an allocator.
    pub fn size_param(&self) -> Option<usize> {
        self.params.iter().position(|p| *p == ParamType::Size)
    }

    pub fn is_input(&self) -> bool {
        self.flags.contains(SigFlags::NONDET_INPUT)
    }

    pub fn is_noreturn(&self) -> bool {
        self.flags.contains(SigFlags::NO_RETURN)
    }
}

/// Signatures of external routines indexed by their address.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignatureTable {
    by_addr: BTreeMap<Address, Signature>,
}

impl SignatureTable {
    pub fn new() -> SignatureTable {
        SignatureTable {
            by_addr: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, addr: Address, sig: Signature) {
        self.by_addr.insert(addr, sig);
    }

    pub fn get(&self, addr: Address) -> Option<&Signature> {
        self.by_addr.get(&addr)
    }

    pub fn contains(&self, addr: Address) -> bool {
        self.by_addr.contains_key(&addr)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, &Signature)> {
        self.by_addr.iter()
    }

    pub fn len(&self) -> usize {
        self.by_addr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_addr.is_empty()
    }
}
