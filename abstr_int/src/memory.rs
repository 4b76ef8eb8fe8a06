// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

use std::{fmt::Display, sync::Arc};

use lifted_il::{Address, RegName};

use crate::{context::CallContext, value::Offset};

/// A call instruction [addr] inside the function [func].
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct CallSiteId {
    pub func: Address,
    pub addr: Address,
}

impl Display for CallSiteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}@{:#x}", self.addr, self.func)
    }
}

/// An instruction at [addr] in the [block] of [func].
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProgramPoint {
    pub func: Address,
    pub block: Address,
    pub addr: Address,
}

impl ProgramPoint {
    pub fn new(func: Address, block: Address, addr: Address) -> ProgramPoint {
        ProgramPoint { func, block, addr }
    }
}

impl Display for ProgramPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x} (fcn {:#x})", self.addr, self.func)
    }
}

/// The stack frame of one activation of [func] under [ctx].
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct FrameId {
    pub func: Address,
    pub ctx: Arc<CallContext>,
}

impl FrameId {
    pub fn new(func: Address, ctx: Arc<CallContext>) -> FrameId {
        FrameId { func, ctx }
    }
}

impl Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}{}", self.func, self.ctx)
    }
}

/// The object allocated at [site] under [ctx].
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct AllocId {
    pub site: CallSiteId,
    pub ctx: Arc<CallContext>,
}

impl AllocId {
    pub fn new(site: CallSiteId, ctx: Arc<CallContext>) -> AllocId {
        AllocId { site, ctx }
    }
}

impl Display for AllocId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}{}", self.site.addr, self.ctx)
    }
}

/// A memory object pointers can point into.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum MemObject {
    Frame(FrameId),
    Alloc(AllocId),
}

/// Something a value can be stored in.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Location {
    Reg(RegName),
    Stack { frame: FrameId, offset: Offset },
    Heap { alloc: AllocId, offset: Offset },
    /// Static memory at a constant address.
    Global(Address),
}

impl Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::Reg(r) => write!(f, "{}", r),
            Location::Stack { frame, offset } => write!(f, "𝑺[{} {}]", frame, offset),
            Location::Heap { alloc, offset } => write!(f, "𝑯[{} {}]", alloc, offset),
            Location::Global(a) => write!(f, "𝑮[{:#x}]", a),
        }
    }
}

impl Location {
    pub fn reg(name: &str) -> Location {
        Location::Reg(name.to_owned())
    }

    pub fn stack(frame: &FrameId, offset: i64) -> Location {
        Location::Stack {
            frame: frame.clone(),
            offset: Offset::Known(offset),
        }
    }

    pub fn heap(alloc: &AllocId, offset: i64) -> Location {
        Location::Heap {
            alloc: alloc.clone(),
            offset: Offset::Known(offset),
        }
    }

    /// The cell of [obj] at [offset].
    pub fn in_object(obj: &MemObject, offset: Offset) -> Location {
        match obj {
            MemObject::Frame(frame) => Location::Stack {
                frame: frame.clone(),
                offset,
            },
            MemObject::Alloc(alloc) => Location::Heap {
                alloc: alloc.clone(),
                offset,
            },
        }
    }

    pub fn is_reg(&self) -> bool {
        matches!(self, Location::Reg(_))
    }

    /// The memory object this location belongs to.
    pub fn object(&self) -> Option<MemObject> {
        match self {
            Location::Stack { frame, .. } => Some(MemObject::Frame(frame.clone())),
            Location::Heap { alloc, .. } => Some(MemObject::Alloc(alloc.clone())),
            _ => None,
        }
    }
}
