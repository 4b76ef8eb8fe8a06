// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Display,
    sync::Arc,
};

use helper::set_map::SetMap;
use lifted_il::Address;

use crate::{
    context::CallContext,
    memory::{CallSiteId, FrameId, Location, ProgramPoint},
    store::Store,
    value::{AbstrVal, Const, FuncTargets, Offset},
};

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiagKind {
    /// An indirect call without any usable target, or with targets
    /// that have no body.
    UnresolvedIndirectTarget,
    /// A recursive call was redirected to the function summary.
    RecursionLimitExceeded,
    /// A heap access at or beyond the size of the object.
    OutOfBoundsAccess,
    /// A direct call to a routine without body and known semantics.
    OpaqueCall,
}

/// A non-fatal finding of the analysis.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Diagnostic {
    pub kind: DiagKind,
    pub at: ProgramPoint,
    pub detail: String,
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} at {}: {}", self.kind, self.at, self.detail)
    }
}

/// A call from [from] inside [proc_addr] to [to].
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ConcreteCall {
    pub proc_addr: Address,
    pub from: Address,
    pub to: Address,
}

impl Display for ConcreteCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "call {:#x} : {:#x} -> {:#x}",
            self.proc_addr, self.from, self.to
        )
    }
}

/// An instruction at [from] accessing [size] bytes of static memory at [to].
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct MemXref {
    pub from: Address,
    pub to: Address,
    pub size: u64,
}

impl Display for MemXref {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mem {:#x} -> {:#x} ({})", self.from, self.to, self.size)
    }
}

/// An instruction at [at] accessing the stack variable at [offset]
/// of the frame of [base].
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct StackXref {
    pub at: Address,
    pub base: Address,
    pub offset: i64,
}

impl Display for StackXref {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "stack {:#x} -> 𝑺 {:#x} {}",
            self.at,
            self.base,
            helper::num::signed_hex(self.offset)
        )
    }
}

/// Facts collected while interpreting a function and its callees.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AnalysisProducts {
    pub calls: BTreeSet<ConcreteCall>,
    /// Targets of every analysed indirect call.
    pub icall_targets: SetMap<CallSiteId, Address>,
    pub mem_xrefs: BTreeSet<MemXref>,
    pub stack_xrefs: BTreeSet<StackXref>,
    pub diagnostics: BTreeSet<Diagnostic>,
}

impl AnalysisProducts {
    pub fn new() -> AnalysisProducts {
        AnalysisProducts::default()
    }

    pub fn merge(&mut self, other: &AnalysisProducts) {
        self.calls.extend(other.calls.iter().copied());
        self.icall_targets.merge(&other.icall_targets);
        self.mem_xrefs.extend(other.mem_xrefs.iter().copied());
        self.stack_xrefs.extend(other.stack_xrefs.iter().copied());
        self.diagnostics.extend(other.diagnostics.iter().cloned());
    }

    pub fn add_diag(&mut self, kind: DiagKind, at: ProgramPoint, detail: String) {
        self.diagnostics.insert(Diagnostic { kind, at, detail });
    }

    pub fn has_diag(&self, kind: DiagKind) -> bool {
        self.diagnostics.iter().any(|d| d.kind == kind)
    }

    pub fn diags_of(&self, kind: DiagKind) -> Vec<&Diagnostic> {
        self.diagnostics.iter().filter(|d| d.kind == kind).collect()
    }
}

/// What a location holds at the end of a function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LocationClass {
    StackVariable { base: Address, offset: Offset },
    HeapObject { site: CallSiteId, offset: Offset },
    GlobalVariable(Address),
    /// A register holding a pointer to the location.
    RegisterAlias(Location),
    Constant(Const),
    FunctionPointer(FuncTargets),
    Unknown,
}

/// Classifies every location of [store].
pub fn classify_store(store: &Store) -> BTreeMap<Location, LocationClass> {
    let mut classes = BTreeMap::new();
    for (loc, val) in store.iter() {
        let class = match loc {
            Location::Stack { frame, offset } => LocationClass::StackVariable {
                base: frame.func,
                offset: *offset,
            },
            Location::Heap { alloc, offset } => LocationClass::HeapObject {
                site: alloc.site,
                offset: *offset,
            },
            Location::Global(a) => LocationClass::GlobalVariable(*a),
            Location::Reg(_) => match val {
                AbstrVal::StackRef { frame, offset } => LocationClass::RegisterAlias(
                    Location::Stack {
                        frame: frame.clone(),
                        offset: *offset,
                    },
                ),
                AbstrVal::HeapRef { alloc, offset } => {
                    LocationClass::RegisterAlias(Location::Heap {
                        alloc: alloc.clone(),
                        offset: *offset,
                    })
                }
                AbstrVal::Const(c) => LocationClass::Constant(c.clone()),
                AbstrVal::FuncPtr(t) => LocationClass::FunctionPointer(t.clone()),
                AbstrVal::Top | AbstrVal::Undefined => LocationClass::Unknown,
            },
        };
        classes.insert(loc.clone(), class);
    }
    classes
}

/// Result of analysing one function under one context.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionResult {
    pub func: Address,
    pub ctx: Arc<CallContext>,
    /// The stack frame of this activation.
    pub frame: FrameId,
    /// Join of all returned values. Undefined if nothing is returned.
    pub ret: AbstrVal,
    /// Join of the stores at all returns. None if the function never returns.
    pub exit: Option<Store>,
    /// Store at the entry of every reached block.
    pub block_states: BTreeMap<Address, Store>,
    pub products: AnalysisProducts,
    /// Writes through undeterminable addresses happened.
    pub unknown_writes: bool,
}

impl FunctionResult {
    pub fn classify_locations(&self) -> BTreeMap<Location, LocationClass> {
        self.exit.as_ref().map(classify_store).unwrap_or_default()
    }

    pub fn diagnostics(&self) -> &BTreeSet<Diagnostic> {
        &self.products.diagnostics
    }
}
