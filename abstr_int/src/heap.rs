// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

use std::{
    collections::BTreeMap,
    fmt::Display,
    sync::{PoisonError, RwLock},
};

use lifted_il::Signature;
use log::debug;

use crate::{
    memory::{AllocId, ProgramPoint},
    value::AbstrVal,
};

/// What is known about the size of an allocated object.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum SizeFact {
    Const(u64),
    /// Between [lo] and [hi] bytes, both inclusive.
    Range { lo: u64, hi: u64 },
    Top,
}

impl Display for SizeFact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SizeFact::Const(n) => write!(f, "{:#x}", n),
            SizeFact::Range { lo, hi } => write!(f, "[{:#x}, {:#x}]", lo, hi),
            SizeFact::Top => write!(f, "⊤"),
        }
    }
}

impl SizeFact {
    pub fn from_value(v: &AbstrVal) -> SizeFact {
        match v.as_const() {
            Some(c) if c.width() <= 64 => SizeFact::Const(c.as_u64()),
            _ => SizeFact::Top,
        }
    }

    fn bounds(&self) -> Option<(u64, u64)> {
        match self {
            SizeFact::Const(n) => Some((*n, *n)),
            SizeFact::Range { lo, hi } => Some((*lo, *hi)),
            SizeFact::Top => None,
        }
    }

    pub fn join(&self, other: &SizeFact) -> SizeFact {
        let (Some((alo, ahi)), Some((blo, bhi))) = (self.bounds(), other.bounds()) else {
            return SizeFact::Top;
        };
        let (lo, hi) = (alo.min(blo), ahi.max(bhi));
        if lo == hi {
            return SizeFact::Const(lo);
        }
        SizeFact::Range { lo, hi }
    }

    /// True if accessing [bytes] bytes at [offset] definitely leaves the object.
    pub fn is_out_of_bounds(&self, offset: i64, bytes: u64) -> bool {
        let Some((_, hi)) = self.bounds() else {
            return false;
        };
        if offset < 0 {
            return true;
        }
        (offset as u64).saturating_add(bytes.max(1)) > hi
    }
}

/// An object returned by an allocation routine.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct AllocationObject {
    pub alloc_id: AllocId,
    pub size_fact: SizeFact,
    /// The allocating call.
    pub live_from: ProgramPoint,
}

impl Display for AllocationObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "𝑯 {} size {} from {}",
            self.alloc_id, self.size_fact, self.live_from
        )
    }
}

/// Registry of all allocation objects of an analysis run.
#[derive(Default)]
pub struct HeapModel {
    objects: RwLock<BTreeMap<AllocId, AllocationObject>>,
}

impl HeapModel {
    pub fn new() -> HeapModel {
        HeapModel::default()
    }

    /// Creates the allocation object for a call to [sig] with [args].
    /// Returns None if [sig] is no allocation routine.
    /// Allocating with the same [alloc_id] again joins the size facts.
    pub fn on_call(
        &self,
        sig: &Signature,
        args: &[AbstrVal],
        alloc_id: AllocId,
        live_from: ProgramPoint,
    ) -> Option<AllocationObject> {
        if !sig.is_allocator() {
            return None;
        }
        let size = sig
            .size_param()
            .and_then(|i| args.get(i))
            .map_or(SizeFact::Top, SizeFact::from_value);
        let mut objects = self.objects.write().unwrap_or_else(PoisonError::into_inner);
        let obj = objects
            .entry(alloc_id.clone())
            .and_modify(|o| o.size_fact = o.size_fact.join(&size))
            .or_insert_with(|| AllocationObject {
                alloc_id,
                size_fact: size,
                live_from,
            });
        debug!("Allocation {}", obj);
        Some(obj.clone())
    }

    pub fn get(&self, alloc_id: &AllocId) -> Option<AllocationObject> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(alloc_id)
            .cloned()
    }

    /// True if the access definitely leaves the object [alloc_id].
    /// Unknown objects are never out of bounds.
    pub fn is_out_of_bounds(&self, alloc_id: &AllocId, offset: i64, bytes: u64) -> bool {
        self.get(alloc_id)
            .is_some_and(|o| o.size_fact.is_out_of_bounds(offset, bytes))
    }

    pub fn objects(&self) -> Vec<AllocationObject> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
