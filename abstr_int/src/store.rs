// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Display,
};

use crate::{
    memory::{FrameId, Location, MemObject},
    value::{AbstrVal, Offset},
};

/// Mapping of locations to abstract values at one program point.
/// Locations not present are Undefined.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Store {
    cells: BTreeMap<Location, AbstrVal>,
    /// Width in bytes of the memory cells written by a sized access.
    sizes: BTreeMap<Location, u64>,
}

/// The object and first byte a known memory cell starts at.
/// Globals have no object and start at their address.
fn cell_start(loc: &Location) -> Option<(Option<MemObject>, i128)> {
    match loc {
        Location::Stack {
            offset: Offset::Known(o),
            ..
        }
        | Location::Heap {
            offset: Offset::Known(o),
            ..
        } => Some((loc.object(), *o as i128)),
        Location::Global(a) => Some((None, *a as i128)),
        _ => None,
    }
}

impl Display for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (loc, v) in self.cells.iter() {
            writeln!(f, "{} = {}", loc, v)?;
        }
        Ok(())
    }
}

impl Store {
    pub fn new() -> Store {
        Store::default()
    }

    pub fn read(&self, loc: &Location) -> AbstrVal {
        self.cells.get(loc).cloned().unwrap_or(AbstrVal::Undefined)
    }

    /// Width in bytes [loc] was last written with, if known.
    pub fn size_of(&self, loc: &Location) -> Option<u64> {
        self.sizes.get(loc).copied()
    }

    /// Reads [bytes] bytes at [loc].
    /// A cell written with another width is Top.
    pub fn read_sized(&self, loc: &Location, bytes: u64) -> AbstrVal {
        let v = self.read(loc);
        match self.size_of(loc) {
            Some(s) if s != bytes && !v.is_undefined() => AbstrVal::Top,
            _ => v,
        }
    }

    /// Strong update.
    pub fn write(&mut self, loc: Location, val: AbstrVal) {
        if val.is_undefined() {
            self.cells.remove(&loc);
            self.sizes.remove(&loc);
            return;
        }
        self.cells.insert(loc, val);
    }

    /// Strong update of [bytes] bytes at [loc].
    /// Other known cells overlapping the written bytes become Top.
    pub fn write_sized(&mut self, loc: Location, val: AbstrVal, bytes: u64) {
        if let Some((obj, start)) = cell_start(&loc) {
            let end = start + bytes as i128;
            let clobbered: Vec<Location> = self
                .cells
                .keys()
                .filter(|other| **other != loc)
                .filter(|other| match cell_start(other) {
                    Some((o, s)) if o == obj => {
                        let e = s + self.size_of(other).unwrap_or(1) as i128;
                        s < end && start < e
                    }
                    _ => false,
                })
                .cloned()
                .collect();
            for other in clobbered {
                self.cells.insert(other, AbstrVal::Top);
            }
        }
        if val.is_undefined() {
            self.write(loc, val);
            return;
        }
        self.sizes.insert(loc.clone(), bytes);
        self.cells.insert(loc, val);
    }

    /// Weak update. The location holds the old or the new value afterwards.
    pub fn join_write(&mut self, loc: Location, val: AbstrVal) {
        self.join_write_sized(loc, val, None);
    }

    /// Weak update of a cell [bytes] bytes wide.
    /// Joining cells of different widths gives Top.
    pub fn join_write_sized(&mut self, loc: Location, val: AbstrVal, bytes: Option<u64>) {
        let old = self.read(&loc);
        let (joined, size) = match (self.size_of(&loc), bytes) {
            (Some(a), Some(b)) if a != b && !old.is_undefined() => (AbstrVal::Top, Some(a.max(b))),
            (a, b) => (old.join(&val), b.or(a)),
        };
        self.write(loc.clone(), joined);
        if let (Some(size), true) = (size, self.cells.contains_key(&loc)) {
            self.sizes.insert(loc, size);
        }
    }

    fn merge_with<F>(&self, succ: &mut Store, op: F) -> bool
    where
        F: Fn(&AbstrVal, &AbstrVal) -> AbstrVal,
    {
        let mut changed = false;
        for (loc, v) in self.cells.iter() {
            let old = succ.read(loc);
            let (mut new, mut size) = (op(&old, v), succ.size_of(loc));
            match (size, self.size_of(loc)) {
                (Some(a), Some(b)) if a != b && !old.is_undefined() => {
                    new = AbstrVal::Top;
                    size = Some(a.max(b));
                }
                (None, b) => size = b,
                _ => {}
            }
            if new != old {
                succ.write(loc.clone(), new);
                changed = true;
            }
            if size != succ.size_of(loc) {
                if let Some(size) = size {
                    succ.sizes.insert(loc.clone(), size);
                    changed = true;
                }
            }
        }
        changed
    }

    /// Joins this store into [succ].
    /// Returns true if [succ] changed.
    pub fn merge_into(&self, succ: &mut Store) -> bool {
        self.merge_with(succ, AbstrVal::join)
    }

    /// Like [Store::merge_into] but widens every cell of [succ].
    pub fn widen_into(&self, succ: &mut Store) -> bool {
        self.merge_with(succ, AbstrVal::widen)
    }

    pub fn join(&self, other: &Store) -> Store {
        let mut result = self.clone();
        other.merge_into(&mut result);
        result
    }

    pub fn leq(&self, other: &Store) -> bool {
        self.cells.iter().all(|(loc, v)| {
            let size_ok = match (self.size_of(loc), other.size_of(loc)) {
                (Some(a), Some(b)) => a == b || other.read(loc).is_top(),
                _ => true,
            };
            size_ok && v.leq(&other.read(loc))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Location, &AbstrVal)> {
        self.cells.iter()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Copy without any register.
    pub fn memory_only(&self) -> Store {
        Store {
            cells: self
                .cells
                .iter()
                .filter(|(loc, _)| !loc.is_reg())
                .map(|(l, v)| (l.clone(), v.clone()))
                .collect(),
            sizes: self.sizes.clone(),
        }
    }

    /// Removes all cells of the stack frame [frame].
    pub fn remove_frame(&mut self, frame: &FrameId) {
        let in_frame =
            |loc: &Location| matches!(loc, Location::Stack { frame: f, .. } if f == frame);
        self.cells.retain(|loc, _| !in_frame(loc));
        self.sizes.retain(|loc, _| !in_frame(loc));
    }

    /// All cells of [obj] including the one of unknown offset.
    pub fn object_cells(&self, obj: &MemObject) -> Vec<(Location, AbstrVal)> {
        self.cells
            .iter()
            .filter(|(loc, _)| loc.object().as_ref() == Some(obj))
            .map(|(l, v)| (l.clone(), v.clone()))
            .collect()
    }

    /// Reads [bytes] bytes of [obj] at [offset].
    /// A known offset also observes what was written at an unknown offset.
    /// An unknown offset observes every cell of the object.
    pub fn read_object(&self, obj: &MemObject, offset: Offset, bytes: u64) -> AbstrVal {
        match offset {
            Offset::Known(_) => {
                let cell = self.read_sized(&Location::in_object(obj, offset), bytes);
                let any = self.read_sized(&Location::in_object(obj, Offset::Unknown), bytes);
                cell.join(&any)
            }
            Offset::Unknown => self
                .object_cells(obj)
                .iter()
                .fold(AbstrVal::Undefined, |acc, (l, _)| {
                    acc.join(&self.read_sized(l, bytes))
                }),
        }
    }

    /// Sets every cell of every object reachable from [roots] to Top.
    pub fn havoc_reachable(&mut self, roots: &[AbstrVal]) {
        let mut work: Vec<MemObject> = roots.iter().filter_map(|v| v.pointee()).collect();
        let mut seen: BTreeSet<MemObject> = BTreeSet::new();
        while let Some(obj) = work.pop() {
            if !seen.insert(obj.clone()) {
                continue;
            }
            for (loc, v) in self.object_cells(&obj) {
                if let Some(next) = v.pointee() {
                    work.push(next);
                }
                self.write(loc, AbstrVal::Top);
            }
            self.write(Location::in_object(&obj, Offset::Unknown), AbstrVal::Top);
        }
    }
}
