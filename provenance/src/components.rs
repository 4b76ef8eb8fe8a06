// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

use std::collections::{BTreeMap, BTreeSet};

use lifted_il::{Address, Program};
use log::debug;
use petgraph::{unionfind::UnionFind, Direction::Incoming};

/// Functions connected by calls. No two components share a callee
/// with body, so they can be analysed in parallel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Component {
    pub functions: BTreeSet<Address>,
    /// Functions analysed as entry points.
    pub roots: Vec<Address>,
}

/// Partitions the functions of [program] into weakly connected
/// components of the call graph. Routines without body do not
/// connect their callers.
///
/// If [entries] is not empty, only components containing an entry are
/// returned and the entries are their roots. Otherwise every function
/// without caller is a root. Components where every function has a
/// caller get their lowest function as root.
pub fn partition(program: &Program, entries: &[Address]) -> Vec<Component> {
    let bodies: Vec<Address> = program.functions().map(|f| f.get_entry()).collect();
    let index: BTreeMap<Address, usize> =
        bodies.iter().enumerate().map(|(i, a)| (*a, i)).collect();
    let cg = program.call_graph();

    let mut uf = UnionFind::<usize>::new(bodies.len());
    for (from, to, _) in cg.all_edges() {
        if let (Some(i), Some(j)) = (index.get(&from), index.get(&to)) {
            uf.union(*i, *j);
        }
    }
    let mut groups: BTreeMap<usize, BTreeSet<Address>> = BTreeMap::new();
    for (i, label) in uf.into_labeling().into_iter().enumerate() {
        groups.entry(label).or_default().insert(bodies[i]);
    }

    let has_caller = |f: Address| {
        cg.neighbors_directed(f, Incoming)
            .any(|c| c != f && index.contains_key(&c))
    };
    let mut components: Vec<Component> = Vec::new();
    for functions in groups.into_values() {
        let roots: Vec<Address> = if entries.is_empty() {
            let r: Vec<Address> = functions
                .iter()
                .copied()
                .filter(|f| !has_caller(*f))
                .collect();
            if r.is_empty() {
                functions.first().copied().into_iter().collect()
            } else {
                r
            }
        } else {
            let r: BTreeSet<Address> = entries
                .iter()
                .copied()
                .filter(|e| functions.contains(e))
                .collect();
            r.into_iter().collect()
        };
        if roots.is_empty() {
            continue;
        }
        components.push(Component { functions, roots });
    }
    components.sort_by_key(|c| c.functions.first().copied());
    debug!("{} call graph components to analyse", components.len());
    components
}
