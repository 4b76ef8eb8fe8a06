// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo::dominators::simple_fast;
use petgraph::prelude::DiGraphMap;
use petgraph::visit::DfsPostOrder;
use petgraph::Direction::{Incoming, Outgoing};

use crate::error::IlError;
use crate::insn::{CallTarget, Insn, Op, Operand, Terminator};
use crate::Address;

/// A straight line of instructions ending in a [Terminator].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BasicBlock {
    /// Address of the first instruction. Identifies the block.
    pub addr: Address,
    pub insns: Vec<Insn>,
    pub term: Terminator,
}

impl BasicBlock {
    pub fn new(addr: Address, insns: Vec<Insn>, term: Terminator) -> BasicBlock {
        BasicBlock { addr, insns, term }
    }

    pub fn successors(&self) -> Vec<Address> {
        self.term.successors()
    }
}

/// A control-flow graph of a procedure
#[derive(Clone, Debug)]
pub struct FunctionCfg {
    entry: Address,
    name: String,
    /// Number of declared parameters.
    params: usize,
    blocks: BTreeMap<Address, BasicBlock>,
    /// The graph. Nodes are the addresses of basic blocks.
    graph: DiGraphMap<Address, ()>,
}

impl FunctionCfg {
    pub fn new(entry: Address, name: &str, params: usize) -> FunctionCfg {
        FunctionCfg {
            entry,
            name: name.to_owned(),
            params,
            blocks: BTreeMap::new(),
            graph: DiGraphMap::new(),
        }
    }

    /// Adds a block and the edges to its successors.
    /// A block added twice replaces the former one.
    pub fn add_block(&mut self, block: BasicBlock) {
        let addr = block.addr;
        if self.blocks.contains_key(&addr) {
            let old: Vec<Address> = self.graph.neighbors_directed(addr, Outgoing).collect();
            old.into_iter().for_each(|s| {
                self.graph.remove_edge(addr, s);
            });
        }
        self.graph.add_node(addr);
        for succ in block.successors() {
            self.graph.add_edge(addr, succ, ());
        }
        self.blocks.insert(addr, block);
    }

    pub fn get_entry(&self) -> Address {
        self.entry
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_params(&self) -> usize {
        self.params
    }

    pub fn get_block(&self, addr: Address) -> Option<&BasicBlock> {
        self.blocks.get(&addr)
    }

    pub fn blocks(&self) -> impl Iterator<Item = &BasicBlock> {
        self.blocks.values()
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn get_graph(&self) -> &DiGraphMap<Address, ()> {
        &self.graph
    }

    pub fn successors(&self, addr: Address) -> Vec<Address> {
        self.graph.neighbors_directed(addr, Outgoing).collect()
    }

    pub fn predecessors(&self, addr: Address) -> Vec<Address> {
        self.graph.neighbors_directed(addr, Incoming).collect()
    }

    /// Blocks reachable from the entry in reverse post-order.
    pub fn rev_postorder(&self) -> Vec<Address> {
        if !self.graph.contains_node(self.entry) {
            return Vec::new();
        }
        let mut order = Vec::new();
        let mut dfs = DfsPostOrder::new(&self.graph, self.entry);
        while let Some(n) = dfs.next(&self.graph) {
            order.push(n);
        }
        order.reverse();
        order
    }

    /// Targets of back edges. A back edge is an edge u -> v
    /// where v dominates u.
    pub fn loop_headers(&self) -> BTreeSet<Address> {
        let mut headers = BTreeSet::new();
        if !self.graph.contains_node(self.entry) {
            return headers;
        }
        let doms = simple_fast(&self.graph, self.entry);
        for (from, to, _) in self.graph.all_edges() {
            let Some(mut from_doms) = doms.dominators(from) else {
                // Unreachable
                continue;
            };
            if from_doms.any(|d| d == to) {
                headers.insert(to);
            }
        }
        headers
    }

    /// Every address this function may call.
    /// Indirect calls contribute their candidate sets.
    pub fn call_targets(&self) -> BTreeSet<Address> {
        let mut targets = BTreeSet::new();
        for insn in self.blocks.values().flat_map(|b| b.insns.iter()) {
            match &insn.op {
                Op::Call {
                    target: CallTarget::Direct(a),
                    ..
                } => {
                    targets.insert(*a);
                }
                Op::Call {
                    target: CallTarget::Indirect { candidates, .. },
                    ..
                } => targets.extend(candidates.iter().copied()),
                _ => {}
            }
        }
        targets
    }

    /// True if some call target is computed at runtime.
    pub fn has_value_icall(&self) -> bool {
        self.blocks.values().flat_map(|b| b.insns.iter()).any(|i| {
            matches!(
                &i.op,
                Op::Call {
                    target: CallTarget::Indirect { value: Some(_), .. },
                    ..
                }
            )
        })
    }

    /// Every operand of the function's instructions and terminators.
    pub fn operands(&self) -> Vec<&Operand> {
        let mut ops = Vec::new();
        for b in self.blocks.values() {
            ops.extend(b.insns.iter().flat_map(|i| i.op.operands()));
            match &b.term {
                Terminator::Branch { cond, .. } => ops.push(cond),
                Terminator::Return(Some(v)) => ops.push(v),
                _ => {}
            }
        }
        ops
    }

    /// Checks the structural integrity of the CFG.
    pub fn validate(&self) -> Result<(), IlError> {
        let func = self.entry;
        if !self.blocks.contains_key(&self.entry) {
            return Err(IlError::MissingEntry { func });
        }
        for block in self.blocks.values() {
            for to in block.successors() {
                if !self.blocks.contains_key(&to) {
                    return Err(IlError::DanglingEdge {
                        func,
                        from: block.addr,
                        to,
                    });
                }
            }
            for insn in block.insns.iter() {
                if let Op::Call {
                    target:
                        CallTarget::Indirect {
                            value: None,
                            candidates,
                        },
                    ..
                } = &insn.op
                {
                    if candidates.is_empty() {
                        return Err(IlError::CallWithoutTarget {
                            func,
                            at: insn.addr,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
