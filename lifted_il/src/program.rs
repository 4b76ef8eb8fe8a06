// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

use std::collections::{BTreeMap, BTreeSet};

use log::warn;
use petgraph::prelude::DiGraphMap;

use crate::cc::CallingConvention;
use crate::cfg::FunctionCfg;
use crate::error::IlError;
use crate::insn::Operand;
use crate::signature::{Signature, SignatureTable};
use crate::Address;

/// Initial content of static memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataCell {
    /// An integer of [bytes] bytes.
    Word { value: u64, bytes: u64 },
    /// The address of a function. E.g. an entry of a function table.
    FuncAddr(Address),
}

/// Everything the lifter hands over for analysis.
#[derive(Clone, Debug)]
pub struct Program {
    functions: BTreeMap<Address, FunctionCfg>,
    externals: SignatureTable,
    data: BTreeMap<Address, DataCell>,
    cc: CallingConvention,
    entries: Vec<Address>,
}

impl Program {
    pub fn new(cc: CallingConvention) -> Program {
        Program {
            functions: BTreeMap::new(),
            externals: SignatureTable::new(),
            data: BTreeMap::new(),
            cc,
            entries: Vec::new(),
        }
    }

    pub fn add_function(&mut self, cfg: FunctionCfg) {
        if self.functions.contains_key(&cfg.get_entry()) {
            warn!("Function at {:#x} added twice.", cfg.get_entry());
        }
        self.functions.insert(cfg.get_entry(), cfg);
    }

    pub fn add_external(&mut self, addr: Address, sig: Signature) {
        self.externals.insert(addr, sig);
    }

    pub fn add_data(&mut self, addr: Address, cell: DataCell) {
        self.data.insert(addr, cell);
    }

    pub fn add_entry(&mut self, addr: Address) {
        if !self.entries.contains(&addr) {
            self.entries.push(addr);
        }
    }

    pub fn get_function(&self, addr: Address) -> Option<&FunctionCfg> {
        self.functions.get(&addr)
    }

    pub fn get_external(&self, addr: Address) -> Option<&Signature> {
        self.externals.get(addr)
    }

    pub fn get_data(&self, addr: Address) -> Option<&DataCell> {
        self.data.get(&addr)
    }

    pub fn get_cc(&self) -> &CallingConvention {
        &self.cc
    }

    pub fn get_entries(&self) -> &[Address] {
        &self.entries
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionCfg> {
        self.functions.values()
    }

    pub fn externals(&self) -> &SignatureTable {
        &self.externals
    }

    /// True if [addr] is the entry of a function with or without body.
    pub fn is_code(&self, addr: Address) -> bool {
        self.functions.contains_key(&addr) || self.externals.contains(addr)
    }

    /// Code addresses that appear as values in instructions or data.
    pub fn address_taken(&self) -> BTreeSet<Address> {
        let mut taken = BTreeSet::new();
        for op in self.functions.values().flat_map(|f| f.operands()) {
            match op {
                Operand::Func(a) => {
                    taken.insert(*a);
                }
                Operand::Imm { value, .. } if self.is_code(*value) => {
                    taken.insert(*value);
                }
                _ => {}
            }
        }
        for cell in self.data.values() {
            match cell {
                DataCell::FuncAddr(a) => {
                    taken.insert(*a);
                }
                DataCell::Word { value, .. } if self.is_code(*value) => {
                    taken.insert(*value);
                }
                _ => {}
            }
        }
        taken
    }

    /// Call graph over all functions. Indirect calls add edges to
    /// their candidates. Functions calling through a value also get
    /// an edge to every address taken function.
    pub fn call_graph(&self) -> DiGraphMap<Address, ()> {
        let mut cg = DiGraphMap::new();
        let taken = self.address_taken();
        for f in self.functions.values() {
            cg.add_node(f.get_entry());
            for t in f.call_targets() {
                cg.add_edge(f.get_entry(), t, ());
            }
            if f.has_value_icall() {
                for t in taken.iter() {
                    cg.add_edge(f.get_entry(), *t, ());
                }
            }
        }
        cg
    }

    /// Validates every function.
    /// Returns the defects of the malformed ones.
    pub fn validate(&self) -> BTreeMap<Address, IlError> {
        let mut malformed = BTreeMap::new();
        for (key, f) in self.functions.iter() {
            if let Err(e) = f.validate() {
                warn!("{}", e);
                malformed.insert(*key, e);
            }
        }
        malformed
    }
}
