// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    sync::Arc,
};

use lifted_il::{Address, BasicBlock, FunctionCfg, Terminator};
use log::trace;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    config::WorklistOrder,
    context::{CallContext, CallSummary},
    engine::Engine,
    error::AnalysisError,
    memory::{FrameId, ProgramPoint},
    op_handler::{eval_op, eval_operand},
    products::{AnalysisProducts, FunctionResult},
    store::Store,
    value::AbstrVal,
};

/// Functions currently analysed on this thread, with their context.
pub(crate) type ActiveSet = Vec<(Address, Arc<CallContext>)>;

/// Blocks waiting to be (re-)processed.
#[derive(Debug)]
struct WorkList {
    order: WorklistOrder,
    /// Reverse post-order index of every reachable block.
    rank: BTreeMap<Address, usize>,
    queue: VecDeque<Address>,
    queued: BTreeSet<Address>,
    rng: StdRng,
}

impl WorkList {
    fn new(order: WorklistOrder, rpo: &[Address]) -> WorkList {
        let seed = match order {
            WorklistOrder::Shuffled(seed) => seed,
            _ => 0,
        };
        WorkList {
            order,
            rank: rpo.iter().enumerate().map(|(i, a)| (*a, i)).collect(),
            queue: VecDeque::new(),
            queued: BTreeSet::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn push(&mut self, block: Address) {
        if self.queued.insert(block) {
            self.queue.push_back(block);
        }
    }

    fn pop(&mut self) -> Option<Address> {
        if self.queue.is_empty() {
            return None;
        }
        let idx = match self.order {
            WorklistOrder::Fifo => 0,
            WorklistOrder::Shuffled(_) => self.rng.gen_range(0..self.queue.len()),
            WorklistOrder::ReversePostorder => {
                let rank = |a: &Address| self.rank.get(a).copied().unwrap_or(usize::MAX);
                self.queue
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, a)| rank(a))
                    .map_or(0, |(i, _)| i)
            }
        };
        let block = self.queue.remove(idx)?;
        self.queued.remove(&block);
        Some(block)
    }
}

/// Fixpoint iteration over the blocks of one function under one context.
pub(crate) struct FnAnalysis<'a, 'p> {
    pub(crate) engine: &'a Engine<'p>,
    pub(crate) cfg: &'p FunctionCfg,
    pub(crate) frame: FrameId,
    pub(crate) ctx: Arc<CallContext>,
    pub(crate) active: &'a mut ActiveSet,
    pub(crate) products: AnalysisProducts,
    pub(crate) unknown_writes: bool,
    in_states: BTreeMap<Address, Store>,
    visits: BTreeMap<Address, usize>,
    loop_headers: BTreeSet<Address>,
    worklist: WorkList,
    ret: AbstrVal,
    exit: Option<Store>,
}

impl<'a, 'p> FnAnalysis<'a, 'p> {
    pub(crate) fn new(
        engine: &'a Engine<'p>,
        cfg: &'p FunctionCfg,
        frame: FrameId,
        ctx: Arc<CallContext>,
        active: &'a mut ActiveSet,
    ) -> FnAnalysis<'a, 'p> {
        let worklist = WorkList::new(engine.get_config().worklist_order, &cfg.rev_postorder());
        FnAnalysis {
            engine,
            cfg,
            frame,
            ctx,
            active,
            products: AnalysisProducts::new(),
            unknown_writes: false,
            in_states: BTreeMap::new(),
            visits: BTreeMap::new(),
            loop_headers: cfg.loop_headers(),
            worklist,
            ret: AbstrVal::Undefined,
            exit: None,
        }
    }

    /// Iterates until no block state changes anymore.
    /// [entry_store] is the state at the entry block.
    pub(crate) fn run(mut self, entry_store: Store) -> Result<FunctionResult, AnalysisError> {
        let cfg: &'p FunctionCfg = self.cfg;
        let entry = cfg.get_entry();
        self.in_states.insert(entry, entry_store);
        self.worklist.push(entry);
        let mut total_visits = 0;
        while let Some(addr) = self.worklist.pop() {
            if self.engine.get_cancel_token().is_cancelled() {
                return Err(AnalysisError::Cancelled {
                    func: entry,
                    visits: total_visits,
                });
            }
            let (Some(block), Some(state)) = (cfg.get_block(addr), self.in_states.get(&addr))
            else {
                continue;
            };
            let mut state = state.clone();
            total_visits += 1;
            *self.visits.entry(addr).or_insert(0) += 1;
            trace!(
                "{}{}: block {:#x} visit {}",
                cfg.get_name(),
                self.ctx,
                addr,
                self.visits[&addr]
            );
            if !self.transfer_block(block, &mut state)? {
                continue;
            }
            self.transfer_terminator(block, state);
        }
        self.collect_final(total_visits)?;
        Ok(FunctionResult {
            func: entry,
            ctx: self.ctx,
            frame: self.frame,
            ret: self.ret,
            exit: self.exit,
            block_states: self.in_states,
            products: self.products,
            unknown_writes: self.unknown_writes,
        })
    }

    /// Interprets the instructions of [block] on [state].
    /// Returns false if the execution does not reach the end of the block.
    fn transfer_block(
        &mut self,
        block: &BasicBlock,
        state: &mut Store,
    ) -> Result<bool, AnalysisError> {
        for insn in block.insns.iter() {
            let pp = ProgramPoint::new(self.cfg.get_entry(), block.addr, insn.addr);
            if !eval_op(self, pp, &insn.op, state)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn transfer_terminator(&mut self, block: &BasicBlock, state: Store) {
        match &block.term {
            Terminator::Jump(target) => self.propagate(*target, &state),
            Terminator::Branch {
                cond,
                taken,
                fallthrough,
            } => match eval_operand(cond, &state).as_const() {
                Some(c) if c.is_zero() => self.propagate(*fallthrough, &state),
                Some(_) => self.propagate(*taken, &state),
                None => {
                    self.propagate(*taken, &state);
                    self.propagate(*fallthrough, &state);
                }
            },
            Terminator::Return(_) | Terminator::Exit => {}
        }
    }

    /// Interprets every reached block once more on its final entry state.
    /// Products, the return value and the exit state come from this pass only.
    fn collect_final(&mut self, visits: usize) -> Result<(), AnalysisError> {
        let cfg: &'p FunctionCfg = self.cfg;
        self.products = AnalysisProducts::new();
        self.unknown_writes = false;
        for addr in cfg.rev_postorder() {
            if self.engine.get_cancel_token().is_cancelled() {
                return Err(AnalysisError::Cancelled {
                    func: cfg.get_entry(),
                    visits,
                });
            }
            let (Some(block), Some(state)) = (cfg.get_block(addr), self.in_states.get(&addr))
            else {
                continue;
            };
            let mut state = state.clone();
            if !self.transfer_block(block, &mut state)? {
                continue;
            }
            let Terminator::Return(val) = &block.term else {
                continue;
            };
            let rv = val
                .as_ref()
                .map_or(AbstrVal::Undefined, |v| eval_operand(v, &state));
            self.ret = self.ret.join(&rv);
            match self.exit.as_mut() {
                Some(exit) => {
                    state.merge_into(exit);
                }
                None => self.exit = Some(state),
            }
        }
        Ok(())
    }

    /// Merges [out] into the entry state of [succ].
    /// [succ] is enqueued if its state changed.
    fn propagate(&mut self, succ: Address, out: &Store) {
        let widen = self.loop_headers.contains(&succ)
            && self.visits.get(&succ).copied().unwrap_or(0)
                >= self.engine.get_config().widen_after;
        let changed = match self.in_states.get_mut(&succ) {
            None => {
                self.in_states.insert(succ, out.clone());
                true
            }
            Some(in_state) if widen => out.widen_into(in_state),
            Some(in_state) => out.merge_into(in_state),
        };
        if changed {
            self.worklist.push(succ);
        }
    }
}

impl FunctionResult {
    pub(crate) fn into_summary(self) -> CallSummary {
        CallSummary {
            ret: self.ret,
            exit: self.exit,
            unknown_writes: self.unknown_writes,
            products: self.products,
        }
    }
}
