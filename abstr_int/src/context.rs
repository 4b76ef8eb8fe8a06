// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

use std::{
    collections::HashMap,
    fmt::Display,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, PoisonError,
    },
};

use helper::num::subscript;
use lifted_il::Address;

use crate::{
    error::AnalysisError, memory::CallSiteId, products::AnalysisProducts, store::Store,
    value::AbstrVal,
};

/// The call string a function is analysed under.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum CallContext {
    /// Top level analysis of a function.
    Entry(Address),
    /// A clone of [callee] for the call at [site].
    /// [depth] is the number of activations of [callee] in the chain,
    /// this one included.
    Clone {
        caller: Arc<CallContext>,
        site: CallSiteId,
        callee: Address,
        depth: u32,
    },
    /// The shared, non-cloned summary of a function.
    Summary(Address),
}

impl Display for CallContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallContext::Entry(_) => Ok(()),
            CallContext::Clone {
                caller,
                site,
                depth,
                ..
            } => write!(f, "{}→{:#x}{}", caller, site.addr, subscript(*depth as u64)),
            CallContext::Summary(_) => write!(f, "Σ"),
        }
    }
}

impl CallContext {
    pub fn new_entry(func: Address) -> Arc<CallContext> {
        Arc::new(CallContext::Entry(func))
    }

    pub fn new_clone(
        caller: &Arc<CallContext>,
        site: CallSiteId,
        callee: Address,
        depth: u32,
    ) -> Arc<CallContext> {
        Arc::new(CallContext::Clone {
            caller: caller.clone(),
            site,
            callee,
            depth,
        })
    }

    pub fn new_summary(func: Address) -> Arc<CallContext> {
        Arc::new(CallContext::Summary(func))
    }

    /// The function at the bottom of the chain and whether it is a summary.
    fn root(&self) -> (Address, bool) {
        let mut cur = self;
        loop {
            match cur {
                CallContext::Entry(f) => return (*f, false),
                CallContext::Summary(f) => return (*f, true),
                CallContext::Clone { caller, .. } => cur = caller.as_ref(),
            }
        }
    }

    /// Number of activations of [func] in the call chain.
    pub fn activations(&self, func: Address) -> u32 {
        let mut n = 0;
        let mut cur = self;
        loop {
            match cur {
                CallContext::Entry(f) | CallContext::Summary(f) => {
                    return n + u32::from(*f == func)
                }
                CallContext::Clone { caller, callee, .. } => {
                    n += u32::from(*callee == func);
                    cur = caller.as_ref();
                }
            }
        }
    }

    pub fn chain_len(&self) -> usize {
        let mut n = 1;
        let mut cur = self;
        while let CallContext::Clone { caller, .. } = cur {
            n += 1;
            cur = caller.as_ref();
        }
        n
    }

    /// True if the chain is rooted in the summary of [func].
    pub fn in_summary_of(&self, func: Address) -> bool {
        self.root() == (func, true)
    }

    pub fn is_summary(&self) -> bool {
        self.root().1
    }
}

/// Memoization key of a callee analysis.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct SummaryKey {
    pub callee: Address,
    pub ctx: Arc<CallContext>,
    pub entry: Store,
}

/// Everything a caller needs from an analysed callee.
#[derive(Clone, Debug, PartialEq)]
pub struct CallSummary {
    /// Join of all returned values.
    pub ret: AbstrVal,
    /// Join of the stores at every return. None if the callee never returns.
    pub exit: Option<Store>,
    /// The callee wrote through addresses it could not determine.
    pub unknown_writes: bool,
    pub products: AnalysisProducts,
}

type Slot = Arc<Mutex<Option<Arc<CallSummary>>>>;

/// Run wide memo of callee analyses.
/// Each key is computed by exactly one thread. Other threads
/// asking for the same key wait for it and fetch the result.
#[derive(Default)]
pub struct SummaryCache {
    slots: Mutex<HashMap<SummaryKey, Slot>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl SummaryCache {
    pub fn new() -> SummaryCache {
        SummaryCache::default()
    }

    /// Returns the summary for [key]. If there is none yet, it is
    /// computed by [analyze]. Failed analyses are not cached.
    pub fn fetch_or_analyze<F>(
        &self,
        key: SummaryKey,
        analyze: F,
    ) -> Result<Arc<CallSummary>, AnalysisError>
    where
        F: FnOnce() -> Result<CallSummary, AnalysisError>,
    {
        let slot: Slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.entry(key).or_default().clone()
        };
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(summary) = guard.as_ref() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(summary.clone());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let summary = Arc::new(analyze()?);
        *guard = Some(summary.clone());
        Ok(summary)
    }

    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn get_misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }
}
