// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

use std::{
    collections::{BTreeMap, VecDeque},
    fmt::Display,
    sync::{
        mpsc::{channel, Sender},
        Mutex, PoisonError,
    },
    thread,
    time::{Duration, Instant},
};

use abstr_int::{
    AllocationObject, AnalysisError, AnalysisProducts, CancelToken, DiagKind, Engine,
    FunctionResult,
};
use lifted_il::{Address, IlError, Program};
use log::{debug, info, warn};
use petgraph::prelude::DiGraphMap;

use crate::{
    components::{partition, Component},
    config::RunConfig,
    error::RunError,
    state::{RunState, RuntimeStats, StatisticID},
};

type RootResult = (Address, Result<FunctionResult, AnalysisError>, Duration);

/// Everything an analysis run produced.
#[derive(Debug)]
pub struct RunReport {
    /// Result of every analysed root and every malformed function.
    pub results: BTreeMap<Address, Result<FunctionResult, AnalysisError>>,
    /// Products of all successful results.
    pub products: AnalysisProducts,
    pub malformed: BTreeMap<Address, IlError>,
    pub heap_objects: Vec<AllocationObject>,
    pub runtime_stats: RuntimeStats,
    /// Number of callee analyses computed and fetched from the memo cache.
    pub summaries_computed: usize,
    pub summaries_reused: usize,
    pub duration: Duration,
}

impl RunReport {
    /// Call graph of all resolved direct and indirect calls.
    pub fn resolved_call_graph(&self) -> DiGraphMap<Address, ()> {
        let mut cg = DiGraphMap::new();
        for call in self.products.calls.iter() {
            cg.add_edge(call.proc_addr, call.to, ());
        }
        cg
    }

    pub fn get_result(&self, func: Address) -> Option<&FunctionResult> {
        self.results.get(&func).and_then(|r| r.as_ref().ok())
    }

    pub fn num_failed(&self) -> usize {
        self.results.values().filter(|r| r.is_err()).count()
    }
}

impl Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Analysed {} roots in {:.2?}, {} failed.",
            self.results.len(),
            self.duration,
            self.num_failed()
        )?;
        writeln!(
            f,
            "Calls: {}, memory xrefs: {}, stack xrefs: {}, heap objects: {}",
            self.products.calls.len(),
            self.products.mem_xrefs.len(),
            self.products.stack_xrefs.len(),
            self.heap_objects.len()
        )?;
        for kind in [
            DiagKind::UnresolvedIndirectTarget,
            DiagKind::RecursionLimitExceeded,
            DiagKind::OutOfBoundsAccess,
            DiagKind::OpaqueCall,
        ] {
            writeln!(f, "{:?}: {}", kind, self.products.diags_of(kind).len())?;
        }
        Ok(())
    }
}

fn pop_component(queue: &Mutex<VecDeque<Component>>) -> Option<Component> {
    queue
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .pop_front()
}

/// Analyses components from [queue] until it is empty.
/// The roots of a component are analysed in order on this thread.
fn worker(tid: usize, engine: &Engine, queue: &Mutex<VecDeque<Component>>, tx: Sender<RootResult>) {
    while let Some(component) = pop_component(queue) {
        debug!(
            "Thread {}: component of {} functions",
            tid,
            component.functions.len()
        );
        for root in component.roots {
            let start = Instant::now();
            let result = engine.analyze_entry(root);
            if let Err(e) = result.as_ref() {
                warn!("{:#x}: {}", root, e);
            }
            if tx.send((root, result, start.elapsed())).is_err() {
                return;
            }
        }
    }
}

/// Runs the analysis on [program] with the settings of [config].
pub fn run_analysis(program: &Program, config: &RunConfig) -> Result<RunReport, RunError> {
    let cancel = if config.timeout > 0 {
        CancelToken::with_timeout(Duration::from_secs(config.timeout))
    } else {
        CancelToken::new()
    };
    run_analysis_cancellable(program, config, cancel)
}

/// Like [run_analysis] but stops as soon as [cancel] is triggered.
/// Roots cancelled this way are reported as [AnalysisError::Cancelled].
pub fn run_analysis_cancellable(
    program: &Program,
    config: &RunConfig,
    cancel: CancelToken,
) -> Result<RunReport, RunError> {
    let entries: Vec<Address> = if config.entries.is_empty() {
        program.get_entries().to_vec()
    } else {
        config.entries.clone()
    };
    if let Some(e) = entries.iter().find(|e| program.get_function(**e).is_none()) {
        return Err(RunError::UnknownEntry(*e));
    }

    let engine = Engine::new(program, config.absint.clone()).with_cancel_token(cancel);
    let components = partition(program, &entries);
    let num_threads = config.threads.max(1).min(components.len().max(1));
    info!(
        "Analyse {} components with {} threads.",
        components.len(),
        num_threads
    );
    let queue = Mutex::new(VecDeque::from(components));
    let (tx, rx) = channel::<RootResult>();
    let mut state = RunState::new();
    thread::scope(|s| {
        for tid in 0..num_threads {
            let tx = tx.clone();
            let (engine, queue) = (&engine, &queue);
            s.spawn(move || worker(tid, engine, queue, tx));
        }
        drop(tx);
        for (func, result, duration) in rx.iter() {
            state.update(func, result, duration);
        }
    });

    for (addr, e) in engine.get_malformed().iter() {
        state
            .results
            .entry(*addr)
            .or_insert_with(|| Err(AnalysisError::MalformedInput(e.clone())));
    }
    let cache = engine.get_cache();
    let report = RunReport {
        results: state.results,
        products: state.products,
        malformed: engine.get_malformed().clone(),
        heap_objects: engine.get_heap().objects(),
        summaries_computed: cache.get_misses(),
        summaries_reused: cache.get_hits(),
        duration: state.run_start.elapsed(),
        runtime_stats: state.runtime_stats,
    };
    info!(
        "Run finished in {:.2?}. Average root time: {:.2?}",
        report.duration,
        report
            .runtime_stats
            .get_avg_duration(StatisticID::RootTime)
            .unwrap_or_default()
    );
    Ok(report)
}
