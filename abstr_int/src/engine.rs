// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use lifted_il::{Address, FunctionCfg, IlError, Program};
use log::{info, warn};

use crate::{
    config::AnalysisConfig,
    context::{CallContext, SummaryCache},
    error::AnalysisError,
    fixpoint::FnAnalysis,
    heap::HeapModel,
    memory::FrameId,
    products::FunctionResult,
    stack::StackFrame,
    store::Store,
    value::AbstrVal,
};

/// Shared cancellation flag with an optional deadline.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    /// A token which cancels itself after [timeout].
    pub fn with_timeout(timeout: Duration) -> CancelToken {
        CancelToken {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// The analysis of one program.
/// All state shared between functions and threads lives here.
pub struct Engine<'p> {
    program: &'p Program,
    config: AnalysisConfig,
    heap: HeapModel,
    cache: SummaryCache,
    /// Functions which failed validation.
    malformed: BTreeMap<Address, IlError>,
    cancel: CancelToken,
}

impl<'p> Engine<'p> {
    pub fn new(program: &'p Program, config: AnalysisConfig) -> Engine<'p> {
        let malformed = program.validate();
        if !malformed.is_empty() {
            warn!(
                "{} malformed functions are excluded from the analysis.",
                malformed.len()
            );
        }
        Engine {
            program,
            config,
            heap: HeapModel::new(),
            cache: SummaryCache::new(),
            malformed,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Engine<'p> {
        self.cancel = cancel;
        self
    }

    pub fn get_program(&self) -> &'p Program {
        self.program
    }

    pub fn get_config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn get_heap(&self) -> &HeapModel {
        &self.heap
    }

    pub fn get_cache(&self) -> &SummaryCache {
        &self.cache
    }

    pub fn get_malformed(&self) -> &BTreeMap<Address, IlError> {
        &self.malformed
    }

    pub fn get_cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// The body of [addr] if it can be interpreted.
    pub(crate) fn body(&self, addr: Address) -> Option<&'p FunctionCfg> {
        if self.malformed.contains_key(&addr) {
            return None;
        }
        self.program.get_function(addr)
    }

    /// Analyses [func] as an entry point. All arguments are unknown.
    pub fn analyze_entry(&self, func: Address) -> Result<FunctionResult, AnalysisError> {
        let params = self
            .program
            .get_function(func)
            .map_or(0, |f| f.get_params());
        self.analyze_with_args(func, &vec![AbstrVal::Top; params])
    }

    /// Analyses [func] as an entry point called with [args].
    pub fn analyze_with_args(
        &self,
        func: Address,
        args: &[AbstrVal],
    ) -> Result<FunctionResult, AnalysisError> {
        if let Some(e) = self.malformed.get(&func) {
            return Err(AnalysisError::MalformedInput(e.clone()));
        }
        let cfg = self
            .program
            .get_function(func)
            .ok_or(AnalysisError::UnknownFunction(func))?;
        info!("Analyse {} ({:#x})", cfg.get_name(), func);
        let cc = self.program.get_cc();
        let ctx = CallContext::new_entry(func);
        let frame = StackFrame::classify_args(
            cc,
            FrameId::new(func, ctx.clone()),
            cfg.get_params(),
            args,
        );
        let entry = frame.entry_store(cc, Store::new());
        let mut active = vec![(func, ctx.clone())];
        let result = FnAnalysis::new(self, cfg, frame.frame_id, ctx, &mut active).run(entry)?;
        info!(
            "Finished {} with {} diagnostics.",
            cfg.get_name(),
            result.products.diagnostics.len()
        );
        Ok(result)
    }
}
