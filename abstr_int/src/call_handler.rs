// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

use std::sync::Arc;

use lifted_il::{Address, CallTarget, FunctionCfg, Operand, RegName};
use log::debug;

use crate::{
    context::{CallContext, CallSummary, SummaryKey},
    error::AnalysisError,
    fixpoint::FnAnalysis,
    icall::call_indirect,
    memory::{AllocId, CallSiteId, FrameId, Location, ProgramPoint},
    op_handler::eval_operand,
    products::{ConcreteCall, DiagKind},
    stack::StackFrame,
    store::Store,
    value::AbstrVal,
};

/// Return value and caller state after a call.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct CallOutcome {
    pub ret: AbstrVal,
    pub post: Store,
}

impl CallOutcome {
    pub(crate) fn join(self, other: CallOutcome) -> CallOutcome {
        CallOutcome {
            ret: self.ret.join(&other.ret),
            post: self.post.join(&other.post),
        }
    }
}

/// Interprets a call instruction.
/// Returns false if the callee never returns.
pub(crate) fn handle_call(
    fa: &mut FnAnalysis,
    pp: ProgramPoint,
    target: &CallTarget,
    args: &[Operand],
    dst: Option<&RegName>,
    store: &mut Store,
) -> Result<bool, AnalysisError> {
    let argv: Vec<AbstrVal> = args.iter().map(|a| eval_operand(a, store)).collect();
    let site = CallSiteId {
        func: pp.func,
        addr: pp.addr,
    };
    let outcome = match target {
        CallTarget::Direct(callee) => {
            fa.products.calls.insert(ConcreteCall {
                proc_addr: pp.func,
                from: pp.addr,
                to: *callee,
            });
            call_function(fa, pp, site, *callee, &argv, store, false)?
        }
        CallTarget::Indirect { value, candidates } => {
            call_indirect(fa, pp, site, value.as_ref(), candidates, &argv, store)?
        }
    };
    let Some(outcome) = outcome else {
        debug!("{}: callee does not return", pp);
        return Ok(false);
    };
    *store = outcome.post;
    if let Some(d) = dst {
        store.write(Location::Reg(d.clone()), outcome.ret);
    }
    Ok(true)
}

/// Result of a call to something whose effects are unknown.
/// Everything reachable from the arguments may be overwritten.
pub(crate) fn opaque_outcome(fa: &mut FnAnalysis, pre: &Store, argv: &[AbstrVal]) -> CallOutcome {
    let mut post = pre.clone();
    post.havoc_reachable(argv);
    if argv.iter().any(|a| a.is_top()) {
        fa.unknown_writes = true;
    }
    CallOutcome {
        ret: AbstrVal::Top,
        post,
    }
}

/// Calls [callee] with the arguments [argv] on the caller state [pre].
/// [indirect] is set if the callee was determined by the icall resolver.
pub(crate) fn call_function(
    fa: &mut FnAnalysis,
    pp: ProgramPoint,
    site: CallSiteId,
    callee: Address,
    argv: &[AbstrVal],
    pre: &Store,
    indirect: bool,
) -> Result<Option<CallOutcome>, AnalysisError> {
    let engine = fa.engine;
    if let Some(cfg) = engine.body(callee) {
        return call_body(fa, pp, site, cfg, argv, pre);
    }
    let program = engine.get_program();
    if let Some(sig) = program.get_external(callee) {
        let alloc_id = AllocId::new(site, fa.ctx.clone());
        if let Some(obj) = engine.get_heap().on_call(sig, argv, alloc_id, pp) {
            return Ok(Some(CallOutcome {
                ret: AbstrVal::new_heap(obj.alloc_id, 0),
                post: pre.clone(),
            }));
        }
        if sig.is_noreturn() {
            return Ok(None);
        }
        if sig.is_input() {
            return Ok(Some(CallOutcome {
                ret: AbstrVal::Top,
                post: pre.clone(),
            }));
        }
    }
    let reason = if program.get_function(callee).is_some() {
        "is malformed"
    } else if program.get_external(callee).is_some() {
        "has no known semantics"
    } else {
        "has no body"
    };
    let kind = if indirect {
        DiagKind::UnresolvedIndirectTarget
    } else {
        DiagKind::OpaqueCall
    };
    fa.products
        .add_diag(kind, pp, format!("callee {:#x} {}", callee, reason));
    Ok(Some(opaque_outcome(fa, pre, argv)))
}

/// Analyses the callee under [ctx] or fetches the memoized result.
fn analyze_callee(
    fa: &mut FnAnalysis,
    cfg: &FunctionCfg,
    frame_id: FrameId,
    ctx: Arc<CallContext>,
    entry: Store,
) -> Result<Arc<CallSummary>, AnalysisError> {
    let engine = fa.engine;
    let callee = cfg.get_entry();
    let key = SummaryKey {
        callee,
        ctx: ctx.clone(),
        entry: entry.clone(),
    };
    let active = &mut *fa.active;
    engine.get_cache().fetch_or_analyze(key, || {
        active.push((callee, ctx.clone()));
        let result = FnAnalysis::new(engine, cfg, frame_id, ctx, active).run(entry);
        active.pop();
        result.map(|r| r.into_summary())
    })
}

fn call_body(
    fa: &mut FnAnalysis,
    pp: ProgramPoint,
    site: CallSiteId,
    cfg: &FunctionCfg,
    argv: &[AbstrVal],
    pre: &Store,
) -> Result<Option<CallOutcome>, AnalysisError> {
    let engine = fa.engine;
    let callee = cfg.get_entry();
    let config = engine.get_config();
    let depth = fa.ctx.activations(callee);
    if fa.ctx.in_summary_of(callee)
        || depth >= config.clone_depth
        || fa.ctx.chain_len() >= config.max_call_depth
    {
        return call_summary(fa, pp, cfg, argv, pre, depth);
    }
    let cc = engine.get_program().get_cc();
    let ctx = CallContext::new_clone(&fa.ctx, site, callee, depth + 1);
    let frame = StackFrame::classify_args(
        cc,
        FrameId::new(callee, ctx.clone()),
        cfg.get_params(),
        argv,
    );
    let entry = frame.entry_store(cc, pre.memory_only());
    let summary = analyze_callee(fa, cfg, frame.frame_id.clone(), ctx, entry)?;
    fa.products.merge(&summary.products);
    fa.unknown_writes |= summary.unknown_writes;
    let Some(exit) = summary.exit.as_ref() else {
        return Ok(None);
    };
    // Memory as the callee left it, registers as the caller had them.
    let mut post = exit.memory_only();
    post.remove_frame(&frame.frame_id);
    for (loc, v) in pre.iter().filter(|(l, _)| l.is_reg()) {
        post.write(loc.clone(), v.clone());
    }
    Ok(Some(CallOutcome {
        ret: summary.ret.clone(),
        post,
    }))
}

/// Call of [cfg] redirected to its shared summary.
/// The summary is analysed once with all inputs Top. Its memory effects
/// are may-writes for the caller.
fn call_summary(
    fa: &mut FnAnalysis,
    pp: ProgramPoint,
    cfg: &FunctionCfg,
    argv: &[AbstrVal],
    pre: &Store,
    depth: u32,
) -> Result<Option<CallOutcome>, AnalysisError> {
    let callee = cfg.get_entry();
    fa.products.add_diag(
        DiagKind::RecursionLimitExceeded,
        pp,
        format!("{} ({:#x}) uses its summary", cfg.get_name(), callee),
    );
    let ctx = CallContext::new_summary(callee);
    if fa.active.iter().any(|(f, c)| *f == callee && *c == ctx) {
        debug!(
            "{}: summary of {:#x} is being computed ({} activations). Result is unknown.",
            pp, callee, depth
        );
        fa.unknown_writes = true;
        return Ok(Some(opaque_outcome(fa, pre, argv)));
    }
    let engine = fa.engine;
    let cc = engine.get_program().get_cc();
    let frame_id = FrameId::new(callee, ctx.clone());
    let unknown_args = vec![AbstrVal::Top; argv.len()];
    let frame = StackFrame::classify_args(cc, frame_id.clone(), cfg.get_params(), &unknown_args);
    let entry = frame.entry_store(cc, Store::new());
    let summary = analyze_callee(fa, cfg, frame_id.clone(), ctx, entry)?;
    fa.products.merge(&summary.products);
    let Some(exit) = summary.exit.as_ref() else {
        return Ok(None);
    };
    let mut post = pre.clone();
    for (loc, v) in exit.iter() {
        match loc {
            Location::Reg(_) => continue,
            Location::Stack { frame, .. } if *frame == frame_id => continue,
            _ => post.join_write_sized(loc.clone(), v.clone(), exit.size_of(loc)),
        }
    }
    if summary.unknown_writes {
        post.havoc_reachable(argv);
        fa.unknown_writes = true;
    }
    Ok(Some(CallOutcome {
        ret: summary.ret.clone(),
        post,
    }))
}
