// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

use std::collections::BTreeSet;

use lifted_il::{Address, Operand, Program};
use log::debug;

use crate::{
    call_handler::{call_function, opaque_outcome, CallOutcome},
    error::AnalysisError,
    fixpoint::FnAnalysis,
    memory::{CallSiteId, ProgramPoint},
    op_handler::eval_operand,
    products::{ConcreteCall, DiagKind},
    store::Store,
    value::{AbstrVal, FuncTargets},
};

/// Targets of an indirect call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// The call value itself names the targets.
    Exact(BTreeSet<Address>),
    /// The value is unknown. The targets are the candidates of the lifter.
    Declared(BTreeSet<Address>),
    Unresolved,
}

/// Resolves the targets of a call through [value].
/// [candidates] are only used if [value] does not determine them.
pub fn resolve(value: &AbstrVal, candidates: &[Address], program: &Program) -> Resolution {
    match value {
        AbstrVal::FuncPtr(FuncTargets::Set(targets)) if !targets.is_empty() => {
            return Resolution::Exact(targets.clone())
        }
        AbstrVal::Const(c) if program.is_code(c.as_u64()) => {
            return Resolution::Exact(BTreeSet::from([c.as_u64()]))
        }
        _ => {}
    }
    if candidates.is_empty() {
        return Resolution::Unresolved;
    }
    Resolution::Declared(candidates.iter().copied().collect())
}

pub(crate) fn call_indirect(
    fa: &mut FnAnalysis,
    pp: ProgramPoint,
    site: CallSiteId,
    value: Option<&Operand>,
    candidates: &[Address],
    argv: &[AbstrVal],
    pre: &Store,
) -> Result<Option<CallOutcome>, AnalysisError> {
    let val = value.map_or(AbstrVal::Top, |v| eval_operand(v, pre));
    let targets = match resolve(&val, candidates, fa.engine.get_program()) {
        Resolution::Exact(t) | Resolution::Declared(t) => t,
        Resolution::Unresolved => {
            fa.products.add_diag(
                DiagKind::UnresolvedIndirectTarget,
                pp,
                format!("no targets for call through {}", val),
            );
            return Ok(Some(opaque_outcome(fa, pre, argv)));
        }
    };
    debug!("{}: icall through {} to {} targets", pp, val, targets.len());
    let mut joined: Option<CallOutcome> = None;
    for t in targets {
        fa.products.icall_targets.insert(site, t);
        fa.products.calls.insert(ConcreteCall {
            proc_addr: pp.func,
            from: pp.addr,
            to: t,
        });
        let Some(outcome) = call_function(fa, pp, site, t, argv, pre, true)? else {
            continue;
        };
        joined = Some(match joined {
            Some(j) => j.join(outcome),
            None => outcome,
        });
    }
    Ok(joined)
}
