// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

mod common;

use std::collections::BTreeSet;

use abstr_int::{AbstrVal, AnalysisError, CallSiteId, CancelToken, DiagKind, WorklistOrder};
use common::{get_mixed_program, BAD, DISPATCH, FILL, FN0, FN1, MAIN, REC, SECOND, UNMAPPED};
use lifted_il::IlError;
use provenance::{partition, run_analysis, run_analysis_cancellable, RunConfig, RunError};

fn config_with(threads: usize, order: WorklistOrder) -> RunConfig {
    let mut config = RunConfig::default();
    config.threads = threads;
    config.absint.worklist_order = order;
    config
}

#[test]
fn test_mixed_program() {
    let program = get_mixed_program();
    let report = run_analysis(&program, &RunConfig::default()).expect("run starts");
    assert_eq!(
        report.results.keys().copied().collect::<BTreeSet<_>>(),
        BTreeSet::from([MAIN, BAD, SECOND])
    );
    assert_eq!(report.num_failed(), 1);

    let main = report.get_result(MAIN).expect("main analysed");
    assert_eq!(main.ret, AbstrVal::new_u64(7, 64));
    assert_eq!(
        main.products
            .icall_targets
            .get(&CallSiteId { func: MAIN, addr: 0x1018 }),
        Some(&BTreeSet::from([FN0]))
    );
    assert_eq!(report.heap_objects.len(), 1);

    let second = report.get_result(SECOND).expect("second analysed");
    assert_eq!(second.ret, AbstrVal::new_u64(1, 64));
    assert!(!second.products.has_diag(DiagKind::RecursionLimitExceeded));

    let cg = report.resolved_call_graph();
    for (from, to) in [(MAIN, FILL), (MAIN, FN0), (SECOND, REC), (REC, REC), (DISPATCH, FN1)] {
        assert!(cg.contains_edge(from, to), "{:#x} -> {:#x}", from, to);
    }
}

#[test]
fn test_declared_targets_in_loop() {
    let program = get_mixed_program();
    let report = run_analysis(&program, &RunConfig::default()).expect("run starts");
    assert_eq!(
        report
            .products
            .icall_targets
            .get(&CallSiteId { func: DISPATCH, addr: 0x8120 }),
        Some(&BTreeSet::from([FN1, UNMAPPED]))
    );
    let unresolved = report.products.diags_of(DiagKind::UnresolvedIndirectTarget);
    assert_eq!(unresolved.len(), 1);
    assert_eq!(unresolved[0].at.func, DISPATCH);
    assert_eq!(unresolved[0].at.addr, 0x8120);
    assert!(unresolved[0].detail.contains("0x7777"));
}

#[test]
fn test_malformed_isolated() {
    let program = get_mixed_program();
    let report = run_analysis(&program, &RunConfig::default()).expect("run starts");
    let bad_err = IlError::DanglingEdge {
        func: BAD,
        from: BAD,
        to: 0x5010,
    };
    assert_eq!(report.malformed.get(&BAD), Some(&bad_err));
    assert_eq!(
        report.results.get(&BAD),
        Some(&Err(AnalysisError::MalformedInput(bad_err)))
    );
    assert!(report.get_result(MAIN).is_some());
    assert!(report.get_result(SECOND).is_some());
}

#[test]
fn test_run_confluence() {
    let program = get_mixed_program();
    let reference = run_analysis(&program, &config_with(1, WorklistOrder::ReversePostorder))
        .expect("run starts");
    for (threads, order) in [
        (4, WorklistOrder::ReversePostorder),
        (1, WorklistOrder::Fifo),
        (4, WorklistOrder::Fifo),
        (2, WorklistOrder::Shuffled(3)),
        (8, WorklistOrder::Shuffled(1337)),
    ] {
        let report = run_analysis(&program, &config_with(threads, order)).expect("run starts");
        assert_eq!(report.results, reference.results, "{} {}", threads, order);
        assert_eq!(report.products, reference.products, "{} {}", threads, order);
        assert_eq!(
            report.heap_objects, reference.heap_objects,
            "{} {}",
            threads, order
        );
    }
}

#[test]
fn test_configured_entries() {
    let program = get_mixed_program();
    let config = RunConfig::from_text("provenance.entries = 0x8100, 0x4300").expect("valid config");
    let report = run_analysis(&program, &config).expect("run starts");
    assert_eq!(
        report.results.keys().copied().collect::<BTreeSet<_>>(),
        BTreeSet::from([REC, BAD, DISPATCH])
    );
    assert_eq!(
        report.get_result(DISPATCH).map(|r| r.ret.clone()),
        Some(AbstrVal::new_u64(0, 64))
    );

    let mut config = RunConfig::default();
    config.entries = vec![UNMAPPED];
    assert!(matches!(
        run_analysis(&program, &config),
        Err(RunError::UnknownEntry(UNMAPPED))
    ));
}

#[test]
fn test_cancelled_run() {
    let program = get_mixed_program();
    let token = CancelToken::new();
    token.cancel();
    let report = run_analysis_cancellable(&program, &RunConfig::default(), token)
        .expect("run starts");
    for root in [MAIN, SECOND] {
        assert_eq!(
            report.results.get(&root),
            Some(&Err(AnalysisError::Cancelled {
                func: root,
                visits: 0
            }))
        );
    }
    assert!(report.products.calls.is_empty());
}

#[test]
fn test_partition_mixed() {
    let program = get_mixed_program();
    let components = partition(&program, program.get_entries());
    assert_eq!(components.len(), 2);
    assert_eq!(
        components[0].functions,
        BTreeSet::from([MAIN, FILL, FN0])
    );
    assert_eq!(components[0].roots, vec![MAIN]);
    assert_eq!(
        components[1].functions,
        BTreeSet::from([FN1, REC, SECOND, DISPATCH])
    );
    assert_eq!(components[1].roots, vec![SECOND]);
}
