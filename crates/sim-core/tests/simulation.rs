//! End-to-end simulation scenarios with pinned timings and reports.

use sim_core::{
    LogConfig, LogContext, ProcessingMode, RunConfig, SimpleSaga, SystemConfig, SystemOperation,
    Task, ThreadedOrchestrator,
};
use sim_time::Duration;

fn micros(value: i64) -> Duration {
    Duration::from_micros(value)
}

fn saga(name: &str, ops: &[(bool, i64)]) -> SimpleSaga {
    let operations = ops
        .iter()
        .map(|(to_process, us)| {
            SystemOperation::new(*to_process, format!("{name}-op"), micros(*us)).unwrap()
        })
        .collect();
    SimpleSaga::new(vec![Task::new(operations, format!("{name}-task")).unwrap()], name)
}

fn run_config(creation_us: i64, deallocation_us: i64) -> RunConfig {
    RunConfig {
        tick_length: micros(1),
        system: SystemConfig {
            thread_creation_cost: micros(creation_us),
            thread_deallocation_cost: micros(deallocation_us),
            ..SystemConfig::default()
        },
    }
}

#[test]
fn single_saga_pays_thread_creation_and_deallocation() {
    let config = run_config(3, 2);
    let log = LogConfig::new("single", config.tick_length);
    let (elapsed, report, _) = LogContext::run_logging(log, || {
        let mut orchestrator =
            ThreadedOrchestrator::with_config(1, ProcessingMode::Overloaded, config);
        orchestrator.process(vec![saga("s", &[(true, 2)])])
    })
    .unwrap();

    // 2μs of processing plus 3μs creation and 2μs deallocation overhead.
    assert_eq!(elapsed, micros(7));
    assert_eq!(report.simulation_duration, micros(7));
    assert_eq!(report.task_handling.avg, micros(2));
    assert_eq!(report.overhead.avg, micros(5));
    assert!((report.task_handling.percentage - 2.0 / 7.0 * 100.0).abs() < 1e-9);
    assert!((report.overhead.percentage - 5.0 / 7.0 * 100.0).abs() < 1e-9);
}

#[test]
fn parallel_sagas_finish_concurrently() {
    let config = run_config(0, 0);
    let log = LogConfig::new("parallel", config.tick_length);
    let workload = vec![
        saga("a", &[(true, 3), (false, 5), (true, 2)]),
        saga("b", &[(true, 3), (false, 5), (true, 2)]),
    ];
    let (elapsed, report, _) = LogContext::run_logging(log, || {
        let mut orchestrator =
            ThreadedOrchestrator::with_config(2, ProcessingMode::Overloaded, config);
        orchestrator.process(workload)
    })
    .unwrap();

    // Both sagas run in lock step on their own processor: 3 + 5 + 2.
    assert_eq!(elapsed, micros(10));
    // Each processor handled 5μs of processing and idled 5μs of waiting.
    assert_eq!(report.task_handling.avg, micros(5));
    assert_eq!(report.waiting.avg, micros(5));
    assert!((report.task_handling.percentage - 50.0).abs() < 1e-9);
    assert!((report.waiting.percentage - 50.0).abs() < 1e-9);
}

#[test]
fn fixed_pool_serializes_chained_sagas() {
    let config = run_config(0, 0);
    let log = LogConfig::new("fixed_pool", config.tick_length);
    let workload = vec![
        saga("s0", &[(true, 1), (false, 200), (true, 2)]),
        saga("s1", &[(true, 1), (false, 200), (true, 2)]),
        saga("s2", &[(true, 1), (false, 200), (true, 2)]),
    ];
    let (elapsed, _, _) = LogContext::run_logging(log, || {
        let mut orchestrator =
            ThreadedOrchestrator::with_config(2, ProcessingMode::FixedPool, config);
        orchestrator.process(workload)
    })
    .unwrap();

    // Processor 0 chains s0 and s2, processor 1 runs s1 alone. A chain
    // exposes only its head, so s2 starts from scratch after s0: 203μs for
    // s0 followed by 203μs for s2.
    assert_eq!(elapsed, micros(406));
}

#[test]
fn yielding_interleaves_waits_with_processing() {
    let config = run_config(0, 0);
    let log = LogConfig::new("yielding", config.tick_length);
    let ops: &[(bool, i64)] = &[
        (true, 10),
        (false, 200),
        (true, 20),
        (false, 100),
        (true, 44),
    ];
    let workload = vec![saga("a", ops), saga("b", ops)];
    let (elapsed, _, _) = LogContext::run_logging(log, || {
        let mut orchestrator =
            ThreadedOrchestrator::with_config(1, ProcessingMode::Yielding, config);
        orchestrator.process(workload)
    })
    .unwrap();

    // One saga alone takes 374μs; a serial schedule of both takes 748μs.
    // Cooperative yielding overlaps each saga's waits with the other's
    // processing, so the run must land strictly in between.
    let single = micros(374);
    let serial = micros(748);
    assert!(elapsed > single, "elapsed {elapsed} not above {single}");
    assert!(elapsed < serial, "elapsed {elapsed} not below {serial}");
}

#[test]
fn overloaded_single_processor_serializes_instead() {
    // The same workload as the yielding scenario, but without yields the
    // slot holder keeps the processor through its waits and the sagas
    // serialize (the second saga's first wait cannot start early because
    // its head operation is processing).
    let config = run_config(0, 0);
    let log = LogConfig::new("overloaded", config.tick_length);
    let ops: &[(bool, i64)] = &[
        (true, 10),
        (false, 200),
        (true, 20),
        (false, 100),
        (true, 44),
    ];
    let workload = vec![saga("a", ops), saga("b", ops)];
    let (elapsed, _, _) = LogContext::run_logging(log, || {
        let mut orchestrator =
            ThreadedOrchestrator::with_config(1, ProcessingMode::Overloaded, config);
        orchestrator.process(workload)
    })
    .unwrap();
    assert_eq!(elapsed, micros(748));
}

#[test]
fn report_percentages_sum_to_one_hundred() {
    let config = run_config(3, 2);
    let log = LogConfig::new("sum", config.tick_length);
    let workload = vec![
        saga("a", &[(true, 3), (false, 5), (true, 2)]),
        saga("b", &[(true, 7)]),
        saga("c", &[(false, 4), (true, 1)]),
    ];
    let (_, report, _) = LogContext::run_logging(log, || {
        let mut orchestrator =
            ThreadedOrchestrator::with_config(2, ProcessingMode::Overloaded, config);
        orchestrator.process(workload)
    })
    .unwrap();

    let sum = report.task_handling.percentage + report.waiting.percentage
        + report.overhead.percentage;
    assert!((sum - 100.0).abs() < 1e-6, "percentages sum to {sum}");
}

#[test]
fn interim_reports_are_published_on_schedule() {
    let config = run_config(0, 0);
    let log = LogConfig::new("interim", config.tick_length).publish_every(micros(4));
    let (elapsed, report, interim) = LogContext::run_logging(log, || {
        let mut orchestrator =
            ThreadedOrchestrator::with_config(1, ProcessingMode::Overloaded, config);
        orchestrator.process(vec![saga("s", &[(true, 10)])])
    })
    .unwrap();

    assert_eq!(elapsed, micros(10));
    assert_eq!(interim.len(), 2);
    assert_eq!(interim[0].simulation_duration, micros(4));
    assert_eq!(interim[1].simulation_duration, micros(8));
    assert_eq!(report.simulation_duration, micros(10));
}

#[test]
fn runs_are_deterministic() {
    let ops: &[(bool, i64)] = &[(true, 5), (false, 30), (true, 3)];
    let run = || {
        let config = run_config(2, 1);
        let log = LogConfig::new("det", config.tick_length);
        let workload = vec![saga("a", ops), saga("b", ops), saga("c", ops)];
        LogContext::run_logging(log, || {
            let mut orchestrator =
                ThreadedOrchestrator::with_config(2, ProcessingMode::Yielding, config);
            orchestrator.process(workload)
        })
        .unwrap()
    };
    let (elapsed_a, report_a, _) = run();
    let (elapsed_b, report_b, _) = run();
    assert_eq!(elapsed_a, elapsed_b);
    assert_eq!(report_a, report_b);
}
