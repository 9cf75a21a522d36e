//! End-to-end pipeline tests: stream, interpret, execute against the
//! simulated backend.

use millstream_control::{
    prescan_total_length, ControllerConfig, GcodeStreamer, JobController, MotionExecutor,
    PumpBudget, SimulatedExecutor, SoftLimits,
};
use millstream_core::{ExecutionState, JobEvent};
use millstream_gcode::{Interpreter, ModalState};

const ARC_TOLERANCE: f64 = 0.01;
const MAX_SEGMENT_TIME: f64 = 0.5;
const RAPID_FEEDRATE: f64 = 3000.0;

fn interpreter() -> Interpreter {
    Interpreter::new(
        ModalState::new(ARC_TOLERANCE, MAX_SEGMENT_TIME),
        RAPID_FEEDRATE,
    )
}

fn controller(program: &str) -> JobController<SimulatedExecutor> {
    JobController::new(
        SimulatedExecutor::new(),
        GcodeStreamer::from_string(program),
        interpreter(),
        ControllerConfig::default(),
    )
}

/// Pump until Done, advancing the simulated clock between ticks.
fn run_to_completion(ctrl: &mut JobController<SimulatedExecutor>) {
    ctrl.start().unwrap();
    for _ in 0..10_000 {
        ctrl.pump(PumpBudget::default()).unwrap();
        ctrl.executor_mut().advance(60.0);
        if ctrl.state() == ExecutionState::Done {
            return;
        }
    }
    panic!("job did not complete, state {}", ctrl.state());
}

#[test]
fn test_simple_job_runs_to_done() {
    let mut ctrl = controller("G21\nG90\nG1 X10 Y0 F600\nG1 X10 Y10\n");
    run_to_completion(&mut ctrl);
    assert_eq!(ctrl.state(), ExecutionState::Done);
    assert!((ctrl.completed_length_mm() - 20.0).abs() < 1e-9);
    assert_eq!(ctrl.executor().position().x, 10.0);
    assert_eq!(ctrl.executor().position().y, 10.0);
}

#[test]
fn test_prescan_matches_runtime_exactly() {
    let program = "G21 G90 F600\nG0 X10\nG3 X0 Y10 I-10 J0\nG91\nG1 X2.5 Y-1 Z0.25\nG90 G2 X10 Y0 R-6\n";
    let total =
        prescan_total_length(GcodeStreamer::from_string(program), interpreter()).unwrap();

    let mut ctrl = controller(program);
    ctrl.set_total_length(total);
    run_to_completion(&mut ctrl);

    assert_eq!(total.to_bits(), ctrl.completed_length_mm().to_bits());
}

#[test]
fn test_completion_event_carries_total() {
    let mut ctrl = controller("G1 X10 F600\n");
    let mut rx = ctrl.events().subscribe();
    run_to_completion(&mut ctrl);

    let mut completed = None;
    while let Ok(event) = rx.try_recv() {
        if let JobEvent::Completed { total_executed_mm } = event {
            completed = Some(total_executed_mm);
        }
    }
    assert!((completed.expect("no completion event") - 10.0).abs() < 1e-9);
}

#[test]
fn test_progress_is_monotone_and_bounded() {
    let program = "G21 G90 F6000\nG1 X100\nG1 X0\nG1 Y50\n";
    let total =
        prescan_total_length(GcodeStreamer::from_string(program), interpreter()).unwrap();

    let mut ctrl = controller(program);
    ctrl.set_total_length(total);
    let mut rx = ctrl.events().subscribe();
    run_to_completion(&mut ctrl);

    let mut last = 0.0;
    let mut saw_progress = false;
    while let Ok(event) = rx.try_recv() {
        if let JobEvent::Progress {
            completed_mm,
            total_mm,
            percent,
            eta_s,
        } = event
        {
            saw_progress = true;
            assert!(completed_mm >= last, "progress went backwards");
            last = completed_mm;
            assert_eq!(total_mm, Some(total));
            assert!(completed_mm <= total + 1e-9);
            let pct = percent.expect("total known, percent should be too");
            assert!((0.0..=100.0).contains(&pct));
            assert!(eta_s.expect("eta should be known") >= 0.0);
        }
    }
    assert!(saw_progress);
}

#[test]
fn test_eta_unknown_without_prescan() {
    let mut ctrl = controller("G1 X10 F600\n");
    let mut rx = ctrl.events().subscribe();
    run_to_completion(&mut ctrl);

    while let Ok(event) = rx.try_recv() {
        if let JobEvent::Progress {
            percent, eta_s, ..
        } = event
        {
            assert_eq!(percent, None);
            assert_eq!(eta_s, None);
        }
    }
}

#[test]
fn test_backpressure_pauses_fill() {
    // 1mm moves at 60 mm/min are one second of motion each; a handful of
    // executed steps exceeds the 0.5 s watermark.
    let program = (1..=50)
        .map(|i| format!("G1 X{} F60", i))
        .collect::<Vec<_>>()
        .join("\n");
    let mut ctrl = controller(&format!("G21 G90\n{}\n", program));
    ctrl.start().unwrap();

    ctrl.pump(PumpBudget::default()).unwrap();
    assert!(ctrl.executor().queued_time() > 0.5);

    // Clock has not advanced: the next tick must not pull new lines.
    let report = ctrl.pump(PumpBudget::default()).unwrap();
    assert_eq!(report.lines_read, 0);

    // Draining the backend lets filling resume.
    ctrl.executor_mut().advance(1_000.0);
    let report = ctrl.pump(PumpBudget::default()).unwrap();
    assert!(report.lines_read > 0);
}

#[test]
fn test_lookahead_queue_is_bounded() {
    let many_moves = (1..=500)
        .map(|i| format!("G1 X{} F60000", i))
        .collect::<Vec<_>>()
        .join("\n");
    let config = ControllerConfig {
        lookahead_primitives: 10,
        ..ControllerConfig::default()
    };
    let mut ctrl = JobController::new(
        SimulatedExecutor::new(),
        GcodeStreamer::from_string(format!("G21 G90\n{}\n", many_moves)),
        interpreter(),
        config,
    );
    // Fill without stepping: queue must stop at the bound.
    for _ in 0..100 {
        ctrl.pump(PumpBudget {
            max_lines: 16,
            max_steps: 0,
        })
        .unwrap();
    }
    assert!(ctrl.queued_primitives() <= 10);
}

#[test]
fn test_soft_limit_violation_cancels_job() {
    let mut ctrl = controller("G21 G90\nG1 X400 F600\n").with_soft_limits(SoftLimits::new([
        ('X', (0.0, 300.0)),
        ('Y', (0.0, 300.0)),
    ]));
    let mut rx = ctrl.events().subscribe();
    ctrl.start().unwrap();

    let mut failed = false;
    for _ in 0..100 {
        if ctrl.pump(PumpBudget::default()).is_err() {
            failed = true;
            break;
        }
        ctrl.executor_mut().advance(60.0);
        if ctrl.state().is_terminal() {
            break;
        }
    }
    assert!(failed);
    assert_eq!(ctrl.state(), ExecutionState::Cancelled);

    let mut saw_error = false;
    while let Ok(event) = rx.try_recv() {
        if let JobEvent::Error { kind, message, .. } = event {
            assert_eq!(kind, "soft_limit");
            assert!(message.contains("soft limit"));
            saw_error = true;
        }
    }
    assert!(saw_error);
}

#[test]
fn test_rapid_soft_limit_check_can_be_disabled() {
    let config = ControllerConfig {
        check_rapid_soft_limits: false,
        ..ControllerConfig::default()
    };
    let limits = SoftLimits::new([('X', (0.0, 5.0))]);

    // A rapid beyond X5 passes with the flag off...
    let mut ctrl = JobController::new(
        SimulatedExecutor::new(),
        GcodeStreamer::from_string("G0 X10\n"),
        interpreter(),
        config,
    )
    .with_soft_limits(limits.clone());
    run_to_completion(&mut ctrl);
    assert_eq!(ctrl.state(), ExecutionState::Done);

    // ...and cancels with the default configuration.
    let mut ctrl = controller("G0 X10\n").with_soft_limits(limits);
    ctrl.start().unwrap();
    let mut failed = false;
    for _ in 0..100 {
        if ctrl.pump(PumpBudget::default()).is_err() {
            failed = true;
            break;
        }
        ctrl.executor_mut().advance(60.0);
        if ctrl.state().is_terminal() {
            break;
        }
    }
    assert!(failed);
}

#[test]
fn test_parse_error_cancels_with_line_number() {
    let mut ctrl = controller("G21\nG1 X10 @ F600\n");
    let mut rx = ctrl.events().subscribe();
    ctrl.start().unwrap();

    let err = loop {
        match ctrl.pump(PumpBudget::default()) {
            Err(e) => break e,
            Ok(report) => assert!(!report.state.is_terminal(), "terminal without error"),
        }
    };
    assert_eq!(err.line_number(), Some(2));
    assert_eq!(ctrl.state(), ExecutionState::Cancelled);

    let mut saw_error = false;
    while let Ok(event) = rx.try_recv() {
        if let JobEvent::Error { line, .. } = event {
            assert_eq!(line, Some(2));
            saw_error = true;
        }
    }
    assert!(saw_error);
}

#[test]
fn test_executor_failure_cancels_job() {
    let mut ctrl = JobController::new(
        SimulatedExecutor::new().with_failure_after(2),
        GcodeStreamer::from_string("G21 G90\nG1 X1 F600\nG1 X2\nG1 X3\nG1 X4\n"),
        interpreter(),
        ControllerConfig::default(),
    );
    ctrl.start().unwrap();

    let mut failed = false;
    for _ in 0..100 {
        if ctrl.pump(PumpBudget::default()).is_err() {
            failed = true;
            break;
        }
        ctrl.executor_mut().advance(60.0);
    }
    assert!(failed);
    assert_eq!(ctrl.state(), ExecutionState::Cancelled);
    // The rejected primitive is not counted as executed.
    assert_eq!(ctrl.executor().executed_count(), 2);
    assert!((ctrl.completed_length_mm() - 2.0).abs() < 1e-9);
}

#[test]
fn test_budget_bounds_work_per_tick() {
    let mut ctrl = controller("G21 G90\nG1 X1 F60000\nG1 X2\nG1 X3\n");
    ctrl.start().unwrap();

    let report = ctrl
        .pump(PumpBudget {
            max_lines: 2,
            max_steps: 0,
        })
        .unwrap();
    assert_eq!(report.lines_read, 2);
    assert_eq!(report.steps_executed, 0);

    let report = ctrl
        .pump(PumpBudget {
            max_lines: 0,
            max_steps: 1,
        })
        .unwrap();
    assert_eq!(report.lines_read, 0);
    assert_eq!(report.steps_executed, 1);
}

#[test]
fn test_strict_mode_rejects_unsupported_words() {
    let strict = Interpreter::new(
        ModalState::new(ARC_TOLERANCE, MAX_SEGMENT_TIME),
        RAPID_FEEDRATE,
    )
    .with_strict(true);
    let mut ctrl = JobController::new(
        SimulatedExecutor::new(),
        GcodeStreamer::from_string("G21\nM3 S12000\nG1 X5 F600\n"),
        strict,
        ControllerConfig::default(),
    );
    ctrl.start().unwrap();

    let err = loop {
        match ctrl.pump(PumpBudget::default()) {
            Err(e) => break e,
            Ok(_) => ctrl.executor_mut().advance(60.0),
        }
    };
    assert_eq!(err.line_number(), Some(2));
    assert_eq!(ctrl.state(), ExecutionState::Cancelled);
}
