use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use millstream::{
    prescan_total_length, ControllerConfig, ExecutionState, GcodeStreamer, Interpreter,
    JobController, JobEvent, ModalState, PumpBudget, Settings, SimulatedExecutor, SoftLimits,
};

/// Stream a G-code job through the millstream pipeline against the
/// simulated motion backend.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The G-code job file to run (.nc, .gcode).
    job: PathBuf,

    /// Settings file (.json or .toml); defaults apply when omitted.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Skip the prescan pass (progress will carry no percent or ETA).
    #[arg(long)]
    no_prescan: bool,

    /// Fail on unsupported G/M words instead of skipping them.
    #[arg(long)]
    strict: bool,
}

fn build_interpreter(settings: &Settings) -> Interpreter {
    let state = ModalState::new(
        settings.interpreter.arc_tolerance_mm,
        settings.interpreter.max_segment_time_s,
    );
    Interpreter::new(state, settings.interpreter.rapid_feedrate_mm_min)
        .with_strict(settings.interpreter.strict)
}

fn main() -> anyhow::Result<()> {
    millstream::init_logging()?;
    let args = Args::parse();

    let mut settings = match &args.settings {
        Some(path) => Settings::load_from_file(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => Settings::default(),
    };
    if args.strict {
        settings.interpreter.strict = true;
    }

    // Prescan with an independent interpreter so the runtime session starts
    // from pristine modal state.
    let total_mm = if args.no_prescan {
        None
    } else {
        let streamer = GcodeStreamer::from_path(&args.job)
            .with_context(|| format!("failed to open {}", args.job.display()))?;
        let total = prescan_total_length(streamer, build_interpreter(&settings))
            .context("prescan failed")?;
        tracing::info!(total_mm = %format!("{:.1}", total), "prescan complete");
        Some(total)
    };

    let config = ControllerConfig {
        lookahead_primitives: settings.controller.lookahead_primitives,
        queue_high_watermark_s: settings.controller.queue_high_watermark_s,
        progress_increment_mm: settings.controller.progress_increment_mm,
        check_rapid_soft_limits: settings.controller.check_rapid_soft_limits,
    };
    let streamer = GcodeStreamer::from_path(&args.job)
        .with_context(|| format!("failed to open {}", args.job.display()))?;
    let mut controller = JobController::new(
        SimulatedExecutor::new(),
        streamer,
        build_interpreter(&settings),
        config,
    );

    let axis_limits = settings.machine.axis_limits();
    if !axis_limits.is_empty() {
        controller = controller.with_soft_limits(SoftLimits::new(axis_limits));
    }
    if let Some(total) = total_mm {
        controller.set_total_length(total);
    }

    let mut events = controller.events().subscribe();
    controller.start()?;

    let budget = PumpBudget {
        max_lines: settings.controller.pump_max_lines,
        max_steps: settings.controller.pump_max_steps,
    };

    loop {
        let result = controller.pump(budget);
        while let Ok(event) = events.try_recv() {
            match &event {
                JobEvent::Error { .. } => tracing::error!("{}", event),
                _ => tracing::info!("{}", event),
            }
        }
        let report = result.context("job failed")?;
        if report.state == ExecutionState::Done {
            break;
        }
        // Stand in for the wall clock: drain a slice of queued motion time
        // the way a real backend would between reactor ticks.
        controller.executor_mut().advance(0.1);
    }

    tracing::info!(
        executed_mm = %format!("{:.1}", controller.completed_length_mm()),
        primitives = controller.executor().executed_count(),
        "job finished"
    );
    Ok(())
}
