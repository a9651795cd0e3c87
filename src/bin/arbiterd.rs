//! arbiterd - multi-camera strike arbitration daemon
//!
//! This daemon:
//! 1. Loads the arbiter configuration (file + environment)
//! 2. Starts one worker per configured camera
//! 3. Streams telemetry rows through the log
//! 4. On shutdown, prints final scores and optionally exports every match log

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use strike_arbiter::{ArbiterConfig, LogSink, MatchController, MatchReport};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (JSON, or TOML when the name ends in .toml).
    #[arg(long, env = "ARBITER_CONFIG")]
    config: Option<PathBuf>,
    /// Run for this many seconds, then stop. 0 runs until Ctrl-C.
    #[arg(long, default_value_t = 0)]
    seconds: u64,
    /// Write final scores and match logs to this JSON file on exit.
    #[arg(long)]
    export: Option<PathBuf>,
    /// Start every camera with arbitration disabled.
    #[arg(long)]
    no_arbitration: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = ArbiterConfig::load_from(args.config.as_deref())?;
    log::info!(
        "arbiterd: {} cameras, threshold {:.2}, {} vs {}",
        config.cameras.len(),
        config.arbitration.confidence_threshold,
        config.sides.a,
        config.sides.b
    );

    let mut controller = MatchController::new(config)?;
    if args.no_arbitration {
        for id in controller.camera_ids() {
            controller.set_arbitration(id, false)?;
        }
    }
    controller.start_telemetry(Box::new(LogSink))?;
    controller.start_all()?;

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .expect("error setting Ctrl-C handler");

    if args.seconds == 0 {
        log::info!("arbiterd running, waiting for shutdown signal (Ctrl-C)...");
        let _ = rx.recv();
    } else {
        log::info!("arbiterd running for {}s (Ctrl-C stops early)...", args.seconds);
        let _ = rx.recv_timeout(Duration::from_secs(args.seconds));
    }
    log::info!("shutting down...");

    for id in controller.camera_ids() {
        if let Err(err) = controller.router(id)?.verify_log() {
            log::error!("{}: match log failed verification: {}", id, err);
        }
    }
    let report = controller.shutdown()?;
    print_scores(&report);

    if let Some(path) = &args.export {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write export to {}", path.display()))?;
        log::info!("match export written to {}", path.display());
    }
    Ok(())
}

fn print_scores(report: &MatchReport) {
    for camera in &report.cameras {
        println!(
            "{}: {} {} - {} {} ({} log rows)",
            camera.camera_id,
            report.side_a,
            camera.score_a,
            camera.score_b,
            report.side_b,
            camera.rows.len()
        );
    }
}
