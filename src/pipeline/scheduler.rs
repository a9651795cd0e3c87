use anyhow::{anyhow, Result};
use chrono::Local;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::arbiter::ArbitrationEngine;
use crate::config::TimerSettings;
use crate::router::EventRouter;
use crate::telemetry::{TelemetryRecord, TelemetrySink, TelemetryStatus};
use crate::{format_timestamp, Side};

/// Upper bound on one sleep, so a stop request is seen promptly.
const MAX_TICK: Duration = Duration::from_millis(50);

/// One camera as seen by the scheduler.
#[derive(Clone)]
pub(crate) struct TelemetryFeed {
    pub(crate) engine: Arc<ArbitrationEngine>,
    pub(crate) router: Arc<EventRouter>,
    pub(crate) arbitrating: Arc<AtomicBool>,
    /// Cleared once the camera's worker has exited.
    pub(crate) live: Arc<AtomicBool>,
}

#[derive(Debug)]
pub struct TelemetryHandle {
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl TelemetryHandle {
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("telemetry scheduler thread panicked"))?;
        }
        Ok(())
    }
}

pub(crate) fn spawn_scheduler(
    feeds: Vec<TelemetryFeed>,
    timers: TimerSettings,
    sink: Box<dyn TelemetrySink>,
) -> Result<TelemetryHandle> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_thread = shutdown.clone();
    let join = std::thread::Builder::new()
        .name("telemetry".to_string())
        .spawn(move || run_scheduler(feeds, timers, sink, shutdown_thread))
        .map_err(|e| anyhow!("failed to spawn telemetry scheduler: {}", e))?;
    Ok(TelemetryHandle {
        shutdown,
        join: Some(join),
    })
}

fn run_scheduler(
    feeds: Vec<TelemetryFeed>,
    timers: TimerSettings,
    mut sink: Box<dyn TelemetrySink>,
    shutdown: Arc<AtomicBool>,
) {
    let start = Instant::now();
    let mut next_sample = start + timers.sample_interval;
    let mut next_flush = start + timers.flush_interval;

    while !shutdown.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= next_sample {
            log::debug!("telemetry: sampling {} cameras", feeds.len());
            sample_all(&feeds, sink.as_mut());
            next_sample = advance(next_sample, timers.sample_interval, now);
        }
        if now >= next_flush {
            log::debug!("telemetry: flushing pending events");
            flush_all(&feeds, sink.as_mut());
            next_flush = advance(next_flush, timers.flush_interval, now);
        }

        let due = next_sample.min(next_flush);
        let wait = due.saturating_duration_since(Instant::now()).min(MAX_TICK);
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
    }
}

/// Next deadline after `now`; missed ticks are skipped rather than replayed.
fn advance(deadline: Instant, interval: Duration, now: Instant) -> Instant {
    let next = deadline + interval;
    if next <= now {
        now + interval
    } else {
        next
    }
}

fn sample_all(feeds: &[TelemetryFeed], sink: &mut dyn TelemetrySink) {
    for feed in feeds {
        // A stopped camera still holds its last frame; do not report it as current.
        if !feed.live.load(Ordering::SeqCst) || !feed.arbitrating.load(Ordering::SeqCst) {
            continue;
        }
        let camera_id = feed.engine.camera_id();
        let confidences = match feed.engine.sample_confidences() {
            Ok(Some(confidences)) => confidences,
            Ok(None) => continue,
            Err(err) => {
                log::error!("{}: confidence sample failed: {}", camera_id, err);
                continue;
            }
        };
        let timestamp = format_timestamp(&Local::now());
        for side in Side::ALL {
            sink.record(TelemetryRecord {
                timestamp: timestamp.clone(),
                confidence_pct: confidences.get(side) * 100.0,
                status: TelemetryStatus::Classifying { side },
                camera_id,
            });
        }
    }
}

fn flush_all(feeds: &[TelemetryFeed], sink: &mut dyn TelemetrySink) {
    for feed in feeds {
        match feed.router.flush_pending(Local::now()) {
            Ok(record) => sink.record(record),
            Err(err) => log::error!("{}: pending flush failed: {}", feed.router.camera_id(), err),
        }
    }
}
