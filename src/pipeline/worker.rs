use anyhow::{anyhow, Result};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::arbiter::ArbitrationEngine;
use crate::detect::{DetectorBackend, FrameDetections};
use crate::ingest::FrameSource;
use crate::CameraId;

const STOP_POLL: Duration = Duration::from_millis(10);

/// Lifecycle of a camera worker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum WorkerStatus {
    Running,
    /// Stopped on request or at end of stream.
    Stopped,
    /// Acquisition failed; the worker does not retry.
    Failed(String),
}

/// Handle to a running camera worker thread.
#[derive(Debug)]
pub struct WorkerHandle {
    camera_id: CameraId,
    shutdown: Arc<AtomicBool>,
    status: Arc<Mutex<WorkerStatus>>,
    live: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn camera_id(&self) -> CameraId {
        self.camera_id
    }

    pub fn status(&self) -> WorkerStatus {
        read_status(&self.status)
    }

    pub fn is_running(&self) -> bool {
        self.status() == WorkerStatus::Running
    }

    /// Request a stop and wait up to `grace` for the thread to exit.
    ///
    /// Returns the final status and whether the thread was joined. A worker still
    /// busy after `grace` is detached and reported as stopped; whatever frame it
    /// holds is discarded.
    pub fn stop(mut self, grace: Duration) -> (WorkerStatus, bool) {
        self.shutdown.store(true, Ordering::SeqCst);
        let Some(join) = self.join.take() else {
            return (self.status(), true);
        };

        let deadline = Instant::now() + grace;
        while !join.is_finished() && Instant::now() < deadline {
            std::thread::sleep(STOP_POLL);
        }

        if join.is_finished() {
            if join.join().is_err() {
                log::error!("{}: worker thread panicked", self.camera_id);
                set_status(
                    &self.status,
                    WorkerStatus::Failed("worker thread panicked".to_string()),
                );
            }
            (self.status(), true)
        } else {
            log::warn!(
                "{}: worker did not stop within {:?}, detaching",
                self.camera_id,
                grace
            );
            set_status_if_running(&self.status, WorkerStatus::Stopped);
            self.live.store(false, Ordering::SeqCst);
            (self.status(), false)
        }
    }
}

/// Start the acquisition loop for one camera on its own thread.
///
/// `live` is raised here and lowered when the thread exits or is detached.
pub(crate) fn spawn_worker(
    camera_id: CameraId,
    source: Box<dyn FrameSource>,
    backend: Box<dyn DetectorBackend>,
    engine: Arc<ArbitrationEngine>,
    arbitrating: Arc<AtomicBool>,
    live: Arc<AtomicBool>,
) -> Result<WorkerHandle> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let status = Arc::new(Mutex::new(WorkerStatus::Running));
    let worker = CameraWorker {
        camera_id,
        source,
        backend,
        engine,
        arbitrating,
        shutdown: shutdown.clone(),
        status: status.clone(),
        live: live.clone(),
    };
    live.store(true, Ordering::SeqCst);
    let join = std::thread::Builder::new()
        .name(format!("camera-{}", camera_id.0))
        .spawn(move || worker.run())
        .map_err(|e| {
            live.store(false, Ordering::SeqCst);
            anyhow!("failed to spawn worker for {}: {}", camera_id, e)
        })?;

    Ok(WorkerHandle {
        camera_id,
        shutdown,
        status,
        live,
        join: Some(join),
    })
}

struct CameraWorker {
    camera_id: CameraId,
    source: Box<dyn FrameSource>,
    backend: Box<dyn DetectorBackend>,
    engine: Arc<ArbitrationEngine>,
    arbitrating: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    status: Arc<Mutex<WorkerStatus>>,
    live: Arc<AtomicBool>,
}

impl CameraWorker {
    fn run(mut self) {
        let final_status = match self.run_loop() {
            Ok(()) => WorkerStatus::Stopped,
            Err(err) => {
                log::error!("{}: worker failed: {}", self.camera_id, err);
                WorkerStatus::Failed(err.to_string())
            }
        };
        let stats = self.source.stats();
        log::info!(
            "{}: worker exiting after {} frames from {}",
            self.camera_id,
            stats.frames_captured,
            stats.url
        );
        self.live.store(false, Ordering::SeqCst);
        set_status(&self.status, final_status);
    }

    fn run_loop(&mut self) -> Result<()> {
        self.source.connect()?;
        if !self.source.is_healthy() {
            return Err(anyhow!(
                "{}: source {} unhealthy after connect",
                self.camera_id,
                self.source.stats().url
            ));
        }
        if let Err(err) = self.backend.warm_up() {
            log::warn!(
                "{}: {} backend warm-up failed: {}",
                self.camera_id,
                self.backend.name(),
                err
            );
        }
        log::info!(
            "{}: worker started ({} backend)",
            self.camera_id,
            self.backend.name()
        );

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                return Ok(());
            }
            let Some(frame) = self.source.next_frame()? else {
                log::info!("{}: end of stream", self.camera_id);
                return Ok(());
            };
            if self.shutdown.load(Ordering::SeqCst) {
                return Ok(());
            }
            if !self.arbitrating.load(Ordering::SeqCst) {
                continue;
            }

            let raw = match self.backend.detect(&frame) {
                Ok(raw) => raw,
                Err(err) => {
                    log::warn!(
                        "{}: detection failed on frame {}: {}",
                        self.camera_id,
                        frame.sequence,
                        err
                    );
                    continue;
                }
            };
            let detections = match FrameDetections::from_raw(raw) {
                Ok(detections) => detections.with_capture_time(frame.captured_at),
                Err(err) => {
                    log::warn!(
                        "{}: discarding frame {}: {}",
                        self.camera_id,
                        frame.sequence,
                        err
                    );
                    continue;
                }
            };
            self.engine.process(detections)?;
        }
    }
}

fn read_status(status: &Mutex<WorkerStatus>) -> WorkerStatus {
    match status.lock() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

fn set_status(status: &Mutex<WorkerStatus>, value: WorkerStatus) {
    match status.lock() {
        Ok(mut guard) => *guard = value,
        Err(poisoned) => *poisoned.into_inner() = value,
    }
}

fn set_status_if_running(status: &Mutex<WorkerStatus>, value: WorkerStatus) {
    let mut guard = match status.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if *guard == WorkerStatus::Running {
        *guard = value;
    }
}
