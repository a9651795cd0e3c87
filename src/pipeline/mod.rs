//! Match orchestration.
//!
//! The `MatchController` owns one slot per configured camera. A slot holds the
//! camera's arbitration engine, its event router (plus the dispatch thread that
//! drains the engine's queue into it), the arbitration switch and, while the
//! camera is live, its worker thread. A single telemetry scheduler samples every
//! live, arbitrating engine and drains every router's pending slot.
//!
//! Reset is the only operation that spans cameras, and even then each camera is
//! reset under its own locks, one after the other.

mod scheduler;
mod worker;

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;

use crate::arbiter::{ArbitrationEngine, ScoreSnapshot, EVENT_QUEUE_DEPTH};
use crate::config::{ArbiterConfig, CameraSettings};
use crate::detect::{open_backend, DetectorBackend};
use crate::ingest::{open_source, FrameSource};
use crate::router::{EventRouter, ExportRow};
use crate::telemetry::TelemetrySink;
use crate::CameraId;

pub use scheduler::TelemetryHandle;
pub use worker::{WorkerHandle, WorkerStatus};

use scheduler::{spawn_scheduler, TelemetryFeed};
use worker::spawn_worker;

struct CameraSlot {
    settings: CameraSettings,
    engine: Arc<ArbitrationEngine>,
    router: Arc<EventRouter>,
    dispatch: Option<JoinHandle<()>>,
    arbitrating: Arc<AtomicBool>,
    /// Raised while a worker thread is acquiring frames.
    live: Arc<AtomicBool>,
    worker: Option<WorkerHandle>,
    /// Status of the last worker once it has been stopped.
    last_status: Option<WorkerStatus>,
}

/// Final scores and log rows for one camera.
#[derive(Clone, Debug, Serialize)]
pub struct CameraReport {
    pub camera_id: CameraId,
    pub score_a: u32,
    pub score_b: u32,
    pub rows: Vec<ExportRow>,
}

#[derive(Clone, Debug, Serialize)]
pub struct MatchReport {
    pub side_a: String,
    pub side_b: String,
    pub cameras: Vec<CameraReport>,
}

pub struct MatchController {
    config: ArbiterConfig,
    cameras: BTreeMap<CameraId, CameraSlot>,
    telemetry: Option<TelemetryHandle>,
}

impl MatchController {
    /// Build a slot (engine, router, dispatch thread) for every configured camera.
    ///
    /// No frames are acquired until a camera is started.
    pub fn new(config: ArbiterConfig) -> Result<Self> {
        let mut cameras = BTreeMap::new();
        for settings in &config.cameras {
            let (tx, rx) = mpsc::sync_channel(EVENT_QUEUE_DEPTH);
            let engine = Arc::new(
                ArbitrationEngine::new(settings.id, config.arbitration).with_outbox(tx),
            );
            let router = Arc::new(EventRouter::new(settings.id, config.sides.clone()));
            let dispatch = router.spawn_dispatch(rx)?;
            let slot = CameraSlot {
                settings: settings.clone(),
                engine,
                router,
                dispatch: Some(dispatch),
                arbitrating: Arc::new(AtomicBool::new(settings.arbitration)),
                live: Arc::new(AtomicBool::new(false)),
                worker: None,
                last_status: None,
            };
            if cameras.insert(settings.id, slot).is_some() {
                return Err(anyhow!("duplicate {} in configuration", settings.id));
            }
        }
        Ok(Self {
            config,
            cameras,
            telemetry: None,
        })
    }

    pub fn config(&self) -> &ArbiterConfig {
        &self.config
    }

    pub fn camera_ids(&self) -> Vec<CameraId> {
        self.cameras.keys().copied().collect()
    }

    /// Start every configured camera from its configured source and backend.
    pub fn start_all(&mut self) -> Result<()> {
        for id in self.camera_ids() {
            self.start_camera(id)?;
        }
        Ok(())
    }

    pub fn start_camera(&mut self, id: CameraId) -> Result<()> {
        let settings = self.slot(id)?.settings.clone();
        let source = open_source(id, &settings.source, settings.target_fps)?;
        let backend = open_backend(&settings.backend)?;
        self.start_camera_with(id, source, backend)
    }

    /// Start a camera with an explicit source and backend.
    pub fn start_camera_with(
        &mut self,
        id: CameraId,
        source: Box<dyn FrameSource>,
        backend: Box<dyn DetectorBackend>,
    ) -> Result<()> {
        let grace = self.config.timers.stop_grace;
        let slot = self.slot_mut(id)?;
        if slot.worker.as_ref().is_some_and(WorkerHandle::is_running) {
            return Err(anyhow!("{} is already running", id));
        }
        if let Some(previous) = slot.worker.take() {
            let (status, _) = previous.stop(grace);
            slot.last_status = Some(status);
        }
        let handle = spawn_worker(
            id,
            source,
            backend,
            slot.engine.clone(),
            slot.arbitrating.clone(),
            slot.live.clone(),
        )?;
        slot.worker = Some(handle);
        log::info!("{}: started", id);
        Ok(())
    }

    /// Toggle arbitration for one camera; acquisition continues either way.
    pub fn set_arbitration(&self, id: CameraId, enabled: bool) -> Result<()> {
        let slot = self.slot(id)?;
        let previous = slot.arbitrating.swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            log::info!(
                "{}: arbitration {}",
                id,
                if enabled { "enabled" } else { "disabled" }
            );
        }
        Ok(())
    }

    pub fn is_arbitrating(&self, id: CameraId) -> Result<bool> {
        Ok(self.slot(id)?.arbitrating.load(Ordering::SeqCst))
    }

    /// Stop one camera's worker, waiting up to the configured grace interval.
    pub fn stop_camera(&mut self, id: CameraId) -> Result<WorkerStatus> {
        let grace = self.config.timers.stop_grace;
        let slot = self.slot_mut(id)?;
        let status = match slot.worker.take() {
            Some(worker) => worker.stop(grace).0,
            None => slot.last_status.clone().unwrap_or(WorkerStatus::Stopped),
        };
        slot.last_status = Some(status.clone());
        log::info!("{}: stopped ({:?})", id, status);
        Ok(status)
    }

    /// Current worker status, `None` if the camera was never started.
    pub fn worker_status(&self, id: CameraId) -> Result<Option<WorkerStatus>> {
        let slot = self.slot(id)?;
        Ok(match &slot.worker {
            Some(worker) => Some(worker.status()),
            None => slot.last_status.clone(),
        })
    }

    /// Zero every camera's tally and debounce memory and clear its match log.
    ///
    /// Events already queued from before the reset are discarded. A strike pending
    /// for telemetry is left in place.
    pub fn reset(&mut self) -> Result<()> {
        for (id, slot) in &self.cameras {
            let next_epoch = slot.engine.snapshot()?.epoch + 1;
            slot.router.reset(next_epoch)?;
            let epoch = slot.engine.reset()?;
            log::info!("{}: reset (epoch {})", id, epoch);
        }
        Ok(())
    }

    pub fn snapshot(&self, id: CameraId) -> Result<ScoreSnapshot> {
        self.slot(id)?.engine.snapshot()
    }

    pub fn snapshots(&self) -> Result<Vec<ScoreSnapshot>> {
        self.cameras
            .values()
            .map(|slot| slot.engine.snapshot())
            .collect()
    }

    pub fn router(&self, id: CameraId) -> Result<Arc<EventRouter>> {
        Ok(self.slot(id)?.router.clone())
    }

    pub fn export_rows(&self, id: CameraId) -> Result<Vec<ExportRow>> {
        self.slot(id)?.router.export_rows()
    }

    /// Scores and log rows as they stand; events still queued are not included.
    pub fn report(&self) -> Result<MatchReport> {
        let cameras = self
            .cameras
            .values()
            .map(|slot| camera_report(&slot.engine, &slot.router))
            .collect::<Result<Vec<_>>>()?;
        Ok(MatchReport {
            side_a: self.config.sides.a.clone(),
            side_b: self.config.sides.b.clone(),
            cameras,
        })
    }

    /// Start the sampler/flush scheduler writing into `sink`.
    pub fn start_telemetry(&mut self, sink: Box<dyn TelemetrySink>) -> Result<()> {
        if self.telemetry.is_some() {
            return Err(anyhow!("telemetry scheduler already running"));
        }
        let feeds = self
            .cameras
            .values()
            .map(|slot| TelemetryFeed {
                engine: slot.engine.clone(),
                router: slot.router.clone(),
                arbitrating: slot.arbitrating.clone(),
                live: slot.live.clone(),
            })
            .collect();
        self.telemetry = Some(spawn_scheduler(feeds, self.config.timers, sink)?);
        Ok(())
    }

    pub fn stop_telemetry(&mut self) -> Result<()> {
        match self.telemetry.take() {
            Some(handle) => handle.stop(),
            None => Ok(()),
        }
    }

    /// Stop everything and return the final report.
    ///
    /// Every routed event is in the report unless a worker had to be detached.
    pub fn shutdown(mut self) -> Result<MatchReport> {
        self.stop_telemetry()?;
        let grace = self.config.timers.stop_grace;
        let mut cameras = Vec::with_capacity(self.cameras.len());

        for (id, slot) in std::mem::take(&mut self.cameras) {
            let CameraSlot {
                engine,
                router,
                dispatch,
                worker,
                ..
            } = slot;
            let worker_joined = match worker {
                Some(worker) => worker.stop(grace).1,
                None => true,
            };
            let snapshot = engine.snapshot();
            drop(engine);

            // The queue closes once the last engine handle is gone.
            if let Some(dispatch) = dispatch {
                if worker_joined {
                    if dispatch.join().is_err() {
                        log::error!("{}: router thread panicked", id);
                    }
                } else {
                    log::warn!("{}: leaving router thread to drain a detached worker", id);
                }
            }
            let snapshot = snapshot?;
            cameras.push(CameraReport {
                camera_id: id,
                score_a: snapshot.score_a,
                score_b: snapshot.score_b,
                rows: router.export_rows()?,
            });
        }

        log::info!("match controller shut down");
        Ok(MatchReport {
            side_a: self.config.sides.a.clone(),
            side_b: self.config.sides.b.clone(),
            cameras,
        })
    }

    fn slot(&self, id: CameraId) -> Result<&CameraSlot> {
        self.cameras
            .get(&id)
            .ok_or_else(|| anyhow!("{} is not configured", id))
    }

    fn slot_mut(&mut self, id: CameraId) -> Result<&mut CameraSlot> {
        self.cameras
            .get_mut(&id)
            .ok_or_else(|| anyhow!("{} is not configured", id))
    }
}

impl Drop for MatchController {
    fn drop(&mut self) {
        if let Some(handle) = self.telemetry.take() {
            let _ = handle.stop();
        }
        let grace = self.config.timers.stop_grace;
        for slot in self.cameras.values_mut() {
            if let Some(worker) = slot.worker.take() {
                worker.stop(grace);
            }
        }
    }
}

fn camera_report(engine: &ArbitrationEngine, router: &EventRouter) -> Result<CameraReport> {
    let snapshot = engine.snapshot()?;
    Ok(CameraReport {
        camera_id: snapshot.camera_id,
        score_a: snapshot.score_a,
        score_b: snapshot.score_b,
        rows: router.export_rows()?,
    })
}
