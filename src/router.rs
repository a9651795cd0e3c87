//! Per-camera event routing.
//!
//! The router is the consumer end of an engine's outbound queue. It keeps two
//! independent views of the same event stream:
//!
//! - a single-slot pending buffer, overwritten by each new event and drained by the
//!   telemetry scheduler on its flush tick;
//! - the cumulative, hash-chained match log used for audit and export.
//!
//! Each view has its own lock, so draining the pending slot never blocks logging
//! and vice versa.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use crate::arbiter::HitEvent;
use crate::audit::{LogEntry, LogRecord, MatchLog, RecordKind};
use crate::config::SideLabels;
use crate::telemetry::{TelemetryRecord, TelemetryStatus};
use crate::{format_timestamp, CameraId};

/// Export form of one log record, with display labels applied.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ExportRow {
    pub timestamp: String,
    pub valid: bool,
    pub confidence_pct: f32,
    pub side: String,
    pub region: String,
}

struct LogState {
    log: MatchLog,
    /// Events from before the last reset are discarded.
    min_epoch: u64,
}

pub struct EventRouter {
    camera_id: CameraId,
    labels: SideLabels,
    pending: Mutex<Option<HitEvent>>,
    log: Mutex<LogState>,
}

impl EventRouter {
    pub fn new(camera_id: CameraId, labels: SideLabels) -> Self {
        Self {
            camera_id,
            labels,
            pending: Mutex::new(None),
            log: Mutex::new(LogState {
                log: MatchLog::new(),
                min_epoch: 0,
            }),
        }
    }

    pub fn camera_id(&self) -> CameraId {
        self.camera_id
    }

    /// Feed one event to both views. Returns false when the event predates a reset.
    ///
    /// A valid strike is followed in the log by a zero-confidence counterpart record
    /// for the opposing side, stamped with the same time.
    pub fn publish(&self, event: HitEvent) -> Result<bool> {
        let timestamp = format_timestamp(&event.occurred_at);
        {
            let mut state = self.lock_log()?;
            if event.epoch < state.min_epoch {
                log::debug!(
                    "{}: dropping hit event from epoch {} (current {})",
                    self.camera_id,
                    event.epoch,
                    state.min_epoch
                );
                return Ok(false);
            }
            state.log.append(LogRecord {
                timestamp: timestamp.clone(),
                valid: event.valid,
                confidence_pct: event.confidence_pct,
                side: event.side,
                region: event.region,
                kind: RecordKind::Decision,
            })?;
            if event.valid {
                state.log.append(LogRecord {
                    timestamp,
                    valid: false,
                    confidence_pct: 0.0,
                    side: event.side.opponent(),
                    region: event.region,
                    kind: RecordKind::Counterpart,
                })?;
            }
        }
        *self.lock_pending()? = Some(event);
        Ok(true)
    }

    /// Drain the pending slot into a telemetry row (idle placeholder when empty).
    pub fn flush_pending(&self, now: DateTime<Local>) -> Result<TelemetryRecord> {
        let pending = self.lock_pending()?.take();
        let (confidence_pct, status) = match pending {
            Some(event) => (
                event.confidence_pct,
                TelemetryStatus::Strike {
                    side: event.side,
                    region: event.region,
                    valid: event.valid,
                },
            ),
            None => (0.0, TelemetryStatus::Idle),
        };
        Ok(TelemetryRecord {
            timestamp: format_timestamp(&now),
            confidence_pct,
            status,
            camera_id: self.camera_id,
        })
    }

    /// Clear the cumulative log and ignore any queued event older than `epoch`.
    pub fn reset(&self, epoch: u64) -> Result<()> {
        let mut state = self.lock_log()?;
        state.log.clear();
        state.min_epoch = epoch;
        Ok(())
    }

    pub fn entries(&self) -> Result<Vec<LogEntry>> {
        Ok(self.lock_log()?.log.entries().to_vec())
    }

    pub fn log_len(&self) -> Result<usize> {
        Ok(self.lock_log()?.log.len())
    }

    pub fn verify_log(&self) -> Result<()> {
        self.lock_log()?.log.verify()
    }

    pub fn export_rows(&self) -> Result<Vec<ExportRow>> {
        let state = self.lock_log()?;
        Ok(state
            .log
            .entries()
            .iter()
            .map(|entry| ExportRow {
                timestamp: entry.record.timestamp.clone(),
                valid: entry.record.valid,
                confidence_pct: entry.record.confidence_pct,
                side: self.labels.label(entry.record.side).to_string(),
                region: entry.record.region.label().to_string(),
            })
            .collect())
    }

    /// Drain `events` on a dedicated thread until every sender is dropped.
    pub fn spawn_dispatch(self: &Arc<Self>, events: Receiver<HitEvent>) -> Result<JoinHandle<()>> {
        let router = Arc::clone(self);
        std::thread::Builder::new()
            .name(format!("router-{}", self.camera_id.0))
            .spawn(move || {
                for event in events {
                    if let Err(err) = router.publish(event) {
                        log::error!("{}: failed to route hit event: {}", router.camera_id, err);
                    }
                }
                log::debug!("{}: event queue closed", router.camera_id);
            })
            .map_err(|e| anyhow!("failed to spawn router thread: {}", e))
    }

    fn lock_log(&self) -> Result<MutexGuard<'_, LogState>> {
        self.log
            .lock()
            .map_err(|_| anyhow!("{}: match log lock poisoned", self.camera_id))
    }

    fn lock_pending(&self) -> Result<MutexGuard<'_, Option<HitEvent>>> {
        self.pending
            .lock()
            .map_err(|_| anyhow!("{}: pending event lock poisoned", self.camera_id))
    }
}
