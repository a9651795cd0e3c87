//! Live telemetry rows and sinks.
//!
//! The telemetry scheduler emits two kinds of rows into a `TelemetrySink`:
//! per-side confidence samples while a camera is arbitrating, and the periodic
//! drain of each router's pending slot (a strike or an idle placeholder).

use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::region::BodyRegion;
use crate::{CameraId, Side};

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TelemetryStatus {
    /// Latest strike drained from the pending slot.
    Strike {
        side: Side,
        region: BodyRegion,
        valid: bool,
    },
    /// Nothing happened since the previous drain.
    Idle,
    /// Live confidence sample for one competitor.
    Classifying { side: Side },
}

impl fmt::Display for TelemetryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryStatus::Strike { region, .. } => write!(f, "{}", region),
            TelemetryStatus::Idle => f.write_str("-"),
            TelemetryStatus::Classifying { .. } => f.write_str("Classifying"),
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct TelemetryRecord {
    pub timestamp: String,
    pub confidence_pct: f32,
    pub status: TelemetryStatus,
    pub camera_id: CameraId,
}

/// Consumer of telemetry rows (display, dashboard, test capture).
pub trait TelemetrySink: Send {
    fn record(&mut self, record: TelemetryRecord);
}

/// Writes telemetry rows through the `log` facade.
#[derive(Default)]
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn record(&mut self, record: TelemetryRecord) {
        match &record.status {
            TelemetryStatus::Idle => log::debug!(
                "[{}] {} idle",
                record.timestamp,
                record.camera_id
            ),
            TelemetryStatus::Classifying { side } => log::debug!(
                "[{}] {} side {} conf={:.1}%",
                record.timestamp,
                record.camera_id,
                side,
                record.confidence_pct
            ),
            TelemetryStatus::Strike {
                side,
                region,
                valid,
            } => log::info!(
                "[{}] {} strike side={} region={} valid={} conf={:.1}%",
                record.timestamp,
                record.camera_id,
                side,
                region,
                valid,
                record.confidence_pct
            ),
        }
    }
}

/// Collects rows in memory; clones share the same buffer.
#[derive(Clone, Default)]
pub struct MemorySink {
    rows: Arc<Mutex<Vec<TelemetryRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> Vec<TelemetryRecord> {
        match self.rows.lock() {
            Ok(rows) => rows.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl TelemetrySink for MemorySink {
    fn record(&mut self, record: TelemetryRecord) {
        match self.rows.lock() {
            Ok(mut rows) => rows.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
    }
}
