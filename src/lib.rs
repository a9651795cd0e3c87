//! Strike Arbiter
//!
//! This crate implements the scoring core for a multi-camera combat-sport match.
//!
//! # Architecture
//!
//! Every camera runs an independent pipeline:
//!
//! 1. **Ingest**: a frame source yields frames (synthetic `stub://` or local replay).
//! 2. **Detect**: a detector backend turns a frame into raw `{class_id, confidence, box}` records.
//! 3. **Arbitrate**: the camera's `ArbitrationEngine` runs the contact search under its
//!    exclusive lock, updates the tally and emits at most one `HitEvent`.
//! 4. **Route**: the camera's `EventRouter` feeds a hash-chained cumulative log and a
//!    single-slot pending buffer drained by the telemetry scheduler.
//!
//! Cameras never share locks or state.
//!
//! # Module Structure
//!
//! - `geometry`: bounding boxes and the overlap ratio
//! - `region`: body-region classifier and validity rules
//! - `detect`: typed detections and detector backends
//! - `ingest`: frame sources
//! - `arbiter`: per-camera state, contact search and telemetry sampling
//! - `router`: per-camera event routing
//! - `audit`: hash-chained match log
//! - `pipeline`: camera workers, telemetry scheduler and match controller

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod arbiter;
pub mod audit;
pub mod config;
pub mod detect;
pub mod geometry;
pub mod ingest;
pub mod pipeline;
pub mod region;
pub mod router;
pub mod telemetry;

pub use arbiter::{
    ArbitrationEngine, ArbitrationSettings, CameraArbitrationState, HitEvent, ScoreSnapshot,
    SearchOrder, SideConfidences,
};
pub use audit::{hash_entry, LogEntry, LogRecord, MatchLog};
pub use config::{ArbiterConfig, CameraSettings, SideLabels};
pub use detect::{Detection, DetectionClass, DetectorBackend, FrameDetections, RawDetection};
pub use geometry::{overlap_ratio, BoundingBox};
pub use ingest::{Frame, FrameSource};
pub use pipeline::{MatchController, MatchReport, WorkerStatus};
pub use region::{classify, BodyRegion};
pub use router::{EventRouter, ExportRow};
pub use telemetry::{LogSink, MemorySink, TelemetryRecord, TelemetrySink, TelemetryStatus};

// -------------------- Sides --------------------

/// Competitor identity.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::A, Side::B];

    pub fn opponent(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Side::A => 0,
            Side::B => 1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::A => f.write_str("A"),
            Side::B => f.write_str("B"),
        }
    }
}

// -------------------- Cameras --------------------

/// Physical camera identifier (1-based in the default setup).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct CameraId(pub u32);

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "camera {}", self.0)
    }
}

/// Wall-clock timestamp format used in log and telemetry rows.
pub const TIMESTAMP_FORMAT: &str = "%H:%M:%S";

pub(crate) fn format_timestamp(at: &chrono::DateTime<chrono::Local>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opponent_is_symmetric() {
        for side in Side::ALL {
            assert_eq!(side.opponent().opponent(), side);
            assert_ne!(side.opponent(), side);
        }
    }

    #[test]
    fn camera_id_serializes_as_bare_number() {
        let json = serde_json::to_string(&CameraId(3)).unwrap();
        assert_eq!(json, "3");
        assert_eq!(CameraId(3).to_string(), "camera 3");
    }
}
