//! Per-camera strike arbitration.
//!
//! One `ArbitrationEngine` exists per physical camera. It owns that camera's
//! `CameraArbitrationState` behind a single mutex; the frame worker (`process`)
//! and the telemetry sampler (`sample_confidences`) both hold it for their full
//! read/mutate sequence. Engines never share state.

mod contact;
mod engine;
mod sampler;
mod state;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::region::BodyRegion;
use crate::{CameraId, Side};

pub use engine::{ArbitrationEngine, EVENT_QUEUE_DEPTH};
pub use sampler::{sample_confidences, SideConfidences};
pub use state::{CameraArbitrationState, ScoreSnapshot};

const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.6;

/// Order in which candidate weapon/competitor pairs are visited.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchOrder {
    /// Adapter order; the first qualifying pair wins.
    #[default]
    Detection,
    /// Highest confidence first; ties keep adapter order.
    Confidence,
}

impl std::str::FromStr for SearchOrder {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "detection" => Ok(SearchOrder::Detection),
            "confidence" => Ok(SearchOrder::Confidence),
            other => Err(anyhow::anyhow!(
                "unknown search order '{}' (expected detection|confidence)",
                other
            )),
        }
    }
}

/// Tunables for one engine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ArbitrationSettings {
    /// Detections below this confidence are ignored.
    pub confidence_threshold: f32,
    /// Contact requires an overlap ratio strictly above this value.
    pub min_overlap: f32,
    pub search_order: SearchOrder,
}

impl Default for ArbitrationSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            min_overlap: 0.0,
            search_order: SearchOrder::Detection,
        }
    }
}

/// Outcome of one arbitration decision.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HitEvent {
    pub camera_id: CameraId,
    /// Side whose weapon made contact.
    pub side: Side,
    pub region: BodyRegion,
    pub valid: bool,
    /// Contact weapon's detection confidence, as a percentage.
    pub confidence_pct: f32,
    pub occurred_at: DateTime<Local>,
    /// Reset generation of the state that produced this event.
    pub epoch: u64,
}
