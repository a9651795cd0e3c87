use anyhow::{anyhow, Context, Result};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::RawDetection;
use crate::ingest::Frame;

/// Backend for recorded detections.
///
/// Each frame payload is a JSON array of `{class_id, confidence, box}` records,
/// as written by an offline detector run. No inference happens here.
#[derive(Default)]
pub struct ReplayBackend;

impl ReplayBackend {
    pub fn new() -> Self {
        Self
    }
}

impl DetectorBackend for ReplayBackend {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>> {
        let payload = frame
            .payload
            .as_deref()
            .ok_or_else(|| anyhow!("frame {} carries no recorded detections", frame.sequence))?;
        serde_json::from_str(payload)
            .with_context(|| format!("invalid recorded detections in frame {}", frame.sequence))
    }
}
