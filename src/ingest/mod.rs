//! Frame ingestion sources.
//!
//! This module provides the acquisition half of the detection adapter:
//! - Synthetic frames (`stub://` URLs) for demos and tests
//! - Local JSON-lines replay of recorded detections
//!
//! Live device capture is an external collaborator; anything that can hand over
//! frames implements `FrameSource`.
//!
//! A source error is an acquisition failure: the camera worker stops and reports
//! it. End of stream (`Ok(None)`) stops the worker cleanly. There is no automatic
//! reconnect; restarting a camera is an explicit controller action.

mod pacing;
pub mod replay;
pub mod synthetic;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Local};

use crate::CameraId;

pub use replay::ReplayFileSource;
pub use synthetic::SyntheticSource;

/// One acquired frame.
///
/// Pixels never enter the arbiter; a frame carries identity, capture time and an
/// optional opaque payload for backends that replay recorded output.
#[derive(Clone, Debug)]
pub struct Frame {
    pub camera_id: CameraId,
    pub sequence: u64,
    pub captured_at: DateTime<Local>,
    pub payload: Option<String>,
}

impl Frame {
    pub fn new(camera_id: CameraId, sequence: u64) -> Self {
        Self {
            camera_id,
            sequence,
            captured_at: Local::now(),
            payload: None,
        }
    }

    pub fn with_payload(camera_id: CameraId, sequence: u64, payload: impl Into<String>) -> Self {
        Self {
            payload: Some(payload.into()),
            ..Self::new(camera_id, sequence)
        }
    }
}

/// Statistics for a frame source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub url: String,
}

/// Acquisition side of a camera pipeline.
pub trait FrameSource: Send {
    /// Open the underlying stream.
    fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    /// Capture the next frame. `Ok(None)` signals end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Check if the source is healthy.
    fn is_healthy(&self) -> bool {
        true
    }

    /// Get frame statistics.
    fn stats(&self) -> SourceStats;
}

/// Open the source named by `url` for `camera_id`.
///
/// `stub://<name>` yields synthetic frames; any other value must be a local path to
/// a JSON-lines recording.
pub fn open_source(camera_id: CameraId, url: &str, target_fps: u32) -> Result<Box<dyn FrameSource>> {
    if url.starts_with("stub://") {
        return Ok(Box::new(SyntheticSource::new(camera_id, url, target_fps)));
    }
    if !is_local_file_path(url) {
        return Err(anyhow!(
            "{}: source '{}' is neither stub:// nor a local path",
            camera_id,
            url
        ));
    }
    Ok(Box::new(ReplayFileSource::open(camera_id, url, target_fps)?))
}

fn is_local_file_path(path: &str) -> bool {
    !path.trim().is_empty() && !path.contains("://")
}
