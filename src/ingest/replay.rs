//! Local JSON-lines replay source.
//!
//! Each non-empty line of the recording is one frame's detections, exactly as the
//! detection adapter would have emitted them:
//!
//! ```text
//! [{"class_id": 1, "confidence": 0.8, "box": [100, 100, 150, 200]}, ...]
//! ```
//!
//! The line is passed through untouched as the frame payload; decoding belongs to
//! `ReplayBackend`, so a corrupt line is a per-frame detection failure rather than
//! an acquisition failure.

use anyhow::{anyhow, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};

use super::pacing::FramePacer;
use super::{Frame, FrameSource, SourceStats};
use crate::CameraId;

pub struct ReplayFileSource {
    camera_id: CameraId,
    path: String,
    lines: Option<Lines<BufReader<File>>>,
    frame_count: u64,
    pacer: FramePacer,
}

impl ReplayFileSource {
    pub fn open(camera_id: CameraId, path: &str, target_fps: u32) -> Result<Self> {
        if !std::path::Path::new(path).is_file() {
            return Err(anyhow!("{}: recording {} not found", camera_id, path));
        }
        Ok(Self {
            camera_id,
            path: path.to_string(),
            lines: None,
            frame_count: 0,
            pacer: FramePacer::new(target_fps),
        })
    }
}

impl FrameSource for ReplayFileSource {
    fn connect(&mut self) -> Result<()> {
        let file = File::open(&self.path)
            .map_err(|e| anyhow!("failed to open recording {}: {}", self.path, e))?;
        self.lines = Some(BufReader::new(file).lines());
        log::info!("{}: replaying {}", self.camera_id, self.path);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let lines = self
            .lines
            .as_mut()
            .ok_or_else(|| anyhow!("{}: replay source not connected", self.camera_id))?;
        loop {
            let Some(line) = lines.next() else {
                return Ok(None);
            };
            let line = line.map_err(|e| anyhow!("failed to read {}: {}", self.path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            self.pacer.wait();
            let frame = Frame::with_payload(self.camera_id, self.frame_count, line);
            self.frame_count += 1;
            return Ok(Some(frame));
        }
    }

    fn is_healthy(&self) -> bool {
        self.lines.is_some()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            url: self.path.clone(),
        }
    }
}
