use anyhow::Result;

use super::pacing::FramePacer;
use super::{Frame, FrameSource, SourceStats};
use crate::CameraId;

/// Endless synthetic frame source for `stub://` URLs.
pub struct SyntheticSource {
    camera_id: CameraId,
    url: String,
    frame_count: u64,
    pacer: FramePacer,
}

impl SyntheticSource {
    pub fn new(camera_id: CameraId, url: &str, target_fps: u32) -> Self {
        Self {
            camera_id,
            url: url.to_string(),
            frame_count: 0,
            pacer: FramePacer::new(target_fps),
        }
    }
}

impl FrameSource for SyntheticSource {
    fn connect(&mut self) -> Result<()> {
        log::info!("{}: connected to {} (synthetic)", self.camera_id, self.url);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        self.pacer.wait();
        let frame = Frame::new(self.camera_id, self.frame_count);
        self.frame_count += 1;
        Ok(Some(frame))
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            url: self.url.clone(),
        }
    }
}
