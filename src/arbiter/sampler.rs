use serde::Serialize;

use crate::detect::FrameDetections;
use crate::Side;

/// Highest competitor confidence per side in one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct SideConfidences {
    pub a: f32,
    pub b: f32,
}

impl SideConfidences {
    pub fn get(&self, side: Side) -> f32 {
        match side {
            Side::A => self.a,
            Side::B => self.b,
        }
    }
}

/// Scan competitor detections at or above `threshold`; weapons are ignored.
pub fn sample_confidences(frame: &FrameDetections, threshold: f32) -> SideConfidences {
    let parts = frame.partition(threshold);
    let best = |side: Side| {
        parts
            .competitors(side)
            .iter()
            .map(|det| det.confidence)
            .fold(0.0_f32, f32::max)
    };
    SideConfidences {
        a: best(Side::A),
        b: best(Side::B),
    }
}
