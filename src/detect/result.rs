use anyhow::{anyhow, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::geometry::BoundingBox;
use crate::Side;

/// Detection classes, numbered as the model emits them.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DetectionClass {
    CompetitorA,
    WeaponA,
    CompetitorB,
    WeaponB,
}

impl DetectionClass {
    pub fn side(self) -> Side {
        match self {
            DetectionClass::CompetitorA | DetectionClass::WeaponA => Side::A,
            DetectionClass::CompetitorB | DetectionClass::WeaponB => Side::B,
        }
    }

    pub fn is_weapon(self) -> bool {
        matches!(self, DetectionClass::WeaponA | DetectionClass::WeaponB)
    }

    pub fn class_id(self) -> u32 {
        match self {
            DetectionClass::CompetitorA => 0,
            DetectionClass::WeaponA => 1,
            DetectionClass::CompetitorB => 2,
            DetectionClass::WeaponB => 3,
        }
    }
}

impl TryFrom<u32> for DetectionClass {
    type Error = anyhow::Error;

    fn try_from(class_id: u32) -> Result<Self> {
        match class_id {
            0 => Ok(DetectionClass::CompetitorA),
            1 => Ok(DetectionClass::WeaponA),
            2 => Ok(DetectionClass::CompetitorB),
            3 => Ok(DetectionClass::WeaponB),
            other => Err(anyhow!("unknown detection class id {}", other)),
        }
    }
}

/// Untyped record as produced by a detector backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub class_id: u32,
    pub confidence: f32,
    #[serde(rename = "box")]
    pub bbox: [f32; 4],
}

impl RawDetection {
    pub fn new(class: DetectionClass, confidence: f32, bbox: [f32; 4]) -> Self {
        Self {
            class_id: class.class_id(),
            confidence,
            bbox,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub class: DetectionClass,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(class: DetectionClass, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            class,
            confidence,
            bbox,
        }
    }
}

impl TryFrom<RawDetection> for Detection {
    type Error = anyhow::Error;

    fn try_from(raw: RawDetection) -> Result<Self> {
        let class = DetectionClass::try_from(raw.class_id)?;
        if !raw.confidence.is_finite() || !(0.0..=1.0).contains(&raw.confidence) {
            return Err(anyhow!(
                "detection confidence {} outside 0..=1",
                raw.confidence
            ));
        }
        let bbox = BoundingBox::from_array(raw.bbox);
        if !bbox.is_finite() {
            return Err(anyhow!("detection box {:?} is not finite", raw.bbox));
        }
        Ok(Self::new(class, raw.confidence, bbox))
    }
}

/// All detections for one camera at one instant, in adapter order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameDetections {
    pub detections: Vec<Detection>,
    /// Capture time of the source frame; decisions are stamped with it when set.
    pub captured_at: Option<DateTime<Local>>,
}

impl FrameDetections {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self {
            detections,
            captured_at: None,
        }
    }

    pub fn with_capture_time(mut self, captured_at: DateTime<Local>) -> Self {
        self.captured_at = Some(captured_at);
        self
    }

    /// Validate backend output. A single malformed record rejects the whole frame.
    pub fn from_raw(raw: Vec<RawDetection>) -> Result<Self> {
        let detections = raw
            .into_iter()
            .map(Detection::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(detections))
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    /// Keep detections at or above `threshold` and split them by class, preserving order.
    pub fn partition(&self, threshold: f32) -> Partitioned<'_> {
        let mut parts = Partitioned::default();
        for det in self
            .detections
            .iter()
            .filter(|det| det.confidence >= threshold)
        {
            let side = det.class.side().index();
            if det.class.is_weapon() {
                parts.weapons[side].push(det);
            } else {
                parts.competitors[side].push(det);
            }
        }
        parts
    }
}

/// Thresholded detections grouped by side and role.
#[derive(Debug, Default)]
pub struct Partitioned<'a> {
    competitors: [Vec<&'a Detection>; 2],
    weapons: [Vec<&'a Detection>; 2],
}

impl<'a> Partitioned<'a> {
    pub fn competitors(&self, side: Side) -> &[&'a Detection] {
        &self.competitors[side.index()]
    }

    pub fn weapons(&self, side: Side) -> &[&'a Detection] {
        &self.weapons[side.index()]
    }

    pub(crate) fn sort_by_confidence(&mut self) {
        for list in self.competitors.iter_mut().chain(self.weapons.iter_mut()) {
            list.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        }
    }
}
