use serde::{Deserialize, Serialize};

/// Axis-aligned box in pixel space: `(x1, y1)` top-left, `(x2, y2)` bottom-right.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn from_array(coords: [f32; 4]) -> Self {
        Self::new(coords[0], coords[1], coords[2], coords[3])
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// Signed area; non-positive for degenerate or inverted boxes.
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn center_y(&self) -> f32 {
        (self.y1 + self.y2) / 2.0
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.x1.is_finite() && self.y1.is_finite() && self.x2.is_finite() && self.y2.is_finite()
    }
}

/// Intersection over union of two boxes, in `[0, 1]`.
///
/// Returns 0 when the boxes do not intersect, either box has non-positive area, or
/// the areas overflow `f32`.
pub fn overlap_ratio(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let area_a = a.area();
    let area_b = b.area();
    if area_a <= 0.0 || area_b <= 0.0 {
        return 0.0;
    }

    let inter_w = (a.x2.min(b.x2) - a.x1.max(b.x1)).max(0.0);
    let inter_h = (a.y2.min(b.y2) - a.y1.max(b.y1)).max(0.0);
    let inter = inter_w * inter_h;
    if inter <= 0.0 {
        return 0.0;
    }

    let union = area_a + area_b - inter;
    if !union.is_finite() || union <= 0.0 {
        return 0.0;
    }
    let ratio = inter / union;
    if ratio.is_nan() {
        return 0.0;
    }
    ratio.clamp(0.0, 1.0)
}

/// Contact predicate: overlap strictly above `min_overlap`.
pub fn is_contact(a: &BoundingBox, b: &BoundingBox, min_overlap: f32) -> bool {
    overlap_ratio(a, b) > min_overlap
}
