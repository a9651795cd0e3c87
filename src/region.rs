//! Body-region classification.
//!
//! A strike is located by the vertical center of the weapon box relative to the
//! struck competitor's box. Bands are measured from the top edge of the target:
//!
//! | fraction of height | region       |
//! |--------------------|--------------|
//! | `< 0.30`           | Head         |
//! | `< 0.70`           | Torso        |
//! | `< 0.90`           | Legs         |
//! | `>= 0.90`          | OutOfBounds  |

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::geometry::BoundingBox;

const HEAD_LIMIT: f32 = 0.30;
const TORSO_LIMIT: f32 = 0.70;
const LEGS_LIMIT: f32 = 0.90;
const BACK_OF_HEAD_OFFSET: f32 = -0.25;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BodyRegion {
    Head,
    Torso,
    Legs,
    ChestAndAbdomen,
    SideOfBody,
    UpperLimbs,
    LowerLimbs,
    BackOfHead,
    Throat,
    Groin,
    Back,
    OutOfBounds,
}

impl BodyRegion {
    pub const INVALID: &'static [BodyRegion] = &[
        BodyRegion::BackOfHead,
        BodyRegion::Throat,
        BodyRegion::Groin,
        BodyRegion::Back,
        BodyRegion::OutOfBounds,
    ];

    pub fn is_valid(self) -> bool {
        !Self::INVALID.contains(&self)
    }

    pub fn label(self) -> &'static str {
        match self {
            BodyRegion::Head => "Head",
            BodyRegion::Torso => "Torso",
            BodyRegion::Legs => "Legs",
            BodyRegion::ChestAndAbdomen => "Chest & Abdomen",
            BodyRegion::SideOfBody => "Side of the Body",
            BodyRegion::UpperLimbs => "Upper Extremities",
            BodyRegion::LowerLimbs => "Lower Extremities",
            BodyRegion::BackOfHead => "Back of the Head",
            BodyRegion::Throat => "Throat",
            BodyRegion::Groin => "Groin",
            BodyRegion::Back => "Back",
            BodyRegion::OutOfBounds => "Out of Bounds",
        }
    }
}

impl fmt::Display for BodyRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classify where `contact` struck `target`.
pub fn classify(target: &BoundingBox, contact: &BoundingBox) -> BodyRegion {
    let center_y = contact.center_y();
    let height = target.height();
    let region = if center_y < target.y1 + height * HEAD_LIMIT {
        BodyRegion::Head
    } else if center_y < target.y1 + height * TORSO_LIMIT {
        BodyRegion::Torso
    } else if center_y < target.y1 + height * LEGS_LIMIT {
        BodyRegion::Legs
    } else {
        BodyRegion::OutOfBounds
    };
    refine_head(region, target)
}

/// Back-of-head split for head strikes.
///
/// The condition compares the top edge against itself plus a negative offset, so it
/// never holds for a box with non-negative height. Kept inactive until the ruleset
/// defines a real threshold.
fn refine_head(region: BodyRegion, target: &BoundingBox) -> BodyRegion {
    if region == BodyRegion::Head && target.y1 < target.y1 + target.height() * BACK_OF_HEAD_OFFSET
    {
        return BodyRegion::BackOfHead;
    }
    region
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> BoundingBox {
        BoundingBox::new(0.0, 100.0, 50.0, 200.0)
    }

    /// Weapon box whose vertical center sits at `fraction` of the target height.
    fn contact_at(fraction: f32) -> BoundingBox {
        let y = 100.0 + 100.0 * fraction;
        BoundingBox::new(10.0, y - 5.0, 40.0, y + 5.0)
    }

    #[test]
    fn bands_map_to_regions() {
        assert_eq!(classify(&target(), &contact_at(0.20)), BodyRegion::Head);
        assert_eq!(classify(&target(), &contact_at(0.50)), BodyRegion::Torso);
        assert_eq!(classify(&target(), &contact_at(0.80)), BodyRegion::Legs);
        assert_eq!(classify(&target(), &contact_at(0.95)), BodyRegion::OutOfBounds);
    }

    #[test]
    fn band_edges_belong_to_the_lower_band() {
        assert_eq!(classify(&target(), &contact_at(0.30)), BodyRegion::Torso);
        assert_eq!(classify(&target(), &contact_at(0.70)), BodyRegion::Legs);
        assert_eq!(classify(&target(), &contact_at(0.90)), BodyRegion::OutOfBounds);
    }

    #[test]
    fn contact_above_target_is_head() {
        assert_eq!(classify(&target(), &contact_at(-0.4)), BodyRegion::Head);
    }

    #[test]
    fn back_of_head_refinement_is_inactive() {
        assert_eq!(refine_head(BodyRegion::Head, &target()), BodyRegion::Head);
        let flat = BoundingBox::new(0.0, 100.0, 50.0, 100.0);
        assert_eq!(refine_head(BodyRegion::Head, &flat), BodyRegion::Head);
    }

    #[test]
    fn validity_follows_invalid_set() {
        for region in [
            BodyRegion::Head,
            BodyRegion::Torso,
            BodyRegion::Legs,
            BodyRegion::ChestAndAbdomen,
            BodyRegion::SideOfBody,
            BodyRegion::UpperLimbs,
            BodyRegion::LowerLimbs,
        ] {
            assert!(region.is_valid(), "{region} should be valid");
        }
        for region in BodyRegion::INVALID {
            assert!(!region.is_valid(), "{region} should be invalid");
        }
    }
}
