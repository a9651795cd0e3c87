use crate::detect::{Detection, FrameDetections};
use crate::geometry::is_contact;
use crate::Side;

use super::{ArbitrationSettings, SearchOrder};

/// A weapon-to-competitor contact found in one frame.
#[derive(Debug)]
pub(crate) struct Contact<'a> {
    /// Attacking side (owner of the weapon).
    pub side: Side,
    pub weapon: &'a Detection,
    pub target: &'a Detection,
}

/// Find at most one contact in `frame`.
///
/// Phase 1 checks A's weapons against B's competitors, phase 2 the reverse; phase 2
/// only runs when phase 1 found nothing. A side whose contact is still held
/// (`last_contact_side`) cannot register again until a contact-free frame.
pub(crate) fn find_contact<'a>(
    frame: &'a FrameDetections,
    last_contact_side: Option<Side>,
    settings: &ArbitrationSettings,
) -> Option<Contact<'a>> {
    let mut parts = frame.partition(settings.confidence_threshold);
    if settings.search_order == SearchOrder::Confidence {
        parts.sort_by_confidence();
    }

    for side in [Side::A, Side::B] {
        if last_contact_side == Some(side) {
            continue;
        }
        for weapon in parts.weapons(side) {
            for target in parts.competitors(side.opponent()) {
                if is_contact(&weapon.bbox, &target.bbox, settings.min_overlap) {
                    return Some(Contact {
                        side,
                        weapon: *weapon,
                        target: *target,
                    });
                }
            }
        }
    }
    None
}
