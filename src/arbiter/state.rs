use serde::Serialize;

use crate::detect::FrameDetections;
use crate::region::BodyRegion;
use crate::{CameraId, Side};

/// Score, debounce flag and last-decision memory for one camera.
///
/// Only `ArbitrationEngine` mutates this, and only while holding its lock.
#[derive(Clone, Debug, Default)]
pub struct CameraArbitrationState {
    scores: [u32; 2],
    last_contact_side: Option<Side>,
    last_winner: Option<Side>,
    latest: Option<FrameDetections>,
    epoch: u64,
}

impl CameraArbitrationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn score(&self, side: Side) -> u32 {
        self.scores[side.index()]
    }

    /// Side of the contact still being held, if any. Cleared by a contact-free frame.
    pub fn last_contact_side(&self) -> Option<Side> {
        self.last_contact_side
    }

    /// Side credited by the most recent decision; `None` after an invalid strike.
    pub fn last_winner(&self) -> Option<Side> {
        self.last_winner
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub(crate) fn latest_frame(&self) -> Option<&FrameDetections> {
        self.latest.as_ref()
    }

    pub(crate) fn cache_frame(&mut self, frame: FrameDetections) {
        self.latest = Some(frame);
    }

    /// Apply a detected contact. Returns whether it scored.
    pub(crate) fn record_contact(&mut self, side: Side, region: BodyRegion) -> bool {
        let valid = region.is_valid();
        if valid {
            self.scores[side.index()] = self.scores[side.index()].saturating_add(1);
            self.last_winner = Some(side);
        } else {
            self.last_winner = None;
        }
        self.last_contact_side = Some(side);
        valid
    }

    /// Re-arm the debounce after a frame with no contact.
    pub(crate) fn clear_contact(&mut self) {
        self.last_contact_side = None;
    }

    /// Zero the tally and forget the last decision. The frame cache survives.
    pub(crate) fn reset(&mut self) {
        self.scores = [0, 0];
        self.last_contact_side = None;
        self.last_winner = None;
        self.epoch += 1;
    }

    pub(crate) fn snapshot(&self, camera_id: CameraId) -> ScoreSnapshot {
        ScoreSnapshot {
            camera_id,
            score_a: self.score(Side::A),
            score_b: self.score(Side::B),
            last_contact_side: self.last_contact_side,
            last_winner: self.last_winner,
            epoch: self.epoch,
        }
    }
}

/// Point-in-time copy of a camera's state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ScoreSnapshot {
    pub camera_id: CameraId,
    pub score_a: u32,
    pub score_b: u32,
    pub last_contact_side: Option<Side>,
    pub last_winner: Option<Side>,
    pub epoch: u64,
}

impl ScoreSnapshot {
    pub fn score(&self, side: Side) -> u32 {
        match side {
            Side::A => self.score_a,
            Side::B => self.score_b,
        }
    }
}
