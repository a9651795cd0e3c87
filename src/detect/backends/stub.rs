use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{DetectionClass, RawDetection};
use crate::ingest::Frame;

/// Length of one scripted exchange, in frames.
pub const STUB_CYCLE_FRAMES: u64 = 40;

const COMPETITOR_A: [f32; 4] = [100.0, 100.0, 200.0, 400.0];
const COMPETITOR_B: [f32; 4] = [400.0, 100.0, 500.0, 400.0];
const WEAPON_A_GUARD: [f32; 4] = [210.0, 150.0, 260.0, 190.0];
const WEAPON_B_GUARD: [f32; 4] = [340.0, 150.0, 390.0, 190.0];
// A's weapon at B's torso (center 240, fraction ~0.47).
const WEAPON_A_STRIKE: [f32; 4] = [380.0, 220.0, 430.0, 260.0];
// B's weapon at A's head (center 130, fraction 0.10).
const WEAPON_B_STRIKE: [f32; 4] = [170.0, 110.0, 220.0, 150.0];

/// Scripted backend for demos and tests.
///
/// Replays a fixed exchange keyed on the frame sequence number, so every camera
/// running it produces the same deterministic bout:
/// - frames 10..14 of each cycle: A strikes B's torso (sustained contact)
/// - frames 24..28 of each cycle: B strikes A's head (sustained contact)
/// - everything else: both competitors on guard, no contact
pub struct StubBackend {
    frames_seen: u64,
}

impl StubBackend {
    pub fn new() -> Self {
        Self { frames_seen: 0 }
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>> {
        self.frames_seen += 1;

        let phase = frame.sequence % STUB_CYCLE_FRAMES;
        let (weapon_a, weapon_b) = match phase {
            10..=13 => (WEAPON_A_STRIKE, WEAPON_B_GUARD),
            24..=27 => (WEAPON_A_GUARD, WEAPON_B_STRIKE),
            _ => (WEAPON_A_GUARD, WEAPON_B_GUARD),
        };

        Ok(vec![
            RawDetection::new(DetectionClass::CompetitorA, 0.92, COMPETITOR_A),
            RawDetection::new(DetectionClass::WeaponA, 0.81, weapon_a),
            RawDetection::new(DetectionClass::CompetitorB, 0.90, COMPETITOR_B),
            RawDetection::new(DetectionClass::WeaponB, 0.77, weapon_b),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::FrameDetections;
    use crate::geometry::overlap_ratio;
    use crate::{CameraId, Side};

    fn detect_at(backend: &mut StubBackend, sequence: u64) -> FrameDetections {
        let raw = backend.detect(&Frame::new(CameraId(1), sequence)).unwrap();
        FrameDetections::from_raw(raw).unwrap()
    }

    fn contact(frame: &FrameDetections, attacker: Side) -> bool {
        let parts = frame.partition(0.6);
        parts.weapons(attacker).iter().any(|w| {
            parts
                .competitors(attacker.opponent())
                .iter()
                .any(|c| overlap_ratio(&w.bbox, &c.bbox) > 0.0)
        })
    }

    #[test]
    fn guard_frames_have_no_contact() {
        let mut backend = StubBackend::new();
        for seq in [0, 5, 9, 14, 23, 28, 39] {
            let frame = detect_at(&mut backend, seq);
            assert!(!contact(&frame, Side::A), "frame {seq}");
            assert!(!contact(&frame, Side::B), "frame {seq}");
        }
        assert_eq!(backend.frames_seen(), 7);
    }

    #[test]
    fn strike_windows_produce_one_sided_contact() {
        let mut backend = StubBackend::new();
        let a_strike = detect_at(&mut backend, 11);
        assert!(contact(&a_strike, Side::A));
        assert!(!contact(&a_strike, Side::B));

        let b_strike = detect_at(&mut backend, STUB_CYCLE_FRAMES + 25);
        assert!(contact(&b_strike, Side::B));
        assert!(!contact(&b_strike, Side::A));
    }
}
