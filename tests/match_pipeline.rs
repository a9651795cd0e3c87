use std::time::{Duration, Instant};

use anyhow::Result;

use strike_arbiter::ingest::SourceStats;
use strike_arbiter::{
    ArbiterConfig, BodyRegion, CameraId, CameraSettings, DetectionClass, DetectorBackend, Frame,
    FrameSource, MatchController, MemorySink, RawDetection, Side, TelemetryStatus, WorkerStatus,
};

const COMPETITOR_A: [f32; 4] = [200.0, 100.0, 250.0, 200.0];
const COMPETITOR_B: [f32; 4] = [0.0, 100.0, 50.0, 200.0];

/// Source yielding `total` empty frames, then either ending or idling on until stopped.
struct ScriptedSource {
    camera_id: CameraId,
    total: u64,
    next: u64,
    hold: bool,
}

impl ScriptedSource {
    fn new(camera_id: CameraId, total: usize) -> Self {
        Self {
            camera_id,
            total: total as u64,
            next: 0,
            hold: false,
        }
    }

    fn holding(camera_id: CameraId, total: usize) -> Self {
        Self {
            hold: true,
            ..Self::new(camera_id, total)
        }
    }
}

impl FrameSource for ScriptedSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.next >= self.total {
            if !self.hold {
                return Ok(None);
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        let frame = Frame::new(self.camera_id, self.next);
        self.next += 1;
        Ok(Some(frame))
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.next,
            url: "test://scripted".to_string(),
        }
    }
}

/// Returns a fixed detection list per frame sequence number; the last entry repeats.
struct ScriptedBackend {
    frames: Vec<Vec<RawDetection>>,
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>> {
        let last = self.frames.len().saturating_sub(1);
        let index = (frame.sequence as usize).min(last);
        Ok(self.frames.get(index).cloned().unwrap_or_default())
    }
}

fn competitors() -> Vec<RawDetection> {
    vec![
        RawDetection::new(DetectionClass::CompetitorA, 0.9, COMPETITOR_A),
        RawDetection::new(DetectionClass::CompetitorB, 0.9, COMPETITOR_B),
    ]
}

/// Competitors plus one weapon box.
fn with_weapon(class: DetectionClass, bbox: [f32; 4]) -> Vec<RawDetection> {
    let mut frame = competitors();
    frame.push(RawDetection::new(class, 0.8, bbox));
    frame
}

/// A scores (torso), holds, separates, B scores (head), then A lands out of bounds.
fn bout() -> Vec<Vec<RawDetection>> {
    vec![
        with_weapon(DetectionClass::WeaponA, [10.0, 145.0, 40.0, 155.0]),
        with_weapon(DetectionClass::WeaponA, [10.0, 145.0, 40.0, 155.0]),
        Vec::new(),
        with_weapon(DetectionClass::WeaponB, [210.0, 115.0, 240.0, 125.0]),
        Vec::new(),
        with_weapon(DetectionClass::WeaponA, [10.0, 190.0, 40.0, 200.0]),
    ]
}

fn config(cameras: u32) -> ArbiterConfig {
    let mut config = ArbiterConfig::default();
    config.cameras = (1..=cameras)
        .map(|id| CameraSettings::new(CameraId(id), &format!("stub://test-{id}")))
        .collect();
    config.timers.sample_interval = Duration::from_millis(20);
    config.timers.flush_interval = Duration::from_millis(30);
    config
}

fn start_scripted(
    controller: &mut MatchController,
    id: CameraId,
    frames: Vec<Vec<RawDetection>>,
) {
    let source = ScriptedSource::new(id, frames.len());
    controller
        .start_camera_with(id, Box::new(source), Box::new(ScriptedBackend { frames }))
        .expect("start camera");
}

/// Like `start_scripted`, but the camera keeps replaying its last frame until stopped.
fn start_holding(
    controller: &mut MatchController,
    id: CameraId,
    frames: Vec<Vec<RawDetection>>,
) {
    let source = ScriptedSource::holding(id, frames.len());
    controller
        .start_camera_with(id, Box::new(source), Box::new(ScriptedBackend { frames }))
        .expect("start camera");
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

fn wait_for_stop(controller: &MatchController, id: CameraId) {
    assert!(wait_until(|| {
        controller.worker_status(id).unwrap() == Some(WorkerStatus::Stopped)
    }));
}

#[test]
fn scripted_bout_scores_and_logs_every_decision() {
    let id = CameraId(1);
    let mut controller = MatchController::new(config(1)).unwrap();
    start_scripted(&mut controller, id, bout());
    wait_for_stop(&controller, id);

    let snapshot = controller.snapshot(id).unwrap();
    assert_eq!(snapshot.score(Side::A), 1);
    assert_eq!(snapshot.score(Side::B), 1);
    assert_eq!(snapshot.last_contact_side, Some(Side::A));
    // The closing out-of-bounds contact clears the winner.
    assert_eq!(snapshot.last_winner, None);

    let router = controller.router(id).unwrap();
    let report = controller.shutdown().unwrap();
    let rows = &report.cameras[0].rows;
    let summary: Vec<(&str, bool, &str)> = rows
        .iter()
        .map(|row| (row.side.as_str(), row.valid, row.region.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("Blue", true, "Torso"),
            ("Red", false, "Torso"),
            ("Red", true, "Head"),
            ("Blue", false, "Head"),
            ("Blue", false, BodyRegion::OutOfBounds.label()),
        ]
    );
    assert!((rows[0].confidence_pct - 80.0).abs() < 1e-3);
    assert_eq!(rows[1].confidence_pct, 0.0);
    router.verify_log().unwrap();
}

#[test]
fn reset_clears_scores_and_logs() {
    let id = CameraId(1);
    let mut controller = MatchController::new(config(1)).unwrap();
    start_scripted(&mut controller, id, bout());
    wait_for_stop(&controller, id);
    let router = controller.router(id).unwrap();
    assert!(wait_until(|| router.log_len().unwrap() == 5));

    controller.reset().unwrap();
    let snapshot = controller.snapshot(id).unwrap();
    assert_eq!(snapshot.score(Side::A), 0);
    assert_eq!(snapshot.score(Side::B), 0);
    assert_eq!(snapshot.last_contact_side, None);
    assert_eq!(snapshot.last_winner, None);
    assert!(controller.export_rows(id).unwrap().is_empty());

    start_scripted(
        &mut controller,
        id,
        vec![with_weapon(DetectionClass::WeaponA, [10.0, 145.0, 40.0, 155.0])],
    );
    wait_for_stop(&controller, id);
    let report = controller.shutdown().unwrap();
    assert_eq!(report.cameras[0].score_a, 1);
    assert_eq!(report.cameras[0].score_b, 0);
    assert_eq!(report.cameras[0].rows.len(), 2);
}

#[test]
fn cameras_score_independently() {
    let mut controller = MatchController::new(config(2)).unwrap();
    start_scripted(&mut controller, CameraId(1), bout());
    start_scripted(&mut controller, CameraId(2), vec![competitors(); 6]);
    wait_for_stop(&controller, CameraId(1));
    wait_for_stop(&controller, CameraId(2));

    let report = controller.shutdown().unwrap();
    assert_eq!(report.cameras.len(), 2);
    assert_eq!(report.cameras[0].camera_id, CameraId(1));
    assert_eq!(report.cameras[0].score_a, 1);
    assert_eq!(report.cameras[1].camera_id, CameraId(2));
    assert_eq!(report.cameras[1].score_a, 0);
    assert_eq!(report.cameras[1].score_b, 0);
    assert!(report.cameras[1].rows.is_empty());
}

#[test]
fn disabled_arbitration_records_nothing() {
    let id = CameraId(1);
    let mut controller = MatchController::new(config(1)).unwrap();
    controller.set_arbitration(id, false).unwrap();
    start_scripted(&mut controller, id, bout());
    wait_for_stop(&controller, id);

    let report = controller.shutdown().unwrap();
    assert_eq!(report.cameras[0].score_a, 0);
    assert_eq!(report.cameras[0].score_b, 0);
    assert!(report.cameras[0].rows.is_empty());
}

#[test]
fn reset_clears_every_camera() {
    let mut controller = MatchController::new(config(2)).unwrap();
    start_scripted(
        &mut controller,
        CameraId(1),
        vec![with_weapon(DetectionClass::WeaponA, [10.0, 145.0, 40.0, 155.0])],
    );
    start_scripted(
        &mut controller,
        CameraId(2),
        vec![
            with_weapon(DetectionClass::WeaponB, [210.0, 115.0, 240.0, 125.0]),
            Vec::new(),
            with_weapon(DetectionClass::WeaponB, [210.0, 190.0, 240.0, 200.0]),
        ],
    );
    wait_for_stop(&controller, CameraId(1));
    wait_for_stop(&controller, CameraId(2));
    let first = controller.router(CameraId(1)).unwrap();
    let second = controller.router(CameraId(2)).unwrap();
    assert!(wait_until(|| first.log_len().unwrap() == 2));
    assert!(wait_until(|| second.log_len().unwrap() == 3));
    assert_eq!(controller.snapshot(CameraId(1)).unwrap().score(Side::A), 1);
    assert_eq!(controller.snapshot(CameraId(2)).unwrap().score(Side::B), 1);

    controller.reset().unwrap();
    for snapshot in controller.snapshots().unwrap() {
        assert_eq!(snapshot.score_a, 0, "{}", snapshot.camera_id);
        assert_eq!(snapshot.score_b, 0, "{}", snapshot.camera_id);
        assert_eq!(snapshot.last_contact_side, None);
        assert_eq!(snapshot.last_winner, None);
        assert_eq!(snapshot.epoch, 1);
    }
    assert!(controller.export_rows(CameraId(1)).unwrap().is_empty());
    assert!(controller.export_rows(CameraId(2)).unwrap().is_empty());
    first.verify_log().unwrap();
    second.verify_log().unwrap();

    let report = controller.shutdown().unwrap();
    assert!(report.cameras.iter().all(|camera| camera.rows.is_empty()));
}

#[test]
fn telemetry_reports_samples_and_pending_strike() {
    let id = CameraId(1);
    let mut controller = MatchController::new(config(1)).unwrap();
    start_holding(&mut controller, id, bout());
    let router = controller.router(id).unwrap();
    assert!(wait_until(|| router.log_len().unwrap() == 5));

    let sink = MemorySink::new();
    controller.start_telemetry(Box::new(sink.clone())).unwrap();
    assert!(wait_until(|| {
        let rows = sink.rows();
        rows.iter()
            .any(|row| matches!(row.status, TelemetryStatus::Strike { .. }))
            && rows
                .iter()
                .any(|row| matches!(row.status, TelemetryStatus::Classifying { .. }))
    }));
    controller.stop_telemetry().unwrap();
    assert_eq!(controller.stop_camera(id).unwrap(), WorkerStatus::Stopped);
    // The held closing contact is debounced, so nothing new reached the log.
    assert_eq!(router.log_len().unwrap(), 5);

    let rows = sink.rows();
    let strikes: Vec<_> = rows
        .iter()
        .filter(|row| matches!(row.status, TelemetryStatus::Strike { .. }))
        .collect();
    // Only the latest event survives in the pending slot.
    assert_eq!(strikes.len(), 1);
    assert_eq!(
        strikes[0].status,
        TelemetryStatus::Strike {
            side: Side::A,
            region: BodyRegion::OutOfBounds,
            valid: false,
        }
    );

    let sample_b = rows
        .iter()
        .find(|row| row.status == TelemetryStatus::Classifying { side: Side::B })
        .expect("side B sample");
    assert!((sample_b.confidence_pct - 90.0).abs() < 1e-3);
    assert!(rows.iter().all(|row| row.camera_id == id));

    controller.shutdown().unwrap();
}

#[test]
fn stopped_camera_emits_no_confidence_samples() {
    let id = CameraId(1);
    let mut controller = MatchController::new(config(1)).unwrap();
    start_scripted(&mut controller, id, vec![competitors()]);
    wait_for_stop(&controller, id);
    assert_eq!(controller.stop_camera(id).unwrap(), WorkerStatus::Stopped);

    let sink = MemorySink::new();
    controller.start_telemetry(Box::new(sink.clone())).unwrap();
    std::thread::sleep(Duration::from_millis(200));
    controller.stop_telemetry().unwrap();

    let rows = sink.rows();
    assert!(rows.iter().any(|row| row.status == TelemetryStatus::Idle));
    assert!(!rows
        .iter()
        .any(|row| matches!(row.status, TelemetryStatus::Classifying { .. })));

    controller.shutdown().unwrap();
}
