use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use strike_arbiter::config::ArbiterConfig;
use strike_arbiter::{CameraId, SearchOrder, Side};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "ARBITER_CONFIG",
        "ARBITER_CONFIDENCE_THRESHOLD",
        "ARBITER_MIN_OVERLAP",
        "ARBITER_SEARCH_ORDER",
        "ARBITER_SAMPLE_INTERVAL_MS",
        "ARBITER_FLUSH_INTERVAL_MS",
        "ARBITER_CAMERAS",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_defaults_without_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = ArbiterConfig::load().expect("load defaults");
    assert_eq!(cfg.cameras.len(), 3);
    assert_eq!(cfg.arbitration.confidence_threshold, 0.6);
    assert_eq!(cfg.arbitration.min_overlap, 0.0);
    assert_eq!(cfg.arbitration.search_order, SearchOrder::Detection);
    assert_eq!(cfg.timers.stop_grace, Duration::from_millis(500));
}

#[test]
fn loads_json_config_with_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "arbitration": {
            "confidence_threshold": 0.5,
            "min_overlap": 0.05,
            "search_order": "confidence"
        },
        "timers": {
            "sample_interval_ms": 250,
            "flush_interval_ms": 400,
            "stop_grace_ms": 100
        },
        "sides": { "a": "Aoi", "b": "Aka" },
        "cameras": [
            { "id": 7, "source": "stub://ring-side", "target_fps": 25 },
            { "id": 9, "source": "/var/lib/arbiter/bout.jsonl", "arbitration": false }
        ]
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("ARBITER_CONFIG", file.path());
    std::env::set_var("ARBITER_CONFIDENCE_THRESHOLD", "0.75");
    std::env::set_var("ARBITER_FLUSH_INTERVAL_MS", "900");

    let cfg = ArbiterConfig::load().expect("load config");

    assert_eq!(cfg.arbitration.confidence_threshold, 0.75);
    assert_eq!(cfg.arbitration.min_overlap, 0.05);
    assert_eq!(cfg.arbitration.search_order, SearchOrder::Confidence);
    assert_eq!(cfg.timers.sample_interval, Duration::from_millis(250));
    assert_eq!(cfg.timers.flush_interval, Duration::from_millis(900));
    assert_eq!(cfg.timers.stop_grace, Duration::from_millis(100));
    assert_eq!(cfg.sides.label(Side::A), "Aoi");
    assert_eq!(cfg.sides.label(Side::B), "Aka");

    let ring = cfg.camera(CameraId(7)).expect("camera 7");
    assert_eq!(ring.backend, "stub");
    assert_eq!(ring.target_fps, 25);
    assert!(ring.arbitration);
    let replay = cfg.camera(CameraId(9)).expect("camera 9");
    assert_eq!(replay.backend, "replay");
    assert!(!replay.arbitration);

    clear_env();
}

#[test]
fn loads_toml_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
[arbitration]
confidence_threshold = 0.65
search_order = "detection"

[sides]
a = "Hong"
b = "Chung"

[[cameras]]
source = "stub://mat-a"

[[cameras]]
source = "stub://mat-b"
backend = "stub"
"#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");

    let cfg = ArbiterConfig::load_from(Some(file.path())).expect("load toml");
    assert_eq!(cfg.arbitration.confidence_threshold, 0.65);
    assert_eq!(cfg.sides.a, "Hong");
    assert_eq!(
        cfg.cameras.iter().map(|c| c.id).collect::<Vec<_>>(),
        vec![CameraId(1), CameraId(2)]
    );
}

#[test]
fn camera_list_can_come_from_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("ARBITER_CAMERAS", "stub://one, /data/two.jsonl");
    let cfg = ArbiterConfig::load().expect("load config");
    assert_eq!(cfg.cameras.len(), 2);
    assert_eq!(cfg.cameras[1].id, CameraId(2));
    assert_eq!(cfg.cameras[1].source, "/data/two.jsonl");
    assert_eq!(cfg.cameras[1].backend, "replay");

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("ARBITER_CONFIDENCE_THRESHOLD", "1.5");
    let err = ArbiterConfig::load().expect_err("threshold above 1");
    assert!(err.to_string().contains("confidence_threshold"));
    clear_env();

    std::env::set_var("ARBITER_SEARCH_ORDER", "random");
    assert!(ArbiterConfig::load().is_err());
    clear_env();

    std::env::set_var("ARBITER_SAMPLE_INTERVAL_MS", "0");
    assert!(ArbiterConfig::load().is_err());
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(
        &mut file,
        br#"{"cameras": [{"id": 1, "source": "stub://a"}, {"id": 1, "source": "stub://b"}]}"#,
    )
    .expect("write config");
    std::env::set_var("ARBITER_CONFIG", file.path());
    let err = ArbiterConfig::load().expect_err("duplicate ids");
    assert!(err.to_string().contains("duplicate"));

    clear_env();
}
