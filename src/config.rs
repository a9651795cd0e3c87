use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::arbiter::{ArbitrationSettings, SearchOrder};
use crate::detect::backends::BACKEND_NAMES;
use crate::{CameraId, Side};

const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 1000;
const DEFAULT_FLUSH_INTERVAL_MS: u64 = 1500;
const DEFAULT_STOP_GRACE_MS: u64 = 500;
const DEFAULT_TARGET_FPS: u32 = 10;
const DEFAULT_SIDE_A: &str = "Blue";
const DEFAULT_SIDE_B: &str = "Red";
const DEFAULT_CAMERA_SOURCES: [&str; 3] = ["stub://camera-1", "stub://camera-2", "stub://camera-3"];

#[derive(Debug, Deserialize, Default)]
struct ArbiterConfigFile {
    arbitration: Option<ArbitrationConfigFile>,
    timers: Option<TimersConfigFile>,
    sides: Option<SidesConfigFile>,
    cameras: Option<Vec<CameraConfigFile>>,
}

#[derive(Debug, Deserialize, Default)]
struct ArbitrationConfigFile {
    confidence_threshold: Option<f32>,
    min_overlap: Option<f32>,
    search_order: Option<SearchOrder>,
}

#[derive(Debug, Deserialize, Default)]
struct TimersConfigFile {
    sample_interval_ms: Option<u64>,
    flush_interval_ms: Option<u64>,
    stop_grace_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct SidesConfigFile {
    a: Option<String>,
    b: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CameraConfigFile {
    id: Option<u32>,
    source: String,
    backend: Option<String>,
    target_fps: Option<u32>,
    arbitration: Option<bool>,
}

/// Runtime configuration for the arbiter daemon.
#[derive(Debug, Clone)]
pub struct ArbiterConfig {
    pub arbitration: ArbitrationSettings,
    pub timers: TimerSettings,
    pub sides: SideLabels,
    pub cameras: Vec<CameraSettings>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSettings {
    pub sample_interval: Duration,
    pub flush_interval: Duration,
    /// How long `stop` waits for a worker before detaching it.
    pub stop_grace: Duration,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_millis(DEFAULT_SAMPLE_INTERVAL_MS),
            flush_interval: Duration::from_millis(DEFAULT_FLUSH_INTERVAL_MS),
            stop_grace: Duration::from_millis(DEFAULT_STOP_GRACE_MS),
        }
    }
}

/// Display labels for the two sides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideLabels {
    pub a: String,
    pub b: String,
}

impl SideLabels {
    pub fn label(&self, side: Side) -> &str {
        match side {
            Side::A => &self.a,
            Side::B => &self.b,
        }
    }
}

impl Default for SideLabels {
    fn default() -> Self {
        Self {
            a: DEFAULT_SIDE_A.to_string(),
            b: DEFAULT_SIDE_B.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraSettings {
    pub id: CameraId,
    /// `stub://<name>` or a local JSON-lines recording.
    pub source: String,
    pub backend: String,
    pub target_fps: u32,
    /// Whether arbitration starts enabled for this camera.
    pub arbitration: bool,
}

impl CameraSettings {
    /// Camera with the backend implied by its source.
    pub fn new(id: CameraId, source: &str) -> Self {
        Self {
            id,
            source: source.to_string(),
            backend: default_backend_for(source).to_string(),
            target_fps: DEFAULT_TARGET_FPS,
            arbitration: true,
        }
    }
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            arbitration: ArbitrationSettings::default(),
            timers: TimerSettings::default(),
            sides: SideLabels::default(),
            cameras: cameras_from_sources(&DEFAULT_CAMERA_SOURCES),
        }
    }
}

impl ArbiterConfig {
    /// Load from the file named by `ARBITER_CONFIG` (if any), then apply env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("ARBITER_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ArbiterConfigFile) -> Result<Self> {
        let defaults = ArbitrationSettings::default();
        let arbitration = ArbitrationSettings {
            confidence_threshold: file
                .arbitration
                .as_ref()
                .and_then(|a| a.confidence_threshold)
                .unwrap_or(defaults.confidence_threshold),
            min_overlap: file
                .arbitration
                .as_ref()
                .and_then(|a| a.min_overlap)
                .unwrap_or(defaults.min_overlap),
            search_order: file
                .arbitration
                .as_ref()
                .and_then(|a| a.search_order)
                .unwrap_or(defaults.search_order),
        };
        let timers = TimerSettings {
            sample_interval: Duration::from_millis(
                file.timers
                    .as_ref()
                    .and_then(|t| t.sample_interval_ms)
                    .unwrap_or(DEFAULT_SAMPLE_INTERVAL_MS),
            ),
            flush_interval: Duration::from_millis(
                file.timers
                    .as_ref()
                    .and_then(|t| t.flush_interval_ms)
                    .unwrap_or(DEFAULT_FLUSH_INTERVAL_MS),
            ),
            stop_grace: Duration::from_millis(
                file.timers
                    .as_ref()
                    .and_then(|t| t.stop_grace_ms)
                    .unwrap_or(DEFAULT_STOP_GRACE_MS),
            ),
        };
        let sides = SideLabels {
            a: file
                .sides
                .as_ref()
                .and_then(|s| s.a.clone())
                .unwrap_or_else(|| DEFAULT_SIDE_A.to_string()),
            b: file
                .sides
                .and_then(|s| s.b)
                .unwrap_or_else(|| DEFAULT_SIDE_B.to_string()),
        };
        let cameras = match file.cameras {
            Some(cameras) => cameras
                .into_iter()
                .enumerate()
                .map(|(idx, cam)| {
                    let id = match cam.id {
                        Some(id) => id,
                        None => u32::try_from(idx + 1)
                            .map_err(|_| anyhow!("too many cameras configured"))?,
                    };
                    let backend = cam
                        .backend
                        .unwrap_or_else(|| default_backend_for(&cam.source).to_string());
                    Ok(CameraSettings {
                        id: CameraId(id),
                        source: cam.source,
                        backend,
                        target_fps: cam.target_fps.unwrap_or(DEFAULT_TARGET_FPS),
                        arbitration: cam.arbitration.unwrap_or(true),
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            None => cameras_from_sources(&DEFAULT_CAMERA_SOURCES),
        };
        Ok(Self {
            arbitration,
            timers,
            sides,
            cameras,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(threshold) = std::env::var("ARBITER_CONFIDENCE_THRESHOLD") {
            self.arbitration.confidence_threshold = threshold
                .trim()
                .parse()
                .map_err(|_| anyhow!("ARBITER_CONFIDENCE_THRESHOLD must be a number"))?;
        }
        if let Ok(overlap) = std::env::var("ARBITER_MIN_OVERLAP") {
            self.arbitration.min_overlap = overlap
                .trim()
                .parse()
                .map_err(|_| anyhow!("ARBITER_MIN_OVERLAP must be a number"))?;
        }
        if let Ok(order) = std::env::var("ARBITER_SEARCH_ORDER") {
            if !order.trim().is_empty() {
                self.arbitration.search_order = order.parse()?;
            }
        }
        if let Ok(ms) = std::env::var("ARBITER_SAMPLE_INTERVAL_MS") {
            self.timers.sample_interval = Duration::from_millis(parse_millis(
                "ARBITER_SAMPLE_INTERVAL_MS",
                &ms,
            )?);
        }
        if let Ok(ms) = std::env::var("ARBITER_FLUSH_INTERVAL_MS") {
            self.timers.flush_interval = Duration::from_millis(parse_millis(
                "ARBITER_FLUSH_INTERVAL_MS",
                &ms,
            )?);
        }
        if let Ok(cameras) = std::env::var("ARBITER_CAMERAS") {
            let sources = split_csv(&cameras);
            if !sources.is_empty() {
                let sources: Vec<&str> = sources.iter().map(String::as_str).collect();
                self.cameras = cameras_from_sources(&sources);
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        let threshold = self.arbitration.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(anyhow!(
                "confidence_threshold must be within 0..=1 (got {})",
                threshold
            ));
        }
        let min_overlap = self.arbitration.min_overlap;
        if !(0.0..1.0).contains(&min_overlap) {
            return Err(anyhow!(
                "min_overlap must be within 0..1 (got {})",
                min_overlap
            ));
        }
        if self.timers.sample_interval.is_zero() {
            return Err(anyhow!("sample interval must be greater than zero"));
        }
        if self.timers.flush_interval.is_zero() {
            return Err(anyhow!("flush interval must be greater than zero"));
        }

        self.sides.a = self.sides.a.trim().to_string();
        self.sides.b = self.sides.b.trim().to_string();
        if self.sides.a.is_empty() || self.sides.b.is_empty() {
            return Err(anyhow!("side labels must not be empty"));
        }

        if self.cameras.is_empty() {
            return Err(anyhow!("at least one camera must be configured"));
        }
        let mut seen = HashSet::new();
        for camera in &mut self.cameras {
            if !seen.insert(camera.id) {
                return Err(anyhow!("duplicate {} in configuration", camera.id));
            }
            if camera.source.trim().is_empty() {
                return Err(anyhow!("{} has an empty source", camera.id));
            }
            camera.backend = camera.backend.trim().to_ascii_lowercase();
            if !BACKEND_NAMES.contains(&camera.backend.as_str()) {
                return Err(anyhow!(
                    "{} uses unknown backend '{}'",
                    camera.id,
                    camera.backend
                ));
            }
        }
        Ok(())
    }

    pub fn camera(&self, id: CameraId) -> Option<&CameraSettings> {
        self.cameras.iter().find(|camera| camera.id == id)
    }
}

fn read_config_file(path: &Path) -> Result<ArbiterConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn default_backend_for(source: &str) -> &'static str {
    if source.starts_with("stub://") {
        "stub"
    } else {
        "replay"
    }
}

fn cameras_from_sources(sources: &[&str]) -> Vec<CameraSettings> {
    sources
        .iter()
        .zip(1u32..)
        .map(|(source, id)| CameraSettings::new(CameraId(id), source))
        .collect()
}

fn parse_millis(name: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| anyhow!("{} must be an integer number of milliseconds", name))
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
