pub mod replay;
pub mod stub;

use anyhow::{anyhow, Result};

use super::backend::DetectorBackend;

pub use replay::ReplayBackend;
pub use stub::StubBackend;

/// Names accepted by `open_backend`.
pub const BACKEND_NAMES: &[&str] = &["stub", "replay"];

/// Construct a backend by its configured name.
pub fn open_backend(name: &str) -> Result<Box<dyn DetectorBackend>> {
    match name.trim().to_ascii_lowercase().as_str() {
        "stub" => Ok(Box::new(StubBackend::new())),
        "replay" => Ok(Box::new(ReplayBackend::new())),
        other => Err(anyhow!(
            "unknown detector backend '{}' (expected one of: {})",
            other,
            BACKEND_NAMES.join(", ")
        )),
    }
}
