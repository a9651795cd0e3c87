use anyhow::Result;

use crate::detect::result::RawDetection;
use crate::ingest::Frame;

/// Detector backend trait.
///
/// The backend is the inference half of the detection adapter: it receives an
/// acquired frame and returns the raw records the model produced, in model order.
/// It is treated as an opaque oracle; the arbiter only validates and consumes
/// what comes out.
///
/// Errors returned from `detect` are per-frame failures. The camera worker logs
/// them and moves on to the next frame.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
