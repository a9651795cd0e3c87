mod backend;
pub mod backends;
mod result;

pub use backend::DetectorBackend;
pub use backends::{open_backend, ReplayBackend, StubBackend};
pub use result::{Detection, DetectionClass, FrameDetections, Partitioned, RawDetection};
