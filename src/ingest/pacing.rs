use std::time::{Duration, Instant};

/// Sleeps between frames to hold a target rate. A rate of 0 disables pacing.
pub(crate) struct FramePacer {
    interval: Option<Duration>,
    last: Option<Instant>,
}

impl FramePacer {
    pub(crate) fn new(target_fps: u32) -> Self {
        let interval = (target_fps > 0).then(|| Duration::from_secs(1) / target_fps);
        Self {
            interval,
            last: None,
        }
    }

    pub(crate) fn wait(&mut self) {
        if let (Some(interval), Some(last)) = (self.interval, self.last) {
            let elapsed = last.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
        self.last = Some(Instant::now());
    }
}
