use anyhow::{anyhow, Result};
use chrono::Local;
use std::sync::mpsc::SyncSender;
use std::sync::{Mutex, MutexGuard};

use crate::detect::FrameDetections;
use crate::region::classify;
use crate::CameraId;

use super::contact::find_contact;
use super::sampler::{sample_confidences, SideConfidences};
use super::state::{CameraArbitrationState, ScoreSnapshot};
use super::{ArbitrationSettings, HitEvent};

/// Capacity of the engine → router queue. A full queue blocks the camera worker.
pub const EVENT_QUEUE_DEPTH: usize = 64;

/// Strike arbitration for one camera.
///
/// All access to the camera's state goes through `state`, locked for the whole
/// decision. The lock has no timeout; critical sections cover one frame's
/// detection list.
pub struct ArbitrationEngine {
    camera_id: CameraId,
    settings: ArbitrationSettings,
    state: Mutex<CameraArbitrationState>,
    outbox: Option<SyncSender<HitEvent>>,
}

impl ArbitrationEngine {
    pub fn new(camera_id: CameraId, settings: ArbitrationSettings) -> Self {
        Self {
            camera_id,
            settings,
            state: Mutex::new(CameraArbitrationState::new()),
            outbox: None,
        }
    }

    /// Forward every emitted event into `outbox`.
    pub fn with_outbox(mut self, outbox: SyncSender<HitEvent>) -> Self {
        self.outbox = Some(outbox);
        self
    }

    pub fn camera_id(&self) -> CameraId {
        self.camera_id
    }

    pub fn settings(&self) -> &ArbitrationSettings {
        &self.settings
    }

    /// Arbitrate one frame.
    ///
    /// Returns the event when a contact was registered (valid or not). The frame is
    /// kept as the latest sample for `sample_confidences`.
    pub fn process(&self, frame: FrameDetections) -> Result<Option<HitEvent>> {
        let event = {
            let mut state = self.lock_state()?;
            let event = self.arbitrate(&mut state, &frame);
            state.cache_frame(frame);
            event
        };

        if let Some(ev) = &event {
            if ev.valid {
                log::info!(
                    "{}: side {} scored ({}) conf={:.1}%",
                    self.camera_id,
                    ev.side,
                    ev.region,
                    ev.confidence_pct
                );
            } else {
                log::info!(
                    "{}: side {} contact disallowed ({}) conf={:.1}%",
                    self.camera_id,
                    ev.side,
                    ev.region,
                    ev.confidence_pct
                );
            }
            self.dispatch(ev.clone());
        }
        Ok(event)
    }

    fn arbitrate(
        &self,
        state: &mut CameraArbitrationState,
        frame: &FrameDetections,
    ) -> Option<HitEvent> {
        let Some(contact) = find_contact(frame, state.last_contact_side(), &self.settings) else {
            state.clear_contact();
            return None;
        };

        let region = classify(&contact.target.bbox, &contact.weapon.bbox);
        let valid = state.record_contact(contact.side, region);
        Some(HitEvent {
            camera_id: self.camera_id,
            side: contact.side,
            region,
            valid,
            confidence_pct: contact.weapon.confidence * 100.0,
            occurred_at: frame.captured_at.unwrap_or_else(Local::now),
            epoch: state.epoch(),
        })
    }

    fn dispatch(&self, event: HitEvent) {
        if let Some(outbox) = &self.outbox {
            if outbox.send(event).is_err() {
                log::warn!("{}: event router disconnected, hit event dropped", self.camera_id);
            }
        }
    }

    /// Best competitor confidence per side in the latest processed frame.
    ///
    /// Read-only: never touches scores or debounce state. `None` until the first
    /// frame has been processed.
    pub fn sample_confidences(&self) -> Result<Option<SideConfidences>> {
        let state = self.lock_state()?;
        Ok(state
            .latest_frame()
            .map(|frame| sample_confidences(frame, self.settings.confidence_threshold)))
    }

    pub fn snapshot(&self) -> Result<ScoreSnapshot> {
        Ok(self.lock_state()?.snapshot(self.camera_id))
    }

    /// Zero scores and clear contact/winner memory. Returns the new epoch.
    pub fn reset(&self) -> Result<u64> {
        let mut state = self.lock_state()?;
        state.reset();
        Ok(state.epoch())
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, CameraArbitrationState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("{}: arbitration state lock poisoned", self.camera_id))
    }
}
