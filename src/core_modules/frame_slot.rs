// THEORY:
// The `FrameSlot` is the hand-off point between the camera's own thread (which
// produces frames at its own pace and must never wait on us) and the vision loop
// (which only ever cares about the newest frame). It holds at most one frame.
//
// - Writers overwrite whatever is there and use `try_lock`: if a reader happens to
//   hold the lock at that instant, the new frame is simply dropped. Losing a frame
//   is fine; stalling the capture thread is not.
// - Readers take a cheap `Arc` clone and release the lock immediately, so the
//   critical section is a pointer copy on both sides.

use std::sync::{Arc, Mutex, TryLockError};

/// A decoded RGB video frame.
pub type Frame = image::RgbImage;

/// Single-slot, overwrite-on-write, lossy frame cell.
#[derive(Debug, Clone, Default)]
pub struct FrameSlot {
    inner: Arc<Mutex<Option<Arc<Frame>>>>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the stored frame. Returns `false` when the write was dropped
    /// because a reader held the slot.
    pub fn publish(&self, frame: Frame) -> bool {
        match self.inner.try_lock() {
            Ok(mut slot) => {
                *slot = Some(Arc::new(frame));
                true
            }
            Err(TryLockError::Poisoned(poisoned)) => {
                *poisoned.into_inner() = Some(Arc::new(frame));
                true
            }
            Err(TryLockError::WouldBlock) => false,
        }
    }

    /// The most recent frame, if any.
    pub fn latest(&self) -> Option<Arc<Frame>> {
        match self.inner.lock() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Empties the slot so a stale frame is not served after a restart.
    pub fn clear(&self) {
        match self.inner.lock() {
            Ok(mut slot) => *slot = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }
}
