//! # Read and Position Notifications
//!
//! Synchronous callbacks fired by [`AudioFile`](crate::AudioFile) after reads
//! and seeks. The handle holds its observer weakly: it never keeps the observer
//! alive, and callbacks silently stop once the observer is dropped.

use std::sync::{Arc, Weak};
use tracing::trace;

/// Receives notifications from an audio file handle.
///
/// Both callbacks are optional. They run on the thread that called
/// `read_frames`/`seek`, after the handle's internal lock is released.
pub trait AudioFileObserver: Send + Sync {
    /// Frames were read. `channels` holds one slice of client-format samples
    /// per channel, each `frame_count` long.
    fn on_frames_read(&self, channels: &[Vec<f32>], frame_count: u32, channel_count: u32) {
        let _ = (channels, frame_count, channel_count);
    }

    /// The read cursor moved to `frame`.
    fn on_position_updated(&self, frame: u64) {
        let _ = frame;
    }
}

/// Zero-or-one weak observer registration.
#[derive(Default, Clone)]
pub struct EventNotifier {
    observer: Option<Weak<dyn AudioFileObserver>>,
}

impl EventNotifier {
    /// Create a notifier without an observer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `observer`, replacing any previous one.
    pub fn set_observer(&mut self, observer: &Arc<dyn AudioFileObserver>) {
        self.observer = Some(Arc::downgrade(observer));
    }

    /// Remove the observer.
    pub fn clear_observer(&mut self) {
        self.observer = None;
    }

    /// Returns `true` if an observer is registered and still alive.
    pub fn has_observer(&self) -> bool {
        self.upgrade().is_some()
    }

    /// Deliver a read of `frame_count` frames to the observer, if any.
    pub fn notify_read(&self, channels: &[Vec<f32>], frame_count: u32, channel_count: u32) {
        if let Some(observer) = self.upgrade() {
            trace!("Notifying read of {} frames", frame_count);
            observer.on_frames_read(channels, frame_count, channel_count);
        }
    }

    /// Deliver a cursor move to the observer, if any.
    pub fn notify_position(&self, frame: u64) {
        if let Some(observer) = self.upgrade() {
            trace!("Notifying position {}", frame);
            observer.on_position_updated(frame);
        }
    }

    fn upgrade(&self) -> Option<Arc<dyn AudioFileObserver>> {
        self.observer.as_ref().and_then(Weak::upgrade)
    }
}

impl std::fmt::Debug for EventNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventNotifier")
            .field("has_observer", &self.has_observer())
            .finish()
    }
}
