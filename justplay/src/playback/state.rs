//! Shared playback state
//!
//! Lock-free state shared between controller calls and the audio callback.
//! Every field is an independent atomic; the callback tolerates reading a
//! slightly stale combination (e.g. old gain with a new offset), so no
//! multi-field transaction is needed and the callback never waits on a lock.

use crate::error::StreamFault;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};

/// Transport state of a playback engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// No file loaded
    Idle,
    /// File loaded, stream stopped
    Ready,
    /// Stream producing audio
    Playing,
    /// Stream explicitly paused
    Paused,
    /// Reached end of stream without looping; stream still open
    Ended,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Ready => "ready",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Ended => "ended",
        };
        f.write_str(text)
    }
}

/// State shared with the real-time callback.
///
/// Writes from the controller use `Release` and reads on the callback use
/// `Acquire`, so a value stored before a controller call returns is visible
/// at the next callback invocation.
#[derive(Debug)]
pub struct SharedState {
    /// Decode cursor in frames since file start
    frame_offset: AtomicU64,
    /// Set by the controller when `frame_offset` was moved explicitly
    frame_offset_modified: AtomicBool,
    /// Linear gain as `f32` bits
    gain: AtomicU32,
    loop_at_end: AtomicBool,
    /// Stream is producing audio (not paused, not ended)
    active: AtomicBool,
    ended_naturally: AtomicBool,
    /// Last fault recorded by the audio thread (0 = none)
    fault_code: AtomicU8,
    /// Faults recorded since last taken
    fault_count: AtomicU32,
}

impl SharedState {
    pub fn new(gain: f32, loop_at_end: bool) -> Self {
        Self {
            frame_offset: AtomicU64::new(0),
            frame_offset_modified: AtomicBool::new(false),
            gain: AtomicU32::new(gain.to_bits()),
            loop_at_end: AtomicBool::new(loop_at_end),
            active: AtomicBool::new(false),
            ended_naturally: AtomicBool::new(false),
            fault_code: AtomicU8::new(0),
            fault_count: AtomicU32::new(0),
        }
    }

    // ---- decode cursor ----

    pub fn frame_offset(&self) -> u64 {
        self.frame_offset.load(Ordering::Acquire)
    }

    /// Move the cursor and ask the callback to resync the decoder to it.
    pub fn request_seek(&self, frame: u64) {
        self.frame_offset.store(frame, Ordering::Release);
        self.frame_offset_modified.store(true, Ordering::Release);
    }

    /// Take a pending seek request (callback side).
    pub fn take_seek_request(&self) -> Option<u64> {
        if self.frame_offset_modified.swap(false, Ordering::AcqRel) {
            Some(self.frame_offset.load(Ordering::Acquire))
        } else {
            None
        }
    }

    /// Re-arm the pending seek after the decoder failed to reach it (callback
    /// side). A newer request from the controller keeps its own target.
    pub fn retry_seek(&self) {
        self.frame_offset_modified.store(true, Ordering::Release);
    }

    /// Publish the cursor reached by a callback invocation.
    ///
    /// Skipped when the controller moved the cursor since the callback read
    /// `started_at`, so an explicit seek is never overwritten.
    pub fn commit_frame_offset(&self, started_at: u64, reached: u64) {
        if self.frame_offset_modified.load(Ordering::Acquire) {
            return;
        }
        let _ = self.frame_offset.compare_exchange(
            started_at,
            reached,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    // ---- gain / looping ----

    pub fn gain(&self) -> f32 {
        f32::from_bits(self.gain.load(Ordering::Acquire))
    }

    pub fn set_gain(&self, gain: f32) {
        self.gain.store(gain.to_bits(), Ordering::Release);
    }

    pub fn loops_at_end(&self) -> bool {
        self.loop_at_end.load(Ordering::Acquire)
    }

    pub fn set_loop_at_end(&self, loop_at_end: bool) {
        self.loop_at_end.store(loop_at_end, Ordering::Release);
    }

    // ---- activity ----

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    pub fn has_ended(&self) -> bool {
        self.ended_naturally.load(Ordering::Acquire)
    }

    /// Natural end of stream (callback side)
    pub fn mark_ended(&self) {
        self.ended_naturally.store(true, Ordering::Release);
        self.active.store(false, Ordering::Release);
    }

    pub fn clear_ended(&self) {
        self.ended_naturally.store(false, Ordering::Release);
    }

    /// Reset cursor and flags for a freshly loaded file. Gain and looping
    /// persist across loads.
    pub fn reset_for_load(&self) {
        self.frame_offset.store(0, Ordering::Release);
        self.frame_offset_modified.store(false, Ordering::Release);
        self.active.store(false, Ordering::Release);
        self.ended_naturally.store(false, Ordering::Release);
        self.clear_faults();
    }

    // ---- faults ----

    /// Record a fault. Real-time safe: atomics only.
    pub fn record_fault(&self, fault: StreamFault) {
        self.fault_code.store(fault as u8, Ordering::Release);
        self.fault_count.fetch_add(1, Ordering::AcqRel);
    }

    /// Take the most recent fault and the number recorded since last taken.
    pub fn take_fault(&self) -> Option<(StreamFault, u32)> {
        let code = self.fault_code.swap(0, Ordering::AcqRel);
        let count = self.fault_count.swap(0, Ordering::AcqRel);
        StreamFault::from_code(code).map(|fault| (fault, count.max(1)))
    }

    pub fn clear_faults(&self) {
        self.fault_code.store(0, Ordering::Release);
        self.fault_count.store(0, Ordering::Release);
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new(1.0, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seek_request_taken_once() {
        let state = SharedState::default();
        state.request_seek(1234);
        assert_eq!(state.take_seek_request(), Some(1234));
        assert_eq!(state.take_seek_request(), None);
        assert_eq!(state.frame_offset(), 1234);
    }

    #[test]
    fn test_commit_skipped_after_controller_seek() {
        let state = SharedState::default();
        state.request_seek(100);
        state.take_seek_request();

        // Controller seeks while the callback is rendering from 100
        state.request_seek(5000);
        state.commit_frame_offset(100, 612);
        assert_eq!(state.frame_offset(), 5000);
    }

    #[test]
    fn test_commit_advances_cursor() {
        let state = SharedState::default();
        state.commit_frame_offset(0, 512);
        state.commit_frame_offset(512, 1024);
        assert_eq!(state.frame_offset(), 1024);
    }

    #[test]
    fn test_gain_roundtrips_through_bits() {
        let state = SharedState::new(0.25, true);
        assert_eq!(state.gain(), 0.25);
        state.set_gain(0.063_095_73);
        assert_eq!(state.gain(), 0.063_095_73);
        assert!(state.loops_at_end());
    }

    #[test]
    fn test_mark_ended_clears_active() {
        let state = SharedState::default();
        state.set_active(true);
        state.mark_ended();
        assert!(state.has_ended());
        assert!(!state.is_active());
    }

    #[test]
    fn test_take_fault_reports_count() {
        let state = SharedState::default();
        assert_eq!(state.take_fault(), None);

        state.record_fault(StreamFault::Decode);
        state.record_fault(StreamFault::Device);
        assert_eq!(state.take_fault(), Some((StreamFault::Device, 2)));
        assert_eq!(state.take_fault(), None);
    }

    #[test]
    fn test_reset_for_load_keeps_gain_and_loop() {
        let state = SharedState::new(0.5, true);
        state.request_seek(42);
        state.mark_ended();
        state.record_fault(StreamFault::Seek);

        state.reset_for_load();

        assert_eq!(state.frame_offset(), 0);
        assert_eq!(state.take_seek_request(), None);
        assert!(!state.has_ended());
        assert_eq!(state.take_fault(), None);
        assert_eq!(state.gain(), 0.5);
        assert!(state.loops_at_end());
    }

    #[test]
    fn test_retry_seek_keeps_newer_target() {
        let state = SharedState::default();
        state.request_seek(300);
        assert_eq!(state.take_seek_request(), Some(300));

        state.retry_seek();
        assert_eq!(state.take_seek_request(), Some(300));

        state.request_seek(900);
        state.retry_seek();
        assert_eq!(state.take_seek_request(), Some(900));
        assert_eq!(state.take_seek_request(), None);
    }
}
