//! # justplay
//!
//! Single-file audio playback controller.
//!
//! **Purpose:** Decode one audio file and stream it to an output device, with
//! transport controls (play/pause/resume/stop/seek), volume, looping and
//! position/duration queries.
//!
//! **Architecture:** symphonia decoder → real-time renderer → cpal stream,
//! with lock-free state shared between the controller and the device thread.
//!
//! The library logs through `tracing` and never installs a subscriber.

pub mod audio;
pub mod config;
pub mod error;
pub mod playback;
pub mod player;

pub use config::PlaybackConfig;
pub use error::{Error, Result};
pub use playback::PlaybackState;
pub use player::Playback;
