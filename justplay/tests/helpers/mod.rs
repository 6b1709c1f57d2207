//! Test helpers for justplay integration tests
//!
//! - `audio_generator`: ramp WAV files with known sample values
//! - `manual_host`: output host clocked by the test instead of hardware
//! - `faulty_decoder`: in-memory decoder whose seeks and reads can fail

#![allow(dead_code)]

pub mod audio_generator;
pub mod faulty_decoder;
pub mod manual_host;

pub use audio_generator::{generate_ramp_wav, ramp_value, write_garbage_file};
pub use faulty_decoder::{DecoderFaults, FaultyBackend};
pub use manual_host::ManualHost;

use justplay::audio::SymphoniaBackend;
use justplay::playback::EngineSettings;
use justplay::Playback;

/// Player over a [`ManualHost`] and the symphonia decoder
pub type TestPlayer = Playback<ManualHost, SymphoniaBackend>;

/// Player plus a handle on its host
pub fn test_player(settings: EngineSettings) -> (TestPlayer, ManualHost) {
    let host = ManualHost::new();
    let player = Playback::with_backends(host.clone(), SymphoniaBackend, settings)
        .expect("manual host has a device");
    (player, host)
}
