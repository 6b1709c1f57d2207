//! Audio test file generation
//!
//! Deterministic 16-bit WAV files with known sample values, so tests can tell
//! exactly which frame the player produced.

use hound::{WavSpec, WavWriter};
use std::path::Path;

/// Ramp values wrap at this value to stay within `i16`
pub const RAMP_PERIOD: u64 = 30_000;

/// Sample value of frame `frame` in a ramp file (left channel)
pub fn ramp_value(frame: u64) -> i16 {
    (frame % RAMP_PERIOD) as i16
}

/// Generate a ramp WAV file.
///
/// Frame `n` holds `n % RAMP_PERIOD` on the first channel and its negation on
/// any other channel.
///
/// # Example
/// ```no_run
/// # use std::path::Path;
/// // One second of mono audio at 44.1 kHz
/// generate_ramp_wav(Path::new("/tmp/ramp.wav"), 44100, 1, 44100)?;
/// # Ok::<(), hound::Error>(())
/// ```
pub fn generate_ramp_wav<P: AsRef<Path>>(
    path: P,
    sample_rate: u32,
    channels: u16,
    frames: u64,
) -> Result<(), hound::Error> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;

    for frame in 0..frames {
        let value = ramp_value(frame);
        writer.write_sample(value)?;
        for _ in 1..channels {
            writer.write_sample(-value)?;
        }
    }

    writer.finalize()?;
    Ok(())
}

/// Write plain text that no format reader recognizes
pub fn write_garbage_file<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    std::fs::write(path, "this is not an audio file\n".repeat(200))
}
