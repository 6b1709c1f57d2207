//! Core audio data types
//!
//! Stream descriptions shared by the decoder and device adapters, and the
//! mapping from the user-facing volume parameter to signal gain.

use serde::{Deserialize, Serialize};

/// Lowest gain of the decibel volume curve (volume = 0.0)
pub const MIN_GAIN_DB: f32 = -48.0;

/// Fixed properties of an opened audio file.
///
/// Immutable until the next load.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamInfo {
    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Number of interleaved channels per frame
    pub channels: u16,

    /// Total number of frames in the file
    pub total_frames: u64,
}

impl StreamInfo {
    /// Duration of the file in seconds
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.total_frames as f64 / self.sample_rate as f64
    }

    /// Convert a frame offset to seconds
    pub fn frames_to_seconds(&self, frames: u64) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        frames as f64 / self.sample_rate as f64
    }

    /// Convert a position in seconds to a frame offset.
    ///
    /// The position is clamped to `[0, duration]` and floored to a whole frame.
    pub fn seconds_to_frame(&self, seconds: f64) -> u64 {
        let clamped = if seconds.is_nan() {
            0.0
        } else {
            seconds.clamp(0.0, self.duration_seconds())
        };
        let frame = (clamped * self.sample_rate as f64).floor() as u64;
        frame.min(self.total_frames)
    }

    /// Output stream parameters matching this file
    pub fn stream_spec(&self) -> StreamSpec {
        StreamSpec {
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }
}

/// Parameters an output stream is opened with.
///
/// Samples are always delivered to the device adapter as interleaved `i16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSpec {
    pub sample_rate: u32,
    pub channels: u16,
}

/// How the volume parameter in `[0, 1]` maps to a linear signal gain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeCurve {
    /// gain = volume
    #[default]
    Linear,
    /// gain_db = -48 + 48 * volume, gain = 10^(gain_db / 20)
    Decibel,
}

impl VolumeCurve {
    /// Linear gain for a volume parameter.
    ///
    /// The volume is clamped to `[0, 1]` first.
    pub fn gain(self, volume: f32) -> f32 {
        let volume = clamp_volume(volume);
        match self {
            VolumeCurve::Linear => volume,
            VolumeCurve::Decibel => {
                let gain_db = MIN_GAIN_DB + (-MIN_GAIN_DB) * volume;
                10f32.powf(gain_db / 20.0)
            }
        }
    }
}

/// Clamp a volume parameter to `[0, 1]`. NaN maps to silence.
pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        return 0.0;
    }
    volume.clamp(0.0, 1.0)
}

/// Apply a linear gain to interleaved `i16` samples in place.
///
/// Saturates at the `i16` range instead of wrapping.
pub fn apply_gain(samples: &mut [i16], gain: f32) {
    if gain == 1.0 {
        return;
    }
    for sample in samples.iter_mut() {
        // `as` saturates float to int conversions
        *sample = (*sample as f32 * gain).round() as i16;
    }
}
