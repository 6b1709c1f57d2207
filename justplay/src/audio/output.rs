//! Audio output using cpal
//!
//! Device Adapter: enumerates output devices and opens a stream bound to the
//! decoder's sample rate and channel count. The stream pulls interleaved
//! `i16` samples from an [`AudioCallback`] on the device's own thread.
//!
//! Closing a stream is dropping it. cpal guarantees the data callback is not
//! running once the stream has been dropped.

use crate::audio::types::StreamSpec;
use crate::error::DeviceError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use tracing::{debug, error, info, warn};

/// Period assumed for sizing the conversion buffer when the device default
/// buffer size is used
const DEFAULT_PERIOD_FRAMES: usize = 2048;

/// Sample formats in order of preference
const PREFERRED_FORMATS: [SampleFormat; 3] = [SampleFormat::I16, SampleFormat::F32, SampleFormat::U16];

/// Real-time producer of interleaved samples.
///
/// Invoked on the device thread. Implementations must not block.
pub trait AudioCallback: Send + 'static {
    /// Fill `out` completely. `out.len()` is a multiple of the channel count.
    fn render(&mut self, out: &mut [i16]);
}

/// An open output stream. Dropping it closes the stream.
pub trait OutputStream {
    fn start(&mut self) -> Result<(), DeviceError>;
    fn stop(&mut self) -> Result<(), DeviceError>;
}

/// Output device host. One binding is selected per build.
pub trait AudioHost {
    type Stream: OutputStream;

    /// Number of output devices currently available
    fn output_device_count(&self) -> Result<usize, DeviceError>;

    /// Open a stopped stream that renders through `callback`.
    ///
    /// `on_error` receives asynchronous stream errors from the device thread.
    fn open_stream<C, E>(
        &self,
        spec: StreamSpec,
        callback: C,
        on_error: E,
    ) -> Result<Self::Stream, DeviceError>
    where
        C: AudioCallback,
        E: FnMut(DeviceError) + Send + 'static;
}

/// cpal-backed host.
pub struct CpalHost {
    host: cpal::Host,
    /// Device name requested (None = default)
    device_name: Option<String>,
    /// Fixed period in frames (None = device default)
    buffer_frames: Option<u32>,
}

impl CpalHost {
    /// Host for the platform default backend.
    pub fn new(device_name: Option<String>, buffer_frames: Option<u32>) -> Self {
        Self {
            host: cpal::default_host(),
            device_name,
            buffer_frames,
        }
    }

    /// List available audio output device names.
    pub fn list_devices() -> Result<Vec<String>, DeviceError> {
        let host = cpal::default_host();

        let devices: Vec<String> = host
            .output_devices()?
            .filter_map(|device| device.name().ok())
            .collect();

        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }

    /// Find the requested device, falling back to the default device.
    fn select_device(&self) -> Result<Device, DeviceError> {
        if let Some(name) = self.device_name.as_ref() {
            let mut devices = self.host.output_devices()?;

            match devices.find(|d| d.name().ok().as_ref() == Some(name)) {
                Some(device) => {
                    debug!("Found requested audio device: {}", name);
                    return Ok(device);
                }
                None => {
                    warn!("Requested device '{}' not found, falling back to default device", name);
                }
            }
        }

        let device = self.host.default_output_device().ok_or(DeviceError::NoDevice)?;
        debug!(
            "Using default audio device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );
        Ok(device)
    }

    /// Pick the most preferred sample format the device supports for `spec`.
    fn negotiate_format(device: &Device, spec: StreamSpec) -> Result<SampleFormat, DeviceError> {
        let supported: Vec<SampleFormat> = device
            .supported_output_configs()?
            .filter(|config| {
                config.channels() == spec.channels
                    && config.min_sample_rate().0 <= spec.sample_rate
                    && config.max_sample_rate().0 >= spec.sample_rate
            })
            .map(|config| config.sample_format())
            .collect();

        PREFERRED_FORMATS
            .iter()
            .copied()
            .find(|format| supported.contains(format))
            .ok_or_else(|| {
                DeviceError::UnsupportedConfig(format!(
                    "no supported sample format for {} Hz, {} channel(s)",
                    spec.sample_rate, spec.channels
                ))
            })
    }

    fn build_stream<T, C, E>(
        device: &Device,
        config: &StreamConfig,
        mut callback: C,
        mut on_error: E,
        period_frames: usize,
    ) -> Result<Stream, DeviceError>
    where
        T: SizedSample + FromSample<i16>,
        C: AudioCallback,
        E: FnMut(DeviceError) + Send + 'static,
    {
        let mut scratch = vec![0i16; period_frames * config.channels as usize];

        let stream = device.build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                if scratch.len() < data.len() {
                    // Device asked for a larger period than negotiated
                    scratch.resize(data.len(), 0);
                }
                let samples = &mut scratch[..data.len()];
                callback.render(samples);

                for (out, &sample) in data.iter_mut().zip(samples.iter()) {
                    *out = T::from_sample(sample);
                }
            },
            move |err| {
                error!("Audio stream error: {} - marking stream faulted", err);
                on_error(DeviceError::from(err));
            },
            None,
        )?;

        Ok(stream)
    }
}

impl Default for CpalHost {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl AudioHost for CpalHost {
    type Stream = CpalStream;

    fn output_device_count(&self) -> Result<usize, DeviceError> {
        Ok(self.host.output_devices()?.count())
    }

    fn open_stream<C, E>(
        &self,
        spec: StreamSpec,
        callback: C,
        on_error: E,
    ) -> Result<CpalStream, DeviceError>
    where
        C: AudioCallback,
        E: FnMut(DeviceError) + Send + 'static,
    {
        let device = self.select_device()?;
        let sample_format = Self::negotiate_format(&device, spec)?;

        let config = StreamConfig {
            channels: spec.channels,
            sample_rate: cpal::SampleRate(spec.sample_rate),
            buffer_size: match self.buffer_frames {
                Some(frames) => cpal::BufferSize::Fixed(frames),
                None => cpal::BufferSize::Default,
            },
        };
        let period_frames = self
            .buffer_frames
            .map(|frames| frames as usize)
            .unwrap_or(DEFAULT_PERIOD_FRAMES);

        debug!(
            "Opening stream: sample_rate={}, channels={}, format={:?}, buffer_size={:?}",
            spec.sample_rate, spec.channels, sample_format, config.buffer_size
        );

        let stream = match sample_format {
            SampleFormat::I16 => {
                Self::build_stream::<i16, _, _>(&device, &config, callback, on_error, period_frames)?
            }
            SampleFormat::F32 => {
                Self::build_stream::<f32, _, _>(&device, &config, callback, on_error, period_frames)?
            }
            SampleFormat::U16 => {
                Self::build_stream::<u16, _, _>(&device, &config, callback, on_error, period_frames)?
            }
            other => {
                return Err(DeviceError::UnsupportedConfig(format!(
                    "unsupported sample format: {:?}",
                    other
                )));
            }
        };

        // Some backends start streams as soon as they are built
        stream.pause()?;

        info!("Audio stream opened ({} Hz, {} ch)", spec.sample_rate, spec.channels);
        Ok(CpalStream { stream })
    }
}

/// Stream opened by [`CpalHost`].
pub struct CpalStream {
    stream: Stream,
}

impl OutputStream for CpalStream {
    fn start(&mut self) -> Result<(), DeviceError> {
        self.stream.play()?;
        debug!("Audio stream started");
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        self.stream.pause()?;
        debug!("Audio stream stopped");
        Ok(())
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        // Ensure stream is stopped before it is closed
        if let Err(e) = self.stream.pause() {
            debug!("Pause on close failed: {}", e);
        }
        debug!("Audio stream closed");
    }
}
