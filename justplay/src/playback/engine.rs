//! Playback engine
//!
//! Transport state machine and device/decoder lifecycle for one output stream.
//!
//! Transitions:
//! - `load`: any state → `Ready` (failure before teardown keeps the old state)
//! - `play`: `Ready` | `Playing` | `Paused` | `Ended` → `Playing`, from frame 0
//! - `pause`: `Playing` → `Paused`
//! - `resume`: `Paused` → `Playing`
//! - `stop`: `Playing` | `Paused` | `Ended` → `Ready`, rewound to frame 0
//! - end of stream without looping: `Playing` → `Ended` (set by the callback)
//!
//! The decoder lives inside the stream's callback; dropping the stream closes
//! the device first and then releases the decoder.

use crate::audio::decoder::{AudioDecoder, DecoderBackend};
use crate::audio::output::{AudioHost, OutputStream};
use crate::audio::types::{clamp_volume, StreamInfo, VolumeCurve};
use crate::error::{Error, Result, StreamFault};
use crate::playback::renderer::StreamRenderer;
use crate::playback::state::{PlaybackState, SharedState};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Settings that persist across loads
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    /// Initial volume in `[0, 1]`
    pub volume: f32,
    pub loop_at_end: bool,
    pub volume_curve: VolumeCurve,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            volume: 1.0,
            loop_at_end: false,
            volume_curve: VolumeCurve::Linear,
        }
    }
}

/// The loaded file and its open stream
struct Session<S> {
    path: PathBuf,
    info: StreamInfo,
    stream: S,
}

/// Single-stream playback engine.
///
/// Generic over the device and decoder bindings; both are fixed at compile
/// time.
pub struct PlaybackEngine<H: AudioHost, B: DecoderBackend> {
    host: H,
    backend: B,
    shared: Arc<SharedState>,
    session: Option<Session<H::Stream>>,
    /// Linear volume parameter as set by the caller
    volume: f32,
    volume_curve: VolumeCurve,
    /// Explicitly paused; the device stream is stopped
    paused: bool,
}

impl<H: AudioHost, B: DecoderBackend> PlaybackEngine<H, B> {
    /// Create an engine.
    ///
    /// # Errors
    /// - [`Error::NoDeviceAvailable`] if the host reports no output device or
    ///   cannot enumerate devices
    pub fn new(host: H, backend: B, settings: EngineSettings) -> Result<Self> {
        let device_count = match host.output_device_count() {
            Ok(count) => count,
            Err(e) => {
                warn!("Failed to enumerate output devices: {}", e);
                0
            }
        };

        if device_count == 0 {
            return Err(Error::NoDeviceAvailable);
        }
        debug!("{} output device(s) available", device_count);

        let volume = clamp_volume(settings.volume);
        let shared = Arc::new(SharedState::new(
            settings.volume_curve.gain(volume),
            settings.loop_at_end,
        ));

        Ok(Self {
            host,
            backend,
            shared,
            session: None,
            volume,
            volume_curve: settings.volume_curve,
            paused: false,
        })
    }

    /// Load a file, replacing any loaded file.
    ///
    /// The new decoder is opened before the old stream is torn down, so a
    /// missing or undecodable file leaves the previous session untouched.
    /// The old stream is fully closed before the new one is opened.
    ///
    /// # Errors
    /// - [`Error::FileNotFound`] if the path does not exist
    /// - [`Error::DecodeFailure`] if the decoder cannot open the file
    /// - [`Error::Device`] if the output stream cannot be opened; the engine
    ///   is left idle
    pub fn load(&mut self, path: &Path) -> Result<()> {
        if path.as_os_str().is_empty() || !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }

        let decoder = self.backend.open(path).map_err(|source| Error::DecodeFailure {
            path: path.to_path_buf(),
            source,
        })?;
        let info = decoder.info();

        self.teardown();
        self.shared.reset_for_load();

        let renderer = StreamRenderer::new(decoder, Arc::clone(&self.shared));
        let faults = Arc::clone(&self.shared);
        let stream = self
            .host
            .open_stream(info.stream_spec(), renderer, move |_err| {
                faults.record_fault(StreamFault::Device);
            })
            .map_err(|e| {
                warn!("Failed to open output stream for {}: {}", path.display(), e);
                Error::Device(e)
            })?;

        info!(
            "Loaded {} ({} Hz, {} ch, {:.2}s)",
            path.display(),
            info.sample_rate,
            info.channels,
            info.duration_seconds()
        );

        self.session = Some(Session {
            path: path.to_path_buf(),
            info,
            stream,
        });
        Ok(())
    }

    /// Play from the start of the file, whatever the current position.
    ///
    /// # Errors
    /// - [`Error::InvalidState`] if no file is loaded
    /// - [`Error::StreamFault`] if the audio thread recorded a fault
    /// - [`Error::Device`] if the stream cannot be stopped or started
    pub fn play(&mut self) -> Result<()> {
        self.surface_fault()?;

        let state = self.state();
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| Error::InvalidState("No audio file has been loaded".to_string()))?;

        // A paused stream is already stopped; a playing or run-to-completion
        // stream is still running
        if matches!(state, PlaybackState::Playing | PlaybackState::Ended) {
            session.stream.stop()?;
        }

        self.paused = false;
        self.shared.clear_ended();
        self.shared.request_seek(0);

        self.shared.set_active(true);
        if let Err(e) = session.stream.start() {
            self.shared.set_active(false);
            return Err(e.into());
        }

        debug!("Playback started from the beginning");
        Ok(())
    }

    /// Stop playback and rewind. No-op unless playing, paused or ended.
    pub fn stop(&mut self) -> Result<()> {
        self.surface_fault()?;

        let state = self.state();
        let Some(session) = self.session.as_mut() else {
            debug!("stop ignored: no file loaded");
            return Ok(());
        };

        match state {
            PlaybackState::Playing | PlaybackState::Ended => session.stream.stop()?,
            PlaybackState::Paused => {}
            PlaybackState::Idle | PlaybackState::Ready => {
                debug!("stop ignored: playback inactive");
                return Ok(());
            }
        }

        self.shared.set_active(false);
        self.shared.clear_ended();
        self.shared.request_seek(0);
        self.paused = false;

        debug!("Playback stopped");
        Ok(())
    }

    /// Pause playback, keeping the position. No-op unless playing.
    pub fn pause(&mut self) -> Result<()> {
        self.surface_fault()?;

        if self.state() != PlaybackState::Playing {
            debug!("pause ignored: not playing");
            return Ok(());
        }

        if let Some(session) = self.session.as_mut() {
            session.stream.stop()?;
        }
        self.shared.set_active(false);

        // The last callback before the stop may have reached the end
        if self.shared.has_ended() {
            debug!("pause reached end of stream");
            return Ok(());
        }
        self.paused = true;

        debug!("Playback paused at frame {}", self.shared.frame_offset());
        Ok(())
    }

    /// Resume paused playback. No-op unless paused.
    pub fn resume(&mut self) -> Result<()> {
        self.surface_fault()?;

        if self.state() != PlaybackState::Paused {
            debug!("resume ignored: not paused");
            return Ok(());
        }
        if self.shared.has_ended() {
            debug!("resume ignored: end of stream reached");
            self.paused = false;
            return Ok(());
        }

        if let Some(session) = self.session.as_mut() {
            self.shared.set_active(true);
            if let Err(e) = session.stream.start() {
                self.shared.set_active(false);
                return Err(e.into());
            }
        }
        self.paused = false;

        debug!("Playback resumed at frame {}", self.shared.frame_offset());
        Ok(())
    }

    /// Jump to `seconds`, clamped to `[0, duration]`. No-op unless playing or
    /// paused.
    pub fn seek(&mut self, seconds: f64) -> Result<()> {
        self.surface_fault()?;

        if !self.is_engaged() {
            debug!("seek ignored: playback inactive");
            return Ok(());
        }

        if let Some(session) = self.session.as_ref() {
            let frame = session.info.seconds_to_frame(seconds);
            self.shared.request_seek(frame);
            debug!("Seek to {:.3}s (frame {})", seconds, frame);
        }
        Ok(())
    }

    /// Set the volume, clamped to `[0, 1]`. Takes effect at the next callback
    /// without interrupting playback.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = clamp_volume(volume);
        self.shared.set_gain(self.volume_curve.gain(self.volume));
        debug!("Volume set to {:.2}", self.volume);
    }

    /// Loop back to the start instead of ending
    pub fn set_loop_at_end(&mut self, loop_at_end: bool) {
        self.shared.set_loop_at_end(loop_at_end);
        debug!("Loop at end: {}", loop_at_end);
    }

    /// Take a fault recorded by the audio thread without surfacing it as an
    /// error.
    pub fn take_stream_fault(&self) -> Option<Error> {
        self.shared
            .take_fault()
            .map(|(fault, occurrences)| Error::StreamFault { fault, occurrences })
    }

    fn surface_fault(&self) -> Result<()> {
        match self.take_stream_fault() {
            Some(err) => {
                warn!("Surfacing audio thread fault: {}", err);
                Err(err)
            }
            None => Ok(()),
        }
    }

    /// Close the stream (and with it the decoder) and forget the file
    fn teardown(&mut self) {
        if let Some(session) = self.session.take() {
            debug!("Closing stream for {}", session.path.display());
            drop(session);
        }
        self.shared.set_active(false);
        self.paused = false;
    }

    // ---- queries ----

    pub fn state(&self) -> PlaybackState {
        if self.session.is_none() {
            PlaybackState::Idle
        } else if self.paused {
            PlaybackState::Paused
        } else if self.shared.is_active() {
            PlaybackState::Playing
        } else if self.shared.has_ended() {
            PlaybackState::Ended
        } else {
            PlaybackState::Ready
        }
    }

    /// Playing or paused
    pub fn is_engaged(&self) -> bool {
        matches!(self.state(), PlaybackState::Playing | PlaybackState::Paused)
    }

    pub fn is_paused(&self) -> bool {
        self.state() == PlaybackState::Paused
    }

    pub fn has_ended(&self) -> bool {
        self.state() == PlaybackState::Ended
    }

    /// Position in seconds.
    ///
    /// `None` with no file loaded, `0.0` when loaded but not playing or paused.
    pub fn position_seconds(&self) -> Option<f64> {
        let session = self.session.as_ref()?;
        if !self.is_engaged() {
            return Some(0.0);
        }
        let frame = self.shared.frame_offset().min(session.info.total_frames);
        Some(session.info.frames_to_seconds(frame))
    }

    pub fn stream_info(&self) -> Option<StreamInfo> {
        self.session.as_ref().map(|s| s.info)
    }

    pub fn path(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.path.as_path())
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Gain currently applied by the callback
    pub fn gain(&self) -> f32 {
        self.shared.gain()
    }

    pub fn loops_at_end(&self) -> bool {
        self.shared.loops_at_end()
    }
}

impl<H: AudioHost, B: DecoderBackend> Drop for PlaybackEngine<H, B> {
    fn drop(&mut self) {
        self.teardown();
    }
}
