//! Controller facade
//!
//! [`Playback`] is the public surface for applications: it validates paths,
//! delegates transport calls to the [`PlaybackEngine`] and exposes read-only
//! derived properties. The only state it keeps of its own is the duration of
//! the loaded file, mirrored from the engine at load.

use crate::audio::decoder::{DecoderBackend, SymphoniaBackend};
use crate::audio::output::{AudioHost, CpalHost};
use crate::config::PlaybackConfig;
use crate::error::{Error, Result};
use crate::playback::{EngineSettings, PlaybackEngine, PlaybackState};
use std::path::Path;
use tracing::{info, warn};

/// Single-file audio player.
///
/// ```no_run
/// use justplay::Playback;
///
/// # fn main() -> justplay::Result<()> {
/// let mut player = Playback::open("song.flac")?;
/// player.set_volume(0.5);
/// player.play()?;
/// # Ok(())
/// # }
/// ```
pub struct Playback<H: AudioHost = CpalHost, B: DecoderBackend = SymphoniaBackend> {
    engine: PlaybackEngine<H, B>,
    /// Duration of the loaded file in seconds (0 when nothing is loaded)
    duration: f64,
}

impl Playback {
    /// Player on the default output device with default settings.
    ///
    /// # Errors
    /// - [`Error::NoDeviceAvailable`] if no output device exists
    pub fn new() -> Result<Self> {
        Self::with_backends(
            CpalHost::default(),
            SymphoniaBackend,
            EngineSettings::default(),
        )
    }

    /// Player configured from a [`PlaybackConfig`].
    pub fn with_config(config: &PlaybackConfig) -> Result<Self> {
        let host = CpalHost::new(config.device.clone(), config.buffer_frames);
        Self::with_backends(host, SymphoniaBackend, config.engine_settings())
    }

    /// Player on the default output device with `path` already loaded.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut player = Self::new()?;
        player.load_file(path)?;
        Ok(player)
    }
}

impl<H: AudioHost, B: DecoderBackend> Playback<H, B> {
    /// Player over explicit device and decoder bindings.
    pub fn with_backends(host: H, backend: B, settings: EngineSettings) -> Result<Self> {
        let engine = PlaybackEngine::new(host, backend, settings)?;
        Ok(Self {
            engine,
            duration: 0.0,
        })
    }

    /// Load an audio file, replacing the current one. Volume and looping carry
    /// over; position resets to the start and playback is stopped.
    ///
    /// # Errors
    /// - [`Error::FileNotFound`] for an empty or missing path
    /// - [`Error::DecodeFailure`] if the file cannot be decoded
    ///
    /// Both leave the previously loaded file in place.
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            warn!("load_file called with an empty path");
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        if !path.is_file() {
            warn!("Audio file not found: {}", path.display());
            return Err(Error::FileNotFound(path.to_path_buf()));
        }

        // A device failure after teardown leaves the engine idle, so the
        // mirror is refreshed whether or not the load succeeded
        let result = self.engine.load(path);
        self.duration = self
            .engine
            .stream_info()
            .map(|info| info.duration_seconds())
            .unwrap_or(0.0);
        result?;

        info!("Ready: {} ({:.2}s)", path.display(), self.duration);
        Ok(())
    }

    /// Play from the beginning.
    ///
    /// # Errors
    /// - [`Error::InvalidState`] if no file is loaded
    pub fn play(&mut self) -> Result<()> {
        self.engine.play()
    }

    pub fn stop(&mut self) -> Result<()> {
        self.engine.stop()
    }

    pub fn pause(&mut self) -> Result<()> {
        self.engine.pause()
    }

    pub fn resume(&mut self) -> Result<()> {
        self.engine.resume()
    }

    /// Jump to `seconds`, clamped to `[0, duration]`. Ignored unless playing or
    /// paused.
    pub fn seek(&mut self, seconds: f64) -> Result<()> {
        self.engine.seek(seconds)
    }

    /// Set the volume in `[0, 1]`; out-of-range values are clamped.
    pub fn set_volume(&mut self, volume: f32) {
        self.engine.set_volume(volume);
    }

    /// Restart from the beginning at the end of the file instead of stopping.
    pub fn loop_at_end(&mut self, loop_at_end: bool) {
        self.engine.set_loop_at_end(loop_at_end);
    }

    /// Take a fault recorded by the audio thread, if any.
    pub fn take_stream_fault(&mut self) -> Option<Error> {
        self.engine.take_stream_fault()
    }

    /// Playing or paused
    pub fn active(&self) -> bool {
        self.engine.is_engaged()
    }

    /// Producing audio right now
    pub fn playing(&self) -> bool {
        self.engine.state() == PlaybackState::Playing
    }

    pub fn paused(&self) -> bool {
        self.engine.is_paused()
    }

    /// Ran to the end of the file without looping
    pub fn ended(&self) -> bool {
        self.engine.has_ended()
    }

    /// Current position in seconds.
    ///
    /// `None` with no file loaded; `Some(0.0)` when loaded but stopped or
    /// ended.
    pub fn curr_pos(&self) -> Option<f64> {
        self.engine.position_seconds()
    }

    /// Duration of the loaded file in seconds, 0 when nothing is loaded
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn volume(&self) -> f32 {
        self.engine.volume()
    }

    pub fn loops_at_end(&self) -> bool {
        self.engine.loops_at_end()
    }

    pub fn state(&self) -> PlaybackState {
        self.engine.state()
    }

    pub fn path(&self) -> Option<&Path> {
        self.engine.path()
    }

    pub fn engine(&self) -> &PlaybackEngine<H, B> {
        &self.engine
    }
}
