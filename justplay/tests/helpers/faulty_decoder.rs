//! Decoder backend with switchable failures
//!
//! Serves an in-memory mono ramp (sample = frame index) for any existing
//! path. Seeks and reads can be made to fail while the decoder is running
//! inside the stream callback.

use justplay::audio::{AudioDecoder, DecoderBackend, MemoryDecoder, StreamInfo};
use justplay::error::DecodeError;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Failure switches shared between a test and its decoders
#[derive(Default)]
pub struct DecoderFaults {
    fail_seek: AtomicBool,
    fail_read: AtomicBool,
}

impl DecoderFaults {
    pub fn set_fail_seek(&self, fail: bool) {
        self.fail_seek.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_read(&self, fail: bool) {
        self.fail_read.store(fail, Ordering::SeqCst);
    }
}

/// Backend opening [`FaultyDecoder`]s over a ramp of `frames` frames
pub struct FaultyBackend {
    sample_rate: u32,
    frames: i16,
    faults: Arc<DecoderFaults>,
}

impl FaultyBackend {
    pub fn new(sample_rate: u32, frames: i16) -> (Self, Arc<DecoderFaults>) {
        let faults = Arc::new(DecoderFaults::default());
        let backend = Self {
            sample_rate,
            frames,
            faults: Arc::clone(&faults),
        };
        (backend, faults)
    }
}

impl DecoderBackend for FaultyBackend {
    type Decoder = FaultyDecoder;

    fn open(&self, _path: &Path) -> Result<FaultyDecoder, DecodeError> {
        Ok(FaultyDecoder {
            inner: MemoryDecoder::new((0..self.frames).collect(), self.sample_rate, 1)?,
            faults: Arc::clone(&self.faults),
        })
    }
}

pub struct FaultyDecoder {
    inner: MemoryDecoder,
    faults: Arc<DecoderFaults>,
}

impl AudioDecoder for FaultyDecoder {
    fn info(&self) -> StreamInfo {
        self.inner.info()
    }

    fn read_frames(&mut self, out: &mut [i16]) -> Result<usize, DecodeError> {
        if self.faults.fail_read.load(Ordering::SeqCst) {
            return Err(DecodeError::Decode("injected read failure".to_string()));
        }
        self.inner.read_frames(out)
    }

    fn seek(&mut self, frame: u64) -> Result<(), DecodeError> {
        if self.faults.fail_seek.load(Ordering::SeqCst) {
            return Err(DecodeError::Seek("injected seek failure".to_string()));
        }
        self.inner.seek(frame)
    }
}
