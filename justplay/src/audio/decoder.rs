//! Decoder Adapter
//!
//! Opens an audio file and produces interleaved `i16` PCM frames from an
//! arbitrary frame offset. The symphonia binding covers MP3, FLAC, AAC,
//! MP4/M4A, Vorbis and WAV/PCM.
//!
//! Decoders are moved into the real-time callback once a stream is opened, so
//! `read_frames` and `seek` avoid logging and only allocate when a packet is
//! larger than any packet seen before.

use crate::audio::types::StreamInfo;
use crate::error::DecodeError;
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::TimeBase;
use tracing::debug;

// A decode error on a single packet is not fatal; more than this many in a
// row is.
const MAX_DECODE_RETRIES: usize = 3;

/// A source of PCM frames.
pub trait AudioDecoder: Send + 'static {
    /// Sample rate, channel count and length of the stream
    fn info(&self) -> StreamInfo;

    /// Read up to `out.len() / channels` frames of interleaved samples.
    ///
    /// Returns the number of whole frames written. Fewer frames than requested
    /// means the end of the stream was reached.
    fn read_frames(&mut self, out: &mut [i16]) -> Result<usize, DecodeError>;

    /// Reposition so the next frame read is `frame`.
    ///
    /// Offsets past the end leave the decoder exhausted.
    fn seek(&mut self, frame: u64) -> Result<(), DecodeError>;
}

/// Opens decoders for files. One binding is selected per build.
pub trait DecoderBackend {
    type Decoder: AudioDecoder;

    fn open(&self, path: &Path) -> Result<Self::Decoder, DecodeError>;
}

/// Decoder backend using symphonia.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymphoniaBackend;

impl DecoderBackend for SymphoniaBackend {
    type Decoder = SymphoniaDecoder;

    fn open(&self, path: &Path) -> Result<SymphoniaDecoder, DecodeError> {
        SymphoniaDecoder::open(path)
    }
}

/// Streaming symphonia decoder with sample-exact seeking.
pub struct SymphoniaDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    time_base: Option<TimeBase>,
    info: StreamInfo,

    /// Interleaved samples of the most recently decoded packet
    buffer: Option<SampleBuffer<i16>>,
    /// Capacity of `buffer` in frames
    buffer_capacity: u64,
    /// Frames held in `buffer`
    buffered_frames: usize,
    /// Frames of `buffer` already handed out
    cursor: usize,
    /// Frames to discard after an accurate seek landed before the target
    skip_frames: u64,
    /// Frame index the next `read_frames` call starts at
    position: u64,
    exhausted: bool,
}

impl SymphoniaDecoder {
    /// Open an audio file and decode its first packet.
    ///
    /// Decoding the first packet up front means an undecodable file is
    /// rejected here instead of on the audio thread.
    pub fn open(path: &Path) -> Result<Self, DecodeError> {
        debug!("Opening decoder: {}", path.display());

        let (format, track_id) = Self::probe(path)?;
        let codec_params = format
            .tracks()
            .iter()
            .find(|t| t.id == track_id)
            .map(|t| t.codec_params.clone())
            .ok_or(DecodeError::NoAudioTrack)?;

        let decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(DecodeError::from)?;

        let info = StreamInfo {
            sample_rate: codec_params.sample_rate.unwrap_or(0),
            channels: codec_params.channels.map(|c| c.count() as u16).unwrap_or(0),
            total_frames: codec_params.n_frames.unwrap_or(0),
        };

        let mut this = Self {
            format,
            decoder,
            track_id,
            time_base: codec_params.time_base,
            info,
            buffer: None,
            buffer_capacity: 0,
            buffered_frames: 0,
            cursor: 0,
            skip_frames: 0,
            position: 0,
            exhausted: false,
        };

        this.refill()?;

        if this.info.sample_rate == 0 {
            return Err(DecodeError::MissingParameter("sample rate"));
        }
        if this.info.channels == 0 {
            return Err(DecodeError::MissingParameter("channel count"));
        }

        if codec_params.n_frames.is_none() {
            // Container does not declare its length; count packets instead
            let scanned = Self::scan_duration_ts(path, track_id)?;
            this.info.total_frames = this.ts_to_frames(scanned);
            debug!("Frame count not declared, scanned {} frames", this.info.total_frames);
        }

        debug!(
            "Decoder ready: sample_rate={}, channels={}, frames={}",
            this.info.sample_rate, this.info.channels, this.info.total_frames
        );

        Ok(this)
    }

    /// Probe the container and pick the first decodable track
    fn probe(path: &Path) -> Result<(Box<dyn FormatReader>, u32), DecodeError> {
        let file = File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(DecodeError::from)?;

        let track_id = probed
            .format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .map(|t| t.id)
            .ok_or(DecodeError::NoAudioTrack)?;

        Ok((probed.format, track_id))
    }

    /// Sum packet durations of a track, in track time base units
    fn scan_duration_ts(path: &Path, track_id: u32) -> Result<u64, DecodeError> {
        let (mut format, _) = Self::probe(path)?;
        let mut total = 0u64;

        loop {
            match format.next_packet() {
                Ok(packet) => {
                    if packet.track_id() == track_id {
                        total += packet.dur();
                    }
                }
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(total)
    }

    fn ts_to_frames(&self, ts: u64) -> u64 {
        match self.time_base {
            Some(tb) if tb.denom != 0 && self.info.sample_rate != 0 => {
                let frames = ts as u128 * tb.numer as u128 * self.info.sample_rate as u128
                    / tb.denom as u128;
                frames as u64
            }
            _ => ts,
        }
    }

    fn frames_to_ts(&self, frames: u64) -> u64 {
        match self.time_base {
            Some(tb) if tb.numer != 0 && self.info.sample_rate != 0 => {
                let ts = frames as u128 * tb.denom as u128
                    / (tb.numer as u128 * self.info.sample_rate as u128);
                ts as u64
            }
            _ => frames,
        }
    }

    /// Decode the next packet of the selected track into `buffer`.
    ///
    /// Returns `Ok(false)` at end of stream.
    fn refill(&mut self) -> Result<bool, DecodeError> {
        let mut decode_errors = 0;

        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    self.exhausted = true;
                    return Ok(false);
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(_)) if decode_errors < MAX_DECODE_RETRIES => {
                    decode_errors += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if decoded.frames() == 0 {
                continue;
            }

            let spec = *decoded.spec();
            let channels = spec.channels.count() as u16;
            if self.info.channels == 0 {
                self.info.channels = channels;
            } else if self.info.channels != channels {
                return Err(DecodeError::Decode(
                    "channel count changed mid-stream".to_string(),
                ));
            }
            if self.info.sample_rate == 0 {
                self.info.sample_rate = spec.rate;
            }

            let capacity = decoded.capacity() as u64;
            if self.buffer.is_none() || capacity > self.buffer_capacity {
                self.buffer = Some(SampleBuffer::<i16>::new(capacity, spec));
                self.buffer_capacity = capacity;
            }

            let frames = decoded.frames();
            if let Some(buffer) = self.buffer.as_mut() {
                buffer.copy_interleaved_ref(decoded);
            }
            self.buffered_frames = frames;
            self.cursor = 0;
            return Ok(true);
        }
    }

    fn reset_buffer(&mut self) {
        self.buffered_frames = 0;
        self.cursor = 0;
        self.skip_frames = 0;
    }
}

impl AudioDecoder for SymphoniaDecoder {
    fn info(&self) -> StreamInfo {
        self.info
    }

    fn read_frames(&mut self, out: &mut [i16]) -> Result<usize, DecodeError> {
        let channels = self.info.channels as usize;
        let wanted = out.len() / channels;
        let mut written = 0;

        while written < wanted {
            if self.cursor >= self.buffered_frames {
                if self.exhausted {
                    break;
                }
                match self.refill() {
                    Ok(true) => continue,
                    Ok(false) => break,
                    Err(e) if written == 0 => return Err(e),
                    Err(_) => break,
                }
            }

            let available = self.buffered_frames - self.cursor;

            if self.skip_frames > 0 {
                let skipped = available.min(self.skip_frames as usize);
                self.cursor += skipped;
                self.skip_frames -= skipped as u64;
                continue;
            }

            let count = available.min(wanted - written);
            if let Some(buffer) = self.buffer.as_ref() {
                let src = &buffer.samples()[self.cursor * channels..(self.cursor + count) * channels];
                out[written * channels..(written + count) * channels].copy_from_slice(src);
            }
            self.cursor += count;
            written += count;
        }

        self.position += written as u64;
        Ok(written)
    }

    fn seek(&mut self, frame: u64) -> Result<(), DecodeError> {
        if frame == self.position && !self.exhausted {
            return Ok(());
        }

        if self.info.total_frames > 0 && frame >= self.info.total_frames {
            self.reset_buffer();
            self.exhausted = true;
            self.position = self.info.total_frames;
            return Ok(());
        }

        let seeked = self
            .format
            .seek(
                SeekMode::Accurate,
                SeekTo::TimeStamp {
                    ts: self.frames_to_ts(frame),
                    track_id: self.track_id,
                },
            )
            .map_err(|e| DecodeError::Seek(e.to_string()))?;

        self.decoder.reset();
        self.reset_buffer();
        self.exhausted = false;
        self.skip_frames = self.ts_to_frames(seeked.required_ts.saturating_sub(seeked.actual_ts));
        self.position = frame;
        Ok(())
    }
}

/// Decoder over interleaved PCM already held in memory.
#[derive(Debug, Clone)]
pub struct MemoryDecoder {
    samples: Vec<i16>,
    info: StreamInfo,
    position: u64,
}

impl MemoryDecoder {
    /// Wrap interleaved samples. Trailing samples that do not form a whole
    /// frame are dropped.
    pub fn new(mut samples: Vec<i16>, sample_rate: u32, channels: u16) -> Result<Self, DecodeError> {
        if sample_rate == 0 {
            return Err(DecodeError::MissingParameter("sample rate"));
        }
        if channels == 0 {
            return Err(DecodeError::MissingParameter("channel count"));
        }

        let total_frames = samples.len() / channels as usize;
        samples.truncate(total_frames * channels as usize);

        Ok(Self {
            samples,
            info: StreamInfo {
                sample_rate,
                channels,
                total_frames: total_frames as u64,
            },
            position: 0,
        })
    }

    /// Frame index the next read starts at
    pub fn position(&self) -> u64 {
        self.position
    }
}

impl AudioDecoder for MemoryDecoder {
    fn info(&self) -> StreamInfo {
        self.info
    }

    fn read_frames(&mut self, out: &mut [i16]) -> Result<usize, DecodeError> {
        let channels = self.info.channels as usize;
        let remaining = (self.info.total_frames - self.position) as usize;
        let count = (out.len() / channels).min(remaining);

        let start = self.position as usize * channels;
        out[..count * channels].copy_from_slice(&self.samples[start..start + count * channels]);

        self.position += count as u64;
        Ok(count)
    }

    fn seek(&mut self, frame: u64) -> Result<(), DecodeError> {
        self.position = frame.min(self.info.total_frames);
        Ok(())
    }
}
