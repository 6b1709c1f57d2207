//! Real-time stream renderer
//!
//! The audio callback installed on the output stream. Owns the decoder for as
//! long as the stream is open.
//!
//! **REAL-TIME SAFE**: atomics only, no locks, no logging, no I/O. Faults are
//! recorded in [`SharedState`] and surfaced by the next controller call.

use crate::audio::decoder::AudioDecoder;
use crate::audio::output::AudioCallback;
use crate::audio::types::apply_gain;
use crate::error::StreamFault;
use crate::playback::state::SharedState;
use std::sync::Arc;

/// Pulls decoded frames into the device buffer.
///
/// Per invocation:
/// 1. Resync the decoder if the controller moved the cursor
/// 2. Read up to the requested number of frames
/// 3. At end of stream either wrap to frame 0 (looping) or zero-fill the
///    remainder and mark the stream ended
/// 4. Apply the current gain
/// 5. Advance the shared cursor by the frames consumed
pub struct StreamRenderer<D: AudioDecoder> {
    decoder: D,
    shared: Arc<SharedState>,
    channels: usize,
}

impl<D: AudioDecoder> StreamRenderer<D> {
    pub fn new(decoder: D, shared: Arc<SharedState>) -> Self {
        let channels = decoder.info().channels.max(1) as usize;
        Self {
            decoder,
            shared,
            channels,
        }
    }

    fn render_frames(&mut self, out: &mut [i16]) {
        let channels = self.channels;
        let requested = out.len() / channels;
        let usable = requested * channels;

        // Samples that do not form a whole frame stay silent
        out[usable..].fill(0);

        if self.shared.has_ended() {
            // Keeps `active` cleared if the stream was restarted after the end
            self.shared.mark_ended();
            out[..usable].fill(0);
            return;
        }

        if let Some(target) = self.shared.take_seek_request() {
            if self.decoder.seek(target).is_err() {
                // Decoder position is unknown: stay silent at the requested
                // cursor and retry on the next invocation
                self.shared.record_fault(StreamFault::Seek);
                self.shared.retry_seek();
                out[..usable].fill(0);
                return;
            }
        }

        let started_at = self.shared.frame_offset();
        let mut cursor = started_at;
        let mut filled = 0usize;
        let mut wrapped_without_progress = false;

        while filled < requested {
            let read = match self.decoder.read_frames(&mut out[filled * channels..usable]) {
                Ok(read) => read,
                Err(_) => {
                    // Not an end of stream: leave the rest of the period
                    // silent and read on from here next time
                    self.shared.record_fault(StreamFault::Decode);
                    out[filled * channels..usable].fill(0);
                    break;
                }
            };

            if read > 0 {
                filled += read;
                cursor += read as u64;
                wrapped_without_progress = false;
                continue;
            }

            // End of stream. Wrapping twice without reading a frame means the
            // stream is empty.
            if self.shared.loops_at_end() && !wrapped_without_progress {
                if self.decoder.seek(0).is_err() {
                    self.shared.record_fault(StreamFault::Seek);
                } else {
                    cursor = 0;
                    wrapped_without_progress = true;
                    continue;
                }
            }

            out[filled * channels..usable].fill(0);
            self.shared.mark_ended();
            break;
        }

        apply_gain(&mut out[..filled * channels], self.shared.gain());
        self.shared.commit_frame_offset(started_at, cursor);
    }
}

impl<D: AudioDecoder> AudioCallback for StreamRenderer<D> {
    fn render(&mut self, out: &mut [i16]) {
        self.render_frames(out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decoder::MemoryDecoder;

    /// Mono ramp where each sample equals its frame index
    fn ramp(frames: i16) -> MemoryDecoder {
        MemoryDecoder::new((0..frames).collect(), 1000, 1).unwrap()
    }

    fn renderer(frames: i16, loop_at_end: bool) -> (StreamRenderer<MemoryDecoder>, Arc<SharedState>) {
        let shared = Arc::new(SharedState::new(1.0, loop_at_end));
        (StreamRenderer::new(ramp(frames), Arc::clone(&shared)), shared)
    }

    #[test]
    fn test_render_advances_cursor() {
        let (mut renderer, shared) = renderer(100, false);
        let mut out = [0i16; 10];

        renderer.render(&mut out);
        assert_eq!(out, [0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(shared.frame_offset(), 10);

        renderer.render(&mut out);
        assert_eq!(out[0], 10);
        assert_eq!(shared.frame_offset(), 20);
    }

    #[test]
    fn test_render_honours_seek_request() {
        let (mut renderer, shared) = renderer(100, false);
        let mut out = [0i16; 4];

        shared.request_seek(50);
        renderer.render(&mut out);
        assert_eq!(out, [50, 51, 52, 53]);
        assert_eq!(shared.frame_offset(), 54);
    }

    #[test]
    fn test_end_of_stream_zero_fills_and_marks_ended() {
        let (mut renderer, shared) = renderer(6, false);
        shared.set_active(true);
        let mut out = [7i16; 10];

        renderer.render(&mut out);
        assert_eq!(out, [0, 1, 2, 3, 4, 5, 0, 0, 0, 0]);
        assert!(shared.has_ended());
        assert!(!shared.is_active());
        assert_eq!(shared.frame_offset(), 6);

        // Ended streams stay silent
        let mut out = [7i16; 4];
        renderer.render(&mut out);
        assert_eq!(out, [0; 4]);
        assert_eq!(shared.frame_offset(), 6);
    }

    #[test]
    fn test_loop_wraps_to_start() {
        let (mut renderer, shared) = renderer(6, true);
        shared.set_active(true);
        let mut out = [0i16; 10];

        renderer.render(&mut out);
        assert_eq!(out, [0, 1, 2, 3, 4, 5, 0, 1, 2, 3]);
        assert!(!shared.has_ended());
        assert!(shared.is_active());
        assert_eq!(shared.frame_offset(), 4);
    }

    #[test]
    fn test_loop_over_empty_stream_ends() {
        let shared = Arc::new(SharedState::new(1.0, true));
        let decoder = MemoryDecoder::new(vec![], 1000, 1).unwrap();
        let mut renderer = StreamRenderer::new(decoder, Arc::clone(&shared));
        let mut out = [3i16; 8];

        renderer.render(&mut out);
        assert_eq!(out, [0; 8]);
        assert!(shared.has_ended());
    }

    #[test]
    fn test_gain_applied_per_sample() {
        let (mut renderer, shared) = renderer(100, false);
        shared.set_gain(0.5);
        shared.request_seek(40);
        let mut out = [0i16; 3];

        renderer.render(&mut out);
        assert_eq!(out, [20, 21, 21]);
    }

    #[test]
    fn test_stereo_partial_frame_left_silent() {
        let shared = Arc::new(SharedState::default());
        let decoder = MemoryDecoder::new(vec![1, -1, 2, -2, 3, -3], 1000, 2).unwrap();
        let mut renderer = StreamRenderer::new(decoder, Arc::clone(&shared));
        let mut out = [9i16; 5];

        renderer.render(&mut out);
        assert_eq!(out, [1, -1, 2, -2, 0]);
        assert_eq!(shared.frame_offset(), 2);
    }

    #[test]
    fn test_restarted_after_end_clears_active_again() {
        let (mut renderer, shared) = renderer(6, false);
        shared.set_active(true);
        let mut out = [0i16; 10];
        renderer.render(&mut out);
        assert!(shared.has_ended());

        // Stream started again without a rewind
        shared.set_active(true);
        renderer.render(&mut out);
        assert_eq!(out, [0; 10]);
        assert!(!shared.is_active());
    }
}
