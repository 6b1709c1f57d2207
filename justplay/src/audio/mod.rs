//! Audio adapters
//!
//! Decoding (symphonia) and device output (cpal) behind the two adapter
//! traits the playback engine is generic over.

pub mod decoder;
pub mod output;
pub mod types;

pub use decoder::{AudioDecoder, DecoderBackend, MemoryDecoder, SymphoniaBackend, SymphoniaDecoder};
pub use output::{AudioCallback, AudioHost, CpalHost, CpalStream, OutputStream};
pub use types::{StreamInfo, StreamSpec, VolumeCurve};
