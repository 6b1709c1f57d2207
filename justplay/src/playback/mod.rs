//! Playback engine, shared state and the real-time renderer

pub mod engine;
pub mod renderer;
pub mod state;

pub use engine::{EngineSettings, PlaybackEngine};
pub use renderer::StreamRenderer;
pub use state::{PlaybackState, SharedState};
