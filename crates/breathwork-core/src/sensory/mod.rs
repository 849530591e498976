//! Sensory systems module
//!
//! Phase cues, ambient beds and the sinks that play them.

pub mod cues;
pub mod filter;
pub mod mixer;
pub mod noise;
pub mod sink;
pub mod soundscape;

pub use cues::{render_cue, CueShape, CueVoice};
pub use mixer::{Mixer, MixerStats, SharedMixer};
pub use noise::{NoiseColor, NoiseSource};
pub use sink::{
    AmbientRequest, AmbientSource, AudioError, AudioGate, AudioSink, CueKind, CueRequest,
    NullSink,
};
pub use soundscape::{AmbientBed, AmbientFilter, AmbientProfile};
