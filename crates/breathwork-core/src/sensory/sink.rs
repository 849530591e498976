//! Audio output capability used by the timer loop.
//!
//! The core only issues calls; it never inspects device state. Failures are
//! reported through [`AudioError`] and absorbed by [`AudioGate`].

use thiserror::Error;

use crate::config::{BackgroundMusicType, SoundType};
use crate::phase_machine::Phase;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AudioError {
    #[error("audio initialization failed: {0}")]
    Init(String),
    #[error("playback failed: {0}")]
    Playback(String),
    #[error("unsupported audio source: {0}")]
    UnsupportedSource(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CueKind {
    Inhale,
    Hold,
    Exhale,
    HoldAfterExhale,
    CycleComplete,
}

impl CueKind {
    pub fn for_phase(phase: Phase) -> Option<CueKind> {
        match phase {
            Phase::Idle => None,
            Phase::Inhale => Some(CueKind::Inhale),
            Phase::Hold => Some(CueKind::Hold),
            Phase::Exhale => Some(CueKind::Exhale),
            Phase::HoldAfterExhale => Some(CueKind::HoldAfterExhale),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CueRequest {
    pub kind: CueKind,
    /// Duration of the phase being entered; sweeps span all of it.
    pub phase_ms: u64,
    pub style: SoundType,
    /// Linear gain in [0, 1].
    pub volume: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AmbientSource {
    Synth(BackgroundMusicType),
    /// Reference to user-supplied audio.
    Custom(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AmbientRequest {
    pub source: AmbientSource,
    /// User volume in [0, 100].
    pub volume: u8,
}

pub trait AudioSink: Send {
    /// Prepare the output. Called before the first cue of every session.
    fn init(&mut self) -> Result<(), AudioError> {
        Ok(())
    }

    fn play_cue(&mut self, cue: &CueRequest) -> Result<(), AudioError>;

    /// Replace the running ambient bed, if any, with a new one.
    fn start_ambient(&mut self, request: &AmbientRequest) -> Result<(), AudioError>;

    fn stop_ambient(&mut self);

    fn set_ambient_volume(&mut self, volume: u8) -> Result<(), AudioError>;

    /// Cut every sound immediately: pending cues and the ambient bed.
    fn silence(&mut self) {
        self.stop_ambient();
    }
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl AudioSink for NullSink {
    fn play_cue(&mut self, _cue: &CueRequest) -> Result<(), AudioError> {
        Ok(())
    }

    fn start_ambient(&mut self, _request: &AmbientRequest) -> Result<(), AudioError> {
        Ok(())
    }

    fn stop_ambient(&mut self) {}

    fn set_ambient_volume(&mut self, _volume: u8) -> Result<(), AudioError> {
        Ok(())
    }
}

/// Wraps a sink so audio problems never reach the timer loop.
///
/// A failed `init` leaves the gate closed until the next session start retries;
/// individual call failures are logged and dropped.
pub struct AudioGate {
    sink: Box<dyn AudioSink>,
    ready: bool,
}

impl AudioGate {
    pub fn new(sink: Box<dyn AudioSink>) -> Self {
        Self { sink, ready: false }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn ensure_ready(&mut self) -> bool {
        if !self.ready {
            match self.sink.init() {
                Ok(()) => self.ready = true,
                Err(e) => log::warn!("audio unavailable, continuing silently: {}", e),
            }
        }
        self.ready
    }

    pub fn play_cue(&mut self, cue: &CueRequest) {
        if !self.ready {
            return;
        }
        if let Err(e) = self.sink.play_cue(cue) {
            log::warn!("cue {:?} dropped: {}", cue.kind, e);
        }
    }

    pub fn start_ambient(&mut self, request: &AmbientRequest) {
        if !self.ready {
            return;
        }
        if let Err(e) = self.sink.start_ambient(request) {
            log::warn!("ambient bed not started: {}", e);
        }
    }

    pub fn stop_ambient(&mut self) {
        if self.ready {
            self.sink.stop_ambient();
        }
    }

    pub fn set_ambient_volume(&mut self, volume: u8) {
        if !self.ready {
            return;
        }
        if let Err(e) = self.sink.set_ambient_volume(volume) {
            log::warn!("ambient volume change ignored: {}", e);
        }
    }

    pub fn silence(&mut self) {
        if self.ready {
            self.sink.silence();
        }
    }
}

impl std::fmt::Debug for AudioGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioGate").field("ready", &self.ready).finish()
    }
}
