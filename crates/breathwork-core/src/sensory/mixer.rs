//! Offline mixer: an [`AudioSink`] that renders cues and the ambient bed into
//! sample buffers instead of a device.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};

use crate::sensory::cues::{voices_for, CueVoice};
use crate::sensory::sink::{AmbientRequest, AmbientSource, AudioError, AudioSink, CueRequest};
use crate::sensory::soundscape::{ambient_gain, fallback_profile, profile_for, AmbientBed};

#[derive(Debug)]
enum Bed {
    Synth(AmbientBed),
    /// A local audio file. It is referenced but not decoded here; it occupies
    /// the bed slot and renders silence.
    Custom { source: String, gain: f32 },
}

/// Resource counters, mainly for leak checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MixerStats {
    pub cues_started: u64,
    pub beds_started: u64,
    pub beds_released: u64,
}

impl MixerStats {
    pub fn live_beds(&self) -> u64 {
        self.beds_started - self.beds_released
    }
}

#[derive(Debug)]
pub struct Mixer {
    sample_rate: u32,
    /// Seeds each new voice and bed.
    rng: SmallRng,
    voices: Vec<CueVoice>,
    bed: Option<Bed>,
    stats: MixerStats,
}

impl Mixer {
    pub fn new(sample_rate: u32, seed: u64) -> Self {
        Self {
            sample_rate,
            rng: SmallRng::seed_from_u64(seed),
            voices: Vec::new(),
            bed: None,
            stats: MixerStats::default(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn stats(&self) -> MixerStats {
        self.stats
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    pub fn has_bed(&self) -> bool {
        self.bed.is_some()
    }

    /// Custom source currently holding the bed slot, if any.
    pub fn custom_source(&self) -> Option<&str> {
        match &self.bed {
            Some(Bed::Custom { source, .. }) => Some(source),
            _ => None,
        }
    }

    /// Gain the bed is heading to, if one is running.
    pub fn bed_gain(&self) -> Option<f32> {
        match &self.bed {
            Some(Bed::Synth(b)) => Some(b.target_gain()),
            Some(Bed::Custom { gain, .. }) => Some(*gain),
            None => None,
        }
    }

    fn next_seed(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn release_bed(&mut self) {
        if self.bed.take().is_some() {
            self.stats.beds_released += 1;
        }
    }

    /// Render the next `out.len()` samples, overwriting `out`.
    pub fn render(&mut self, out: &mut [f32]) {
        out.iter_mut().for_each(|s| *s = 0.0);
        if let Some(Bed::Synth(bed)) = &mut self.bed {
            bed.mix_into(out);
        }
        for voice in self.voices.iter_mut() {
            voice.mix_into(out);
        }
        self.voices.retain(|v| !v.is_finished());
    }

    pub fn render_frames(&mut self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0f32; frames];
        self.render(&mut out);
        out
    }
}

/// Only local files (plain paths or `file://` URLs) that exist are accepted.
fn check_custom_source(source: &str) -> Result<(), AudioError> {
    let path = match source.strip_prefix("file://") {
        Some(path) => path,
        None if source.contains("://") => {
            return Err(AudioError::UnsupportedSource(format!(
                "{}: only local files are supported",
                source
            )))
        }
        None => source,
    };
    if !Path::new(path).is_file() {
        return Err(AudioError::UnsupportedSource(format!(
            "{}: not a readable file",
            source
        )));
    }
    Ok(())
}

impl AudioSink for Mixer {
    fn play_cue(&mut self, cue: &CueRequest) -> Result<(), AudioError> {
        let seed = self.next_seed();
        let voices = voices_for(cue, self.sample_rate, seed);
        self.voices.extend(voices);
        self.stats.cues_started += 1;
        Ok(())
    }

    fn start_ambient(&mut self, request: &AmbientRequest) -> Result<(), AudioError> {
        self.release_bed();
        let seed = self.next_seed();
        let bed = match &request.source {
            AmbientSource::Custom(source) if !source.is_empty() => {
                check_custom_source(source)?;
                Bed::Custom {
                    source: source.clone(),
                    gain: ambient_gain(request.volume, true),
                }
            }
            AmbientSource::Custom(_) => Bed::Synth(AmbientBed::new(
                fallback_profile(),
                request.volume,
                self.sample_rate,
                seed,
            )),
            AmbientSource::Synth(kind) => {
                let profile = profile_for(*kind).unwrap_or_else(fallback_profile);
                Bed::Synth(AmbientBed::new(profile, request.volume, self.sample_rate, seed))
            }
        };
        self.bed = Some(bed);
        self.stats.beds_started += 1;
        Ok(())
    }

    fn stop_ambient(&mut self) {
        self.release_bed();
    }

    fn set_ambient_volume(&mut self, volume: u8) -> Result<(), AudioError> {
        match &mut self.bed {
            Some(Bed::Synth(bed)) => bed.set_volume(volume),
            Some(Bed::Custom { gain, .. }) => *gain = ambient_gain(volume, true),
            None => {}
        }
        Ok(())
    }

    fn silence(&mut self) {
        self.voices.clear();
        self.release_bed();
    }
}

/// Cloneable handle so one clone can sit inside a session while another
/// pulls rendered audio out.
#[derive(Debug, Clone)]
pub struct SharedMixer(Arc<Mutex<Mixer>>);

impl SharedMixer {
    pub fn new(mixer: Mixer) -> Self {
        Self(Arc::new(Mutex::new(mixer)))
    }

    pub fn render_frames(&self, frames: usize) -> Vec<f32> {
        self.0.lock().render_frames(frames)
    }

    pub fn stats(&self) -> MixerStats {
        self.0.lock().stats()
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut Mixer) -> R) -> R {
        f(&mut self.0.lock())
    }
}

impl AudioSink for SharedMixer {
    fn play_cue(&mut self, cue: &CueRequest) -> Result<(), AudioError> {
        self.0.lock().play_cue(cue)
    }

    fn start_ambient(&mut self, request: &AmbientRequest) -> Result<(), AudioError> {
        self.0.lock().start_ambient(request)
    }

    fn stop_ambient(&mut self) {
        self.0.lock().stop_ambient()
    }

    fn set_ambient_volume(&mut self, volume: u8) -> Result<(), AudioError> {
        self.0.lock().set_ambient_volume(volume)
    }

    fn silence(&mut self) {
        self.0.lock().silence()
    }
}
