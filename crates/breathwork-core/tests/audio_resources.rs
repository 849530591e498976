use std::sync::Arc;

use breathwork_core::config::{BackgroundMusicType, BreathConfig, ConfigPatch, EngineConfig};
use breathwork_core::sensory::sink::{AmbientRequest, AudioError, AudioSink, CueKind, CueRequest};
use breathwork_core::session::TickOutcome;
use breathwork_core::{Coach, InMemorySettings, Mixer, SharedMixer};
use parking_lot::Mutex;

/// Counts live resources instead of producing sound.
#[derive(Debug, Default)]
struct Counts {
    cues: Vec<CueKind>,
    live_beds: i32,
    max_live_beds: i32,
    volumes: Vec<u8>,
    init_calls: u32,
}

#[derive(Clone, Default)]
struct CountingSink(Arc<Mutex<Counts>>);

impl AudioSink for CountingSink {
    fn init(&mut self) -> Result<(), AudioError> {
        self.0.lock().init_calls += 1;
        Ok(())
    }

    fn play_cue(&mut self, cue: &CueRequest) -> Result<(), AudioError> {
        self.0.lock().cues.push(cue.kind);
        Ok(())
    }

    fn start_ambient(&mut self, _request: &AmbientRequest) -> Result<(), AudioError> {
        let mut c = self.0.lock();
        if c.live_beds > 0 {
            c.live_beds -= 1;
        }
        c.live_beds += 1;
        c.max_live_beds = c.max_live_beds.max(c.live_beds);
        Ok(())
    }

    fn stop_ambient(&mut self) {
        let mut c = self.0.lock();
        if c.live_beds > 0 {
            c.live_beds -= 1;
        }
    }

    fn set_ambient_volume(&mut self, volume: u8) -> Result<(), AudioError> {
        self.0.lock().volumes.push(volume);
        Ok(())
    }
}

/// Sink whose device never opens.
struct DeadSink;

impl AudioSink for DeadSink {
    fn init(&mut self) -> Result<(), AudioError> {
        Err(AudioError::Init("no device".into()))
    }
    fn play_cue(&mut self, _cue: &CueRequest) -> Result<(), AudioError> {
        Err(AudioError::Playback("closed".into()))
    }
    fn start_ambient(&mut self, _request: &AmbientRequest) -> Result<(), AudioError> {
        Err(AudioError::Playback("closed".into()))
    }
    fn stop_ambient(&mut self) {}
    fn set_ambient_volume(&mut self, _volume: u8) -> Result<(), AudioError> {
        Err(AudioError::Playback("closed".into()))
    }
}

fn with_music() -> BreathConfig {
    BreathConfig {
        background_music_enabled: true,
        total_minutes: 0.0,
        ..BreathConfig::default()
    }
}

fn coach(sink: impl AudioSink + 'static) -> Coach {
    Coach::new(
        Box::new(InMemorySettings::new(with_music())),
        Box::new(sink),
        &EngineConfig::default(),
    )
}

#[test]
fn restarting_ambient_never_leaks_a_bed() {
    let sink = CountingSink::default();
    let mut c = coach(sink.clone());
    c.start().unwrap();
    c.start().unwrap();
    for kind in [
        BackgroundMusicType::Rain,
        BackgroundMusicType::Fire,
        BackgroundMusicType::Custom,
    ] {
        c.update_config(&ConfigPatch {
            background_music_type: Some(kind),
            ..Default::default()
        })
        .unwrap();
    }
    c.toggle().unwrap();
    c.toggle().unwrap();

    let counts = sink.0.lock();
    assert_eq!(counts.live_beds, 1);
    assert_eq!(counts.max_live_beds, 1);
}

#[test]
fn cues_follow_phase_entries() {
    let sink = CountingSink::default();
    let mut c = coach(sink.clone());
    c.start().unwrap();
    for _ in 0..190 {
        c.tick();
    }
    assert_eq!(
        sink.0.lock().cues,
        vec![CueKind::Inhale, CueKind::Hold, CueKind::Exhale, CueKind::Inhale]
    );
}

#[test]
fn cycle_chime_when_enabled() {
    let sink = CountingSink::default();
    let engine = EngineConfig {
        cycle_chime: true,
        ..EngineConfig::default()
    };
    let mut c = Coach::new(
        Box::new(InMemorySettings::new(with_music())),
        Box::new(sink.clone()),
        &engine,
    );
    c.start().unwrap();
    for _ in 0..190 {
        c.tick();
    }
    let cues = sink.0.lock().cues.clone();
    assert_eq!(cues.iter().filter(|k| **k == CueKind::CycleComplete).count(), 1);
    // the chime sounds before the new inhale
    assert_eq!(&cues[cues.len() - 2..], &[CueKind::CycleComplete, CueKind::Inhale]);
}

#[test]
fn ending_the_session_stops_the_bed() {
    let sink = CountingSink::default();
    let mut c = coach(sink.clone());
    c.update_config(&ConfigPatch {
        total_minutes: Some(0.1),
        ..Default::default()
    })
    .unwrap();
    c.start().unwrap();
    assert_eq!(sink.0.lock().live_beds, 1);
    let mut outcome = TickOutcome::Counting;
    for _ in 0..60 {
        outcome = c.tick();
    }
    assert!(matches!(outcome, TickOutcome::Ended(_)));
    assert_eq!(sink.0.lock().live_beds, 0);
}

#[test]
fn dead_audio_does_not_disturb_timing() {
    let mut c = coach(DeadSink);
    c.start().unwrap();
    c.update_config(&ConfigPatch {
        background_music_volume: Some(10),
        ..Default::default()
    })
    .unwrap();
    for _ in 0..190 {
        c.tick();
    }
    assert_eq!(c.state().current_cycle, 2);
}

#[test]
fn audio_init_once_per_start() {
    let sink = CountingSink::default();
    let mut c = coach(sink.clone());
    c.start().unwrap();
    c.toggle().unwrap();
    c.toggle().unwrap();
    assert_eq!(sink.0.lock().init_calls, 1);
}

#[test]
fn mixer_renders_a_whole_session() {
    let mixer = SharedMixer::new(Mixer::new(8_000, 21));
    let mut c = Coach::new(
        Box::new(InMemorySettings::new(with_music())),
        Box::new(mixer.clone()),
        &EngineConfig::default(),
    );
    c.start().unwrap();
    let frames_per_tick = 800;
    let mut peak = 0.0f32;
    for _ in 0..190 {
        c.tick();
        for s in mixer.render_frames(frames_per_tick) {
            peak = peak.max(s.abs());
        }
    }
    assert!(peak > 0.0 && peak <= 1.0, "peak {}", peak);
    assert_eq!(mixer.stats().live_beds(), 1);
    assert_eq!(mixer.stats().cues_started, 4);
    c.reset();
    assert_eq!(mixer.stats().live_beds(), 0);
}

#[test]
fn live_volume_reaches_the_sink() {
    let sink = CountingSink::default();
    let mut c = coach(sink.clone());
    c.start().unwrap();
    c.update_config(&ConfigPatch {
        background_music_volume: Some(80),
        ..Default::default()
    })
    .unwrap();
    assert_eq!(sink.0.lock().volumes, vec![80]);
    // volume set while paused takes effect on resume, not through the sink
    c.toggle().unwrap();
    c.update_config(&ConfigPatch {
        background_music_volume: Some(20),
        ..Default::default()
    })
    .unwrap();
    assert_eq!(sink.0.lock().volumes, vec![80]);
}
