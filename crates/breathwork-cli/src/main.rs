use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use breathwork_core::config::{AppConfig, BackgroundMusicType, ConfigPatch, SoundType};
use breathwork_core::phase_machine::Phase;
use breathwork_core::resonance::{TestStage, PRESETS};
use breathwork_core::session::TickOutcome;
use breathwork_core::{
    AudioSink, Coach, CoachSnapshot, Command, InMemorySettings, Mixer, NullSink, Runtime,
    SharedMixer,
};
use clap::{Args, Parser, Subcommand};
use hound::{SampleFormat, WavSpec, WavWriter};

#[derive(Parser)]
#[command(name = "breathwork", version, about = "Guided breathing sessions")]
struct Cli {
    /// Base configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// User configuration layered over the base file.
    #[arg(long, global = true)]
    user_config: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a breathing session.
    Run(RunArgs),
    /// Run the resonance frequency test, fast-forwarded.
    Resonance(ResonanceArgs),
    /// List the built-in and custom patterns.
    Patterns {
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration as TOML.
    Config,
}

#[derive(Args)]
struct RunArgs {
    /// Pattern id, e.g. 4-7-8 or 4-4-4-4.
    #[arg(long, conflicts_with = "durations")]
    pattern: Option<String>,
    /// Explicit inhale,hold,exhale,hold-after-exhale seconds.
    #[arg(long, value_delimiter = ',')]
    durations: Option<Vec<f64>>,
    #[arg(long)]
    minutes: Option<f64>,
    #[arg(long)]
    cycles: Option<u32>,
    #[arg(long, value_parser = parse_sound)]
    sound: Option<SoundType>,
    #[arg(long)]
    volume: Option<u8>,
    /// Background type (whiteNoise, ocean, wind, rain, fire, windLight, sea).
    #[arg(long, value_parser = parse_music)]
    music: Option<BackgroundMusicType>,
    #[arg(long)]
    music_volume: Option<u8>,
    /// Follow the wall clock instead of fast-forwarding.
    #[arg(long, conflicts_with = "wav")]
    realtime: bool,
    /// Render the session audio to a WAV file.
    #[arg(long)]
    wav: Option<PathBuf>,
    /// One JSON snapshot per phase change.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ResonanceArgs {
    /// Minutes per preset (0.5 to 10, step 0.5).
    #[arg(long)]
    minutes: Option<f64>,
    /// Six comma-separated ratings 1-5, one per preset. Without it rating is skipped.
    #[arg(long, value_delimiter = ',')]
    ratings: Option<Vec<String>>,
    #[arg(long)]
    wav: Option<PathBuf>,
}

fn parse_sound(s: &str) -> Result<SoundType, String> {
    match s {
        "beep" => Ok(SoundType::Beep),
        "breath-noise" | "noise" => Ok(SoundType::BreathNoise),
        other => Err(format!("unknown sound type: {}", other)),
    }
}

fn parse_music(s: &str) -> Result<BackgroundMusicType, String> {
    BackgroundMusicType::parse(s).ok_or_else(|| format!("unknown background type: {}", s))
}

fn parse_ratings(raw: &[String]) -> Result<Vec<u8>, String> {
    if raw.len() != PRESETS.len() {
        return Err(format!("expected {} ratings, got {}", PRESETS.len(), raw.len()));
    }
    raw.iter()
        .map(|r| match r.trim().parse::<u8>() {
            Ok(v) if (1..=5).contains(&v) => Ok(v),
            _ => Err(format!("bad rating: {:?} (expected 1-5)", r)),
        })
        .collect()
}

fn format_clock(ms: u64) -> String {
    let secs = ms / 1000;
    format!("{:02}:{:02}.{}", secs / 60, secs % 60, (ms % 1000) / 100)
}

fn print_snapshot(elapsed_ms: u64, snap: &CoachSnapshot, json: bool) {
    if json {
        match serde_json::to_string(snap) {
            Ok(line) => println!("{}", line),
            Err(e) => log::warn!("snapshot not serializable: {}", e),
        }
        return;
    }
    let s = &snap.session;
    println!(
        "{}  cycle {:>3}  {:<8} {:>5.1} s",
        format_clock(elapsed_ms),
        s.current_cycle,
        s.label,
        s.seconds_remaining
    );
}

/// Streams rendered mixer output into a 16-bit mono WAV file.
struct WavSink {
    mixer: SharedMixer,
    writer: WavWriter<std::io::BufWriter<std::fs::File>>,
    frames_per_tick: usize,
}

impl WavSink {
    fn create(path: &Path, sample_rate: u32, tick_ms: u64, seed: u64) -> Result<Self, hound::Error> {
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        Ok(Self {
            mixer: SharedMixer::new(Mixer::new(sample_rate, seed)),
            writer: WavWriter::create(path, spec)?,
            frames_per_tick: (sample_rate as u64 * tick_ms / 1000) as usize,
        })
    }

    fn write_tick(&mut self) -> Result<(), hound::Error> {
        for s in self.mixer.render_frames(self.frames_per_tick) {
            self.writer
                .write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
        }
        Ok(())
    }

    fn finalize(self) -> Result<(), hound::Error> {
        self.writer.finalize()
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load_layered(
        cli.config.as_deref(),
        cli.user_config.as_deref(),
    )?)
}

fn build_coach(app: &AppConfig, sink: Box<dyn AudioSink>) -> Coach {
    Coach::new(
        Box::new(InMemorySettings::new(app.breathing.clone())),
        sink,
        &app.engine,
    )
}

fn run_patch(args: &RunArgs) -> Result<ConfigPatch, String> {
    let mut patch = match &args.durations {
        Some(d) if d.len() != 4 => {
            return Err(format!("--durations takes 4 values, got {}", d.len()));
        }
        Some(d) => ConfigPatch {
            current_pattern_id: Some("custom".to_string()),
            ..ConfigPatch::durations(d[0], d[1], d[2], d[3])
        },
        None => ConfigPatch::default(),
    };
    patch.total_minutes = args.minutes;
    patch.total_cycles = args.cycles;
    patch.sound_type = args.sound;
    patch.sound_volume = args.volume;
    if let Some(music) = args.music {
        patch.background_music_enabled = Some(true);
        patch.background_music_type = Some(music);
    }
    patch.background_music_volume = args.music_volume;
    Ok(patch)
}

fn cmd_run(app: AppConfig, args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let tick_ms = app.engine.tick_ms;
    let mut wav = match &args.wav {
        Some(path) => Some(WavSink::create(path, app.engine.sample_rate, tick_ms, app.engine.seed())?),
        None => None,
    };
    let sink: Box<dyn AudioSink> = match &wav {
        Some(w) => Box::new(w.mixer.clone()),
        None => Box::new(NullSink),
    };
    let mut coach = build_coach(&app, sink);
    if let Some(id) = &args.pattern {
        coach.apply_pattern(id)?;
    }
    coach.update_config(&run_patch(&args)?)?;

    if args.realtime {
        return run_realtime(coach, args.json);
    }

    let cfg = coach.config();
    if cfg.total_minutes == 0.0 && cfg.total_cycles == 0 {
        return Err("an unlimited session cannot be fast-forwarded; pass --minutes, --cycles or --realtime".into());
    }

    coach.start()?;
    let mut elapsed_ms = 0u64;
    print_snapshot(elapsed_ms, &coach.snapshot(), args.json);
    loop {
        let outcome = coach.tick();
        elapsed_ms += tick_ms;
        if let Some(w) = wav.as_mut() {
            w.write_tick()?;
        }
        match outcome {
            TickOutcome::Entered(_) => print_snapshot(elapsed_ms, &coach.snapshot(), args.json),
            TickOutcome::Ended(reason) => {
                log::info!("finished after {} ({:?})", format_clock(elapsed_ms), reason);
                break;
            }
            _ => {}
        }
        if !coach.needs_ticking() {
            break;
        }
    }

    if let Some(w) = wav {
        let stats = w.mixer.stats();
        w.finalize()?;
        log::info!(
            "wrote {} cues, {} ambient beds",
            stats.cues_started,
            stats.beds_started
        );
    }
    Ok(())
}

fn run_realtime(mut coach: Coach, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let tick_ms = coach.tick_ms();
    let mut last: Option<(Phase, u32)> = None;
    let mut ticks = 0u64;
    coach.subscribe(move |snap: &CoachSnapshot| {
        ticks += 1;
        let key = (snap.session.phase, snap.session.current_cycle);
        if last != Some(key) {
            last = Some(key);
            print_snapshot(ticks.saturating_sub(1) * tick_ms, snap, json);
        }
    });

    let runtime = Runtime::spawn_default(coach);
    runtime.call(Command::Start)?;
    loop {
        thread::sleep(Duration::from_millis(200));
        let snap = runtime.snapshot()?;
        if snap.session.phase == Phase::Idle {
            break;
        }
    }
    runtime.shutdown()?;
    Ok(())
}

fn cmd_resonance(app: AppConfig, args: ResonanceArgs) -> Result<(), Box<dyn std::error::Error>> {
    let ratings = match &args.ratings {
        Some(raw) => Some(parse_ratings(raw)?),
        None => None,
    };
    let mut wav = match &args.wav {
        Some(path) => Some(WavSink::create(
            path,
            app.engine.sample_rate,
            app.engine.tick_ms,
            app.engine.seed(),
        )?),
        None => None,
    };
    let sink: Box<dyn AudioSink> = match &wav {
        Some(w) => Box::new(w.mixer.clone()),
        None => Box::new(NullSink),
    };
    let mut coach = build_coach(&app, sink);
    coach.start_resonance(args.minutes, Some(ratings.is_none()))?;

    let mut announced = usize::MAX;
    while coach.resonance().is_active {
        let index = coach.resonance().current_frequency_index;
        if index != announced {
            announced = index;
            let p = &PRESETS[index];
            println!(
                "preset {}/{}: {} bpm (inhale {} s, exhale {} s)",
                index + 1,
                PRESETS.len(),
                p.breaths_per_minute,
                p.inhale_seconds,
                p.exhale_seconds
            );
        }
        coach.tick();
        if let Some(w) = wav.as_mut() {
            w.write_tick()?;
        }
        if coach.resonance().stage == TestStage::Rating {
            if let Some(all) = &ratings {
                coach.rate_resonance(all[index])?;
            }
            coach.next_resonance()?;
        }
    }

    if let Some(w) = wav {
        w.finalize()?;
    }
    let st = coach.resonance();
    match st.resonant_preset() {
        Some(p) => println!(
            "resonant frequency: {} bpm (inhale {} s, exhale {} s)",
            p.breaths_per_minute, p.inhale_seconds, p.exhale_seconds
        ),
        None => println!("no resonant frequency found"),
    }
    Ok(())
}

fn cmd_patterns(app: AppConfig, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let coach = build_coach(&app, Box::new(NullSink));
    let patterns: Vec<_> = coach.patterns().all().cloned().collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&patterns)?);
        return Ok(());
    }
    for p in &patterns {
        println!(
            "{:<10} {:<10} {}/{}/{}/{}  {:.2} bpm{}",
            p.id,
            p.name,
            p.inhale_seconds,
            p.hold_seconds,
            p.exhale_seconds,
            p.hold_after_exhale_seconds,
            p.breaths_per_minute(),
            if p.is_built_in { "" } else { "  (custom)" }
        );
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let app = load_config(&cli)?;
    match cli.cmd {
        Commands::Run(args) => cmd_run(app, args)?,
        Commands::Resonance(args) => cmd_resonance(app, args)?,
        Commands::Patterns { json } => cmd_patterns(app, json)?,
        Commands::Config => print!("{}", app.to_toml_string()?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratings_need_one_value_per_preset() {
        let raw: Vec<String> = ["3", "4", "5", "2", "1", "2"].iter().map(|s| s.to_string()).collect();
        assert_eq!(parse_ratings(&raw).unwrap(), vec![3, 4, 5, 2, 1, 2]);
        let mut gap = raw.clone();
        gap[1] = "-".to_string();
        assert!(parse_ratings(&gap).is_err());
        let mut out_of_range = raw.clone();
        out_of_range[0] = "6".to_string();
        assert!(parse_ratings(&out_of_range).is_err());
        assert!(parse_ratings(&raw[..3]).is_err());
    }

    #[test]
    fn clock_formatting() {
        assert_eq!(format_clock(0), "00:00.0");
        assert_eq!(format_clock(61_500), "01:01.5");
    }

    #[test]
    fn cli_parses_durations() {
        let cli = Cli::try_parse_from(["breathwork", "run", "--durations", "4,0,6,0", "--minutes", "1"])
            .unwrap();
        match cli.cmd {
            Commands::Run(args) => {
                let patch = run_patch(&args).unwrap();
                assert_eq!(patch.exhale_seconds, Some(6.0));
                assert_eq!(patch.total_minutes, Some(1.0));
            }
            _ => panic!("expected run"),
        }
    }
}
