use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::breath_patterns::BreathPattern;
use crate::phase_machine::{secs_to_ms, PhaseDurations};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

/// Longest accepted phase, in seconds.
pub const MAX_PHASE_SECONDS: f64 = 3600.0;

/// Timbre of the per-phase cue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SoundType {
    #[default]
    Beep,
    #[serde(alias = "noise")]
    BreathNoise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum BackgroundMusicType {
    WhiteNoise,
    #[default]
    Ocean,
    Wind,
    Rain,
    Fire,
    WindLight,
    Sea,
    Custom,
}

impl BackgroundMusicType {
    pub const ALL: [BackgroundMusicType; 8] = [
        Self::WhiteNoise,
        Self::Ocean,
        Self::Wind,
        Self::Rain,
        Self::Fire,
        Self::WindLight,
        Self::Sea,
        Self::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WhiteNoise => "whiteNoise",
            Self::Ocean => "ocean",
            Self::Wind => "wind",
            Self::Rain => "rain",
            Self::Fire => "fire",
            Self::WindLight => "windLight",
            Self::Sea => "sea",
            Self::Custom => "custom",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
    }
}

/// The breathing configuration read by the timer loop.
///
/// Durations are seconds and may be fractional; `0` skips the phase.
/// `total_minutes == 0` and `total_cycles == 0` both mean "no limit".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreathConfig {
    pub inhale_seconds: f64,
    pub hold_seconds: f64,
    pub exhale_seconds: f64,
    pub hold_after_exhale_seconds: f64,
    pub total_minutes: f64,
    pub total_cycles: u32,
    pub sound_enabled: bool,
    pub sound_type: SoundType,
    pub sound_volume: u8,
    pub background_music_enabled: bool,
    pub background_music_type: BackgroundMusicType,
    pub background_music_volume: u8,
    pub custom_music_source: Option<String>,
    pub current_pattern_id: String,
    pub custom_patterns: Vec<BreathPattern>,
}

impl Default for BreathConfig {
    fn default() -> Self {
        Self {
            inhale_seconds: 4.0,
            hold_seconds: 7.0,
            exhale_seconds: 8.0,
            hold_after_exhale_seconds: 0.0,
            total_minutes: 5.0,
            total_cycles: 0,
            sound_enabled: true,
            sound_type: SoundType::Beep,
            sound_volume: 70,
            background_music_enabled: false,
            background_music_type: BackgroundMusicType::Ocean,
            background_music_volume: 50,
            custom_music_source: None,
            current_pattern_id: "4-7-8".to_string(),
            custom_patterns: Vec::new(),
        }
    }
}

impl BreathConfig {
    pub fn durations(&self) -> PhaseDurations {
        PhaseDurations::from_seconds(
            self.inhale_seconds,
            self.hold_seconds,
            self.exhale_seconds,
            self.hold_after_exhale_seconds,
        )
    }

    /// Session cap in milliseconds, `0` when unlimited.
    pub fn total_limit_ms(&self) -> u64 {
        secs_to_ms(self.total_minutes * 60.0)
    }

    /// Merge a partial update. Fields left as `None` keep their value.
    pub fn apply_patch(&mut self, patch: &ConfigPatch) {
        macro_rules! merge {
            ($($field:ident),* $(,)?) => {
                $(if let Some(v) = &patch.$field { self.$field = v.clone(); })*
            };
        }
        merge!(
            inhale_seconds,
            hold_seconds,
            exhale_seconds,
            hold_after_exhale_seconds,
            total_minutes,
            total_cycles,
            sound_enabled,
            sound_type,
            sound_volume,
            background_music_enabled,
            background_music_type,
            background_music_volume,
            current_pattern_id,
            custom_patterns,
        );
        if let Some(source) = &patch.custom_music_source {
            self.custom_music_source = source.clone();
        }
    }

    pub fn patched(&self, patch: &ConfigPatch) -> Self {
        let mut next = self.clone();
        next.apply_patch(patch);
        next
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let phases = [
            ("inhale_seconds", self.inhale_seconds),
            ("hold_seconds", self.hold_seconds),
            ("exhale_seconds", self.exhale_seconds),
            ("hold_after_exhale_seconds", self.hold_after_exhale_seconds),
        ];
        for (name, value) in phases {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Validation(format!(
                    "breathing.{} must be a non-negative number",
                    name
                )));
            }
            if value > MAX_PHASE_SECONDS {
                return Err(ConfigError::Validation(format!(
                    "breathing.{} must be at most {} seconds",
                    name, MAX_PHASE_SECONDS
                )));
            }
        }
        if self.durations().is_empty() {
            return Err(ConfigError::Validation(
                "at least one phase duration must be positive".to_string(),
            ));
        }
        if !self.total_minutes.is_finite() || self.total_minutes < 0.0 {
            return Err(ConfigError::Validation(
                "breathing.total_minutes must be >= 0".to_string(),
            ));
        }
        if self.sound_volume > 100 {
            return Err(ConfigError::Validation(
                "breathing.sound_volume must be in [0, 100]".to_string(),
            ));
        }
        if self.background_music_volume > 100 {
            return Err(ConfigError::Validation(
                "breathing.background_music_volume must be in [0, 100]".to_string(),
            ));
        }
        Ok(())
    }
}

/// Partial configuration written through the settings store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigPatch {
    pub inhale_seconds: Option<f64>,
    pub hold_seconds: Option<f64>,
    pub exhale_seconds: Option<f64>,
    pub hold_after_exhale_seconds: Option<f64>,
    pub total_minutes: Option<f64>,
    pub total_cycles: Option<u32>,
    pub sound_enabled: Option<bool>,
    pub sound_type: Option<SoundType>,
    pub sound_volume: Option<u8>,
    pub background_music_enabled: Option<bool>,
    pub background_music_type: Option<BackgroundMusicType>,
    pub background_music_volume: Option<u8>,
    /// `Some(None)` clears the custom source.
    pub custom_music_source: Option<Option<String>>,
    pub current_pattern_id: Option<String>,
    pub custom_patterns: Option<Vec<BreathPattern>>,
}

impl ConfigPatch {
    pub fn durations(inhale: f64, hold: f64, exhale: f64, hold_after_exhale: f64) -> Self {
        Self {
            inhale_seconds: Some(inhale),
            hold_seconds: Some(hold),
            exhale_seconds: Some(exhale),
            hold_after_exhale_seconds: Some(hold_after_exhale),
            ..Default::default()
        }
    }
}

/// Runtime knobs that are not part of the user's breathing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Tick granularity shared by sessions and the resonance test.
    pub tick_ms: u64,
    pub sample_rate: u32,
    /// Minutes spent on each resonance preset.
    pub resonance_minutes_per_preset: f64,
    pub skip_rating: bool,
    /// Play the C-E-G chime on every completed cycle.
    pub cycle_chime: bool,
    /// Seed for the noise generators; `None` draws from the OS.
    pub noise_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            sample_rate: 44_100,
            resonance_minutes_per_preset: 2.0,
            skip_rating: true,
            cycle_chime: false,
            noise_seed: None,
        }
    }
}

impl EngineConfig {
    /// Configured noise seed, or a fresh random one.
    pub fn seed(&self) -> u64 {
        self.noise_seed.unwrap_or_else(rand::random)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(10..=1000).contains(&self.tick_ms) {
            return Err(ConfigError::Validation(
                "engine.tick_ms must be in [10, 1000]".to_string(),
            ));
        }
        if !(8_000..=192_000).contains(&self.sample_rate) {
            return Err(ConfigError::Validation(
                "engine.sample_rate must be in [8000, 192000]".to_string(),
            ));
        }
        validate_preset_minutes(self.resonance_minutes_per_preset)?;
        Ok(())
    }
}

/// Per-preset resonance duration: 0.5 to 10 minutes in half-minute steps.
pub fn validate_preset_minutes(minutes: f64) -> Result<(), ConfigError> {
    let halves = minutes * 2.0;
    if !(0.5..=10.0).contains(&minutes) || (halves - halves.round()).abs() > 1e-9 {
        return Err(ConfigError::Validation(
            "resonance minutes per preset must be in [0.5, 10] in steps of 0.5".to_string(),
        ));
    }
    Ok(())
}

/// An unset variable is `None`; a set but non-Unicode one is an error.
pub(crate) fn env_value(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(val) => Ok(Some(val)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub breathing: BreathConfig,
    pub engine: EngineConfig,
}

impl AppConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    /// Environment variables should be prefixed with BREATHWORK_
    /// Example: BREATHWORK_TICK_MS=1000
    pub fn from_file_with_env<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. User config file (if exists)
    /// 3. Default config file
    /// 4. Built-in defaults (lowest priority)
    pub fn load_layered(
        default_path: Option<&Path>,
        user_path: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let mut config = AppConfig::default();

        if let Some(path) = default_path {
            if path.exists() {
                config = Self::from_file(path)?;
            }
        }

        // User file replaces whole sections it names; omitted sections keep the
        // layer below.
        if let Some(path) = user_path {
            if path.exists() {
                let content = fs::read_to_string(path)?;
                let table: toml::Table = toml::from_str(&content)?;
                if let Some(section) = table.get("breathing") {
                    config.breathing = section.clone().try_into()?;
                }
                if let Some(section) = table.get("engine") {
                    config.engine = section.clone().try_into()?;
                }
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    pub(crate) fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        fn parse<T: std::str::FromStr>(key: &str, val: &str) -> Result<T, ConfigError> {
            val.parse()
                .map_err(|_| ConfigError::Validation(format!("Invalid {}", key)))
        }

        if let Some(val) = env_value("BREATHWORK_INHALE_SECONDS")? {
            self.breathing.inhale_seconds = parse("BREATHWORK_INHALE_SECONDS", &val)?;
        }
        if let Some(val) = env_value("BREATHWORK_HOLD_SECONDS")? {
            self.breathing.hold_seconds = parse("BREATHWORK_HOLD_SECONDS", &val)?;
        }
        if let Some(val) = env_value("BREATHWORK_EXHALE_SECONDS")? {
            self.breathing.exhale_seconds = parse("BREATHWORK_EXHALE_SECONDS", &val)?;
        }
        if let Some(val) = env_value("BREATHWORK_HOLD_AFTER_EXHALE_SECONDS")? {
            self.breathing.hold_after_exhale_seconds =
                parse("BREATHWORK_HOLD_AFTER_EXHALE_SECONDS", &val)?;
        }
        if let Some(val) = env_value("BREATHWORK_TOTAL_MINUTES")? {
            self.breathing.total_minutes = parse("BREATHWORK_TOTAL_MINUTES", &val)?;
        }
        if let Some(val) = env_value("BREATHWORK_SOUND_ENABLED")? {
            self.breathing.sound_enabled = parse("BREATHWORK_SOUND_ENABLED", &val)?;
        }

        if let Some(val) = env_value("BREATHWORK_TICK_MS")? {
            self.engine.tick_ms = parse("BREATHWORK_TICK_MS", &val)?;
        }
        if let Some(val) = env_value("BREATHWORK_SAMPLE_RATE")? {
            self.engine.sample_rate = parse("BREATHWORK_SAMPLE_RATE", &val)?;
        }
        if let Some(val) = env_value("BREATHWORK_NOISE_SEED")? {
            self.engine.noise_seed = Some(parse("BREATHWORK_NOISE_SEED", &val)?);
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.breathing.validate()?;
        self.engine.validate()?;
        Ok(())
    }

    /// Export configuration to TOML string
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = self
            .to_toml_string()
            .map_err(|e| ConfigError::Validation(format!("TOML serialization error: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn all_zero_durations_rejected() {
        let cfg = BreathConfig {
            inhale_seconds: 0.0,
            hold_seconds: 0.0,
            exhale_seconds: 0.0,
            hold_after_exhale_seconds: 0.0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn negative_or_nan_duration_rejected() {
        let cfg = BreathConfig {
            hold_seconds: -1.0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = BreathConfig {
            exhale_seconds: f64::NAN,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn oversized_duration_rejected() {
        let cfg = BreathConfig {
            inhale_seconds: 1e300,
            exhale_seconds: 1e300,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));

        let cfg = BreathConfig {
            hold_seconds: MAX_PHASE_SECONDS,
            ..Default::default()
        };
        assert!(cfg.validate().is_ok());
        let cfg = BreathConfig {
            hold_seconds: MAX_PHASE_SECONDS + 0.5,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn volume_out_of_range_rejected() {
        let cfg = BreathConfig {
            background_music_volume: 101,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn patch_merges_only_named_fields() {
        let mut cfg = BreathConfig::default();
        cfg.apply_patch(&ConfigPatch {
            exhale_seconds: Some(6.5),
            custom_music_source: Some(Some("file:///rain.ogg".into())),
            ..Default::default()
        });
        assert_eq!(cfg.exhale_seconds, 6.5);
        assert_eq!(cfg.inhale_seconds, 4.0);
        assert_eq!(cfg.custom_music_source.as_deref(), Some("file:///rain.ogg"));

        cfg.apply_patch(&ConfigPatch {
            custom_music_source: Some(None),
            ..Default::default()
        });
        assert!(cfg.custom_music_source.is_none());
    }

    #[test]
    fn fractional_total_minutes_to_ms() {
        let cfg = BreathConfig {
            total_minutes: 0.5,
            ..Default::default()
        };
        assert_eq!(cfg.total_limit_ms(), 30_000);
    }

    #[test]
    fn preset_minutes_step() {
        assert!(validate_preset_minutes(2.0).is_ok());
        assert!(validate_preset_minutes(0.5).is_ok());
        assert!(validate_preset_minutes(0.75).is_err());
        assert!(validate_preset_minutes(12.0).is_err());
    }

    #[test]
    fn tick_out_of_range_rejected() {
        let cfg = EngineConfig {
            tick_ms: 5,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn toml_round_trip_keeps_enums_readable() {
        let cfg = AppConfig::default();
        let text = cfg.to_toml_string().unwrap();
        assert!(text.contains("sound_type = \"beep\""));
        assert!(text.contains("background_music_type = \"ocean\""));
        let back: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn legacy_noise_alias_accepted() {
        let cfg: BreathConfig = toml::from_str("sound_type = \"noise\"").unwrap();
        assert_eq!(cfg.sound_type, SoundType::BreathNoise);
    }

    #[test]
    fn music_type_parse_is_case_insensitive() {
        assert_eq!(
            BackgroundMusicType::parse("windlight"),
            Some(BackgroundMusicType::WindLight)
        );
        assert_eq!(BackgroundMusicType::parse("jazz"), None);
    }
}
