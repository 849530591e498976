#[cfg(test)]
mod tests {
    use crate::config::*;
    use std::env;
    use std::fs;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_from_toml_string() {
        let toml_str = r#"
            [breathing]
            inhale_seconds = 5.5
            hold_seconds = 0.0
            exhale_seconds = 6.5
            hold_after_exhale_seconds = 1.0
            total_minutes = 10.0
            sound_type = "breath-noise"
            background_music_enabled = true
            background_music_type = "windLight"

            [[breathing.custom_patterns]]
            id = "evening"
            name = "Evening"
            inhale_seconds = 4.0
            hold_seconds = 2.0
            exhale_seconds = 8.0
            hold_after_exhale_seconds = 0.0

            [engine]
            tick_ms = 50
            cycle_chime = true
        "#;

        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_ok());

        assert_eq!(config.breathing.inhale_seconds, 5.5);
        assert_eq!(config.breathing.sound_type, SoundType::BreathNoise);
        assert_eq!(
            config.breathing.background_music_type,
            BackgroundMusicType::WindLight
        );
        assert_eq!(config.breathing.custom_patterns[0].id, "evening");
        assert!(!config.breathing.custom_patterns[0].is_built_in);
        assert_eq!(config.engine.tick_ms, 50);
        // omitted keys keep their defaults
        assert_eq!(config.breathing.sound_volume, 70);
        assert_eq!(config.engine.sample_rate, 44_100);
    }

    #[test]
    fn test_config_save_and_load() {
        let mut config = AppConfig::default();
        config.breathing.total_cycles = 12;
        config.engine.noise_seed = Some(99);

        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();
        config.save_to_file(path).unwrap();

        let loaded = AppConfig::from_file(path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_file_rejected() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(
            temp_file.path(),
            "[breathing]\ninhale_seconds = 0.0\nhold_seconds = 0.0\nexhale_seconds = 0.0\n",
        )
        .unwrap();
        assert!(matches!(
            AppConfig::from_file(temp_file.path()),
            Err(ConfigError::Validation(_))
        ));

        fs::write(temp_file.path(), "[breathing\n").unwrap();
        assert!(matches!(
            AppConfig::from_file(temp_file.path()),
            Err(ConfigError::TomlParse(_))
        ));
    }

    #[test]
    fn test_config_env_overrides() {
        env::set_var("BREATHWORK_TICK_MS", "250");
        env::set_var("BREATHWORK_HOLD_SECONDS", "3.5");

        let mut config = AppConfig::default();
        config.apply_env_overrides().unwrap();

        assert_eq!(config.engine.tick_ms, 250);
        assert_eq!(config.breathing.hold_seconds, 3.5);

        env::remove_var("BREATHWORK_TICK_MS");
        env::remove_var("BREATHWORK_HOLD_SECONDS");
    }

    #[cfg(unix)]
    #[test]
    fn test_non_unicode_env_value_rejected() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let key = "BREATHWORK_TEST_NOT_UNICODE";
        env::set_var(key, OsStr::from_bytes(&[0x66, 0x6f, 0x80]));
        assert!(matches!(env_value(key), Err(ConfigError::EnvVar(_))));
        env::set_var(key, "ok");
        assert_eq!(env_value(key).unwrap().as_deref(), Some("ok"));
        env::remove_var(key);
        assert!(env_value(key).unwrap().is_none());
    }

    #[test]
    fn test_config_layered_loading() {
        let default_file = NamedTempFile::new().unwrap();
        let user_file = NamedTempFile::new().unwrap();

        let mut default_config = AppConfig::default();
        default_config.engine.cycle_chime = true;
        default_config.breathing.total_minutes = 20.0;
        default_config.save_to_file(default_file.path()).unwrap();

        // user file only names the breathing section
        fs::write(
            user_file.path(),
            "[breathing]\ntotal_minutes = 3.0\nsound_type = \"breath-noise\"\n",
        )
        .unwrap();

        let loaded =
            AppConfig::load_layered(Some(default_file.path()), Some(user_file.path())).unwrap();

        assert_eq!(loaded.breathing.total_minutes, 3.0);
        assert_eq!(loaded.breathing.sound_type, SoundType::BreathNoise);
        assert!(loaded.engine.cycle_chime);
    }

    #[test]
    fn test_missing_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let loaded = AppConfig::load_layered(Some(&missing), Some(&missing)).unwrap();
        assert_eq!(loaded.breathing.sound_volume, 70);
        assert_eq!(loaded.engine.sample_rate, 44_100);
    }
}
