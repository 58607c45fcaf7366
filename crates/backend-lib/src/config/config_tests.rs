use super::*;
use figment::Jail;
use std::path::PathBuf;

#[test]
fn test_settings_validation() {
    let settings = Settings::default();
    assert!(settings.validate().is_ok());

    // Test invalid log level
    let mut invalid_settings = settings.clone();
    invalid_settings.log_level = "invalid".to_string();
    assert!(invalid_settings.validate().is_err());

    // Test zero intervals
    let mut invalid_settings = settings.clone();
    invalid_settings.save_interval_secs = 0;
    assert!(invalid_settings.validate().is_err());

    // Test cleanup shorter than save
    let mut invalid_settings = settings.clone();
    invalid_settings.save_interval_secs = 60;
    invalid_settings.cleanup_interval_secs = 30;
    assert!(invalid_settings.validate().is_err());

    // Test empty encryption key
    let mut invalid_settings = settings.clone();
    invalid_settings.encryption_key = Some(String::new());
    assert!(invalid_settings.validate().is_err());

    // Test zero storage timeout
    let mut invalid_settings = settings;
    invalid_settings.storage.timeout_ms = 0;
    assert!(invalid_settings.validate().is_err());
}

#[test]
fn test_defaults_match_reference_deployment() {
    let settings = Settings::default();
    assert_eq!(settings.bind_addr.port(), 5829);
    assert_eq!(settings.save_interval(), Duration::from_secs(60));
    assert_eq!(settings.cleanup_interval(), Duration::from_secs(300));
    assert_eq!(settings.cleanup_interval_secs % settings.save_interval_secs, 0);
    assert!(settings.storage.path.is_none());
    assert!(settings.encryption_key.is_none());
}

#[test]
fn test_load_settings() {
    Jail::expect_with(|jail| {
        jail.create_file(
            DEFAULT_TOML_FILE,
            r#"
            bind_addr = "127.0.0.1:3000"
            log_level = "debug"
            save_interval_secs = 10

            [storage]
            path = "test_data"
            "#,
        )?;

        // Environment variable takes precedence
        jail.set_env("LIVEPAD_LOG_LEVEL", "warn");
        jail.set_env("LIVEPAD_STORAGE__TIMEOUT_MS", "250");

        let settings = Settings::load().expect("settings should load");
        assert_eq!(settings.bind_addr.to_string(), "127.0.0.1:3000");
        assert_eq!(settings.log_level, "warn");
        assert_eq!(settings.save_interval_secs, 10);
        assert_eq!(settings.cleanup_interval_secs, 300);
        assert_eq!(settings.storage.path, Some(PathBuf::from("test_data")));
        assert_eq!(settings.storage_timeout(), Duration::from_millis(250));
        Ok(())
    });
}

#[test]
fn test_load_from_rejects_invalid_file() {
    Jail::expect_with(|jail| {
        jail.create_file("bad.toml", "save_interval_secs = 0")?;
        assert!(Settings::load_from("bad.toml").is_err());
        assert!(Settings::load_from("missing.toml").is_err());
        Ok(())
    });
}

#[test]
fn test_load_without_files_uses_defaults() {
    Jail::expect_with(|_jail| {
        let settings = Settings::load().expect("defaults should load");
        assert_eq!(settings, Settings::default());
        Ok(())
    });
}
