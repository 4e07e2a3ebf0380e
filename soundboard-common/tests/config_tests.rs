//! Configuration file resolution and loading tests
//!
//! Tests that touch SOUNDBOARD_CONFIG are marked #[serial] so they never
//! race on the process environment.

use serial_test::serial;
use soundboard_common::config::{resolve_config_file, ConfigSource, CONFIG_ENV_VAR};
use soundboard_common::{Error, SoundboardConfig};
use std::env;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
#[serial]
fn test_cli_argument_has_highest_priority() {
    env::set_var(CONFIG_ENV_VAR, "/from/env.toml");

    let source = resolve_config_file(Some(&PathBuf::from("/from/cli.toml")));
    assert_eq!(source, ConfigSource::Explicit(PathBuf::from("/from/cli.toml")));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_env_var_used_without_cli_argument() {
    env::set_var(CONFIG_ENV_VAR, "/from/env.toml");

    let source = resolve_config_file(None);
    assert_eq!(source, ConfigSource::Explicit(PathBuf::from("/from/env.toml")));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_load_explicit_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
        sample_path = "/srv/sounds"
        themesongs = "/srv/themes"

        [webserver]
        port = 9090

        [mpd]
        enabled = false
        duck_volume = 40

        [mpd.ramp]
        steps = 8
        delay_ms = 10

        [logging]
        level = "debug"
        "#,
    )
    .unwrap();

    let config = SoundboardConfig::load(Some(&path)).unwrap();
    assert_eq!(config.sample_path, PathBuf::from("/srv/sounds"));
    assert_eq!(config.themesongs, Some(PathBuf::from("/srv/themes")));
    assert_eq!(config.webserver.port, 9090);
    assert!(!config.mpd.enabled);
    assert_eq!(config.mpd.duck_volume, 40);
    assert_eq!(config.mpd.ramp.steps, 8);
    assert_eq!(config.logging.level, "debug");
}

#[test]
#[serial]
fn test_missing_explicit_file_is_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");

    let result = SoundboardConfig::load(Some(&missing));
    assert!(matches!(result, Err(Error::Config(_))));
}
