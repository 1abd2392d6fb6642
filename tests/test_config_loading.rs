//! Configuration loading and validation tests
//!
//! Tests focus on observable behavior of loading files and resolving secrets.

use std::io::Write;
use tempfile::NamedTempFile;
use toby::config::{BotConfig, ConfigError, DEFAULT_BROKER_URL};

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "{content}").unwrap();
    temp_file
}

#[test]
fn test_config_loads_successfully_from_valid_toml() {
    let temp_file = write_config(
        r#"
[bot]
id = "kitchen-lights"
secret = "hunter2"

[mqtt]
broker_url = "mqtt://localhost:1883"
keep_alive_secs = 15

[logging]
level = "debug"
format = "pretty"
"#,
    );

    let config = BotConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.bot.id, "kitchen-lights");
    assert_eq!(config.mqtt.broker_url, "mqtt://localhost:1883");
    assert_eq!(config.mqtt.keep_alive_secs, 15);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.resolve_secret().unwrap(), "hunter2");
}

#[test]
fn test_minimal_config_uses_defaults() {
    let temp_file = write_config("[bot]\nid = \"minimal\"\n");

    let config = BotConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.mqtt.broker_url, DEFAULT_BROKER_URL);
    assert_eq!(config.mqtt.keep_alive_secs, 30);
    assert_eq!(config.logging.format, "json");
    assert!(!config.logging.spans);
}

#[test]
fn test_missing_file_is_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = BotConfig::load_from_file(&dir.path().join("absent.toml"));
    assert!(matches!(result, Err(ConfigError::FileRead(_))));
}

#[test]
fn test_malformed_toml_is_parse_error() {
    let temp_file = write_config("[bot\nid = ");
    let result = BotConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_missing_bot_section_is_parse_error() {
    let temp_file = write_config("[mqtt]\nbroker_url = \"mqtt://localhost\"\n");
    let result = BotConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_invalid_bot_id_rejected_on_load() {
    for id in ["", "a/b", "wild#card", "has space"] {
        let temp_file = write_config(&format!("[bot]\nid = \"{id}\"\n"));
        let result = BotConfig::load_from_file(temp_file.path());
        assert!(
            matches!(result, Err(ConfigError::InvalidBotId(_))),
            "expected {id:?} to be rejected"
        );
    }
}

#[test]
fn test_secret_env_wins_over_inline_secret() {
    let var = "TOBY_TEST_SECRET_CONFIG_LOADING";
    std::env::set_var(var, "from-env");

    let temp_file = write_config(&format!(
        "[bot]\nid = \"envbot\"\nsecret = \"inline\"\nsecret_env = \"{var}\"\n"
    ));
    let config = BotConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.resolve_secret().unwrap(), "from-env");
    std::env::remove_var(var);
}

#[test]
fn test_unset_secret_env_is_error() {
    let temp_file =
        write_config("[bot]\nid = \"envbot\"\nsecret_env = \"TOBY_TEST_SECRET_NEVER_SET\"\n");
    let config = BotConfig::load_from_file(temp_file.path()).unwrap();

    assert!(matches!(
        config.resolve_secret(),
        Err(ConfigError::EnvVarNotFound(name)) if name == "TOBY_TEST_SECRET_NEVER_SET"
    ));
}

#[test]
fn test_no_secret_is_error() {
    let config = BotConfig::new("lonely");
    assert!(matches!(
        config.resolve_secret(),
        Err(ConfigError::MissingSecret(_))
    ));
}

#[test]
fn test_config_round_trips_through_toml() {
    let mut config = BotConfig::new("roundtrip");
    config.bot.secret_env = Some("TOBY_SECRET".to_string());

    let rendered = toml::to_string_pretty(&config).unwrap();
    let parsed = BotConfig::from_toml_str(&rendered).unwrap();
    assert_eq!(parsed, config);
}
