// tests/config_load.rs
use std::io::Write;

use serial_test::serial;

use job_radar::config::{AppConfig, ENV_CONFIG_PATH};

#[test]
fn shipped_config_parses() {
    let cfg = AppConfig::from_toml_str(include_str!("../config/job_radar.toml")).unwrap();
    assert_eq!(cfg.keywords, vec!["rust", "backend"]);
    assert_eq!(cfg.min_score, 70);
    assert_eq!(cfg.location.city.as_deref(), Some("Prague"));
    assert!(cfg.location.remote);
    let names: Vec<&str> = cfg.sources.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["remoteok", "weworkremotely"]);
    assert_eq!(cfg.scoring.daily_limit, 200);
    assert!(cfg.telegram.chat_ids.is_empty());
}

#[test]
#[serial]
fn env_path_takes_precedence() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        f,
        r#"
keywords = [" Rust ", "rust", "", "Go"]
min_score = 250
interval_secs = 0

[[sources]]
name = " RemoteOK "

[telegram]
chat_ids = [12345, -100200]
"#
    )
    .unwrap();

    std::env::set_var(ENV_CONFIG_PATH, f.path());
    let cfg = AppConfig::load_default();
    std::env::remove_var(ENV_CONFIG_PATH);
    let cfg = cfg.unwrap();

    assert_eq!(cfg.keywords, vec!["Rust", "Go"]);
    assert_eq!(cfg.min_score, 100);
    assert_eq!(cfg.interval_secs, 0);
    assert_eq!(cfg.sources.len(), 1);
    assert_eq!(cfg.sources[0].name, "remoteok");
    assert!(cfg.sources[0].enabled);
    assert_eq!(cfg.telegram.chat_ids.len(), 2);
}

#[test]
#[serial]
fn missing_env_path_is_an_error() {
    std::env::set_var(ENV_CONFIG_PATH, "/definitely/not/here.toml");
    let res = AppConfig::load_default();
    std::env::remove_var(ENV_CONFIG_PATH);
    assert!(res.is_err());
}

#[test]
fn unknown_source_name_fails_to_build() {
    let cfg = AppConfig::from_toml_str(
        r#"
[[sources]]
name = "linkedin"
"#,
    )
    .unwrap();
    let registry = job_radar::sources::SourceRegistry::with_builtin();
    assert!(registry.build_enabled(&cfg.sources).is_err());
}
