use looper_rs::build_check::ApiLevel;
use looper_rs::config::Config;
use std::sync::Mutex;

// Tests in this file mutate process-wide environment variables.
static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    unsafe {
        std::env::remove_var("LOOPER_API_LEVEL");
        std::env::remove_var("OTEL_ENDPOINT");
        std::env::remove_var("LOG_LEVEL");
    }
}

#[test]
fn config_from_env_uses_defaults() {
    let _lock = ENV_LOCK.lock().unwrap();
    clear_env();

    let config = Config::from_env().unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.log_level, "info");
    assert!(config.api_level.is_none());
}

#[test]
fn config_from_env_reads_overrides() {
    let _lock = ENV_LOCK.lock().unwrap();
    clear_env();
    unsafe {
        std::env::set_var("LOOPER_API_LEVEL", "31");
        std::env::set_var("OTEL_ENDPOINT", "http://localhost:4317");
        std::env::set_var("LOG_LEVEL", "debug");
    }

    let config = Config::from_env().unwrap();
    assert_eq!(config.api_level, Some(ApiLevel(31)));
    assert_eq!(config.otel_endpoint.as_deref(), Some("http://localhost:4317"));
    assert_eq!(config.log_level, "debug");

    clear_env();
}

#[test]
fn config_from_env_rejects_bad_api_level() {
    let _lock = ENV_LOCK.lock().unwrap();
    clear_env();
    unsafe {
        std::env::set_var("LOOPER_API_LEVEL", "tiramisu");
    }

    assert!(Config::from_env().is_err());

    clear_env();
}

#[test]
fn config_from_toml_parses_fields() {
    let config = Config::from_toml(
        r#"
        api_level = 23
        log_level = "warn"
        "#,
    )
    .unwrap();
    assert_eq!(config.api_level, Some(ApiLevel(23)));
    assert_eq!(config.log_level, "warn");
    assert!(config.otel_endpoint.is_none());
}

#[test]
fn config_from_toml_rejects_unknown_keys() {
    assert!(Config::from_toml("sdk_int = 21").is_err());
}

#[test]
fn config_load_applies_env_over_file() {
    let _lock = ENV_LOCK.lock().unwrap();
    clear_env();

    let path = std::env::temp_dir().join(format!("looper-config-{}.toml", std::process::id()));
    std::fs::write(&path, "api_level = 21\nlog_level = \"warn\"\n").unwrap();

    unsafe {
        std::env::set_var("LOOPER_API_LEVEL", "33");
    }
    let config = Config::load(&path).unwrap();
    assert_eq!(config.api_level, Some(ApiLevel(33)));
    assert_eq!(config.log_level, "warn");

    clear_env();
    let _ = std::fs::remove_file(&path);
}

#[test]
fn config_load_fails_for_missing_file() {
    let path = std::env::temp_dir().join("looper-config-does-not-exist.toml");
    assert!(Config::load(&path).is_err());
}

#[test]
fn config_load_reports_parse_errors_once() {
    let path = std::env::temp_dir().join(format!("looper-bad-{}.toml", std::process::id()));
    std::fs::write(&path, "api_level = \"high\"\n").unwrap();

    let message = Config::load(&path).unwrap_err().to_string();
    assert!(message.starts_with("configuration error: bad config"));
    assert_eq!(message.matches("configuration error").count(), 1);

    let _ = std::fs::remove_file(&path);
}
