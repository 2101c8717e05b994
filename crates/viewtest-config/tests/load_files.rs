//! Loading configuration files from disk.

use std::fs;
use tempfile::TempDir;
use viewtest_config::{ConfigError, ConfigLoader, LogFormat};
use viewtest_middleware::MiddlewareStyle;

#[test]
fn test_load_toml_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("viewtest.toml");
    fs::write(
        &path,
        r#"
            [middleware]
            style = "wrapper"

            [logging]
            level = "info"
            format = "json"

            [request.default_headers]
            accept-language = "de"

            [settings]
            LOGIN_URL = "/login/"
        "#,
    )
    .unwrap();

    let config = ConfigLoader::new().with_file(&path).unwrap().load().unwrap();

    assert_eq!(config.middleware.style, MiddlewareStyle::Wrapper);
    assert_eq!(config.logging.format, LogFormat::Json);
    assert_eq!(config.request.default_headers["accept-language"], "de");
    assert_eq!(config.settings["LOGIN_URL"], "/login/");
}

#[test]
fn test_load_json_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("viewtest.json");
    fs::write(&path, r#"{"middleware": {"style": "legacy"}}"#).unwrap();

    let config = ConfigLoader::new().with_optional_file(&path).unwrap().load().unwrap();
    assert_eq!(config.middleware.style, MiddlewareStyle::Legacy);
}

#[test]
fn test_unknown_field_in_file_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("viewtest.toml");
    fs::write(
        &path,
        r#"
            [middleware]
            style = "legacy"
            strict = true
        "#,
    )
    .unwrap();

    let result = ConfigLoader::new().with_file(&path);
    assert!(matches!(result, Err(ConfigError::Toml(_))));
}

#[test]
fn test_unsupported_extension_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("viewtest.yaml");
    fs::write(&path, "middleware: {}").unwrap();

    let result = ConfigLoader::new().with_file(&path);
    assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
}

#[test]
fn test_invalid_header_fails_validation_on_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("viewtest.toml");
    fs::write(
        &path,
        r#"
            [request.default_headers]
            "bad header" = "x"
        "#,
    )
    .unwrap();

    let result = ConfigLoader::new().with_file(&path).unwrap().load();
    assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
}
