//! Integration tests for logging system

use core_runtime::logging::{
    filter_directives, init_logging, strip_path, LogFormat, LogLevel, LoggingConfig,
};
use core_runtime::Error;

#[test]
fn test_logging_initialization() {
    // The global subscriber can only be installed once per process, so both
    // the first and the repeated initialization are checked here.
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug)
        .with_spans(false);

    init_logging(config.clone()).expect("first initialization succeeds");
    tracing::debug!(file = strip_path("/tmp/fixtures/tone.wav"), "logging ready");

    let second = init_logging(config);
    assert!(matches!(second, Err(Error::Config(_))));
}

#[test]
fn test_invalid_filter_is_rejected_before_install() {
    let config = LoggingConfig::default().with_filter("core_audiofile=[");
    assert!(matches!(init_logging(config), Err(Error::Config(_))));
}

#[test]
fn test_custom_filter_replaces_defaults() {
    let config = LoggingConfig::default()
        .with_level(LogLevel::Trace)
        .with_filter("symphonia=debug");

    let directives = filter_directives(&config);
    assert_eq!(directives, "symphonia=debug");
    assert!(!directives.contains("core_audiofile"));
}

#[test]
fn test_level_applies_to_workspace_crates_only() {
    let config = LoggingConfig::default().with_level(LogLevel::Error);
    let directives = filter_directives(&config);

    assert!(directives.contains("core_audiofile=error"));
    assert!(directives.contains("hound=warn"));
}

#[test]
fn test_path_stripping() {
    assert_eq!(strip_path("/home/user/Music/loop.wav"), "loop.wav");
    assert_eq!(strip_path("C:\\Users\\user\\Music\\loop.flac"), "loop.flac");
    assert_eq!(strip_path("loop.mp3"), "loop.mp3");
}

#[test]
fn test_format_default_matches_build_profile() {
    #[cfg(debug_assertions)]
    assert_eq!(LogFormat::default(), LogFormat::Pretty);

    #[cfg(not(debug_assertions))]
    assert_eq!(LogFormat::default(), LogFormat::Json);
}
