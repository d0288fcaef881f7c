use std::time::Duration;

use transcriber::config::load_config;
use transcriber::error::ConfigError;
use transcriber::pipeline::OrchestratorSettings;
use transcriber::upload::UploadPolicy;

#[test]
fn test_file_config_drives_runtime_settings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("transcriber.json");
    std::fs::write(
        &path,
        r#"{
            "version": "1.0",
            "work_directory": "/var/lib/transcriber",
            "worker_count": 2,
            "upload": { "max_bytes": 1048576, "allowed_extensions": [".mp3", ".WAV"] },
            "segmentation": { "max_segment_seconds": 600 },
            "transcription": { "request_timeout_secs": 45 },
            "retry": { "max_attempts": 5, "base_delay_ms": 250, "max_delay_ms": 4000 }
        }"#,
    )
    .unwrap();

    let config = load_config(&path).unwrap();
    let settings = OrchestratorSettings::from_config(&config);
    assert_eq!(settings.work_root.to_str(), Some("/var/lib/transcriber"));
    assert_eq!(settings.max_segment_seconds, 600.0);
    assert_eq!(settings.call_timeout, Duration::from_secs(45));
    assert_eq!(settings.retry.max_attempts, 5);
    assert_eq!(settings.retry.delay_for_retry(0), Duration::from_millis(250));
    assert_eq!(settings.retry.delay_for_retry(10), Duration::from_millis(4000));

    let policy = UploadPolicy::from_config(&config.upload);
    assert_eq!(policy.max_bytes(), 1_048_576);
    assert!(policy.validate("take.wav", 10).is_ok());
    assert!(policy.validate("take.m4a", 10).is_err());
}

#[test]
fn test_unsupported_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("transcriber.json");
    std::fs::write(&path, r#"{ "version": "2.0" }"#).unwrap();

    assert!(matches!(
        load_config(&path),
        Err(ConfigError::SchemaValidation { .. })
    ));
}
