use serial_test::serial;
use temp_env::with_vars;

use super::*;
use crate::Error;

fn cleanup_all_sync_env_vars() {
    for (key, _) in std::env::vars() {
        if key.starts_with("DATA_SYNC__") || key == "CONFIG_PATH" {
            std::env::remove_var(&key);
        }
    }
}

#[test]
#[serial]
fn default_config_should_initialize_with_hardcoded_values() {
    let config = SyncConfig::default();

    assert_eq!(config.channel_name, "data-sync");
    assert_eq!(config.refresh_interval_ms, 30_000);
    assert_eq!(config.syncing_window_ms, 1_000);
    assert_eq!(config.channel_capacity, 256);
    assert_eq!(config.store_event_capacity, 256);
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn new_without_sources_should_equal_defaults() {
    cleanup_all_sync_env_vars();
    let config = SyncConfig::new().unwrap();
    assert_eq!(config, SyncConfig::default());
}

#[test]
#[serial]
fn new_should_merge_environment_overrides() {
    cleanup_all_sync_env_vars();
    with_vars(
        vec![
            ("DATA_SYNC__REFRESH_INTERVAL_MS", Some("5000")),
            ("DATA_SYNC__CHANNEL_NAME", Some("tabs")),
        ],
        || {
            let config = SyncConfig::new().unwrap();

            assert_eq!(config.refresh_interval_ms, 5000);
            assert_eq!(config.channel_name, "tabs");
            assert_eq!(config.syncing_window_ms, 1_000);
        },
    );
}

#[test]
#[serial]
fn new_should_read_config_path_file() {
    cleanup_all_sync_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("sync.toml");
    std::fs::write(
        &config_path,
        r#"
        refresh_interval_ms = 60000
        channel_capacity = 32
        "#,
    )
    .unwrap();

    with_vars(vec![("CONFIG_PATH", Some(config_path.to_str().unwrap()))], || {
        let config = SyncConfig::new().unwrap();
        assert_eq!(config.refresh_interval_ms, 60_000);
        assert_eq!(config.channel_capacity, 32);
        assert_eq!(config.channel_name, "data-sync");
    });
}

#[test]
#[serial]
fn with_override_config_should_merge_file_settings() {
    cleanup_all_sync_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("override.toml");
    std::fs::write(
        &config_path,
        r#"
        syncing_window_ms = 250
        "#,
    )
    .unwrap();

    let base = SyncConfig {
        channel_name: "custom".into(),
        ..SyncConfig::default()
    };
    let empty_vars: Vec<(&str, Option<&str>)> = vec![];
    with_vars(empty_vars, || {
        let config = base.with_override_config(config_path.to_str().unwrap()).unwrap();

        assert_eq!(config.syncing_window_ms, 250);
        // Values not in the file are kept
        assert_eq!(config.channel_name, "custom");
    });
}

#[test]
#[serial]
fn environment_should_win_over_override_file() {
    cleanup_all_sync_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("override.toml");
    std::fs::write(&config_path, "refresh_interval_ms = 9000\n").unwrap();

    with_vars(vec![("DATA_SYNC__REFRESH_INTERVAL_MS", Some("7000"))], || {
        let config = SyncConfig::default()
            .with_override_config(config_path.to_str().unwrap())
            .unwrap();
        assert_eq!(config.refresh_interval_ms, 7000);
    });
}

#[test]
#[serial]
fn missing_config_path_file_should_error() {
    cleanup_all_sync_env_vars();
    with_vars(vec![("CONFIG_PATH", Some("/nonexistent/sync-config"))], || {
        assert!(SyncConfig::new().is_err());
    });
}

#[test]
fn validate_rejects_zero_values() {
    let cases = [
        SyncConfig {
            refresh_interval_ms: 0,
            ..SyncConfig::default()
        },
        SyncConfig {
            syncing_window_ms: 0,
            ..SyncConfig::default()
        },
        SyncConfig {
            channel_capacity: 0,
            ..SyncConfig::default()
        },
        SyncConfig {
            store_event_capacity: 0,
            ..SyncConfig::default()
        },
        SyncConfig {
            channel_name: "  ".into(),
            ..SyncConfig::default()
        },
    ];

    for config in cases {
        let err = config.clone().validated().unwrap_err();
        assert!(matches!(err, Error::Config(_)), "{config:?} should be rejected");
    }
}

#[test]
fn validate_accepts_small_but_positive_values() {
    let config = SyncConfig {
        refresh_interval_ms: 10,
        syncing_window_ms: 50,
        channel_capacity: 1,
        store_event_capacity: 1,
        ..SyncConfig::default()
    };
    // Only warnings for these
    assert!(config.validate().is_ok());
}

#[test]
fn durations_follow_millisecond_fields() {
    let config = SyncConfig::default();
    assert_eq!(config.refresh_interval(), std::time::Duration::from_secs(30));
    assert_eq!(config.syncing_window(), std::time::Duration::from_secs(1));
}
