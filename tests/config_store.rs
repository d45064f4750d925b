//! Integration tests for the JSON settings store

use std::fs;

use ipcam_relay::HasRecoverySuggestion;
use ipcam_relay::config::{ConfigStore, ConnectionSettings, StoredSettings};
use ipcam_relay::error::classify;
use tempfile::TempDir;

fn store_in(dir: &TempDir) -> ConfigStore {
    ConfigStore::new(dir.path().join("config.json"))
}

#[test]
fn missing_file_loads_as_empty_mapping() {
    let dir = TempDir::new().unwrap();
    let stored = store_in(&dir).load().unwrap();
    assert!(stored.is_empty());
}

#[test]
fn save_then_load_round_trips() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let cases = [
        StoredSettings::default(),
        StoredSettings {
            ip_address: Some("192.168.1.50".into()),
            port: Some("8080".into()),
        },
        StoredSettings {
            ip_address: None,
            port: Some("4747".into()),
        },
    ];
    for settings in cases {
        store.save(&settings).unwrap();
        assert_eq!(store.load().unwrap(), settings);
    }
}

#[test]
fn save_overwrites_previous_contents() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    fs::write(store.path(), r#"{"ip_address": "old", "port": "1", "extra": true}"#).unwrap();

    store
        .save_connection(&ConnectionSettings::new("10.0.0.2", "8081"))
        .unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"ip_address": "10.0.0.2", "port": "8081"})
    );
}

#[test]
fn malformed_file_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    fs::write(store.path(), "{ not json").unwrap();

    let err = store.load().unwrap_err();
    assert_eq!(err.category(), "config");
    assert!(classify::is_fatal(&err));
    assert!(err.recovery_suggestion().is_some());
}

#[test]
fn wrong_field_type_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    fs::write(store.path(), r#"{"ip_address": 192, "port": "8080"}"#).unwrap();

    assert_eq!(store.load().unwrap_err().category(), "config");
}

#[test]
fn partial_file_is_completed_from_defaults() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    fs::write(store.path(), r#"{"port": "9000"}"#).unwrap();

    let resolved = store
        .load()
        .unwrap()
        .resolve(&ConnectionSettings::new("192.168.1.00", "0000"));
    assert_eq!(resolved, ConnectionSettings::new("192.168.1.00", "9000"));
}
