//! End-to-end: settings form to running relay, with mocks at both ends

mod common;

use std::fs;

use common::{Ending, Tally, RecordingSink, ScriptedSource};
use ipcam_relay::config::{ConfigStore, ConnectionSettings, FormInput, FrameParams, RelayConfig};
use ipcam_relay::session::{RelaySession, StopReason};
use tempfile::TempDir;

fn seeded_form(store: &ConfigStore) -> FormInput {
    let defaults = ConnectionSettings::new("192.168.1.50", "8080");
    let connection = store.load().unwrap().resolve(&defaults);
    FormInput::seeded(
        &connection,
        &FrameParams {
            width: 640,
            height: 480,
            frame_rate: 30,
        },
    )
}

#[tokio::test(start_paused = true)]
async fn confirm_saves_settings_and_relays_from_the_camera_url() {
    let dir = TempDir::new().unwrap();
    let store = ConfigStore::new(dir.path().join("config.json"));
    assert!(!store.path().exists());

    let form = seeded_form(&store);
    let tally = Tally::new();
    let mut source_url = None;

    let (config, handle) = ipcam_relay::confirm_and_start(
        &store,
        &form,
        RelayConfig::default(),
        |config: &RelayConfig| {
            source_url = Some(config.source_url());
            let frame = config.frame;
            RelaySession::builder()
                .with_capture_source(ScriptedSource::new(3, Ending::EndOfStream, &tally))
                .with_sink(RecordingSink::new(
                    frame.width,
                    frame.height,
                    frame.frame_rate,
                    &tally,
                ))
                .with_pull_timeout(config.pull_timeout)
                .build()
        },
        &tokio::runtime::Handle::current(),
    )
    .unwrap();

    assert_eq!(source_url.as_deref(), Some("http://192.168.1.50:8080/video"));
    assert_eq!(config.frame.width, 640);

    let saved: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
    assert_eq!(
        saved,
        serde_json::json!({"ip_address": "192.168.1.50", "port": "8080"})
    );

    let report = handle.join().await.unwrap();
    assert_eq!(report.frames_relayed, 3);
    assert_eq!(report.stop_reason, StopReason::EndOfStream);
    assert!(tally.pushed().iter().all(|&(w, h, _, _)| (w, h) == (640, 480)));
}

#[tokio::test(start_paused = true)]
async fn connection_fields_are_saved_and_used_as_typed() {
    let dir = TempDir::new().unwrap();
    let store = ConfigStore::new(dir.path().join("config.json"));
    let mut form = seeded_form(&store);
    form.ip_address = " 10.0.0.2 ".into();
    form.port = "8080 ".into();
    let tally = Tally::new();
    let mut source_url = None;

    let (config, handle) = ipcam_relay::confirm_and_start(
        &store,
        &form,
        RelayConfig::default(),
        |config: &RelayConfig| {
            source_url = Some(config.source_url());
            RelaySession::builder()
                .with_capture_source(ScriptedSource::new(0, Ending::EndOfStream, &tally))
                .with_sink(RecordingSink::new(64, 48, 30, &tally))
                .build()
        },
        &tokio::runtime::Handle::current(),
    )
    .unwrap();

    assert_eq!(config.connection.ip_address, " 10.0.0.2 ");
    assert_eq!(source_url.as_deref(), Some("http:// 10.0.0.2 :8080 /video"));
    let saved: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
    assert_eq!(
        saved,
        serde_json::json!({"ip_address": " 10.0.0.2 ", "port": "8080 "})
    );
    assert_eq!(
        seeded_form(&store).ip_address,
        " 10.0.0.2 ",
        "reloaded form shows the text as typed"
    );
    handle.join().await.unwrap();
}

#[tokio::test]
async fn invalid_form_input_saves_and_starts_nothing() {
    let dir = TempDir::new().unwrap();
    let store = ConfigStore::new(dir.path().join("config.json"));

    for (field, bad) in [("fps", "abc"), ("frame_width", "0"), ("frame_height", "-3")] {
        let mut form = seeded_form(&store);
        match field {
            "fps" => form.fps = bad.into(),
            "frame_width" => form.width = bad.into(),
            _ => form.height = bad.into(),
        }

        let mut factory_called = false;
        let result = ipcam_relay::confirm_and_start(
            &store,
            &form,
            RelayConfig::default(),
            |_: &RelayConfig| {
                factory_called = true;
                RelaySession::builder().build()
            },
            &tokio::runtime::Handle::current(),
        );

        let err = result.err().expect("invalid input must be rejected");
        assert_eq!(err.category(), "validation");
        assert!(err.to_string().contains(field), "{}", err);
        assert!(!factory_called);
        assert!(!store.path().exists());
    }
}

#[tokio::test]
async fn form_is_seeded_from_stored_settings() {
    let dir = TempDir::new().unwrap();
    let store = ConfigStore::new(dir.path().join("config.json"));
    store
        .save_connection(&ConnectionSettings::new("10.0.0.9", "4747"))
        .unwrap();

    let form = seeded_form(&store);
    assert_eq!(form.ip_address, "10.0.0.9");
    assert_eq!(form.port, "4747");
    assert_eq!(form.width, "640");
}
