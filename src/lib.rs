//! # IP Camera Relay Library
//!
//! Relays a network camera's HTTP video stream into a virtual camera device
//! so ordinary video applications can use the IP camera as a webcam.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//! - `config`: typed relay configuration and the JSON settings store
//! - `capture`: the GStreamer-backed network camera source
//! - `processing`: resize and channel-order processors, and the sink trait
//! - `core`: the frame type and the pacing clock
//! - `session`: the relay loop, its builder and the spawned-task handle
//!
//! GStreamer-backed capture and output sit behind the `gstreamer-io` feature;
//! everything else builds and tests without system multimedia libraries.
//!
//! ## Example
//!
//! ```rust,no_run
//! # #[cfg(feature = "gstreamer-io")]
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use ipcam_relay::config::{ConnectionSettings, FrameParams, RelayConfig};
//! use ipcam_relay::session::RelayHandle;
//!
//! let config = RelayConfig::new(
//!     ConnectionSettings::new("192.168.1.50", "8080"),
//!     FrameParams { width: 640, height: 480, frame_rate: 30 },
//! );
//! let handle = RelayHandle::spawn(ipcam_relay::relay_session(&config)?);
//! let report = handle.join().await?;
//! println!("relayed {} frames", report.frames_relayed);
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod config;
pub mod core;
pub mod error;
pub mod processing;
pub mod session;

use tracing::info;

pub use error::{ErrorSeverity, HasRecoverySuggestion, HasSeverity, RelayError, RelayResult};
pub use relay_scale::channels::ChannelOrder;
pub use relay_scale::plan::FitMode;

use config::{ConfigStore, FormInput, RelayConfig};
use session::{RelayHandle, RelaySession};

/// Session reading `config`'s camera into a virtual camera device.
#[cfg(feature = "gstreamer-io")]
pub fn relay_session(config: &RelayConfig) -> RelayResult<RelaySession> {
    config.validate()?;
    let frame = config.frame;
    RelaySession::builder()
        .with_capture_source(capture::IpCameraSource::new(
            config.source_url(),
            config.pull_timeout,
        ))
        .with_sink(processing::VirtualCameraSink::new(
            frame.width,
            frame.height,
            frame.frame_rate,
            config.device.clone(),
        ))
        .with_fit(config.fit)
        .with_pull_timeout(config.pull_timeout)
        .build()
}

/// The settings form's confirm action.
///
/// Parses `input` on top of `base`, persists the connection settings to
/// `store`, then builds a session with `make_session` and spawns it on
/// `runtime`. Nothing is saved or started when the input is invalid.
pub fn confirm_and_start<F>(
    store: &ConfigStore,
    input: &FormInput,
    base: RelayConfig,
    make_session: F,
    runtime: &tokio::runtime::Handle,
) -> RelayResult<(RelayConfig, RelayHandle)>
where
    F: FnOnce(&RelayConfig) -> RelayResult<RelaySession>,
{
    let config = input.to_config(base)?;
    store.save_connection(&config.connection)?;
    info!(
        url = %config.source_url(),
        width = config.frame.width,
        height = config.frame.height,
        fps = config.frame.frame_rate,
        "settings confirmed"
    );
    let session = make_session(&config)?;
    let handle = RelayHandle::spawn_on(session, runtime);
    Ok((config, handle))
}
