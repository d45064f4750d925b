use anyhow::Result;
use clap::Parser;
use ipcam_relay::config::{
    ConfigStore, ConnectionSettings, DEFAULT_CONFIG_FILE, DEFAULT_FPS, DEFAULT_HEIGHT, DEFAULT_IP,
    DEFAULT_PORT, DEFAULT_WIDTH, FormInput, FrameParams, RelayConfig, parse_duration,
};
use ipcam_relay::session::RelayStatus;
use ipcam_relay::{FitMode, HasRecoverySuggestion, RelayError};
use tracing::{info, warn};

/// Relay an IP camera's HTTP stream into a virtual camera device.
#[derive(Parser, Debug)]
#[command(name = "ipcam-relay")]
#[command(about = "Use an IP camera as a webcam through a virtual camera device")]
#[command(long_about = "Reads http://<ip>:<port>/video, resizes each frame to the configured size and \
pushes it to a v4l2loopback device at a fixed frame rate. The camera address is remembered in the \
config file between runs.")]
struct Args {
    /// JSON file holding the last used camera address
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config_file: String,

    /// Camera IP used when the config file has none
    #[arg(long, default_value = DEFAULT_IP)]
    default_ip: String,

    /// Camera port used when the config file has none
    #[arg(long, default_value = DEFAULT_PORT)]
    default_port: String,

    /// Virtual camera width in pixels
    #[arg(long, default_value_t = DEFAULT_WIDTH)]
    frame_width: u32,

    /// Virtual camera height in pixels
    #[arg(long, default_value_t = DEFAULT_HEIGHT)]
    frame_height: u32,

    /// Frames per second pushed to the virtual camera
    #[arg(short = 'f', long, default_value_t = DEFAULT_FPS)]
    fps: u32,

    /// Camera IP for this run (saved to the config file)
    #[arg(long)]
    ip: Option<String>,

    /// Camera port for this run (saved to the config file)
    #[arg(long)]
    port: Option<String>,

    /// Virtual camera device, e.g. /dev/video10
    #[arg(short, long)]
    device: Option<String>,

    /// Give up when no frame arrives for this long: 500ms, 5s, 1m
    #[arg(long, default_value = "5s")]
    pull_timeout: String,

    /// What to do when the camera's aspect ratio differs from the output
    #[arg(long, value_enum, default_value_t = FitMode::Stretch)]
    fit: FitMode,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let store = ConfigStore::new(&args.config_file);
    let stored = store.load().map_err(explain)?;
    let defaults = ConnectionSettings::new(&args.default_ip, &args.default_port);
    let connection = stored.resolve(&defaults);

    // The command line plays the part of the settings form.
    let mut input = FormInput::seeded(
        &connection,
        &FrameParams {
            width: args.frame_width,
            height: args.frame_height,
            frame_rate: args.fps,
        },
    );
    if let Some(ip) = args.ip {
        input.ip_address = ip;
    }
    if let Some(port) = args.port {
        input.port = port;
    }

    let base = RelayConfig::default()
        .with_fit(args.fit)
        .with_pull_timeout(parse_duration(&args.pull_timeout).map_err(explain)?)
        .with_device(args.device);

    let (config, mut handle) = ipcam_relay::confirm_and_start(
        &store,
        &input,
        base,
        ipcam_relay::relay_session,
        &tokio::runtime::Handle::current(),
    )
    .map_err(explain)?;
    info!(config = %store.path().display(), url = %config.source_url(), "relay launched");

    let cancel = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping");
            cancel.cancel();
        }
    });

    while let Some(status) = handle.next_status().await {
        match status {
            RelayStatus::Started { width, height, fps, .. } => {
                info!("streaming {}x{} @ {} fps", width, height, fps)
            }
            RelayStatus::Progress { frames } => info!(frames, "relaying"),
            RelayStatus::Stopped(report) => {
                info!(frames = report.frames_relayed, "stopped: {}", report.stop_reason)
            }
            RelayStatus::Failed(reason) => warn!("relay failed: {}", reason),
        }
    }

    let report = handle.join().await.map_err(explain)?;
    println!(
        "Relayed {} frames ({})",
        report.frames_relayed, report.stop_reason
    );
    Ok(())
}

/// Attach the recovery suggestion, if any, to the top-level error.
fn explain(err: RelayError) -> anyhow::Error {
    let hint = err.recovery_suggestion().map(str::to_owned);
    let err = anyhow::Error::new(err);
    match hint {
        Some(hint) => err.context(hint),
        None => err,
    }
}
