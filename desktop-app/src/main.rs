use std::time::Duration;

use clap::Parser;
use eframe::egui;
use ipcam_relay::config::{
    ConfigStore, ConnectionSettings, DEFAULT_CONFIG_FILE, DEFAULT_FPS, DEFAULT_HEIGHT, DEFAULT_IP,
    DEFAULT_PORT, DEFAULT_WIDTH, FormInput, FrameParams, RelayConfig,
};
use ipcam_relay::session::{RelayHandle, RelayStatus};
use ipcam_relay::{FitMode, HasRecoverySuggestion, RelayError};
use tokio::runtime::Runtime;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{info, warn};

/// Settings form for the IP camera relay.
#[derive(Parser, Debug)]
#[command(name = "relay-gui")]
struct Args {
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config_file: String,
    #[arg(long, default_value = DEFAULT_IP)]
    default_ip: String,
    #[arg(long, default_value = DEFAULT_PORT)]
    default_port: String,
    #[arg(long, default_value_t = DEFAULT_WIDTH)]
    frame_width: u32,
    #[arg(long, default_value_t = DEFAULT_HEIGHT)]
    frame_height: u32,
    #[arg(long, default_value_t = DEFAULT_FPS)]
    fps: u32,
    /// Virtual camera device, e.g. /dev/video10
    #[arg(long)]
    device: Option<String>,
}

struct RelayApp {
    store: ConfigStore,
    base: RelayConfig,
    form: FormInput,
    runtime: Runtime,
    relay: Option<RelayHandle>,
    status: String,
    error: Option<String>,
}

impl RelayApp {
    fn new(args: Args, runtime: Runtime) -> Self {
        let store = ConfigStore::new(&args.config_file);
        let defaults = ConnectionSettings::new(&args.default_ip, &args.default_port);
        let frame = FrameParams {
            width: args.frame_width,
            height: args.frame_height,
            frame_rate: args.fps,
        };

        // A broken config file is reported in the form; the defaults stand in.
        let (connection, error) = match store.load() {
            Ok(stored) => (stored.resolve(&defaults), None),
            Err(e) => (defaults, Some(describe(&e))),
        };

        Self {
            form: FormInput::seeded(&connection, &frame),
            base: RelayConfig::new(connection, frame).with_device(args.device),
            store,
            runtime,
            relay: None,
            status: "Ready".into(),
            error,
        }
    }

    fn running(&self) -> bool {
        self.relay.is_some()
    }

    fn start(&mut self) {
        let started = ipcam_relay::confirm_and_start(
            &self.store,
            &self.form,
            self.base.clone(),
            ipcam_relay::relay_session,
            self.runtime.handle(),
        );
        match started {
            Ok((config, handle)) => {
                self.status = format!("Connecting to {}", config.source_url());
                self.error = None;
                self.base = config;
                self.relay = Some(handle);
            }
            Err(e) => {
                warn!(error = %e, "start rejected");
                self.error = Some(describe(&e));
            }
        }
    }

    fn stop(&mut self) {
        if let Some(relay) = &self.relay {
            relay.cancel();
            self.status = "Stopping...".into();
        }
    }

    /// Take every queued event; the handle is let go only once the channel
    /// reports the session gone, so the final event is never skipped.
    fn poll_status(&mut self) {
        let Some(relay) = self.relay.as_mut() else {
            return;
        };
        loop {
            match relay.try_status() {
                Ok(event) => {
                    if let RelayStatus::Failed(reason) = &event {
                        self.error = Some(reason.clone());
                    }
                    self.status = status_line(&event);
                }
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => {
                    self.relay = None;
                    return;
                }
            }
        }
    }
}

fn status_line(event: &RelayStatus) -> String {
    match event {
        RelayStatus::Started {
            source,
            width,
            height,
            fps,
        } => format!("Streaming {} as {}x{} @ {} fps", source, width, height, fps),
        RelayStatus::Progress { frames } => format!("Streaming: {} frames", frames),
        RelayStatus::Stopped(report) => format!(
            "Stopped after {} frames: {}",
            report.frames_relayed, report.stop_reason
        ),
        RelayStatus::Failed(_) => "Failed".into(),
    }
}

fn describe(err: &RelayError) -> String {
    match err.recovery_suggestion() {
        Some(hint) => format!("{}\n{}", err, hint),
        None => err.to_string(),
    }
}

impl eframe::App for RelayApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_status();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("IP Camera Relay");

            let running = self.running();
            ui.add_enabled_ui(!running, |ui| {
                egui::Grid::new("settings").num_columns(2).show(ui, |ui| {
                    ui.label("IP address:");
                    ui.text_edit_singleline(&mut self.form.ip_address);
                    ui.end_row();

                    ui.label("Port:");
                    ui.text_edit_singleline(&mut self.form.port);
                    ui.end_row();

                    ui.label("Width:");
                    ui.text_edit_singleline(&mut self.form.width);
                    ui.end_row();

                    ui.label("Height:");
                    ui.text_edit_singleline(&mut self.form.height);
                    ui.end_row();

                    ui.label("FPS:");
                    ui.text_edit_singleline(&mut self.form.fps);
                    ui.end_row();
                });
                ui.horizontal(|ui| {
                    ui.label("Fit:");
                    ui.radio_value(&mut self.base.fit, FitMode::Stretch, "Stretch");
                    ui.radio_value(&mut self.base.fit, FitMode::Letterbox, "Letterbox");
                });
            });

            let label = if running { "Stop" } else { "Start" };
            if ui.button(label).clicked() {
                if running {
                    self.stop();
                } else {
                    self.start();
                }
            }

            ui.label(self.status.as_str());
            if let Some(error) = &self.error {
                ui.colored_label(egui::Color32::RED, error.as_str());
            }
        });

        if self.running() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}

impl Drop for RelayApp {
    fn drop(&mut self) {
        if let Some(relay) = self.relay.take() {
            relay.cancel();
            let joined = self
                .runtime
                .block_on(async move { tokio::time::timeout(Duration::from_secs(2), relay.join()).await });
            match joined {
                Ok(Ok(report)) => info!(frames = report.frames_relayed, "relay stopped on exit"),
                Ok(Err(e)) => warn!(error = %e, "relay failed on exit"),
                Err(_) => warn!("relay did not stop within 2s of exit"),
            }
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let runtime = Runtime::new()?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([420.0, 320.0]),
        ..Default::default()
    };

    eframe::run_native(
        "IP Camera Relay",
        options,
        Box::new(move |_cc| Box::new(RelayApp::new(args, runtime))),
    )?;
    Ok(())
}
