//! # Relay configuration
//!
//! Typed, validated configuration shared by the CLI, the desktop form and the
//! relay session.
//!
//! | Parameter | Type | Range | Description |
//! |-----------|------|-------|-------------|
//! | `ip_address` | `String` | verbatim | IP camera host |
//! | `port` | `String` | verbatim | IP camera HTTP port |
//! | `width` | `u32` | 1-8192 | Virtual camera frame width |
//! | `height` | `u32` | 1-8192 | Virtual camera frame height |
//! | `frame_rate` | `u32` | 1-240 | Virtual camera frames per second |
//! | `pull_timeout` | `Duration` | 0 < t <= 1h | Longest wait for one camera frame |
//!
//! Host and port are stored and used exactly as typed; only the frame
//! parameters are checked.
//!
//! ## Examples
//!
//! ```rust
//! use ipcam_relay::config::{FormInput, FrameParams, RelayConfig};
//!
//! let input = FormInput {
//!     ip_address: "192.168.1.50".into(),
//!     port: "8080".into(),
//!     width: "640".into(),
//!     height: "480".into(),
//!     fps: "30".into(),
//! };
//! let config = input.to_config(RelayConfig::default()).unwrap();
//! assert_eq!(config.source_url(), "http://192.168.1.50:8080/video");
//! assert_eq!(config.frame, FrameParams { width: 640, height: 480, frame_rate: 30 });
//! ```

use std::time::Duration;

use relay_scale::plan::{FitMode, Size};

use crate::error::{RelayError, RelayResult};

pub const DEFAULT_CONFIG_FILE: &str = "config.json";
pub const DEFAULT_IP: &str = "192.168.1.00";
pub const DEFAULT_PORT: &str = "0000";
pub const DEFAULT_WIDTH: u32 = 1280;
pub const DEFAULT_HEIGHT: u32 = 720;
pub const DEFAULT_FPS: u32 = 60;
pub const DEFAULT_PULL_TIMEOUT: Duration = Duration::from_secs(5);
pub const MAX_PULL_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Path the IP camera serves its MJPEG stream on.
pub const VIDEO_PATH: &str = "/video";

const MAX_SIDE: u32 = 8192;
const MAX_FPS: u32 = 240;

/// The persisted `{ip_address, port}` pair identifying the IP camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub ip_address: String,
    pub port: String,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::new(DEFAULT_IP, DEFAULT_PORT)
    }
}

impl ConnectionSettings {
    pub fn new(ip_address: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            ip_address: ip_address.into(),
            port: port.into(),
        }
    }

    /// `http://{ip_address}:{port}/video`
    pub fn source_url(&self) -> String {
        format!("http://{}:{}{}", self.ip_address, self.port, VIDEO_PATH)
    }
}

/// Geometry and rate of the virtual camera; fixed for one relay run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameParams {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
}

impl Default for FrameParams {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            frame_rate: DEFAULT_FPS,
        }
    }
}

impl FrameParams {
    pub fn validate(&self) -> RelayResult<()> {
        check_range("frame_width", self.width, MAX_SIDE)?;
        check_range("frame_height", self.height, MAX_SIDE)?;
        check_range("fps", self.frame_rate, MAX_FPS)?;
        Ok(())
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Time between two pushes at the configured rate.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.frame_rate.max(1)
    }
}

fn check_range(field: &str, value: u32, max: u32) -> RelayResult<()> {
    if value == 0 {
        return Err(RelayError::validation(field, "must be greater than 0", value.to_string()));
    }
    if value > max {
        return Err(RelayError::validation(
            field,
            format!("must be at most {}", max),
            value.to_string(),
        ));
    }
    Ok(())
}

/// A frame wait must be positive and at most [`MAX_PULL_TIMEOUT`].
pub fn check_pull_timeout(timeout: Duration) -> RelayResult<()> {
    if timeout.is_zero() {
        return Err(RelayError::validation(
            "pull_timeout",
            "must be greater than 0",
            format!("{:?}", timeout),
        ));
    }
    if timeout > MAX_PULL_TIMEOUT {
        return Err(RelayError::validation(
            "pull_timeout",
            format!("must be at most {:?}", MAX_PULL_TIMEOUT),
            format!("{:?}", timeout),
        )
        .with_recovery_suggestion("Use a timeout of one hour or less"));
    }
    Ok(())
}

/// Everything one relay run needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub connection: ConnectionSettings,
    pub frame: FrameParams,
    /// Stretch (default) or letterbox when the camera's aspect ratio differs.
    pub fit: FitMode,
    /// Longest wait for a single frame before the run stops with a timeout.
    pub pull_timeout: Duration,
    /// Virtual camera device node; `None` uses the sink's default.
    pub device: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionSettings::default(),
            frame: FrameParams::default(),
            fit: FitMode::Stretch,
            pull_timeout: DEFAULT_PULL_TIMEOUT,
            device: None,
        }
    }
}

impl RelayConfig {
    pub fn new(connection: ConnectionSettings, frame: FrameParams) -> Self {
        Self {
            connection,
            frame,
            ..Self::default()
        }
    }

    pub fn with_fit(mut self, fit: FitMode) -> Self {
        self.fit = fit;
        self
    }

    pub fn with_pull_timeout(mut self, timeout: Duration) -> Self {
        self.pull_timeout = timeout;
        self
    }

    pub fn with_device(mut self, device: Option<String>) -> Self {
        self.device = device;
        self
    }

    pub fn validate(&self) -> RelayResult<()> {
        self.frame.validate()?;
        check_pull_timeout(self.pull_timeout)
    }

    pub fn source_url(&self) -> String {
        self.connection.source_url()
    }
}

/// Raw text from the settings form, before parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormInput {
    pub ip_address: String,
    pub port: String,
    pub width: String,
    pub height: String,
    pub fps: String,
}

impl FormInput {
    /// Fields pre-filled from stored settings and process defaults.
    pub fn seeded(connection: &ConnectionSettings, frame: &FrameParams) -> Self {
        Self {
            ip_address: connection.ip_address.clone(),
            port: connection.port.clone(),
            width: frame.width.to_string(),
            height: frame.height.to_string(),
            fps: frame.frame_rate.to_string(),
        }
    }

    /// Parse the fields and merge them over `base` (which supplies fit,
    /// timeout and device). Every failure names the offending field.
    pub fn to_config(&self, base: RelayConfig) -> RelayResult<RelayConfig> {
        let frame = FrameParams {
            width: parse_positive("frame_width", &self.width)?,
            height: parse_positive("frame_height", &self.height)?,
            frame_rate: parse_positive("fps", &self.fps)?,
        };
        let config = RelayConfig {
            connection: ConnectionSettings::new(self.ip_address.clone(), self.port.clone()),
            frame,
            ..base
        };
        config.validate()?;
        Ok(config)
    }
}

fn parse_positive(field: &str, text: &str) -> RelayResult<u32> {
    text.trim().parse::<u32>().map_err(|_| {
        RelayError::validation(field, "must be a positive integer", text)
            .with_recovery_suggestion(format!("Enter a whole number for {}", field))
    })
}

/// Parse a duration like "5s", "500ms", "2m" or a bare number of seconds.
pub fn parse_duration(text: &str) -> RelayResult<Duration> {
    let text = text.trim();
    if let Ok(seconds) = text.parse::<u64>() {
        return Ok(Duration::from_secs(seconds));
    }

    let invalid = || {
        RelayError::validation("duration", "expected <number>[ms|s|m]", text)
            .with_recovery_suggestion("Use e.g. 500ms, 5s or 1m")
    };

    let (num_str, unit) = match text.strip_suffix("ms") {
        Some(num) => (num, "ms"),
        None => match text.char_indices().last() {
            Some((i, _)) if i > 0 => text.split_at(i),
            _ => return Err(invalid()),
        },
    };
    let num: u64 = num_str.parse().map_err(|_| invalid())?;

    match unit {
        "ms" => Ok(Duration::from_millis(num)),
        "s" => Ok(Duration::from_secs(num)),
        "m" => num
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(invalid),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();
        assert_eq!(config.connection.ip_address, "192.168.1.00");
        assert_eq!(config.connection.port, "0000");
        assert_eq!(config.frame.width, 1280);
        assert_eq!(config.frame.height, 720);
        assert_eq!(config.frame.frame_rate, 60);
        assert_eq!(config.fit, FitMode::Stretch);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_source_url() {
        let settings = ConnectionSettings::new("192.168.1.50", "8080");
        assert_eq!(settings.source_url(), "http://192.168.1.50:8080/video");
    }

    #[test]
    fn test_config_validation() {
        let mut config = RelayConfig::default();

        config.frame.frame_rate = 0;
        assert!(config.validate().is_err());
        config.frame.frame_rate = 30;

        config.frame.width = 0;
        assert!(config.validate().is_err());
        config.frame.width = MAX_SIDE + 1;
        assert!(config.validate().is_err());
        config.frame.width = 640;

        config.pull_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
        config.pull_timeout = Duration::from_millis(250);

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_frame_interval() {
        let frame = FrameParams {
            width: 1,
            height: 1,
            frame_rate: 50,
        };
        assert_eq!(frame.frame_interval(), Duration::from_millis(20));
    }

    #[test]
    fn test_form_rejects_non_numeric_input() {
        let mut input = FormInput::seeded(&ConnectionSettings::default(), &FrameParams::default());
        input.width = "wide".into();
        let err = input.to_config(RelayConfig::default()).unwrap_err();
        match err {
            RelayError::Validation { field, value, .. } => {
                assert_eq!(field, "frame_width");
                assert_eq!(value, "wide");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_form_rejects_zero_fps() {
        let mut input = FormInput::seeded(&ConnectionSettings::default(), &FrameParams::default());
        input.fps = "0".into();
        assert!(input.to_config(RelayConfig::default()).is_err());
    }

    #[test]
    fn test_form_keeps_base_options() {
        let input = FormInput {
            ip_address: " 10.0.0.2 ".into(),
            port: "4747".into(),
            width: " 320".into(),
            height: "240 ".into(),
            fps: "15".into(),
        };
        let base = RelayConfig::default()
            .with_fit(FitMode::Letterbox)
            .with_device(Some("/dev/video7".into()));
        let config = input.to_config(base).unwrap();
        assert_eq!(config.connection.ip_address, " 10.0.0.2 ");
        assert_eq!(config.connection.port, "4747");
        assert_eq!(config.frame.size(), Size::new(320, 240));
        assert_eq!(config.fit, FitMode::Letterbox);
        assert_eq!(config.device.as_deref(), Some("/dev/video7"));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("5").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert!(parse_duration("x").is_err());
        assert!(parse_duration("5h").is_err());
        assert!(parse_duration("ms").is_err());
    }

    #[test]
    fn test_parse_duration_overflow_is_an_error() {
        let err = parse_duration("307445734561825861m").unwrap_err();
        assert_eq!(err.category(), "validation");
        assert!(parse_duration("18446744073709551616s").is_err());
        assert_eq!(
            parse_duration("18446744073709551615ms").unwrap(),
            Duration::from_millis(u64::MAX)
        );
    }

    #[test]
    fn test_pull_timeout_is_capped() {
        let config = RelayConfig::default().with_pull_timeout(MAX_PULL_TIMEOUT);
        assert!(config.validate().is_ok());

        let config = config.with_pull_timeout(MAX_PULL_TIMEOUT + Duration::from_secs(1));
        let err = config.validate().unwrap_err();
        assert_eq!(err.category(), "validation");
        assert!(err.to_string().contains("pull_timeout"), "{}", err);

        let huge = RelayConfig::default().with_pull_timeout(Duration::from_secs(u64::MAX));
        assert!(huge.validate().is_err());
    }
}
