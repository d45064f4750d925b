// # IP Camera Capture
//
// Reads an MJPEG (or any decodable) HTTP stream from a network camera and
// hands out decoded BGRA frames.
//
// ```text
// souphttpsrc location=http://ip:port/video → decodebin → videoconvert
//     → video/x-raw,format=BGRA → appsink
// ```
//
// The appsink keeps at most two decoded frames and never drops: when the
// relay falls behind, back-pressure reaches the HTTP source instead of frames
// being skipped. Pulls are bounded by the configured timeout so a camera
// that goes silent cannot hang the relay. The appsink is polled in short
// slices with the bus checked in between, so a dropped connection surfaces
// as its GStreamer error rather than as a timeout.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use relay_scale::channels::ChannelOrder;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::MAX_PULL_TIMEOUT;
use crate::core::VideoFrame;
use crate::error::{RelayError, RelayResult};
use crate::session::CaptureSource;

/// Longest single wait on the appsink between two bus checks.
const PULL_SLICE: Duration = Duration::from_millis(100);

/// `gst-launch` description of the capture pipeline for `url`.
pub fn launch_description(url: &str) -> String {
    format!(
        "souphttpsrc name=src location=\"{}\" is-live=true do-timestamp=true \
         ! decodebin ! videoconvert ! video/x-raw,format={} \
         ! appsink name=sink max-buffers=2 drop=false sync=false",
        url,
        ChannelOrder::Bgra.gst_format()
    )
}

/// HTTP camera stream decoded by GStreamer.
pub struct IpCameraSource {
    url: String,
    pull_timeout: Duration,
    pipeline: Option<gst::Pipeline>,
    appsink: Option<gst_app::AppSink>,
}

impl IpCameraSource {
    pub fn new(url: impl Into<String>, pull_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            pull_timeout: pull_timeout.min(MAX_PULL_TIMEOUT),
            pipeline: None,
            appsink: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn build(url: &str) -> RelayResult<(gst::Pipeline, gst_app::AppSink)> {
        gst::init().map_err(|e| RelayError::capture_init(url, e.to_string()))?;

        let launch = launch_description(url);
        debug!(%launch, "building capture pipeline");
        let pipeline = gst::parse::launch(&launch)
            .map_err(|e| RelayError::capture_init(url, format!("failed to parse pipeline: {}", e)))?
            .downcast::<gst::Pipeline>()
            .map_err(|_| RelayError::capture_init(url, "launch description did not produce a pipeline"))?;

        let appsink = pipeline
            .by_name("sink")
            .and_then(|element| element.downcast::<gst_app::AppSink>().ok())
            .ok_or_else(|| RelayError::capture_init(url, "failed to get appsink element"))?;

        if let Err(err) = pipeline.set_state(gst::State::Playing) {
            let _ = pipeline.set_state(gst::State::Null);
            return Err(RelayError::capture_init(url, format!("stream refused to start: {}", err))
                .with_recovery_suggestion("Check the camera address and that it serves /video"));
        }
        Ok((pipeline, appsink))
    }

    fn stop(&mut self) -> RelayResult<()> {
        self.appsink = None;
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.set_state(gst::State::Null).map_err(|e| {
                RelayError::frame_capture(format!("failed to stop capture pipeline: {}", e))
            })?;
            info!(url = %self.url, "capture closed");
        }
        Ok(())
    }
}

/// First error posted on the bus, if any.
fn bus_error(pipeline: &gst::Pipeline) -> Option<String> {
    let bus = pipeline.bus()?;
    while let Some(msg) = bus.pop_filtered(&[gst::MessageType::Error]) {
        if let gst::MessageView::Error(err) = msg.view() {
            return Some(format!(
                "{} ({})",
                err.error(),
                err.debug().map(|d| d.to_string()).unwrap_or_default()
            ));
        }
    }
    None
}

fn clock_time(wait: Duration) -> gst::ClockTime {
    let nanos = u64::try_from(wait.as_nanos()).unwrap_or(u64::MAX);
    gst::ClockTime::from_nseconds(nanos.min(gst::ClockTime::MAX.nseconds()))
}

/// Wait up to `timeout` for the next sample.
fn pull(
    pipeline: &gst::Pipeline,
    appsink: &gst_app::AppSink,
    timeout: Duration,
) -> RelayResult<Option<VideoFrame>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(err) = bus_error(pipeline) {
            return Err(RelayError::frame_capture(err));
        }
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
            return Err(RelayError::timeout("pull frame", millis));
        }
        if let Some(sample) = appsink.try_pull_sample(clock_time(left.min(PULL_SLICE))) {
            return sample_to_frame(&sample).map(Some);
        }
        if appsink.is_eos() {
            return Ok(None);
        }
    }
}

fn sample_to_frame(sample: &gst::Sample) -> RelayResult<VideoFrame> {
    let caps = sample
        .caps()
        .ok_or_else(|| RelayError::frame_capture("sample without caps"))?;
    let info = gst_video::VideoInfo::from_caps(caps)
        .map_err(|e| RelayError::frame_capture(format!("unreadable caps: {}", e)))?;
    let buffer = sample
        .buffer()
        .ok_or_else(|| RelayError::frame_capture("sample without buffer"))?;
    let map = buffer
        .map_readable()
        .map_err(|e| RelayError::frame_capture(format!("buffer not readable: {}", e)))?;

    let stride = info.stride().first().copied().unwrap_or(0).max(0) as usize;
    Ok(VideoFrame {
        data: Arc::new(map.as_slice().to_vec()),
        width: info.width(),
        height: info.height(),
        stride: stride.max(info.width() as usize * 4),
        order: ChannelOrder::Bgra,
        pts_ns: buffer.pts().map(|pts| pts.nseconds()),
    })
}

#[async_trait]
impl CaptureSource for IpCameraSource {
    async fn open(&mut self) -> RelayResult<()> {
        if self.pipeline.is_some() {
            return Ok(());
        }
        let url = self.url.clone();
        let (pipeline, appsink) = tokio::task::spawn_blocking(move || Self::build(&url))
            .await
            .map_err(|e| RelayError::capture_init(self.url.clone(), e.to_string()))??;
        info!(url = %self.url, "capture opened");
        self.pipeline = Some(pipeline);
        self.appsink = Some(appsink);
        Ok(())
    }

    async fn capture_frame(&mut self) -> RelayResult<Option<VideoFrame>> {
        let (Some(pipeline), Some(appsink)) = (self.pipeline.clone(), self.appsink.clone()) else {
            return Err(RelayError::state("closed", "capture_frame", "capture is not open"));
        };
        let timeout = self.pull_timeout;

        tokio::task::spawn_blocking(move || pull(&pipeline, &appsink, timeout))
            .await
            .map_err(|e| RelayError::frame_capture(e.to_string()))?
    }

    async fn shutdown(&mut self) -> RelayResult<()> {
        self.stop()
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

impl Drop for IpCameraSource {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("closing capture on drop: {}", e);
        }
    }
}
