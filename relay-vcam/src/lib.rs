// SPDX-License-Identifier: MIT
//! # Virtual camera output for 4-channel frames
//!
//! This crate opens a virtual camera device and pushes fixed-size frames into
//! it. The device is fed through a GStreamer pipeline:
//!
//! ```text
//! appsrc (RGBA, W×H @ F/1) → videoconvert → video/x-raw,format=YUY2 → v4l2sink device=/dev/videoN
//! ```
//!
//! On Linux the device is a `v4l2loopback` node; any other sink element
//! (`autovideosink` for a local preview, `fakesink` for smoke tests) can be
//! substituted through [`VcamConfig::element`].
//!
//! ## Lifetime
//!
//! Width, height and frame rate are baked into the appsrc caps when the
//! camera is opened and cannot change afterwards. The pipeline is torn down
//! by [`VirtualCamera::close`] or, failing that, on drop.
//!
//! ## Threading
//!
//! [`VcamPublisher`] is a cloneable handle around the appsrc. `appsrc
//! block=true` makes [`VcamPublisher::send`] block while the device lags,
//! so async callers run it on a blocking thread.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use relay_vcam::{VcamConfig, VirtualCamera};
//!
//! let cam = VirtualCamera::open(VcamConfig {
//!     device: Some("/dev/video10".into()),
//!     width: 1280,
//!     height: 720,
//!     framerate: 30,
//!     ..Default::default()
//! })?;
//! let publisher = cam.publisher();
//! publisher.send(vec![0u8; 1280 * 720 * 4])?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{anyhow, Context, Result};
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use relay_scale::channels::ChannelOrder;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Configuration for the virtual camera pipeline.
#[derive(Debug, Clone)]
pub struct VcamConfig {
    /// Device node handed to the sink element (`device=` property). `None`
    /// leaves the element's default in place.
    pub device: Option<String>,
    /// Sink element factory name (default: `v4l2sink`).
    pub element: String,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Frames per second, used for caps and timestamps
    pub framerate: u32,
    /// Channel order of the frames pushed by the caller
    pub input_order: ChannelOrder,
    /// Raw format negotiated with the device after conversion
    pub output_format: String,
    /// Maximum bytes queued in appsrc before `send` blocks.
    pub appsrc_max_bytes: Option<u64>,
}

impl Default for VcamConfig {
    fn default() -> Self {
        Self {
            device: None,
            element: "v4l2sink".into(),
            width: 1280,
            height: 720,
            framerate: 30,
            input_order: ChannelOrder::Rgba,
            output_format: "YUY2".into(),
            appsrc_max_bytes: Some(4 * 1024 * 1024),
        }
    }
}

impl VcamConfig {
    /// Bytes in one tightly packed input frame.
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    /// Nanoseconds between two frames.
    pub fn frame_duration_ns(&self) -> u64 {
        1_000_000_000u64 / self.framerate.max(1) as u64
    }

    /// `gst-launch` description of the output pipeline.
    pub fn launch_description(&self) -> String {
        let mut sink = self.element.clone();
        if let Some(device) = &self.device {
            sink.push_str(&format!(" device=\"{}\"", device));
        }
        format!(
            "appsrc name=src is-live=true format=time block=true \
             caps=video/x-raw,format={},width={},height={},framerate={}/1 \
             ! videoconvert ! video/x-raw,format={} ! {} sync=false",
            self.input_order.gst_format(),
            self.width,
            self.height,
            self.framerate,
            self.output_format,
            sink
        )
    }
}

/// An open virtual camera. Dropping it releases the device.
pub struct VirtualCamera {
    pipeline: gst::Pipeline,
    publisher: VcamPublisher,
    closed: bool,
}

/// Cloneable handle for pushing frames into an open [`VirtualCamera`].
#[derive(Clone)]
pub struct VcamPublisher {
    appsrc: gst_app::AppSrc,
    frame_len: usize,
    frame_duration_ns: u64,
    next_pts: Arc<AtomicU64>,
}

impl VirtualCamera {
    /// Build the pipeline, configure the appsrc and start playing.
    pub fn open(cfg: VcamConfig) -> Result<Self> {
        if cfg.width == 0 || cfg.height == 0 || cfg.framerate == 0 {
            return Err(anyhow!(
                "virtual camera needs non-zero geometry, got {}x{} @ {} fps",
                cfg.width,
                cfg.height,
                cfg.framerate
            ));
        }

        gst::init()?;

        let launch = cfg.launch_description();
        debug!(%launch, "building virtual camera pipeline");

        let pipeline = gst::parse::launch(&launch)
            .with_context(|| format!("failed to parse pipeline: {}", launch))?
            .downcast::<gst::Pipeline>()
            .map_err(|_| anyhow!("launch description did not produce a pipeline"))?;

        let appsrc = pipeline
            .by_name("src")
            .and_then(|element| element.downcast::<gst_app::AppSrc>().ok())
            .ok_or_else(|| anyhow!("failed to get appsrc element"))?;

        appsrc.set_format(gst::Format::Time);
        appsrc.set_is_live(true);
        appsrc.set_block(true);
        if let Some(bytes) = cfg.appsrc_max_bytes {
            appsrc.set_max_bytes(bytes);
        }

        if let Err(err) = pipeline.set_state(gst::State::Playing) {
            let _ = pipeline.set_state(gst::State::Null);
            return Err(anyhow!(
                "virtual camera refused to start ({}): {}",
                cfg.device.as_deref().unwrap_or("default device"),
                err
            ));
        }

        info!(
            device = cfg.device.as_deref().unwrap_or("default"),
            element = %cfg.element,
            "virtual camera opened ({}x{} @ {} fps)",
            cfg.width,
            cfg.height,
            cfg.framerate
        );

        Ok(Self {
            pipeline,
            publisher: VcamPublisher {
                appsrc,
                frame_len: cfg.frame_len(),
                frame_duration_ns: cfg.frame_duration_ns(),
                next_pts: Arc::new(AtomicU64::new(0)),
            },
            closed: false,
        })
    }

    /// Handle for pushing frames; may be moved to another thread.
    pub fn publisher(&self) -> VcamPublisher {
        self.publisher.clone()
    }

    /// Surface the first error posted on the pipeline bus, if any.
    pub fn check_bus(&self) -> Result<()> {
        let Some(bus) = self.pipeline.bus() else {
            return Ok(());
        };
        while let Some(msg) = bus.pop_filtered(&[gst::MessageType::Error]) {
            if let gst::MessageView::Error(err) = msg.view() {
                return Err(anyhow!(
                    "virtual camera error: {} ({})",
                    err.error(),
                    err.debug().map(|d| d.to_string()).unwrap_or_default()
                ));
            }
        }
        Ok(())
    }

    /// Send end-of-stream and stop the pipeline. Safe to call more than once.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let _ = self.publisher.appsrc.end_of_stream();
        self.pipeline
            .set_state(gst::State::Null)
            .context("failed to stop virtual camera pipeline")?;
        info!("virtual camera closed");
        Ok(())
    }
}

impl Drop for VirtualCamera {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("closing virtual camera on drop: {:#}", e);
        }
    }
}

impl VcamPublisher {
    /// Push one tightly packed frame. Blocks while appsrc is full.
    pub fn send(&self, data: Vec<u8>) -> Result<()> {
        if data.len() != self.frame_len {
            return Err(anyhow!(
                "frame is {} bytes, virtual camera expects {}",
                data.len(),
                self.frame_len
            ));
        }

        let pts = self
            .next_pts
            .fetch_add(self.frame_duration_ns, Ordering::Relaxed);

        let mut buffer = gst::Buffer::from_mut_slice(data);
        {
            let bufw = buffer.make_mut();
            bufw.set_pts(gst::ClockTime::from_nseconds(pts));
            bufw.set_duration(gst::ClockTime::from_nseconds(self.frame_duration_ns));
        }

        self.appsrc
            .push_buffer(buffer)
            .map(|_| ())
            .map_err(|e| anyhow!("virtual camera rejected frame: {:?}", e))
    }

    /// Bytes expected per frame.
    pub fn frame_len(&self) -> usize {
        self.frame_len
    }
}
