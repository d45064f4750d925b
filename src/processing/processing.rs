//! # Frame Processing Pipeline
//!
//! Per-frame transforms between the camera and the virtual camera, plus the
//! sink abstraction the relay pushes finished frames into.
//!
//! ## Architecture
//!
//! 1. **FrameProcessor Trait**: one synchronous transform per frame
//! 2. **ProcessingPipeline**: an ordered processor chain
//! 3. **FrameSink Trait**: the output device interface
//!
//! The standard chain is resize to the configured geometry followed by a
//! channel reorder into the sink's pixel layout. Both processors keep their
//! scratch buffers between frames, so the steady state does not allocate
//! beyond the output frame itself.

use async_trait::async_trait;
use fast_image_resize::Resizer;
use relay_scale::channels::{ChannelOrder, convert_in_place};
use relay_scale::cpu::{Staging, scale_cpu};
use relay_scale::plan::{AspectMode, FitMode, ScalePlan, Size, build_plan};
use std::sync::Arc;
use tracing::debug;

use crate::core::VideoFrame;
use crate::error::{RelayError, RelayResult};

/// Output format of a sink, fixed when the sink is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Channel order the sink expects on its input
    pub order: ChannelOrder,
}

impl SinkConfig {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// A single synchronous transform applied to every frame.
pub trait FrameProcessor: Send {
    /// Short label used in error context and logs.
    fn name(&self) -> &'static str;

    fn process_frame(&mut self, frame: VideoFrame) -> RelayResult<VideoFrame>;
}

/// Abstract output device interface.
///
/// The relay calls `open` once, `send_frame` once per relayed frame and
/// `shutdown` exactly once on every exit path after a successful `open`.
#[async_trait]
pub trait FrameSink: Send {
    async fn open(&mut self) -> RelayResult<()>;
    /// Push one frame. The frame already matches [`FrameSink::config`].
    async fn send_frame(&mut self, frame: VideoFrame) -> RelayResult<()>;
    async fn shutdown(&mut self) -> RelayResult<()>;
    fn config(&self) -> &SinkConfig;
}

/// Composable processing pipeline.
#[derive(Default)]
pub struct ProcessingPipeline {
    pub processors: Vec<Box<dyn FrameProcessor>>,
}

impl ProcessingPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resize to the sink geometry, then reorder channels for the sink.
    pub fn for_sink(sink: &SinkConfig, fit: FitMode) -> Self {
        Self::new()
            .with(ResizeProcessor::new(sink.size(), fit.to_aspect()))
            .with(ChannelOrderProcessor::new(sink.order))
    }

    pub fn with(mut self, processor: impl FrameProcessor + 'static) -> Self {
        self.processors.push(Box::new(processor));
        self
    }

    pub fn push(&mut self, processor: Box<dyn FrameProcessor>) {
        self.processors.push(processor);
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Run a frame through every processor in order.
    pub fn process_frame(&mut self, frame: VideoFrame) -> RelayResult<VideoFrame> {
        let mut current = frame;
        for processor in &mut self.processors {
            current = processor
                .process_frame(current)
                .map_err(|e| e.with_operation(processor.name()))?;
        }
        Ok(current)
    }
}

/// Scales frames to a fixed output size.
///
/// The scale plan is rebuilt only when the input geometry changes, which for
/// a camera stream means once per run in practice.
pub struct ResizeProcessor {
    target: Size,
    aspect: AspectMode,
    resizer: Resizer,
    staging: Staging,
    plan: Option<ScalePlan>,
}

impl ResizeProcessor {
    pub fn new(target: Size, aspect: AspectMode) -> Self {
        Self {
            target,
            aspect,
            resizer: Resizer::new(),
            staging: Staging::with_capacity(0),
            plan: None,
        }
    }

    pub fn target(&self) -> Size {
        self.target
    }

    fn plan_for(&mut self, input: Size) -> ScalePlan {
        match self.plan {
            Some(plan) if plan.input == input => plan,
            _ => {
                let plan = build_plan(input, self.target, self.aspect);
                debug!(
                    in_w = input.w,
                    in_h = input.h,
                    out_w = self.target.w,
                    out_h = self.target.h,
                    letterbox = plan.dst_roi.is_some(),
                    "scale plan rebuilt"
                );
                self.plan = Some(plan);
                plan
            }
        }
    }
}

impl FrameProcessor for ResizeProcessor {
    fn name(&self) -> &'static str {
        "resize"
    }

    fn process_frame(&mut self, frame: VideoFrame) -> RelayResult<VideoFrame> {
        if frame.width == 0 || frame.height == 0 {
            return Err(RelayError::processing(
                "resize",
                format!("empty input frame {}x{}", frame.width, frame.height),
            ));
        }
        let plan = self.plan_for(frame.size());
        if plan.is_identity() && frame.is_packed() {
            return Ok(frame);
        }

        let mut out = vec![0u8; plan.out_len()];
        scale_cpu(
            &mut self.resizer,
            &frame.data,
            frame.size(),
            Some(frame.stride),
            &plan,
            &mut out,
            Some(&mut self.staging),
        )?;

        Ok(VideoFrame {
            data: Arc::new(out),
            width: plan.out.w,
            height: plan.out.h,
            stride: plan.out.w as usize * 4,
            order: frame.order,
            pts_ns: frame.pts_ns,
        })
    }
}

/// Rewrites pixels into a fixed channel order.
pub struct ChannelOrderProcessor {
    target: ChannelOrder,
}

impl ChannelOrderProcessor {
    pub fn new(target: ChannelOrder) -> Self {
        Self { target }
    }
}

impl FrameProcessor for ChannelOrderProcessor {
    fn name(&self) -> &'static str {
        "channel-order"
    }

    fn process_frame(&mut self, mut frame: VideoFrame) -> RelayResult<VideoFrame> {
        if frame.order == self.target {
            return Ok(frame);
        }
        // Copies only if another owner still holds the buffer.
        let data = Arc::make_mut(&mut frame.data);
        convert_in_place(data, frame.order, self.target);
        frame.order = self.target;
        Ok(frame)
    }
}

/// v4l2loopback output through `relay-vcam`.
#[cfg(feature = "gstreamer-io")]
pub struct VirtualCameraSink {
    vcam: relay_vcam::VcamConfig,
    config: SinkConfig,
    camera: Option<relay_vcam::VirtualCamera>,
    publisher: Option<relay_vcam::VcamPublisher>,
}

#[cfg(feature = "gstreamer-io")]
impl VirtualCameraSink {
    /// Sink for `width`x`height` RGBA frames at `fps` on `device` (or the
    /// element's default device).
    pub fn new(width: u32, height: u32, fps: u32, device: Option<String>) -> Self {
        let vcam = relay_vcam::VcamConfig {
            device,
            width,
            height,
            framerate: fps,
            input_order: ChannelOrder::Rgba,
            ..Default::default()
        };
        Self {
            config: SinkConfig {
                width,
                height,
                fps,
                order: vcam.input_order,
            },
            vcam,
            camera: None,
            publisher: None,
        }
    }

    fn target(&self) -> String {
        self.vcam
            .device
            .clone()
            .unwrap_or_else(|| self.vcam.element.clone())
    }
}

#[cfg(feature = "gstreamer-io")]
#[async_trait]
impl FrameSink for VirtualCameraSink {
    async fn open(&mut self) -> RelayResult<()> {
        if self.camera.is_some() {
            return Ok(());
        }
        let cfg = self.vcam.clone();
        let camera = tokio::task::spawn_blocking(move || relay_vcam::VirtualCamera::open(cfg))
            .await
            .map_err(|e| RelayError::sink(self.target(), e.to_string()))?
            .map_err(|e| {
                RelayError::sink(self.target(), format!("{e:#}"))
                    .with_recovery_suggestion("Check that v4l2loopback is loaded and the device exists")
            })?;
        self.publisher = Some(camera.publisher());
        self.camera = Some(camera);
        Ok(())
    }

    async fn send_frame(&mut self, frame: VideoFrame) -> RelayResult<()> {
        let publisher = self.publisher.clone().ok_or_else(|| {
            RelayError::state("closed", "send_frame", "virtual camera is not open")
        })?;
        if frame.width != self.config.width || frame.height != self.config.height {
            return Err(RelayError::sink(
                self.target(),
                format!(
                    "frame is {}x{}, device expects {}x{}",
                    frame.width, frame.height, self.config.width, self.config.height
                ),
            ));
        }
        if frame.order != self.config.order {
            return Err(RelayError::sink(
                self.target(),
                format!("frame is {:?}, device expects {:?}", frame.order, self.config.order),
            ));
        }

        let bytes = frame.into_packed_bytes();
        tokio::task::spawn_blocking(move || publisher.send(bytes))
            .await
            .map_err(|e| RelayError::sink(self.target(), e.to_string()))?
            .map_err(|e| RelayError::sink(self.target(), format!("{e:#}")))?;

        if let Some(camera) = &self.camera {
            camera
                .check_bus()
                .map_err(|e| RelayError::sink(self.target(), format!("{e:#}")))?;
        }
        Ok(())
    }

    async fn shutdown(&mut self) -> RelayResult<()> {
        self.publisher = None;
        if let Some(mut camera) = self.camera.take() {
            camera
                .close()
                .map_err(|e| RelayError::sink(self.target(), format!("{e:#}")))?;
        }
        Ok(())
    }

    fn config(&self) -> &SinkConfig {
        &self.config
    }
}
