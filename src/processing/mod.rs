//! # Processing Module
//!
//! Frame transforms applied between capture and the virtual camera, and the
//! sink trait frames are pushed into.

pub mod processing;

pub use processing::{
    ChannelOrderProcessor, FrameProcessor, FrameSink, ProcessingPipeline, ResizeProcessor,
    SinkConfig,
};
#[cfg(feature = "gstreamer-io")]
pub use processing::VirtualCameraSink;
