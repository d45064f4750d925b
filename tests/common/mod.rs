//! Common test utilities for the relay tests
//!
//! Scripted capture sources and recording sinks that stand in for the
//! network camera and the virtual camera device.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ipcam_relay::ChannelOrder;
use ipcam_relay::core::VideoFrame;
use ipcam_relay::error::{RelayError, RelayResult};
use ipcam_relay::processing::{FrameSink, SinkConfig};
use ipcam_relay::session::CaptureSource;

/// Colour of every synthetic camera frame, in BGRA.
pub const CAMERA_PIXEL: [u8; 4] = [10, 20, 30, 255];

/// What the source does once its frames are used up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ending {
    /// Report end of stream
    EndOfStream,
    /// Fail the pull
    Fail,
    /// Never answer
    Hang,
    /// Report its own pull timeout
    Timeout,
    /// Stay silent for the given time, then fail the pull
    FailAfter(Duration),
    /// Keep producing frames forever
    Endless,
}

/// Counts shared between a test and its mocks.
#[derive(Debug, Default)]
pub struct Tally {
    pub opens: AtomicUsize,
    pub pulls: AtomicUsize,
    pub source_shutdowns: AtomicUsize,
    pub sink_opens: AtomicUsize,
    pub pushes: AtomicUsize,
    pub sink_shutdowns: AtomicUsize,
    pub pushed: Mutex<Vec<(u32, u32, ChannelOrder, Option<[u8; 4]>)>>,
}

impl Tally {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn pulls(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }

    pub fn pushes(&self) -> usize {
        self.pushes.load(Ordering::SeqCst)
    }

    pub fn source_shutdowns(&self) -> usize {
        self.source_shutdowns.load(Ordering::SeqCst)
    }

    pub fn sink_shutdowns(&self) -> usize {
        self.sink_shutdowns.load(Ordering::SeqCst)
    }

    pub fn pushed(&self) -> Vec<(u32, u32, ChannelOrder, Option<[u8; 4]>)> {
        self.pushed.lock().unwrap().clone()
    }
}

/// Source that yields `frames` BGRA frames of `width`x`height`, then `ending`.
pub struct ScriptedSource {
    pub frames: usize,
    pub ending: Ending,
    pub width: u32,
    pub height: u32,
    pub fail_open: bool,
    pub tally: Arc<Tally>,
}

impl ScriptedSource {
    pub fn new(frames: usize, ending: Ending, tally: &Arc<Tally>) -> Self {
        Self {
            frames,
            ending,
            width: 64,
            height: 48,
            fail_open: false,
            tally: tally.clone(),
        }
    }

    pub fn sized(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

#[async_trait]
impl CaptureSource for ScriptedSource {
    async fn open(&mut self) -> RelayResult<()> {
        self.tally.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail_open {
            return Err(RelayError::capture_init("mock://camera", "refused"));
        }
        Ok(())
    }

    async fn capture_frame(&mut self) -> RelayResult<Option<VideoFrame>> {
        let pulled = self.tally.pulls.fetch_add(1, Ordering::SeqCst);
        if pulled < self.frames || self.ending == Ending::Endless {
            return Ok(Some(VideoFrame::solid(
                self.width,
                self.height,
                ChannelOrder::Bgra,
                CAMERA_PIXEL,
            )));
        }
        match self.ending {
            Ending::EndOfStream | Ending::Endless => Ok(None),
            Ending::Fail => Err(RelayError::frame_capture("connection reset")),
            Ending::Timeout => Err(RelayError::timeout("pull frame", 5000)),
            Ending::Hang => std::future::pending().await,
            Ending::FailAfter(delay) => {
                tokio::time::sleep(delay).await;
                Err(RelayError::frame_capture("camera unreachable"))
            }
        }
    }

    async fn shutdown(&mut self) -> RelayResult<()> {
        self.tally.source_shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "mock://camera".into()
    }
}

/// Sink that records what it was given. Optionally fails the push numbered
/// `fail_on` (1-based) or refuses to open.
pub struct RecordingSink {
    pub config: SinkConfig,
    pub fail_on: Option<usize>,
    pub fail_open: bool,
    pub tally: Arc<Tally>,
}

impl RecordingSink {
    pub fn new(width: u32, height: u32, fps: u32, tally: &Arc<Tally>) -> Self {
        Self {
            config: SinkConfig {
                width,
                height,
                fps,
                order: ChannelOrder::Rgba,
            },
            fail_on: None,
            fail_open: false,
            tally: tally.clone(),
        }
    }
}

#[async_trait]
impl FrameSink for RecordingSink {
    async fn open(&mut self) -> RelayResult<()> {
        self.tally.sink_opens.fetch_add(1, Ordering::SeqCst);
        if self.fail_open {
            return Err(RelayError::sink("mock-vcam", "device busy"));
        }
        Ok(())
    }

    async fn send_frame(&mut self, frame: VideoFrame) -> RelayResult<()> {
        let n = self.tally.pushes.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on == Some(n) {
            return Err(RelayError::sink("mock-vcam", "device unplugged"));
        }
        self.tally.pushed.lock().unwrap().push((
            frame.width,
            frame.height,
            frame.order,
            frame.pixel(0, 0),
        ));
        Ok(())
    }

    async fn shutdown(&mut self) -> RelayResult<()> {
        self.tally.sink_shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn config(&self) -> &SinkConfig {
        &self.config
    }
}
