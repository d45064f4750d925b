//! # Relay Session
//!
//! Orchestrates one relay run: pull a frame from the capture source, run it
//! through the processing pipeline, push it to the sink, wait out the frame
//! interval, repeat.
//!
//! ## Architecture
//!
//! 1. **CaptureSource Trait**: where frames come from
//! 2. **RelaySession**: owns source, pipeline and sink for one run
//! 3. **RelaySessionBuilder**: fluent assembly with validation at build time
//! 4. **RelayHandle**: a session spawned as a tokio task, with a cancellation
//!    token and a status channel for front ends
//!
//! ## Termination
//!
//! The loop ends on the first of: end of stream, a failed pull, a pull that
//! exceeds the timeout, or cancellation. Sources bound their own waits by the
//! pull timeout; the session allows [`PULL_GRACE`] on top so an error a
//! source reports at its deadline still arrives as a failed pull. Each becomes a [`StopReason`] in the
//! returned [`RelayReport`]. Processing and sink failures are returned as
//! errors instead. The source and sink are shut down on every path once
//! they were opened.

use std::time::Duration;

use async_trait::async_trait;
use relay_scale::plan::FitMode;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{DEFAULT_PULL_TIMEOUT, check_pull_timeout};
use crate::core::{Pacer, VideoFrame};
use crate::error::{RelayError, RelayResult};
use crate::processing::{FrameProcessor, FrameSink, ProcessingPipeline};

/// Extra time the session waits past the pull timeout before giving up on a
/// source that has not answered at all.
pub const PULL_GRACE: Duration = Duration::from_secs(1);

/// Abstract interface for frame sources.
#[async_trait]
pub trait CaptureSource: Send {
    /// Connect to the source. Called once before the first pull.
    async fn open(&mut self) -> RelayResult<()>;

    /// Next decoded frame. `Ok(None)` means the stream ended normally.
    /// Implementations should give up after the session's pull timeout.
    async fn capture_frame(&mut self) -> RelayResult<Option<VideoFrame>>;

    /// Release the source. Called once after a successful `open`.
    async fn shutdown(&mut self) -> RelayResult<()>;

    /// Human-readable identity for logs (URL, device name).
    fn describe(&self) -> String;
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Idle,
    Streaming,
    Stopped,
}

/// Why a run ended without an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The source reported end of stream
    EndOfStream,
    /// The source could not deliver a frame
    PullFailed(String),
    /// No frame arrived within the pull timeout
    Timeout(Duration),
    /// The run was cancelled from outside
    Cancelled,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::EndOfStream => write!(f, "end of stream"),
            StopReason::PullFailed(reason) => write!(f, "frame read failed: {}", reason),
            StopReason::Timeout(after) => write!(f, "no frame within {:?}", after),
            StopReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Outcome of a run that ended without an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayReport {
    pub frames_relayed: u64,
    pub stop_reason: StopReason,
}

/// Progress events emitted while a session runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayStatus {
    /// Source and sink are open
    Started {
        source: String,
        width: u32,
        height: u32,
        fps: u32,
    },
    /// Running total, sent about once per second of output
    Progress { frames: u64 },
    Stopped(RelayReport),
    Failed(String),
}

/// Everything one relay run needs, ready to go.
pub struct RelaySession {
    source: Box<dyn CaptureSource>,
    pipeline: ProcessingPipeline,
    sink: Box<dyn FrameSink>,
    pull_timeout: Duration,
    state: RelayState,
}

impl std::fmt::Debug for RelaySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelaySession")
            .field("source", &self.source.describe())
            .field("sink", self.sink.config())
            .field("processors", &self.pipeline.len())
            .field("pull_timeout", &self.pull_timeout)
            .field("state", &self.state)
            .finish()
    }
}

impl RelaySession {
    pub fn builder() -> RelaySessionBuilder {
        RelaySessionBuilder::new()
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Run to completion. A session runs once; a second call is a state
    /// error.
    ///
    /// `status`, when given, receives [`RelayStatus`] events; a dropped
    /// receiver is ignored.
    pub async fn run(
        &mut self,
        cancel: CancellationToken,
        status: Option<UnboundedSender<RelayStatus>>,
    ) -> RelayResult<RelayReport> {
        let result = self.run_inner(&cancel, status.as_ref()).await;
        self.state = RelayState::Stopped;
        match &result {
            Ok(report) => {
                info!(
                    frames = report.frames_relayed,
                    reason = %report.stop_reason,
                    "relay stopped"
                );
                emit(status.as_ref(), RelayStatus::Stopped(report.clone()));
            }
            Err(e) => {
                warn!(error = %e, category = e.category(), "relay failed");
                emit(status.as_ref(), RelayStatus::Failed(e.to_string()));
            }
        }
        result
    }

    async fn run_inner(
        &mut self,
        cancel: &CancellationToken,
        status: Option<&UnboundedSender<RelayStatus>>,
    ) -> RelayResult<RelayReport> {
        if self.state != RelayState::Idle {
            return Err(RelayError::state(
                format!("{:?}", self.state),
                "run",
                "a session runs once",
            ));
        }
        if cancel.is_cancelled() {
            return Ok(report(0, StopReason::Cancelled));
        }

        let source_name = self.source.describe();
        self.source.open().await?;
        if let Err(e) = self.sink.open().await {
            release(self.source.shutdown().await, "source");
            return Err(e);
        }

        let sink = *self.sink.config();
        info!(
            source = %source_name,
            width = sink.width,
            height = sink.height,
            fps = sink.fps,
            "relay started"
        );
        emit(
            status,
            RelayStatus::Started {
                source: source_name,
                width: sink.width,
                height: sink.height,
                fps: sink.fps,
            },
        );
        self.state = RelayState::Streaming;

        let outcome = self.stream(cancel, status).await;

        // Release both sides whatever the outcome; the first error wins.
        let source_closed = self.source.shutdown().await;
        let sink_closed = self.sink.shutdown().await;
        let report = outcome?;
        source_closed?;
        sink_closed?;
        Ok(report)
    }

    async fn stream(
        &mut self,
        cancel: &CancellationToken,
        status: Option<&UnboundedSender<RelayStatus>>,
    ) -> RelayResult<RelayReport> {
        let fps = self.sink.config().fps.max(1);
        let mut pacer = Pacer::new(Duration::from_secs(1) / fps);
        let mut frames = 0u64;

        loop {
            let pulled = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(report(frames, StopReason::Cancelled)),
                pulled = tokio::time::timeout(
                    self.pull_timeout + PULL_GRACE,
                    self.source.capture_frame(),
                ) => pulled,
            };

            let frame = match pulled {
                Ok(Ok(Some(frame))) => frame,
                Ok(Ok(None)) => return Ok(report(frames, StopReason::EndOfStream)),
                Ok(Err(RelayError::Timeout { .. })) | Err(_) => {
                    warn!(after = ?self.pull_timeout, "no frame from source");
                    return Ok(report(frames, StopReason::Timeout(self.pull_timeout)));
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "frame read failed");
                    return Ok(report(frames, StopReason::PullFailed(e.to_string())));
                }
            };

            let frame = self.pipeline.process_frame(frame)?;
            self.sink.send_frame(frame).await?;
            frames += 1;
            debug!(frames, "frame relayed");
            if frames % u64::from(fps) == 0 {
                emit(status, RelayStatus::Progress { frames });
            }

            let deadline = pacer.next_deadline();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(report(frames, StopReason::Cancelled)),
                _ = tokio::time::sleep_until(deadline) => {}
            }
        }
    }
}

fn report(frames_relayed: u64, stop_reason: StopReason) -> RelayReport {
    RelayReport {
        frames_relayed,
        stop_reason,
    }
}

fn emit(status: Option<&UnboundedSender<RelayStatus>>, event: RelayStatus) {
    if let Some(tx) = status {
        let _ = tx.send(event);
    }
}

fn release(result: RelayResult<()>, what: &str) {
    if let Err(e) = result {
        warn!(error = %e, "failed to release {}", what);
    }
}

/// Builder for [`RelaySession`].
pub struct RelaySessionBuilder {
    source: Option<Box<dyn CaptureSource>>,
    sink: Option<Box<dyn FrameSink>>,
    extra: Vec<Box<dyn FrameProcessor>>,
    fit: FitMode,
    pull_timeout: Duration,
}

impl Default for RelaySessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RelaySessionBuilder {
    pub fn new() -> Self {
        Self {
            source: None,
            sink: None,
            extra: Vec::new(),
            fit: FitMode::default(),
            pull_timeout: DEFAULT_PULL_TIMEOUT,
        }
    }

    pub fn with_capture_source<S: CaptureSource + 'static>(mut self, source: S) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn with_sink<K: FrameSink + 'static>(mut self, sink: K) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Append a processor after the standard resize and reorder steps.
    pub fn with_processor<P: FrameProcessor + 'static>(mut self, processor: P) -> Self {
        self.extra.push(Box::new(processor));
        self
    }

    pub fn with_fit(mut self, fit: FitMode) -> Self {
        self.fit = fit;
        self
    }

    pub fn with_pull_timeout(mut self, timeout: Duration) -> Self {
        self.pull_timeout = timeout;
        self
    }

    pub fn build(self) -> RelayResult<RelaySession> {
        let source = self.source.ok_or_else(|| {
            RelayError::state("building", "build", "no capture source specified")
        })?;
        let sink = self
            .sink
            .ok_or_else(|| RelayError::state("building", "build", "no sink specified"))?;
        check_pull_timeout(self.pull_timeout)?;

        let mut pipeline = ProcessingPipeline::for_sink(sink.config(), self.fit);
        for processor in self.extra {
            pipeline.push(processor);
        }

        Ok(RelaySession {
            source,
            pipeline,
            sink,
            pull_timeout: self.pull_timeout,
            state: RelayState::Idle,
        })
    }
}

/// A session running on the tokio runtime.
pub struct RelayHandle {
    cancel: CancellationToken,
    status: UnboundedReceiver<RelayStatus>,
    task: JoinHandle<RelayResult<RelayReport>>,
}

impl RelayHandle {
    /// Spawn on the current runtime. Panics outside a runtime, like
    /// [`tokio::spawn`].
    pub fn spawn(session: RelaySession) -> Self {
        Self::spawn_on(session, &tokio::runtime::Handle::current())
    }

    /// Spawn on an explicit runtime, for callers that are not async.
    pub fn spawn_on(session: RelaySession, runtime: &tokio::runtime::Handle) -> Self {
        let cancel = CancellationToken::new();
        let (tx, status) = unbounded_channel();
        let token = cancel.clone();
        let task = runtime.spawn(async move {
            let mut session = session;
            session.run(token, Some(tx)).await
        });
        Self {
            cancel,
            status,
            task,
        }
    }

    /// Ask the session to stop; it finishes the current step and releases.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Next queued status event, without waiting.
    ///
    /// `Empty` means the session is still running. `Disconnected` is only
    /// returned once the session has finished and every event it sent,
    /// including the final `Stopped` or `Failed`, has been taken.
    pub fn try_status(&mut self) -> Result<RelayStatus, TryRecvError> {
        self.status.try_recv()
    }

    /// Wait for the next status event; `None` once the session is gone.
    pub async fn next_status(&mut self) -> Option<RelayStatus> {
        self.status.recv().await
    }

    /// Wait for the session to finish.
    pub async fn join(self) -> RelayResult<RelayReport> {
        self.task
            .await
            .map_err(|e| RelayError::state("streaming", "join", e.to_string()))?
    }
}
