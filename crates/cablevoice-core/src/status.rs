//! Typed status events sent from pipeline threads to the UI thread.

use std::fmt;
use tokio::sync::mpsc;
use tracing::debug;

/// Identifies one trigger from submission to completion
pub type RequestId = u64;

/// Pipeline stage a request has reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Waiting for the speech service
    Generating,
    /// Synthesized and waiting for the playback consumer
    Queued,
    /// Turning the payload into PCM
    Decoding,
    /// Streams are playing
    Playing,
}

/// One status change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    /// The request moved to a new stage
    Progress(Stage),
    /// The request played on at least one target
    Done,
    /// The request was abandoned
    Failed(String),
    /// Trigger controls should be enabled or disabled
    ControlsEnabled(bool),
}

impl fmt::Display for StatusUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Progress(Stage::Generating) => write!(f, "Generating speech…"),
            Self::Progress(Stage::Queued) => write!(f, "Queued for playback…"),
            Self::Progress(Stage::Decoding) => write!(f, "Processing audio…"),
            Self::Progress(Stage::Playing) => write!(f, "Playing…"),
            Self::Done => write!(f, "Done."),
            Self::Failed(reason) => write!(f, "Error: {reason}"),
            Self::ControlsEnabled(true) => write!(f, "Ready."),
            Self::ControlsEnabled(false) => write!(f, "Starting…"),
        }
    }
}

/// A status update tagged with its request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    /// Which trigger this is about
    pub request: RequestId,
    /// What changed
    pub update: StatusUpdate,
}

impl StatusEvent {
    /// Whether the request has reached a final state
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self.update, StatusUpdate::Done | StatusUpdate::Failed(_))
    }
}

/// Receiving end held by the UI thread
pub type StatusReceiver = mpsc::UnboundedReceiver<StatusEvent>;

/// Sending end shared by every pipeline thread
#[derive(Debug, Clone)]
pub struct StatusSender {
    inner: mpsc::UnboundedSender<StatusEvent>,
}

impl StatusSender {
    /// Create a connected sender/receiver pair
    #[must_use]
    pub fn channel() -> (Self, StatusReceiver) {
        let (inner, rx) = mpsc::unbounded_channel();
        (Self { inner }, rx)
    }

    /// Deliver an update; a closed UI is not an error
    pub fn send(&self, request: RequestId, update: StatusUpdate) {
        debug!("request {}: {}", request, update);
        if self.inner.send(StatusEvent { request, update }).is_err() {
            debug!("Status receiver is gone, dropping update for request {}", request);
        }
    }

    /// Shorthand for a progress update
    pub fn progress(&self, request: RequestId, stage: Stage) {
        self.send(request, StatusUpdate::Progress(stage));
    }

    /// Shorthand for a failure update
    pub fn failed(&self, request: RequestId, error: &crate::CableVoiceError) {
        self.send(request, StatusUpdate::Failed(error.status_text()));
    }
}
