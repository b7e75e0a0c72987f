//! Trigger handling: synthesis producers, the playback work queue and inline mode.
//!
//! In queued mode every trigger gets a short-lived producer thread that only
//! synthesizes and enqueues a temporary artifact. One long-lived consumer
//! thread drains the queue in FIFO order, so playback order is the order in
//! which synthesis finished and at most one playback touches the audio
//! subsystem at a time.

use crate::artifact::TempArtifact;
use crate::audio_device::{AudioBackend, PlaybackTarget};
use crate::decoder::{AudioDecoder, DecodedAudio};
use crate::error::{CableVoiceError, CableVoiceResult};
use crate::playback::PlaybackEngine;
use crate::session::{Route, Session};
use crate::status::{RequestId, Stage, StatusUpdate};
use crate::synthesizer::{SpeechSynthesizer, SynthesisRequest};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

/// Extension of the artifacts written by producers
const ARTIFACT_EXTENSION: &str = "mp3";

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Entry point the front end calls for both trigger actions
pub trait Trigger {
    /// Start speaking `text` on `route`.
    ///
    /// Validation failures are reported on the status channel, not returned.
    ///
    /// # Errors
    ///
    /// Returns `ConcurrencyError` if the trigger is unavailable (shut down or busy)
    fn speak(&self, text: &str, route: Route) -> CableVoiceResult<RequestId>;
}

/// Everything a request needs on its way from text to speakers
pub struct PipelineContext {
    session: Arc<Session>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    engine: PlaybackEngine,
    decoder: AudioDecoder,
}

impl std::fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("session", &self.session)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl PipelineContext {
    /// Assemble a context
    #[must_use]
    pub fn new(
        session: Session,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        backend: Arc<dyn AudioBackend>,
    ) -> Self {
        Self {
            session: Arc::new(session),
            synthesizer,
            engine: PlaybackEngine::new(backend),
            decoder: AudioDecoder::new(),
        }
    }

    /// Session the context was built with
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    fn prepare(&self, text: &str, route: Route) -> CableVoiceResult<(SynthesisRequest, Vec<PlaybackTarget>)> {
        let request = SynthesisRequest::new(text, self.session.config().language.clone())?;
        let targets = self.session.targets_for(route)?;
        Ok((request, targets))
    }

    fn synthesize(&self, id: RequestId, request: &SynthesisRequest) -> CableVoiceResult<Vec<u8>> {
        self.session.status().progress(id, Stage::Generating);
        self.synthesizer.synthesize(request)
    }

    fn decode_and_play<F>(
        &self,
        id: RequestId,
        decode: F,
        targets: &[PlaybackTarget],
        state: Option<&Mutex<ConsumerState>>,
    ) -> CableVoiceResult<()>
    where
        F: FnOnce(&AudioDecoder) -> CableVoiceResult<DecodedAudio>,
    {
        let status = self.session.status();

        set_state(state, ConsumerState::Decoding);
        status.progress(id, Stage::Decoding);
        let audio = decode(&self.decoder)?;

        set_state(state, ConsumerState::Playing);
        status.progress(id, Stage::Playing);
        self.engine.play(audio, targets).into_result()
    }

    fn finish(&self, id: RequestId, result: CableVoiceResult<()>) {
        match result {
            Ok(()) => {
                info!("Request {} done", id);
                self.session.status().send(id, StatusUpdate::Done);
            }
            Err(e) => {
                warn!("Request {} failed ({}): {}", id, e.category(), e);
                self.session.status().failed(id, &e);
            }
        }
    }
}

fn set_state(state: Option<&Mutex<ConsumerState>>, next: ConsumerState) {
    if let Some(state) = state {
        *state.lock() = next;
    }
}

/// Playback consumer lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    /// Waiting on the queue
    Idle,
    /// Decoding an artifact
    Decoding,
    /// Streams are playing
    Playing,
    /// Removing the artifact
    Cleanup,
    /// Sentinel seen, releasing anything left behind it
    Draining,
    /// Thread has exited its loop
    Terminated,
}

/// Work item passed from producers to the consumer
#[derive(Debug)]
pub enum PipelineTask {
    /// Decode and play a synthesized artifact
    Play {
        /// Originating trigger
        request: RequestId,
        /// Encoded speech, owned by the consumer from here on
        artifact: TempArtifact,
        /// Where to play it
        targets: Vec<PlaybackTarget>,
    },
    /// Stop the consumer once everything queued before it is played
    Shutdown,
}

/// How a bounded shutdown ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// The consumer exited within the bound
    Drained,
    /// The consumer was still busy and has been left running
    TimedOut,
}

/// Bounded FIFO of synthesized speech with a single playback consumer
#[derive(Debug)]
pub struct WorkQueue {
    context: Arc<PipelineContext>,
    sender: mpsc::Sender<PipelineTask>,
    consumer: Option<JoinHandle<()>>,
    state: Arc<Mutex<ConsumerState>>,
    next_request: AtomicU64,
}

impl WorkQueue {
    /// Spawn the playback consumer
    ///
    /// # Errors
    ///
    /// Returns `ConcurrencyError` if the consumer thread cannot be spawned
    pub fn start(context: PipelineContext) -> CableVoiceResult<Self> {
        let capacity = context.session().config().pipeline.queue_capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        let context = Arc::new(context);
        let state = Arc::new(Mutex::new(ConsumerState::Idle));

        let consumer = std::thread::Builder::new()
            .name("cablevoice-playback".to_string())
            .spawn({
                let context = Arc::clone(&context);
                let state = Arc::clone(&state);
                move || run_consumer(&context, receiver, &state)
            })
            .map_err(|e| {
                CableVoiceError::concurrency(format!("Failed to spawn playback consumer: {e}"))
            })?;

        info!("Playback queue started (capacity {})", capacity);
        Ok(Self {
            context,
            sender,
            consumer: Some(consumer),
            state,
            next_request: AtomicU64::new(0),
        })
    }

    /// Validate a trigger and hand it to a producer thread
    ///
    /// # Errors
    ///
    /// Returns `ConcurrencyError` if the queue is shut down or no thread can be spawned
    pub fn submit(&self, text: &str, route: Route) -> CableVoiceResult<RequestId> {
        if self.consumer.is_none() || self.sender.is_closed() {
            return Err(CableVoiceError::concurrency("Playback queue is shut down"));
        }

        let id = self.next_request.fetch_add(1, Ordering::Relaxed) + 1;
        let (request, targets) = match self.context.prepare(text, route) {
            Ok(prepared) => prepared,
            Err(e) => {
                debug!("Request {} rejected: {}", id, e);
                self.context.session().status().failed(id, &e);
                return Ok(id);
            }
        };

        let context = Arc::clone(&self.context);
        let sender = self.sender.clone();
        std::thread::Builder::new()
            .name(format!("cablevoice-synth-{id}"))
            .spawn(move || produce(&context, &sender, id, &request, targets))
            .map_err(|e| CableVoiceError::concurrency(format!("Failed to spawn producer: {e}")))?;

        debug!("Request {} submitted for {}", id, route);
        Ok(id)
    }

    /// Current consumer state
    #[must_use]
    pub fn consumer_state(&self) -> ConsumerState {
        *self.state.lock()
    }

    /// Artifacts waiting for the consumer
    #[must_use]
    pub fn pending(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    /// Enqueue the sentinel and wait up to `timeout` for the consumer to exit.
    ///
    /// A consumer still playing when the bound expires is detached, not killed.
    pub fn shutdown(&mut self, timeout: Duration) -> ShutdownOutcome {
        let Some(handle) = self.consumer.take() else {
            return ShutdownOutcome::Drained;
        };
        let deadline = Instant::now() + timeout;
        info!("Shutting down playback queue");

        let mut task = PipelineTask::Shutdown;
        loop {
            match self.sender.try_send(task) {
                Ok(()) | Err(TrySendError::Closed(_)) => break,
                Err(TrySendError::Full(returned)) => {
                    if Instant::now() >= deadline {
                        warn!("Playback queue still full after {:?}, detaching consumer", timeout);
                        return ShutdownOutcome::TimedOut;
                    }
                    task = returned;
                    std::thread::sleep(POLL_INTERVAL);
                }
            }
        }

        while !handle.is_finished() {
            if Instant::now() >= deadline {
                warn!("Playback consumer still running after {:?}, detaching", timeout);
                return ShutdownOutcome::TimedOut;
            }
            std::thread::sleep(POLL_INTERVAL);
        }
        if handle.join().is_err() {
            warn!("Playback consumer panicked");
        }
        info!("Playback queue drained");
        ShutdownOutcome::Drained
    }
}

impl Trigger for WorkQueue {
    fn speak(&self, text: &str, route: Route) -> CableVoiceResult<RequestId> {
        self.submit(text, route)
    }
}

impl Drop for WorkQueue {
    fn drop(&mut self) {
        if self.consumer.is_some() {
            let timeout = self.context.session().config().pipeline.shutdown_timeout();
            self.shutdown(timeout);
        }
    }
}

fn produce(
    context: &PipelineContext,
    sender: &mpsc::Sender<PipelineTask>,
    id: RequestId,
    request: &SynthesisRequest,
    targets: Vec<PlaybackTarget>,
) {
    let status = context.session().status();
    let dir = context.session().config().pipeline.artifact_dir();

    let artifact = match context
        .synthesize(id, request)
        .and_then(|payload| TempArtifact::create(&dir, ARTIFACT_EXTENSION, &payload))
    {
        Ok(artifact) => artifact,
        Err(e) => {
            context.finish(id, Err(e));
            return;
        }
    };

    status.progress(id, Stage::Queued);
    let task = PipelineTask::Play {
        request: id,
        artifact,
        targets,
    };
    // A rejected task is dropped here, which removes its artifact.
    if sender.blocking_send(task).is_err() {
        context.finish(id, Err(CableVoiceError::concurrency("Playback queue is closed")));
    }
}

fn run_consumer(
    context: &PipelineContext,
    mut receiver: mpsc::Receiver<PipelineTask>,
    state: &Mutex<ConsumerState>,
) {
    debug!("Playback consumer running");
    *state.lock() = ConsumerState::Idle;
    loop {
        match receiver.blocking_recv() {
            Some(PipelineTask::Play {
                request,
                artifact,
                targets,
            }) => play_artifact(context, request, artifact, &targets, state),
            Some(PipelineTask::Shutdown) | None => break,
        }
    }

    *state.lock() = ConsumerState::Draining;
    receiver.close();
    while let Ok(task) = receiver.try_recv() {
        if let PipelineTask::Play { request, .. } = task {
            context.finish(
                request,
                Err(CableVoiceError::concurrency("Shut down before playback")),
            );
        }
    }

    *state.lock() = ConsumerState::Terminated;
    debug!("Playback consumer exited");
}

fn play_artifact(
    context: &PipelineContext,
    id: RequestId,
    mut artifact: TempArtifact,
    targets: &[PlaybackTarget],
    state: &Mutex<ConsumerState>,
) {
    let result = context.decode_and_play(
        id,
        |decoder| decoder.decode_file(artifact.path()),
        targets,
        Some(state),
    );

    *state.lock() = ConsumerState::Cleanup;
    if let Err(e) = artifact.cleanup() {
        warn!("{}", e);
    }
    // Idle must be observable by the time the terminal status arrives.
    *state.lock() = ConsumerState::Idle;
    context.finish(id, result);
}

/// Re-enables the trigger when an inline request ends, however it ends
struct BusyGuard {
    busy: Arc<AtomicBool>,
    context: Arc<PipelineContext>,
    id: RequestId,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
        self.context
            .session()
            .status()
            .send(self.id, StatusUpdate::ControlsEnabled(true));
    }
}

/// One request at a time, synthesized, decoded and played on a single worker.
///
/// The trigger counts as disabled while a request is in flight; further
/// calls are refused until the worker finishes.
#[derive(Debug)]
pub struct InlineSpeaker {
    context: Arc<PipelineContext>,
    busy: Arc<AtomicBool>,
    next_request: AtomicU64,
}

impl InlineSpeaker {
    /// Create an inline speaker
    #[must_use]
    pub fn new(context: PipelineContext) -> Self {
        Self {
            context: Arc::new(context),
            busy: Arc::new(AtomicBool::new(false)),
            next_request: AtomicU64::new(0),
        }
    }

    /// Whether a request is in flight
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Trigger for InlineSpeaker {
    fn speak(&self, text: &str, route: Route) -> CableVoiceResult<RequestId> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CableVoiceError::concurrency("A request is already in progress"));
        }

        let id = self.next_request.fetch_add(1, Ordering::Relaxed) + 1;
        self.context
            .session()
            .status()
            .send(id, StatusUpdate::ControlsEnabled(false));
        let guard = BusyGuard {
            busy: Arc::clone(&self.busy),
            context: Arc::clone(&self.context),
            id,
        };

        let (request, targets) = match self.context.prepare(text, route) {
            Ok(prepared) => prepared,
            Err(e) => {
                self.context.session().status().failed(id, &e);
                drop(guard);
                return Ok(id);
            }
        };

        let context = Arc::clone(&self.context);
        std::thread::Builder::new()
            .name(format!("cablevoice-inline-{id}"))
            .spawn(move || {
                let _guard = guard;
                let result = context.synthesize(id, &request).and_then(|payload| {
                    context.decode_and_play(id, |decoder| decoder.decode(payload), &targets, None)
                });
                context.finish(id, result);
            })
            .map_err(|e| CableVoiceError::concurrency(format!("Failed to spawn worker: {e}")))?;

        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_state_without_tracker() {
        set_state(None, ConsumerState::Playing);

        let state = Mutex::new(ConsumerState::Idle);
        set_state(Some(&state), ConsumerState::Cleanup);
        assert_eq!(*state.lock(), ConsumerState::Cleanup);
    }
}
