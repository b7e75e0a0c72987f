//! Simultaneous playback of one clip on several output targets.

use crate::audio_device::{AudioBackend, PlaybackStream, PlaybackTarget};
use crate::decoder::DecodedAudio;
use crate::error::{CableVoiceError, CableVoiceResult};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What happened on one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetOutcome {
    /// The target
    pub target: PlaybackTarget,
    /// `Ok` if the stream started and played to the end
    pub result: CableVoiceResult<()>,
    /// Whether the stream got started at all
    pub started: bool,
}

/// Per-target results of one [`PlaybackEngine::play`] call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackReport {
    /// One entry per requested target, in request order
    pub outcomes: Vec<TargetOutcome>,
    /// Set when nothing could be attempted (no audio or no targets)
    pub aborted: Option<CableVoiceError>,
}

impl PlaybackReport {
    fn aborted(error: CableVoiceError) -> Self {
        Self {
            outcomes: Vec::new(),
            aborted: Some(error),
        }
    }

    /// True iff at least one target stream started
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.outcomes.iter().any(|o| o.started)
    }

    /// Number of targets that started
    #[must_use]
    pub fn started_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.started).count()
    }

    /// Collapse into a single result for status reporting
    ///
    /// # Errors
    ///
    /// Returns the abort reason, or the first target error if no target started
    pub fn into_result(self) -> CableVoiceResult<()> {
        if self.succeeded() {
            return Ok(());
        }
        if let Some(error) = self.aborted {
            return Err(error);
        }
        Err(self
            .outcomes
            .into_iter()
            .find_map(|o| o.result.err())
            .unwrap_or_else(|| CableVoiceError::playback("No output stream could be started")))
    }
}

/// Plays decoded audio through an [`AudioBackend`]
#[derive(Clone)]
pub struct PlaybackEngine {
    backend: Arc<dyn AudioBackend>,
}

impl std::fmt::Debug for PlaybackEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackEngine").finish_non_exhaustive()
    }
}

impl PlaybackEngine {
    /// Create an engine on top of `backend`
    #[must_use]
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        Self { backend }
    }

    /// The backend streams are opened on
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn AudioBackend> {
        &self.backend
    }

    /// Play `audio` on every target and block until all started streams finish.
    ///
    /// Streams are started one after another, so two targets may begin a few
    /// milliseconds apart. A target that fails to start is skipped.
    pub fn play(&self, audio: DecodedAudio, targets: &[PlaybackTarget]) -> PlaybackReport {
        if audio.is_empty() {
            return PlaybackReport::aborted(CableVoiceError::playback("No audio to play"));
        }
        if targets.is_empty() {
            return PlaybackReport::aborted(CableVoiceError::playback(
                "No playback target configured",
            ));
        }

        info!(
            "Playing {:.2}s at {} Hz on {} target(s)",
            audio.duration().as_secs_f32(),
            audio.sample_rate,
            targets.len()
        );

        let audio = Arc::new(audio);
        let mut started: Vec<(usize, Box<dyn PlaybackStream>)> = Vec::with_capacity(targets.len());
        let mut outcomes: Vec<TargetOutcome> = Vec::with_capacity(targets.len());

        for (slot, &target) in targets.iter().enumerate() {
            match self.backend.start(target, Arc::clone(&audio)) {
                Ok(stream) => {
                    debug!("Stream started on {}", target);
                    started.push((slot, stream));
                    outcomes.push(TargetOutcome {
                        target,
                        result: Ok(()),
                        started: true,
                    });
                }
                Err(e) => {
                    warn!("Skipping {}: {}", target, e);
                    outcomes.push(TargetOutcome {
                        target,
                        result: Err(e),
                        started: false,
                    });
                }
            }
        }

        for (slot, stream) in started {
            if let Err(e) = stream.wait() {
                warn!("Playback on {} ended early: {}", outcomes[slot].target, e);
                outcomes[slot].result = Err(e);
            }
        }

        PlaybackReport {
            outcomes,
            aborted: None,
        }
    }
}
