//! # Cablevoice Core
//!
//! Speak typed text into a virtual audio cable so other applications hear it
//! as microphone input.
//!
//! ## Features
//!
//! - Remote speech synthesis with automatic splitting of long text
//! - Decoding of MP3/WAV payloads to normalized mono PCM
//! - Simultaneous playback on the cable and the default output
//! - A bounded work queue with a single playback consumer
//! - Typed status events for the front end
//!
//! ## Example
//!
//! ```rust,no_run
//! use cablevoice_core::{
//!     CableVoiceConfig, CpalBackend, GoogleTranslateTts, PipelineContext, Route, Session,
//!     StatusSender, Trigger, WorkQueue,
//! };
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CableVoiceConfig::default();
//!     let (status, mut events) = StatusSender::channel();
//!     let backend = Arc::new(CpalBackend::new());
//!     let session = Session::new(config.clone(), backend.as_ref(), status);
//!     let synthesizer = Arc::new(GoogleTranslateTts::new(config.synthesis.clone())?);
//!
//!     let queue = WorkQueue::start(PipelineContext::new(session, synthesizer, backend))?;
//!     queue.speak("Привет!", Route::Cable)?;
//!
//!     while let Some(event) = events.blocking_recv() {
//!         println!("{}", event.update);
//!         if event.is_terminal() {
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod artifact;
pub mod audio_device;
pub mod config;
pub mod decoder;
pub mod error;
pub mod pipeline;
pub mod playback;
pub mod session;
pub mod status;
pub mod synthesizer;

// Re-export main types for convenience
pub use artifact::{remove_artifact, TempArtifact};
pub use audio_device::{
    list_output_devices, resolve, AudioBackend, AudioDevice, CpalBackend, PlaybackStream,
    PlaybackTarget,
};
pub use config::{CableVoiceConfig, PipelineConfig, PipelineMode, SynthesisConfig};
pub use decoder::{AudioDecoder, DecodedAudio};
pub use error::{CableVoiceError, CableVoiceResult, DecodeErrorKind, SynthesisErrorKind};
pub use pipeline::{
    ConsumerState, InlineSpeaker, PipelineContext, PipelineTask, ShutdownOutcome, Trigger,
    WorkQueue,
};
pub use playback::{PlaybackEngine, PlaybackReport, TargetOutcome};
pub use session::{Route, Session};
pub use status::{RequestId, Stage, StatusEvent, StatusReceiver, StatusSender, StatusUpdate};
pub use synthesizer::{split_text, GoogleTranslateTts, SpeechSynthesizer, SynthesisRequest};

/// Version information for the cablevoice-core crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name fragment of the Virtual Audio Cable output looked up by default
pub const DEFAULT_DEVICE_NAME: &str = "Line 1 (Virtual Audio Cable)";

/// Default speech language
pub const DEFAULT_LANGUAGE: &str = "ru";

/// Speech endpoint used unless configured otherwise
pub const DEFAULT_TTS_ENDPOINT: &str = "https://translate.google.com/translate_tts";

/// Longest text fragment the speech endpoint accepts
pub const DEFAULT_CHUNK_CHARS: usize = 100;

/// Maximum text length for synthesis
pub const MAX_TEXT_LENGTH: usize = 5_000;
