//! Per-process session state shared by every pipeline component.

use crate::audio_device::{self, AudioBackend, PlaybackTarget};
use crate::config::CableVoiceConfig;
use crate::error::{CableVoiceError, CableVoiceResult};
use crate::status::StatusSender;
use std::fmt;
use tracing::{info, warn};

/// The two trigger actions offered to the front end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Speak into the configured cable device
    Cable,
    /// Speak on the system default output only
    DefaultOutput,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cable => write!(f, "cable"),
            Self::DefaultOutput => write!(f, "default output"),
        }
    }
}

/// Configuration, the resolved cable device and the status sink.
///
/// Built once at startup; the cable index only changes through
/// [`Session::re_resolve`].
#[derive(Debug, Clone)]
pub struct Session {
    config: CableVoiceConfig,
    cable_index: Option<usize>,
    status: StatusSender,
}

impl Session {
    /// Resolve the cable device and build the session
    #[must_use]
    pub fn new(config: CableVoiceConfig, backend: &dyn AudioBackend, status: StatusSender) -> Self {
        let cable_index = Self::lookup(&config, backend);
        Self {
            config,
            cable_index,
            status,
        }
    }

    /// Build a session around an already known cable index
    #[must_use]
    pub const fn with_cable_index(
        config: CableVoiceConfig,
        cable_index: Option<usize>,
        status: StatusSender,
    ) -> Self {
        Self {
            config,
            cable_index,
            status,
        }
    }

    fn lookup(config: &CableVoiceConfig, backend: &dyn AudioBackend) -> Option<usize> {
        if let Some(index) = config.device_index {
            info!("Using configured device index {}", index);
            return Some(index);
        }
        let index = audio_device::resolve(backend, &config.device_name);
        if index.is_none() {
            warn!("Cable unavailable, only the default output can be used");
        }
        index
    }

    /// Resolve the cable device again, e.g. after it was plugged in
    pub fn re_resolve(&mut self, backend: &dyn AudioBackend) -> Option<usize> {
        self.cable_index = Self::lookup(&self.config, backend);
        self.cable_index
    }

    /// Loaded configuration
    #[must_use]
    pub const fn config(&self) -> &CableVoiceConfig {
        &self.config
    }

    /// Resolved cable device, if any
    #[must_use]
    pub const fn cable_index(&self) -> Option<usize> {
        self.cable_index
    }

    /// Status sink for the UI
    #[must_use]
    pub const fn status(&self) -> &StatusSender {
        &self.status
    }

    /// Playback targets for a trigger
    ///
    /// # Errors
    ///
    /// Returns `DeviceNotFound` for [`Route::Cable`] when no cable was resolved
    pub fn targets_for(&self, route: Route) -> CableVoiceResult<Vec<PlaybackTarget>> {
        match route {
            Route::DefaultOutput => Ok(vec![PlaybackTarget::default_output()]),
            Route::Cable => {
                let index = self.cable_index.ok_or_else(|| {
                    CableVoiceError::device_not_found(self.config.device_name.clone())
                })?;
                let mut targets = vec![PlaybackTarget::device(index)];
                if self.config.monitor_default_output {
                    targets.push(PlaybackTarget::default_output());
                }
                Ok(targets)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_device::{AudioDevice, PlaybackStream};
    use crate::decoder::DecodedAudio;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingBackend {
        enumerations: AtomicUsize,
    }

    impl AudioBackend for CountingBackend {
        fn devices(&self) -> CableVoiceResult<Vec<AudioDevice>> {
            self.enumerations.fetch_add(1, Ordering::SeqCst);
            Ok(vec![
                AudioDevice {
                    index: 0,
                    name: "Speakers".to_string(),
                    max_output_channels: 2,
                },
                AudioDevice {
                    index: 1,
                    name: "Line 1 (Virtual Audio Cable)".to_string(),
                    max_output_channels: 2,
                },
            ])
        }

        fn start(
            &self,
            _target: PlaybackTarget,
            _audio: Arc<DecodedAudio>,
        ) -> CableVoiceResult<Box<dyn PlaybackStream>> {
            Err(CableVoiceError::playback("unused"))
        }
    }

    fn backend() -> CountingBackend {
        CountingBackend {
            enumerations: AtomicUsize::new(0),
        }
    }

    #[test]
    fn test_session_resolves_once() {
        let backend = backend();
        let (status, _rx) = StatusSender::channel();
        let session = Session::new(CableVoiceConfig::default(), &backend, status);

        assert_eq!(session.cable_index(), Some(1));
        let _ = session.targets_for(Route::Cable);
        let _ = session.targets_for(Route::Cable);
        assert_eq!(backend.enumerations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_explicit_index_skips_enumeration() {
        let backend = backend();
        let (status, _rx) = StatusSender::channel();
        let config = CableVoiceConfig {
            device_index: Some(5),
            ..CableVoiceConfig::default()
        };
        let session = Session::new(config, &backend, status);

        assert_eq!(session.cable_index(), Some(5));
        assert_eq!(backend.enumerations.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_re_resolve() {
        let backend = backend();
        let (status, _rx) = StatusSender::channel();
        let mut session = Session::with_cable_index(CableVoiceConfig::default(), None, status);

        assert_eq!(session.re_resolve(&backend), Some(1));
        assert_eq!(session.cable_index(), Some(1));
    }

    #[test]
    fn test_targets_for_routes() {
        let (status, _rx) = StatusSender::channel();
        let session = Session::with_cable_index(CableVoiceConfig::default(), Some(4), status);

        assert_eq!(
            session.targets_for(Route::Cable).expect("cable resolved"),
            vec![PlaybackTarget::device(4)]
        );
        assert_eq!(
            session.targets_for(Route::DefaultOutput).expect("always available"),
            vec![PlaybackTarget::default_output()]
        );
    }

    #[test]
    fn test_monitor_adds_default_output() {
        let (status, _rx) = StatusSender::channel();
        let config = CableVoiceConfig {
            monitor_default_output: true,
            ..CableVoiceConfig::default()
        };
        let session = Session::with_cable_index(config, Some(2), status);

        assert_eq!(
            session.targets_for(Route::Cable).expect("cable resolved"),
            vec![PlaybackTarget::device(2), PlaybackTarget::default_output()]
        );
    }

    #[test]
    fn test_missing_cable_degrades_to_default_only() {
        let (status, _rx) = StatusSender::channel();
        let session = Session::with_cable_index(CableVoiceConfig::default(), None, status);

        assert!(matches!(
            session.targets_for(Route::Cable),
            Err(CableVoiceError::DeviceNotFound { .. })
        ));
        assert!(session.targets_for(Route::DefaultOutput).is_ok());
    }
}
