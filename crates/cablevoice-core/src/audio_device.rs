//! Audio device enumeration, cable resolution and the cpal output backend.

use crate::decoder::DecodedAudio;
use crate::error::{CableVoiceError, CableVoiceResult};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Time left for the device buffer to empty after the last sample is handed over
const PLAYBACK_TAIL: Duration = Duration::from_millis(150);

/// Extra time a stream may run past the clip length before it counts as stalled
const STALL_MARGIN: Duration = Duration::from_secs(5);

/// An audio device as reported by the audio subsystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDevice {
    /// Position in the host's device enumeration
    pub index: usize,
    /// Human-readable device name
    pub name: String,
    /// Largest channel count among the supported output configs (0 = input only)
    pub max_output_channels: u16,
}

impl AudioDevice {
    /// Whether the device can play audio at all
    #[must_use]
    pub const fn is_output(&self) -> bool {
        self.max_output_channels > 0
    }
}

impl fmt::Display for AudioDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.index, self.name)
    }
}

/// Where one playback stream goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaybackTarget {
    /// Device index, `None` for the system default output
    pub device_index: Option<usize>,
}

impl PlaybackTarget {
    /// The system default output device
    #[must_use]
    pub const fn default_output() -> Self {
        Self { device_index: None }
    }

    /// A specific device by enumeration index
    #[must_use]
    pub const fn device(index: usize) -> Self {
        Self {
            device_index: Some(index),
        }
    }
}

impl fmt::Display for PlaybackTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.device_index {
            Some(index) => write!(f, "device {index}"),
            None => write!(f, "default output"),
        }
    }
}

/// A started output stream
pub trait PlaybackStream {
    /// Block until the whole clip has been played
    ///
    /// # Errors
    ///
    /// Returns an error if the device failed while playing
    fn wait(self: Box<Self>) -> CableVoiceResult<()>;
}

/// The process-wide audio subsystem
pub trait AudioBackend: Send + Sync {
    /// Enumerate every device, input-only ones included
    ///
    /// # Errors
    ///
    /// Returns an error if the audio subsystem is unavailable
    fn devices(&self) -> CableVoiceResult<Vec<AudioDevice>>;

    /// Start playing `audio` on `target`
    ///
    /// # Errors
    ///
    /// Returns an error if the device does not exist, is busy or rejects the stream
    fn start(
        &self,
        target: PlaybackTarget,
        audio: Arc<DecodedAudio>,
    ) -> CableVoiceResult<Box<dyn PlaybackStream>>;
}

/// Output-capable devices in enumeration order
///
/// # Errors
///
/// Returns an error if enumeration fails
pub fn list_output_devices(backend: &dyn AudioBackend) -> CableVoiceResult<Vec<AudioDevice>> {
    Ok(backend
        .devices()?
        .into_iter()
        .filter(AudioDevice::is_output)
        .collect())
}

/// Find the first output device whose name contains `name_substring`, ignoring case.
///
/// Enumeration failure and a missing match both yield `None`; only the log
/// tells them apart.
pub fn resolve(backend: &dyn AudioBackend, name_substring: &str) -> Option<usize> {
    let devices = match list_output_devices(backend) {
        Ok(devices) => devices,
        Err(e) => {
            error!("Failed to enumerate audio devices: {}", e);
            return None;
        }
    };

    let needle = name_substring.to_lowercase();
    if let Some(device) = devices
        .iter()
        .find(|d| d.name.to_lowercase().contains(&needle))
    {
        info!("Found output device {}", device);
        return Some(device.index);
    }

    warn!("No output device contains '{}'", name_substring);
    for device in &devices {
        warn!("  available: {}", device);
    }
    None
}

/// Output backend on top of cpal's default host
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalBackend;

impl CpalBackend {
    /// Create a backend for the default host
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn find_device(target: PlaybackTarget) -> CableVoiceResult<cpal::Device> {
        let host = cpal::default_host();
        match target.device_index {
            None => host
                .default_output_device()
                .ok_or_else(|| CableVoiceError::playback("No default output device")),
            Some(index) => host
                .devices()
                .map_err(|e| CableVoiceError::playback(format!("Device enumeration failed: {e}")))?
                .nth(index)
                .ok_or_else(|| CableVoiceError::playback(format!("No device with index {index}"))),
        }
    }

    /// Pick the clip's own rate when the device supports it, else the device default
    fn stream_config(
        device: &cpal::Device,
        sample_rate: u32,
    ) -> CableVoiceResult<(cpal::StreamConfig, cpal::SampleFormat)> {
        let default = device
            .default_output_config()
            .map_err(|e| CableVoiceError::playback(format!("No usable output config: {e}")))?;

        let rate_supported = device
            .supported_output_configs()
            .map(|mut ranges| {
                ranges.any(|r| {
                    r.channels() == default.channels()
                        && r.sample_format() == default.sample_format()
                        && (r.min_sample_rate().0..=r.max_sample_rate().0).contains(&sample_rate)
                })
            })
            .unwrap_or(false);

        let rate = if rate_supported {
            cpal::SampleRate(sample_rate)
        } else {
            debug!(
                "Device does not take {} Hz, resampling to {} Hz",
                sample_rate,
                default.sample_rate().0
            );
            default.sample_rate()
        };

        let config = cpal::StreamConfig {
            channels: default.channels(),
            sample_rate: rate,
            buffer_size: cpal::BufferSize::Default,
        };
        Ok((config, default.sample_format()))
    }
}

impl AudioBackend for CpalBackend {
    fn devices(&self) -> CableVoiceResult<Vec<AudioDevice>> {
        let host = cpal::default_host();
        let devices = host
            .devices()
            .map_err(|e| CableVoiceError::playback(format!("Device enumeration failed: {e}")))?;

        Ok(devices
            .enumerate()
            .map(|(index, device)| {
                let name = device.name().unwrap_or_else(|_| "<unnamed device>".to_string());
                let max_output_channels = device
                    .supported_output_configs()
                    .map(|ranges| ranges.map(|r| r.channels()).max().unwrap_or(0))
                    .unwrap_or(0);
                AudioDevice {
                    index,
                    name,
                    max_output_channels,
                }
            })
            .collect())
    }

    fn start(
        &self,
        target: PlaybackTarget,
        audio: Arc<DecodedAudio>,
    ) -> CableVoiceResult<Box<dyn PlaybackStream>> {
        let device = Self::find_device(target)?;
        let (config, format) = Self::stream_config(&device, audio.sample_rate)?;
        let progress = StreamProgress::new();
        let expected = audio.duration();

        let stream = match format {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, audio, &progress),
            cpal::SampleFormat::F64 => build_stream::<f64>(&device, &config, audio, &progress),
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, audio, &progress),
            cpal::SampleFormat::I32 => build_stream::<i32>(&device, &config, audio, &progress),
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, audio, &progress),
            cpal::SampleFormat::U8 => build_stream::<u8>(&device, &config, audio, &progress),
            other => {
                return Err(CableVoiceError::playback(format!(
                    "Unsupported device sample format {other:?}"
                )))
            }
        }
        .map_err(|e| CableVoiceError::playback(format!("Failed to open stream on {target}: {e}")))?;

        stream
            .play()
            .map_err(|e| CableVoiceError::playback(format!("Failed to start stream on {target}: {e}")))?;

        debug!(
            "Started stream on {} ({} ch, {} Hz)",
            target, config.channels, config.sample_rate.0
        );

        Ok(Box::new(CpalStream {
            _stream: stream,
            progress,
            deadline: Instant::now() + expected + STALL_MARGIN,
        }))
    }
}

/// Completion state shared between a cpal callback and the waiting thread
#[derive(Clone)]
struct StreamProgress {
    finished: Arc<AtomicBool>,
    failure: Arc<Mutex<Option<String>>>,
}

impl StreamProgress {
    fn new() -> Self {
        Self {
            finished: Arc::new(AtomicBool::new(false)),
            failure: Arc::new(Mutex::new(None)),
        }
    }
}

/// Sample at fractional `position`, linearly interpolated between its neighbours.
///
/// Returns `None` once `position` is past the last sample.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn interpolate(samples: &[f32], position: f64) -> Option<f32> {
    let index = position.floor() as usize;
    let current = *samples.get(index)?;
    let next = samples.get(index + 1).copied().unwrap_or(current);
    let fraction = (position - index as f64) as f32;
    Some(current + (next - current) * fraction)
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    audio: Arc<DecodedAudio>,
    progress: &StreamProgress,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = usize::from(config.channels).max(1);
    let step = f64::from(audio.sample_rate) / f64::from(config.sample_rate.0);
    let mut position = 0.0f64;

    let finished = Arc::clone(&progress.finished);
    let failed = Arc::clone(&progress.finished);
    let failure = Arc::clone(&progress.failure);

    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            for frame in data.chunks_mut(channels) {
                let value = interpolate(&audio.samples, position).unwrap_or_else(|| {
                    finished.store(true, Ordering::Release);
                    0.0
                });
                position += step;
                let sample = T::from_sample(value);
                for out in frame.iter_mut() {
                    *out = sample;
                }
            }
        },
        move |err| {
            warn!("Output stream error: {}", err);
            *failure.lock() = Some(err.to_string());
            failed.store(true, Ordering::Release);
        },
        None,
    )
}

struct CpalStream {
    _stream: cpal::Stream,
    progress: StreamProgress,
    deadline: Instant,
}

impl PlaybackStream for CpalStream {
    fn wait(self: Box<Self>) -> CableVoiceResult<()> {
        while !self.progress.finished.load(Ordering::Acquire) {
            if Instant::now() > self.deadline {
                return Err(CableVoiceError::playback("Output stream stalled"));
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        if let Some(message) = self.progress.failure.lock().take() {
            return Err(CableVoiceError::playback(message));
        }
        std::thread::sleep(PLAYBACK_TAIL);
        Ok(())
    }
}
