//! Decoding of synthesized speech payloads into normalized mono PCM.
//!
//! Payloads are probed by content, so MP3 from the speech service and WAV
//! written by tools both go through the same path. Integer sample widths are
//! scaled to `[-1.0, 1.0]`:
//!
//! | width | rule |
//! |---|---|
//! | 8-bit unsigned | `(raw - 128) / 128` |
//! | 16-bit signed | `raw / 32767` |
//! | 32-bit signed | `raw / 2147483647` |
//!
//! Only the first channel of multi-channel audio is kept. No resampling is
//! done; the output rate is the stream's own rate.

use crate::error::{CableVoiceError, CableVoiceResult};
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Decoded, normalized PCM ready for playback
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    /// Samples in `[-1.0, 1.0]`
    pub samples: Vec<f32>,
    /// Interleaved channel count of `samples`
    pub channel_count: u16,
    /// Frames per second
    pub sample_rate: u32,
}

impl DecodedAudio {
    /// Mono audio at `sample_rate`
    #[must_use]
    pub const fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            channel_count: 1,
            sample_rate,
        }
    }

    /// Number of frames
    #[must_use]
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channel_count.max(1))
    }

    /// Playing time of the clip
    #[must_use]
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        #[allow(clippy::cast_precision_loss)]
        Duration::from_secs_f64(self.frames() as f64 / f64::from(self.sample_rate))
    }

    /// Whether there is nothing to play
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty() || self.sample_rate == 0
    }
}

/// Scale an 8-bit unsigned sample
#[must_use]
pub fn normalize_u8(raw: u8) -> f32 {
    (f32::from(raw) - 128.0) / 128.0
}

/// Scale a 16-bit signed sample
#[must_use]
pub fn normalize_i16(raw: i16) -> f32 {
    (f32::from(raw) / 32767.0).clamp(-1.0, 1.0)
}

/// Scale a 32-bit signed sample
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn normalize_i32(raw: i32) -> f32 {
    (f64::from(raw) / 2_147_483_647.0).clamp(-1.0, 1.0) as f32
}

/// Copy the first channel of a decoded buffer into `out`, normalized
fn append_first_channel(buffer: &AudioBufferRef<'_>, out: &mut Vec<f32>) {
    match buffer {
        AudioBufferRef::U8(buf) => out.extend(buf.chan(0).iter().map(|&s| normalize_u8(s))),
        AudioBufferRef::S16(buf) => out.extend(buf.chan(0).iter().map(|&s| normalize_i16(s))),
        AudioBufferRef::S32(buf) => out.extend(buf.chan(0).iter().map(|&s| normalize_i32(s))),
        AudioBufferRef::S8(buf) => out.extend(
            buf.chan(0)
                .iter()
                .map(|&s| (f32::from(s) / 127.0).clamp(-1.0, 1.0)),
        ),
        AudioBufferRef::U16(buf) => out.extend(
            buf.chan(0)
                .iter()
                .map(|&s| (f32::from(s) - 32768.0) / 32768.0),
        ),
        #[allow(clippy::cast_precision_loss)]
        AudioBufferRef::S24(buf) => out.extend(
            buf.chan(0)
                .iter()
                .map(|s| (s.inner() as f32 / 8_388_607.0).clamp(-1.0, 1.0)),
        ),
        #[allow(clippy::cast_precision_loss)]
        AudioBufferRef::U24(buf) => out.extend(
            buf.chan(0)
                .iter()
                .map(|s| (s.inner() as f32 - 8_388_608.0) / 8_388_608.0),
        ),
        #[allow(clippy::cast_possible_truncation)]
        AudioBufferRef::U32(buf) => out.extend(
            buf.chan(0)
                .iter()
                .map(|&s| ((f64::from(s) - 2_147_483_648.0) / 2_147_483_648.0) as f32),
        ),
        AudioBufferRef::F32(buf) => out.extend(buf.chan(0).iter().map(|&s| s.clamp(-1.0, 1.0))),
        #[allow(clippy::cast_possible_truncation)]
        AudioBufferRef::F64(buf) => {
            out.extend(buf.chan(0).iter().map(|&s| s.clamp(-1.0, 1.0) as f32));
        }
    }
}

/// Turns encoded speech into [`DecodedAudio`]
#[derive(Debug, Default, Clone, Copy)]
pub struct AudioDecoder;

impl AudioDecoder {
    /// Create a decoder using the built-in codec registry
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode a temporary artifact from disk
    ///
    /// # Errors
    ///
    /// Returns a file error if the artifact cannot be read, otherwise as [`Self::decode`]
    pub fn decode_file<P: AsRef<Path>>(&self, path: P) -> CableVoiceResult<DecodedAudio> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            CableVoiceError::file(format!("Failed to read {}: {e}", path.display()))
        })?;

        self.decode(bytes)
    }

    /// Decode an in-memory payload
    ///
    /// # Errors
    ///
    /// Returns `DecodeError` with kind `UnsupportedCodec` if no reader or codec
    /// handles the payload, or `Malformed` if it is truncated or has no frames
    pub fn decode(&self, bytes: Vec<u8>) -> CableVoiceResult<DecodedAudio> {
        if bytes.is_empty() {
            return Err(CableVoiceError::malformed_audio("Payload is empty"));
        }

        let source = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
        let probed = symphonia::default::get_probe()
            .format(
                &Hint::new(),
                source,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| match e {
                SymphoniaError::Unsupported(what) => {
                    CableVoiceError::unsupported_codec(format!("No reader for payload: {what}"))
                }
                other => CableVoiceError::malformed_audio(other.to_string()),
            })?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| CableVoiceError::malformed_audio("No audio track in payload"))?;
        let track_id = track.id;
        let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| CableVoiceError::unsupported_codec(e.to_string()))?;

        let mut samples = Vec::new();
        let mut source_channels = 0;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(CableVoiceError::malformed_audio(e.to_string())),
            };
            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(buffer) => {
                    let spec = buffer.spec();
                    sample_rate = spec.rate;
                    source_channels = spec.channels.count();
                    append_first_channel(&buffer, &mut samples);
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("Skipping corrupt audio packet: {}", e);
                }
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break
                }
                Err(e) => return Err(CableVoiceError::malformed_audio(e.to_string())),
            }
        }

        if samples.is_empty() || sample_rate == 0 {
            return Err(CableVoiceError::malformed_audio("Payload contains no audio frames"));
        }

        debug!(
            "Decoded {} frames at {} Hz ({} source channels)",
            samples.len(),
            sample_rate,
            source_channels
        );
        Ok(DecodedAudio::mono(samples, sample_rate))
    }
}
