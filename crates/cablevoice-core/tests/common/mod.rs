//! Test doubles shared by the integration tests

#![allow(dead_code)]

use cablevoice_core::{
    AudioBackend, AudioDevice, CableVoiceConfig, CableVoiceError, CableVoiceResult,
    DecodedAudio, PlaybackStream, PlaybackTarget, SpeechSynthesizer, StatusEvent,
    StatusReceiver, SynthesisRequest,
};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Index the fake backend reports for the cable device
pub const CABLE_INDEX: usize = 1;

/// Encode a sine tone as 16-bit mono WAV
pub fn tone_wav(sample_rate: u32, seconds: f32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let frames = (sample_rate as f32 * seconds).round() as usize;
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("wav writer");
        for i in 0..frames {
            let t = i as f32 / sample_rate as f32;
            let value = (t * 440.0 * std::f32::consts::TAU).sin() * 0.5;
            writer
                .write_sample((value * f32::from(i16::MAX)) as i16)
                .expect("write sample");
        }
        writer.finalize().expect("finalize");
    }
    cursor.into_inner()
}

/// Configuration pointing temp artifacts at `dir`
pub fn test_config(dir: &Path) -> CableVoiceConfig {
    let mut config = CableVoiceConfig::default();
    config.pipeline.temp_dir = Some(dir.to_path_buf());
    config.pipeline.shutdown_timeout_ms = 5_000;
    config
}

/// Audio backend that records what it was asked to play
#[derive(Default)]
pub struct FakeBackend {
    pub failing: HashSet<PlaybackTarget>,
    pub play_time: Duration,
    pub played: Arc<Mutex<Vec<(PlaybackTarget, u32)>>>,
    pub active: Arc<AtomicUsize>,
    pub max_active: Arc<AtomicUsize>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, target: PlaybackTarget) -> Self {
        self.failing.insert(target);
        self
    }

    pub fn playing_for(mut self, play_time: Duration) -> Self {
        self.play_time = play_time;
        self
    }

    /// Sample rates of the clips played, in order
    pub fn played_rates(&self) -> Vec<u32> {
        self.played.lock().unwrap().iter().map(|(_, rate)| *rate).collect()
    }

    pub fn played_targets(&self) -> Vec<PlaybackTarget> {
        self.played.lock().unwrap().iter().map(|(target, _)| *target).collect()
    }
}

struct FakeStream {
    play_time: Duration,
    active: Arc<AtomicUsize>,
}

impl PlaybackStream for FakeStream {
    fn wait(self: Box<Self>) -> CableVoiceResult<()> {
        std::thread::sleep(self.play_time);
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

impl AudioBackend for FakeBackend {
    fn devices(&self) -> CableVoiceResult<Vec<AudioDevice>> {
        Ok(vec![
            AudioDevice {
                index: 0,
                name: "Speakers".to_string(),
                max_output_channels: 2,
            },
            AudioDevice {
                index: CABLE_INDEX,
                name: "Line 1 (Virtual Audio Cable)".to_string(),
                max_output_channels: 2,
            },
        ])
    }

    fn start(
        &self,
        target: PlaybackTarget,
        audio: Arc<DecodedAudio>,
    ) -> CableVoiceResult<Box<dyn PlaybackStream>> {
        if self.failing.contains(&target) {
            return Err(CableVoiceError::playback(format!("{target} is busy")));
        }
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        self.played.lock().unwrap().push((target, audio.sample_rate));
        Ok(Box::new(FakeStream {
            play_time: self.play_time,
            active: Arc::clone(&self.active),
        }))
    }
}

/// Synthesizer whose latency and output depend on the text
#[derive(Default)]
pub struct ScriptedSynthesizer {
    script: HashMap<String, (Duration, CableVoiceResult<Vec<u8>>)>,
    pub calls: AtomicUsize,
}

impl ScriptedSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `text` after `delay` with a short tone at `sample_rate`
    pub fn tone(mut self, text: &str, delay: Duration, sample_rate: u32) -> Self {
        self.script
            .insert(text.to_string(), (delay, Ok(tone_wav(sample_rate, 0.05))));
        self
    }

    /// Answer `text` with arbitrary bytes
    pub fn bytes(mut self, text: &str, bytes: Vec<u8>) -> Self {
        self.script.insert(text.to_string(), (Duration::ZERO, Ok(bytes)));
        self
    }

    /// Fail `text`
    pub fn error(mut self, text: &str, error: CableVoiceError) -> Self {
        self.script.insert(text.to_string(), (Duration::ZERO, Err(error)));
        self
    }
}

impl SpeechSynthesizer for ScriptedSynthesizer {
    fn synthesize(&self, request: &SynthesisRequest) -> CableVoiceResult<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (delay, result) = self
            .script
            .get(request.text())
            .cloned()
            .unwrap_or_else(|| (Duration::ZERO, Ok(tone_wav(24_000, 0.05))));
        std::thread::sleep(delay);
        result
    }
}

/// Collect events until `count` requests reached a terminal state
pub fn wait_for_terminal(rx: &mut StatusReceiver, count: usize) -> Vec<StatusEvent> {
    wait_until(rx, |events| events.iter().filter(|e| e.is_terminal()).count() >= count)
}

/// Collect events until `done` holds, panicking after ten seconds
pub fn wait_until<F>(rx: &mut StatusReceiver, done: F) -> Vec<StatusEvent>
where
    F: Fn(&[StatusEvent]) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut events = Vec::new();
    while !done(&events) {
        assert!(Instant::now() < deadline, "timed out waiting, got {events:?}");
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(_) => std::thread::sleep(Duration::from_millis(5)),
        }
    }
    events
}

/// Whether `dir` has no files left
pub fn dir_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(true)
}
