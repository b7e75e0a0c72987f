//! Integration tests for cablevoice-core crate

mod common;

use cablevoice_core::{
    AudioDecoder, CableVoiceConfig, CableVoiceError, PipelineMode, PlaybackEngine,
    PlaybackTarget, Route, Session, StatusSender, TempArtifact,
};
use common::{tone_wav, FakeBackend, CABLE_INDEX};
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn test_config_file_drives_session() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cablevoice.toml");
    std::fs::write(
        &path,
        r#"
device_name = "virtual audio"
language = "en"
monitor_default_output = true
mode = "inline"

[synthesis]
slow = true

[pipeline]
queue_capacity = 2
"#,
    )
    .unwrap();

    let config = CableVoiceConfig::load_or_default(Some(&path)).expect("config loads");
    assert_eq!(config.mode, PipelineMode::Inline);
    assert!(config.synthesis.slow);
    assert_eq!(config.pipeline.queue_capacity, 2);

    let backend = FakeBackend::new();
    let (status, _rx) = StatusSender::channel();
    let session = Session::new(config, &backend, status);

    assert_eq!(session.cable_index(), Some(CABLE_INDEX));
    assert_eq!(
        session.targets_for(Route::Cable).unwrap(),
        vec![
            PlaybackTarget::device(CABLE_INDEX),
            PlaybackTarget::default_output()
        ]
    );
}

#[test]
fn test_missing_config_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent.toml");
    assert!(CableVoiceConfig::load_or_default(Some(&missing)).is_err());
}

#[test]
fn test_artifact_decode_and_play() {
    let dir = TempDir::new().unwrap();
    let mut artifact =
        TempArtifact::create(dir.path(), "mp3", &tone_wav(16_000, 0.5)).expect("artifact");

    let audio = AudioDecoder::new()
        .decode_file(artifact.path())
        .expect("decodes");
    assert_eq!(audio.sample_rate, 16_000);
    assert_eq!(audio.channel_count, 1);
    assert!(audio.frames().abs_diff(8_000) <= 1);
    assert!(audio.samples.iter().all(|s| (-1.0..=1.0).contains(s)));

    let backend = Arc::new(FakeBackend::new());
    let engine = PlaybackEngine::new(backend.clone());
    let report = engine.play(audio, &[PlaybackTarget::device(CABLE_INDEX)]);
    assert!(report.succeeded());
    assert_eq!(backend.played_rates(), vec![16_000]);

    artifact.cleanup().unwrap();
    assert!(!artifact.path().exists());
    assert!(common::dir_is_empty(dir.path()));
}

#[test]
fn test_decoding_missing_artifact_fails() {
    let dir = TempDir::new().unwrap();
    let path = {
        let artifact =
            TempArtifact::create(dir.path(), "mp3", &tone_wav(8_000, 0.1)).expect("artifact");
        artifact.path().to_path_buf()
    };

    let err = AudioDecoder::new().decode_file(&path).unwrap_err();
    assert!(matches!(err, CableVoiceError::FileError { .. }));
}

#[test]
fn test_rescan_finds_cable_added_later() {
    let backend = FakeBackend::new();
    let mut config = CableVoiceConfig::default();
    config.device_name = "line 1".to_string();
    let (status, _rx) = StatusSender::channel();

    let mut session = Session::with_cable_index(config, None, status);
    assert!(matches!(
        session.targets_for(Route::Cable),
        Err(CableVoiceError::DeviceNotFound { .. })
    ));

    assert_eq!(session.re_resolve(&backend), Some(CABLE_INDEX));
    assert_eq!(
        session.targets_for(Route::Cable).unwrap(),
        vec![PlaybackTarget::device(CABLE_INDEX)]
    );
}

const SPEECH_MP3: &[u8] = include_bytes!("fixtures/speech.mp3");

#[test]
fn test_decode_mp3_payload() {
    let audio = AudioDecoder::new()
        .decode(SPEECH_MP3.to_vec())
        .expect("mp3 decodes");

    assert_eq!(audio.sample_rate, 22_050);
    assert_eq!(audio.channel_count, 1);
    assert_eq!(audio.frames(), 25_920);
    assert!(audio.samples.iter().all(|s| (-1.0..=1.0).contains(s)));
}

#[test]
fn test_decode_concatenated_mp3_chunks() {
    let single = AudioDecoder::new()
        .decode(SPEECH_MP3.to_vec())
        .expect("mp3 decodes");

    // Long text arrives as one MP3 answer per chunk, joined back to back.
    let joined = [SPEECH_MP3, SPEECH_MP3].concat();
    let audio = AudioDecoder::new().decode(joined).expect("joined mp3 decodes");

    assert_eq!(audio.sample_rate, single.sample_rate);
    assert_eq!(audio.frames(), single.frames() * 2);
}

#[test]
fn test_mp3_artifact_decodes_from_disk() {
    let dir = TempDir::new().unwrap();
    let artifact = TempArtifact::create(dir.path(), "mp3", SPEECH_MP3).expect("artifact");

    let audio = AudioDecoder::new()
        .decode_file(artifact.path())
        .expect("mp3 artifact decodes");
    assert_eq!(audio.frames(), 25_920);
}
