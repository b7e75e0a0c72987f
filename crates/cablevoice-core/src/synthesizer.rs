//! Remote text-to-speech.
//!
//! The speech service takes short text fragments only, so longer requests
//! are split at word and sentence boundaries and the MP3 responses are
//! concatenated. Either every fragment succeeds or the request fails; no
//! retries are made.

use crate::config::SynthesisConfig;
use crate::error::{CableVoiceError, CableVoiceResult};
use std::time::Instant;
use tracing::{debug, info};

/// Text and language for one synthesis call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    text: String,
    language: String,
}

impl SynthesisRequest {
    /// Validate and build a request
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the text is empty or whitespace, or the language is empty
    pub fn new<T: Into<String>, L: Into<String>>(text: T, language: L) -> CableVoiceResult<Self> {
        let text = text.into().trim().to_string();
        let language = language.into().trim().to_string();

        if text.is_empty() {
            return Err(CableVoiceError::invalid_input("Enter some text to speak."));
        }
        if language.is_empty() {
            return Err(CableVoiceError::invalid_input("Language code cannot be empty"));
        }

        Ok(Self { text, language })
    }

    /// Text to speak, trimmed
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Language code, e.g. `ru`
    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }
}

/// Anything that turns text into an encoded audio payload
#[cfg_attr(test, mockall::automock)]
pub trait SpeechSynthesizer: Send + Sync {
    /// Produce the full encoded payload for `request`
    ///
    /// # Errors
    ///
    /// Returns `SynthesisError` on network or service failure
    fn synthesize(&self, request: &SynthesisRequest) -> CableVoiceResult<Vec<u8>>;
}

/// Split `text` into fragments of at most `max_chars` characters.
///
/// Breaks prefer sentence punctuation, then whitespace; a single word longer
/// than the limit is cut hard.
#[must_use]
pub fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut rest: Vec<char> = text.trim().chars().collect();

    while !rest.is_empty() {
        if rest.len() <= max_chars {
            chunks.push(rest.iter().collect::<String>().trim().to_string());
            break;
        }

        let window = &rest[..=max_chars];
        let cut = window[..max_chars]
            .iter()
            .rposition(|c| matches!(c, '.' | '!' | '?' | ';' | ',' | ':' | '\n'))
            .map(|i| i + 1)
            .or_else(|| window.iter().rposition(|c| c.is_whitespace()))
            .filter(|&i| i > 0)
            .unwrap_or(max_chars);

        let head: String = rest[..cut].iter().collect();
        let head = head.trim();
        if !head.is_empty() {
            chunks.push(head.to_string());
        }
        rest = rest[cut..].iter().copied().skip_while(|c| c.is_whitespace()).collect();
    }

    chunks.retain(|c| !c.is_empty());
    chunks
}

/// Google Translate's public speech endpoint
#[derive(Debug, Clone)]
pub struct GoogleTranslateTts {
    client: reqwest::blocking::Client,
    config: SynthesisConfig,
}

impl GoogleTranslateTts {
    /// Build a client from configuration
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be created
    pub fn new(config: SynthesisConfig) -> CableVoiceResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| CableVoiceError::configuration(format!("HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    fn fetch_chunk(&self, chunk: &str, language: &str) -> CableVoiceResult<Vec<u8>> {
        let speed = if self.config.slow { "0.3" } else { "1" };
        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&[
                ("ie", "UTF-8"),
                ("q", chunk),
                ("tl", language),
                ("client", "tw-ob"),
                ("ttsspeed", speed),
            ])
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(CableVoiceError::synthesis_service(format!(
                "Service answered {status} for language '{language}'"
            )));
        }

        let bytes = response.bytes()?;
        if bytes.is_empty() {
            return Err(CableVoiceError::synthesis_service("Service returned no audio"));
        }
        Ok(bytes.to_vec())
    }
}

impl SpeechSynthesizer for GoogleTranslateTts {
    fn synthesize(&self, request: &SynthesisRequest) -> CableVoiceResult<Vec<u8>> {
        if request.text().chars().count() > self.config.max_text_length {
            return Err(CableVoiceError::invalid_input(format!(
                "Text length exceeds maximum of {} characters",
                self.config.max_text_length
            )));
        }

        let started = Instant::now();
        let chunks = split_text(request.text(), self.config.max_chunk_chars);
        debug!("Synthesizing {} chunk(s) in '{}'", chunks.len(), request.language());

        let mut payload = Vec::new();
        for chunk in &chunks {
            payload.extend(self.fetch_chunk(chunk, request.language())?);
        }

        info!(
            "Synthesized {} bytes in {:.2}s",
            payload.len(),
            started.elapsed().as_secs_f32()
        );
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_request_rejects_blank_text() {
        for text in ["", " ", "\n\t  \r\n"] {
            let err = SynthesisRequest::new(text, "ru").unwrap_err();
            assert!(matches!(err, CableVoiceError::InvalidInput { .. }));
        }
    }

    #[test]
    fn test_request_rejects_blank_language() {
        assert!(SynthesisRequest::new("привет", " ").is_err());
    }

    #[test]
    fn test_request_trims() {
        let request = SynthesisRequest::new("  hello  ", " en ").expect("valid request");
        assert_eq!(request.text(), "hello");
        assert_eq!(request.language(), "en");
    }

    #[test]
    fn test_split_short_text_is_single_chunk() {
        assert_eq!(split_text("Hello, world!", 100), vec!["Hello, world!"]);
    }

    #[test]
    fn test_split_prefers_punctuation() {
        let chunks = split_text("First part. Second part here", 16);
        assert_eq!(chunks, vec!["First part.", "Second part here"]);
    }

    #[test]
    fn test_split_at_whitespace() {
        let chunks = split_text("one two three four", 9);
        assert_eq!(chunks, vec!["one two", "three", "four"]);
    }

    #[test]
    fn test_split_hard_cuts_long_words() {
        let chunks = split_text("abcdefghij", 4);
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_split_counts_characters_not_bytes() {
        let chunks = split_text("привет мир", 6);
        assert_eq!(chunks, vec!["привет", "мир"]);
    }

    #[test]
    fn test_mock_synthesizer() {
        let mut mock = MockSpeechSynthesizer::new();
        mock.expect_synthesize()
            .times(1)
            .returning(|_| Err(CableVoiceError::synthesis_network("timed out")));

        let request = SynthesisRequest::new("hi", "en").expect("valid request");
        let err = mock.synthesize(&request).unwrap_err();
        assert_eq!(err.category(), "synthesis");
    }

    proptest! {
        #[test]
        fn prop_split_respects_limit(text in "[a-zA-Zа-я .,!?]{0,400}", limit in 1usize..120) {
            for chunk in split_text(&text, limit) {
                prop_assert!(chunk.chars().count() <= limit);
                prop_assert!(!chunk.is_empty());
            }
        }

        #[test]
        fn prop_split_preserves_words(words in proptest::collection::vec("[a-z]{1,8}", 1..40)) {
            let text = words.join(" ");
            let rejoined = split_text(&text, 20).join(" ");
            let original: Vec<&str> = text.split_whitespace().collect();
            let after: Vec<&str> = rejoined.split_whitespace().collect();
            prop_assert_eq!(original, after);
        }
    }
}
