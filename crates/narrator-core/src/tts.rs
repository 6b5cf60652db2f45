//! Google Translate text-to-speech client.
//!
//! The endpoint accepts at most 100 characters per request, so text is split
//! into chunks on sentence and word boundaries and the returned MP3 frames are
//! concatenated in order.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::service::{ServiceError, SpeechService};
use crate::Config;

/// Maximum characters the endpoint accepts per request.
pub const MAX_CHUNK_CHARS: usize = 100;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko)";

/// [`SpeechService`] backed by the Google Translate TTS endpoint.
pub struct GoogleTranslateTts {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl GoogleTranslateTts {
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            base_url: config.tts_base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    fn chunk_url(&self, chunk: &str, lang_code: &str, idx: usize, total: usize) -> String {
        format!(
            "{}/translate_tts?ie=UTF-8&q={}&tl={}&total={}&idx={}&textlen={}&client=tw-ob",
            self.base_url,
            urlencoding::encode(chunk),
            urlencoding::encode(lang_code),
            total,
            idx,
            chunk.chars().count()
        )
    }
}

impl SpeechService for GoogleTranslateTts {
    fn name(&self) -> &str {
        "Google Translate TTS"
    }

    fn synthesize<'a>(
        &'a self,
        text: &'a str,
        lang_code: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, ServiceError>> + Send + 'a>> {
        Box::pin(async move {
            let chunks = split_into_chunks(text, MAX_CHUNK_CHARS);
            let total = chunks.len();
            let mut audio = Vec::new();

            for (idx, chunk) in chunks.iter().enumerate() {
                let resp = self
                    .client
                    .get(self.chunk_url(chunk, lang_code, idx, total))
                    .header("User-Agent", USER_AGENT)
                    .header("Referer", "http://translate.google.com/")
                    .timeout(self.timeout)
                    .send()
                    .await?;

                let status = resp.status();
                if !status.is_success() {
                    let body = resp.text().await.unwrap_or_default();
                    return Err(ServiceError::from_status(status.as_u16(), body));
                }

                let bytes = resp.bytes().await?;
                if bytes.is_empty() {
                    return Err(ServiceError::EmptyResponse(format!(
                        "no audio returned for chunk {}/{}",
                        idx + 1,
                        total
                    )));
                }
                audio.extend_from_slice(&bytes);
            }

            tracing::debug!(chunks = total, bytes = audio.len(), "speech synthesized");
            Ok(audio)
        })
    }
}

/// Split `text` into pieces of at most `max_chars` characters.
///
/// Sentences are kept whole when they fit; longer sentences break between
/// words, and a single word longer than `max_chars` is cut.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    static SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?;:。\n]+").unwrap());

    let max_chars = max_chars.max(1);
    let mut pieces = Vec::new();
    let mut last = 0;
    for m in SENTENCE_END.find_iter(text) {
        pieces.push(&text[last..m.end()]);
        last = m.end();
    }
    pieces.push(&text[last..]);

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    let push_word = |word: &str, current: &mut String, chunks: &mut Vec<String>| {
        let len = |s: &str| s.chars().count();
        if current.is_empty() {
            current.push_str(word);
        } else if len(current) + 1 + len(word) <= max_chars {
            current.push(' ');
            current.push_str(word);
        } else {
            chunks.push(std::mem::take(current));
            current.push_str(word);
        }
        while len(current) > max_chars {
            let head: String = current.chars().take(max_chars).collect();
            let tail: String = current.chars().skip(max_chars).collect();
            chunks.push(head);
            *current = tail;
        }
    };

    for piece in pieces {
        let sentence = piece.split_whitespace().collect::<Vec<_>>().join(" ");
        if sentence.is_empty() {
            continue;
        }
        let sentence_len = sentence.chars().count();
        if !current.is_empty() && current.chars().count() + 1 + sentence_len > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        for word in sentence.split(' ') {
            push_word(word, &mut current, &mut chunks);
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
