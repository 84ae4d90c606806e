//! Decoder for the chat backend's chunked response stream.
//!
//! The backend streams plain reply text and, at the very end, appends the
//! [`METADATA_SENTINEL`] followed by a JSON object describing the exchange:
//!
//! ```text
//! Hello wor|ld---METADATA---{"tokens":42}
//! ```
//!
//! The sentinel is looked for in each text chunk independently. Only its first
//! occurrence in a chunk splits it; text before is reply text and text after is
//! metadata.

use serde::Deserialize;

use crate::error::DecodeError;

/// Marker separating reply text from trailing metadata.
pub const METADATA_SENTINEL: &str = "---METADATA---";

/// Trailing metadata of a response stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct StreamMetadata {
    /// Tokens consumed by the exchange.
    pub tokens: u64,
}

/// The result of a fully decoded stream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodedResponse {
    /// Accumulated reply text.
    pub text: String,
    /// Token count from the metadata, if any arrived.
    pub token_count: Option<u64>,
}

/// Incremental decoder for one response stream.
///
/// A decoder is never reused: every send starts from an empty one.
#[derive(Debug, Clone, Default)]
pub struct StreamDecoder {
    text: String,
    token_count: Option<u64>,
}

impl StreamDecoder {
    /// Create an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next text chunk, returning the part of it that is reply text.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::MalformedMetadata`] if the text after the sentinel
    /// is not a JSON object with a numeric `tokens` field. Reply text preceding
    /// the sentinel has already been appended when this happens, and the token
    /// count is left unchanged.
    pub fn push<'a>(&mut self, chunk: &'a str) -> Result<&'a str, DecodeError> {
        let Some((text, metadata)) = chunk.split_once(METADATA_SENTINEL) else {
            self.text.push_str(chunk);
            return Ok(chunk);
        };

        self.text.push_str(text);

        let metadata = metadata.trim();
        if !metadata.is_empty() {
            let parsed: StreamMetadata = serde_json::from_str(metadata)
                .map_err(|e| DecodeError::MalformedMetadata(e.to_string()))?;
            self.token_count = Some(parsed.tokens);
        }

        Ok(text)
    }

    /// Reply text accumulated so far.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The token count, once metadata has arrived.
    #[must_use]
    pub const fn token_count(&self) -> Option<u64> {
        self.token_count
    }

    /// Consume the decoder.
    #[must_use]
    pub fn finish(self) -> DecodedResponse {
        DecodedResponse {
            text: self.text,
            token_count: self.token_count,
        }
    }
}

/// Turns network byte chunks into text chunks.
///
/// A multi-byte UTF-8 character split across two reads is held back until its
/// remaining bytes arrive. Invalid sequences become U+FFFD.
#[derive(Debug, Clone, Default)]
pub struct Utf8Chunker {
    pending: Vec<u8>,
}

impl Utf8Chunker {
    /// Create an empty chunker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes, returning all text that is complete so far.
    pub fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);

        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        Some(invalid) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + invalid);
                        }
                        // Incomplete trailing sequence; wait for more bytes
                        None => {
                            self.pending.drain(..valid);
                            return out;
                        }
                    }
                }
            }
        }
    }

    /// Flush whatever is held back at the end of the stream.
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(chunks: &[&str]) -> Result<DecodedResponse, DecodeError> {
        let mut decoder = StreamDecoder::new();
        for chunk in chunks {
            decoder.push(chunk)?;
        }
        Ok(decoder.finish())
    }

    #[test]
    fn plain_chunks_concatenate() {
        let decoded = decode(&["Hel", "lo ", "", "world"]).unwrap();
        assert_eq!(decoded.text, "Hello world");
        assert_eq!(decoded.token_count, None);
    }

    #[test]
    fn metadata_in_final_chunk() {
        let decoded = decode(&["Hello ", "world---METADATA---{\"tokens\":42}"]).unwrap();
        assert_eq!(decoded.text, "Hello world");
        assert_eq!(decoded.token_count, Some(42));
    }

    #[test]
    fn metadata_in_its_own_chunk() {
        let decoded = decode(&["Hi", "---METADATA---{\"tokens\":7,\"model\":\"x\"}"]).unwrap();
        assert_eq!(decoded.text, "Hi");
        assert_eq!(decoded.token_count, Some(7));
    }

    #[test]
    fn push_returns_visible_delta() {
        let mut decoder = StreamDecoder::new();
        assert_eq!(decoder.push("abc").unwrap(), "abc");
        assert_eq!(decoder.push("def---METADATA---{\"tokens\":1}").unwrap(), "def");
        assert_eq!(decoder.text(), "abcdef");
        assert_eq!(decoder.token_count(), Some(1));
    }

    #[test]
    fn only_first_sentinel_splits() {
        let mut decoder = StreamDecoder::new();
        let err = decoder
            .push("a---METADATA---{\"tokens\":1}---METADATA---{\"tokens\":2}")
            .unwrap_err();
        assert!(matches!(err, DecodeError::MalformedMetadata(_)));
        assert_eq!(decoder.text(), "a");
    }

    #[test]
    fn empty_metadata_is_ignored() {
        let decoded = decode(&["done---METADATA---  \n"]).unwrap();
        assert_eq!(decoded.text, "done");
        assert_eq!(decoded.token_count, None);
    }

    #[test]
    fn malformed_metadata_keeps_text() {
        let mut decoder = StreamDecoder::new();
        decoder.push("partial ").unwrap();
        let err = decoder.push("reply---METADATA---{tokens:").unwrap_err();

        assert!(matches!(err, DecodeError::MalformedMetadata(_)));
        assert_eq!(decoder.text(), "partial reply");
        assert_eq!(decoder.token_count(), None);
    }

    #[test]
    fn missing_tokens_field_is_malformed() {
        let mut decoder = StreamDecoder::new();
        decoder.push("x---METADATA---{\"tokens\":3}").unwrap();
        let err = decoder.push("---METADATA---{\"usage\":3}").unwrap_err();

        assert!(matches!(err, DecodeError::MalformedMetadata(_)));
        assert_eq!(decoder.token_count(), Some(3));
    }

    #[test]
    fn chunker_carries_split_characters() {
        let bytes = "héllo, 世界".as_bytes();
        let mut chunker = Utf8Chunker::new();
        let mut text = String::new();
        for byte in bytes {
            text.push_str(&chunker.push(std::slice::from_ref(byte)));
        }
        text.push_str(&chunker.finish());
        assert_eq!(text, "héllo, 世界");
    }

    #[test]
    fn chunker_replaces_invalid_bytes() {
        let mut chunker = Utf8Chunker::new();
        assert_eq!(chunker.push(b"a\xFFb"), "a\u{FFFD}b");
        assert_eq!(chunker.push(&[0xE4, 0xB8]), "");
        assert_eq!(chunker.finish(), "\u{FFFD}");
    }
}
