//! Incremental UTF-8 decoding of a byte stream.
//!
//! A multi-byte character can straddle two transport chunks. The decoder keeps
//! the incomplete tail bytes and prepends them to the next chunk. Invalid
//! sequences become U+FFFD.

use futures::stream::{self, BoxStream, StreamExt};

use crate::client::{ByteSource, StreamError};

/// Stateful UTF-8 decoder that tolerates characters split across chunks.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `chunk`, holding back a trailing incomplete character.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(chunk);

        let mut out = String::with_capacity(buf.len());
        let mut rest = &buf[..];
        loop {
            match std::str::from_utf8(rest) {
                Ok(s) => {
                    out.push_str(s);
                    break;
                }
                Err(e) => {
                    let (valid, tail) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &tail[len..];
                        }
                        None => {
                            // Incomplete sequence at the end; wait for more bytes.
                            self.pending = tail.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush whatever is left once the source has ended.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        let tail = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&tail).into_owned()
    }
}

/// Turn a byte source into a text source.
///
/// Empty decodes are skipped. Read errors pass through unchanged.
pub fn decode_text(source: ByteSource) -> BoxStream<'static, Result<String, StreamError>> {
    stream::unfold(
        (source, Utf8Decoder::new(), false),
        |(mut source, mut decoder, mut ended)| async move {
            loop {
                if ended {
                    return None;
                }
                match source.next().await {
                    Some(Ok(bytes)) => {
                        let text = decoder.decode(&bytes);
                        if !text.is_empty() {
                            return Some((Ok(text), (source, decoder, ended)));
                        }
                    }
                    Some(Err(e)) => return Some((Err(e), (source, decoder, ended))),
                    None => {
                        ended = true;
                        let text = decoder.finish();
                        if !text.is_empty() {
                            return Some((Ok(text), (source, decoder, ended)));
                        }
                    }
                }
            }
        },
    )
    .boxed()
}
