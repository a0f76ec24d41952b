//! Message extraction and decoding for server-sent, blank-line delimited streams.
//!
//! Wire format:
//! ```text
//! data: {"key": "value"}
//!
//! data: {"another": "event"}
//!
//! ```
//!
//! Each message is `<label>:<payload>` followed by a blank line. Chunk
//! boundaries from the transport are unrelated to message boundaries, so the
//! helpers here work on whatever text has accumulated so far.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;

/// Two consecutive line endings of any style.
static BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\r\n|\r|\n){2}").expect("boundary pattern is valid"));

/// Try to decode `text` as JSON into `R`.
///
/// Failure is an expected outcome while a message is still incomplete, so it
/// is reported as `None` rather than an error.
///
/// # Example
/// ```
/// use fetchstream::sse::safe_parse;
///
/// let value: Option<serde_json::Value> = safe_parse("{\"a\":1}");
/// assert!(value.is_some());
///
/// let value: Option<serde_json::Value> = safe_parse("{\"a\"");
/// assert!(value.is_none());
/// ```
pub fn safe_parse<R: DeserializeOwned>(text: &str) -> Option<R> {
    serde_json::from_str(text).ok()
}

/// Split accumulated text into candidate messages.
///
/// Splits on a blank line (`\n\n`, `\r\r`, `\r\n\r\n` and mixtures) and drops
/// pieces that are blank after trimming. The returned slices are not trimmed.
///
/// # Example
/// ```
/// use fetchstream::sse::split_messages;
///
/// let parts = split_messages("data: 1\n\ndata: 2\r\n\r\n");
/// assert_eq!(parts, vec!["data: 1", "data: 2"]);
/// ```
pub fn split_messages(text: &str) -> Vec<&str> {
    BOUNDARY
        .split(text)
        .filter(|piece| !piece.trim().is_empty())
        .collect()
}

/// Return the trimmed payload after the first `:` of a message.
///
/// `None` when there is no separator or the label before it is empty.
///
/// # Example
/// ```
/// use fetchstream::sse::message_payload;
///
/// assert_eq!(message_payload("data:  {\"a\":1} "), Some("{\"a\":1}"));
/// assert_eq!(message_payload("{\"a\":1}"), None);
/// assert_eq!(message_payload(":comment"), None);
/// ```
pub fn message_payload(message: &str) -> Option<&str> {
    match message.find(':') {
        Some(index) if index > 0 => Some(message[index + 1..].trim()),
        _ => None,
    }
}

/// Decode one candidate message into `current`.
///
/// Returns `true` and replaces `current` when the payload parses. On any
/// failure `current` is left untouched and `false` is returned; the caller
/// decides whether the text is incomplete or malformed.
pub fn decode_message<R: DeserializeOwned>(message: &str, current: &mut Option<R>) -> bool {
    let Some(payload) = message_payload(message) else {
        return false;
    };
    match safe_parse::<R>(payload) {
        Some(value) => {
            *current = Some(value);
            true
        }
        None => false,
    }
}
