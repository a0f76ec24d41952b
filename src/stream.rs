//! Reassembly loop: turns unreliable text chunks into decoded values.
//!
//! The transport buffers independently of message framing, so one chunk may
//! carry several messages and one message may span several chunks. The loop
//! keeps a carry-over buffer of text that did not decode yet and prepends it to
//! the next chunk before splitting again.
//!
//! ```text
//!   Awaiting ──chunk──▶ Processing ──emit*──▶ Awaiting
//!      │
//!      ├──source ended──▶ Closed
//!      └──read error────▶ Failed
//! ```
//!
//! Only the last candidate of a batch can be truncated: every earlier one was
//! followed by a boundary. A failed candidate followed by a decoded one is
//! therefore malformed and dropped; trailing failures are carried over.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::client::StreamError;
use crate::model::Emission;
use crate::options::StreamOptions;
use crate::sse::{decode_message, split_messages};

/// A source of decoded text chunks.
pub type TextSource = BoxStream<'static, Result<String, StreamError>>;

/// Lazy, forward-only sequence of decoded values.
pub type EmissionStream<R> = BoxStream<'static, Result<Emission<R>, StreamError>>;

/// Where the loop currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitingChunk,
    Processing,
    Closed,
    Failed,
}

/// Observable holder of the latest decoded value, shared across sessions.
///
/// Each session gets a generation from [`begin`](Self::begin). Only the
/// newest generation may publish, so a stream left over from an earlier call
/// can keep running without touching the holder.
#[derive(Debug)]
pub struct Holder<R> {
    value: watch::Sender<Option<R>>,
    generation: AtomicU64,
}

impl<R> Holder<R> {
    pub fn new() -> Self {
        let (value, _) = watch::channel(None);
        Self {
            value,
            generation: AtomicU64::new(0),
        }
    }

    /// Start a new session: reset the value and return the session's generation.
    pub fn begin(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.value.send_replace(None);
        generation
    }

    /// Store `value` if `generation` is still the newest session.
    ///
    /// Returns false when a later session has started.
    pub fn publish(&self, generation: u64, value: R) -> bool {
        self.value.send_if_modified(|slot| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            *slot = Some(value);
            true
        })
    }

    pub fn get(&self) -> Option<R>
    where
        R: Clone,
    {
        self.value.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<R>> {
        self.value.subscribe()
    }
}

impl<R> Default for Holder<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// State of one streaming session.
pub struct ReassemblyLoop<R> {
    source: TextSource,
    options: StreamOptions,
    state: LoopState,
    current: Option<R>,
    pending: String,
    candidates: VecDeque<String>,
    pace_next: bool,
    holder: Option<(Arc<Holder<R>>, u64)>,
}

impl<R> ReassemblyLoop<R>
where
    R: DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Create a loop over `source` with an empty current value.
    pub fn new(source: TextSource, options: StreamOptions) -> Self {
        Self {
            source,
            options,
            state: LoopState::AwaitingChunk,
            current: None,
            pending: String::new(),
            candidates: VecDeque::new(),
            pace_next: false,
            holder: None,
        }
    }

    /// Publish every newly decoded value to `holder` as session `generation`.
    pub fn with_holder(mut self, holder: Arc<Holder<R>>, generation: u64) -> Self {
        self.holder = Some((holder, generation));
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Last successfully decoded value.
    pub fn current(&self) -> Option<&R> {
        self.current.as_ref()
    }

    /// Text carried over to be combined with the next chunk.
    pub fn pending_text(&self) -> &str {
        &self.pending
    }

    /// Merge a chunk with the carry-over and queue the candidate messages.
    pub fn absorb(&mut self, chunk: &str) {
        let mut combined = std::mem::take(&mut self.pending);
        combined.push_str(chunk);

        let candidates = split_messages(&combined);
        if candidates.is_empty() {
            self.pending = combined;
            return;
        }
        debug!(
            candidates = candidates.len(),
            chunk_len = chunk.len(),
            "split chunk into candidate messages"
        );
        self.candidates
            .extend(candidates.into_iter().map(str::to_owned));
        self.state = LoopState::Processing;
    }

    /// Decode queued candidates until one succeeds.
    ///
    /// Returns `None` once the queue is drained; whatever failed at the tail is
    /// left in the carry-over buffer.
    pub fn next_decoded(&mut self) -> Option<Emission<R>> {
        while let Some(raw) = self.candidates.pop_front() {
            if decode_message(&raw, &mut self.current) {
                if !self.pending.is_empty() {
                    warn!(
                        dropped = %self.pending,
                        "dropping undecodable message followed by a complete one"
                    );
                    self.pending.clear();
                }
                let current = self.current.clone()?;
                if let Some((holder, generation)) = &self.holder {
                    if !holder.publish(*generation, current.clone()) {
                        debug!(generation, "superseded session, holder left untouched");
                    }
                }
                return Some(Emission { current, raw });
            }
            self.pending.push_str(&raw);
        }
        if self.state == LoopState::Processing {
            self.state = LoopState::AwaitingChunk;
            if !self.pending.is_empty() {
                debug!(pending_len = self.pending.len(), "carrying over incomplete message");
            }
        }
        None
    }

    /// Try a last decode of the carry-over once the source is exhausted.
    fn flush(&mut self) -> Option<Emission<R>> {
        if !self.options.flush_on_close || self.pending.trim().is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.pending);
        self.candidates.push_back(raw);
        let emission = self.next_decoded();
        if emission.is_none() {
            warn!(dropped = %self.pending, "stream closed with an undecodable trailing message");
            self.pending.clear();
        }
        emission
    }

    /// Drive the loop to the next emission.
    pub async fn next_emission(&mut self) -> Option<Result<Emission<R>, StreamError>> {
        loop {
            if matches!(self.state, LoopState::Closed | LoopState::Failed) {
                return None;
            }

            if self.pace_next {
                self.pace_next = false;
                self.options.pacing.pause().await;
            }

            if let Some(emission) = self.next_decoded() {
                self.pace_next = true;
                return Some(Ok(emission));
            }

            match self.source.next().await {
                Some(Ok(chunk)) => self.absorb(&chunk),
                Some(Err(e)) => {
                    warn!(error = %e, "stream read failed");
                    self.state = LoopState::Failed;
                    let message = match e {
                        StreamError::Read(message) => message,
                        other => other.to_string(),
                    };
                    return Some(Err(StreamError::Read(message)));
                }
                None => {
                    self.state = LoopState::Closed;
                    info!("stream closed");
                    return self.flush().map(Ok);
                }
            }
        }
    }

    /// Expose the loop as a lazily driven stream.
    ///
    /// Nothing is read from the source until the stream is polled, and no
    /// chunk is read ahead of what the consumer has asked for.
    pub fn into_stream(self) -> EmissionStream<R> {
        stream::unfold(self, |mut state| async move {
            let item = state.next_emission().await?;
            Some((item, state))
        })
        .boxed()
    }
}

/// Reassemble decoded values out of a text source.
pub fn reassemble<R>(source: TextSource, options: StreamOptions) -> EmissionStream<R>
where
    R: DeserializeOwned + Clone + Send + Sync + 'static,
{
    ReassemblyLoop::new(source, options).into_stream()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pacing::Pacing;
    use serde::Deserialize;
    use std::time::Duration;

    #[derive(Debug, Clone, Deserialize, PartialEq)]
    struct Delta {
        a: i32,
    }

    fn source(chunks: &[&str]) -> TextSource {
        let items: Vec<Result<String, StreamError>> =
            chunks.iter().map(|c| Ok(c.to_string())).collect();
        stream::iter(items).boxed()
    }

    fn unpaced() -> StreamOptions {
        StreamOptions::default().with_pacing(Pacing::None)
    }

    async fn collect(chunks: &[&str], options: StreamOptions) -> Vec<i32> {
        reassemble::<Delta>(source(chunks), options)
            .map(|r| r.unwrap().current.a)
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_single_message() {
        let emissions: Vec<_> = reassemble::<Delta>(source(&["msg:{\"a\":1}\n\n"]), unpaced())
            .collect()
            .await;
        assert_eq!(emissions.len(), 1);
        let emission = emissions.into_iter().next().unwrap().unwrap();
        assert_eq!(emission.current, Delta { a: 1 });
        assert_eq!(emission.raw, "msg:{\"a\":1}");
    }

    #[test]
    fn test_split_payload_is_carried_over() {
        let mut session = ReassemblyLoop::<Delta>::new(source(&[]), unpaced());
        session.absorb("msg:{\"a\"");
        assert!(session.next_decoded().is_none());
        assert_eq!(session.pending_text(), "msg:{\"a\"");
        assert_eq!(session.current(), None);

        session.absorb(":1}\n\n");
        let emission = session.next_decoded().unwrap();
        assert_eq!(emission.current, Delta { a: 1 });
        assert!(session.next_decoded().is_none());
        assert_eq!(session.pending_text(), "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_coalesced_messages_are_paced() {
        let options =
            StreamOptions::default().with_pacing(Pacing::Fixed(Duration::from_millis(50)));
        let mut stream = reassemble::<Delta>(
            source(&["msg:{\"a\":1}\n\nmsg:{\"a\":2}\n\n"]),
            options,
        );

        let first = stream.next().await.unwrap().unwrap();
        let start = tokio::time::Instant::now();
        let second = stream.next().await.unwrap().unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));

        assert_eq!(first.current.a, 1);
        assert_eq!(second.current.a, 2);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_message_without_label_is_never_emitted() {
        let mut session = ReassemblyLoop::<Delta>::new(source(&["{\"a\":1}\n\n"]), unpaced());
        assert!(session.next_emission().await.is_none());
        assert_eq!(session.state(), LoopState::Closed);
        assert_eq!(session.current(), None);
    }

    #[test]
    fn test_unlabeled_message_is_carried_over() {
        let mut session = ReassemblyLoop::<Delta>::new(source(&[]), unpaced());
        session.absorb("{\"a\":1}\n\n");
        assert!(session.next_decoded().is_none());
        assert_eq!(session.pending_text(), "{\"a\":1}");
    }

    #[tokio::test]
    async fn test_any_split_yields_all_messages_in_order() {
        let text = "data: {\"a\":1}\n\nevent:{\"a\":22}\r\n\r\nmsg:  {\"a\":333}\n\n";
        let expected = vec![1, 22, 333];

        for i in 0..=text.len() {
            let (head, tail) = text.split_at(i);
            assert_eq!(collect(&[head, tail], unpaced()).await, expected, "split at {}", i);
        }

        for i in (0..text.len()).step_by(3) {
            for j in (i..=text.len()).step_by(4) {
                let chunks = [&text[..i], &text[i..j], &text[j..]];
                assert_eq!(collect(&chunks, unpaced()).await, expected, "split at {} {}", i, j);
            }
        }

        let single_bytes: Vec<&str> = (0..text.len()).map(|i| &text[i..i + 1]).collect();
        assert_eq!(collect(&single_bytes, unpaced()).await, expected);
    }

    #[test]
    fn test_carry_over_only_when_last_candidate_fails() {
        let mut session = ReassemblyLoop::<Delta>::new(source(&[]), unpaced());

        session.absorb("msg:{\"a\":1}\n\nmsg:{\"a\":");
        while session.next_decoded().is_some() {}
        assert_eq!(session.pending_text(), "msg:{\"a\":");

        session.absorb("2}\n\nmsg:{\"a\":3}\n\n");
        let values: Vec<i32> = std::iter::from_fn(|| session.next_decoded())
            .map(|e| e.current.a)
            .collect();
        assert_eq!(values, vec![2, 3]);
        assert_eq!(session.pending_text(), "");
    }

    #[test]
    fn test_malformed_message_followed_by_valid_is_dropped() {
        let mut session = ReassemblyLoop::<Delta>::new(source(&[]), unpaced());
        session.absorb("event: ping\n\nmsg:{\"a\":4}\n\n");
        let emission = session.next_decoded().unwrap();
        assert_eq!(emission.current.a, 4);
        assert_eq!(session.pending_text(), "");
    }

    #[test]
    fn test_failure_never_overwrites_current() {
        let mut session = ReassemblyLoop::<Delta>::new(source(&[]), unpaced());
        session.absorb("msg:{\"a\":5}\n\nmsg:oops\n\n");
        assert!(session.next_decoded().is_some());
        assert!(session.next_decoded().is_none());
        assert_eq!(session.current(), Some(&Delta { a: 5 }));
    }

    #[test]
    fn test_blank_chunk_becomes_carry_over() {
        let mut session = ReassemblyLoop::<Delta>::new(source(&[]), unpaced());
        session.absorb("\n\n");
        assert!(session.next_decoded().is_none());
        assert_eq!(session.pending_text(), "\n\n");
        assert_eq!(session.state(), LoopState::AwaitingChunk);
    }

    #[tokio::test]
    async fn test_flush_on_close_decodes_unterminated_tail() {
        // A blank line inside the payload leaves two failed pieces that only
        // decode once re-joined, and no further chunk arrives to do that.
        let values = collect(&["msg:{\"a\":1}\n\nmsg:{\"a\":\n\n9}"], unpaced()).await;
        assert_eq!(values, vec![1, 9]);
    }

    #[tokio::test]
    async fn test_flush_drops_malformed_tail() {
        let mut session =
            ReassemblyLoop::<Delta>::new(source(&["msg:{\"a\":1}\n\nmsg:{\"a\""]), unpaced());
        assert_eq!(session.next_emission().await.unwrap().unwrap().current.a, 1);
        assert!(session.next_emission().await.is_none());
        assert_eq!(session.pending_text(), "");
        assert_eq!(session.state(), LoopState::Closed);
    }

    #[tokio::test]
    async fn test_flush_disabled_keeps_tail_silent() {
        let options = unpaced().with_flush_on_close(false);
        let mut session = ReassemblyLoop::<Delta>::new(source(&["msg:{\"a\":"]), options);
        assert!(session.next_emission().await.is_none());
        assert_eq!(session.pending_text(), "msg:{\"a\":");
    }

    #[tokio::test]
    async fn test_read_error_surfaces_once() {
        let items = vec![
            Ok("msg:{\"a\":1}\n\n".to_string()),
            Err(StreamError::Read("connection reset".to_string())),
            Ok("msg:{\"a\":2}\n\n".to_string()),
        ];
        let results: Vec<_> = reassemble::<Delta>(stream::iter(items).boxed(), unpaced())
            .collect()
            .await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().current.a, 1);
        match &results[1] {
            Err(StreamError::Read(msg)) => assert_eq!(msg, "connection reset"),
            other => panic!("expected read error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_holder_receives_each_value() {
        let holder = Arc::new(Holder::new());
        let generation = holder.begin();
        let rx = holder.subscribe();
        let mut stream = ReassemblyLoop::<Delta>::new(
            source(&["msg:{\"a\":1}\n\nmsg:{\"a\":2}\n\n"]),
            unpaced(),
        )
        .with_holder(Arc::clone(&holder), generation)
        .into_stream();

        stream.next().await;
        assert_eq!(*rx.borrow(), Some(Delta { a: 1 }));
        stream.next().await;
        assert_eq!(*rx.borrow(), Some(Delta { a: 2 }));
    }

    #[test]
    fn test_superseded_generation_cannot_publish() {
        let holder = Holder::new();
        let first = holder.begin();
        assert!(holder.publish(first, Delta { a: 1 }));
        assert_eq!(holder.get(), Some(Delta { a: 1 }));

        let second = holder.begin();
        assert_eq!(holder.get(), None);
        assert!(!holder.publish(first, Delta { a: 2 }));
        assert_eq!(holder.get(), None);

        assert!(holder.publish(second, Delta { a: 3 }));
        assert_eq!(holder.get(), Some(Delta { a: 3 }));
    }
}
