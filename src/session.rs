//! Session orchestration: open a transport call and stream decoded values.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::client::{StreamError, Transport};
use crate::http::HttpClient;
use crate::options::{HttpTransport, StreamOptions, TransportOptions};
use crate::stream::{EmissionStream, Holder, ReassemblyLoop};
use crate::text::decode_text;

/// Streaming caller paired with a holder of the latest decoded value.
///
/// Every call to [`fetch_stream`](Self::fetch_stream) starts a new session:
/// the holder is reset to `None` first, so a message carrying only a delta is
/// never merged onto a value left over from a previous call. A stream from an
/// earlier call may still be drained, but it no longer updates the holder.
///
/// # Example
/// ```rust,ignore
/// let fetch = FetchStream::<Reply, _>::http(TransportOptions::new(HttpTransport::new(base)))?;
/// let mut stream = fetch.fetch_stream(HttpRequest::new("/chat", &body)?).await?;
/// while let Some(emission) = stream.next().await {
///     println!("{:?}", emission?.current);
/// }
/// ```
pub struct FetchStream<R, T> {
    transport: T,
    options: StreamOptions,
    current: Arc<Holder<R>>,
}

impl<R, T> FetchStream<R, T>
where
    R: DeserializeOwned + Clone + Send + Sync + 'static,
    T: Transport,
{
    /// Wrap a transport with default stream options.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            options: StreamOptions::default(),
            current: Arc::new(Holder::new()),
        }
    }

    /// Set the stream options used by subsequent calls.
    pub fn with_options(mut self, options: StreamOptions) -> Self {
        self.options = options;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Latest decoded value of the most recent session.
    pub fn current(&self) -> Option<R> {
        self.current.get()
    }

    /// Watch the holder for changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<R>> {
        self.current.subscribe()
    }

    /// Open the stream and return the lazily driven sequence of emissions.
    ///
    /// Fails fast when the transport reports an unsuccessful response; the
    /// body is not read and no retry is attempted.
    pub async fn fetch_stream(
        &self,
        request: T::Request,
    ) -> Result<EmissionStream<R>, StreamError> {
        self.options.validate()?;
        let generation = self.current.begin();

        let response = self.transport.send(request).await?;
        if !response.ok {
            warn!(status = response.status, "stream request rejected");
            return Err(StreamError::Status {
                status: response.status,
            });
        }
        info!(status = response.status, generation, "stream opened");

        let text = decode_text(response.body);
        Ok(ReassemblyLoop::new(text, self.options.clone())
            .with_holder(Arc::clone(&self.current), generation)
            .into_stream())
    }
}

impl<R> FetchStream<R, HttpClient>
where
    R: DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Stream over HTTP with the default JSON `POST` transport.
    pub fn http(options: TransportOptions<HttpTransport>) -> Result<Self, StreamError> {
        Ok(Self::new(HttpClient::new(options)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::TransportResponse;
    use crate::pacing::Pacing;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::stream::{self, StreamExt};
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, Clone, Deserialize, PartialEq)]
    struct Delta {
        a: i32,
    }

    /// Replays canned chunk lists, one per call.
    struct Canned {
        calls: AtomicUsize,
        replies: Vec<Option<Vec<Bytes>>>,
    }

    fn reply(parts: &[&str]) -> Option<Vec<Bytes>> {
        Some(parts.iter().map(|p| Bytes::copy_from_slice(p.as_bytes())).collect())
    }

    impl Canned {
        fn new(replies: Vec<Option<Vec<Bytes>>>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                replies,
            }
        }
    }

    #[async_trait]
    impl Transport for Canned {
        type Request = &'static str;

        async fn send(&self, _endpoint: &'static str) -> Result<TransportResponse, StreamError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            match self.replies.get(call).cloned().flatten() {
                Some(chunks) => {
                    let items: Vec<Result<Bytes, StreamError>> =
                        chunks.into_iter().map(Ok).collect();
                    Ok(TransportResponse::ok(stream::iter(items).boxed()))
                }
                None => Ok(TransportResponse::failed(500)),
            }
        }
    }

    fn unpaced<T: Transport>(transport: T) -> FetchStream<Delta, T> {
        FetchStream::new(transport).with_options(StreamOptions::default().with_pacing(Pacing::None))
    }

    #[tokio::test]
    async fn test_emissions_update_holder() {
        let fetch = unpaced(Canned::new(vec![reply(&[
            "msg:{\"a\":1}\n\nmsg:{\"a\"",
            ":2}\n\n",
        ])]));

        let stream = fetch.fetch_stream("/chat").await.unwrap();
        assert_eq!(fetch.current(), None);

        let values: Vec<i32> = stream.map(|e| e.unwrap().current.a).collect().await;
        assert_eq!(values, vec![1, 2]);
        assert_eq!(fetch.current(), Some(Delta { a: 2 }));
    }

    #[tokio::test]
    async fn test_rejected_response_fails_fast() {
        let fetch = unpaced(Canned::new(vec![None]));
        let result = fetch.fetch_stream("/chat").await;
        assert!(matches!(result, Err(StreamError::Status { status: 500 })));
        assert_eq!(fetch.current(), None);
    }

    #[tokio::test]
    async fn test_new_call_resets_holder() {
        let fetch = unpaced(Canned::new(vec![
            reply(&["msg:{\"a\":1}\n\n"]),
            reply(&["msg:{\"a\""]),
        ]));

        let first: Vec<_> = fetch.fetch_stream("/chat").await.unwrap().collect().await;
        assert_eq!(first.len(), 1);
        assert_eq!(fetch.current(), Some(Delta { a: 1 }));

        let second = fetch.fetch_stream("/chat").await.unwrap();
        assert_eq!(fetch.current(), None);
        let second: Vec<_> = second.collect().await;
        assert!(second.is_empty());
        assert_eq!(fetch.current(), None);
    }

    #[tokio::test]
    async fn test_earlier_stream_cannot_write_into_new_session() {
        let fetch = unpaced(Canned::new(vec![
            reply(&["msg:{\"a\":1}\n\nmsg:{\"a\":2}\n\n"]),
            reply(&["msg:{\"a\":7}\n\n"]),
        ]));

        let mut first = fetch.fetch_stream("/chat").await.unwrap();
        assert_eq!(first.next().await.unwrap().unwrap().current.a, 1);
        assert_eq!(fetch.current(), Some(Delta { a: 1 }));

        let mut second = fetch.fetch_stream("/chat").await.unwrap();
        assert_eq!(fetch.current(), None);

        // The earlier stream still yields its own values.
        assert_eq!(first.next().await.unwrap().unwrap().current.a, 2);
        assert_eq!(fetch.current(), None);

        assert_eq!(second.next().await.unwrap().unwrap().current.a, 7);
        assert_eq!(fetch.current(), Some(Delta { a: 7 }));
        assert!(first.next().await.is_none());
        assert_eq!(fetch.current(), Some(Delta { a: 7 }));
    }

    #[tokio::test]
    async fn test_multibyte_split_across_chunks() {
        let text = "msg:{\"t\":\"€\"}\n\n".as_bytes();
        // Cut inside the three bytes of the euro sign.
        let cut = text.len() - 5;
        let chunks = vec![
            Bytes::copy_from_slice(&text[..cut]),
            Bytes::copy_from_slice(&text[cut..]),
        ];
        let fetch: FetchStream<serde_json::Value, _> =
            FetchStream::new(Canned::new(vec![Some(chunks)]))
                .with_options(StreamOptions::default().with_pacing(Pacing::None));

        let mut stream = fetch.fetch_stream("/chat").await.unwrap();
        let emission = stream.next().await.unwrap().unwrap();
        assert_eq!(emission.current["t"], "€");
    }

    #[tokio::test]
    async fn test_invalid_options_rejected_before_call() {
        let transport = Canned::new(vec![reply(&["msg:{\"a\":1}\n\n"])]);
        let fetch: FetchStream<Delta, _> = FetchStream::new(transport).with_options(
            StreamOptions::default().with_pacing(Pacing::Random {
                min: Duration::from_millis(9),
                max: Duration::from_millis(1),
            }),
        );
        assert!(matches!(
            fetch.fetch_stream("/chat").await,
            Err(StreamError::Config(_))
        ));
        assert_eq!(fetch.transport().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_subscribers_see_updates() {
        let fetch = unpaced(Canned::new(vec![reply(&["msg:{\"a\":3}\n\n"])]));
        let mut rx = fetch.subscribe();

        let mut stream = fetch.fetch_stream("/chat").await.unwrap();
        stream.next().await;
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Some(Delta { a: 3 }));
    }
}
