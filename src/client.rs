//! Core error type and the transport seam.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use thiserror::Error;

/// Errors that can occur while opening or reading a stream.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON encode error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The transport answered with an unsuccessful status. The body is never read.
    #[error("fetch request failed (status {status})")]
    Status { status: u16 },

    /// Reading the next chunk from the source failed.
    #[error("stream read error: {0}")]
    Read(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Raw byte source handed out by a successful transport call.
pub type ByteSource = BoxStream<'static, Result<Bytes, StreamError>>;

/// Response descriptor returned by a [`Transport`].
///
/// Mirrors what a fetch-style call exposes: a success indicator plus a readable
/// body. The body is only consulted when `ok` is true.
pub struct TransportResponse {
    /// Whether the call succeeded (a 2xx status for HTTP).
    pub ok: bool,

    /// Status code reported by the transport, used in error messages.
    pub status: u16,

    /// The body as a stream of byte chunks.
    pub body: ByteSource,
}

impl TransportResponse {
    /// A successful response over the given body.
    pub fn ok(body: ByteSource) -> Self {
        Self {
            ok: true,
            status: 200,
            body,
        }
    }

    /// An unsuccessful response with an empty body.
    pub fn failed(status: u16) -> Self {
        Self {
            ok: false,
            status,
            body: Box::pin(futures::stream::empty()),
        }
    }
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("ok", &self.ok)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// The transport call that opens a stream.
///
/// Implement this trait to plug a custom transport into
/// [`FetchStream`](crate::session::FetchStream). The crate ships an HTTP
/// implementation on [`HttpTransport`](crate::options::HttpTransport) that
/// POSTs the request as JSON.
///
/// # Example
/// ```rust,ignore
/// struct Canned(Vec<&'static str>);
///
/// #[async_trait]
/// impl Transport for Canned {
///     type Request = ();
///
///     async fn send(&self, _request: ()) -> Result<TransportResponse, StreamError> {
///         let chunks: Vec<_> = self
///             .0
///             .iter()
///             .map(|c| Ok(Bytes::from_static(c.as_bytes())))
///             .collect();
///         Ok(TransportResponse::ok(Box::pin(futures::stream::iter(chunks))))
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Arguments accepted by the call (endpoint, payload, ...).
    type Request: Send;

    /// Perform the call and return the response descriptor.
    ///
    /// An `Err` means the call itself could not be made. A call that was made
    /// but rejected should return `Ok` with `ok == false`.
    async fn send(&self, request: Self::Request) -> Result<TransportResponse, StreamError>;
}
