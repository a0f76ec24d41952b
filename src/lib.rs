//! # fetchstream - Resilient decoding of chunked server-sent streams
//!
//! A small, pragmatic Rust library that turns a streamed HTTP response body
//! into a sequence of fully formed, typed values, even when the transport
//! coalesces several messages into one chunk or splits one message across
//! several chunks.
//!
//! ## Features
//! - Async-first, tokio compatible
//! - Transport-agnostic: any [`Transport`] can open the stream
//! - Carry-over reassembly of messages split across chunks
//! - Incremental UTF-8 decoding of the byte stream
//! - Randomized pacing between emissions for human-facing consumers
//! - Paged list helpers for plain request/response endpoints
//!
//! ## Architecture
//!
//! ```text
//! FetchStream ─▶ Transport ─▶ bytes ─▶ text ─▶ ReassemblyLoop ─▶ Emission<R>
//!                                               │
//!                                               └─ split_messages / decode_message
//! ```
//!
//! - **[`FetchStream`]** owns the holder of the latest decoded value and
//!   resets it on every call.
//! - **[`ReassemblyLoop`](stream::ReassemblyLoop)** is the state machine that
//!   reads chunks, carries over incomplete text, and yields values one at a time.
//! - **[`sse`]** holds the message extractor and decoder.
//!
//! ## Example
//! ```no_run
//! use fetchstream::{FetchStream, HttpRequest};
//! use fetchstream::options::{HttpTransport, TransportOptions};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let fetch = FetchStream::<serde_json::Value, _>::http(TransportOptions::new(
//!         HttpTransport::new("http://localhost:8080"),
//!     ))?;
//!
//!     let request = HttpRequest::new("/chat", &serde_json::json!({"prompt": "Hello!"}))?;
//!     let mut stream = fetch.fetch_stream(request).await?;
//!
//!     while let Some(emission) = stream.next().await {
//!         let emission = emission?;
//!         println!("{} -> {:?}", emission.raw, emission.current);
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod http;
pub mod model;
pub mod options;
pub mod paged;
pub mod pacing;
pub mod pagination;
pub mod session;
pub mod sse;
pub mod stream;
pub mod text;

// Re-exports for convenience
pub use client::{StreamError, Transport, TransportResponse};
pub use http::{HttpClient, HttpRequest, ResponseExt};
pub use model::{Emission, PagedList, ResponseData};
pub use options::StreamOptions;
pub use session::FetchStream;
pub use stream::{EmissionStream, Holder};
