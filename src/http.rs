//! HTTP transport for opening streams.
//!
//! This module provides reqwest client construction, request building,
//! and the default [`Transport`] implementation: POST a JSON body and
//! hand back the response body as a byte stream.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::client::{ByteSource, StreamError, Transport, TransportResponse};
use crate::options::{HttpTransport, TransportOptions};
use crate::stream::TextSource;
use crate::text::decode_text;

/// Build a configured HTTP client from transport options.
///
/// This applies common configuration like timeouts and proxies.
///
/// # Example
/// ```ignore
/// let client = build_http_client(&transport_options)?;
/// ```
pub fn build_http_client(
    transport_options: &TransportOptions<HttpTransport>,
) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder();

    if let Some(timeout) = transport_options.timeout {
        builder = builder.timeout(timeout);
    }

    if let Some(proxy_url) = &transport_options.provider.proxy {
        if let Ok(proxy) = reqwest::Proxy::all(proxy_url) {
            builder = builder.proxy(proxy);
        }
    }

    builder.build()
}

/// Add extra headers to a request if specified.
///
/// # Example
/// ```ignore
/// let mut req = client.post(url);
/// req = add_extra_headers(req, &transport_options.provider.extra_headers);
/// ```
pub fn add_extra_headers(
    mut request: RequestBuilder,
    extra_headers: &Option<HashMap<String, String>>,
) -> RequestBuilder {
    if let Some(headers) = extra_headers {
        for (key, value) in headers {
            request = request.header(key, value);
        }
    }
    request
}

/// Resolve `endpoint` against an optional base URL.
///
/// Absolute endpoints are used as given.
pub fn resolve_url(base_url: Option<&str>, endpoint: &str) -> Result<String, StreamError> {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        return Ok(endpoint.to_string());
    }
    let base = base_url.ok_or_else(|| {
        StreamError::Config(format!("relative endpoint {:?} needs a base URL", endpoint))
    })?;
    Ok(format!(
        "{}/{}",
        base.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    ))
}

/// Arguments of one HTTP streaming call.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Absolute URL, or a path resolved against the base URL.
    pub endpoint: String,

    /// JSON request body.
    pub body: Value,

    /// Headers for this call only, applied after the transport's extra headers.
    pub headers: Option<HashMap<String, String>>,
}

impl HttpRequest {
    /// Build a request whose body is `payload` encoded as JSON.
    pub fn new<P: Serialize>(
        endpoint: impl Into<String>,
        payload: &P,
    ) -> Result<Self, StreamError> {
        Ok(Self {
            endpoint: endpoint.into(),
            body: serde_json::to_value(payload)?,
            headers: None,
        })
    }

    /// Add a header for this call only.
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.headers
            .get_or_insert_with(HashMap::new)
            .insert(key, value);
        self
    }
}

/// Default transport: `POST` with a JSON body over reqwest.
#[derive(Debug, Clone)]
pub struct HttpClient {
    options: TransportOptions<HttpTransport>,
    client: Client,
}

impl HttpClient {
    /// Create a transport from options.
    pub fn new(options: TransportOptions<HttpTransport>) -> Result<Self, StreamError> {
        let client = build_http_client(&options)?;
        Ok(Self { options, client })
    }

    pub fn options(&self) -> &TransportOptions<HttpTransport> {
        &self.options
    }

    fn build_request(&self, request: &HttpRequest) -> Result<RequestBuilder, StreamError> {
        let provider = &self.options.provider;
        let url = resolve_url(provider.base_url.as_deref(), &request.endpoint)?;

        let mut req = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json");

        if let Some(api_key) = &provider.api_key {
            req = req.header(AUTHORIZATION, format!("Bearer {}", api_key.expose_secret()));
        }

        req = add_extra_headers(req, &provider.extra_headers);
        req = add_extra_headers(req, &request.headers);
        Ok(req.json(&request.body))
    }

    /// Send a request and decode the whole JSON response body.
    ///
    /// Used for plain request/response endpoints such as paged lists.
    pub async fn post_json<R: DeserializeOwned>(
        &self,
        request: HttpRequest,
    ) -> Result<R, StreamError> {
        let response = self.build_request(&request)?.send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(StreamError::Status {
                status: status.as_u16(),
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl Transport for HttpClient {
    type Request = HttpRequest;

    async fn send(&self, request: HttpRequest) -> Result<TransportResponse, StreamError> {
        debug!(endpoint = %request.endpoint, "sending stream request");
        let response = self
            .build_request(&request)?
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;
        let status = response.status();

        Ok(TransportResponse {
            ok: status.is_success(),
            status: status.as_u16(),
            body: response.byte_source(),
        })
    }
}

/// Extension trait for `reqwest::Response` to read its body as a stream.
///
/// # Example
/// ```ignore
/// use fetchstream::http::ResponseExt;
/// use fetchstream::stream::reassemble;
///
/// let response = client.post(url).json(&body).send().await?;
/// let mut stream = reassemble::<MyEvent>(response.text_source(), StreamOptions::default());
/// while let Some(result) = stream.next().await {
///     let emission = result?;
///     println!("{:?}", emission.current);
/// }
/// ```
pub trait ResponseExt {
    /// The raw body as byte chunks.
    fn byte_source(self) -> ByteSource;

    /// The body decoded to text chunks.
    fn text_source(self) -> TextSource;
}

impl ResponseExt for reqwest::Response {
    fn byte_source(self) -> ByteSource {
        self.bytes_stream()
            .map(|chunk| chunk.map_err(StreamError::from))
            .boxed()
    }

    fn text_source(self) -> TextSource {
        decode_text(self.byte_source())
    }
}
