//! Streaming example: POST a prompt and print each decoded message as it arrives.
//!
//! Run with:
//! ```bash
//! export STREAM_BASE_URL="http://localhost:8080"
//! cargo run --example fetch_stream
//! ```

use futures::StreamExt;
use serde::Deserialize;
use fetchstream::options::{HttpTransport, TransportOptions};
use fetchstream::{FetchStream, HttpRequest, StreamOptions};

/// Shape of each `data:` payload sent by the server.
#[derive(Debug, Clone, Deserialize)]
struct Reply {
    content: String,
    #[serde(default)]
    done: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt::init();

    let base_url = std::env::var("STREAM_BASE_URL")
        .expect("STREAM_BASE_URL environment variable must be set");

    let mut transport = HttpTransport::new(base_url);
    if let Ok(key) = std::env::var("STREAM_API_KEY") {
        transport = transport.with_api_key(key);
    }

    let transport_options =
        TransportOptions::new(transport).with_timeout(std::time::Duration::from_secs(120));

    let fetch = FetchStream::<Reply, _>::http(transport_options)?
        .with_options(StreamOptions::default());

    let request = HttpRequest::new(
        "/chat/stream",
        &serde_json::json!({ "prompt": "Write a haiku about Rust programming." }),
    )?;

    println!("Streaming response...\n");

    match fetch.fetch_stream(request).await {
        Ok(mut stream) => {
            while let Some(result) = stream.next().await {
                match result {
                    Ok(emission) => {
                        // The server sends the full text so far, not a delta
                        print!("\r{}", emission.current.content);

                        use std::io::Write;
                        std::io::stdout().flush()?;

                        if emission.current.done {
                            println!("\n\n=== Stream Complete ===");
                        }
                    }
                    Err(e) => {
                        eprintln!("\nError in stream: {}", e);
                        return Err(e.into());
                    }
                }
            }
        }
        Err(e) => {
            eprintln!("Error starting stream: {}", e);
            return Err(e.into());
        }
    }

    if let Some(last) = fetch.current() {
        println!("Final value: {:?}", last);
    }

    Ok(())
}
