//! Paged list example: search a list endpoint and load two pages.
//!
//! Run with:
//! ```bash
//! export LIST_BASE_URL="http://localhost:8080"
//! cargo run --example paged_list
//! ```

use fetchstream::options::{HttpTransport, TransportOptions};
use fetchstream::paged::{HttpPages, Paged};
use fetchstream::pagination::PaginationConfig;
use fetchstream::HttpClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let base_url =
        std::env::var("LIST_BASE_URL").expect("LIST_BASE_URL environment variable must be set");
    let client = HttpClient::new(TransportOptions::new(HttpTransport::new(base_url)))?;

    let mut paged: Paged<serde_json::Value, _> = Paged::new(HttpPages::new(client, "/items/page"))
        .with_pagination(&PaginationConfig::default().with_page_size_options(vec![20, 50]));

    paged.search(Some(serde_json::json!({ "keyword": "rust" }))).await?;
    println!("{}", paged.pagination().total_label());

    if paged.pagination().has_more() {
        paged.load_more().await?;
    }

    for row in paged.rows() {
        println!("{}", row);
    }

    Ok(())
}
