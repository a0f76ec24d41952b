//! Data models shared by the stream and paged helpers.

use serde::{Deserialize, Serialize};

/// One value delivered by the reassembly loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emission<R> {
    /// The value decoded from this message, now the session's current value.
    pub current: R,

    /// The raw message text as it was split from the stream, label included.
    pub raw: String,
}

/// Standard response envelope of a paged endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseData<T> {
    /// Business status code.
    pub code: String,

    /// Human readable status message.
    pub msg: String,

    pub data: T,
}

/// One page of rows plus the total row count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagedList<T> {
    #[serde(default = "Vec::new")]
    pub list: Vec<T>,

    #[serde(default)]
    pub total: u64,
}

impl<T> Default for PagedList<T> {
    fn default() -> Self {
        Self {
            list: Vec::new(),
            total: 0,
        }
    }
}
