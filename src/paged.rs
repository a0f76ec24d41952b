//! Paged list fetching: search, refresh and load-more over a page source.
//!
//! Each request carries the initial params, the latest search params, and the
//! pagination fields `current` and `size`, merged in that order.

use std::future::Future;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::client::StreamError;
use crate::http::{HttpClient, HttpRequest};
use crate::model::{PagedList, ResponseData};
use crate::pagination::{Pagination, PaginationConfig};

/// Query parameters sent with a page request.
pub type Params = Map<String, Value>;

/// Something that can fetch one page of rows.
#[async_trait]
pub trait PageSource<T>: Send + Sync {
    async fn fetch_page(&self, params: Params) -> Result<ResponseData<PagedList<T>>, StreamError>;
}

#[async_trait]
impl<T, F, Fut> PageSource<T> for F
where
    T: Send + 'static,
    F: Fn(Params) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ResponseData<PagedList<T>>, StreamError>> + Send + 'static,
{
    async fn fetch_page(&self, params: Params) -> Result<ResponseData<PagedList<T>>, StreamError> {
        self(params).await
    }
}

/// Page source that POSTs the params as JSON to a fixed endpoint.
#[derive(Debug, Clone)]
pub struct HttpPages {
    client: HttpClient,
    endpoint: String,
}

impl HttpPages {
    pub fn new(client: HttpClient, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl<T> PageSource<T> for HttpPages
where
    T: DeserializeOwned + Send + 'static,
{
    async fn fetch_page(&self, params: Params) -> Result<ResponseData<PagedList<T>>, StreamError> {
        let request = HttpRequest::new(self.endpoint.clone(), &params)?;
        self.client.post_json(request).await
    }
}

/// Paged list state bound to a page source.
pub struct Paged<T, S> {
    source: S,
    init_params: Params,
    search_params: Option<Value>,
    pagination: Pagination,
    rows: Vec<T>,
    loading: watch::Sender<bool>,
}

impl<T, S> Paged<T, S>
where
    T: Send + 'static,
    S: PageSource<T>,
{
    pub fn new(source: S) -> Self {
        let (loading, _) = watch::channel(false);
        Self {
            source,
            init_params: Params::new(),
            search_params: None,
            pagination: Pagination::default(),
            rows: Vec::new(),
            loading,
        }
    }

    /// Params sent with every request.
    pub fn with_init_params(mut self, params: Params) -> Self {
        self.init_params = params;
        self
    }

    pub fn with_pagination(mut self, config: &PaginationConfig) -> Self {
        self.pagination = Pagination::new(Some(config));
        self
    }

    /// Rows currently shown.
    pub fn rows(&self) -> &[T] {
        &self.rows
    }

    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    /// Watch the loading flag.
    pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    /// Search with new params. Changed params restart from the first page.
    pub async fn search(&mut self, params: Option<Value>) -> Result<(), StreamError> {
        if self.search_params != params {
            self.search_params = params;
            self.pagination.reset();
        }
        self.load(false).await
    }

    /// Refetch the current page with the cached params.
    pub async fn refresh(&mut self) -> Result<(), StreamError> {
        self.load(false).await
    }

    /// Fetch the next page and append its rows.
    pub async fn load_more(&mut self) -> Result<(), StreamError> {
        self.pagination.advance();
        self.load(true).await
    }

    /// Apply a page change from the view and refetch.
    pub async fn change_page(&mut self, page: u32, page_size: u32) -> Result<(), StreamError> {
        self.pagination.change(page, page_size);
        self.load(false).await
    }

    /// The merged params for the next request.
    pub fn request_params(&self) -> Params {
        let mut params = self.init_params.clone();
        if let Some(Value::Object(search)) = &self.search_params {
            params.extend(search.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        params.insert("current".to_string(), Value::from(self.pagination.current));
        params.insert("size".to_string(), Value::from(self.pagination.page_size));
        params
    }

    async fn load(&mut self, append: bool) -> Result<(), StreamError> {
        let params = self.request_params();
        debug!(page = self.pagination.current, append, "fetching page");

        self.loading.send_replace(true);
        let result = self.source.fetch_page(params).await;
        self.loading.send_replace(false);

        match result {
            Ok(response) => {
                let PagedList { list, total } = response.data;
                self.pagination.total = total;
                if append {
                    self.rows.extend(list);
                } else {
                    self.rows = list;
                }
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "failed to fetch page");
                Err(e)
            }
        }
    }
}
