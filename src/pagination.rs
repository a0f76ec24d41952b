//! Pagination state shared by paged list views.

use serde::{Deserialize, Serialize};

/// Page sizes offered when the caller does not supply its own.
pub const DEFAULT_PAGE_SIZE_OPTIONS: [u32; 4] = [10, 30, 60, 90];

/// Page size used when no options are supplied.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Caller overrides for [`Pagination`]. Unset fields keep their defaults.
///
/// # Example
/// ```rust
/// use fetchstream::pagination::{Pagination, PaginationConfig};
///
/// let config = PaginationConfig::default().with_page_size_options(vec![20, 50]);
/// let pagination = Pagination::new(Some(&config));
/// assert_eq!(pagination.page_size, 20);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationConfig {
    pub current: Option<u32>,
    pub page_size: Option<u32>,
    pub page_size_options: Option<Vec<u32>>,
    pub show_size_changer: Option<bool>,
    pub show_quick_jumper: Option<bool>,
}

impl PaginationConfig {
    /// Set the starting page.
    pub fn with_current(mut self, current: u32) -> Self {
        self.current = Some(current);
        self
    }

    /// Set the page size explicitly.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Set the recognized page sizes. The first one becomes the default size.
    pub fn with_page_size_options(mut self, options: Vec<u32>) -> Self {
        self.page_size_options = Some(options);
        self
    }

    pub fn with_size_changer(mut self, show: bool) -> Self {
        self.show_size_changer = Some(show);
        self
    }

    pub fn with_quick_jumper(mut self, show: bool) -> Self {
        self.show_quick_jumper = Some(show);
        self
    }
}

/// Current pagination state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// 1-based page number.
    pub current: u32,
    pub page_size: u32,
    pub total: u64,
    pub page_size_options: Vec<u32>,
    pub show_size_changer: bool,
    pub show_quick_jumper: bool,
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Pagination {
    /// Build the state from defaults plus optional overrides.
    pub fn new(config: Option<&PaginationConfig>) -> Self {
        let options = config.and_then(|c| c.page_size_options.clone());
        let page_size = config
            .and_then(|c| c.page_size)
            .or_else(|| options.as_ref().and_then(|o| o.first().copied()))
            .unwrap_or(DEFAULT_PAGE_SIZE);

        Self {
            current: config.and_then(|c| c.current).unwrap_or(1).max(1),
            page_size,
            total: 0,
            page_size_options: options.unwrap_or_else(|| DEFAULT_PAGE_SIZE_OPTIONS.to_vec()),
            show_size_changer: config.and_then(|c| c.show_size_changer).unwrap_or(true),
            show_quick_jumper: config.and_then(|c| c.show_quick_jumper).unwrap_or(true),
        }
    }

    /// Apply a page or page-size change coming from the view.
    pub fn change(&mut self, page: u32, page_size: u32) {
        self.current = page.max(1);
        self.page_size = page_size;
    }

    /// Go back to the first page.
    pub fn reset(&mut self) {
        self.current = 1;
    }

    /// Advance one page.
    pub fn advance(&mut self) {
        self.current = self.current.saturating_add(1);
    }

    /// Whether `size` is one of the offered page sizes.
    pub fn is_recognized_size(&self, size: u32) -> bool {
        self.page_size_options.contains(&size)
    }

    /// Number of pages needed for `total` rows.
    pub fn page_count(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.page_size))
    }

    /// Whether a page after the current one exists.
    pub fn has_more(&self) -> bool {
        u64::from(self.current) < self.page_count()
    }

    pub fn total_label(&self) -> String {
        format!("Total {} items", self.total)
    }
}
