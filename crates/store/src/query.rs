use common::CancellationStatus;

/// Default page size for customer listings.
pub const DEFAULT_CUSTOMER_LIMIT: usize = 10;

/// Default page size for cancellation listings.
pub const DEFAULT_CANCELLATION_LIMIT: usize = 50;

/// One page of a listing plus the total number of matching rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

impl<T> Page<T> {
    /// Returns true if rows exist beyond this page.
    pub fn has_more(&self, offset: usize) -> bool {
        ((offset + self.items.len()) as u64) < self.total
    }
}

/// Builder for customer listings.
///
/// Customers are returned newest first. The search term matches name or
/// phone, case-insensitively.
#[derive(Debug, Clone)]
pub struct CustomerQuery {
    pub search: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for CustomerQuery {
    fn default() -> Self {
        Self {
            search: None,
            limit: DEFAULT_CUSTOMER_LIMIT,
            offset: 0,
        }
    }
}

impl CustomerQuery {
    /// Creates a query with default paging.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters by a name/phone substring. Blank terms are ignored.
    pub fn search(mut self, term: impl Into<String>) -> Self {
        let term = term.into();
        self.search = if term.trim().is_empty() {
            None
        } else {
            Some(term.trim().to_string())
        };
        self
    }

    /// Selects a 1-based page of `limit` rows.
    pub fn page(mut self, page: usize, limit: usize) -> Self {
        self.limit = limit.max(1);
        self.offset = page.saturating_sub(1) * self.limit;
        self
    }

    /// Returns true if the customer fields match the search term.
    pub fn matches(&self, name: &str, phone: &str) -> bool {
        match &self.search {
            Some(term) => {
                let term = term.to_lowercase();
                name.to_lowercase().contains(&term) || phone.to_lowercase().contains(&term)
            }
            None => true,
        }
    }
}

/// Builder for cancellation listings, newest first.
#[derive(Debug, Clone)]
pub struct CancellationQuery {
    pub status: Option<CancellationStatus>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for CancellationQuery {
    fn default() -> Self {
        Self {
            status: None,
            limit: DEFAULT_CANCELLATION_LIMIT,
            offset: 0,
        }
    }
}

impl CancellationQuery {
    /// Creates a query with default paging.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters by record status.
    pub fn status(mut self, status: CancellationStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Limits the number of rows returned.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Skips the given number of rows.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}
