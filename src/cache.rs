// Product query cache

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;

use crate::catalog::{ProductFilter, ProductsPage};

/// Default freshness window for product pages
pub const DEFAULT_STALE_SECS: i64 = 30;

#[derive(Clone)]
struct CachedPage {
    page: ProductsPage,
    fetched_at: DateTime<Utc>,
}

/// Thread-safe cache of product pages keyed by normalized filter
pub struct ProductQueryCache {
    /// Pages indexed by query
    entries: Arc<DashMap<ProductFilter, CachedPage>>,

    /// Age after which an entry is ignored
    stale_after: Duration,
}

impl ProductQueryCache {
    /// Create a new cache with the given freshness window in seconds
    pub fn new(stale_secs: i64) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            stale_after: Duration::seconds(stale_secs),
        }
    }

    /// Fresh page for the filter, if any
    pub fn get(&self, filter: &ProductFilter) -> Option<ProductsPage> {
        self.get_at(filter, Utc::now())
    }

    fn get_at(&self, filter: &ProductFilter, now: DateTime<Utc>) -> Option<ProductsPage> {
        let entry = self.entries.get(filter)?;
        if now - entry.fetched_at > self.stale_after {
            return None;
        }
        Some(entry.page.clone())
    }

    /// Store a page fetched now
    pub fn insert(&self, filter: ProductFilter, page: ProductsPage) {
        self.insert_at(filter, page, Utc::now());
    }

    fn insert_at(&self, filter: ProductFilter, page: ProductsPage, fetched_at: DateTime<Utc>) {
        tracing::debug!(entries = self.entries.len() + 1, "Caching product page");
        self.entries.insert(filter, CachedPage { page, fetched_at });
    }

    /// Drop every cached page
    pub fn invalidate_all(&self) {
        self.entries.clear();
    }

    /// Drop pages past the freshness window
    pub fn prune(&self) {
        let now = Utc::now();
        self.entries
            .retain(|_, entry| now - entry.fetched_at <= self.stale_after);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ProductQueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_STALE_SECS)
    }
}

impl Clone for ProductQueryCache {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            stale_after: self.stale_after,
        }
    }
}
