//! Query key definitions.
//!
//! A query key addresses one cache entry and its subscribers. Filters select
//! entries either by key prefix (invalidation) or by exact key (eager
//! re-fetch).

use std::fmt;

/// Leading segment of a query key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryTag {
    /// Grouped wishlist contents (`get-all`).
    Wishlist,
    /// Every wishlist document (`get-all-lists`).
    Lists,
    /// Customer aggregate stats, owned by the customer views.
    CustomerStats,
    /// Any other feature's tag.
    Custom(String),
}

impl QueryTag {
    pub fn as_str(&self) -> &str {
        match self {
            QueryTag::Wishlist => "wishlist",
            QueryTag::Lists => "list",
            QueryTag::CustomerStats => "customer-stats",
            QueryTag::Custom(tag) => tag,
        }
    }
}

/// Tag plus ordered parameters, e.g. `["list"]` or `["list", "w1"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    tag: QueryTag,
    params: Vec<String>,
}

impl QueryKey {
    pub fn new(tag: QueryTag) -> Self {
        Self {
            tag,
            params: Vec::new(),
        }
    }

    pub fn wishlist() -> Self {
        Self::new(QueryTag::Wishlist)
    }

    pub fn all_lists() -> Self {
        Self::new(QueryTag::Lists)
    }

    pub fn customer_stats() -> Self {
        Self::new(QueryTag::CustomerStats)
    }

    pub fn custom(tag: impl Into<String>) -> Self {
        Self::new(QueryTag::Custom(tag.into()))
    }

    #[must_use]
    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.params.push(param.into());
        self
    }

    pub fn tag(&self) -> &QueryTag {
        &self.tag
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Whether `self` begins with every segment of `prefix`.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.tag == prefix.tag && self.params.starts_with(&prefix.params)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[\"{}\"", self.tag.as_str())?;
        for param in &self.params {
            write!(f, ", \"{param}\"")?;
        }
        f.write_str("]")
    }
}

/// Selects cache entries for invalidation or re-fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryFilter {
    pub key: QueryKey,
    pub exact: bool,
}

impl QueryFilter {
    /// Match `key` and every key it prefixes.
    pub fn prefix(key: QueryKey) -> Self {
        Self { key, exact: false }
    }

    /// Match `key` only.
    pub fn exact(key: QueryKey) -> Self {
        Self { key, exact: true }
    }

    pub fn matches(&self, candidate: &QueryKey) -> bool {
        if self.exact {
            candidate == &self.key
        } else {
            candidate.starts_with(&self.key)
        }
    }
}

impl fmt::Display for QueryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.exact {
            write!(f, "exact {}", self.key)
        } else {
            write!(f, "prefix {}", self.key)
        }
    }
}
