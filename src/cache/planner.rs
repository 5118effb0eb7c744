//! Invalidation plan generation.
//!
//! Maps a mutation event onto the query entries it makes out of date.

use std::fmt;

use super::events::{MutationEvent, MutationKind};
use super::keys::{QueryFilter, QueryKey};

/// Actions to execute after a mutation succeeds.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InvalidationPlan {
    /// Entries to mark stale, applied in order.
    pub invalidate: Vec<QueryFilter>,
    /// Exact keys to re-fetch immediately after invalidation.
    pub refetch_exact: Vec<QueryKey>,
}

impl fmt::Display for InvalidationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let invalidate: Vec<String> = self.invalidate.iter().map(ToString::to_string).collect();
        let refetch: Vec<String> = self.refetch_exact.iter().map(ToString::to_string).collect();
        write!(
            f,
            "InvalidationPlan {{ invalidate: [{}], refetch_exact: [{}] }}",
            invalidate.join(", "),
            refetch.join(", ")
        )
    }
}

impl InvalidationPlan {
    /// Build the plan for one event.
    ///
    /// - List creation re-fetches the list-of-lists eagerly so the new list is
    ///   visible before any reader asks for it.
    /// - Item changes also touch customer stats, which count wishlisted products.
    pub fn from_event(event: &MutationEvent) -> Self {
        match &event.kind {
            MutationKind::ListCreated { .. } => Self {
                invalidate: vec![
                    QueryFilter::prefix(QueryKey::all_lists()),
                    QueryFilter::prefix(QueryKey::wishlist()),
                ],
                refetch_exact: vec![QueryKey::all_lists()],
            },
            MutationKind::ItemAdded { .. } | MutationKind::ItemsRemoved { .. } => Self {
                invalidate: vec![
                    QueryFilter::prefix(QueryKey::all_lists()),
                    QueryFilter::prefix(QueryKey::wishlist()),
                    QueryFilter::prefix(QueryKey::customer_stats()),
                ],
                refetch_exact: Vec::new(),
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.invalidate.is_empty() && self.refetch_exact.is_empty()
    }
}
