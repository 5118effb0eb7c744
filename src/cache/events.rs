//! Mutation events.
//!
//! Every successful remote mutation is recorded as an event; the planner turns
//! it into the set of query entries to invalidate or re-fetch.

use std::sync::atomic::{AtomicU64, Ordering};

use time::OffsetDateTime;
use uuid::Uuid;

/// Monotonic epoch for ordering events within this process.
pub type Epoch = u64;

#[derive(Debug, Clone)]
pub struct MutationEvent {
    /// Unique identifier (UUIDv4).
    pub id: Uuid,
    pub epoch: Epoch,
    pub kind: MutationKind,
    pub timestamp: OffsetDateTime,
}

impl MutationEvent {
    pub fn new(kind: MutationKind, epoch: Epoch) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch,
            kind,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// Remote mutations that affect cached queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    /// A new wishlist was created.
    ListCreated { title: String },
    /// A product was added to a list.
    ItemAdded {
        wishlist_id: String,
        product_id: String,
    },
    /// One or more products were removed from a list.
    ItemsRemoved {
        wishlist_id: String,
        product_ids: Vec<String>,
    },
}

/// Hands out monotonically increasing epochs.
#[derive(Debug, Default)]
pub struct EpochCounter(AtomicU64);

impl EpochCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> Epoch {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}
