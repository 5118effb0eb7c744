//! Mutation trigger.
//!
//! Records successful mutations and applies the resulting invalidation plan
//! to the query client.

use tracing::{debug, info};

use super::client::QueryClient;
use super::events::{EpochCounter, MutationEvent, MutationKind};
use super::planner::InvalidationPlan;

/// Publishes mutation events against a query client.
///
/// # Usage
///
/// ```ignore
/// // After the remote add-to-list call succeeded:
/// trigger.item_added("w1", "p1").await;
/// ```
#[derive(Debug)]
pub struct MutationTrigger {
    client: QueryClient,
    epochs: EpochCounter,
}

impl MutationTrigger {
    pub fn new(client: QueryClient) -> Self {
        Self {
            client,
            epochs: EpochCounter::new(),
        }
    }

    /// Record `kind` and apply its plan. Returns the recorded event.
    pub async fn trigger(&self, kind: MutationKind) -> MutationEvent {
        let event = MutationEvent::new(kind, self.epochs.next());

        info!(
            event_id = %event.id,
            event_epoch = event.epoch,
            event_kind = ?event.kind,
            "Mutation event recorded"
        );

        let plan = InvalidationPlan::from_event(&event);
        debug!(event_id = %event.id, plan = %plan, "Applying invalidation plan");
        self.client.apply_plan(&plan).await;
        event
    }

    pub async fn list_created(&self, title: &str) -> MutationEvent {
        self.trigger(MutationKind::ListCreated {
            title: title.to_string(),
        })
        .await
    }

    pub async fn item_added(&self, wishlist_id: &str, product_id: &str) -> MutationEvent {
        self.trigger(MutationKind::ItemAdded {
            wishlist_id: wishlist_id.to_string(),
            product_id: product_id.to_string(),
        })
        .await
    }

    pub async fn items_removed(&self, wishlist_id: &str, product_ids: &[&str]) -> MutationEvent {
        self.trigger(MutationKind::ItemsRemoved {
            wishlist_id: wishlist_id.to_string(),
            product_ids: product_ids.iter().map(|id| (*id).to_string()).collect(),
        })
        .await
    }

    pub fn client(&self) -> &QueryClient {
        &self.client
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::cache::keys::QueryKey;

    fn seeded_client() -> QueryClient {
        let client = QueryClient::default();
        client.set_query_data(&QueryKey::all_lists(), json!({"wishlists": []}));
        client.set_query_data(&QueryKey::wishlist(), json!({"lists": []}));
        client.set_query_data(&QueryKey::customer_stats(), json!({"wishlisted": 0}));
        client
    }

    fn stale(client: &QueryClient, key: QueryKey) -> bool {
        client.entry(&key).expect("entry").stale
    }

    #[tokio::test]
    async fn item_added_marks_dependent_queries_stale() {
        let client = seeded_client();
        let trigger = MutationTrigger::new(client.clone());

        trigger.item_added("w1", "p1").await;

        assert!(stale(&client, QueryKey::all_lists()));
        assert!(stale(&client, QueryKey::wishlist()));
        assert!(stale(&client, QueryKey::customer_stats()));
    }

    #[tokio::test]
    async fn list_created_leaves_customer_stats_fresh() {
        let client = seeded_client();
        let trigger = MutationTrigger::new(client.clone());

        trigger.list_created("Gifts").await;

        assert!(stale(&client, QueryKey::wishlist()));
        assert!(!stale(&client, QueryKey::customer_stats()));
    }

    #[tokio::test]
    async fn events_carry_increasing_epochs() {
        let trigger = MutationTrigger::new(QueryClient::default());

        let first = trigger.items_removed("w1", &["p1", "p2"]).await;
        let second = trigger.items_removed("w1", &["p1", "p2"]).await;

        assert!(first.epoch < second.epoch);
        assert_ne!(first.id, second.id);
        assert_eq!(first.kind, second.kind);
    }
}
