//! Wishlist data layer.
//!
//! Reads go through the query cache under the `list` and `wishlist` keys.
//! Mutations call the API directly and, only once the call succeeded, record a
//! mutation event so dependent entries are invalidated.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use reqwest::Method;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use storefront_api_types::{
    ADD_TO_LIST_PATH, AddToListRequest, AllListsResponse, CREATE_LIST_PATH, CreateListRequest,
    GET_ALL_LISTS_PATH, GET_WISHLIST_PATH, ProductSelection, RemoveFromListRequest,
    WishlistResponse, delete_item_path,
};
use thiserror::Error;
use tracing::{info, instrument};

use crate::cache::{MutationTrigger, QueryClient, QueryKey, Subscription};
use crate::infra::http::{ApiTransport, TransportError};

#[derive(Debug, Error)]
pub enum WishlistError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("failed to decode {key}: {source}")]
    Decode {
        key: QueryKey,
        source: serde_json::Error,
    },
    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Wishlist operations backed by the shared query cache.
#[derive(Clone)]
pub struct WishlistService {
    transport: Arc<dyn ApiTransport>,
    queries: QueryClient,
    trigger: Arc<MutationTrigger>,
}

impl std::fmt::Debug for WishlistService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WishlistService")
            .field("queries", &self.queries)
            .field("trigger", &self.trigger)
            .finish_non_exhaustive()
    }
}

impl WishlistService {
    pub fn new(transport: Arc<dyn ApiTransport>, queries: QueryClient) -> Self {
        let trigger = Arc::new(MutationTrigger::new(queries.clone()));
        Self {
            transport,
            queries,
            trigger,
        }
    }

    pub fn queries(&self) -> &QueryClient {
        &self.queries
    }

    /// Every wishlist document of the customer (`list` key).
    pub async fn fetch_all_lists(&self) -> Result<AllListsResponse, WishlistError> {
        let key = QueryKey::all_lists();
        let data = self
            .queries
            .fetch_with(&key, self.get(GET_ALL_LISTS_PATH))
            .await?;
        decode(key, data)
    }

    /// The customer's grouped wishlist contents (`wishlist` key).
    pub async fn fetch_wishlist(&self) -> Result<WishlistResponse, WishlistError> {
        let key = QueryKey::wishlist();
        let data = self
            .queries
            .fetch_with(&key, self.get(GET_WISHLIST_PATH))
            .await?;
        decode(key, data)
    }

    pub fn subscribe_all_lists(&self) -> Subscription {
        self.queries
            .subscribe(QueryKey::all_lists(), self.get(GET_ALL_LISTS_PATH))
    }

    pub fn subscribe_wishlist(&self) -> Subscription {
        self.queries
            .subscribe(QueryKey::wishlist(), self.get(GET_WISHLIST_PATH))
    }

    /// Create a list. On success `list` is re-fetched immediately and
    /// `wishlist` is marked stale.
    #[instrument(skip(self))]
    pub async fn create_list(&self, title: &str) -> Result<Value, WishlistError> {
        require("list title", title)?;

        let body = encode(&CreateListRequest {
            title: title.to_string(),
        })?;
        let created = self
            .transport
            .send(Method::POST, CREATE_LIST_PATH, Some(body))
            .await?;

        info!(title, "Wishlist created");
        self.trigger.list_created(title).await;
        Ok(created)
    }

    /// Add a product to a list. On success `list`, `wishlist` and
    /// `customer-stats` are marked stale.
    #[instrument(skip(self))]
    pub async fn add_item(&self, list_id: &str, product_id: &str) -> Result<Value, WishlistError> {
        require("list id", list_id)?;
        require("product id", product_id)?;

        let body = encode(&AddToListRequest {
            wishlist_id: list_id.to_string(),
            product_id: product_id.to_string(),
        })?;
        let response = self
            .transport
            .send(Method::POST, ADD_TO_LIST_PATH, Some(body))
            .await?;

        self.trigger.item_added(list_id, product_id).await;
        Ok(response)
    }

    /// Remove one product or a batch of products from a list.
    ///
    /// A batch is sent as a single request and invalidates each dependent key once.
    #[instrument(skip(self, products))]
    pub async fn remove_item(
        &self,
        list_id: &str,
        products: impl Into<ProductSelection>,
    ) -> Result<Value, WishlistError> {
        require_path_id("list id", list_id)?;
        let selection = products.into();
        if selection.is_empty() {
            return Err(WishlistError::InvalidInput(
                "at least one product id is required".to_string(),
            ));
        }

        let product_ids = selection.ids();
        let body = encode(&RemoveFromListRequest {
            product_id: selection.clone(),
        })?;
        let response = self
            .transport
            .send(Method::DELETE, &delete_item_path(list_id), Some(body))
            .await?;

        self.trigger.items_removed(list_id, &product_ids).await;
        Ok(response)
    }

    fn get(
        &self,
        path: &'static str,
    ) -> impl Fn() -> BoxFuture<'static, Result<Value, TransportError>> + Send + Sync + 'static
    {
        let transport = Arc::clone(&self.transport);
        move || {
            let transport = Arc::clone(&transport);
            async move { transport.send(Method::GET, path, None).await }.boxed()
        }
    }
}

fn require(what: &str, value: &str) -> Result<(), WishlistError> {
    if value.trim().is_empty() {
        return Err(WishlistError::InvalidInput(format!(
            "{what} must not be empty"
        )));
    }
    Ok(())
}

/// Ids placed in a URL path must not be relative segments.
fn require_path_id(what: &str, value: &str) -> Result<(), WishlistError> {
    require(what, value)?;
    if value.chars().all(|c| c == '.') {
        return Err(WishlistError::InvalidInput(format!(
            "{what} must not be a relative path segment"
        )));
    }
    Ok(())
}

fn decode<T: DeserializeOwned>(key: QueryKey, data: Value) -> Result<T, WishlistError> {
    serde_json::from_value(data).map_err(|source| WishlistError::Decode { key, source })
}

fn encode<T: Serialize>(body: &T) -> Result<Value, WishlistError> {
    serde_json::to_value(body).map_err(WishlistError::Encode)
}
