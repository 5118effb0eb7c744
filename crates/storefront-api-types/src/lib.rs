//! Request and response shapes for the storefront wishlist API.
//!
//! The server owns every record here; clients treat them as read-only copies.
//! Fields the client does not interpret are kept in `extra` so a cached copy
//! serializes back to the same document it was decoded from.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Characters escaped in a single path segment: everything but RFC 3986 unreserved.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Path of the endpoint returning the customer's grouped wishlist contents.
pub const GET_WISHLIST_PATH: &str = "api/wishlists/get-all";
/// Path of the endpoint returning every wishlist document.
pub const GET_ALL_LISTS_PATH: &str = "api/wishlists/get-all-lists";
/// Path of the endpoint creating a new list.
pub const CREATE_LIST_PATH: &str = "api/wishlists/create-list";
/// Path of the endpoint adding a product to a list.
pub const ADD_TO_LIST_PATH: &str = "api/wishlists/add-to-list";

/// Path of the endpoint removing products from the given list.
///
/// The id is percent-encoded as one path segment. Ids made only of dots still
/// resolve as relative segments and must be rejected by the caller.
pub fn delete_item_path(wishlist_id: &str) -> String {
    format!(
        "api/wishlists/delete-wishlist-item/{}",
        utf8_percent_encode(wishlist_id, PATH_SEGMENT)
    )
}

/// A wishlist group as returned by `get-all`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WishlistGroup {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub products: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A wishlist document as returned by `get-all-lists`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WishlistDocument {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub products: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WishlistDocument {
    /// Ids of the products in this list, whether embedded as plain ids or as objects.
    pub fn product_ids(&self) -> Vec<String> {
        self.products.iter().filter_map(product_id_of).collect()
    }
}

impl WishlistGroup {
    pub fn product_ids(&self) -> Vec<String> {
        self.products.iter().filter_map(product_id_of).collect()
    }
}

fn product_id_of(value: &Value) -> Option<String> {
    match value {
        Value::String(id) => Some(id.clone()),
        Value::Object(map) => map
            .get("_id")
            .or_else(|| map.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

/// Envelope of `GET api/wishlists/get-all`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WishlistResponse {
    #[serde(default)]
    pub lists: Vec<WishlistGroup>,
}

/// Envelope of `GET api/wishlists/get-all-lists`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AllListsResponse {
    #[serde(default)]
    pub wishlists: Vec<WishlistDocument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateListRequest {
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToListRequest {
    pub wishlist_id: String,
    pub product_id: String,
}

/// One product id or a batch of ids; serialized as a bare string or an array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProductSelection {
    One(String),
    Many(Vec<String>),
}

impl ProductSelection {
    pub fn ids(&self) -> Vec<&str> {
        match self {
            Self::One(id) => vec![id.as_str()],
            Self::Many(ids) => ids.iter().map(String::as_str).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::One(id) => id.trim().is_empty(),
            Self::Many(ids) => ids.is_empty() || ids.iter().all(|id| id.trim().is_empty()),
        }
    }
}

impl From<String> for ProductSelection {
    fn from(id: String) -> Self {
        Self::One(id)
    }
}

impl From<&str> for ProductSelection {
    fn from(id: &str) -> Self {
        Self::One(id.to_string())
    }
}

impl From<Vec<String>> for ProductSelection {
    fn from(ids: Vec<String>) -> Self {
        Self::Many(ids)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveFromListRequest {
    pub product_id: ProductSelection,
}
