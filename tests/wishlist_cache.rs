//! Wishlist cache behaviour against a mock API over real HTTP.

use std::sync::Arc;
use std::time::Duration;

use httpmock::MockServer;
use serde_json::json;
use storefront::application::wishlist::{WishlistError, WishlistService};
use storefront::cache::{QueryClient, QueryKey};
use storefront::infra::http::HttpTransport;
use storefront_api_types::AllListsResponse;

fn service(server: &MockServer) -> WishlistService {
    let transport = HttpTransport::new(&server.base_url(), None, Duration::from_secs(5))
        .expect("transport");
    WishlistService::new(Arc::new(transport), QueryClient::default())
}

#[tokio::test]
async fn created_list_is_visible_to_existing_subscriber() {
    let server = MockServer::start();
    let mut empty = server.mock(|when, then| {
        when.method("GET").path("/api/wishlists/get-all-lists");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"wishlists":[]}"#);
    });
    let service = service(&server);

    let lists = service.subscribe_all_lists();
    let before: AllListsResponse = lists.read_as().await.expect("initial read");
    assert!(before.wishlists.is_empty());
    empty.assert_hits(1);
    empty.delete();

    let populated = server.mock(|when, then| {
        when.method("GET").path("/api/wishlists/get-all-lists");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"wishlists":[{"_id":"w1","title":"Gifts","products":[]}]}"#);
    });
    let create = server.mock(|when, then| {
        when.method("POST")
            .path("/api/wishlists/create-list")
            .json_body(json!({"title": "Gifts"}));
        then.status(201)
            .header("content-type", "application/json")
            .body(r#"{"_id":"w1","title":"Gifts"}"#);
    });

    service.create_list("Gifts").await.expect("create");
    create.assert();
    populated.assert_hits(1);

    let after: AllListsResponse = lists.read_as().await.expect("read after create");
    assert_eq!(after.wishlists.len(), 1);
    assert_eq!(after.wishlists[0].title, "Gifts");
    populated.assert_hits(1);
}

#[tokio::test]
async fn added_item_is_fetched_lazily_on_next_read() {
    let server = MockServer::start();
    let get_all = server.mock(|when, then| {
        when.method("GET").path("/api/wishlists/get-all");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"lists":[{"_id":"w1","title":"Birthday","products":["p1"]}]}"#);
    });
    let add = server.mock(|when, then| {
        when.method("POST").path("/api/wishlists/add-to-list");
        then.status(200)
            .header("content-type", "application/json")
            .body("{}");
    });
    let service = service(&server);

    service.fetch_wishlist().await.expect("first read");
    service.add_item("w1", "p1").await.expect("add");

    add.assert();
    get_all.assert_hits(1);
    assert!(
        service
            .queries()
            .entry(&QueryKey::wishlist())
            .expect("entry")
            .stale
    );

    let wishlist = service.fetch_wishlist().await.expect("second read");
    assert_eq!(wishlist.lists[0].product_ids(), vec!["p1"]);
    get_all.assert_hits(2);
}

#[tokio::test]
async fn failed_removal_keeps_cache_fresh() {
    let server = MockServer::start();
    let get_all = server.mock(|when, then| {
        when.method("GET").path("/api/wishlists/get-all");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"lists":[]}"#);
    });
    server.mock(|when, then| {
        when.method("DELETE")
            .path("/api/wishlists/delete-wishlist-item/w1");
        then.status(500).body("database unavailable");
    });
    let service = service(&server);

    service.fetch_wishlist().await.expect("first read");
    let err = service
        .remove_item("w1", "p1")
        .await
        .expect_err("server failure");
    assert!(matches!(err, WishlistError::Transport(_)));

    service.fetch_wishlist().await.expect("cached read");
    get_all.assert_hits(1);
}
