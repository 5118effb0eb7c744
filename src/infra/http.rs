//! JSON-over-HTTP transport for the storefront REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("server error: status {status} body {body}")]
    Status { status: StatusCode, body: String },
    #[error("failed to parse body: {0}")]
    Decode(#[source] serde_json::Error),
}

impl TransportError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(err) => err.status(),
            _ => None,
        }
    }
}

/// Sends a JSON request to the storefront API and returns the JSON response.
///
/// `path` is relative to the API base URL and carries no leading slash.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, TransportError>;
}

#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
    base: Url,
    token: Option<String>,
}

impl HttpTransport {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let base = normalize_base(Url::parse(base_url)?);
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base,
            token,
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("storefront/", env!("CARGO_PKG_VERSION"))
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn url(&self, path: &str) -> Result<Url, TransportError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(TransportError::Url)
    }

    async fn handle(resp: Response) -> Result<Value, TransportError> {
        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes).into_owned();
            return Err(TransportError::Status { status, body });
        }
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(TransportError::Decode)
    }
}

#[async_trait]
impl ApiTransport for HttpTransport {
    #[instrument(skip_all, fields(method = %method, path = path))]
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, TransportError> {
        let url = self.url(path)?;
        let mut req = self.client.request(method, url);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        if let Some(b) = body {
            req = req.json(&b);
        }

        let resp = req.send().await?;
        debug!(status = %resp.status(), "API response received");
        Self::handle(resp).await
    }
}

/// Relative joins replace the last path segment unless the base ends with '/'.
fn normalize_base(mut base: Url) -> Url {
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}

#[cfg(test)]
mod tests {
    use httpmock::MockServer;
    use serde_json::json;

    use super::*;

    fn transport(server: &MockServer, token: Option<&str>) -> HttpTransport {
        HttpTransport::new(
            &server.base_url(),
            token.map(str::to_string),
            Duration::from_secs(5),
        )
        .expect("transport")
    }

    #[test]
    fn base_path_is_kept_when_joining() {
        let transport = HttpTransport::new("https://shop.example/store", None, Duration::from_secs(1))
            .expect("transport");
        let url = transport.url("api/wishlists/get-all").expect("url");
        assert_eq!(url.as_str(), "https://shop.example/store/api/wishlists/get-all");
    }

    #[test]
    fn escaped_list_id_stays_under_delete_endpoint() {
        let transport = HttpTransport::new("https://shop.example/", None, Duration::from_secs(1))
            .expect("transport");
        let url = transport
            .url(&storefront_api_types::delete_item_path("../create-list?x"))
            .expect("url");
        assert_eq!(
            url.as_str(),
            "https://shop.example/api/wishlists/delete-wishlist-item/..%2Fcreate-list%3Fx"
        );
        assert_eq!(url.query(), None);
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let err = HttpTransport::new("not a url", None, Duration::from_secs(1))
            .expect_err("invalid url");
        assert!(matches!(err, TransportError::Url(_)));
    }

    #[tokio::test]
    async fn get_sends_bearer_token_and_decodes_json() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method("GET")
                .path("/api/wishlists/get-all")
                .header("authorization", "Bearer secret");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"lists":[]}"#);
        });

        let value = transport(&server, Some("secret"))
            .send(Method::GET, "api/wishlists/get-all", None)
            .await
            .expect("send");

        mock.assert();
        assert_eq!(value, json!({"lists": []}));
    }

    #[tokio::test]
    async fn post_sends_json_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method("POST")
                .path("/api/wishlists/create-list")
                .json_body(json!({"title": "Gifts"}));
            then.status(201)
                .header("content-type", "application/json")
                .body(r#"{"_id":"w1","title":"Gifts"}"#);
        });

        let value = transport(&server, None)
            .send(
                Method::POST,
                "api/wishlists/create-list",
                Some(json!({"title": "Gifts"})),
            )
            .await
            .expect("send");

        mock.assert();
        assert_eq!(value["_id"], "w1");
    }

    #[tokio::test]
    async fn empty_success_body_is_null() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("DELETE");
            then.status(204);
        });

        let value = transport(&server, None)
            .send(Method::DELETE, "api/wishlists/delete-wishlist-item/w1", None)
            .await
            .expect("send");

        assert_eq!(value, Value::Null);
    }

    #[tokio::test]
    async fn error_status_carries_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("POST").path("/api/wishlists/add-to-list");
            then.status(409).body("already listed");
        });

        let err = transport(&server, None)
            .send(Method::POST, "api/wishlists/add-to-list", Some(json!({})))
            .await
            .expect_err("conflict");

        assert_eq!(err.status(), Some(StatusCode::CONFLICT));
        match err {
            TransportError::Status { body, .. } => assert_eq!(body, "already listed"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn malformed_json_is_a_decode_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("GET");
            then.status(200).body("{not json");
        });

        let err = transport(&server, None)
            .send(Method::GET, "api/wishlists/get-all-lists", None)
            .await
            .expect_err("decode");

        assert!(matches!(err, TransportError::Decode(_)));
    }
}
