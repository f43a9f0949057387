use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::Router;
use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, IntoHeaderName, CONTENT_TYPE};
use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tower::util::ServiceExt;

use crate::json_path::resolve_path;

/// In-process HTTP test client wrapping an Axum `Router`.
#[derive(Clone)]
pub struct TestApp {
    router: Router,
    default_peer: Option<SocketAddr>,
}

impl TestApp {
    pub fn new(router: Router) -> Self {
        Self {
            router,
            default_peer: None,
        }
    }

    /// Attach `peer` as the connection address of every request that does
    /// not set its own.
    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.default_peer = Some(peer);
        self
    }

    pub fn get(&self, path: &str) -> TestRequest<'_> {
        self.request(Method::GET, path)
    }

    pub fn post(&self, path: &str) -> TestRequest<'_> {
        self.request(Method::POST, path)
    }

    pub fn put(&self, path: &str) -> TestRequest<'_> {
        self.request(Method::PUT, path)
    }

    pub fn delete(&self, path: &str) -> TestRequest<'_> {
        self.request(Method::DELETE, path)
    }

    pub fn request(&self, method: Method, path: &str) -> TestRequest<'_> {
        TestRequest {
            app: self,
            method,
            path: path.to_string(),
            headers: HeaderMap::new(),
            body: None,
            peer: self.default_peer,
        }
    }
}

/// Builder for a single test request.
pub struct TestRequest<'a> {
    app: &'a TestApp,
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
    peer: Option<SocketAddr>,
}

impl TestRequest<'_> {
    pub fn header(mut self, name: impl IntoHeaderName, value: impl AsRef<str>) -> Self {
        self.headers.insert(name, value.as_ref().parse().unwrap());
        self
    }

    /// Simulate the request arriving from `peer`.
    pub fn peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Send without any connection address, as when `ConnectInfo` is absent.
    pub fn no_peer(mut self) -> Self {
        self.peer = None;
        self
    }

    /// Set the request body as JSON. Also sets Content-Type to `application/json`.
    pub fn json(mut self, body: &impl Serialize) -> Self {
        self.body = Some(serde_json::to_vec(body).unwrap());
        self.headers
            .insert(CONTENT_TYPE, "application/json".parse().unwrap());
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Build the `http::Request` without sending it.
    pub fn build(self) -> Request<Body> {
        let body = self.body.map(Body::from).unwrap_or_else(Body::empty);
        let mut builder = Request::builder().method(self.method).uri(&self.path);
        for (name, value) in &self.headers {
            builder = builder.header(name, value);
        }
        let mut request = builder.body(body).unwrap();
        if let Some(peer) = self.peer {
            request.extensions_mut().insert(ConnectInfo(peer));
        }
        request
    }

    pub async fn send(self) -> TestResponse {
        let router = self.app.router.clone();
        let request = self.build();

        let response = router.oneshot(request).await.expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("failed to read response body")
            .to_bytes();

        TestResponse { status, headers, body }
    }
}

/// Collected response with chaining assertions.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn assert_ok(self) -> Self {
        self.assert_status(StatusCode::OK)
    }

    pub fn assert_bad_request(self) -> Self {
        self.assert_status(StatusCode::BAD_REQUEST)
    }

    pub fn assert_not_found(self) -> Self {
        self.assert_status(StatusCode::NOT_FOUND)
    }

    pub fn assert_conflict(self) -> Self {
        self.assert_status(StatusCode::CONFLICT)
    }

    pub fn assert_too_many_requests(self) -> Self {
        self.assert_status(StatusCode::TOO_MANY_REQUESTS)
    }

    pub fn assert_status(self, expected: StatusCode) -> Self {
        assert_eq!(
            self.status,
            expected,
            "Expected {expected}, got {}\nBody: {}",
            self.status,
            self.text()
        );
        self
    }

    /// Assert that a JSON path resolves to the expected value.
    ///
    /// ```ignore
    /// resp.assert_json_path("content[0].sku", "SKU-1")
    ///     .assert_json_path("content.len()", 2)
    ///     .assert_json_path("total_elements", 2);
    /// ```
    pub fn assert_json_path(self, path: &str, expected: impl Into<Value>) -> Self {
        let root: Value = self.json();
        let actual = resolve_path(&root, path);
        let expected = expected.into();
        assert_eq!(
            actual, expected,
            "JSON path \"{path}\" assertion failed\n  Expected: {expected}\n  Actual:   {actual}\n  Body: {root}",
        );
        self
    }

    /// Assert that a JSON path satisfies a predicate.
    pub fn assert_json_path_fn(self, path: &str, predicate: impl FnOnce(&Value) -> bool) -> Self {
        let root: Value = self.json();
        let actual = resolve_path(&root, path);
        assert!(
            predicate(&actual),
            "JSON path \"{path}\" predicate failed\n  Value: {actual}\n  Body: {root}",
        );
        self
    }

    pub fn assert_header(self, name: &str, expected: &str) -> Self {
        assert_eq!(
            self.header(name),
            Some(expected),
            "header {name} mismatch\n  Headers: {:?}",
            self.headers
        );
        self
    }

    pub fn json_path<T: DeserializeOwned>(&self, path: &str) -> T {
        let root: Value = self.json();
        let value = resolve_path(&root, path);
        serde_json::from_value(value.clone()).unwrap_or_else(|e| {
            panic!("Failed to deserialize JSON path \"{path}\": {e}\n  Value: {value}\n  Body: {root}")
        })
    }

    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        let name: HeaderName = name.as_ref().parse().ok()?;
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json<T: DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body)
            .unwrap_or_else(|e| panic!("Failed to parse JSON: {e}\nBody: {}", self.text()))
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }
}
