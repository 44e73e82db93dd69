// ABOUTME: Axum HTTP testing utilities for integration tests
// ABOUTME: Builds requests and executes them against routers without a live server

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde::Serialize;
use tower::ServiceExt;

/// Helper to build and execute HTTP requests against axum routers
pub struct AxumTestRequest {
    method: Method,
    uri: String,
    headers: Vec<(String, String)>,
    body: Option<String>,
}

impl AxumTestRequest {
    pub fn get(uri: &str) -> Self {
        Self::new(Method::GET, uri)
    }

    pub fn post(uri: &str) -> Self {
        Self::new(Method::POST, uri)
    }

    pub fn patch(uri: &str) -> Self {
        Self::new(Method::PATCH, uri)
    }

    pub fn delete(uri: &str) -> Self {
        Self::new(Method::DELETE, uri)
    }

    fn new(method: Method, uri: &str) -> Self {
        Self {
            method,
            uri: uri.to_owned(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Add a bearer token to the request
    pub fn bearer(self, token: &str) -> Self {
        self.header("authorization", &format!("Bearer {token}"))
    }

    /// Add a header to the request
    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.push((key.to_owned(), value.to_owned()));
        self
    }

    /// Add a JSON body to the request
    pub fn json<T: Serialize>(mut self, data: &T) -> Self {
        self.body = Some(serde_json::to_string(data).expect("Failed to serialize JSON"));
        self.headers.push((
            header::CONTENT_TYPE.as_str().to_owned(),
            "application/json".to_owned(),
        ));
        self
    }

    /// Execute the request and eagerly read the whole response body
    ///
    /// Caption streams are finite (they always end with a `done` event),
    /// so SSE responses can be read to completion here too.
    pub async fn send(self, app: Router) -> AxumTestResponse {
        let mut builder = Request::builder().method(self.method).uri(self.uri);
        for (key, value) in self.headers {
            builder = builder.header(key, value);
        }

        let request = builder
            .body(Body::from(self.body.unwrap_or_default()))
            .expect("Failed to build request");
        let response = app
            .oneshot(request)
            .await
            .expect("Failed to execute request");

        AxumTestResponse::from_response(response).await
    }
}

/// Wrapper around an axum HTTP response for testing
pub struct AxumTestResponse {
    status: StatusCode,
    content_type: Option<String>,
    content_disposition: Option<String>,
    body: Vec<u8>,
}

impl AxumTestResponse {
    async fn from_response(response: axum::http::Response<Body>) -> Self {
        use axum::body::to_bytes;

        let status = response.status();
        let header_string = |name| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(ToOwned::to_owned)
        };
        let content_type = header_string(header::CONTENT_TYPE);
        let content_disposition = header_string(header::CONTENT_DISPOSITION);

        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read response body")
            .to_vec();
        Self {
            status,
            content_type,
            content_disposition,
            body,
        }
    }

    pub const fn status(&self) -> u16 {
        self.status.as_u16()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn content_disposition(&self) -> Option<&str> {
        self.content_disposition.as_deref()
    }

    /// Response body as a JSON value
    pub fn json(self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("Failed to deserialize JSON response")
    }

    /// Response body as a string
    pub fn text(self) -> String {
        String::from_utf8(self.body).expect("Failed to decode response as UTF-8")
    }

    /// Parse an SSE body into `(event, data)` pairs
    pub fn sse_events(self) -> Vec<(String, serde_json::Value)> {
        let text = self.text();
        let mut events = Vec::new();
        let mut current_event: Option<String> = None;

        for line in text.lines() {
            if let Some(name) = line.strip_prefix("event: ") {
                current_event = Some(name.trim().to_owned());
            } else if let Some(data) = line.strip_prefix("data: ") {
                let event = current_event.take().unwrap_or_else(|| "message".to_owned());
                let value = serde_json::from_str(data.trim())
                    .unwrap_or_else(|_| serde_json::Value::String(data.trim().to_owned()));
                events.push((event, value));
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;

    #[tokio::test]
    async fn get_request_round_trips() {
        let app = Router::new().route("/test", get(|| async { "Hello" }));
        let response = AxumTestRequest::get("/test").send(app).await;
        assert_eq!(response.status(), 200);
        assert_eq!(response.text(), "Hello");
    }
}
