//! GraphQL client for service-to-service requests.
//!
//! Services call each other's GraphQL endpoints on behalf of the incoming
//! user; [`GraphQLClient::authorize`] forwards the headers and cookies the
//! downstream service needs to authenticate and pass its own CSRF check.
//!
//! ```rust,no_run
//! use axum::http::HeaderMap;
//! use quill_graphql_helpers::client::GraphQLClient;
//!
//! # async fn example(incoming_headers: HeaderMap) -> quill_graphql_helpers::Result<()> {
//! let client = GraphQLClient::new().authorize(&incoming_headers);
//! let response = client
//!     .query("http://partner-library:8002/graphql/", "query { ping }", None, None)
//!     .await?;
//! # Ok(())
//! # }
//! ```

use axum::http::HeaderMap;
use reqwest::header::{HeaderMap as ReqwestHeaderMap, HeaderValue, ACCEPT};
use serde_json::{json, Value};

use crate::{GraphQLError, Result};

/// HTTP client with a GraphQL-specific request method: [`query`].
///
/// [`query`]: GraphQLClient::query
#[derive(Debug, Clone)]
pub struct GraphQLClient {
    http: reqwest::Client,
    headers: ReqwestHeaderMap,
}

impl Default for GraphQLClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphQLClient {
    pub fn new() -> Self {
        let mut headers = ReqwestHeaderMap::new();
        // Always expect JSON responses.
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        Self {
            http: reqwest::Client::new(),
            headers,
        }
    }

    /// Forward authorization material from an incoming request.
    ///
    /// Copies the `Host`, `Referer`, `X-CSRFToken`, and `Cookie` headers onto
    /// every outgoing request. GraphQL requests are `application/json`, so
    /// the CSRF token travels in a header rather than a form field.
    ///
    /// Returns `self` so it can be chained onto the constructor.
    pub fn authorize(mut self, incoming: &HeaderMap) -> Self {
        for name in ["host", "referer", "x-csrftoken", "cookie"] {
            let header = reqwest::header::HeaderName::from_static(name);
            if let Some(value) = incoming.get(name) {
                if let Ok(value) = HeaderValue::from_bytes(value.as_bytes()) {
                    self.headers.insert(header, value);
                }
            }
        }
        self
    }

    /// Remove any headers that were added since construction.
    pub fn reset_authorization(mut self) -> Self {
        let mut headers = ReqwestHeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        self.headers = headers;
        self
    }

    /// Make a POST GraphQL request and return the parsed response.
    ///
    /// Fails if the response is not JSON. HTTP error statuses are not turned
    /// into errors here; GraphQL endpoints report failures in the response
    /// body, which the caller must inspect.
    pub async fn query(
        &self,
        endpoint_url: &str,
        query_str: &str,
        op_name: Option<&str>,
        variables: Option<Value>,
    ) -> Result<Value> {
        let payload = json!({
            "query": query_str,
            "operationName": op_name,
            "variables": variables.unwrap_or_else(|| json!({})),
        });

        let response = self
            .http
            .post(endpoint_url)
            .headers(self.headers.clone())
            .json(&payload)
            .send()
            .await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !content_type.starts_with("application/json") {
            return Err(GraphQLError::Upstream(format!(
                "Expected 'application/json', received '{}'.",
                content_type
            )));
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_authorize_copies_request_headers() {
        let mut incoming = HeaderMap::new();
        incoming.insert("host", "app.example.com".parse().unwrap());
        incoming.insert("referer", "https://app.example.com/".parse().unwrap());
        incoming.insert("x-csrftoken", "token123".parse().unwrap());
        incoming.insert("cookie", "sessionid=abc".parse().unwrap());
        incoming.insert("x-unrelated", "nope".parse().unwrap());

        let client = GraphQLClient::new().authorize(&incoming);
        assert_eq!(client.headers.get("host").unwrap(), "app.example.com");
        assert_eq!(client.headers.get("cookie").unwrap(), "sessionid=abc");
        assert_eq!(client.headers.get("x-csrftoken").unwrap(), "token123");
        assert!(client.headers.get("x-unrelated").is_none());
    }

    #[test]
    fn test_reset_authorization() {
        let mut incoming = HeaderMap::new();
        incoming.insert("cookie", "sessionid=abc".parse().unwrap());
        let client = GraphQLClient::new().authorize(&incoming).reset_authorization();
        assert!(client.headers.get("cookie").is_none());
        assert_eq!(client.headers.get(ACCEPT).unwrap(), "application/json");
    }
}
