//! Cross-site request forgery protection for the GraphQL endpoint.
//!
//! GraphQL mutations all arrive as POSTs to a single endpoint, outside the
//! scope of any form-level CSRF machinery, so the verification runs here:
//! referer checks for secure requests, then a constant-time comparison of the
//! cookie token against the request-header token.

use axum::http::{HeaderMap, Method};
use url::Url;

use crate::{GraphQLError, Result};

pub const REASON_NO_REFERER: &str = "Referer checking failed - no Referer.";
pub const REASON_BAD_REFERER: &str = "Referer checking failed - {} does not match any trusted origins.";
pub const REASON_NO_CSRF_COOKIE: &str = "CSRF cookie not set.";
pub const REASON_BAD_TOKEN: &str = "CSRF token missing or incorrect.";
pub const REASON_MALFORMED_REFERER: &str = "Referer checking failed - Referer is malformed.";
pub const REASON_INSECURE_REFERER: &str =
    "Referer checking failed - Referer is insecure while host is secure.";

const CSRF_TOKEN_LENGTHS: [usize; 2] = [32, 64];

/// CSRF verification settings for one service.
#[derive(Debug, Clone)]
pub struct CsrfConfig {
    /// Cookie holding the CSRF token.
    pub cookie_name: String,
    /// Header carrying the request token (JSON requests cannot use a form
    /// field, so the token always travels in a header here).
    pub header_name: String,
    /// When set, referers are matched against this domain instead of the
    /// request host. A leading dot allows subdomains.
    pub cookie_domain: Option<String>,
    /// Additional origins whose referers are accepted.
    pub trusted_origins: Vec<String>,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            cookie_name: "csrftoken".to_string(),
            header_name: "x-csrftoken".to_string(),
            cookie_domain: None,
            trusted_origins: Vec::new(),
        }
    }
}

/// Verify a request's CSRF credentials.
///
/// Methods defined as safe by RFC 7231 (GET, HEAD, OPTIONS, TRACE) pass
/// without checks. `secure` says whether the request arrived over HTTPS;
/// secure requests additionally require an HTTPS referer matching the
/// trusted origins.
pub fn csrf_check(
    config: &CsrfConfig,
    method: &Method,
    headers: &HeaderMap,
    secure: bool,
) -> Result<()> {
    let csrf_token = cookie_value(headers, &config.cookie_name).and_then(sanitize_token);

    if matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE) {
        return Ok(());
    }

    if secure {
        check_referer(config, headers)?;
    }

    // For unsafe requests we insist on a CSRF cookie; this blocks all CSRF
    // attacks, including login CSRF.
    let csrf_token = match csrf_token {
        Some(token) => token,
        None => return Err(GraphQLError::Csrf(REASON_NO_CSRF_COOKIE.to_string())),
    };

    let request_csrf_token = headers
        .get(config.header_name.as_str())
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if !constant_time_compare(request_csrf_token.as_bytes(), csrf_token.as_bytes()) {
        return Err(GraphQLError::Csrf(REASON_BAD_TOKEN.to_string()));
    }

    Ok(())
}

fn check_referer(config: &CsrfConfig, headers: &HeaderMap) -> Result<()> {
    let referer = headers
        .get(axum::http::header::REFERER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| GraphQLError::Csrf(REASON_NO_REFERER.to_string()))?;

    let referer = Url::parse(referer)
        .map_err(|_| GraphQLError::Csrf(REASON_MALFORMED_REFERER.to_string()))?;

    let referer_host = referer
        .host_str()
        .ok_or_else(|| GraphQLError::Csrf(REASON_MALFORMED_REFERER.to_string()))?;

    // The referer must be secure as well.
    if referer.scheme() != "https" {
        return Err(GraphQLError::Csrf(REASON_INSECURE_REFERER.to_string()));
    }

    let referer_netloc = match referer.port() {
        Some(port) => format!("{}:{}", referer_host, port),
        None => referer_host.to_string(),
    };

    // Without a cookie domain we need an exact match on host:port; with one,
    // we obey the cookie rules instead.
    let request_host = headers
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let good_referer = match &config.cookie_domain {
        None => request_host.to_string(),
        Some(domain) => {
            let server_port = request_host.rsplit_once(':').map(|(_, port)| port);
            match server_port {
                Some(port) if port != "443" && port != "80" => format!("{}:{}", domain, port),
                _ => domain.clone(),
            }
        }
    };

    let mut good_hosts: Vec<&str> = config.trusted_origins.iter().map(String::as_str).collect();
    good_hosts.push(&good_referer);

    if !good_hosts.iter().any(|host| is_same_domain(&referer_netloc, host)) {
        let reason = REASON_BAD_REFERER.replace("{}", referer.as_str());
        return Err(GraphQLError::Csrf(reason));
    }

    Ok(())
}

/// Extract a cookie value from the `Cookie` header(s).
fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    for header in headers.get_all(axum::http::header::COOKIE) {
        let raw = header.to_str().ok()?;
        for pair in raw.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            let key = parts.next()?.trim();
            if key == name {
                return Some(parts.next().unwrap_or("").trim().to_string());
            }
        }
    }
    None
}

/// A token is only accepted when it has a valid length and alphabet;
/// anything else is treated as missing.
fn sanitize_token(token: String) -> Option<String> {
    if CSRF_TOKEN_LENGTHS.contains(&token.len())
        && token.bytes().all(|b| b.is_ascii_alphanumeric())
    {
        Some(token)
    } else {
        None
    }
}

/// Compare two byte strings without leaking where they differ.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Match `host` against a domain pattern. A pattern with a leading dot
/// matches the domain itself and any subdomain.
fn is_same_domain(host: &str, pattern: &str) -> bool {
    if pattern.is_empty() {
        return false;
    }
    let host = host.to_ascii_lowercase();
    let pattern = pattern.to_ascii_lowercase();
    if let Some(bare) = pattern.strip_prefix('.') {
        host == bare || host.ends_with(&pattern)
    } else {
        host == pattern
    }
}
