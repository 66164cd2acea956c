//! Request handling and transformation.
//!
//! # Responsibilities
//! - Read the request ID assigned at the edge
//! - Rewrite the request URI onto a service target
//! - Prepare request headers for forwarding to the backend
//!
//! # Design Decisions
//! - Only scheme and authority change; path and query are preserved
//! - `Host` is not copied, the client derives it from the target
//! - Any path component of the target is ignored

use axum::http::{header, uri::PathAndQuery, HeaderMap, HeaderName, Uri};

use crate::http::response::GatewayError;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// The request ID header value, if present and printable.
pub fn request_id(headers: &HeaderMap) -> Option<&str> {
    headers.get(X_REQUEST_ID).and_then(|v| v.to_str().ok())
}

/// Point `original` at `target`, keeping its path and query.
pub fn upstream_uri(target: &str, original: &Uri) -> Result<Uri, GatewayError> {
    let target: Uri = target
        .parse()
        .map_err(|e| GatewayError::Configuration(format!("invalid target url '{}': {}", target, e)))?;

    let (Some(scheme), Some(authority)) = (target.scheme().cloned(), target.authority().cloned())
    else {
        return Err(GatewayError::Configuration(format!(
            "target url '{}' needs a scheme and host",
            target
        )));
    };

    let path_and_query = original
        .path_and_query()
        .cloned()
        .unwrap_or_else(|| PathAndQuery::from_static("/"));

    Uri::builder()
        .scheme(scheme)
        .authority(authority)
        .path_and_query(path_and_query)
        .build()
        .map_err(|e| GatewayError::Configuration(e.to_string()))
}

/// Inbound headers minus `Host`.
pub fn forwarded_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut headers = inbound.clone();
    headers.remove(header::HOST);
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_upstream_uri_keeps_path_and_query() {
        let original: Uri = "/api/users/42?expand=orders&x=1".parse().unwrap();
        let uri = upstream_uri("http://10.0.0.5:8081", &original).unwrap();
        assert_eq!(uri.to_string(), "http://10.0.0.5:8081/api/users/42?expand=orders&x=1");
    }

    #[test]
    fn test_upstream_uri_ignores_target_path() {
        let original: Uri = "/api/orders".parse().unwrap();
        let uri = upstream_uri("https://orders.internal/base/", &original).unwrap();
        assert_eq!(uri.to_string(), "https://orders.internal/api/orders");
    }

    #[test]
    fn test_absolute_inbound_uri_is_rewritten() {
        let original: Uri = "http://gateway.example/api?q=1".parse().unwrap();
        let uri = upstream_uri("http://backend:9000", &original).unwrap();
        assert_eq!(uri.to_string(), "http://backend:9000/api?q=1");
    }

    #[test]
    fn test_malformed_targets() {
        let original: Uri = "/api".parse().unwrap();
        for target in ["not a url", "/relative/only", ""] {
            assert!(
                matches!(upstream_uri(target, &original), Err(GatewayError::Configuration(_))),
                "target {:?} should be rejected",
                target
            );
        }
    }

    #[test]
    fn test_forwarded_headers_drop_host() {
        let mut inbound = HeaderMap::new();
        inbound.insert(header::HOST, HeaderValue::from_static("gateway.example"));
        inbound.insert("x-custom", HeaderValue::from_static("v"));
        inbound.append("accept", HeaderValue::from_static("text/plain"));
        inbound.append("accept", HeaderValue::from_static("application/json"));

        let headers = forwarded_headers(&inbound);
        assert!(headers.get(header::HOST).is_none());
        assert_eq!(headers["x-custom"], "v");
        assert_eq!(headers.get_all("accept").iter().count(), 2);
    }

    #[test]
    fn test_request_id() {
        let mut headers = HeaderMap::new();
        assert_eq!(request_id(&headers), None);
        headers.insert(X_REQUEST_ID, HeaderValue::from_static("abc"));
        assert_eq!(request_id(&headers), Some("abc"));
    }
}
