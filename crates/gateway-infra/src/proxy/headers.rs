//! Header rewriting for forwarded requests and relayed responses.

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};

/// Connection-scoped headers that never cross a proxy (RFC 9110 §7.6.1).
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_FORWARDED_HOST: &str = "x-forwarded-host";
pub const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
pub const X_REQUEST_ID: &str = "x-request-id";

/// Whether `name` is hop-by-hop, either by definition or because the
/// message's own `Connection` header lists it.
pub fn is_hop_by_hop(name: &HeaderName, connection_listed: &[String]) -> bool {
    let name = name.as_str();
    HOP_BY_HOP.contains(&name) || connection_listed.iter().any(|listed| listed == name)
}

/// Header names nominated by a `Connection` header, lowercased.
pub fn connection_listed(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Copy end-to-end headers, dropping hop-by-hop ones and anything in `also_drop`.
/// Repeated headers (e.g. `Set-Cookie`) are preserved value by value.
pub fn end_to_end(headers: &HeaderMap, also_drop: &[HeaderName]) -> HeaderMap {
    let listed = connection_listed(headers);
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if is_hop_by_hop(name, &listed) || also_drop.contains(name) {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}

/// Append `addr` to an existing `X-Forwarded-For` chain.
pub fn append_forwarded_for(headers: &mut HeaderMap, addr: &str) {
    let chain = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect::<Vec<_>>()
        .join(", ");

    let chain = if chain.is_empty() {
        addr.to_string()
    } else {
        format!("{chain}, {addr}")
    };

    if let Ok(value) = HeaderValue::from_str(&chain) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

/// Set a header from a string, ignoring values that are not valid header text.
pub fn set_if_valid(headers: &mut HeaderMap, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_hop_by_hop_and_connection_listed() {
        let mut headers = HeaderMap::new();
        headers.insert("connection", HeaderValue::from_static("keep-alive, x-debug"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-debug", HeaderValue::from_static("1"));
        headers.insert("transfer-encoding", HeaderValue::from_static("chunked"));
        headers.insert("authorization", HeaderValue::from_static("Bearer abc"));
        headers.insert("cookie", HeaderValue::from_static("sid=1"));

        let out = end_to_end(&headers, &[]);

        assert_eq!(out.len(), 2);
        assert!(out.contains_key("authorization"));
        assert!(out.contains_key("cookie"));
    }

    #[test]
    fn test_keeps_repeated_set_cookie_values() {
        let mut headers = HeaderMap::new();
        headers.append("set-cookie", HeaderValue::from_static("a=1; HttpOnly"));
        headers.append("set-cookie", HeaderValue::from_static("b=2; Path=/"));
        headers.insert("content-length", HeaderValue::from_static("10"));

        let out = end_to_end(&headers, &[header::CONTENT_LENGTH]);

        assert_eq!(out.get_all("set-cookie").iter().count(), 2);
        assert!(!out.contains_key("content-length"));
    }

    #[test]
    fn test_forwarded_for_chain_is_extended() {
        let mut headers = HeaderMap::new();
        append_forwarded_for(&mut headers, "10.0.0.1");
        assert_eq!(headers[X_FORWARDED_FOR], "10.0.0.1");

        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("203.0.113.9"));
        append_forwarded_for(&mut headers, "10.0.0.1");
        assert_eq!(headers[X_FORWARDED_FOR], "203.0.113.9, 10.0.0.1");
    }
}
