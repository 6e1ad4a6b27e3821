//! HTTP forwarder - relays one request to an upstream and hands back its response.

use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use reqwest::header::{self, HeaderMap};
use reqwest::{Client, Method, StatusCode, Url};

use super::ProxyError;
use super::headers::{
    X_FORWARDED_HOST, X_FORWARDED_PROTO, X_REQUEST_ID, append_forwarded_for, end_to_end,
    set_if_valid,
};

/// Forwarder configuration.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Upper bound for the whole upstream exchange, headers and body.
    pub timeout: Duration,
    /// Upper bound for establishing the upstream connection.
    pub connect_timeout: Duration,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl ProxyConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            timeout: std::env::var("UPSTREAM_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            connect_timeout: std::env::var("UPSTREAM_CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
        }
    }
}

/// An inbound request, already detached from the web framework.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub method: Method,
    /// Path plus optional `?query`, exactly as received.
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Address of the socket peer, appended to `X-Forwarded-For`.
    pub peer_addr: Option<String>,
    /// `Host` the client asked for.
    pub host: Option<String>,
    /// Scheme the client connected with.
    pub scheme: String,
    pub request_id: Option<String>,
}

/// Upstream answer with connection-scoped headers already removed.
pub struct UpstreamResponse {
    status: StatusCode,
    headers: HeaderMap,
    content_length: Option<u64>,
    inner: reqwest::Response,
}

impl UpstreamResponse {
    pub fn status(&self) -> u16 {
        self.status.as_u16()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Body length announced by the upstream, if any.
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Stream the body without buffering it.
    pub fn into_body_stream(self) -> impl Stream<Item = Result<Bytes, reqwest::Error>> + 'static {
        self.inner.bytes_stream()
    }

    /// Buffer the whole body.
    pub async fn bytes(self) -> Result<Bytes, reqwest::Error> {
        self.inner.bytes().await
    }
}

/// Relays requests to upstream services over a pooled HTTP client.
///
/// Holds no per-upstream state between requests. Redirects are relayed to the
/// client, never followed, and nothing is retried.
#[derive(Clone)]
pub struct ProxyForwarder {
    client: Client,
}

impl ProxyForwarder {
    pub fn new(config: &ProxyConfig) -> Result<Self, ProxyError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(ProxyError::Client)?;

        Ok(Self { client })
    }

    /// Parse an upstream base URL, rejecting anything that is not http(s).
    pub fn parse_upstream(base_url: &str) -> Result<Url, ProxyError> {
        let url = Url::parse(base_url)
            .map_err(|_| ProxyError::InvalidUpstream(base_url.to_string()))?;
        match url.scheme() {
            "http" | "https" if url.host().is_some() => Ok(url),
            _ => Err(ProxyError::InvalidUpstream(base_url.to_string())),
        }
    }

    /// Join the inbound path and query onto the upstream base URL.
    pub fn target_url(base_url: &str, path_and_query: &str) -> Result<Url, ProxyError> {
        let base = Self::parse_upstream(base_url)?;
        let mut joined = base.as_str().trim_end_matches('/').to_string();
        if !path_and_query.starts_with('/') {
            joined.push('/');
        }
        joined.push_str(path_and_query);
        Url::parse(&joined).map_err(|_| ProxyError::InvalidUpstream(joined))
    }

    /// Forward `request` to `base_url` and return the upstream's response.
    pub async fn forward(
        &self,
        request: ForwardRequest,
        base_url: &str,
    ) -> Result<UpstreamResponse, ProxyError> {
        let url = Self::target_url(base_url, &request.path_and_query)?;

        let mut headers = end_to_end(&request.headers, &[header::HOST, header::CONTENT_LENGTH]);
        if let Some(peer) = request.peer_addr.as_deref() {
            append_forwarded_for(&mut headers, peer);
        }
        if let Some(host) = request.host.as_deref() {
            set_if_valid(&mut headers, X_FORWARDED_HOST, host);
        }
        set_if_valid(&mut headers, X_FORWARDED_PROTO, &request.scheme);
        if let Some(id) = request.request_id.as_deref() {
            set_if_valid(&mut headers, X_REQUEST_ID, id);
        }

        tracing::debug!(
            method = %request.method,
            upstream = %url,
            body_bytes = request.body.len(),
            "Forwarding request"
        );

        let response = self
            .client
            .request(request.method, url)
            .headers(headers)
            .body(request.body)
            .send()
            .await
            .map_err(|e| ProxyError::from_transport(base_url, e))?;

        let status = response.status();
        // The header survives HEAD responses, where the body itself is empty.
        let content_length = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok())
            .or_else(|| response.content_length());
        let headers = end_to_end(response.headers(), &[header::CONTENT_LENGTH]);

        Ok(UpstreamResponse {
            status,
            headers,
            content_length,
            inner: response,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, HttpRequest, HttpResponse, HttpServer, web};
    use reqwest::header::HeaderValue;
    use std::collections::HashMap;
    use std::net::SocketAddr;

    async fn echo(req: HttpRequest, body: web::Bytes) -> HttpResponse {
        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        };

        HttpResponse::Created()
            .append_header(("set-cookie", "a=1; HttpOnly"))
            .append_header(("set-cookie", "b=2"))
            .append_header(("connection", "close"))
            .json(fields(&[
                ("method", Some(req.method().to_string())),
                ("path", Some(req.path().to_string())),
                ("query", Some(req.query_string().to_string())),
                ("body", Some(String::from_utf8_lossy(&body).into_owned())),
                ("cookie", header("cookie")),
                ("xff", header("x-forwarded-for")),
                ("xfh", header("x-forwarded-host")),
                ("xfp", header("x-forwarded-proto")),
                ("rid", header("x-request-id")),
                ("upgrade", header("upgrade")),
                ("host", header("host")),
            ]))
    }

    fn fields(pairs: &[(&str, Option<String>)]) -> HashMap<String, Option<String>> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    async fn slow() -> HttpResponse {
        tokio::time::sleep(Duration::from_secs(2)).await;
        HttpResponse::Ok().finish()
    }

    async fn spawn_upstream() -> SocketAddr {
        let server = HttpServer::new(|| {
            App::new()
                .route("/slow", web::get().to(slow))
                .default_service(web::to(echo))
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();
        let addr = server.addrs()[0];
        actix_rt::spawn(server.run());
        addr
    }

    fn request(method: Method, path_and_query: &str) -> ForwardRequest {
        ForwardRequest {
            method,
            path_and_query: path_and_query.to_string(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            peer_addr: Some("10.0.0.1".to_string()),
            host: Some("gateway.example".to_string()),
            scheme: "http".to_string(),
            request_id: Some("req-42".to_string()),
        }
    }

    #[test]
    fn test_target_url_keeps_base_path_and_query() {
        let url = ProxyForwarder::target_url("http://svc:6000/v1/", "/orders?page=2").unwrap();
        assert_eq!(url.as_str(), "http://svc:6000/v1/orders?page=2");

        let url = ProxyForwarder::target_url("http://svc:6000", "/").unwrap();
        assert_eq!(url.as_str(), "http://svc:6000/");
    }

    #[test]
    fn test_parse_upstream_rejects_other_schemes() {
        assert!(ProxyForwarder::parse_upstream("ftp://files").is_err());
        assert!(ProxyForwarder::parse_upstream("not a url").is_err());
        assert!(ProxyForwarder::parse_upstream("http://localhost:99999").is_err());
        assert!(ProxyForwarder::parse_upstream("https://auth.internal").is_ok());
    }

    #[actix_web::test]
    async fn test_forwards_method_path_body_and_headers() {
        let addr = spawn_upstream().await;
        let forwarder = ProxyForwarder::new(&ProxyConfig::default()).unwrap();

        let mut req = request(Method::POST, "/api/orders?page=2");
        req.body = Bytes::from_static(br#"{"sku":"coal-25kg"}"#);
        req.headers.insert("cookie", HeaderValue::from_static("sid=abc"));
        req.headers.insert("upgrade", HeaderValue::from_static("websocket"));
        req.headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9"));

        let res = forwarder
            .forward(req, &format!("http://{addr}"))
            .await
            .unwrap();

        assert_eq!(res.status(), 201);
        assert_eq!(res.headers().get_all("set-cookie").iter().count(), 2);
        assert!(!res.headers().contains_key("connection"));

        let body: HashMap<String, Option<String>> =
            serde_json::from_slice(&res.bytes().await.unwrap()).unwrap();
        let field = |k: &str| body[k].clone();
        assert_eq!(field("method").as_deref(), Some("POST"));
        assert_eq!(field("path").as_deref(), Some("/api/orders"));
        assert_eq!(field("query").as_deref(), Some("page=2"));
        assert_eq!(field("body").as_deref(), Some(r#"{"sku":"coal-25kg"}"#));
        assert_eq!(field("cookie").as_deref(), Some("sid=abc"));
        assert_eq!(field("xff").as_deref(), Some("203.0.113.9, 10.0.0.1"));
        assert_eq!(field("xfh").as_deref(), Some("gateway.example"));
        assert_eq!(field("xfp").as_deref(), Some("http"));
        assert_eq!(field("rid").as_deref(), Some("req-42"));
        assert_eq!(field("upgrade"), None);
        assert_eq!(field("host"), Some(addr.to_string()));
    }

    #[actix_web::test]
    async fn test_head_keeps_announced_length() {
        let addr = spawn_upstream().await;
        let forwarder = ProxyForwarder::new(&ProxyConfig::default()).unwrap();

        let res = forwarder
            .forward(request(Method::HEAD, "/orders"), &format!("http://{addr}"))
            .await
            .unwrap();

        assert!(res.content_length().is_some_and(|length| length > 0));
        assert!(res.bytes().await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_unreachable_upstream_is_reported() {
        let forwarder = ProxyForwarder::new(&ProxyConfig::default()).unwrap();

        let err = forwarder
            .forward(request(Method::GET, "/"), "http://127.0.0.1:1")
            .await
            .err()
            .unwrap();

        assert!(matches!(err, ProxyError::Unreachable { .. }));
    }

    #[actix_web::test]
    async fn test_slow_upstream_times_out() {
        let addr = spawn_upstream().await;
        let forwarder = ProxyForwarder::new(&ProxyConfig {
            timeout: Duration::from_millis(200),
            connect_timeout: Duration::from_secs(1),
        })
        .unwrap();

        let err = forwarder
            .forward(request(Method::GET, "/slow"), &format!("http://{addr}"))
            .await
            .err()
            .unwrap();

        assert!(matches!(err, ProxyError::Timeout { .. }));
    }
}
