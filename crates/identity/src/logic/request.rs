use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use http::{HeaderMap, HeaderName, Uri, header, request::Parts};
use url::Url;

use crate::logic::AuthFlowError;
use crate::logic::state::{Fingerprint, FingerprintPolicy};

pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_PREFIX: HeaderName = HeaderName::from_static("x-forwarded-prefix");

const SCHEME_HTTP: &str = "http";
const SCHEME_HTTPS: &str = "https";

/// The parts of an inbound request the handshake depends on.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub uri: Uri,
    pub headers: HeaderMap,
    pub peer_addr: Option<SocketAddr>,
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(RequestContext {
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            peer_addr: parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr),
        })
    }
}

impl RequestContext {
    /// The `Host` header, falling back to the authority of an absolute URI.
    pub fn host(&self) -> Option<&str> {
        self.header_str(&header::HOST)
            .or_else(|| self.uri.authority().map(|authority| authority.as_str()))
    }

    pub fn user_agent(&self) -> &str {
        self.header_str(&header::USER_AGENT).unwrap_or_default()
    }

    pub fn fingerprint(&self, policy: FingerprintPolicy) -> Fingerprint {
        let client_address = match policy {
            FingerprintPolicy::None => None,
            FingerprintPolicy::ForwardedFor => Some(
                self.headers
                    .get_all(&X_FORWARDED_FOR)
                    .iter()
                    .filter_map(|value| value.to_str().ok())
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            FingerprintPolicy::RemoteAddr => Some(
                self.peer_addr
                    .map(|addr| addr.ip().to_string())
                    .unwrap_or_default(),
            ),
        };

        Fingerprint {
            host: self.host().unwrap_or_default().to_string(),
            user_agent: self.user_agent().to_string(),
            client_address,
        }
    }

    /// Absolute URL the provider should send the browser back to, `endpoint`
    /// resolved against this request's externally visible base URL.
    ///
    /// The scheme is https when the listener terminates TLS or any
    /// `X-Forwarded-Proto` says so; the last `X-Forwarded-Prefix` becomes
    /// the base path.
    pub fn redirect_url(&self, endpoint: &str, tls: bool) -> Result<Url, AuthFlowError> {
        if self.uri.scheme().is_some() && self.uri.authority().is_some() {
            let base = Url::parse(&self.uri.to_string())
                .map_err(|e| AuthFlowError::InvalidRedirect(e.to_string()))?;
            return base
                .join(endpoint)
                .map_err(|e| AuthFlowError::InvalidRedirect(e.to_string()));
        }

        let forwarded_https = self
            .headers
            .get_all(&X_FORWARDED_PROTO)
            .iter()
            .any(|value| value.to_str().is_ok_and(|proto| proto == SCHEME_HTTPS));
        let scheme = if tls || forwarded_https {
            SCHEME_HTTPS
        } else {
            SCHEME_HTTP
        };

        let prefix = self
            .headers
            .get_all(&X_FORWARDED_PREFIX)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .last()
            .unwrap_or_default();
        let separator = if prefix.is_empty() || prefix.starts_with('/') {
            ""
        } else {
            "/"
        };

        let host = self
            .host()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| AuthFlowError::InvalidRedirect("request has no host".to_string()))?;

        Url::parse(&format!("{scheme}://{host}{separator}{prefix}"))
            .and_then(|base| base.join(endpoint))
            .map_err(|e| AuthFlowError::InvalidRedirect(e.to_string()))
    }

    fn header_str(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::fixtures::request_context as context;

    #[test]
    fn test_redirect_url_plain_http() {
        let ctx = context("/", &[("host", "example.com")]);
        assert_eq!(
            ctx.redirect_url("ui", false).unwrap().as_str(),
            "http://example.com/ui"
        );
    }

    #[test]
    fn test_redirect_url_tls_listener() {
        let ctx = context("/", &[("host", "example.com:8443")]);
        assert_eq!(
            ctx.redirect_url("ui", true).unwrap().as_str(),
            "https://example.com:8443/ui"
        );
    }

    #[test]
    fn test_redirect_url_behind_tls_proxy() {
        let ctx = context(
            "/",
            &[
                ("host", "relay.example.org"),
                ("x-forwarded-proto", "http"),
                ("x-forwarded-proto", "https"),
                ("x-forwarded-prefix", "/ignored/"),
                ("x-forwarded-prefix", "/relay/"),
            ],
        );
        assert_eq!(
            ctx.redirect_url("ui", false).unwrap().as_str(),
            "https://relay.example.org/relay/ui"
        );
    }

    #[test]
    fn test_redirect_url_prefix_without_leading_slash() {
        let ctx = context(
            "/",
            &[("host", "example.com"), ("x-forwarded-prefix", "relay/")],
        );
        assert_eq!(
            ctx.redirect_url("ui", false).unwrap().as_str(),
            "http://example.com/relay/ui"
        );
    }

    #[test]
    fn test_redirect_url_absolute_request_uri() {
        let ctx = context("https://proxy.example.org/relay/", &[]);
        assert_eq!(
            ctx.redirect_url("ui", false).unwrap().as_str(),
            "https://proxy.example.org/relay/ui"
        );
    }

    #[test]
    fn test_redirect_url_requires_host() {
        let ctx = context("/", &[]);
        assert!(matches!(
            ctx.redirect_url("ui", false),
            Err(AuthFlowError::InvalidRedirect(_))
        ));
    }

    #[test]
    fn test_fingerprint_policies() {
        let ctx = context(
            "/",
            &[
                ("host", "example.com"),
                ("user-agent", "kubectl-browser"),
                ("x-forwarded-for", "198.51.100.7"),
            ],
        );

        let fp = ctx.fingerprint(FingerprintPolicy::None);
        assert_eq!(fp.host, "example.com");
        assert_eq!(fp.user_agent, "kubectl-browser");
        assert_eq!(fp.client_address, None);

        let fp = ctx.fingerprint(FingerprintPolicy::ForwardedFor);
        assert_eq!(fp.client_address.as_deref(), Some("198.51.100.7"));

        let fp = ctx.fingerprint(FingerprintPolicy::RemoteAddr);
        assert_eq!(fp.client_address.as_deref(), Some("192.0.2.10"));
    }

    #[tokio::test]
    async fn test_extractor_reads_connect_info() {
        let mut request = http::Request::builder()
            .uri("/kubecfg?state=abc")
            .header(header::HOST, "example.com")
            .body(())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo::<SocketAddr>("203.0.113.5:4000".parse().unwrap()));
        let (mut parts, _) = request.into_parts();

        let ctx = RequestContext::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(ctx.host(), Some("example.com"));
        assert_eq!(ctx.uri.query(), Some("state=abc"));
        assert_eq!(ctx.peer_addr, Some("203.0.113.5:4000".parse().unwrap()));
    }
}
