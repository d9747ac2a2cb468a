//! Forwarded-header trust.
//!
//! In `Direct` mode the TCP peer is the client and `X-Forwarded-*` headers
//! are ignored. In `Proxied` mode they are honored only when the peer sits in
//! one of the configured networks. Only the right-most value of each header
//! is read, which is the one appended by the proxy we actually talk to.

use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::{ConnectInfo, Request};
use axum::http::{header, HeaderMap, HeaderName};
use ipnet::IpNet;
use tower::{Layer, Service};

use crate::config::AppConfig;

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Direct,
    Proxied,
}

/// Which peers may rewrite the client address and scheme.
#[derive(Debug, Clone)]
pub struct ForwardedHeadersPolicy {
    mode: TransportMode,
    known_networks: Vec<IpNet>,
}

/// Client-facing transport details for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTransport {
    pub scheme: String,
    pub host: Option<String>,
    pub client_ip: Option<IpAddr>,
    /// Whether any forwarded header was applied.
    pub forwarded: bool,
}

impl ForwardedHeadersPolicy {
    #[must_use]
    pub fn direct() -> Self {
        Self {
            mode: TransportMode::Direct,
            known_networks: Vec::new(),
        }
    }

    /// An empty `known_networks` trusts nobody.
    #[must_use]
    pub fn proxied(known_networks: Vec<IpNet>) -> Self {
        Self {
            mode: TransportMode::Proxied,
            known_networks,
        }
    }

    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        if config.running_in_container {
            Self::proxied(config.known_networks.clone())
        } else {
            Self::direct()
        }
    }

    #[must_use]
    pub fn mode(&self) -> TransportMode {
        self.mode
    }

    #[must_use]
    pub fn is_trusted(&self, peer: IpAddr) -> bool {
        let peer = peer.to_canonical();
        self.mode == TransportMode::Proxied && self.known_networks.iter().any(|n| n.contains(&peer))
    }

    /// Works out scheme, host and client address from the peer and headers.
    #[must_use]
    pub fn resolve(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> ResolvedTransport {
        let mut resolved = ResolvedTransport {
            scheme: "http".to_string(),
            host: headers
                .get(header::HOST)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            client_ip: peer.map(|p| p.ip().to_canonical()),
            forwarded: false,
        };

        let Some(peer) = peer else {
            return resolved;
        };
        if !self.is_trusted(peer.ip()) {
            return resolved;
        }

        if let Some(ip) = last_value(headers, &X_FORWARDED_FOR).and_then(parse_forwarded_ip) {
            resolved.client_ip = Some(ip);
            resolved.forwarded = true;
        }
        if let Some(proto) = last_value(headers, &X_FORWARDED_PROTO) {
            let proto = proto.to_ascii_lowercase();
            if proto == "http" || proto == "https" {
                resolved.scheme = proto;
                resolved.forwarded = true;
            }
        }
        resolved
    }
}

/// Right-most comma separated element across all instances of `name`.
fn last_value<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .next_back()
}

fn parse_forwarded_ip(value: &str) -> Option<IpAddr> {
    value
        .parse::<IpAddr>()
        .ok()
        .or_else(|| value.parse::<SocketAddr>().ok().map(|s| s.ip()))
}

// ---------------------------------------------------------------------------
// ForwardedHeadersLayer
// ---------------------------------------------------------------------------

/// Inserts a [`ResolvedTransport`] into every request's extensions.
#[derive(Debug, Clone)]
pub struct ForwardedHeadersLayer {
    policy: Arc<ForwardedHeadersPolicy>,
}

impl ForwardedHeadersLayer {
    #[must_use]
    pub fn new(policy: Arc<ForwardedHeadersPolicy>) -> Self {
        Self { policy }
    }
}

impl<S> Layer<S> for ForwardedHeadersLayer {
    type Service = ForwardedHeadersService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ForwardedHeadersService {
            inner,
            policy: Arc::clone(&self.policy),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ForwardedHeadersService<S> {
    inner: S,
    policy: Arc<ForwardedHeadersPolicy>,
}

impl<S> Service<Request> for ForwardedHeadersService<S>
where
    S: Service<Request> + Send,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<S::Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let transport = self.policy.resolve(req.headers(), peer);
        req.extensions_mut().insert(transport);
        Box::pin(self.inner.call(req))
    }
}
