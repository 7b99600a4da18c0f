//! Boundary to the upstream video catalog.
//!
//! The acquisition layer does not speak the platform's wire protocol itself;
//! it constructs catalog clients and validates them. The [`Catalog`] trait is
//! that seam: `connect` builds a handle lazily (no network), and reading a
//! handle's title forces the remote handshake. Failures come back as typed
//! [`CatalogError`] values so the retry loop can branch on the rate-limit
//! discriminant directly.

mod youtube;

pub use youtube::{YoutubeCatalog, YoutubeHandle};

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

/// Error classification at the catalog boundary.
///
/// The only discriminant the retry loop cares about is rate limiting;
/// everything else (network, parse, unavailable content) is retried the
/// same way.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Upstream signalled a request quota (HTTP 429 equivalent).
    #[error("rate limited by upstream (HTTP 429)")]
    RateLimited,

    /// The request itself failed (connect, TLS, timeout).
    #[error("upstream request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// Upstream responded but the payload could not be parsed.
    #[error("could not parse upstream response: {0}")]
    Parse(String),

    /// The content exists but cannot be served (private, removed, blocked).
    #[error("content unavailable: {0}")]
    Unavailable(String),
}

impl CatalogError {
    /// Whether this failure is the upstream rate-limit signal.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, CatalogError::RateLimited)
    }
}

/// A per-call proxy descriptor handed to client construction.
///
/// The URL already carries `user:pass@` in the authority when the egress
/// option has credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyDescriptor {
    pub url: String,
}

impl ProxyDescriptor {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Parameters for constructing a catalog client handle.
#[derive(Debug, Clone, Copy)]
pub struct ConnectRequest<'a> {
    /// The watch URL being acquired.
    pub identifier: &'a str,
    /// Whether to authenticate against the upstream (OAuth token cache).
    pub auth: bool,
    /// Token cache directory, only meaningful when `auth` is set.
    pub cache_dir: Option<&'a Path>,
    /// Per-call proxy. `None` for direct egress and for Tor, where routing
    /// is handled by the process-wide transport switch instead.
    pub proxy: Option<&'a ProxyDescriptor>,
}

/// Factory for catalog client handles.
#[async_trait]
pub trait Catalog: Send + Sync {
    type Handle: CatalogHandle;

    /// Construct a handle. Construction is lazy and must not touch the
    /// network; failures surface on the first property read.
    async fn connect(&self, request: ConnectRequest<'_>) -> Result<Self::Handle, CatalogError>;
}

#[async_trait]
impl<C: Catalog + ?Sized> Catalog for std::sync::Arc<C> {
    type Handle = C::Handle;

    async fn connect(&self, request: ConnectRequest<'_>) -> Result<Self::Handle, CatalogError> {
        (**self).connect(request).await
    }
}

/// A constructed client handle whose remote handshake is forced on demand.
#[async_trait]
pub trait CatalogHandle: Send {
    /// Read the resource title, forcing the remote handshake on first call.
    async fn title(&mut self) -> Result<String, CatalogError>;
}
