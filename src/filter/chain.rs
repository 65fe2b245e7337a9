use crate::error::AccessError;
use crate::identity::{IdentityCookies, SignedIdentity};

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::sync::Arc;

/// Authorization function run before a handler.
pub type FilterFn = Arc<dyn Fn(&HeaderMap) -> Result<(), AccessError> + Send + Sync>;

#[derive(Default, Clone)]
pub struct FilterChain {
    filters: HashMap<String, FilterFn>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `filter` for exactly `path`. Re-registering a path replaces its filter.
    pub fn register<F>(&mut self, path: &str, filter: F)
    where
        F: Fn(&HeaderMap) -> Result<(), AccessError> + Send + Sync + 'static,
    {
        self.filters.insert(path.to_string(), Arc::new(filter));
        tracing::info!("Registered filter for {}", path);
    }

    pub fn with<F>(mut self, path: &str, filter: F) -> Self
    where
        F: Fn(&HeaderMap) -> Result<(), AccessError> + Send + Sync + 'static,
    {
        self.register(path, filter);
        self
    }

    /// Runs the filter registered for `path`, if any.
    pub fn check(&self, path: &str, headers: &HeaderMap) -> Result<(), AccessError> {
        match self.filters.get(path) {
            Some(filter) => filter(headers),
            None => Ok(()),
        }
    }
}

/// axum middleware: matches on the path only, never on the query string.
pub async fn enforce(
    State(chain): State<Arc<FilterChain>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if let Err(e) = chain.check(&path, request.headers()) {
        tracing::debug!("Filter rejected {}: {}", path, e);
        return e.into_response();
    }
    next.run(request).await
}

/// Filter that requires a `uid`/`sign` pair whose signature opens to the uid.
pub fn signed_identity_filter(
    identity: Arc<SignedIdentity>,
) -> impl Fn(&HeaderMap) -> Result<(), AccessError> + Send + Sync + 'static {
    move |headers: &HeaderMap| {
        let cookies = IdentityCookies::from_headers(headers)?;
        cookies.verify(&identity)
    }
}
