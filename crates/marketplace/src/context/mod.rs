//! Request-scoped context module.
//!
//! Provides the `RequestContext` extractor that bundles the caller identity
//! set by the upstream authentication layer with a request id, complementing
//! the application-scoped `AppState`.

mod extractor;
mod types;

pub use types::RequestContext;
