//! Interceptor Chain
//!
//! Maps exact request paths to an authorization function that runs before the
//! business handler. A failing check short-circuits the request and writes the
//! error to the response. There is no prefix or pattern matching.

pub mod chain;

pub use chain::{FilterChain, FilterFn, enforce, signed_identity_filter};
