//! Distributed Access Control
//!
//! Shards the per-user authorization decision across nodes with the consistent hash ring.
//!
//! ## Request Flow
//! 1. Extract the `uid`/`sign` cookie pair (deny if either is absent).
//! 2. Ask the ring which node owns the uid (deny if the ring is empty).
//! 3. **Owner is local**: answer from the node-local `AccessRecords` under the configured policy.
//! 4. **Owner is remote**: proxy the cookies to the owner's `/checkRight` and trust only an
//!    HTTP 200 with a body of exactly `true`.
//!
//! Every ambiguity (timeouts, transport errors, unexpected bodies) resolves to denial.

pub mod control;
pub mod handlers;
pub mod protocol;
pub mod records;
pub mod strategy;

pub use control::AccessControl;
pub use records::{AccessPolicy, AccessRecord, AccessRecords};
pub use strategy::{Authority, ClusterAuthority, Dispatch};

#[cfg(test)]
mod tests;
