//! Distributed Flash-Sale Backend Library
//!
//! This library crate defines the core modules of the flash-sale cluster.
//! It serves as the foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! A purchase request crosses the subsystems in this order:
//!
//! - **`filter`**: Exact-path interceptor chain. Rejects requests without a valid signed
//!   identity before any handler runs.
//! - **`identity`**: AES-CBC signed `uid`/`sign` cookie pair.
//! - **`ring`**: Consistent hash ring with virtual replicas. Decides which node owns a user.
//! - **`access`**: Distributed authorization. Answers locally for owned users and proxies
//!   to the owner otherwise, failing closed on any doubt.
//! - **`admission`**: The inventory gate. A single serialized counter that never grants
//!   more than the configured capacity.
//! - **`pipeline`**: Asynchronous order intake: producer, broker, and the consumer that
//!   persists orders with at-least-once delivery and idempotent effects.
//! - **`purchase`**: The `/check` endpoint tying all of the above together.
//!
//! `config`, `error` and `server` hold process configuration, the error taxonomy and the
//! per-role HTTP routers.

pub mod access;
pub mod admission;
pub mod config;
pub mod error;
pub mod filter;
pub mod identity;
pub mod pipeline;
pub mod purchase;
pub mod ring;
pub mod server;
