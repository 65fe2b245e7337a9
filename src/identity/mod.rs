//! Signed Identity
//!
//! Stateless, tamper-evident user identity carried in two cookies:
//! `uid` (plain decimal user id) and `sign` (base64 AES-CBC encryption of the same id).
//! Any node holding the shared key can verify a request without a session store.

pub mod cipher;
pub mod cookies;

pub use cipher::{IvMode, SignedIdentity};
pub use cookies::{COOKIE_SIGN, COOKIE_UID, IdentityCookies};

#[cfg(test)]
mod tests;
