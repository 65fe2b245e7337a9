//! Access Protocol
//!
//! Endpoints and headers shared by every node taking part in distributed authorization.

/// Authorization-only check. Answers `true` / `false` with HTTP 200.
pub const ENDPOINT_CHECK_RIGHT: &str = "/checkRight";

/// Records the caller as a known user on the node that owns it. Called by the login
/// flow once it has issued the identity cookies.
pub const ENDPOINT_REGISTER: &str = "/register";

/// Set on requests proxied to an owner node so they are never proxied a second time.
pub const HOP_HEADER: &str = "x-flash-sale-hop";

pub const BODY_TRUE: &str = "true";
pub const BODY_FALSE: &str = "false";

/// Maps a decision onto the literal response body used on the wire.
pub fn decision_body(granted: bool) -> &'static str {
    if granted { BODY_TRUE } else { BODY_FALSE }
}
