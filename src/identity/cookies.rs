use super::cipher::SignedIdentity;
use crate::error::AccessError;

use axum::http::{HeaderMap, HeaderValue, header};

pub const COOKIE_UID: &str = "uid";
pub const COOKIE_SIGN: &str = "sign";

/// The `uid` / `sign` cookie pair carried by every protected request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityCookies {
    pub uid: String,
    pub sign: String,
}

impl IdentityCookies {
    /// Mints the cookie pair for `user_id`.
    pub fn issue(identity: &SignedIdentity, user_id: i64) -> Self {
        let uid = user_id.to_string();
        let sign = identity.sign(uid.as_bytes());
        Self { uid, sign }
    }

    /// Extracts both cookies. Either one missing is an authentication failure.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, AccessError> {
        let uid = find_cookie(headers, COOKIE_UID).ok_or(AccessError::MissingCookie(COOKIE_UID))?;
        let sign =
            find_cookie(headers, COOKIE_SIGN).ok_or(AccessError::MissingCookie(COOKIE_SIGN))?;
        Ok(Self { uid, sign })
    }

    /// Checks that `sign` decrypts to exactly `uid`.
    pub fn verify(&self, identity: &SignedIdentity) -> Result<(), AccessError> {
        let plain = identity
            .open(&self.sign)
            .map_err(|_| AccessError::TamperedSignature)?;
        if plain == self.uid.as_bytes() {
            Ok(())
        } else {
            Err(AccessError::IdentityMismatch)
        }
    }

    pub fn user_id(&self) -> Result<i64, AccessError> {
        self.uid
            .parse()
            .map_err(|_| AccessError::InvalidUid(self.uid.clone()))
    }

    /// `Cookie` request header carrying only this pair, for proxied calls.
    pub fn cookie_header(&self) -> String {
        format!("{}={}; {}={}", COOKIE_UID, self.uid, COOKIE_SIGN, self.sign)
    }

    /// `Set-Cookie` header values handed to a browser after login.
    pub fn set_cookie_headers(&self) -> Vec<HeaderValue> {
        [(COOKIE_UID, &self.uid), (COOKIE_SIGN, &self.sign)]
            .into_iter()
            .filter_map(|(name, value)| {
                HeaderValue::from_str(&format!("{}={}; Path=/", name, value)).ok()
            })
            .collect()
    }
}

/// Looks `name` up across every `Cookie` header. Empty values count as absent.
pub fn find_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
