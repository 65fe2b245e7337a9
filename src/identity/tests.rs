//! Identity Module Tests
//!
//! ## Test Scopes
//! - **Cipher**: sign/verify round-trips for every key size and IV mode.
//! - **Tamper evidence**: every single-character mutation of a token is rejected.
//! - **Cookies**: extraction from `Cookie` headers and pair verification.

#[cfg(test)]
mod tests {
    use crate::error::{AccessError, IdentityError};
    use crate::identity::cookies::find_cookie;
    use crate::identity::{IdentityCookies, IvMode, SignedIdentity};
    use axum::http::{HeaderMap, HeaderValue, header};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const KEY_128: &[u8] = b"0123456789abcdef";
    const KEY_192: &[u8] = b"0123456789abcdef01234567";
    const KEY_256: &[u8] = b"0123456789abcdef0123456789abcdef";
    const B64_ALPHABET: &[u8] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

    fn identities() -> Vec<SignedIdentity> {
        let mut out = Vec::new();
        for key in [KEY_128, KEY_192, KEY_256] {
            for mode in [IvMode::KeyAsIv, IvMode::Random] {
                out.push(SignedIdentity::new(key, mode).unwrap());
            }
        }
        out
    }

    // ============================================================
    // CIPHER
    // ============================================================

    #[test]
    fn test_rejects_bad_key_length() {
        let err = SignedIdentity::new(b"short".to_vec(), IvMode::Random).unwrap_err();
        assert_eq!(err, IdentityError::InvalidKeyLength(5));
    }

    #[test]
    fn test_round_trip_random_byte_strings() {
        let mut rng = StdRng::seed_from_u64(7);

        for identity in identities() {
            // Covers empty input and exact block multiples.
            for len in [0usize, 1, 15, 16, 17, 31, 32, 100] {
                let bytes: Vec<u8> = (0..len).map(|_| rng.gen_range(0..=255u8)).collect();
                let token = identity.sign(&bytes);
                assert!(
                    identity.verify(&bytes, &token),
                    "{:?} failed for length {}",
                    identity,
                    len
                );
            }
        }
    }

    #[test]
    fn test_compat_mode_is_deterministic() {
        let identity = SignedIdentity::new(KEY_128, IvMode::KeyAsIv).unwrap();
        assert_eq!(identity.sign(b"1001"), identity.sign(b"1001"));
    }

    #[test]
    fn test_random_mode_uses_fresh_iv() {
        let identity = SignedIdentity::new(KEY_128, IvMode::Random).unwrap();
        let a = identity.sign(b"1001");
        let b = identity.sign(b"1001");
        assert_ne!(a, b, "Two tokens for the same id should differ");
        assert!(identity.verify(b"1001", &a));
        assert!(identity.verify(b"1001", &b));
    }

    #[test]
    fn test_wrong_id_is_rejected() {
        for identity in identities() {
            let token = identity.sign(b"1001");
            assert!(!identity.verify(b"1002", &token));
            assert!(!identity.verify(b"", &token));
        }
    }

    #[test]
    fn test_other_key_cannot_verify() {
        let ours = SignedIdentity::new(KEY_128, IvMode::KeyAsIv).unwrap();
        let theirs = SignedIdentity::new(b"fedcba9876543210".to_vec(), IvMode::KeyAsIv).unwrap();
        let token = theirs.sign(b"1001");
        assert!(!ours.verify(b"1001", &token));
    }

    #[test]
    fn test_garbage_tokens_do_not_panic() {
        let identity = SignedIdentity::new(KEY_128, IvMode::Random).unwrap();
        for token in ["", "====", "not base64!", "AAAA", "QUJD", "AAAAAAAAAAAAAAAAAAAAAA=="] {
            assert!(!identity.verify(b"1", token), "accepted {:?}", token);
        }
        assert_eq!(identity.open("%%%"), Err(IdentityError::Decode));
    }

    // ============================================================
    // TAMPER EVIDENCE
    // ============================================================

    #[test]
    fn test_every_single_character_mutation_is_rejected() {
        for identity in identities() {
            let id = b"123456789";
            let token = identity.sign(id);

            for pos in 0..token.len() {
                let mut mutated = token.clone().into_bytes();
                let original = mutated[pos];
                let replacement = B64_ALPHABET
                    .iter()
                    .copied()
                    .find(|c| *c != original)
                    .unwrap();
                mutated[pos] = replacement;
                let mutated = String::from_utf8(mutated).unwrap();

                assert!(
                    !identity.verify(id, &mutated),
                    "{:?}: mutation at {} accepted",
                    identity,
                    pos
                );
            }
        }
    }

    // ============================================================
    // COOKIES
    // ============================================================

    fn headers_with(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[test]
    fn test_find_cookie_across_headers() {
        let mut headers = headers_with("theme=dark; uid=42");
        headers.append(header::COOKIE, HeaderValue::from_static("sign=abc=="));

        assert_eq!(find_cookie(&headers, "uid").as_deref(), Some("42"));
        assert_eq!(find_cookie(&headers, "sign").as_deref(), Some("abc=="));
        assert_eq!(find_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_missing_cookies_are_reported() {
        let err = IdentityCookies::from_headers(&HeaderMap::new()).unwrap_err();
        assert!(matches!(err, AccessError::MissingCookie("uid")));

        let err = IdentityCookies::from_headers(&headers_with("uid=42")).unwrap_err();
        assert!(matches!(err, AccessError::MissingCookie("sign")));

        let err = IdentityCookies::from_headers(&headers_with("uid=; sign=x")).unwrap_err();
        assert!(matches!(err, AccessError::MissingCookie("uid")));
    }

    #[test]
    fn test_issued_cookies_verify() {
        let identity = SignedIdentity::new(KEY_256, IvMode::Random).unwrap();
        let cookies = IdentityCookies::issue(&identity, 1001);

        let parsed = IdentityCookies::from_headers(&headers_with(&cookies.cookie_header())).unwrap();
        assert_eq!(parsed, cookies);
        assert!(parsed.verify(&identity).is_ok());
        assert_eq!(parsed.user_id().unwrap(), 1001);
        assert_eq!(cookies.set_cookie_headers().len(), 2);
    }

    #[test]
    fn test_swapped_uid_is_a_mismatch() {
        let identity = SignedIdentity::new(KEY_128, IvMode::KeyAsIv).unwrap();
        let mut cookies = IdentityCookies::issue(&identity, 1001);
        cookies.uid = "1002".to_string();

        assert!(matches!(
            cookies.verify(&identity),
            Err(AccessError::IdentityMismatch)
        ));
    }
}
