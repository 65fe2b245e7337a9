//! Access Control Tests
//!
//! ## Test Scopes
//! - **Dispatch**: local vs remote routing from the ring, hop guard, empty ring.
//! - **Records**: the `Open` and `RequireRecord` local policies.
//! - **ClusterAuthority**: fail-closed reading of the owner's answer.
//! - **Cluster**: two real nodes proxying `/checkRight` and `/register` to each other.

#[cfg(test)]
mod tests {
    use crate::access::handlers::{handle_check_right, handle_register};
    use crate::access::protocol::{ENDPOINT_CHECK_RIGHT, ENDPOINT_REGISTER, HOP_HEADER};
    use crate::access::*;
    use crate::error::AccessError;
    use crate::identity::{IdentityCookies, IvMode, SignedIdentity};
    use crate::ring::{ClusterRing, DEFAULT_REPLICAS, HashRing, Node};
    use async_trait::async_trait;
    use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
    use axum::{
        Extension, Router,
        routing::{get, post},
    };
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const NODE_A: &str = "10.0.0.1:8083";
    const NODE_B: &str = "10.0.0.2:8083";

    #[derive(Default)]
    struct CountingAuthority {
        local_calls: AtomicUsize,
        remote_calls: AtomicUsize,
        registrations: AtomicUsize,
    }

    #[async_trait]
    impl Authority for CountingAuthority {
        async fn check_local(&self, _uid: &str) -> Result<(), AccessError> {
            self.local_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn check_remote(
            &self,
            _owner: &Node,
            _cookies: &IdentityCookies,
        ) -> Result<(), AccessError> {
            self.remote_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn register_local(&self, _uid: &str) -> Result<(), AccessError> {
            self.registrations.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn register_remote(
            &self,
            _owner: &Node,
            _cookies: &IdentityCookies,
        ) -> Result<(), AccessError> {
            self.registrations.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn identity() -> SignedIdentity {
        SignedIdentity::new(b"0123456789abcdef".to_vec(), IvMode::Random).unwrap()
    }

    fn headers_for(cookies: &IdentityCookies) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&cookies.cookie_header()).unwrap(),
        );
        headers
    }

    fn ring_of(nodes: &[&str]) -> Arc<ClusterRing> {
        ClusterRing::new(HashRing::from_nodes(
            nodes.iter().map(|n| Node::from(*n)),
            DEFAULT_REPLICAS,
        ))
    }

    /// First user id the ring assigns to `owner`.
    fn uid_owned_by(ring: &ClusterRing, owner: &str) -> i64 {
        (1..10_000)
            .find(|uid| ring.owner(&uid.to_string()).unwrap().as_str() == owner)
            .expect("ring should assign some uid to every node")
    }

    async fn bind() -> (tokio::net::TcpListener, String) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        (listener, addr)
    }

    fn spawn(listener: tokio::net::TcpListener, app: Router) {
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
    }

    fn check_right_router(access: Arc<AccessControl>) -> Router {
        Router::new()
            .route(ENDPOINT_CHECK_RIGHT, get(handle_check_right))
            .route(ENDPOINT_REGISTER, post(handle_register))
            .layer(Extension(access))
    }

    // ============================================================
    // DISPATCH
    // ============================================================

    #[tokio::test]
    async fn test_missing_cookie_denied_without_any_dispatch() {
        let authority = Arc::new(CountingAuthority::default());
        let access = AccessControl::new(Node::from(NODE_A), ring_of(&[NODE_A, NODE_B]), authority.clone());

        let cookies = IdentityCookies::issue(&identity(), 1);
        let mut only_uid = HeaderMap::new();
        only_uid.insert(header::COOKIE, HeaderValue::from_str(&format!("uid={}", cookies.uid)).unwrap());
        let mut only_sign = HeaderMap::new();
        only_sign.insert(header::COOKIE, HeaderValue::from_str(&format!("sign={}", cookies.sign)).unwrap());

        assert!(matches!(
            access.authorize(&HeaderMap::new()).await,
            Err(AccessError::MissingCookie("uid"))
        ));
        assert!(matches!(
            access.authorize(&only_uid).await,
            Err(AccessError::MissingCookie("sign"))
        ));
        assert!(!access.is_authorized(&only_sign).await);

        assert_eq!(authority.local_calls.load(Ordering::SeqCst), 0);
        assert_eq!(authority.remote_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dispatch_follows_ring() {
        let ring = ring_of(&[NODE_A, NODE_B]);
        let authority = Arc::new(CountingAuthority::default());
        let access = AccessControl::new(Node::from(NODE_A), ring.clone(), authority.clone());

        let local_uid = uid_owned_by(&ring, NODE_A);
        let remote_uid = uid_owned_by(&ring, NODE_B);

        assert_eq!(access.dispatch(&local_uid.to_string()).unwrap(), Dispatch::Local);
        assert_eq!(
            access.dispatch(&remote_uid.to_string()).unwrap(),
            Dispatch::Remote(Node::from(NODE_B))
        );

        let signer = identity();
        assert!(access.is_authorized(&headers_for(&IdentityCookies::issue(&signer, local_uid))).await);
        assert!(access.is_authorized(&headers_for(&IdentityCookies::issue(&signer, remote_uid))).await);
        assert_eq!(authority.local_calls.load(Ordering::SeqCst), 1);
        assert_eq!(authority.remote_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_ring_denies() {
        let authority = Arc::new(CountingAuthority::default());
        let access = AccessControl::new(Node::from(NODE_A), ring_of(&[]), authority.clone());
        let headers = headers_for(&IdentityCookies::issue(&identity(), 1));

        assert!(matches!(
            access.authorize(&headers).await,
            Err(AccessError::Routing(_))
        ));
        assert_eq!(authority.local_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_proxied_request_is_never_proxied_again() {
        let ring = ring_of(&[NODE_A, NODE_B]);
        let authority = Arc::new(CountingAuthority::default());
        let access = AccessControl::new(Node::from(NODE_A), ring.clone(), authority.clone());

        let signer = identity();
        let remote_uid = uid_owned_by(&ring, NODE_B);
        let mut headers = headers_for(&IdentityCookies::issue(&signer, remote_uid));
        headers.insert(HOP_HEADER, HeaderValue::from_static("1"));

        assert!(matches!(
            access.authorize(&headers).await,
            Err(AccessError::HopLimit(_))
        ));
        assert!(matches!(
            access.register(&headers).await,
            Err(AccessError::HopLimit(_))
        ));
        assert_eq!(authority.remote_calls.load(Ordering::SeqCst), 0);
        assert_eq!(authority.registrations.load(Ordering::SeqCst), 0);

        // A proxied request this node owns is answered normally.
        let local_uid = uid_owned_by(&ring, NODE_A);
        let mut headers = headers_for(&IdentityCookies::issue(&signer, local_uid));
        headers.insert(HOP_HEADER, HeaderValue::from_static("1"));
        assert!(access.is_authorized(&headers).await);
    }

    #[tokio::test]
    async fn test_ring_change_moves_dispatch() {
        let ring = ring_of(&[NODE_A]);
        let access = AccessControl::new(
            Node::from(NODE_A),
            ring.clone(),
            Arc::new(CountingAuthority::default()),
        );
        assert!((1..200).all(|uid| access.dispatch(&uid.to_string()).unwrap() == Dispatch::Local));

        ring.add_node(Node::from(NODE_B));
        assert!(
            (1..200).any(|uid| access.dispatch(&uid.to_string()).unwrap()
                == Dispatch::Remote(Node::from(NODE_B)))
        );
    }

    // ============================================================
    // RECORDS
    // ============================================================

    #[tokio::test]
    async fn test_open_policy_records_visits() {
        let records = AccessRecords::new(AccessPolicy::Open);
        assert!(records.check("42").await.is_ok());
        assert!(records.check("42").await.is_ok());

        let record = records.get_record(42).await.unwrap();
        assert_eq!(record.hits, 2);
        assert_eq!(records.len().await, 1);
    }

    #[tokio::test]
    async fn test_require_record_policy() {
        let records = AccessRecords::new(AccessPolicy::RequireRecord);
        assert!(matches!(
            records.check("42").await,
            Err(AccessError::LocalDenied(42))
        ));

        records.set_record(42).await;
        assert!(records.check("42").await.is_ok());
        assert_eq!(records.get_record(42).await.unwrap().hits, 1);
    }

    #[tokio::test]
    async fn test_registered_user_is_granted_under_require_record() {
        let ring = ring_of(&[NODE_A]);
        let records = Arc::new(AccessRecords::new(AccessPolicy::RequireRecord));
        let access = AccessControl::new(
            Node::from(NODE_A),
            ring,
            Arc::new(ClusterAuthority::new(records.clone(), Duration::from_millis(300))),
        );
        let headers = headers_for(&IdentityCookies::issue(&identity(), 42));

        assert!(!access.is_authorized(&headers).await);
        access.register(&headers).await.unwrap();
        assert!(access.is_authorized(&headers).await);
        assert_eq!(records.get_record(42).await.unwrap().hits, 1);

        // Registering twice keeps the existing record.
        access.register(&headers).await.unwrap();
        assert_eq!(records.len().await, 1);
    }

    #[tokio::test]
    async fn test_register_rejects_non_numeric_uid() {
        let records = AccessRecords::new(AccessPolicy::RequireRecord);
        assert!(matches!(
            records.register("alice").await,
            Err(AccessError::InvalidUid(_))
        ));
        assert_eq!(records.len().await, 0);
    }

    #[tokio::test]
    async fn test_non_numeric_uid_denied() {
        let records = AccessRecords::new(AccessPolicy::Open);
        assert!(matches!(
            records.check("alice").await,
            Err(AccessError::InvalidUid(_))
        ));
        assert_eq!(records.len().await, 0);
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("open".parse::<AccessPolicy>(), Ok(AccessPolicy::Open));
        assert_eq!("Record".parse::<AccessPolicy>(), Ok(AccessPolicy::RequireRecord));
        assert!("closed".parse::<AccessPolicy>().is_err());
    }

    // ============================================================
    // CLUSTER AUTHORITY
    // ============================================================

    async fn stub_owner(status: StatusCode, body: &'static str, delay: Duration) -> Node {
        let (listener, addr) = bind().await;
        let app = Router::new().route(
            ENDPOINT_CHECK_RIGHT,
            get(move |headers: HeaderMap| async move {
                if !headers.contains_key(HOP_HEADER) {
                    return (StatusCode::BAD_REQUEST, "missing hop header");
                }
                tokio::time::sleep(delay).await;
                (status, body)
            }),
        );
        spawn(listener, app);
        Node::new(addr)
    }

    fn cluster_authority() -> ClusterAuthority {
        ClusterAuthority::new(
            Arc::new(AccessRecords::new(AccessPolicy::Open)),
            Duration::from_millis(300),
        )
    }

    #[tokio::test]
    async fn test_remote_grant_requires_exact_true() {
        let authority = cluster_authority();
        let cookies = IdentityCookies::issue(&identity(), 9);

        let owner = stub_owner(StatusCode::OK, "true", Duration::ZERO).await;
        assert!(authority.check_remote(&owner, &cookies).await.is_ok());

        for (status, body) in [
            (StatusCode::OK, "false"),
            (StatusCode::OK, "TRUE"),
            (StatusCode::OK, "true\n"),
            (StatusCode::INTERNAL_SERVER_ERROR, "true"),
            (StatusCode::UNAUTHORIZED, "true"),
        ] {
            let owner = stub_owner(status, body, Duration::ZERO).await;
            assert!(
                matches!(
                    authority.check_remote(&owner, &cookies).await,
                    Err(AccessError::RemoteDenied(_))
                ),
                "{} {:?} should be denied",
                status,
                body
            );
        }
    }

    #[tokio::test]
    async fn test_slow_owner_times_out() {
        let authority = cluster_authority();
        let cookies = IdentityCookies::issue(&identity(), 9);
        let owner = stub_owner(StatusCode::OK, "true", Duration::from_secs(2)).await;

        let started = std::time::Instant::now();
        assert!(matches!(
            authority.check_remote(&owner, &cookies).await,
            Err(AccessError::Transport { .. })
        ));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_unreachable_owner_denied() {
        let authority = cluster_authority();
        let cookies = IdentityCookies::issue(&identity(), 9);

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        assert!(matches!(
            authority.check_remote(&Node::new(addr.to_string()), &cookies).await,
            Err(AccessError::Transport { .. })
        ));
    }

    #[tokio::test]
    async fn test_only_identity_cookies_are_forwarded() {
        let (listener, addr) = bind().await;
        let app = Router::new().route(
            ENDPOINT_CHECK_RIGHT,
            get(|headers: HeaderMap| async move {
                let cookie = headers
                    .get(header::COOKIE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                let clean = cookie.contains("uid=") && cookie.contains("sign=") && !cookie.contains("session");
                (StatusCode::OK, if clean { "true" } else { "false" })
            }),
        );
        spawn(listener, app);

        let authority = cluster_authority();
        let cookies = IdentityCookies::issue(&identity(), 9);
        assert!(authority.check_remote(&Node::new(addr), &cookies).await.is_ok());
    }

    // ============================================================
    // TWO-NODE CLUSTER
    // ============================================================

    struct TwoNodes {
        a: Arc<AccessControl>,
        b_records: Arc<AccessRecords>,
        a_addr: String,
        b_addr: String,
        ring: Arc<ClusterRing>,
    }

    async fn two_nodes(b_policy: AccessPolicy) -> TwoNodes {
        let (a_listener, a_addr) = bind().await;
        let (b_listener, b_addr) = bind().await;
        let ring = ring_of(&[a_addr.as_str(), b_addr.as_str()]);
        let timeout = Duration::from_millis(500);

        let a_records = Arc::new(AccessRecords::new(AccessPolicy::Open));
        let b_records = Arc::new(AccessRecords::new(b_policy));
        let a = AccessControl::new(
            Node::new(a_addr.clone()),
            ring.clone(),
            Arc::new(ClusterAuthority::new(a_records, timeout)),
        );
        let b = AccessControl::new(
            Node::new(b_addr.clone()),
            ring.clone(),
            Arc::new(ClusterAuthority::new(b_records.clone(), timeout)),
        );

        spawn(a_listener, check_right_router(a.clone()));
        spawn(b_listener, check_right_router(b));

        TwoNodes {
            a,
            b_records,
            a_addr,
            b_addr,
            ring,
        }
    }

    #[tokio::test]
    async fn test_node_proxies_to_owner() {
        let cluster = two_nodes(AccessPolicy::Open).await;
        let uid = uid_owned_by(&cluster.ring, &cluster.b_addr);
        let headers = headers_for(&IdentityCookies::issue(&identity(), uid));

        assert!(cluster.a.is_authorized(&headers).await);
        // The visit is recorded on the owner, not on the node that was asked.
        assert_eq!(cluster.b_records.get_record(uid).await.unwrap().hits, 1);
    }

    #[tokio::test]
    async fn test_owner_policy_decides_proxied_request() {
        let cluster = two_nodes(AccessPolicy::RequireRecord).await;
        let uid = uid_owned_by(&cluster.ring, &cluster.b_addr);
        let headers = headers_for(&IdentityCookies::issue(&identity(), uid));

        assert!(!cluster.a.is_authorized(&headers).await);
        cluster.b_records.set_record(uid).await;
        assert!(cluster.a.is_authorized(&headers).await);
    }

    #[tokio::test]
    async fn test_registration_lands_on_owner() {
        let cluster = two_nodes(AccessPolicy::RequireRecord).await;
        let uid = uid_owned_by(&cluster.ring, &cluster.b_addr);
        let headers = headers_for(&IdentityCookies::issue(&identity(), uid));

        assert!(!cluster.a.is_authorized(&headers).await);
        cluster.a.register(&headers).await.unwrap();
        assert!(cluster.b_records.get_record(uid).await.is_some());
        assert!(cluster.a.is_authorized(&headers).await);
    }

    #[tokio::test]
    async fn test_register_endpoint_over_http() {
        let cluster = two_nodes(AccessPolicy::RequireRecord).await;
        let client = reqwest::Client::new();
        let uid = uid_owned_by(&cluster.ring, &cluster.b_addr);
        let cookies = IdentityCookies::issue(&identity(), uid);

        let check = || {
            client
                .get(format!("http://{}{}", cluster.a_addr, ENDPOINT_CHECK_RIGHT))
                .header(header::COOKIE, cookies.cookie_header())
                .send()
        };
        assert_eq!(check().await.unwrap().text().await.unwrap(), "false");

        let body = client
            .post(format!("http://{}{}", cluster.a_addr, ENDPOINT_REGISTER))
            .header(header::COOKIE, cookies.cookie_header())
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "true");
        assert_eq!(check().await.unwrap().text().await.unwrap(), "true");

        let resp = client
            .post(format!("http://{}{}", cluster.a_addr, ENDPOINT_REGISTER))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.text().await.unwrap(), "false");
    }

    #[tokio::test]
    async fn test_check_right_endpoint_over_http() {
        let cluster = two_nodes(AccessPolicy::Open).await;
        let client = reqwest::Client::new();
        let signer = identity();

        for owner in [&cluster.a_addr, &cluster.b_addr] {
            let uid = uid_owned_by(&cluster.ring, owner);
            let cookies = IdentityCookies::issue(&signer, uid);
            let body = client
                .get(format!("http://{}{}", cluster.a_addr, ENDPOINT_CHECK_RIGHT))
                .header(header::COOKIE, cookies.cookie_header())
                .send()
                .await
                .unwrap()
                .text()
                .await
                .unwrap();
            assert_eq!(body, "true", "uid owned by {} should be granted", owner);
        }

        let resp = client
            .get(format!("http://{}{}", cluster.a_addr, ENDPOINT_CHECK_RIGHT))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        assert_eq!(resp.text().await.unwrap(), "false");
    }
}
