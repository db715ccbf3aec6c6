use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::Request;
use wraith::{
    Destination, DispatcherConfig, Error, HttpVersion, Phase, RoundTripper, Transport,
};

mod helpers;
use helpers::handshaker::PassthroughHandshaker;
use helpers::init_tracing;
use helpers::mock_server::{echo, fail_on_path, ok, MockServer, Proto};

fn round_tripper(handshaker: Arc<PassthroughHandshaker>) -> Arc<RoundTripper> {
    Arc::new(RoundTripper::new(DispatcherConfig {
        handshaker,
        ..Default::default()
    }))
}

fn get(url: &str) -> Request<Bytes> {
    Request::builder().uri(url).body(Bytes::new()).unwrap()
}

#[tokio::test]
async fn test_concurrent_first_contact_shares_one_handshake() {
    init_tracing();
    let server = MockServer::start(Proto::H2, ok("hello")).await;
    let handshaker = Arc::new(PassthroughHandshaker::new(HttpVersion::Http2));
    let rt = round_tripper(handshaker.clone());

    let mut tasks = Vec::new();
    for i in 0..8 {
        let rt = rt.clone();
        let url = server.url("https", &format!("/{}", i));
        tasks.push(tokio::spawn(async move { rt.round_trip(get(&url)).await }));
    }
    for task in tasks {
        let resp = task.await.unwrap().unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.http_version(), HttpVersion::Http2);
        assert_eq!(resp.text().unwrap(), "hello");
    }

    assert_eq!(handshaker.calls(), 1);
    assert_eq!(server.connections(), 1);
    assert_eq!(rt.cached_destinations().await, 1);
}

#[tokio::test]
async fn test_sequential_requests_reuse_cached_transport() {
    let server = MockServer::start(Proto::H2, ok("hello")).await;
    let handshaker = Arc::new(PassthroughHandshaker::new(HttpVersion::Http2));
    let rt = round_tripper(handshaker.clone());
    let dest = Destination::new("127.0.0.1", server.port(), true);

    rt.round_trip(get(&server.url("https", "/a"))).await.unwrap();
    let first = rt.transport(&dest).await.unwrap();
    rt.round_trip(get(&server.url("https", "/b"))).await.unwrap();
    let second = rt.transport(&dest).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(handshaker.calls(), 1);
    assert_eq!(server.connections(), 1);
}

#[tokio::test]
async fn test_h2_alpn_selects_http2_transport() {
    let server = MockServer::start(Proto::H2, ok("")).await;
    let rt = round_tripper(Arc::new(PassthroughHandshaker::new(HttpVersion::Http2)));
    rt.round_trip(get(&server.url("https", "/"))).await.unwrap();

    let dest = Destination::new("127.0.0.1", server.port(), true);
    match &*rt.transport(&dest).await.unwrap() {
        Transport::Http2(t) => {
            assert_eq!(t.settings().max_concurrent_streams, 1000);
            assert_eq!(t.settings().initial_window_size, 6_291_456);
        }
        other => panic!("expected HTTP/2 transport, got {:?}", other),
    }
}

#[tokio::test]
async fn test_other_alpn_selects_http1_transport() {
    let server = MockServer::start(Proto::Http1, ok("one")).await;
    let handshaker = Arc::new(PassthroughHandshaker::new(HttpVersion::Http1_1));
    let rt = round_tripper(handshaker.clone());

    let resp = rt.round_trip(get(&server.url("https", "/"))).await.unwrap();
    assert_eq!(resp.http_version(), HttpVersion::Http1_1);

    let dest = Destination::new("127.0.0.1", server.port(), true);
    let transport = rt.transport(&dest).await.unwrap();
    match &*transport {
        Transport::Http1(t) => {
            assert!(t.is_tls());
            assert_eq!(t.idle_connections().await, 1);
        }
        other => panic!("expected HTTP/1.1 transport, got {:?}", other),
    }

    // The handshake connection served the first request and went idle.
    rt.round_trip(get(&server.url("https", "/again"))).await.unwrap();
    assert_eq!(handshaker.calls(), 1);
    assert_eq!(server.connections(), 1);
}

#[tokio::test]
async fn test_concurrent_http1_first_contact() {
    init_tracing();
    let server = MockServer::start(Proto::Http1, echo()).await;
    let handshaker = Arc::new(PassthroughHandshaker::new(HttpVersion::Http1_1));
    let rt = round_tripper(handshaker.clone());

    let mut tasks = Vec::new();
    for i in 0..6 {
        let rt = rt.clone();
        let url = server.url("https", &format!("/{}", i));
        tasks.push(tokio::spawn(async move { rt.round_trip(get(&url)).await }));
    }
    for (i, task) in tasks.into_iter().enumerate() {
        let resp = task.await.unwrap().unwrap();
        assert_eq!(resp.http_version(), HttpVersion::Http1_1);
        assert_eq!(resp.text().unwrap(), format!("GET /{} ", i));
    }

    // One handshake per connection, never more handshakes than connections.
    assert_eq!(handshaker.calls(), server.connections());
    assert!(handshaker.calls() <= 6);
    assert_eq!(rt.cached_destinations().await, 1);
}

#[tokio::test]
async fn test_plain_scheme_skips_handshake() {
    let server = MockServer::start(Proto::Http1, echo()).await;
    let handshaker = Arc::new(PassthroughHandshaker::new(HttpVersion::Http2));
    let rt = round_tripper(handshaker.clone());

    let resp = rt.round_trip(get(&server.url("http", "/plain"))).await.unwrap();
    assert_eq!(resp.text().unwrap(), "GET /plain ");
    assert_eq!(resp.http_version(), HttpVersion::Http1_1);
    assert_eq!(handshaker.calls(), 0);

    let dest = Destination::new("127.0.0.1", server.port(), false);
    let transport = rt.transport(&dest).await.unwrap();
    assert!(matches!(&*transport, Transport::Http1(t) if !t.is_tls()));
}

#[tokio::test]
async fn test_missing_and_explicit_default_port_share_entry() {
    let handshaker = Arc::new(PassthroughHandshaker::new(HttpVersion::Http2));
    let rt = round_tripper(handshaker);

    let a = Destination::from_uri(&"https://example.com/x".parse().unwrap()).unwrap();
    let b = Destination::from_uri(&"https://example.com:443/y".parse().unwrap()).unwrap();
    assert_eq!(a, b);
    assert!(rt.transport(&a).await.is_none());
}

#[tokio::test]
async fn test_dispatch_error_is_isolated() {
    init_tracing();
    let server = MockServer::start(Proto::H2, fail_on_path()).await;
    let handshaker = Arc::new(PassthroughHandshaker::new(HttpVersion::Http2));
    let rt = round_tripper(handshaker.clone());
    let dest = Destination::new("127.0.0.1", server.port(), true);

    rt.round_trip(get(&server.url("https", "/warmup"))).await.unwrap();
    let before = rt.transport(&dest).await.unwrap();

    let (failed, succeeded) = tokio::join!(
        rt.round_trip(get(&server.url("https", "/fail"))),
        rt.round_trip(get(&server.url("https", "/ok")))
    );
    let err = failed.unwrap_err();
    assert_eq!(err.phase(), Phase::Dispatch);
    assert_eq!(succeeded.unwrap().text().unwrap(), "ok");

    let after = rt.transport(&dest).await.unwrap();
    assert!(Arc::ptr_eq(&before, &after));
    rt.round_trip(get(&server.url("https", "/ok"))).await.unwrap();
    assert_eq!(handshaker.calls(), 1);
}

#[tokio::test]
async fn test_failed_handshake_does_not_poison_destination() {
    let server = MockServer::start(Proto::H2, ok("back")).await;
    let handshaker = Arc::new(PassthroughHandshaker::new(HttpVersion::Http2).failing(1));
    let rt = round_tripper(handshaker.clone());

    let (a, b) = tokio::join!(
        rt.round_trip(get(&server.url("https", "/1"))),
        rt.round_trip(get(&server.url("https", "/2")))
    );
    for result in [a, b] {
        match result.unwrap_err() {
            Error::Handshake { addr, .. } => {
                assert_eq!(addr, format!("127.0.0.1:{}", server.port()))
            }
            other => panic!("expected handshake error, got {:?}", other),
        }
    }
    assert_eq!(handshaker.calls(), 1);
    assert_eq!(rt.cached_destinations().await, 0);

    let resp = rt.round_trip(get(&server.url("https", "/3"))).await.unwrap();
    assert_eq!(resp.text().unwrap(), "back");
    assert_eq!(handshaker.calls(), 2);
}

#[tokio::test]
async fn test_dial_error_phase() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let handshaker = Arc::new(PassthroughHandshaker::new(HttpVersion::Http2));
    let rt = round_tripper(handshaker.clone());
    let err = rt
        .round_trip(get(&format!("https://127.0.0.1:{}/", port)))
        .await
        .unwrap_err();

    assert_eq!(err.phase(), Phase::Dial);
    assert!(err.is_retryable());
    assert_eq!(handshaker.calls(), 0);
}

#[tokio::test]
async fn test_abandoned_wait_leaves_handshake_running() {
    let server = MockServer::start(Proto::H2, ok("late")).await;
    let handshaker = Arc::new(
        PassthroughHandshaker::new(HttpVersion::Http2).with_delay(Duration::from_millis(300)),
    );
    let rt = round_tripper(handshaker.clone());

    let impatient = tokio::time::timeout(
        Duration::from_millis(20),
        rt.round_trip(get(&server.url("https", "/impatient"))),
    )
    .await;
    assert!(impatient.is_err());

    let resp = rt.round_trip(get(&server.url("https", "/patient"))).await.unwrap();
    assert_eq!(resp.text().unwrap(), "late");
    assert_eq!(handshaker.calls(), 1);
}

#[tokio::test]
async fn test_invalid_scheme_is_configuration_error() {
    let handshaker = Arc::new(PassthroughHandshaker::new(HttpVersion::Http2));
    let rt = round_tripper(handshaker.clone());

    let err = rt.round_trip(get("ws://127.0.0.1:1/")).await.unwrap_err();
    assert!(matches!(err, Error::Configuration(ref m) if m.contains("ws")));
    assert_eq!(rt.cached_destinations().await, 0);
    assert_eq!(handshaker.calls(), 0);
}

#[tokio::test]
async fn test_staggered_requests_get_distinct_timestamps() {
    let server = MockServer::start(Proto::H2, ok("ts")).await;
    let handshaker = Arc::new(PassthroughHandshaker::new(HttpVersion::Http2));
    let rt = Arc::new(RoundTripper::new(DispatcherConfig {
        handshaker: handshaker.clone(),
        rx_timestamps: true,
        ..Default::default()
    }));

    let mut tasks = Vec::new();
    for i in 0..4u64 {
        let rt = rt.clone();
        let url = server.url("https", &format!("/{}", i));
        tasks.push(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20 * i)).await;
            rt.round_trip(get(&url)).await
        }));
    }

    let mut stamps = Vec::new();
    for task in tasks {
        let resp = task.await.unwrap().unwrap();
        assert_eq!(resp.status, 200);
        let ts = resp.timestamps().expect("timestamps enabled");
        assert!(ts.first <= ts.last);
        assert!(ts.first > std::time::UNIX_EPOCH);
        stamps.push(ts);
    }

    assert_eq!(handshaker.calls(), 1);
    assert_eq!(server.connections(), 1);
    for (i, a) in stamps.iter().enumerate() {
        for b in &stamps[i + 1..] {
            assert_ne!(a, b);
        }
    }
}

#[tokio::test]
async fn test_dropped_h2_connection_redials_through_coordinator() {
    init_tracing();
    let server = MockServer::start(Proto::H2, ok("again")).await;
    let handshaker = Arc::new(PassthroughHandshaker::new(HttpVersion::Http2));
    let rt = round_tripper(handshaker.clone());
    let dest = Destination::new("127.0.0.1", server.port(), true);

    rt.round_trip(get(&server.url("https", "/"))).await.unwrap();
    let before = rt.transport(&dest).await.unwrap();

    server.drop_connections();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let resp = rt.round_trip(get(&server.url("https", "/"))).await.unwrap();
    assert_eq!(resp.text().unwrap(), "again");

    // Same transport, new connection, second coordinated handshake.
    let after = rt.transport(&dest).await.unwrap();
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(handshaker.calls(), 2);
    assert_eq!(server.connections(), 2);
}
