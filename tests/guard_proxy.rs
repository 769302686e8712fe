//! End-to-end tests of the guard proxy in front of a mock upstream.

use std::net::SocketAddr;
use std::sync::atomic::Ordering;

use reqwest::StatusCode;

mod common;

#[tokio::test]
async fn clean_request_reaches_upstream() {
    let upstream: SocketAddr = "127.0.0.1:28381".parse().unwrap();
    let proxy: SocketAddr = "127.0.0.1:28382".parse().unwrap();

    let hits = common::start_mock_upstream(upstream, "hello from upstream").await;
    let shutdown = common::start_guard(proxy, upstream, 10).await;

    let res = common::client()
        .get(format!("http://{}/items?q=shoes", proxy))
        .header("x-forwarded-for", "198.51.100.1")
        .send()
        .await
        .expect("proxy unreachable");

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "hello from upstream");
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    shutdown.trigger();
}

#[tokio::test]
async fn sql_keyword_in_path_never_reaches_upstream() {
    let upstream: SocketAddr = "127.0.0.1:28481".parse().unwrap();
    let proxy: SocketAddr = "127.0.0.1:28482".parse().unwrap();

    let hits = common::start_mock_upstream(upstream, "ok").await;
    let shutdown = common::start_guard(proxy, upstream, 10).await;

    let res = common::client()
        .get(format!("http://{}/items?q=1%20UNION%20SELECT%20password", proxy))
        .send()
        .await
        .expect("proxy unreachable");

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = res.text().await.unwrap();
    assert!(body.contains("'select'"), "unexpected body: {body}");
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    shutdown.trigger();
}

#[tokio::test]
async fn sql_keyword_in_body_is_rejected() {
    let upstream: SocketAddr = "127.0.0.1:28581".parse().unwrap();
    let proxy: SocketAddr = "127.0.0.1:28582".parse().unwrap();

    let hits = common::start_mock_upstream(upstream, "ok").await;
    let shutdown = common::start_guard(proxy, upstream, 10).await;

    let res = common::client()
        .post(format!("http://{}/comments", proxy))
        .body("text=nice'; drop table comments; --")
        .send()
        .await
        .expect("proxy unreachable");

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(res.text().await.unwrap().contains("drop table"));
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    shutdown.trigger();
}

#[tokio::test]
async fn client_over_limit_is_throttled() {
    let upstream: SocketAddr = "127.0.0.1:28681".parse().unwrap();
    let proxy: SocketAddr = "127.0.0.1:28682".parse().unwrap();

    let hits = common::start_mock_upstream(upstream, "ok").await;
    let shutdown = common::start_guard(proxy, upstream, 3).await;
    let client = common::client();

    for _ in 0..3 {
        let res = client
            .get(format!("http://{}/", proxy))
            .header("x-forwarded-for", "203.0.113.77")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let res = client
        .get(format!("http://{}/", proxy))
        .header("x-forwarded-for", "203.0.113.77")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.text().await.unwrap(), "rate limit exceeded, try again later");

    // another client is unaffected
    let res = client
        .get(format!("http://{}/", proxy))
        .header("x-forwarded-for", "203.0.113.78")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    assert_eq!(hits.load(Ordering::SeqCst), 4);
    shutdown.trigger();
}

#[tokio::test]
async fn client_without_forwarded_for_is_throttled_by_socket_address() {
    let upstream: SocketAddr = "127.0.0.1:28781".parse().unwrap();
    let proxy: SocketAddr = "127.0.0.1:28782".parse().unwrap();

    let hits = common::start_mock_upstream(upstream, "ok").await;
    let shutdown = common::start_guard(proxy, upstream, 2).await;
    let client = common::client();

    for _ in 0..2 {
        let res = client.get(format!("http://{}/", proxy)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let res = client.get(format!("http://{}/", proxy)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    shutdown.trigger();
}
