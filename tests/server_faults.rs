//! Fault injection over real sockets.

use futures_util::StreamExt;
use http_echo_server::EchoConfig;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

mod common;
use common::{client, start_server, wait_until_idle};

#[tokio::test]
async fn broken_drops_the_connection() {
    let server = start_server(EchoConfig::default()).await;

    let result = client().get(server.url("/?broken=1&http_code=500")).send().await;
    assert!(result.is_err(), "expected a transport error, got {:?}", result);

    let status = wait_until_idle(&server).await;
    assert_eq!(status["RequestID"], 1);
    server.stop();
}

#[tokio::test]
async fn broken_writes_no_response_bytes() {
    let server = start_server(EchoConfig::default()).await;

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream
        .write_all(b"GET /?broken=1&http_code=500 HTTP/1.1\r\nHost: echo.test\r\n\r\n")
        .await
        .unwrap();

    let mut received = Vec::new();
    // A reset counts as a close; either way nothing may arrive.
    let _ = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut received))
        .await
        .expect("server kept the socket open");
    assert!(
        received.is_empty(),
        "unexpected bytes: {:?}",
        String::from_utf8_lossy(&received)
    );

    let status = wait_until_idle(&server).await;
    assert_eq!(status["RequestID"], 1);
    assert_eq!(status["RemoteTotal"], 0);
    server.stop();
}

#[tokio::test]
async fn echo_over_the_wire() {
    let server = start_server(EchoConfig::default()).await;

    let res = client()
        .get(server.url("/?repeat=3&type=json"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-type"], "application/json");

    let body: serde_json::Value = res.json().await.unwrap();
    let entries = body["ResData"].as_array().unwrap();
    assert_eq!(entries.len(), 3);
    let dump = entries[0]["Request"].as_str().unwrap();
    assert!(dump.starts_with("GET /?repeat=3&type=json HTTP/1.1\r\n"));
    assert!(dump.contains(&format!("Host: {}\r\n", server.addr)));
    server.stop();
}

#[tokio::test]
async fn sleep_ah_delays_the_remainder() {
    let server = start_server(EchoConfig::default()).await;

    let start = Instant::now();
    let res = client()
        .get(server.url("/?sleep_ah=300"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let text = res.text().await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(300));
    assert!(text.starts_with("ID=1\n\nGET /?sleep_ah=300 HTTP/1.1\r\n"));
    server.stop();
}

/// Read `/chunk` until the client-side timeout cuts the stream.
async fn chunk_until_timeout(server: &common::TestServer, repeat: u32, timeout: Duration) -> String {
    let res = client()
        .get(server.url(&format!("/chunk?repeat={}", repeat)))
        .timeout(timeout)
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-content-type-options"], "nosniff");

    let mut received = Vec::new();
    let mut cut = false;
    let mut stream = res.bytes_stream();
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(bytes) => received.extend_from_slice(&bytes),
            Err(_) => {
                cut = true;
                break;
            }
        }
    }
    assert!(cut, "stream finished before the timeout");
    String::from_utf8(received).unwrap()
}

#[tokio::test]
async fn chunk_timeout_before_first_pause_sees_one_line() {
    let server = start_server(EchoConfig::default()).await;

    let text = chunk_until_timeout(&server, 2, Duration::from_millis(500)).await;
    assert_eq!(text, "Hello 0\n");

    let status = wait_until_idle(&server).await;
    assert_eq!(status["RemoteTotal"], 0);
    server.stop();
}

#[tokio::test]
async fn chunk_lines_are_paced_one_second_apart() {
    let server = start_server(EchoConfig::default()).await;

    let text = chunk_until_timeout(&server, 5, Duration::from_millis(1500)).await;
    assert_eq!(text, "Hello 0\nHello 1\n");

    let status = wait_until_idle(&server).await;
    assert_eq!(status["Connecting"], 0);
    assert_eq!(status["RemoteTotal"], 0);
    assert_eq!(status["RequestID"], 1);
    server.stop();
}

#[tokio::test]
async fn status_lists_live_remotes() {
    let server = start_server(EchoConfig::default()).await;

    let slow = tokio::spawn({
        let url = server.url("/?sleep=800");
        async move { client().get(url).send().await.unwrap().status() }
    });
    tokio::time::sleep(Duration::from_millis(200)).await;

    let status: serde_json::Value = client()
        .get(server.url("/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["Connecting"], 1);
    assert_eq!(status["RemoteTotal"], 1);
    let detail = status["RemoteDetail"].as_object().unwrap();
    assert!(detail.keys().all(|k| k.starts_with("127.0.0.1:")));

    assert_eq!(slow.await.unwrap(), 200);
    let status = wait_until_idle(&server).await;
    assert_eq!(status["RequestID"], 1);
    server.stop();
}

#[tokio::test]
async fn counters_balance_after_concurrent_requests() {
    let server = start_server(EchoConfig::default()).await;
    let client = client();

    let requests = (0..20).map(|i| {
        let client = client.clone();
        let url = server.url(&format!("/?sleep={}", i * 5));
        async move { client.get(url).send().await.unwrap().text().await.unwrap() }
    });
    let bodies = futures_util::future::join_all(requests).await;
    assert!(bodies.iter().all(|b| b.starts_with("ID=")));

    let status = wait_until_idle(&server).await;
    assert_eq!(status["Connecting"], 0);
    assert_eq!(status["RequestID"], 20);
    server.stop();
}

#[tokio::test]
async fn shutdown_interrupts_long_sleeps() {
    let server = start_server(EchoConfig::default()).await;

    let pending = tokio::spawn({
        let url = server.url("/?sleep=60000");
        async move { client().get(url).send().await }
    });
    tokio::time::sleep(Duration::from_millis(200)).await;

    let start = Instant::now();
    server.stop();
    let _ = tokio::time::timeout(Duration::from_secs(5), pending)
        .await
        .expect("request outlived shutdown");
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(server.state.tracker.in_flight(), 0);
}
