// Bounded fan-out over nodes, client construction, per-node failure mapping

use komari_traffic::config::KomariConfig;
use komari_traffic::komari_repo::{CounterSource, KomariRepo, NodeFetch, fan_out};
use komari_traffic::models::{Counter, NodeCounter};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[tokio::test]
async fn fan_out_bounds_concurrency_and_sorts_skips() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let items: Vec<usize> = (0..12).collect();

    let out = fan_out(items, 3, |i| {
        let in_flight = in_flight.clone();
        let peak = peak.clone();
        async move {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5 * (12 - i as u64))).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
            if i % 4 == 0 {
                NodeFetch::Skipped(format!("node{:02}(timeout)", i))
            } else {
                NodeFetch::Counter {
                    id: format!("id{}", i),
                    node: NodeCounter::new(format!("node{}", i), i as u64, 0),
                }
            }
        }
    })
    .await;

    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(out.snapshot.len(), 9);
    assert_eq!(
        out.skipped,
        vec!["node00(timeout)", "node04(timeout)", "node08(timeout)"]
    );
}

#[tokio::test]
async fn fan_out_of_nothing_is_empty() {
    let out = fan_out(Vec::<u8>::new(), 6, |_| async { NodeFetch::Skipped("x".into()) }).await;
    assert!(out.snapshot.is_empty());
    assert!(out.skipped.is_empty());
}

#[test]
fn client_rejects_invalid_token_header() {
    let config = KomariConfig {
        base_url: "http://127.0.0.1:1".into(),
        api_token: "t".into(),
        api_token_header: "bad header".into(),
        api_token_prefix: "Bearer".into(),
        timeout_secs: 1,
        fetch_workers: 2,
    };
    assert!(KomariRepo::new(&config).is_err());

    let ok = KomariConfig {
        api_token_header: "X-Api-Key".into(),
        ..config
    };
    assert!(KomariRepo::new(&ok).is_ok());
}

const NODES: &str = r#"{"status":"success","data":[
    {"uuid":"a","name":"edge-a"},
    {"uuid":"b","name":"edge-b"},
    {"uuid":"c","name":"edge-c"}
]}"#;
const RECENT_C: &str =
    r#"{"status":"success","data":[{"network":{"totalUp":11,"totalDown":22}}]}"#;

/// Minimal Komari stand-in: node "a" answers 502, node "b" never answers, node "c" is healthy.
async fn spawn_komari() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let mut len = 0;
                while !buf[..len].windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf[len..]).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => len += n,
                    }
                }
                let head = String::from_utf8_lossy(&buf[..len]).to_string();
                let path = head.split_whitespace().nth(1).unwrap_or("").to_string();
                let (status, body) = match path.as_str() {
                    "/api/nodes" => ("200 OK", NODES),
                    "/api/recent/a" => ("502 Bad Gateway", "upstream down"),
                    "/api/recent/b" => {
                        tokio::time::sleep(Duration::from_secs(10)).await;
                        return;
                    }
                    "/api/recent/c" => ("200 OK", RECENT_C),
                    _ => ("404 Not Found", ""),
                };
                let resp = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(resp.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn failing_nodes_become_skip_entries_with_their_reason() {
    let base_url = spawn_komari().await;
    let repo = KomariRepo::new(&KomariConfig {
        base_url,
        api_token: String::new(),
        api_token_header: "Authorization".into(),
        api_token_prefix: "Bearer".into(),
        timeout_secs: 1,
        fetch_workers: 3,
    })
    .unwrap();

    let out = repo.fetch_all().await.unwrap();

    assert_eq!(out.skipped, vec!["edge-a(http 502)", "edge-b(timeout)"]);
    assert_eq!(out.snapshot.len(), 1);
    assert_eq!(out.snapshot["c"].name, "edge-c");
    assert_eq!(out.snapshot["c"].counter, Counter::new(11, 22));
}
