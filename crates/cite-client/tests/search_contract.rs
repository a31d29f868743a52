//! Wire-contract tests for the citation client against a throwaway HTTP responder.

use std::time::{Duration, Instant};

use cite_client::{
    is_score_ordered, CitationSearch, CiteClient, CiteConfig, OutputMode, RetrievalError,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

const SPEC_RESPONSE: &str = r#"{"results":[{"id":"X1","title":"T","result_type":"chunk","score":0.85,"chunk_text":"...","authors":["A"],"year":2020,"journal":"J","volume":"100","pages":"1-50"}],"total":1,"query_time_ms":50}"#;

/// A request as seen by the fake service.
#[derive(Debug)]
struct Captured {
    head: String,
    body: String,
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

async fn read_request(stream: &mut TcpStream) -> Captured {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find_header_end(&buf) {
            let head = String::from_utf8_lossy(&buf[..pos]).to_string();
            let content_length = head
                .lines()
                .filter_map(|l| l.split_once(':'))
                .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            while buf.len() < pos + 4 + content_length {
                let n = stream.read(&mut chunk).await.unwrap_or(0);
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            let end = (pos + 4 + content_length).min(buf.len());
            let body = String::from_utf8_lossy(&buf[pos + 4..end]).to_string();
            return Captured { head, body };
        }
    }
    Captured {
        head: String::from_utf8_lossy(&buf).to_string(),
        body: String::new(),
    }
}

/// Serve `status` + `body` to every connection; forward each request on the channel.
async fn serve(status: u16, body: &'static str) -> (String, mpsc::UnboundedReceiver<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let tx = tx.clone();
            tokio::spawn(async move {
                let captured = read_request(&mut stream).await;
                let _ = tx.send(captured);
                let reason = if status == 200 { "OK" } else { "Error" };
                let response = format!(
                    "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    (format!("http://{addr}"), rx)
}

/// Accept connections and never answer them.
async fn serve_silently() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    format!("http://{addr}")
}

fn client_for(base_url: &str, timeout: Duration) -> CiteClient {
    CiteClient::new(
        CiteConfig::new(base_url)
            .with_timeout(timeout)
            .with_health_timeout(timeout)
            .with_library(99),
    )
    .unwrap()
}

#[tokio::test]
async fn test_literal_response_preserves_every_field() {
    let (url, _rx) = serve(200, SPEC_RESPONSE).await;
    let client = client_for(&url, Duration::from_secs(5));

    let results = client.search(&client.query("consideration")).await.unwrap();

    assert_eq!(results.len(), 1);
    let hit = &results[0];
    assert_eq!(hit.id, "X1");
    assert_eq!(hit.title, "T");
    assert_eq!(hit.result_type, "chunk");
    assert_eq!(hit.score, 0.85);
    assert_eq!(hit.chunk_text.as_deref(), Some("..."));
    assert_eq!(hit.authors, vec!["A".to_string()]);
    assert_eq!(hit.year, Some(2020));
    assert_eq!(hit.journal.as_deref(), Some("J"));
    assert_eq!(hit.volume.as_deref(), Some("100"));
    assert_eq!(hit.pages.as_deref(), Some("1-50"));
}

#[tokio::test]
async fn test_response_envelope_carries_totals() {
    let (url, _rx) = serve(200, SPEC_RESPONSE).await;
    let client = client_for(&url, Duration::from_secs(5));

    let response = client
        .search_response(&client.query("consideration"))
        .await
        .unwrap();
    assert_eq!(response.total, 1);
    assert_eq!(response.query_time_ms, 50.0);
}

#[tokio::test]
async fn test_request_is_post_search_with_full_body() {
    let (url, mut rx) = serve(200, SPEC_RESPONSE).await;
    let client = client_for(&url, Duration::from_secs(5));

    let query = client
        .query("promissory estoppel")
        .with_max_results(5)
        .with_min_score(0.4)
        .with_output_mode(OutputMode::Both);
    client.search(&query).await.unwrap();

    let captured = rx.recv().await.unwrap();
    assert!(captured.head.starts_with("POST /search "), "head: {}", captured.head);

    let body: serde_json::Value = serde_json::from_str(&captured.body).unwrap();
    assert_eq!(body["query"], "promissory estoppel");
    assert_eq!(body["library_id"], 99);
    assert_eq!(body["max_results"], 5);
    assert_eq!(body["min_score"], 0.4);
    assert_eq!(body["output_mode"], "both");
    assert!(body["weights"]["chunk"].is_number());
    assert!(body["weights"]["summary"].is_number());
}

#[tokio::test]
async fn test_out_of_order_scores_are_normalized() {
    let (url, _rx) = serve(
        200,
        r#"{"results":[
            {"id":"a","title":"A","result_type":"chunk","score":0.3,"authors":[]},
            {"id":"b","title":"B","result_type":"summary","score":0.9,"authors":[]},
            {"id":"c","title":"C","result_type":"chunk","score":0.6,"authors":[]}
        ],"total":3,"query_time_ms":12}"#,
    )
    .await;
    let client = client_for(&url, Duration::from_secs(5));

    let results = client.search(&client.query("waiver")).await.unwrap();
    let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "c", "a"]);
    assert!(is_score_ordered(&results));
}

#[tokio::test]
async fn test_server_error_is_http_status() {
    let (url, _rx) = serve(503, r#"{"detail":"index rebuilding"}"#).await;
    let client = client_for(&url, Duration::from_secs(5));

    let err = client.search(&client.query("duress")).await.unwrap_err();
    match err {
        RetrievalError::HttpStatus { status, body } => {
            assert_eq!(status, 503);
            assert!(body.contains("index rebuilding"));
        }
        other => panic!("expected HttpStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn test_long_non_ascii_error_body_is_cut_on_char_boundary() {
    // Two-byte 'é' straddles byte 512.
    let page: &'static str =
        Box::leak(format!("{}é la page est indisponible", "x".repeat(511)).into_boxed_str());
    let (url, _rx) = serve(500, page).await;
    let client = client_for(&url, Duration::from_secs(5));

    let err = client.search(&client.query("mistake")).await.unwrap_err();
    match err {
        RetrievalError::HttpStatus { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body.chars().count(), 512);
            assert!(body.ends_with('é'));
        }
        other => panic!("expected HttpStatus, got {other:?}"),
    }

    assert!(client.search_safe(&client.query("mistake")).await.is_empty());
}

#[tokio::test]
async fn test_schema_mismatch_is_malformed_response() {
    let (url, _rx) = serve(200, r#"{"results":[{"id":"X1","score":"high"}]}"#).await;
    let client = client_for(&url, Duration::from_secs(5));

    let err = client.search(&client.query("duress")).await.unwrap_err();
    assert!(matches!(err, RetrievalError::MalformedResponse(_)), "got {err:?}");
}

#[tokio::test]
async fn test_search_safe_swallows_every_failure_mode() {
    let (bad_status, _rx1) = serve(500, "boom").await;
    let (bad_body, _rx2) = serve(200, "not json").await;

    for url in [bad_status, bad_body, "http://127.0.0.1:1".to_string()] {
        let client = client_for(&url, Duration::from_secs(2));
        let results = client.search_safe(&client.query("frustration")).await;
        assert!(results.is_empty(), "expected empty results from {url}");
    }
}

#[tokio::test]
async fn test_search_safe_returns_within_timeout_when_service_hangs() {
    let url = serve_silently().await;
    let client = client_for(&url, Duration::from_millis(300));

    let started = Instant::now();
    let results = client.search_safe(&client.query("mistake")).await;
    assert!(results.is_empty());
    assert!(
        started.elapsed() < Duration::from_secs(3),
        "search_safe took {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn test_per_call_timeout_overrides_client_default() {
    let url = serve_silently().await;
    let client = client_for(&url, Duration::from_secs(30));

    let started = Instant::now();
    let err = client
        .search(&client.query("mistake").with_timeout(Duration::from_millis(200)))
        .await
        .unwrap_err();
    assert!(err.is_unavailable(), "got {err:?}");
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_health_check_reports_status() {
    let (healthy, mut rx) = serve(200, r#"{"status":"ok"}"#).await;
    let client = client_for(&healthy, Duration::from_secs(2));
    assert!(client.health_check().await);
    let captured = rx.recv().await.unwrap();
    assert!(captured.head.starts_with("GET /health "));

    let (unhealthy, _rx) = serve(503, "{}").await;
    let client = client_for(&unhealthy, Duration::from_secs(2));
    assert!(!client.health_check().await);

    let hanging = serve_silently().await;
    let client = client_for(&hanging, Duration::from_millis(200));
    let started = Instant::now();
    assert!(!client.health_check().await);
    assert!(started.elapsed() < Duration::from_secs(3));
}
