//! Integration tests for the guarded spec fetcher against a local mock server.

mod support;
use support::socket_guard::{socket_tests_required, start_mock_server_or_skip};

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use spec_fetch_core::fetch::{FetchError, FetchPolicy, SecureFetcher};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

const MIB: usize = 1024 * 1024;

/// The mock server listens on 127.0.0.1, so the private host guard is relaxed.
fn local_fetcher(policy: FetchPolicy) -> SecureFetcher {
    SecureFetcher::new(FetchPolicy {
        allow_private_hosts: true,
        ..policy
    })
    .unwrap()
}

// ==================== Success Tests ====================

#[tokio::test]
async fn test_fetch_json_spec_returns_body_and_content_type() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    let body = r#"{"openapi":"3.0.0","info":{"title":"T","version":"1"}}"#;
    Mock::given(method("GET"))
        .and(path("/api/openapi.json"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/json"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = local_fetcher(FetchPolicy::default());
    let url = format!("{}/api/openapi.json", mock_server.uri());
    let result = fetcher.fetch(&url).await.unwrap();

    assert_eq!(result.text, body);
    assert_eq!(result.content_type, "application/json");
    assert_eq!(result.byte_length, body.len() as u64);
    assert_eq!(result.url, url);
}

#[tokio::test]
async fn test_fetch_sends_identifying_user_agent() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/openapi.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&mock_server)
        .await;

    let fetcher = local_fetcher(FetchPolicy::default());
    fetcher
        .fetch(&format!("{}/openapi.json", mock_server.uri()))
        .await
        .unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    let ua = requests[0]
        .headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(ua.starts_with("spec-fetch/"), "unexpected UA: {ua}");

    let accept = requests[0]
        .headers
        .get("accept")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(accept.starts_with("application/json"), "unexpected Accept: {accept}");
}

#[tokio::test]
async fn test_fetch_follows_redirect_and_reports_final_url() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/old/openapi.json"))
        .respond_with(
            ResponseTemplate::new(301)
                .insert_header("location", format!("{}/new/openapi.json", mock_server.uri())),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new/openapi.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"swagger":"2.0"}"#))
        .mount(&mock_server)
        .await;

    let fetcher = local_fetcher(FetchPolicy::default());
    let result = fetcher
        .fetch(&format!("{}/old/openapi.json", mock_server.uri()))
        .await
        .unwrap();

    assert!(result.url.ends_with("/new/openapi.json"));
    assert_eq!(result.text, r#"{"swagger":"2.0"}"#);
}

// ==================== Size Limit Tests ====================

#[tokio::test]
async fn test_fetch_body_exactly_at_limit_succeeds() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/openapi.json"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b' '; 3 * MIB]))
        .mount(&mock_server)
        .await;

    let fetcher = local_fetcher(FetchPolicy::default());
    let result = fetcher
        .fetch(&format!("{}/openapi.json", mock_server.uri()))
        .await
        .unwrap();
    assert_eq!(result.byte_length, (3 * MIB) as u64);
}

#[tokio::test]
async fn test_fetch_body_one_byte_over_limit_fails() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/openapi.json"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b' '; 3 * MIB + 1]))
        .mount(&mock_server)
        .await;

    let fetcher = local_fetcher(FetchPolicy::default());
    let err = fetcher
        .fetch(&format!("{}/openapi.json", mock_server.uri()))
        .await
        .unwrap_err();
    assert!(
        matches!(err, FetchError::TooLarge { limit, .. } if limit == (3 * MIB) as u64),
        "unexpected error: {err:?}"
    );
}

/// Serves one response without `Content-Length`, so the body ends when the
/// connection closes. Returns the upstream URL.
async fn serve_close_delimited_body(body_len: usize) -> Option<String> {
    let listener = match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(err) => {
            assert!(!socket_tests_required(), "loopback bind failed: {err}");
            eprintln!("no loopback socket for raw upstream ({err}); skipping");
            return None;
        }
    };
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        let mut request = Vec::new();
        let mut buf = [0_u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => request.extend_from_slice(&buf[..n]),
            }
        }
        let head = "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\nconnection: close\r\n\r\n";
        if socket.write_all(head.as_bytes()).await.is_err() {
            return;
        }
        // The client hangs up once it sees too many bytes.
        for chunk in vec![b' '; body_len].chunks(512) {
            if socket.write_all(chunk).await.is_err() {
                return;
            }
        }
        let _ = socket.shutdown().await;
    });

    Some(format!("http://{addr}/openapi.json"))
}

#[tokio::test]
async fn test_fetch_body_without_content_length_is_capped_while_streaming() {
    let Some(url) = serve_close_delimited_body(4096).await else {
        return;
    };

    let fetcher = local_fetcher(FetchPolicy {
        max_bytes: 1024,
        ..FetchPolicy::default()
    });
    let err = fetcher.fetch(&url).await.unwrap_err();
    assert!(
        matches!(err, FetchError::TooLarge { limit: 1024, .. }),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn test_fetch_body_without_content_length_under_limit_succeeds() {
    let Some(url) = serve_close_delimited_body(1000).await else {
        return;
    };

    let fetcher = local_fetcher(FetchPolicy {
        max_bytes: 1024,
        ..FetchPolicy::default()
    });
    let result = fetcher.fetch(&url).await.unwrap();
    assert_eq!(result.byte_length, 1000);
}

#[tokio::test]
async fn test_fetch_respects_custom_byte_limit() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/openapi.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(2048)))
        .mount(&mock_server)
        .await;

    let fetcher = local_fetcher(FetchPolicy {
        max_bytes: 1024,
        ..FetchPolicy::default()
    });
    let err = fetcher
        .fetch(&format!("{}/openapi.json", mock_server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::TooLarge { limit: 1024, .. }));
}

// ==================== Failure Tests ====================

#[tokio::test]
async fn test_fetch_non_success_status_is_reported() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let fetcher = local_fetcher(FetchPolicy::default());
    let err = fetcher
        .fetch(&format!("{}/missing/openapi.json", mock_server.uri()))
        .await
        .unwrap_err();
    match err {
        FetchError::HttpStatus { status, reason, .. } => {
            assert_eq!(status, 404);
            assert_eq!(reason, "Not Found");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_fetch_times_out_on_slow_upstream() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("{}")
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&mock_server)
        .await;

    let fetcher = local_fetcher(FetchPolicy {
        timeout: Duration::from_millis(200),
        ..FetchPolicy::default()
    });
    let err = fetcher
        .fetch(&format!("{}/openapi.json", mock_server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Timeout { .. }), "unexpected error: {err:?}");
}

#[tokio::test]
async fn test_fetch_redirect_loop_is_a_network_error() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", format!("{}/loop", mock_server.uri())),
        )
        .mount(&mock_server)
        .await;

    let fetcher = local_fetcher(FetchPolicy::default());
    let err = fetcher
        .fetch(&format!("{}/loop", mock_server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Network { .. }), "unexpected error: {err:?}");
}

#[tokio::test]
async fn test_fetch_redirect_to_non_http_scheme_is_rejected() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/docs/openapi.json"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", "ftp://example.com/openapi.json"),
        )
        .mount(&mock_server)
        .await;

    let fetcher = local_fetcher(FetchPolicy::default());
    let err = fetcher
        .fetch(&format!("{}/docs/openapi.json", mock_server.uri()))
        .await
        .unwrap_err();
    assert!(
        matches!(err, FetchError::InvalidProtocol { ref scheme, .. } if scheme == "ftp"),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn test_fetch_rejects_loopback_mock_by_default() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let fetcher = SecureFetcher::new(FetchPolicy::default()).unwrap();
    let err = fetcher
        .fetch(&format!("{}/openapi.json", mock_server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::PrivateHost { .. }));
}

#[tokio::test]
async fn test_fetch_rejects_non_http_scheme_without_network() {
    let fetcher = SecureFetcher::new(FetchPolicy::default()).unwrap();
    let err = fetcher.fetch("ftp://example.com/openapi.json").await.unwrap_err();
    assert!(matches!(err, FetchError::InvalidProtocol { ref scheme, .. } if scheme == "ftp"));
}
