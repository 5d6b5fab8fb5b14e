//! Integration tests for the one-way progress stream monitor.
//!
//! Each test spins up a minimal in-process `text/event-stream` responder on
//! an ephemeral port.

use serde_json::json;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sync_link::{ProgressEndpoint, ProgressHandlers, ProgressMonitor, ProgressStatus};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::sleep;

const WAIT: Duration = Duration::from_secs(5);

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

async fn wait_until(deadline: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = tokio::time::Instant::now();
    while start.elapsed() < deadline {
        if cond() {
            return true;
        }
        sleep(Duration::from_millis(20)).await;
    }
    cond()
}

fn progress_json(step: u32, total: u32, status: &str) -> String {
    json!({
        "sandboxId": "sb-1",
        "step": step,
        "totalSteps": total,
        "status": status,
        "message": format!("step {}", step),
        "timestamp": "2026-01-12T10:00:00Z",
    })
    .to_string()
}

/// Serve one SSE response: emit `events` as `data:` frames with `gap`
/// between them, then close the connection. Captures the request line.
async fn spawn_sse_server(
    events: Vec<String>,
    gap: Duration,
) -> (SocketAddr, Arc<Mutex<Option<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let request_line: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    let captured = request_line.clone();

    tokio::spawn(async move {
        let Ok((mut stream, _)) = listener.accept().await else {
            return;
        };

        // Read the request head.
        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => {
                    head.extend_from_slice(&buf[..n]);
                    if head.windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                },
            }
        }
        let head_text = String::from_utf8_lossy(&head);
        *captured.lock().unwrap() = head_text.lines().next().map(str::to_string);

        let header = "HTTP/1.1 200 OK\r\n\
                      content-type: text/event-stream\r\n\
                      cache-control: no-cache\r\n\
                      connection: close\r\n\r\n";
        if stream.write_all(header.as_bytes()).await.is_err() {
            return;
        }
        for event in events {
            if !gap.is_zero() {
                sleep(gap).await;
            }
            let frame = format!("data: {}\n\n", event);
            if stream.write_all(frame.as_bytes()).await.is_err() {
                return;
            }
            let _ = stream.flush().await;
        }
        // Give the client a moment to drain before the socket drops.
        sleep(Duration::from_millis(100)).await;
    });

    (addr, request_line)
}

fn open_monitor(
    addr: SocketAddr,
    credential: Option<&str>,
    handlers: ProgressHandlers,
) -> ProgressMonitor {
    ProgressMonitor::open(
        &format!("http://{}", addr),
        &ProgressEndpoint::sandbox_sync(),
        "sb-1",
        credential,
        handlers,
    )
}

#[tokio::test]
async fn test_session_completes_and_on_complete_fires_once() {
    init_logging();
    let events = vec![
        progress_json(1, 5, "pending"),
        progress_json(3, 5, "in-progress"),
        progress_json(5, 5, "completed"),
    ];
    let (addr, request_line) = spawn_sse_server(events, Duration::ZERO).await;

    let completions = Arc::new(AtomicU32::new(0));
    let completions_clone = completions.clone();
    let handlers = ProgressHandlers::new().on_complete(move |_snapshot| {
        completions_clone.fetch_add(1, Ordering::SeqCst);
    });

    let monitor = open_monitor(addr, Some("secret"), handlers);
    assert!(wait_until(WAIT, || monitor.status() == ProgressStatus::Completed).await);

    let snapshot = monitor.snapshot();
    assert_eq!(snapshot.progress(), 100);
    assert_eq!(snapshot.step, 5);
    assert_eq!(completions.load(Ordering::SeqCst), 1);

    // Server closes shortly after the terminal event; no error synthesized.
    assert!(wait_until(WAIT, || !monitor.is_stream_connected()).await);
    assert_eq!(monitor.status(), ProgressStatus::Completed);
    sleep(Duration::from_millis(200)).await;
    assert_eq!(completions.load(Ordering::SeqCst), 1);

    // Credential rides as a query parameter on the per-operation URL.
    let line = request_line.lock().unwrap().clone().unwrap();
    assert!(line.starts_with("GET /api/sandboxes/sb-1/sync/progress?token=secret "));
}

#[tokio::test]
async fn test_interim_completed_substep_is_not_terminal() {
    init_logging();
    // A "completed" step event short of the final step must not terminate
    // the session.
    let events = vec![progress_json(3, 5, "completed")];
    let (addr, _) = spawn_sse_server(events, Duration::ZERO).await;

    let completions = Arc::new(AtomicU32::new(0));
    let completions_clone = completions.clone();
    let handlers = ProgressHandlers::new().on_complete(move |_snapshot| {
        completions_clone.fetch_add(1, Ordering::SeqCst);
    });

    let monitor = open_monitor(addr, None, handlers);
    assert!(wait_until(WAIT, || monitor.snapshot().step == 3).await);
    assert_eq!(monitor.status(), ProgressStatus::InProgress);
    assert_eq!(monitor.snapshot().progress(), 60);

    // Stream closes without a terminal event: status stays, flag flips.
    assert!(wait_until(WAIT, || !monitor.is_stream_connected()).await);
    assert_eq!(monitor.status(), ProgressStatus::InProgress);
    assert_eq!(completions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_error_event_is_terminal_and_later_events_are_ignored() {
    init_logging();
    let events = vec![
        progress_json(2, 5, "error"),
        progress_json(4, 5, "in-progress"),
        progress_json(5, 5, "completed"),
    ];
    let (addr, _) = spawn_sse_server(events, Duration::from_millis(50)).await;

    let error_count = Arc::new(AtomicU32::new(0));
    let error_count_clone = error_count.clone();
    let completions = Arc::new(AtomicU32::new(0));
    let completions_clone = completions.clone();
    let handlers = ProgressHandlers::new()
        .on_error(move |_snapshot| {
            error_count_clone.fetch_add(1, Ordering::SeqCst);
        })
        .on_complete(move |_snapshot| {
            completions_clone.fetch_add(1, Ordering::SeqCst);
        });

    let monitor = open_monitor(addr, None, handlers);
    assert!(wait_until(WAIT, || monitor.status() == ProgressStatus::Error).await);

    // Wait out the remaining scripted events; they must all be ignored.
    assert!(wait_until(WAIT, || !monitor.is_stream_connected()).await);
    assert_eq!(monitor.status(), ProgressStatus::Error);
    assert_eq!(monitor.snapshot().step, 2);
    assert_eq!(error_count.load(Ordering::SeqCst), 1);
    assert_eq!(completions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_reset_returns_session_to_idle() {
    init_logging();
    let events = vec![progress_json(5, 5, "completed")];
    let (addr, _) = spawn_sse_server(events, Duration::ZERO).await;

    let monitor = open_monitor(addr, None, ProgressHandlers::new());
    assert!(wait_until(WAIT, || monitor.status() == ProgressStatus::Completed).await);

    monitor.reset();
    let snapshot = monitor.snapshot();
    assert_eq!(snapshot.status, ProgressStatus::Idle);
    assert_eq!(snapshot.step, 0);
    assert!(snapshot.message.is_empty());
    assert!(snapshot.detail.is_none());
    assert_eq!(snapshot.progress(), 0);
    // Back to the provisional default.
    assert_eq!(snapshot.total_steps, 5);
}

#[tokio::test]
async fn test_close_is_immediate_and_leaves_status() {
    init_logging();
    let events = vec![
        progress_json(1, 5, "in-progress"),
        progress_json(2, 5, "in-progress"),
        progress_json(3, 5, "in-progress"),
    ];
    let (addr, _) = spawn_sse_server(events, Duration::from_millis(400)).await;

    let monitor = open_monitor(addr, None, ProgressHandlers::new());
    assert!(wait_until(WAIT, || monitor.snapshot().step >= 1).await);

    monitor.close();
    assert!(!monitor.is_stream_connected());
    let step_at_close = monitor.snapshot().step;
    assert_eq!(monitor.status(), ProgressStatus::InProgress);

    // No further events are applied after close.
    sleep(Duration::from_millis(600)).await;
    assert_eq!(monitor.snapshot().step, step_at_close);
}

#[tokio::test]
async fn test_absent_credential_opens_without_token() {
    init_logging();
    let events = vec![progress_json(1, 5, "pending")];
    let (addr, request_line) = spawn_sse_server(events, Duration::ZERO).await;

    let monitor = open_monitor(addr, None, ProgressHandlers::new());
    assert!(wait_until(WAIT, || monitor.snapshot().step == 1).await);

    let line = request_line.lock().unwrap().clone().unwrap();
    assert!(line.starts_with("GET /api/sandboxes/sb-1/sync/progress "));
    assert!(!line.contains("token="));
}

#[tokio::test]
async fn test_malformed_event_is_dropped_without_killing_session() {
    init_logging();
    let events = vec![
        "this is not json".to_string(),
        progress_json(2, 5, "in-progress"),
    ];
    let (addr, _) = spawn_sse_server(events, Duration::ZERO).await;

    let monitor = open_monitor(addr, None, ProgressHandlers::new());
    assert!(wait_until(WAIT, || monitor.snapshot().step == 2).await);
    assert_eq!(monitor.status(), ProgressStatus::InProgress);
}
