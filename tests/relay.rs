//! Relay Integration Tests
//!
//! Exercises the stream relay against a local fixture server speaking
//! raw HTTP/1.1 with an SSE body, plus the unreachable-upstream path.

use std::time::Duration;

use futures::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use edusphere::adapters::sse::{encode_frame, BACKEND_UNREACHABLE_FRAME};
use edusphere::core::{Coordinator, SessionContext};
use edusphere::domain::stage::{StageKey, StageStatus};
use edusphere::domain::wire::OrchestrateRequest;
use edusphere::{RelayConfig, StreamEvent, StreamRelay};

/// A port with nothing listening on it.
fn unreachable_base_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

/// Read one HTTP request (headers plus content-length body) off the socket.
async fn read_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 1024];
    loop {
        let Ok(n) = socket.read(&mut tmp).await else { return };
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&tmp[..n]);

        if let Some(head_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..head_end]).to_lowercase();
            let content_length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= head_end + 4 + content_length {
                return;
            }
        }
    }
}

/// Serve exactly one streaming response, writing each frame separately,
/// then close the connection.
async fn spawn_sse_server(frames: Vec<String>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            read_request(&mut socket).await;
            let head = "HTTP/1.1 200 OK\r\n\
                content-type: text/event-stream\r\n\
                cache-control: no-cache\r\n\
                connection: close\r\n\r\n";
            if socket.write_all(head.as_bytes()).await.is_err() {
                return;
            }
            for frame in frames {
                if socket.write_all(frame.as_bytes()).await.is_err() {
                    return;
                }
                socket.flush().await.ok();
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
            socket.shutdown().await.ok();
        }
    });

    format!("http://{addr}")
}

fn quiz_run_frames() -> Vec<String> {
    vec![
        encode_frame("agent_start", r#"{"agent": "intent", "message": "Analyzing your request..."}"#),
        encode_frame(
            "agent_complete",
            r#"{"agent": "intent", "duration": 0.3, "result": {"intent_type": "quiz_creation", "source": "manual_text", "target": "google_forms", "num_questions": 2, "confidence": 0.9}}"#,
        ),
        encode_frame("agent_start", r#"{"agent": "content", "message": "Extracting key topics..."}"#),
        encode_frame(
            "agent_complete",
            r#"{"agent": "content", "duration": 0.7, "result": {"key_topics": ["Inertia"], "summary": "s"}}"#,
        ),
        encode_frame("agent_start", r#"{"agent": "quiz", "message": "Generating quiz questions..."}"#),
        encode_frame(
            "agent_complete",
            r#"{"agent": "quiz", "duration": 1.4, "result": {"num_questions": 2}}"#,
        ),
        encode_frame("agent_start", r#"{"agent": "forms", "message": "Creating Google Form..."}"#),
        encode_frame(
            "agent_complete",
            r#"{"agent": "forms", "duration": 0.8, "result": {"form_url": "https://forms.example/f-9", "form_id": "f-9"}}"#,
        ),
        encode_frame("agent_start", r#"{"agent": "classroom", "message": "Assigning to Google Classroom..."}"#),
        encode_frame(
            "agent_complete",
            r#"{"agent": "classroom", "duration": 0.5, "result": {"delivery_status": "assigned", "platform": "google_classroom", "mode": "demo", "message": "ok"}}"#,
        ),
        encode_frame(
            "complete",
            r#"{"success": true, "message": "Quiz created", "total_duration": 3.7, "data": {"form_url": "https://forms.example/f-9", "questions": [{"question": "Q1", "options": ["a"], "correct_answer": "a"}]}}"#,
        ),
    ]
}

fn relay_for(base_url: String) -> StreamRelay {
    StreamRelay::new(&RelayConfig::default().with_base_url(base_url)).unwrap()
}

#[tokio::test]
async fn test_connect_failure_emits_exactly_one_synthetic_error_frame() {
    let relay = relay_for(unreachable_base_url());

    let chunks: Vec<_> = relay
        .stream(OrchestrateRequest::new("hello"))
        .collect()
        .await;

    assert_eq!(chunks.len(), 1);
    assert_eq!(&chunks[0][..], BACKEND_UNREACHABLE_FRAME.as_bytes());
}

#[tokio::test]
async fn test_connect_failure_decodes_to_error_event() {
    let relay = relay_for(unreachable_base_url());

    let events: Vec<_> = relay
        .events(OrchestrateRequest::new("hello"))
        .collect()
        .await;

    assert_eq!(events.len(), 1);
    match events[0].as_ref().unwrap() {
        StreamEvent::Error(error) => assert_eq!(error.message, "Backend not reachable"),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn test_relay_forwards_body_verbatim() {
    let frames = quiz_run_frames();
    let expected: String = frames.concat();
    let base_url = spawn_sse_server(frames).await;
    let relay = relay_for(base_url);

    let chunks: Vec<_> = relay
        .stream(OrchestrateRequest::new("quiz please"))
        .collect()
        .await;

    let forwarded: Vec<u8> = chunks.iter().flat_map(|chunk| chunk.to_vec()).collect();
    assert_eq!(forwarded, expected.as_bytes());
}

#[tokio::test]
async fn test_relay_decodes_full_event_sequence() {
    let base_url = spawn_sse_server(quiz_run_frames()).await;
    let relay = relay_for(base_url);

    let events: Vec<_> = relay
        .events(OrchestrateRequest::new("quiz please"))
        .collect()
        .await;

    assert_eq!(events.len(), 11);
    assert!(events.iter().all(Result::is_ok));
    match events.last().unwrap().as_ref().unwrap() {
        StreamEvent::Complete(response) => {
            assert!(response.success);
            assert_eq!(response.total_duration, Some(3.7));
        }
        other => panic!("unexpected terminal event: {other:?}"),
    }
}

#[tokio::test]
async fn test_streaming_run_end_to_end_over_the_relay() {
    let base_url = spawn_sse_server(quiz_run_frames()).await;
    let relay = relay_for(base_url);
    let coordinator = Coordinator::new(Duration::ZERO);
    let mut ctx = SessionContext::new();

    let run_id = coordinator.begin_run(&mut ctx, "quiz please");
    let events = relay.events(OrchestrateRequest::new("quiz please"));
    coordinator.run_streaming(&mut ctx, run_id, events).await;

    let run = ctx.current().unwrap();
    assert!(run
        .stages
        .iter()
        .all(|stage| stage.status == StageStatus::Completed));
    assert_eq!(run.total_duration, Some(3.7));
    assert_eq!(ctx.history().len(), 1);
    assert!(ctx.history()[0].success);
}

#[tokio::test]
async fn test_upstream_drop_after_two_stages_scopes_the_failure() {
    // Only the first two start/complete pairs make it out before the
    // connection closes
    let frames = quiz_run_frames().into_iter().take(4).collect::<Vec<_>>();
    let base_url = spawn_sse_server(frames).await;
    let relay = relay_for(base_url);
    let coordinator = Coordinator::new(Duration::ZERO);
    let mut ctx = SessionContext::new();

    let run_id = coordinator.begin_run(&mut ctx, "quiz please");
    let events = relay.events(OrchestrateRequest::new("quiz please"));
    coordinator.run_streaming(&mut ctx, run_id, events).await;

    let run = ctx.current().unwrap();
    assert_eq!(run.stage(StageKey::Intent).status, StageStatus::Completed);
    assert_eq!(run.stage(StageKey::Content).status, StageStatus::Completed);
    assert_eq!(run.stage(StageKey::Quiz).status, StageStatus::Error);
    assert_eq!(run.stage(StageKey::Forms).status, StageStatus::Error);
    assert_eq!(run.stage(StageKey::Classroom).status, StageStatus::Error);

    assert_eq!(ctx.history().len(), 1);
    assert!(!ctx.history()[0].success);
}

#[tokio::test]
async fn test_unknown_event_types_are_forwarded_but_skipped() {
    let mut frames = vec![encode_frame("heartbeat", r#"{"tick": 1}"#)];
    frames.extend(quiz_run_frames());
    let base_url = spawn_sse_server(frames).await;
    let relay = relay_for(base_url);

    let events: Vec<_> = relay
        .events(OrchestrateRequest::new("quiz please"))
        .collect()
        .await;

    // The heartbeat frame is dropped at the decode boundary
    assert_eq!(events.len(), 11);
    assert!(matches!(
        events[0].as_ref().unwrap(),
        StreamEvent::AgentStart(_)
    ));
}
