use std::collections::HashMap;
use std::time::{Duration, Instant};

use anyhow::Result;
use futures::StreamExt;
use hookflow::webhook::{ChatContext, ChatPayload};
use hookflow::{
    AssistantDelta, AuthConfig, ChatContent, ConversationTurn, DeltaReconstructor, HookFlowError,
    PayloadBuilder, StreamEvent, StreamFrameParser, WebhookClient,
};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn turn() -> ConversationTurn {
    ConversationTurn::new(
        "conv-1",
        vec![
            ChatContent::System {
                content: "Be brief.".into(),
            },
            ChatContent::User {
                content: "What time is it?".into(),
            },
        ],
    )
}

fn payload(streaming: bool) -> ChatPayload {
    PayloadBuilder::new(streaming)
        .chat(&turn(), ChatContext::default())
        .unwrap()
}

fn client(server: &MockServer, auth: AuthConfig, timeout: Duration) -> WebhookClient {
    WebhookClient::new(format!("{}/hook", server.uri()), auth.headers(), timeout).unwrap()
}

#[tokio::test]
async fn non_streaming_call_returns_document() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header("Content-Type", "application/json"))
        .and(body_partial_json(json!({
            "conversation_id": "conv-1",
            "system_prompt": "Be brief.",
            "query": "What time is it?",
            "stream": false,
            "messages": [],
            "device_id": null
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"output": "Noon."})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, AuthConfig::none(), Duration::from_secs(5));
    let document = client.call(&payload(false)).await?;
    assert_eq!(document, json!({"output": "Noon."}));
    Ok(())
}

#[tokio::test]
async fn basic_auth_header_is_sent() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("Authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"output": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, AuthConfig::basic("user", "pass"), Duration::from_secs(5));
    client.call(&payload(false)).await?;
    Ok(())
}

#[tokio::test]
async fn non_ok_status_fails_both_modes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(2)
        .mount(&server)
        .await;

    let client = client(&server, AuthConfig::none(), Duration::from_secs(5));

    let err = client.call(&payload(false)).await.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert_eq!(
        err.to_string(),
        "error contacting webhook: HTTP 500 - Internal Server Error"
    );

    let err = client
        .call_streaming(&payload(true), StreamFrameParser::new("end"))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, HookFlowError::Http { status: 500, .. }));
}

#[tokio::test]
async fn created_status_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"output": "x"})))
        .mount(&server)
        .await;

    let client = client(&server, AuthConfig::none(), Duration::from_secs(5));
    let err = client.call(&payload(false)).await.unwrap_err();
    assert_eq!(err.status(), Some(201));
}

#[tokio::test]
async fn non_json_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let client = client(&server, AuthConfig::none(), Duration::from_secs(5));
    let err = client.call(&payload(false)).await.unwrap_err();
    assert!(matches!(err, HookFlowError::InvalidResponse(_)));
}

#[tokio::test]
async fn slow_webhook_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"output": "late"}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let client = client(&server, AuthConfig::none(), Duration::from_secs(1));
    let err = client.call(&payload(false)).await.unwrap_err();
    assert!(matches!(err, HookFlowError::Timeout(_)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn streaming_call_yields_events_and_skips_bad_lines() -> Result<()> {
    let server = MockServer::start().await;
    let body = concat!(
        "{\"type\":\"item\",\"content\":\"Hello\"}\n",
        "not json\n",
        "\n",
        "{\"type\":\"progress\"}\n",
        "{\"type\":\"item\",\"content\":\" world\"}\n",
        "{\"type\":\"end\"}\n",
        "{\"type\":\"item\",\"content\":\"ignored\"}\n",
    );
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, AuthConfig::none(), Duration::from_secs(5));
    let events: Vec<StreamEvent> = client
        .call_streaming(&payload(true), StreamFrameParser::new("end"))
        .await?
        .map(|event| event.unwrap())
        .collect()
        .await;

    assert_eq!(
        events,
        vec![
            StreamEvent::Content("Hello".into()),
            StreamEvent::Unrecognized,
            StreamEvent::Content(" world".into()),
            StreamEvent::EndMessage,
        ]
    );
    Ok(())
}

#[tokio::test]
async fn stream_flag_must_match_call_mode() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"output": "x"})))
        .expect(0)
        .mount(&server)
        .await;

    let client = client(&server, AuthConfig::none(), Duration::from_secs(5));
    let err = client.call(&payload(true)).await.unwrap_err();
    assert!(matches!(err, HookFlowError::MalformedInput(_)));

    let err = client
        .call_streaming(&payload(false), StreamFrameParser::new("end"))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, HookFlowError::MalformedInput(_)));
}

#[tokio::test]
async fn custom_headers_are_applied() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("X-Hook-Token", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"output": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut headers = HashMap::new();
    headers.insert("Content-Type".to_string(), "application/json".to_string());
    headers.insert("X-Hook-Token".to_string(), "secret".to_string());
    let client = WebhookClient::new(format!("{}/hook", server.uri()), headers, Duration::from_secs(5))?;
    client.call(&payload(false)).await?;
    Ok(())
}

/// 读完一个带 Content-Length 的请求
async fn read_request(socket: &mut TcpStream) -> std::io::Result<()> {
    let mut request = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = socket.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        request.extend_from_slice(&buf[..n]);
        if let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&request[..end]).to_ascii_lowercase();
            let length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if request.len() >= end + 4 + length {
                return Ok(());
            }
        }
    }
}

/// 只发送一个分块就停住的 NDJSON 服务
///
/// 返回的通道在服务端读到连接关闭时收到 `true`。
async fn stalling_webhook(line: &'static str) -> (String, oneshot::Receiver<bool>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/hook", listener.local_addr().unwrap());
    let (closed_tx, closed_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_request(&mut socket).await.unwrap();

        let chunk = format!("{line}\n");
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/x-ndjson\r\nTransfer-Encoding: chunked\r\n\r\n{:x}\r\n{}\r\n",
            chunk.len(),
            chunk
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.flush().await.unwrap();

        let mut buf = [0u8; 64];
        let closed = matches!(
            tokio::time::timeout(Duration::from_secs(10), socket.read(&mut buf)).await,
            Ok(Ok(0)) | Ok(Err(_))
        );
        let _ = closed_tx.send(closed);
    });

    (url, closed_rx)
}

#[tokio::test]
async fn stalled_stream_times_out_after_partial_content() -> Result<()> {
    let (url, _closed) = stalling_webhook(r#"{"type":"item","content":"Hi"}"#).await;
    let client = WebhookClient::new(url, AuthConfig::none().headers(), Duration::from_secs(1))?;

    let started = Instant::now();
    let mut events = client
        .call_streaming(&payload(true), StreamFrameParser::new("end"))
        .await?;

    assert_eq!(
        events.next().await.unwrap()?,
        StreamEvent::Content("Hi".into())
    );
    let err = events.next().await.unwrap().unwrap_err();
    assert!(matches!(err, HookFlowError::Timeout(_)));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(events.next().await.is_none());
    Ok(())
}

#[tokio::test]
async fn stalled_stream_truncates_deltas_with_timeout() -> Result<()> {
    let (url, _closed) = stalling_webhook(r#"{"type":"item","content":"Hi"}"#).await;
    let client = WebhookClient::new(url, AuthConfig::none().headers(), Duration::from_secs(1))?;

    let events = client
        .call_streaming(&payload(true), StreamFrameParser::new("end"))
        .await?;
    let mut deltas = DeltaReconstructor::new(true).reconstruct(events);

    assert_eq!(deltas.next().await.unwrap()?, AssistantDelta::Role);
    assert_eq!(
        deltas.next().await.unwrap()?,
        AssistantDelta::Content("Hi".into())
    );
    let err = deltas.next().await.unwrap().unwrap_err();
    assert!(matches!(err, HookFlowError::Timeout(_)));
    assert!(deltas.next().await.is_none());
    Ok(())
}

#[tokio::test]
async fn dropping_event_stream_closes_connection() -> Result<()> {
    let (url, closed) = stalling_webhook(r#"{"type":"item","content":"Hi"}"#).await;
    let client = WebhookClient::new(url, AuthConfig::none().headers(), Duration::from_secs(30))?;

    let mut events = client
        .call_streaming(&payload(true), StreamFrameParser::new("end"))
        .await?;
    assert_eq!(
        events.next().await.unwrap()?,
        StreamEvent::Content("Hi".into())
    );

    drop(events);
    assert!(tokio::time::timeout(Duration::from_secs(5), closed).await??);
    Ok(())
}
