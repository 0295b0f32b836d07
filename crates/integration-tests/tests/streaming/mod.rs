use std::time::Duration;

use eventsource_stream::Eventsource;
use futures::StreamExt;
use indoc::indoc;
use integration_tests::{GeminiMock, TestServer};
use serde_json::json;

const TWO_CHUNKS: &str = indoc! {r#"
    data: {"candidates":[{"content":{"parts":[{"text":"He"}]},"index":0}]}

    data: {"candidates":[{"content":{"parts":[{"text":"llo"}]},"finishReason":"STOP","index":0}]}

"#};

fn request(model: &str) -> serde_json::Value {
    json!({
        "model": model,
        "messages": [{"role": "user", "content": "hi"}],
        "stream": true
    })
}

fn chunk(data: &str) -> serde_json::Value {
    serde_json::from_str(data).unwrap()
}

#[tokio::test]
async fn relays_chunks_and_sentinel() {
    let upstream = GeminiMock::event_stream(TWO_CHUNKS).spawn().await;
    let server = TestServer::builder().gemini(&upstream).build("").await;

    let events = server.client.stream_events(&request("gemini-pro")).await;

    assert_eq!(events.len(), 3);
    assert_eq!(events[2], "[DONE]");

    let first = chunk(&events[0]);

    insta::assert_json_snapshot!(first, {
        ".id" => "[id]",
        ".created" => "[created]"
    }, @r#"
    {
      "id": "[id]",
      "object": "chat.completion.chunk",
      "created": "[created]",
      "model": "gemini-pro",
      "choices": [
        {
          "index": 0,
          "delta": {
            "content": "He"
          },
          "finish_reason": null
        }
      ]
    }
    "#);

    let second = chunk(&events[1]);
    assert_eq!(second["choices"][0]["delta"]["content"], "llo");
    assert_eq!(second["choices"][0]["finish_reason"], "STOP");
}

#[tokio::test]
async fn sse_response_headers() {
    let upstream = GeminiMock::event_stream(TWO_CHUNKS).spawn().await;
    let server = TestServer::builder().gemini(&upstream).build("").await;

    let response = server.client.post("/v1/chat/completions", &request("gemini-pro")).await;

    assert_eq!(response.status(), 200);

    let headers = response.headers();
    assert_eq!(headers["content-type"], "text/event-stream");
    assert_eq!(headers["cache-control"], "no-cache");
    assert_eq!(headers["access-control-allow-origin"], "*");
}

#[tokio::test]
async fn upstream_uses_stream_endpoint() {
    let upstream = GeminiMock::event_stream(TWO_CHUNKS).spawn().await;
    let server = TestServer::builder().gemini(&upstream).build("").await;

    server.client.stream_events(&request("gemini-1.5-flash")).await;

    let recorded = &upstream.requests()[0];

    assert_eq!(
        recorded.uri,
        "/v1beta/models/gemini-1.5-flash:streamGenerateContent?alt=sse&key=test-key"
    );
}

#[tokio::test]
async fn malformed_lines_are_skipped() {
    let body = indoc! {r#"
        data: {"candidates":[{"content":{"parts":[{"text":"a"}]},"index":0}]}

        data: {this is not json

        data: {"candidates":[]}

        data: {"candidates":[{"content":{"parts":[{"text":"b"}]},"index":0}]}

    "#};

    let upstream = GeminiMock::event_stream(body).spawn().await;
    let server = TestServer::builder().gemini(&upstream).build("").await;

    let events = server.client.stream_events(&request("gemini-pro")).await;

    let contents: Vec<_> = events[..events.len() - 1]
        .iter()
        .map(|data| chunk(data)["choices"][0]["delta"]["content"].clone())
        .collect();

    assert_eq!(contents, vec![json!("a"), json!("b")]);
    assert_eq!(events.last().map(String::as_str), Some("[DONE]"));
}

#[tokio::test]
async fn empty_upstream_stream() {
    let upstream = GeminiMock::event_stream("").spawn().await;
    let server = TestServer::builder().gemini(&upstream).build("").await;

    let events = server.client.stream_events(&request("gemini-pro")).await;

    assert_eq!(events, vec!["[DONE]".to_string()]);
}

#[tokio::test]
async fn upstream_error_before_stream() {
    let upstream = GeminiMock::error(429, "Resource has been exhausted").spawn().await;
    let server = TestServer::builder().gemini(&upstream).build("").await;

    let response = server.client.post("/v1/chat/completions", &request("gemini-pro")).await;

    assert_eq!(response.status(), 429);
    assert!(response.headers()["content-type"].to_str().unwrap().starts_with("text/plain"));
    assert_eq!(
        response.text().await.unwrap(),
        "Error from upstream API: Resource has been exhausted"
    );
}

#[tokio::test]
async fn chunk_reaches_client_while_upstream_is_open() {
    let first = indoc! {r#"
        data: {"candidates":[{"content":{"parts":[{"text":"He"}]},"index":0}]}

    "#};

    let upstream = GeminiMock::stalled_event_stream(first).spawn().await;
    let server = TestServer::builder().gemini(&upstream).build("").await;

    let response = server.client.post("/v1/chat/completions", &request("gemini-pro")).await;
    assert_eq!(response.status(), 200);

    let mut events = response.bytes_stream().eventsource();
    let event = tokio::time::timeout(Duration::from_secs(2), events.next())
        .await
        .expect("first chunk was not flushed")
        .unwrap()
        .unwrap();

    assert_eq!(chunk(&event.data)["choices"][0]["delta"]["content"], "He");
}
