use integration_tests::{GeminiMock, TestServer, wait_for_lines};
use reqwest::Method;
use serde_json::json;

fn config(path: &std::path::Path) -> String {
    format!(
        "[auth]\ntoken = \"secret\"\n\n[access_log]\nenabled = true\npath = {:?}\n",
        path.display().to_string()
    )
}

fn parse(line: &str) -> serde_json::Value {
    serde_json::from_str(line).unwrap()
}

#[tokio::test]
async fn records_completion() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("requests.log");

    let upstream = GeminiMock::text("Hello").spawn().await;
    let server = TestServer::builder().gemini(&upstream).build(&config(&path)).await;

    let request = json!({"model": "gemini-pro", "messages": [{"role": "user", "content": "hi"}]});

    let response = server
        .client
        .request(Method::POST, "/v1/chat/completions")
        .bearer_auth("secret")
        .json(&request)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);

    let lines = wait_for_lines(&path, 1).await;
    assert_eq!(lines.len(), 1);

    let entry = parse(&lines[0]);

    insta::assert_json_snapshot!(entry, {
        ".timestamp" => "[timestamp]",
        ".final_response.id" => "[id]",
        ".final_response.created" => "[created]",
        ".upstream_url" => insta::dynamic_redaction(|value, _| {
            let url = value.as_str().unwrap();
            assert!(url.ends_with("/v1beta/models/gemini-pro:generateContent?key=[REDACTED]"));
            "[upstream]"
        })
    }, @r#"
    {
      "timestamp": "[timestamp]",
      "client_ip": "127.0.0.1",
      "model_requested": "gemini-pro",
      "upstream_url": "[upstream]",
      "request_to_proxy": {
        "model": "gemini-pro",
        "messages": [
          {
            "role": "user",
            "content": "hi"
          }
        ]
      },
      "request_to_upstream": {
        "contents": [
          {
            "role": "user",
            "parts": [
              {
                "text": "hi"
              }
            ]
          }
        ],
        "generationConfig": {},
        "model": "gemini-pro"
      },
      "response_from_upstream": {
        "candidates": [
          {
            "content": {
              "role": "model",
              "parts": [
                {
                  "text": "Hello"
                }
              ]
            },
            "finishReason": "STOP",
            "index": 0,
            "tokenCount": 5
          }
        ]
      },
      "final_response": {
        "id": "[id]",
        "object": "chat.completion",
        "created": "[created]",
        "model": "gemini-converted",
        "choices": [
          {
            "index": 0,
            "message": {
              "role": "assistant",
              "content": "Hello"
            },
            "finish_reason": "STOP"
          }
        ],
        "usage": {
          "prompt_tokens": 0,
          "completion_tokens": 5,
          "total_tokens": 5
        }
      },
      "status_code": 200
    }
    "#);
}

#[tokio::test]
async fn records_rejections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("requests.log");

    let upstream = GeminiMock::error(503, "overloaded").spawn().await;
    let server = TestServer::builder().gemini(&upstream).build(&config(&path)).await;

    let request = json!({"model": "gemini-pro", "messages": [{"role": "user", "content": "hi"}]});

    let response = server.client.post("/v1/chat/completions", &request).await;
    assert_eq!(response.status(), 401);

    let response = server
        .client
        .request(Method::POST, "/v1/chat/completions")
        .bearer_auth("secret")
        .json(&request)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 503);

    let lines = wait_for_lines(&path, 2).await;
    assert_eq!(lines.len(), 2);

    let unauthorized = parse(&lines[0]);
    assert_eq!(unauthorized["status_code"], 401);
    assert_eq!(unauthorized["error"], "Authorization header is required");

    let upstream_failure = parse(&lines[1]);
    assert_eq!(upstream_failure["status_code"], 503);
    assert_eq!(upstream_failure["error"], "Error from upstream API: overloaded");
}

#[tokio::test]
async fn records_stream_with_chunk_count() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("requests.log");

    let body = concat!(
        "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"He\"}]},\"index\":0}]}\n\n",
        "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"llo\"}]},\"finishReason\":\"STOP\",\"index\":0}]}\n\n",
    );

    let upstream = GeminiMock::event_stream(body).spawn().await;
    let server = TestServer::builder().gemini(&upstream).build(&config(&path)).await;

    let request = json!({
        "model": "gemini-pro",
        "messages": [{"role": "user", "content": "hi"}],
        "stream": true
    });

    let response = server
        .client
        .request(Method::POST, "/v1/chat/completions")
        .bearer_auth("secret")
        .json(&request)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    response.text().await.unwrap();

    let lines = wait_for_lines(&path, 1).await;
    assert_eq!(lines.len(), 1);

    let entry = parse(&lines[0]);
    assert_eq!(entry["status_code"], 200);
    assert_eq!(entry["chunks_relayed"], 2);
    assert!(entry.get("error").is_none());
    assert!(entry["response_from_upstream"].is_null());
}
