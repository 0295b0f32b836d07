use integration_tests::{GeminiMock, TestServer};
use serde_json::json;

#[tokio::test]
async fn chat_completion() {
    let upstream = GeminiMock::text("Hello! How can I help you today?").spawn().await;
    let server = TestServer::builder().gemini(&upstream).build("").await;

    let request = json!({
        "model": "gemini-pro",
        "messages": [{"role": "user", "content": "hi"}],
        "stream": false
    });

    let response = server.client.post("/v1/chat/completions", &request).await;

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "application/json");

    let body: serde_json::Value = response.json().await.unwrap();

    insta::assert_json_snapshot!(body, {
        ".id" => "[id]",
        ".created" => "[created]"
    }, @r#"
    {
      "id": "[id]",
      "object": "chat.completion",
      "created": "[created]",
      "model": "gemini-converted",
      "choices": [
        {
          "index": 0,
          "message": {
            "role": "assistant",
            "content": "Hello! How can I help you today?"
          },
          "finish_reason": "STOP"
        }
      ],
      "usage": {
        "prompt_tokens": 0,
        "completion_tokens": 5,
        "total_tokens": 5
      }
    }
    "#);

    let id = body["id"].as_str().unwrap();
    assert!(id.starts_with("genai-"));
    assert_eq!(id.len(), "genai-".len() + 12);
}

#[tokio::test]
async fn upstream_receives_gemini_request() {
    let upstream = GeminiMock::text("ok").spawn().await;
    let server = TestServer::builder().gemini(&upstream).build("").await;

    let request = json!({
        "model": "gemini-1.5-flash",
        "messages": [
            {"role": "system", "content": "You are terse"},
            {"role": "user", "content": "Hello"},
            {"role": "assistant", "content": "Hi"},
            {"role": "user", "content": "Bye"}
        ],
        "temperature": 0.5,
        "max_tokens": 64
    });

    let response = server.client.post("/v1/chat/completions", &request).await;
    assert_eq!(response.status(), 200);

    let requests = upstream.requests();
    assert_eq!(requests.len(), 1);

    let recorded = &requests[0];

    assert_eq!(
        recorded.uri,
        "/v1beta/models/gemini-1.5-flash:generateContent?key=test-key"
    );
    assert_eq!(recorded.content_type.as_deref(), Some("application/json"));

    insta::assert_json_snapshot!(recorded.body, @r#"
    {
      "contents": [
        {
          "role": "user",
          "parts": [
            {
              "text": "You are terse"
            }
          ]
        },
        {
          "role": "user",
          "parts": [
            {
              "text": "Hello"
            }
          ]
        },
        {
          "role": "model",
          "parts": [
            {
              "text": "Hi"
            }
          ]
        },
        {
          "role": "user",
          "parts": [
            {
              "text": "Bye"
            }
          ]
        }
      ],
      "generationConfig": {
        "temperature": 0.5,
        "maxOutputTokens": 64
      },
      "model": "gemini-1.5-flash"
    }
    "#);
}

#[tokio::test]
async fn missing_model_uses_default() {
    let upstream = GeminiMock::text("ok").spawn().await;
    let server = TestServer::builder().gemini(&upstream).build("").await;

    let request = json!({"messages": [{"role": "user", "content": "hi"}]});
    let response = server.client.post("/v1/chat/completions", &request).await;

    assert_eq!(response.status(), 200);

    let recorded = &upstream.requests()[0];
    assert!(recorded.uri.starts_with("/v1beta/models/gemini-pro:generateContent"));
    assert!(recorded.body.get("model").is_none());
}

#[tokio::test]
async fn configured_default_model() {
    let upstream = GeminiMock::text("ok").spawn().await;

    let config = indoc::indoc! {r#"
        [gemini]
        default_model = "gemini-1.5-pro"
    "#};

    let server = TestServer::builder().gemini(&upstream).build(config).await;

    let request = json!({"messages": [{"role": "user", "content": "hi"}]});
    server.client.post("/v1/chat/completions", &request).await;

    assert!(upstream.requests()[0].uri.starts_with("/v1beta/models/gemini-1.5-pro:"));
}

#[tokio::test]
async fn upstream_status_is_propagated() {
    let upstream = GeminiMock::error(429, "Resource has been exhausted").spawn().await;
    let server = TestServer::builder().gemini(&upstream).build("").await;

    let request = json!({"model": "gemini-pro", "messages": [{"role": "user", "content": "hi"}]});
    let response = server.client.post("/v1/chat/completions", &request).await;

    assert_eq!(response.status(), 429);
    assert!(response.headers()["content-type"].to_str().unwrap().starts_with("text/plain"));

    let body = response.text().await.unwrap();
    assert_eq!(body, "Error from upstream API: Resource has been exhausted");
    assert!(!body.contains("[DONE]"));
}

#[tokio::test]
async fn malformed_upstream_response() {
    let upstream = GeminiMock::json(json!("not a response")).spawn().await;
    let server = TestServer::builder().gemini(&upstream).build("").await;

    let request = json!({"model": "gemini-pro", "messages": [{"role": "user", "content": "hi"}]});
    let response = server.client.post("/v1/chat/completions", &request).await;

    assert_eq!(response.status(), 500);
    assert_eq!(response.text().await.unwrap(), "Failed to unmarshal Gemini response");
}

#[tokio::test]
async fn blocked_prompt_is_a_server_error() {
    let upstream = GeminiMock::json(json!({"promptFeedback": {"blockReason": "SAFETY"}}))
        .spawn()
        .await;

    let server = TestServer::builder().gemini(&upstream).build("").await;

    let request = json!({"model": "gemini-pro", "messages": [{"role": "user", "content": "hi"}]});
    let response = server.client.post("/v1/chat/completions", &request).await;

    assert_eq!(response.status(), 500);
    insta::assert_snapshot!(response.text().await.unwrap(), @"Gemini response has no candidates (prompt blocked: SAFETY)");
}

#[tokio::test]
async fn unreachable_upstream() {
    let config = indoc::indoc! {r#"
        [gemini]
        base_url = "http://127.0.0.1:1"
    "#};

    let server = TestServer::builder().build(config).await;

    let request = json!({"model": "gemini-pro", "messages": [{"role": "user", "content": "hi"}]});
    let response = server.client.post("/v1/chat/completions", &request).await;

    assert_eq!(response.status(), 500);
    assert_eq!(response.text().await.unwrap(), "Failed to send request to Gemini API");
}

#[tokio::test]
async fn malformed_request_body() {
    let upstream = GeminiMock::text("ok").spawn().await;
    let server = TestServer::builder().gemini(&upstream).build("").await;

    let response = server
        .client
        .request(reqwest::Method::POST, "/v1/chat/completions")
        .header("content-type", "application/json")
        .body("{\"messages\": [")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    assert_eq!(response.text().await.unwrap(), "Invalid request body");
    assert_eq!(upstream.request_count(), 0);
}

#[tokio::test]
async fn wrong_method() {
    let upstream = GeminiMock::text("ok").spawn().await;
    let server = TestServer::builder().gemini(&upstream).build("").await;

    let response = server.client.get("/v1/chat/completions").await;

    assert_eq!(response.status(), 405);
    assert_eq!(response.text().await.unwrap(), "Only POST method is allowed");
    assert_eq!(upstream.request_count(), 0);
}

#[tokio::test]
async fn large_request_is_forwarded() {
    let upstream = GeminiMock::text("ok").spawn().await;
    let server = TestServer::builder().gemini(&upstream).build("").await;

    let content = "a".repeat(3 * 1024 * 1024);
    let request = json!({"model": "gemini-pro", "messages": [{"role": "user", "content": content}]});

    let response = server.client.post("/v1/chat/completions", &request).await;

    assert_eq!(response.status(), 200);

    let recorded = &upstream.requests()[0];
    let forwarded = recorded.body["contents"][0]["parts"][0]["text"].as_str().unwrap();
    assert_eq!(forwarded.len(), content.len());
}

#[tokio::test]
async fn configured_body_limit() {
    let upstream = GeminiMock::text("ok").spawn().await;

    let config = indoc::indoc! {r#"
        [server]
        body_limit = 1024
    "#};

    let server = TestServer::builder().gemini(&upstream).build(config).await;

    let content = "a".repeat(2048);
    let request = json!({"model": "gemini-pro", "messages": [{"role": "user", "content": content}]});

    let response = server.client.post("/v1/chat/completions", &request).await;

    assert_eq!(response.status(), 413);
    assert_eq!(response.text().await.unwrap(), "Failed to read request body");
    assert_eq!(upstream.request_count(), 0);
}

#[tokio::test]
async fn null_model_and_content_are_empty() {
    let upstream = GeminiMock::text("ok").spawn().await;
    let server = TestServer::builder().gemini(&upstream).build("").await;

    let request = json!({
        "model": null,
        "messages": [
            {"role": "user", "content": "hi"},
            {"role": "assistant", "content": null}
        ]
    });

    let response = server.client.post("/v1/chat/completions", &request).await;

    assert_eq!(response.status(), 200);

    let recorded = &upstream.requests()[0];
    assert!(recorded.uri.starts_with("/v1beta/models/gemini-pro:generateContent"));
    assert_eq!(recorded.body["contents"][1]["parts"][0]["text"], "");
}
