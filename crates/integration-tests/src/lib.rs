pub mod gemini;

use std::net::SocketAddr;
use std::time::Duration;

use config::Config;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use secrecy::SecretString;
use server::ServeConfig;
use tokio::net::TcpListener;
use tokio::time::timeout;

pub use gemini::{GeminiMock, RecordedRequest, SpawnedGemini};

/// Test client for making HTTP requests to the test server
pub struct TestClient {
    base_url: String,
    client: reqwest::Client,
}

impl TestClient {
    /// Create a new test client for the given base URL
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    /// Start a request with an arbitrary method
    pub fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client.request(method, format!("{}{}", self.base_url, path))
    }

    /// Send a POST request to the given path with JSON body
    pub async fn post(&self, path: &str, body: &serde_json::Value) -> reqwest::Response {
        self.request(reqwest::Method::POST, path).json(body).send().await.unwrap()
    }

    /// Send a GET request to the given path
    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.request(reqwest::Method::GET, path).send().await.unwrap()
    }

    /// Send a streaming completion request and collect the `data` field of every event
    pub async fn stream_events(&self, body: &serde_json::Value) -> Vec<String> {
        let response = self.post("/v1/chat/completions", body).await;
        assert_eq!(response.status(), 200, "streaming request was rejected");

        response
            .bytes_stream()
            .eventsource()
            .map(|event| event.unwrap().data)
            .collect()
            .await
    }
}

/// Builder for a test server, optionally pointed at a mock Gemini upstream
#[derive(Default)]
pub struct TestServerBuilder {
    upstream: Option<String>,
}

impl TestServerBuilder {
    /// Relay to the given mock upstream
    pub fn gemini(mut self, upstream: &SpawnedGemini) -> Self {
        self.upstream = Some(upstream.base_url());
        self
    }

    /// Start the server with the given TOML configuration
    pub async fn build(self, config_toml: &str) -> TestServer {
        let mut config: Config = toml::from_str(config_toml).unwrap();

        if let Some(base_url) = self.upstream {
            config.gemini.base_url = base_url;
        }

        if config.gemini.api_key.is_none() {
            config.gemini.api_key = Some(SecretString::from("test-key".to_string()));
        }

        TestServer::start(config).await
    }
}

/// Test server that manages the lifecycle of a server instance
pub struct TestServer {
    pub client: TestClient,
    pub address: SocketAddr,
    _handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub fn builder() -> TestServerBuilder {
        TestServerBuilder::default()
    }

    async fn start(config: Config) -> Self {
        // Find an available port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let serve_config = ServeConfig {
            listen_address: address,
            config,
        };

        let (tx, mut rx) = tokio::sync::oneshot::channel();

        let handle = tokio::spawn(async move {
            // Drop the listener so the server can bind to the address
            drop(listener);

            let result = server::serve(serve_config).await;
            let _ = tx.send(result);
        });

        tokio::time::sleep(Duration::from_millis(100)).await;

        if let Ok(Err(e)) = rx.try_recv() {
            eprintln!("Server failed to start: {e}");
            std::process::exit(1);
        }

        let client = TestClient::new(format!("http://{address}"));

        let mut retries = 10;

        while retries > 0 {
            let probe = client.request(reqwest::Method::GET, "/").send();

            if let Ok(Ok(_)) = timeout(Duration::from_millis(100), probe).await {
                break;
            }

            retries -= 1;
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        TestServer {
            client,
            address,
            _handle: handle,
        }
    }
}

/// Waits up to two seconds for the file at `path` to hold `count` lines and returns what it holds
pub async fn wait_for_lines(path: &std::path::Path, count: usize) -> Vec<String> {
    let mut lines = Vec::new();

    for _ in 0..100 {
        if let Ok(content) = std::fs::read_to_string(path) {
            lines = content.lines().map(str::to_string).collect();

            if lines.len() >= count {
                break;
            }
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    lines
}
