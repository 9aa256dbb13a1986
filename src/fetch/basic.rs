use super::{FETCH_TIMEOUT, HttpClient};
use async_trait::async_trait;

/// Plain reqwest client with the crate-wide request timeout applied.
pub struct BasicClient(reqwest::Client);

impl BasicClient {
    pub fn new() -> Self {
        // Panics only if the TLS backend cannot be initialized, like
        // reqwest::Client::new().
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");
        Self(client)
    }
}

impl Default for BasicClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for BasicClient {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        self.0.execute(req).await
    }
}
