use crate::fetch::HttpClient;
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue, InvalidHeaderValue};

/// An [`HttpClient`] wrapper that injects an API key as an HTTP header.
///
/// The MTA realtime endpoints have historically required an `x-api-key`
/// header; newer feeds are open. The wrapper is only applied when a key is
/// configured. The key is validated at construction, so `execute` cannot
/// fail on a malformed header value.
pub struct ApiKey<C> {
    inner: C,
    header_name: HeaderName,
    value: HeaderValue,
}

impl<C> ApiKey<C> {
    pub fn new(inner: C, header_name: HeaderName, key: &str) -> Result<Self, InvalidHeaderValue> {
        Ok(Self {
            inner,
            header_name,
            value: HeaderValue::from_str(key)?,
        })
    }

    /// Convenience constructor for the MTA's `x-api-key` header scheme.
    ///
    /// # Errors
    ///
    /// Fails if `key` contains bytes that are not valid in a header value.
    pub fn x_api_key(inner: C, key: &str) -> Result<Self, InvalidHeaderValue> {
        Self::new(inner, HeaderName::from_static("x-api-key"), key)
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for ApiKey<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        req.headers_mut()
            .insert(self.header_name.clone(), self.value.clone());
        self.inner.execute(req).await
    }
}
