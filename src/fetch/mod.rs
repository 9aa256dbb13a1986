mod basic;
pub mod auth;

pub use basic::BasicClient;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Request, Response};

use crate::error::FetchError;

/// Bound on a single feed request. The MTA feeds republish every few
/// seconds, so anything slower than this is stale by the time it lands.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}

/// Performs one GET against the feed endpoint and returns the raw payload.
///
/// One attempt per call. A non-2xx status becomes [`FetchError::Status`],
/// an elapsed timeout becomes [`FetchError::Timeout`], and everything else
/// transport-level becomes [`FetchError::Transport`].
pub async fn fetch_bytes<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
) -> Result<Vec<u8>, FetchError> {
    let parsed = reqwest::Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;

    let req = reqwest::Request::new(reqwest::Method::GET, parsed);

    let resp = client.execute(req).await?;

    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }

    Ok(resp.bytes().await?.to_vec())
}
