use async_trait::async_trait;
use kernel::{FetchError, FetchedResource, Fetcher};
use reqwest::Client;
use url::Url;

/// Plain GET used to import documents from arbitrary URLs.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedResource, FetchError> {
        let parsed = Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_owned()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(url.to_owned()));
        }

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let data = response
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        tracing::debug!("fetched {url}: status {status}, {} bytes", data.len());

        Ok(FetchedResource {
            status,
            content_type,
            data,
        })
    }
}
