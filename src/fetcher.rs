use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use std::future::Future;
use std::time::Duration;

use crate::error::Result;

/// Timeout for the content-type lookup
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout for downloading the picture itself
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(25);

/// Where the processor gets remote pictures from
///
/// The HTTP implementation is used in production; tests plug in canned
/// responses.
pub trait ImageSource {
    /// Lower-cased `Content-Type` of `url`, `None` when it cannot be determined
    fn content_type(&self, url: &str) -> impl Future<Output = Option<String>> + Send;

    /// Body of `url`; non-success statuses are errors
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// True for `image/*` content types
pub fn is_image_content_type(ct: Option<&str>) -> bool {
    ct.is_some_and(|ct| ct.starts_with("image/"))
}

#[derive(Debug, Clone)]
pub struct HttpImageSource {
    client: Client,
    lookup_timeout: Duration,
    fetch_timeout: Duration,
}

impl HttpImageSource {
    pub fn new(lookup_timeout: Duration, fetch_timeout: Duration) -> Result<Self> {
        // reqwest follows redirects by default
        let client = Client::builder()
            .user_agent(concat!("image-opening/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(HttpImageSource {
            client,
            lookup_timeout,
            fetch_timeout,
        })
    }

    async fn read_content_type(&self, request: reqwest::RequestBuilder) -> Option<String> {
        let response = request.timeout(self.lookup_timeout).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        let ct = response.headers().get(CONTENT_TYPE)?.to_str().ok()?;
        Some(ct.to_ascii_lowercase())
    }
}

impl ImageSource for HttpImageSource {
    async fn content_type(&self, url: &str) -> Option<String> {
        if let Some(ct) = self.read_content_type(self.client.head(url)).await {
            return Some(ct);
        }
        // Some CDNs reject HEAD; only headers of the GET are read
        log::debug!("HEAD gave no usable content type for {}, retrying with GET", url);
        self.read_content_type(self.client.get(url)).await
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .timeout(self.fetch_timeout)
            .send()
            .await?
            .error_for_status()?;
        let bytes = response.bytes().await?;
        log::debug!("fetched {} bytes from {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }
}
