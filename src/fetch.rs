//! Remote cover sources.
//!
//! The pipeline only needs "bytes for an identifier", so the HTTP endpoint
//! sits behind [`CoverSource`]. Tests swap in an in-memory source.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::RecordError;

/// Placeholder in [`HttpCoverSource`] URL templates.
pub const ID_PLACEHOLDER: &str = "{id}";

/// Default endpoint: OpenLibrary's large cover by ISBN.
pub const DEFAULT_SOURCE_URL: &str = "https://covers.openlibrary.org/b/isbn/{id}-L.jpg";

/// Fetches raw cover bytes for an identifier.
#[async_trait]
pub trait CoverSource: Send + Sync {
    /// Human-readable location of the cover, used in dry-run output.
    fn describe(&self, identifier: &str) -> String;

    /// Fetch the raw payload. Small placeholder images are returned as-is;
    /// size filtering is the caller's job.
    async fn fetch(&self, identifier: &str) -> Result<Vec<u8>, RecordError>;
}

/// Fetches covers over HTTP(S) from a URL template containing `{id}`.
pub struct HttpCoverSource {
    client: reqwest::Client,
    url_template: String,
}

impl HttpCoverSource {
    pub fn new(url_template: impl Into<String>, timeout: Duration) -> Result<Self, RecordError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("bookshelf/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            url_template: url_template.into(),
        })
    }

    pub fn url_for(&self, identifier: &str) -> String {
        self.url_template.replace(ID_PLACEHOLDER, identifier)
    }
}

#[async_trait]
impl CoverSource for HttpCoverSource {
    fn describe(&self, identifier: &str) -> String {
        self.url_for(identifier)
    }

    async fn fetch(&self, identifier: &str) -> Result<Vec<u8>, RecordError> {
        let response = self
            .client
            .get(self.url_for(identifier))
            .send()
            .await?
            .error_for_status()?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}
