use super::{parse_csv, SheetSource};
use crate::error::FetchError;
use std::time::Duration;
use timetable_grid::RawRow;

/// Published-to-web CSV fetched over HTTP
#[derive(Debug, Clone)]
pub struct HttpCsvSource {
    client: reqwest::Client,
    url: String,
}

impl HttpCsvSource {
    /// Source for `url` with a per-request `timeout`
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Sheet URL
    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl SheetSource for HttpCsvSource {
    async fn fetch_rows(&self) -> Result<Vec<RawRow>, FetchError> {
        tracing::debug!(url = %self.url, "fetching sheet");

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| FetchError::transport(&self.url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::transport(&self.url, e))?;
        parse_csv(&body)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}
