use super::{parse_csv, SheetSource};
use crate::error::FetchError;
use std::path::{Path, PathBuf};
use timetable_grid::RawRow;

/// CSV export on local disk
#[derive(Debug, Clone)]
pub struct FileCsvSource {
    path: PathBuf,
}

impl FileCsvSource {
    /// Source reading `path` on every fetch
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File path
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl SheetSource for FileCsvSource {
    async fn fetch_rows(&self) -> Result<Vec<RawRow>, FetchError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| FetchError::io(&self.path, e))?;
        parse_csv(&bytes)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
