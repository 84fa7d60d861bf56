use crate::{FetchError, SheetSource};

/// Reads sheets from local paths; stands in for a browser file upload.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSheetSource;

#[async_trait::async_trait]
impl SheetSource for FileSheetSource {
    fn source_name(&self) -> &'static str {
        "file"
    }

    async fn fetch_csv(&self, name: &str, location: &str) -> Result<String, FetchError> {
        tokio::fs::read_to_string(location)
            .await
            .map_err(|e| FetchError::Transport {
                name: name.to_string(),
                message: format!("failed to read {location}: {e}"),
            })
    }
}
