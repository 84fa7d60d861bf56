use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE};

use crate::{FetchError, SheetSource};

/// Reads published sheets over HTTPS.
#[derive(Debug, Clone, Default)]
pub struct HttpSheetSource {
    http: reqwest::Client,
}

impl HttpSheetSource {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait::async_trait]
impl SheetSource for HttpSheetSource {
    fn source_name(&self) -> &'static str {
        "http"
    }

    async fn fetch_csv(&self, name: &str, location: &str) -> Result<String, FetchError> {
        let transport = |e: reqwest::Error| FetchError::Transport {
            name: name.to_string(),
            message: e.to_string(),
        };

        let resp = self
            .http
            .get(location)
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(transport)?;

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(sheet = name, status = status.as_u16(), "sheet fetch rejected");
            return Err(FetchError::Status {
                name: name.to_string(),
                code: status.as_u16(),
                reason: status
                    .canonical_reason()
                    .unwrap_or("Request Failed")
                    .to_string(),
            });
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if !content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("text/csv"))
        {
            tracing::warn!(sheet = name, content_type = ?content_type, "sheet is not csv");
            return Err(FetchError::NotCsv {
                name: name.to_string(),
                content_type,
            });
        }

        resp.text().await.map_err(transport)
    }
}
