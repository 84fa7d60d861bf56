//! scm-sheets
//!
//! Remote (and local) sources for the two dashboard CSVs. This crate only
//! moves bytes; parsing and reconciliation live in `scm-core`.

mod file;
mod http;

pub use file::FileSheetSource;
pub use http::HttpSheetSource;

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

pub const ORDER_SHEET_NAME: &str = "Order Sheet";
pub const SUPPLIER_SHEET_NAME: &str = "Supplier Sheet";

fn sheet_id_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"spreadsheets/d/([a-zA-Z0-9_-]+)").ok())
        .as_ref()
}

fn gid_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[#&?]gid=([0-9]+)").ok()).as_ref()
}

/// Rewrite a Google Sheets share/edit URL to its CSV export form.
///
/// Export and publish-to-web CSV links pass through unchanged. A missing
/// `gid` means the first tab (`0`). Returns `None` when no spreadsheet ID
/// can be found.
pub fn export_url_from_sheet_url(url: &str) -> Option<String> {
    if url.contains("/export?format=csv") || url.contains("pub?output=csv") {
        return Some(url.to_string());
    }
    let id = sheet_id_re()?.captures(url)?.get(1)?.as_str();
    let gid = gid_re()
        .and_then(|re| re.captures(url))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or("0");
    Some(format!(
        "https://docs.google.com/spreadsheets/d/{id}/export?format=csv&gid={gid}"
    ))
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a sheet could not be read. `name` is the human label of the sheet
/// (e.g. [`ORDER_SHEET_NAME`]) and leads every message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Non-2xx response.
    Status {
        name: String,
        code: u16,
        reason: String,
    },
    /// 2xx response whose content type is not `text/csv`; usually a login
    /// page served for a private sheet.
    NotCsv {
        name: String,
        content_type: Option<String>,
    },
    /// Connection, DNS, TLS, body read or local IO failure.
    Transport { name: String, message: String },
}

impl FetchError {
    pub fn sheet_name(&self) -> &str {
        match self {
            FetchError::Status { name, .. }
            | FetchError::NotCsv { name, .. }
            | FetchError::Transport { name, .. } => name,
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Status { name, code, reason } => write!(
                f,
                "{name} ({code}): {reason}. Ensure the Google Sheet is public ('Anyone with the link can view')."
            ),
            FetchError::NotCsv { name, content_type } => write!(
                f,
                "{name}: Expected CSV content, but received '{}'. This often happens if the sheet is private, causing a redirect to a login page.",
                content_type.as_deref().unwrap_or("unknown")
            ),
            FetchError::Transport { name, message } => write!(
                f,
                "{name}: {message}. This may be a network issue. Please check your internet connection and Google Sheet sharing settings."
            ),
        }
    }
}

impl std::error::Error for FetchError {}

// ---------------------------------------------------------------------------
// Source trait
// ---------------------------------------------------------------------------

/// Where sheet text comes from.
#[async_trait::async_trait]
pub trait SheetSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    /// Fetch the full CSV text at `location`. `name` labels errors.
    async fn fetch_csv(&self, name: &str, location: &str) -> Result<String, FetchError>;
}

/// Raw text of both sheets, fetched together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetPair {
    pub order_csv: String,
    pub supplier_csv: String,
}

/// Fetch both sheets concurrently. The first failure wins.
pub async fn fetch_sheet_pair<S>(
    source: &S,
    order_location: &str,
    supplier_location: &str,
) -> Result<SheetPair, FetchError>
where
    S: SheetSource + ?Sized,
{
    let (order_csv, supplier_csv) = tokio::try_join!(
        source.fetch_csv(ORDER_SHEET_NAME, order_location),
        source.fetch_csv(SUPPLIER_SHEET_NAME, supplier_location),
    )?;
    tracing::debug!(
        source = source.source_name(),
        order_bytes = order_csv.len(),
        supplier_bytes = supplier_csv.len(),
        "sheet pair fetched"
    );
    Ok(SheetPair {
        order_csv,
        supplier_csv,
    })
}
