//! Request and response types for all scm-daemon HTTP endpoints.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded
//! by Axum and decoded by tests. Domain payloads (orders, metrics) keep the
//! camelCase shape of `scm-core`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use scm_core::filters::{DateRange, FilterOptions};
use scm_core::kpi::{KpiSummary, KpiTile};
use scm_core::pipeline::StageMetrics;
use scm_core::{Order, ProductType, Supplier};

use crate::state::DataMode;

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

/// Body of every 4xx/5xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ---------------------------------------------------------------------------
// View query (orders, kpis, pipeline)
// ---------------------------------------------------------------------------

/// Filter bar and search box as query parameters. List parameters are
/// comma separated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewQuery {
    pub search: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub suppliers: Option<String>,
    pub countries: Option<String>,
    pub product_types: Option<String>,
    pub show_cancelled: bool,
    pub year: Option<i32>,
}

fn split_list(raw: &Option<String>) -> Vec<String> {
    raw.as_deref()
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl ViewQuery {
    /// Unknown product-type labels are rejected.
    pub fn filter_options(&self) -> Result<FilterOptions, String> {
        let product_types = split_list(&self.product_types)
            .iter()
            .map(|label| {
                ProductType::parse(label).ok_or_else(|| format!("unknown product type: {label}"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FilterOptions {
            date_range: DateRange {
                start: self.start,
                end: self.end,
            },
            supplier_ids: split_list(&self.suppliers),
            client_countries: split_list(&self.countries),
            product_types,
            show_cancelled_orders: self.show_cancelled,
            year: self.year,
        })
    }

    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().filter(|s| !s.trim().is_empty())
    }
}

// ---------------------------------------------------------------------------
// Dataset views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrdersResponse {
    pub data_mode: DataMode,
    /// Orders in the active dataset before filtering.
    pub total: usize,
    pub orders: Vec<Order>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuppliersResponse {
    pub suppliers: Vec<Supplier>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorsResponse {
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpisResponse {
    pub summary: KpiSummary,
    pub tiles: Vec<KpiTile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResponse {
    pub stages: Vec<StageMetrics>,
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    pub order_csv: String,
    pub supplier_csv: String,
}
