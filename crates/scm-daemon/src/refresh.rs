//! Loading, refreshing and editing the session dataset.
//!
//! Every attempt, skip, swap, fallback and cancellation logs one line and
//! mirrors it onto the SSE bus.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use scm_core::{dates::now_local, lifecycle::cancel_order, reconcile_with, Order, ReconcileOutput};
use scm_sheets::{export_url_from_sheet_url, fetch_sheet_pair};

use crate::kv::PERSISTED_DATA_MODE_KEY;
use crate::state::{AppState, DataMode, Dataset, RefreshTrigger, Session};

pub const INVALID_SHEET_URLS: &str =
    "Failed to load from the configured Google Sheets: invalid sheet URL(s) in configuration.";
pub const NO_DATA_FOUND: &str = "No data found in the configured Google Sheets.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RefreshOutcome {
    /// The load ran; `clean` is true when it swapped with zero errors.
    Completed { clean: bool },
    /// Another refresh of the same kind was in flight.
    Skipped,
    /// Refresh only applies to live mode.
    NotLive,
}

/// Result of a direct CSV import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub switched_to_live: bool,
    pub orders_count: usize,
    pub suppliers_count: usize,
    pub errors: Vec<String>,
}

/// Boot the session from the persisted data mode.
///
/// No flag: initial live attempt (falls back to mock on failure). `live`:
/// non-initial live attempt. `mock`: mock dataset, no network.
///
/// Live attempts hold the manual guard, so a manual refresh during boot skips.
pub async fn boot(st: &AppState) {
    match st.kv.get(PERSISTED_DATA_MODE_KEY).as_deref().and_then(DataMode::parse) {
        None => {
            info!("no persisted data mode; attempting live load");
            let _guard = st.manual_refresh.try_claim();
            attempt_load(st, true, false).await;
        }
        Some(DataMode::Live) => {
            info!("persisted data mode is live; refreshing");
            let _guard = st.manual_refresh.try_claim();
            attempt_load(st, false, false).await;
        }
        Some(DataMode::Mock) => {
            info!("persisted data mode is mock");
            let mut s = st.session.write().await;
            s.mode = DataMode::Mock;
            st.ensure_mock(&mut s);
            st.publish_dataset(&s);
        }
    }
}

/// Fetch both configured sheets, reconcile, and swap on success.
///
/// Returns `true` only when the swap happened with zero errors. An initial
/// attempt that yields nothing usable falls back to mock; any later failure
/// keeps the last-good dataset and records the error.
pub async fn attempt_load(st: &AppState, initial: bool, background: bool) -> bool {
    let kind = if background { "auto" } else { "manual" };
    info!(initial, kind, "sheet load attempt");

    let urls = (
        export_url_from_sheet_url(&st.config.sheets.order_url),
        export_url_from_sheet_url(&st.config.sheets.supplier_url),
    );
    let (Some(order_url), Some(supplier_url)) = urls else {
        warn!(kind, "invalid sheet url(s) in configuration");
        fail_attempt(st, initial, background, vec![INVALID_SHEET_URLS.to_string()]).await;
        return false;
    };

    let pair = match fetch_sheet_pair(st.source.as_ref(), &order_url, &supplier_url).await {
        Ok(pair) => pair,
        Err(err) => {
            warn!(kind, error = %err, "sheet fetch failed");
            let msg = format!("Error loading from Google Sheets: {err}");
            fail_attempt(st, initial, background, vec![msg]).await;
            return false;
        }
    };

    let out = reconcile_with(
        &pair.order_csv,
        &pair.supplier_csv,
        &st.reconcile_options,
        now_local(),
    );

    if out.has_data() {
        let clean = out.is_clean();
        return swap_live(st, out, background).await && clean;
    }

    let errors = if out.errors.is_empty() {
        vec![NO_DATA_FOUND.to_string()]
    } else {
        out.errors
    };
    fail_attempt(st, initial, background, errors).await;
    false
}

/// Guarded refresh. Auto and manual guards are independent; a trigger that
/// finds its own kind in flight skips.
pub async fn refresh(st: &AppState, trigger: RefreshTrigger) -> RefreshOutcome {
    if st.session.read().await.mode != DataMode::Live {
        return RefreshOutcome::NotLive;
    }
    let flag = match trigger {
        RefreshTrigger::Auto => &st.auto_refresh,
        RefreshTrigger::Manual => &st.manual_refresh,
    };
    let Some(_guard) = flag.try_claim() else {
        info!(kind = trigger.as_str(), "refresh skipped; already in flight");
        st.log("INFO", format!("{} refresh skipped (in flight)", trigger.as_str()));
        return RefreshOutcome::Skipped;
    };
    let clean = attempt_load(st, false, trigger == RefreshTrigger::Auto).await;
    RefreshOutcome::Completed { clean }
}

/// Leave mock mode by loading the configured sheets. The mode changes only
/// when the load yields data.
pub async fn switch_to_live(st: &AppState) -> RefreshOutcome {
    let Some(_guard) = st.manual_refresh.try_claim() else {
        return RefreshOutcome::Skipped;
    };
    let clean = attempt_load(st, false, false).await;
    RefreshOutcome::Completed { clean }
}

pub async fn switch_to_mock(st: &AppState) {
    st.persist_mode(DataMode::Mock);
    let mut s = st.session.write().await;
    s.mode = DataMode::Mock;
    s.errors.clear();
    st.ensure_mock(&mut s);
    s.dataset_id = Uuid::new_v4();
    info!("switched to mock data");
    st.log("INFO", "switched to mock data");
    st.publish_dataset(&s);
}

/// Reconcile uploaded text. Switches to live when anything usable came out
/// (or nothing went wrong); otherwise only the errors are recorded.
pub async fn import_csv(st: &AppState, order_csv: &str, supplier_csv: &str) -> ImportOutcome {
    let out = reconcile_with(order_csv, supplier_csv, &st.reconcile_options, now_local());
    let switched = out.has_data() || out.is_clean();
    let outcome = ImportOutcome {
        switched_to_live: switched,
        orders_count: out.orders.len(),
        suppliers_count: out.suppliers.len(),
        errors: out.errors.clone(),
    };
    if switched {
        swap_live(st, out, false).await;
    } else {
        warn!(errors = out.errors.len(), "import produced no data");
        let mut s = st.session.write().await;
        s.errors = out.errors;
        st.publish_dataset(&s);
    }
    outcome
}

/// Cancel one order in the active dataset. `None` when the id is unknown.
pub async fn cancel(st: &AppState, order_id: &str, reason: Option<&str>) -> Option<Order> {
    let mut s = st.session.write().await;
    let ds = s.active_mut()?;
    let slot = ds.orders.iter_mut().find(|o| o.id == order_id)?;
    let updated = cancel_order(slot, reason, now_local());
    *slot = updated.clone();
    s.dataset_id = Uuid::new_v4();
    st.log("INFO", format!("order {order_id} cancelled"));
    st.publish_dataset(&s);
    Some(updated)
}

/// Spawn the periodic auto-refresh. Ticks outside live mode are no-ops.
pub fn spawn_auto_refresh(st: Arc<AppState>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; boot already loaded.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let RefreshOutcome::Completed { clean } = refresh(&st, RefreshTrigger::Auto).await {
                info!(clean, "auto refresh finished");
            }
        }
    });
}

/// `false` when a background result was discarded because the session left
/// live mode while the fetch was in flight.
async fn swap_live(st: &AppState, out: ReconcileOutput, background: bool) -> bool {
    let mut s = st.session.write().await;
    if background && s.mode != DataMode::Live {
        info!(mode = s.mode.as_str(), "background result discarded; no longer live");
        return false;
    }
    st.persist_mode(DataMode::Live);
    let (orders, suppliers, errors) = (out.orders.len(), out.suppliers.len(), out.errors.len());
    s.live = Dataset {
        orders: out.orders,
        suppliers: out.suppliers,
    };
    s.errors = out.errors;
    s.mode = DataMode::Live;
    s.last_refreshed = Some(Utc::now());
    s.dataset_id = Uuid::new_v4();
    info!(orders, suppliers, errors, "live dataset swapped in");
    st.log(
        "INFO",
        format!("live data loaded: {orders} orders, {suppliers} suppliers, {errors} errors"),
    );
    st.publish_dataset(&s);
    true
}

async fn fail_attempt(st: &AppState, initial: bool, background: bool, errors: Vec<String>) {
    let mut s = st.session.write().await;
    if background && s.mode != DataMode::Live {
        return;
    }
    for e in &errors {
        st.log("ERROR", e.clone());
    }
    s.errors = errors;
    if initial {
        fall_back_to_mock(st, &mut s);
    }
    st.publish_dataset(&s);
}

fn fall_back_to_mock(st: &AppState, s: &mut Session) {
    // The next boot retries live.
    st.persist_mode(DataMode::Live);
    s.mode = DataMode::Mock;
    st.ensure_mock(s);
    s.dataset_id = Uuid::new_v4();
    warn!("initial live load failed; showing mock data");
    st.log("WARN", "initial live load failed; showing mock data");
}
