//! Shared runtime state for scm-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The dataset lives in
//! one session store behind a `RwLock` and is replaced whole on a swap.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use scm_config::DashboardConfig;
use scm_core::mock::{generate_dataset, rng_from_seed};
use scm_core::{dates::now_local, Order, ReconcileOptions, Supplier};
use scm_sheets::SheetSource;

use crate::kv::{KvStore, PERSISTED_DATA_MODE_KEY};

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Status(StatusSnapshot),
    LogLine { level: String, msg: String },
    /// The active dataset was replaced or edited.
    Dataset(DatasetEvent),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatasetEvent {
    pub dataset_id: Uuid,
    pub data_mode: DataMode,
    pub orders_count: usize,
    pub suppliers_count: usize,
    pub error_count: usize,
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// Session store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataMode {
    Mock,
    Live,
}

impl DataMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataMode::Mock => "mock",
            DataMode::Live => "live",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "mock" => Some(DataMode::Mock),
            "live" => Some(DataMode::Live),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub orders: Vec<Order>,
    pub suppliers: Vec<Supplier>,
}

static EMPTY_DATASET: Dataset = Dataset {
    orders: Vec::new(),
    suppliers: Vec::new(),
};

#[derive(Debug, Clone)]
pub struct Session {
    pub mode: DataMode,
    /// Last-good reconciled dataset.
    pub live: Dataset,
    /// Generated on first use and kept for the process lifetime.
    pub mock: Option<Dataset>,
    /// Errors from the most recent import or load attempt.
    pub errors: Vec<String>,
    pub last_refreshed: Option<DateTime<Utc>>,
    /// Changes whenever the active dataset is replaced or edited.
    pub dataset_id: Uuid,
}

impl Session {
    fn new(mode: DataMode) -> Self {
        Self {
            mode,
            live: Dataset::default(),
            mock: None,
            errors: Vec::new(),
            last_refreshed: None,
            dataset_id: Uuid::new_v4(),
        }
    }

    pub fn active(&self) -> &Dataset {
        match self.mode {
            DataMode::Live => &self.live,
            DataMode::Mock => self.mock.as_ref().unwrap_or(&EMPTY_DATASET),
        }
    }

    pub fn active_mut(&mut self) -> Option<&mut Dataset> {
        match self.mode {
            DataMode::Live => Some(&mut self.live),
            DataMode::Mock => self.mock.as_mut(),
        }
    }

    pub fn dataset_event(&self) -> DatasetEvent {
        let active = self.active();
        DatasetEvent {
            dataset_id: self.dataset_id,
            data_mode: self.mode,
            orders_count: active.orders.len(),
            suppliers_count: active.suppliers.len(),
            error_count: self.errors.len(),
        }
    }
}

// ---------------------------------------------------------------------------
// In-flight guards
// ---------------------------------------------------------------------------

/// Single-flight flag. A second claim while held fails instead of waiting.
#[derive(Debug, Default)]
pub struct InFlight(AtomicBool);

impl InFlight {
    pub fn try_claim(&self) -> Option<InFlightGuard<'_>> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard(&self.0))
    }

    pub fn is_held(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Releases the flag on drop, including on early return.
pub struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshTrigger {
    Auto,
    Manual,
}

impl RefreshTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshTrigger::Auto => "auto",
            RefreshTrigger::Manual => "manual",
        }
    }
}

// ---------------------------------------------------------------------------
// StatusSnapshot
// ---------------------------------------------------------------------------

/// Returned by GET /v1/status and carried inside SSE `status` events.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub daemon_uptime_secs: u64,
    pub data_mode: DataMode,
    pub orders_count: usize,
    pub suppliers_count: usize,
    pub error_count: usize,
    pub last_refreshed: Option<DateTime<Utc>>,
    pub dataset_id: Uuid,
    pub auto_refresh_enabled: bool,
    pub refresh_interval_secs: u64,
    pub auto_refresh_in_flight: bool,
    pub manual_refresh_in_flight: bool,
    pub config_hash: String,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub config: DashboardConfig,
    pub config_hash: String,
    pub reconcile_options: ReconcileOptions,
    pub source: Arc<dyn SheetSource>,
    pub kv: Arc<dyn KvStore>,
    pub session: RwLock<Session>,
    pub auto_refresh: InFlight,
    pub manual_refresh: InFlight,
}

impl AppState {
    /// The session starts in mock mode only when mock was persisted.
    pub fn new(
        config: DashboardConfig,
        config_hash: String,
        source: Arc<dyn SheetSource>,
        kv: Arc<dyn KvStore>,
    ) -> Result<Self> {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        let reconcile_options = config.reconcile_options()?;

        let mode = match kv.get(PERSISTED_DATA_MODE_KEY).as_deref().and_then(DataMode::parse) {
            Some(DataMode::Mock) => DataMode::Mock,
            _ => DataMode::Live,
        };

        Ok(Self {
            bus,
            build: BuildInfo {
                service: "scm-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            config,
            config_hash,
            reconcile_options,
            source,
            kv,
            session: RwLock::new(Session::new(mode)),
            auto_refresh: InFlight::default(),
            manual_refresh: InFlight::default(),
        })
    }

    pub async fn status_snapshot(&self) -> StatusSnapshot {
        let s = self.session.read().await;
        let active = s.active();
        StatusSnapshot {
            daemon_uptime_secs: uptime_secs(),
            data_mode: s.mode,
            orders_count: active.orders.len(),
            suppliers_count: active.suppliers.len(),
            error_count: s.errors.len(),
            last_refreshed: s.last_refreshed,
            dataset_id: s.dataset_id,
            auto_refresh_enabled: self.config.refresh.enabled,
            refresh_interval_secs: self.config.refresh.interval_secs,
            auto_refresh_in_flight: self.auto_refresh.is_held(),
            manual_refresh_in_flight: self.manual_refresh.is_held(),
            config_hash: self.config_hash.clone(),
        }
    }

    /// Generate the mock dataset if this session has none yet.
    pub fn ensure_mock(&self, session: &mut Session) {
        if session.mock.is_some() {
            return;
        }
        let cfg = &self.config.mock;
        let mut rng = rng_from_seed(cfg.seed);
        let ds = generate_dataset(
            cfg.supplier_count,
            cfg.order_count,
            &self.reconcile_options.sla,
            now_local(),
            &mut rng,
        );
        tracing::info!(
            orders = ds.orders.len(),
            suppliers = ds.suppliers.len(),
            "mock dataset generated"
        );
        session.mock = Some(Dataset {
            orders: ds.orders,
            suppliers: ds.suppliers,
        });
    }

    pub fn persist_mode(&self, mode: DataMode) {
        if let Err(err) = self.kv.set(PERSISTED_DATA_MODE_KEY, mode.as_str()) {
            tracing::warn!(error = %err, "failed to persist data mode");
        }
    }

    pub fn log(&self, level: &str, msg: impl Into<String>) {
        let _ = self.bus.send(BusMsg::LogLine {
            level: level.to_string(),
            msg: msg.into(),
        });
    }

    pub fn publish_dataset(&self, session: &Session) {
        let _ = self.bus.send(BusMsg::Dataset(session.dataset_event()));
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_blocks_second_claim_until_dropped() {
        let flag = InFlight::default();
        let g = flag.try_claim();
        assert!(g.is_some());
        assert!(flag.is_held());
        assert!(flag.try_claim().is_none());
        drop(g);
        assert!(!flag.is_held());
        assert!(flag.try_claim().is_some());
    }

    #[test]
    fn mock_session_without_dataset_is_empty() {
        let s = Session::new(DataMode::Mock);
        assert!(s.active().orders.is_empty());
        assert_eq!(s.dataset_event().data_mode, DataMode::Mock);
    }

    #[test]
    fn data_mode_round_trips_through_kv_strings() {
        assert_eq!(DataMode::parse(DataMode::Live.as_str()), Some(DataMode::Live));
        assert_eq!(DataMode::parse("mock"), Some(DataMode::Mock));
        assert_eq!(DataMode::parse("demo"), None);
    }
}
