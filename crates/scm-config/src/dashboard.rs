use std::collections::BTreeMap;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use scm_core::{OrderStatus, ReconcileOptions, SlaTable};

pub const DEFAULT_ORDER_SHEET_URL: &str =
    "https://docs.google.com/spreadsheets/d/1BYyNlSrCrXpxVDphyIzO3xtjcJkPjABD8QsnH_yqtT0/edit#gid=624509827";
pub const DEFAULT_SUPPLIER_SHEET_URL: &str =
    "https://docs.google.com/spreadsheets/d/1BYyNlSrCrXpxVDphyIzO3xtjcJkPjABD8QsnH_yqtT0/edit#gid=1281142439";

/// Typed configuration. Every field has a default, so `{}` is valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub sheets: SheetsSection,
    pub refresh: RefreshSection,
    /// Stage label (e.g. `"Production"`) to SLA days. Overrides the defaults
    /// per stage; unlisted stages keep their default.
    pub sla: BTreeMap<String, u32>,
    pub defaults: DefaultsSection,
    pub mock: MockSection,
    pub daemon: DaemonSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetsSection {
    pub order_url: String,
    pub supplier_url: String,
}

impl Default for SheetsSection {
    fn default() -> Self {
        Self {
            order_url: DEFAULT_ORDER_SHEET_URL.to_string(),
            supplier_url: DEFAULT_SUPPLIER_SHEET_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshSection {
    pub interval_secs: u64,
    pub enabled: bool,
}

impl Default for RefreshSection {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsSection {
    pub client_country: String,
    pub supplier_country: String,
}

impl Default for DefaultsSection {
    fn default() -> Self {
        Self {
            client_country: "USA".to_string(),
            supplier_country: "India".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MockSection {
    pub order_count: usize,
    pub supplier_count: usize,
    /// Fixed seed for a reproducible demo dataset; entropy when absent.
    pub seed: Option<u64>,
}

impl Default for MockSection {
    fn default() -> Self {
        Self {
            order_count: 50,
            supplier_count: 7,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonSection {
    pub addr: String,
    /// JSON file backing the persisted data mode; in-memory when absent.
    pub state_file: Option<String>,
}

impl Default for DaemonSection {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8899".to_string(),
            state_file: None,
        }
    }
}

impl DashboardConfig {
    /// Reject values that parse but cannot be used.
    pub fn validate(&self) -> Result<()> {
        self.sla_table()?;
        if self.refresh.interval_secs == 0 {
            bail!("CONFIG_INVALID refresh.interval_secs must be > 0");
        }
        if self.mock.supplier_count == 0 && self.mock.order_count > 0 {
            bail!("CONFIG_INVALID mock.supplier_count must be > 0 when mock.order_count > 0");
        }
        Ok(())
    }

    /// Default SLA table with the configured overrides applied.
    pub fn sla_table(&self) -> Result<SlaTable> {
        let mut table = SlaTable::default();
        for (label, days) in &self.sla {
            let Some(stage) = OrderStatus::parse(label) else {
                bail!("CONFIG_INVALID unknown stage in sla: {label:?}");
            };
            table = table.with_override(stage, *days);
        }
        Ok(table)
    }

    pub fn reconcile_options(&self) -> Result<ReconcileOptions> {
        Ok(ReconcileOptions {
            sla: self.sla_table()?,
            default_client_country: self.defaults.client_country.clone(),
            default_supplier_country: self.defaults.supplier_country.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_all_defaults() {
        let cfg: DashboardConfig = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(cfg, DashboardConfig::default());
        assert_eq!(cfg.refresh.interval_secs, 60);
        assert_eq!(cfg.mock.order_count, 50);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn sla_overrides_accept_labels_and_idents() {
        let mut cfg = DashboardConfig::default();
        cfg.sla.insert("Production".to_string(), 15);
        cfg.sla.insert("READY_FOR_DISPATCH".to_string(), 4);
        let table = cfg.sla_table().unwrap();
        assert_eq!(table.days(OrderStatus::Production), 15);
        assert_eq!(table.days(OrderStatus::ReadyForDispatch), 4);
        assert_eq!(table.days(OrderStatus::FreshOrder), 2);
    }

    #[test]
    fn unknown_sla_stage_is_rejected() {
        let mut cfg = DashboardConfig::default();
        cfg.sla.insert("Shipping".to_string(), 3);
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("Shipping"), "{err}");
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut cfg = DashboardConfig::default();
        cfg.refresh.interval_secs = 0;
        assert!(cfg.validate().is_err());
    }
}
