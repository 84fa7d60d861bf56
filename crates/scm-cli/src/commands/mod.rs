//! Command handler modules for scm-cli.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod mock;
pub mod sheets;
pub mod views;

use std::fs;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::{Args, ValueEnum};

use scm_config::{
    load_dashboard_config, report_unused_keys, ConfigConsumer, DashboardConfig, UnusedKeyPolicy,
};
use scm_core::dates::{now_local, parse_date};
use scm_core::filters::FilterOptions;
use scm_core::{reconcile_with, ProductType, ReconcileOutput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TemplateKind {
    Orders,
    Suppliers,
}

/// Inputs shared by `reconcile`, `kpis` and `pipeline`.
#[derive(Debug, Clone, Args)]
pub struct ViewArgs {
    /// Order sheet CSV file
    #[arg(long)]
    pub orders: String,

    /// Supplier/Line-Item sheet CSV file
    #[arg(long)]
    pub suppliers: String,

    /// Layered config paths in merge order
    #[arg(long = "config")]
    pub config_paths: Vec<String>,

    /// Evaluate delays as of this date (YYYY-MM-DD); defaults to now
    #[arg(long)]
    pub now: Option<String>,

    /// Include cancelled orders in the view
    #[arg(long, default_value_t = false)]
    pub show_cancelled: bool,

    /// Search term (order id, client, product)
    #[arg(long)]
    pub search: Option<String>,

    /// Restrict to one order year
    #[arg(long)]
    pub year: Option<i32>,

    /// Restrict to client countries (repeatable)
    #[arg(long = "country")]
    pub countries: Vec<String>,

    /// Restrict to product types by label (repeatable)
    #[arg(long = "product-type")]
    pub product_types: Vec<String>,
}

impl ViewArgs {
    pub fn filter_options(&self) -> Result<FilterOptions> {
        let product_types = self
            .product_types
            .iter()
            .map(|l| ProductType::parse(l).with_context(|| format!("unknown product type: {l}")))
            .collect::<Result<Vec<_>>>()?;
        Ok(FilterOptions {
            show_cancelled_orders: self.show_cancelled,
            year: self.year,
            client_countries: self.countries.clone(),
            product_types,
            ..FilterOptions::default()
        })
    }
}

/// Typed config from `paths` (all defaults when empty); unused keys warn.
pub fn load_config(paths: &[String]) -> Result<DashboardConfig> {
    let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let (loaded, cfg) = load_dashboard_config(&path_refs)?;
    let report = report_unused_keys(ConfigConsumer::Cli, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    if !report.is_clean() {
        tracing::warn!(keys = ?report.unused_leaf_pointers, "unused config keys");
    }
    Ok(cfg)
}

pub fn parse_now(raw: Option<&str>) -> Result<NaiveDateTime> {
    match raw {
        None => Ok(now_local()),
        Some(s) => parse_date(s).with_context(|| format!("invalid date: {s}")),
    }
}

pub fn read_text(path: &str) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {path}"))
}

/// Read both files and reconcile them under the configured options.
pub fn reconcile_files(view: &ViewArgs) -> Result<(ReconcileOutput, NaiveDateTime, DashboardConfig)> {
    let cfg = load_config(&view.config_paths)?;
    let opts = cfg.reconcile_options()?;
    let now = parse_now(view.now.as_deref())?;
    let orders = read_text(&view.orders)?;
    let suppliers = read_text(&view.suppliers)?;
    let out = reconcile_with(&orders, &suppliers, &opts, now);
    tracing::info!(
        orders = out.orders.len(),
        suppliers = out.suppliers.len(),
        errors = out.errors.len(),
        "reconciled"
    );
    Ok((out, now, cfg))
}

/// Print reconciliation errors to stderr and map them to the exit code.
pub fn report_errors(errors: &[String]) -> ExitCode {
    for e in errors {
        eprintln!("reconcile_error: {e}");
    }
    if errors.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    }
}
