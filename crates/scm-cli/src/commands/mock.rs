//! `scm mock`: print a generated dataset.

use std::process::ExitCode;

use anyhow::{Context, Result};

use scm_core::dates::now_local;
use scm_core::mock::{generate_dataset, rng_from_seed};

use super::load_config;

pub fn mock(
    count: Option<usize>,
    suppliers: Option<usize>,
    seed: Option<u64>,
    config_paths: &[String],
) -> Result<ExitCode> {
    let cfg = load_config(config_paths)?;
    let sla = cfg.sla_table()?;

    let order_count = count.unwrap_or(cfg.mock.order_count);
    let supplier_count = suppliers.unwrap_or(cfg.mock.supplier_count);
    if supplier_count == 0 && order_count > 0 {
        anyhow::bail!("mock orders need at least one supplier");
    }

    let mut rng = rng_from_seed(seed.or(cfg.mock.seed));
    let ds = generate_dataset(supplier_count, order_count, &sla, now_local(), &mut rng);

    let doc = serde_json::json!({ "suppliers": ds.suppliers, "orders": ds.orders });
    println!(
        "{}",
        serde_json::to_string_pretty(&doc).context("serialize mock dataset failed")?
    );
    Ok(ExitCode::SUCCESS)
}
