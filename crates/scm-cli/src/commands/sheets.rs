//! `scm template` and `scm fetch`.

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};

use scm_core::dates::now_local;
use scm_core::reconcile_with;
use scm_core::template::{order_sheet_template, supplier_sheet_template};
use scm_sheets::{
    export_url_from_sheet_url, fetch_sheet_pair, HttpSheetSource, ORDER_SHEET_NAME,
    SUPPLIER_SHEET_NAME,
};

use super::{load_config, parse_now, report_errors, TemplateKind};

pub fn template(kind: TemplateKind, out: Option<&str>, date: Option<&str>) -> Result<ExitCode> {
    let today = parse_now(date)?.date();
    let body = match kind {
        TemplateKind::Orders => order_sheet_template(today),
        TemplateKind::Suppliers => supplier_sheet_template(today),
    }
    .context("render template failed")?;

    match out {
        Some(path) => {
            fs::write(path, &body).with_context(|| format!("failed to write {path}"))?;
            println!("template={kind:?} out={path}");
        }
        None => print!("{body}"),
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn fetch(
    order_url: Option<&str>,
    supplier_url: Option<&str>,
    out_dir: &str,
    config_paths: &[String],
) -> Result<ExitCode> {
    let cfg = load_config(config_paths)?;
    let opts = cfg.reconcile_options()?;

    let order_raw = order_url.unwrap_or(cfg.sheets.order_url.as_str());
    let supplier_raw = supplier_url.unwrap_or(cfg.sheets.supplier_url.as_str());
    let Some(order_export) = export_url_from_sheet_url(order_raw) else {
        bail!("{ORDER_SHEET_NAME}: not a Google Sheets URL: {order_raw}");
    };
    let Some(supplier_export) = export_url_from_sheet_url(supplier_raw) else {
        bail!("{SUPPLIER_SHEET_NAME}: not a Google Sheets URL: {supplier_raw}");
    };

    let source = HttpSheetSource::new();
    let pair = fetch_sheet_pair(&source, &order_export, &supplier_export)
        .await
        .context("Error loading from Google Sheets")?;

    let dir = Path::new(out_dir);
    fs::create_dir_all(dir).with_context(|| format!("failed to create {out_dir}"))?;
    let orders_path = dir.join("orders.csv");
    let suppliers_path = dir.join("suppliers.csv");
    fs::write(&orders_path, &pair.order_csv)
        .with_context(|| format!("failed to write {}", orders_path.display()))?;
    fs::write(&suppliers_path, &pair.supplier_csv)
        .with_context(|| format!("failed to write {}", suppliers_path.display()))?;

    let out = reconcile_with(&pair.order_csv, &pair.supplier_csv, &opts, now_local());
    println!(
        "fetched orders_csv={} suppliers_csv={}",
        orders_path.display(),
        suppliers_path.display()
    );
    println!(
        "orders={} suppliers={} errors={}",
        out.orders.len(),
        out.suppliers.len(),
        out.errors.len()
    );
    Ok(report_errors(&out.errors))
}
