//! `scm reconcile`, `scm kpis` and `scm pipeline`.

use std::process::ExitCode;

use anyhow::{Context, Result};

use scm_core::filters::apply_filters;
use scm_core::kpi::{calculate_kpis, format_money};
use scm_core::pipeline::pipeline_board;

use super::{reconcile_files, report_errors, ViewArgs};

pub fn reconcile(view: &ViewArgs, json: bool) -> Result<ExitCode> {
    let (out, _, _) = reconcile_files(view)?;

    if json {
        let doc = serde_json::to_string_pretty(&out).context("serialize output failed")?;
        println!("{doc}");
    } else {
        println!(
            "orders={} suppliers={} errors={}",
            out.orders.len(),
            out.suppliers.len(),
            out.errors.len()
        );
        for o in &out.orders {
            println!(
                "order id={} client=\"{}\" stage=\"{}\" qty={} final={} cost={} payment=\"{}\"",
                o.id,
                o.client_name,
                o.current_stage,
                o.total_quantity,
                format_money(o.total_final_price),
                format_money(o.total_supplier_cost),
                o.payment_status.label()
            );
        }
    }

    Ok(report_errors(&out.errors))
}

pub fn kpis(view: &ViewArgs, json: bool) -> Result<ExitCode> {
    let (out, _, _) = reconcile_files(view)?;
    let in_view = apply_filters(&out.orders, &view.filter_options()?, view.search.as_deref());
    let summary = calculate_kpis(&in_view, &out.orders);

    if json {
        let doc = serde_json::json!({ "summary": summary, "tiles": summary.tiles() });
        println!("{}", serde_json::to_string_pretty(&doc).context("serialize kpis failed")?);
    } else {
        for t in summary.tiles() {
            match &t.unit {
                Some(unit) => println!("{}: {} {}", t.title, t.value, unit),
                None => println!("{}: {}", t.title, t.value),
            }
        }
    }

    Ok(report_errors(&out.errors))
}

pub fn pipeline(view: &ViewArgs, json: bool) -> Result<ExitCode> {
    let (out, now, cfg) = reconcile_files(view)?;
    let in_view = apply_filters(&out.orders, &view.filter_options()?, view.search.as_deref());
    let board = pipeline_board(&in_view, &out.orders, &cfg.sla_table()?, now);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&board).context("serialize pipeline failed")?
        );
    } else {
        for m in &board {
            println!(
                "stage=\"{}\" current={} avg_tat_days={} sla={} on_time={} delayed={} delay_pct={:.1} health={:?}",
                m.stage,
                m.current_in_stage,
                m.avg_tat_days,
                m.sla,
                m.on_time,
                m.delayed,
                m.delay_percentage,
                m.health
            );
        }
    }

    Ok(report_errors(&out.errors))
}
