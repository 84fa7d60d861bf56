//! Per-stage pipeline metrics for the dashboard board.
//!
//! Two order sets are involved: `in_view` (after filters and search) drives
//! the in-stage counts and the live delay ratio, while `all` (every order in
//! the active dataset) drives the historical turnaround figures.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::dates::fractional_days;
use crate::types::{Order, OrderStatus, SlaTable};

/// Colour band of a stage card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    Good,
    /// Ready for Dispatch is always amber unless a delay band overrides it.
    Caution,
    Warning,
    Danger,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageMetrics {
    pub stage: OrderStatus,
    /// Historical mean days spent in the stage, one decimal.
    pub avg_tat_days: f64,
    pub sla: u32,
    pub on_time: usize,
    pub delayed: usize,
    pub current_in_stage: usize,
    /// 0..=100.
    pub delay_percentage: f64,
    /// Count behind `delay_percentage` (live when anything is in stage).
    pub delayed_instances: usize,
    pub health: Health,
}

pub fn stage_metrics(
    in_view: &[Order],
    all: &[Order],
    stage: OrderStatus,
    sla: &SlaTable,
    now: NaiveDateTime,
) -> StageMetrics {
    let limit = sla.days(stage);
    let limit_f = f64::from(limit);

    let mut total_tat = 0.0;
    let mut completed = 0usize;
    let mut on_time = 0usize;
    let mut delayed = 0usize;
    for order in all {
        let Some(entry) = order.history_entry(stage) else {
            continue;
        };
        let Some(end) = entry.end_date else {
            continue;
        };
        let tat = fractional_days(entry.start_date, end);
        total_tat += tat;
        completed += 1;
        // An SLA of 0 days means the stage has no SLA.
        if limit == 0 || tat <= limit_f {
            on_time += 1;
        } else {
            delayed += 1;
        }
    }
    let avg_tat_days = if completed > 0 {
        (total_tat / completed as f64 * 10.0).round() / 10.0
    } else {
        0.0
    };

    let in_stage: Vec<&Order> = in_view.iter().filter(|o| o.current_stage == stage).collect();
    let mut live_relevant = 0usize;
    let mut live_delayed = 0usize;
    for order in &in_stage {
        let Some(entry) = order.history_entry(stage) else {
            continue;
        };
        live_relevant += 1;
        if limit > 0 && fractional_days(entry.start_date, now) > limit_f {
            live_delayed += 1;
        }
    }

    let (delay_percentage, delayed_instances) = if live_relevant > 0 {
        (live_delayed as f64 / live_relevant as f64 * 100.0, live_delayed)
    } else if completed > 0 {
        (delayed as f64 / completed as f64 * 100.0, delayed)
    } else {
        (0.0, 0)
    };

    StageMetrics {
        stage,
        avg_tat_days,
        sla: limit,
        on_time,
        delayed,
        current_in_stage: in_stage.len(),
        delay_percentage,
        delayed_instances,
        health: health_for(stage, delay_percentage),
    }
}

fn health_for(stage: OrderStatus, delay_percentage: f64) -> Health {
    if stage.is_cancelled() {
        Health::Neutral
    } else if delay_percentage > 50.0 {
        Health::Danger
    } else if delay_percentage > 20.0 {
        Health::Warning
    } else if stage == OrderStatus::ReadyForDispatch {
        Health::Caution
    } else {
        Health::Good
    }
}

/// Metrics for every stage in pipeline order. The Cancelled column is
/// omitted when nothing in `all` is cancelled.
pub fn pipeline_board(
    in_view: &[Order],
    all: &[Order],
    sla: &SlaTable,
    now: NaiveDateTime,
) -> Vec<StageMetrics> {
    let any_cancelled = all.iter().any(Order::is_cancelled);
    OrderStatus::ALL
        .into_iter()
        .filter(|s| !s.is_cancelled() || any_cancelled)
        .map(|s| stage_metrics(in_view, all, s, sla, now))
        .collect()
}

/// Orders in `in_view` currently sitting in `stage` (the drill-down list).
pub fn orders_in_stage(in_view: &[Order], stage: OrderStatus) -> Vec<&Order> {
    in_view.iter().filter(|o| o.current_stage == stage).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::{add_days, parse_date};
    use crate::types::{PaymentStatus, StageHistoryItem};

    fn day(s: &str) -> NaiveDateTime {
        parse_date(s).unwrap()
    }

    fn order(id: &str, current: OrderStatus, history: Vec<StageHistoryItem>) -> Order {
        Order {
            id: id.to_string(),
            client_name: "Acme".to_string(),
            client_country: "USA".to_string(),
            order_date: day("2024-01-01"),
            current_stage: current,
            stage_history: history,
            line_items: Vec::new(),
            total_quantity: 0.0,
            total_quoted_price: 0.0,
            total_negotiated_price: 0.0,
            total_final_price: 0.0,
            total_supplier_cost: 0.0,
            client_payments: Vec::new(),
            payment_status: PaymentStatus::Pending,
            expected_payment_date: None,
            actual_payment_date: None,
            expected_delivery_date: None,
            actual_delivery_date: None,
            dispatch_date: None,
            sla_days_per_stage: SlaTable::default(),
            client_moq: None,
            order_notes: None,
            reason_for_cancellation: None,
        }
    }

    fn entry(stage: OrderStatus, start: &str, end_after: Option<i64>) -> StageHistoryItem {
        let start = day(start);
        StageHistoryItem {
            stage,
            start_date: start,
            end_date: end_after.map(|d| add_days(start, d)),
            is_delayed: None,
            notes: None,
        }
    }

    #[test]
    fn historical_tat_and_on_time_split() {
        let all = vec![
            order("A", OrderStatus::Production, vec![entry(OrderStatus::FreshOrder, "2024-01-01", Some(1))]),
            order("B", OrderStatus::Production, vec![entry(OrderStatus::FreshOrder, "2024-01-01", Some(4))]),
        ];
        let m = stage_metrics(&[], &all, OrderStatus::FreshOrder, &SlaTable::default(), day("2024-02-01"));
        assert_eq!(m.avg_tat_days, 2.5);
        assert_eq!((m.on_time, m.delayed), (1, 1));
        assert_eq!(m.current_in_stage, 0);
        assert_eq!(m.delay_percentage, 50.0);
        assert_eq!(m.delayed_instances, 1);
        assert_eq!(m.health, Health::Warning);
    }

    #[test]
    fn live_ratio_preferred_when_orders_in_stage() {
        let all = vec![
            order("A", OrderStatus::Production, vec![entry(OrderStatus::Production, "2024-01-01", None)]),
            order("B", OrderStatus::Production, vec![entry(OrderStatus::Production, "2024-01-25", None)]),
            order("C", OrderStatus::Delivered, vec![entry(OrderStatus::Production, "2024-01-01", Some(30))]),
        ];
        let m = stage_metrics(&all, &all, OrderStatus::Production, &SlaTable::default(), day("2024-02-01"));
        assert_eq!(m.current_in_stage, 2);
        assert_eq!(m.delayed, 1);
        assert_eq!(m.delayed_instances, 1);
        assert_eq!(m.delay_percentage, 50.0);
        assert_eq!(m.health, Health::Warning);
    }

    #[test]
    fn health_bands() {
        assert_eq!(health_for(OrderStatus::Production, 51.0), Health::Danger);
        assert_eq!(health_for(OrderStatus::Production, 20.0), Health::Good);
        assert_eq!(health_for(OrderStatus::ReadyForDispatch, 0.0), Health::Caution);
        assert_eq!(health_for(OrderStatus::ReadyForDispatch, 60.0), Health::Danger);
        assert_eq!(health_for(OrderStatus::Cancelled, 100.0), Health::Neutral);
    }

    #[test]
    fn cancelled_column_hidden_without_cancellations() {
        let now = day("2024-02-01");
        let live = vec![order("A", OrderStatus::Production, Vec::new())];
        let board = pipeline_board(&live, &live, &SlaTable::default(), now);
        assert_eq!(board.len(), 5);
        assert!(board.iter().all(|m| m.stage != OrderStatus::Cancelled));

        let mut all = live.clone();
        all.push(order("B", OrderStatus::Cancelled, Vec::new()));
        let board = pipeline_board(&live, &all, &SlaTable::default(), now);
        assert_eq!(board.len(), 6);
        assert_eq!(board[5].stage, OrderStatus::Cancelled);
        assert_eq!(board[5].current_in_stage, 0);
    }

    #[test]
    fn zero_sla_never_counts_live_delay() {
        let sla = SlaTable::default().with_override(OrderStatus::Production, 0);
        let all = vec![order("A", OrderStatus::Production, vec![entry(OrderStatus::Production, "2024-01-01", None)])];
        let m = stage_metrics(&all, &all, OrderStatus::Production, &sla, day("2024-06-01"));
        assert_eq!(m.delayed_instances, 0);
        assert_eq!(m.delay_percentage, 0.0);
    }

    #[test]
    fn zero_sla_never_counts_historical_delay() {
        let sla = SlaTable::default().with_override(OrderStatus::Production, 0);
        let all = vec![order("A", OrderStatus::Delivered, vec![entry(OrderStatus::Production, "2024-01-02", Some(28))])];
        let m = stage_metrics(&[], &all, OrderStatus::Production, &sla, day("2024-06-01"));
        assert_eq!((m.on_time, m.delayed), (1, 0));
        assert_eq!(m.delay_percentage, 0.0);
        assert_eq!(m.health, Health::Good);
    }
}
