//! Order reconstructor.
//!
//! Turns each Order-sheet row into a [`PartialOrder`]: header fields, stage
//! history rebuilt from the `Stage_<Name>_StartDate` / `_EndDate` columns,
//! delay flags against the SLA table, and the derived dispatch date.
//!
//! Line items, totals and payment status are attached later by the engine.

use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::dates::{add_days, days_between, parse_date};
use crate::engine::ReconcileOptions;
use crate::sheet::{col, number_cell, NumberCell, Row, Sheet};
use crate::types::{OrderStatus, SlaTable, StageHistoryItem};

/// An order as read from the Order sheet, before line items are attached.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialOrder {
    pub id: String,
    pub client_name: String,
    pub client_country: String,
    pub order_date: NaiveDateTime,
    pub current_stage: OrderStatus,
    pub stage_history: Vec<StageHistoryItem>,
    pub expected_delivery_date: Option<NaiveDateTime>,
    pub actual_delivery_date: Option<NaiveDateTime>,
    pub expected_payment_date: Option<NaiveDateTime>,
    pub actual_payment_date: Option<NaiveDateTime>,
    pub dispatch_date: Option<NaiveDateTime>,
    pub client_moq: Option<f64>,
    pub order_notes: Option<String>,
    pub reason_for_cancellation: Option<String>,
    /// `None` when blank or unparseable.
    pub total_negotiated_price: Option<f64>,
    /// `None` when blank or unparseable.
    pub total_final_price: Option<f64>,
}

/// Rebuild every Order-sheet row. Output keeps first-appearance order; a
/// repeated `OrderID` replaces the earlier row in place.
pub fn reconstruct_orders(
    sheet: &Sheet,
    opts: &ReconcileOptions,
    now: NaiveDateTime,
    errors: &mut Vec<String>,
) -> Vec<PartialOrder> {
    let mut out: Vec<PartialOrder> = Vec::new();
    let mut position: HashMap<String, usize> = HashMap::new();

    for row in sheet.rows() {
        let Some(order_id) = row.get(col::ORDER_ID) else {
            errors.push(format!(
                "Order CSV (Row {}): Missing OrderID.",
                row.line_number()
            ));
            continue;
        };

        let partial = reconstruct_row(&row, order_id, opts, now, errors);
        match position.get(order_id) {
            Some(&i) => {
                errors.push(format!(
                    "Order CSV (Row {}): Duplicate OrderID \"{order_id}\". The later row replaces the earlier one.",
                    row.line_number()
                ));
                out[i] = partial;
            }
            None => {
                position.insert(order_id.to_string(), out.len());
                out.push(partial);
            }
        }
    }

    out
}

struct OrderCtx<'e> {
    order_id: String,
    errors: &'e mut Vec<String>,
}

impl OrderCtx<'_> {
    fn push(&mut self, msg: String) {
        self.errors
            .push(format!("Order CSV (OrderID: {}): {msg}", self.order_id));
    }

    fn warn(&mut self, msg: String) {
        self.errors
            .push(format!("Warning (OrderID: {}): {msg}", self.order_id));
    }

    fn date(&mut self, row: &Row<'_>, column: &str) -> Option<NaiveDateTime> {
        let raw = row.get(column)?;
        let parsed = parse_date(raw);
        if parsed.is_none() {
            self.push(format!("Invalid {column} \"{raw}\"."));
        }
        parsed
    }

    fn price(&mut self, row: &Row<'_>, column: &str) -> Option<f64> {
        match number_cell(row, column) {
            NumberCell::Blank => None,
            NumberCell::Value(v) => Some(v),
            NumberCell::Invalid(raw) => {
                self.push(format!("Invalid {column} \"{raw}\"."));
                None
            }
        }
    }
}

fn reconstruct_row(
    row: &Row<'_>,
    order_id: &str,
    opts: &ReconcileOptions,
    now: NaiveDateTime,
    errors: &mut Vec<String>,
) -> PartialOrder {
    let mut ctx = OrderCtx {
        order_id: order_id.to_string(),
        errors,
    };

    let raw_stage = row.get(col::CURRENT_STAGE).unwrap_or_default();
    let current_stage = OrderStatus::parse(raw_stage).unwrap_or_else(|| {
        ctx.push(format!(
            "Invalid CurrentStage value \"{raw_stage}\". Defaulting to '{}'.",
            OrderStatus::FreshOrder
        ));
        OrderStatus::FreshOrder
    });

    // A blank OrderDate falls back to now silently.
    let order_date = match row.get(col::ORDER_DATE) {
        Some(raw) => parse_date(raw).unwrap_or_else(|| {
            ctx.push(format!(
                "Invalid OrderDate \"{raw}\". Using current date as fallback."
            ));
            now
        }),
        None => now,
    };

    let expected_delivery_date = ctx.date(row, col::EXPECTED_DELIVERY_DATE);
    let actual_delivery_date = ctx.date(row, col::ACTUAL_DELIVERY_DATE);
    let expected_payment_date = ctx.date(row, col::EXPECTED_PAYMENT_DATE);
    let actual_payment_date = ctx.date(row, col::ACTUAL_PAYMENT_DATE);

    let total_negotiated_price = ctx.price(row, col::TOTAL_NEGOTIATED_PRICE);
    let total_final_price = ctx.price(row, col::TOTAL_FINAL_PRICE);

    let client_moq = match number_cell(row, col::CLIENT_MOQ) {
        NumberCell::Value(v) if v != 0.0 => Some(v),
        _ => None,
    };
    let reason_for_cancellation = row.get(col::REASON_FOR_CANCELLATION).map(str::to_string);

    let mut stage_history =
        pipeline_history(row, &mut ctx, current_stage, &opts.sla, now);

    let cancelled_col = OrderStatus::Cancelled.start_date_column();
    let cancelled_at = row.get(&cancelled_col).and_then(|raw| {
        let parsed = parse_date(raw);
        if parsed.is_none() {
            ctx.push(format!("Invalid Cancelled Stage StartDate \"{raw}\"."));
        }
        parsed
    });
    if let Some(start) = cancelled_at {
        stage_history.push(StageHistoryItem {
            stage: OrderStatus::Cancelled,
            start_date: start,
            end_date: None,
            is_delayed: None,
            notes: reason_for_cancellation.clone(),
        });
    }

    if stage_history.is_empty() {
        stage_history = fallback_history(order_date, current_stage);
    }

    consistency_warnings(&mut ctx, current_stage, &stage_history, cancelled_at.is_some());

    let dispatch_date = if current_stage.is_cancelled() {
        None
    } else {
        derive_dispatch_date(&stage_history)
    };

    PartialOrder {
        id: order_id.to_string(),
        client_name: row.get(col::CLIENT_NAME).unwrap_or_default().to_string(),
        client_country: row
            .get(col::CLIENT_COUNTRY)
            .map(str::to_string)
            .unwrap_or_else(|| opts.default_client_country.clone()),
        order_date,
        current_stage,
        stage_history,
        expected_delivery_date,
        actual_delivery_date,
        expected_payment_date,
        actual_payment_date,
        dispatch_date,
        client_moq,
        order_notes: row.get(col::ORDER_NOTES).map(str::to_string),
        reason_for_cancellation,
        total_negotiated_price,
        total_final_price,
    }
}

/// One history entry per pipeline stage with a parseable start date.
fn pipeline_history(
    row: &Row<'_>,
    ctx: &mut OrderCtx<'_>,
    current_stage: OrderStatus,
    sla: &SlaTable,
    now: NaiveDateTime,
) -> Vec<StageHistoryItem> {
    let mut history = Vec::new();

    for stage in OrderStatus::PIPELINE {
        let start_raw = row.get(&stage.start_date_column());
        let end_raw = row.get(&stage.end_date_column());

        let start = start_raw.and_then(|raw| {
            let parsed = parse_date(raw);
            if parsed.is_none() {
                ctx.push_stage(stage, format!("Invalid StartDate \"{raw}\"."));
            }
            parsed
        });
        let end = end_raw.and_then(|raw| {
            let parsed = parse_date(raw);
            if parsed.is_none() {
                ctx.push_stage(stage, format!("Invalid EndDate \"{raw}\"."));
            }
            parsed
        });

        let Some(start) = start else {
            if end.is_some() && start_raw.is_none() {
                ctx.warn(format!(
                    "Stage '{stage}' has an EndDate but no StartDate; stage ignored."
                ));
            }
            continue;
        };

        let is_delayed = stage_is_delayed(stage, start, end, current_stage, sla, now);
        history.push(StageHistoryItem {
            stage,
            start_date: start,
            end_date: end,
            is_delayed: Some(is_delayed),
            notes: is_delayed.then(|| format!("Exceeded SLA of {} days.", sla.days(stage))),
        });
    }

    history
}

impl OrderCtx<'_> {
    fn push_stage(&mut self, stage: OrderStatus, msg: String) {
        self.errors.push(format!(
            "Order CSV (OrderID: {}, Stage: {stage}): {msg}",
            self.order_id
        ));
    }
}

/// Closed stage: `(end - start) > SLA`. Open stage that is the current one
/// (and not Paid): `(now - start) > SLA`. An SLA of 0 never delays.
pub(crate) fn stage_is_delayed(
    stage: OrderStatus,
    start: NaiveDateTime,
    end: Option<NaiveDateTime>,
    current_stage: OrderStatus,
    sla: &SlaTable,
    now: NaiveDateTime,
) -> bool {
    let limit = i64::from(sla.days(stage));
    if limit == 0 {
        return false;
    }
    match end {
        Some(end) => days_between(start, end).unwrap_or(0) > limit,
        None if stage == current_stage && stage != OrderStatus::Paid => {
            days_between(start, now).unwrap_or(0) > limit
        }
        None => false,
    }
}

/// Minimal non-empty history when the sheet carried no stage dates.
fn fallback_history(order_date: NaiveDateTime, current: OrderStatus) -> Vec<StageHistoryItem> {
    let mut history = vec![StageHistoryItem {
        stage: OrderStatus::FreshOrder,
        start_date: order_date,
        end_date: None,
        is_delayed: Some(false),
        notes: None,
    }];
    if !matches!(current, OrderStatus::FreshOrder | OrderStatus::Cancelled) {
        history.push(StageHistoryItem {
            stage: current,
            start_date: add_days(order_date, 1),
            end_date: None,
            is_delayed: None,
            notes: None,
        });
    }
    history
}

/// Delivered start date, else Ready-for-Dispatch end date.
fn derive_dispatch_date(history: &[StageHistoryItem]) -> Option<NaiveDateTime> {
    let find = |s: OrderStatus| history.iter().find(|h| h.stage == s);
    find(OrderStatus::Delivered)
        .map(|h| h.start_date)
        .or_else(|| find(OrderStatus::ReadyForDispatch).and_then(|h| h.end_date))
}

/// Flag (but accept) rows whose `CurrentStage` disagrees with the stage columns.
fn consistency_warnings(
    ctx: &mut OrderCtx<'_>,
    current: OrderStatus,
    history: &[StageHistoryItem],
    has_cancel_date: bool,
) {
    if has_cancel_date && !current.is_cancelled() {
        ctx.warn(format!(
            "Stage_Cancelled_StartDate is set but CurrentStage is '{current}'."
        ));
    }
    if current.is_cancelled() && !has_cancel_date {
        ctx.warn("CurrentStage is 'Cancelled' but Stage_Cancelled_StartDate is empty.".to_string());
    }
    if let Some(entry) = history.iter().find(|h| h.stage == current) {
        if entry.end_date.is_some() && current != OrderStatus::Paid {
            ctx.warn(format!(
                "CurrentStage '{current}' already has an EndDate in the Order CSV."
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::SheetKind;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn run(text: &str, now: NaiveDateTime) -> (Vec<PartialOrder>, Vec<String>) {
        let sheet = Sheet::parse(SheetKind::Order, text);
        let mut errors = Vec::new();
        let out = reconstruct_orders(&sheet, &ReconcileOptions::default(), now, &mut errors);
        (out, errors)
    }

    const HEADER: &str = "OrderID,ClientName,OrderDate,CurrentStage,TotalFinalPrice";

    #[test]
    fn bogus_stage_coerced_with_error() {
        let (out, errors) = run(&format!("{HEADER}\nBM-1,Acme,2024-01-01,Bogus,100"), at(2024, 1, 2));
        assert_eq!(out[0].current_stage, OrderStatus::FreshOrder);
        assert_eq!(
            errors,
            vec!["Order CSV (OrderID: BM-1): Invalid CurrentStage value \"Bogus\". Defaulting to 'Fresh Order'."]
        );
    }

    #[test]
    fn invalid_order_date_falls_back_to_now() {
        let now = at(2024, 6, 1);
        let (out, errors) = run(&format!("{HEADER}\nBM-1,Acme,someday,Production,100"), now);
        assert_eq!(out[0].order_date, now);
        assert!(errors[0].contains("Invalid OrderDate \"someday\""));
    }

    #[test]
    fn blank_order_date_falls_back_without_error() {
        let now = at(2024, 6, 1);
        let (out, errors) = run(&format!("{HEADER}\nBM-1,Acme,,Production,100"), now);
        assert_eq!(out[0].order_date, now);
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn fallback_history_when_no_stage_columns() {
        let (out, _) = run(&format!("{HEADER}\nBM-1,Acme,2024-01-01,Production,100"), at(2024, 1, 2));
        let h = &out[0].stage_history;
        assert_eq!(h.len(), 2);
        assert_eq!(h[0].stage, OrderStatus::FreshOrder);
        assert_eq!(h[0].start_date, at(2024, 1, 1));
        assert_eq!(h[1].stage, OrderStatus::Production);
        assert_eq!(h[1].start_date, at(2024, 1, 2));
    }

    #[test]
    fn fallback_history_for_fresh_and_cancelled_is_single_entry() {
        let text = format!(
            "{HEADER}\nBM-1,Acme,2024-01-01,Fresh Order,100\nBM-2,Acme,2024-01-01,Cancelled,100"
        );
        let (out, _) = run(&text, at(2024, 1, 2));
        assert_eq!(out[0].stage_history.len(), 1);
        assert_eq!(out[1].stage_history.len(), 1);
        assert_eq!(out[1].stage_history[0].stage, OrderStatus::FreshOrder);
    }

    #[test]
    fn closed_and_open_stage_delay_flags() {
        let header = format!(
            "{HEADER},Stage_FreshOrder_StartDate,Stage_FreshOrder_EndDate,Stage_Production_StartDate"
        );
        let text = format!("{header}\nBM-1,Acme,2024-01-01,Production,100,2024-01-01,2024-01-05,2024-01-05");
        let (out, errors) = run(&text, at(2024, 2, 1));
        assert!(errors.is_empty(), "{errors:?}");
        let h = &out[0].stage_history;
        // Fresh: 4 days against SLA 2.
        assert_eq!(h[0].is_delayed, Some(true));
        assert_eq!(h[0].notes.as_deref(), Some("Exceeded SLA of 2 days."));
        // Production open since Jan 5, now Feb 1: 27 days against SLA 20.
        assert_eq!(h[1].is_delayed, Some(true));
        assert_eq!(h[1].end_date, None);
    }

    #[test]
    fn open_stage_not_current_is_not_delayed() {
        let header = format!("{HEADER},Stage_FreshOrder_StartDate");
        let text = format!("{header}\nBM-1,Acme,2024-01-01,Production,100,2024-01-01");
        let (out, _) = run(&text, at(2024, 6, 1));
        assert_eq!(out[0].stage_history[0].is_delayed, Some(false));
    }

    #[test]
    fn open_paid_stage_never_delays() {
        let header = format!("{HEADER},Stage_PaymentReceived_StartDate");
        let text = format!("{header}\nBM-1,Acme,2024-01-01,Payment Received,100,2024-01-01");
        let (out, _) = run(&text, at(2025, 1, 1));
        assert_eq!(out[0].stage_history[0].is_delayed, Some(false));
    }

    #[test]
    fn cancelled_entry_carries_reason_and_clears_dispatch() {
        let header = format!(
            "{HEADER},ReasonForCancellation,Stage_DeliveredtoClient_StartDate,Stage_Cancelled_StartDate"
        );
        let text = format!("{header}\nBM-1,Acme,2024-01-01,Cancelled,100,Client withdrew,2024-01-10,2024-01-12");
        let (out, errors) = run(&text, at(2024, 2, 1));
        let o = &out[0];
        let last = o.stage_history.last().unwrap();
        assert_eq!(last.stage, OrderStatus::Cancelled);
        assert_eq!(last.notes.as_deref(), Some("Client withdrew"));
        assert_eq!(o.dispatch_date, None);
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn cancel_date_with_live_stage_warns() {
        let header = format!("{HEADER},Stage_Cancelled_StartDate");
        let text = format!("{header}\nBM-1,Acme,2024-01-01,Production,100,2024-01-03");
        let (out, errors) = run(&text, at(2024, 1, 4));
        assert_eq!(out[0].current_stage, OrderStatus::Production);
        assert_eq!(
            errors,
            vec!["Warning (OrderID: BM-1): Stage_Cancelled_StartDate is set but CurrentStage is 'Production'."]
        );
    }

    #[test]
    fn dispatch_date_prefers_delivered_start() {
        let header = format!(
            "{HEADER},Stage_ReadyforDispatch_StartDate,Stage_ReadyforDispatch_EndDate,Stage_DeliveredtoClient_StartDate"
        );
        let text = format!(
            "{header}\nBM-1,Acme,2024-01-01,Delivered to Client,100,2024-01-02,2024-01-03,2024-01-04\nBM-2,Acme,2024-01-01,Production,100,2024-01-02,2024-01-03,"
        );
        let (out, _) = run(&text, at(2024, 1, 5));
        assert_eq!(out[0].dispatch_date, Some(at(2024, 1, 4)));
        assert_eq!(out[1].dispatch_date, Some(at(2024, 1, 3)));
    }

    #[test]
    fn invalid_stage_dates_reported_with_stage_label() {
        let header = format!("{HEADER},Stage_Production_StartDate,Stage_Production_EndDate");
        let text = format!("{header}\nBM-1,Acme,2024-01-01,Production,100,banana,");
        let (out, errors) = run(&text, at(2024, 1, 5));
        assert!(errors.contains(
            &"Order CSV (OrderID: BM-1, Stage: Production): Invalid StartDate \"banana\".".to_string()
        ));
        // No usable stage dates: fallback history applies.
        assert_eq!(out[0].stage_history.len(), 2);
    }

    #[test]
    fn missing_order_id_and_duplicates() {
        let text = format!("{HEADER}\n,Acme,2024-01-01,Production,1\nBM-1,First,2024-01-01,Production,1\nBM-1,Second,2024-01-01,Production,2");
        let (out, errors) = run(&text, at(2024, 1, 5));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].client_name, "Second");
        assert_eq!(errors[0], "Order CSV (Row 2): Missing OrderID.");
        assert!(errors[1].contains("Duplicate OrderID \"BM-1\""));
    }

    #[test]
    fn defaults_and_numeric_fields() {
        let header = format!("{HEADER},ClientCountry,ClientMOQ,TotalNegotiatedPrice");
        let text = format!("{header}\nBM-1,Acme,2024-01-01,Production,abc,,0,$950");
        let (out, errors) = run(&text, at(2024, 1, 5));
        let o = &out[0];
        assert_eq!(o.client_country, "USA");
        assert_eq!(o.client_moq, None);
        assert_eq!(o.total_negotiated_price, Some(950.0));
        assert_eq!(o.total_final_price, None);
        assert!(errors.contains(&"Order CSV (OrderID: BM-1): Invalid TotalFinalPrice \"abc\".".to_string()));
    }
}
