use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dates::now_local;
use crate::joiner::{join_supplier_rows, JoinedLineItems};
use crate::reconstruct::{reconstruct_orders, PartialOrder};
use crate::sheet::{Sheet, SheetKind};
use crate::types::{round2, Order, OrderStatus, PaymentStatus, SlaTable, Supplier};

/// Knobs for one reconciliation run.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOptions {
    pub sla: SlaTable,
    /// Used when `ClientCountry` is blank.
    pub default_client_country: String,
    /// The Supplier sheet carries no country column.
    pub default_supplier_country: String,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            sla: SlaTable::default(),
            default_client_country: "USA".to_string(),
            default_supplier_country: "India".to_string(),
        }
    }
}

/// `{orders, suppliers, errors}` produced by one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconcileOutput {
    pub orders: Vec<Order>,
    pub suppliers: Vec<Supplier>,
    /// Flat, ordered, human-readable. Warnings carry a `Warning` prefix.
    pub errors: Vec<String>,
}

impl ReconcileOutput {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// True when anything usable came out of the run.
    pub fn has_data(&self) -> bool {
        !self.orders.is_empty() || !self.suppliers.is_empty()
    }
}

/// Reconcile an Order sheet and a Supplier/Line-Item sheet with default
/// options and the current local time.
pub fn reconcile(order_csv: &str, supplier_csv: &str) -> ReconcileOutput {
    reconcile_with(order_csv, supplier_csv, &ReconcileOptions::default(), now_local())
}

/// Reconcile with explicit options and clock.
///
/// Structural failure (an empty sheet or a missing required header) returns
/// no orders and no suppliers, only the errors. When *both* sheets are empty
/// the run continues and simply yields nothing. Every other problem is
/// row-level: the value is defaulted and a message appended.
pub fn reconcile_with(
    order_csv: &str,
    supplier_csv: &str,
    opts: &ReconcileOptions,
    now: NaiveDateTime,
) -> ReconcileOutput {
    let order_sheet = Sheet::parse(SheetKind::Order, order_csv);
    let supplier_sheet = Sheet::parse(SheetKind::Supplier, supplier_csv);

    let mut errors: Vec<String> = order_sheet
        .structural_errors()
        .into_iter()
        .chain(supplier_sheet.structural_errors())
        .map(|e| e.to_string())
        .collect();

    let both_empty = order_sheet.is_empty() && supplier_sheet.is_empty();
    if !errors.is_empty() && !both_empty {
        info!(errors = errors.len(), "reconcile: structural failure");
        return ReconcileOutput {
            errors,
            ..Default::default()
        };
    }

    let mut joined = join_supplier_rows(&supplier_sheet, opts, &mut errors);
    let partials = reconstruct_orders(&order_sheet, opts, now, &mut errors);
    debug!(
        order_rows = order_sheet.data_row_count(),
        supplier_rows = supplier_sheet.data_row_count(),
        line_items = joined.line_item_count(),
        "reconcile: sheets indexed"
    );

    let orders: Vec<Order> = partials
        .into_iter()
        .map(|p| merge_order(p, &mut joined, opts, now, &mut errors))
        .collect();

    for (order_id, count) in joined.remaining() {
        errors.push(format!(
            "Warning (OrderID: {order_id}): {count} line item(s) in Supplier CSV have no matching row in Order CSV and were skipped."
        ));
    }

    let out = ReconcileOutput {
        orders,
        suppliers: joined.suppliers,
        errors,
    };
    info!(
        orders = out.orders.len(),
        suppliers = out.suppliers.len(),
        errors = out.errors.len(),
        "reconcile: done"
    );
    out
}

fn merge_order(
    p: PartialOrder,
    joined: &mut JoinedLineItems,
    opts: &ReconcileOptions,
    now: NaiveDateTime,
    errors: &mut Vec<String>,
) -> Order {
    let line_items = joined.take_items(&p.id);

    let total_quantity: f64 = line_items.iter().map(|li| li.quantity).sum();
    let total_supplier_cost = round2(line_items.iter().map(|li| li.supplier_cost()).sum());

    if p.total_final_price.is_none() {
        errors.push(format!(
            "Warning (OrderID: {}): TotalFinalPrice (Client Price) is missing or invalid in Order CSV. Order value calculations may be incorrect. Defaulted to $0.",
            p.id
        ));
    }
    let total_final_price = round2(p.total_final_price.unwrap_or(0.0));
    let total_negotiated_price = match p.total_negotiated_price {
        Some(v) if v != 0.0 => round2(v),
        _ => total_final_price,
    };

    let payment_status = import_payment_status(
        p.current_stage,
        p.expected_payment_date,
        p.actual_payment_date,
        now,
    );

    if total_supplier_cost == 0.0
        && !p.current_stage.is_cancelled()
        && line_items.iter().any(|li| li.quantity > 0.0)
    {
        errors.push(format!(
            "Warning (OrderID: {}): Total Supplier Cost is $0. Add 'FinalPricePerUnit' (supplier unit cost) to the Supplier/Line Item CSV for accurate supplier-cost metrics.",
            p.id
        ));
    }

    Order {
        id: p.id,
        client_name: p.client_name,
        client_country: p.client_country,
        order_date: p.order_date,
        current_stage: p.current_stage,
        stage_history: p.stage_history,
        line_items,
        total_quantity,
        total_quoted_price: total_negotiated_price,
        total_negotiated_price,
        total_final_price,
        total_supplier_cost,
        client_payments: Vec::new(),
        payment_status,
        expected_payment_date: p.expected_payment_date,
        actual_payment_date: p.actual_payment_date,
        expected_delivery_date: p.expected_delivery_date,
        actual_delivery_date: p.actual_delivery_date,
        dispatch_date: p.dispatch_date,
        sla_days_per_stage: opts.sla.clone(),
        client_moq: p.client_moq,
        order_notes: p.order_notes,
        reason_for_cancellation: p.reason_for_cancellation,
    }
}

/// Payment status at import time (no client payments exist yet).
///
/// Paid when an actual payment date exists, Overdue when the expected date
/// has passed, otherwise Pending. Cancelled orders are always Pending.
pub(crate) fn import_payment_status(
    stage: OrderStatus,
    expected: Option<NaiveDateTime>,
    actual: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> PaymentStatus {
    if stage.is_cancelled() {
        return PaymentStatus::Pending;
    }
    match (actual, expected) {
        (Some(_), _) => PaymentStatus::Paid,
        (None, Some(due)) if due < now => PaymentStatus::Overdue,
        _ => PaymentStatus::Pending,
    }
}
