//! Supplier / line-item joiner.
//!
//! Walks the Supplier sheet once and builds two indices:
//! - `supplierId -> Supplier`, first sighting wins;
//! - `orderId -> [OrderLineItem]`, append-only in sheet order.
//!
//! This module does **not** look at the Order sheet; orphan detection and
//! totals happen in the engine.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDateTime;

use crate::dates::parse_date;
use crate::engine::ReconcileOptions;
use crate::sheet::{col, number_cell, NumberCell, Row, Sheet};
use crate::types::{OrderLineItem, ProductType, Supplier};

/// Output of [`join_supplier_rows`].
#[derive(Debug, Clone, Default)]
pub struct JoinedLineItems {
    /// Registry in first-seen order.
    pub suppliers: Vec<Supplier>,
    by_order: BTreeMap<String, Vec<OrderLineItem>>,
    /// Order IDs in first-seen order.
    order_ids: Vec<String>,
}

impl JoinedLineItems {
    pub fn items_for(&self, order_id: &str) -> &[OrderLineItem] {
        self.by_order.get(order_id).map_or(&[], Vec::as_slice)
    }

    /// Remove and return the items linked to `order_id`.
    pub fn take_items(&mut self, order_id: &str) -> Vec<OrderLineItem> {
        self.by_order.remove(order_id).unwrap_or_default()
    }

    /// Remaining `(order_id, item count)` pairs in first-seen order.
    pub fn remaining(&self) -> Vec<(&str, usize)> {
        self.order_ids
            .iter()
            .filter_map(|id| self.by_order.get(id).map(|v| (id.as_str(), v.len())))
            .collect()
    }

    pub fn line_item_count(&self) -> usize {
        self.by_order.values().map(Vec::len).sum()
    }

    fn push(&mut self, order_id: &str, item: OrderLineItem) {
        match self.by_order.get_mut(order_id) {
            Some(v) => v.push(item),
            None => {
                self.order_ids.push(order_id.to_string());
                self.by_order.insert(order_id.to_string(), vec![item]);
            }
        }
    }
}

/// Build the supplier registry and per-order line items from the Supplier
/// sheet. Row-level problems are appended to `errors`; no row aborts the walk.
pub fn join_supplier_rows(
    sheet: &Sheet,
    opts: &ReconcileOptions,
    errors: &mut Vec<String>,
) -> JoinedLineItems {
    let mut out = JoinedLineItems::default();
    let mut seen_suppliers: HashSet<String> = HashSet::new();

    for row in sheet.rows() {
        let Some(order_id) = row.get(col::ORDER_ID) else {
            errors.push(format!(
                "Supplier CSV (Row {}): Missing OrderID for linking.",
                row.line_number()
            ));
            continue;
        };

        let supplier_id = row.get(col::SUPPLIER_ID).unwrap_or_default();
        if !supplier_id.is_empty() && seen_suppliers.insert(supplier_id.to_string()) {
            out.suppliers
                .push(register_supplier(&row, supplier_id, opts, errors));
        }

        let item = build_line_item(&row, order_id, supplier_id, errors);
        out.push(order_id, item);
    }

    out
}

fn register_supplier(
    row: &Row<'_>,
    supplier_id: &str,
    opts: &ReconcileOptions,
    errors: &mut Vec<String>,
) -> Supplier {
    let name = match row.get(col::SUPPLIER_NAME) {
        Some(n) => n.to_string(),
        None => {
            errors.push(format!(
                "Supplier CSV (Row {}): Missing SupplierName_for_LineItem for SupplierID {supplier_id}.",
                row.line_number()
            ));
            format!("Unknown Supplier {supplier_id}")
        }
    };
    let metric = |column: &str| match number_cell(row, column) {
        NumberCell::Value(v) => v,
        _ => 0.0,
    };
    Supplier {
        id: supplier_id.to_string(),
        name,
        country: opts.default_supplier_country.clone(),
        avg_tat_days: metric(col::SUPPLIER_AVG_TAT),
        delivery_rate: metric(col::SUPPLIER_DELIVERY_RATE),
        pricing_variance: metric(col::SUPPLIER_PRICING_VARIANCE),
    }
}

/// Per-row context for line-item messages.
struct ItemCtx<'e> {
    order_id: String,
    line_item_id: String,
    errors: &'e mut Vec<String>,
}

impl ItemCtx<'_> {
    fn push(&mut self, msg: String) {
        self.errors.push(format!(
            "Supplier CSV (OrderID: {}, LineItemID: {}): {msg}",
            self.order_id, self.line_item_id
        ));
    }

    fn date(&mut self, row: &Row<'_>, column: &str) -> Option<NaiveDateTime> {
        let raw = row.get(column)?;
        let parsed = parse_date(raw);
        if parsed.is_none() {
            self.push(format!("Invalid {column} \"{raw}\"."));
        }
        parsed
    }

    fn amount(&mut self, row: &Row<'_>, column: &str) -> Option<f64> {
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

fn build_line_item(
    row: &Row<'_>,
    order_id: &str,
    supplier_id: &str,
    errors: &mut Vec<String>,
) -> OrderLineItem {
    let idx = row.row_index;
    let raw_line_id = row.get(col::LINE_ITEM_ID);
    let line_item_id = raw_line_id
        .map(str::to_string)
        .unwrap_or_else(|| format!("{order_id}-li-{idx}"));

    let mut ctx = ItemCtx {
        order_id: order_id.to_string(),
        line_item_id: line_item_id.clone(),
        errors,
    };

    let quantity = match number_cell(row, col::QUANTITY) {
        NumberCell::Blank => 0.0,
        NumberCell::Value(q) if q < 0.0 => {
            ctx.push(format!("Negative quantity \"{q}\". Clamped to 0."));
            0.0
        }
        NumberCell::Value(q) => q,
        NumberCell::Invalid(_) => {
            ctx.push("Invalid number format for quantity. Defaulting to 0.".to_string());
            0.0
        }
    };

    let unit_cost = ctx
        .amount(row, col::FINAL_PRICE_PER_UNIT)
        .or_else(|| ctx.amount(row, col::SUPPLIER_UNIT_COST))
        .unwrap_or(0.0);
    let quoted = ctx.amount(row, col::QUOTED_PRICE_PER_UNIT).unwrap_or(0.0);
    let negotiated = ctx.amount(row, col::NEGOTIATED_PRICE_PER_UNIT);

    let fallback_type = ProductType::cycled(idx);
    let product_type = match row.get(col::PRODUCT_TYPE) {
        None => fallback_type,
        Some(raw) => ProductType::parse(raw).unwrap_or_else(|| {
            ctx.push(format!(
                "Unknown ProductType \"{raw}\". Defaulting to '{fallback_type}'."
            ));
            fallback_type
        }),
    };

    let product_id = row
        .get(col::PRODUCT_ID)
        .map(str::to_string)
        .unwrap_or_else(|| match raw_line_id {
            Some(id) => format!("prod-{}", last_chars(id, 4)),
            None => format!("prod-{idx}"),
        });
    let product_name = row
        .get(col::PRODUCT_NAME)
        .map(str::to_string)
        .unwrap_or_else(|| match raw_line_id {
            Some(id) => format!("Product {id}"),
            None => format!("Product LI-{}", idx + 1),
        });

    OrderLineItem {
        id: line_item_id,
        product_id,
        product_name,
        product_type,
        quantity,
        quoted_price_per_unit: quoted,
        negotiated_price_per_unit: negotiated,
        final_price_per_unit: unit_cost,
        supplier_id: supplier_id.to_string(),
        line_item_notes: row.get(col::LINE_ITEM_NOTES).map(str::to_string),
        supplier_production_start_date: ctx.date(row, col::SUPPLIER_PRODUCTION_START),
        supplier_expected_dispatch_date: ctx.date(row, col::SUPPLIER_EXPECTED_DISPATCH),
        supplier_actual_dispatch_date: ctx.date(row, col::SUPPLIER_ACTUAL_DISPATCH),
        supplier_bl_number: row.get(col::SUPPLIER_BL_NUMBER).map(str::to_string),
        supplier_payment_terms: row.get(col::SUPPLIER_PAYMENT_TERMS).map(str::to_string),
        supplier_advance_paid_amount: ctx.amount(row, col::SUPPLIER_ADVANCE_AMOUNT),
        supplier_advance_paid_date: ctx.date(row, col::SUPPLIER_ADVANCE_DATE),
        supplier_before_paid_amount: ctx.amount(row, col::SUPPLIER_BEFORE_AMOUNT),
        supplier_before_paid_date: ctx.date(row, col::SUPPLIER_BEFORE_DATE),
        supplier_balance_paid_amount: ctx.amount(row, col::SUPPLIER_BALANCE_AMOUNT),
        supplier_balance_paid_date: ctx.date(row, col::SUPPLIER_BALANCE_DATE),
        supplier_notes: row.get(col::SUPPLIER_NOTES).map(str::to_string),
    }
}

fn last_chars(s: &str, n: usize) -> String {
    let count = s.chars().count();
    s.chars().skip(count.saturating_sub(n)).collect()
}
