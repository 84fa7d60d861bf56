//! Dashboard KPI rollups.
//!
//! All-time figures read the whole active dataset; in-view figures read the
//! filtered set and skip cancelled orders.

use serde::{Deserialize, Serialize};

use crate::types::{Order, OrderStatus, PaymentStatus, Tranche};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileStatus {
    Good,
    Warning,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiTile {
    pub title: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub status: TileStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiSummary {
    // all-time
    pub delivered_orders: usize,
    pub items_sold: f64,
    pub client_value: f64,
    pub collected: f64,
    pub delayed_orders: usize,
    /// Non-cancelled orders across the dataset; denominator of the delay ratio.
    pub non_cancelled_orders: usize,

    // in view
    pub orders_in_view: usize,
    pub overdue_client_payments: usize,
    pub supplier_advance_due: f64,
    pub supplier_pre_dispatch_due: f64,
    pub supplier_balance_due: f64,
}

pub fn calculate_kpis(in_view: &[Order], all: &[Order]) -> KpiSummary {
    let mut k = KpiSummary {
        orders_in_view: in_view.len(),
        ..Default::default()
    };

    for order in in_view.iter().filter(|o| !o.is_cancelled()) {
        if order.payment_status == PaymentStatus::Overdue {
            k.overdue_client_payments += 1;
        }
        for li in &order.line_items {
            k.supplier_advance_due += li.tranche_due(Tranche::Advance);
            k.supplier_pre_dispatch_due += li.tranche_due(Tranche::BeforeDispatch);
            k.supplier_balance_due += li.tranche_due(Tranche::Balance);
        }
    }

    for order in all.iter().filter(|o| o.current_stage.is_delivered()) {
        k.delivered_orders += 1;
        k.items_sold += order.total_quantity;
        k.client_value += order.total_final_price;
        k.collected += if order.payment_status == PaymentStatus::Paid {
            order.total_final_price
        } else {
            order.total_client_paid()
        };
    }

    for order in all.iter().filter(|o| !o.is_cancelled()) {
        k.non_cancelled_orders += 1;
        if has_delayed_entry(order) {
            k.delayed_orders += 1;
        }
    }
    k
}

fn has_delayed_entry(order: &Order) -> bool {
    order.stage_history.iter().any(|h| {
        h.is_delayed == Some(true)
            && !matches!(h.stage, OrderStatus::Paid | OrderStatus::Cancelled)
    })
}

impl KpiSummary {
    /// Delayed orders as a fraction of non-cancelled orders.
    pub fn delayed_ratio(&self) -> f64 {
        if self.non_cancelled_orders == 0 {
            0.0
        } else {
            self.delayed_orders as f64 / self.non_cancelled_orders as f64
        }
    }

    /// The nine dashboard tiles in display order.
    pub fn tiles(&self) -> Vec<KpiTile> {
        let ratio = self.delayed_ratio();
        let delay_status = if ratio > 0.2 {
            TileStatus::Danger
        } else if ratio > 0.1 {
            TileStatus::Warning
        } else {
            TileStatus::Good
        };
        let overdue_status = if self.overdue_client_payments > 5 {
            TileStatus::Danger
        } else if self.overdue_client_payments > 2 {
            TileStatus::Warning
        } else {
            TileStatus::Good
        };

        vec![
            tile("Total Orders Delivered", self.delivered_orders.to_string(), Some("(All Time)"), TileStatus::Good),
            tile("Total Items Sold", format_amount(self.items_sold), Some("(From Delivered)"), TileStatus::Good),
            KpiTile {
                title: "Total Client Value".to_string(),
                value: format_money(self.client_value),
                unit: Some(format!("(Collected: {})", format_money(self.collected))),
                status: TileStatus::Good,
            },
            tile("Orders (Active View)", self.orders_in_view.to_string(), None, TileStatus::Good),
            KpiTile {
                title: "Delayed Orders".to_string(),
                value: self.delayed_orders.to_string(),
                unit: Some(format!("({:.0}% of total)", ratio * 100.0)),
                status: delay_status,
            },
            tile("Overdue Client Payments", self.overdue_client_payments.to_string(), Some("(In View)"), overdue_status),
            due_tile("Supplier Adv. Due", self.supplier_advance_due),
            due_tile("Supplier Pre-Disp. Due", self.supplier_pre_dispatch_due),
            due_tile("Supplier Balance Due", self.supplier_balance_due),
        ]
    }
}

fn tile(title: &str, value: String, unit: Option<&str>, status: TileStatus) -> KpiTile {
    KpiTile {
        title: title.to_string(),
        value,
        unit: unit.map(str::to_string),
        status,
    }
}

fn due_tile(title: &str, amount: f64) -> KpiTile {
    let status = if amount > 20_000.0 {
        TileStatus::Danger
    } else if amount > 5_000.0 {
        TileStatus::Warning
    } else {
        TileStatus::Good
    };
    tile(title, format_money(amount), Some("(In View)"), status)
}

/// `$` plus [`format_amount`].
pub fn format_money(v: f64) -> String {
    format!("${}", format_amount(v))
}

/// Thousands-grouped, at most two decimals, trailing zeros dropped.
pub fn format_amount(v: f64) -> String {
    let cents = (v.abs() * 100.0).round() as u64;
    let whole = cents / 100;
    let frac = cents % 100;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if v < 0.0 && cents > 0 { "-" } else { "" };
    match frac {
        0 => format!("{sign}{grouped}"),
        f if f % 10 == 0 => format!("{sign}{grouped}.{}", f / 10),
        f => format!("{sign}{grouped}.{f:02}"),
    }
}
