use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// OrderStatus
// ---------------------------------------------------------------------------

/// Lifecycle stage of an order.
///
/// Declaration order is the pipeline order. `Cancelled` is a terminal
/// branch that can be entered from any stage; it is not a successor of
/// `Paid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    #[serde(rename = "Fresh Order")]
    FreshOrder,
    #[serde(rename = "Production")]
    Production,
    #[serde(rename = "Ready for Dispatch")]
    ReadyForDispatch,
    #[serde(rename = "Delivered to Client")]
    Delivered,
    #[serde(rename = "Payment Received")]
    Paid,
    #[serde(rename = "Cancelled")]
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::FreshOrder,
        OrderStatus::Production,
        OrderStatus::ReadyForDispatch,
        OrderStatus::Delivered,
        OrderStatus::Paid,
        OrderStatus::Cancelled,
    ];

    /// The five non-terminal pipeline stages (everything except `Cancelled`).
    pub const PIPELINE: [OrderStatus; 5] = [
        OrderStatus::FreshOrder,
        OrderStatus::Production,
        OrderStatus::ReadyForDispatch,
        OrderStatus::Delivered,
        OrderStatus::Paid,
    ];

    /// Display label; also the value expected in the `CurrentStage` column.
    pub fn label(&self) -> &'static str {
        match self {
            OrderStatus::FreshOrder => "Fresh Order",
            OrderStatus::Production => "Production",
            OrderStatus::ReadyForDispatch => "Ready for Dispatch",
            OrderStatus::Delivered => "Delivered to Client",
            OrderStatus::Paid => "Payment Received",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    /// Enum identifier form, e.g. `READY_FOR_DISPATCH`.
    pub fn ident(&self) -> &'static str {
        match self {
            OrderStatus::FreshOrder => "FRESH_ORDER",
            OrderStatus::Production => "PRODUCTION",
            OrderStatus::ReadyForDispatch => "READY_FOR_DISPATCH",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Paid => "PAID",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// Label with all whitespace removed, as used in `Stage_<stem>_StartDate`.
    pub fn column_stem(&self) -> String {
        self.label().split_whitespace().collect()
    }

    pub fn start_date_column(&self) -> String {
        format!("Stage_{}_StartDate", self.column_stem())
    }

    pub fn end_date_column(&self) -> String {
        format!("Stage_{}_EndDate", self.column_stem())
    }

    /// Parse a `CurrentStage` cell.
    ///
    /// Accepts the exact label, the label in any letter case, or the enum
    /// identifier (`PRODUCTION`, `ready_for_dispatch`). Anything else is `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let t = raw.trim();
        if t.is_empty() {
            return None;
        }
        Self::ALL.into_iter().find(|s| {
            s.label() == t || s.label().eq_ignore_ascii_case(t) || s.ident().eq_ignore_ascii_case(t)
        })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, OrderStatus::Cancelled)
    }

    /// Current stage is Delivered or Paid.
    pub fn is_delivered(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Paid)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// ProductType
// ---------------------------------------------------------------------------

/// Closed product catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProductType {
    #[serde(rename = "Grass Cutter")]
    GrassCutter,
    #[serde(rename = "Water Pump")]
    WaterPump,
    #[serde(rename = "Power Tiller")]
    PowerTiller,
    #[serde(rename = "Agricultural Sprayer")]
    Sprayer,
    #[serde(rename = "Mini Harvester")]
    Harvester,
}

impl ProductType {
    pub const CATALOG: [ProductType; 5] = [
        ProductType::GrassCutter,
        ProductType::WaterPump,
        ProductType::PowerTiller,
        ProductType::Sprayer,
        ProductType::Harvester,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ProductType::GrassCutter => "Grass Cutter",
            ProductType::WaterPump => "Water Pump",
            ProductType::PowerTiller => "Power Tiller",
            ProductType::Sprayer => "Agricultural Sprayer",
            ProductType::Harvester => "Mini Harvester",
        }
    }

    /// Case-insensitive label lookup.
    pub fn parse(raw: &str) -> Option<Self> {
        let t = raw.trim();
        Self::CATALOG
            .into_iter()
            .find(|p| p.label().eq_ignore_ascii_case(t))
    }

    /// Catalog entry at `index mod 5`.
    pub fn cycled(index: usize) -> Self {
        Self::CATALOG[index % Self::CATALOG.len()]
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// PaymentStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    #[serde(rename = "Partially Paid")]
    PartiallyPaid,
    Paid,
    Overdue,
}

impl PaymentStatus {
    pub fn label(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::PartiallyPaid => "Partially Paid",
            PaymentStatus::Paid => "Paid",
            PaymentStatus::Overdue => "Overdue",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// SLA table
// ---------------------------------------------------------------------------

/// Target maximum days per stage. A value of 0 means "no SLA".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlaTable(BTreeMap<OrderStatus, u32>);

impl Default for SlaTable {
    fn default() -> Self {
        let mut days = BTreeMap::new();
        days.insert(OrderStatus::FreshOrder, 2);
        days.insert(OrderStatus::Production, 20);
        days.insert(OrderStatus::ReadyForDispatch, 2);
        days.insert(OrderStatus::Delivered, 10);
        days.insert(OrderStatus::Paid, 30);
        days.insert(OrderStatus::Cancelled, 0);
        SlaTable(days)
    }
}

impl SlaTable {
    /// Days allowed in `stage`; stages missing from the table have no SLA.
    pub fn days(&self, stage: OrderStatus) -> u32 {
        self.0.get(&stage).copied().unwrap_or(0)
    }

    pub fn with_override(mut self, stage: OrderStatus, days: u32) -> Self {
        self.0.insert(stage, days);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (OrderStatus, u32)> + '_ {
        self.0.iter().map(|(s, d)| (*s, *d))
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    pub id: String,
    pub name: String,
    pub country: String,
    pub avg_tat_days: f64,
    /// Fraction in `[0, 1]`.
    pub delivery_rate: f64,
    /// Fraction in `[0, 1]`.
    pub pricing_variance: f64,
}

/// One of the three supplier payment installments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Tranche {
    Advance,
    BeforeDispatch,
    Balance,
}

impl Tranche {
    pub const ALL: [Tranche; 3] = [Tranche::Advance, Tranche::BeforeDispatch, Tranche::Balance];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineItem {
    pub id: String,
    pub product_id: String,
    pub product_name: String,
    pub product_type: ProductType,
    pub quantity: f64,
    pub quoted_price_per_unit: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negotiated_price_per_unit: Option<f64>,
    /// Supplier unit cost.
    pub final_price_per_unit: f64,
    pub supplier_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_item_notes: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier_production_start_date: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier_expected_dispatch_date: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier_actual_dispatch_date: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier_bl_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier_payment_terms: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier_advance_paid_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier_advance_paid_date: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier_before_paid_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier_before_paid_date: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier_balance_paid_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier_balance_paid_date: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier_notes: Option<String>,
}

impl OrderLineItem {
    /// `(amount, paid date)` for one tranche.
    pub fn tranche(&self, t: Tranche) -> (Option<f64>, Option<NaiveDateTime>) {
        match t {
            Tranche::Advance => (
                self.supplier_advance_paid_amount,
                self.supplier_advance_paid_date,
            ),
            Tranche::BeforeDispatch => (
                self.supplier_before_paid_amount,
                self.supplier_before_paid_date,
            ),
            Tranche::Balance => (
                self.supplier_balance_paid_amount,
                self.supplier_balance_paid_date,
            ),
        }
    }

    /// Amount still owed on a tranche: amount set, paid date missing.
    pub fn tranche_due(&self, t: Tranche) -> f64 {
        match self.tranche(t) {
            (Some(amount), None) if amount > 0.0 => amount,
            _ => 0.0,
        }
    }

    pub fn supplier_cost(&self) -> f64 {
        self.final_price_per_unit * self.quantity
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageHistoryItem {
    pub stage: OrderStatus,
    pub start_date: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_delayed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientPayment {
    pub id: String,
    pub amount_paid: f64,
    pub payment_date: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub client_name: String,
    pub client_country: String,
    pub order_date: NaiveDateTime,
    pub current_stage: OrderStatus,
    pub stage_history: Vec<StageHistoryItem>,
    pub line_items: Vec<OrderLineItem>,

    pub total_quantity: f64,
    pub total_quoted_price: f64,
    pub total_negotiated_price: f64,
    /// Client-facing order value. Only ever read from the Order sheet.
    pub total_final_price: f64,
    /// Always recomputed from line items.
    pub total_supplier_cost: f64,

    pub client_payments: Vec<ClientPayment>,
    pub payment_status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_payment_date: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_payment_date: Option<NaiveDateTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_delivery_date: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_delivery_date: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatch_date: Option<NaiveDateTime>,

    pub sla_days_per_stage: SlaTable,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_moq: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_for_cancellation: Option<String>,
}

impl Order {
    /// First history entry for `stage`, if any.
    pub fn history_entry(&self, stage: OrderStatus) -> Option<&StageHistoryItem> {
        self.stage_history.iter().find(|h| h.stage == stage)
    }

    pub fn is_cancelled(&self) -> bool {
        self.current_stage.is_cancelled()
    }

    pub fn total_client_paid(&self) -> f64 {
        self.client_payments.iter().map(|p| p.amount_paid).sum()
    }
}

/// Round a money value to cents.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_stems_strip_whitespace() {
        assert_eq!(OrderStatus::FreshOrder.column_stem(), "FreshOrder");
        assert_eq!(
            OrderStatus::ReadyForDispatch.start_date_column(),
            "Stage_ReadyforDispatch_StartDate"
        );
        assert_eq!(
            OrderStatus::Delivered.end_date_column(),
            "Stage_DeliveredtoClient_EndDate"
        );
        assert_eq!(
            OrderStatus::Cancelled.start_date_column(),
            "Stage_Cancelled_StartDate"
        );
    }

    #[test]
    fn stage_parse_accepts_label_and_ident() {
        assert_eq!(OrderStatus::parse("Production"), Some(OrderStatus::Production));
        assert_eq!(
            OrderStatus::parse("payment received"),
            Some(OrderStatus::Paid)
        );
        assert_eq!(
            OrderStatus::parse("READY_FOR_DISPATCH"),
            Some(OrderStatus::ReadyForDispatch)
        );
        assert_eq!(OrderStatus::parse("Bogus"), None);
        assert_eq!(OrderStatus::parse("  "), None);
    }

    #[test]
    fn stage_serializes_as_label() {
        let s = serde_json::to_string(&OrderStatus::Delivered).unwrap();
        assert_eq!(s, "\"Delivered to Client\"");
    }

    #[test]
    fn sla_defaults_and_override() {
        let sla = SlaTable::default();
        assert_eq!(sla.days(OrderStatus::Production), 20);
        assert_eq!(sla.days(OrderStatus::Cancelled), 0);
        let sla = sla.with_override(OrderStatus::Production, 15);
        assert_eq!(sla.days(OrderStatus::Production), 15);
    }

    #[test]
    fn product_type_cycles_through_catalog() {
        assert_eq!(ProductType::cycled(0), ProductType::GrassCutter);
        assert_eq!(ProductType::cycled(6), ProductType::WaterPump);
        assert_eq!(
            ProductType::parse("agricultural sprayer"),
            Some(ProductType::Sprayer)
        );
    }

    #[test]
    fn round2_rounds_to_cents() {
        assert_eq!(round2(10.005_f64 + 0.0001), 10.01);
        assert_eq!(round2(80.0), 80.0);
    }
}
