//! Seeded demo dataset.
//!
//! Generation is deterministic for a given seed and `now`. The output obeys
//! the same invariants as a reconciled import: order totals are line-item
//! sums, and cancelled orders are Pending with no client payments.

use chrono::{Duration, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::dates::add_days;
use crate::lifecycle::derive_payment_status_from_payments;
use crate::types::{
    round2, ClientPayment, Order, OrderLineItem, OrderStatus, PaymentStatus, ProductType,
    SlaTable, StageHistoryItem, Supplier,
};

pub const CLIENT_COUNTRIES: [&str; 10] = [
    "USA",
    "Germany",
    "UK",
    "France",
    "Canada",
    "Australia",
    "Japan",
    "Brazil",
    "South Africa",
    "UAE",
];

pub const SUPPLIER_NAMES: [&str; 5] = [
    "AgroEquip India",
    "FarmMech Solutions",
    "HarvestTech Ltd.",
    "KrishiYantra Corp",
    "GreenField Machines",
];

const CANCELLATION_RATE: f64 = 0.05;
const MOCK_CANCEL_REASON: &str = "Cancelled due to client request (mock data).";

fn product_names(t: ProductType) -> [&'static str; 4] {
    match t {
        ProductType::GrassCutter => [
            "Heavy Duty Lawn Mower GC-X1000",
            "EcoTrim Electric GC-E500",
            "ProSeries Reel Mower GC-R750",
            "Compact Gas Mower GC-G300",
        ],
        ProductType::WaterPump => [
            "Submersible Well Pump WP-S200",
            "High-Pressure Irrigation Pump WP-H1500",
            "Portable Utility Pump WP-U50",
            "Solar Powered Fountain Pump WP-SP80",
        ],
        ProductType::PowerTiller => [
            "AgroPro Cultivator PT-C60",
            "GardenMaster Tiller PT-G45",
            "Mini Electric Tiller PT-E20",
            "Heavy Duty Diesel Tiller PT-D100",
        ],
        ProductType::Sprayer => [
            "Backpack Chemical Sprayer SP-B16L",
            "Orchard Mist Sprayer SP-M500",
            "Electrostatic Field Sprayer SP-ESF10",
            "Handheld Pump Sprayer SP-H2L",
        ],
        ProductType::Harvester => [
            "Mini Rice Combine Harvester MH-R50",
            "Corn Silage Harvester MH-CS200",
            "Sugarcane Harvester MH-S120",
            "Manual Grain Harvester MH-G10",
        ],
    }
}

/// Convenience: seeded RNG, entropy-seeded when `seed` is `None`.
pub fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

/// A generated dataset.
#[derive(Debug, Clone)]
pub struct MockDataset {
    pub suppliers: Vec<Supplier>,
    pub orders: Vec<Order>,
}

pub fn generate_dataset(
    supplier_count: usize,
    order_count: usize,
    sla: &SlaTable,
    now: NaiveDateTime,
    rng: &mut StdRng,
) -> MockDataset {
    let suppliers = generate_suppliers(supplier_count, rng);
    let orders = generate_orders(order_count, &suppliers, sla, now, rng);
    MockDataset { suppliers, orders }
}

pub fn generate_suppliers(n: usize, rng: &mut StdRng) -> Vec<Supplier> {
    (0..n)
        .map(|i| {
            let base = SUPPLIER_NAMES[i % SUPPLIER_NAMES.len()];
            let name = if i >= SUPPLIER_NAMES.len() {
                format!("{base} {}", i / SUPPLIER_NAMES.len() + 1)
            } else {
                base.to_string()
            };
            Supplier {
                id: format!("SUP-{}", 101 + i),
                name,
                country: "India".to_string(),
                avg_tat_days: f64::from(rng.gen_range(15..25u32)),
                delivery_rate: round2(rng.gen_range(0.89..0.99)),
                pricing_variance: round2(rng.gen_range(0.0..0.05)),
            }
        })
        .collect()
}

/// `suppliers` must be non-empty for orders to carry line items.
pub fn generate_orders(
    n: usize,
    suppliers: &[Supplier],
    sla: &SlaTable,
    now: NaiveDateTime,
    rng: &mut StdRng,
) -> Vec<Order> {
    (0..n)
        .map(|i| generate_order(i, suppliers, sla, now, rng))
        .collect()
}

fn shift(d: NaiveDateTime, days: f64) -> NaiveDateTime {
    d.checked_add_signed(Duration::seconds((days * 86_400.0) as i64))
        .unwrap_or(d)
}

fn pipeline_index(stage: OrderStatus) -> usize {
    OrderStatus::PIPELINE
        .iter()
        .position(|s| *s == stage)
        .unwrap_or(0)
}

/// Walk the pipeline from `order_date` up to `reached`, SLA-scaled.
///
/// Stages before `reached` are closed. When `cancelled` the last reached
/// stage is closed too and a Cancelled entry follows.
fn walk_history(
    order_date: NaiveDateTime,
    reached: OrderStatus,
    cancelled: bool,
    sla: &SlaTable,
    rng: &mut StdRng,
) -> Vec<StageHistoryItem> {
    let mut history = Vec::new();
    let mut cursor = order_date;
    for stage in OrderStatus::PIPELINE
        .into_iter()
        .take(pipeline_index(reached) + 1)
    {
        let limit = f64::from(sla.days(stage));
        let duration = rng.gen::<f64>() * limit + limit * 0.75;
        let is_open = stage == reached && !cancelled;
        let is_delayed = limit > 0.0 && duration > limit;
        let end = shift(cursor, duration);
        history.push(StageHistoryItem {
            stage,
            start_date: cursor,
            end_date: (!is_open).then_some(end),
            is_delayed: Some(is_delayed),
            notes: is_delayed.then(|| {
                format!(
                    "Exceeded SLA of {} days by {:.1} days.",
                    sla.days(stage),
                    duration - limit
                )
            }),
        });
        cursor = end;
    }
    if cancelled {
        history.push(StageHistoryItem {
            stage: OrderStatus::Cancelled,
            start_date: cursor,
            end_date: None,
            is_delayed: Some(false),
            notes: Some(MOCK_CANCEL_REASON.to_string()),
        });
    }
    history
}

fn generate_line_item(
    order_id: &str,
    j: usize,
    stage: OrderStatus,
    order_date: NaiveDateTime,
    suppliers: &[Supplier],
    rng: &mut StdRng,
) -> OrderLineItem {
    let product_type = ProductType::cycled(rng.gen_range(0..ProductType::CATALOG.len()));
    let names = product_names(product_type);
    let product_name = names[rng.gen_range(0..names.len())].to_string();
    let quantity = f64::from(rng.gen_range(1..=5u32));
    let quoted = f64::from(rng.gen_range(100..800u32));

    let negotiated = if stage != OrderStatus::FreshOrder && !stage.is_cancelled() && rng.gen_bool(0.7)
    {
        round2(quoted * rng.gen_range(0.9..1.0))
    } else {
        quoted
    };
    let unit_cost = round2(negotiated * rng.gen_range(0.5..0.8));
    let supplier_id = if suppliers.is_empty() {
        String::new()
    } else {
        suppliers[rng.gen_range(0..suppliers.len())].id.clone()
    };

    let mut li = OrderLineItem {
        id: format!("{order_id}-li-{}", j + 1),
        product_id: format!(
            "PROD-{}{}",
            product_type.label()[..3].to_uppercase(),
            rng.gen_range(0..1000)
        ),
        product_name,
        product_type,
        quantity,
        quoted_price_per_unit: quoted,
        negotiated_price_per_unit: Some(negotiated),
        final_price_per_unit: unit_cost,
        supplier_id,
        line_item_notes: None,
        supplier_production_start_date: None,
        supplier_expected_dispatch_date: None,
        supplier_actual_dispatch_date: None,
        supplier_bl_number: None,
        supplier_payment_terms: None,
        supplier_advance_paid_amount: None,
        supplier_advance_paid_date: None,
        supplier_before_paid_amount: None,
        supplier_before_paid_date: None,
        supplier_balance_paid_amount: None,
        supplier_balance_paid_date: None,
        supplier_notes: None,
    };

    if stage != OrderStatus::FreshOrder && !stage.is_cancelled() {
        let production_start = add_days(order_date, rng.gen_range(2..7));
        let expected_dispatch = add_days(production_start, rng.gen_range(10..20));
        let actual_dispatch = (pipeline_index(stage) >= pipeline_index(OrderStatus::ReadyForDispatch))
            .then(|| add_days(expected_dispatch, rng.gen_range(-2..3)));
        if actual_dispatch.is_some() {
            li.supplier_bl_number = Some(format!(
                "BL-{}-{}{}",
                &order_id[order_id.len().saturating_sub(4)..],
                j + 1,
                rng.gen_range(0..100)
            ));
        }
        li.supplier_production_start_date = Some(production_start);
        li.supplier_expected_dispatch_date = Some(expected_dispatch);
        li.supplier_actual_dispatch_date = actual_dispatch;
        apply_payment_terms(&mut li, production_start, expected_dispatch, actual_dispatch, rng);
        if rng.gen_bool(0.3) {
            li.supplier_notes = Some(format!("Supplier confirmed ETA for {}.", li.product_name));
        }
    }
    if rng.gen_bool(0.3) {
        li.line_item_notes = Some(format!("Internal note for {}.", li.product_name));
    }
    li
}

fn apply_payment_terms(
    li: &mut OrderLineItem,
    production_start: NaiveDateTime,
    expected_dispatch: NaiveDateTime,
    actual_dispatch: Option<NaiveDateTime>,
    rng: &mut StdRng,
) {
    let cost = li.supplier_cost();
    let scenario: f64 = rng.gen();
    if scenario < 0.33 {
        li.supplier_payment_terms = Some("30% Adv, 40% Pre-Disp, 30% Post-Disp".to_string());
        li.supplier_advance_paid_amount = Some(round2(cost * 0.3));
        li.supplier_advance_paid_date = Some(add_days(production_start, -rng.gen_range(1..3)));
        li.supplier_before_paid_amount = Some(round2(cost * 0.4));
        li.supplier_before_paid_date = Some(add_days(expected_dispatch, -rng.gen_range(1..4)));
        if let Some(dispatched) = actual_dispatch {
            li.supplier_balance_paid_amount = Some(round2(cost * 0.3));
            li.supplier_balance_paid_date = Some(add_days(dispatched, rng.gen_range(1..6)));
        }
    } else if scenario < 0.66 {
        li.supplier_payment_terms = Some("50% Advance, 50% on Dispatch".to_string());
        li.supplier_advance_paid_amount = Some(round2(cost * 0.5));
        li.supplier_advance_paid_date = Some(add_days(production_start, -rng.gen_range(1..4)));
        if let Some(dispatched) = actual_dispatch {
            li.supplier_balance_paid_amount = Some(round2(cost * 0.5));
            li.supplier_balance_paid_date = Some(add_days(dispatched, rng.gen_range(1..6)));
        }
    } else if let Some(dispatched) = actual_dispatch {
        li.supplier_balance_paid_amount = Some(round2(cost));
        if rng.gen_bool(0.5) {
            li.supplier_payment_terms = Some("100% on Dispatch".to_string());
            li.supplier_balance_paid_date = Some(add_days(dispatched, rng.gen_range(2..9)));
        } else {
            li.supplier_payment_terms = Some("30 Day Net after Dispatch".to_string());
            li.supplier_balance_paid_date = Some(add_days(dispatched, rng.gen_range(25..35)));
        }
    } else {
        li.supplier_payment_terms = Some("Awaiting Dispatch for Final Terms".to_string());
    }
}

fn client_payments(
    order_id: &str,
    price: f64,
    dispatch: NaiveDateTime,
    sla: &SlaTable,
    rng: &mut StdRng,
) -> Vec<ClientPayment> {
    let payment = |id: String, amount: f64, date: NaiveDateTime, notes: &str| ClientPayment {
        id,
        amount_paid: amount,
        payment_date: date,
        payment_method: Some("Bank Transfer".to_string()),
        notes: Some(notes.to_string()),
    };

    let scenario: f64 = rng.gen();
    let mut out = Vec::new();
    if scenario < 0.3 {
        // unpaid
    } else if scenario < 0.7 {
        let parts = if rng.gen_bool(0.5) { 1 } else { 2 };
        let mut date = add_days(dispatch, rng.gen_range(1..11));
        let mut paid = 0.0;
        for k in 0..parts {
            let amount = round2(price * rng.gen_range(0.2..0.5));
            if paid + amount < price * 0.95 {
                let mut p = payment(format!("cp-{order_id}-{k}"), amount, date, "");
                p.notes = Some(format!("Partial payment {}", k + 1));
                if rng.gen_bool(0.3) {
                    p.payment_method = Some("Cheque".to_string());
                }
                out.push(p);
                paid += amount;
                date = add_days(date, rng.gen_range(5..15));
            }
        }
    } else if rng.gen_bool(0.6) {
        let window = (f64::from(sla.days(OrderStatus::Paid)) * 0.8) as i64;
        let date = add_days(dispatch, rng.gen_range(0..window.max(1)));
        out.push(payment(format!("cp-{order_id}-full"), price, date, "Full payment received."));
    } else {
        let first = round2(price * 0.4);
        let first_date = add_days(dispatch, rng.gen_range(1..11));
        let second_date = add_days(first_date, rng.gen_range(5..20));
        out.push(payment(format!("cp-{order_id}-p1"), first, first_date, "First installment."));
        out.push(payment(
            format!("cp-{order_id}-p2"),
            round2(price - first),
            second_date,
            "Final installment.",
        ));
    }
    out
}

fn generate_order(
    i: usize,
    suppliers: &[Supplier],
    sla: &SlaTable,
    now: NaiveDateTime,
    rng: &mut StdRng,
) -> Order {
    let id = format!("BM-{}", 2_024_001 + i);
    let order_date = add_days(now, -rng.gen_range(1..=90));
    let reached = OrderStatus::PIPELINE[rng.gen_range(0..OrderStatus::PIPELINE.len())];
    let cancelled = rng.gen_bool(CANCELLATION_RATE);
    let current_stage = if cancelled { OrderStatus::Cancelled } else { reached };

    let stage_history = walk_history(order_date, reached, cancelled, sla, rng);

    let count = rng.gen_range(1..=3usize);
    let line_items: Vec<OrderLineItem> = (0..count)
        .map(|j| generate_line_item(&id, j, current_stage, order_date, suppliers, rng))
        .collect();

    let total_quantity: f64 = line_items.iter().map(|li| li.quantity).sum();
    let total_quoted_price =
        round2(line_items.iter().map(|li| li.quoted_price_per_unit * li.quantity).sum());
    let total_negotiated_price = round2(
        line_items
            .iter()
            .map(|li| li.negotiated_price_per_unit.unwrap_or(li.quoted_price_per_unit) * li.quantity)
            .sum(),
    );
    let total_supplier_cost = round2(line_items.iter().map(OrderLineItem::supplier_cost).sum());
    let total_final_price = total_negotiated_price;

    let entry = |s: OrderStatus| stage_history.iter().find(|h| h.stage == s);
    let dispatch_date = if current_stage.is_delivered() {
        entry(OrderStatus::Delivered)
            .map(|h| h.start_date)
            .or_else(|| entry(OrderStatus::ReadyForDispatch).and_then(|h| h.end_date))
    } else {
        None
    };
    let production_est = entry(OrderStatus::Production)
        .map(|h| h.start_date)
        .unwrap_or_else(|| add_days(order_date, i64::from(sla.days(OrderStatus::FreshOrder))));
    let ready_est = entry(OrderStatus::ReadyForDispatch)
        .map(|h| h.start_date)
        .unwrap_or_else(|| add_days(production_est, i64::from(sla.days(OrderStatus::Production))));
    let expected_delivery = add_days(
        ready_est,
        i64::from(sla.days(OrderStatus::Delivered) + sla.days(OrderStatus::ReadyForDispatch)),
    );

    let client_moq = f64::from(rng.gen_range(1..=5u32)) * (count / 2).max(1) as f64 * 2.0;
    let order_notes = rng.gen_bool(0.2).then(|| format!("Order note for {id}."));

    let mut order = Order {
        id: id.clone(),
        client_name: format!(
            "Client {}{}",
            char::from(b'A' + (i % 26) as u8),
            if i / 26 > 0 { (i / 26).to_string() } else { String::new() }
        ),
        client_country: CLIENT_COUNTRIES[rng.gen_range(0..CLIENT_COUNTRIES.len())].to_string(),
        order_date,
        current_stage,
        stage_history: stage_history.clone(),
        line_items,
        total_quantity,
        total_quoted_price,
        total_negotiated_price,
        total_final_price,
        total_supplier_cost,
        client_payments: Vec::new(),
        payment_status: PaymentStatus::Pending,
        expected_payment_date: None,
        actual_payment_date: None,
        expected_delivery_date: Some(expected_delivery),
        actual_delivery_date: None,
        dispatch_date,
        sla_days_per_stage: sla.clone(),
        client_moq: Some(client_moq),
        order_notes,
        reason_for_cancellation: None,
    };

    if cancelled {
        order.reason_for_cancellation = Some(MOCK_CANCEL_REASON.to_string());
        order.expected_delivery_date = Some(order_date);
        return order;
    }

    if let Some(dispatched) = dispatch_date {
        order.expected_payment_date =
            Some(add_days(dispatched, i64::from(sla.days(OrderStatus::Paid))));
        if total_final_price > 0.0 {
            order.client_payments = client_payments(&id, total_final_price, dispatched, sla, rng);
        }
    }
    order.payment_status = derive_payment_status_from_payments(&order, now);
    if order.payment_status == PaymentStatus::Paid {
        order.actual_payment_date = order.client_payments.iter().map(|p| p.payment_date).max();
    }

    let delivered_end = entry(OrderStatus::Delivered).and_then(|h| h.end_date);
    order.actual_delivery_date = match (delivered_end, dispatch_date) {
        (Some(end), _) => Some(end),
        (None, Some(dispatched)) if order.payment_status == PaymentStatus::Paid => Some(shift(
            dispatched,
            f64::from(sla.days(OrderStatus::Delivered)) * rng.gen_range(0.75..1.25),
        )),
        _ => None,
    };
    order
}
