//! In-session order mutations.

use chrono::NaiveDateTime;
use tracing::info;

use crate::types::{round2, Order, OrderStatus, PaymentStatus, StageHistoryItem};

/// Move `order` to Cancelled as of `now`.
///
/// Any earlier Cancelled entry is replaced by a single entry dated `now`.
/// Payments and delivery/payment dates are cleared and the expected
/// delivery date collapses to the order date.
pub fn cancel_order(order: &Order, reason: Option<&str>, now: NaiveDateTime) -> Order {
    let reason = reason.map(str::trim).filter(|r| !r.is_empty());

    let mut stage_history: Vec<StageHistoryItem> = order
        .stage_history
        .iter()
        .filter(|h| !h.stage.is_cancelled())
        .cloned()
        .collect();
    stage_history.push(StageHistoryItem {
        stage: OrderStatus::Cancelled,
        start_date: now,
        end_date: None,
        is_delayed: None,
        notes: Some(reason.unwrap_or("Order Cancelled").to_string()),
    });

    info!(order_id = %order.id, from = %order.current_stage, "order cancelled");

    Order {
        current_stage: OrderStatus::Cancelled,
        reason_for_cancellation: reason.map(str::to_string),
        stage_history,
        payment_status: PaymentStatus::Pending,
        expected_delivery_date: Some(order.order_date),
        actual_delivery_date: None,
        expected_payment_date: None,
        actual_payment_date: None,
        dispatch_date: None,
        client_payments: Vec::new(),
        ..order.clone()
    }
}

/// Payment status from recorded client payments, compared at cent precision.
pub fn derive_payment_status_from_payments(order: &Order, now: NaiveDateTime) -> PaymentStatus {
    if order.is_cancelled() {
        return PaymentStatus::Pending;
    }
    let paid = round2(order.total_client_paid());
    let price = round2(order.total_final_price);
    if price > 0.0 && paid >= price {
        PaymentStatus::Paid
    } else if order.expected_payment_date.is_some_and(|d| d < now) {
        PaymentStatus::Overdue
    } else if paid > 0.0 {
        PaymentStatus::PartiallyPaid
    } else {
        PaymentStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::parse_date;
    use crate::engine::{reconcile_with, ReconcileOptions};
    use crate::types::ClientPayment;

    fn sample() -> Order {
        let orders = "OrderID,ClientName,OrderDate,CurrentStage,TotalFinalPrice,ExpectedPaymentDate,Stage_Production_StartDate,Stage_Cancelled_StartDate\n\
BM-1,Acme,2024-01-01,Production,1000,2024-03-01,2024-01-05,2024-01-20\n";
        let suppliers = "OrderID,LineItemID,Quantity,SupplierID_for_LineItem,SupplierName_for_LineItem\nBM-1,LI-1,1,S1,Alpha\n";
        let now = parse_date("2024-02-01").unwrap();
        reconcile_with(orders, suppliers, &ReconcileOptions::default(), now)
            .orders
            .remove(0)
    }

    fn payment(amount: f64) -> ClientPayment {
        ClientPayment {
            id: format!("PAY-{amount}"),
            amount_paid: amount,
            payment_date: parse_date("2024-02-10").unwrap(),
            payment_method: None,
            notes: None,
        }
    }

    #[test]
    fn cancel_replaces_prior_cancel_entries() {
        let order = sample();
        assert_eq!(
            order
                .stage_history
                .iter()
                .filter(|h| h.stage.is_cancelled())
                .count(),
            1
        );
        let now = parse_date("2024-02-15").unwrap();
        let out = cancel_order(&order, Some("  client withdrew "), now);

        assert_eq!(out.current_stage, OrderStatus::Cancelled);
        let cancels: Vec<_> = out
            .stage_history
            .iter()
            .filter(|h| h.stage.is_cancelled())
            .collect();
        assert_eq!(cancels.len(), 1);
        assert_eq!(cancels[0].start_date, now);
        assert_eq!(cancels[0].notes.as_deref(), Some("client withdrew"));
        assert_eq!(out.reason_for_cancellation.as_deref(), Some("client withdrew"));
        assert_eq!(out.expected_delivery_date, Some(order.order_date));
        assert!(out.expected_payment_date.is_none());
        assert!(out.dispatch_date.is_none());
        assert_eq!(out.payment_status, PaymentStatus::Pending);
        assert_eq!(out.line_items, order.line_items);
    }

    #[test]
    fn cancel_without_reason_uses_default_note() {
        let out = cancel_order(&sample(), None, parse_date("2024-02-15").unwrap());
        assert_eq!(
            out.history_entry(OrderStatus::Cancelled).unwrap().notes.as_deref(),
            Some("Order Cancelled")
        );
        assert!(out.reason_for_cancellation.is_none());
    }

    #[test]
    fn status_from_payments() {
        let before_due = parse_date("2024-02-15").unwrap();
        let after_due = parse_date("2024-03-15").unwrap();
        let mut order = sample();

        assert_eq!(derive_payment_status_from_payments(&order, before_due), PaymentStatus::Pending);
        order.client_payments.push(payment(400.0));
        assert_eq!(derive_payment_status_from_payments(&order, before_due), PaymentStatus::PartiallyPaid);
        assert_eq!(derive_payment_status_from_payments(&order, after_due), PaymentStatus::Overdue);
        order.client_payments.push(payment(600.0));
        assert_eq!(derive_payment_status_from_payments(&order, after_due), PaymentStatus::Paid);

        let cancelled = cancel_order(&order, None, after_due);
        assert_eq!(derive_payment_status_from_payments(&cancelled, after_due), PaymentStatus::Pending);
    }
}
