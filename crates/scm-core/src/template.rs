//! Downloadable sheet templates: header contract plus example rows.

use chrono::{Duration, NaiveDate};
use csv::{QuoteStyle, Terminator, WriterBuilder};

use crate::types::OrderStatus;

/// Order-sheet header contract, base fields first, stage columns after.
pub const ORDER_SHEET_HEADERS: [&str; 24] = [
    "OrderID",
    "ClientName",
    "ClientCountry",
    "OrderDate",
    "CurrentStage",
    "ExpectedDeliveryDate",
    "ExpectedPaymentDate",
    "ActualPaymentDate",
    "ClientMOQ",
    "OrderNotes",
    "ReasonForCancellation",
    "TotalNegotiatedPrice",
    "TotalFinalPrice",
    "Stage_FreshOrder_StartDate",
    "Stage_Production_StartDate",
    "Stage_ReadyforDispatch_StartDate",
    "Stage_DeliveredtoClient_StartDate",
    "Stage_PaymentReceived_StartDate",
    "Stage_FreshOrder_EndDate",
    "Stage_Production_EndDate",
    "Stage_ReadyforDispatch_EndDate",
    "Stage_DeliveredtoClient_EndDate",
    "Stage_PaymentReceived_EndDate",
    "Stage_Cancelled_StartDate",
];

pub const SUPPLIER_SHEET_HEADERS: [&str; 20] = [
    "OrderID",
    "LineItemID",
    "Quantity",
    "SupplierID_for_LineItem",
    "SupplierName_for_LineItem",
    "SupplierAvgTATDays_for_LineItem",
    "SupplierDeliveryRate_for_LineItem",
    "SupplierPricingVariance_for_LineItem",
    "SupplierProductionStartDate",
    "SupplierExpectedDispatchDate",
    "SupplierActualDispatchDate",
    "SupplierBLNumber",
    "SupplierPaymentTerms",
    "SupplierAdvancePaidAmount",
    "SupplierAdvancePaidDate",
    "SupplierBeforePaidAmount",
    "SupplierBeforePaidDate",
    "SupplierBalancePaidAmount",
    "SupplierBalancePaidDate",
    "SupplierNotes",
];

/// The supplier template carries one optional column beyond the contract so
/// the example rows produce a non-zero supplier cost.
const SUPPLIER_TEMPLATE_EXTRA: &str = "FinalPricePerUnit";

fn days_ago(today: NaiveDate, n: i64) -> String {
    (today - Duration::days(n)).format("%Y-%m-%d").to_string()
}

/// Header line unquoted, every example field quoted.
fn render(headers: &[&str], rows: &[Vec<String>]) -> Result<String, csv::Error> {
    let mut w = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    for row in rows {
        w.write_record(row)?;
    }
    let body = w.into_inner().map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(format!(
        "{}\n{}",
        headers.join(","),
        String::from_utf8_lossy(&body)
    ))
}

fn stage_cells(starts: &[(OrderStatus, String)], ends: &[(OrderStatus, String)]) -> Vec<String> {
    let pick = |list: &[(OrderStatus, String)], s: OrderStatus| {
        list.iter()
            .find(|(stage, _)| *stage == s)
            .map(|(_, d)| d.clone())
            .unwrap_or_default()
    };
    OrderStatus::PIPELINE
        .iter()
        .map(|s| pick(starts, *s))
        .chain(OrderStatus::PIPELINE.iter().map(|s| pick(ends, *s)))
        .collect()
}

/// Two example orders: one in Production, one Cancelled.
pub fn order_sheet_template(today: NaiveDate) -> Result<String, csv::Error> {
    let d = |n| days_ago(today, n);
    let s = |v: &str| v.to_string();

    let mut live = vec![
        s("BM-2025001"),
        s("Global Farm Inc."),
        s("USA"),
        d(30),
        s(OrderStatus::Production.label()),
        d(-15),
        d(-5),
        String::new(),
        s("100"),
        s("Rush order for Global Farm."),
        String::new(),
        s("12000"),
        s("11800"),
    ];
    live.extend(stage_cells(
        &[(OrderStatus::FreshOrder, d(30)), (OrderStatus::Production, d(25))],
        &[(OrderStatus::FreshOrder, d(28))],
    ));
    live.push(String::new());

    let mut cancelled = vec![
        s("BM-2025002"),
        s("Euro Landwirtschaft"),
        s("Germany"),
        d(10),
        s(OrderStatus::Cancelled.label()),
        d(5),
        String::new(),
        String::new(),
        s("20"),
        s("Initial inquiry, requirements changed."),
        s("Client changed requirements."),
        s("9000"),
        s("8800"),
    ];
    cancelled.extend(stage_cells(
        &[(OrderStatus::FreshOrder, d(10))],
        &[(OrderStatus::FreshOrder, d(9))],
    ));
    cancelled.push(d(9));

    render(&ORDER_SHEET_HEADERS, &[live, cancelled])
}

/// Line items matching [`order_sheet_template`].
pub fn supplier_sheet_template(today: NaiveDate) -> Result<String, csv::Error> {
    let d = |n| days_ago(today, n);
    let row = |cells: &[&str]| cells.iter().map(|c| c.to_string()).collect::<Vec<_>>();

    let mut first = row(&[
        "BM-2025001",
        "BM-2025001-LI1",
        "50",
        "SUP-101",
        "AgroEquip India",
        "20",
        "0.95",
        "0.02",
    ]);
    first.extend([d(20), d(5), d(4)]);
    first.extend(row(&["BL12345XYZ", "30% Adv, 40% Pre-Disp, 30% Post-Disp", "2700"]));
    first.push(d(22));
    first.push("3600".to_string());
    first.push(d(6));
    first.push("2700".to_string());
    first.push(d(3));
    first.extend(row(&["Awaiting final QC check from supplier side.", "180"]));

    let mut second = row(&[
        "BM-2025001",
        "BM-2025001-LI2",
        "20",
        "SUP-102",
        "FarmMech Solutions",
        "15",
        "0.98",
        "0.01",
    ]);
    second.extend([d(18), d(3), d(3)]);
    second.extend(row(&["BL98765ABC", "100% on Dispatch", "", "", "", "", "1400"]));
    second.push(d(2));
    second.extend(row(&["All clear.", "70"]));

    let mut third = row(&[
        "BM-2025002",
        "BM-2025002-LI1",
        "20",
        "SUP-101",
        "AgroEquip India",
        "20",
        "0.95",
        "0.02",
    ]);
    third.extend(std::iter::repeat(String::new()).take(11));
    third.extend(row(&["Related to cancelled order BM-2025002.", ""]));

    let mut headers: Vec<&str> = SUPPLIER_SHEET_HEADERS.to_vec();
    headers.push(SUPPLIER_TEMPLATE_EXTRA);
    render(&headers, &[first, second, third])
}
