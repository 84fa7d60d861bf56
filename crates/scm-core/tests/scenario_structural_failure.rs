use scm_core::dates::parse_date;
use scm_core::*;

const SUPPLIERS: &str = "OrderID,LineItemID,Quantity,SupplierID_for_LineItem,SupplierName_for_LineItem\n\
BM-1,LI-1,2,S1,Alpha\n";

fn run(orders: &str, suppliers: &str) -> ReconcileOutput {
    reconcile_with(
        orders,
        suppliers,
        &ReconcileOptions::default(),
        parse_date("2024-02-01").unwrap(),
    )
}

#[test]
fn scenario_missing_total_final_price_header_yields_nothing() {
    let orders = "OrderID,ClientName,OrderDate,CurrentStage\nBM-1,Acme,2024-01-10,Production\n";
    let out = run(orders, SUPPLIERS);
    assert!(out.orders.is_empty());
    assert!(out.suppliers.is_empty());
    assert_eq!(out.errors.len(), 1);
    assert!(out.errors[0].contains("TotalFinalPrice"));
}

#[test]
fn scenario_every_missing_header_is_listed() {
    let suppliers = "OrderID,Quantity\nBM-1,2\n";
    let orders = "OrderID,ClientName,OrderDate,CurrentStage,TotalFinalPrice\nBM-1,Acme,2024-01-10,Production,10\n";
    let out = run(orders, suppliers);
    assert!(out.orders.is_empty());
    for header in [
        "LineItemID",
        "SupplierID_for_LineItem",
        "SupplierName_for_LineItem",
    ] {
        assert!(
            out.errors.iter().any(|e| e.contains(header)),
            "no error for {header}: {:?}",
            out.errors
        );
    }
}

#[test]
fn scenario_one_empty_sheet_blocks_the_run() {
    let orders = "OrderID,ClientName,OrderDate,CurrentStage,TotalFinalPrice\n";
    let out = run(orders, SUPPLIERS);
    assert!(out.orders.is_empty());
    assert!(out.suppliers.is_empty());
    assert_eq!(
        out.errors,
        vec!["Order Data CSV is empty or invalid (must have headers and at least one data row).".to_string()]
    );
}

#[test]
fn scenario_both_sheets_empty_is_an_empty_dataset() {
    let out = run("", "");
    assert!(!out.has_data());
    assert!(!out.is_clean());
}
