//! Filter-bar and search narrowing of the active dataset.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::types::{Order, ProductType};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDate>,
}

/// Empty lists mean "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterOptions {
    pub date_range: DateRange,
    pub supplier_ids: Vec<String>,
    pub client_countries: Vec<String>,
    pub product_types: Vec<ProductType>,
    pub show_cancelled_orders: bool,
    pub year: Option<i32>,
}

/// Case-insensitive match on order id, client name, or any line item's
/// product name or product type label. A blank term matches everything.
pub fn matches_search(order: &Order, term: &str) -> bool {
    let term = term.trim();
    if term.is_empty() {
        return true;
    }
    let needle = term.to_lowercase();
    let hit = |s: &str| s.to_lowercase().contains(&needle);
    hit(&order.id)
        || hit(&order.client_name)
        || order
            .line_items
            .iter()
            .any(|li| hit(&li.product_name) || hit(li.product_type.label()))
}

pub fn matches_filters(order: &Order, f: &FilterOptions) -> bool {
    if !f.show_cancelled_orders && order.is_cancelled() {
        return false;
    }
    let ordered_on = order.order_date.date();
    if f.year.is_some_and(|y| ordered_on.year() != y) {
        return false;
    }
    if f.date_range.start.is_some_and(|s| ordered_on < s) {
        return false;
    }
    if f.date_range.end.is_some_and(|e| ordered_on > e) {
        return false;
    }
    if !f.supplier_ids.is_empty()
        && !order
            .line_items
            .iter()
            .any(|li| f.supplier_ids.contains(&li.supplier_id))
    {
        return false;
    }
    if !f.client_countries.is_empty() && !f.client_countries.contains(&order.client_country) {
        return false;
    }
    if !f.product_types.is_empty()
        && !order
            .line_items
            .iter()
            .any(|li| f.product_types.contains(&li.product_type))
    {
        return false;
    }
    true
}

/// Search first, then the filter bar. Order is preserved.
pub fn apply_filters(all: &[Order], filters: &FilterOptions, search: Option<&str>) -> Vec<Order> {
    all.iter()
        .filter(|o| search.map_or(true, |t| matches_search(o, t)))
        .filter(|o| matches_filters(o, filters))
        .cloned()
        .collect()
}

/// Choices offered by the filter bar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Facets {
    pub client_countries: Vec<String>,
    pub product_types: Vec<ProductType>,
    /// Newest first.
    pub years: Vec<i32>,
}

pub fn facets(all: &[Order]) -> Facets {
    let countries: BTreeSet<&str> = all.iter().map(|o| o.client_country.as_str()).collect();
    let types: BTreeSet<ProductType> = all
        .iter()
        .flat_map(|o| o.line_items.iter().map(|li| li.product_type))
        .collect();
    let years: BTreeSet<i32> = all.iter().map(|o| o.order_date.year()).collect();

    Facets {
        client_countries: countries.into_iter().map(str::to_string).collect(),
        product_types: types.into_iter().collect(),
        years: years.into_iter().rev().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{reconcile_with, ReconcileOptions};
    use crate::dates::parse_date;

    const ORDERS: &str = "OrderID,ClientName,ClientCountry,OrderDate,CurrentStage,TotalFinalPrice\n\
BM-1,Acme Farms,USA,2024-01-10,Production,1000\n\
BM-2,Berlin Agri,Germany,2023-06-01,Delivered to Client,500\n\
BM-3,Acme Farms,UK,2024-03-01,Cancelled,700\n";

    const SUPPLIERS: &str = "OrderID,LineItemID,Quantity,SupplierID_for_LineItem,SupplierName_for_LineItem,ProductType,ProductName,FinalPricePerUnit\n\
BM-1,LI-1,2,S1,Alpha,Water Pump,Pump X,10\n\
BM-2,LI-2,1,S2,Beta,Mini Harvester,Harvey,20\n\
BM-3,LI-3,1,S1,Alpha,Power Tiller,Tiller T,5\n";

    fn dataset() -> Vec<Order> {
        let now = parse_date("2024-04-01").unwrap();
        reconcile_with(ORDERS, SUPPLIERS, &ReconcileOptions::default(), now).orders
    }

    fn ids(orders: &[Order]) -> Vec<&str> {
        orders.iter().map(|o| o.id.as_str()).collect()
    }

    #[test]
    fn cancelled_hidden_by_default() {
        let all = dataset();
        let out = apply_filters(&all, &FilterOptions::default(), None);
        assert_eq!(ids(&out), vec!["BM-1", "BM-2"]);
        let shown = FilterOptions {
            show_cancelled_orders: true,
            ..Default::default()
        };
        assert_eq!(apply_filters(&all, &shown, None).len(), 3);
    }

    #[test]
    fn search_covers_id_client_and_products() {
        let all = dataset();
        let f = FilterOptions {
            show_cancelled_orders: true,
            ..Default::default()
        };
        assert_eq!(ids(&apply_filters(&all, &f, Some("acme"))), vec!["BM-1", "BM-3"]);
        assert_eq!(ids(&apply_filters(&all, &f, Some("HARVESTER"))), vec!["BM-2"]);
        assert_eq!(ids(&apply_filters(&all, &f, Some("pump x"))), vec!["BM-1"]);
        assert_eq!(apply_filters(&all, &f, Some("   ")).len(), 3);
    }

    #[test]
    fn year_range_supplier_country_and_type() {
        let all = dataset();
        let by_year = FilterOptions {
            year: Some(2023),
            ..Default::default()
        };
        assert_eq!(ids(&apply_filters(&all, &by_year, None)), vec!["BM-2"]);

        let by_range = FilterOptions {
            date_range: DateRange {
                start: NaiveDate::from_ymd_opt(2024, 1, 1),
                end: NaiveDate::from_ymd_opt(2024, 1, 10),
            },
            ..Default::default()
        };
        assert_eq!(ids(&apply_filters(&all, &by_range, None)), vec!["BM-1"]);

        let by_supplier = FilterOptions {
            supplier_ids: vec!["S2".to_string()],
            ..Default::default()
        };
        assert_eq!(ids(&apply_filters(&all, &by_supplier, None)), vec!["BM-2"]);

        let by_country = FilterOptions {
            client_countries: vec!["USA".to_string(), "UK".to_string()],
            show_cancelled_orders: true,
            ..Default::default()
        };
        assert_eq!(ids(&apply_filters(&all, &by_country, None)), vec!["BM-1", "BM-3"]);

        let by_type = FilterOptions {
            product_types: vec![ProductType::WaterPump],
            ..Default::default()
        };
        assert_eq!(ids(&apply_filters(&all, &by_type, None)), vec!["BM-1"]);
    }

    #[test]
    fn facets_sorted_and_years_descending() {
        let f = facets(&dataset());
        assert_eq!(f.client_countries, vec!["Germany", "UK", "USA"]);
        assert_eq!(f.years, vec![2024, 2023]);
        assert_eq!(
            f.product_types,
            vec![ProductType::WaterPump, ProductType::PowerTiller, ProductType::Harvester]
        );
    }
}
