//! Header-indexed view over a tokenized sheet.

use std::collections::HashMap;
use std::fmt;

use crate::csv_text::tokenize;

/// Column names shared by the joiner, reconstructor and templates.
pub(crate) mod col {
    pub const ORDER_ID: &str = "OrderID";

    pub const CLIENT_NAME: &str = "ClientName";
    pub const CLIENT_COUNTRY: &str = "ClientCountry";
    pub const ORDER_DATE: &str = "OrderDate";
    pub const CURRENT_STAGE: &str = "CurrentStage";
    pub const EXPECTED_DELIVERY_DATE: &str = "ExpectedDeliveryDate";
    pub const ACTUAL_DELIVERY_DATE: &str = "ActualDeliveryDate";
    pub const EXPECTED_PAYMENT_DATE: &str = "ExpectedPaymentDate";
    pub const ACTUAL_PAYMENT_DATE: &str = "ActualPaymentDate";
    pub const CLIENT_MOQ: &str = "ClientMOQ";
    pub const ORDER_NOTES: &str = "OrderNotes";
    pub const REASON_FOR_CANCELLATION: &str = "ReasonForCancellation";
    pub const TOTAL_NEGOTIATED_PRICE: &str = "TotalNegotiatedPrice";
    pub const TOTAL_FINAL_PRICE: &str = "TotalFinalPrice";

    pub const LINE_ITEM_ID: &str = "LineItemID";
    pub const QUANTITY: &str = "Quantity";
    pub const SUPPLIER_ID: &str = "SupplierID_for_LineItem";
    pub const SUPPLIER_NAME: &str = "SupplierName_for_LineItem";
    pub const SUPPLIER_AVG_TAT: &str = "SupplierAvgTATDays_for_LineItem";
    pub const SUPPLIER_DELIVERY_RATE: &str = "SupplierDeliveryRate_for_LineItem";
    pub const SUPPLIER_PRICING_VARIANCE: &str = "SupplierPricingVariance_for_LineItem";
    pub const SUPPLIER_PRODUCTION_START: &str = "SupplierProductionStartDate";
    pub const SUPPLIER_EXPECTED_DISPATCH: &str = "SupplierExpectedDispatchDate";
    pub const SUPPLIER_ACTUAL_DISPATCH: &str = "SupplierActualDispatchDate";
    pub const SUPPLIER_BL_NUMBER: &str = "SupplierBLNumber";
    pub const SUPPLIER_PAYMENT_TERMS: &str = "SupplierPaymentTerms";
    pub const SUPPLIER_ADVANCE_AMOUNT: &str = "SupplierAdvancePaidAmount";
    pub const SUPPLIER_ADVANCE_DATE: &str = "SupplierAdvancePaidDate";
    pub const SUPPLIER_BEFORE_AMOUNT: &str = "SupplierBeforePaidAmount";
    pub const SUPPLIER_BEFORE_DATE: &str = "SupplierBeforePaidDate";
    pub const SUPPLIER_BALANCE_AMOUNT: &str = "SupplierBalancePaidAmount";
    pub const SUPPLIER_BALANCE_DATE: &str = "SupplierBalancePaidDate";
    pub const SUPPLIER_NOTES: &str = "SupplierNotes";

    // Optional line-item columns outside the base contract.
    pub const FINAL_PRICE_PER_UNIT: &str = "FinalPricePerUnit";
    pub const SUPPLIER_UNIT_COST: &str = "SupplierUnitCost_for_LineItem";
    pub const QUOTED_PRICE_PER_UNIT: &str = "QuotedPricePerUnit";
    pub const NEGOTIATED_PRICE_PER_UNIT: &str = "NegotiatedPricePerUnit";
    pub const PRODUCT_ID: &str = "ProductID";
    pub const PRODUCT_NAME: &str = "ProductName";
    pub const PRODUCT_TYPE: &str = "ProductType";
    pub const LINE_ITEM_NOTES: &str = "LineItemNotes";

    pub const REQUIRED_ORDER: &[&str] = &[
        ORDER_ID,
        CLIENT_NAME,
        ORDER_DATE,
        CURRENT_STAGE,
        TOTAL_FINAL_PRICE,
    ];

    pub const REQUIRED_SUPPLIER: &[&str] =
        &[ORDER_ID, LINE_ITEM_ID, QUANTITY, SUPPLIER_ID, SUPPLIER_NAME];
}

// ---------------------------------------------------------------------------
// Sheet kind / structural errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetKind {
    Order,
    Supplier,
}

impl SheetKind {
    pub fn title(&self) -> &'static str {
        match self {
            SheetKind::Order => "Order Data CSV",
            SheetKind::Supplier => "Supplier/Line Item Data CSV",
        }
    }

    pub fn required_headers(&self) -> &'static [&'static str] {
        match self {
            SheetKind::Order => col::REQUIRED_ORDER,
            SheetKind::Supplier => col::REQUIRED_SUPPLIER,
        }
    }
}

/// Whole-sheet problems. Either one makes the run structural-fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetError {
    /// Fewer than a header row plus one data row.
    Empty(SheetKind),
    MissingHeader { sheet: SheetKind, header: String },
}

impl fmt::Display for SheetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetError::Empty(kind) => write!(
                f,
                "{} is empty or invalid (must have headers and at least one data row).",
                kind.title()
            ),
            SheetError::MissingHeader { sheet, header } => {
                write!(f, "{}: Missing required header \"{header}\".", sheet.title())
            }
        }
    }
}

impl std::error::Error for SheetError {}

// ---------------------------------------------------------------------------
// Sheet
// ---------------------------------------------------------------------------

/// A tokenized sheet: trimmed header row plus raw data rows.
#[derive(Debug, Clone)]
pub struct Sheet {
    kind: SheetKind,
    headers: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn parse(kind: SheetKind, text: &str) -> Self {
        let mut all = tokenize(text).into_iter();
        let headers: Vec<String> = all
            .next()
            .unwrap_or_default()
            .into_iter()
            .map(|h| h.trim().to_string())
            .collect();

        // A repeated header name resolves to its last occurrence.
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), i))
            .collect();

        Self {
            kind,
            headers,
            index,
            rows: all.collect(),
        }
    }

    pub fn kind(&self) -> SheetKind {
        self.kind
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// No header row, or a header row with no data rows below it.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn data_row_count(&self) -> usize {
        self.rows.len()
    }

    /// Structural problems: emptiness first, then each missing required header.
    pub fn structural_errors(&self) -> Vec<SheetError> {
        let mut out = Vec::new();
        if self.is_empty() {
            out.push(SheetError::Empty(self.kind));
        }
        for h in self.kind.required_headers() {
            if !self.has_column(h) {
                out.push(SheetError::MissingHeader {
                    sheet: self.kind,
                    header: h.to_string(),
                });
            }
        }
        out
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().enumerate().map(move |(index, cells)| Row {
            index: &self.index,
            cells,
            row_index: index,
        })
    }
}

/// One data row with by-name cell access.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    index: &'a HashMap<String, usize>,
    cells: &'a [String],
    /// 0-based position among data rows.
    pub row_index: usize,
}

impl<'a> Row<'a> {
    /// Trimmed cell value; `None` when the column is absent, the row is short,
    /// or the cell is blank.
    pub fn get(&self, column: &str) -> Option<&'a str> {
        let i = *self.index.get(column)?;
        let v = self.cells.get(i)?.trim();
        (!v.is_empty()).then_some(v)
    }

    /// 1-based line number with the header counted as line 1.
    pub fn line_number(&self) -> usize {
        self.row_index + 2
    }
}

// ---------------------------------------------------------------------------
// Numeric cells
// ---------------------------------------------------------------------------

/// Parse a numeric cell. Accepts a leading `$` and `,` group separators.
pub fn parse_number(raw: &str) -> Option<f64> {
    let t = raw.trim();
    let t = t.strip_prefix('$').unwrap_or(t);
    let cleaned: String = t.chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Outcome of reading an optional numeric cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum NumberCell<'a> {
    Blank,
    Value(f64),
    Invalid(&'a str),
}

pub(crate) fn number_cell<'a>(row: &Row<'a>, column: &str) -> NumberCell<'a> {
    match row.get(column) {
        None => NumberCell::Blank,
        Some(raw) => match parse_number(raw) {
            Some(v) => NumberCell::Value(v),
            None => NumberCell::Invalid(raw),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_trimmed_and_cells_trimmed() {
        let s = Sheet::parse(SheetKind::Order, " OrderID , ClientName\n  BM-1 ,  Acme \n");
        assert!(s.has_column("OrderID"));
        let row = s.rows().next().unwrap();
        assert_eq!(row.get("OrderID"), Some("BM-1"));
        assert_eq!(row.get("ClientName"), Some("Acme"));
        assert_eq!(row.line_number(), 2);
    }

    #[test]
    fn short_rows_and_blank_cells_read_as_none() {
        let s = Sheet::parse(SheetKind::Order, "A,B,C\n1\n2,  ,3");
        let rows: Vec<_> = s.rows().collect();
        assert_eq!(rows[0].get("B"), None);
        assert_eq!(rows[0].get("C"), None);
        assert_eq!(rows[1].get("B"), None);
        assert_eq!(rows[1].get("C"), Some("3"));
        assert_eq!(rows[1].get("Nope"), None);
    }

    #[test]
    fn structural_errors_name_sheet_and_header() {
        let s = Sheet::parse(SheetKind::Order, "OrderID,ClientName,OrderDate,CurrentStage\nBM-1,A,2024-01-01,Production");
        let errs = s.structural_errors();
        assert_eq!(errs.len(), 1);
        assert_eq!(
            errs[0].to_string(),
            "Order Data CSV: Missing required header \"TotalFinalPrice\"."
        );
    }

    #[test]
    fn header_only_sheet_is_empty() {
        let s = Sheet::parse(
            SheetKind::Supplier,
            "OrderID,LineItemID,Quantity,SupplierID_for_LineItem,SupplierName_for_LineItem\n",
        );
        assert!(s.is_empty());
        let errs = s.structural_errors();
        assert_eq!(errs, vec![SheetError::Empty(SheetKind::Supplier)]);
        assert!(errs[0].to_string().starts_with("Supplier/Line Item Data CSV is empty"));
    }

    #[test]
    fn parse_number_accepts_currency_formatting() {
        assert_eq!(parse_number("1000"), Some(1000.0));
        assert_eq!(parse_number(" $1,250.50 "), Some(1250.5));
        assert_eq!(parse_number("-3"), Some(-3.0));
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("$"), None);
        assert_eq!(parse_number("inf"), None);
    }
}
