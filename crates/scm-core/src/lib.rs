//! scm-core
//!
//! Order / supplier reconciliation engine for the supply-chain dashboard.
//!
//! - Two loosely-correlated CSV sheets (Order sheet, Supplier/Line-Item sheet)
//!   are tokenized, joined on `OrderID` and rebuilt into complete [`Order`]s.
//! - Row-level problems never abort a run: values are defaulted and a
//!   human-readable message is appended to the flat error list.
//! - Pipeline board and KPI tiles are derived from the reconciled set.
//!
//! Deterministic, pure logic. No IO. "Now" is always injectable.

pub mod csv_text;
pub mod dates;
pub mod filters;
pub mod kpi;
pub mod lifecycle;
pub mod mock;
pub mod pipeline;
pub mod template;

mod engine;
mod joiner;
mod reconstruct;
mod sheet;
mod types;

pub use engine::{reconcile, reconcile_with, ReconcileOptions, ReconcileOutput};
pub use joiner::{join_supplier_rows, JoinedLineItems};
pub use reconstruct::{reconstruct_orders, PartialOrder};
pub use sheet::{parse_number, Row, Sheet, SheetError, SheetKind};
pub use types::*;
