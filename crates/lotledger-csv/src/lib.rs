//! CSV import/export for lots and gains, and the multi-format date parser
//! shared by both.

pub mod dates;
pub mod gains;
pub mod lots;

pub use dates::parse_flexible_date;
pub use gains::export_gains;
pub use lots::{export_lots, import_lots};
