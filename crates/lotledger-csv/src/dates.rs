//! Multi-format date parsing for CSV columns.
//!
//! Three formats are tried in order: ISO with time, ISO date, and the long
//! form used by some brokerage exports (`"Month DD, YYYY"`). The first that
//! parses wins.

use chrono::{NaiveDate, NaiveDateTime};
use lotledger_core::LedgerError;

const ISO_DATETIME: &str = "%Y-%m-%d %H:%M:%S";
const ISO_DATE: &str = "%Y-%m-%d";
const LONG_FORM: &str = "%B %d, %Y";

/// Parses `raw` as a date/time, naming `row`/`field` in the error if none of
/// the accepted formats match.
pub fn parse_flexible_date(raw: &str, row: usize, field: &str) -> Result<NaiveDateTime, LedgerError> {
    let trimmed = raw.trim();

    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, ISO_DATETIME) {
        return Ok(dt);
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, ISO_DATE) {
        return Ok(date.and_hms_opt(0, 0, 0).unwrap_or_default());
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, LONG_FORM) {
        return Ok(date.and_hms_opt(0, 0, 0).unwrap_or_default());
    }

    Err(LedgerError::InvalidDate(format!("row {row}, field {field:?}: {raw:?}")))
}
