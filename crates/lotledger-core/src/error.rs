//! Error types for the lot/gain ledger engine.

use thiserror::Error;

/// Errors raised by the ledger engine.
///
/// Fatal invariant violations abort the enclosing transaction (see
/// [`crate::driver::run`]); input-parse errors fail fast with a descriptive
/// message. Duplicate events and unrecognized transaction kinds are not
/// errors -- they are silent no-ops handled by the caller.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error(
        "transfer pair for account {account} on {date} has non-opposite units: {units_a} vs {units_b}"
    )]
    TransferSignMismatch {
        account: String,
        date: String,
        units_a: String,
        units_b: String,
    },

    #[error(
        "transfer for account {account}/{security}: held units {held} do not match expected {expected}"
    )]
    TransferUnitsMismatch {
        account: String,
        security: String,
        held: String,
        expected: String,
    },

    #[error("split ratio {ratio} does not match numerator/denominator {numerator}/{denominator}")]
    SplitRatioMismatch {
        ratio: String,
        numerator: String,
        denominator: String,
    },

    #[error(
        "split for {security} on {date}: successor units {actual} do not sum to newunits {expected}"
    )]
    SplitUnitsMismatch {
        security: String,
        date: String,
        actual: String,
        expected: String,
    },

    #[error("return of capital for {security} on {date}: no open long units available")]
    NoUnitsForReturnOfCapital { security: String, date: String },

    #[error("wash-sale post-condition violated for gain {gain_id}: {detail}")]
    WashSaleInvariant { gain_id: u64, detail: String },

    #[error("malformed transfer memo: {0:?}")]
    MalformedTransferMemo(String),

    #[error("malformed return-of-capital memo: {0:?}")]
    MalformedRetofcapMemo(String),

    #[error("unsupported OFX import: feed parsed transactions via `load`/JSON instead ({0})")]
    OfxImportUnsupported(String),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("invalid date {0:?}: matches none of the accepted formats")]
    InvalidDate(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}
