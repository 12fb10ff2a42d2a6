//! Lot/gain ledger engine: FIFO lot matching, return-of-capital and split
//! adjustments, transfer/reorganization handling, and wash-sale loss
//! disallowance over a repository of lots, gains, and transactions.

pub mod config;
pub mod dates;
pub mod decimal;
pub mod driver;
pub mod error;
pub mod event_log;
pub mod lot_engine;
pub mod models;
pub mod quirks;
pub mod repository;
pub mod transfer;
pub mod wash_sale;

pub use config::Config;
pub use error::LedgerError;
pub use models::{EventLogKey, Gain, Id, Lot, Transaction, TransactionKind};
pub use repository::{InMemoryRepository, Repository, Snapshot};
