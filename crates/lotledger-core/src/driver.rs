//! The driver: consumes a chronologically ordered transaction stream and
//! dispatches each record to the quirks dispatcher, then the lot engine or
//! transfer adjunct, before running the wash-sale pass over the same window.

use chrono::NaiveDateTime;
use tracing::{info, instrument, warn};

use crate::config::Config;
use crate::error::LedgerError;
use crate::models::TransactionKind;
use crate::quirks::{self, Dispatch};
use crate::repository::Repository;
use crate::{lot_engine, wash_sale};

/// Ingests and processes every transaction with `dttrade` in
/// `[dtstart, dtend]`, then disallows wash-sale losses realized in the same
/// window. The whole run is one repository transaction: a fatal invariant
/// violation rolls back every write this call made.
#[instrument(skip(repo, config))]
pub fn run(
    repo: &dyn Repository,
    config: &Config,
    dtstart: NaiveDateTime,
    dtend: NaiveDateTime,
) -> Result<(), LedgerError> {
    repo.begin();
    match run_inner(repo, config, dtstart, dtend) {
        Ok(()) => {
            repo.commit();
            Ok(())
        }
        Err(err) => {
            warn!(error = %err, "ledger run aborted, rolling back");
            repo.rollback();
            Err(err)
        }
    }
}

fn run_inner(
    repo: &dyn Repository,
    config: &Config,
    dtstart: NaiveDateTime,
    dtend: NaiveDateTime,
) -> Result<(), LedgerError> {
    let transactions = repo.transactions_in(dtstart, dtend);

    for tx in &transactions {
        match quirks::dispatch(repo, config, tx, &transactions)? {
            Dispatch::Handled => continue,
            Dispatch::Fallthrough => {}
        }

        match &tx.kind {
            TransactionKind::Buy { security, units, total } | TransactionKind::Sell { security, units, total } => {
                lot_engine::trade(repo, tx, security, *units, *total)?;
            }
            TransactionKind::ReturnOfCapital { security, total } => {
                lot_engine::return_of_capital(repo, tx, security, *total)?;
            }
            TransactionKind::Split {
                security,
                oldunits,
                newunits,
                numerator,
                denominator,
            } => {
                lot_engine::split(repo, tx, security, *oldunits, *newunits, *numerator, *denominator)?;
            }
            TransactionKind::Transfer { .. } => {
                // Only ever reached for a broker with no quirks entry at
                // all, in which case dispatch() already handled (dropped)
                // it above. Kept as an explicit no-op arm for clarity.
            }
            TransactionKind::Income { .. } | TransactionKind::Expense { .. } | TransactionKind::Other => {}
        }
    }

    wash_sale::run(repo, dtstart, dtend)?;
    info!(count = transactions.len(), "ledger run complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Transaction;
    use crate::repository::InMemoryRepository;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn dt(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap_or_default()
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default()
    }

    #[test]
    fn buy_then_sell_produces_a_gain() {
        let repo = InMemoryRepository::new();
        let config = Config::embedded();

        repo.insert_transaction(Transaction {
            id: 1,
            account: "acct".into(),
            broker: "0".into(),
            dttrade: dt(2005, 10, 3),
            kind: TransactionKind::Buy {
                security: "AAPL".into(),
                units: dec!(300),
                total: dec!(-3009.99),
            },
        });
        repo.insert_transaction(Transaction {
            id: 2,
            account: "acct".into(),
            broker: "0".into(),
            dttrade: dt(2005, 12, 1),
            kind: TransactionKind::Sell {
                security: "AAPL".into(),
                units: dec!(-200),
                total: dec!(2390.01),
            },
        });

        run(&repo, &config, dt(2005, 1, 1), dt(2006, 1, 1)).expect("run");

        let open = repo.longs_asof(dt(2005, 12, 2), Some("acct"), Some("AAPL"));
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].units, dec!(100));

        let gains = repo.gains_for_lot(1);
        assert_eq!(gains.len(), 1);
        assert_eq!(gains[0].proceeds, dec!(2390.01));
    }

    #[test]
    fn rerunning_the_same_window_is_idempotent() {
        let repo = InMemoryRepository::new();
        let config = Config::embedded();

        repo.insert_transaction(Transaction {
            id: 1,
            account: "acct".into(),
            broker: "0".into(),
            dttrade: dt(2005, 10, 3),
            kind: TransactionKind::Buy {
                security: "AAPL".into(),
                units: dec!(300),
                total: dec!(-3009.99),
            },
        });

        run(&repo, &config, dt(2005, 1, 1), dt(2006, 1, 1)).expect("first run");
        run(&repo, &config, dt(2005, 1, 1), dt(2006, 1, 1)).expect("second run");

        assert_eq!(repo.longs_asof(dt(2005, 12, 2), None, None).len(), 1);
    }

    #[test]
    fn unrecognized_kind_is_silently_dropped() {
        let repo = InMemoryRepository::new();
        let config = Config::embedded();

        repo.insert_transaction(Transaction {
            id: 1,
            account: "acct".into(),
            broker: "0".into(),
            dttrade: dt(2005, 10, 3),
            kind: TransactionKind::Other,
        });

        run(&repo, &config, dt(2005, 1, 1), dt(2006, 1, 1)).expect("run");
        assert!(repo.longs_asof(dt(2005, 12, 2), None, None).is_empty());
    }
}
