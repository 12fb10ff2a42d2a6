//! Broker-quirks dispatcher: per-broker overrides that remap malformed
//! transaction kinds onto the canonical handlers before the driver's default
//! routing runs.

use tracing::{debug, info};

use crate::config::Config;
use crate::error::LedgerError;
use crate::models::{EventLogKey, Transaction, TransactionKind};
use crate::repository::Repository;

/// What the dispatcher decided to do with a transaction: either it was
/// fully handled here (the driver should not also run its default routing),
/// or it should fall through to the default handler for its kind.
pub enum Dispatch {
    Handled,
    Fallthrough,
}

/// Consults the broker-quirks table for `tx` and runs any override found.
///
/// `candidates` is the full transaction stream for the run's date window,
/// passed through to the transfer adjunct to find `tx`'s twin record.
/// Transfer events are only ever handled here: there is no default handler
/// for them, so a broker without the `transfer` quirk simply drops them, per
/// the "unrecognized kinds are silent no-ops" rule.
pub fn dispatch(
    repo: &dyn Repository,
    config: &Config,
    tx: &Transaction,
    candidates: &[Transaction],
) -> Result<Dispatch, LedgerError> {
    let Some(quirk) = config.quirk_for(&tx.broker) else {
        return match &tx.kind {
            TransactionKind::Transfer { .. } => Ok(Dispatch::Handled),
            _ => Ok(Dispatch::Fallthrough),
        };
    };

    match &tx.kind {
        TransactionKind::Transfer { security, units, memo } if quirk.transfer => {
            crate::transfer::transfer(repo, tx, security, *units, memo, candidates)?;
            Ok(Dispatch::Handled)
        }
        TransactionKind::Transfer { .. } => Ok(Dispatch::Handled),
        TransactionKind::Income { total, memo } if quirk.income_as_retofcap => {
            income_as_return_of_capital(repo, tx, *total, memo)
        }
        _ => Ok(Dispatch::Fallthrough),
    }
}

/// Income reclassified as return of capital when the memo says so, unless a
/// same-day, equal-magnitude, opposite-sign Expense with the same memo
/// prefix reverses it economically (in which case both are logged and
/// discarded).
fn income_as_return_of_capital(
    repo: &dyn Repository,
    tx: &Transaction,
    total: rust_decimal::Decimal,
    memo: &str,
) -> Result<Dispatch, LedgerError> {
    if !memo.to_lowercase().contains("return of capital") {
        return Ok(Dispatch::Fallthrough);
    }

    let prefix = crate::transfer::memo_prefix(memo);
    let siblings = repo.transactions_in(tx.dttrade, tx.dttrade);
    let reversal = siblings.iter().find(|other| {
        other.id != tx.id
            && other.account == tx.account
            && matches!(
                &other.kind,
                TransactionKind::Expense { total: other_total, memo: other_memo }
                    if *other_total == -total && crate::transfer::memo_prefix(other_memo) == prefix
            )
    });

    if let Some(reversal) = reversal {
        info!(
            tx_id = tx.id,
            reversal_id = reversal.id,
            "return-of-capital income reversed by matching expense, discarding both"
        );
        repo.insert_log_entry(EventLogKey(tx.id));
        repo.insert_log_entry(EventLogKey(reversal.id));
        return Ok(Dispatch::Handled);
    }

    let security = tx.security().unwrap_or_default().to_string();
    debug!(tx_id = tx.id, %security, "routing income to return-of-capital handler");
    crate::lot_engine::return_of_capital(repo, tx, &security, total)?;
    Ok(Dispatch::Handled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransactionKind;
    use crate::repository::InMemoryRepository;
    use chrono::{NaiveDate, NaiveDateTime};
    use rust_decimal_macros::dec;

    fn dt(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap_or_default()
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default()
    }

    #[test]
    fn unknown_broker_falls_through() {
        let repo = InMemoryRepository::new();
        let config = Config::embedded();
        let tx = Transaction {
            id: 1,
            account: "acct".into(),
            broker: "9999".into(),
            dttrade: dt(2020, 1, 1),
            kind: TransactionKind::Other,
        };
        assert!(matches!(dispatch(&repo, &config, &tx, &[]), Ok(Dispatch::Fallthrough)));
    }

    #[test]
    fn reversed_income_is_discarded() {
        let repo = InMemoryRepository::new();
        let config = Config::embedded();

        let income = Transaction {
            id: 1,
            account: "acct".into(),
            broker: "4705".into(),
            dttrade: dt(2020, 1, 1),
            kind: TransactionKind::Income {
                total: dec!(100),
                memo: "return of capital (AAPL, Apple, 1)".into(),
            },
        };
        let expense = Transaction {
            id: 2,
            account: "acct".into(),
            broker: "4705".into(),
            dttrade: dt(2020, 1, 1),
            kind: TransactionKind::Expense {
                total: dec!(-100),
                memo: "return of capital (AAPL, Apple, 1)".into(),
            },
        };
        repo.insert_transaction(income.clone());
        repo.insert_transaction(expense);

        let result = dispatch(&repo, &config, &income, &[]).expect("dispatch");
        assert!(matches!(result, Dispatch::Handled));
        assert!(repo.has_logged(EventLogKey(1)));
        assert!(repo.has_logged(EventLogKey(2)));
    }

    #[test]
    fn transfer_without_quirk_is_silently_dropped() {
        let repo = InMemoryRepository::new();
        let config = Config::embedded();
        let tx = Transaction {
            id: 1,
            account: "acct".into(),
            broker: "9999".into(),
            dttrade: dt(2020, 1, 1),
            kind: TransactionKind::Transfer {
                security: "AAPL".into(),
                units: dec!(-100),
                memo: "MERGER (AAPL, Apple, 1)".into(),
            },
        };
        let result = dispatch(&repo, &config, &tx, &[tx.clone()]).expect("dispatch");
        assert!(matches!(result, Dispatch::Handled));
        assert!(repo.lots_asof(dt(2020, 1, 2), None, None).is_empty());
    }

    #[test]
    fn transfer_with_quirk_routes_to_transfer_adjunct() {
        let repo = InMemoryRepository::new();
        let config = Config::embedded();
        let buy_tx = Transaction {
            id: 1,
            account: "acct".into(),
            broker: "4705".into(),
            dttrade: dt(2020, 1, 1),
            kind: TransactionKind::Buy {
                security: "OLDCO".into(),
                units: dec!(100),
                total: dec!(-1000),
            },
        };
        crate::lot_engine::trade(&repo, &buy_tx, "OLDCO", dec!(100), dec!(-1000)).expect("buy");

        let out_tx = Transaction {
            id: 2,
            account: "acct".into(),
            broker: "4705".into(),
            dttrade: dt(2020, 6, 1),
            kind: TransactionKind::Transfer {
                security: "OLDCO".into(),
                units: dec!(-100),
                memo: "MERGER (OLDCO, Old Co, 1)".into(),
            },
        };
        let in_tx = Transaction {
            id: 3,
            account: "acct".into(),
            broker: "4705".into(),
            dttrade: dt(2020, 6, 1),
            kind: TransactionKind::Transfer {
                security: "NEWCO".into(),
                units: dec!(50),
                memo: "MERGER (NEWCO, New Co, 2)".into(),
            },
        };
        let candidates = vec![out_tx.clone(), in_tx.clone()];

        let result = dispatch(&repo, &config, &out_tx, &candidates).expect("dispatch");
        assert!(matches!(result, Dispatch::Handled));

        let new_lots = repo.longs_asof(dt(2020, 6, 2), Some("acct"), Some("NEWCO"));
        assert_eq!(new_lots.len(), 1);
        assert_eq!(new_lots[0].units, dec!(50));
    }
}
