//! Transfer/reorganization adjunct: handles account/security-identity-changing
//! events by ending an old lot and creating a linked successor.

use rust_decimal::Decimal;
use tracing::{debug, instrument};

use crate::error::LedgerError;
use crate::models::{EventLogKey, Lot, Transaction};
use crate::repository::Repository;

/// One side of a transfer pair: a security identifier, signed units, and the
/// memo text before the trailing `(ticker, secname, uniqueid)` group.
struct TransferSide<'a> {
    tx: &'a Transaction,
    security: &'a str,
    units: Decimal,
}

/// The prefix of a transfer memo, stripping a trailing
/// `(ticker, secname, uniqueid)` group.
pub fn memo_prefix(memo: &str) -> &str {
    match memo.rfind('(') {
        Some(idx) => memo[..idx].trim_end(),
        None => memo.trim_end(),
    }
}

/// Finds the twin of `tx` among `candidates` (same account, same date,
/// matching memo prefix, opposite-signed units) and processes the pair if
/// found. Returns `Ok(false)` if no twin is present (not a transfer we can
/// complete yet).
#[instrument(skip(repo, tx, candidates), fields(tx_id = tx.id))]
pub fn transfer(
    repo: &dyn Repository,
    tx: &Transaction,
    security: &str,
    units: Decimal,
    memo: &str,
    candidates: &[Transaction],
) -> Result<bool, LedgerError> {
    let key = EventLogKey(tx.id);
    if repo.has_logged(key) {
        debug!("transaction already processed, skipping");
        return Ok(true);
    }

    let prefix = memo_prefix(memo);
    let twin = candidates.iter().find_map(|other| {
        if other.id == tx.id || other.account != tx.account || other.dttrade != tx.dttrade {
            return None;
        }
        match &other.kind {
            crate::models::TransactionKind::Transfer {
                security: other_security,
                units: other_units,
                memo: other_memo,
            } if memo_prefix(other_memo) == prefix => {
                Some((other, other_security.as_str(), *other_units))
            }
            _ => None,
        }
    });

    let Some((twin_tx, twin_security, twin_units)) = twin else {
        return Ok(false);
    };

    let this_side = TransferSide { tx, security, units };
    let other_side = TransferSide {
        tx: twin_tx,
        security: twin_security,
        units: twin_units,
    };

    let held_here = !repo
        .lots_asof(tx.dttrade, Some(&tx.account), Some(security))
        .is_empty();

    let (outgoing, incoming) = if held_here {
        (this_side, other_side)
    } else {
        (other_side, this_side)
    };

    if !held_here
        && repo
            .lots_asof(tx.dttrade, Some(&tx.account), Some(twin_security))
            .is_empty()
    {
        repo.insert_log_entry(key);
        repo.insert_log_entry(EventLogKey(twin_tx.id));
        return Ok(true);
    }

    let held = repo.lots_asof(outgoing.tx.dttrade, Some(&outgoing.tx.account), Some(outgoing.security));
    let total_held: Decimal = held.iter().map(|l| l.units).sum();
    if !crate::decimal::within_tolerance(total_held, -outgoing.units) {
        return Err(LedgerError::TransferUnitsMismatch {
            account: outgoing.tx.account.clone(),
            security: outgoing.security.to_string(),
            held: total_held.to_string(),
            expected: (-outgoing.units).to_string(),
        });
    }

    for lot in held {
        let mut successor = lot.clone();
        successor.security = incoming.security.to_string();
        successor.units = lot.units * (incoming.units / total_held);
        successor.predecessor = Some(lot.id);
        successor.dtstart = incoming.tx.dttrade;
        successor.starter = incoming.tx.id;
        repo.insert_lot(successor);

        let mut ended = lot;
        ended.dtend = Some(outgoing.tx.dttrade);
        ended.ender = Some(outgoing.tx.id);
        repo.update_lot(ended);
    }
    repo.flush();

    repo.insert_log_entry(key);
    repo.insert_log_entry(EventLogKey(twin_tx.id));
    Ok(true)
}
