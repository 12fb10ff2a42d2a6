//! The lot engine: opens and closes lots against incoming trades, adjusts
//! cost basis on return of capital, and re-units lots across stock splits.

use rust_decimal::Decimal;
use tracing::{debug, instrument};

use crate::decimal::within_tolerance;
use crate::error::LedgerError;
use crate::models::{EventLogKey, Gain, Lot, Transaction};
use crate::repository::Repository;

/// Applies a buy or sell transaction against open inventory, FIFO.
///
/// `units`/`total` are pre-signed: a buy carries positive units and negative
/// (paid) total; a sell carries negative units and positive (received) total.
#[instrument(skip(repo, tx), fields(tx_id = tx.id))]
pub fn trade(
    repo: &dyn Repository,
    tx: &Transaction,
    security: &str,
    units: Decimal,
    total: Decimal,
) -> Result<(), LedgerError> {
    let key = EventLogKey(tx.id);
    if repo.has_logged(key) {
        debug!("transaction already processed, skipping");
        return Ok(());
    }

    let mut remaining = units;
    let candidates = repo.lots_asof(tx.dttrade, Some(&tx.account), Some(security));
    let opposing: Vec<Lot> = candidates
        .into_iter()
        .filter(|lot| lot.units * units < Decimal::ZERO)
        .collect();

    for lot in opposing {
        if remaining == Decimal::ZERO {
            break;
        }
        if remaining.abs() >= lot.units.abs() {
            remaining += lot.units;
            close_lot(repo, lot, tx, lot_proceeds(&lot, total, units))?;
        } else {
            let closing_units = -remaining;
            let unit_cost = lot.unit_cost();
            let closing_cost = closing_units * unit_cost;
            let residual_units = lot.units + remaining;
            let residual_cost = lot.cost - closing_cost;

            let mut residual = lot.clone();
            residual.units = residual_units;
            residual.cost = residual_cost;
            repo.insert_lot(residual);
            repo.flush();

            let mut closing = lot.clone();
            closing.units = closing_units;
            closing.cost = closing_cost;
            close_lot(repo, closing, tx, lot_proceeds_for(closing_units, total, units))?;

            remaining = Decimal::ZERO;
        }
    }

    if remaining != Decimal::ZERO {
        repo.insert_lot(Lot {
            id: 0,
            account: tx.account.clone(),
            security: security.to_string(),
            units: remaining,
            cost: -total * (remaining / units),
            washcost: Decimal::ZERO,
            dtopen: tx.dttrade,
            dtclose: None,
            dtstart: tx.dttrade,
            dtend: None,
            opener: tx.id,
            closer: None,
            starter: tx.id,
            ender: None,
            predecessor: None,
        });
    }

    repo.insert_log_entry(key);
    Ok(())
}

fn lot_proceeds(lot: &Lot, trade_total: Decimal, trade_units: Decimal) -> Decimal {
    lot_proceeds_for(lot.units, trade_total, trade_units)
}

fn lot_proceeds_for(lot_units: Decimal, trade_total: Decimal, trade_units: Decimal) -> Decimal {
    (lot_units / trade_units) * (-trade_total)
}

fn close_lot(
    repo: &dyn Repository,
    mut lot: Lot,
    tx: &Transaction,
    proceeds: Decimal,
) -> Result<(), LedgerError> {
    lot.dtclose = Some(tx.dttrade);
    lot.closer = Some(tx.id);
    lot.dtend = Some(tx.dttrade);
    lot.ender = Some(tx.id);
    let lot_id = lot.id;
    repo.update_lot(lot);
    repo.insert_gain(Gain {
        id: 0,
        lot: lot_id,
        transaction: tx.id,
        proceeds,
        washloss: Decimal::ZERO,
    });
    repo.flush();
    Ok(())
}

/// Reduces cost basis of open long lots pro rata by units held, per a
/// return-of-capital distribution. Basis that would go negative clamps to
/// zero and the excess becomes a gain.
#[instrument(skip(repo, tx), fields(tx_id = tx.id))]
pub fn return_of_capital(
    repo: &dyn Repository,
    tx: &Transaction,
    security: &str,
    total: Decimal,
) -> Result<(), LedgerError> {
    let key = EventLogKey(tx.id);
    if repo.has_logged(key) {
        debug!("transaction already processed, skipping");
        return Ok(());
    }

    let longs = repo.longs_asof(tx.dttrade, Some(&tx.account), Some(security));
    let total_units: Decimal = longs.iter().map(|l| l.units).sum();
    if total_units == Decimal::ZERO {
        return Err(LedgerError::NoUnitsForReturnOfCapital {
            security: security.to_string(),
            date: tx.dttrade.to_string(),
        });
    }

    let unit_retofcap = total / total_units;

    for lot in longs {
        let mut adj_cost = lot.cost - lot.units * unit_retofcap;
        let mut successor = lot.clone();
        successor.predecessor = Some(lot.id);
        successor.dtstart = tx.dttrade;
        successor.starter = tx.id;

        let mut proceeds_excess = None;
        if adj_cost < Decimal::ZERO {
            proceeds_excess = Some(-adj_cost);
            adj_cost = Decimal::ZERO;
        }
        successor.cost = adj_cost;

        let successor_id = repo.insert_lot(successor);
        repo.flush();

        let mut ended = lot;
        ended.dtend = Some(tx.dttrade);
        ended.ender = Some(tx.id);
        repo.update_lot(ended);

        if let Some(proceeds) = proceeds_excess {
            repo.insert_gain(Gain {
                id: 0,
                lot: successor_id,
                transaction: tx.id,
                proceeds,
                washloss: Decimal::ZERO,
            });
        }
    }

    repo.insert_log_entry(key);
    Ok(())
}

/// Re-units every lot (long or short) of `security` across a stock split.
#[instrument(skip(repo, tx), fields(tx_id = tx.id))]
#[allow(clippy::too_many_arguments)]
pub fn split(
    repo: &dyn Repository,
    tx: &Transaction,
    security: &str,
    oldunits: Decimal,
    newunits: Decimal,
    numerator: Decimal,
    denominator: Decimal,
) -> Result<(), LedgerError> {
    let key = EventLogKey(tx.id);
    if repo.has_logged(key) {
        debug!("transaction already processed, skipping");
        return Ok(());
    }

    let ratio = newunits / oldunits;
    let expected_ratio = numerator / denominator;
    if !within_tolerance(ratio, expected_ratio) {
        return Err(LedgerError::SplitRatioMismatch {
            ratio: ratio.to_string(),
            numerator: numerator.to_string(),
            denominator: denominator.to_string(),
        });
    }

    let lots = repo.lots_asof(tx.dttrade, None, Some(security));
    let mut total_successor_units = Decimal::ZERO;

    for lot in lots {
        let mut successor = lot.clone();
        successor.units = lot.units * ratio;
        successor.predecessor = Some(lot.id);
        successor.dtstart = tx.dttrade;
        successor.starter = tx.id;
        total_successor_units += successor.units;
        repo.insert_lot(successor);

        let mut ended = lot;
        ended.dtend = Some(tx.dttrade);
        ended.ender = Some(tx.id);
        repo.update_lot(ended);
    }
    repo.flush();

    if !within_tolerance(total_successor_units, newunits) {
        return Err(LedgerError::SplitUnitsMismatch {
            security: security.to_string(),
            date: tx.dttrade.to_string(),
            actual: total_successor_units.to_string(),
            expected: newunits.to_string(),
        });
    }

    repo.insert_log_entry(key);
    Ok(())
}
