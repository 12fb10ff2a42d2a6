//! The wash-sale engine: disallows losses with replacement shares acquired
//! within 30 days, partitions the affected lot and gain into washed and
//! unwashed portions, and rolls the disallowed loss into replacement lots.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use tracing::{instrument, warn};

use crate::dates::within_wash_sale_window;
use crate::decimal::{signed_min_magnitude, within_tolerance};
use crate::error::LedgerError;
use crate::models::{Gain, Id, Lot, Transaction, TransactionKind};
use crate::repository::Repository;

fn trade_units_total(kind: &TransactionKind) -> Option<(Decimal, Decimal)> {
    match kind {
        TransactionKind::Buy { units, total, .. } | TransactionKind::Sell { units, total, .. } => {
            Some((*units, *total))
        }
        _ => None,
    }
}

fn proceeds_for(units: Decimal, trade_units: Decimal, trade_total: Decimal) -> Decimal {
    (units / trade_units) * (-trade_total)
}

/// Runs the wash-sale pass over every realized loss closed within
/// `[dtstart, dtend]`.
#[instrument(skip(repo))]
pub fn run(repo: &dyn Repository, dtstart: NaiveDateTime, dtend: NaiveDateTime) -> Result<(), LedgerError> {
    for gain in repo.gains_needing_washsale(dtstart, dtend) {
        let Some(lot) = repo.get_lot(gain.lot) else {
            continue;
        };
        if lot.closer != Some(gain.transaction) {
            continue;
        }
        if gain.value(&lot) >= Decimal::ZERO {
            continue;
        }
        process_loss(repo, &lot, &gain)?;
    }
    Ok(())
}

fn process_loss(repo: &dyn Repository, lot: &Lot, gain: &Gain) -> Result<(), LedgerError> {
    let Some(dtclose) = lot.dtclose else {
        return Ok(());
    };

    let window_start = dtclose - chrono::Duration::days(30);
    let window_end = dtclose + chrono::Duration::days(30);
    let mut candidates: Vec<Lot> = repo
        .lots_opened_between(&lot.account, &lot.security, window_start, window_end)
        .into_iter()
        .filter(|candidate| {
            candidate.id != lot.id
                && candidate.units.signum() == lot.units.signum()
                && candidate.washcost == Decimal::ZERO
                && within_wash_sale_window(dtclose, candidate.dtopen)
        })
        .collect();
    candidates.sort_by(|a, b| a.dtopen.cmp(&b.dtopen).then(a.id.cmp(&b.id)));

    let total_replacement: Decimal = candidates.iter().map(|c| c.units).sum();
    if total_replacement == Decimal::ZERO {
        return Ok(());
    }

    let effective = signed_min_magnitude(total_replacement, lot.units);
    let washed_units = effective;
    let unwashed_units = lot.units - washed_units;

    let unit_cost = lot.cost / lot.units;
    let unit_loss = gain.value(lot) / lot.units;

    let mut washed_lot = lot.clone();
    washed_lot.units = washed_units;
    washed_lot.cost = washed_units * unit_cost;

    let lot_gains = repo.gains_for_lot(lot.id);

    if unwashed_units != Decimal::ZERO {
        let mut unwashed_lot = lot.clone();
        unwashed_lot.id = 0;
        unwashed_lot.predecessor = None;
        unwashed_lot.units = unwashed_units;
        unwashed_lot.cost = unwashed_units * unit_cost;
        let unwashed_lot_id = repo.insert_lot(unwashed_lot);

        for existing in &lot_gains {
            let Some(tx) = lookup_trade(repo, existing.transaction) else {
                continue;
            };
            let Some((trade_units, trade_total)) = trade_units_total(&tx.kind) else {
                continue;
            };
            let proceeds = proceeds_for(unwashed_units, trade_units, trade_total);
            let mut corresponding = existing.clone();
            corresponding.id = 0;
            corresponding.lot = unwashed_lot_id;
            corresponding.proceeds = proceeds;
            repo.insert_gain(corresponding);
        }
    }

    repo.update_lot(washed_lot);

    let mut washed_gain = gain.clone();
    if let Some(tx) = lookup_trade(repo, gain.transaction)
        && let Some((trade_units, trade_total)) = trade_units_total(&tx.kind)
    {
        washed_gain.proceeds = proceeds_for(washed_units, trade_units, trade_total);
    }
    washed_gain.washloss = washed_units * unit_loss;
    repo.update_gain(washed_gain);

    roll_into_replacements(repo, washed_units, unit_loss, candidates)?;
    Ok(())
}

fn lookup_trade(repo: &dyn Repository, transaction: Id) -> Option<Transaction> {
    repo.get_transaction(transaction)
}

fn roll_into_replacements(
    repo: &dyn Repository,
    washed_units: Decimal,
    unit_loss: Decimal,
    candidates: Vec<Lot>,
) -> Result<(), LedgerError> {
    let mut remaining = washed_units;
    let mut rolled = Decimal::ZERO;

    for replacement in candidates {
        if remaining == Decimal::ZERO {
            break;
        }
        if remaining.abs() >= replacement.units.abs() {
            let washcost = replacement.units * -unit_loss;
            rolled += washcost;
            let mut updated = replacement.clone();
            updated.washcost = washcost;
            repo.update_lot(updated);
            remaining -= replacement.units;
        } else {
            let washed_portion_units = remaining;
            let unwashed_portion_units = replacement.units - remaining;
            let unit_cost = replacement.cost / replacement.units;

            let replacement_gains = repo.gains_for_lot(replacement.id);

            let mut unwashed_portion = replacement.clone();
            unwashed_portion.id = 0;
            unwashed_portion.units = unwashed_portion_units;
            unwashed_portion.cost = unwashed_portion_units * unit_cost;
            unwashed_portion.washcost = Decimal::ZERO;
            let unwashed_id = repo.insert_lot(unwashed_portion);

            let washcost = washed_portion_units * -unit_loss;
            rolled += washcost;
            let mut washed_portion = replacement.clone();
            washed_portion.units = washed_portion_units;
            washed_portion.cost = washed_portion_units * unit_cost;
            washed_portion.washcost = washcost;
            repo.update_lot(washed_portion);

            for existing in replacement_gains {
                let Some(tx) = lookup_trade(repo, existing.transaction) else {
                    continue;
                };
                let Some((trade_units, trade_total)) = trade_units_total(&tx.kind) else {
                    continue;
                };
                let mut unwashed_gain = existing.clone();
                unwashed_gain.id = 0;
                unwashed_gain.lot = unwashed_id;
                unwashed_gain.proceeds = proceeds_for(unwashed_portion_units, trade_units, trade_total);
                repo.insert_gain(unwashed_gain);

                let mut washed_gain = existing.clone();
                washed_gain.proceeds = proceeds_for(washed_portion_units, trade_units, trade_total);
                repo.update_gain(washed_gain);
            }

            remaining = Decimal::ZERO;
        }
    }

    if remaining != Decimal::ZERO || !within_tolerance(rolled, washed_units.abs() * unit_loss.abs()) {
        warn!(
            remaining = %remaining,
            rolled = %rolled,
            "wash-sale roll did not fully reconcile against the disallowed loss"
        );
        return Err(LedgerError::WashSaleInvariant {
            gain_id: 0,
            detail: format!("remaining={remaining}, rolled={rolled}"),
        });
    }
    Ok(())
}
