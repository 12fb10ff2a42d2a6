//! Lots CSV import/export.
//!
//! Columns: `brokerid, acctid, ticker, secname, uniqueidtype, uniqueid,
//! dtopen, units, cost, washcost`. The repository's [`Lot`] model doesn't
//! carry `brokerid`/`secname`/`uniqueidtype`/`uniqueid` -- they're exported
//! for human cross-reference and ignored on import (`account` comes from
//! `acctid`, `security` from `ticker`).

use std::collections::BTreeMap;
use std::io::{Read, Write};

use lotledger_core::{LedgerError, Lot};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::dates::parse_flexible_date;

const ISO_DATETIME: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Deserialize)]
struct RawLotRow {
    #[serde(default)]
    brokerid: String,
    acctid: String,
    ticker: String,
    #[serde(default)]
    secname: String,
    #[serde(default)]
    uniqueidtype: String,
    #[serde(default)]
    uniqueid: String,
    dtopen: String,
    units: String,
    cost: String,
    #[serde(default)]
    washcost: String,
}

#[derive(Debug, Serialize)]
struct LotRow {
    brokerid: String,
    acctid: String,
    ticker: String,
    secname: String,
    uniqueidtype: String,
    uniqueid: String,
    dtopen: String,
    units: String,
    cost: String,
    washcost: String,
}

#[derive(Debug, Serialize)]
struct ConsolidatedLotRow {
    brokerid: String,
    acctid: String,
    ticker: String,
    secname: String,
    uniqueidtype: String,
    uniqueid: String,
    units: String,
    cost: String,
}

/// Parses lots out of `reader`, as freshly opened positions with no
/// originating transaction (`opener`/`starter` are set to the sentinel `0`,
/// `dtstart = dtopen`). The repository assigns real lot ids on insert.
#[instrument(skip(reader))]
pub fn import_lots<R: Read>(reader: R) -> Result<Vec<Lot>, LedgerError> {
    let mut csv_reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
    let mut lots = Vec::new();

    for (idx, result) in csv_reader.deserialize::<RawLotRow>().enumerate() {
        let row = result.map_err(|e| LedgerError::Csv(e.to_string()))?;
        let row_num = idx + 1;

        let units: Decimal = row
            .units
            .trim()
            .parse()
            .map_err(|_| LedgerError::Csv(format!("row {row_num}: invalid units {:?}", row.units)))?;
        let cost: Decimal = row
            .cost
            .trim()
            .parse()
            .map_err(|_| LedgerError::Csv(format!("row {row_num}: invalid cost {:?}", row.cost)))?;
        let washcost = if row.washcost.trim().is_empty() {
            Decimal::ZERO
        } else {
            row.washcost
                .trim()
                .parse()
                .map_err(|_| LedgerError::Csv(format!("row {row_num}: invalid washcost {:?}", row.washcost)))?
        };
        let dtopen = parse_flexible_date(&row.dtopen, row_num, "dtopen")?;
        let RawLotRow { acctid, ticker, .. } = row;

        debug!(row = row_num, ticker = %ticker, "imported lot row");
        lots.push(Lot {
            id: 0,
            account: acctid,
            security: ticker,
            units,
            cost,
            washcost,
            dtopen,
            dtclose: None,
            dtstart: dtopen,
            dtend: None,
            opener: 0,
            closer: None,
            starter: 0,
            ender: None,
            predecessor: None,
        });
    }

    Ok(lots)
}

/// Writes `lots` to `writer`. `consolidate` sums `units`/`cost` per
/// `(account, security)` and drops `dtopen`/`washcost`.
#[instrument(skip(lots, writer))]
pub fn export_lots<W: Write>(writer: W, lots: &[Lot], consolidate: bool) -> Result<(), LedgerError> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    if consolidate {
        let mut totals: BTreeMap<(String, String), (Decimal, Decimal)> = BTreeMap::new();
        for lot in lots {
            let entry = totals.entry((lot.account.clone(), lot.security.clone())).or_default();
            entry.0 += lot.units;
            entry.1 += lot.cost;
        }
        for ((account, security), (units, cost)) in totals {
            csv_writer
                .serialize(ConsolidatedLotRow {
                    brokerid: String::new(),
                    acctid: account,
                    ticker: security.clone(),
                    secname: security.clone(),
                    uniqueidtype: "TICKER".into(),
                    uniqueid: security,
                    units: units.to_string(),
                    cost: cost.to_string(),
                })
                .map_err(|e| LedgerError::Csv(e.to_string()))?;
        }
    } else {
        for lot in lots {
            csv_writer
                .serialize(LotRow {
                    brokerid: String::new(),
                    acctid: lot.account.clone(),
                    ticker: lot.security.clone(),
                    secname: lot.security.clone(),
                    uniqueidtype: "TICKER".into(),
                    uniqueid: lot.security.clone(),
                    dtopen: lot.dtopen.format(ISO_DATETIME).to_string(),
                    units: lot.units.to_string(),
                    cost: lot.cost.to_string(),
                    washcost: lot.washcost.to_string(),
                })
                .map_err(|e| LedgerError::Csv(e.to_string()))?;
        }
    }

    csv_writer.flush().map_err(|e| LedgerError::Csv(e.to_string()))?;
    Ok(())
}
