//! Gains CSV export.
//!
//! Columns: `brokerid, acctid, ticker, secname, dtclose, fitidclose,
//! longterm, dtopen, fitidopen, units, proceeds, cost, gain, washcost,
//! washloss`. `longterm` is the literal string `LTCG` or `STCG`. The export
//! filters on the gains query itself (by account/security and date range),
//! not on some unrelated scope.

use std::io::Write;

use chrono::NaiveDateTime;
use lotledger_core::{LedgerError, Repository};
use serde::Serialize;
use tracing::instrument;

const ISO_DATETIME: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Serialize)]
struct GainRow {
    brokerid: String,
    acctid: String,
    ticker: String,
    secname: String,
    dtclose: String,
    fitidclose: String,
    longterm: String,
    dtopen: String,
    fitidopen: String,
    units: String,
    proceeds: String,
    cost: String,
    gain: String,
    washcost: String,
    washloss: String,
}

/// Exports gains whose lot closed within `[dtstart, dtend]`, optionally
/// restricted to `account`/`security`.
#[instrument(skip(repo, writer))]
pub fn export_gains<W: Write>(
    writer: W,
    repo: &dyn Repository,
    dtstart: NaiveDateTime,
    dtend: NaiveDateTime,
    account: Option<&str>,
    security: Option<&str>,
) -> Result<(), LedgerError> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    for gain in repo.gains_in(dtstart, dtend, account, security) {
        let Some(lot) = repo.get_lot(gain.lot) else {
            continue;
        };
        let Some(dtclose) = lot.dtclose else {
            continue;
        };
        let fitidclose = lot.closer.map(|id| id.to_string()).unwrap_or_default();
        let fitidopen = lot.opener.to_string();
        let longterm = if gain.is_long_term(&lot) { "LTCG" } else { "STCG" };

        csv_writer
            .serialize(GainRow {
                brokerid: String::new(),
                acctid: lot.account.clone(),
                ticker: lot.security.clone(),
                secname: lot.security.clone(),
                dtclose: dtclose.format(ISO_DATETIME).to_string(),
                fitidclose,
                longterm: longterm.to_string(),
                dtopen: lot.dtopen.format(ISO_DATETIME).to_string(),
                fitidopen,
                units: lot.units.to_string(),
                proceeds: gain.proceeds.to_string(),
                cost: lot.cost.to_string(),
                gain: gain.value(&lot).to_string(),
                washcost: lot.washcost.to_string(),
                washloss: gain.washloss.to_string(),
            })
            .map_err(|e| LedgerError::Csv(e.to_string()))?;
    }

    csv_writer.flush().map_err(|e| LedgerError::Csv(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use lotledger_core::{Gain, InMemoryRepository, Lot};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn dt(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap_or_default()
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default()
    }

    #[test]
    fn exports_closed_lot_as_ltcg_or_stcg() {
        let repo = InMemoryRepository::new();
        let lot_id = repo.insert_lot(Lot {
            id: 0,
            account: "acct".into(),
            security: "AAPL".into(),
            units: dec!(100),
            cost: dec!(1000),
            washcost: Decimal::ZERO,
            dtopen: dt(2005, 10, 3),
            dtclose: Some(dt(2007, 1, 1)),
            dtstart: dt(2005, 10, 3),
            dtend: Some(dt(2007, 1, 1)),
            opener: 1,
            closer: Some(2),
            starter: 1,
            ender: Some(2),
            predecessor: None,
        });
        repo.insert_gain(Gain {
            id: 0,
            lot: lot_id,
            transaction: 2,
            proceeds: dec!(1200),
            washloss: Decimal::ZERO,
        });

        let mut buf = Vec::new();
        export_gains(&mut buf, &repo, dt(2006, 1, 1), dt(2008, 1, 1), None, None).expect("export");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.contains("LTCG"));
        assert!(text.contains("200"));
    }

    #[test]
    fn filters_by_date_range() {
        let repo = InMemoryRepository::new();
        let lot_id = repo.insert_lot(Lot {
            id: 0,
            account: "acct".into(),
            security: "AAPL".into(),
            units: dec!(100),
            cost: dec!(1000),
            washcost: Decimal::ZERO,
            dtopen: dt(2005, 10, 3),
            dtclose: Some(dt(2005, 12, 1)),
            dtstart: dt(2005, 10, 3),
            dtend: Some(dt(2005, 12, 1)),
            opener: 1,
            closer: Some(2),
            starter: 1,
            ender: Some(2),
            predecessor: None,
        });
        repo.insert_gain(Gain {
            id: 0,
            lot: lot_id,
            transaction: 2,
            proceeds: dec!(1100),
            washloss: Decimal::ZERO,
        });

        let mut buf = Vec::new();
        export_gains(&mut buf, &repo, dt(2006, 1, 1), dt(2007, 1, 1), None, None).expect("export");
        assert_eq!(String::from_utf8(buf).expect("utf8").lines().count(), 1);
    }
}
