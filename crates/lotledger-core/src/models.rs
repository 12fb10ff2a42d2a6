//! Core data model: lots, gains, transactions, and the event-log key.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A stable numeric identifier assigned by the repository on insert.
pub type Id = u64;

/// The stream contract the driver consumes: a tagged union over transaction
/// kinds, each carrying only the fields it needs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransactionKind {
    Buy {
        security: String,
        units: Decimal,
        total: Decimal,
    },
    Sell {
        security: String,
        units: Decimal,
        total: Decimal,
    },
    ReturnOfCapital {
        security: String,
        total: Decimal,
    },
    Split {
        security: String,
        oldunits: Decimal,
        newunits: Decimal,
        numerator: Decimal,
        denominator: Decimal,
    },
    Transfer {
        security: String,
        units: Decimal,
        memo: String,
    },
    Income {
        total: Decimal,
        memo: String,
    },
    Expense {
        total: Decimal,
        memo: String,
    },
    Other,
}

impl TransactionKind {
    /// Short label used in log output and CLI diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            TransactionKind::Buy { .. } => "buy",
            TransactionKind::Sell { .. } => "sell",
            TransactionKind::ReturnOfCapital { .. } => "return_of_capital",
            TransactionKind::Split { .. } => "split",
            TransactionKind::Transfer { .. } => "transfer",
            TransactionKind::Income { .. } => "income",
            TransactionKind::Expense { .. } => "expense",
            TransactionKind::Other => "other",
        }
    }

    /// The security this transaction applies to, if any.
    pub fn security(&self) -> Option<&str> {
        match self {
            TransactionKind::Buy { security, .. }
            | TransactionKind::Sell { security, .. }
            | TransactionKind::ReturnOfCapital { security, .. }
            | TransactionKind::Split { security, .. }
            | TransactionKind::Transfer { security, .. } => Some(security),
            TransactionKind::Income { .. } | TransactionKind::Expense { .. } | TransactionKind::Other => {
                None
            }
        }
    }

    /// The memo text carried by memo-bearing variants.
    pub fn memo(&self) -> Option<&str> {
        match self {
            TransactionKind::Transfer { memo, .. }
            | TransactionKind::Income { memo, .. }
            | TransactionKind::Expense { memo, .. } => Some(memo),
            _ => None,
        }
    }

    /// The signed cash total carried by cash-bearing variants.
    pub fn total(&self) -> Option<Decimal> {
        match self {
            TransactionKind::Buy { total, .. }
            | TransactionKind::Sell { total, .. }
            | TransactionKind::ReturnOfCapital { total, .. }
            | TransactionKind::Income { total, .. }
            | TransactionKind::Expense { total, .. } => Some(*total),
            TransactionKind::Split { .. } | TransactionKind::Transfer { .. } | TransactionKind::Other => {
                None
            }
        }
    }
}

/// A single event in the ingested transaction stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: Id,
    pub account: String,
    pub broker: String,
    pub dttrade: NaiveDateTime,
    #[serde(flatten)]
    pub kind: TransactionKind,
}

impl Transaction {
    pub fn security(&self) -> Option<&str> {
        self.kind.security()
    }
}

/// A holding of a given quantity of one security in one account, with an
/// explicit cost basis and holding-period boundaries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lot {
    pub id: Id,
    pub account: String,
    pub security: String,
    /// Signed: positive long, negative short. Never zero on a current lot.
    pub units: Decimal,
    /// Signed total cost basis; `sign(units) == sign(cost)`.
    pub cost: Decimal,
    /// Non-negative cost added by rolled-in disallowed wash-sale losses.
    pub washcost: Decimal,
    pub dtopen: NaiveDateTime,
    pub dtclose: Option<NaiveDateTime>,
    pub dtstart: NaiveDateTime,
    pub dtend: Option<NaiveDateTime>,
    pub opener: Id,
    pub closer: Option<Id>,
    pub starter: Id,
    pub ender: Option<Id>,
    pub predecessor: Option<Id>,
}

impl Lot {
    /// A lot is current iff it has not been superseded.
    pub fn is_current(&self) -> bool {
        self.dtend.is_none()
    }

    /// A lot is open iff it has not been realized by a closing trade.
    pub fn is_open(&self) -> bool {
        self.dtclose.is_none()
    }

    pub fn is_long(&self) -> bool {
        self.units > Decimal::ZERO
    }

    /// Cost per unit, `cost / units`.
    pub fn unit_cost(&self) -> Decimal {
        self.cost / self.units
    }
}

/// The realized proceeds (and any disallowed loss) attributable to a specific
/// lot by a specific realizing transaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Gain {
    pub id: Id,
    pub lot: Id,
    pub transaction: Id,
    pub proceeds: Decimal,
    /// Zero unless a wash sale disallowed part of the loss.
    pub washloss: Decimal,
}

impl Gain {
    /// `proceeds - lot.cost`.
    pub fn value(&self, lot: &Lot) -> Decimal {
        self.proceeds - lot.cost
    }

    /// `cost + washcost`.
    pub fn taxcost(&self, lot: &Lot) -> Decimal {
        lot.cost + lot.washcost
    }

    /// `proceeds - taxcost`.
    pub fn taxvalue(&self, lot: &Lot) -> Decimal {
        self.proceeds - self.taxcost(lot)
    }

    /// Long-term iff the lot was long and held more than 365 days; short
    /// sales are always short-term.
    pub fn is_long_term(&self, lot: &Lot) -> bool {
        match lot.dtclose {
            Some(dtclose) if lot.units > Decimal::ZERO => crate::dates::is_long_term(lot.dtopen, dtclose),
            _ => false,
        }
    }
}

/// A unique key over transaction identity; presence in the event log means
/// "already applied".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventLogKey(pub Id);

impl From<Id> for EventLogKey {
    fn from(id: Id) -> Self {
        EventLogKey(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn dt(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap_or_default()
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default()
    }

    fn lot(units: Decimal, cost: Decimal) -> Lot {
        Lot {
            id: 1,
            account: "acct".into(),
            security: "AAPL".into(),
            units,
            cost,
            washcost: Decimal::ZERO,
            dtopen: dt(2020, 1, 1),
            dtclose: None,
            dtstart: dt(2020, 1, 1),
            dtend: None,
            opener: 1,
            closer: None,
            starter: 1,
            ender: None,
            predecessor: None,
        }
    }

    #[test]
    fn unit_cost_is_cost_over_units() {
        let l = lot(dec!(100), dec!(1000));
        assert_eq!(l.unit_cost(), dec!(10));
    }

    #[test]
    fn short_sale_is_never_long_term() {
        let mut l = lot(dec!(-100), dec!(-1000));
        l.dtclose = Some(dt(2022, 1, 1));
        let g = Gain {
            id: 1,
            lot: l.id,
            transaction: 2,
            proceeds: dec!(-900),
            washloss: Decimal::ZERO,
        };
        assert!(!g.is_long_term(&l));
    }

    #[test]
    fn long_gain_classification_respects_holding_period() {
        let mut l = lot(dec!(100), dec!(1000));
        l.dtclose = Some(dt(2021, 1, 2));
        let g = Gain {
            id: 1,
            lot: l.id,
            transaction: 2,
            proceeds: dec!(1200),
            washloss: Decimal::ZERO,
        };
        assert!(g.is_long_term(&l));
        assert_eq!(g.value(&l), dec!(200));
    }
}
