//! The repository abstraction: queries and mutations the ledger engine uses
//! to read and write lots, gains, and the transaction stream, plus an
//! in-memory reference implementation.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::models::{EventLogKey, Gain, Id, Lot, Transaction};

/// Narrow persistence boundary the engine reads and writes through.
///
/// An in-memory implementation ([`InMemoryRepository`]) is provided for the
/// CLI and the test suite; a SQL-backed implementation is left to
/// integrators.
pub trait Repository {
    /// Lots current at `dtasof`, ordered by `(dtopen, id)`.
    fn lots_asof(&self, dtasof: NaiveDateTime, account: Option<&str>, security: Option<&str>) -> Vec<Lot>;

    /// Same as [`Repository::lots_asof`], restricted to `units > 0`.
    fn longs_asof(&self, dtasof: NaiveDateTime, account: Option<&str>, security: Option<&str>) -> Vec<Lot>;

    /// Transactions with `dttrade` in `[dtstart, dtend]`, ordered by
    /// `(dttrade, insertion order)`.
    fn transactions_in(&self, dtstart: NaiveDateTime, dtend: NaiveDateTime) -> Vec<Transaction>;

    /// Gains on lots closed within `[dtstart, dtend]` with `washloss == 0`,
    /// ordered by the closing lot's `dtopen`.
    fn gains_needing_washsale(&self, dtstart: NaiveDateTime, dtend: NaiveDateTime) -> Vec<Gain>;

    /// Gains whose lot closed within `[dtstart, dtend]`, optionally
    /// restricted to `account`/`security`, ordered by `(lot.dtclose, id)`.
    /// Used by the gains CSV export, which filters on this query directly
    /// rather than some unrelated scope.
    fn gains_in(
        &self,
        dtstart: NaiveDateTime,
        dtend: NaiveDateTime,
        account: Option<&str>,
        security: Option<&str>,
    ) -> Vec<Gain>;

    /// Every lot of `account`/`security` (current or already superseded) whose
    /// `dtopen` falls in `[dtopen_start, dtopen_end]`, in insertion order.
    /// Used by the wash-sale engine to find replacement shares, which may
    /// themselves already be closed.
    fn lots_opened_between(
        &self,
        account: &str,
        security: &str,
        dtopen_start: NaiveDateTime,
        dtopen_end: NaiveDateTime,
    ) -> Vec<Lot>;

    fn get_lot(&self, id: Id) -> Option<Lot>;
    fn insert_lot(&self, lot: Lot) -> Id;
    fn update_lot(&self, lot: Lot);

    fn get_gain(&self, id: Id) -> Option<Gain>;
    fn insert_gain(&self, gain: Gain) -> Id;
    fn update_gain(&self, gain: Gain);
    fn gains_for_lot(&self, lot: Id) -> Vec<Gain>;

    fn insert_transaction(&self, tx: Transaction);
    fn get_transaction(&self, id: Id) -> Option<Transaction>;

    fn has_logged(&self, key: EventLogKey) -> bool;
    fn insert_log_entry(&self, key: EventLogKey);

    /// Makes buffered writes visible to subsequent queries within the same
    /// transaction (needed by the FIFO split in trade handling, which must
    /// re-query after inserting the residual lot).
    fn flush(&self);
    fn begin(&self);
    fn commit(&self);
    fn rollback(&self);
}

/// A complete in-process snapshot, serializable for the CLI's
/// `--database <path>` JSON persistence file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub lots: Vec<Lot>,
    pub gains: Vec<Gain>,
    pub transactions: Vec<Transaction>,
    pub log: Vec<Id>,
    pub next_lot_id: Id,
    pub next_gain_id: Id,
}

#[derive(Clone)]
struct Checkpoint {
    lots: Vec<Lot>,
    gains: Vec<Gain>,
    transactions: Vec<Transaction>,
    log: HashSet<EventLogKey>,
    next_lot_id: Id,
    next_gain_id: Id,
}

/// An in-memory `Repository`, backed by `Vec`/`HashSet` behind `RefCell`.
///
/// Appropriate for a single-threaded engine: there is no cross-thread
/// sharing, so a `Mutex` would buy nothing.
#[derive(Default)]
pub struct InMemoryRepository {
    lots: RefCell<Vec<Lot>>,
    gains: RefCell<Vec<Gain>>,
    transactions: RefCell<Vec<Transaction>>,
    log: crate::event_log::EventLog,
    next_lot_id: Cell<Id>,
    next_gain_id: Cell<Id>,
    checkpoint: RefCell<Option<Checkpoint>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            lots: self.lots.borrow().clone(),
            gains: self.gains.borrow().clone(),
            transactions: self.transactions.borrow().clone(),
            log: self.log.snapshot().into_iter().map(|k| k.0).collect(),
            next_lot_id: self.next_lot_id.get(),
            next_gain_id: self.next_gain_id.get(),
        }
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let repo = Self::default();
        *repo.lots.borrow_mut() = snapshot.lots;
        *repo.gains.borrow_mut() = snapshot.gains;
        *repo.transactions.borrow_mut() = snapshot.transactions;
        repo.log
            .restore(snapshot.log.into_iter().map(EventLogKey).collect());
        repo.next_lot_id.set(snapshot.next_lot_id);
        repo.next_gain_id.set(snapshot.next_gain_id);
        repo
    }

    fn matches(lot: &Lot, account: Option<&str>, security: Option<&str>) -> bool {
        account.is_none_or(|a| a == lot.account) && security.is_none_or(|s| s == lot.security)
    }
}

impl Repository for InMemoryRepository {
    fn lots_asof(&self, dtasof: NaiveDateTime, account: Option<&str>, security: Option<&str>) -> Vec<Lot> {
        let mut out: Vec<Lot> = self
            .lots
            .borrow()
            .iter()
            .filter(|l| l.dtstart <= dtasof && l.dtend.is_none_or(|e| e > dtasof))
            .filter(|l| Self::matches(l, account, security))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.dtopen.cmp(&b.dtopen).then(a.id.cmp(&b.id)));
        out
    }

    fn longs_asof(&self, dtasof: NaiveDateTime, account: Option<&str>, security: Option<&str>) -> Vec<Lot> {
        self.lots_asof(dtasof, account, security)
            .into_iter()
            .filter(Lot::is_long)
            .collect()
    }

    fn transactions_in(&self, dtstart: NaiveDateTime, dtend: NaiveDateTime) -> Vec<Transaction> {
        let mut out: Vec<Transaction> = self
            .transactions
            .borrow()
            .iter()
            .filter(|t| t.dttrade >= dtstart && t.dttrade <= dtend)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.dttrade.cmp(&b.dttrade).then(a.id.cmp(&b.id)));
        out
    }

    fn gains_needing_washsale(&self, dtstart: NaiveDateTime, dtend: NaiveDateTime) -> Vec<Gain> {
        let lots = self.lots.borrow();
        let mut out: Vec<(Gain, NaiveDateTime)> = self
            .gains
            .borrow()
            .iter()
            .filter(|g| g.washloss == rust_decimal::Decimal::ZERO)
            .filter_map(|g| {
                let lot = lots.iter().find(|l| l.id == g.lot)?;
                let dtclose = lot.dtclose?;
                (dtclose >= dtstart && dtclose <= dtend).then(|| (g.clone(), lot.dtopen))
            })
            .collect();
        out.sort_by(|(_, a), (_, b)| a.cmp(b));
        out.into_iter().map(|(g, _)| g).collect()
    }

    fn gains_in(
        &self,
        dtstart: NaiveDateTime,
        dtend: NaiveDateTime,
        account: Option<&str>,
        security: Option<&str>,
    ) -> Vec<Gain> {
        let lots = self.lots.borrow();
        let mut out: Vec<(Gain, NaiveDateTime)> = self
            .gains
            .borrow()
            .iter()
            .filter_map(|g| {
                let lot = lots.iter().find(|l| l.id == g.lot)?;
                if !Self::matches(lot, account, security) {
                    return None;
                }
                let dtclose = lot.dtclose?;
                (dtclose >= dtstart && dtclose <= dtend).then(|| (g.clone(), dtclose))
            })
            .collect();
        out.sort_by(|(a, ac), (b, bc)| ac.cmp(bc).then(a.id.cmp(&b.id)));
        out.into_iter().map(|(g, _)| g).collect()
    }

    fn lots_opened_between(
        &self,
        account: &str,
        security: &str,
        dtopen_start: NaiveDateTime,
        dtopen_end: NaiveDateTime,
    ) -> Vec<Lot> {
        self.lots
            .borrow()
            .iter()
            .filter(|l| l.account == account && l.security == security)
            .filter(|l| l.dtopen >= dtopen_start && l.dtopen <= dtopen_end)
            .cloned()
            .collect()
    }

    fn get_lot(&self, id: Id) -> Option<Lot> {
        self.lots.borrow().iter().find(|l| l.id == id).cloned()
    }

    fn insert_lot(&self, mut lot: Lot) -> Id {
        let id = self.next_lot_id.get() + 1;
        self.next_lot_id.set(id);
        lot.id = id;
        self.lots.borrow_mut().push(lot);
        id
    }

    fn update_lot(&self, lot: Lot) {
        let mut lots = self.lots.borrow_mut();
        if let Some(slot) = lots.iter_mut().find(|l| l.id == lot.id) {
            *slot = lot;
        }
    }

    fn get_gain(&self, id: Id) -> Option<Gain> {
        self.gains.borrow().iter().find(|g| g.id == id).cloned()
    }

    fn insert_gain(&self, mut gain: Gain) -> Id {
        let id = self.next_gain_id.get() + 1;
        self.next_gain_id.set(id);
        gain.id = id;
        self.gains.borrow_mut().push(gain);
        id
    }

    fn update_gain(&self, gain: Gain) {
        let mut gains = self.gains.borrow_mut();
        if let Some(slot) = gains.iter_mut().find(|g| g.id == gain.id) {
            *slot = gain;
        }
    }

    fn gains_for_lot(&self, lot: Id) -> Vec<Gain> {
        self.gains
            .borrow()
            .iter()
            .filter(|g| g.lot == lot)
            .cloned()
            .collect()
    }

    fn insert_transaction(&self, tx: Transaction) {
        self.transactions.borrow_mut().push(tx);
    }

    fn get_transaction(&self, id: Id) -> Option<Transaction> {
        self.transactions.borrow().iter().find(|t| t.id == id).cloned()
    }

    fn has_logged(&self, key: EventLogKey) -> bool {
        self.log.contains(key)
    }

    fn insert_log_entry(&self, key: EventLogKey) {
        self.log.record(key);
    }

    fn flush(&self) {
        // In-memory mutations are immediately visible; nothing to do. A
        // networked or buffered implementation would push staged writes here.
    }

    fn begin(&self) {
        *self.checkpoint.borrow_mut() = Some(Checkpoint {
            lots: self.lots.borrow().clone(),
            gains: self.gains.borrow().clone(),
            transactions: self.transactions.borrow().clone(),
            log: self.log.snapshot(),
            next_lot_id: self.next_lot_id.get(),
            next_gain_id: self.next_gain_id.get(),
        });
    }

    fn commit(&self) {
        *self.checkpoint.borrow_mut() = None;
    }

    fn rollback(&self) {
        if let Some(checkpoint) = self.checkpoint.borrow_mut().take() {
            *self.lots.borrow_mut() = checkpoint.lots;
            *self.gains.borrow_mut() = checkpoint.gains;
            *self.transactions.borrow_mut() = checkpoint.transactions;
            self.log.restore(checkpoint.log);
            self.next_lot_id.set(checkpoint.next_lot_id);
            self.next_gain_id.set(checkpoint.next_gain_id);
        }
    }
}
