//! Call ledger.
//!
//! Ordered, deduplicated record of every number called by either side.
//! Each engine keeps its own copy and both copies stay identical because
//! they are fed the same ordered stream of calls.

use std::collections::HashSet;

use bingo_proto::Number;

use crate::{lines::CalledNumbers, turn::Seat};

/// One recorded call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallRecord {
    /// Called number.
    pub number: Number,
    /// Who called it.
    pub by: Seat,
}

/// Append-only record of called numbers for one session.
#[derive(Debug, Clone, Default)]
pub struct CallLedger {
    /// Calls in the order they were recorded.
    entries: Vec<CallRecord>,
    /// Membership index over `entries`.
    called: HashSet<Number>,
}

impl CallLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a call.
    ///
    /// Returns `false` without changing anything if `number` is already
    /// present. Callers must gate every downstream effect on a `true` result.
    pub fn record(&mut self, number: Number, by: Seat) -> bool {
        if !self.called.insert(number) {
            return false;
        }
        self.entries.push(CallRecord { number, by });
        true
    }

    /// Whether `number` has been called.
    pub fn contains(&self, number: Number) -> bool {
        self.called.contains(&number)
    }

    /// Number of recorded calls.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been called yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent call.
    pub fn last(&self) -> Option<CallRecord> {
        self.entries.last().copied()
    }

    /// Calls in order.
    pub fn entries(&self) -> &[CallRecord] {
        &self.entries
    }

    /// Called numbers in order.
    pub fn numbers(&self) -> impl Iterator<Item = Number> + '_ {
        self.entries.iter().map(|e| e.number)
    }
}

impl CalledNumbers for CallLedger {
    fn is_called(&self, number: Number) -> bool {
        self.contains(number)
    }
}
