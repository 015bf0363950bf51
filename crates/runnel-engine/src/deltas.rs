//! Cycle-delta ledger: per-receiver chains of signed per-cycle deltas.
//!
//! Each owner (receiver or proxy) has one ledger mapping cycle numbers to a
//! pair of deltas: `this_cycle` applies within the keyed cycle only,
//! `next_cycle` applies from the following cycle onward. Collection
//! integrates the chain into exact per-cycle totals; nothing is updated as
//! time passes.
//!
//! The chain is a `HashMap`-backed intrusive list rooted at
//! [`CYCLE_ROOT`] and terminated by [`CYCLE_END`], in insertion order (not
//! chronological). Values accumulate and are never overwritten, so
//! overlapping contributions from many senders compose. Entries are pruned
//! lazily during traversal once both deltas are zero or the entry falls
//! before a caller-supplied folded boundary.

use std::collections::HashMap;

use runnel_core::constants::{CYCLE_END, CYCLE_ROOT};
use runnel_core::cycle::{cycle_of, secs_into_cycle, secs_until_cycle_end};
use runnel_core::error::LedgerError;
use runnel_core::types::AccountId;

#[derive(Clone, Copy, Debug)]
struct DeltaEntry {
    this_cycle: i128,
    next_cycle: i128,
    next: u64,
}

/// A cycle-delta ledger owned by one receiver or proxy.
#[derive(Clone, Debug)]
pub struct DeltaLedger {
    entries: HashMap<u64, DeltaEntry>,
    /// Next pointer of the sentinel. `CYCLE_END` when the ledger is empty.
    root_next: u64,
}

impl Default for DeltaLedger {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            root_next: CYCLE_END,
        }
    }
}

impl DeltaLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of physically attached entries, pruned or not.
    pub fn attached_len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ledger holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stored deltas for `cycle`, if an entry is attached.
    pub fn get(&self, cycle: u64) -> Option<(i128, i128)> {
        self.entries.get(&cycle).map(|e| (e.this_cycle, e.next_cycle))
    }

    /// Accumulate `(this_add, next_add)` onto the entry for `cycle`,
    /// attaching it on first use. Never overwrites.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidCycle`] for the sentinel or end-marker cycle
    /// - [`LedgerError::ArithmeticOverflow`] if either field would overflow;
    ///   neither field is changed in that case
    pub fn add_to_delta(
        &mut self,
        cycle: u64,
        this_add: i128,
        next_add: i128,
    ) -> Result<(), LedgerError> {
        if cycle == CYCLE_ROOT || cycle == CYCLE_END {
            return Err(LedgerError::InvalidCycle(cycle));
        }
        if let Some(entry) = self.entries.get_mut(&cycle) {
            // Compute both updated fields before writing either one.
            let this_cycle = entry
                .this_cycle
                .checked_add(this_add)
                .ok_or(LedgerError::ArithmeticOverflow)?;
            let next_cycle = entry
                .next_cycle
                .checked_add(next_add)
                .ok_or(LedgerError::ArithmeticOverflow)?;
            entry.this_cycle = this_cycle;
            entry.next_cycle = next_cycle;
        } else {
            self.entries.insert(
                cycle,
                DeltaEntry {
                    this_cycle: this_add,
                    next_cycle: next_add,
                    next: self.root_next,
                },
            );
            self.root_next = cycle;
        }
        Ok(())
    }

    fn next_of(&self, cursor: u64) -> Result<u64, LedgerError> {
        if cursor == CYCLE_ROOT {
            return Ok(self.root_next);
        }
        self.entries
            .get(&cursor)
            .map(|e| e.next)
            .ok_or(LedgerError::UnknownCursor(cursor))
    }

    fn link_next(&mut self, at: u64, to: u64) {
        if at == CYCLE_ROOT {
            self.root_next = to;
        } else if let Some(entry) = self.entries.get_mut(&at) {
            entry.next = to;
        }
    }

    /// Advance from `cursor`, unlinking and deleting every entry whose
    /// deltas are both zero or whose cycle is strictly before
    /// `finished_cycle` (obsolete: its effects were already folded into a
    /// later starting point). Returns the first surviving entry, or the
    /// sentinel with zero deltas when the chain is exhausted.
    pub fn next_delta_pruning(
        &mut self,
        cursor: u64,
        finished_cycle: u64,
    ) -> Result<(u64, i128, i128), LedgerError> {
        let prev = cursor;
        let mut current = self.next_of(prev)?;
        while current != CYCLE_END {
            let entry = *self
                .entries
                .get(&current)
                .ok_or(LedgerError::UnknownCursor(current))?;
            let dead = entry.this_cycle == 0 && entry.next_cycle == 0;
            if !dead && current >= finished_cycle {
                return Ok((current, entry.this_cycle, entry.next_cycle));
            }
            self.entries.remove(&current);
            self.link_next(prev, entry.next);
            current = entry.next;
        }
        Ok((CYCLE_ROOT, 0, 0))
    }

    /// Full pruning traversal: every surviving entry, in chain order.
    pub fn entries_pruning(
        &mut self,
        finished_cycle: u64,
    ) -> Result<Vec<(u64, i128, i128)>, LedgerError> {
        let mut out = Vec::new();
        let mut cursor = CYCLE_ROOT;
        loop {
            let (cycle, this_cycle, next_cycle) =
                self.next_delta_pruning(cursor, finished_cycle)?;
            if cycle == CYCLE_ROOT {
                return Ok(out);
            }
            out.push((cycle, this_cycle, next_cycle));
            cursor = cycle;
        }
    }

    /// Every attached entry, read-only, in chain order.
    pub fn entries(&self) -> Vec<(u64, i128, i128)> {
        let mut out = Vec::new();
        let mut cursor = self.root_next;
        while cursor != CYCLE_END {
            let Some(entry) = self.entries.get(&cursor) else {
                break;
            };
            out.push((cursor, entry.this_cycle, entry.next_cycle));
            cursor = entry.next;
        }
        out
    }
}

/// Which state map a [`LedgerEdit`] targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LedgerTarget {
    /// The ordinary collection ledger of a receiver.
    Receiver(AccountId),
    /// A proxy's own inflow-recording ledger.
    Proxy(AccountId),
}

/// One staged ledger mutation. Edits are computed in full, validated with
/// checked arithmetic against current state, and only then committed, so a
/// multi-receiver operation updates everything or nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LedgerEdit {
    pub target: LedgerTarget,
    pub cycle: u64,
    pub this_cycle: i128,
    pub next_cycle: i128,
}

/// Split a per-second rate change taking effect at `ts` into one delta
/// entry: `this_cycle` covers the seconds remaining in `ts`'s cycle, and
/// `next_cycle` tops the effect up to a full `rate × cycle_secs` from the
/// following cycle onward.
pub fn split_rate_change(
    ts: u64,
    rate_per_sec: i128,
    cycle_secs: u64,
) -> Result<(u64, i128, i128), LedgerError> {
    let cycle = cycle_of(ts, cycle_secs);
    if cycle == CYCLE_ROOT || cycle == CYCLE_END {
        return Err(LedgerError::InvalidCycle(cycle));
    }
    let tail = i128::from(secs_until_cycle_end(ts, cycle_secs));
    let head = i128::from(secs_into_cycle(ts, cycle_secs));
    let this_cycle = rate_per_sec
        .checked_mul(tail)
        .ok_or(LedgerError::ArithmeticOverflow)?;
    let next_cycle = rate_per_sec
        .checked_mul(head)
        .ok_or(LedgerError::ArithmeticOverflow)?;
    Ok((cycle, this_cycle, next_cycle))
}
