//! Receiver collection state: one delta ledger plus a monotone cursor.
//!
//! Collection reconstructs exact per-cycle totals by integrating the delta
//! chain from the cursor up to (excluding) the current cycle. Cycles with
//! no stored entry carry the running total unchanged, so the walk costs
//! O(surviving entries), not O(elapsed cycles).

use std::collections::BTreeMap;

use runnel_core::constants::CYCLE_ROOT;
use runnel_core::cycle::cycle_of;
use runnel_core::error::LedgerError;

use crate::deltas::DeltaLedger;

fn non_negative(value: i128) -> Result<u128, LedgerError> {
    u128::try_from(value).map_err(|_| LedgerError::ArithmeticUnderflow)
}

/// Collection state for one receiver identity.
///
/// The cursor `(next_collectable_cycle, carry)` advances monotonically;
/// `carry` is the per-cycle running total at the cursor, so each cycle's
/// funds are summed into a collection exactly once.
#[derive(Clone, Debug, Default)]
pub struct ReceiverState {
    /// Accrued per-cycle rate deltas from every sender funding this receiver.
    pub deltas: DeltaLedger,
    /// First cycle not yet collected. `CYCLE_ROOT` until first funded.
    next_collectable_cycle: u64,
    /// Per-cycle running total carried at the cursor.
    carry: u128,
}

impl ReceiverState {
    /// Create an empty receiver state.
    pub fn new() -> Self {
        Self::default()
    }

    /// First cycle the next collection will cover.
    pub fn cursor_cycle(&self) -> u64 {
        self.next_collectable_cycle
    }

    /// Record that `cycle` received an edit, initializing or lowering the
    /// cursor. Every engine mutation targets the current cycle or later, so
    /// this can never move the cursor below an already-collected cycle.
    pub fn note_funded_cycle(&mut self, cycle: u64) {
        if self.next_collectable_cycle == CYCLE_ROOT {
            self.next_collectable_cycle = cycle;
        } else {
            self.next_collectable_cycle = self.next_collectable_cycle.min(cycle);
        }
    }

    /// Collect every finished cycle since the cursor and advance it.
    ///
    /// Walks the surviving ledger entries in cycle order: per finished
    /// cycle, `running += this_cycle`, the (non-negative) running total is
    /// collected, then `running += next_cycle`. Entries already folded by a
    /// previous collection are pruned along the way; entries for the current
    /// and future cycles stay untouched. With nothing pending this returns
    /// 0 and leaves the cursor unchanged.
    pub fn collect(&mut self, now: u64, cycle_secs: u64) -> Result<u128, LedgerError> {
        if self.next_collectable_cycle == CYCLE_ROOT {
            return Ok(0);
        }
        let finished_bound = cycle_of(now, cycle_secs);
        if self.next_collectable_cycle >= finished_bound {
            return Ok(0);
        }

        let survivors = self.deltas.entries_pruning(self.next_collectable_cycle)?;
        let by_cycle: BTreeMap<u64, (i128, i128)> = survivors
            .into_iter()
            .map(|(cycle, this_cycle, next_cycle)| (cycle, (this_cycle, next_cycle)))
            .collect();

        let mut running = i128::try_from(self.carry).map_err(|_| LedgerError::ArithmeticOverflow)?;
        let mut collected: u128 = 0;
        let mut cycle = self.next_collectable_cycle;

        for (&entry_cycle, &(this_cycle, next_cycle)) in by_cycle.range(..finished_bound) {
            // Cycles without entries each contribute the carried total.
            let gap = u128::from(entry_cycle - cycle);
            collected = non_negative(running)?
                .checked_mul(gap)
                .and_then(|amt| collected.checked_add(amt))
                .ok_or(LedgerError::ArithmeticOverflow)?;

            running = running
                .checked_add(this_cycle)
                .ok_or(LedgerError::ArithmeticOverflow)?;
            collected = collected
                .checked_add(non_negative(running)?)
                .ok_or(LedgerError::ArithmeticOverflow)?;
            running = running
                .checked_add(next_cycle)
                .ok_or(LedgerError::ArithmeticOverflow)?;
            cycle = entry_cycle + 1;
        }

        let tail_gap = u128::from(finished_bound - cycle);
        collected = non_negative(running)?
            .checked_mul(tail_gap)
            .and_then(|amt| collected.checked_add(amt))
            .ok_or(LedgerError::ArithmeticOverflow)?;

        self.carry = non_negative(running)?;
        self.next_collectable_cycle = finished_bound;
        Ok(collected)
    }

    /// Read-only preview of [`collect`](Self::collect): same sum, no
    /// pruning, no cursor movement.
    pub fn collectable(&self, now: u64, cycle_secs: u64) -> Result<u128, LedgerError> {
        if self.next_collectable_cycle == CYCLE_ROOT {
            return Ok(0);
        }
        let finished_bound = cycle_of(now, cycle_secs);
        if self.next_collectable_cycle >= finished_bound {
            return Ok(0);
        }

        let by_cycle: BTreeMap<u64, (i128, i128)> = self
            .deltas
            .entries()
            .into_iter()
            .map(|(cycle, this_cycle, next_cycle)| (cycle, (this_cycle, next_cycle)))
            .collect();

        let mut running = i128::try_from(self.carry).map_err(|_| LedgerError::ArithmeticOverflow)?;
        let mut collected: u128 = 0;
        let mut cycle = self.next_collectable_cycle;

        for (&entry_cycle, &(this_cycle, next_cycle)) in
            by_cycle.range(self.next_collectable_cycle..finished_bound)
        {
            let gap = u128::from(entry_cycle - cycle);
            collected = non_negative(running)?
                .checked_mul(gap)
                .and_then(|amt| collected.checked_add(amt))
                .ok_or(LedgerError::ArithmeticOverflow)?;
            running = running
                .checked_add(this_cycle)
                .ok_or(LedgerError::ArithmeticOverflow)?;
            collected = collected
                .checked_add(non_negative(running)?)
                .ok_or(LedgerError::ArithmeticOverflow)?;
            running = running
                .checked_add(next_cycle)
                .ok_or(LedgerError::ArithmeticOverflow)?;
            cycle = entry_cycle + 1;
        }

        let tail_gap = u128::from(finished_bound - cycle);
        collected = non_negative(running)?
            .checked_mul(tail_gap)
            .and_then(|amt| collected.checked_add(amt))
            .ok_or(LedgerError::ArithmeticOverflow)?;
        Ok(collected)
    }
}
