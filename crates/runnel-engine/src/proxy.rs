//! Proxy redistribution: aggregate inflow fanned out to a secondary
//! weighted receiver set.
//!
//! A proxy owns a weighted list whose weights always sum to
//! [`PROXY_WEIGHTS_SUM`] and a delta ledger recording its aggregate inflow
//! in `per_weight_rate × PROXY_WEIGHTS_SUM` form — every stored value is an
//! exact multiple of the constant, so the per-weight delta is recovered by
//! exact division. The same identity may independently act as an ordinary
//! receiver; that accrual lives in its separate receiver state.

use runnel_core::constants::{CYCLE_ROOT, PROXY_WEIGHTS_SUM};
use runnel_core::cycle::cycle_of;
use runnel_core::error::LedgerError;
use runnel_core::types::AccountId;

use crate::deltas::{split_rate_change, DeltaLedger, LedgerEdit, LedgerTarget};
use crate::receivers::WeightedList;

/// Redistribution state for one proxy identity.
#[derive(Clone, Debug, Default)]
pub struct ProxyState {
    /// The proxy's receiver set; weights sum to [`PROXY_WEIGHTS_SUM`] once
    /// registered.
    pub receivers: WeightedList,
    /// Aggregate inflow record, scaled by [`PROXY_WEIGHTS_SUM`].
    pub deltas: DeltaLedger,
}

impl ProxyState {
    /// Create an unregistered proxy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a receiver set summing to the protocol constant is in place.
    pub fn is_registered(&self) -> bool {
        self.receivers.total_weight() == u64::from(PROXY_WEIGHTS_SUM)
    }

    /// Edits funding this proxy at `per_weight_rate` per second per proxy
    /// weight, effective from `ts`: the proxy's own ledger records the full
    /// `per_weight_rate × PROXY_WEIGHTS_SUM` inflow, and each receiver with
    /// weight `w` accrues `per_weight_rate × w` as if funded directly.
    /// Negative rates revert a running stream symmetrically.
    pub fn fan_out_edits(
        &self,
        proxy: &AccountId,
        ts: u64,
        per_weight_rate: i128,
        cycle_secs: u64,
    ) -> Result<Vec<LedgerEdit>, LedgerError> {
        let mut edits = Vec::new();
        let total_rate = per_weight_rate
            .checked_mul(i128::from(PROXY_WEIGHTS_SUM))
            .ok_or(LedgerError::ArithmeticOverflow)?;
        let (cycle, this_cycle, next_cycle) = split_rate_change(ts, total_rate, cycle_secs)?;
        edits.push(LedgerEdit {
            target: LedgerTarget::Proxy(*proxy),
            cycle,
            this_cycle,
            next_cycle,
        });
        for (receiver, weight) in self.receivers.live() {
            let receiver_rate = per_weight_rate
                .checked_mul(i128::from(weight))
                .ok_or(LedgerError::ArithmeticOverflow)?;
            let (cycle, this_cycle, next_cycle) =
                split_rate_change(ts, receiver_rate, cycle_secs)?;
            edits.push(LedgerEdit {
                target: LedgerTarget::Receiver(receiver),
                cycle,
                this_cycle,
                next_cycle,
            });
        }
        Ok(edits)
    }

    /// Replace the receiver set, moving all current-and-future recorded
    /// influence from the old set to the new one.
    ///
    /// For every surviving ledger entry the implied per-weight pair is
    /// taken at `max(entry cycle, current cycle)`: entries at finished
    /// cycles collapse to their ongoing per-cycle rate `(this + next, 0)`
    /// applied at the current cycle — finished cycles are never edited
    /// retroactively, and the still-open cycle moves to the new set in its
    /// entirety. The proxy's own ledger is consolidated the same way, so
    /// repeated reconfigurations stay O(live entries).
    ///
    /// Returns the receiver-side edits; the caller validates and commits
    /// them atomically together with this (cloned) state. Weight-sum
    /// validation is the caller's job.
    pub fn reconfigure(
        &mut self,
        now: u64,
        new_weights: &[(AccountId, u32)],
        cycle_secs: u64,
    ) -> Result<Vec<LedgerEdit>, LedgerError> {
        let current_cycle = cycle_of(now, cycle_secs);
        let old_set = self.receivers.live();
        // Prune only zero entries; every surviving entry still influences
        // the current or a future cycle and must be moved.
        let entries = self.deltas.entries_pruning(CYCLE_ROOT + 1)?;

        let mut edits = Vec::new();
        let scale = i128::from(PROXY_WEIGHTS_SUM);
        for (cycle, this_cycle, next_cycle) in entries {
            let (effective_cycle, eff_this, eff_next) = if cycle < current_cycle {
                let folded = this_cycle
                    .checked_add(next_cycle)
                    .ok_or(LedgerError::ArithmeticOverflow)?;
                (current_cycle, folded, 0)
            } else {
                (cycle, this_cycle, next_cycle)
            };

            if cycle < current_cycle {
                // Consolidate the stale entry onto the current cycle; the
                // zeroed original is pruned by the next traversal.
                self.deltas.add_to_delta(cycle, -this_cycle, -next_cycle)?;
                if eff_this != 0 {
                    self.deltas.add_to_delta(current_cycle, eff_this, 0)?;
                }
            }

            if eff_this == 0 && eff_next == 0 {
                continue;
            }
            // Values are exact multiples of the weights-sum constant.
            let per_weight_this = eff_this / scale;
            let per_weight_next = eff_next / scale;

            for (receiver, weight) in &old_set {
                push_scaled(
                    &mut edits,
                    *receiver,
                    effective_cycle,
                    per_weight_this,
                    per_weight_next,
                    -i128::from(*weight),
                )?;
            }
            for (receiver, weight) in new_weights {
                push_scaled(
                    &mut edits,
                    *receiver,
                    effective_cycle,
                    per_weight_this,
                    per_weight_next,
                    i128::from(*weight),
                )?;
            }
        }

        let mut list = WeightedList::new();
        for (receiver, weight) in new_weights {
            list.set_weight(*receiver, *weight)
                .map_err(|_| LedgerError::ArithmeticOverflow)?;
        }
        self.receivers = list;
        Ok(edits)
    }
}

fn push_scaled(
    edits: &mut Vec<LedgerEdit>,
    receiver: AccountId,
    cycle: u64,
    per_weight_this: i128,
    per_weight_next: i128,
    signed_weight: i128,
) -> Result<(), LedgerError> {
    let this_cycle = per_weight_this
        .checked_mul(signed_weight)
        .ok_or(LedgerError::ArithmeticOverflow)?;
    let next_cycle = per_weight_next
        .checked_mul(signed_weight)
        .ok_or(LedgerError::ArithmeticOverflow)?;
    if this_cycle == 0 && next_cycle == 0 {
        return Ok(());
    }
    edits.push(LedgerEdit {
        target: LedgerTarget::Receiver(receiver),
        cycle,
        this_cycle,
        next_cycle,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CYCLE: u64 = 10;
    const K: i128 = PROXY_WEIGHTS_SUM as i128;

    fn acc(seed: u8) -> AccountId {
        AccountId([seed; 32])
    }

    fn proxy_with(weights: &[(u8, u32)]) -> ProxyState {
        let mut proxy = ProxyState::new();
        for (seed, weight) in weights {
            proxy.receivers.set_weight(acc(*seed), *weight).unwrap();
        }
        proxy
    }

    #[test]
    fn registration_requires_exact_weight_sum() {
        let proxy = proxy_with(&[(1, 6_000), (2, 4_000)]);
        assert!(proxy.is_registered());
        let short = proxy_with(&[(1, 9_999)]);
        assert!(!short.is_registered());
    }

    #[test]
    fn fan_out_conserves_inflow() {
        let proxy = proxy_with(&[(1, 6_000), (2, 4_000)]);
        let edits = proxy
            .fan_out_edits(&acc(9), 0, 2, CYCLE)
            .unwrap();

        // Proxy ledger records the full 2 * K rate.
        assert_eq!(edits[0].target, LedgerTarget::Proxy(acc(9)));
        assert_eq!(edits[0].this_cycle, 2 * K * 10);

        // Receiver deltas sum to the proxy's recorded inflow.
        let receiver_sum: i128 = edits[1..].iter().map(|e| e.this_cycle).sum();
        assert_eq!(receiver_sum, 2 * K * 10);
    }

    #[test]
    fn fan_out_scales_by_receiver_weight() {
        let proxy = proxy_with(&[(1, 6_000), (2, 4_000)]);
        let edits = proxy.fan_out_edits(&acc(9), 0, 2, CYCLE).unwrap();
        let this_of = |seed: u8| {
            edits
                .iter()
                .find(|e| e.target == LedgerTarget::Receiver(acc(seed)))
                .unwrap()
                .this_cycle
        };
        assert_eq!(this_of(1), 2 * 6_000 * 10);
        assert_eq!(this_of(2), 2 * 4_000 * 10);
    }

    #[test]
    fn reconfigure_moves_future_entries() {
        let mut proxy = proxy_with(&[(1, PROXY_WEIGHTS_SUM)]);
        // Ongoing stream: +1/weight/s from t=0, ramp-down at cycle 21.
        proxy.deltas.add_to_delta(1, K * 10, 0).unwrap();
        proxy.deltas.add_to_delta(21, -K * 10, 0).unwrap();

        // Reconfigure mid-cycle-2 to receiver 2.
        let edits = proxy
            .reconfigure(15, &[(acc(2), PROXY_WEIGHTS_SUM)], CYCLE)
            .unwrap();

        // Old receiver loses the ongoing rate from cycle 2 and regains the
        // scheduled ramp-down; the new receiver mirrors both.
        let find = |seed: u8, cycle: u64| {
            edits
                .iter()
                .find(|e| e.target == LedgerTarget::Receiver(acc(seed)) && e.cycle == cycle)
                .map(|e| e.this_cycle)
        };
        assert_eq!(find(1, 2), Some(-K * 10));
        assert_eq!(find(2, 2), Some(K * 10));
        assert_eq!(find(1, 21), Some(K * 10));
        assert_eq!(find(2, 21), Some(-K * 10));
    }

    #[test]
    fn reconfigure_consolidates_own_ledger() {
        let mut proxy = proxy_with(&[(1, PROXY_WEIGHTS_SUM)]);
        proxy.deltas.add_to_delta(1, K * 10, 0).unwrap();
        proxy.deltas.add_to_delta(21, -K * 10, 0).unwrap();

        proxy
            .reconfigure(15, &[(acc(2), PROXY_WEIGHTS_SUM)], CYCLE)
            .unwrap();

        // The stale cycle-1 entry was folded onto cycle 2.
        assert_eq!(proxy.deltas.get(1), Some((0, 0)));
        assert_eq!(proxy.deltas.get(2), Some((K * 10, 0)));
        assert_eq!(proxy.deltas.get(21), Some((-K * 10, 0)));

        // A second reconfiguration sees the compacted form and is a no-op
        // in sum: moving from {2} to {2}.
        let edits = proxy
            .reconfigure(16, &[(acc(2), PROXY_WEIGHTS_SUM)], CYCLE)
            .unwrap();
        let net: i128 = edits.iter().map(|e| e.this_cycle + e.next_cycle).sum();
        assert_eq!(net, 0);
    }

    #[test]
    fn reconfigure_with_empty_ledger_just_swaps_the_set() {
        let mut proxy = proxy_with(&[(1, PROXY_WEIGHTS_SUM)]);
        let edits = proxy
            .reconfigure(5, &[(acc(2), 7_000), (acc(3), 3_000)], CYCLE)
            .unwrap();
        assert!(edits.is_empty());
        assert_eq!(proxy.receivers.weight_of(&acc(2)), 7_000);
        assert_eq!(proxy.receivers.weight_of(&acc(3)), 3_000);
        assert!(proxy.is_registered());
    }

    #[test]
    fn ended_streams_net_out_and_compact() {
        let mut proxy = proxy_with(&[(1, PROXY_WEIGHTS_SUM)]);
        // Stream fully contained in the past: started cycle 1, ended cycle 3.
        proxy.deltas.add_to_delta(1, K * 10, 0).unwrap();
        proxy.deltas.add_to_delta(3, -K * 10, 0).unwrap();

        let edits = proxy
            .reconfigure(100, &[(acc(2), PROXY_WEIGHTS_SUM)], CYCLE)
            .unwrap();
        // Net influence from the ended stream is zero.
        let net: i128 = edits.iter().map(|e| e.this_cycle + e.next_cycle).sum();
        assert_eq!(net, 0);
        // Both stale entries folded onto cycle 11 and cancel there.
        assert_eq!(proxy.deltas.get(11), Some((0, 0)));
    }
}
