//! Sender funding state machine.
//!
//! A sender is `Idle` or `Active` (rate > 0, balance ≥ rate, at least one
//! weighted target). Activation computes a funding window
//! `[start, start + balance / rate)` and expresses the whole stream as one
//! positive rate change at the window start and one negative change at its
//! end, per target. Stopping reverts only the unelapsed portion: a negative
//! change at `now` and a positive one at the old end. Time passing never
//! mutates anything; elapsed spend is settled lazily on the next update.

use runnel_core::error::{FundingError, ListError};
use runnel_core::types::AccountId;

use runnel_core::constants::PROXY_WEIGHTS_SUM;

use crate::receivers::WeightedList;

/// Destination of one per-second rate change emitted by the state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FundingTarget {
    /// Direct receiver; the rate is the receiver's full per-second share.
    Receiver(AccountId),
    /// Proxy; the rate is per proxy weight, to be fanned out by the hub.
    Proxy(AccountId),
}

/// A per-second rate change taking effect at `timestamp`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateChange {
    pub target: FundingTarget,
    pub timestamp: u64,
    pub rate_per_sec: i128,
}

/// Funding state for one sender identity.
#[derive(Clone, Debug, Default)]
pub struct SenderState {
    /// Committed, not-yet-streamed balance.
    pub balance: u128,
    /// Total per-second funding rate.
    pub rate: u128,
    /// Funding window start (last settlement point while active).
    start: u64,
    /// Funding window end. `start == end` means idle.
    end: u64,
    /// Directly funded receivers.
    pub receivers: WeightedList,
    /// Funded proxies.
    pub proxies: WeightedList,
}

impl SenderState {
    /// Create an idle sender with no balance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current funding window `[start, end)`.
    pub fn window(&self) -> (u64, u64) {
        (self.start, self.end)
    }

    /// Combined weight across receivers and proxies.
    pub fn total_weight(&self) -> Result<u64, ListError> {
        self.receivers
            .total_weight()
            .checked_add(self.proxies.total_weight())
            .ok_or(ListError::ArithmeticOverflow)
    }

    /// Whether a restart at this state would stream funds.
    pub fn eligible(&self) -> Result<bool, ListError> {
        Ok(self.rate > 0 && self.balance >= self.rate && self.total_weight()? > 0)
    }

    /// Deduct the spend for elapsed window time and move `start` to `now`.
    ///
    /// The window construction guarantees `spend ≤ balance`; a shortfall
    /// here means corrupted state and fails rather than clamping.
    pub fn settle(&mut self, now: u64) -> Result<(), FundingError> {
        if self.end > self.start && self.rate > 0 {
            let until = now.clamp(self.start, self.end);
            let elapsed = u128::from(until - self.start);
            let spent = self
                .rate
                .checked_mul(elapsed)
                .ok_or(FundingError::ArithmeticOverflow)?;
            self.balance = self
                .balance
                .checked_sub(spent)
                .ok_or(FundingError::InsufficientBalance {
                    have: self.balance,
                    need: spent,
                })?;
            self.start = until;
        }
        Ok(())
    }

    /// Rate changes covering the remaining window `[from, end)`, scaled by
    /// `sign` (+1 to start a stream, -1 to revert one).
    ///
    /// Per direct receiver with weight `w` of combined weight `W` the
    /// per-second share is `rate * w / W`; per proxy it is
    /// `rate * w / W / PROXY_WEIGHTS_SUM` per proxy weight. Integer
    /// division drops the fractional remainder; dust is simply never
    /// disbursed.
    pub fn stream_changes(&self, from: u64, sign: i128) -> Result<Vec<RateChange>, FundingError> {
        let mut out = Vec::new();
        if from >= self.end || self.rate == 0 {
            return Ok(out);
        }
        let total = u128::from(
            self.total_weight()
                .map_err(|_| FundingError::ArithmeticOverflow)?,
        );
        if total == 0 {
            return Ok(out);
        }
        for (to, weight) in self.receivers.live() {
            let share = self
                .rate
                .checked_mul(u128::from(weight))
                .ok_or(FundingError::ArithmeticOverflow)?
                / total;
            self.push_pair(&mut out, FundingTarget::Receiver(to), from, share, sign)?;
        }
        for (to, weight) in self.proxies.live() {
            let share = self
                .rate
                .checked_mul(u128::from(weight))
                .ok_or(FundingError::ArithmeticOverflow)?
                / total;
            let per_weight = share / u128::from(PROXY_WEIGHTS_SUM);
            self.push_pair(&mut out, FundingTarget::Proxy(to), from, per_weight, sign)?;
        }
        Ok(out)
    }

    fn push_pair(
        &self,
        out: &mut Vec<RateChange>,
        target: FundingTarget,
        from: u64,
        rate_per_sec: u128,
        sign: i128,
    ) -> Result<(), FundingError> {
        if rate_per_sec == 0 {
            return Ok(());
        }
        let rate = i128::try_from(rate_per_sec)
            .map_err(|_| FundingError::ArithmeticOverflow)?
            .checked_mul(sign)
            .ok_or(FundingError::ArithmeticOverflow)?;
        out.push(RateChange {
            target,
            timestamp: from,
            rate_per_sec: rate,
        });
        out.push(RateChange {
            target,
            timestamp: self.end,
            rate_per_sec: -rate,
        });
        Ok(())
    }

    /// Open a new funding window at `now` if eligible, returning the rate
    /// changes to apply; otherwise collapse the window to `[now, now)`.
    pub fn restart(&mut self, now: u64) -> Result<Vec<RateChange>, FundingError> {
        if self.eligible().map_err(|_| FundingError::ArithmeticOverflow)? {
            let duration = self.balance / self.rate; // ≥ 1 since balance ≥ rate
            let duration =
                u64::try_from(duration).map_err(|_| FundingError::ArithmeticOverflow)?;
            self.start = now;
            self.end = now
                .checked_add(duration)
                .ok_or(FundingError::ArithmeticOverflow)?;
            self.stream_changes(now, 1)
        } else {
            self.start = now;
            self.end = now;
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acc(seed: u8) -> AccountId {
        AccountId([seed; 32])
    }

    fn active_sender(balance: u128, rate: u128, weights: &[(u8, u32)]) -> SenderState {
        let mut sender = SenderState::new();
        sender.balance = balance;
        sender.rate = rate;
        for (seed, weight) in weights {
            sender.receivers.set_weight(acc(*seed), *weight).unwrap();
        }
        sender
    }

    #[test]
    fn idle_without_rate_balance_or_receivers() {
        let mut sender = SenderState::new();
        assert!(!sender.eligible().unwrap());
        sender.rate = 5;
        assert!(!sender.eligible().unwrap());
        sender.balance = 100;
        assert!(!sender.eligible().unwrap());
        sender.receivers.set_weight(acc(1), 1).unwrap();
        assert!(sender.eligible().unwrap());
        sender.balance = 4; // below one second of rate
        assert!(!sender.eligible().unwrap());
    }

    #[test]
    fn restart_computes_window_from_balance_and_rate() {
        let mut sender = active_sender(100, 7, &[(1, 1)]);
        sender.restart(50).unwrap();
        assert_eq!(sender.window(), (50, 50 + 100 / 7));
    }

    #[test]
    fn restart_emits_symmetric_ramp() {
        let mut sender = active_sender(30, 3, &[(1, 1)]);
        let changes = sender.restart(0).unwrap();
        assert_eq!(
            changes,
            vec![
                RateChange {
                    target: FundingTarget::Receiver(acc(1)),
                    timestamp: 0,
                    rate_per_sec: 3
                },
                RateChange {
                    target: FundingTarget::Receiver(acc(1)),
                    timestamp: 10,
                    rate_per_sec: -3
                },
            ]
        );
    }

    #[test]
    fn shares_are_weight_proportional_with_floor() {
        // Rate 7 split (2, 4) of 6: shares 2 and 4, 1/s of dust dropped.
        let mut sender = active_sender(700, 7, &[(1, 2), (2, 4)]);
        let changes = sender.restart(0).unwrap();
        let share_of = |seed: u8| {
            changes
                .iter()
                .find(|c| c.target == FundingTarget::Receiver(acc(seed)) && c.rate_per_sec > 0)
                .unwrap()
                .rate_per_sec
        };
        assert_eq!(share_of(1), 2);
        assert_eq!(share_of(2), 4);
    }

    #[test]
    fn proxy_share_is_per_weight() {
        let mut sender = SenderState::new();
        sender.balance = 1_000_000;
        sender.rate = 2 * u128::from(PROXY_WEIGHTS_SUM);
        sender.proxies.set_weight(acc(9), 1).unwrap();
        let changes = sender.restart(0).unwrap();
        assert_eq!(changes[0].target, FundingTarget::Proxy(acc(9)));
        assert_eq!(changes[0].rate_per_sec, 2);
    }

    #[test]
    fn settle_deducts_elapsed_spend_only() {
        let mut sender = active_sender(100, 10, &[(1, 1)]);
        sender.restart(0).unwrap();
        sender.settle(4).unwrap();
        assert_eq!(sender.balance, 60);
        // Past the window end: only the window is charged.
        sender.settle(1000).unwrap();
        assert_eq!(sender.balance, 0);
    }

    #[test]
    fn revert_covers_remaining_window() {
        let mut sender = active_sender(100, 10, &[(1, 1)]);
        sender.restart(0).unwrap();
        let revert = sender.stream_changes(4, -1).unwrap();
        assert_eq!(
            revert,
            vec![
                RateChange {
                    target: FundingTarget::Receiver(acc(1)),
                    timestamp: 4,
                    rate_per_sec: -10
                },
                RateChange {
                    target: FundingTarget::Receiver(acc(1)),
                    timestamp: 10,
                    rate_per_sec: 10
                },
            ]
        );
    }

    #[test]
    fn revert_after_window_end_is_empty() {
        let mut sender = active_sender(100, 10, &[(1, 1)]);
        sender.restart(0).unwrap();
        assert!(sender.stream_changes(10, -1).unwrap().is_empty());
        assert!(sender.stream_changes(99, -1).unwrap().is_empty());
    }

    #[test]
    fn dust_only_share_emits_nothing() {
        // Weight 1 of 1000 at rate 500: floor(500/1000) = 0 per second.
        let mut sender = active_sender(10_000, 500, &[(1, 1), (2, 999)]);
        let changes = sender.restart(0).unwrap();
        assert!(changes
            .iter()
            .all(|c| c.target != FundingTarget::Receiver(acc(1))));
    }
}
