//! Per-asset stream hub: the public surface of the engine.
//!
//! [`StreamHub`] owns every sender, receiver and proxy state for one asset
//! and orchestrates the state machines around the external
//! [`AssetLedger`]. It is a pure state-transition system: no threads, no
//! ambient clock — every operation takes `now` explicitly, and the host
//! environment serializes calls.
//!
//! Atomicity contract: every operation computes its full plan first
//! (working on cloned per-identity state where it must mutate), validates
//! all ledger edits with checked arithmetic against current values,
//! performs the external transfer, and only then commits. Any failure
//! aborts with no partial state change.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use runnel_core::asset::AssetLedger;
use runnel_core::constants::{
    CYCLE_END, CYCLE_ROOT, DEFAULT_CYCLE_SECS, PROXY_WEIGHTS_SUM, SENDER_WEIGHTS_COUNT_MAX,
};
use runnel_core::error::{FundingError, LedgerError, ListError, RunnelError};
use runnel_core::types::{AccountId, BalanceDelta, WeightUpdate};

use crate::deltas::{split_rate_change, LedgerEdit, LedgerTarget};
use crate::proxy::ProxyState;
use crate::receiver::ReceiverState;
use crate::sender::{FundingTarget, RateChange, SenderState};

/// Configuration for one hub instance.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Accounting cycle length in seconds. Must be non-zero.
    pub cycle_secs: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            cycle_secs: DEFAULT_CYCLE_SECS,
        }
    }
}

/// The funding-stream engine for one asset.
///
/// Holds one [`SenderState`] per sender, one [`ReceiverState`] per
/// receiver and one [`ProxyState`] per proxy; instantiate one hub per
/// asset.
#[derive(Debug)]
pub struct StreamHub<L: AssetLedger> {
    asset: L,
    config: HubConfig,
    senders: HashMap<AccountId, SenderState>,
    receivers: HashMap<AccountId, ReceiverState>,
    proxies: HashMap<AccountId, ProxyState>,
}

impl<L: AssetLedger> StreamHub<L> {
    /// Create a hub over an external asset ledger.
    ///
    /// # Errors
    ///
    /// [`FundingError::InvalidCycleLength`] if `cycle_secs` is zero.
    pub fn new(asset: L, config: HubConfig) -> Result<Self, RunnelError> {
        if config.cycle_secs == 0 {
            return Err(FundingError::InvalidCycleLength.into());
        }
        Ok(Self {
            asset,
            config,
            senders: HashMap::new(),
            receivers: HashMap::new(),
            proxies: HashMap::new(),
        })
    }

    /// The underlying asset ledger.
    pub fn asset(&self) -> &L {
        &self.asset
    }

    /// Mutable access to the asset ledger (test setup).
    pub fn asset_mut(&mut self) -> &mut L {
        &mut self.asset
    }

    /// Cycle length this hub accounts in.
    pub fn cycle_secs(&self) -> u64 {
        self.config.cycle_secs
    }

    // --- sender surface ---

    /// Reconfigure a sender: adjust its balance, set a new rate and apply
    /// weight changes, restarting the stream if still eligible.
    ///
    /// Stops the previous stream first (reverting only its unelapsed
    /// portion), settles elapsed spend, then opens a fresh funding window
    /// at `now` with the new parameters. Returns the new committed balance.
    pub fn update_sender(
        &mut self,
        sender: &AccountId,
        now: u64,
        delta: BalanceDelta,
        new_rate: u128,
        updates: &[WeightUpdate],
    ) -> Result<u128, RunnelError> {
        if sender.is_root() {
            return Err(ListError::InvalidIdentity.into());
        }
        let mut state = self.senders.get(sender).cloned().unwrap_or_default();

        state.settle(now)?;
        let revert = state.stream_changes(now, -1)?;

        match delta {
            BalanceDelta::None => {}
            BalanceDelta::TopUp(amount) => {
                state.balance = state
                    .balance
                    .checked_add(amount)
                    .ok_or(FundingError::ArithmeticOverflow)?;
            }
            BalanceDelta::Withdraw(amount) => {
                state.balance = state.balance.checked_sub(amount).ok_or(
                    FundingError::InsufficientBalance {
                        have: state.balance,
                        need: amount,
                    },
                )?;
            }
        }

        state.rate = new_rate;
        for update in updates {
            match update {
                WeightUpdate::Receiver { to, weight } => {
                    state.receivers.set_weight(*to, *weight)?;
                }
                WeightUpdate::Proxy { to, weight } => {
                    if *weight > 0 && !self.is_registered_proxy(to) {
                        return Err(FundingError::UnknownProxy(to.to_string()).into());
                    }
                    state.proxies.set_weight(*to, *weight)?;
                }
            }
        }
        // Detached (zero-weight) entries must not count against the cap.
        state.receivers.live_pruning();
        state.proxies.live_pruning();
        let attached = state.receivers.attached_len() + state.proxies.attached_len();
        if attached > SENDER_WEIGHTS_COUNT_MAX {
            return Err(ListError::TooManyEntries {
                count: attached,
                max: SENDER_WEIGHTS_COUNT_MAX,
            }
            .into());
        }

        let start = state.restart(now)?;

        let mut edits = self.expand_changes(&revert)?;
        edits.extend(self.expand_changes(&start)?);
        self.check_edits(&edits)?;

        match delta {
            BalanceDelta::TopUp(amount) if amount > 0 => {
                self.asset.transfer_in(sender, amount)?;
            }
            BalanceDelta::Withdraw(amount) if amount > 0 => {
                self.asset.transfer_out(sender, amount)?;
            }
            _ => {}
        }

        self.commit_edits(&edits)?;
        let balance = state.balance;
        let (window_start, window_end) = state.window();
        self.senders.insert(*sender, state);
        info!(
            sender = %sender,
            balance,
            rate = new_rate,
            window_start,
            window_end,
            "sender updated"
        );
        Ok(balance)
    }

    /// Stop a sender's stream and pay its full remaining balance back out.
    ///
    /// Rate and weight configuration are preserved; the sender goes idle
    /// until the next top-up.
    pub fn withdraw_all(&mut self, sender: &AccountId, now: u64) -> Result<u128, RunnelError> {
        if sender.is_root() {
            return Err(ListError::InvalidIdentity.into());
        }
        let Some(mut state) = self.senders.get(sender).cloned() else {
            return Ok(0);
        };

        state.settle(now)?;
        let revert = state.stream_changes(now, -1)?;
        let edits = self.expand_changes(&revert)?;
        self.check_edits(&edits)?;

        let amount = state.balance;
        state.balance = 0;
        state.restart(now)?; // collapses the window; no balance, no changes

        if amount > 0 {
            self.asset.transfer_out(sender, amount)?;
        }
        self.commit_edits(&edits)?;
        self.senders.insert(*sender, state);
        info!(sender = %sender, amount, "sender withdrew remaining balance");
        Ok(amount)
    }

    /// A sender's balance as of `now`, net of elapsed spend. Read-only.
    pub fn sender_balance(&self, sender: &AccountId, now: u64) -> Result<u128, RunnelError> {
        let Some(state) = self.senders.get(sender) else {
            return Ok(0);
        };
        let mut preview = state.clone();
        preview.settle(now)?;
        Ok(preview.balance)
    }

    /// A sender's configured per-second rate (0 if unknown).
    pub fn sender_rate(&self, sender: &AccountId) -> u128 {
        self.senders.get(sender).map(|s| s.rate).unwrap_or(0)
    }

    // --- receiver surface ---

    /// Collect every finished cycle's accrual for `receiver` and pay it out.
    pub fn collect(&mut self, receiver: &AccountId, now: u64) -> Result<u128, RunnelError> {
        if receiver.is_root() {
            return Err(ListError::InvalidIdentity.into());
        }
        let Some(state) = self.receivers.get(receiver) else {
            return Ok(0);
        };
        let mut work = state.clone();
        let amount = work.collect(now, self.config.cycle_secs)?;
        if amount > 0 {
            self.asset.transfer_out(receiver, amount)?;
        }
        self.receivers.insert(*receiver, work);
        debug!(receiver = %receiver, amount, "collected");
        Ok(amount)
    }

    /// Read-only preview of [`collect`](Self::collect).
    pub fn collectable(&self, receiver: &AccountId, now: u64) -> Result<u128, RunnelError> {
        let Some(state) = self.receivers.get(receiver) else {
            return Ok(0);
        };
        Ok(state.collectable(now, self.config.cycle_secs)?)
    }

    // --- proxy surface ---

    /// Replace a proxy's receiver set. Weights must be non-sentinel,
    /// duplicate-free and sum exactly to [`PROXY_WEIGHTS_SUM`]. The first
    /// call for an identity registers it as a proxy.
    pub fn update_proxy_receivers(
        &mut self,
        proxy: &AccountId,
        now: u64,
        new_weights: &[(AccountId, u32)],
    ) -> Result<(), RunnelError> {
        if proxy.is_root() {
            return Err(ListError::InvalidIdentity.into());
        }
        let mut seen = HashSet::new();
        let mut sum: u64 = 0;
        for (receiver, weight) in new_weights {
            if receiver.is_root() {
                return Err(ListError::InvalidIdentity.into());
            }
            if !seen.insert(*receiver) {
                return Err(ListError::DuplicateReceiver(receiver.to_string()).into());
            }
            sum = sum
                .checked_add(u64::from(*weight))
                .ok_or(ListError::ArithmeticOverflow)?;
        }
        if sum != u64::from(PROXY_WEIGHTS_SUM) {
            return Err(FundingError::WeightSumMismatch {
                got: sum,
                expected: u64::from(PROXY_WEIGHTS_SUM),
            }
            .into());
        }

        let mut state = self.proxies.get(proxy).cloned().unwrap_or_default();
        let edits = state.reconfigure(now, new_weights, self.config.cycle_secs)?;
        self.check_edits(&edits)?;
        self.commit_edits(&edits)?;
        self.proxies.insert(*proxy, state);
        info!(proxy = %proxy, receivers = new_weights.len(), "proxy receivers updated");
        Ok(())
    }

    /// A proxy's current receiver set (empty if unregistered).
    pub fn proxy_receivers(&self, proxy: &AccountId) -> Vec<(AccountId, u32)> {
        self.proxies
            .get(proxy)
            .map(|p| p.receivers.live())
            .unwrap_or_default()
    }

    fn is_registered_proxy(&self, id: &AccountId) -> bool {
        self.proxies.get(id).is_some_and(|p| p.is_registered())
    }

    // --- edit plumbing ---

    /// Expand sender-level rate changes into ledger edits, fanning proxy
    /// changes out across the proxy's current receiver set.
    fn expand_changes(&self, changes: &[RateChange]) -> Result<Vec<LedgerEdit>, RunnelError> {
        let mut edits = Vec::new();
        for change in changes {
            match change.target {
                FundingTarget::Receiver(id) => {
                    let (cycle, this_cycle, next_cycle) = split_rate_change(
                        change.timestamp,
                        change.rate_per_sec,
                        self.config.cycle_secs,
                    )?;
                    edits.push(LedgerEdit {
                        target: LedgerTarget::Receiver(id),
                        cycle,
                        this_cycle,
                        next_cycle,
                    });
                }
                FundingTarget::Proxy(id) => {
                    let proxy = self
                        .proxies
                        .get(&id)
                        .filter(|p| p.is_registered())
                        .ok_or_else(|| FundingError::UnknownProxy(id.to_string()))?;
                    edits.extend(proxy.fan_out_edits(
                        &id,
                        change.timestamp,
                        change.rate_per_sec,
                        self.config.cycle_secs,
                    )?);
                }
            }
        }
        Ok(edits)
    }

    /// Stage every edit against current state with checked arithmetic.
    /// Nothing is mutated; an error here means the batch must not commit.
    fn check_edits(&self, edits: &[LedgerEdit]) -> Result<(), RunnelError> {
        let mut staged: HashMap<(LedgerTarget, u64), (i128, i128)> = HashMap::new();
        for edit in edits {
            if edit.cycle == CYCLE_ROOT || edit.cycle == CYCLE_END {
                return Err(LedgerError::InvalidCycle(edit.cycle).into());
            }
            let slot = staged
                .entry((edit.target, edit.cycle))
                .or_insert_with(|| self.current_deltas(&edit.target, edit.cycle));
            slot.0 = slot
                .0
                .checked_add(edit.this_cycle)
                .ok_or(LedgerError::ArithmeticOverflow)?;
            slot.1 = slot
                .1
                .checked_add(edit.next_cycle)
                .ok_or(LedgerError::ArithmeticOverflow)?;
        }
        Ok(())
    }

    fn current_deltas(&self, target: &LedgerTarget, cycle: u64) -> (i128, i128) {
        let ledger = match target {
            LedgerTarget::Receiver(id) => self.receivers.get(id).map(|r| &r.deltas),
            LedgerTarget::Proxy(id) => self.proxies.get(id).map(|p| &p.deltas),
        };
        ledger.and_then(|l| l.get(cycle)).unwrap_or((0, 0))
    }

    /// Write a batch already validated by
    /// [`check_edits`](Self::check_edits).
    fn commit_edits(&mut self, edits: &[LedgerEdit]) -> Result<(), RunnelError> {
        for edit in edits {
            match edit.target {
                LedgerTarget::Receiver(id) => {
                    let state = self.receivers.entry(id).or_default();
                    state
                        .deltas
                        .add_to_delta(edit.cycle, edit.this_cycle, edit.next_cycle)?;
                    state.note_funded_cycle(edit.cycle);
                }
                LedgerTarget::Proxy(id) => {
                    self.proxies
                        .entry(id)
                        .or_default()
                        .deltas
                        .add_to_delta(edit.cycle, edit.this_cycle, edit.next_cycle)?;
                }
            }
        }
        Ok(())
    }
}
