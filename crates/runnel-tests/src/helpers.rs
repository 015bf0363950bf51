//! Shared test helpers for streaming integration tests.

use runnel_core::asset::MemoryAssetLedger;
use runnel_core::types::{AccountId, BalanceDelta, WeightUpdate};
use runnel_engine::{HubConfig, StreamHub};

/// Short cycle length used throughout the integration tests.
pub const TEST_CYCLE_SECS: u64 = 10;

/// Simple account identity from a seed byte.
pub fn acc(seed: u8) -> AccountId {
    AccountId([seed; 32])
}

/// Create a hub over a fresh in-memory ledger, minting the given
/// balances, with the standard test cycle length.
pub fn test_hub(balances: &[(u8, u128)]) -> StreamHub<MemoryAssetLedger> {
    hub_with_cycle(balances, TEST_CYCLE_SECS)
}

/// Create a hub with an explicit cycle length.
pub fn hub_with_cycle(balances: &[(u8, u128)], cycle_secs: u64) -> StreamHub<MemoryAssetLedger> {
    let mut ledger = MemoryAssetLedger::new();
    for (seed, amount) in balances {
        ledger.mint(&acc(*seed), *amount);
    }
    StreamHub::new(ledger, HubConfig { cycle_secs }).unwrap()
}

/// Top up a sender and point its whole stream at plain receivers.
pub fn fund_receivers(
    hub: &mut StreamHub<MemoryAssetLedger>,
    sender: u8,
    now: u64,
    top_up: u128,
    rate: u128,
    receivers: &[(u8, u32)],
) -> u128 {
    let updates: Vec<WeightUpdate> = receivers
        .iter()
        .map(|(seed, weight)| WeightUpdate::Receiver {
            to: acc(*seed),
            weight: *weight,
        })
        .collect();
    hub.update_sender(&acc(sender), now, BalanceDelta::TopUp(top_up), rate, &updates)
        .unwrap()
}

/// Top up a sender and point its whole stream at one proxy.
pub fn fund_proxy(
    hub: &mut StreamHub<MemoryAssetLedger>,
    sender: u8,
    now: u64,
    top_up: u128,
    rate: u128,
    proxy: u8,
) -> u128 {
    hub.update_sender(
        &acc(sender),
        now,
        BalanceDelta::TopUp(top_up),
        rate,
        &[WeightUpdate::Proxy {
            to: acc(proxy),
            weight: 1,
        }],
    )
    .unwrap()
}

/// Register a proxy with the given receiver weights (must sum to
/// `PROXY_WEIGHTS_SUM`).
pub fn set_proxy(
    hub: &mut StreamHub<MemoryAssetLedger>,
    proxy: u8,
    now: u64,
    receivers: &[(u8, u32)],
) {
    let weights: Vec<(AccountId, u32)> = receivers
        .iter()
        .map(|(seed, weight)| (acc(*seed), *weight))
        .collect();
    hub.update_proxy_receivers(&acc(proxy), now, &weights).unwrap()
}
