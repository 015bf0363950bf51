//! End-to-end streaming lifecycles: fund, stream, reconfigure, collect.
//!
//! All scenarios run with a 10-second cycle, so cycle n covers
//! timestamps [10(n-1), 10n).

use runnel_core::asset::AssetLedger;
use runnel_core::error::{FundingError, ListError, RunnelError};
use runnel_core::types::{AccountId, BalanceDelta, WeightUpdate};
use runnel_tests::helpers::*;

#[test]
fn single_receiver_full_lifecycle() {
    let mut hub = test_hub(&[(1, 1_000)]);
    // 1_000 at 10/s: window [0, 100), ten full cycles.
    fund_receivers(&mut hub, 1, 0, 1_000, 10, &[(2, 1)]);
    assert_eq!(hub.asset().balance_of(&acc(1)).unwrap(), 0);
    assert_eq!(hub.asset().escrowed(), 1_000);

    // Nothing collectable inside the first cycle.
    assert_eq!(hub.collectable(&acc(2), 9).unwrap(), 0);
    // One cycle finished.
    assert_eq!(hub.collect(&acc(2), 10).unwrap(), 100);
    // Collection is idempotent within the same cycle.
    assert_eq!(hub.collect(&acc(2), 19).unwrap(), 0);
    // The rest arrives after the window ends.
    assert_eq!(hub.collect(&acc(2), 200).unwrap(), 900);
    assert_eq!(hub.asset().balance_of(&acc(2)).unwrap(), 1_000);
    assert_eq!(hub.asset().escrowed(), 0);
}

#[test]
fn mid_cycle_start_and_stop() {
    let mut hub = test_hub(&[(1, 50)]);
    // Start at t=4: window [4, 9), entirely inside cycle 1.
    fund_receivers(&mut hub, 1, 4, 50, 10, &[(2, 1)]);
    assert_eq!(hub.collect(&acc(2), 10).unwrap(), 50);
    assert_eq!(hub.sender_balance(&acc(1), 10).unwrap(), 0);
}

#[test]
fn stopping_reverts_exactly_the_unelapsed_stream() {
    let mut hub = test_hub(&[(1, 100)]);
    fund_receivers(&mut hub, 1, 0, 100, 1, &[(2, 1)]);
    // 13 seconds elapse before the sender pulls out.
    let refunded = hub.withdraw_all(&acc(1), 13).unwrap();
    assert_eq!(refunded, 87);
    assert_eq!(hub.collect(&acc(2), 1_000).unwrap(), 13);
    assert_eq!(hub.asset().total_supply(), 100);
    assert_eq!(hub.asset().escrowed(), 0);
}

#[test]
fn rate_change_midstream() {
    let mut hub = test_hub(&[(1, 300)]);
    fund_receivers(&mut hub, 1, 0, 300, 10, &[(2, 1)]);
    // After 15s (150 streamed), halve the rate. Remaining 150 at 5/s.
    hub.update_sender(&acc(1), 15, BalanceDelta::None, 5, &[])
        .unwrap();
    // Window is now [15, 45).
    assert_eq!(hub.collect(&acc(2), 20).unwrap(), 100 + 50 + 25);
    assert_eq!(hub.collect(&acc(2), 100).unwrap(), 300 - 175);
    assert_eq!(hub.sender_balance(&acc(1), 100).unwrap(), 0);
}

#[test]
fn multiple_senders_one_receiver() {
    let mut hub = test_hub(&[(1, 100), (2, 200)]);
    fund_receivers(&mut hub, 1, 0, 100, 10, &[(9, 1)]);
    fund_receivers(&mut hub, 2, 5, 200, 10, &[(9, 1)]);
    // Cycle 1: 10s from sender 1 + 5s from sender 2.
    assert_eq!(hub.collect(&acc(9), 10).unwrap(), 100 + 50);
    assert_eq!(hub.collect(&acc(9), 1_000).unwrap(), 150);
    assert_eq!(hub.asset().balance_of(&acc(9)).unwrap(), 300);
}

#[test]
fn weights_split_proportionally_with_dust_dropped() {
    let mut hub = test_hub(&[(1, 1_000)]);
    // Rate 10 over weights 1/2/4 (sum 7): shares 1, 2, 5. Dust 2/s.
    fund_receivers(&mut hub, 1, 0, 700, 10, &[(2, 1), (3, 2), (4, 4)]);
    assert_eq!(hub.collect(&acc(2), 1_000).unwrap(), 70);
    assert_eq!(hub.collect(&acc(3), 1_000).unwrap(), 140);
    assert_eq!(hub.collect(&acc(4), 1_000).unwrap(), 350);
    // 140 of dust remains escrowed forever.
    assert_eq!(hub.asset().escrowed(), 140);
}

#[test]
fn removing_and_readding_a_receiver() {
    let mut hub = test_hub(&[(1, 400)]);
    fund_receivers(&mut hub, 1, 0, 400, 10, &[(2, 1), (3, 1)]);
    // Drop receiver 3 at t=20 (two cycles in).
    hub.update_sender(
        &acc(1),
        20,
        BalanceDelta::None,
        10,
        &[WeightUpdate::Receiver { to: acc(3), weight: 0 }],
    )
    .unwrap();
    // Re-add at t=30 with triple weight.
    hub.update_sender(
        &acc(1),
        30,
        BalanceDelta::None,
        10,
        &[WeightUpdate::Receiver { to: acc(3), weight: 3 }],
    )
    .unwrap();

    // Receiver 3: 5/s over [0,20), nothing over [20,30), then rate
    // floor(10*3/4) = 7 over [30,40).
    assert_eq!(hub.collect(&acc(3), 1_000).unwrap(), 100 + 70);
    // Receiver 2: 5/s over [0,20), 10/s over [20,30), floor(10/4)=2 over [30,40).
    assert_eq!(hub.collect(&acc(2), 1_000).unwrap(), 100 + 100 + 20);
}

#[test]
fn top_up_after_runout_restarts_the_stream() {
    let mut hub = test_hub(&[(1, 100)]);
    fund_receivers(&mut hub, 1, 0, 40, 10, &[(2, 1)]);
    // Runs dry at t=4. Later top up again.
    assert_eq!(hub.sender_balance(&acc(1), 50).unwrap(), 0);
    let balance = hub
        .update_sender(&acc(1), 50, BalanceDelta::TopUp(60), 10, &[])
        .unwrap();
    assert_eq!(balance, 60);
    // First burst in cycle 1, second over [50, 56).
    assert_eq!(hub.collect(&acc(2), 10).unwrap(), 40);
    assert_eq!(hub.collect(&acc(2), 60).unwrap(), 60);
}

#[test]
fn zero_rate_sender_holds_funds_idle() {
    let mut hub = test_hub(&[(1, 100)]);
    let balance = hub
        .update_sender(&acc(1), 0, BalanceDelta::TopUp(100), 0, &[])
        .unwrap();
    assert_eq!(balance, 100);
    // Nothing streams; the full amount is withdrawable much later.
    assert_eq!(hub.sender_balance(&acc(1), 1_000_000).unwrap(), 100);
    assert_eq!(hub.withdraw_all(&acc(1), 1_000_000).unwrap(), 100);
}

#[test]
fn rate_without_receivers_stays_idle() {
    // A configured rate with an empty receiver list streams nothing.
    let mut hub = test_hub(&[(1, 30)]);
    hub.update_sender(&acc(1), 0, BalanceDelta::TopUp(30), 3, &[])
        .unwrap();
    assert_eq!(hub.sender_balance(&acc(1), 1_000).unwrap(), 30);
    assert_eq!(hub.withdraw_all(&acc(1), 1_000).unwrap(), 30);
    assert_eq!(hub.asset().escrowed(), 0);
}

#[test]
fn partial_withdraw_keeps_streaming() {
    let mut hub = test_hub(&[(1, 100)]);
    fund_receivers(&mut hub, 1, 0, 100, 5, &[(2, 1)]);
    // At t=10, 50 streamed; withdraw 30 of the remaining 50.
    let balance = hub
        .update_sender(&acc(1), 10, BalanceDelta::Withdraw(30), 5, &[])
        .unwrap();
    assert_eq!(balance, 20);
    assert_eq!(hub.asset().balance_of(&acc(1)).unwrap(), 30);
    // Remaining 20 streams over [10, 14).
    assert_eq!(hub.collect(&acc(2), 1_000).unwrap(), 70);
}

#[test]
fn receiver_cap_is_enforced() {
    let mut hub = test_hub(&[(1, 1_000)]);
    let mut updates = Vec::new();
    for i in 0..101u8 {
        let mut bytes = [0u8; 32];
        bytes[0] = i;
        bytes[1] = 0xAA;
        updates.push(WeightUpdate::Receiver {
            to: AccountId(bytes),
            weight: 1,
        });
    }
    let err = hub
        .update_sender(&acc(1), 0, BalanceDelta::TopUp(100), 1, &updates)
        .unwrap_err();
    assert_eq!(
        err,
        RunnelError::List(ListError::TooManyEntries {
            count: 101,
            max: 100
        })
    );
}

#[test]
fn failed_payout_leaves_collection_pending() {
    // Corrupt the escrow invariant by paying out behind the hub's back;
    // the receiver's cursor must not advance past uncollected funds.
    let mut hub = test_hub(&[(1, 100)]);
    fund_receivers(&mut hub, 1, 0, 100, 10, &[(2, 1)]);
    hub.asset_mut().transfer_out(&acc(9), 100).unwrap();

    let err = hub.collect(&acc(2), 1_000).unwrap_err();
    assert!(matches!(
        err,
        RunnelError::Funding(FundingError::TransferFailed(_))
    ));
    // Restore escrow and retry: the full amount is still there.
    hub.asset_mut().transfer_in(&acc(9), 100).unwrap();
    assert_eq!(hub.collect(&acc(2), 1_000).unwrap(), 100);
}
