//! External asset ledger interface and in-memory implementation.
//!
//! The engine never holds tokens itself; it moves them through this opaque
//! interface. Every call can fail, and a failed transfer aborts the whole
//! enclosing funding, withdrawal or collection operation.
//!
//! Not thread-safe — the host environment serializes all engine calls,
//! and the ledger is only touched from inside them.

use std::collections::HashMap;

use crate::error::FundingError;
use crate::types::AccountId;

/// Opaque balance-bearing asset ledger.
///
/// Implemented over whatever token backend hosts the engine. The engine's
/// escrow (streamed-but-uncollected funds) is the implementor's concern;
/// `transfer_in` moves funds from a participant into escrow and
/// `transfer_out` pays escrowed funds back out.
pub trait AssetLedger {
    /// Move `amount` from `from` into the engine's escrow.
    fn transfer_in(&mut self, from: &AccountId, amount: u128) -> Result<(), FundingError>;

    /// Pay `amount` out of the engine's escrow to `to`.
    fn transfer_out(&mut self, to: &AccountId, amount: u128) -> Result<(), FundingError>;

    /// The holder's free (non-escrowed) balance.
    fn balance_of(&self, holder: &AccountId) -> Result<u128, FundingError>;
}

/// In-memory asset ledger for testing.
///
/// Plain `HashMap` balances plus a single escrow pool. No persistence.
#[derive(Debug, Clone, Default)]
pub struct MemoryAssetLedger {
    balances: HashMap<AccountId, u128>,
    escrow: u128,
}

impl MemoryAssetLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` to `holder`, creating the account if needed.
    /// Saturates at `u128::MAX` rather than wrapping.
    pub fn mint(&mut self, holder: &AccountId, amount: u128) {
        let balance = self.balances.entry(*holder).or_default();
        *balance = balance.saturating_add(amount);
    }

    /// Funds currently held in escrow by the engine.
    pub fn escrowed(&self) -> u128 {
        self.escrow
    }

    /// Sum of all free balances plus escrow. Conserved by every transfer.
    pub fn total_supply(&self) -> u128 {
        self.balances.values().sum::<u128>() + self.escrow
    }
}

impl AssetLedger for MemoryAssetLedger {
    fn transfer_in(&mut self, from: &AccountId, amount: u128) -> Result<(), FundingError> {
        let balance = self.balances.entry(*from).or_default();
        if *balance < amount {
            return Err(FundingError::TransferFailed(format!(
                "account {from} holds {balance}, cannot escrow {amount}"
            )));
        }
        *balance -= amount;
        self.escrow = self
            .escrow
            .checked_add(amount)
            .ok_or(FundingError::ArithmeticOverflow)?;
        Ok(())
    }

    fn transfer_out(&mut self, to: &AccountId, amount: u128) -> Result<(), FundingError> {
        if self.escrow < amount {
            return Err(FundingError::TransferFailed(format!(
                "escrow holds {}, cannot pay out {amount}", self.escrow
            )));
        }
        let balance = self.balances.entry(*to).or_default();
        *balance = balance
            .checked_add(amount)
            .ok_or(FundingError::ArithmeticOverflow)?;
        self.escrow -= amount;
        Ok(())
    }

    fn balance_of(&self, holder: &AccountId) -> Result<u128, FundingError> {
        Ok(self.balances.get(holder).copied().unwrap_or(0))
    }
}
