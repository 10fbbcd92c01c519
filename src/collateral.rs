// ============================================================================
// Collateral Transfer Collaborator
// ============================================================================

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::types::Address;

/// Host-side collateral asset. The engine follows checks-effects-interactions:
/// `pull` runs in the checks phase and may fail; `push` runs after all state
/// is committed and must not.
///
/// Contract: `pull(from, to, amount)` must succeed whenever
/// `balance_of(from) >= amount` held at the start of the same atomic engine
/// operation, and `balance_of` must reflect prior pulls and pushes within
/// that operation. The engine prechecks balances before committing state, so
/// an implementation honoring this contract never sees a failing transfer in
/// the effects phase.
pub trait CollateralToken {
    fn balance_of(&self, holder: &Address) -> u128;

    /// Move `amount` into engine custody. Fails `TransferFailed` when the
    /// source cannot fund it.
    fn pull(&mut self, from: &Address, to: &Address, amount: u128) -> Result<()>;

    /// Move `amount` out of engine custody. Infallible by contract: the
    /// engine never pushes more than the custody address holds.
    fn push(&mut self, from: &Address, to: &Address, amount: u128);
}

/// In-memory balance map implementing the token contract. Reference double
/// for the test suites and the fuzz harness.
#[derive(Clone, Debug, Default)]
pub struct MockToken {
    balances: BTreeMap<Address, u128>,
}

impl MockToken {
    pub fn new() -> Self {
        MockToken::default()
    }

    /// Credit free balance out of thin air.
    pub fn mint_to(&mut self, holder: &Address, amount: u128) {
        let entry = self.balances.entry(*holder).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    pub fn total_issued(&self) -> u128 {
        self.balances.values().fold(0u128, |acc, b| acc.saturating_add(*b))
    }
}

impl CollateralToken for MockToken {
    fn balance_of(&self, holder: &Address) -> u128 {
        self.balances.get(holder).copied().unwrap_or(0)
    }

    fn pull(&mut self, from: &Address, to: &Address, amount: u128) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        let src = self.balances.get(from).copied().unwrap_or(0);
        if src < amount {
            return Err(Error::TransferFailed);
        }
        self.balances.insert(*from, src - amount);
        let dst = self.balances.entry(*to).or_insert(0);
        *dst = dst.saturating_add(amount);
        Ok(())
    }

    fn push(&mut self, from: &Address, to: &Address, amount: u128) {
        if amount == 0 {
            return;
        }
        let src = self.balances.get(from).copied().unwrap_or(0);
        debug_assert!(src >= amount, "push exceeds custody balance");
        self.balances.insert(*from, src.saturating_sub(amount));
        let dst = self.balances.entry(*to).or_insert(0);
        *dst = dst.saturating_add(amount);
    }
}
