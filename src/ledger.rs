// ============================================================================
// Position Ledger
// ============================================================================

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::types::{Address, ProductId};

/// Multi-key balance store keyed by (holder, productId).
///
/// Balances accumulate across repeated mints into the same id, are never
/// negative, and never move between holders. Burn is the only consumption
/// path and always takes the full balance.
#[derive(Clone, Debug, Default)]
pub struct PositionLedger {
    balances: BTreeMap<(Address, ProductId), u128>,
}

impl PositionLedger {
    pub fn new() -> Self {
        PositionLedger::default()
    }

    pub fn balance_of(&self, holder: &Address, id: &ProductId) -> u128 {
        self.balances.get(&(*holder, *id)).copied().unwrap_or(0)
    }

    /// Add to a slot, creating it when absent.
    pub fn credit(&mut self, holder: &Address, id: &ProductId, amount: u128) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        let entry = self.balances.entry((*holder, *id)).or_insert(0);
        *entry = entry.checked_add(amount).ok_or(Error::Overflow)?;
        Ok(())
    }

    /// Zero a slot and return what it held.
    pub fn take_all(&mut self, holder: &Address, id: &ProductId) -> u128 {
        self.balances.remove(&(*holder, *id)).unwrap_or(0)
    }

    /// Number of live (nonzero) slots.
    pub fn slots(&self) -> usize {
        self.balances.len()
    }

    /// Sum of all balances. Conservation checks compare this against vault
    /// custody and accrued fees.
    pub fn total(&self) -> u128 {
        self.balances.values().fold(0u128, |acc, b| acc.saturating_add(*b))
    }
}
