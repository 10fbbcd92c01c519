// ============================================================================
// Factory / Registry
// ============================================================================
//
// Thin registry the core reads during mint paths: maker and vault
// enable-lists, signing keys for quote and permit verification, the fee
// collector and default referral, and per-user creation credits consumed
// when provisioning a pool. Administration of these lists is the host's
// concern; the engine only mutates credits.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::automator::{Automator, AutomatorParams};
use crate::error::{Error, Result};
use crate::types::Address;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Factory {
    enabled_makers: BTreeSet<Address>,
    enabled_vaults: BTreeSet<Address>,
    automators: BTreeSet<Address>,
    /// Verification keys for quote and permit signatures, keyed by signer.
    keys: BTreeMap<Address, Vec<u8>>,
    fee_collector: Address,
    referral: Address,
    credits: BTreeMap<Address, u32>,
}

impl Factory {
    pub fn new(fee_collector: Address, referral: Address) -> Self {
        Factory {
            enabled_makers: BTreeSet::new(),
            enabled_vaults: BTreeSet::new(),
            automators: BTreeSet::new(),
            keys: BTreeMap::new(),
            fee_collector,
            referral,
            credits: BTreeMap::new(),
        }
    }

    // ------------------------------------------------------------------
    // Makers
    // ------------------------------------------------------------------

    /// Whitelist a maker and register its verification key.
    pub fn register_maker(&mut self, maker: Address, key: Vec<u8>) {
        self.enabled_makers.insert(maker);
        self.keys.insert(maker, key);
    }

    /// Remove a maker from the whitelist. Its key stays registered so
    /// permits it signed elsewhere keep verifying.
    pub fn disable_maker(&mut self, maker: &Address) {
        self.enabled_makers.remove(maker);
    }

    pub fn is_maker_enabled(&self, maker: &Address) -> bool {
        self.enabled_makers.contains(maker)
    }

    /// Verification key of a whitelisted maker.
    pub fn maker_key(&self, maker: &Address) -> Option<&[u8]> {
        if !self.enabled_makers.contains(maker) {
            return None;
        }
        self.keys.get(maker).map(Vec::as_slice)
    }

    // ------------------------------------------------------------------
    // Signing keys (permit owners, non-maker parties)
    // ------------------------------------------------------------------

    pub fn register_key(&mut self, signer: Address, key: Vec<u8>) {
        self.keys.insert(signer, key);
    }

    pub fn signing_key(&self, signer: &Address) -> Option<&[u8]> {
        self.keys.get(signer).map(Vec::as_slice)
    }

    // ------------------------------------------------------------------
    // Vaults
    // ------------------------------------------------------------------

    pub fn register_vault(&mut self, vault: Address) {
        self.enabled_vaults.insert(vault);
    }

    pub fn disable_vault(&mut self, vault: &Address) {
        self.enabled_vaults.remove(vault);
    }

    pub fn is_vault_enabled(&self, vault: &Address) -> bool {
        self.enabled_vaults.contains(vault)
    }

    // ------------------------------------------------------------------
    // Fee collector / referral
    // ------------------------------------------------------------------

    pub fn fee_collector(&self) -> Address {
        self.fee_collector
    }

    pub fn referral(&self) -> Address {
        self.referral
    }

    // ------------------------------------------------------------------
    // Creation credits and pool provisioning
    // ------------------------------------------------------------------

    pub fn grant_credits(&mut self, user: Address, count: u32) {
        let entry = self.credits.entry(user).or_insert(0);
        *entry = entry.saturating_add(count);
    }

    pub fn credits_of(&self, user: &Address) -> u32 {
        self.credits.get(user).copied().unwrap_or(0)
    }

    pub fn is_automator(&self, pool: &Address) -> bool {
        self.automators.contains(pool)
    }

    /// Provision a pool for `owner`, consuming one creation credit and
    /// registering the pool address.
    pub fn create_automator(
        &mut self,
        owner: Address,
        address: Address,
        params: AutomatorParams,
    ) -> Result<Automator> {
        if self.credits_of(&owner) == 0 {
            return Err(Error::Unauthorized);
        }
        if self.automators.contains(&address) {
            return Err(Error::InvalidVault);
        }
        let pool = Automator::new(address, owner, params)?;
        if let Some(credits) = self.credits.get_mut(&owner) {
            *credits -= 1;
        }
        self.automators.insert(address);
        info!(
            target: "strata::factory",
            pool = %address,
            owner = %owner,
            "automator created"
        );
        Ok(pool)
    }
}
