// ============================================================================
// Automator / Pool Accounting Engine
// ============================================================================
//
// Pools depositor collateral into a share fund and drives vault mints and
// burns on the depositors' behalf. Share accounting:
//
//   price_per_share = total_collateral * SCALE / total_supply
//
// `total_collateral` is the pool's net claim: principal, plus realized
// gains net of the pool fee skim, minus realized losses in full, minus
// mint fees. The signed `total_fee` accumulator carries the skim; losses
// drive it negative and must be earned back before harvest pays out.
//
// Shares are tracked internally at `share_multiplier` times the external
// quote so fee-bearing batches do not lose precision across many small
// positions; every externally visible quantity stays at the canonical
// collateral scale.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::collateral::CollateralToken;
use crate::constants::{
    DEFAULT_MAX_PERIOD, DEFAULT_POOL_FEE_RATE, DEFAULT_PROTOCOL_FEE_RATE,
    DEFAULT_REDEMPTION_COOLDOWN, DUST_SHARES, MAX_AMOUNT, MAX_BATCH, SCALE,
    SHARE_MULTIPLIER_REBASE,
};
use crate::error::{Error, Result};
use crate::factory::Factory;
use crate::fixed::{add, add_i128, add_signed, apply_rate, mul_div_floor, mul_div_signed, sub, to_signed};
use crate::product::{MintTerms, ProductTerms};
use crate::types::{Address, BurnProductsReceipt, MintProductsReceipt, ProductId};
use crate::vault::VaultDirectory;

/// Pool configuration fixed at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomatorParams {
    /// Skim rate applied to signed burn-batch deltas.
    pub fee_rate: u128,
    /// Protocol share of a harvested positive fee balance.
    pub protocol_fee_rate: u128,
    /// Delay between a withdraw request and its claim.
    pub redemption_cooldown: u64,
    /// Upper bound on the configurable cooldown.
    pub max_period: u64,
    /// Internal share precision multiplier, 1 or the rebase factor.
    pub share_multiplier: u128,
}

impl Default for AutomatorParams {
    fn default() -> Self {
        AutomatorParams {
            fee_rate: DEFAULT_POOL_FEE_RATE,
            protocol_fee_rate: DEFAULT_PROTOCOL_FEE_RATE,
            redemption_cooldown: DEFAULT_REDEMPTION_COOLDOWN,
            max_period: DEFAULT_MAX_PERIOD,
            share_multiplier: 1,
        }
    }
}

impl AutomatorParams {
    pub fn validated(self) -> Result<Self> {
        if self.fee_rate > SCALE || self.protocol_fee_rate > SCALE {
            return Err(Error::AmountTooLarge);
        }
        if self.redemption_cooldown == 0 || self.redemption_cooldown > self.max_period {
            return Err(Error::InvalidRedemption);
        }
        if self.share_multiplier != 1 && self.share_multiplier != SHARE_MULTIPLIER_REBASE {
            return Err(Error::AmountTooLarge);
        }
        Ok(self)
    }
}

/// A depositor's single outstanding withdrawal window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRedemption {
    pub shares: u128,
    pub requested_at: u64,
}

/// One pool-driven mint: target vault plus the maker-signed terms.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintProductItem {
    pub vault: Address,
    pub total_collateral: u128,
    pub terms: MintTerms,
}

/// One pool-held position to settle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnProductItem {
    pub vault: Address,
    pub product: ProductTerms,
}

pub struct Automator {
    address: Address,
    owner: Address,
    params: AutomatorParams,
    /// Internal-precision share balances.
    shares: BTreeMap<Address, u128>,
    total_shares: u128,
    /// Net asset claim at collateral scale.
    total_collateral: u128,
    /// Signed fee-skim accumulator; negative is a loss carried forward.
    total_fee: i128,
    /// Basis of open positions, keyed by (vault, product).
    positions: BTreeMap<(Address, ProductId), u128>,
    locked: u128,
    pending: BTreeMap<Address, PendingRedemption>,
    total_pending_shares: u128,
    entered: bool,
}

impl Automator {
    pub fn new(address: Address, owner: Address, params: AutomatorParams) -> Result<Self> {
        let params = params.validated()?;
        Ok(Automator {
            address,
            owner,
            params,
            shares: BTreeMap::new(),
            total_shares: 0,
            total_collateral: 0,
            total_fee: 0,
            positions: BTreeMap::new(),
            locked: 0,
            pending: BTreeMap::new(),
            total_pending_shares: 0,
            entered: false,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn params(&self) -> AutomatorParams {
        self.params
    }

    /// Holder's share balance at the external quote precision.
    pub fn share_balance(&self, holder: &Address) -> u128 {
        self.shares.get(holder).copied().unwrap_or(0) / self.params.share_multiplier
    }

    /// Outstanding share supply at the external quote precision.
    pub fn share_supply(&self) -> u128 {
        self.total_shares / self.params.share_multiplier
    }

    /// Net asset value per external share. A fresh pool quotes 1.0.
    pub fn price_per_share(&self) -> Result<u128> {
        if self.total_shares == 0 {
            return Ok(SCALE);
        }
        let quote_scale = SCALE
            .checked_mul(self.params.share_multiplier)
            .ok_or(Error::Overflow)?;
        mul_div_floor(self.total_collateral, quote_scale, self.total_shares)
    }

    /// Holder's pending redemption, shares at the external precision.
    pub fn pending_redemption(&self, holder: &Address) -> Option<PendingRedemption> {
        self.pending.get(holder).map(|slot| PendingRedemption {
            shares: slot.shares / self.params.share_multiplier,
            requested_at: slot.requested_at,
        })
    }

    pub fn total_collateral(&self) -> u128 {
        self.total_collateral
    }

    pub fn total_fee(&self) -> i128 {
        self.total_fee
    }

    /// Basis currently staked into open positions.
    pub fn locked(&self) -> u128 {
        self.locked
    }

    /// Collateral held by the pool itself, spendable or claimable now.
    pub fn unlocked(&self, token: &dyn CollateralToken) -> u128 {
        token.balance_of(&self.address)
    }

    pub fn position_basis(&self, vault: &Address, product: &ProductId) -> u128 {
        self.positions.get(&(*vault, *product)).copied().unwrap_or(0)
    }

    fn enter(&mut self) -> Result<()> {
        if self.entered {
            return Err(Error::Reentrancy);
        }
        self.entered = true;
        Ok(())
    }

    fn exit(&mut self) {
        self.entered = false;
    }

    // ------------------------------------------------------------------
    // Deposit / Withdraw / Claim
    // ------------------------------------------------------------------

    /// Mint shares against `amount` collateral at the current quote.
    /// Returns the internal share units credited to the depositor; the
    /// very first deposit permanently retains [`DUST_SHARES`] of them.
    pub fn deposit(
        &mut self,
        token: &mut dyn CollateralToken,
        depositor: Address,
        amount: u128,
    ) -> Result<u128> {
        self.enter()?;
        let out = self.deposit_inner(token, depositor, amount);
        self.exit();
        out
    }

    fn deposit_inner(
        &mut self,
        token: &mut dyn CollateralToken,
        depositor: Address,
        amount: u128,
    ) -> Result<u128> {
        if amount == 0 {
            return Err(Error::ZeroAmount);
        }
        if amount > MAX_AMOUNT {
            return Err(Error::AmountTooLarge);
        }
        if token.balance_of(&depositor) < amount {
            return Err(Error::TransferFailed);
        }

        let credited = if self.total_shares == 0 {
            let internal = amount
                .checked_mul(self.params.share_multiplier)
                .ok_or(Error::Overflow)?;
            if internal <= DUST_SHARES {
                return Err(Error::InvalidCollateral);
            }
            let credited = internal - DUST_SHARES;
            self.credit_shares(&depositor, credited)?;
            self.credit_shares(&Address::DEAD, DUST_SHARES)?;
            self.total_shares = add(self.total_shares, internal)?;
            credited
        } else {
            if self.total_collateral == 0 {
                // Supply outstanding but the claim is wiped; the quote is
                // degenerate and new capital would be donated.
                return Err(Error::InvalidCollateral);
            }
            let minted = mul_div_floor(amount, self.total_shares, self.total_collateral)?;
            if minted == 0 {
                return Err(Error::ZeroAmount);
            }
            self.credit_shares(&depositor, minted)?;
            self.total_shares = add(self.total_shares, minted)?;
            minted
        };
        self.total_collateral = add(self.total_collateral, amount)?;

        token.pull(&depositor, &self.address, amount)?;
        info!(
            target: "strata::automator",
            pool = %self.address,
            depositor = %depositor,
            amount,
            shares = credited,
            "deposited"
        );
        Ok(credited)
    }

    fn credit_shares(&mut self, holder: &Address, internal: u128) -> Result<()> {
        let slot = self.shares.entry(*holder).or_insert(0);
        *slot = slot.checked_add(internal).ok_or(Error::Overflow)?;
        Ok(())
    }

    /// Queue `shares` (external precision) for redemption. Adds to any
    /// outstanding request and restarts its cooldown.
    pub fn withdraw(&mut self, now: u64, depositor: Address, shares: u128) -> Result<()> {
        self.enter()?;
        let out = self.withdraw_inner(now, depositor, shares);
        self.exit();
        out
    }

    fn withdraw_inner(&mut self, now: u64, depositor: Address, shares: u128) -> Result<()> {
        if shares == 0 {
            return Err(Error::ZeroAmount);
        }
        let internal = shares
            .checked_mul(self.params.share_multiplier)
            .ok_or(Error::Overflow)?;
        let balance = self.shares.get(&depositor).copied().unwrap_or(0);
        let outstanding = self.pending.get(&depositor).map(|s| s.shares).unwrap_or(0);
        let pending_total = outstanding.checked_add(internal).ok_or(Error::Overflow)?;
        if pending_total > balance {
            return Err(Error::InsufficientShares);
        }
        self.pending.insert(
            depositor,
            PendingRedemption {
                shares: pending_total,
                requested_at: now,
            },
        );
        self.total_pending_shares = add(self.total_pending_shares, internal)?;
        info!(
            target: "strata::automator",
            pool = %self.address,
            depositor = %depositor,
            shares,
            pending = pending_total,
            "withdrawn"
        );
        Ok(())
    }

    /// Pay out a matured redemption at the current quote and burn the
    /// shares. The whole slot settles at once.
    pub fn claim_redemptions(
        &mut self,
        token: &mut dyn CollateralToken,
        now: u64,
        depositor: Address,
    ) -> Result<u128> {
        self.enter()?;
        let out = self.claim_inner(token, now, depositor);
        self.exit();
        out
    }

    fn claim_inner(
        &mut self,
        token: &mut dyn CollateralToken,
        now: u64,
        depositor: Address,
    ) -> Result<u128> {
        let slot = self
            .pending
            .get(&depositor)
            .copied()
            .ok_or(Error::NoPendingRedemption)?;
        if now < slot.requested_at.saturating_add(self.params.redemption_cooldown) {
            return Err(Error::InvalidRedemption);
        }
        let owed = mul_div_floor(slot.shares, self.total_collateral, self.total_shares)?;
        // Redemptions draw on the unstaked claim; basis locked behind open
        // positions stays until those burn.
        if owed > self.total_collateral.saturating_sub(self.locked)
            || owed > token.balance_of(&self.address)
        {
            return Err(Error::InsufficientCollateralToRedeem);
        }

        let balance = self.shares.get(&depositor).copied().unwrap_or(0);
        let remaining = balance.checked_sub(slot.shares).ok_or(Error::Overflow)?;
        if remaining == 0 {
            self.shares.remove(&depositor);
        } else {
            self.shares.insert(depositor, remaining);
        }
        self.total_shares = sub(self.total_shares, slot.shares)?;
        self.total_pending_shares = sub(self.total_pending_shares, slot.shares)?;
        self.total_collateral = sub(self.total_collateral, owed)?;
        self.pending.remove(&depositor);

        token.push(&self.address, &depositor, owed);
        info!(
            target: "strata::automator",
            pool = %self.address,
            depositor = %depositor,
            shares = slot.shares,
            amount = owed,
            "redemptions claimed"
        );
        Ok(owed)
    }

    // ------------------------------------------------------------------
    // MintProducts / BurnProducts
    // ------------------------------------------------------------------

    /// Owner-only batch mint across whitelisted vault/maker pairs, spending
    /// pooled collateral as the minter leg of each item. All-or-nothing:
    /// every item is planned against current state before any commits.
    pub fn mint_products(
        &mut self,
        token: &mut dyn CollateralToken,
        factory: &Factory,
        vaults: &mut VaultDirectory,
        now: u64,
        caller: Address,
        items: &[MintProductItem],
    ) -> Result<MintProductsReceipt> {
        self.enter()?;
        let out = self.mint_products_inner(token, factory, vaults, now, caller, items);
        self.exit();
        out
    }

    fn mint_products_inner(
        &mut self,
        token: &mut dyn CollateralToken,
        factory: &Factory,
        vaults: &mut VaultDirectory,
        now: u64,
        caller: Address,
        items: &[MintProductItem],
    ) -> Result<MintProductsReceipt> {
        if caller != self.owner {
            return Err(Error::Unauthorized);
        }
        if items.is_empty() {
            return Err(Error::ZeroAmount);
        }
        if items.len() > MAX_BATCH {
            return Err(Error::AmountTooLarge);
        }

        // Phase one: plan every item against current state. Per-item plans
        // precheck balances individually; the aggregates below cover the
        // batch as a whole.
        let mut plans = Vec::with_capacity(items.len());
        let mut seen_quotes: BTreeSet<[u8; 32]> = BTreeSet::new();
        let mut spend = 0u128;
        let mut fees = 0u128;
        let mut maker_needs: BTreeMap<Address, u128> = BTreeMap::new();
        for item in items {
            if !factory.is_vault_enabled(&item.vault) {
                return Err(Error::InvalidVault);
            }
            let vault = vaults.get(&item.vault).ok_or(Error::InvalidVault)?;
            let plan = vault.plan_mint(
                &*token,
                factory,
                now,
                &self.address,
                item.total_collateral,
                &item.terms,
                None,
                None,
            )?;
            if !seen_quotes.insert(plan.quote_hash()) {
                return Err(Error::SignatureConsumed);
            }
            spend = add(spend, plan.minter_leg())?;
            fees = add(fees, plan.fees())?;
            let need = maker_needs.entry(plan.maker()).or_insert(0);
            *need = add(*need, plan.maker_leg())?;
            plans.push((item.vault, plan));
        }

        // Spending may not eat into matured-redemption obligations, the
        // unharvested fee balance, or (for a self-quoting pool) its own
        // maker legs. Staked legs are also capped by the unstaked claim:
        // basis never outgrows total_collateral, so every burn outcome,
        // including a full loss, stays within the books.
        let obligations = if self.total_pending_shares == 0 {
            0
        } else {
            mul_div_floor(self.total_pending_shares, self.total_collateral, self.total_shares)?
        };
        let fee_reserve = if self.total_fee > 0 { self.total_fee as u128 } else { 0 };
        let own_maker_need = maker_needs.remove(&self.address).unwrap_or(0);
        let claim_need = add(spend, own_maker_need)?;
        if claim_need > self.total_collateral.saturating_sub(self.locked) {
            return Err(Error::NoEnoughCollateralToRedeem);
        }
        let required = add(add(add(spend, obligations)?, fee_reserve)?, own_maker_need)?;
        if token.balance_of(&self.address) < required {
            return Err(Error::NoEnoughCollateralToRedeem);
        }
        for (maker, need) in &maker_needs {
            if token.balance_of(maker) < *need {
                return Err(Error::TransferFailed);
            }
        }

        // Phase two: commit. Mint fees leave the claim now; the remainder
        // of each minter leg is carried as position basis until burned. A
        // self-quoted maker leg is pool collateral too, carried as basis on
        // the maker-side product so its burn nets against what was spent.
        let mut mints = Vec::with_capacity(plans.len());
        for (vault_address, plan) in &plans {
            let vault = vaults.get_mut(vault_address).ok_or(Error::InvalidVault)?;
            let receipt = vault.commit_mint(token, plan)?;
            let basis = plan.minter_leg() - plan.fees();
            let slot = self
                .positions
                .entry((*vault_address, plan.minter_product()))
                .or_insert(0);
            *slot = slot.saturating_add(basis);
            self.locked = self.locked.saturating_add(basis);
            if plan.maker() == self.address {
                let slot = self
                    .positions
                    .entry((*vault_address, plan.maker_product()))
                    .or_insert(0);
                *slot = slot.saturating_add(plan.maker_leg());
                self.locked = self.locked.saturating_add(plan.maker_leg());
            }
            self.total_collateral = self.total_collateral.saturating_sub(plan.fees());
            mints.push(receipt);
        }

        info!(
            target: "strata::automator",
            pool = %self.address,
            items = mints.len(),
            spent = spend,
            fees,
            "products minted"
        );
        Ok(MintProductsReceipt { spent: spend, fees, mints })
    }

    /// Settle pool-held positions. Callable by anyone once the vaults
    /// gate settlement; the batch nets one signed delta against basis and
    /// skims the pool fee from it. All-or-nothing: items and the netted
    /// result are both validated before any commits.
    pub fn burn_products(
        &mut self,
        token: &mut dyn CollateralToken,
        vaults: &mut VaultDirectory,
        now: u64,
        items: &[BurnProductItem],
    ) -> Result<BurnProductsReceipt> {
        self.enter()?;
        let out = self.burn_products_inner(token, vaults, now, items);
        self.exit();
        out
    }

    fn burn_products_inner(
        &mut self,
        token: &mut dyn CollateralToken,
        vaults: &mut VaultDirectory,
        now: u64,
        items: &[BurnProductItem],
    ) -> Result<BurnProductsReceipt> {
        if items.is_empty() {
            return Err(Error::ZeroAmount);
        }
        if items.len() > MAX_BATCH {
            return Err(Error::AmountTooLarge);
        }

        // Phase one: plan every burn and price the batch against current
        // basis, mutating nothing.
        let mut plans = Vec::with_capacity(items.len());
        let mut seen: BTreeSet<(Address, ProductId)> = BTreeSet::new();
        let mut returned = 0u128;
        let mut basis_sum = 0u128;
        for item in items {
            let vault = vaults.get(&item.vault).ok_or(Error::InvalidVault)?;
            let plan = vault.plan_burn(now, &self.address, &item.product)?;
            if !seen.insert((item.vault, plan.id())) {
                return Err(Error::ZeroAmount);
            }
            let basis = self
                .positions
                .get(&(item.vault, plan.id()))
                .copied()
                .unwrap_or(0);
            returned = add(returned, plan.payoff())?;
            basis_sum = add(basis_sum, basis)?;
            plans.push((item.vault, plan));
        }

        // One signed result for the whole batch: gains are skimmed at the
        // pool fee rate, losses pass through in full and drag the fee
        // accumulator negative until earned back. Netted before any vault
        // commits; a batch the claim cannot absorb aborts with nothing
        // burned.
        let delta = to_signed(returned)?
            .checked_sub(to_signed(basis_sum)?)
            .ok_or(Error::Overflow)?;
        let skim = mul_div_signed(delta, self.params.fee_rate, SCALE)?;
        let claim_delta = if skim > 0 {
            delta.checked_sub(skim).ok_or(Error::Overflow)?
        } else {
            delta
        };
        let claim_after = add_signed(self.total_collateral, claim_delta)?;
        let fee_after = add_i128(self.total_fee, skim)?;

        // Phase two: commit every entry and collect the payoffs.
        let mut burns = Vec::with_capacity(plans.len());
        for (vault_address, plan) in &plans {
            let vault = vaults.get_mut(vault_address).ok_or(Error::InvalidVault)?;
            let receipt = vault.commit_burn_entry(plan);
            vault.pay_out(token, &self.address, plan.payoff());
            let basis = self
                .positions
                .remove(&(*vault_address, plan.id()))
                .unwrap_or(0);
            self.locked = self.locked.saturating_sub(basis);
            burns.push(receipt);
        }
        self.total_collateral = claim_after;
        self.total_fee = fee_after;

        info!(
            target: "strata::automator",
            pool = %self.address,
            items = burns.len(),
            returned,
            delta,
            fee = skim,
            "products burned"
        );
        Ok(BurnProductsReceipt {
            returned,
            delta,
            fee_accrued: skim,
            burns,
        })
    }

    // ------------------------------------------------------------------
    // Harvest
    // ------------------------------------------------------------------

    /// Pay out a positive fee balance, split between the protocol's
    /// collector and the pool owner, and reset it. The claim is untouched;
    /// gains were already booked net of the skim.
    pub fn harvest(
        &mut self,
        token: &mut dyn CollateralToken,
        factory: &Factory,
        caller: Address,
    ) -> Result<(u128, u128)> {
        self.enter()?;
        let out = self.harvest_inner(token, factory, caller);
        self.exit();
        out
    }

    fn harvest_inner(
        &mut self,
        token: &mut dyn CollateralToken,
        factory: &Factory,
        caller: Address,
    ) -> Result<(u128, u128)> {
        if self.total_fee <= 0 {
            return Err(Error::ZeroFee);
        }
        let fee = self.total_fee as u128;
        let protocol = apply_rate(fee, self.params.protocol_fee_rate)?;
        let owner_cut = fee - protocol;
        self.total_fee = 0;

        let collector = factory.fee_collector();
        token.push(&self.address, &collector, protocol);
        token.push(&self.address, &self.owner, owner_cut);
        info!(
            target: "strata::automator",
            pool = %self.address,
            caller = %caller,
            protocol,
            owner = owner_cut,
            "fee collected"
        );
        Ok((protocol, owner_cut))
    }
}
