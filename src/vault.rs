// ============================================================================
// Vault / Settlement Engine
// ============================================================================
//
// A vault issues complementary position pairs against one strategy, gates
// settlement on its oracle book, and accrues fees. Per-position lifecycle:
//
//   Unminted -> Minted -> (KnockedOut) -> Settleable -> Burned
//
// Every public operation is call-atomic and split into a plan phase (all
// validation, no mutation) and a commit phase (mutations, then transfers).
// The pool engine drives the same two phases item-by-item to keep its
// batches all-or-nothing. A failing plan therefore never leaves partial
// state, and commits only move value the plan already proved available.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::{payload_hash, permit_message, quote_message, verify, PullPermit};
use crate::collateral::CollateralToken;
use crate::constants::{
    MAX_AMOUNT, MAX_BATCH, SCALE, SECS_PER_DAY, SECS_PER_YEAR, SIGNATURE_LEN,
};
use crate::error::{Error, Result};
use crate::factory::Factory;
use crate::fixed::{add, apply_rate, mul_div_floor, sub};
use crate::ledger::PositionLedger;
use crate::oracle::Oracle;
use crate::product::{is_boundary_aligned, MintTerms, ProductTerms};
use crate::strategy::{self, Strategy};
use crate::types::{Address, BatchBurnReceipt, BurnReceipt, MintReceipt, ProductId, Side};

/// Vault fee configuration, SCALE-relative rates. Both rates default to
/// zero; fee-bearing vaults opt in at deployment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultParams {
    /// Charged at mint on collateral at risk.
    pub trading_fee_rate: u128,
    /// Charged at burn on the contested portion the minter won.
    pub settlement_fee_rate: u128,
}

impl VaultParams {
    pub fn validated(self) -> Result<Self> {
        if self.trading_fee_rate > SCALE || self.settlement_fee_rate > SCALE {
            return Err(Error::AmountTooLarge);
        }
        Ok(self)
    }
}

/// Fully validated mint, ready to commit. Everything fallible happened in
/// the plan phase; the commit phase only moves what this records.
pub(crate) struct MintPlan {
    minter: Address,
    maker: Address,
    minter_leg: u128,
    maker_leg: u128,
    trading_fee: u128,
    borrow_fee: u128,
    amount: u128,
    minter_terms: ProductTerms,
    quote_hash: [u8; 32],
    permit_hash: Option<[u8; 32]>,
    referral: Address,
}

impl MintPlan {
    /// Consumed-set key of the quote, for batch-level duplicate detection.
    pub(crate) fn quote_hash(&self) -> [u8; 32] {
        self.quote_hash
    }

    /// Pool collateral this mint will pull (the minter leg).
    pub(crate) fn minter_leg(&self) -> u128 {
        self.minter_leg
    }

    pub(crate) fn maker(&self) -> Address {
        self.maker
    }

    pub(crate) fn maker_leg(&self) -> u128 {
        self.maker_leg
    }

    /// Mint fees deducted from the minted amount.
    pub(crate) fn fees(&self) -> u128 {
        self.trading_fee.saturating_add(self.borrow_fee)
    }

    pub(crate) fn minter_product(&self) -> ProductId {
        self.minter_terms.id()
    }

    pub(crate) fn maker_product(&self) -> ProductId {
        self.minter_terms.counterpart().id()
    }
}

/// Fully validated burn for one ledger slot.
pub(crate) struct BurnPlan {
    holder: Address,
    id: ProductId,
    amount: u128,
    payoff: u128,
    settlement_fee: u128,
    knocked_out: bool,
}

impl BurnPlan {
    pub(crate) fn id(&self) -> ProductId {
        self.id
    }

    pub(crate) fn payoff(&self) -> u128 {
        self.payoff
    }
}

pub struct Vault {
    address: Address,
    strategy: Strategy,
    params: VaultParams,
    ledger: PositionLedger,
    oracle: Oracle,
    consumed: BTreeSet<[u8; 32]>,
    total_fee: u128,
    entered: bool,
}

impl Vault {
    pub fn new(address: Address, strategy: Strategy, params: VaultParams) -> Result<Self> {
        let params = params.validated()?;
        if strategy.borrow_rate() > SCALE {
            return Err(Error::AmountTooLarge);
        }
        Ok(Vault {
            address,
            strategy,
            params,
            ledger: PositionLedger::new(),
            oracle: Oracle::new(),
            consumed: BTreeSet::new(),
            total_fee: 0,
            entered: false,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn params(&self) -> VaultParams {
        self.params
    }

    /// Accrued trading, borrow and settlement fees awaiting harvest.
    pub fn total_fee(&self) -> u128 {
        self.total_fee
    }

    pub fn oracle(&self) -> &Oracle {
        &self.oracle
    }

    /// Write access for the oracle adapter driving `settle`.
    pub fn oracle_mut(&mut self) -> &mut Oracle {
        &mut self.oracle
    }

    /// Ledger balance for the product derived from `terms`.
    pub fn position_balance(&self, holder: &Address, terms: &ProductTerms) -> u128 {
        self.ledger.balance_of(holder, &terms.id())
    }

    /// Sum of all live ledger balances.
    pub fn ledger_total(&self) -> u128 {
        self.ledger.total()
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
    // Mint
    // ------------------------------------------------------------------

    /// Issue a position pair: `total_collateral` gross, of which the maker
    /// funds `terms.maker_collateral` and the minter the rest (optionally
    /// through a pre-signed permit). Both legs' balances are prechecked so
    /// the commit phase cannot strand a one-sided pull.
    #[allow(clippy::too_many_arguments)]
    pub fn mint(
        &mut self,
        token: &mut dyn CollateralToken,
        factory: &Factory,
        now: u64,
        minter: Address,
        total_collateral: u128,
        terms: &MintTerms,
        permit: Option<&PullPermit>,
        referral: Option<Address>,
    ) -> Result<MintReceipt> {
        self.enter()?;
        let out = self
            .plan_mint(&*token, factory, now, &minter, total_collateral, terms, permit, referral)
            .and_then(|plan| self.commit_mint(token, &plan));
        self.exit();
        out
    }

    /// Validation phase: every precondition, fee and identity computation,
    /// with no mutation of vault, ledger or token state.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn plan_mint(
        &self,
        token: &dyn CollateralToken,
        factory: &Factory,
        now: u64,
        minter: &Address,
        total_collateral: u128,
        terms: &MintTerms,
        permit: Option<&PullPermit>,
        referral: Option<Address>,
    ) -> Result<MintPlan> {
        if terms.deadline <= now {
            return Err(Error::DeadlinePassed);
        }
        if terms.expiry <= now || !is_boundary_aligned(terms.expiry) {
            return Err(Error::InvalidExpiry);
        }
        if terms.anchors.count() != self.strategy.anchor_arity() {
            return Err(Error::InvalidAnchors);
        }
        terms.anchors.validate()?;
        if total_collateral == 0 {
            return Err(Error::ZeroAmount);
        }
        if total_collateral > MAX_AMOUNT {
            return Err(Error::AmountTooLarge);
        }
        if terms.maker_collateral > total_collateral {
            return Err(Error::InvalidCollateral);
        }
        let minter_leg = total_collateral - terms.maker_collateral;
        if terms.collateral_at_risk > minter_leg {
            return Err(Error::InvalidCollateral);
        }
        if terms.signature.len() != SIGNATURE_LEN {
            return Err(Error::InvalidSignature);
        }
        let maker_key = factory.maker_key(&terms.maker).ok_or(Error::InvalidMaker)?;
        if let Some(threshold) = terms.maker_balance_threshold {
            if token.balance_of(&terms.maker) < threshold {
                return Err(Error::InvalidBalanceThreshold);
            }
        }

        let message = quote_message(&self.address, minter, total_collateral, terms);
        verify(maker_key, &message, &terms.signature)?;
        let quote_hash = payload_hash(&message);
        if self.consumed.contains(&quote_hash) {
            return Err(Error::SignatureConsumed);
        }

        let trading_fee = apply_rate(terms.collateral_at_risk, self.params.trading_fee_rate)?;
        let borrow_fee = match self.strategy.borrow_rate() {
            0 => 0,
            rate => {
                // Per-annum cost on the minter-funded notional over the
                // remaining term; rate applies first, tenor scales last.
                let annual = apply_rate(minter_leg, rate)?;
                mul_div_floor(annual, (terms.expiry - now) as u128, SECS_PER_YEAR as u128)?
            }
        };
        let fee_total = add(trading_fee, borrow_fee)?;
        // Fees are borne by the minter leg; a mint whose fees exceed that
        // leg is degenerate.
        if fee_total > minter_leg {
            return Err(Error::InvalidCollateral);
        }
        let amount = total_collateral
            .checked_sub(fee_total)
            .filter(|a| *a > 0)
            .ok_or(Error::InvalidCollateral)?;

        let risk_or_term = if self.strategy.uses_term_identity() {
            ((terms.expiry - now) / SECS_PER_DAY) as u128
        } else {
            // Net-of-fee base: the trading fee comes out of the risk
            // capital before the split is recorded.
            let net_pot = sub(total_collateral, trading_fee)?;
            let net_risk = add(sub(terms.collateral_at_risk, trading_fee)?, terms.maker_collateral)?;
            mul_div_floor(net_risk, SCALE, net_pot)?
        };

        let permit_hash = match permit {
            None => None,
            Some(p) => {
                if p.owner != *minter {
                    return Err(Error::Unauthorized);
                }
                if p.deadline <= now {
                    return Err(Error::DeadlinePassed);
                }
                if p.amount != minter_leg {
                    return Err(Error::TransferFailed);
                }
                if p.signature.len() != SIGNATURE_LEN {
                    return Err(Error::InvalidSignature);
                }
                let owner_key = factory.signing_key(&p.owner).ok_or(Error::InvalidSignature)?;
                let permit_msg = permit_message(&self.address, p);
                verify(owner_key, &permit_msg, &p.signature)?;
                let hash = payload_hash(&permit_msg);
                if self.consumed.contains(&hash) {
                    return Err(Error::SignatureConsumed);
                }
                Some(hash)
            }
        };

        // Both legs must be pullable before anything commits. A shared
        // funding address needs the combined amount.
        let maker_leg = terms.maker_collateral;
        if *minter == terms.maker {
            if token.balance_of(minter) < total_collateral {
                return Err(Error::TransferFailed);
            }
        } else {
            if token.balance_of(minter) < minter_leg {
                return Err(Error::TransferFailed);
            }
            if token.balance_of(&terms.maker) < maker_leg {
                return Err(Error::TransferFailed);
            }
        }

        Ok(MintPlan {
            minter: *minter,
            maker: terms.maker,
            minter_leg,
            maker_leg,
            trading_fee,
            borrow_fee,
            amount,
            minter_terms: ProductTerms {
                expiry: terms.expiry,
                anchors: terms.anchors,
                risk_or_term,
                side: Side::Minter,
            },
            quote_hash,
            permit_hash,
            referral: referral.unwrap_or_else(|| factory.referral()),
        })
    }

    /// Commit phase: consume signatures, pull both legs, credit both ledger
    /// sides, accrue mint fees. Fails only if the token violates its
    /// balance contract.
    pub(crate) fn commit_mint(
        &mut self,
        token: &mut dyn CollateralToken,
        plan: &MintPlan,
    ) -> Result<MintReceipt> {
        // Signatures are dead before any transfer so a re-entrant replay
        // inside the token callback cannot pass the plan phase again.
        self.consumed.insert(plan.quote_hash);
        if let Some(hash) = plan.permit_hash {
            self.consumed.insert(hash);
        }

        token.pull(&plan.minter, &self.address, plan.minter_leg)?;
        token.pull(&plan.maker, &self.address, plan.maker_leg)?;

        let minter_terms = plan.minter_terms;
        let maker_terms = minter_terms.counterpart();
        let minter_product = minter_terms.id();
        let maker_product = maker_terms.id();
        self.ledger.credit(&plan.minter, &minter_product, plan.amount)?;
        self.ledger.credit(&plan.maker, &maker_product, plan.amount)?;
        self.total_fee = self.total_fee.saturating_add(plan.fees());

        let receipt = MintReceipt {
            minter: plan.minter,
            maker: plan.maker,
            minter_product,
            maker_product,
            amount: plan.amount,
            risk_or_term: minter_terms.risk_or_term,
            trading_fee: plan.trading_fee,
            borrow_fee: plan.borrow_fee,
            referral: plan.referral,
        };
        info!(
            target: "strata::vault",
            vault = %self.address,
            minter = %receipt.minter,
            maker = %receipt.maker,
            minter_product = %receipt.minter_product,
            maker_product = %receipt.maker_product,
            amount = receipt.amount,
            risk_or_term = receipt.risk_or_term,
            trading_fee = receipt.trading_fee,
            borrow_fee = receipt.borrow_fee,
            referral = %receipt.referral,
            "minted"
        );
        Ok(receipt)
    }

    // ------------------------------------------------------------------
    // Burn
    // ------------------------------------------------------------------

    /// Settle and destroy the caller's ledger entry for `product`.
    pub fn burn(
        &mut self,
        token: &mut dyn CollateralToken,
        now: u64,
        holder: Address,
        product: &ProductTerms,
    ) -> Result<BurnReceipt> {
        self.enter()?;
        let out = self.plan_burn(now, &holder, product).map(|plan| {
            let receipt = self.commit_burn_entry(&plan);
            token.push(&self.address, &plan.holder, plan.payoff);
            receipt
        });
        self.exit();
        out
    }

    /// Validation phase for one burn: settlement gating, payoff math, no
    /// mutation.
    pub(crate) fn plan_burn(&self, now: u64, holder: &Address, product: &ProductTerms) -> Result<BurnPlan> {
        if product.anchors.count() != self.strategy.anchor_arity() {
            return Err(Error::InvalidAnchors);
        }
        product.anchors.validate()?;

        let touch = if self.strategy.is_knockout() {
            let (k1, k2) = product.anchors.pair()?;
            self.oracle.first_touch(k1, k2, product.expiry)
        } else {
            None
        };
        let (settle, knocked_out) = match touch {
            // A settled touch forces the knocked-out payoff immediately,
            // before nominal expiry.
            Some((_, price)) => (price, true),
            None => {
                if now < product.expiry {
                    return Err(Error::NotExpired);
                }
                let price = self.oracle.price_at(product.expiry).ok_or(Error::NotSettled)?;
                (price, false)
            }
        };

        let id = product.id();
        let amount = self.ledger.balance_of(holder, &id);
        if amount == 0 {
            return Err(Error::ZeroAmount);
        }

        let payoff = strategy::evaluate(
            self.strategy,
            &product.anchors,
            product.risk_or_term,
            amount,
            settle,
            knocked_out,
            self.params.settlement_fee_rate,
        )?;
        // The settlement fee accrues once, on the minter leg.
        let (paid, settlement_fee) = match product.side {
            Side::Minter => (payoff.minter, payoff.settlement_fee),
            Side::Maker => (payoff.maker, 0),
        };
        Ok(BurnPlan {
            holder: *holder,
            id,
            amount,
            payoff: paid,
            settlement_fee,
            knocked_out,
        })
    }

    /// Ledger and fee effects of one burn. The payoff transfer is the
    /// caller's final step so batches can net it.
    pub(crate) fn commit_burn_entry(&mut self, plan: &BurnPlan) -> BurnReceipt {
        let burned = self.ledger.take_all(&plan.holder, &plan.id);
        debug_assert_eq!(burned, plan.amount);
        self.total_fee = self.total_fee.saturating_add(plan.settlement_fee);
        let receipt = BurnReceipt {
            holder: plan.holder,
            product_id: plan.id,
            amount_burned: plan.amount,
            payoff: plan.payoff,
            settlement_fee: plan.settlement_fee,
            knocked_out: plan.knocked_out,
        };
        info!(
            target: "strata::vault",
            vault = %self.address,
            holder = %receipt.holder,
            product = %receipt.product_id,
            amount_burned = receipt.amount_burned,
            payoff = receipt.payoff,
            settlement_fee = receipt.settlement_fee,
            knocked_out = receipt.knocked_out,
            "burned"
        );
        receipt
    }

    /// Per-item transfer used by the pool engine after `commit_burn_entry`.
    pub(crate) fn pay_out(&self, token: &mut dyn CollateralToken, to: &Address, amount: u128) {
        token.push(&self.address, to, amount);
    }

    /// Burn several products atomically. Any failing item aborts the whole
    /// batch before any mutation; payoffs net into one transfer.
    pub fn burn_batch(
        &mut self,
        token: &mut dyn CollateralToken,
        now: u64,
        holder: Address,
        products: &[ProductTerms],
    ) -> Result<BatchBurnReceipt> {
        self.enter()?;
        let out = self.burn_batch_inner(token, now, holder, products);
        self.exit();
        out
    }

    fn burn_batch_inner(
        &mut self,
        token: &mut dyn CollateralToken,
        now: u64,
        holder: Address,
        products: &[ProductTerms],
    ) -> Result<BatchBurnReceipt> {
        if products.is_empty() {
            return Err(Error::ZeroAmount);
        }
        if products.len() > MAX_BATCH {
            return Err(Error::AmountTooLarge);
        }

        // Phase one: validate everything, mutate nothing. A duplicate id
        // would price the same balance twice; it is the second burn of a
        // zeroed slot.
        let mut seen: BTreeSet<ProductId> = BTreeSet::new();
        let mut plans = Vec::with_capacity(products.len());
        for product in products {
            let plan = self.plan_burn(now, &holder, product)?;
            if !seen.insert(plan.id) {
                return Err(Error::ZeroAmount);
            }
            plans.push(plan);
        }

        // Phase two: commit every entry, then settle the netted payoff in
        // one transfer.
        let mut total_payoff = 0u128;
        let mut total_settlement_fee = 0u128;
        let mut burns = Vec::with_capacity(plans.len());
        for plan in &plans {
            let receipt = self.commit_burn_entry(plan);
            total_payoff = total_payoff.saturating_add(receipt.payoff);
            total_settlement_fee = total_settlement_fee.saturating_add(receipt.settlement_fee);
            burns.push(receipt);
        }
        token.push(&self.address, &holder, total_payoff);

        info!(
            target: "strata::vault",
            vault = %self.address,
            holder = %holder,
            items = burns.len(),
            total_payoff,
            total_settlement_fee,
            "batch burned"
        );
        Ok(BatchBurnReceipt {
            holder,
            total_payoff,
            total_settlement_fee,
            burns,
        })
    }

    // ------------------------------------------------------------------
    // Harvest
    // ------------------------------------------------------------------

    /// Pay the accrued fees to the factory's collector and reset them.
    pub fn harvest(&mut self, token: &mut dyn CollateralToken, factory: &Factory) -> Result<u128> {
        self.enter()?;
        let out = self.harvest_inner(token, factory);
        self.exit();
        out
    }

    fn harvest_inner(&mut self, token: &mut dyn CollateralToken, factory: &Factory) -> Result<u128> {
        if self.total_fee == 0 {
            return Err(Error::ZeroFee);
        }
        let fee = self.total_fee;
        self.total_fee = 0;
        let collector = factory.fee_collector();
        token.push(&self.address, &collector, fee);
        info!(
            target: "strata::vault",
            vault = %self.address,
            collector = %collector,
            amount = fee,
            "fee collected"
        );
        Ok(fee)
    }
}

// ============================================================================
// Vault Directory
// ============================================================================

/// Owning map of vault instances, the pool engine's window onto the vaults
/// it mints into.
#[derive(Default)]
pub struct VaultDirectory {
    vaults: std::collections::BTreeMap<Address, Vault>,
}

impl VaultDirectory {
    pub fn new() -> Self {
        VaultDirectory::default()
    }

    /// Register a vault under its own address. Duplicate addresses are
    /// rejected.
    pub fn insert(&mut self, vault: Vault) -> Result<()> {
        let address = vault.address();
        if self.vaults.contains_key(&address) {
            return Err(Error::InvalidVault);
        }
        self.vaults.insert(address, vault);
        Ok(())
    }

    pub fn get(&self, address: &Address) -> Option<&Vault> {
        self.vaults.get(address)
    }

    pub fn get_mut(&mut self, address: &Address) -> Option<&mut Vault> {
        self.vaults.get_mut(address)
    }

    pub fn len(&self) -> usize {
        self.vaults.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vaults.is_empty()
    }
}
