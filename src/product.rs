// ============================================================================
// Product Terms and Identity
// ============================================================================

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::constants::{SECS_PER_DAY, SETTLEMENT_OFFSET_SECS};
use crate::types::{Address, Anchors, ProductId, Side};

/// Domain tag hashed into every product id.
const PRODUCT_DOMAIN: &[u8] = b"strata.product.v1";

/// Terms a minter submits, quoted and signed by the maker off-ledger.
///
/// The signature covers the full tuple plus the vault's own address and the
/// minter's identity, so a quote cannot be replayed across vaults or
/// submitted by a counterparty it was not issued to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintTerms {
    /// Position expiry, unix seconds, aligned to a settlement boundary.
    pub expiry: u64,
    /// Anchor prices; arity must match the vault's strategy.
    pub anchors: Anchors,
    /// Minter capital exposed to the payoff outcome. At most the
    /// minter-funded collateral (total minus maker collateral).
    pub collateral_at_risk: u128,
    /// Collateral the maker contributes to the pot.
    pub maker_collateral: u128,
    /// Optional solvency floor on the maker's token balance at mint time.
    pub maker_balance_threshold: Option<u128>,
    /// Quote expiry, unix seconds. Mint fails once `now` reaches it.
    pub deadline: u64,
    pub maker: Address,
    /// HMAC-SHA256 over the quote payload, keyed by the maker's registered
    /// verification key.
    pub signature: Vec<u8>,
}

/// The hash components of one ledger slot. Everything needed to reprice a
/// position at burn time, and nothing else, lives here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductTerms {
    pub expiry: u64,
    pub anchors: Anchors,
    /// Realized risk percentage (SCALE-relative) for payoff strategies;
    /// realized term in days for dual-currency identities.
    pub risk_or_term: u128,
    pub side: Side,
}

impl ProductTerms {
    /// Deterministic identity of this slot.
    pub fn id(&self) -> ProductId {
        let mut hasher = Sha256::new();
        hasher.update(PRODUCT_DOMAIN);
        hasher.update(self.expiry.to_be_bytes());
        hasher.update([self.anchors.count() as u8]);
        match self.anchors {
            Anchors::One(k) => hasher.update(k.to_be_bytes()),
            Anchors::Two(k1, k2) => {
                hasher.update(k1.to_be_bytes());
                hasher.update(k2.to_be_bytes());
            }
        }
        hasher.update(self.risk_or_term.to_be_bytes());
        hasher.update([self.side.tag()]);
        ProductId(hasher.finalize().into())
    }

    /// Same economics, opposite leg.
    pub fn counterpart(&self) -> ProductTerms {
        ProductTerms {
            side: match self.side {
                Side::Minter => Side::Maker,
                Side::Maker => Side::Minter,
            },
            ..*self
        }
    }
}

/// Whether `expiry` lands exactly on a daily settlement boundary.
pub fn is_boundary_aligned(expiry: u64) -> bool {
    expiry % SECS_PER_DAY == SETTLEMENT_OFFSET_SECS
}

/// Most recent settlement boundary at or before `now`, if one exists.
pub fn latest_boundary(now: u64) -> Option<u64> {
    if now < SETTLEMENT_OFFSET_SECS {
        return None;
    }
    Some(now - ((now - SETTLEMENT_OFFSET_SECS) % SECS_PER_DAY))
}
