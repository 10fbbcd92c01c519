// ============================================================================
// Core Identifiers and Receipts
// ============================================================================

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::MAX_PRICE;
use crate::error::{Error, Result};

/// Opaque 32-byte participant or instance identity (minters, makers, vaults,
/// pools, the fee collector). The engine never interprets the bytes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(pub [u8; 32]);

impl Address {
    /// Sink for permanently retained dust shares. Nothing can spend from it.
    pub const DEAD: Address = Address([0xFF; 32]);

    /// Address with the low 8 bytes set from `n`. Compact constructor for
    /// tests and examples; hosts normally carry full 32-byte identities.
    pub fn from_low(n: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&n.to_be_bytes());
        Address(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({}..)", &hex::encode(&self.0[..4]))
    }
}

/// Deterministic product identity: SHA-256 over the domain tag and the
/// position's economic terms. Off-ledger callers reconstruct it from
/// (expiry, anchors, risk-or-term, side) without an index.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProductId(pub [u8; 32]);

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProductId({}..)", &hex::encode(&self.0[..4]))
    }
}

/// Which leg of a position a ledger entry represents. The two sides of one
/// mint share every term except this flag, so they hash to distinct ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Side {
    Minter,
    Maker,
}

impl Side {
    pub fn tag(self) -> u8 {
        match self {
            Side::Minter => 0,
            Side::Maker => 1,
        }
    }
}

/// Anchor price levels defining a payoff band or threshold. One anchor for
/// dual-currency strikes, two (strictly ordered) for banded strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Anchors {
    One(u128),
    Two(u128, u128),
}

impl Anchors {
    pub fn count(&self) -> usize {
        match self {
            Anchors::One(_) => 1,
            Anchors::Two(_, _) => 2,
        }
    }

    /// Ordering and cap checks: anchors are nonzero, within MAX_PRICE, and
    /// strictly ordered low < high when two are present.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Anchors::One(k) => {
                if k == 0 || k > MAX_PRICE {
                    return Err(Error::InvalidAnchors);
                }
            }
            Anchors::Two(k1, k2) => {
                if k1 == 0 || k2 > MAX_PRICE || k1 >= k2 {
                    return Err(Error::InvalidAnchors);
                }
            }
        }
        Ok(())
    }

    pub fn single(&self) -> Result<u128> {
        match *self {
            Anchors::One(k) => Ok(k),
            Anchors::Two(_, _) => Err(Error::InvalidAnchors),
        }
    }

    pub fn pair(&self) -> Result<(u128, u128)> {
        match *self {
            Anchors::One(_) => Err(Error::InvalidAnchors),
            Anchors::Two(k1, k2) => Ok((k1, k2)),
        }
    }
}

// ============================================================================
// Receipts
// ============================================================================
//
// Every state-changing operation returns a typed receipt mirroring its
// tracing event, so hosts can index outcomes without parsing logs.

/// Outcome of a successful mint: both product ids plus the realized terms.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintReceipt {
    pub minter: Address,
    pub maker: Address,
    pub minter_product: ProductId,
    pub maker_product: ProductId,
    /// Ledger amount credited to each side (collateral net of mint fees).
    pub amount: u128,
    /// Realized risk percentage (SCALE-relative) for payoff strategies, or
    /// the realized term in days for dual-currency identities. Emitted so
    /// off-ledger callers can reconstruct the product ids.
    pub risk_or_term: u128,
    pub trading_fee: u128,
    pub borrow_fee: u128,
    pub referral: Address,
}

/// Outcome of burning one ledger entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnReceipt {
    pub holder: Address,
    pub product_id: ProductId,
    pub amount_burned: u128,
    pub payoff: u128,
    pub settlement_fee: u128,
    /// True when a knockout boundary forced settlement before nominal expiry.
    pub knocked_out: bool,
}

/// Outcome of an atomic burn batch: per-item receipts plus netted totals.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchBurnReceipt {
    pub holder: Address,
    pub total_payoff: u128,
    pub total_settlement_fee: u128,
    pub burns: Vec<BurnReceipt>,
}

/// Outcome of a pool-driven mint batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintProductsReceipt {
    /// Pool collateral moved into vaults (minter legs).
    pub spent: u128,
    /// Mint fees deducted from the pool's net asset value.
    pub fees: u128,
    pub mints: Vec<MintReceipt>,
}

/// Outcome of a pool-driven burn batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnProductsReceipt {
    /// Collateral returned to the pool by the vaults.
    pub returned: u128,
    /// Signed pool-level result versus the fee-net basis of the burned
    /// positions. Negative is a realized loss.
    pub delta: i128,
    /// Signed pool fee accrued on `delta`.
    pub fee_accrued: i128,
    pub burns: Vec<BurnReceipt>,
}
