// ============================================================================
// Payoff Strategies
// ============================================================================
//
// One closed enum, one pure payoff law per variant, no shared mutable state.
// A vault is bound to a single strategy at construction, which is why the
// product id does not hash the strategy tag.
//
// Notation for the banded variants, with A the per-side ledger amount and
// r the realized risk percentage (SCALE-relative):
//
//   protected = A * (SCALE - r) / SCALE      (always returns to the minter)
//   contested = A - protected
//   won       = contested * w / SCALE        (w = win fraction in [0, SCALE])
//   fee       = won * settlement_fee_rate / SCALE
//
//   minter payoff = protected + won - fee
//   maker  payoff = contested - won
//
// Every division floors and is the last step of its formula; w floors
// before the contested share, which floors before the fee. Tests pin the
// literal last-digit outputs of this order.

use serde::{Deserialize, Serialize};

use crate::constants::SCALE;
use crate::error::{Error, Result};
use crate::fixed::{apply_rate, mul_div_floor, sub};
use crate::types::Anchors;

/// Closed set of payoff laws.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    /// All-or-nothing above the band, linearly interpolated inside it.
    BinaryBull,
    /// Mirror image of `BinaryBull`.
    BinaryBear,
    /// Pays the minter only if no settled boundary ever touches the band
    /// edges before expiry; a touch knocks the position out immediately.
    DoubleNoTouch,
    /// Principal converts into the secondary asset at the strike when the
    /// settlement price closes at or above it; identity hashes the term.
    DualCurrency,
    /// Double-no-touch law with a per-annum borrow cost charged at mint on
    /// the minter-funded notional over the remaining term.
    Leveraged { borrow_rate: u128 },
}

impl Strategy {
    /// Number of anchor prices the strategy's terms must carry.
    pub fn anchor_arity(self) -> usize {
        match self {
            Strategy::DualCurrency => 1,
            _ => 2,
        }
    }

    /// Whether a settled boundary outside the band forces early settlement.
    pub fn is_knockout(self) -> bool {
        matches!(self, Strategy::DoubleNoTouch | Strategy::Leveraged { .. })
    }

    /// Whether the product identity hashes a term instead of a risk
    /// percentage.
    pub fn uses_term_identity(self) -> bool {
        matches!(self, Strategy::DualCurrency)
    }

    /// Per-annum borrow rate; zero for unleveraged strategies.
    pub fn borrow_rate(self) -> u128 {
        match self {
            Strategy::Leveraged { borrow_rate } => borrow_rate,
            _ => 0,
        }
    }
}

/// Both sides of one settled position plus the settlement fee. For every
/// variant, `minter + maker + settlement_fee == amount` exactly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payoff {
    pub minter: u128,
    pub maker: u128,
    pub settlement_fee: u128,
}

/// Whether a settled boundary price touches or exits the band. Band edges
/// count as touched.
pub fn touches(price: u128, k1: u128, k2: u128) -> bool {
    price <= k1 || price >= k2
}

/// Win fraction for the banded variants.
fn win_fraction(strategy: Strategy, anchors: &Anchors, settle: u128, knocked_out: bool) -> Result<u128> {
    let (k1, k2) = anchors.pair()?;
    match strategy {
        Strategy::BinaryBull => {
            if settle >= k2 {
                Ok(SCALE)
            } else if settle <= k1 {
                Ok(0)
            } else {
                mul_div_floor(settle - k1, SCALE, k2 - k1)
            }
        }
        Strategy::BinaryBear => {
            if settle <= k1 {
                Ok(SCALE)
            } else if settle >= k2 {
                Ok(0)
            } else {
                mul_div_floor(k2 - settle, SCALE, k2 - k1)
            }
        }
        Strategy::DoubleNoTouch | Strategy::Leveraged { .. } => {
            // The caller resolves path dependence: a touch at any settled
            // boundary up to expiry knocks the position out.
            Ok(if knocked_out { 0 } else { SCALE })
        }
        Strategy::DualCurrency => Err(Error::InvalidAnchors),
    }
}

/// Evaluate one position at its settlement price.
///
/// `amount` is the per-side ledger balance, `risk_pct` the realized risk
/// percentage bound into the product id (ignored by dual-currency, whose
/// identity field is a term). `knocked_out` is meaningful only for the
/// knockout strategies.
pub fn evaluate(
    strategy: Strategy,
    anchors: &Anchors,
    risk_pct: u128,
    amount: u128,
    settle: u128,
    knocked_out: bool,
    settlement_fee_rate: u128,
) -> Result<Payoff> {
    if let Strategy::DualCurrency = strategy {
        let strike = anchors.single()?;
        if settle < strike {
            // Not converted: principal and premium return to the minter.
            // The conversion branch is the maker-favorable outcome, so
            // neither branch carries a settlement fee.
            return Ok(Payoff {
                minter: amount,
                maker: 0,
                settlement_fee: 0,
            });
        }
        // Converted at the strike: the minter's claim is worth the
        // converted notional marked at the settlement price, the maker
        // keeps the difference. Division last.
        let converted = mul_div_floor(amount, strike, settle)?;
        return Ok(Payoff {
            minter: converted,
            maker: amount - converted,
            settlement_fee: 0,
        });
    }

    let w = win_fraction(strategy, anchors, settle, knocked_out)?;
    let protected_rate = sub(SCALE, risk_pct)?;
    let protected = mul_div_floor(amount, protected_rate, SCALE)?;
    let contested = amount - protected;
    let won = mul_div_floor(contested, w, SCALE)?;
    let fee = apply_rate(won, settlement_fee_rate)?;
    Ok(Payoff {
        minter: protected + won - fee,
        maker: contested - won,
        settlement_fee: fee,
    })
}
