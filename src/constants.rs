//! Engine-wide constants.
//!
//! All amounts and prices are u128 fixed-point at [`SCALE`]. Rates are
//! SCALE-relative fractions (3% == SCALE * 3 / 100). Caps exist so every
//! multiply in the engine stays well inside the 256-bit intermediate used
//! by [`crate::fixed::mul_div_floor`].

/// Fixed-point scale for amounts, prices, rates and share quotes (18 decimals).
pub const SCALE: u128 = 1_000_000_000_000_000_000;

/// Seconds per settlement day.
pub const SECS_PER_DAY: u64 = 86_400;

/// Offset of the daily settlement boundary inside a UTC day (08:00 UTC).
/// A valid expiry satisfies `expiry % SECS_PER_DAY == SETTLEMENT_OFFSET_SECS`.
pub const SETTLEMENT_OFFSET_SECS: u64 = 28_800;

/// Seconds per year (365 days) for per-annum borrow cost accrual.
pub const SECS_PER_YEAR: u64 = 31_536_000;

/// Internal share units permanently retained from the first depositor.
/// Keeps total supply nonzero so the share quote never divides by zero.
pub const DUST_SHARES: u128 = 1_000;

/// Maximum collateral amount accepted anywhere (10^12 whole units at SCALE).
pub const MAX_AMOUNT: u128 = 1_000_000_000_000_000_000_000_000_000_000;

/// Maximum settlement or anchor price (10^8 whole units at SCALE).
pub const MAX_PRICE: u128 = 100_000_000_000_000_000_000_000_000;

/// Maximum items per batched operation (burn_batch, mint_products, burn_products).
pub const MAX_BATCH: usize = 100;

/// Length of an HMAC-SHA256 maker or permit signature.
pub const SIGNATURE_LEN: usize = 32;

/// Internal share precision multiplier for rebase-flavored pools.
/// Internal share amounts are external shares times this factor.
pub const SHARE_MULTIPLIER_REBASE: u128 = 1_000_000;

/// Default pool fee rate applied to signed burn-batch deltas.
pub const DEFAULT_POOL_FEE_RATE: u128 = SCALE / 100 * 3;

/// Default protocol share of a harvested pool fee (15%).
pub const DEFAULT_PROTOCOL_FEE_RATE: u128 = SCALE / 100 * 15;

/// Default redemption cooldown (7 days).
pub const DEFAULT_REDEMPTION_COOLDOWN: u64 = 7 * SECS_PER_DAY;

/// Upper bound a pool may configure its cooldown to (30 days).
pub const DEFAULT_MAX_PERIOD: u64 = 30 * SECS_PER_DAY;
