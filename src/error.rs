//! Engine error type.
//!
//! Every public operation fails synchronously with one named condition and
//! commits nothing. Callers re-submit after satisfying the precondition;
//! nothing is retried internally.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    // ------------------------------------------------------------------
    // Authorization
    // ------------------------------------------------------------------
    /// Maker or permit signature does not verify against the registered key.
    #[error("signature does not verify")]
    InvalidSignature,

    /// The signed payload was already consumed by a prior mint or pull.
    #[error("signature already consumed")]
    SignatureConsumed,

    /// Maker is not whitelisted or has no registered key.
    #[error("maker not whitelisted")]
    InvalidMaker,

    /// Vault is not whitelisted or unknown to the directory.
    #[error("vault not whitelisted")]
    InvalidVault,

    /// Caller is not allowed to perform this operation.
    #[error("caller not authorized")]
    Unauthorized,

    // ------------------------------------------------------------------
    // Temporal
    // ------------------------------------------------------------------
    /// Mint terms or permit deadline is not in the future.
    #[error("deadline passed")]
    DeadlinePassed,

    /// Expiry is in the past or not aligned to a settlement boundary.
    #[error("expiry invalid or misaligned")]
    InvalidExpiry,

    /// Anchor prices are zero, out of cap, unordered, or of the wrong arity
    /// for the strategy.
    #[error("anchor prices malformed")]
    InvalidAnchors,

    /// Position has not reached expiry and no knockout applies.
    #[error("position not expired")]
    NotExpired,

    /// No settlement price written for the position's expiry boundary.
    #[error("expiry boundary not settled")]
    NotSettled,

    /// Redemption cooldown has not elapsed.
    #[error("redemption cooldown not elapsed")]
    InvalidRedemption,

    // ------------------------------------------------------------------
    // Economic
    // ------------------------------------------------------------------
    /// Collateral at risk exceeds the minter-funded collateral, or the
    /// funding split is otherwise inconsistent.
    #[error("collateral amounts inconsistent")]
    InvalidCollateral,

    /// Maker's token balance is below the threshold demanded by the terms.
    #[error("maker balance below threshold")]
    InvalidBalanceThreshold,

    /// Nothing to mint or burn: zero amount or zero ledger balance.
    #[error("zero amount")]
    ZeroAmount,

    /// Fee accumulator is zero or negative; nothing to harvest.
    #[error("no fee to harvest")]
    ZeroFee,

    /// Withdraw request exceeds the holder's unencumbered share balance.
    #[error("insufficient shares")]
    InsufficientShares,

    /// Claim with no pending redemption slot.
    #[error("no pending redemption")]
    NoPendingRedemption,

    /// Pool's unlocked collateral cannot cover the redemption owed.
    #[error("insufficient collateral to redeem")]
    InsufficientCollateralToRedeem,

    /// Minting would leave less unlocked collateral than pending obligations.
    #[error("not enough collateral left to cover redemptions")]
    NoEnoughCollateralToRedeem,

    /// Collateral transfer failed (insufficient balance or permit mismatch).
    #[error("collateral transfer failed")]
    TransferFailed,

    // ------------------------------------------------------------------
    // Oracle freshness
    // ------------------------------------------------------------------
    /// Price feed has not produced a usable new sample since the last settle.
    #[error("price feed not updated")]
    NotUpdated,

    /// Settlement boundary already has a price written.
    #[error("boundary already settled")]
    AlreadySettled,

    // ------------------------------------------------------------------
    // Numeric
    // ------------------------------------------------------------------
    /// Arithmetic overflow or division by zero.
    #[error("arithmetic overflow")]
    Overflow,

    /// Input exceeds an engine cap (MAX_AMOUNT, MAX_PRICE, MAX_BATCH).
    #[error("input exceeds engine cap")]
    AmountTooLarge,

    // ------------------------------------------------------------------
    // Re-entrancy
    // ------------------------------------------------------------------
    /// Public entry point re-entered while another call is in flight.
    #[error("re-entrant call rejected")]
    Reentrancy,
}

pub type Result<T> = core::result::Result<T, Error>;
