//! Strata: a deterministic settlement engine for peer-negotiated
//! structured positions, with a pooled-capital share layer on top.
//!
//! The vault engine issues complementary minter/maker position pairs
//! against signed terms and gates their payoffs on per-day oracle
//! settlements; atomic burns destroy positions at expiry. The pool layer
//! aggregates depositor collateral behind a single share quote and drives
//! mints and burns across many vaults on the depositors' behalf.
//!
//! Key invariants:
//! - Position identity is a deterministic hash of its economic terms; all
//!   payoff economics are recomputed at burn from those terms plus the
//!   settlement price, never stored.
//! - Burning a pair conserves value: minter payoff + maker payoff +
//!   settlement fee equals the amount minted to each side.
//! - Every public operation is call-atomic: it either commits completely
//!   or leaves no trace, including batched operations.
//! - Maker quotes and pull permits are domain-bound to one vault and
//!   single-use; replay fails regardless of caller.
//! - The pool share quote moves only through mints (fee deduction), burns
//!   (signed result net of skim) and harvests, never through deposits or
//!   redemptions at the current quote.
//! - Losses skimmed into the pool fee accumulator carry forward; harvest
//!   fails until subsequent gains pull it back above zero.
//!
//! The crate is pure state-machine logic: no clocks, no I/O, no external
//! calls beyond the collateral-token and price-feed traits supplied by the
//! host. Time enters exclusively through explicit `now` parameters.

#![forbid(unsafe_code)]

pub mod auth;
pub mod automator;
pub mod collateral;
pub mod constants;
pub mod error;
pub mod factory;
pub mod fixed;
pub mod ledger;
pub mod oracle;
pub mod product;
pub mod strategy;
pub mod types;
pub mod vault;

pub use auth::PullPermit;
pub use automator::{
    Automator, AutomatorParams, BurnProductItem, MintProductItem, PendingRedemption,
};
pub use collateral::{CollateralToken, MockToken};
pub use constants::{DUST_SHARES, MAX_AMOUNT, MAX_BATCH, MAX_PRICE, SCALE, SHARE_MULTIPLIER_REBASE};
pub use error::{Error, Result};
pub use factory::Factory;
pub use ledger::PositionLedger;
pub use oracle::{ManualFeed, Oracle, PriceFeed, PriceSample};
pub use product::{is_boundary_aligned, latest_boundary, MintTerms, ProductTerms};
pub use strategy::{Payoff, Strategy};
pub use types::{
    Address, Anchors, BatchBurnReceipt, BurnProductsReceipt, BurnReceipt, MintProductsReceipt,
    MintReceipt, ProductId, Side,
};
pub use vault::{Vault, VaultDirectory, VaultParams};
