// ============================================================================
// Oracle Adapter
// ============================================================================
//
// One immutable price per settlement boundary. The adapter owns the book
// and the write gating; the feed itself (price production, transport) is a
// collaborator behind `PriceFeed`. A boundary is written at most once, and
// only from a sample that is genuinely new: fresh round id, published at or
// after the boundary, and within price caps.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::constants::MAX_PRICE;
use crate::error::{Error, Result};
use crate::product::latest_boundary;
use crate::strategy::touches;

/// One observation from the external price feed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PriceSample {
    /// Monotonic feed round. A repeat of the last settled round is stale.
    pub round_id: u64,
    /// Price at SCALE.
    pub price: u128,
    /// Unix seconds the feed produced this sample.
    pub published_at: u64,
}

/// External price feed collaborator.
pub trait PriceFeed {
    fn latest(&self) -> Result<PriceSample>;
}

/// Feed double for tests and examples: hand it the sample to serve next.
#[derive(Clone, Copy, Debug)]
pub struct ManualFeed {
    pub sample: PriceSample,
}

impl ManualFeed {
    pub fn new(round_id: u64, price: u128, published_at: u64) -> Self {
        ManualFeed {
            sample: PriceSample {
                round_id,
                price,
                published_at,
            },
        }
    }
}

impl PriceFeed for ManualFeed {
    fn latest(&self) -> Result<PriceSample> {
        Ok(self.sample)
    }
}

/// Settle-once book of boundary prices.
#[derive(Clone, Debug, Default)]
pub struct Oracle {
    book: BTreeMap<u64, u128>,
    last_round: Option<u64>,
}

impl Oracle {
    pub fn new() -> Self {
        Oracle::default()
    }

    /// Write the price for the most recent boundary at or before `now`.
    ///
    /// Fails `AlreadySettled` if that boundary is written, and `NotUpdated`
    /// if the feed has not produced a usable new sample: same round as the
    /// last settle, published before the boundary, zero, or above MAX_PRICE.
    pub fn settle(&mut self, feed: &dyn PriceFeed, now: u64) -> Result<(u64, u128)> {
        let boundary = latest_boundary(now).ok_or(Error::NotUpdated)?;
        if self.book.contains_key(&boundary) {
            return Err(Error::AlreadySettled);
        }
        let sample = feed.latest()?;
        if self.last_round == Some(sample.round_id) {
            return Err(Error::NotUpdated);
        }
        if sample.published_at < boundary {
            warn!(
                target: "strata::oracle",
                round = sample.round_id,
                published_at = sample.published_at,
                boundary,
                "feed sample predates boundary"
            );
            return Err(Error::NotUpdated);
        }
        if sample.price == 0 || sample.price > MAX_PRICE {
            warn!(
                target: "strata::oracle",
                round = sample.round_id,
                price = sample.price,
                "feed sample outside price caps"
            );
            return Err(Error::NotUpdated);
        }
        self.book.insert(boundary, sample.price);
        self.last_round = Some(sample.round_id);
        info!(
            target: "strata::oracle",
            boundary,
            price = sample.price,
            round = sample.round_id,
            "boundary settled"
        );
        Ok((boundary, sample.price))
    }

    /// Settled price for `boundary`, if written.
    pub fn price_at(&self, boundary: u64) -> Option<u128> {
        self.book.get(&boundary).copied()
    }

    pub fn is_settled(&self, boundary: u64) -> bool {
        self.book.contains_key(&boundary)
    }

    /// Earliest settled boundary at or before `through` whose price touches
    /// the band `[k1, k2]`. Drives knockout detection: boundaries that were
    /// never settled contribute no observation.
    pub fn first_touch(&self, k1: u128, k2: u128, through: u64) -> Option<(u64, u128)> {
        self.book
            .range(..=through)
            .find(|(_, &price)| touches(price, k1, k2))
            .map(|(&boundary, &price)| (boundary, price))
    }

    /// Number of settled boundaries.
    pub fn settled_count(&self) -> usize {
        self.book.len()
    }
}
