// 4.1 oracle.rs: asset -> feed registry with freshness windows.
// pure read-through to the feeds. nothing is cached between calls.

use std::collections::HashMap;
use std::sync::Arc;

use crate::access::{AccessError, Action, CallContext};
use crate::math::{FixedPoint, MathError};
use crate::price_feed::PriceFeed;
use crate::types::{AssetId, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("no price aggregator registered for {0}")]
    NotExistPriceAggregator(AssetId),

    #[error("price feed for {0} reports zero")]
    PriceNotAllowZero(AssetId),

    #[error("price feed for {asset} last updated at {updated_at}, stale at {now} (time frame {time_frame}s)")]
    NotUpdatedPriceFeed {
        asset: AssetId,
        updated_at: Timestamp,
        now: Timestamp,
        time_frame: u64,
    },

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("math error: {0}")]
    Math(#[from] MathError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetPrice {
    pub price: FixedPoint,
    pub last_update: Timestamp,
}

/** 4.1.1: registry. time frame 0 disables the staleness check */
#[derive(Debug, Clone, Default)]
pub struct PriceOracle {
    feeds: HashMap<AssetId, Arc<dyn PriceFeed>>,
    time_frames: HashMap<AssetId, u64>,
}

impl PriceOracle {
    pub fn new() -> Self {
        Self::default()
    }

    // re-registering replaces the previous feed
    pub fn set_price_aggregator(
        &mut self,
        ctx: &CallContext,
        asset: AssetId,
        feed: Arc<dyn PriceFeed>,
    ) -> Result<(), OracleError> {
        ctx.require(Action::SetPriceAggregator)?;
        if feed.latest_round().answer == 0 {
            return Err(OracleError::PriceNotAllowZero(asset));
        }
        tracing::info!(%asset, feed = feed.description(), "price aggregator set");
        self.feeds.insert(asset, feed);
        Ok(())
    }

    pub fn set_asset_time_frame(&mut self, ctx: &CallContext, asset: AssetId, seconds: u64) -> Result<(), OracleError> {
        ctx.require(Action::SetAssetTimeFrame)?;
        self.time_frames.insert(asset, seconds);
        Ok(())
    }

    pub fn has_price_aggregator(&self, asset: AssetId) -> bool {
        self.feeds.contains_key(&asset)
    }

    pub fn query_price_aggregator(&self, asset: AssetId) -> Result<Arc<dyn PriceFeed>, OracleError> {
        self.feeds
            .get(&asset)
            .cloned()
            .ok_or(OracleError::NotExistPriceAggregator(asset))
    }

    pub fn time_frame(&self, asset: AssetId) -> u64 {
        self.time_frames.get(&asset).copied().unwrap_or(0)
    }

    pub fn query_asset_price(&self, asset: AssetId, now: Timestamp) -> Result<AssetPrice, OracleError> {
        let feed = self.feeds.get(&asset).ok_or(OracleError::NotExistPriceAggregator(asset))?;
        let round = feed.latest_round();
        if round.answer == 0 {
            return Err(OracleError::PriceNotAllowZero(asset));
        }

        let time_frame = self.time_frame(asset);
        if time_frame > 0 && now.since(round.updated_at) > time_frame {
            return Err(OracleError::NotUpdatedPriceFeed {
                asset,
                updated_at: round.updated_at,
                now,
                time_frame,
            });
        }

        Ok(AssetPrice {
            price: round.price()?,
            last_update: round.updated_at,
        })
    }
}
