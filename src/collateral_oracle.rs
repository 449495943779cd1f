// 4.2 collateral_oracle.rs: collateral registry on top of the price oracle.
// multiplier scales effective value (1000 = 100%). a non-zero end price freezes the
// collateral at a settlement price that never goes stale.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::access::{AccessError, Action, CallContext};
use crate::math::{FixedPoint, MathError};
use crate::oracle::{OracleError, PriceOracle};
use crate::types::{AssetId, Permille, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollateralOracleError {
    #[error("collateral {0} already registered")]
    ExistCollateral(AssetId),

    #[error("collateral {0} is not registered")]
    NotExistCollateral(AssetId),

    #[error("multiplier {multiplier} below minimum {minimum}")]
    InvalidMultiplier { multiplier: Permille, minimum: Permille },

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Access(#[from] AccessError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralInfo {
    pub multiplier: Permille,
    // zero = live oracle price
    pub end_price: FixedPoint,
    pub is_revoked: bool,
    pub is_suspended: bool,
}

impl CollateralInfo {
    pub fn is_available(&self) -> bool {
        !self.is_revoked && !self.is_suspended
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollateralPrice {
    pub price: FixedPoint,
    pub last_update: Timestamp,
    pub multiplier: Permille,
    pub is_revoked: bool,
}

impl CollateralPrice {
    /// amount * price * multiplier
    pub fn value_of(&self, amount: FixedPoint) -> Result<FixedPoint, MathError> {
        amount.mul(self.price)?.mul_permille(self.multiplier)
    }
}

#[derive(Debug, Clone)]
pub struct CollateralOracle {
    collaterals: HashMap<AssetId, CollateralInfo>,
    order: Vec<AssetId>,
    min_multiplier: Permille,
}

impl CollateralOracle {
    pub fn new(min_multiplier: Permille) -> Self {
        Self {
            collaterals: HashMap::new(),
            order: Vec::new(),
            min_multiplier,
        }
    }

    pub fn register_collateral(
        &mut self,
        ctx: &CallContext,
        oracle: &PriceOracle,
        asset: AssetId,
        multiplier: Permille,
    ) -> Result<(), CollateralOracleError> {
        ctx.require(Action::RegisterCollateral)?;
        if self.collaterals.contains_key(&asset) {
            return Err(CollateralOracleError::ExistCollateral(asset));
        }
        self.check_multiplier(multiplier)?;
        if !oracle.has_price_aggregator(asset) {
            return Err(OracleError::NotExistPriceAggregator(asset).into());
        }

        self.collaterals.insert(
            asset,
            CollateralInfo {
                multiplier,
                end_price: FixedPoint::ZERO,
                is_revoked: false,
                is_suspended: false,
            },
        );
        self.order.push(asset);
        tracing::info!(%asset, %multiplier, "collateral registered");
        Ok(())
    }

    // flag toggles leave unregistered assets untouched
    pub fn revoke_collateral(&mut self, ctx: &CallContext, asset: AssetId) -> Result<(), CollateralOracleError> {
        ctx.require(Action::RevokeCollateral)?;
        if let Some(info) = self.collaterals.get_mut(&asset) {
            info.is_revoked = true;
            tracing::info!(%asset, "collateral revoked");
        }
        Ok(())
    }

    pub fn suspend_collateral(&mut self, ctx: &CallContext, asset: AssetId) -> Result<(), CollateralOracleError> {
        ctx.require(Action::SuspendCollateral)?;
        if let Some(info) = self.collaterals.get_mut(&asset) {
            info.is_suspended = true;
        }
        Ok(())
    }

    pub fn unsuspend_collateral(&mut self, ctx: &CallContext, asset: AssetId) -> Result<(), CollateralOracleError> {
        ctx.require(Action::SuspendCollateral)?;
        if let Some(info) = self.collaterals.get_mut(&asset) {
            info.is_suspended = false;
        }
        Ok(())
    }

    pub fn update_collateral_end_price(
        &mut self,
        ctx: &CallContext,
        asset: AssetId,
        price: FixedPoint,
    ) -> Result<(), CollateralOracleError> {
        ctx.require(Action::UpdateCollateralEndPrice)?;
        self.info_mut(asset)?.end_price = price;
        Ok(())
    }

    pub fn update_collateral_multiplier(
        &mut self,
        ctx: &CallContext,
        asset: AssetId,
        multiplier: Permille,
    ) -> Result<(), CollateralOracleError> {
        ctx.require(Action::UpdateCollateralMultiplier)?;
        self.check_multiplier(multiplier)?;
        self.info_mut(asset)?.multiplier = multiplier;
        Ok(())
    }

    pub fn collateral_info(&self, asset: AssetId) -> Option<&CollateralInfo> {
        self.collaterals.get(&asset)
    }

    /// Every registered collateral, in registration order.
    pub fn collateral_infos(&self) -> Vec<(AssetId, &CollateralInfo)> {
        self.order
            .iter()
            .filter_map(|asset| self.collaterals.get(asset).map(|info| (*asset, info)))
            .collect()
    }

    pub fn query_collateral_price(
        &self,
        oracle: &PriceOracle,
        asset: AssetId,
        now: Timestamp,
    ) -> Result<CollateralPrice, CollateralOracleError> {
        let info = self
            .collaterals
            .get(&asset)
            .ok_or(CollateralOracleError::NotExistCollateral(asset))?;

        let (price, last_update) = if info.end_price.is_zero() {
            let quote = oracle.query_asset_price(asset, now)?;
            (quote.price, quote.last_update)
        } else {
            (info.end_price, Timestamp::NEVER_STALE)
        };

        Ok(CollateralPrice {
            price,
            last_update,
            multiplier: info.multiplier,
            is_revoked: info.is_revoked,
        })
    }

    fn check_multiplier(&self, multiplier: Permille) -> Result<(), CollateralOracleError> {
        if multiplier < self.min_multiplier {
            return Err(CollateralOracleError::InvalidMultiplier {
                multiplier,
                minimum: self.min_multiplier,
            });
        }
        Ok(())
    }

    fn info_mut(&mut self, asset: AssetId) -> Result<&mut CollateralInfo, CollateralOracleError> {
        self.collaterals
            .get_mut(&asset)
            .ok_or(CollateralOracleError::NotExistCollateral(asset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{AccessControl, Role};
    use crate::price_feed::MockPriceFeed;
    use crate::types::AccountId;
    use std::sync::Arc;

    const OWNER: AccountId = AccountId(1);
    const DAI: AssetId = AssetId(1);
    const USDC: AssetId = AssetId(2);
    const NOW: Timestamp = Timestamp(1_700_000_000);

    fn setup() -> (CallContext, PriceOracle, CollateralOracle) {
        let mut acl = AccessControl::new();
        acl.grant(OWNER, Role::Owner);
        let ctx = acl.context(OWNER, NOW);
        let mut oracle = PriceOracle::new();
        oracle
            .set_price_aggregator(&ctx, DAI, Arc::new(MockPriceFeed::from_units("DAI", 1, NOW)))
            .unwrap();
        (ctx, oracle, CollateralOracle::new(Permille::ONE))
    }

    #[test]
    fn register_and_query() {
        let (ctx, oracle, mut collateral) = setup();
        collateral.register_collateral(&ctx, &oracle, DAI, Permille::new(1000)).unwrap();

        let quote = collateral.query_collateral_price(&oracle, DAI, NOW).unwrap();
        assert_eq!(quote.price, FixedPoint::ONE);
        assert_eq!(quote.last_update, NOW);
        assert!(!quote.is_revoked);
        assert_eq!(quote.value_of(FixedPoint::from_uint(1000)).unwrap(), FixedPoint::from_uint(1000));
    }

    #[test]
    fn registration_errors() {
        let (ctx, oracle, mut collateral) = setup();
        assert_eq!(
            collateral.register_collateral(&ctx, &oracle, DAI, Permille::new(999)),
            Err(CollateralOracleError::InvalidMultiplier {
                multiplier: Permille::new(999),
                minimum: Permille::ONE,
            })
        );
        assert_eq!(
            collateral.register_collateral(&ctx, &oracle, USDC, Permille::ONE),
            Err(CollateralOracleError::Oracle(OracleError::NotExistPriceAggregator(USDC)))
        );
        collateral.register_collateral(&ctx, &oracle, DAI, Permille::ONE).unwrap();
        assert_eq!(
            collateral.register_collateral(&ctx, &oracle, DAI, Permille::ONE),
            Err(CollateralOracleError::ExistCollateral(DAI))
        );
    }

    #[test]
    fn end_price_never_goes_stale() {
        let (ctx, oracle, mut collateral) = setup();
        collateral.register_collateral(&ctx, &oracle, DAI, Permille::ONE).unwrap();
        collateral
            .update_collateral_end_price(&ctx, DAI, FixedPoint::from_uint(2))
            .unwrap();

        let quote = collateral.query_collateral_price(&oracle, DAI, NOW).unwrap();
        assert_eq!(quote.price, FixedPoint::from_uint(2));
        assert_eq!(quote.last_update, Timestamp::NEVER_STALE);
    }

    #[test]
    fn flags_skip_unregistered_collateral() {
        let (ctx, oracle, mut collateral) = setup();
        collateral.revoke_collateral(&ctx, USDC).unwrap();
        collateral.suspend_collateral(&ctx, USDC).unwrap();
        collateral.unsuspend_collateral(&ctx, USDC).unwrap();
        assert!(collateral.collateral_info(USDC).is_none());
        assert!(collateral.collateral_infos().is_empty());
        assert_eq!(
            collateral.query_collateral_price(&oracle, USDC, NOW),
            Err(CollateralOracleError::NotExistCollateral(USDC))
        );
        assert_eq!(
            collateral.update_collateral_end_price(&ctx, USDC, FixedPoint::ONE),
            Err(CollateralOracleError::NotExistCollateral(USDC))
        );

        collateral.register_collateral(&ctx, &oracle, DAI, Permille::ONE).unwrap();
        collateral.revoke_collateral(&ctx, DAI).unwrap();
        collateral.revoke_collateral(&ctx, DAI).unwrap();
        collateral.suspend_collateral(&ctx, DAI).unwrap();
        let info = collateral.collateral_info(DAI).unwrap();
        assert!(info.is_revoked && info.is_suspended);
        assert!(!info.is_available());

        collateral.unsuspend_collateral(&ctx, DAI).unwrap();
        collateral.update_collateral_multiplier(&ctx, DAI, Permille::new(1200)).unwrap();
        let info = collateral.collateral_info(DAI).unwrap();
        assert!(!info.is_suspended);
        assert_eq!(info.multiplier, Permille::new(1200));
        assert!(collateral.query_collateral_price(&oracle, DAI, NOW).unwrap().is_revoked);
    }

    #[test]
    fn infos_list_in_registration_order() {
        let (ctx, mut oracle, mut collateral) = setup();
        oracle
            .set_price_aggregator(&ctx, USDC, Arc::new(MockPriceFeed::from_units("USDC", 1, NOW)))
            .unwrap();
        collateral.register_collateral(&ctx, &oracle, USDC, Permille::ONE).unwrap();
        collateral.register_collateral(&ctx, &oracle, DAI, Permille::new(1200)).unwrap();
        collateral
            .update_collateral_end_price(&ctx, USDC, FixedPoint::from_uint(100))
            .unwrap();

        let infos = collateral.collateral_infos();
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].0, USDC);
        assert_eq!(infos[0].1.end_price, FixedPoint::from_uint(100));
        assert_eq!(infos[1].0, DAI);
        assert_eq!(infos[1].1.multiplier, Permille::new(1200));
        assert!(infos[1].1.end_price.is_zero());
    }
}
