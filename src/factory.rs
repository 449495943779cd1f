// 9.0 factory.rs: synthetic asset registry, reward weights and emission schedules.
// the factory is the only minter of synthetic assets. lending mints and burns through it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::access::{AccessError, Action, CallContext};
use crate::dex::Dex;
use crate::lending::{Lending, LendingError};
use crate::math::{FixedPoint, MathError};
use crate::oracle::{OracleError, PriceOracle};
use crate::staking::{Staking, StakingError};
use crate::token::{TokenError, TokenLedger};
use crate::types::{AccountId, AssetId, Permille, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FactoryError {
    #[error("enable parameters invalid: weight must be non-zero")]
    InvalidEnableAssetParameters,

    #[error("asset {0} was not created by the factory")]
    AssetNotDeployedByFactory(AssetId),

    #[error("asset {0} already enabled")]
    ExistAsset(AssetId),

    #[error("no dex pool for {0}")]
    NotExistPool(AssetId),

    #[error("asset {0} is not available")]
    AssetNotAvailable(AssetId),

    #[error("asset {0} was never enabled")]
    NotExistAsset(AssetId),

    #[error("schedule amount must be non-zero")]
    AmountNotAllowZero,

    #[error("invalid schedule [{start}, {end}]")]
    InvalidSchedule { start: Timestamp, end: Timestamp },

    #[error("total weight is zero")]
    NotAllowZero,

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Lending(#[from] LendingError),

    #[error(transparent)]
    Staking(#[from] StakingError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("math error: {0}")]
    Math(#[from] MathError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
    pub weight: u32,
    pub is_revoked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionSchedule {
    pub start: Timestamp,
    pub end: Timestamp,
    pub amount: FixedPoint,
}

impl DistributionSchedule {
    /// portion of `amount` released over [from, to]
    fn emitted_between(&self, from: Timestamp, to: Timestamp) -> Result<FixedPoint, MathError> {
        let lo = from.max(self.start);
        let hi = to.min(self.end);
        if hi <= lo {
            return Ok(FixedPoint::ZERO);
        }
        self.amount.mul_div(hi.since(lo), self.end.since(self.start))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetDistribution {
    pub asset: AssetId,
    pub short_reward: FixedPoint,
    pub treasury_reward: FixedPoint,
}

/// What one `distribute` call paid out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionPlan {
    pub emitted: FixedPoint,
    pub short_total: FixedPoint,
    pub treasury_total: FixedPoint,
    pub per_asset: Vec<AssetDistribution>,
}

#[derive(Debug, Clone)]
pub struct Factory {
    account: AccountId,
    reward_token: AssetId,
    treasury: AccountId,
    deployed: BTreeSet<AssetId>,
    assets: BTreeMap<AssetId, AssetInfo>,
    total_weight: u64,
    schedules: Vec<DistributionSchedule>,
    last_distributed: Timestamp,
}

impl Factory {
    pub fn new(account: AccountId, reward_token: AssetId, treasury: AccountId) -> Self {
        Self {
            account,
            reward_token,
            treasury,
            deployed: BTreeSet::new(),
            assets: BTreeMap::new(),
            total_weight: 0,
            schedules: Vec::new(),
            last_distributed: Timestamp::from_secs(0),
        }
    }

    pub fn account(&self) -> AccountId {
        self.account
    }

    pub fn reward_token(&self) -> AssetId {
        self.reward_token
    }

    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    pub fn last_distributed(&self) -> Timestamp {
        self.last_distributed
    }

    pub fn schedules(&self) -> &[DistributionSchedule] {
        &self.schedules
    }

    pub fn asset_info(&self, asset: AssetId) -> Option<&AssetInfo> {
        self.assets.get(&asset)
    }

    pub fn is_deployed(&self, asset: AssetId) -> bool {
        self.deployed.contains(&asset)
    }

    pub fn create_asset(&mut self, ctx: &CallContext, tokens: &mut TokenLedger, symbol: &str) -> Result<AssetId, FactoryError> {
        ctx.require(Action::CreateAsset)?;
        let asset = tokens.create_token(symbol, self.account);
        self.deployed.insert(asset);
        tracing::info!(%asset, symbol, "synthetic asset created");
        Ok(asset)
    }

    /// `as_factory` is this factory's own context, used for the lending and staking registrations.
    #[allow(clippy::too_many_arguments)]
    pub fn enable_asset(
        &mut self,
        ctx: &CallContext,
        as_factory: &CallContext,
        oracle: &PriceOracle,
        dex: &dyn Dex,
        lending: &mut Lending,
        staking: &mut Staking,
        asset: AssetId,
        weight: u32,
        liquidation_discount: Permille,
        min_collateral_ratio: Permille,
    ) -> Result<(), FactoryError> {
        ctx.require(Action::EnableAsset)?;
        if weight == 0 {
            return Err(FactoryError::InvalidEnableAssetParameters);
        }
        if !self.deployed.contains(&asset) {
            return Err(FactoryError::AssetNotDeployedByFactory(asset));
        }
        if self.assets.contains_key(&asset) {
            return Err(FactoryError::ExistAsset(asset));
        }
        oracle.query_price_aggregator(asset)?;
        if !dex.has_pool(asset) {
            return Err(FactoryError::NotExistPool(asset));
        }

        lending.register_asset(as_factory, asset, liquidation_discount, min_collateral_ratio)?;
        staking.register_pool_info(as_factory, asset)?;

        self.assets.insert(asset, AssetInfo { weight, is_revoked: false });
        self.total_weight += u64::from(weight);
        tracing::info!(%asset, weight, total_weight = self.total_weight, "asset enabled");
        Ok(())
    }

    pub fn update_weight(&mut self, ctx: &CallContext, asset: AssetId, weight: u32) -> Result<(), FactoryError> {
        ctx.require(Action::UpdateWeight)?;
        let info = self.live_asset_mut(asset)?;
        let previous = u64::from(info.weight);
        info.weight = weight;
        self.total_weight = self.total_weight - previous + u64::from(weight);
        Ok(())
    }

    /// Stops the asset at the current oracle price. Positions migrate out at that price.
    pub fn revoke_asset(
        &mut self,
        ctx: &CallContext,
        as_factory: &CallContext,
        oracle: &PriceOracle,
        lending: &mut Lending,
        asset: AssetId,
    ) -> Result<FixedPoint, FactoryError> {
        ctx.require(Action::RevokeAsset)?;
        let end_price = oracle.query_asset_price(asset, ctx.now)?.price;
        let info = self.live_asset_mut(asset)?;
        let previous = u64::from(info.weight);
        info.weight = 0;
        info.is_revoked = true;
        self.total_weight -= previous;

        lending.register_revoke(as_factory, asset, end_price)?;
        Ok(end_price)
    }

    pub fn update_distribution_schedule(
        &mut self,
        ctx: &CallContext,
        schedules: Vec<DistributionSchedule>,
    ) -> Result<(), FactoryError> {
        ctx.require(Action::UpdateDistributionSchedule)?;
        for schedule in &schedules {
            if schedule.amount.is_zero() {
                return Err(FactoryError::AmountNotAllowZero);
            }
            if schedule.end <= schedule.start || schedule.end < ctx.now {
                return Err(FactoryError::InvalidSchedule {
                    start: schedule.start,
                    end: schedule.end,
                });
            }
        }
        self.schedules = schedules;
        Ok(())
    }

    pub fn mint_asset(
        &self,
        ctx: &CallContext,
        tokens: &mut TokenLedger,
        asset: AssetId,
        to: AccountId,
        amount: FixedPoint,
    ) -> Result<(), FactoryError> {
        ctx.require(Action::MintAsset)?;
        match self.assets.get(&asset) {
            Some(info) if !info.is_revoked => {}
            _ => return Err(FactoryError::AssetNotAvailable(asset)),
        }
        tokens.mint(asset, self.account, to, amount)?;
        Ok(())
    }

    // revoked assets can still be burned, positions need that to migrate out
    pub fn burn_asset(
        &self,
        ctx: &CallContext,
        tokens: &mut TokenLedger,
        asset: AssetId,
        from: AccountId,
        amount: FixedPoint,
    ) -> Result<(), FactoryError> {
        ctx.require(Action::BurnAsset)?;
        if !self.assets.contains_key(&asset) {
            return Err(FactoryError::NotExistAsset(asset));
        }
        tokens.burn(asset, self.account, from, amount)?;
        Ok(())
    }

    /// Releases scheduled rewards since the last call. The caller's reward balance funds
    /// the short pools (weighted by premium) and the treasury (the rest).
    pub fn distribute(
        &mut self,
        ctx: &CallContext,
        as_factory: &CallContext,
        tokens: &mut TokenLedger,
        staking: &mut Staking,
    ) -> Result<DistributionPlan, FactoryError> {
        ctx.require(Action::Distribute)?;
        if self.total_weight == 0 {
            return Err(FactoryError::NotAllowZero);
        }

        let mut emitted = FixedPoint::ZERO;
        for schedule in &self.schedules {
            emitted = emitted.add(schedule.emitted_between(self.last_distributed, ctx.now)?)?;
        }

        let mut plan = DistributionPlan {
            emitted,
            short_total: FixedPoint::ZERO,
            treasury_total: FixedPoint::ZERO,
            per_asset: Vec::new(),
        };
        for (&asset, info) in &self.assets {
            if info.weight == 0 {
                continue;
            }
            let share = emitted.mul_div(u64::from(info.weight), self.total_weight)?;
            let weight = staking
                .pool_info(asset)
                .map(|pool| pool.short_reward_weight)
                .unwrap_or_default();
            let short_reward = share.mul(weight)?;
            let treasury_reward = share.sub(short_reward)?;

            plan.short_total = plan.short_total.add(short_reward)?;
            plan.treasury_total = plan.treasury_total.add(treasury_reward)?;
            plan.per_asset.push(AssetDistribution {
                asset,
                short_reward,
                treasury_reward,
            });
        }

        tokens.transfer(self.reward_token, ctx.caller, staking.account(), plan.short_total)?;
        tokens.transfer(self.reward_token, ctx.caller, self.treasury, plan.treasury_total)?;

        let deposits: Vec<(AssetId, FixedPoint)> = plan.per_asset.iter().map(|d| (d.asset, d.short_reward)).collect();
        staking.deposit_reward(as_factory, &deposits)?;

        self.last_distributed = ctx.now;
        Ok(plan)
    }

    fn live_asset_mut(&mut self, asset: AssetId) -> Result<&mut AssetInfo, FactoryError> {
        match self.assets.get_mut(&asset) {
            Some(info) if !info.is_revoked => Ok(info),
            _ => Err(FactoryError::AssetNotAvailable(asset)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{AccessControl, Role};
    use crate::dex::MockDex;
    use crate::lending::LendingParams;
    use crate::price_feed::MockPriceFeed;
    use std::sync::Arc;

    const OWNER: AccountId = AccountId(1);
    const TREASURY: AccountId = AccountId(2);
    const LENDING: AccountId = AccountId(3);
    const STAKING: AccountId = AccountId(4);
    const FACTORY: AccountId = AccountId(5);
    const DISTRIBUTOR: AccountId = AccountId(6);
    const ROUTER: AccountId = AccountId(7);
    const NOW: Timestamp = Timestamp(1_700_000_000);

    fn units(n: u128) -> FixedPoint {
        FixedPoint::from_uint(n)
    }

    struct Fixture {
        acl: AccessControl,
        tokens: TokenLedger,
        oracle: PriceOracle,
        dex: MockDex,
        lending: Lending,
        staking: Staking,
        factory: Factory,
        reward: AssetId,
    }

    impl Fixture {
        fn new() -> Self {
            let mut acl = AccessControl::new();
            acl.grant(OWNER, Role::Owner);
            acl.grant(FACTORY, Role::Factory);
            acl.grant(LENDING, Role::Lending);
            acl.grant(DISTRIBUTOR, Role::RewardDistributor);

            let mut tokens = TokenLedger::new();
            let reward = tokens.create_token("RWD", OWNER);
            let params = LendingParams {
                max_protocol_fee: Permille(100),
                max_liquidation_discount: Permille(500),
                min_collateral_ratio_lower: Permille(1200),
                min_collateral_ratio_upper: Permille(1900),
            };
            Self {
                acl,
                tokens,
                oracle: PriceOracle::new(),
                dex: MockDex::new(ROUTER),
                lending: Lending::new(LENDING, params, Permille(15), TREASURY),
                staking: Staking::new(STAKING, reward, 3600),
                factory: Factory::new(FACTORY, reward, TREASURY),
                reward,
            }
        }

        fn owner(&self) -> CallContext {
            self.acl.context(OWNER, NOW)
        }

        fn as_factory(&self) -> CallContext {
            self.acl.context(FACTORY, NOW)
        }

        fn deploy(&mut self, symbol: &str, price: u64) -> AssetId {
            let owner = self.owner();
            let asset = self.factory.create_asset(&owner, &mut self.tokens, symbol).unwrap();
            self.oracle
                .set_price_aggregator(&owner, asset, Arc::new(MockPriceFeed::from_units(symbol, price, NOW)))
                .unwrap();
            self.dex.set_pool_price(asset, units(u128::from(price)));
            asset
        }

        fn enable(&mut self, asset: AssetId, weight: u32) -> Result<(), FactoryError> {
            let (owner, as_factory) = (self.owner(), self.as_factory());
            self.factory.enable_asset(
                &owner,
                &as_factory,
                &self.oracle,
                &self.dex,
                &mut self.lending,
                &mut self.staking,
                asset,
                weight,
                Permille(200),
                Permille(1500),
            )
        }
    }

    #[test]
    fn enable_checks_in_order() {
        let mut fx = Fixture::new();
        let zat = fx.deploy("ZAT", 100);

        assert_eq!(fx.enable(zat, 0), Err(FactoryError::InvalidEnableAssetParameters));
        assert_eq!(fx.enable(fx.reward, 1), Err(FactoryError::AssetNotDeployedByFactory(fx.reward)));

        let owner = fx.owner();
        let bare = fx.factory.create_asset(&owner, &mut fx.tokens, "BARE").unwrap();
        assert_eq!(
            fx.enable(bare, 1),
            Err(FactoryError::Oracle(OracleError::NotExistPriceAggregator(bare)))
        );
        fx.oracle
            .set_price_aggregator(&owner, bare, Arc::new(MockPriceFeed::from_units("BARE", 5, NOW)))
            .unwrap();
        assert_eq!(fx.enable(bare, 1), Err(FactoryError::NotExistPool(bare)));

        fx.enable(zat, 2).unwrap();
        assert_eq!(fx.enable(zat, 2), Err(FactoryError::ExistAsset(zat)));
        assert_eq!(fx.factory.total_weight(), 2);
        assert!(fx.lending.asset_config(zat).is_ok());
        assert!(fx.staking.has_pool(zat));
    }

    #[test]
    fn weights_and_revoke() {
        let mut fx = Fixture::new();
        let zat = fx.deploy("ZAT", 100);
        let zbt = fx.deploy("ZBT", 50);
        fx.enable(zat, 2).unwrap();
        fx.enable(zbt, 3).unwrap();

        let owner = fx.owner();
        fx.factory.update_weight(&owner, zat, 5).unwrap();
        assert_eq!(fx.factory.total_weight(), 8);

        let as_factory = fx.as_factory();
        let end_price = fx
            .factory
            .revoke_asset(&owner, &as_factory, &fx.oracle, &mut fx.lending, zat)
            .unwrap();
        assert_eq!(end_price, units(100));
        assert_eq!(fx.factory.total_weight(), 3);
        assert!(fx.lending.asset_config(zat).unwrap().is_migrating());

        assert_eq!(fx.factory.update_weight(&owner, zat, 1), Err(FactoryError::AssetNotAvailable(zat)));
        assert_eq!(
            fx.factory.revoke_asset(&owner, &as_factory, &fx.oracle, &mut fx.lending, zat),
            Err(FactoryError::AssetNotAvailable(zat))
        );
    }

    #[test]
    fn mint_requires_live_asset() {
        let mut fx = Fixture::new();
        let zat = fx.deploy("ZAT", 100);
        let lending = fx.acl.context(LENDING, NOW);

        assert_eq!(
            fx.factory.mint_asset(&lending, &mut fx.tokens, zat, OWNER, units(1)),
            Err(FactoryError::AssetNotAvailable(zat))
        );
        fx.enable(zat, 1).unwrap();
        fx.factory.mint_asset(&lending, &mut fx.tokens, zat, OWNER, units(3)).unwrap();
        assert!(matches!(
            fx.factory.mint_asset(&fx.owner(), &mut fx.tokens, zat, OWNER, units(1)),
            Err(FactoryError::Access(_))
        ));

        let (owner, as_factory) = (fx.owner(), fx.as_factory());
        fx.factory
            .revoke_asset(&owner, &as_factory, &fx.oracle, &mut fx.lending, zat)
            .unwrap();
        assert_eq!(
            fx.factory.mint_asset(&lending, &mut fx.tokens, zat, OWNER, units(1)),
            Err(FactoryError::AssetNotAvailable(zat))
        );
        fx.factory.burn_asset(&lending, &mut fx.tokens, zat, OWNER, units(3)).unwrap();
        assert_eq!(fx.tokens.balance_of(zat, OWNER), FixedPoint::ZERO);
    }

    #[test]
    fn burn_rejects_assets_never_enabled() {
        let mut fx = Fixture::new();
        let zat = fx.deploy("ZAT", 100);
        let lending = fx.acl.context(LENDING, NOW);
        let reward = fx.reward;

        assert_eq!(
            fx.factory.burn_asset(&lending, &mut fx.tokens, zat, OWNER, units(1)),
            Err(FactoryError::NotExistAsset(zat))
        );
        assert_eq!(
            fx.factory.burn_asset(&lending, &mut fx.tokens, reward, OWNER, units(1)),
            Err(FactoryError::NotExistAsset(reward))
        );
    }

    #[test]
    fn schedule_validation() {
        let mut fx = Fixture::new();
        let owner = fx.owner();
        let schedule = |start: u64, end: u64, amount: u128| DistributionSchedule {
            start: Timestamp(start),
            end: Timestamp(end),
            amount: units(amount),
        };

        assert_eq!(
            fx.factory.update_distribution_schedule(&owner, vec![schedule(NOW.0, NOW.0 + 10, 0)]),
            Err(FactoryError::AmountNotAllowZero)
        );
        assert!(matches!(
            fx.factory.update_distribution_schedule(&owner, vec![schedule(NOW.0, NOW.0, 10)]),
            Err(FactoryError::InvalidSchedule { .. })
        ));
        assert!(matches!(
            fx.factory.update_distribution_schedule(&owner, vec![schedule(NOW.0 - 20, NOW.0 - 10, 10)]),
            Err(FactoryError::InvalidSchedule { .. })
        ));
        fx.factory
            .update_distribution_schedule(&owner, vec![schedule(NOW.0 - 10, NOW.0 + 10, 10)])
            .unwrap();
        assert_eq!(fx.factory.schedules().len(), 1);
    }

    #[test]
    fn distribute_splits_by_weight_and_premium() {
        let mut fx = Fixture::new();
        let zat = fx.deploy("ZAT", 100);
        let zbt = fx.deploy("ZBT", 50);
        fx.enable(zat, 1).unwrap();
        fx.enable(zbt, 3).unwrap();

        // zat trades at a 2% premium: half its share goes to shorts
        fx.dex.set_pool_price(zat, units(102));
        let keeper = fx.acl.context(TREASURY, NOW);
        fx.staking.adjust_premium(&keeper, &fx.oracle, &fx.dex, &[zat]).unwrap();

        let owner = fx.owner();
        fx.factory
            .update_distribution_schedule(
                &owner,
                vec![DistributionSchedule {
                    start: NOW,
                    end: NOW.plus(100),
                    amount: units(8000),
                }],
            )
            .unwrap();
        fx.tokens.mint(fx.reward, OWNER, DISTRIBUTOR, units(8000)).unwrap();

        // half the window has elapsed
        let at = fx.acl.context(DISTRIBUTOR, NOW.plus(50));
        let as_factory = fx.as_factory();
        let plan = fx
            .factory
            .distribute(&at, &as_factory, &mut fx.tokens, &mut fx.staking)
            .unwrap();
        assert_eq!(plan.emitted, units(4000));
        assert_eq!(plan.per_asset[0].short_reward, units(500));
        assert_eq!(plan.per_asset[0].treasury_reward, units(500));
        assert_eq!(plan.per_asset[1].treasury_reward, units(3000));
        assert_eq!(fx.tokens.balance_of(fx.reward, STAKING), units(500));
        assert_eq!(fx.tokens.balance_of(fx.reward, TREASURY), units(3500));
        assert_eq!(fx.staking.pool_info(zat).unwrap().short_pending_reward, units(500));
        assert_eq!(fx.factory.last_distributed(), NOW.plus(50));

        // past the end only the remainder is released
        let later = fx.acl.context(DISTRIBUTOR, NOW.plus(500));
        let plan = fx
            .factory
            .distribute(&later, &as_factory, &mut fx.tokens, &mut fx.staking)
            .unwrap();
        assert_eq!(plan.emitted, units(4000));
        assert_eq!(fx.tokens.balance_of(fx.reward, DISTRIBUTOR), FixedPoint::ZERO);
    }

    #[test]
    fn distribute_without_weight_fails() {
        let mut fx = Fixture::new();
        let ctx = fx.acl.context(DISTRIBUTOR, NOW);
        let as_factory = fx.as_factory();
        assert_eq!(
            fx.factory.distribute(&ctx, &as_factory, &mut fx.tokens, &mut fx.staking),
            Err(FactoryError::NotAllowZero)
        );
        let owner = fx.owner();
        assert!(matches!(
            fx.factory.distribute(&owner, &as_factory, &mut fx.tokens, &mut fx.staking),
            Err(FactoryError::Access(_))
        ));
    }
}
