// 6.0: staking rewards for short positions. every short bond earns a share of the
// asset's reward stream through a reward-per-unit accumulator.
// 6.0 has the pool/user structs, 6.1 the premium curve, 6.2 the accumulator logic.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::access::{AccessError, Action, CallContext};
use crate::dex::{Dex, DexError};
use crate::math::{erf_plus_one, FixedPoint, MathError};
use crate::oracle::{OracleError, PriceOracle};
use crate::token::{TokenError, TokenLedger};
use crate::types::{AccountId, AssetId, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StakingError {
    #[error("pool for {0} already registered")]
    ExistPoolInfo(AssetId),

    #[error("no pool registered for {0}")]
    NotExistPoolInfo(AssetId),

    #[error("premium min update interval must be positive")]
    InvalidPremiumMinUpdateInterval,

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Dex(#[from] DexError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("math error: {0}")]
    Math(#[from] MathError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolInfo {
    pub total_short_amount: FixedPoint,
    pub reward_unit: FixedPoint,
    pub premium_rate: FixedPoint,
    pub short_reward_weight: FixedPoint,
    // rewards that arrived while nothing was bonded
    pub short_pending_reward: FixedPoint,
    pub premium_updated_time: Option<Timestamp>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserReward {
    pub bond_amount: FixedPoint,
    pub reward_unit: FixedPoint,
    pub pending_reward: FixedPoint,
}

impl UserReward {
    // pending += bond * (pool.unit - user.unit), then snapshot
    fn settle(&mut self, pool_unit: FixedPoint) -> Result<(), MathError> {
        let delta = pool_unit.sub(self.reward_unit)?;
        self.pending_reward = self.pending_reward.add(self.bond_amount.mul(delta)?)?;
        self.reward_unit = pool_unit;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PremiumAdjustment {
    pub asset: AssetId,
    pub premium_rate: FixedPoint,
    pub short_reward_weight: FixedPoint,
}

// 6.1: premium curve. weight is 0.5 at a 2% premium and saturates at 7%.
const PREMIUM_SATURATION_PERMILLE: u32 = 70;
const PREMIUM_CENTER: u128 = 2;
const SQRT_TWO_NUM: u64 = 14_142_135_624;
const SQRT_TWO_DEN: u64 = 10_000_000_000;

/// Maps a premium rate to the share of rewards that flows to short bonds.
///
/// `f(p) = (1 + erf((100p - 2) / √2)) / 2` for `p <= 0.07`, else 1.
pub fn short_reward_weight(premium_rate: FixedPoint) -> Result<FixedPoint, MathError> {
    if premium_rate > FixedPoint::from_permille(PREMIUM_SATURATION_PERMILLE) {
        return Ok(FixedPoint::ONE);
    }

    let scaled = premium_rate.mul_div(100, 1)?;
    let center = FixedPoint::from_uint(PREMIUM_CENTER);
    let (positive, distance) = if scaled > center {
        (true, scaled.sub(center)?)
    } else {
        (false, center.sub(scaled)?)
    };
    let x = distance.div(FixedPoint::from_ratio(SQRT_TWO_NUM, SQRT_TWO_DEN)?)?;

    erf_plus_one(positive, x.raw(), FixedPoint::ONE.raw())?.mul_div(1, 2)
}

/// |dex - oracle| / oracle
pub fn premium_rate(dex_price: FixedPoint, oracle_price: FixedPoint) -> Result<FixedPoint, MathError> {
    let spread = if dex_price > oracle_price {
        dex_price.sub(oracle_price)?
    } else {
        oracle_price.sub(dex_price)?
    };
    spread.div(oracle_price)
}

/** 6.2: pools per asset, rewards per (user, asset). reward tokens sit on `account` */
#[derive(Debug, Clone)]
pub struct Staking {
    account: AccountId,
    reward_token: AssetId,
    pools: HashMap<AssetId, PoolInfo>,
    rewards: HashMap<(AccountId, AssetId), UserReward>,
    premium_min_update_interval: u64,
}

impl Staking {
    pub fn new(account: AccountId, reward_token: AssetId, premium_min_update_interval: u64) -> Self {
        Self {
            account,
            reward_token,
            pools: HashMap::new(),
            rewards: HashMap::new(),
            premium_min_update_interval,
        }
    }

    pub fn account(&self) -> AccountId {
        self.account
    }

    pub fn reward_token(&self) -> AssetId {
        self.reward_token
    }

    pub fn premium_min_update_interval(&self) -> u64 {
        self.premium_min_update_interval
    }

    pub fn register_pool_info(&mut self, ctx: &CallContext, asset: AssetId) -> Result<(), StakingError> {
        ctx.require(Action::RegisterPoolInfo)?;
        if self.pools.contains_key(&asset) {
            return Err(StakingError::ExistPoolInfo(asset));
        }
        self.pools.insert(asset, PoolInfo::default());
        Ok(())
    }

    pub fn update_interval(&mut self, ctx: &CallContext, seconds: u64) -> Result<(), StakingError> {
        ctx.require(Action::UpdatePremiumInterval)?;
        if seconds == 0 {
            return Err(StakingError::InvalidPremiumMinUpdateInterval);
        }
        self.premium_min_update_interval = seconds;
        Ok(())
    }

    pub fn increase_short_token(
        &mut self,
        ctx: &CallContext,
        user: AccountId,
        asset: AssetId,
        amount: FixedPoint,
    ) -> Result<(), StakingError> {
        ctx.require(Action::IncreaseShortToken)?;
        let pool = self.pools.get_mut(&asset).ok_or(StakingError::NotExistPoolInfo(asset))?;
        let reward = self.rewards.entry((user, asset)).or_default();

        reward.settle(pool.reward_unit)?;
        reward.bond_amount = reward.bond_amount.add(amount)?;
        pool.total_short_amount = pool.total_short_amount.add(amount)?;
        Ok(())
    }

    /// Unbonds up to `amount`. Returns the amount actually unbonded.
    pub fn decrease_short_token(
        &mut self,
        ctx: &CallContext,
        user: AccountId,
        asset: AssetId,
        amount: FixedPoint,
    ) -> Result<FixedPoint, StakingError> {
        ctx.require(Action::DecreaseShortToken)?;
        let pool = self.pools.get_mut(&asset).ok_or(StakingError::NotExistPoolInfo(asset))?;
        let reward = self.rewards.entry((user, asset)).or_default();

        reward.settle(pool.reward_unit)?;
        let unbonded = amount.min(reward.bond_amount);
        reward.bond_amount = reward.bond_amount.sub(unbonded)?;
        pool.total_short_amount = pool.total_short_amount.saturating_sub(unbonded);
        Ok(unbonded)
    }

    /// Folds reward into each pool's accumulator. The tokens must already sit on the
    /// staking account. Returns the total deposited.
    pub fn deposit_reward(&mut self, ctx: &CallContext, entries: &[(AssetId, FixedPoint)]) -> Result<FixedPoint, StakingError> {
        ctx.require(Action::DepositReward)?;
        let mut total = FixedPoint::ZERO;
        for &(asset, amount) in entries {
            let pool = self.pools.get_mut(&asset).ok_or(StakingError::NotExistPoolInfo(asset))?;
            if pool.total_short_amount.is_zero() {
                pool.short_pending_reward = pool.short_pending_reward.add(amount)?;
            } else {
                let distributable = pool.short_pending_reward.add(amount)?;
                let unit_delta = distributable.div(pool.total_short_amount)?;
                pool.reward_unit = pool.reward_unit.add(unit_delta)?;
                pool.short_pending_reward = FixedPoint::ZERO;
            }
            total = total.add(amount)?;
        }
        Ok(total)
    }

    /// Settles and pays the caller's pending reward for `asset`.
    pub fn withdraw_reward(
        &mut self,
        ctx: &CallContext,
        tokens: &mut TokenLedger,
        asset: AssetId,
    ) -> Result<FixedPoint, StakingError> {
        ctx.require(Action::WithdrawReward)?;
        let pool = self.pools.get(&asset).ok_or(StakingError::NotExistPoolInfo(asset))?;
        let reward = self.rewards.entry((ctx.caller, asset)).or_default();

        reward.settle(pool.reward_unit)?;
        let amount = reward.pending_reward;
        reward.pending_reward = FixedPoint::ZERO;

        tokens.transfer(self.reward_token, self.account, ctx.caller, amount)?;
        Ok(amount)
    }

    /// Recomputes the premium and weight for each asset outside its cooldown.
    /// Assets still cooling down are skipped without error.
    pub fn adjust_premium(
        &mut self,
        ctx: &CallContext,
        oracle: &PriceOracle,
        dex: &dyn Dex,
        assets: &[AssetId],
    ) -> Result<Vec<PremiumAdjustment>, StakingError> {
        ctx.require(Action::AdjustPremium)?;
        let mut adjusted = Vec::new();
        for &asset in assets {
            let interval = self.premium_min_update_interval;
            let pool = self.pools.get_mut(&asset).ok_or(StakingError::NotExistPoolInfo(asset))?;
            if let Some(updated) = pool.premium_updated_time {
                if ctx.now.since(updated) < interval {
                    tracing::debug!(%asset, %updated, "premium adjustment skipped, interval not elapsed");
                    continue;
                }
            }

            let oracle_price = oracle.query_asset_price(asset, ctx.now)?.price;
            let dex_price = dex.pool_price(asset)?;
            let rate = premium_rate(dex_price, oracle_price)?;
            let weight = short_reward_weight(rate)?;

            pool.premium_rate = rate;
            pool.short_reward_weight = weight;
            pool.premium_updated_time = Some(ctx.now);
            adjusted.push(PremiumAdjustment {
                asset,
                premium_rate: rate,
                short_reward_weight: weight,
            });
        }
        Ok(adjusted)
    }

    pub fn pool_info(&self, asset: AssetId) -> Option<&PoolInfo> {
        self.pools.get(&asset)
    }

    pub fn has_pool(&self, asset: AssetId) -> bool {
        self.pools.contains_key(&asset)
    }

    pub fn user_reward(&self, user: AccountId, asset: AssetId) -> UserReward {
        self.rewards.get(&(user, asset)).cloned().unwrap_or_default()
    }

    /// what `user` would hold after settling, without mutating anything
    pub fn update_reward_info(&self, user: AccountId, asset: AssetId) -> Result<UserReward, StakingError> {
        let pool = self.pools.get(&asset).ok_or(StakingError::NotExistPoolInfo(asset))?;
        let mut reward = self.user_reward(user, asset);
        reward.settle(pool.reward_unit)?;
        Ok(reward)
    }
}
