// 8.3 engine/rewards.rs: premium keeper, reward withdrawal and scheduled distribution.

use std::sync::Arc;

use super::core::Protocol;
use super::results::ProtocolError;
use crate::events::{AdjustPremiumEvent, DistributeEvent, EventPayload, WithdrawRewardEvent};
use crate::factory::DistributionPlan;
use crate::math::FixedPoint;
use crate::staking::{PremiumAdjustment, UserReward};
use crate::types::{AccountId, AssetId};

impl Protocol {
    /// Recomputes the short premium of each asset outside its cooldown. Assets still
    /// cooling down are skipped and produce no event.
    pub fn adjust_premium(&mut self, caller: AccountId, assets: &[AssetId]) -> Result<Vec<PremiumAdjustment>, ProtocolError> {
        self.transact("adjust_premium", |p| {
            p.ensure_not_paused()?;
            let ctx = p.ctx(caller);
            let dex = Arc::clone(&p.dex);
            let adjusted = p.staking.adjust_premium(&ctx, &p.oracle, dex.as_ref(), assets)?;
            for adjustment in &adjusted {
                tracing::info!(
                    asset = %adjustment.asset,
                    premium = %adjustment.premium_rate,
                    weight = %adjustment.short_reward_weight,
                    "premium adjusted"
                );
                p.emit_event(EventPayload::AdjustPremium(AdjustPremiumEvent {
                    asset: adjustment.asset,
                    premium_rate: adjustment.premium_rate,
                    short_reward_weight: adjustment.short_reward_weight,
                }));
            }
            Ok(adjusted)
        })
    }

    pub fn withdraw_reward(&mut self, caller: AccountId, asset: AssetId) -> Result<FixedPoint, ProtocolError> {
        self.transact("withdraw_reward", |p| {
            p.ensure_not_paused()?;
            let ctx = p.ctx(caller);
            let amount = p.staking.withdraw_reward(&ctx, &mut p.tokens, asset)?;
            p.emit_event(EventPayload::WithdrawReward(WithdrawRewardEvent {
                user: caller,
                asset,
                amount,
            }));
            Ok(amount)
        })
    }

    /// Permissionless trigger. The reward distributor funds the factory's scheduled release.
    pub fn distribute(&mut self, caller: AccountId) -> Result<DistributionPlan, ProtocolError> {
        self.transact("distribute", |p| {
            p.ensure_not_paused()?;
            p.distributor.check_trigger(&p.ctx(caller), &p.tokens)?;

            let (as_distributor, as_factory) = (p.as_distributor(), p.as_factory());
            let plan = p
                .factory
                .distribute(&as_distributor, &as_factory, &mut p.tokens, &mut p.staking)?;

            tracing::info!(
                emitted = %plan.emitted,
                short = %plan.short_total,
                treasury = %plan.treasury_total,
                "rewards distributed"
            );
            p.emit_event(EventPayload::Distribute(DistributeEvent {
                emitted: plan.emitted,
                short_total: plan.short_total,
                treasury_total: plan.treasury_total,
            }));
            Ok(plan)
        })
    }

    pub fn update_premium_interval(&mut self, caller: AccountId, seconds: u64) -> Result<(), ProtocolError> {
        self.transact("update_premium_interval", |p| {
            let ctx = p.ctx(caller);
            Ok(p.staking.update_interval(&ctx, seconds)?)
        })
    }

    /// Settled reward state of `user` without mutating anything.
    pub fn reward_preview(&self, user: AccountId, asset: AssetId) -> Result<UserReward, ProtocolError> {
        Ok(self.staking.update_reward_info(user, asset)?)
    }
}
