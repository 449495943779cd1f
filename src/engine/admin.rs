// 8.4 engine/admin.rs: owner surface. oracle wiring, collateral registry, lending
// parameters and the factory's asset lifecycle. none of these are blocked by pause.

use std::sync::Arc;

use super::core::Protocol;
use super::results::ProtocolError;
use crate::events::{AssetEnabledEvent, AssetRevokedEvent, CollateralRegisteredEvent, EventPayload};
use crate::factory::DistributionSchedule;
use crate::math::FixedPoint;
use crate::price_feed::PriceFeed;
use crate::types::{AccountId, AssetId, Permille};

impl Protocol {
    pub fn set_price_aggregator(
        &mut self,
        caller: AccountId,
        asset: AssetId,
        feed: Arc<dyn PriceFeed>,
    ) -> Result<(), ProtocolError> {
        self.transact("set_price_aggregator", |p| {
            let ctx = p.ctx(caller);
            Ok(p.oracle.set_price_aggregator(&ctx, asset, feed)?)
        })
    }

    pub fn set_asset_time_frame(&mut self, caller: AccountId, asset: AssetId, seconds: u64) -> Result<(), ProtocolError> {
        self.transact("set_asset_time_frame", |p| {
            let ctx = p.ctx(caller);
            Ok(p.oracle.set_asset_time_frame(&ctx, asset, seconds)?)
        })
    }

    pub fn register_collateral(&mut self, caller: AccountId, asset: AssetId, multiplier: Permille) -> Result<(), ProtocolError> {
        self.transact("register_collateral", |p| {
            let ctx = p.ctx(caller);
            p.collateral_oracle.register_collateral(&ctx, &p.oracle, asset, multiplier)?;
            p.emit_event(EventPayload::CollateralRegistered(CollateralRegisteredEvent { asset, multiplier }));
            Ok(())
        })
    }

    pub fn revoke_collateral(&mut self, caller: AccountId, asset: AssetId) -> Result<(), ProtocolError> {
        self.transact("revoke_collateral", |p| {
            let ctx = p.ctx(caller);
            p.collateral_oracle.revoke_collateral(&ctx, asset)?;
            if p.collateral_oracle.collateral_info(asset).is_some() {
                p.emit_event(EventPayload::CollateralRevoked(asset));
            }
            Ok(())
        })
    }

    pub fn suspend_collateral(&mut self, caller: AccountId, asset: AssetId) -> Result<(), ProtocolError> {
        self.transact("suspend_collateral", |p| {
            let ctx = p.ctx(caller);
            Ok(p.collateral_oracle.suspend_collateral(&ctx, asset)?)
        })
    }

    pub fn unsuspend_collateral(&mut self, caller: AccountId, asset: AssetId) -> Result<(), ProtocolError> {
        self.transact("unsuspend_collateral", |p| {
            let ctx = p.ctx(caller);
            Ok(p.collateral_oracle.unsuspend_collateral(&ctx, asset)?)
        })
    }

    pub fn update_collateral_end_price(&mut self, caller: AccountId, asset: AssetId, price: FixedPoint) -> Result<(), ProtocolError> {
        self.transact("update_collateral_end_price", |p| {
            let ctx = p.ctx(caller);
            Ok(p.collateral_oracle.update_collateral_end_price(&ctx, asset, price)?)
        })
    }

    pub fn update_collateral_multiplier(
        &mut self,
        caller: AccountId,
        asset: AssetId,
        multiplier: Permille,
    ) -> Result<(), ProtocolError> {
        self.transact("update_collateral_multiplier", |p| {
            let ctx = p.ctx(caller);
            Ok(p.collateral_oracle.update_collateral_multiplier(&ctx, asset, multiplier)?)
        })
    }

    pub fn update_protocol_fee(&mut self, caller: AccountId, fee: Permille) -> Result<(), ProtocolError> {
        self.transact("update_protocol_fee", |p| {
            let ctx = p.ctx(caller);
            p.lending.update_protocol_fee(&ctx, fee)?;
            p.emit_event(EventPayload::ProtocolFeeUpdated(fee));
            Ok(())
        })
    }

    pub fn set_fee_receiver(&mut self, caller: AccountId, receiver: AccountId) -> Result<(), ProtocolError> {
        self.transact("set_fee_receiver", |p| {
            let ctx = p.ctx(caller);
            p.lending.set_fee_receiver(&ctx, receiver)?;
            p.emit_event(EventPayload::FeeReceiverUpdated(receiver));
            Ok(())
        })
    }

    pub fn update_asset(
        &mut self,
        caller: AccountId,
        asset: AssetId,
        liquidation_discount: Permille,
        min_collateral_ratio: Permille,
    ) -> Result<(), ProtocolError> {
        self.transact("update_asset", |p| {
            let ctx = p.ctx(caller);
            Ok(p.lending.update_asset(&ctx, asset, liquidation_discount, min_collateral_ratio)?)
        })
    }

    pub fn suspend_asset(&mut self, caller: AccountId, asset: AssetId) -> Result<(), ProtocolError> {
        self.transact("suspend_asset", |p| {
            let ctx = p.ctx(caller);
            Ok(p.lending.suspend_asset(&ctx, asset)?)
        })
    }

    pub fn unsuspend_asset(&mut self, caller: AccountId, asset: AssetId) -> Result<(), ProtocolError> {
        self.transact("unsuspend_asset", |p| {
            let ctx = p.ctx(caller);
            Ok(p.lending.unsuspend_asset(&ctx, asset)?)
        })
    }

    /// New synthetic asset token, mintable only through the factory.
    pub fn create_asset(&mut self, caller: AccountId, symbol: &str) -> Result<AssetId, ProtocolError> {
        self.transact("create_asset", |p| {
            let ctx = p.ctx(caller);
            Ok(p.factory.create_asset(&ctx, &mut p.tokens, symbol)?)
        })
    }

    pub fn enable_asset(
        &mut self,
        caller: AccountId,
        asset: AssetId,
        weight: u32,
        liquidation_discount: Permille,
        min_collateral_ratio: Permille,
    ) -> Result<(), ProtocolError> {
        self.transact("enable_asset", |p| {
            let (ctx, as_factory) = (p.ctx(caller), p.as_factory());
            let dex = Arc::clone(&p.dex);
            p.factory.enable_asset(
                &ctx,
                &as_factory,
                &p.oracle,
                dex.as_ref(),
                &mut p.lending,
                &mut p.staking,
                asset,
                weight,
                liquidation_discount,
                min_collateral_ratio,
            )?;
            p.emit_event(EventPayload::AssetEnabled(AssetEnabledEvent {
                asset,
                weight,
                total_weight: p.factory.total_weight(),
            }));
            Ok(())
        })
    }

    pub fn update_weight(&mut self, caller: AccountId, asset: AssetId, weight: u32) -> Result<(), ProtocolError> {
        self.transact("update_weight", |p| {
            let ctx = p.ctx(caller);
            p.factory.update_weight(&ctx, asset, weight)?;
            p.emit_event(EventPayload::WeightUpdated(AssetEnabledEvent {
                asset,
                weight,
                total_weight: p.factory.total_weight(),
            }));
            Ok(())
        })
    }

    /// Revokes the asset at the current oracle price. Returns that end price.
    pub fn revoke_asset(&mut self, caller: AccountId, asset: AssetId) -> Result<FixedPoint, ProtocolError> {
        self.transact("revoke_asset", |p| {
            let (ctx, as_factory) = (p.ctx(caller), p.as_factory());
            let end_price = p
                .factory
                .revoke_asset(&ctx, &as_factory, &p.oracle, &mut p.lending, asset)?;
            p.emit_event(EventPayload::AssetRevoked(AssetRevokedEvent { asset, end_price }));
            Ok(end_price)
        })
    }

    pub fn update_distribution_schedule(
        &mut self,
        caller: AccountId,
        schedules: Vec<DistributionSchedule>,
    ) -> Result<(), ProtocolError> {
        self.transact("update_distribution_schedule", |p| {
            let ctx = p.ctx(caller);
            Ok(p.factory.update_distribution_schedule(&ctx, schedules)?)
        })
    }

    /// Sweeps the reward distributor's balance of `token` to the caller.
    pub fn withdraw_distributor_balance(&mut self, caller: AccountId, token: AssetId) -> Result<FixedPoint, ProtocolError> {
        self.transact("withdraw_distributor_balance", |p| {
            let ctx = p.ctx(caller);
            Ok(p.distributor.withdraw(&ctx, &mut p.tokens, token)?)
        })
    }
}
