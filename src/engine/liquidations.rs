//! Liquidation execution. Permissionless: any account holding the asset can close out
//! an undercollateralized position at a discount.

use super::core::Protocol;
use super::positions::{check_asset, Availability};
use super::results::{LiquidationResult, ProtocolError};
use crate::access::Action;
use crate::events::{CloseReason, EventPayload, LiquidateEvent, PositionClosedEvent};
use crate::lending::LendingError;
use crate::liquidation::quote_liquidation;
use crate::math::FixedPoint;
use crate::position::meets_min_ratio;
use crate::types::{AccountId, AssetId, PositionIndex};

impl Protocol {
    /// Burns up to `amount` of the caller's asset against position `index` and pays the
    /// caller discounted collateral.
    pub fn liquidate(
        &mut self,
        caller: AccountId,
        index: PositionIndex,
        asset: AssetId,
        amount: FixedPoint,
    ) -> Result<LiquidationResult, ProtocolError> {
        self.transact("liquidate", |p| p.liquidate_inner(caller, index, asset, amount))
    }

    /// true when the position's ratio sits below its asset's minimum
    pub fn is_liquidatable(&self, index: PositionIndex) -> Result<bool, ProtocolError> {
        let position = self.lending.open_position(index)?;
        let config = self.lending.asset_config(position.asset)?;
        let collateral_value = self.collateral_price(position.collateral)?.value_of(position.collateral_amount)?;
        let asset_value = position.asset_value(self.asset_price(position.asset)?)?;
        Ok(!meets_min_ratio(collateral_value, asset_value, config.min_collateral_ratio)?)
    }

    fn liquidate_inner(
        &mut self,
        caller: AccountId,
        index: PositionIndex,
        asset: AssetId,
        amount: FixedPoint,
    ) -> Result<LiquidationResult, ProtocolError> {
        self.ensure_not_paused()?;
        self.ctx(caller).require(Action::Liquidate)?;
        let mut position = self.lending.open_position(index)?.clone();
        check_asset(index, position.asset, asset)?;
        if amount.is_zero() {
            return Err(LendingError::AmountNotAllowZero.into());
        }
        let config = self.check_availability(asset, position.collateral, Availability::Live)?;
        if !self.is_liquidatable(index)? {
            return Err(LendingError::LiquidateSafePosition(index).into());
        }

        let requested = amount.min(position.asset_amount);
        let quote = quote_liquidation(
            requested,
            position.collateral_amount,
            self.asset_price(asset)?,
            self.collateral_price(position.collateral)?.price,
            config.liquidation_discount,
            self.lending.protocol_fee(),
        )?;

        position.asset_amount = position.asset_amount.sub(quote.liquidated_amount)?;
        position.collateral_amount = position.collateral_amount.sub(quote.returned_collateral)?;
        position.liquidated_amount = position.liquidated_amount.add(quote.liquidated_amount)?;

        // fully repaid: whatever collateral is left goes back to the owner
        let owner_refund = if position.asset_amount.is_zero() {
            std::mem::take(&mut position.collateral_amount)
        } else {
            FixedPoint::ZERO
        };
        let closed = position.asset_amount.is_zero() || position.collateral_amount.is_zero();
        position.is_closed = closed;
        let (owner, collateral, is_short) = (position.owner, position.collateral, position.is_short);
        self.lending.store_position(position, self.current_time);

        let lending = self.as_lending();
        self.factory
            .burn_asset(&lending, &mut self.tokens, asset, caller, quote.liquidated_amount)?;
        if is_short {
            self.staking
                .decrease_short_token(&lending, owner, asset, quote.liquidated_amount)?;
        }
        let fee_receiver = self.lending.fee_receiver();
        self.release_collateral(owner, collateral, quote.liquidator_collateral, caller)?;
        self.release_collateral(owner, collateral, quote.protocol_fee, fee_receiver)?;
        self.release_collateral(owner, collateral, owner_refund, owner)?;

        tracing::warn!(
            %index,
            liquidator = %caller,
            amount = %quote.liquidated_amount,
            returned = %quote.returned_collateral,
            closed,
            "position liquidated"
        );
        self.emit_event(EventPayload::Liquidate(LiquidateEvent {
            index,
            liquidator: caller,
            asset,
            amount: quote.liquidated_amount,
            returned_collateral: quote.returned_collateral,
            protocol_fee: quote.protocol_fee,
            owner_refund,
        }));
        if closed {
            self.emit_event(EventPayload::PositionClosed(PositionClosedEvent {
                index,
                owner,
                reason: CloseReason::Liquidated,
            }));
        }

        Ok(LiquidationResult {
            index,
            owner,
            liquidated_amount: quote.liquidated_amount,
            returned_collateral: quote.returned_collateral,
            protocol_fee: quote.protocol_fee,
            liquidator_collateral: quote.liquidator_collateral,
            owner_refund,
            closed,
        })
    }
}
