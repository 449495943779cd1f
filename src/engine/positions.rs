//! Position lifecycle: open, deposit, withdraw, mint, burn.
//!
//! Each entry point validates, writes the position back, and only then moves tokens.

use super::core::Protocol;
use super::results::{BurnResult, MintResult, OpenResult, ProtocolError, WithdrawResult};
use crate::access::Action;
use crate::collateral_oracle::{CollateralOracleError, CollateralPrice};
use crate::dex::{SwapParams, SwapRequest};
use crate::events::{
    AssetMovedEvent, BurnEvent, CloseReason, CollateralMovedEvent, EventPayload, OpenPositionEvent, PositionClosedEvent,
};
use crate::lending::{AssetConfig, LendingError};
use crate::liquidation::quote_burn;
use crate::math::FixedPoint;
use crate::position::{exceeds_min_ratio, meets_min_ratio, mintable_amount, ratio_permille, PositionKey};
use crate::types::{AccountId, AssetId, Permille, PositionIndex};

/// How strict the availability check of an entry point is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Availability {
    // open, deposit, mint, liquidate
    Live,
    // withdraw, burn: still allowed while migrating or revoked
    Exit,
}

impl Protocol {
    pub fn open_position(
        &mut self,
        caller: AccountId,
        asset: AssetId,
        collateral: AssetId,
        collateral_amount: FixedPoint,
        ratio: Permille,
        swap: SwapParams,
    ) -> Result<OpenResult, ProtocolError> {
        self.transact("open_position", |p| {
            p.open_position_inner(caller, asset, collateral, collateral_amount, ratio, swap)
        })
    }

    pub fn deposit(
        &mut self,
        caller: AccountId,
        index: PositionIndex,
        collateral: AssetId,
        amount: FixedPoint,
    ) -> Result<(), ProtocolError> {
        self.transact("deposit", |p| p.deposit_inner(caller, index, collateral, amount))
    }

    /// Withdraws up to `amount`. Requests above the position's collateral are clamped.
    pub fn withdraw(
        &mut self,
        caller: AccountId,
        index: PositionIndex,
        collateral: AssetId,
        amount: FixedPoint,
    ) -> Result<WithdrawResult, ProtocolError> {
        self.transact("withdraw", |p| p.withdraw_inner(caller, index, collateral, amount))
    }

    pub fn mint(
        &mut self,
        caller: AccountId,
        index: PositionIndex,
        asset: AssetId,
        amount: FixedPoint,
        swap: SwapParams,
    ) -> Result<MintResult, ProtocolError> {
        self.transact("mint", |p| p.mint_inner(caller, index, asset, amount, swap))
    }

    /// Burns up to `amount` of the caller's asset against the position.
    pub fn burn(
        &mut self,
        caller: AccountId,
        index: PositionIndex,
        asset: AssetId,
        amount: FixedPoint,
    ) -> Result<BurnResult, ProtocolError> {
        self.transact("burn", |p| p.burn_inner(caller, index, asset, amount))
    }

    fn open_position_inner(
        &mut self,
        caller: AccountId,
        asset: AssetId,
        collateral: AssetId,
        collateral_amount: FixedPoint,
        ratio: Permille,
        swap: SwapParams,
    ) -> Result<OpenResult, ProtocolError> {
        self.ensure_not_paused()?;
        let ctx = self.ctx(caller);
        ctx.require(Action::OpenPosition)?;
        if collateral_amount.is_zero() {
            return Err(LendingError::AmountNotAllowZero.into());
        }
        let config = self.check_availability(asset, collateral, Availability::Live)?;

        let key = PositionKey {
            owner: caller,
            asset,
            collateral,
            is_short: swap.is_short,
        };
        if let Some(existing) = self.lending.position_index_of(&key) {
            return Err(LendingError::ExistSameAssetPosition(existing).into());
        }
        if ratio < config.min_collateral_ratio {
            return Err(LendingError::InvalidCollateralRatio {
                ratio,
                minimum: config.min_collateral_ratio,
            }
            .into());
        }

        let collateral_value = self.collateral_price(collateral)?.value_of(collateral_amount)?;
        let minted = mintable_amount(collateral_value, ratio, self.asset_price(asset)?)?;

        let index = self.lending.create_position(key, minted, collateral_amount, self.current_time)?;
        let lending = self.as_lending();
        self.collateral_manager
            .increase_collateral(&lending, &mut self.tokens, caller, collateral, collateral_amount, caller)?;
        let swap_output = self.issue_asset(caller, asset, collateral, minted, swap)?;

        tracing::info!(%index, owner = %caller, %asset, %minted, is_short = swap.is_short, "position opened");
        self.emit_event(EventPayload::OpenPosition(OpenPositionEvent {
            index,
            owner: caller,
            asset,
            asset_amount: minted,
            collateral,
            collateral_amount,
            collateral_ratio: ratio,
            is_short: swap.is_short,
        }));
        Ok(OpenResult {
            index,
            minted,
            swap_output,
        })
    }

    fn deposit_inner(
        &mut self,
        caller: AccountId,
        index: PositionIndex,
        collateral: AssetId,
        amount: FixedPoint,
    ) -> Result<(), ProtocolError> {
        self.ensure_not_paused()?;
        let ctx = self.ctx(caller);
        ctx.require(Action::ManagePosition)?;
        let mut position = self.lending.owned_position(&ctx, index)?.clone();
        check_collateral(index, position.collateral, collateral)?;
        if amount.is_zero() {
            return Err(LendingError::AmountNotAllowZero.into());
        }
        self.check_availability(position.asset, collateral, Availability::Live)?;

        position.collateral_amount = position.collateral_amount.add(amount)?;
        self.lending.store_position(position, self.current_time);

        let lending = self.as_lending();
        self.collateral_manager
            .increase_collateral(&lending, &mut self.tokens, caller, collateral, amount, caller)?;

        self.emit_event(EventPayload::Deposit(CollateralMovedEvent {
            index,
            collateral,
            amount,
        }));
        Ok(())
    }

    fn withdraw_inner(
        &mut self,
        caller: AccountId,
        index: PositionIndex,
        collateral: AssetId,
        amount: FixedPoint,
    ) -> Result<WithdrawResult, ProtocolError> {
        self.ensure_not_paused()?;
        let ctx = self.ctx(caller);
        ctx.require(Action::ManagePosition)?;
        let mut position = self.lending.owned_position(&ctx, index)?.clone();
        check_collateral(index, position.collateral, collateral)?;
        if amount.is_zero() {
            return Err(LendingError::AmountNotAllowZero.into());
        }
        let config = self.check_availability(position.asset, collateral, Availability::Exit)?;

        let withdrawn = amount.min(position.collateral_amount);
        position.collateral_amount = position.collateral_amount.sub(withdrawn)?;

        // migrating assets settle at the end price, the ratio no longer applies
        if !config.is_migrating() && !position.asset_amount.is_zero() {
            let collateral_price = self.collateral_price(collateral)?;
            self.ensure_ratio(&collateral_price, position.collateral_amount, position.asset, position.asset_amount, &config, false)?;
        }

        let closed = position.collateral_amount.is_zero();
        position.is_closed = closed;
        let owner = position.owner;
        self.lending.store_position(position, self.current_time);

        let lending = self.as_lending();
        self.collateral_manager
            .decrease_collateral(&lending, &mut self.tokens, caller, collateral, withdrawn, caller)?;

        self.emit_event(EventPayload::Withdraw(CollateralMovedEvent {
            index,
            collateral,
            amount: withdrawn,
        }));
        if closed {
            self.emit_event(EventPayload::PositionClosed(PositionClosedEvent {
                index,
                owner,
                reason: CloseReason::Drained,
            }));
        }
        Ok(WithdrawResult { withdrawn, closed })
    }

    fn mint_inner(
        &mut self,
        caller: AccountId,
        index: PositionIndex,
        asset: AssetId,
        amount: FixedPoint,
        swap: SwapParams,
    ) -> Result<MintResult, ProtocolError> {
        self.ensure_not_paused()?;
        let ctx = self.ctx(caller);
        ctx.require(Action::ManagePosition)?;
        let mut position = self.lending.owned_position(&ctx, index)?.clone();
        check_asset(index, position.asset, asset)?;
        if amount.is_zero() {
            return Err(LendingError::AmountNotAllowZero.into());
        }
        if swap.is_short != position.is_short {
            return Err(LendingError::InvalidShortParams.into());
        }
        let config = self.check_availability(asset, position.collateral, Availability::Live)?;

        position.asset_amount = position.asset_amount.add(amount)?;
        let collateral_price = self.collateral_price(position.collateral)?;
        self.ensure_ratio(&collateral_price, position.collateral_amount, asset, position.asset_amount, &config, true)?;

        let collateral = position.collateral;
        self.lending.store_position(position, self.current_time);
        let swap_output = self.issue_asset(caller, asset, collateral, amount, swap)?;

        self.emit_event(EventPayload::Mint(AssetMovedEvent { index, asset, amount }));
        Ok(MintResult {
            minted: amount,
            swap_output,
        })
    }

    fn burn_inner(
        &mut self,
        caller: AccountId,
        index: PositionIndex,
        asset: AssetId,
        amount: FixedPoint,
    ) -> Result<BurnResult, ProtocolError> {
        self.ensure_not_paused()?;
        let ctx = self.ctx(caller);
        ctx.require(Action::ManagePosition)?;
        let mut position = self.lending.owned_position(&ctx, index)?.clone();
        check_asset(index, position.asset, asset)?;
        if amount.is_zero() {
            return Err(LendingError::AmountNotAllowZero.into());
        }
        let config = self.check_availability(asset, position.collateral, Availability::Exit)?;

        let burned = amount.min(position.asset_amount);
        let migrating = config.is_migrating();
        let price = if migrating { config.end_price } else { self.asset_price(asset)? };
        let collateral_price = self.collateral_price(position.collateral)?.price;
        let quote = quote_burn(
            burned,
            position.collateral_amount,
            price,
            collateral_price,
            self.lending.protocol_fee(),
            migrating,
        )?;

        position.asset_amount = position.asset_amount.sub(burned)?;
        position.collateral_amount = position.collateral_amount.sub(quote.collateral_debit)?;
        let closed = position.collateral_amount.is_zero();
        position.is_closed = closed;
        let (collateral, is_short) = (position.collateral, position.is_short);
        self.lending.store_position(position, self.current_time);

        let lending = self.as_lending();
        self.factory.burn_asset(&lending, &mut self.tokens, asset, caller, burned)?;
        if is_short {
            self.staking.decrease_short_token(&lending, caller, asset, burned)?;
        }
        let fee_receiver = self.lending.fee_receiver();
        self.release_collateral(caller, collateral, quote.protocol_fee, fee_receiver)?;
        self.release_collateral(caller, collateral, quote.released_collateral, caller)?;

        self.emit_event(EventPayload::Burn(BurnEvent {
            index,
            asset,
            amount: burned,
            protocol_fee: quote.protocol_fee,
            released_collateral: quote.released_collateral,
        }));
        if closed {
            self.emit_event(EventPayload::PositionClosed(PositionClosedEvent {
                index,
                owner: caller,
                reason: CloseReason::Drained,
            }));
        }
        Ok(BurnResult {
            burned,
            protocol_fee: quote.protocol_fee,
            released_collateral: quote.released_collateral,
            closed,
        })
    }

    /// Asset config after checking both sides are usable for an entry point.
    pub(super) fn check_availability(
        &self,
        asset: AssetId,
        collateral: AssetId,
        availability: Availability,
    ) -> Result<AssetConfig, ProtocolError> {
        let config = self.lending.asset_config(asset)?.clone();
        let info = self
            .collateral_oracle
            .collateral_info(collateral)
            .ok_or(CollateralOracleError::NotExistCollateral(collateral))?;

        let (asset_ok, collateral_ok) = match availability {
            Availability::Live => (config.is_available(), info.is_available()),
            Availability::Exit => (!config.is_suspended, !info.is_suspended),
        };
        if !asset_ok {
            return Err(LendingError::AssetNotAvailable(asset).into());
        }
        if !collateral_ok {
            return Err(LendingError::CollateralNotAvailable(collateral).into());
        }
        Ok(config)
    }

    // strict for mint, inclusive for everything else
    fn ensure_ratio(
        &self,
        collateral_price: &CollateralPrice,
        collateral_amount: FixedPoint,
        asset: AssetId,
        asset_amount: FixedPoint,
        config: &AssetConfig,
        strict: bool,
    ) -> Result<(), ProtocolError> {
        let collateral_value = collateral_price.value_of(collateral_amount)?;
        let asset_value = asset_amount.mul(self.asset_price(asset)?)?;
        let minimum = config.min_collateral_ratio;
        let healthy = if strict {
            exceeds_min_ratio(collateral_value, asset_value, minimum)?
        } else {
            meets_min_ratio(collateral_value, asset_value, minimum)?
        };
        if !healthy {
            return Err(LendingError::InvalidCollateralRatio {
                ratio: ratio_permille(collateral_value, asset_value)?,
                minimum,
            }
            .into());
        }
        Ok(())
    }

    /// Mints `amount` for `owner`. Shorts sell it on the dex for collateral and bond it.
    fn issue_asset(
        &mut self,
        owner: AccountId,
        asset: AssetId,
        collateral: AssetId,
        amount: FixedPoint,
        swap: SwapParams,
    ) -> Result<Option<FixedPoint>, ProtocolError> {
        let lending = self.as_lending();
        if !swap.is_short {
            self.factory.mint_asset(&lending, &mut self.tokens, asset, owner, amount)?;
            return Ok(None);
        }

        let pool = self.accounts.lending;
        self.staking.increase_short_token(&lending, owner, asset, amount)?;
        self.factory.mint_asset(&lending, &mut self.tokens, asset, pool, amount)?;
        self.tokens.approve(asset, pool, self.dex.router(), amount)?;
        let request = SwapRequest {
            asset_in: asset,
            asset_out: collateral,
            amount_in: amount,
            amount_out_minimum: swap.amount_out_minimum,
            payer: pool,
            recipient: owner,
        };
        let received = self.dex.swap_exact_input(&mut self.tokens, &request)?;
        tracing::debug!(%owner, %asset, %amount, %received, "short proceeds swapped");
        Ok(Some(received))
    }

    /// Pays `amount` of `owner`'s pooled collateral to `recipient`. No-op for zero.
    pub(super) fn release_collateral(
        &mut self,
        owner: AccountId,
        collateral: AssetId,
        amount: FixedPoint,
        recipient: AccountId,
    ) -> Result<(), ProtocolError> {
        if amount.is_zero() {
            return Ok(());
        }
        let lending = self.as_lending();
        self.collateral_manager
            .decrease_collateral(&lending, &mut self.tokens, owner, collateral, amount, recipient)?;
        Ok(())
    }
}

fn check_collateral(index: PositionIndex, expected: AssetId, got: AssetId) -> Result<(), LendingError> {
    if expected != got {
        return Err(LendingError::WrongCollateral { index, expected, got });
    }
    Ok(())
}

pub(super) fn check_asset(index: PositionIndex, expected: AssetId, got: AssetId) -> Result<(), LendingError> {
    if expected != got {
        return Err(LendingError::WrongAsset { index, expected, got });
    }
    Ok(())
}
