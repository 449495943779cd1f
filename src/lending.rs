// 7.2 lending.rs: the position book and per-asset lending parameters.
// holds state and admin only. flows that move tokens across components live in
// engine/positions.rs and engine/liquidations.rs.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::access::{AccessError, Action, CallContext};
use crate::math::{FixedPoint, MathError};
use crate::position::{Position, PositionKey};
use crate::types::{AccountId, AssetId, Permille, PositionIndex, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LendingError {
    #[error("amount must be non-zero")]
    AmountNotAllowZero,

    #[error("asset {0} is not registered")]
    NoAssetRegistered(AssetId),

    #[error("asset {0} is not available")]
    AssetNotAvailable(AssetId),

    #[error("collateral {0} is not available")]
    CollateralNotAvailable(AssetId),

    #[error("position {0} already open for the same asset, collateral and side")]
    ExistSameAssetPosition(PositionIndex),

    #[error("collateral ratio {ratio} below minimum {minimum}")]
    InvalidCollateralRatio { ratio: Permille, minimum: Permille },

    #[error("{caller} does not own position {index}")]
    OnlyPositionOwner { index: PositionIndex, caller: AccountId },

    #[error("position {0} is closed")]
    PositionClosed(PositionIndex),

    #[error("position {0} not found")]
    PositionNotFound(PositionIndex),

    #[error("position {index} holds collateral {expected}, got {got}")]
    WrongCollateral {
        index: PositionIndex,
        expected: AssetId,
        got: AssetId,
    },

    #[error("position {index} holds asset {expected}, got {got}")]
    WrongAsset {
        index: PositionIndex,
        expected: AssetId,
        got: AssetId,
    },

    #[error("swap params do not match the position side")]
    InvalidShortParams,

    #[error("position {0} is safe")]
    LiquidateSafePosition(PositionIndex),

    #[error("protocol fee {fee} exceeds maximum {maximum}")]
    ExceedMaxProtocolFee { fee: Permille, maximum: Permille },

    #[error("liquidation discount {discount} exceeds limit {limit}")]
    ExceedLimitLiquidationDiscount { discount: Permille, limit: Permille },

    #[error("min collateral ratio {ratio} outside [{lower}, {upper}]")]
    InvalidMinCollateralRatio {
        ratio: Permille,
        lower: Permille,
        upper: Permille,
    },

    #[error("asset {0} already has a lending config")]
    ExistAssetConfig(AssetId),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("math error: {0}")]
    Math(#[from] MathError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetConfig {
    pub liquidation_discount: Permille,
    pub min_collateral_ratio: Permille,
    // non-zero once revoked: positions settle at this price
    pub end_price: FixedPoint,
    pub is_suspended: bool,
}

impl AssetConfig {
    pub fn is_migrating(&self) -> bool {
        !self.end_price.is_zero()
    }

    pub fn is_available(&self) -> bool {
        !self.is_migrating() && !self.is_suspended
    }
}

/// Bounds enforced by the admin surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LendingParams {
    pub max_protocol_fee: Permille,
    pub max_liquidation_discount: Permille,
    pub min_collateral_ratio_lower: Permille,
    pub min_collateral_ratio_upper: Permille,
}

/** 7.2.1: position book. closed positions stay queryable, only the open index forgets them */
#[derive(Debug, Clone)]
pub struct Lending {
    account: AccountId,
    params: LendingParams,
    protocol_fee: Permille,
    fee_receiver: AccountId,
    asset_configs: HashMap<AssetId, AssetConfig>,
    positions: BTreeMap<PositionIndex, Position>,
    open_positions: HashMap<PositionKey, PositionIndex>,
    next_index: u64,
}

impl Lending {
    pub fn new(account: AccountId, params: LendingParams, protocol_fee: Permille, fee_receiver: AccountId) -> Self {
        Self {
            account,
            params,
            protocol_fee,
            fee_receiver,
            asset_configs: HashMap::new(),
            positions: BTreeMap::new(),
            open_positions: HashMap::new(),
            next_index: 1,
        }
    }

    pub fn account(&self) -> AccountId {
        self.account
    }

    pub fn params(&self) -> &LendingParams {
        &self.params
    }

    pub fn protocol_fee(&self) -> Permille {
        self.protocol_fee
    }

    pub fn fee_receiver(&self) -> AccountId {
        self.fee_receiver
    }

    pub fn update_protocol_fee(&mut self, ctx: &CallContext, fee: Permille) -> Result<(), LendingError> {
        ctx.require(Action::UpdateProtocolFee)?;
        if fee > self.params.max_protocol_fee {
            return Err(LendingError::ExceedMaxProtocolFee {
                fee,
                maximum: self.params.max_protocol_fee,
            });
        }
        self.protocol_fee = fee;
        Ok(())
    }

    pub fn set_fee_receiver(&mut self, ctx: &CallContext, receiver: AccountId) -> Result<(), LendingError> {
        ctx.require(Action::SetFeeReceiver)?;
        self.fee_receiver = receiver;
        Ok(())
    }

    pub fn register_asset(
        &mut self,
        ctx: &CallContext,
        asset: AssetId,
        liquidation_discount: Permille,
        min_collateral_ratio: Permille,
    ) -> Result<(), LendingError> {
        ctx.require(Action::RegisterAsset)?;
        if self.asset_configs.contains_key(&asset) {
            return Err(LendingError::ExistAssetConfig(asset));
        }
        self.check_asset_params(liquidation_discount, min_collateral_ratio)?;
        self.asset_configs.insert(
            asset,
            AssetConfig {
                liquidation_discount,
                min_collateral_ratio,
                end_price: FixedPoint::ZERO,
                is_suspended: false,
            },
        );
        Ok(())
    }

    pub fn update_asset(
        &mut self,
        ctx: &CallContext,
        asset: AssetId,
        liquidation_discount: Permille,
        min_collateral_ratio: Permille,
    ) -> Result<(), LendingError> {
        ctx.require(Action::UpdateAsset)?;
        self.check_asset_params(liquidation_discount, min_collateral_ratio)?;
        let config = self.config_mut(asset)?;
        config.liquidation_discount = liquidation_discount;
        config.min_collateral_ratio = min_collateral_ratio;
        Ok(())
    }

    pub fn suspend_asset(&mut self, ctx: &CallContext, asset: AssetId) -> Result<(), LendingError> {
        ctx.require(Action::SuspendAsset)?;
        self.config_mut(asset)?.is_suspended = true;
        Ok(())
    }

    pub fn unsuspend_asset(&mut self, ctx: &CallContext, asset: AssetId) -> Result<(), LendingError> {
        ctx.require(Action::SuspendAsset)?;
        self.config_mut(asset)?.is_suspended = false;
        Ok(())
    }

    // freezes the asset at `end_price`. 100% so any solvent position can exit
    pub fn register_revoke(&mut self, ctx: &CallContext, asset: AssetId, end_price: FixedPoint) -> Result<(), LendingError> {
        ctx.require(Action::RegisterRevoke)?;
        let config = self.config_mut(asset)?;
        config.end_price = end_price;
        config.min_collateral_ratio = Permille::ONE;
        tracing::info!(%asset, %end_price, "asset migrating");
        Ok(())
    }

    pub fn asset_config(&self, asset: AssetId) -> Result<&AssetConfig, LendingError> {
        self.asset_configs.get(&asset).ok_or(LendingError::NoAssetRegistered(asset))
    }

    pub fn position(&self, index: PositionIndex) -> Result<&Position, LendingError> {
        self.positions.get(&index).ok_or(LendingError::PositionNotFound(index))
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn position_index_of(&self, key: &PositionKey) -> Option<PositionIndex> {
        self.open_positions.get(key).copied()
    }

    pub fn has_open_position(&self, key: &PositionKey) -> bool {
        self.open_positions.contains_key(key)
    }

    /// Books a new position under the next index.
    pub fn create_position(
        &mut self,
        key: PositionKey,
        asset_amount: FixedPoint,
        collateral_amount: FixedPoint,
        now: Timestamp,
    ) -> Result<PositionIndex, LendingError> {
        if let Some(existing) = self.position_index_of(&key) {
            return Err(LendingError::ExistSameAssetPosition(existing));
        }
        let index = PositionIndex(self.next_index);
        self.next_index += 1;

        self.positions.insert(
            index,
            Position {
                index,
                owner: key.owner,
                asset: key.asset,
                asset_amount,
                collateral: key.collateral,
                collateral_amount,
                is_short: key.is_short,
                is_closed: false,
                liquidated_amount: FixedPoint::ZERO,
                opened_at: now,
                updated_at: now,
            },
        );
        self.open_positions.insert(key, index);
        Ok(index)
    }

    /// Open position owned by the caller.
    pub fn owned_position(&self, ctx: &CallContext, index: PositionIndex) -> Result<&Position, LendingError> {
        let position = self.position(index)?;
        if position.owner != ctx.caller {
            return Err(LendingError::OnlyPositionOwner {
                index,
                caller: ctx.caller,
            });
        }
        self.open_position(index)
    }

    pub fn open_position(&self, index: PositionIndex) -> Result<&Position, LendingError> {
        let position = self.position(index)?;
        if position.is_closed {
            return Err(LendingError::PositionClosed(index));
        }
        Ok(position)
    }

    /// Writes back a mutated position and closes it when flagged.
    pub fn store_position(&mut self, mut position: Position, now: Timestamp) {
        position.updated_at = now;
        if position.is_closed {
            self.open_positions.remove(&position.key());
            tracing::info!(index = %position.index, owner = %position.owner, "position closed");
        }
        self.positions.insert(position.index, position);
    }

    fn check_asset_params(&self, discount: Permille, min_collateral_ratio: Permille) -> Result<(), LendingError> {
        if discount > self.params.max_liquidation_discount {
            return Err(LendingError::ExceedLimitLiquidationDiscount {
                discount,
                limit: self.params.max_liquidation_discount,
            });
        }
        let lower = self.params.min_collateral_ratio_lower;
        let upper = self.params.min_collateral_ratio_upper;
        if min_collateral_ratio < lower || min_collateral_ratio > upper {
            return Err(LendingError::InvalidMinCollateralRatio {
                ratio: min_collateral_ratio,
                lower,
                upper,
            });
        }
        Ok(())
    }

    fn config_mut(&mut self, asset: AssetId) -> Result<&mut AssetConfig, LendingError> {
        self.asset_configs
            .get_mut(&asset)
            .ok_or(LendingError::NoAssetRegistered(asset))
    }
}
