// 7.0: collateralized debt positions. one open position per (owner, asset, collateral, side).
// 7.1 has the ratio math at the bottom: every comparison is done on raw integers so the
// boundary is exact.

use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::math::{FixedPoint, MathError};
use crate::types::{AccountId, AssetId, Permille, PositionIndex, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PositionKey {
    pub owner: AccountId,
    pub asset: AssetId,
    pub collateral: AssetId,
    pub is_short: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub index: PositionIndex,
    pub owner: AccountId,
    pub asset: AssetId,
    pub asset_amount: FixedPoint,
    pub collateral: AssetId,
    pub collateral_amount: FixedPoint,
    pub is_short: bool,
    pub is_closed: bool,
    // cumulative, never resets
    pub liquidated_amount: FixedPoint,
    pub opened_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Position {
    pub fn key(&self) -> PositionKey {
        PositionKey {
            owner: self.owner,
            asset: self.asset,
            collateral: self.collateral,
            is_short: self.is_short,
        }
    }

    pub fn is_open(&self) -> bool {
        !self.is_closed
    }

    pub fn asset_value(&self, asset_price: FixedPoint) -> Result<FixedPoint, MathError> {
        self.asset_amount.mul(asset_price)
    }
}

// 7.1: ratio checks. value * 1000 vs asset_value * min_ratio
fn ratio_sides(collateral_value: FixedPoint, asset_value: FixedPoint, min_ratio: Permille) -> Result<(U256, U256), MathError> {
    let lhs = collateral_value
        .raw()
        .checked_mul(U256::from(Permille::ONE.value()))
        .ok_or(MathError::Overflow)?;
    let rhs = asset_value
        .raw()
        .checked_mul(U256::from(min_ratio.value()))
        .ok_or(MathError::Overflow)?;
    Ok((lhs, rhs))
}

/// collateral_value / asset_value >= min_ratio
pub fn meets_min_ratio(collateral_value: FixedPoint, asset_value: FixedPoint, min_ratio: Permille) -> Result<bool, MathError> {
    let (lhs, rhs) = ratio_sides(collateral_value, asset_value, min_ratio)?;
    Ok(lhs >= rhs)
}

/// collateral_value / asset_value > min_ratio
pub fn exceeds_min_ratio(collateral_value: FixedPoint, asset_value: FixedPoint, min_ratio: Permille) -> Result<bool, MathError> {
    let (lhs, rhs) = ratio_sides(collateral_value, asset_value, min_ratio)?;
    Ok(lhs > rhs)
}

/// None when no asset is outstanding
pub fn collateral_ratio(collateral_value: FixedPoint, asset_value: FixedPoint) -> Result<Option<FixedPoint>, MathError> {
    if asset_value.is_zero() {
        return Ok(None);
    }
    collateral_value.div(asset_value).map(Some)
}

/// ratio in permille, truncated. saturates when nothing is owed
pub fn ratio_permille(collateral_value: FixedPoint, asset_value: FixedPoint) -> Result<Permille, MathError> {
    let Some(ratio) = collateral_ratio(collateral_value, asset_value)? else {
        return Ok(Permille(u32::MAX));
    };
    let permille = ratio.mul_div(u64::from(Permille::ONE.value()), 1)?.to_uint();
    Ok(Permille(if permille > U256::from(u32::MAX) {
        u32::MAX
    } else {
        permille.low_u32()
    }))
}

/// asset mintable at `ratio`: collateral_value / ratio / asset_price
pub fn mintable_amount(collateral_value: FixedPoint, ratio: Permille, asset_price: FixedPoint) -> Result<FixedPoint, MathError> {
    collateral_value.div_permille(ratio)?.div(asset_price)
}
