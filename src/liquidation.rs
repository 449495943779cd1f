//! 7.3: liquidation and burn settlement math.
//!
//! A liquidator burns synthetic asset and receives collateral priced at a discount to
//! the oracle, so the liquidator earns the discount. A protocol fee on the burned value
//! goes to the fee receiver. Payout never exceeds the position's collateral: when the
//! discounted value would, the liquidated amount itself shrinks to fit.

use serde::{Deserialize, Serialize};

use crate::math::{FixedPoint, MathError};
use crate::types::Permille;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationQuote {
    /// asset actually burned
    pub liquidated_amount: FixedPoint,
    /// collateral taken out of the position
    pub returned_collateral: FixedPoint,
    pub protocol_fee: FixedPoint,
    /// returned_collateral - protocol_fee
    pub liquidator_collateral: FixedPoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnQuote {
    pub protocol_fee: FixedPoint,
    /// collateral released to the owner (migration only)
    pub released_collateral: FixedPoint,
    /// total collateral leaving the position
    pub collateral_debit: FixedPoint,
}

/// asset amount expressed in collateral units
pub fn value_in_collateral(amount: FixedPoint, asset_price: FixedPoint, collateral_price: FixedPoint) -> Result<FixedPoint, MathError> {
    amount.mul(asset_price)?.div(collateral_price)
}

/// `amount` must already be clamped to the position's asset amount.
pub fn quote_liquidation(
    amount: FixedPoint,
    collateral_amount: FixedPoint,
    asset_price: FixedPoint,
    collateral_price: FixedPoint,
    discount: Permille,
    protocol_fee: Permille,
) -> Result<LiquidationQuote, MathError> {
    let discounted = FixedPoint::ONE.sub(discount.as_fixed())?;

    let mut liquidated_amount = amount;
    let mut returned_collateral = value_in_collateral(amount, asset_price, collateral_price)?.div(discounted)?;

    if returned_collateral > collateral_amount {
        liquidated_amount = collateral_amount
            .mul(discounted)?
            .mul(collateral_price)?
            .div(asset_price)?;
        returned_collateral = collateral_amount;
    }

    let fee = value_in_collateral(liquidated_amount, asset_price, collateral_price)?
        .mul(protocol_fee.as_fixed())?
        .min(returned_collateral);

    Ok(LiquidationQuote {
        liquidated_amount,
        returned_collateral,
        protocol_fee: fee,
        liquidator_collateral: returned_collateral.sub(fee)?,
    })
}

/// Fee and collateral movement for burning `amount` of asset priced at `asset_price`
/// (the end price while migrating). `amount` must already be clamped.
pub fn quote_burn(
    amount: FixedPoint,
    collateral_amount: FixedPoint,
    asset_price: FixedPoint,
    collateral_price: FixedPoint,
    protocol_fee: Permille,
    migrating: bool,
) -> Result<BurnQuote, MathError> {
    let burned_value = value_in_collateral(amount, asset_price, collateral_price)?;
    let fee = burned_value.mul(protocol_fee.as_fixed())?;

    if migrating {
        let released = burned_value.min(collateral_amount);
        let fee = fee.min(released);
        Ok(BurnQuote {
            protocol_fee: fee,
            released_collateral: released.sub(fee)?,
            collateral_debit: released,
        })
    } else {
        let fee = fee.min(collateral_amount);
        Ok(BurnQuote {
            protocol_fee: fee,
            released_collateral: FixedPoint::ZERO,
            collateral_debit: fee,
        })
    }
}
