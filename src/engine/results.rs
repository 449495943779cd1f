// 8.0.2: result types and errors for protocol entry points.

use crate::access::AccessError;
use crate::collateral_manager::CollateralError;
use crate::collateral_oracle::CollateralOracleError;
use crate::config::ConfigError;
use crate::dex::DexError;
use crate::distributor::DistributorError;
use crate::factory::FactoryError;
use crate::lending::LendingError;
use crate::math::{FixedPoint, MathError};
use crate::oracle::OracleError;
use crate::staking::StakingError;
use crate::token::TokenError;
use crate::types::{AccountId, PositionIndex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenResult {
    pub index: PositionIndex,
    pub minted: FixedPoint,
    // collateral the caller received from the short swap
    pub swap_output: Option<FixedPoint>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintResult {
    pub minted: FixedPoint,
    pub swap_output: Option<FixedPoint>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawResult {
    pub withdrawn: FixedPoint,
    pub closed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurnResult {
    pub burned: FixedPoint,
    pub protocol_fee: FixedPoint,
    pub released_collateral: FixedPoint,
    pub closed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidationResult {
    pub index: PositionIndex,
    pub owner: AccountId,
    pub liquidated_amount: FixedPoint,
    pub returned_collateral: FixedPoint,
    pub protocol_fee: FixedPoint,
    pub liquidator_collateral: FixedPoint,
    pub owner_refund: FixedPoint,
    pub closed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("protocol is paused")]
    Paused,

    #[error("access denied: {0}")]
    Access(#[from] AccessError),

    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("collateral oracle error: {0}")]
    CollateralOracle(#[from] CollateralOracleError),

    #[error("collateral error: {0}")]
    Collateral(#[from] CollateralError),

    #[error("staking error: {0}")]
    Staking(#[from] StakingError),

    #[error("lending error: {0}")]
    Lending(#[from] LendingError),

    #[error("factory error: {0}")]
    Factory(#[from] FactoryError),

    #[error("distributor error: {0}")]
    Distributor(#[from] DistributorError),

    #[error("token error: {0}")]
    Token(#[from] TokenError),

    #[error("dex error: {0}")]
    Dex(#[from] DexError),

    #[error("math error: {0}")]
    Math(#[from] MathError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl ProtocolError {
    /// true when a role check failed somewhere down the call
    pub fn is_access_denied(&self) -> bool {
        match self {
            ProtocolError::Access(_) => true,
            ProtocolError::Oracle(OracleError::Access(_)) => true,
            ProtocolError::CollateralOracle(CollateralOracleError::Access(_)) => true,
            ProtocolError::Collateral(CollateralError::Access(_)) => true,
            ProtocolError::Staking(StakingError::Access(_)) => true,
            ProtocolError::Lending(LendingError::Access(_) | LendingError::OnlyPositionOwner { .. }) => true,
            ProtocolError::Factory(FactoryError::Access(_)) => true,
            ProtocolError::Distributor(DistributorError::Access(_)) => true,
            _ => false,
        }
    }
}
