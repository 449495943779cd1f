// 12.0 config.rs: all protocol settings in one place. fees, asset bounds, premium cadence.
// 12.1 Environment picks a preset. validate() runs before a Protocol is built.

use serde::{Deserialize, Serialize};

use crate::lending::LendingParams;
use crate::types::Permille;

/** 12.2: fee settings. permille, 1000 = 100% */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeConfig {
    // charged on burned and liquidated value
    pub protocol_fee: Permille,
    // ceiling for update_protocol_fee
    pub max_protocol_fee: Permille,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            protocol_fee: Permille(15),
            max_protocol_fee: Permille(100),
        }
    }
}

// bounds every synthetic asset's lending config must sit inside
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetBounds {
    pub max_liquidation_discount: Permille,
    pub min_collateral_ratio_lower: Permille,
    pub min_collateral_ratio_upper: Permille,
    pub min_collateral_multiplier: Permille,
}

impl Default for AssetBounds {
    fn default() -> Self {
        Self {
            max_liquidation_discount: Permille(500),
            min_collateral_ratio_lower: Permille(1200),
            min_collateral_ratio_upper: Permille(1900),
            min_collateral_multiplier: Permille(1000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    pub fees: FeeConfig,
    pub bounds: AssetBounds,
    // seconds between premium recomputations per asset
    pub premium_min_update_interval: u64,
    // events retained in memory
    pub max_events: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            fees: FeeConfig::default(),
            bounds: AssetBounds::default(),
            premium_min_update_interval: 3600,
            max_events: 100_000,
        }
    }
}

impl ProtocolConfig {
    // fast premium cadence and no fee, for exercising flows by hand
    pub fn testnet() -> Self {
        let mut config = Self::default();
        config.fees.protocol_fee = Permille(0);
        config.premium_min_update_interval = 60;
        config
    }

    // tighter discount ceiling, longer event history
    pub fn mainnet() -> Self {
        let mut config = Self::default();
        config.bounds.max_liquidation_discount = Permille(300);
        config.max_events = 1_000_000;
        config
    }

    pub fn lending_params(&self) -> LendingParams {
        LendingParams {
            max_protocol_fee: self.fees.max_protocol_fee,
            max_liquidation_discount: self.bounds.max_liquidation_discount,
            min_collateral_ratio_lower: self.bounds.min_collateral_ratio_lower,
            min_collateral_ratio_upper: self.bounds.min_collateral_ratio_upper,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fees.protocol_fee > self.fees.max_protocol_fee {
            return Err(ConfigError::InvalidFees {
                reason: format!(
                    "protocol fee {} above maximum {}",
                    self.fees.protocol_fee, self.fees.max_protocol_fee
                ),
            });
        }
        if self.fees.max_protocol_fee >= Permille::ONE {
            return Err(ConfigError::InvalidFees {
                reason: "max protocol fee must be below 100%".to_string(),
            });
        }

        // discount of 100% would divide by zero in liquidation
        if self.bounds.max_liquidation_discount >= Permille::ONE {
            return Err(ConfigError::InvalidBounds {
                reason: "liquidation discount must be below 100%".to_string(),
            });
        }
        if self.bounds.min_collateral_ratio_lower < Permille::ONE
            || self.bounds.min_collateral_ratio_lower > self.bounds.min_collateral_ratio_upper
        {
            return Err(ConfigError::InvalidBounds {
                reason: "min collateral ratio bounds must satisfy 100% <= lower <= upper".to_string(),
            });
        }
        if self.bounds.min_collateral_multiplier.is_zero() {
            return Err(ConfigError::InvalidBounds {
                reason: "collateral multiplier floor must be positive".to_string(),
            });
        }

        if self.premium_min_update_interval == 0 {
            return Err(ConfigError::InvalidStaking {
                reason: "premium interval must be positive".to_string(),
            });
        }
        if self.max_events == 0 {
            return Err(ConfigError::InvalidEvents);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid fees: {reason}")]
    InvalidFees { reason: String },

    #[error("invalid asset bounds: {reason}")]
    InvalidBounds { reason: String },

    #[error("invalid staking settings: {reason}")]
    InvalidStaking { reason: String },

    #[error("event log must retain at least one event")]
    InvalidEvents,
}

// Environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Testnet,
    Mainnet,
}

impl Environment {
    pub fn config(&self) -> ProtocolConfig {
        match self {
            Environment::Development => ProtocolConfig::default(),
            Environment::Testnet => ProtocolConfig::testnet(),
            Environment::Mainnet => ProtocolConfig::mainnet(),
        }
    }
}
