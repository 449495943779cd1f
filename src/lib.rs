// synth-lending: synthetic asset lending, liquidation and short staking rewards.
// collateral-first architecture: every position is overcollateralized at all times
// outside a liquidation. all computation is deterministic with no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: AccountId, AssetId, PositionIndex, Permille, Timestamp
//   2.x  math.rs: 18 decimal fixed point on U256, erf curve
//   3.x  token.rs: in process token ledger
//   4.0  price_feed.rs: price feed trait + mock
//   4.1  oracle.rs: feed registry, staleness checks
//   4.2  collateral_oracle.rs: collateral multipliers, revoke/suspend, end prices
//   5.x  collateral_manager.rs: pooled collateral custody
//   6.x  staking.rs: short bonds, reward accumulator, premium weight curve
//   7.x  position.rs: position struct, ratio checks
//   7.2  lending.rs: position book, asset configs, lending admin
//   7.3  liquidation.rs: liquidation and burn settlement math
//   8.x  engine/: protocol: positions, liquidations, rewards, admin
//   9.0  factory.rs: synthetic assets, weights, emission schedules
//   9.1  dex.rs: swap integration (mocked)
//   9.2  distributor.rs: reward float, distribution trigger
//   10.x access.rs: roles and the authorization table
//   11.x events.rs: state transition events for audit
//   12.x config.rs: fees, bounds, env presets

// core lending modules
pub mod engine;
pub mod events;
pub mod lending;
pub mod liquidation;
pub mod math;
pub mod position;
pub mod types;

// oracle and reward modules
pub mod collateral_manager;
pub mod collateral_oracle;
pub mod oracle;
pub mod staking;

// integration modules
pub mod access;
pub mod config;
pub mod dex;
pub mod distributor;
pub mod factory;
pub mod price_feed;
pub mod token;

// re exports for convenience
pub use engine::*;
pub use events::*;
pub use lending::*;
pub use liquidation::*;
pub use math::*;
pub use position::*;
pub use types::*;
pub use access::{AccessControl, AccessError, Action, CallContext, Role};
pub use collateral_manager::{CollateralError, CollateralManager};
pub use collateral_oracle::{CollateralInfo, CollateralOracle, CollateralOracleError, CollateralPrice};
pub use config::{AssetBounds, ConfigError, Environment, FeeConfig, ProtocolConfig};
pub use dex::{Dex, DexError, MockDex, SwapParams, SwapRequest};
pub use distributor::{DistributorError, RewardDistributor};
pub use factory::{AssetDistribution, AssetInfo, DistributionPlan, DistributionSchedule, Factory, FactoryError};
pub use oracle::{AssetPrice, OracleError, PriceOracle};
pub use price_feed::{MockPriceFeed, PriceFeed, RoundData};
pub use staking::{premium_rate, short_reward_weight, PoolInfo, PremiumAdjustment, Staking, StakingError, UserReward};
pub use token::{TokenError, TokenInfo, TokenLedger};
