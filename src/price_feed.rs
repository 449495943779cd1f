// 4.0 price_feed.rs: external price feed abstraction (mocked).
//
// The oracle layer is agnostic to where prices come from. A feed reports an integer answer
// with its own decimals and the time it was last updated, like an aggregator round.

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::math::{FixedPoint, MathError};
use crate::types::Timestamp;

/// Latest round reported by a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundData {
    pub answer: u128,
    pub decimals: u8,
    pub updated_at: Timestamp,
}

impl RoundData {
    pub fn new(answer: u128, decimals: u8, updated_at: Timestamp) -> Self {
        Self {
            answer,
            decimals,
            updated_at,
        }
    }

    /// answer normalised to 18 decimals. more than 77 decimals does not fit in 256 bits
    pub fn price(&self) -> Result<FixedPoint, MathError> {
        let scale = U256::from(10u8)
            .checked_pow(U256::from(self.decimals))
            .ok_or(MathError::Overflow)?;
        FixedPoint::from_ratio(U256::from(self.answer), scale)
    }
}

/// Read-only price source. Implementations must not mutate protocol state.
pub trait PriceFeed: fmt::Debug {
    fn description(&self) -> &str;

    fn latest_round(&self) -> RoundData;
}

#[derive(Debug)]
struct MockFeedState {
    answer: u128,
    updated_at: Timestamp,
}

/// Mock feed for tests and simulation. Clones share the same round, so a test can keep a
/// handle and move the price after the feed is registered with the oracle.
#[derive(Debug, Clone)]
pub struct MockPriceFeed {
    description: String,
    decimals: u8,
    state: Arc<RwLock<MockFeedState>>,
}

impl MockPriceFeed {
    pub const DEFAULT_DECIMALS: u8 = 8;

    pub fn new(description: &str, answer: u128, updated_at: Timestamp) -> Self {
        Self::with_decimals(description, answer, Self::DEFAULT_DECIMALS, updated_at)
    }

    pub fn with_decimals(description: &str, answer: u128, decimals: u8, updated_at: Timestamp) -> Self {
        Self {
            description: description.to_string(),
            decimals,
            state: Arc::new(RwLock::new(MockFeedState { answer, updated_at })),
        }
    }

    /// whole units at the feed's decimals. `from_units(100, ..)` reports 100.0
    pub fn from_units(description: &str, units: u64, updated_at: Timestamp) -> Self {
        let answer = units as u128 * 10u128.pow(Self::DEFAULT_DECIMALS as u32);
        Self::new(description, answer, updated_at)
    }

    pub fn set_answer(&self, answer: u128, updated_at: Timestamp) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.answer = answer;
        state.updated_at = updated_at;
    }

    pub fn set_units(&self, units: u64, updated_at: Timestamp) {
        let answer = 10u128.saturating_pow(self.decimals as u32).saturating_mul(units as u128);
        self.set_answer(answer, updated_at);
    }

    pub fn set_updated_at(&self, updated_at: Timestamp) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).updated_at = updated_at;
    }
}

impl PriceFeed for MockPriceFeed {
    fn description(&self) -> &str {
        &self.description
    }

    fn latest_round(&self) -> RoundData {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        RoundData::new(state.answer, self.decimals, state.updated_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn round_normalises_to_18_decimals() {
        let round = RoundData::new(10_000_000_000, 8, Timestamp::from_secs(1));
        assert_eq!(round.price().unwrap(), FixedPoint::from_uint(100));

        let six = RoundData::new(1_500_000, 6, Timestamp::from_secs(1));
        assert_eq!(six.price().unwrap(), FixedPoint::from_decimal(dec!(1.5)).unwrap());
    }

    #[test]
    fn oversized_decimals_error_instead_of_panicking() {
        let widest = RoundData::new(1, 77, Timestamp::from_secs(1));
        assert_eq!(widest.price().unwrap(), FixedPoint::ZERO);

        let round = RoundData::new(10_000_000_000, 78, Timestamp::from_secs(1));
        assert_eq!(round.price(), Err(MathError::Overflow));
        let round = RoundData::new(1, u8::MAX, Timestamp::from_secs(1));
        assert_eq!(round.price(), Err(MathError::Overflow));
    }

    #[test]
    fn mock_feed_handles_share_state() {
        let feed = MockPriceFeed::from_units("ZAT/USD", 100, Timestamp::from_secs(10));
        let registered = feed.clone();

        feed.set_units(150, Timestamp::from_secs(20));
        let round = registered.latest_round();
        assert_eq!(round.price().unwrap(), FixedPoint::from_uint(150));
        assert_eq!(round.updated_at, Timestamp::from_secs(20));
        assert_eq!(registered.description(), "ZAT/USD");
    }
}
