// 11.0: every successful state change produces an event. events raised inside a call that
// fails are discarded with it, so the log only ever shows committed history.

use serde::{Deserialize, Serialize};

use crate::math::FixedPoint;
use crate::types::{AccountId, AssetId, Permille, PositionIndex, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self { id, timestamp, payload }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPayload {
    // Position events
    OpenPosition(OpenPositionEvent),
    Deposit(CollateralMovedEvent),
    Withdraw(CollateralMovedEvent),
    Mint(AssetMovedEvent),
    Burn(BurnEvent),
    Liquidate(LiquidateEvent),
    PositionClosed(PositionClosedEvent),

    // Reward events
    AdjustPremium(AdjustPremiumEvent),
    WithdrawReward(WithdrawRewardEvent),
    Distribute(DistributeEvent),

    // Admin events
    AssetEnabled(AssetEnabledEvent),
    AssetRevoked(AssetRevokedEvent),
    WeightUpdated(AssetEnabledEvent),
    CollateralRegistered(CollateralRegisteredEvent),
    CollateralRevoked(AssetId),
    ProtocolFeeUpdated(Permille),
    FeeReceiverUpdated(AccountId),
    Paused(AccountId),
    Unpaused(AccountId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenPositionEvent {
    pub index: PositionIndex,
    pub owner: AccountId,
    pub asset: AssetId,
    pub asset_amount: FixedPoint,
    pub collateral: AssetId,
    pub collateral_amount: FixedPoint,
    pub collateral_ratio: Permille,
    pub is_short: bool,
}

// amounts are the clamped, actually applied figures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralMovedEvent {
    pub index: PositionIndex,
    pub collateral: AssetId,
    pub amount: FixedPoint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetMovedEvent {
    pub index: PositionIndex,
    pub asset: AssetId,
    pub amount: FixedPoint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnEvent {
    pub index: PositionIndex,
    pub asset: AssetId,
    pub amount: FixedPoint,
    pub protocol_fee: FixedPoint,
    pub released_collateral: FixedPoint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidateEvent {
    pub index: PositionIndex,
    pub liquidator: AccountId,
    pub asset: AssetId,
    pub amount: FixedPoint,
    pub returned_collateral: FixedPoint,
    pub protocol_fee: FixedPoint,
    pub owner_refund: FixedPoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    Drained,
    Liquidated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionClosedEvent {
    pub index: PositionIndex,
    pub owner: AccountId,
    pub reason: CloseReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustPremiumEvent {
    pub asset: AssetId,
    pub premium_rate: FixedPoint,
    pub short_reward_weight: FixedPoint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawRewardEvent {
    pub user: AccountId,
    pub asset: AssetId,
    pub amount: FixedPoint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributeEvent {
    pub emitted: FixedPoint,
    pub short_total: FixedPoint,
    pub treasury_total: FixedPoint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetEnabledEvent {
    pub asset: AssetId,
    pub weight: u32,
    pub total_weight: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRevokedEvent {
    pub asset: AssetId,
    pub end_price: FixedPoint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralRegisteredEvent {
    pub asset: AssetId,
    pub multiplier: Permille,
}

/** 11.1: bounded, append-only log. oldest events fall off once `max_events` is reached */
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<Event>,
    next_id: u64,
    max_events: usize,
}

impl EventLog {
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Vec::new(),
            next_id: 1,
            max_events,
        }
    }

    pub fn record(&mut self, timestamp: Timestamp, payload: EventPayload) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        self.events.push(Event::new(id, timestamp, payload));

        if self.events.len() > self.max_events {
            let drain_count = self.events.len() - self.max_events;
            self.events.drain(0..drain_count);
        }
        id
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn recent(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
