// 8.0 engine/core.rs: the protocol. holds every component, the token ledger and the clock.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::results::ProtocolError;
use crate::access::{AccessControl, Action, CallContext, Role};
use crate::collateral_manager::CollateralManager;
use crate::collateral_oracle::{CollateralOracle, CollateralPrice};
use crate::config::ProtocolConfig;
use crate::dex::Dex;
use crate::distributor::RewardDistributor;
use crate::events::{Event, EventLog, EventPayload};
use crate::factory::Factory;
use crate::lending::Lending;
use crate::math::FixedPoint;
use crate::oracle::PriceOracle;
use crate::position::{collateral_ratio, Position};
use crate::staking::Staking;
use crate::token::TokenLedger;
use crate::types::{AccountId, AssetId, PositionIndex, Timestamp};

/// Ledger accounts the protocol's own components hold funds on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolAccounts {
    pub owner: AccountId,
    pub treasury: AccountId,
    pub lending: AccountId,
    pub collateral_manager: AccountId,
    pub staking: AccountId,
    pub factory: AccountId,
    pub reward_distributor: AccountId,
}

/** 8.1: main protocol struct. all state lives here */
#[derive(Debug, Clone)]
pub struct Protocol {
    pub(super) config: ProtocolConfig,
    pub(super) accounts: ProtocolAccounts,
    pub(super) access: AccessControl,
    pub(super) tokens: TokenLedger,
    pub(super) oracle: PriceOracle,
    pub(super) collateral_oracle: CollateralOracle,
    pub(super) collateral_manager: CollateralManager,
    pub(super) staking: Staking,
    pub(super) lending: Lending,
    pub(super) factory: Factory,
    pub(super) distributor: RewardDistributor,
    pub(super) dex: Arc<dyn Dex>,
    pub(super) paused: bool,
    pub(super) events: EventLog,
    // raised by the call in progress, logged only if it succeeds
    pub(super) pending_events: Vec<EventPayload>,
    pub(super) next_account: u64,
    pub(super) current_time: Timestamp,
}

impl Protocol {
    pub fn new(config: ProtocolConfig, dex: Arc<dyn Dex>) -> Result<Self, ProtocolError> {
        config.validate()?;

        let router = dex.router();
        let mut next_account = 1;
        let mut allocate = || {
            if next_account == router.0 {
                next_account += 1;
            }
            let id = AccountId(next_account);
            next_account += 1;
            id
        };
        let accounts = ProtocolAccounts {
            owner: allocate(),
            treasury: allocate(),
            lending: allocate(),
            collateral_manager: allocate(),
            staking: allocate(),
            factory: allocate(),
            reward_distributor: allocate(),
        };

        let mut access = AccessControl::new();
        access.grant(accounts.owner, Role::Owner);
        access.grant(accounts.factory, Role::Factory);
        access.grant(accounts.lending, Role::Lending);
        access.grant(accounts.reward_distributor, Role::RewardDistributor);

        let mut tokens = TokenLedger::new();
        let reward_token = tokens.create_token("RWD", accounts.owner);

        let lending = Lending::new(
            accounts.lending,
            config.lending_params(),
            config.fees.protocol_fee,
            accounts.treasury,
        );

        tracing::info!(owner = %accounts.owner, %reward_token, "protocol deployed");

        Ok(Self {
            collateral_oracle: CollateralOracle::new(config.bounds.min_collateral_multiplier),
            collateral_manager: CollateralManager::new(accounts.collateral_manager),
            staking: Staking::new(accounts.staking, reward_token, config.premium_min_update_interval),
            factory: Factory::new(accounts.factory, reward_token, accounts.treasury),
            distributor: RewardDistributor::new(accounts.reward_distributor, reward_token),
            events: EventLog::new(config.max_events),
            oracle: PriceOracle::new(),
            pending_events: Vec::new(),
            paused: false,
            current_time: Timestamp::from_secs(0),
            next_account,
            config,
            accounts,
            access,
            tokens,
            lending,
            dex,
        })
    }

    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    pub fn advance_time(&mut self, secs: u64) {
        self.current_time = self.current_time.plus(secs);
    }

    /// Fresh ledger account for a user or keeper.
    pub fn create_account(&mut self) -> AccountId {
        if self.next_account == self.dex.router().0 {
            self.next_account += 1;
        }
        let id = AccountId(self.next_account);
        self.next_account += 1;
        id
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn accounts(&self) -> &ProtocolAccounts {
        &self.accounts
    }

    pub fn reward_token(&self) -> AssetId {
        self.staking.reward_token()
    }

    pub fn tokens(&self) -> &TokenLedger {
        &self.tokens
    }

    pub fn oracle(&self) -> &PriceOracle {
        &self.oracle
    }

    pub fn collateral_oracle(&self) -> &CollateralOracle {
        &self.collateral_oracle
    }

    pub fn collateral_manager(&self) -> &CollateralManager {
        &self.collateral_manager
    }

    pub fn staking(&self) -> &Staking {
        &self.staking
    }

    pub fn lending(&self) -> &Lending {
        &self.lending
    }

    pub fn factory(&self) -> &Factory {
        &self.factory
    }

    pub fn dex(&self) -> &dyn Dex {
        self.dex.as_ref()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn events(&self) -> &[Event] {
        self.events.events()
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        self.events.recent(count)
    }

    pub fn position(&self, index: PositionIndex) -> Result<&Position, ProtocolError> {
        Ok(self.lending.position(index)?)
    }

    pub fn balance_of(&self, token: AssetId, account: AccountId) -> FixedPoint {
        self.tokens.balance_of(token, account)
    }

    pub fn asset_price(&self, asset: AssetId) -> Result<FixedPoint, ProtocolError> {
        Ok(self.oracle.query_asset_price(asset, self.current_time)?.price)
    }

    pub fn collateral_price(&self, collateral: AssetId) -> Result<CollateralPrice, ProtocolError> {
        Ok(self
            .collateral_oracle
            .query_collateral_price(&self.oracle, collateral, self.current_time)?)
    }

    /// Current collateral ratio of a position. None when nothing is owed.
    pub fn position_ratio(&self, index: PositionIndex) -> Result<Option<FixedPoint>, ProtocolError> {
        let position = self.lending.position(index)?;
        let collateral_value = self.collateral_price(position.collateral)?.value_of(position.collateral_amount)?;
        let asset_value = position.asset_value(self.asset_price(position.asset)?)?;
        Ok(collateral_ratio(collateral_value, asset_value)?)
    }

    // plain token surface. the caller becomes the minter of tokens it creates
    pub fn create_token(&mut self, caller: AccountId, symbol: &str) -> AssetId {
        self.tokens.create_token(symbol, caller)
    }

    pub fn mint_token(&mut self, caller: AccountId, token: AssetId, to: AccountId, amount: FixedPoint) -> Result<(), ProtocolError> {
        Ok(self.tokens.mint(token, caller, to, amount)?)
    }

    pub fn approve(&mut self, caller: AccountId, token: AssetId, spender: AccountId, amount: FixedPoint) -> Result<(), ProtocolError> {
        Ok(self.tokens.approve(token, caller, spender, amount)?)
    }

    pub fn transfer(&mut self, caller: AccountId, token: AssetId, to: AccountId, amount: FixedPoint) -> Result<(), ProtocolError> {
        Ok(self.tokens.transfer(token, caller, to, amount)?)
    }

    pub fn pause(&mut self, caller: AccountId) -> Result<(), ProtocolError> {
        self.transact("pause", |p| {
            p.ctx(caller).require(Action::Pause)?;
            p.paused = true;
            p.emit_event(EventPayload::Paused(caller));
            Ok(())
        })
    }

    pub fn unpause(&mut self, caller: AccountId) -> Result<(), ProtocolError> {
        self.transact("unpause", |p| {
            p.ctx(caller).require(Action::Pause)?;
            p.paused = false;
            p.emit_event(EventPayload::Unpaused(caller));
            Ok(())
        })
    }

    pub(super) fn ctx(&self, caller: AccountId) -> CallContext {
        self.access.context(caller, self.current_time)
    }

    pub(super) fn as_lending(&self) -> CallContext {
        self.ctx(self.accounts.lending)
    }

    pub(super) fn as_factory(&self) -> CallContext {
        self.ctx(self.accounts.factory)
    }

    pub(super) fn as_distributor(&self) -> CallContext {
        self.ctx(self.accounts.reward_distributor)
    }

    pub(super) fn ensure_not_paused(&self) -> Result<(), ProtocolError> {
        if self.paused {
            return Err(ProtocolError::Paused);
        }
        Ok(())
    }

    /// Runs `op` all-or-nothing: on error every component, the ledger and the pending
    /// events are restored to their state before the call.
    pub(super) fn transact<T>(
        &mut self,
        name: &'static str,
        op: impl FnOnce(&mut Self) -> Result<T, ProtocolError>,
    ) -> Result<T, ProtocolError> {
        // the committed log is never touched by a call, keep it out of the snapshot
        let log = std::mem::take(&mut self.events);
        let snapshot = self.clone();
        self.events = log;

        match op(self) {
            Ok(value) => {
                let now = self.current_time;
                for payload in std::mem::take(&mut self.pending_events) {
                    self.events.record(now, payload);
                }
                Ok(value)
            }
            Err(err) => {
                tracing::debug!(call = name, error = %err, "call reverted");
                let log = std::mem::take(&mut self.events);
                *self = snapshot;
                self.events = log;
                Err(err)
            }
        }
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        self.pending_events.push(payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dex::MockDex;

    fn protocol(router: u64) -> Protocol {
        Protocol::new(ProtocolConfig::default(), Arc::new(MockDex::new(AccountId(router)))).unwrap()
    }

    #[test]
    fn component_accounts_skip_the_router() {
        let mut protocol = protocol(3);
        let accounts = *protocol.accounts();
        assert_eq!(accounts.owner, AccountId(1));
        assert_eq!(accounts.treasury, AccountId(2));
        assert_eq!(accounts.lending, AccountId(4));
        assert_eq!(accounts.reward_distributor, AccountId(8));
        assert_eq!(protocol.create_account(), AccountId(9));
    }

    #[test]
    fn failed_call_restores_state_and_drops_events() {
        let mut protocol = protocol(100);
        let owner = protocol.accounts().owner;
        let result: Result<(), ProtocolError> = protocol.transact("test", |p| {
            p.paused = true;
            p.emit_event(EventPayload::Paused(owner));
            Err(ProtocolError::Paused)
        });
        assert_eq!(result, Err(ProtocolError::Paused));
        assert!(!protocol.is_paused());
        assert!(protocol.events().is_empty());

        protocol.pause(owner).unwrap();
        assert!(protocol.is_paused());
        assert_eq!(protocol.events().len(), 1);
    }

    #[test]
    fn pause_is_owner_only() {
        let mut protocol = protocol(100);
        let stranger = protocol.create_account();
        let err = protocol.pause(stranger).unwrap_err();
        assert!(err.is_access_denied());
        assert!(!protocol.is_paused());
    }

    #[test]
    fn invalid_config_rejected() {
        let mut config = ProtocolConfig::default();
        config.max_events = 0;
        let err = Protocol::new(config, Arc::new(MockDex::new(AccountId(100)))).unwrap_err();
        assert!(matches!(err, ProtocolError::Config(_)));
    }
}
