//! Shared market fixture for the integration tests.
//!
//! One DAI collateral at 1.0, one synthetic zAAPL at 100.0 with a 20% liquidation
//! discount and a 150% minimum ratio, a dex pool at oracle price and a funded router.

#![allow(dead_code)]

use std::sync::Arc;

use rust_decimal::Decimal;
use synth_lending::*;

pub const ROUTER: AccountId = AccountId(1_000);
pub const START: Timestamp = Timestamp(1_700_000_000);

pub fn units(n: u128) -> FixedPoint {
    FixedPoint::from_uint(n)
}

pub fn fp(value: Decimal) -> FixedPoint {
    FixedPoint::from_decimal(value).unwrap()
}

pub struct Market {
    pub protocol: Protocol,
    pub dex: MockDex,
    pub asset_feed: MockPriceFeed,
    pub dai: AssetId,
    pub zaapl: AssetId,
    pub owner: AccountId,
}

impl Market {
    pub fn new() -> Self {
        Self::with_config(ProtocolConfig::default())
    }

    pub fn with_config(config: ProtocolConfig) -> Self {
        let dex = MockDex::new(ROUTER);
        let mut protocol = Protocol::new(config, Arc::new(dex.clone())).unwrap();
        protocol.set_time(START);
        let owner = protocol.accounts().owner;

        let dai = protocol.create_token(owner, "DAI");
        protocol
            .set_price_aggregator(owner, dai, Arc::new(MockPriceFeed::from_units("DAI / USD", 1, START)))
            .unwrap();
        protocol.register_collateral(owner, dai, Permille::ONE).unwrap();
        protocol.mint_token(owner, dai, ROUTER, units(1_000_000)).unwrap();

        let mut market = Self {
            protocol,
            dex,
            asset_feed: MockPriceFeed::from_units("AAPL / USD", 100, START),
            dai,
            zaapl: AssetId(0),
            owner,
        };
        let (zaapl, feed) = market.add_asset("zAAPL", 100, 1);
        market.zaapl = zaapl;
        market.asset_feed = feed;
        market
    }

    /// Creates, prices, pools and enables another synthetic asset.
    pub fn add_asset(&mut self, symbol: &str, price: u64, weight: u32) -> (AssetId, MockPriceFeed) {
        let owner = self.owner;
        let asset = self.protocol.create_asset(owner, symbol).unwrap();
        let feed = MockPriceFeed::from_units(symbol, price, self.protocol.time());
        self.protocol
            .set_price_aggregator(owner, asset, Arc::new(feed.clone()))
            .unwrap();
        self.dex.set_pool_price(asset, units(u128::from(price)));
        self.protocol
            .enable_asset(owner, asset, weight, Permille(200), Permille(1500))
            .unwrap();
        (asset, feed)
    }

    pub fn funded_user(&mut self, amount: u128) -> AccountId {
        let user = self.protocol.create_account();
        let manager = self.protocol.accounts().collateral_manager;
        self.protocol.mint_token(self.owner, self.dai, user, units(amount)).unwrap();
        self.protocol.approve(user, self.dai, manager, FixedPoint::MAX).unwrap();
        user
    }

    pub fn set_asset_price(&self, price: u64) {
        self.asset_feed.set_units(price, self.protocol.time());
    }

    pub fn open_long(&mut self, user: AccountId, collateral: u128, ratio: u32) -> PositionIndex {
        self.protocol
            .open_position(user, self.zaapl, self.dai, units(collateral), Permille(ratio), SwapParams::long())
            .unwrap()
            .index
    }

    pub fn open_short(&mut self, user: AccountId, collateral: u128, ratio: u32) -> PositionIndex {
        self.protocol
            .open_position(
                user,
                self.zaapl,
                self.dai,
                units(collateral),
                Permille(ratio),
                SwapParams::short(FixedPoint::ZERO),
            )
            .unwrap()
            .index
    }

    pub fn dai_of(&self, account: AccountId) -> FixedPoint {
        self.protocol.balance_of(self.dai, account)
    }

    pub fn zaapl_of(&self, account: AccountId) -> FixedPoint {
        self.protocol.balance_of(self.zaapl, account)
    }

    pub fn bond_of(&self, account: AccountId) -> FixedPoint {
        self.protocol.staking().user_reward(account, self.zaapl).bond_amount
    }

    pub fn treasury(&self) -> AccountId {
        self.protocol.accounts().treasury
    }
}
