//! Synthetic lending protocol simulation.
//!
//! Walks the protocol through its lifecycle: long and short positions, a price shock
//! with liquidation, premium driven reward distribution, and an asset revocation.
//! Set `RUST_LOG=debug` to see reverted calls as well.

use std::sync::Arc;

use rust_decimal_macros::dec;
use synth_lending::*;
use tracing_subscriber::EnvFilter;

const ROUTER: AccountId = AccountId(1_000);

fn main() -> Result<(), ProtocolError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    println!("Synthetic Lending Protocol Simulation");
    println!("DAI collateral, zAAPL synthetic, 200% positions\n");

    scenario_1_long_and_short()?;
    scenario_2_price_shock_and_liquidation()?;
    scenario_3_premium_and_rewards()?;
    scenario_4_revocation_and_migration()?;

    println!("\nAll simulations completed successfully.");
    Ok(())
}

/// One collateral, one synthetic asset and a funded dex pool.
struct Market {
    protocol: Protocol,
    dex: MockDex,
    asset_feed: MockPriceFeed,
    dai: AssetId,
    zaapl: AssetId,
    owner: AccountId,
}

impl Market {
    fn new() -> Result<Self, ProtocolError> {
        let dex = MockDex::new(ROUTER);
        let mut protocol = Protocol::new(ProtocolConfig::default(), Arc::new(dex.clone()))?;
        protocol.set_time(Timestamp::now());
        let now = protocol.time();
        let owner = protocol.accounts().owner;

        let dai = protocol.create_token(owner, "DAI");
        protocol.set_price_aggregator(owner, dai, Arc::new(MockPriceFeed::from_units("DAI / USD", 1, now)))?;
        protocol.register_collateral(owner, dai, Permille::ONE)?;

        let zaapl = protocol.create_asset(owner, "zAAPL")?;
        let asset_feed = MockPriceFeed::from_units("AAPL / USD", 100, now);
        protocol.set_price_aggregator(owner, zaapl, Arc::new(asset_feed.clone()))?;
        dex.set_pool_price(zaapl, FixedPoint::from_uint(100));
        protocol.enable_asset(owner, zaapl, 1, Permille(200), Permille(1500))?;

        protocol.mint_token(owner, dai, ROUTER, FixedPoint::from_uint(1_000_000))?;

        Ok(Self {
            protocol,
            dex,
            asset_feed,
            dai,
            zaapl,
            owner,
        })
    }

    fn funded_user(&mut self, amount: u128) -> Result<AccountId, ProtocolError> {
        let user = self.protocol.create_account();
        let manager = self.protocol.accounts().collateral_manager;
        self.protocol.mint_token(self.owner, self.dai, user, FixedPoint::from_uint(amount))?;
        self.protocol.approve(user, self.dai, manager, FixedPoint::MAX)?;
        Ok(user)
    }

    fn set_asset_price(&mut self, units: u64) {
        self.asset_feed.set_units(units, self.protocol.time());
    }
}

/// Long mints straight to the user, short sells the mint for more collateral.
fn scenario_1_long_and_short() -> Result<(), ProtocolError> {
    println!("Scenario 1: Long and Short Positions\n");
    let mut market = Market::new()?;
    let alice = market.funded_user(1_000)?;
    let bob = market.funded_user(1_000)?;

    let long = market.protocol.open_position(
        alice,
        market.zaapl,
        market.dai,
        FixedPoint::from_uint(1_000),
        Permille(2000),
        SwapParams::long(),
    )?;
    println!("  Alice opens long #{}: minted {} zAAPL", long.index.0, long.minted);
    println!("  Alice zAAPL balance: {}", market.protocol.balance_of(market.zaapl, alice));

    let short = market.protocol.open_position(
        bob,
        market.zaapl,
        market.dai,
        FixedPoint::from_uint(1_000),
        Permille(2000),
        SwapParams::short(FixedPoint::from_uint(490)),
    )?;
    let swapped = short.swap_output.unwrap_or_default();
    println!("  Bob opens short #{}: minted {} zAAPL, sold for {} DAI", short.index.0, short.minted, swapped);
    println!(
        "  Bob bonded: {}\n",
        market.protocol.staking().user_reward(bob, market.zaapl).bond_amount
    );

    market.protocol.deposit(alice, long.index, market.dai, FixedPoint::from_uint(100))?;
    let position = market.protocol.position(long.index)?;
    println!("  Alice deposits 100 DAI, collateral now {}", position.collateral_amount);

    let withdrawn = market
        .protocol
        .withdraw(alice, long.index, market.dai, FixedPoint::from_uint(10_000));
    match withdrawn {
        Err(err) => println!("  Alice tries to withdraw everything: rejected ({err})\n"),
        Ok(result) => println!("  Alice withdrew {}\n", result.withdrawn),
    }
    Ok(())
}

/// Asset rallies 50%, a keeper liquidates part of the position at a 20% discount.
fn scenario_2_price_shock_and_liquidation() -> Result<(), ProtocolError> {
    println!("Scenario 2: Price Shock and Liquidation\n");
    let mut market = Market::new()?;
    let alice = market.funded_user(1_000)?;
    let keeper = market.funded_user(0)?;

    let opened = market.protocol.open_position(
        alice,
        market.zaapl,
        market.dai,
        FixedPoint::from_uint(1_000),
        Permille(2000),
        SwapParams::long(),
    )?;
    market
        .protocol
        .transfer(alice, market.zaapl, keeper, FixedPoint::from_uint(5))?;

    market.set_asset_price(150);
    let ratio = market.protocol.position_ratio(opened.index)?.unwrap_or_default();
    println!("  zAAPL rallies to 150, position ratio {}", ratio.truncate_to(4));

    let result = market
        .protocol
        .liquidate(keeper, opened.index, market.zaapl, FixedPoint::from_uint(3))?;
    println!(
        "  Keeper liquidates {} zAAPL: {} DAI out of the position, {} fee",
        result.liquidated_amount, result.returned_collateral, result.protocol_fee
    );
    let position = market.protocol.position(opened.index)?;
    println!(
        "  Position left: {} zAAPL against {} DAI, closed: {}",
        position.asset_amount, position.collateral_amount, position.is_closed
    );

    market.set_asset_price(133);
    match market
        .protocol
        .liquidate(keeper, opened.index, market.zaapl, FixedPoint::from_uint(1))
    {
        Err(err) => println!("  At 133 the position is safe again: {err}\n"),
        Ok(_) => println!("  Unexpected second liquidation\n"),
    }
    Ok(())
}

/// Dex trades at a premium, shorts earn most of the emitted rewards.
fn scenario_3_premium_and_rewards() -> Result<(), ProtocolError> {
    println!("Scenario 3: Premium and Reward Distribution\n");
    let mut market = Market::new()?;
    let bob = market.funded_user(1_000)?;
    let keeper = market.funded_user(0)?;

    market.protocol.open_position(
        bob,
        market.zaapl,
        market.dai,
        FixedPoint::from_uint(1_000),
        Permille(2000),
        SwapParams::short(FixedPoint::ZERO),
    )?;

    market.dex.set_pool_price(market.zaapl, FixedPoint::from_uint(103));
    let adjusted = market.protocol.adjust_premium(keeper, &[market.zaapl])?;
    for adjustment in &adjusted {
        println!(
            "  Premium {} -> short weight {}",
            adjustment.premium_rate,
            adjustment.short_reward_weight.truncate_to(6)
        );
    }
    let again = market.protocol.adjust_premium(keeper, &[market.zaapl])?;
    println!("  Immediate second adjustment updated {} assets", again.len());

    let now = market.protocol.time();
    let owner = market.owner;
    market.protocol.update_distribution_schedule(
        owner,
        vec![DistributionSchedule {
            start: now,
            end: now.plus(86_400),
            amount: FixedPoint::from_uint(86_400),
        }],
    )?;
    let reward = market.protocol.reward_token();
    let distributor = market.protocol.accounts().reward_distributor;
    market
        .protocol
        .mint_token(owner, reward, distributor, FixedPoint::from_uint(86_400))?;

    market.protocol.advance_time(3_600);
    let plan = market.protocol.distribute(keeper)?;
    println!(
        "  After one hour: {} emitted, {} to shorts, {} to treasury",
        plan.emitted,
        plan.short_total.truncate_to(6),
        plan.treasury_total.truncate_to(6)
    );

    let paid = market.protocol.withdraw_reward(bob, market.zaapl)?;
    println!("  Bob withdraws {} RWD\n", paid.truncate_to(6));
    Ok(())
}

/// Revoked asset freezes at its last price; holders burn out at that price.
fn scenario_4_revocation_and_migration() -> Result<(), ProtocolError> {
    println!("Scenario 4: Revocation and Migration\n");
    let mut market = Market::new()?;
    let alice = market.funded_user(1_000)?;

    let opened = market.protocol.open_position(
        alice,
        market.zaapl,
        market.dai,
        FixedPoint::from_uint(1_000),
        Permille(2000),
        SwapParams::long(),
    )?;

    market.set_asset_price(80);
    let owner = market.owner;
    let end_price = market.protocol.revoke_asset(owner, market.zaapl)?;
    println!("  zAAPL revoked at {}", end_price);

    match market.protocol.open_position(
        alice,
        market.zaapl,
        market.dai,
        FixedPoint::from_uint(10),
        Permille(2000),
        SwapParams::short(FixedPoint::ZERO),
    ) {
        Err(err) => println!("  New positions rejected: {err}"),
        Ok(_) => println!("  Unexpected open on a revoked asset"),
    }

    let burned = market
        .protocol
        .burn(alice, opened.index, market.zaapl, FixedPoint::from_decimal(dec!(5))?)?;
    println!(
        "  Alice burns {} zAAPL: {} DAI released, {} fee",
        burned.burned, burned.released_collateral, burned.protocol_fee
    );

    let withdrawn = market
        .protocol
        .withdraw(alice, opened.index, market.dai, FixedPoint::from_uint(10_000))?;
    println!(
        "  Alice withdraws the remaining {} DAI, position closed: {}",
        withdrawn.withdrawn, withdrawn.closed
    );
    println!("  Events recorded: {}", market.protocol.events().len());
    Ok(())
}
