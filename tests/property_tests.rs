//! Property-based tests for the lending invariants.
//!
//! These tests verify the ratio, clamping and accumulator invariants hold under random
//! inputs.

mod common;

use std::collections::BTreeSet;

use common::*;
use proptest::prelude::*;
use rust_decimal_macros::dec;
use synth_lending::*;

// Strategies for generating test data
fn collateral_strategy() -> impl Strategy<Value = u128> {
    1u128..1_000_000u128
}

fn ratio_strategy() -> impl Strategy<Value = u32> {
    1500u32..=5000u32 // 150% to 500%
}

fn price_strategy() -> impl Strategy<Value = u64> {
    1u64..10_000u64
}

#[derive(Debug, Clone)]
enum StakeOp {
    Deposit(u64),
    Bond(u8, u64),
    Unbond(u8, u64),
}

fn stake_op_strategy() -> impl Strategy<Value = StakeOp> {
    prop_oneof![
        (0u64..10_000).prop_map(StakeOp::Deposit),
        (0u8..4, 1u64..10_000).prop_map(|(user, amount)| StakeOp::Bond(user, amount)),
        (0u8..4, 1u64..20_000).prop_map(|(user, amount)| StakeOp::Unbond(user, amount)),
    ]
}

proptest! {
    /// Minted amount is the collateral value divided by the requested ratio and the
    /// asset price, and the fresh position sits at or above the minimum.
    #[test]
    fn open_mints_collateral_value_over_ratio(
        collateral in collateral_strategy(),
        ratio in ratio_strategy(),
        price in price_strategy(),
    ) {
        let mut market = Market::new();
        market.set_asset_price(price);
        market.dex.set_pool_price(market.zaapl, units(u128::from(price)));
        let alice = market.funded_user(collateral);

        let opened = market
            .protocol
            .open_position(alice, market.zaapl, market.dai, units(collateral), Permille(ratio), SwapParams::long())
            .unwrap();

        let expected = units(collateral)
            .div_permille(Permille(ratio))
            .unwrap()
            .div(units(u128::from(price)))
            .unwrap();
        prop_assert_eq!(opened.minted, expected);

        let position = market.protocol.position(opened.index).unwrap();
        let asset_value = position.asset_value(units(u128::from(price))).unwrap();
        prop_assert!(meets_min_ratio(position.collateral_amount, asset_value, Permille(1500)).unwrap());
    }

    /// Liquidation succeeds exactly when the ratio is below the minimum.
    #[test]
    fn liquidation_iff_below_minimum(price in 50u64..400u64) {
        let mut market = Market::new();
        let alice = market.funded_user(1_000);
        let keeper = market.funded_user(0);
        let index = market.open_long(alice, 1_000, 2000);
        market.protocol.transfer(alice, market.zaapl, keeper, units(5)).unwrap();
        market.set_asset_price(price);

        // 1000 collateral against 5 units: below 150% iff 1000 * 1000 < 5 * price * 1500
        let below = 1_000u64 * 1_000 < 5 * price * 1_500;
        prop_assert_eq!(market.protocol.is_liquidatable(index).unwrap(), below);

        let result = market.protocol.liquidate(keeper, index, market.zaapl, units(1));
        if below {
            prop_assert!(result.is_ok());
        } else {
            prop_assert_eq!(
                result.unwrap_err(),
                ProtocolError::Lending(LendingError::LiquidateSafePosition(index))
            );
        }
    }

    /// Asking to liquidate more than is owed ends in the same state as asking for
    /// exactly what is owed.
    #[test]
    fn liquidation_clamp_is_idempotent(price in 134u64..400u64, extra in 1u128..1_000u128) {
        let mut base = Market::new();
        let alice = base.funded_user(1_000);
        let keeper = base.funded_user(0);
        let index = base.open_long(alice, 1_000, 2000);
        base.protocol.transfer(alice, base.zaapl, keeper, units(5)).unwrap();
        base.set_asset_price(price);

        let mut over = base.protocol.clone();
        let mut exact = base.protocol.clone();
        let clamped = over.liquidate(keeper, index, base.zaapl, units(5 + extra)).unwrap();
        let precise = exact.liquidate(keeper, index, base.zaapl, units(5)).unwrap();

        prop_assert_eq!(clamped, precise);
        prop_assert_eq!(over.position(index).unwrap(), exact.position(index).unwrap());
        prop_assert_eq!(over.balance_of(base.dai, keeper), exact.balance_of(base.dai, keeper));
        prop_assert_eq!(over.balance_of(base.dai, alice), exact.balance_of(base.dai, alice));
    }

    /// Same for withdraw once nothing is owed.
    #[test]
    fn withdraw_clamp_is_idempotent(collateral in 100u128..100_000u128, extra in 1u128..1_000_000u128) {
        let mut base = Market::new();
        let alice = base.funded_user(collateral);
        let index = base.open_long(alice, collateral, 2000);
        let minted = base.protocol.position(index).unwrap().asset_amount;
        base.protocol.burn(alice, index, base.zaapl, minted).unwrap();
        let left = base.protocol.position(index).unwrap().collateral_amount;

        let mut over = base.protocol.clone();
        let mut exact = base.protocol.clone();
        let clamped = over.withdraw(alice, index, base.dai, left.add(units(extra)).unwrap()).unwrap();
        let precise = exact.withdraw(alice, index, base.dai, left).unwrap();

        prop_assert!(precise.closed);
        prop_assert_eq!(clamped, precise);
        prop_assert_eq!(over.position(index).unwrap(), exact.position(index).unwrap());
        prop_assert_eq!(over.balance_of(base.dai, alice), exact.balance_of(base.dai, alice));
    }

    /// Reward per unit never decreases, whatever mix of deposits and bond changes.
    #[test]
    fn reward_unit_never_decreases(ops in proptest::collection::vec(stake_op_strategy(), 1..60)) {
        let factory = CallContext {
            caller: AccountId(2),
            roles: BTreeSet::from([Role::Factory]),
            now: START,
        };
        let lending = CallContext {
            caller: AccountId(3),
            roles: BTreeSet::from([Role::Lending]),
            now: START,
        };
        let asset = AssetId(7);
        let mut staking = Staking::new(AccountId(1), AssetId(1), 3_600);
        staking.register_pool_info(&factory, asset).unwrap();

        let mut last = FixedPoint::ZERO;
        for op in ops {
            match op {
                StakeOp::Deposit(amount) => {
                    staking.deposit_reward(&factory, &[(asset, units(u128::from(amount)))]).unwrap();
                }
                StakeOp::Bond(user, amount) => {
                    staking
                        .increase_short_token(&lending, AccountId(100 + u64::from(user)), asset, units(u128::from(amount)))
                        .unwrap();
                }
                StakeOp::Unbond(user, amount) => {
                    staking
                        .decrease_short_token(&lending, AccountId(100 + u64::from(user)), asset, units(u128::from(amount)))
                        .unwrap();
                }
            }
            let unit = staking.pool_info(asset).unwrap().reward_unit;
            prop_assert!(unit >= last, "reward unit fell from {} to {}", last, unit);
            last = unit;
        }
    }

    /// Short weight is a monotone curve inside [0, 1].
    #[test]
    fn short_weight_monotone_and_bounded(a in 0u32..200u32, b in 0u32..200u32) {
        let (low, high) = (a.min(b), a.max(b));
        let w_low = short_reward_weight(FixedPoint::from_permille(low)).unwrap();
        let w_high = short_reward_weight(FixedPoint::from_permille(high)).unwrap();
        prop_assert!(w_low <= w_high);
        prop_assert!(w_high <= FixedPoint::ONE);
    }
}

#[test]
fn weight_curve_fixed_points() {
    assert_eq!(short_reward_weight(FixedPoint::from_permille(20)).unwrap(), fp(dec!(0.5)));
    assert_eq!(short_reward_weight(FixedPoint::from_permille(500)).unwrap(), FixedPoint::ONE);
    let at_zero = short_reward_weight(FixedPoint::ZERO).unwrap();
    assert!(at_zero > fp(dec!(0.0065)) && at_zero < fp(dec!(0.0066)));
}
