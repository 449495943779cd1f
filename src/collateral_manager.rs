// 5.0 collateral_manager.rs: custody of pooled collateral. pure ledger.
// never evaluates ratios. the lending engine is the only caller allowed to move funds.

use std::collections::HashMap;

use crate::access::{AccessError, Action, CallContext};
use crate::math::{FixedPoint, MathError};
use crate::token::{TokenError, TokenLedger};
use crate::types::{AccountId, AssetId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollateralError {
    #[error("decrease of {requested} {asset} exceeds {user}'s collateral {available}")]
    ExceedCollateralAmount {
        user: AccountId,
        asset: AssetId,
        available: FixedPoint,
        requested: FixedPoint,
    },

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("math error: {0}")]
    Math(#[from] MathError),
}

/** 5.1: per (user, asset) and per asset totals. funds sit on `account` in the token ledger */
#[derive(Debug, Clone)]
pub struct CollateralManager {
    account: AccountId,
    user_collaterals: HashMap<(AccountId, AssetId), FixedPoint>,
    total_collaterals: HashMap<AssetId, FixedPoint>,
}

impl CollateralManager {
    pub fn new(account: AccountId) -> Self {
        Self {
            account,
            user_collaterals: HashMap::new(),
            total_collaterals: HashMap::new(),
        }
    }

    pub fn account(&self) -> AccountId {
        self.account
    }

    // pulls from `payer`, which must have approved this manager's account
    pub fn increase_collateral(
        &mut self,
        ctx: &CallContext,
        tokens: &mut TokenLedger,
        user: AccountId,
        asset: AssetId,
        amount: FixedPoint,
        payer: AccountId,
    ) -> Result<(), CollateralError> {
        ctx.require(Action::IncreaseCollateral)?;

        let user_total = self.total_user_collateral(user, asset).add(amount)?;
        let pool_total = self.total_collateral(asset).add(amount)?;

        tokens.transfer_from(asset, self.account, payer, self.account, amount)?;

        self.user_collaterals.insert((user, asset), user_total);
        self.total_collaterals.insert(asset, pool_total);
        Ok(())
    }

    pub fn decrease_collateral(
        &mut self,
        ctx: &CallContext,
        tokens: &mut TokenLedger,
        user: AccountId,
        asset: AssetId,
        amount: FixedPoint,
        recipient: AccountId,
    ) -> Result<(), CollateralError> {
        ctx.require(Action::DecreaseCollateral)?;

        let available = self.total_user_collateral(user, asset);
        if amount > available {
            return Err(CollateralError::ExceedCollateralAmount {
                user,
                asset,
                available,
                requested: amount,
            });
        }
        let pool_total = self.total_collateral(asset).sub(amount)?;

        // debit before paying out
        self.user_collaterals.insert((user, asset), available.sub(amount)?);
        self.total_collaterals.insert(asset, pool_total);

        tokens.transfer(asset, self.account, recipient, amount)?;
        Ok(())
    }

    pub fn total_user_collateral(&self, user: AccountId, asset: AssetId) -> FixedPoint {
        self.user_collaterals.get(&(user, asset)).copied().unwrap_or_default()
    }

    pub fn total_collateral(&self, asset: AssetId) -> FixedPoint {
        self.total_collaterals.get(&asset).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{AccessControl, Role};
    use crate::types::Timestamp;

    const MINTER: AccountId = AccountId(1);
    const LENDING: AccountId = AccountId(2);
    const MANAGER: AccountId = AccountId(3);
    const ALICE: AccountId = AccountId(4);
    const BOB: AccountId = AccountId(5);

    fn units(n: u128) -> FixedPoint {
        FixedPoint::from_uint(n)
    }

    fn setup() -> (AccessControl, TokenLedger, AssetId, CollateralManager) {
        let mut acl = AccessControl::new();
        acl.grant(LENDING, Role::Lending);
        let mut tokens = TokenLedger::new();
        let dai = tokens.create_token("DAI", MINTER);
        tokens.mint(dai, MINTER, ALICE, units(10_000)).unwrap();
        tokens.approve(dai, ALICE, MANAGER, FixedPoint::MAX).unwrap();
        (acl, tokens, dai, CollateralManager::new(MANAGER))
    }

    #[test]
    fn increase_and_decrease_track_both_ledgers() {
        let (acl, mut tokens, dai, mut manager) = setup();
        let ctx = acl.context(LENDING, Timestamp::from_secs(0));

        manager.increase_collateral(&ctx, &mut tokens, ALICE, dai, units(1000), ALICE).unwrap();
        assert_eq!(manager.total_user_collateral(ALICE, dai), units(1000));
        assert_eq!(manager.total_collateral(dai), units(1000));
        assert_eq!(tokens.balance_of(dai, MANAGER), units(1000));

        // recipient can differ from the user
        manager.decrease_collateral(&ctx, &mut tokens, ALICE, dai, units(400), BOB).unwrap();
        assert_eq!(manager.total_user_collateral(ALICE, dai), units(600));
        assert_eq!(manager.total_collateral(dai), units(600));
        assert_eq!(tokens.balance_of(dai, BOB), units(400));
    }

    #[test]
    fn decrease_over_balance_fails() {
        let (acl, mut tokens, dai, mut manager) = setup();
        let ctx = acl.context(LENDING, Timestamp::from_secs(0));
        manager.increase_collateral(&ctx, &mut tokens, ALICE, dai, units(10), ALICE).unwrap();

        let err = manager
            .decrease_collateral(&ctx, &mut tokens, ALICE, dai, units(11), ALICE)
            .unwrap_err();
        assert!(matches!(err, CollateralError::ExceedCollateralAmount { .. }));
        assert_eq!(manager.total_user_collateral(ALICE, dai), units(10));
    }

    #[test]
    fn failed_pull_leaves_ledger_untouched() {
        let (acl, mut tokens, dai, mut manager) = setup();
        let ctx = acl.context(LENDING, Timestamp::from_secs(0));
        let err = manager
            .increase_collateral(&ctx, &mut tokens, BOB, dai, units(1), BOB)
            .unwrap_err();
        assert!(matches!(err, CollateralError::Token(TokenError::InsufficientAllowance { .. })));
        assert_eq!(manager.total_collateral(dai), FixedPoint::ZERO);
    }

    #[test]
    fn only_lending_moves_collateral() {
        let (acl, mut tokens, dai, mut manager) = setup();
        let ctx = acl.context(ALICE, Timestamp::from_secs(0));
        assert!(matches!(
            manager.increase_collateral(&ctx, &mut tokens, ALICE, dai, units(1), ALICE),
            Err(CollateralError::Access(_))
        ));
    }
}
