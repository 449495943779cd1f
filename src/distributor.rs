// 9.2 distributor.rs: holds the reward token float that the factory releases.
// anyone may trigger a distribution as long as there is something to distribute.

use crate::access::{AccessError, Action, CallContext};
use crate::math::FixedPoint;
use crate::token::{TokenError, TokenLedger};
use crate::types::{AccountId, AssetId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DistributorError {
    #[error("distributor holds no reward token")]
    NoBalance,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Access(#[from] AccessError),
}

#[derive(Debug, Clone)]
pub struct RewardDistributor {
    account: AccountId,
    reward_token: AssetId,
}

impl RewardDistributor {
    pub fn new(account: AccountId, reward_token: AssetId) -> Self {
        Self { account, reward_token }
    }

    pub fn account(&self) -> AccountId {
        self.account
    }

    /// Gate for a permissionless distribution. Returns the float available.
    pub fn check_trigger(&self, ctx: &CallContext, tokens: &TokenLedger) -> Result<FixedPoint, DistributorError> {
        ctx.require(Action::TriggerDistribution)?;
        let balance = tokens.balance_of(self.reward_token, self.account);
        if balance.is_zero() {
            return Err(DistributorError::NoBalance);
        }
        Ok(balance)
    }

    /// Sweeps the whole balance of `token` to the caller.
    pub fn withdraw(&self, ctx: &CallContext, tokens: &mut TokenLedger, token: AssetId) -> Result<FixedPoint, DistributorError> {
        ctx.require(Action::WithdrawDistributorBalance)?;
        let balance = tokens.balance_of(token, self.account);
        tokens.transfer(token, self.account, ctx.caller, balance)?;
        Ok(balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{AccessControl, Role};
    use crate::types::Timestamp;

    const OWNER: AccountId = AccountId(1);
    const DISTRIBUTOR: AccountId = AccountId(2);
    const KEEPER: AccountId = AccountId(3);

    #[test]
    fn empty_distributor_refuses() {
        let mut acl = AccessControl::new();
        acl.grant(OWNER, Role::Owner);
        let mut tokens = TokenLedger::new();
        let reward = tokens.create_token("RWD", OWNER);
        let distributor = RewardDistributor::new(DISTRIBUTOR, reward);
        let keeper = acl.context(KEEPER, Timestamp::from_secs(0));

        assert_eq!(distributor.check_trigger(&keeper, &tokens), Err(DistributorError::NoBalance));
        tokens.mint(reward, OWNER, DISTRIBUTOR, FixedPoint::from_uint(10)).unwrap();
        assert_eq!(distributor.check_trigger(&keeper, &tokens).unwrap(), FixedPoint::from_uint(10));
    }

    #[test]
    fn owner_sweeps_balance() {
        let mut acl = AccessControl::new();
        acl.grant(OWNER, Role::Owner);
        let mut tokens = TokenLedger::new();
        let reward = tokens.create_token("RWD", OWNER);
        tokens.mint(reward, OWNER, DISTRIBUTOR, FixedPoint::from_uint(10)).unwrap();
        let distributor = RewardDistributor::new(DISTRIBUTOR, reward);

        assert!(matches!(
            distributor.withdraw(&acl.context(KEEPER, Timestamp::from_secs(0)), &mut tokens, reward),
            Err(DistributorError::Access(_))
        ));
        let swept = distributor
            .withdraw(&acl.context(OWNER, Timestamp::from_secs(0)), &mut tokens, reward)
            .unwrap();
        assert_eq!(swept, FixedPoint::from_uint(10));
        assert_eq!(tokens.balance_of(reward, OWNER), FixedPoint::from_uint(10));
        assert_eq!(tokens.balance_of(reward, DISTRIBUTOR), FixedPoint::ZERO);
    }
}
