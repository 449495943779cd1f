// 10.0 access.rs: role grants and the action -> role authorization table.
// components never consult a global admin. every mutating call receives a CallContext
// resolved here, and the component checks the action it is about to perform.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::types::{AccountId, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    Owner,
    Factory,
    Lending,
    RewardDistributor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    // price oracle
    SetPriceAggregator,
    SetAssetTimeFrame,
    // collateral oracle
    RegisterCollateral,
    RevokeCollateral,
    SuspendCollateral,
    UpdateCollateralEndPrice,
    UpdateCollateralMultiplier,
    // collateral manager
    IncreaseCollateral,
    DecreaseCollateral,
    // staking
    RegisterPoolInfo,
    IncreaseShortToken,
    DecreaseShortToken,
    DepositReward,
    WithdrawReward,
    AdjustPremium,
    UpdatePremiumInterval,
    // lending admin
    UpdateProtocolFee,
    SetFeeReceiver,
    RegisterAsset,
    UpdateAsset,
    SuspendAsset,
    RegisterRevoke,
    Pause,
    // lending user surface
    OpenPosition,
    ManagePosition,
    Liquidate,
    // factory
    CreateAsset,
    EnableAsset,
    UpdateWeight,
    RevokeAsset,
    UpdateDistributionSchedule,
    Distribute,
    MintAsset,
    BurnAsset,
    // reward distributor
    TriggerDistribution,
    WithdrawDistributorBalance,
}

impl Action {
    /// the authorization table. `None` means any caller may perform the action.
    pub fn required_role(self) -> Option<Role> {
        use Action::*;
        match self {
            SetPriceAggregator
            | SetAssetTimeFrame
            | RegisterCollateral
            | RevokeCollateral
            | SuspendCollateral
            | UpdateCollateralEndPrice
            | UpdateCollateralMultiplier
            | UpdatePremiumInterval
            | UpdateProtocolFee
            | SetFeeReceiver
            | UpdateAsset
            | SuspendAsset
            | Pause
            | CreateAsset
            | EnableAsset
            | UpdateWeight
            | RevokeAsset
            | UpdateDistributionSchedule
            | WithdrawDistributorBalance => Some(Role::Owner),

            RegisterPoolInfo | DepositReward | RegisterAsset | RegisterRevoke => Some(Role::Factory),

            IncreaseCollateral | DecreaseCollateral | IncreaseShortToken | DecreaseShortToken | MintAsset
            | BurnAsset => Some(Role::Lending),

            Distribute => Some(Role::RewardDistributor),

            WithdrawReward | AdjustPremium | OpenPosition | ManagePosition | Liquidate | TriggerDistribution => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("{caller} lacks role {required:?} for {action:?}")]
    OnlyRole {
        action: Action,
        caller: AccountId,
        required: Role,
    },
}

/// Caller identity, its resolved roles and the block time of the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    pub caller: AccountId,
    pub roles: BTreeSet<Role>,
    pub now: Timestamp,
}

impl CallContext {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn require(&self, action: Action) -> Result<(), AccessError> {
        match action.required_role() {
            Some(required) if !self.has_role(required) => Err(AccessError::OnlyRole {
                action,
                caller: self.caller,
                required,
            }),
            _ => Ok(()),
        }
    }
}

/** 10.1: who holds which role */
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessControl {
    grants: HashMap<AccountId, BTreeSet<Role>>,
}

impl AccessControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&mut self, account: AccountId, role: Role) {
        self.grants.entry(account).or_default().insert(role);
    }

    pub fn revoke(&mut self, account: AccountId, role: Role) {
        if let Some(roles) = self.grants.get_mut(&account) {
            roles.remove(&role);
        }
    }

    pub fn has_role(&self, account: AccountId, role: Role) -> bool {
        self.grants.get(&account).is_some_and(|roles| roles.contains(&role))
    }

    pub fn context(&self, caller: AccountId, now: Timestamp) -> CallContext {
        CallContext {
            caller,
            roles: self.grants.get(&caller).cloned().unwrap_or_default(),
            now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: AccountId = AccountId(1);
    const LENDING: AccountId = AccountId(2);
    const ALICE: AccountId = AccountId(3);

    fn acl() -> AccessControl {
        let mut acl = AccessControl::new();
        acl.grant(OWNER, Role::Owner);
        acl.grant(LENDING, Role::Lending);
        acl
    }

    #[test]
    fn role_table_gates_actions() {
        let acl = acl();
        let now = Timestamp::from_secs(0);

        assert!(acl.context(OWNER, now).require(Action::UpdateProtocolFee).is_ok());
        assert!(acl.context(LENDING, now).require(Action::IncreaseShortToken).is_ok());

        let err = acl.context(ALICE, now).require(Action::IncreaseShortToken).unwrap_err();
        assert_eq!(
            err,
            AccessError::OnlyRole {
                action: Action::IncreaseShortToken,
                caller: ALICE,
                required: Role::Lending,
            }
        );
        // owner is not implicitly every role
        assert!(acl.context(OWNER, now).require(Action::DepositReward).is_err());
    }

    #[test]
    fn permissionless_actions_accept_anyone() {
        let acl = acl();
        let ctx = acl.context(ALICE, Timestamp::from_secs(0));
        assert!(ctx.roles.is_empty());
        assert!(ctx.require(Action::Liquidate).is_ok());
        assert!(ctx.require(Action::AdjustPremium).is_ok());
    }

    #[test]
    fn revoked_role_is_denied() {
        let mut acl = acl();
        acl.revoke(LENDING, Role::Lending);
        assert!(!acl.has_role(LENDING, Role::Lending));
        assert!(acl.context(LENDING, Timestamp::from_secs(0)).require(Action::DecreaseCollateral).is_err());
    }
}
