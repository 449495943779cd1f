// 3.0 token.rs: in process token ledger. balances, allowances, mint authority, supply.
// every transfer is fallible and callers must propagate the error.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::math::{FixedPoint, MathError};
use crate::types::{AccountId, AssetId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token {0} does not exist")]
    UnknownToken(AssetId),

    #[error("insufficient balance of {token} for {account}: available {available}, requested {requested}")]
    InsufficientBalance {
        token: AssetId,
        account: AccountId,
        available: FixedPoint,
        requested: FixedPoint,
    },

    #[error("insufficient allowance of {token} from {owner} to {spender}: approved {approved}, requested {requested}")]
    InsufficientAllowance {
        token: AssetId,
        owner: AccountId,
        spender: AccountId,
        approved: FixedPoint,
        requested: FixedPoint,
    },

    #[error("{caller} is not the minter of {token}")]
    NotMinter { token: AssetId, caller: AccountId },

    #[error("math error: {0}")]
    Math(#[from] MathError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenInfo {
    pub id: AssetId,
    pub symbol: String,
    pub minter: AccountId,
    pub total_supply: FixedPoint,
}

/** 3.1: balances keyed by (token, holder). allowances by (token, owner, spender) */
#[derive(Debug, Clone, Default)]
pub struct TokenLedger {
    tokens: HashMap<AssetId, TokenInfo>,
    balances: HashMap<(AssetId, AccountId), FixedPoint>,
    allowances: HashMap<(AssetId, AccountId, AccountId), FixedPoint>,
    next_token_id: u32,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self {
            next_token_id: 1,
            ..Self::default()
        }
    }

    pub fn create_token(&mut self, symbol: impl Into<String>, minter: AccountId) -> AssetId {
        let id = AssetId(self.next_token_id.max(1));
        self.next_token_id = id.0 + 1;
        self.tokens.insert(
            id,
            TokenInfo {
                id,
                symbol: symbol.into(),
                minter,
                total_supply: FixedPoint::ZERO,
            },
        );
        id
    }

    pub fn token(&self, token: AssetId) -> Option<&TokenInfo> {
        self.tokens.get(&token)
    }

    pub fn exists(&self, token: AssetId) -> bool {
        self.tokens.contains_key(&token)
    }

    pub fn symbol(&self, token: AssetId) -> &str {
        self.tokens.get(&token).map(|t| t.symbol.as_str()).unwrap_or("?")
    }

    pub fn balance_of(&self, token: AssetId, account: AccountId) -> FixedPoint {
        self.balances.get(&(token, account)).copied().unwrap_or_default()
    }

    pub fn allowance(&self, token: AssetId, owner: AccountId, spender: AccountId) -> FixedPoint {
        self.allowances.get(&(token, owner, spender)).copied().unwrap_or_default()
    }

    pub fn total_supply(&self, token: AssetId) -> Result<FixedPoint, TokenError> {
        self.tokens
            .get(&token)
            .map(|t| t.total_supply)
            .ok_or(TokenError::UnknownToken(token))
    }

    pub fn approve(&mut self, token: AssetId, owner: AccountId, spender: AccountId, amount: FixedPoint) -> Result<(), TokenError> {
        self.require_token(token)?;
        self.allowances.insert((token, owner, spender), amount);
        Ok(())
    }

    pub fn transfer(&mut self, token: AssetId, from: AccountId, to: AccountId, amount: FixedPoint) -> Result<(), TokenError> {
        self.require_token(token)?;
        self.debit(token, from, amount)?;
        self.credit(token, to, amount)
    }

    // spends `spender`'s allowance on `from`. the unlimited allowance is never decremented
    pub fn transfer_from(
        &mut self,
        token: AssetId,
        spender: AccountId,
        from: AccountId,
        to: AccountId,
        amount: FixedPoint,
    ) -> Result<(), TokenError> {
        self.require_token(token)?;
        let approved = self.allowance(token, from, spender);
        if approved < amount {
            return Err(TokenError::InsufficientAllowance {
                token,
                owner: from,
                spender,
                approved,
                requested: amount,
            });
        }
        self.debit(token, from, amount)?;
        self.credit(token, to, amount)?;
        if approved != FixedPoint::MAX {
            self.allowances.insert((token, from, spender), approved.sub(amount)?);
        }
        Ok(())
    }

    pub fn mint(&mut self, token: AssetId, caller: AccountId, to: AccountId, amount: FixedPoint) -> Result<(), TokenError> {
        let info = self.tokens.get_mut(&token).ok_or(TokenError::UnknownToken(token))?;
        if info.minter != caller {
            return Err(TokenError::NotMinter { token, caller });
        }
        info.total_supply = info.total_supply.add(amount)?;
        self.credit(token, to, amount)
    }

    pub fn burn(&mut self, token: AssetId, caller: AccountId, from: AccountId, amount: FixedPoint) -> Result<(), TokenError> {
        let info = self.tokens.get(&token).ok_or(TokenError::UnknownToken(token))?;
        if info.minter != caller {
            return Err(TokenError::NotMinter { token, caller });
        }
        self.debit(token, from, amount)?;
        if let Some(info) = self.tokens.get_mut(&token) {
            info.total_supply = info.total_supply.sub(amount)?;
        }
        Ok(())
    }

    fn require_token(&self, token: AssetId) -> Result<(), TokenError> {
        if self.tokens.contains_key(&token) {
            Ok(())
        } else {
            Err(TokenError::UnknownToken(token))
        }
    }

    fn debit(&mut self, token: AssetId, account: AccountId, amount: FixedPoint) -> Result<(), TokenError> {
        let available = self.balance_of(token, account);
        if available < amount {
            return Err(TokenError::InsufficientBalance {
                token,
                account,
                available,
                requested: amount,
            });
        }
        self.balances.insert((token, account), available.sub(amount)?);
        Ok(())
    }

    fn credit(&mut self, token: AssetId, account: AccountId, amount: FixedPoint) -> Result<(), TokenError> {
        let balance = self.balance_of(token, account).add(amount)?;
        self.balances.insert((token, account), balance);
        Ok(())
    }
}
