// 9.1 dex.rs: DEX integration (mocked). short positions swap freshly minted synthetic
// asset into collateral here, and the premium signal reads the pool price from here.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::math::{FixedPoint, MathError};
use crate::token::{TokenError, TokenLedger};
use crate::types::{AccountId, AssetId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DexError {
    #[error("no pool for {0}")]
    NoPool(AssetId),

    #[error("swap output {received} below minimum {minimum}")]
    TooLittleReceived { minimum: FixedPoint, received: FixedPoint },

    #[error("unsupported pair {asset_in} -> {asset_out}")]
    UnsupportedPair { asset_in: AssetId, asset_out: AssetId },

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("math error: {0}")]
    Math(#[from] MathError),
}

/// Caller supplied swap parameters. `is_short` must match the position it applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SwapParams {
    pub is_short: bool,
    pub amount_out_minimum: FixedPoint,
}

impl SwapParams {
    pub fn long() -> Self {
        Self::default()
    }

    pub fn short(amount_out_minimum: FixedPoint) -> Self {
        Self {
            is_short: true,
            amount_out_minimum,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapRequest {
    pub asset_in: AssetId,
    pub asset_out: AssetId,
    pub amount_in: FixedPoint,
    pub amount_out_minimum: FixedPoint,
    // must have approved the router for `amount_in`
    pub payer: AccountId,
    pub recipient: AccountId,
}

pub trait Dex: fmt::Debug {
    /// account the payer approves before a swap
    fn router(&self) -> AccountId;

    fn has_pool(&self, asset: AssetId) -> bool;

    /// price of one unit of `asset` in the pool's base token
    fn pool_price(&self, asset: AssetId) -> Result<FixedPoint, DexError>;

    /// executes the swap against the ledger and returns the output amount
    fn swap_exact_input(&self, tokens: &mut TokenLedger, request: &SwapRequest) -> Result<FixedPoint, DexError>;
}

/// Fixed price pools of synthetic assets against the base token. Reserves live on the
/// router account. Clones share prices, so tests can move a pool price after wiring.
#[derive(Debug, Clone)]
pub struct MockDex {
    router: AccountId,
    prices: Arc<RwLock<HashMap<AssetId, FixedPoint>>>,
}

impl MockDex {
    pub fn new(router: AccountId) -> Self {
        Self {
            router,
            prices: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn set_pool_price(&self, asset: AssetId, price: FixedPoint) {
        self.prices
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(asset, price);
    }

    // a pooled asset trades against whatever non-pooled token sits on the other side
    fn quote(&self, request: &SwapRequest) -> Result<FixedPoint, DexError> {
        let selling = self.has_pool(request.asset_in);
        let buying = self.has_pool(request.asset_out);
        if selling && !buying {
            let price = self.pool_price(request.asset_in)?;
            Ok(request.amount_in.mul(price)?)
        } else if buying && !selling {
            let price = self.pool_price(request.asset_out)?;
            Ok(request.amount_in.div(price)?)
        } else {
            Err(DexError::UnsupportedPair {
                asset_in: request.asset_in,
                asset_out: request.asset_out,
            })
        }
    }
}

impl Dex for MockDex {
    fn router(&self) -> AccountId {
        self.router
    }

    fn has_pool(&self, asset: AssetId) -> bool {
        self.prices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&asset)
    }

    fn pool_price(&self, asset: AssetId) -> Result<FixedPoint, DexError> {
        self.prices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&asset)
            .copied()
            .ok_or(DexError::NoPool(asset))
    }

    fn swap_exact_input(&self, tokens: &mut TokenLedger, request: &SwapRequest) -> Result<FixedPoint, DexError> {
        let amount_out = self.quote(request)?;
        if amount_out < request.amount_out_minimum {
            return Err(DexError::TooLittleReceived {
                minimum: request.amount_out_minimum,
                received: amount_out,
            });
        }

        tokens.transfer_from(request.asset_in, self.router, request.payer, self.router, request.amount_in)?;
        tokens.transfer(request.asset_out, self.router, request.recipient, amount_out)?;
        Ok(amount_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const MINTER: AccountId = AccountId(1);
    const ROUTER: AccountId = AccountId(2);
    const ALICE: AccountId = AccountId(3);

    fn setup() -> (TokenLedger, AssetId, AssetId, MockDex) {
        let mut tokens = TokenLedger::new();
        let dai = tokens.create_token("DAI", MINTER);
        let zat = tokens.create_token("ZAT", MINTER);
        tokens.mint(dai, MINTER, ROUTER, FixedPoint::from_uint(10_000)).unwrap();
        tokens.mint(zat, MINTER, ALICE, FixedPoint::from_uint(5)).unwrap();
        tokens.approve(zat, ALICE, ROUTER, FixedPoint::MAX).unwrap();

        let dex = MockDex::new(ROUTER);
        dex.set_pool_price(zat, FixedPoint::from_uint(106));
        (tokens, dai, zat, dex)
    }

    #[test]
    fn swap_asset_for_base() {
        let (mut tokens, dai, zat, dex) = setup();
        let request = SwapRequest {
            asset_in: zat,
            asset_out: dai,
            amount_in: FixedPoint::from_uint(5),
            amount_out_minimum: FixedPoint::ZERO,
            payer: ALICE,
            recipient: ALICE,
        };
        let out = dex.swap_exact_input(&mut tokens, &request).unwrap();
        assert_eq!(out, FixedPoint::from_uint(530));
        assert_eq!(tokens.balance_of(dai, ALICE), FixedPoint::from_uint(530));
        assert_eq!(tokens.balance_of(zat, ROUTER), FixedPoint::from_uint(5));
    }

    #[test]
    fn slippage_guard() {
        let (mut tokens, dai, zat, dex) = setup();
        let request = SwapRequest {
            asset_in: zat,
            asset_out: dai,
            amount_in: FixedPoint::from_uint(5),
            amount_out_minimum: FixedPoint::from_decimal(dec!(530.01)).unwrap(),
            payer: ALICE,
            recipient: ALICE,
        };
        assert!(matches!(
            dex.swap_exact_input(&mut tokens, &request),
            Err(DexError::TooLittleReceived { .. })
        ));
        assert_eq!(tokens.balance_of(zat, ALICE), FixedPoint::from_uint(5));
    }

    #[test]
    fn unknown_pool() {
        let (_, _, _, dex) = setup();
        assert_eq!(dex.pool_price(AssetId(42)), Err(DexError::NoPool(AssetId(42))));
        assert!(!dex.has_pool(AssetId(42)));
    }
}
