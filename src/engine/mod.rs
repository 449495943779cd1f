// 8.0: protocol engine. owns every component and the token ledger, wires them together,
// and runs each entry point as one atomic call.
// deterministic and event-driven. the only outside inputs are price feeds and the dex.

mod admin;
mod core;
mod liquidations;
mod positions;
mod results;
mod rewards;

pub use core::{Protocol, ProtocolAccounts};
pub use results::{BurnResult, LiquidationResult, MintResult, OpenResult, ProtocolError, WithdrawResult};
