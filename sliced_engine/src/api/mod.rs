//! # Platform public API
//!
//! The programmatic surface of the engine. The API is modular so that callers pick only the
//! functionality they need:
//!
//! * [`wallet_api`] handles deposits (driven by gateway webhooks), withdrawals, balances and
//!   ledger history.
//! * [`matchmaking_api`] runs the public queues and private rooms that exist before a match does.
//! * [`match_flow_api`] drives live matches: moves, timers, heartbeats and settlement.
//!
//! The pattern is the same throughout: an API instance is created by supplying a database backend
//! that implements the backend traits the API requires.
pub mod match_flow_api;
pub mod matchmaking_api;
pub mod settlement;
pub mod wallet_api;

pub use match_flow_api::MatchFlowApi;
pub use matchmaking_api::MatchmakingApi;
pub use settlement::{CommissionPolicy, SettlementEngine, PLATFORM_FEE_BPS};
pub use wallet_api::{ChargeUpdate, WalletApi, WalletApiError};
