//! # Sliced engine
//!
//! The core logic of the Sliced betting platform: the wallet ledger, matchmaking, the best-of-3
//! match state machine, and settlement. It is transport-agnostic; the HTTP and WebSocket surface
//! lives in the server crate.
//!
//! The library is divided into two main sections:
//! 1. Database management ([`mod@sqlite`] and the contracts in [`mod@traits`]). You should never
//!    need to touch the database directly; the data types it stores are public in [`db_types`].
//! 2. The public API ([`WalletApi`], [`MatchmakingApi`], [`MatchFlowApi`]). An API instance is
//!    built by supplying a backend that implements the traits the API requires.
//!
//! The engine also emits events (deposits landing, matches settling) through a small hook system
//! in [`events`]; subscribe with an [`events::EventHooks`] at startup.
mod api;
pub mod db_types;
pub mod events;
pub mod game;
#[cfg(feature = "sqlite")]
mod sqlite;
pub mod traits;
mod watch;

pub use api::{
    wallet_api::min_withdrawal,
    ChargeUpdate,
    CommissionPolicy,
    MatchFlowApi,
    MatchmakingApi,
    SettlementEngine,
    WalletApi,
    WalletApiError,
    PLATFORM_FEE_BPS,
};
#[cfg(feature = "sqlite")]
pub use sqlite::{db, SqliteDatabase};
pub use watch::MatchWatch;
