//! Interface contracts for the platform's database backends.
//!
//! * [`LedgerManagement`] is the wallet: accounts, balances and the append-only ledger, with
//!   exactly-once application of externally-keyed operations.
//! * [`MatchManagement`] owns the persisted match documents and the transactional update loop the
//!   game APIs run their rule transitions through.
//! * [`MatchmakingManagement`] handles the ephemeral queue entries and private rooms that exist
//!   before a match does.
mod data_objects;
mod ledger_management;
mod match_management;
mod matchmaking_management;

pub use data_objects::{LedgerOperation, PrizeSplit};
pub use ledger_management::{LedgerError, LedgerManagement};
pub use match_management::{MatchError, MatchManagement};
pub use matchmaking_management::{MatchmakingError, MatchmakingManagement};
