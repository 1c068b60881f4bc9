//! Core data types shared between the database layer and the public APIs.
//!
//! Every record here is an explicit, required-field struct. The original platform stored these as
//! free-form documents with fallback defaults scattered over every read site; constructor-time
//! validation replaces all of that.
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sliced_common::Money;
use sqlx::{FromRow, Type};
use thiserror::Error;

/// The stake buckets (total pot, in whole reais) offered by the lobby.
pub const STAKE_BUCKETS: [i64; 11] = [10, 30, 50, 100, 200, 350, 500, 1000, 2000, 3000, 5000];

pub fn is_valid_stake(stake: Money) -> bool {
    STAKE_BUCKETS.iter().any(|v| Money::from_reais(*v) == stake)
}

#[derive(Debug, Clone, Error)]
#[error("Invalid value for {field}: {value}")]
pub struct ConversionError {
    pub field: &'static str,
    pub value: String,
}

impl ConversionError {
    fn new(field: &'static str, value: impl Display) -> Self {
        Self { field, value: value.to_string() }
    }
}

//--------------------------------------     AccountId       ---------------------------------------------------------
/// A lightweight wrapper around the opaque, stable account key (the auth provider's uid).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<S: Into<String>> From<S> for AccountId {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

impl AccountId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------      Account        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Account {
    pub id: AccountId,
    pub display_name: String,
    pub balance: Money,
    /// The account that receives commission when this account deposits or wins, per the active
    /// commission policy.
    pub referred_by: Option<AccountId>,
    /// Soft-disable flag. Accounts are never deleted.
    pub disabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    pub id: AccountId,
    pub display_name: String,
    pub referred_by: Option<AccountId>,
}

impl NewAccount {
    pub fn new(id: AccountId, display_name: String) -> Self {
        Self { id, display_name, referred_by: None }
    }

    pub fn with_referrer(mut self, referrer: AccountId) -> Self {
        self.referred_by = Some(referrer);
        self
    }
}

//--------------------------------------   LedgerEntryKind   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum LedgerEntryKind {
    /// A PIX deposit credited via the payment-gateway webhook.
    Deposit,
    /// An entry fee (half the stake) charged when a match is created.
    GameCharge,
    /// The winner's share of the pot, credited at settlement.
    GameCredit,
    /// A requested payout. The balance is deducted up front; the PIX transfer happens offline.
    Withdrawal,
    /// A referral commission, paid out of the platform's share.
    AffiliateCommission,
}

impl Display for LedgerEntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerEntryKind::Deposit => write!(f, "Deposit"),
            LedgerEntryKind::GameCharge => write!(f, "GameCharge"),
            LedgerEntryKind::GameCredit => write!(f, "GameCredit"),
            LedgerEntryKind::Withdrawal => write!(f, "Withdrawal"),
            LedgerEntryKind::AffiliateCommission => write!(f, "AffiliateCommission"),
        }
    }
}

impl FromStr for LedgerEntryKind {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Deposit" => Ok(Self::Deposit),
            "GameCharge" => Ok(Self::GameCharge),
            "GameCredit" => Ok(Self::GameCredit),
            "Withdrawal" => Ok(Self::Withdrawal),
            "AffiliateCommission" => Ok(Self::AffiliateCommission),
            s => Err(ConversionError::new("ledger entry kind", s)),
        }
    }
}

//--------------------------------------     LedgerEntry     ---------------------------------------------------------
/// An immutable record of one balance mutation. For a given `(account_id, external_ref, kind)`
/// triple at most one entry is ever committed; this is the sole idempotence guard against
/// duplicate webhook delivery and replayed game operations.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub account_id: AccountId,
    pub external_ref: String,
    pub kind: LedgerEntryKind,
    pub delta: Money,
    pub balance_after: Money,
    pub created_at: DateTime<Utc>,
}

/// The result of [`apply_operation`](crate::traits::LedgerManagement::apply_operation).
/// `applied == false` means the operation was a replay and the balance is unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerOutcome {
    pub applied: bool,
    pub new_balance: Money,
}

//--------------------------------------    ChargeStatus     ---------------------------------------------------------
/// Payment-gateway charge status, as delivered by the webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargeStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl ChargeStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ChargeStatus::Pending)
    }
}

impl Display for ChargeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChargeStatus::Pending => write!(f, "pending"),
            ChargeStatus::Approved => write!(f, "approved"),
            ChargeStatus::Rejected => write!(f, "rejected"),
            ChargeStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for ChargeStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" | "in_process" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError::new("charge status", s)),
        }
    }
}

//--------------------------------------       Symbol        ---------------------------------------------------------
/// A player's mark on the board. The match creator is always `X` and plays first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum Symbol {
    X,
    O,
}

impl Symbol {
    pub fn other(&self) -> Symbol {
        match self {
            Symbol::X => Symbol::O,
            Symbol::O => Symbol::X,
        }
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Symbol::X => write!(f, "X"),
            Symbol::O => write!(f, "O"),
        }
    }
}

impl FromStr for Symbol {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "X" => Ok(Self::X),
            "O" => Ok(Self::O),
            s => Err(ConversionError::new("symbol", s)),
        }
    }
}

//--------------------------------------       Board         ---------------------------------------------------------
/// The 9-cell grid, serialised as a 9-character string (`X`, `O` or `-`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Board([Option<Symbol>; 9]);

const WINNING_LINES: [[usize; 3]; 8] =
    [[0, 1, 2], [3, 4, 5], [6, 7, 8], [0, 3, 6], [1, 4, 7], [2, 5, 8], [0, 4, 8], [2, 4, 6]];

impl Board {
    pub fn cell(&self, index: usize) -> Option<Symbol> {
        self.0[index]
    }

    pub fn set(&mut self, index: usize, symbol: Symbol) {
        self.0[index] = Some(symbol);
    }

    pub fn clear(&mut self) {
        self.0 = [None; 9];
    }

    pub fn is_full(&self) -> bool {
        self.0.iter().all(Option::is_some)
    }

    pub fn winner(&self) -> Option<Symbol> {
        WINNING_LINES.iter().find_map(|line| {
            let first = self.0[line[0]]?;
            (self.0[line[1]] == Some(first) && self.0[line[2]] == Some(first)).then_some(first)
        })
    }
}

impl Display for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for cell in &self.0 {
            match cell {
                Some(s) => write!(f, "{s}")?,
                None => write!(f, "-")?,
            }
        }
        Ok(())
    }
}

impl FromStr for Board {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 9 {
            return Err(ConversionError::new("board", s));
        }
        let mut cells = [None; 9];
        for (i, c) in s.chars().enumerate() {
            cells[i] = match c {
                'X' => Some(Symbol::X),
                'O' => Some(Symbol::O),
                '-' => None,
                _ => return Err(ConversionError::new("board", s)),
            };
        }
        Ok(Self(cells))
    }
}

// Serialised as the same 9-character string the database stores.
impl Serialize for Board {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Board {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

//--------------------------------------      MatchId        ---------------------------------------------------------
/// Deterministic match key: `match_{stake_centavos}_{creator}_{joiner}`. Both racing creators
/// derive the same id, so the primary key makes the second create a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct MatchId(pub String);

impl MatchId {
    pub fn derive(stake: Money, creator: &AccountId, joiner: &AccountId) -> Self {
        Self(format!("match_{}_{}_{}", stake.value(), creator, joiner))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for MatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<S: Into<String>> From<S> for MatchId {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

//--------------------------------------    MatchStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum MatchStatus {
    WaitingForOpponent,
    Active,
    SuddenDeath,
    Finished,
}

impl Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchStatus::WaitingForOpponent => write!(f, "WaitingForOpponent"),
            MatchStatus::Active => write!(f, "Active"),
            MatchStatus::SuddenDeath => write!(f, "SuddenDeath"),
            MatchStatus::Finished => write!(f, "Finished"),
        }
    }
}

impl FromStr for MatchStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WaitingForOpponent" => Ok(Self::WaitingForOpponent),
            "Active" => Ok(Self::Active),
            "SuddenDeath" => Ok(Self::SuddenDeath),
            "Finished" => Ok(Self::Finished),
            s => Err(ConversionError::new("match status", s)),
        }
    }
}

//--------------------------------------     WinReason       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum WinReason {
    SeriesWin,
    SuddenDeath,
    OpponentDisconnected,
}

impl Display for WinReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WinReason::SeriesWin => write!(f, "SeriesWin"),
            WinReason::SuddenDeath => write!(f, "SuddenDeath"),
            WinReason::OpponentDisconnected => write!(f, "OpponentDisconnected"),
        }
    }
}

impl FromStr for WinReason {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SeriesWin" => Ok(Self::SeriesWin),
            "SuddenDeath" => Ok(Self::SuddenDeath),
            "OpponentDisconnected" => Ok(Self::OpponentDisconnected),
            s => Err(ConversionError::new("win reason", s)),
        }
    }
}

//--------------------------------------     PlayerSlot      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSlot {
    pub account_id: AccountId,
    pub display_name: String,
    pub symbol: Symbol,
    pub heartbeat_at: DateTime<Utc>,
    pub online: bool,
}

//--------------------------------------     MatchState      ---------------------------------------------------------
/// The full shared match document. Both clients hold a copy; every mutation goes through the
/// repository's transactional update so racing writers cannot corrupt it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchState {
    pub id: MatchId,
    /// Total pot. Each player's entry fee is half of this.
    pub stake: Money,
    pub status: MatchStatus,
    pub board: Board,
    pub current_turn: Symbol,
    pub last_move_at: DateTime<Utc>,
    pub round: u8,
    pub score_x: u8,
    pub score_o: u8,
    /// Set exactly once on entering sudden death; both clients render the same grid from it.
    pub sudden_death_target: Option<u8>,
    pub winner: Option<AccountId>,
    pub win_reason: Option<WinReason>,
    pub players: [PlayerSlot; 2],
    pub entry_charged: [bool; 2],
    pub prize_credited: bool,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
}

impl MatchState {
    pub fn slot_index(&self, account: &AccountId) -> Option<usize> {
        self.players.iter().position(|p| &p.account_id == account)
    }

    pub fn symbol_of(&self, account: &AccountId) -> Option<Symbol> {
        self.slot_index(account).map(|i| self.players[i].symbol)
    }

    pub fn player_by_symbol(&self, symbol: Symbol) -> &PlayerSlot {
        // Slots always hold exactly one X and one O.
        self.players.iter().find(|p| p.symbol == symbol).expect("match has a slot per symbol")
    }

    pub fn opponent_of(&self, account: &AccountId) -> Option<&PlayerSlot> {
        self.slot_index(account).map(|i| &self.players[1 - i])
    }

    pub fn score_of(&self, symbol: Symbol) -> u8 {
        match symbol {
            Symbol::X => self.score_x,
            Symbol::O => self.score_o,
        }
    }

    pub fn entry_fee(&self) -> Money {
        Money::from_centavos(self.stake.value() / 2)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMatch {
    pub id: MatchId,
    pub stake: Money,
    pub creator: (AccountId, String),
    pub joiner: (AccountId, String),
    pub is_private: bool,
}

impl NewMatch {
    pub fn new(stake: Money, creator: (AccountId, String), joiner: (AccountId, String), is_private: bool) -> Self {
        let id = MatchId::derive(stake, &creator.0, &joiner.0);
        Self { id, stake, creator, joiner, is_private }
    }

    pub fn into_state(self, now: DateTime<Utc>) -> MatchState {
        let (creator_id, creator_name) = self.creator;
        let (joiner_id, joiner_name) = self.joiner;
        MatchState {
            id: self.id,
            stake: self.stake,
            status: MatchStatus::Active,
            board: Board::default(),
            current_turn: Symbol::X,
            last_move_at: now,
            round: 1,
            score_x: 0,
            score_o: 0,
            sudden_death_target: None,
            winner: None,
            win_reason: None,
            players: [
                PlayerSlot {
                    account_id: creator_id,
                    display_name: creator_name,
                    symbol: Symbol::X,
                    heartbeat_at: now,
                    online: true,
                },
                PlayerSlot {
                    account_id: joiner_id,
                    display_name: joiner_name,
                    symbol: Symbol::O,
                    heartbeat_at: now,
                    online: true,
                },
            ],
            entry_charged: [false, false],
            prize_credited: false,
            is_private: self.is_private,
            created_at: now,
        }
    }
}

//--------------------------------------     QueueEntry      ---------------------------------------------------------
/// An ephemeral public-matchmaking record, keyed `(stake, account_id)`. Deleted when matched or
/// when the player cancels the search.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QueueEntry {
    pub stake: Money,
    pub account_id: AccountId,
    pub display_name: String,
    pub enqueued_at: DateTime<Utc>,
}

//--------------------------------------    PrivateRoom      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum RoomStatus {
    Waiting,
    Full,
}

impl Display for RoomStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoomStatus::Waiting => write!(f, "Waiting"),
            RoomStatus::Full => write!(f, "Full"),
        }
    }
}

impl FromStr for RoomStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Waiting" => Ok(Self::Waiting),
            "Full" => Ok(Self::Full),
            s => Err(ConversionError::new("room status", s)),
        }
    }
}

/// An ephemeral friend-match lobby. Converted into a [`MatchState`] when the creator observes the
/// `Full` transition, or deleted on cancellation.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PrivateRoom {
    pub code: String,
    pub creator_id: AccountId,
    pub creator_name: String,
    pub stake: Money,
    pub status: RoomStatus,
    pub joiner_id: Option<AccountId>,
    pub joiner_name: Option<String>,
    pub created_at: DateTime<Utc>,
}
