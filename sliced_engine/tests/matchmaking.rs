use sliced_common::Money;
use sliced_engine::{
    db_types::{MatchId, MatchStatus, NewMatch, RoomStatus, Symbol},
    traits::{LedgerError, LedgerManagement, MatchManagement, MatchmakingError, MatchmakingManagement},
    MatchmakingApi,
};

mod support;

const STAKE: i64 = 100;

fn stake() -> Money {
    Money::from_reais(STAKE)
}

#[tokio::test]
async fn queue_pairing_charges_both_players_and_creates_one_match() {
    let db = support::new_db().await;
    let alice = support::register(&db, "alice", "Alice").await;
    let bob = support::register(&db, "bob", "Bob").await;
    support::fund(&db, &alice, stake()).await;
    support::fund(&db, &bob, stake()).await;
    let api = MatchmakingApi::new(db.clone());

    api.join_queue(stake(), &alice, "Alice").await.unwrap();
    api.join_queue(stake(), &bob, "Bob").await.unwrap();

    // "bob" holds the larger id, so creation is not its job.
    assert!(api.try_create_public_match(stake(), &bob, "Bob").await.unwrap().is_none());

    let (state, created) = api.try_create_public_match(stake(), &alice, "Alice").await.unwrap().unwrap();
    assert!(created);
    assert_eq!(state.id, MatchId::derive(stake(), &alice, &bob));
    assert_eq!(state.status, MatchStatus::Active);
    assert_eq!(state.symbol_of(&alice), Some(Symbol::X));
    assert_eq!(state.symbol_of(&bob), Some(Symbol::O));
    assert_eq!(state.entry_charged, [true, true]);

    // Half the pot each.
    assert_eq!(db.balance(&alice).await.unwrap(), Money::from_reais(50));
    assert_eq!(db.balance(&bob).await.unwrap(), Money::from_reais(50));

    // Both queue entries are gone, and a racing creation attempt converges on the same match.
    assert!(db.queued_players(stake()).await.unwrap().is_empty());
    let racer = NewMatch::new(stake(), (alice.clone(), "Alice".into()), (bob.clone(), "Bob".into()), false);
    let (again, created_again) = db.create_match_from_queue(racer).await.unwrap();
    assert!(!created_again);
    assert_eq!(again.id, state.id);

    // Bob discovers the match by polling for his own.
    let found = db.find_match_for(&bob).await.unwrap().unwrap();
    assert_eq!(found.id, state.id);
}

#[tokio::test]
async fn a_broke_opponent_aborts_match_creation_completely() {
    let db = support::new_db().await;
    let alice = support::register(&db, "alice", "Alice").await;
    let bob = support::register(&db, "bob", "Bob").await;
    support::fund(&db, &alice, stake()).await;
    // Bob has nothing.
    let api = MatchmakingApi::new(db.clone());
    api.join_queue(stake(), &alice, "Alice").await.unwrap();
    api.join_queue(stake(), &bob, "Bob").await.unwrap();

    let result = api.try_create_public_match(stake(), &alice, "Alice").await;
    assert!(matches!(result, Err(MatchmakingError::Ledger(LedgerError::InsufficientFunds { .. }))));

    // Nothing stuck: no match, no charges, both entries still queued.
    assert!(db.find_match_for(&alice).await.unwrap().is_none());
    assert_eq!(db.balance(&alice).await.unwrap(), stake());
    assert_eq!(db.queued_players(stake()).await.unwrap().len(), 2);
}

#[tokio::test]
async fn leaving_the_queue_stops_pairing() {
    let db = support::new_db().await;
    let alice = support::register(&db, "alice", "Alice").await;
    let api = MatchmakingApi::new(db.clone());
    api.join_queue(stake(), &alice, "Alice").await.unwrap();
    assert_eq!(db.queued_players(stake()).await.unwrap().len(), 1);
    api.leave_queue(stake(), &alice).await.unwrap();
    assert!(db.queued_players(stake()).await.unwrap().is_empty());
}

#[tokio::test]
async fn off_menu_stakes_are_rejected() {
    let db = support::new_db().await;
    let alice = support::register(&db, "alice", "Alice").await;
    let api = MatchmakingApi::new(db);
    let result = api.join_queue(Money::from_reais(123), &alice, "Alice").await;
    assert!(matches!(result, Err(MatchmakingError::InvalidStake(_))));
}

#[tokio::test]
async fn private_room_runs_waiting_full_match() {
    let db = support::new_db().await;
    let alice = support::register(&db, "alice", "Alice").await;
    let bob = support::register(&db, "bob", "Bob").await;
    support::fund(&db, &alice, stake()).await;
    support::fund(&db, &bob, stake()).await;
    let api = MatchmakingApi::new(db.clone());

    let room = api.create_private_room(stake(), &alice, "Alice").await.unwrap();
    assert_eq!(room.status, RoomStatus::Waiting);
    assert_eq!(room.code.len(), 6);

    // Only the creator may start, and not before the room fills.
    assert!(api.start_private_match(&room.code, &bob).await.is_err());
    assert!(matches!(
        api.start_private_match(&room.code, &alice).await,
        Err(MatchmakingError::RoomUnavailable(_))
    ));

    let full = api.join_private_room(&room.code, &bob, "Bob").await.unwrap();
    assert_eq!(full.status, RoomStatus::Full);

    // A third player cannot take the joiner slot.
    let carol = support::register(&db, "carol", "Carol").await;
    assert!(matches!(
        api.join_private_room(&room.code, &carol, "Carol").await,
        Err(MatchmakingError::RoomUnavailable(_))
    ));

    let (state, created) = api.start_private_match(&room.code, &alice).await.unwrap();
    assert!(created);
    assert!(state.is_private);
    assert_eq!(state.symbol_of(&alice), Some(Symbol::X));
    assert_eq!(db.balance(&alice).await.unwrap(), Money::from_reais(50));
    assert_eq!(db.balance(&bob).await.unwrap(), Money::from_reais(50));

    // The room is consumed by the conversion.
    assert!(api.room_status(&room.code).await.unwrap().is_none());
}

#[tokio::test]
async fn cancelled_rooms_disappear() {
    let db = support::new_db().await;
    let alice = support::register(&db, "alice", "Alice").await;
    let bob = support::register(&db, "bob", "Bob").await;
    let api = MatchmakingApi::new(db);
    let room = api.create_private_room(stake(), &alice, "Alice").await.unwrap();
    // Only the creator can cancel.
    assert!(api.cancel_room(&room.code, &bob).await.is_err());
    api.cancel_room(&room.code, &alice).await.unwrap();
    assert!(api.room_status(&room.code).await.unwrap().is_none());
    assert!(matches!(api.join_private_room(&room.code, &bob, "Bob").await, Err(MatchmakingError::RoomNotFound(_))));
}
