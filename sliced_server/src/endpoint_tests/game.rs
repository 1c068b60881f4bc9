use actix_web::web::{self, ServiceConfig};
use serde_json::{json, Value};
use sliced_common::Money;
use sliced_engine::{
    db_types::{MatchState, MatchStatus, NewMatch, WinReason},
    events::EventProducers,
    traits::{MatchManagement, MatchmakingManagement},
    CommissionPolicy,
    MatchFlowApi,
    SettlementEngine,
    SqliteDatabase,
};

use super::helpers::{fund, get_request, new_db, post_request, register};
use crate::routes::{AccountBalanceRoute, GameChargeRoute, GameCreditRoute};

fn game_routes(db: SqliteDatabase) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let flow = MatchFlowApi::new(
            db.clone(),
            SettlementEngine::with_default_fee(CommissionPolicy::None),
            EventProducers::default(),
        );
        let wallet = sliced_engine::WalletApi::new(db, CommissionPolicy::None, EventProducers::default());
        cfg.app_data(web::Data::new(flow))
            .app_data(web::Data::new(wallet))
            .service(GameChargeRoute::<SqliteDatabase>::new())
            .service(GameCreditRoute::<SqliteDatabase>::new())
            .service(AccountBalanceRoute::<SqliteDatabase>::new());
    }
}

/// Two funded players paired at a R$100 stake.
async fn paired_match(db: &SqliteDatabase) -> MatchState {
    let stake = Money::from_reais(100);
    let alice = register(db, "alice", "Alice").await;
    let bob = register(db, "bob", "Bob").await;
    fund(db, &alice, stake).await;
    fund(db, &bob, stake).await;
    db.join_queue(stake, &alice, "Alice").await.unwrap();
    db.join_queue(stake, &bob, "Bob").await.unwrap();
    let new_match = NewMatch::new(stake, (alice, "Alice".into()), (bob, "Bob".into()), false);
    let (state, created) = db.create_match_from_queue(new_match).await.unwrap();
    assert!(created);
    state
}

#[actix_web::test]
async fn entry_fee_retries_are_absorbed() {
    let db = new_db().await;
    let state = paired_match(&db).await;

    // Both fees were taken when the match was created, so the explicit charge reports a replay.
    let body = json!({ "account_id": "alice", "match_id": state.id });
    let (status, response) = post_request("/api/game/charge", &body, game_routes(db.clone())).await;
    assert!(status.is_success(), "unexpected response: {response}");
    let outcome: Value = serde_json::from_str(&response).unwrap();
    assert_eq!(outcome["applied"], false);
    assert_eq!(outcome["new_balance"], 5000);
}

#[actix_web::test]
async fn charging_a_bystander_is_forbidden() {
    let db = new_db().await;
    let state = paired_match(&db).await;
    register(&db, "carol", "Carol").await;
    let body = json!({ "account_id": "carol", "match_id": state.id });
    let (status, _) = post_request("/api/game/charge", &body, game_routes(db)).await;
    assert_eq!(status.as_u16(), 403);
}

#[actix_web::test]
async fn charging_for_a_missing_match_is_404() {
    let db = new_db().await;
    register(&db, "alice", "Alice").await;
    let body = json!({ "account_id": "alice", "match_id": "match_nope" });
    let (status, _) = post_request("/api/game/charge", &body, game_routes(db)).await;
    assert_eq!(status.as_u16(), 404);
}

#[actix_web::test]
async fn credit_settles_a_finished_match_exactly_once() {
    let db = new_db().await;
    let state = paired_match(&db).await;
    let body = json!({ "account_id": "alice", "match_id": state.id });

    // Nothing to settle while the match is live.
    let (status, response) = post_request("/api/game/credit", &body, game_routes(db.clone())).await;
    assert!(status.is_success());
    let settled: Value = serde_json::from_str(&response).unwrap();
    assert_eq!(settled["settled"], false);

    let winner = state.players[0].account_id.clone();
    db.transactional_update(&state.id, |state| {
        state.status = MatchStatus::Finished;
        state.winner = Some(winner.clone());
        state.win_reason = Some(WinReason::SeriesWin);
        Ok(())
    })
    .await
    .unwrap();

    let (status, response) = post_request("/api/game/credit", &body, game_routes(db.clone())).await;
    assert!(status.is_success());
    let settled: Value = serde_json::from_str(&response).unwrap();
    assert_eq!(settled["settled"], true);

    // 50 left after the entry fee plus 80% of the pot.
    let (_, response) = get_request("/api/account/alice/balance", game_routes(db.clone())).await;
    let balance: Value = serde_json::from_str(&response).unwrap();
    assert_eq!(balance["balance"], 13000);

    // The settled match is gone, so a retry is absorbed.
    let (status, response) = post_request("/api/game/credit", &body, game_routes(db)).await;
    assert!(status.is_success());
    let settled: Value = serde_json::from_str(&response).unwrap();
    assert_eq!(settled["settled"], false);
}
