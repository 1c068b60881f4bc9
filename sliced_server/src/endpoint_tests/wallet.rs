use actix_web::web::{self, ServiceConfig};
use serde_json::{json, Value};
use sliced_common::Money;
use sliced_engine::{
    db_types::ChargeStatus,
    events::EventProducers,
    ChargeUpdate,
    CommissionPolicy,
    SqliteDatabase,
    WalletApi,
};

use super::{
    helpers::{fund, get_request, new_db, post_request, register},
    mocks::MockGateway,
};
use crate::{
    data_objects::PixCharge,
    routes::{
        health,
        AccountBalanceRoute,
        AccountHistoryRoute,
        CreateDepositRoute,
        PaymentWebhookRoute,
        RegisterAccountRoute,
        RequestWithdrawalRoute,
    },
};

fn wallet_routes(db: SqliteDatabase, gateway: MockGateway) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let api = WalletApi::new(db, CommissionPolicy::None, EventProducers::default());
        cfg.app_data(web::Data::new(api))
            .app_data(web::Data::new(gateway))
            .service(RegisterAccountRoute::<SqliteDatabase>::new())
            .service(AccountBalanceRoute::<SqliteDatabase>::new())
            .service(AccountHistoryRoute::<SqliteDatabase>::new())
            .service(RequestWithdrawalRoute::<SqliteDatabase>::new())
            .service(CreateDepositRoute::<SqliteDatabase, MockGateway>::new())
            .service(PaymentWebhookRoute::<SqliteDatabase, MockGateway>::new());
    }
}

fn approved_charge(charge_id: &str, account: &str, amount: Money) -> ChargeUpdate {
    ChargeUpdate { charge_id: charge_id.into(), account_id: account.into(), status: ChargeStatus::Approved, amount }
}

#[actix_web::test]
async fn health_is_ok() {
    let (status, body) = get_request("/health", |cfg| {
        cfg.service(health);
    })
    .await;
    assert!(status.is_success());
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn register_then_read_balance() {
    let db = new_db().await;
    let body = json!({ "account_id": "alice", "display_name": "Alice" });
    let (status, response) =
        post_request("/api/account/register", &body, wallet_routes(db.clone(), MockGateway::new())).await;
    assert!(status.is_success(), "unexpected response: {response}");
    let account: Value = serde_json::from_str(&response).unwrap();
    assert_eq!(account["id"], "alice");
    assert_eq!(account["balance"], 0);

    let (status, response) =
        get_request("/api/account/alice/balance", wallet_routes(db, MockGateway::new())).await;
    assert!(status.is_success());
    let balance: Value = serde_json::from_str(&response).unwrap();
    assert_eq!(balance["account_id"], "alice");
    assert_eq!(balance["balance"], 0);
}

#[actix_web::test]
async fn balance_for_unknown_account_is_404() {
    let db = new_db().await;
    let (status, _) = get_request("/api/account/ghost/balance", wallet_routes(db, MockGateway::new())).await;
    assert_eq!(status.as_u16(), 404);
}

#[actix_web::test]
async fn redelivered_webhook_credits_once() {
    let db = new_db().await;
    register(&db, "alice", "Alice").await;
    let body = json!({ "type": "payment", "data": { "id": "ch_1" } });

    for expected in ["deposit applied", "already applied"] {
        let mut gateway = MockGateway::new();
        gateway
            .expect_fetch_charge()
            .withf(|id| id == "ch_1")
            .returning(|_| Ok(approved_charge("ch_1", "alice", Money::from_reais(50))));
        let (status, response) = post_request("/api/webhook/payment", &body, wallet_routes(db.clone(), gateway)).await;
        assert!(status.is_success());
        assert!(response.contains(expected), "unexpected response: {response}");
    }

    let (_, response) = get_request("/api/account/alice/balance", wallet_routes(db, MockGateway::new())).await;
    let balance: Value = serde_json::from_str(&response).unwrap();
    assert_eq!(balance["balance"], 5000);
}

#[actix_web::test]
async fn webhook_charge_id_can_come_from_the_query() {
    let db = new_db().await;
    register(&db, "alice", "Alice").await;
    let mut gateway = MockGateway::new();
    gateway
        .expect_fetch_charge()
        .withf(|id| id == "ch_2")
        .returning(|_| Ok(approved_charge("ch_2", "alice", Money::from_reais(10))));
    let (status, _) = post_request(
        "/api/webhook/payment?topic=payment&id=ch_2",
        &json!({}),
        wallet_routes(db.clone(), gateway),
    )
    .await;
    assert!(status.is_success());

    let (_, response) = get_request("/api/account/alice/balance", wallet_routes(db, MockGateway::new())).await;
    let balance: Value = serde_json::from_str(&response).unwrap();
    assert_eq!(balance["balance"], 1000);
}

#[actix_web::test]
async fn non_payment_topics_are_acknowledged_without_a_gateway_call() {
    let db = new_db().await;
    // No expectations are set, so any gateway call panics the test.
    let body = json!({ "type": "test", "data": { "id": 12345 } });
    let (status, response) = post_request("/api/webhook/payment", &body, wallet_routes(db, MockGateway::new())).await;
    assert!(status.is_success());
    assert!(response.contains("ignored"), "unexpected response: {response}");
}

#[actix_web::test]
async fn payment_webhook_without_a_charge_id_is_rejected() {
    let db = new_db().await;
    let body = json!({ "type": "payment" });
    let (status, _) = post_request("/api/webhook/payment", &body, wallet_routes(db, MockGateway::new())).await;
    assert_eq!(status.as_u16(), 400);
}

#[actix_web::test]
async fn deposit_create_returns_the_qr_payloads() {
    let db = new_db().await;
    register(&db, "alice", "Alice").await;
    let mut gateway = MockGateway::new();
    gateway.expect_create_charge().withf(|req| req.account_id.as_str() == "alice").returning(|_| {
        Ok(PixCharge {
            charge_id: "ch_9".into(),
            status: ChargeStatus::Pending,
            qr_code_base64: Some("aGVsbG8=".into()),
            copy_paste_code: Some("00020126....".into()),
        })
    });
    let body = json!({
        "account_id": "alice",
        "amount": 5000,
        "payer_name": "Alice Silva",
        "payer_email": "alice@example.com",
        "payer_tax_id": "12345678900",
    });
    let (status, response) = post_request("/api/deposit/create", &body, wallet_routes(db, gateway)).await;
    assert!(status.is_success(), "unexpected response: {response}");
    let charge: Value = serde_json::from_str(&response).unwrap();
    assert_eq!(charge["charge_id"], "ch_9");
    assert_eq!(charge["status"], "pending");
    assert_eq!(charge["qr_code_base64"], "aGVsbG8=");
}

#[actix_web::test]
async fn deposit_create_for_an_unknown_account_is_404() {
    let db = new_db().await;
    let body = json!({
        "account_id": "ghost",
        "amount": 5000,
        "payer_name": "No One",
        "payer_email": "noone@example.com",
        "payer_tax_id": "00000000000",
    });
    let (status, _) = post_request("/api/deposit/create", &body, wallet_routes(db, MockGateway::new())).await;
    assert_eq!(status.as_u16(), 404);
}

#[actix_web::test]
async fn withdrawals_validate_before_debiting() {
    let db = new_db().await;
    let alice = register(&db, "alice", "Alice").await;
    fund(&db, &alice, Money::from_reais(30)).await;

    let below_minimum = json!({
        "account_id": "alice", "amount": 1000, "pix_key": "alice@example.com", "pix_key_type": "email",
    });
    let (status, response) =
        post_request("/api/withdraw/request", &below_minimum, wallet_routes(db.clone(), MockGateway::new())).await;
    assert_eq!(status.as_u16(), 400);
    assert!(response.contains("R$20.00"), "unexpected response: {response}");

    let too_big = json!({
        "account_id": "alice", "amount": 4000, "pix_key": "alice@example.com", "pix_key_type": "email",
    });
    let (status, _) =
        post_request("/api/withdraw/request", &too_big, wallet_routes(db.clone(), MockGateway::new())).await;
    assert_eq!(status.as_u16(), 402);

    let ok = json!({
        "account_id": "alice", "amount": 2500, "pix_key": "alice@example.com", "pix_key_type": "email",
        "reference": "wd_1",
    });
    let (status, response) = post_request("/api/withdraw/request", &ok, wallet_routes(db.clone(), MockGateway::new())).await;
    assert!(status.is_success());
    let outcome: Value = serde_json::from_str(&response).unwrap();
    assert_eq!(outcome["applied"], true);
    assert_eq!(outcome["new_balance"], 500);

    // The same reference is absorbed on retry.
    let (status, response) = post_request("/api/withdraw/request", &ok, wallet_routes(db, MockGateway::new())).await;
    assert!(status.is_success());
    let outcome: Value = serde_json::from_str(&response).unwrap();
    assert_eq!(outcome["applied"], false);
    assert_eq!(outcome["new_balance"], 500);
}

#[actix_web::test]
async fn history_lists_newest_first() {
    let db = new_db().await;
    let alice = register(&db, "alice", "Alice").await;
    fund(&db, &alice, Money::from_reais(100)).await;
    let withdraw = json!({
        "account_id": "alice", "amount": 4000, "pix_key": "alice@example.com", "pix_key_type": "email",
    });
    let (status, _) =
        post_request("/api/withdraw/request", &withdraw, wallet_routes(db.clone(), MockGateway::new())).await;
    assert!(status.is_success());

    let (status, response) = get_request("/api/account/alice/history", wallet_routes(db, MockGateway::new())).await;
    assert!(status.is_success());
    let history: Value = serde_json::from_str(&response).unwrap();
    let entries = history["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["kind"], "Withdrawal");
    assert_eq!(entries[0]["balance_after"], 6000);
    assert_eq!(entries[1]["kind"], "Deposit");
    assert_eq!(entries[1]["balance_after"], 10000);
}
