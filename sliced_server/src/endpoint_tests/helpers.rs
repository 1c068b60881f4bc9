use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web::ServiceConfig, App};
use log::debug;
use serde::Serialize;
use sliced_common::Money;
use sliced_engine::{
    db_types::{AccountId, NewAccount},
    traits::{LedgerManagement, LedgerOperation},
    SqliteDatabase,
};

pub async fn new_db() -> SqliteDatabase {
    let _ = env_logger::try_init();
    SqliteDatabase::new_with_url("sqlite::memory:", 1).await.expect("in-memory database")
}

pub async fn register(db: &SqliteDatabase, id: &str, name: &str) -> AccountId {
    let account = db.upsert_account(NewAccount::new(id.into(), name.into())).await.expect("register account");
    account.id
}

pub async fn fund(db: &SqliteDatabase, account: &AccountId, amount: Money) {
    let op = LedgerOperation::deposit(account.clone(), &format!("seed_{account}"), amount);
    let outcome = db.apply_operation(op).await.expect("fund account");
    assert!(outcome.applied);
}

pub async fn get_request(path: &str, configure: impl FnOnce(&mut ServiceConfig)) -> (StatusCode, String) {
    let req = TestRequest::get().uri(path).to_request();
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    debug!("Making GET request to {path}");
    let (_, res) = test::call_service(&service, req).await.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    (status, body)
}

pub async fn post_request<B: Serialize>(
    path: &str,
    body: &B,
    configure: impl FnOnce(&mut ServiceConfig),
) -> (StatusCode, String) {
    let req = TestRequest::post().uri(path).set_json(body).to_request();
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    debug!("Making POST request to {path}");
    let (_, res) = test::call_service(&service, req).await.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    (status, body)
}
