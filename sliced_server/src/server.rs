use std::{future::Future, pin::Pin, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use sliced_engine::{
    events::{EventHandlers, EventHooks},
    CommissionPolicy,
    MatchFlowApi,
    SettlementEngine,
    SqliteDatabase,
    WalletApi,
};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    gateway::{MercadoPagoGateway, PixGateway},
    routes::{
        health,
        AccountBalanceRoute,
        AccountHistoryRoute,
        CreateDepositRoute,
        GameChargeRoute,
        GameCreditRoute,
        PaymentWebhookRoute,
        RegisterAccountRoute,
        RequestWithdrawalRoute,
    },
    ws::{payment_socket, SocketRegistry},
};

const EVENT_BUFFER_SIZE: usize = 32;
const SOCKET_SWEEP_INTERVAL_SECS: u64 = 60;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway = MercadoPagoGateway::new(config.gateway.clone());
    let srv = create_server_instance(config, db, gateway)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance<G>(config: ServerConfig, db: SqliteDatabase, gateway: G) -> Result<Server, ServerError>
where G: PixGateway + Clone + Send + Sync + 'static {
    let registry = SocketRegistry::new();
    let policy = CommissionPolicy::from_env();
    let fee_bps = config.platform_fee_bps;
    let mut hooks = EventHooks::default();
    let socket_registry = registry.clone();
    hooks.on_payment_status(move |event| {
        let registry = socket_registry.clone();
        Box::pin(async move {
            registry.push_payment_status(&event).await;
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, hooks);
    let producers = handlers.producers();
    tokio::spawn(handlers.start_handlers());
    tokio::spawn(sweep_stale_sockets(registry.clone()));
    let srv = HttpServer::new(move || {
        let wallet_api = WalletApi::new(db.clone(), policy, producers.clone());
        let flow_api = MatchFlowApi::new(db.clone(), SettlementEngine::new(fee_bps, policy), producers.clone());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("sliced::access_log"))
            .app_data(web::Data::new(wallet_api))
            .app_data(web::Data::new(flow_api))
            .app_data(web::Data::new(gateway.clone()))
            .app_data(web::Data::new(registry.clone()))
            .service(health)
            .service(payment_socket)
            .service(CreateDepositRoute::<SqliteDatabase, G>::new())
            .service(PaymentWebhookRoute::<SqliteDatabase, G>::new())
            .service(RegisterAccountRoute::<SqliteDatabase>::new())
            .service(AccountBalanceRoute::<SqliteDatabase>::new())
            .service(AccountHistoryRoute::<SqliteDatabase>::new())
            .service(RequestWithdrawalRoute::<SqliteDatabase>::new())
            .service(GameChargeRoute::<SqliteDatabase>::new())
            .service(GameCreditRoute::<SqliteDatabase>::new())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

async fn sweep_stale_sockets(registry: SocketRegistry) {
    let mut tick = tokio::time::interval(Duration::from_secs(SOCKET_SWEEP_INTERVAL_SECS));
    loop {
        tick.tick().await;
        trace!("📡️ Sweeping stale payment sockets");
        registry.sweep().await;
    }
}
