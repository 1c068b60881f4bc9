//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests:
//! ```nocompile
//!     fn my_handler() -> impl Responder {
//!         std::thread::sleep(Duration::from_secs(5)); // <-- Bad practice! Will cause the current worker thread to
//! hang!
//!     }
//! ```
//! For this reason, any long, non-cpu-bound operation (e.g. I/O, database operations, etc.) should be expressed as
//! futures or asynchronous functions. Async handlers get executed concurrently by worker threads and thus don’t block
//! execution:
//!
//! ```nocompile
//!     async fn my_handler() -> impl Responder {
//!         tokio::time::sleep(Duration::from_secs(5)).await; // <-- Ok. Worker thread will handle other requests here
//!     }
//! ```
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use sliced_common::Money;
use sliced_engine::{
    db_types::{AccountId, NewAccount},
    traits::{LedgerManagement, MatchManagement},
    MatchFlowApi,
    WalletApi,
};

use crate::{
    data_objects::{
        BalanceResponse,
        GameChargeRequest,
        GameCreditRequest,
        HistoryResponse,
        JsonResponse,
        NewPixCharge,
        PaymentWebhook,
        RegisterAccountRequest,
        SettleResponse,
        WebhookQuery,
        WithdrawRequest,
    },
    errors::ServerError,
    gateway::PixGateway,
};

/// The backend a game-money route needs: match storage plus the ledger it settles into.
pub trait GameBackend: MatchManagement + LedgerManagement {}
impl<T: MatchManagement + LedgerManagement> GameBackend for T {}

const HISTORY_PAGE_SIZE: i64 = 50;

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Deposits  ----------------------------------------------------
route!(create_deposit => Post "/api/deposit/create" impl LedgerManagement, PixGateway);
/// Creates a PIX charge at the gateway for the given account and hands the QR payloads back to
/// the client. The deposit itself is only credited once the webhook confirms the charge.
pub async fn create_deposit<B: LedgerManagement, G: PixGateway + 'static>(
    body: web::Json<NewPixCharge>,
    wallet: web::Data<WalletApi<B>>,
    gateway: web::Data<G>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    debug!("💻️ POST deposit/create for {}", request.account_id);
    if request.amount <= Money::default() {
        return Err(ServerError::InvalidRequestBody(format!("deposit amount must be positive, got {}", request.amount)));
    }
    wallet
        .fetch_account(&request.account_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("account {}", request.account_id)))?;
    let charge = gateway.create_charge(request).await?;
    Ok(HttpResponse::Ok().json(charge))
}

route!(payment_webhook => Post "/api/webhook/payment" impl LedgerManagement, PixGateway);
/// The gateway's payment webhook. The body only names a charge; its status and amount are
/// re-fetched from the gateway before the ledger is touched, so a forged or replayed body can
/// never mint money. Database failures surface as 5xx so the gateway redelivers.
pub async fn payment_webhook<B: LedgerManagement, G: PixGateway + 'static>(
    query: web::Query<WebhookQuery>,
    body: web::Bytes,
    wallet: web::Data<WalletApi<B>>,
    gateway: web::Data<G>,
) -> Result<HttpResponse, ServerError> {
    let notice = serde_json::from_slice::<PaymentWebhook>(&body).unwrap_or_default();
    let topic = notice.topic.clone().or_else(|| query.topic.clone());
    if topic.as_deref() != Some("payment") {
        debug!("💻️ Ignoring a webhook with topic {topic:?}");
        return Ok(HttpResponse::Ok().json(JsonResponse::success("ignored")));
    }
    let charge_id = notice
        .charge_id()
        .or_else(|| query.id.clone())
        .ok_or_else(|| ServerError::InvalidRequestBody("payment webhook carried no charge id".into()))?;
    debug!("💻️ Payment webhook for charge {charge_id}");
    let update = gateway.fetch_charge(&charge_id).await?;
    let outcome = wallet.process_charge_update(update).await?;
    let message = match outcome {
        Some(outcome) if outcome.applied => "deposit applied",
        Some(_) => "already applied",
        None => "status recorded",
    };
    Ok(HttpResponse::Ok().json(JsonResponse::success(message)))
}

//----------------------------------------------   Accounts  ----------------------------------------------------
route!(register_account => Post "/api/account/register" impl LedgerManagement);
/// Registering is idempotent: re-posting the same account refreshes its display name but keeps
/// its balance and original referrer.
pub async fn register_account<B: LedgerManagement>(
    body: web::Json<RegisterAccountRequest>,
    wallet: web::Data<WalletApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    debug!("💻️ POST account/register for {}", request.account_id);
    let mut new_account = NewAccount::new(request.account_id, request.display_name);
    if let Some(referrer) = request.referred_by {
        new_account = new_account.with_referrer(referrer);
    }
    let account = wallet.register_account(new_account).await?;
    Ok(HttpResponse::Ok().json(account))
}

route!(account_balance => Get "/api/account/{id}/balance" impl LedgerManagement);
pub async fn account_balance<B: LedgerManagement>(
    path: web::Path<String>,
    wallet: web::Data<WalletApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let account_id = AccountId::from(path.into_inner());
    trace!("💻️ GET balance for {account_id}");
    let balance = wallet.balance(&account_id).await?;
    Ok(HttpResponse::Ok().json(BalanceResponse { account_id, balance }))
}

route!(account_history => Get "/api/account/{id}/history" impl LedgerManagement);
pub async fn account_history<B: LedgerManagement>(
    path: web::Path<String>,
    wallet: web::Data<WalletApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let account_id = AccountId::from(path.into_inner());
    debug!("💻️ GET history for {account_id}");
    let entries = wallet.history(&account_id, HISTORY_PAGE_SIZE).await?;
    Ok(HttpResponse::Ok().json(HistoryResponse { account_id, entries }))
}

//----------------------------------------------   Withdrawals  ----------------------------------------------------
route!(request_withdrawal => Post "/api/withdraw/request" impl LedgerManagement);
/// Debits the balance immediately; the PIX transfer to the given key happens out of band, working
/// off the withdrawal ledger entries.
pub async fn request_withdrawal<B: LedgerManagement>(
    body: web::Json<WithdrawRequest>,
    wallet: web::Data<WalletApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    // The key itself stays out of the logs.
    debug!("💻️ POST withdraw/request of {} for {} ({} key)", request.amount, request.account_id, request.pix_key_type);
    let outcome = wallet.request_withdrawal(&request.account_id, request.amount, request.reference).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

//----------------------------------------------   Game money  ----------------------------------------------------
route!(game_charge => Post "/api/game/charge" impl GameBackend);
/// Takes a player's entry fee for a match. The fee is derived server-side from the match stake;
/// the client only names the match. Retries are absorbed and report `applied == false`.
pub async fn game_charge<B: GameBackend>(
    body: web::Json<GameChargeRequest>,
    flow: web::Data<MatchFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    debug!("💻️ POST game/charge for {} in {}", request.account_id, request.match_id);
    let outcome = flow.charge_entry(&request.match_id, &request.account_id).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

route!(game_credit => Post "/api/game/credit" impl GameBackend);
/// Nudges settlement of a finished match. The prize is computed server-side; `settled == false`
/// means someone else already settled it (or it is not finished yet), never that money was lost.
pub async fn game_credit<B: GameBackend>(
    body: web::Json<GameCreditRequest>,
    flow: web::Data<MatchFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    debug!("💻️ POST game/credit for {} in {}", request.account_id, request.match_id);
    let settled = match flow.fetch_match(&request.match_id).await? {
        // A missing match was already settled and cleaned up; the retry is absorbed.
        None => false,
        Some(state) => flow.maybe_settle(&state).await?.is_some(),
    };
    Ok(HttpResponse::Ok().json(SettleResponse { settled }))
}
