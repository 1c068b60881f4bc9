//! Payment-status push sockets.
//!
//! A client opens `/ws`, sends `{"type": "register", "charge_id": "..."}` and then receives a
//! `payment_status` message every time the gateway reports on that charge. Once a terminal status
//! has been delivered the server closes the socket; a socket that never sees its charge complete
//! is swept after [`STALE_SOCKET_SECS`].
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use actix_web::{get, web, HttpRequest, HttpResponse};
use actix_ws::{CloseCode, CloseReason, Message, Session};
use futures::StreamExt;
use log::*;
use sliced_engine::events::PaymentStatusEvent;

use crate::data_objects::{WsPush, WsRequest};

pub const STALE_SOCKET_SECS: u64 = 600;

struct Watcher {
    session: Session,
    registered_at: Instant,
}

/// All sockets currently waiting on a charge, keyed by charge id. Registering a second socket for
/// the same charge replaces the first.
#[derive(Clone, Default)]
pub struct SocketRegistry {
    inner: Arc<Mutex<HashMap<String, Watcher>>>,
}

impl SocketRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, charge_id: &str, session: Session) {
        let mut sockets = self.inner.lock().unwrap();
        let watcher = Watcher { session, registered_at: Instant::now() };
        if sockets.insert(charge_id.to_string(), watcher).is_some() {
            debug!("📡️ Replaced the socket watching charge {charge_id}");
        }
    }

    pub fn remove(&self, charge_id: &str) {
        self.inner.lock().unwrap().remove(charge_id);
    }

    /// Delivers a payment status to the socket watching the charge, if any. Terminal statuses
    /// also close and deregister the socket.
    pub async fn push_payment_status(&self, event: &PaymentStatusEvent) {
        // The session is cloned out so that the lock is never held across an await.
        let session = self.inner.lock().unwrap().get(&event.charge_id).map(|w| w.session.clone());
        let Some(mut session) = session else { return };
        let push = WsPush::payment_status(event);
        let text = match serde_json::to_string(&push) {
            Ok(text) => text,
            Err(e) => {
                warn!("📡️ Could not serialize a payment status push. {e}");
                return;
            },
        };
        if session.text(text).await.is_err() {
            debug!("📡️ Socket for charge {} is gone. Deregistering it.", event.charge_id);
            self.remove(&event.charge_id);
            return;
        }
        debug!("📡️ Pushed {} status for charge {}", event.status, event.charge_id);
        if event.status.is_terminal() {
            self.remove(&event.charge_id);
            let reason = CloseReason { code: CloseCode::Normal, description: None };
            let _ = session.close(Some(reason)).await;
        }
    }

    /// Drops sockets whose charge never completed.
    pub async fn sweep(&self) {
        let cutoff = Duration::from_secs(STALE_SOCKET_SECS);
        let stale: Vec<(String, Session)> = {
            let mut sockets = self.inner.lock().unwrap();
            let expired: Vec<String> = sockets
                .iter()
                .filter(|(_, w)| w.registered_at.elapsed() > cutoff)
                .map(|(id, _)| id.clone())
                .collect();
            expired.into_iter().filter_map(|id| sockets.remove(&id).map(|w| (id, w.session))).collect()
        };
        for (charge_id, session) in stale {
            debug!("📡️ Sweeping the stale socket for charge {charge_id}");
            let reason = CloseReason { code: CloseCode::Away, description: None };
            let _ = session.close(Some(reason)).await;
        }
    }
}

#[get("/ws")]
pub async fn payment_socket(
    req: HttpRequest,
    body: web::Payload,
    registry: web::Data<SocketRegistry>,
) -> Result<HttpResponse, actix_web::Error> {
    let (response, session, mut stream) = actix_ws::handle(&req, body)?;
    let registry = registry.into_inner();
    actix_web::rt::spawn(async move {
        let mut session = session;
        let mut registered: Option<String> = None;
        while let Some(Ok(msg)) = stream.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<WsRequest>(&text) {
                    Ok(WsRequest::Register { charge_id }) => {
                        debug!("📡️ Socket registered for charge {charge_id}");
                        registry.register(&charge_id, session.clone());
                        registered = Some(charge_id);
                    },
                    Err(e) => debug!("📡️ Ignoring an unreadable socket message. {e}"),
                },
                Message::Ping(bytes) => {
                    if session.pong(&bytes).await.is_err() {
                        break;
                    }
                },
                Message::Close(_) => break,
                _ => {},
            }
        }
        if let Some(charge_id) = registered {
            registry.remove(&charge_id);
        }
    });
    Ok(response)
}
