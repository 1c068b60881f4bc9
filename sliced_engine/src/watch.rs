//! In-process fan-out of committed match states.
//!
//! Every transactional update publishes the state it committed; each connected client's push
//! socket holds a receiver. Lagging receivers miss intermediate states but always see the latest
//! one, which is all the clients render.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tokio::sync::broadcast;

use crate::db_types::{MatchId, MatchState};

const CHANNEL_CAPACITY: usize = 32;

#[derive(Clone, Default)]
pub struct MatchWatch {
    channels: Arc<Mutex<HashMap<MatchId, broadcast::Sender<MatchState>>>>,
}

impl MatchWatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, id: &MatchId) -> broadcast::Receiver<MatchState> {
        let mut channels = self.channels.lock().unwrap();
        channels.entry(id.clone()).or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0).subscribe()
    }

    /// Broadcasts a committed state. A match nobody is watching is silently skipped.
    pub fn publish(&self, state: &MatchState) {
        let channels = self.channels.lock().unwrap();
        if let Some(tx) = channels.get(&state.id) {
            let _ = tx.send(state.clone());
        }
    }

    /// Drops the channel for a match that no longer exists.
    pub fn forget(&self, id: &MatchId) {
        let mut channels = self.channels.lock().unwrap();
        channels.remove(id);
    }
}
