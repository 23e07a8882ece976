//! Application state shared across routes

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};

use crate::config::{Config, GameSettings};
use crate::session::Authority;
use crate::ws::session::{
    AuthorityTask, Datagram, PeerEvent, PeerRegistry, ServerStats, INBOUND_CAPACITY,
    UNRELIABLE_CAPACITY,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub settings: Arc<GameSettings>,
    pub inbound_tx: mpsc::Sender<PeerEvent>,
    pub unreliable_tx: broadcast::Sender<Datagram>,
    pub peers: Arc<PeerRegistry>,
    pub stats: Arc<RwLock<ServerStats>>,
}

impl AppState {
    /// Build the shared state together with the authority loop it feeds.
    /// The caller spawns the returned task.
    pub fn new(config: Config, settings: GameSettings, seed: u64) -> (Self, AuthorityTask) {
        let config = Arc::new(config);

        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
        let (unreliable_tx, _) = broadcast::channel(UNRELIABLE_CAPACITY);
        let peers = Arc::new(PeerRegistry::new());
        let stats = Arc::new(RwLock::new(ServerStats::default()));

        let task = AuthorityTask::new(
            Authority::new(settings.clone(), seed),
            config.tick_rate,
            inbound_rx,
            unreliable_tx.clone(),
            peers.clone(),
            stats.clone(),
        );

        let state = Self {
            config,
            settings: Arc::new(settings),
            inbound_tx,
            unreliable_tx,
            peers,
            stats,
        };
        (state, task)
    }
}
