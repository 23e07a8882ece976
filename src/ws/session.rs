//! Authority tick loop and per-peer delivery queues

use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::net::{encode, Channel, Message, Outbound, PeerId, Target};
use crate::session::Authority;
use crate::util::time::{tick_delta, tick_duration, FrameClock};

/// Capacity of the inbound queue feeding the authority task
pub const INBOUND_CAPACITY: usize = 1024;
/// Per-peer queue of reliable frames
pub const RELIABLE_CAPACITY: usize = 256;
/// Multicast buffer for unreliable frames; slow peers skip ahead
pub const UNRELIABLE_CAPACITY: usize = 256;

/// Connection lifecycle and traffic, in arrival order
#[derive(Debug)]
pub enum PeerEvent {
    Joined(PeerId),
    Message(PeerId, Message),
    Left(PeerId),
}

/// Unreliable frame with its audience
#[derive(Debug, Clone)]
pub struct Datagram {
    pub target: Target,
    pub frame: Bytes,
}

/// Reliable senders of every connected peer
#[derive(Default)]
pub struct PeerRegistry {
    peers: DashMap<PeerId, mpsc::Sender<Bytes>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, peer: PeerId, tx: mpsc::Sender<Bytes>) {
        self.peers.insert(peer, tx);
    }

    pub fn remove(&self, peer: &PeerId) {
        self.peers.remove(peer);
    }

    pub fn ids(&self) -> Vec<PeerId> {
        self.peers.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Queue a reliable frame. A peer whose queue is full can no longer be
    /// kept consistent, so it is dropped from the registry, which closes
    /// its connection.
    fn send(&self, peer: PeerId, frame: Bytes) {
        let full = match self.peers.get(&peer) {
            Some(tx) => match tx.try_send(frame) {
                Ok(()) => false,
                Err(mpsc::error::TrySendError::Full(_)) => true,
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            },
            None => false,
        };
        if full {
            warn!(peer = %peer, "reliable queue full, disconnecting peer");
            self.peers.remove(&peer);
        }
    }

    fn send_to(&self, target: Target, frame: Bytes) {
        match target {
            Target::Peer(peer) => self.send(peer, frame),
            Target::All | Target::AllExcept(_) => {
                for peer in self.ids().into_iter().filter(|peer| target.includes(*peer)) {
                    self.send(peer, frame.clone());
                }
            }
        }
    }
}

/// Snapshot published by the authority task for the HTTP side
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerStats {
    pub tick: u64,
    pub connected_peers: usize,
}

/// Runs the authority on its own task
pub struct AuthorityTask {
    authority: Authority,
    tick_rate: u32,
    inbound_rx: mpsc::Receiver<PeerEvent>,
    unreliable_tx: broadcast::Sender<Datagram>,
    peers: Arc<PeerRegistry>,
    stats: Arc<RwLock<ServerStats>>,
}

impl AuthorityTask {
    pub fn new(
        authority: Authority,
        tick_rate: u32,
        inbound_rx: mpsc::Receiver<PeerEvent>,
        unreliable_tx: broadcast::Sender<Datagram>,
        peers: Arc<PeerRegistry>,
        stats: Arc<RwLock<ServerStats>>,
    ) -> Self {
        Self {
            authority,
            tick_rate,
            inbound_rx,
            unreliable_tx,
            peers,
            stats,
        }
    }

    /// Run the authoritative tick loop until every sender is gone
    pub async fn run(mut self) {
        info!(tick_rate = self.tick_rate, "authority loop started");

        let mut tick_interval = interval(tick_duration(self.tick_rate));
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut clock = FrameClock::new();
        // A stalled task catches up at most a few ticks in one step
        let max_step = tick_delta(self.tick_rate) * 4.0;

        loop {
            tick_interval.tick().await;

            if !self.process_inbound() {
                info!("inbound channel closed, stopping authority loop");
                break;
            }

            self.authority.tick(clock.delta(max_step));
            self.route_outbox();

            *self.stats.write() = ServerStats {
                tick: self.authority.tick_count(),
                connected_peers: self.authority.connected_peers(),
            };
        }
    }

    /// Drain queued peer events; false once all senders are dropped
    fn process_inbound(&mut self) -> bool {
        loop {
            match self.inbound_rx.try_recv() {
                Ok(PeerEvent::Joined(peer)) => {
                    self.authority.join(peer);
                }
                Ok(PeerEvent::Message(peer, msg)) => self.authority.receive(peer, msg),
                Ok(PeerEvent::Left(peer)) => self.authority.leave(peer),
                Err(mpsc::error::TryRecvError::Empty) => return true,
                Err(mpsc::error::TryRecvError::Disconnected) => return false,
            }
        }
    }

    fn route_outbox(&mut self) {
        for Outbound { target, message } in self.authority.drain_outbox() {
            let frame = encode(&message);
            match message.channel() {
                Channel::Reliable => self.peers.send_to(target, frame),
                Channel::Unreliable => {
                    // No subscribers just means nobody is connected
                    if self.unreliable_tx.send(Datagram { target, frame }).is_err() {
                        debug!(message = message.name(), "no listeners for datagram");
                    }
                }
            }
        }
    }
}
