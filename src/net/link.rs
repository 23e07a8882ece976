//! Routing envelopes and link conditions

use serde::{Deserialize, Serialize};

use super::protocol::Message;
use super::PeerId;

/// Who an authority message is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Peer(PeerId),
    All,
    /// Multicast to everyone but the origin of a relayed message
    AllExcept(PeerId),
}

impl Target {
    pub fn includes(&self, peer: PeerId) -> bool {
        match self {
            Target::Peer(p) => *p == peer,
            Target::All => true,
            Target::AllExcept(p) => *p != peer,
        }
    }
}

/// A message leaving the authority
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub target: Target,
    pub message: Message,
}

impl Outbound {
    pub fn to(peer: PeerId, message: Message) -> Self {
        Self {
            target: Target::Peer(peer),
            message,
        }
    }

    pub fn all(message: Message) -> Self {
        Self {
            target: Target::All,
            message,
        }
    }

    pub fn all_except(peer: PeerId, message: Message) -> Self {
        Self {
            target: Target::AllExcept(peer),
            message,
        }
    }
}

/// Latency and loss applied to simulated traffic
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConditions {
    pub min_latency_ms: u32,
    pub max_latency_ms: u32,
    /// Share of unreliable packets dropped, 0..=100
    pub loss_percent: f32,
}

impl Default for LinkConditions {
    fn default() -> Self {
        Self {
            min_latency_ms: 0,
            max_latency_ms: 0,
            loss_percent: 0.0,
        }
    }
}

impl LinkConditions {
    pub fn new(min_latency_ms: u32, max_latency_ms: u32, loss_percent: f32) -> Self {
        Self {
            min_latency_ms,
            max_latency_ms: max_latency_ms.max(min_latency_ms),
            loss_percent: loss_percent.clamp(0.0, 100.0),
        }
    }

    pub fn is_perfect(&self) -> bool {
        self.max_latency_ms == 0 && self.loss_percent <= 0.0
    }
}
