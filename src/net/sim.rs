//! In-process network between one authority and its clients
//!
//! Unreliable traffic gets random latency and loss, so it may arrive out
//! of order or not at all. Reliable traffic gets latency only and keeps
//! its order per link. Every packet crosses the wire codec.

use std::collections::HashMap;

use bytes::Bytes;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{trace, warn};
use uuid::Uuid;

use crate::game::InputEvent;
use crate::session::{Authority, Client};

use super::link::LinkConditions;
use super::protocol::Channel;
use super::{wire, PeerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Endpoint {
    Authority,
    Client(PeerId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Link {
    from: Endpoint,
    to: Endpoint,
}

struct Packet {
    deliver_at: f64,
    seq: u64,
    link: Link,
    frame: Bytes,
}

pub struct SimNetwork {
    authority: Authority,
    clients: Vec<(PeerId, Client)>,
    conditions: LinkConditions,
    rng: ChaCha8Rng,
    now: f64,
    seq: u64,
    in_flight: Vec<Packet>,
    /// Latest scheduled reliable delivery per link
    reliable_tail: HashMap<Link, f64>,
    dropped: u64,
}

impl SimNetwork {
    pub fn new(authority: Authority, conditions: LinkConditions, seed: u64) -> Self {
        Self {
            authority,
            clients: Vec::new(),
            conditions,
            rng: ChaCha8Rng::seed_from_u64(seed),
            now: 0.0,
            seq: 0,
            in_flight: Vec::new(),
            reliable_tail: HashMap::new(),
            dropped: 0,
        }
    }

    pub fn set_conditions(&mut self, conditions: LinkConditions) {
        self.conditions = conditions;
    }

    /// Seconds of simulated time elapsed
    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn dropped_packets(&self) -> u64 {
        self.dropped
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    pub fn authority_mut(&mut self) -> &mut Authority {
        &mut self.authority
    }

    pub fn client(&self, peer: PeerId) -> Option<&Client> {
        self.clients.iter().find(|(p, _)| *p == peer).map(|(_, c)| c)
    }

    pub fn client_mut(&mut self, peer: PeerId) -> Option<&mut Client> {
        self.clients
            .iter_mut()
            .find(|(p, _)| *p == peer)
            .map(|(_, c)| c)
    }

    /// Open a connection; the client learns its vehicle on the next step
    pub fn connect(&mut self) -> PeerId {
        let peer = Uuid::from_u128(self.rng.gen());
        let client = Client::new(self.authority.settings().clone());
        self.authority.join(peer);
        self.clients.push((peer, client));
        self.flush();
        peer
    }

    pub fn disconnect(&mut self, peer: PeerId) {
        self.authority.leave(peer);
        self.clients.retain(|(p, _)| *p != peer);
        self.flush();
    }

    /// Feed an input event to one client and send whatever it produces
    pub fn input(&mut self, peer: PeerId, event: InputEvent) {
        if let Some(client) = self.client_mut(peer) {
            client.handle_input(event);
        }
        self.flush();
    }

    /// Deliver due packets, tick every participant, then send their output
    pub fn step(&mut self, dt: f32) {
        self.deliver_due();
        self.authority.tick(dt);
        for (_, client) in &mut self.clients {
            client.tick(dt);
        }
        self.flush();
        self.now += dt as f64;
    }

    pub fn run_for(&mut self, seconds: f32, dt: f32) {
        let steps = (seconds / dt).round() as usize;
        for _ in 0..steps {
            self.step(dt);
        }
    }

    fn flush(&mut self) {
        let mut sends = Vec::new();

        for outbound in self.authority.drain_outbox() {
            let channel = outbound.message.channel();
            let frame = wire::encode(&outbound.message);
            for (peer, _) in &self.clients {
                if outbound.target.includes(*peer) {
                    let link = Link {
                        from: Endpoint::Authority,
                        to: Endpoint::Client(*peer),
                    };
                    sends.push((link, channel, frame.clone()));
                }
            }
        }

        for (peer, client) in &mut self.clients {
            let link = Link {
                from: Endpoint::Client(*peer),
                to: Endpoint::Authority,
            };
            for msg in client.drain_outbox() {
                sends.push((link, msg.channel(), wire::encode(&msg)));
            }
        }

        for (link, channel, frame) in sends {
            self.send(link, channel, frame);
        }
    }

    fn latency(&mut self) -> f64 {
        let LinkConditions {
            min_latency_ms,
            max_latency_ms,
            ..
        } = self.conditions;
        if max_latency_ms == 0 {
            return 0.0;
        }
        self.rng.gen_range(min_latency_ms..=max_latency_ms) as f64 / 1000.0
    }

    fn send(&mut self, link: Link, channel: Channel, frame: Bytes) {
        let deliver_at = match channel {
            Channel::Unreliable => {
                let loss = self.conditions.loss_percent;
                if loss > 0.0 && self.rng.gen::<f32>() * 100.0 < loss {
                    self.dropped += 1;
                    trace!(?link, "dropped unreliable packet");
                    return;
                }
                self.now + self.latency()
            }
            Channel::Reliable => {
                let at = self.now + self.latency();
                let tail = self.reliable_tail.entry(link).or_insert(at);
                *tail = tail.max(at);
                *tail
            }
        };

        self.seq += 1;
        self.in_flight.push(Packet {
            deliver_at,
            seq: self.seq,
            link,
            frame,
        });
    }

    fn deliver_due(&mut self) {
        let now = self.now;
        let (mut due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.in_flight)
            .into_iter()
            .partition(|p| p.deliver_at <= now);
        self.in_flight = pending;
        due.sort_by(|a, b| a.deliver_at.total_cmp(&b.deliver_at).then(a.seq.cmp(&b.seq)));

        for packet in due {
            let msg = match wire::decode(&packet.frame) {
                Ok(msg) => msg,
                Err(err) => {
                    warn!(error = %err, "undecodable packet");
                    continue;
                }
            };
            match (packet.link.from, packet.link.to) {
                (Endpoint::Client(from), Endpoint::Authority) => self.authority.receive(from, msg),
                (_, Endpoint::Client(peer)) => {
                    if let Some(client) = self.client_mut(peer) {
                        client.receive(msg);
                    }
                }
                (Endpoint::Authority, Endpoint::Authority) => {}
            }
        }
    }
}
