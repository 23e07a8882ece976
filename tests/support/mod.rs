// Shared setup for the integration tests.
#![allow(dead_code)]

use vehicle_sync::config::GameSettings;
use vehicle_sync::net::{LinkConditions, PeerId, SimNetwork};
use vehicle_sync::session::{Authority, Client, ServerEntity};

/// One simulation frame at 60 Hz.
pub const DT: f32 = 1.0 / 60.0;

// Default tuning with the background chatter (pings, resyncs) switched off
// and no pickups in the level.
pub fn quiet_settings() -> GameSettings {
    let mut settings = GameSettings::default();
    settings.net.ping_interval = 0.0;
    settings.net.resync_interval = 0.0;
    settings
}

pub fn network(settings: GameSettings, conditions: LinkConditions) -> SimNetwork {
    SimNetwork::new(Authority::new(settings, 17), conditions, 29)
}

pub fn client(net: &SimNetwork, peer: PeerId) -> &Client {
    net.client(peer).expect("peer should be connected")
}

pub fn client_mut(net: &mut SimNetwork, peer: PeerId) -> &mut Client {
    net.client_mut(peer).expect("peer should be connected")
}

// The authority's record of the vehicle a peer controls.
pub fn server_entity(net: &SimNetwork, peer: PeerId) -> &ServerEntity {
    let authority = net.authority();
    let id = authority.entity_of(peer).expect("peer should have joined");
    authority.entity(id).expect("entity should be spawned")
}
