//! Messages, wire format and routing between participants

pub mod link;
pub mod protocol;
pub mod sim;
pub mod wire;

pub use link::{LinkConditions, Outbound, Target};
pub use protocol::{Channel, Message, RocketRef};
pub use sim::SimNetwork;
pub use wire::{decode, encode, WireError};

/// One connection to the authority
pub type PeerId = uuid::Uuid;
