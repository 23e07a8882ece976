//! Participant state machines
//!
//! Neither role performs I/O: both are driven by `receive`, input and
//! `tick`, and queue what they want sent in an outbox.

pub mod authority;
pub mod client;
pub mod hud;

pub use authority::{Authority, Controller, ServerEntity};
pub use client::{Client, Controlled, Observed};
pub use hud::{HudEvent, HudState};
