//! Presentation-layer feed

use serde::Serialize;

/// Change notifications for whatever draws the HUD
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HudEvent {
    AmmoChanged(i32),
    HealthChanged(i32),
    DebugMenuShown,
    DebugMenuHidden,
}

/// Everything the HUD shows, as of now
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HudState {
    pub ammo: i32,
    pub health: i32,
    pub ping_ms: u32,
    pub debug_menu: bool,
}
