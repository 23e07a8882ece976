//! Headless scripted driver
//!
//! Connects to the authority over WebSocket and drives a vehicle in lazy
//! S-curves, firing every couple of seconds.
//!
//! Environment: `BOT_URL` (default `ws://127.0.0.1:8080/ws`), `BOT_SECONDS`
//! (default 30) plus the server's `LOG_LEVEL`, `TICK_RATE` and
//! `SETTINGS_PATH`.

use std::env;

use futures::{SinkExt, StreamExt};
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, info, warn};

use vehicle_sync::config::Config;
use vehicle_sync::game::InputEvent;
use vehicle_sync::init_tracing;
use vehicle_sync::net::{decode, encode};
use vehicle_sync::session::Client;
use vehicle_sync::util::time::{tick_duration, FrameClock};

/// Seconds between scripted fire presses
const FIRE_EVERY: f32 = 2.0;

struct Script {
    next_fire: f32,
}

impl Script {
    fn inputs(&mut self, elapsed: f32) -> Vec<InputEvent> {
        let mut events = vec![
            InputEvent::Throttle(1.0),
            InputEvent::Steer((elapsed * 0.5).sin()),
        ];
        if elapsed >= self.next_fire {
            self.next_fire += FIRE_EVERY;
            events.push(InputEvent::FirePressed);
        }
        events
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    init_tracing(&config.log_level, config.log_json);
    let settings = config.game_settings()?;

    let url = env::var("BOT_URL").unwrap_or_else(|_| "ws://127.0.0.1:8080/ws".to_string());
    let seconds: f32 = env::var("BOT_SECONDS")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(30.0);

    let (socket, _) = connect_async(url.as_str()).await?;
    info!(url = %url, "connected");
    let (mut sink, mut stream) = socket.split();

    let mut client = Client::new(settings);
    let mut script = Script { next_fire: 1.0 };
    let mut ticker = interval(tick_duration(config.tick_rate));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut clock = FrameClock::new();
    let mut elapsed = 0.0f32;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let dt = clock.delta(0.1);
                elapsed += dt;

                for event in script.inputs(elapsed) {
                    client.handle_input(event);
                }
                client.tick(dt);

                for msg in client.drain_outbox() {
                    sink.send(WsMessage::Binary(encode(&msg).to_vec())).await?;
                }
                for event in client.drain_hud_events() {
                    debug!(?event, "hud");
                }

                if elapsed >= seconds {
                    break;
                }
            }
            incoming = stream.next() => match incoming {
                Some(Ok(WsMessage::Binary(data))) => match decode(&data) {
                    Ok(msg) => client.receive(msg),
                    Err(e) => warn!(error = %e, "failed to decode frame"),
                },
                Some(Ok(WsMessage::Close(_))) | None => {
                    info!("server closed the connection");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            },
        }
    }

    let hud = client.hud();
    info!(
        entity = ?client.entity(),
        position = ?client.position(),
        ammo = hud.ammo,
        health = hud.health,
        ping_ms = hud.ping_ms,
        remotes = client.remotes().count(),
        "bot finished"
    );
    let _ = sink.close().await;
    Ok(())
}
