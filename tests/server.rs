mod support;

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tower::ServiceExt;

use vehicle_sync::app::AppState;
use vehicle_sync::config::Config;
use vehicle_sync::http::build_router;
use vehicle_sync::net::{decode, encode, Message};

use support::quiet_settings;

fn test_config() -> Config {
    Config {
        server_addr: "127.0.0.1:0".parse().expect("valid address"),
        log_level: "warn".to_string(),
        log_json: false,
        tick_rate: 60,
        settings_path: None,
    }
}

#[tokio::test]
async fn health_reports_ok() {
    let (state, _authority) = AppState::new(test_config(), quiet_settings(), 1);
    let router = build_router(state);

    let response = router
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("router should respond");
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let json: serde_json::Value = serde_json::from_slice(&body).expect("json body");
    assert_eq!(json["status"], "ok");
    assert_eq!(json["connected_peers"], 0);
}

#[tokio::test]
async fn websocket_peer_is_welcomed_and_answered() {
    let (state, authority) = AppState::new(test_config(), quiet_settings(), 2);
    tokio::spawn(authority.run());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral test port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, build_router(state))
            .await
            .expect("server failed");
    });

    let (mut socket, _) = connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("websocket connect");

    let mut welcomed = false;
    let mut answered = false;
    let deadline = Duration::from_secs(5);
    while !answered {
        let frame = timeout(deadline, socket.next())
            .await
            .expect("server should keep talking")
            .expect("socket open")
            .expect("frame");
        let WsMessage::Binary(data) = frame else {
            continue;
        };
        match decode(&data).expect("server frames decode") {
            Message::Welcome { ammo, health, .. } => {
                let settings = quiet_settings();
                assert_eq!(ammo, settings.player.starting_ammo);
                assert_eq!(health, settings.player.starting_health);
                welcomed = true;
                socket
                    .send(WsMessage::Binary(encode(&Message::Ping { t: 1.5 }).to_vec()))
                    .await
                    .expect("send ping");
            }
            Message::Pong { t } => {
                assert!(welcomed);
                assert_eq!(t, 1.5);
                answered = true;
            }
            _ => {}
        }
    }

    let _ = socket.close(None).await;
}

#[tokio::test]
async fn dropped_peer_leaves_without_sending_anything() {
    let (state, authority) = AppState::new(test_config(), quiet_settings(), 3);
    tokio::spawn(authority.run());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral test port");
    let addr = listener.local_addr().expect("local addr");
    let router = build_router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });

    let (mut socket, _) = connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("websocket connect");
    loop {
        let frame = timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("welcome should arrive")
            .expect("socket open")
            .expect("frame");
        if let WsMessage::Binary(data) = frame {
            if matches!(decode(&data), Ok(Message::Welcome { .. })) {
                break;
            }
        }
    }

    // Same effect as the authority giving up on a full reliable queue
    let ids = state.peers.ids();
    assert_eq!(ids.len(), 1);
    state.peers.remove(&ids[0]);

    // The client stays silent; the session must still end on the server side
    let left = timeout(Duration::from_secs(3), async {
        while state.stats.read().connected_peers != 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(left.is_ok(), "peer still joined after its writer stopped");

    drop(socket);
}
