mod support;

use glam::Vec3;
use vehicle_sync::game::{yaw, EntityId, InputEvent, MovementSample};
use vehicle_sync::net::{LinkConditions, Message, PeerId, SimNetwork};
use vehicle_sync::session::Client;

use support::{client, client_mut, network, quiet_settings, DT};

const OBSERVED: EntityId = EntityId(2);

fn observer(threshold: f32, smoothing: bool) -> Client {
    let mut settings = quiet_settings();
    settings.net.correction_threshold = threshold;
    settings.net.network_smoothing = smoothing;

    let mut client = Client::new(settings);
    client.receive(Message::Welcome {
        entity: EntityId(1),
        position: Vec3::new(5000.0, 0.0, 0.0),
        yaw: 0.0,
        ammo: 0,
        health: 100,
    });
    client.receive(Message::EntitySpawned {
        entity: OBSERVED,
        position: Vec3::ZERO,
        yaw: 0.0,
    });
    client
}

fn update_at(x: f32, timestamp: f32) -> Message {
    Message::MovementUpdate {
        entity: OBSERVED,
        sample: MovementSample {
            position: Vec3::new(x, 0.0, 0.0),
            timestamp,
            throttle: 0.0,
            yaw: yaw::encode(0.0),
        },
    }
}

fn observed_position(client: &Client) -> Vec3 {
    client.remote(OBSERVED).expect("observed").motion.position()
}

fn observed_render(client: &Client) -> Vec3 {
    client.remote(OBSERVED).expect("observed").motion.render_position()
}

#[test]
fn error_inside_threshold_keeps_dead_reckoning() {
    for smoothing in [false, true] {
        let mut c = observer(80.0, smoothing);
        c.receive(update_at(79.0, 0.0));
        assert_eq!(observed_position(&c), Vec3::ZERO);
        assert_eq!(observed_render(&c), Vec3::ZERO);
    }
}

#[test]
fn error_past_threshold_snaps_without_smoothing() {
    let mut c = observer(80.0, false);
    c.receive(update_at(81.0, 0.0));
    assert_eq!(observed_position(&c), Vec3::new(81.0, 0.0, 0.0));
    assert_eq!(observed_render(&c), Vec3::new(81.0, 0.0, 0.0));
}

#[test]
fn error_past_threshold_eases_in_with_smoothing() {
    let mut c = observer(80.0, true);
    c.receive(update_at(81.0, 0.0));

    // Logical body jumps, the mesh stays where it was drawn
    assert_eq!(observed_position(&c), Vec3::new(81.0, 0.0, 0.0));
    assert_eq!(observed_render(&c), Vec3::ZERO);

    let mut last = observed_render(&c).distance(observed_position(&c));
    for _ in 0..60 {
        c.tick(DT);
        let gap = observed_render(&c).distance(observed_position(&c));
        assert!(gap <= last);
        last = gap;
    }
    assert_eq!(observed_render(&c), observed_position(&c));
}

#[test]
fn out_of_order_update_is_ignored() {
    let mut c = observer(40.0, false);
    c.receive(update_at(0.0, 2.0));
    c.receive(update_at(500.0, 1.0));
    assert_eq!(observed_position(&c), Vec3::ZERO);

    c.receive(update_at(500.0, 2.1));
    assert_eq!(observed_position(&c), Vec3::new(500.0, 0.0, 0.0));
}

#[test]
fn heading_follows_the_packet_without_smoothing() {
    let mut c = observer(40.0, true);
    let mut message = update_at(0.0, 0.5);
    if let Message::MovementUpdate { sample, .. } = &mut message {
        sample.yaw = yaw::encode(180.0);
    }
    c.receive(message);
    assert_eq!(c.remote(OBSERVED).expect("observed").motion.yaw(), 180.0);
}

#[test]
fn observer_settles_within_threshold_over_a_lossy_link() {
    let mut settings = quiet_settings();
    // Quick coast-down so the observer's own dead reckoning comes to rest
    settings.movement.default_friction = 0.01;
    settings.net.ping_interval = 0.5;
    let threshold = settings.net.correction_threshold;

    let mut net = network(settings, LinkConditions::new(50, 150, 10.0));
    let driver = net.connect();
    let watcher = net.connect();
    net.run_for(0.5, DT);
    let entity = client(&net, driver).entity().expect("welcomed");

    net.input(driver, InputEvent::Throttle(1.0));
    net.input(driver, InputEvent::Steer(0.4));
    net.run_for(2.0, DT);

    net.input(driver, InputEvent::Throttle(0.0));
    net.input(driver, InputEvent::BrakePressed);
    net.run_for(3.0, DT);

    assert!(net.dropped_packets() > 0);
    let target = client(&net, driver).position().expect("driving");
    let seen = client(&net, watcher)
        .remote(entity)
        .expect("watcher sees the driver");
    assert!(seen.motion.position().distance(target) <= threshold + 1.0);
    assert!(seen.motion.render_position().distance(target) <= threshold + 2.0);
}

// Connect a driver and a watcher, settle, then floor the throttle on a
// heading the yaw byte carries exactly.
fn cruising_pair(conditions: LinkConditions) -> (SimNetwork, PeerId, PeerId, EntityId) {
    let mut net = network(quiet_settings(), conditions);
    let driver = net.connect();
    let watcher = net.connect();
    net.run_for(0.5, DT);
    let entity = client(&net, driver).entity().expect("welcomed");

    client_mut(&mut net, driver)
        .controlled_mut()
        .expect("controlled")
        .body
        .vehicle
        .yaw = 90.0;
    net.run_for(0.5, DT);
    net.input(driver, InputEvent::Throttle(1.0));
    (net, driver, watcher, entity)
}

fn corrections_seen(net: &SimNetwork, watcher: PeerId, entity: EntityId) -> u64 {
    client(net, watcher)
        .remote(entity)
        .expect("watcher sees the driver")
        .motion
        .corrections()
}

#[test]
fn full_throttle_on_a_clean_link_is_never_corrected() {
    let (mut net, driver, watcher, entity) = cruising_pair(LinkConditions::default());
    let top_speed = net.authority().settings().movement.max_velocity;

    for _ in 0..240 {
        net.step(DT);
        assert_eq!(corrections_seen(&net, watcher, entity), 0);
    }

    let target = client(&net, driver).position().expect("driving");
    let seen = client(&net, watcher).remote(entity).expect("watcher sees the driver");
    assert_eq!(seen.motion.visual_offset(), Vec3::ZERO);
    // Behind only by the relay hops
    assert!(seen.motion.position().distance(target) < top_speed * 4.0 * DT);
}

#[test]
fn cruising_over_a_jittery_link_rarely_corrects() {
    let (mut net, _driver, watcher, entity) = cruising_pair(LinkConditions::new(40, 60, 5.0));

    // Reach top speed first
    net.run_for(3.0, DT);
    let before = corrections_seen(&net, watcher, entity);

    net.run_for(2.0, DT);
    assert!(corrections_seen(&net, watcher, entity) - before <= 2);
}
