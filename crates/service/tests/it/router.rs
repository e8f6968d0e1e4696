use mapc_connection::mock::wait_until;
use mapc_primitives::ConnectionState;
use mapc_service::{MapClient, PlatformEvent, RouteOutcome, ServiceConfig};
use tokio::sync::mpsc;

use crate::{TestService, WAIT, address};

#[tokio::test]
async fn test_link_loss_tears_down() {
    let t = TestService::start(ServiceConfig::default());
    t.connected(address(1)).await;
    assert_eq!(t.service.supported_features(address(1)).bits(), 0x0603);

    assert_eq!(
        t.router.route(PlatformEvent::LinkDisconnected(address(1))),
        RouteOutcome::Delivered
    );

    assert!(t.wait_for(address(1), ConnectionState::Disconnected).await);
    assert!(t.service.supported_features(address(1)).is_empty());
    assert_eq!(t.transport.disconnects(), vec![address(1)]);
}

#[tokio::test]
async fn test_bond_removed() {
    let t = TestService::start(ServiceConfig::default());

    assert_eq!(
        t.router.route(PlatformEvent::BondRemoved(address(1))),
        RouteOutcome::UnknownPeer
    );

    // Active entries survive unbonding
    assert!(t.service.connect(address(1)));
    assert_eq!(
        t.router.route(PlatformEvent::BondRemoved(address(1))),
        RouteOutcome::Dropped
    );
    assert!(t.service.registry().contains(&address(1)));

    t.router.route(PlatformEvent::LinkDisconnected(address(1)));
    assert!(t.wait_for(address(1), ConnectionState::Disconnected).await);

    assert_eq!(
        t.router.route(PlatformEvent::BondRemoved(address(1))),
        RouteOutcome::Removed
    );
    assert!(t.service.registry().is_empty());
}

#[tokio::test]
async fn test_attached_channel_preserves_order() {
    let t = TestService::start(ServiceConfig::default());
    let (tx, rx) = mpsc::channel(16);
    t.service.attach_platform_events(rx).unwrap();

    let found = |n| PlatformEvent::ServiceDiscovered {
        address: address(n),
        outcome: Ok(Default::default()),
    };
    let lost = |n| PlatformEvent::LinkDisconnected(address(n));

    assert!(t.service.connect(address(1)));
    assert!(t.service.connect(address(2)));
    tx.send(found(1)).await.unwrap();
    tx.send(lost(1)).await.unwrap();
    tx.send(found(2)).await.unwrap();
    tx.send(lost(9)).await.unwrap();

    assert!(t.wait_for(address(2), ConnectionState::Connected).await);
    assert!(t.wait_for(address(1), ConnectionState::Disconnected).await);
    assert!(wait_until(WAIT, || t.transport.connects().len() == 2).await);
    assert_eq!(t.service.connected_devices(), vec![address(2)]);
    assert_eq!(t.service.registry().len(), 2);
}

#[tokio::test]
async fn test_events_after_stop_are_dropped() {
    let t = TestService::start(ServiceConfig::default());
    assert!(t.service.connect(address(1)));
    t.service.stop();

    assert_eq!(
        t.router.route(PlatformEvent::LinkDisconnected(address(1))),
        RouteOutcome::UnknownPeer
    );
}
