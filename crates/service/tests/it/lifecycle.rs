use std::time::Duration;

use mapc_connection::mock::wait_until;
use mapc_primitives::{ConnectionState, OutboundMessage};
use mapc_service::{MapClient, ServiceConfig, ServiceError};

use crate::{TestService, WAIT, address};

#[tokio::test]
async fn test_stop_releases_live_sessions() {
    let t = TestService::start(ServiceConfig::default());
    t.connected(address(1)).await;
    t.connected(address(2)).await;

    t.service.stop();

    assert!(t.service.registry().is_empty());
    assert!(!t.service.connect(address(1)));
    let refused = t.service.try_connect(address(1));
    assert!(matches!(refused, Err(ServiceError::NotRunning)));
    let late = OutboundMessage::new(["1"], "late");
    assert!(!t.service.send_message(address(1), late));
    let released = || t.transport.disconnects().len() == 2;
    assert!(wait_until(WAIT, released).await);
}

#[tokio::test]
async fn test_connect_times_out_without_discovery() {
    let config = ServiceConfig {
        connect_timeout_ms: 50,
        ..Default::default()
    };
    let t = TestService::start(config);

    assert!(t.service.connect(address(1)));
    assert!(t.wait_for(address(1), ConnectionState::Disconnected).await);

    // Retrying is a fresh attempt
    assert!(t.service.connect(address(1)));
    assert!(wait_until(WAIT, || t.searches(address(1)) == 2).await);
}

#[tokio::test]
async fn test_slow_transport_bounded_by_timeout() {
    let config = ServiceConfig {
        connect_timeout_ms: 100,
        ..Default::default()
    };
    let t = TestService::start(config);
    t.transport.set_connect_delay(Duration::from_secs(5));

    assert!(t.service.connect(address(1)));
    t.discovered(address(1));

    assert!(t.wait_for(address(1), ConnectionState::Disconnected).await);
    assert!(t.transport.connects().is_empty());
}

#[tokio::test]
async fn test_state_change_notifications() {
    let t = TestService::start(ServiceConfig::default());
    let mut events = t.service.subscribe();

    t.connected(address(1)).await;
    assert!(t.service.disconnect(address(1)));
    assert!(t.wait_for(address(1), ConnectionState::Disconnected).await);

    let mut states = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let Some(state) = event.new_state() {
            assert_eq!(event.address(), address(1));
            states.push(state);
        }
    }
    assert_eq!(
        states,
        vec![
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Disconnecting,
            ConnectionState::Disconnected,
        ]
    );
}

#[tokio::test]
async fn test_reconnect_while_disconnecting() {
    let t = TestService::start(ServiceConfig::default());
    t.connected(address(1)).await;

    assert!(t.service.disconnect(address(1)));
    assert!(t.service.connect(address(1)));

    assert!(wait_until(WAIT, || t.searches(address(1)) == 2).await);
    assert_eq!(t.state(address(1)), ConnectionState::Connecting);
    t.discovered(address(1));
    assert!(t.wait_for(address(1), ConnectionState::Connected).await);
}
