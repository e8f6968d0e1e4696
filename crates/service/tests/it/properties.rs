use std::collections::BTreeSet;

use mapc_connection::{DiscoveryError, mock::wait_until};
use mapc_primitives::{ConnectionPolicy, ConnectionState, OutboundMessage};
use mapc_service::{MapClient, PlatformEvent, PolicyStore, RouteOutcome, ServiceConfig};
use proptest::prelude::*;

use crate::{TestService, WAIT, address};

#[tokio::test]
async fn test_capacity_never_exceeded() {
    let t = TestService::start(ServiceConfig::default());

    let accepted: Vec<bool> = (0..10).map(|n| t.service.connect(address(n))).collect();

    assert_eq!(accepted.iter().filter(|a| **a).count(), 4);
    assert!(accepted.iter().skip(4).all(|a| !a));
    assert_eq!(t.service.registry().len(), 4);
}

#[tokio::test]
async fn test_one_entry_per_peer() {
    let t = TestService::start(ServiceConfig::default());

    for _ in 0..5 {
        assert!(t.service.connect(address(1)));
    }

    assert_eq!(t.service.registry().keys(), vec![address(1)]);
    assert!(wait_until(WAIT, || t.searches(address(1)) == 1).await);
}

#[tokio::test]
async fn test_stale_entries_evicted_for_new_peer() {
    let t = TestService::start(ServiceConfig::default());
    for n in 1..=4 {
        assert!(t.service.connect(address(n)));
    }

    // Peers 1 and 3 fail discovery and collapse to Disconnected
    for n in [1, 3] {
        t.router.route(PlatformEvent::ServiceDiscovered {
            address: address(n),
            outcome: Err(DiscoveryError::NoRecord),
        });
        assert!(t.wait_for(address(n), ConnectionState::Disconnected).await);
    }
    assert_eq!(t.service.registry().len(), 4);

    assert!(t.service.connect(address(5)));

    assert_eq!(
        t.service.registry().keys(),
        vec![address(2), address(4), address(5)]
    );
    assert_eq!(t.state(address(2)), ConnectionState::Connecting);
    assert_eq!(t.state(address(4)), ConnectionState::Connecting);
}

#[tokio::test]
async fn test_forbidden_policy_blocks_connect() {
    let t = TestService::start(ServiceConfig::default());

    assert!(t.set_policy(address(1), ConnectionPolicy::Forbidden));
    assert!(!t.service.connect(address(1)));

    assert_eq!(t.state(address(1)), ConnectionState::Disconnected);
    assert_eq!(
        t.service.connection_policy(address(1)),
        ConnectionPolicy::Forbidden
    );
    assert!(t.service.registry().is_empty());
}

#[tokio::test]
async fn test_connect_then_disconnect_converges() {
    let t = TestService::start(ServiceConfig::default());

    assert!(t.service.connect(address(1)));
    assert!(t.service.disconnect(address(1)));
    t.discovered(address(1));

    assert!(t.wait_for(address(1), ConnectionState::Disconnected).await);
    assert_eq!(t.transport.disconnects(), vec![address(1)]);
    assert!(t.service.connected_devices().is_empty());
    assert!(t.service.supported_features(address(1)).is_empty());
}

#[tokio::test]
async fn test_disconnect_when_disconnected_is_rejected() {
    let t = TestService::start(ServiceConfig::default());

    // No entry at all
    assert!(!t.service.disconnect(address(1)));
    assert!(!t.service.disconnect(address(1)));

    // Entry that fell back to Disconnected
    assert!(t.service.connect(address(2)));
    t.router.route(PlatformEvent::ServiceDiscovered {
        address: address(2),
        outcome: Err(DiscoveryError::SearchFailed { status: 3 }),
    });
    assert!(t.wait_for(address(2), ConnectionState::Disconnected).await);

    assert!(!t.service.disconnect(address(2)));
    assert!(!t.service.disconnect(address(2)));
    assert_eq!(t.state(address(2)), ConnectionState::Disconnected);
    assert_eq!(t.service.registry().len(), 1);
}

#[tokio::test]
async fn test_send_requires_connected() {
    let t = TestService::start(ServiceConfig::default());
    let message = OutboundMessage::new(["+15550100"], "on my way");

    assert!(!t.service.send_message(address(1), message.clone()));

    assert!(t.service.connect(address(1)));
    assert!(!t.service.send_message(address(1), message.clone()));

    t.discovered(address(1));
    assert!(t.wait_for(address(1), ConnectionState::Connected).await);
    assert!(t.service.send_message(address(1), message.clone()));

    assert!(wait_until(WAIT, || t.transport.sent().len() == 1).await);
    assert_eq!(t.transport.sent(), vec![(address(1), message)]);
}

#[tokio::test]
async fn test_unknown_peer_event_ignored() {
    let t = TestService::start(ServiceConfig::default());
    assert!(t.service.connect(address(1)));
    let before = t.service.registry().snapshot();

    assert_eq!(
        t.router.route(PlatformEvent::LinkDisconnected(address(9))),
        RouteOutcome::UnknownPeer
    );

    assert_eq!(t.service.registry().snapshot(), before);
    assert!(!t.service.registry().contains(&address(9)));
}

/// Connect/disconnect/discovery sequences driven against the service.
#[derive(Debug, Clone)]
enum Op {
    Connect(u8),
    Disconnect(u8),
    DiscoveryFails(u8),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..8).prop_map(Op::Connect),
        (0u8..8).prop_map(Op::Disconnect),
        (0u8..8).prop_map(Op::DiscoveryFails),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn proptest_registry_bounded(
        ops in proptest::collection::vec(op(), 1..40),
        capacity in 1usize..5,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let config = ServiceConfig {
                max_concurrent: capacity,
                ..Default::default()
            };
            let t = TestService::start(config);

            for op in ops {
                match op {
                    Op::Connect(n) => { t.service.connect(address(n)); }
                    Op::Disconnect(n) => { t.service.disconnect(address(n)); }
                    Op::DiscoveryFails(n) => {
                        t.router.route(PlatformEvent::ServiceDiscovered {
                            address: address(n),
                            outcome: Err(DiscoveryError::NoRecord),
                        });
                        tokio::task::yield_now().await;
                    }
                }

                let keys = t.service.registry().keys();
                let unique: BTreeSet<_> = keys.iter().collect();
                prop_assert!(keys.len() <= capacity);
                prop_assert_eq!(unique.len(), keys.len());
            }
            Ok::<(), TestCaseError>(())
        })?;
    }
}

#[tokio::test]
async fn test_policy_changes_converge_state() {
    let t = TestService::start(ServiceConfig::default());

    assert!(t.set_policy(address(1), ConnectionPolicy::Allowed));
    assert_eq!(t.state(address(1)), ConnectionState::Connecting);
    t.discovered(address(1));
    assert!(t.wait_for(address(1), ConnectionState::Connected).await);

    assert!(t.set_policy(address(1), ConnectionPolicy::Forbidden));
    assert!(t.wait_for(address(1), ConnectionState::Disconnected).await);
    assert!(!t.service.connect(address(1)));

    assert!(t.set_policy(address(1), ConnectionPolicy::Unknown));
    assert_eq!(t.state(address(1)), ConnectionState::Disconnected);
    assert_eq!(
        t.policies.get(&address(1)).unwrap(),
        ConnectionPolicy::Unknown
    );
}
