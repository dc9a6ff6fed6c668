//! The process-wide channel lives in a static, so this file holds a
//! single test to keep it on one runtime.

mod common;

use common::{eventually, intent_json, test_config, within, MockServer};
use paysync::notify::TracingSink;
use paysync::tracker::PaymentIntentTracker;
use paysync::transport;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn trackers_share_one_connection() {
    let server = MockServer::start().await;
    let config = test_config(&server);
    let token = config.auth.bearer().unwrap();

    let first = transport::shared(&config.events, &token).unwrap();
    let second = transport::shared(&config.events, &token).unwrap();
    assert!(first.same_channel(&second));

    let tracker_a = PaymentIntentTracker::from_config(&config, Arc::new(TracingSink)).unwrap();
    let tracker_b = PaymentIntentTracker::from_config(&config, Arc::new(TracingSink)).unwrap();
    assert!(tracker_a.channel().same_channel(&first));
    assert!(tracker_b.channel().same_channel(&first));

    within(first.wait_authenticated(Duration::from_secs(5)))
        .await
        .unwrap();

    // Both trackers follow the same intent: one wire subscription.
    within(tracker_a.track("pi_shared")).await.unwrap();
    within(tracker_b.track("pi_shared")).await.unwrap();
    eventually("subscribe", || server.emitted_count("subscribe", "pi_shared") == 1).await;

    // Closing one tracker keeps the server pushing for the other.
    within(tracker_a.close()).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.emitted_count("unsubscribe", "pi_shared"), 0);

    server.push_event("intent.updated", intent_json("pi_shared", "SIGNED"));
    let mut changes = tracker_b.subscribe();
    within(changes.wait_for(|s| s.record.is_some())).await.unwrap();

    within(tracker_b.close()).await;
    eventually("unsubscribe", || server.emitted_count("unsubscribe", "pi_shared") == 1).await;

    // Trackers never close the shared connection.
    assert!(!first.is_closed());
    assert_eq!(server.connections(), 1);
    assert!(server.captured_requests().await.is_empty());
}
