use super::*;
use futures::StreamExt;
use std::time::Duration;

fn history_event(text: &str) -> GameEvent {
    GameEvent::History {
        history: text.to_string(),
    }
}

#[tokio::test]
async fn test_fan_out_to_all_subscribers() {
    let bus = Broadcaster::new(16);
    let mut sub1 = bus.subscribe();
    let mut sub2 = bus.subscribe();
    assert_eq!(bus.subscriber_count(), 2);

    bus.publish(history_event("the fog thickens"));

    assert_eq!(sub1.recv().await, Some(history_event("the fog thickens")));
    assert_eq!(sub2.recv().await, Some(history_event("the fog thickens")));
    // Exactly once: nothing further is queued.
    assert!(sub1.try_recv().is_none());
    assert!(sub2.try_recv().is_none());

    bus.unsubscribe(&sub1);
    bus.publish(history_event("a door creaks open"));

    assert_eq!(sub2.recv().await, Some(history_event("a door creaks open")));
    assert!(sub1.try_recv().is_none());
    assert_eq!(bus.subscriber_count(), 1);
}

#[tokio::test]
async fn test_publish_drops_on_full_without_blocking() {
    let bus = Broadcaster::new(2);
    let mut slow = bus.subscribe();
    let mut healthy = bus.subscribe();

    bus.publish(history_event("one"));
    bus.publish(history_event("two"));
    // Drain the healthy subscriber so only the slow one is saturated.
    assert!(healthy.try_recv().is_some());
    assert!(healthy.try_recv().is_some());

    // The slow subscriber's queue is full; this must return immediately
    // and drop the event for that subscriber only.
    bus.publish(history_event("overflow"));

    assert_eq!(healthy.try_recv(), Some(history_event("overflow")));
    assert_eq!(slow.try_recv(), Some(history_event("one")));
    assert_eq!(slow.try_recv(), Some(history_event("two")));
    assert!(slow.try_recv().is_none());
}

#[tokio::test]
async fn test_recv_is_pending_until_publish() {
    let bus = Broadcaster::new(4);
    let mut sub = bus.subscribe();

    let mut recv = tokio_test::task::spawn(sub.recv());
    tokio_test::assert_pending!(recv.poll());

    bus.publish(history_event("now"));
    assert!(recv.is_woken());
    let event = tokio_test::assert_ready!(recv.poll());
    assert_eq!(event, Some(history_event("now")));
}

#[tokio::test]
async fn test_unsubscribe_is_idempotent() {
    let bus = Broadcaster::new(4);
    let sub = bus.subscribe();
    let other_bus = Broadcaster::new(4);
    let foreign = other_bus.subscribe();

    bus.unsubscribe(&sub);
    bus.unsubscribe(&sub);
    // Never registered here; must be a no-op.
    bus.unsubscribe(&foreign);

    assert_eq!(bus.subscriber_count(), 0);
    assert_eq!(other_bus.subscriber_count(), 1);
}

#[tokio::test]
async fn test_dropped_subscriber_is_pruned_on_publish() {
    let bus = Broadcaster::new(4);
    let sub = bus.subscribe();
    drop(sub);
    assert_eq!(bus.subscriber_count(), 1);

    bus.publish(history_event("anyone there?"));
    assert_eq!(bus.subscriber_count(), 0);
}

#[tokio::test]
async fn test_stream_frames() {
    let bus = Broadcaster::with_poll_interval(16, Duration::from_millis(20));
    let sub = bus.subscribe();
    let stream = bus.stream(sub);
    futures::pin_mut!(stream);

    assert_eq!(stream.next().await, Some(b": connected\n\n".to_vec()));

    bus.publish(GameEvent::Illustration {
        url: "/public/illustrations/scene-1.png".to_string(),
    });
    let frame = stream.next().await.expect("data frame");
    let text = String::from_utf8(frame).unwrap();
    assert!(text.starts_with("data: "));
    assert!(text.ends_with("\n\n"));
    assert!(text.contains("\"type\":\"illustration\""));
    assert!(text.contains("/public/illustrations/scene-1.png"));

    // Nothing published within the poll interval: keep-alive comment.
    assert_eq!(stream.next().await, Some(b": ping\n\n".to_vec()));
}

#[tokio::test]
async fn test_close_terminates_streams() {
    let bus = Broadcaster::with_poll_interval(16, Duration::from_millis(20));
    let stream1 = bus.stream(bus.subscribe());
    let stream2 = bus.stream(bus.subscribe());
    futures::pin_mut!(stream1);
    futures::pin_mut!(stream2);

    assert!(stream1.next().await.is_some());
    assert!(stream2.next().await.is_some());

    bus.close();
    assert!(bus.is_closed());

    assert_eq!(stream1.next().await, None);
    assert_eq!(stream2.next().await, None);
    // Streams unregistered themselves on termination.
    assert_eq!(bus.subscriber_count(), 0);

    // Closing again is a no-op.
    bus.close();
}

#[tokio::test]
async fn test_abandoned_stream_unregisters_subscriber() {
    let bus = Broadcaster::new(16);
    let stream = bus.stream(bus.subscribe());
    assert_eq!(bus.subscriber_count(), 1);

    drop(stream);
    assert_eq!(bus.subscriber_count(), 0);
}

#[test]
fn test_event_serialization() {
    let event = GameEvent::SceneStatus {
        phase: ScenePhase::Imaging,
    };
    let json = serde_json::to_string(&event).unwrap();
    assert_eq!(json, r#"{"type":"scene_status","phase":"imaging"}"#);

    let sentinel = serde_json::to_string(&GameEvent::ServerShutdown).unwrap();
    assert_eq!(sentinel, r#"{"type":"server_shutdown"}"#);
    assert!(GameEvent::ServerShutdown.is_shutdown());
}
