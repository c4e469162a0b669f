use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use switchboard_fabric::{
    codec::{BincodeCodec, RegisterCodec},
    ChannelId, Endpoint, Error, FabricConfig, IoManager, Receiver, Sender, TransportKind,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct Reading {
    sensor: String,
    value: f64,
}

fn channel(name: &str) -> ChannelId {
    ChannelId::new("test", name, "")
}

/// Helper to get a port nobody is listening on
fn free_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

async fn wait_for(counter: &AtomicUsize, expected: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while counter.load(Ordering::SeqCst) < expected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("callback did not see every item in time");
}

#[tokio::test]
async fn get_sender_returns_same_instance() {
    let manager = IoManager::default();
    let id = channel("a");

    let first = manager.get_sender::<u32>(&id).await.unwrap();
    let second = manager.get_sender::<u32>(&id).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(manager.sender_count().await, 1);
    assert!(manager.contains_sender(&id).await);
    assert!(!manager.contains_receiver(&id).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_get_receiver_creates_once() {
    let manager = Arc::new(IoManager::default());
    let id = channel("shared");

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let manager = Arc::clone(&manager);
        let id = id.clone();
        tasks.push(tokio::spawn(async move {
            manager.get_receiver::<u64>(&id).await.unwrap()
        }));
    }

    let mut receivers = Vec::new();
    for task in tasks {
        receivers.push(task.await.unwrap());
    }

    assert!(receivers.iter().all(|r| Arc::ptr_eq(r, &receivers[0])));
    assert_eq!(manager.receiver_count().await, 1);
}

#[tokio::test]
async fn second_payload_type_is_rejected() {
    let manager = IoManager::default();
    let id = channel("typed");

    manager.get_sender::<u32>(&id).await.unwrap();

    match manager.get_sender::<String>(&id).await {
        Err(Error::TypeBindingConflict { channel, .. }) => assert_eq!(channel, id),
        Err(e) => panic!("Expected TypeBindingConflict, got {:?}", e),
        Ok(_) => panic!("Expected TypeBindingConflict"),
    }

    // The receiver shares the channel queue and its payload type
    assert!(matches!(
        manager.get_receiver::<String>(&id).await,
        Err(Error::TypeBindingConflict { .. })
    ));
}

#[tokio::test]
async fn queue_channel_delivers_in_order() {
    let manager = IoManager::default();
    let id = channel("fifo");

    let sender = manager.get_sender::<i32>(&id).await.unwrap();
    assert!(sender.send(5).await);
    assert!(sender.send(5).await);
    assert!(sender.send(6).await);

    // Created after the sends, still sees them
    let receiver = manager.get_receiver::<i32>(&id).await.unwrap();
    assert_eq!(receiver.receive().await.unwrap(), 5);
    assert_eq!(receiver.receive().await.unwrap(), 5);
    assert_eq!(receiver.receive().await.unwrap(), 6);

    assert_eq!(sender.transport(), TransportKind::Queue);
    assert_eq!(receiver.channel(), &id);
}

#[tokio::test]
async fn try_receive_times_out_on_empty_channel() {
    let manager = IoManager::default();
    let receiver = manager.get_receiver::<u8>(&channel("quiet")).await.unwrap();

    let result = receiver
        .try_receive(Duration::from_millis(20))
        .await
        .unwrap();
    assert_eq!(result, None);
}

#[tokio::test]
async fn send_reports_full_queue() {
    let config = FabricConfig {
        queue_capacity: 2,
        send_timeout_ms: 0,
        ..FabricConfig::default()
    };
    let manager = IoManager::new(config).unwrap();
    let sender = manager.get_sender::<u8>(&channel("small")).await.unwrap();

    assert!(sender.send(1).await);
    assert!(sender.send(2).await);
    assert!(!sender.send(3).await);
}

#[tokio::test]
async fn callback_mode_blocks_pull_reads() {
    let manager = IoManager::default();
    let receiver = manager.get_receiver::<u8>(&channel("push")).await.unwrap();

    receiver.add_callback(Box::new(|_| {})).unwrap();
    assert!(receiver.has_callback());

    assert!(matches!(
        receiver.receive().await,
        Err(Error::CallbackModeActive)
    ));
    assert!(matches!(
        receiver.try_receive(Duration::from_millis(10)).await,
        Err(Error::CallbackModeActive)
    ));

    receiver.remove_callback().await.unwrap();
    assert!(!receiver.has_callback());
    assert_eq!(
        receiver.try_receive(Duration::from_millis(10)).await.unwrap(),
        None
    );
}

#[tokio::test]
async fn callback_lifecycle_errors() {
    let manager = IoManager::default();
    let receiver = manager.get_receiver::<u8>(&channel("errs")).await.unwrap();

    assert!(matches!(
        receiver.remove_callback().await,
        Err(Error::NoActiveCallback)
    ));

    receiver.add_callback(Box::new(|_| {})).unwrap();
    assert!(matches!(
        receiver.add_callback(Box::new(|_| {})),
        Err(Error::CallbackAlreadyRegistered)
    ));

    receiver.remove_callback().await.unwrap();
    receiver.add_callback(Box::new(|_| {})).unwrap();
    receiver.remove_callback().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn callback_is_never_invoked_after_removal() {
    let manager = IoManager::default();
    let id = channel("counted");
    let sender = manager.get_sender::<u32>(&id).await.unwrap();
    let receiver = manager.get_receiver::<u32>(&id).await.unwrap();

    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    receiver
        .add_callback(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();

    for i in 0..10 {
        assert!(sender.send(i).await);
    }
    wait_for(&seen, 10).await;

    receiver.remove_callback().await.unwrap();
    let after_removal = seen.load(Ordering::SeqCst);

    for i in 0..10 {
        assert!(sender.send(i).await);
    }
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(seen.load(Ordering::SeqCst), after_removal);

    // Items sent while no callback was active stay queued for pull reads
    assert_eq!(receiver.receive().await.unwrap(), 0);
}

#[tokio::test]
async fn remove_unknown_channel_is_noop() {
    let manager = IoManager::default();
    let removal = manager.remove_channel(&channel("ghost")).await;

    assert!(removal.is_absent());
    assert!(!removal.sender);
    assert!(!removal.receiver);
}

#[tokio::test]
async fn remove_channel_stops_callback_and_forgets_endpoints() {
    let manager = IoManager::default();
    let id = channel("gone");

    let sender = manager.get_sender::<u32>(&id).await.unwrap();
    let receiver = manager.get_receiver::<u32>(&id).await.unwrap();
    receiver.add_callback(Box::new(|_| {})).unwrap();

    let removal = manager.remove_channel(&id).await;
    assert!(removal.sender && removal.receiver);
    assert!(!receiver.has_callback());
    assert_eq!(manager.sender_count().await, 0);
    assert_eq!(manager.receiver_count().await, 0);

    // A fresh request builds a new endpoint, free to pick another type
    let recreated = manager.get_sender::<String>(&id).await.unwrap();
    assert!(recreated.send("again".to_string()).await);
    drop(sender);
}

#[tokio::test]
async fn shutdown_closes_everything() {
    let manager = IoManager::default();
    let a = manager.get_receiver::<u8>(&channel("a")).await.unwrap();
    let b = manager.get_receiver::<u16>(&channel("b")).await.unwrap();
    manager.get_sender::<u8>(&channel("a")).await.unwrap();

    a.add_callback(Box::new(|_| {})).unwrap();
    b.add_callback(Box::new(|_| {})).unwrap();

    manager.shutdown().await;

    assert!(!a.has_callback());
    assert!(!b.has_callback());
    assert_eq!(manager.sender_count().await, 0);
    assert_eq!(manager.receiver_count().await, 0);
}

#[tokio::test]
async fn custom_resolver_is_consulted() {
    let addr = free_addr();
    let manager = IoManager::with_resolver(FabricConfig::default(), move |id: &ChannelId| {
        if id.topic() == "remote" {
            TransportKind::Network { address: addr }
        } else {
            TransportKind::Queue
        }
    })
    .unwrap();
    manager.with_types(|types| types.register_codec::<u32, _>(BincodeCodec));

    let local = manager
        .get_sender::<u32>(&ChannelId::new("svc", "x", ""))
        .await
        .unwrap();
    let remote = manager
        .get_sender::<u32>(&ChannelId::new("svc", "x", "remote"))
        .await
        .unwrap();

    assert_eq!(local.transport(), TransportKind::Queue);
    assert_eq!(remote.transport(), TransportKind::Network { address: addr });
}

#[tokio::test]
async fn network_channel_round_trip() {
    let id = channel("wire");
    let manager = IoManager::new(FabricConfig::default().route(id.clone(), free_addr())).unwrap();
    manager.with_types(|types| types.register_codec::<Reading, _>(BincodeCodec));
    assert!(manager.types().has_serializer::<Reading>());

    let receiver = manager.get_receiver::<Reading>(&id).await.unwrap();
    let sender = manager.get_sender::<Reading>(&id).await.unwrap();

    let reading = Reading {
        sensor: "thermo".to_string(),
        value: 21.5,
    };
    assert!(sender.send(reading.clone()).await);
    assert!(sender.send(reading.clone()).await);

    for _ in 0..2 {
        let received = receiver
            .try_receive(Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(received, Some(reading.clone()));
    }

    manager.remove_channel(&id).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn network_channel_callback_delivery() {
    let id = channel("wire-push");
    let manager = IoManager::new(FabricConfig::default().route(id.clone(), free_addr())).unwrap();
    manager.with_types(|types| types.register_codec::<u64, _>(BincodeCodec));

    let receiver = manager.get_receiver::<u64>(&id).await.unwrap();
    let sender = manager.get_sender::<u64>(&id).await.unwrap();

    let total = Arc::new(AtomicUsize::new(0));
    let sum = Arc::clone(&total);
    receiver
        .add_callback(Box::new(move |value| {
            sum.fetch_add(value as usize, Ordering::SeqCst);
        }))
        .unwrap();

    for value in 1..=4u64 {
        assert!(sender.send(value).await);
    }
    wait_for(&total, 10).await;

    let removal = manager.remove_channel(&id).await;
    assert!(removal.sender && removal.receiver);
    assert!(!receiver.has_callback());
}

#[tokio::test]
async fn network_endpoint_needs_registered_codec() {
    let id = channel("unregistered");
    let manager = IoManager::new(FabricConfig::default().route(id.clone(), free_addr())).unwrap();

    match manager.get_sender::<Reading>(&id).await {
        Err(Error::Core(switchboard_core::Error::UnregisteredType { .. })) => {}
        Err(e) => panic!("Expected UnregisteredType, got {:?}", e),
        Ok(_) => panic!("Expected UnregisteredType"),
    }
    assert!(manager.get_receiver::<Reading>(&id).await.is_err());
    assert_eq!(manager.sender_count().await, 0);
}

#[tokio::test]
async fn send_to_unreachable_peer_returns_false() {
    let id = channel("nobody");
    let config = FabricConfig {
        connect_timeout_ms: 200,
        ..FabricConfig::default()
    }
    .route(id.clone(), free_addr());
    let manager = IoManager::new(config).unwrap();
    manager.with_types(|types| types.register_codec::<u32, _>(BincodeCodec));

    let sender = manager.get_sender::<u32>(&id).await.unwrap();
    assert!(!sender.send(1).await);
}

#[tokio::test]
async fn network_sender_reconnects_when_peer_appears() {
    let id = channel("late");
    let manager = IoManager::new(FabricConfig::default().route(id.clone(), free_addr())).unwrap();
    manager.with_types(|types| types.register_codec::<u32, _>(BincodeCodec));

    let sender = manager.get_sender::<u32>(&id).await.unwrap();
    assert!(!sender.send(1).await);

    let receiver = manager.get_receiver::<u32>(&id).await.unwrap();
    assert!(sender.send(2).await);
    assert_eq!(
        receiver.try_receive(Duration::from_secs(2)).await.unwrap(),
        Some(2)
    );
}

#[tokio::test]
async fn waiting_receive_yields_to_new_callback() {
    let manager = IoManager::default();
    let id = channel("handover");
    let sender = manager.get_sender::<u32>(&id).await.unwrap();
    let receiver = manager.get_receiver::<u32>(&id).await.unwrap();

    let pending = tokio::spawn({
        let receiver = Arc::clone(&receiver);
        async move { receiver.receive().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    receiver
        .add_callback(Box::new(move |value| {
            assert_eq!(value, 7);
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();
    assert!(sender.send(7).await);

    wait_for(&seen, 1).await;
    let pulled = tokio::time::timeout(Duration::from_secs(1), pending)
        .await
        .expect("waiting receive did not return")
        .unwrap();
    assert!(matches!(pulled, Err(Error::CallbackModeActive)));

    receiver.remove_callback().await.unwrap();
}

#[tokio::test]
async fn receive_fails_once_channel_is_removed() {
    let manager = IoManager::default();
    let id = channel("closing");
    let sender = manager.get_sender::<u32>(&id).await.unwrap();
    let receiver = manager.get_receiver::<u32>(&id).await.unwrap();

    let pending = tokio::spawn({
        let receiver = Arc::clone(&receiver);
        async move { receiver.receive().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let removal = manager.remove_channel(&id).await;
    assert!(removal.sender && removal.receiver);

    let pulled = tokio::time::timeout(Duration::from_secs(1), pending)
        .await
        .expect("waiting receive did not return")
        .unwrap();
    assert!(matches!(pulled, Err(Error::ConnectionClosed)));

    // Later reads on the stale handle fail straight away
    assert!(matches!(
        receiver.receive().await,
        Err(Error::ConnectionClosed)
    ));
    assert!(matches!(
        receiver.try_receive(Duration::from_millis(10)).await,
        Err(Error::ConnectionClosed)
    ));
    assert!(matches!(
        receiver.add_callback(Box::new(|_| {})),
        Err(Error::ConnectionClosed)
    ));
    assert!(!sender.send(1).await);
}

#[tokio::test]
async fn shutdown_releases_waiting_receive() {
    let manager = IoManager::default();
    let receiver = manager.get_receiver::<u8>(&channel("idle")).await.unwrap();

    let pending = tokio::spawn({
        let receiver = Arc::clone(&receiver);
        async move { receiver.receive().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    manager.shutdown().await;

    let pulled = tokio::time::timeout(Duration::from_secs(1), pending)
        .await
        .expect("waiting receive did not return")
        .unwrap();
    assert!(matches!(pulled, Err(Error::ConnectionClosed)));
}

#[tokio::test]
async fn network_receive_fails_once_channel_is_removed() {
    let id = channel("wire-closing");
    let manager = IoManager::new(FabricConfig::default().route(id.clone(), free_addr())).unwrap();
    manager.with_types(|types| types.register_codec::<u32, _>(BincodeCodec));

    let receiver = manager.get_receiver::<u32>(&id).await.unwrap();
    let pending = tokio::spawn({
        let receiver = Arc::clone(&receiver);
        async move { receiver.receive().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    manager.remove_channel(&id).await;

    let pulled = tokio::time::timeout(Duration::from_secs(1), pending)
        .await
        .expect("waiting receive did not return")
        .unwrap();
    assert!(matches!(pulled, Err(Error::ConnectionClosed)));
}
