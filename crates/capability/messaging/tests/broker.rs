use async_trait::async_trait;
use conduit_messaging::{
    InMemoryBroker, MessageHandler, MessagingError, Publisher, Subscriber,
};
use domain::Message;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};

struct ForwardingHandler {
    sender: mpsc::UnboundedSender<Message>,
    cancelled: AtomicUsize,
}

#[async_trait]
impl MessageHandler for ForwardingHandler {
    async fn handle(&self, msg: &Message) -> Result<(), MessagingError> {
        self.sender
            .send(msg.clone())
            .map_err(|_| MessagingError::Closed)
    }

    fn cancel(&self) -> Result<(), MessagingError> {
        self.cancelled.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FailingHandler;

#[async_trait]
impl MessageHandler for FailingHandler {
    async fn handle(&self, _msg: &Message) -> Result<(), MessagingError> {
        Err(MessagingError::Handler("boom".to_string()))
    }

    fn cancel(&self) -> Result<(), MessagingError> {
        Ok(())
    }
}

/// 处理前先报告开始，再等闸门放行。
struct GatedHandler {
    started: mpsc::UnboundedSender<()>,
    gate: Semaphore,
    sender: mpsc::UnboundedSender<Message>,
}

#[async_trait]
impl MessageHandler for GatedHandler {
    async fn handle(&self, msg: &Message) -> Result<(), MessagingError> {
        let _ = self.started.send(());
        self.gate
            .acquire()
            .await
            .map_err(|_| MessagingError::Closed)?
            .forget();
        self.sender
            .send(msg.clone())
            .map_err(|_| MessagingError::Closed)
    }

    fn cancel(&self) -> Result<(), MessagingError> {
        Ok(())
    }
}

fn handler() -> (Arc<ForwardingHandler>, mpsc::UnboundedReceiver<Message>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (
        Arc::new(ForwardingHandler {
            sender,
            cancelled: AtomicUsize::new(0),
        }),
        receiver,
    )
}

fn message(channel: &str, subtopic: &str, payload: &[u8]) -> Message {
    Message {
        protocol: "http".to_string(),
        channel: channel.to_string(),
        subtopic: subtopic.to_string(),
        publisher: "thing-1".to_string(),
        payload: payload.to_vec(),
        created: 1,
    }
}

async fn recv(receiver: &mut mpsc::UnboundedReceiver<Message>) -> Message {
    tokio::time::timeout(Duration::from_secs(1), receiver.recv())
        .await
        .expect("timeout")
        .expect("message")
}

#[tokio::test]
async fn delivers_matching_subjects_in_order() {
    let broker = InMemoryBroker::new();
    let (all, mut all_rx) = handler();
    let (temp, mut temp_rx) = handler();
    broker.subscribe("all", "channels.>", all).await.expect("subscribe");
    broker
        .subscribe("temp", "channels.abc.temp", temp)
        .await
        .expect("subscribe");

    broker
        .publish("abc", &message("abc", "temp", b"1"))
        .await
        .expect("publish");
    broker
        .publish("abc", &message("abc", "", b"2"))
        .await
        .expect("publish");

    assert_eq!(recv(&mut all_rx).await.payload, b"1");
    assert_eq!(recv(&mut all_rx).await.payload, b"2");
    assert_eq!(recv(&mut temp_rx).await.payload, b"1");
    let extra = tokio::time::timeout(Duration::from_millis(50), temp_rx.recv()).await;
    assert!(extra.is_err());
}

#[tokio::test]
async fn failing_handler_does_not_block_others() {
    let broker = InMemoryBroker::new();
    let (ok, mut ok_rx) = handler();
    broker
        .subscribe("failing", "channels.>", Arc::new(FailingHandler))
        .await
        .expect("subscribe");
    broker.subscribe("ok", "channels.>", ok).await.expect("subscribe");

    broker
        .publish("abc", &message("abc", "", b"x"))
        .await
        .expect("publish");
    assert_eq!(recv(&mut ok_rx).await.channel, "abc");
}

#[tokio::test]
async fn subscription_lifecycle() {
    let broker = InMemoryBroker::new();
    let (first, _rx) = handler();
    broker
        .subscribe("id-1", "channels.>", first.clone())
        .await
        .expect("subscribe");

    let again = broker.subscribe("id-1", "channels.>", first.clone()).await;
    assert!(matches!(again, Err(MessagingError::AlreadySubscribed(_))));
    assert!(matches!(
        broker.subscribe("", "channels.>", first.clone()).await,
        Err(MessagingError::EmptyId)
    ));
    assert!(matches!(
        broker.subscribe("id-2", "", first.clone()).await,
        Err(MessagingError::EmptyTopic)
    ));

    broker.unsubscribe("id-1", "channels.>").await.expect("unsubscribe");
    assert_eq!(first.cancelled.load(Ordering::SeqCst), 1);
    assert_eq!(broker.subscription_count(), 0);
    assert!(matches!(
        broker.unsubscribe("id-1", "channels.>").await,
        Err(MessagingError::NotSubscribed(_))
    ));
}

#[tokio::test]
async fn publish_requires_topic() {
    let broker = InMemoryBroker::new();
    let result = broker.publish("", &message("", "", b"x")).await;
    assert!(matches!(result, Err(MessagingError::EmptyTopic)));
}

#[tokio::test]
async fn slow_subscriber_drops_overflow_without_blocking_publisher() {
    let broker = InMemoryBroker::with_capacity(1);
    let (started, mut started_rx) = mpsc::unbounded_channel();
    let (sender, mut slow_rx) = mpsc::unbounded_channel();
    let slow = Arc::new(GatedHandler {
        started,
        gate: Semaphore::new(0),
        sender,
    });
    let (fast, mut fast_rx) = handler();
    broker.subscribe("slow", "channels.>", slow.clone()).await.expect("subscribe");
    broker.subscribe("fast", "channels.>", fast).await.expect("subscribe");

    broker
        .publish("abc", &message("abc", "", b"1"))
        .await
        .expect("publish");
    // 处理任务已取走第一条并卡在闸门上，队列为空
    tokio::time::timeout(Duration::from_secs(1), started_rx.recv())
        .await
        .expect("timeout")
        .expect("started");
    assert_eq!(recv(&mut fast_rx).await.payload, b"1");

    for payload in [b"2", b"3"] {
        tokio::time::timeout(
            Duration::from_millis(100),
            broker.publish("abc", &message("abc", "", payload)),
        )
        .await
        .expect("publish never waits on a full queue")
        .expect("publish");
        assert_eq!(recv(&mut fast_rx).await.payload, payload);
    }

    slow.gate.add_permits(10);
    assert_eq!(recv(&mut slow_rx).await.payload, b"1");
    assert_eq!(recv(&mut slow_rx).await.payload, b"2");
    let extra = tokio::time::timeout(Duration::from_millis(50), slow_rx.recv()).await;
    assert!(extra.is_err(), "overflow message was delivered: {extra:?}");
}
