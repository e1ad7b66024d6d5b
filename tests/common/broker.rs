use async_trait::async_trait;
use eventhub_realtime::push::{PushConnection, PushTransport, StompCommand, StompFrame};
use eventhub_realtime::{RealtimeError, RealtimeResult};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

enum ToClient {
    Text(String),
    Close,
}

struct LiveConnection {
    to_client: mpsc::UnboundedSender<ToClient>,
    subscription: Arc<Mutex<Option<(String, String)>>>,
    alive: Arc<AtomicBool>,
}

#[derive(Default)]
struct BrokerInner {
    server_heart_beat: Mutex<String>,
    refuse_opens: AtomicUsize,
    reject_connects: AtomicUsize,
    silent_handshake: AtomicBool,
    opens: AtomicUsize,
    heartbeats: AtomicUsize,
    message_ids: AtomicUsize,
    frames: Mutex<Vec<StompFrame>>,
    connections: Mutex<Vec<LiveConnection>>,
}

/// In-process STOMP broker speaking just enough protocol for the channel
#[derive(Clone)]
pub struct FakeBroker {
    inner: Arc<BrokerInner>,
}

impl FakeBroker {
    /// Broker that answers CONNECT with `heart-beat:0,0`
    pub fn new() -> Self {
        Self::with_heart_beat("0,0")
    }

    pub fn with_heart_beat(value: &str) -> Self {
        let inner = BrokerInner::default();
        *inner.server_heart_beat.lock() = value.to_string();
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Fail the next `count` transport opens outright
    pub fn refuse_next_opens(&self, count: usize) {
        self.inner.refuse_opens.store(count, Ordering::SeqCst);
    }

    /// Answer the next `count` CONNECT frames with ERROR
    pub fn reject_next_connects(&self, count: usize) {
        self.inner.reject_connects.store(count, Ordering::SeqCst);
    }

    /// Never answer CONNECT
    pub fn set_silent_handshake(&self, silent: bool) {
        self.inner.silent_handshake.store(silent, Ordering::SeqCst);
    }

    pub fn open_count(&self) -> usize {
        self.inner.opens.load(Ordering::SeqCst)
    }

    pub fn heartbeats_received(&self) -> usize {
        self.inner.heartbeats.load(Ordering::SeqCst)
    }

    /// Frames of `command` sent by clients, in arrival order
    pub fn client_frames(&self, command: StompCommand) -> Vec<StompFrame> {
        self.inner
            .frames
            .lock()
            .iter()
            .filter(|frame| frame.command == command)
            .cloned()
            .collect()
    }

    /// Open connections holding a subscription
    pub fn live_subscriptions(&self) -> usize {
        self.inner
            .connections
            .lock()
            .iter()
            .filter(|c| c.alive.load(Ordering::SeqCst) && c.subscription.lock().is_some())
            .count()
    }

    /// Publish `body` to every live subscription; returns deliveries made
    pub fn deliver(&self, body: &str) -> usize {
        let connections = self.inner.connections.lock();
        let mut delivered = 0;
        for connection in connections.iter() {
            if !connection.alive.load(Ordering::SeqCst) {
                continue;
            }
            let Some((id, destination)) = connection.subscription.lock().clone() else {
                continue;
            };
            let message_id = self.inner.message_ids.fetch_add(1, Ordering::SeqCst);
            let mut frame = StompFrame::new(StompCommand::Message)
                .with_header("subscription", id)
                .with_header("destination", destination)
                .with_header("message-id", message_id.to_string());
            frame.body = body.to_string();
            if connection.to_client.send(ToClient::Text(frame.encode())).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Send a MESSAGE for a subscription id nobody holds
    pub fn deliver_to_stranger(&self, body: &str) {
        for connection in self.inner.connections.lock().iter() {
            let mut frame = StompFrame::new(StompCommand::Message)
                .with_header("subscription", "sub-stranger")
                .with_header("destination", "/user/queue/notifications");
            frame.body = body.to_string();
            let _ = connection.to_client.send(ToClient::Text(frame.encode()));
        }
    }

    /// Send an ERROR frame on every live connection
    pub fn send_error(&self, message: &str) {
        for connection in self.inner.connections.lock().iter() {
            let frame = StompFrame::new(StompCommand::Error).with_header("message", message);
            let _ = connection.to_client.send(ToClient::Text(frame.encode()));
        }
    }

    /// Close every connection from the broker side
    pub fn drop_connections(&self) {
        let mut connections = self.inner.connections.lock();
        for connection in connections.drain(..) {
            connection.alive.store(false, Ordering::SeqCst);
            let _ = connection.to_client.send(ToClient::Close);
        }
    }
}

#[async_trait]
impl PushTransport for FakeBroker {
    async fn open(&self, _endpoint: &str) -> RealtimeResult<Box<dyn PushConnection>> {
        self.inner.opens.fetch_add(1, Ordering::SeqCst);
        let refused = self
            .inner
            .refuse_opens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(RealtimeError::Transport("connection refused".to_string()));
        }

        let (to_client, inbound) = mpsc::unbounded_channel();
        let subscription = Arc::new(Mutex::new(None));
        let alive = Arc::new(AtomicBool::new(true));
        self.inner.connections.lock().push(LiveConnection {
            to_client: to_client.clone(),
            subscription: Arc::clone(&subscription),
            alive: Arc::clone(&alive),
        });

        Ok(Box::new(FakeConnection {
            broker: Arc::clone(&self.inner),
            to_client,
            inbound,
            subscription,
            alive,
        }))
    }
}

struct FakeConnection {
    broker: Arc<BrokerInner>,
    to_client: mpsc::UnboundedSender<ToClient>,
    inbound: mpsc::UnboundedReceiver<ToClient>,
    subscription: Arc<Mutex<Option<(String, String)>>>,
    alive: Arc<AtomicBool>,
}

impl FakeConnection {
    fn reply(&self, frame: StompFrame) {
        let _ = self.to_client.send(ToClient::Text(frame.encode()));
    }
}

#[async_trait]
impl PushConnection for FakeConnection {
    async fn send_text(&mut self, text: String) -> RealtimeResult<()> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(RealtimeError::Transport("socket closed".to_string()));
        }

        let Some(frame) = StompFrame::parse(&text)? else {
            self.broker.heartbeats.fetch_add(1, Ordering::SeqCst);
            return Ok(());
        };
        self.broker.frames.lock().push(frame.clone());

        match frame.command {
            StompCommand::Connect => {
                let rejected = self
                    .broker
                    .reject_connects
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok();
                if rejected {
                    self.reply(
                        StompFrame::new(StompCommand::Error).with_header("message", "Access denied"),
                    );
                } else if !self.broker.silent_handshake.load(Ordering::SeqCst) {
                    let heart_beat = self.broker.server_heart_beat.lock().clone();
                    self.reply(
                        StompFrame::new(StompCommand::Connected)
                            .with_header("version", "1.2")
                            .with_header("heart-beat", heart_beat),
                    );
                }
            }
            StompCommand::Subscribe => {
                let id = frame.header("id").unwrap_or_default().to_string();
                let destination = frame.header("destination").unwrap_or_default().to_string();
                *self.subscription.lock() = Some((id, destination));
            }
            StompCommand::Disconnect => {
                *self.subscription.lock() = None;
            }
            _ => {}
        }
        Ok(())
    }

    async fn next_text(&mut self) -> Option<RealtimeResult<String>> {
        match self.inbound.recv().await? {
            ToClient::Text(text) => Some(Ok(text)),
            ToClient::Close => None,
        }
    }

    async fn close(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
        *self.subscription.lock() = None;
    }
}
