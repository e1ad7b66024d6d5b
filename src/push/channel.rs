//! # Push Channel
//!
//! Long-lived broker session for one authenticated user. A background task
//! owns the connection: it handshakes, subscribes to the user's private
//! notification queue, keeps heart-beats flowing, and reconnects after a fixed
//! backoff until [`PushChannel::disconnect`] is called.
//!
//! Failures never reach callers. They show up as
//! [`PushConnectionState::Disconnected`] and are logged.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::config::PushConfig;
use crate::constants::defaults;
use crate::error::{RealtimeError, RealtimeResult};
use crate::events::Observable;
use crate::logging::log_push_operation;
use crate::models::Session;
use crate::push::state::PushConnectionState;
use crate::push::stomp::{HeartBeat, NegotiatedHeartBeat, StompCommand, StompFrame, HEARTBEAT_EOL};
use crate::push::transport::{PushConnection, PushTransport};

/// Who the channel connects as
#[derive(Clone, PartialEq, Eq)]
pub struct PushIdentity {
    pub user_id: i64,
    bearer_token: String,
}

impl PushIdentity {
    pub fn new(user_id: i64, bearer_token: impl Into<String>) -> Self {
        Self {
            user_id,
            bearer_token: bearer_token.into(),
        }
    }

    pub fn from_session(session: &Session) -> Self {
        Self::new(session.user.id, session.token.clone())
    }

    pub fn bearer_token(&self) -> &str {
        &self.bearer_token
    }
}

impl fmt::Debug for PushIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushIdentity")
            .field("user_id", &self.user_id)
            .field("bearer_token", &"[REDACTED]")
            .finish()
    }
}

/// Arrival of one message on the subscribed destination
///
/// Consumers treat it as an invalidation hint; the body is opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushSignal {
    pub destination: String,
    pub body: String,
    pub received_at: DateTime<Utc>,
}

/// Why a single connection ended
#[derive(Debug)]
enum ConnectionEnd {
    Shutdown,
    Lost(RealtimeError),
}

/// State shared between the channel handle and its session task
struct ChannelCore {
    transport: Arc<dyn PushTransport>,
    config: PushConfig,
    state: Observable<PushConnectionState>,
    signals: broadcast::Sender<PushSignal>,
}

struct ActiveSession {
    identity: PushIdentity,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Auto-reconnecting push subscription for the signed-in user
pub struct PushChannel {
    core: Arc<ChannelCore>,
    session: Mutex<Option<ActiveSession>>,
}

impl fmt::Debug for PushChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushChannel")
            .field("endpoint", &self.core.config.endpoint)
            .field("state", &self.core.state.current())
            .finish_non_exhaustive()
    }
}

impl PushChannel {
    pub fn new(transport: Arc<dyn PushTransport>, config: PushConfig) -> Self {
        let (signals, _) = broadcast::channel(config.signal_buffer.max(1));
        let core = ChannelCore {
            transport,
            config,
            state: Observable::new(
                PushConnectionState::Disconnected,
                defaults::OBSERVABLE_BUFFER,
            ),
            signals,
        };
        Self {
            core: Arc::new(core),
            session: Mutex::new(None),
        }
    }

    pub fn state(&self) -> PushConnectionState {
        self.core.state.current()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn state_watch(&self) -> watch::Receiver<PushConnectionState> {
        self.core.state.watch()
    }

    pub fn state_changes(&self) -> broadcast::Receiver<PushConnectionState> {
        self.core.state.subscribe()
    }

    /// Stream of inbound messages on the notification destination
    pub fn signals(&self) -> broadcast::Receiver<PushSignal> {
        self.core.signals.subscribe()
    }

    /// User the session loop is currently running for
    pub async fn active_user(&self) -> Option<i64> {
        let session = self.session.lock().await;
        session
            .as_ref()
            .filter(|active| !active.task.is_finished())
            .map(|active| active.identity.user_id)
    }

    /// Start the session loop for `identity`
    ///
    /// A no-op while a loop for the same identity is alive. Any other loop is
    /// stopped first, so at most one subscription exists at a time.
    pub async fn connect(&self, identity: PushIdentity) {
        let mut session = self.session.lock().await;

        if let Some(active) = session.as_ref() {
            if active.identity == identity && !active.task.is_finished() {
                debug!(user_id = identity.user_id, "Push session already running");
                return;
            }
        }

        if let Some(previous) = session.take() {
            stop_session(previous).await;
        }

        let user = identity.user_id.to_string();
        log_push_operation("connect", Some(user.as_str()), self.state().as_str(), None);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let core = Arc::clone(&self.core);
        let loop_identity = identity.clone();
        let task = tokio::spawn(async move { core.run_session(loop_identity, shutdown_rx).await });

        *session = Some(ActiveSession {
            identity,
            shutdown: shutdown_tx,
            task,
        });
    }

    /// Tear down the session loop and wait for it to exit
    ///
    /// Safe to call repeatedly or when never connected.
    pub async fn disconnect(&self) {
        let previous = self.session.lock().await.take();
        match previous {
            Some(active) => {
                let user = active.identity.user_id.to_string();
                stop_session(active).await;
                log_push_operation("disconnect", Some(user.as_str()), self.state().as_str(), None);
            }
            None => trace!("Push channel already disconnected"),
        }
        self.core.publish_state(PushConnectionState::Disconnected);
    }
}

async fn stop_session(active: ActiveSession) {
    let _ = active.shutdown.send(true);
    if let Err(e) = active.task.await {
        warn!(error = %e, "Push session task ended abnormally");
    }
}

/// Resolves once shutdown is requested or the handle is gone
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn broker_host(endpoint: &str) -> String {
    reqwest::Url::parse(endpoint)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_else(|| endpoint.to_string())
}

impl ChannelCore {
    fn publish_state(&self, state: PushConnectionState) {
        if self.state.current() != state {
            self.state.publish(state);
        }
    }

    async fn run_session(&self, identity: PushIdentity, mut shutdown: watch::Receiver<bool>) {
        let user = identity.user_id.to_string();

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.publish_state(PushConnectionState::Connecting);
            log_push_operation("connect_attempt", Some(user.as_str()), "connecting", None);

            let end = self.run_connection(&identity, &mut shutdown).await;
            self.publish_state(PushConnectionState::Disconnected);

            match end {
                ConnectionEnd::Shutdown => break,
                ConnectionEnd::Lost(e) => {
                    let details = format!(
                        "{e}; retrying in {}ms",
                        self.config.reconnect_delay_ms
                    );
                    log_push_operation("connection_lost", Some(user.as_str()), "disconnected", Some(details.as_str()));
                }
            }

            tokio::select! {
                _ = shutdown_requested(&mut shutdown) => break,
                _ = tokio::time::sleep(self.config.reconnect_delay()) => {}
            }
        }

        debug!(user_id = identity.user_id, "Push session loop exited");
    }

    async fn run_connection(
        &self,
        identity: &PushIdentity,
        shutdown: &mut watch::Receiver<bool>,
    ) -> ConnectionEnd {
        let handshake = tokio::select! {
            biased;
            _ = shutdown_requested(shutdown) => return ConnectionEnd::Shutdown,
            result = tokio::time::timeout(self.config.handshake_timeout(), self.handshake(identity)) => result,
        };

        let (mut connection, heart_beat, subscription_id) = match handshake {
            Ok(Ok(established)) => established,
            Ok(Err(e)) => return ConnectionEnd::Lost(e),
            Err(_) => {
                return ConnectionEnd::Lost(RealtimeError::Handshake(format!(
                    "no CONNECTED frame within {}ms",
                    self.config.handshake_timeout_ms
                )))
            }
        };

        self.publish_state(PushConnectionState::Connected);
        let user = identity.user_id.to_string();
        log_push_operation(
            "subscribed",
            Some(user.as_str()),
            "connected",
            Some(self.config.destination.as_str()),
        );

        let end = self
            .pump(connection.as_mut(), heart_beat, &subscription_id, shutdown)
            .await;

        if matches!(end, ConnectionEnd::Shutdown) {
            if let Err(e) = connection.send_text(StompFrame::disconnect().encode()).await {
                debug!(error = %e, "Failed to send DISCONNECT");
            }
        }
        connection.close().await;
        end
    }

    /// Open the transport, authenticate and subscribe
    async fn handshake(
        &self,
        identity: &PushIdentity,
    ) -> RealtimeResult<(Box<dyn PushConnection>, NegotiatedHeartBeat, String)> {
        let mut connection = self.transport.open(&self.config.endpoint).await?;

        let requested = HeartBeat::new(
            self.config.heartbeat_outgoing_ms,
            self.config.heartbeat_incoming_ms,
        );
        let connect = StompFrame::connect(
            &broker_host(&self.config.endpoint),
            requested,
            Some(identity.bearer_token()),
        );
        connection.send_text(connect.encode()).await?;

        let negotiated = loop {
            let text = match connection.next_text().await {
                Some(text) => text?,
                None => {
                    return Err(RealtimeError::Handshake(
                        "broker closed the connection before CONNECTED".to_string(),
                    ))
                }
            };
            let Some(frame) = StompFrame::parse(&text)? else {
                continue;
            };
            match frame.command {
                StompCommand::Connected => {
                    let server = match frame.header("heart-beat") {
                        Some(value) => HeartBeat::parse(value)?,
                        None => HeartBeat::default(),
                    };
                    break requested.negotiate(&server);
                }
                StompCommand::Error => {
                    let reason = frame.header("message").unwrap_or(frame.body.as_str());
                    return Err(RealtimeError::Handshake(format!("broker rejected CONNECT: {reason}")));
                }
                other => {
                    return Err(RealtimeError::Protocol(format!(
                        "expected CONNECTED, received {other}"
                    )))
                }
            }
        };

        let subscription_id = format!("sub-{}", Uuid::new_v4());
        connection
            .send_text(StompFrame::subscribe(&subscription_id, &self.config.destination).encode())
            .await?;

        debug!(
            subscription_id = %subscription_id,
            outgoing_ms = negotiated.outgoing.map(|d| d.as_millis() as u64),
            incoming_ms = negotiated.incoming.map(|d| d.as_millis() as u64),
            "Push handshake complete"
        );

        Ok((connection, negotiated, subscription_id))
    }

    /// Move frames until shutdown or the connection is lost
    async fn pump(
        &self,
        connection: &mut dyn PushConnection,
        heart_beat: NegotiatedHeartBeat,
        subscription_id: &str,
        shutdown: &mut watch::Receiver<bool>,
    ) -> ConnectionEnd {
        let mut outgoing = heart_beat.outgoing.map(|period| {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        // The broker counts as gone after two silent heart-beat periods
        let silence_limit = heart_beat.incoming.map(|period| period * 2);
        let mut last_inbound = Instant::now();

        loop {
            let idle_deadline = silence_limit.map(|limit| last_inbound + limit);

            tokio::select! {
                _ = shutdown_requested(shutdown) => return ConnectionEnd::Shutdown,
                _ = next_tick(&mut outgoing) => {
                    if let Err(e) = connection.send_text(HEARTBEAT_EOL.to_string()).await {
                        return ConnectionEnd::Lost(e);
                    }
                }
                _ = sleep_until_deadline(idle_deadline) => {
                    let limit = silence_limit.unwrap_or(Duration::ZERO);
                    return ConnectionEnd::Lost(RealtimeError::Transport(format!(
                        "no traffic from broker for {}ms",
                        limit.as_millis()
                    )));
                }
                inbound = connection.next_text() => {
                    last_inbound = Instant::now();
                    let text = match inbound {
                        Some(Ok(text)) => text,
                        Some(Err(e)) => return ConnectionEnd::Lost(e),
                        None => {
                            return ConnectionEnd::Lost(RealtimeError::Transport(
                                "broker closed the connection".to_string(),
                            ))
                        }
                    };
                    match StompFrame::parse(&text) {
                        Ok(Some(frame)) => {
                            if let Some(end) = self.dispatch(frame, subscription_id) {
                                return end;
                            }
                        }
                        Ok(None) => trace!("Broker heart-beat"),
                        Err(e) => return ConnectionEnd::Lost(e),
                    }
                }
            }
        }
    }

    fn dispatch(&self, frame: StompFrame, subscription_id: &str) -> Option<ConnectionEnd> {
        match frame.command {
            StompCommand::Message => {
                if frame.header("subscription") != Some(subscription_id) {
                    debug!(
                        subscription = ?frame.header("subscription"),
                        "Ignoring message for unknown subscription"
                    );
                    return None;
                }
                let signal = PushSignal {
                    destination: frame
                        .header("destination")
                        .unwrap_or(self.config.destination.as_str())
                        .to_string(),
                    body: frame.body,
                    received_at: Utc::now(),
                };
                trace!(destination = %signal.destination, "Push signal received");
                // Nobody listening just means nothing needs refreshing
                let _ = self.signals.send(signal);
                None
            }
            StompCommand::Error => {
                let reason = frame.header("message").unwrap_or(frame.body.as_str()).to_string();
                Some(ConnectionEnd::Lost(RealtimeError::Protocol(format!(
                    "broker error: {reason}"
                ))))
            }
            StompCommand::Receipt => None,
            other => {
                debug!(command = %other, "Ignoring unexpected frame from broker");
                None
            }
        }
    }
}
