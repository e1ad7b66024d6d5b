//! # Realtime System
//!
//! One scoped container for every piece of realtime state the UI shell reads:
//! backend status, push connection state, the notification view, the current
//! user and user-facing notices.
//!
//! The session lifecycle drives the push side. `login` connects the channel
//! and loads notifications, `logout` tears both down. The status monitor runs
//! independently from `start` until `shutdown`.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::client::{HttpBackendClient, LivenessCheck, NotificationApi};
use crate::config::RealtimeConfig;
use crate::constants::defaults;
use crate::error::{RealtimeError, RealtimeResult};
use crate::events::Observable;
use crate::health::{BackendStatus, BackendStatusMonitor, HealthProber, MonitorHandle};
use crate::models::{MarkOutcome, NotificationView, Session, UserProfile};
use crate::notifications::NotificationReconciler;
use crate::push::{PushChannel, PushConnectionState, PushIdentity, PushTransport, WebSocketTransport};
use crate::session::{SessionStore, SharedCredentials};

/// Dismissible message for the UI, raised when a user action fails
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserNotice {
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

/// Collaborators the system is assembled from
pub struct RealtimeParts {
    pub liveness: Arc<dyn LivenessCheck>,
    pub notifications: Arc<dyn NotificationApi>,
    pub transport: Arc<dyn PushTransport>,
    /// Must be the same slot the REST collaborators read their token from
    pub credentials: SharedCredentials,
    pub session_store: Option<SessionStore>,
}

#[derive(Default)]
struct RuntimeTasks {
    monitor: Option<MonitorHandle>,
    bridge: Option<JoinHandle<()>>,
}

pub struct RealtimeSystem {
    monitor: BackendStatusMonitor,
    push: PushChannel,
    notifications: NotificationReconciler,
    credentials: SharedCredentials,
    session_store: Option<SessionStore>,
    current_user: Observable<Option<UserProfile>>,
    notices: broadcast::Sender<UserNotice>,
    tasks: Mutex<RuntimeTasks>,
}

impl std::fmt::Debug for RealtimeSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeSystem")
            .field("backend_status", &self.monitor.current())
            .field("push_state", &self.push.state())
            .field("authenticated", &self.credentials.is_authenticated())
            .finish_non_exhaustive()
    }
}

impl RealtimeSystem {
    pub fn from_parts(config: &RealtimeConfig, parts: RealtimeParts) -> Self {
        let prober = HealthProber::new(parts.liveness);
        let (notices, _) = broadcast::channel(defaults::OBSERVABLE_BUFFER);

        Self {
            monitor: BackendStatusMonitor::new(prober, config.health.clone()),
            push: PushChannel::new(parts.transport, config.push.clone()),
            notifications: NotificationReconciler::new(
                parts.notifications,
                config.notifications.window_size,
            ),
            credentials: parts.credentials,
            session_store: parts.session_store,
            current_user: Observable::new(None, defaults::OBSERVABLE_BUFFER),
            notices,
            tasks: Mutex::new(RuntimeTasks::default()),
        }
    }

    /// Assemble the production stack: HTTP client plus WebSocket transport
    pub fn connect(config: &RealtimeConfig) -> RealtimeResult<Self> {
        let credentials = SharedCredentials::new();
        let client = Arc::new(HttpBackendClient::from_config(config, credentials.clone())?);

        let parts = RealtimeParts {
            liveness: client.clone(),
            notifications: client,
            transport: Arc::new(WebSocketTransport::new()),
            credentials,
            session_store: config.session_file.clone().map(SessionStore::new),
        };
        Ok(Self::from_parts(config, parts))
    }

    /// Start status polling and resume a cached session if there is one
    pub async fn start(&self) {
        {
            let mut tasks = self.tasks.lock().await;
            if tasks.monitor.is_none() {
                tasks.monitor = Some(self.monitor.start());
            }
            self.ensure_bridge(&mut tasks);
        }

        let restored = self.session_store.as_ref().and_then(SessionStore::load);
        if let Some(session) = restored {
            info!(user = %session.user.email, "Resuming cached session");
            self.activate(session).await;
        }
    }

    /// Adopt a freshly authenticated session
    pub async fn login(&self, session: Session) {
        if let Some(store) = &self.session_store {
            if let Err(e) = store.save(&session) {
                warn!(error = %e, "Could not cache session; continuing without it");
            }
        }
        self.ensure_bridge(&mut *self.tasks.lock().await);
        self.activate(session).await;
    }

    pub async fn logout(&self) {
        self.push.disconnect().await;
        self.credentials.clear();
        if let Some(store) = &self.session_store {
            if let Err(e) = store.clear() {
                warn!(error = %e, "Could not remove cached session");
            }
        }
        self.notifications.reset();
        self.current_user.publish(None);
        info!("Logged out");
    }

    /// Mark one notification read, raising a notice if the backend refuses
    pub async fn mark_read(&self, notification_id: i64) -> RealtimeResult<MarkOutcome> {
        self.notifications
            .mark_read(notification_id)
            .await
            .inspect_err(|e| self.raise_notice(e))
    }

    pub async fn mark_all_read(&self) -> RealtimeResult<usize> {
        self.notifications
            .mark_all_read()
            .await
            .inspect_err(|e| self.raise_notice(e))
    }

    /// Stop polling, the push bridge and the push channel
    pub async fn shutdown(&self) {
        let (monitor, bridge) = {
            let mut tasks = self.tasks.lock().await;
            (tasks.monitor.take(), tasks.bridge.take())
        };
        if let Some(monitor) = monitor {
            monitor.stop().await;
        }
        if let Some(bridge) = bridge {
            bridge.abort();
        }
        self.push.disconnect().await;
        info!("Realtime system shut down");
    }

    pub fn backend_status(&self) -> watch::Receiver<BackendStatus> {
        self.monitor.status()
    }

    pub fn backend_status_changes(&self) -> broadcast::Receiver<BackendStatus> {
        self.monitor.status_changes()
    }

    pub fn push_state(&self) -> watch::Receiver<PushConnectionState> {
        self.push.state_watch()
    }

    pub fn unread_count(&self) -> watch::Receiver<usize> {
        self.notifications.unread_watch()
    }

    pub fn notifications(&self) -> watch::Receiver<NotificationView> {
        self.notifications.notifications()
    }

    pub fn current_user(&self) -> watch::Receiver<Option<UserProfile>> {
        self.current_user.watch()
    }

    pub fn notices(&self) -> broadcast::Receiver<UserNotice> {
        self.notices.subscribe()
    }

    pub fn monitor(&self) -> &BackendStatusMonitor {
        &self.monitor
    }

    pub fn push_channel(&self) -> &PushChannel {
        &self.push
    }

    pub fn reconciler(&self) -> &NotificationReconciler {
        &self.notifications
    }

    fn ensure_bridge(&self, tasks: &mut RuntimeTasks) {
        let running = tasks
            .bridge
            .as_ref()
            .is_some_and(|bridge| !bridge.is_finished());
        if !running {
            tasks.bridge = Some(self.notifications.follow(self.push.signals()));
        }
    }

    async fn activate(&self, session: Session) {
        self.credentials.install(session.token.clone());
        self.current_user.publish(Some(session.user.clone()));
        self.push.connect(PushIdentity::from_session(&session)).await;

        // Failures are logged by refresh and show up in the status signals
        let _ = self.notifications.refresh().await;
    }

    fn raise_notice(&self, error: &RealtimeError) {
        let notice = UserNotice {
            message: error.to_string(),
            occurred_at: Utc::now(),
        };
        // No subscribers means no UI is showing notices
        let _ = self.notices.send(notice);
    }
}
