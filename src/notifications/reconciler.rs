//! # Notification Reconciler
//!
//! Owns the visible [`NotificationView`] and its derived unread count.
//!
//! The view is only ever replaced wholesale from a backend fetch. Push
//! signals carry no data the reconciler trusts; each one just triggers a
//! fresh fetch. Local read-flag changes are applied optimistically before
//! the backend call is issued and are kept even when that call fails.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::NotificationApi;
use crate::constants::defaults;
use crate::error::{RealtimeError, RealtimeResult};
use crate::events::Observable;
use crate::logging::{log_error, log_notification_operation};
use crate::models::{MarkOutcome, NotificationView};
use crate::push::PushSignal;

#[derive(Debug, Default)]
struct ViewState {
    view: NotificationView,
    /// Sequence number of the newest fetch applied to `view`
    last_applied_refresh: u64,
}

struct ReconcilerCore {
    api: Arc<dyn NotificationApi>,
    window: usize,
    refresh_seq: AtomicU64,
    state: Mutex<ViewState>,
    view: Observable<NotificationView>,
    unread: Observable<usize>,
}

impl ReconcilerCore {
    /// Mark fetches started before now as superseded by the current view
    fn supersede_in_flight(&self, state: &mut ViewState) {
        state.last_applied_refresh = self.refresh_seq.fetch_add(1, Ordering::SeqCst) + 1;
    }

    /// Publish list and count together so readers never see them disagree
    fn publish(&self, view: &NotificationView) {
        self.view.publish(view.clone());
        self.unread.publish(view.unread_count());
    }
}

/// Pull-on-demand, poll-on-push cache of the user's latest notifications
#[derive(Clone)]
pub struct NotificationReconciler {
    core: Arc<ReconcilerCore>,
}

impl std::fmt::Debug for NotificationReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationReconciler")
            .field("window", &self.core.window)
            .field("unread", &self.core.unread.current())
            .finish_non_exhaustive()
    }
}

impl NotificationReconciler {
    pub fn new(api: Arc<dyn NotificationApi>, window: usize) -> Self {
        let core = ReconcilerCore {
            api,
            window,
            refresh_seq: AtomicU64::new(0),
            state: Mutex::new(ViewState::default()),
            view: Observable::new(NotificationView::default(), defaults::OBSERVABLE_BUFFER),
            unread: Observable::new(0, defaults::OBSERVABLE_BUFFER),
        };
        Self {
            core: Arc::new(core),
        }
    }

    /// Snapshot of the visible records
    pub fn view(&self) -> NotificationView {
        self.core.state.lock().view.clone()
    }

    pub fn unread_count(&self) -> usize {
        self.core.unread.current()
    }

    pub fn notifications(&self) -> watch::Receiver<NotificationView> {
        self.core.view.watch()
    }

    pub fn notification_changes(&self) -> broadcast::Receiver<NotificationView> {
        self.core.view.subscribe()
    }

    pub fn unread_watch(&self) -> watch::Receiver<usize> {
        self.core.unread.watch()
    }

    pub fn unread_changes(&self) -> broadcast::Receiver<usize> {
        self.core.unread.subscribe()
    }

    /// Replace the view with the newest `window` records from the backend
    ///
    /// When fetches overlap, a result is dropped if a later-started fetch has
    /// already been applied.
    pub async fn refresh(&self) -> RealtimeResult<NotificationView> {
        let core = &self.core;
        let seq = core.refresh_seq.fetch_add(1, Ordering::SeqCst) + 1;

        let records = core.api.list_notifications().await.inspect_err(|e| {
            if e.is_transient() {
                warn!(error = %e, refresh = seq, "Notification refresh failed");
            } else {
                log_error("notifications", "refresh", &e.to_string(), None);
            }
        })?;
        let fetched = NotificationView::from_records(records, core.window);

        let mut state = core.state.lock();
        if seq <= state.last_applied_refresh {
            debug!(
                refresh = seq,
                applied = state.last_applied_refresh,
                "Discarding superseded notification fetch"
            );
            return Ok(state.view.clone());
        }

        state.last_applied_refresh = seq;
        state.view = fetched;
        core.publish(&state.view);
        log_notification_operation("refresh", None, state.view.len(), state.view.unread_count());

        Ok(state.view.clone())
    }

    /// React to a push signal by refetching; the payload is not inspected
    pub async fn on_push(&self, signal: &PushSignal) {
        debug!(destination = %signal.destination, "Push signal triggers refresh");
        // Failures are logged by refresh; the next signal retries
        let _ = self.refresh().await;
    }

    /// Refresh on every signal from `signals` until the sender goes away
    pub fn follow(&self, mut signals: broadcast::Receiver<PushSignal>) -> JoinHandle<()> {
        let reconciler = self.clone();
        tokio::spawn(async move {
            loop {
                match signals.recv().await {
                    Ok(signal) => reconciler.on_push(&signal).await,
                    Err(RecvError::Lagged(skipped)) => {
                        // One refresh covers any number of missed signals
                        debug!(skipped, "Push signals lagged; refreshing once");
                        let _ = reconciler.refresh().await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            info!("Stopped following push signals");
        })
    }

    /// Mark one record read
    ///
    /// The local flag flips before this returns; the returned future issues
    /// the backend update. Fetches already in flight are discarded so their
    /// older snapshot cannot undo the change. A record already read locally needs no backend call.
    /// Failures surface as [`RealtimeError::UserAction`] and keep the local
    /// change.
    pub fn mark_read(
        &self,
        notification_id: i64,
    ) -> impl Future<Output = RealtimeResult<MarkOutcome>> + Send + 'static {
        let core = Arc::clone(&self.core);
        let outcome = {
            let mut state = core.state.lock();
            let outcome = state.view.mark_read(notification_id);
            if outcome == MarkOutcome::Updated {
                core.supersede_in_flight(&mut state);
                core.publish(&state.view);
            }
            log_notification_operation(
                "mark_read",
                Some(notification_id),
                state.view.len(),
                state.view.unread_count(),
            );
            outcome
        };

        async move {
            if outcome == MarkOutcome::AlreadyRead {
                return Ok(outcome);
            }
            core.api
                .mark_read(notification_id)
                .await
                .map_err(|e| RealtimeError::user_action("mark_read", e))?;
            Ok(outcome)
        }
    }

    /// Mark every visible record read, then tell the backend to mark all
    ///
    /// Like [`mark_read`](Self::mark_read), the local update is immediate and
    /// never rolled back. Resolves to the number of records changed locally.
    pub fn mark_all_read(&self) -> impl Future<Output = RealtimeResult<usize>> + Send + 'static {
        let core = Arc::clone(&self.core);
        let changed = {
            let mut state = core.state.lock();
            let changed = state.view.mark_all_read();
            if changed > 0 {
                core.supersede_in_flight(&mut state);
                core.publish(&state.view);
            }
            log_notification_operation("mark_all_read", None, state.view.len(), 0);
            changed
        };

        async move {
            // Records beyond the window may still be unread server-side
            core.api
                .mark_all_read()
                .await
                .map_err(|e| RealtimeError::user_action("mark_all_read", e))?;
            Ok(changed)
        }
    }

    /// Drop the view, e.g. on logout; fetches still in flight are discarded
    pub fn reset(&self) {
        let core = &self.core;
        let mut state = core.state.lock();
        core.supersede_in_flight(&mut state);
        state.view = NotificationView::default();
        core.publish(&state.view);
        log_notification_operation("reset", None, 0, 0);
    }
}
