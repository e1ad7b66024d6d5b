use async_trait::async_trait;
use eventhub_realtime::client::{LivenessCheck, NotificationApi};
use eventhub_realtime::models::NotificationRecord;
use eventhub_realtime::{RealtimeError, RealtimeResult};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;

/// How one liveness check behaves
#[derive(Debug, Clone, Copy)]
pub enum ProbeBehavior {
    Succeed { after: Duration },
    Fail { after: Duration },
    /// Never settles
    Hang,
}

impl ProbeBehavior {
    pub fn succeed_after_ms(ms: u64) -> Self {
        ProbeBehavior::Succeed {
            after: Duration::from_millis(ms),
        }
    }

    pub fn fail_after_ms(ms: u64) -> Self {
        ProbeBehavior::Fail {
            after: Duration::from_millis(ms),
        }
    }
}

/// Liveness endpoint that follows a script, then a fallback behavior
pub struct ScriptedLiveness {
    script: Mutex<VecDeque<ProbeBehavior>>,
    fallback: ProbeBehavior,
    calls: AtomicUsize,
    completed: AtomicUsize,
}

impl ScriptedLiveness {
    pub fn new(fallback: ProbeBehavior) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            calls: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        }
    }

    pub fn with_script(fallback: ProbeBehavior, script: Vec<ProbeBehavior>) -> Self {
        let liveness = Self::new(fallback);
        *liveness.script.lock() = script.into();
        liveness
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Checks that ran to completion, including abandoned ones
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LivenessCheck for ScriptedLiveness {
    async fn check_liveness(&self) -> RealtimeResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self.script.lock().pop_front().unwrap_or(self.fallback);
        let result = match behavior {
            ProbeBehavior::Succeed { after } => {
                tokio::time::sleep(after).await;
                Ok(())
            }
            ProbeBehavior::Fail { after } => {
                tokio::time::sleep(after).await;
                Err(RealtimeError::api_error(503, "backend asleep"))
            }
            ProbeBehavior::Hang => std::future::pending().await,
        };
        self.completed.fetch_add(1, Ordering::SeqCst);
        result
    }
}

/// In-memory notification backend with call recording
pub struct FakeNotificationApi {
    records: Mutex<Vec<NotificationRecord>>,
    list_delays: Mutex<VecDeque<Duration>>,
    list_failure: Mutex<Option<u16>>,
    fail_mutations: AtomicBool,
    mutation_gate: Semaphore,
    gated: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl FakeNotificationApi {
    pub fn new(records: Vec<NotificationRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            list_delays: Mutex::new(VecDeque::new()),
            list_failure: Mutex::new(None),
            fail_mutations: AtomicBool::new(false),
            mutation_gate: Semaphore::new(0),
            gated: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_records(&self, records: Vec<NotificationRecord>) {
        *self.records.lock() = records;
    }

    /// Delay the next list calls, one entry per call
    pub fn delay_lists(&self, delays: Vec<Duration>) {
        *self.list_delays.lock() = delays.into();
    }

    /// Answer list calls with this HTTP status until cleared with `None`
    pub fn fail_lists(&self, status: Option<u16>) {
        *self.list_failure.lock() = status;
    }

    pub fn fail_mutations(&self, fail: bool) {
        self.fail_mutations.store(fail, Ordering::SeqCst);
    }

    /// Hold mutation calls until [`release_mutations`](Self::release_mutations)
    pub fn gate_mutations(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    pub fn release_mutations(&self, count: usize) {
        self.mutation_gate.add_permits(count);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    async fn mutation(&self, call: String) -> RealtimeResult<()> {
        self.calls.lock().push(call);
        if self.gated.load(Ordering::SeqCst) {
            let permit = self
                .mutation_gate
                .acquire()
                .await
                .map_err(|e| RealtimeError::Transport(e.to_string()))?;
            permit.forget();
        }
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(RealtimeError::api_error(500, "database unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationApi for FakeNotificationApi {
    async fn list_notifications(&self) -> RealtimeResult<Vec<NotificationRecord>> {
        self.calls.lock().push("list".to_string());
        let snapshot = self.records.lock().clone();
        let delay = self.list_delays.lock().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failure = *self.list_failure.lock();
        match failure {
            Some(status) => Err(RealtimeError::api_error(status, "list unavailable")),
            None => Ok(snapshot),
        }
    }

    async fn mark_read(&self, notification_id: i64) -> RealtimeResult<()> {
        self.mutation(format!("mark_read:{notification_id}")).await?;
        let mut records = self.records.lock();
        if let Some(record) = records.iter_mut().find(|r| r.id == notification_id) {
            record.read = true;
        }
        Ok(())
    }

    async fn mark_all_read(&self) -> RealtimeResult<()> {
        self.mutation("mark_all_read".to_string()).await?;
        for record in self.records.lock().iter_mut() {
            record.read = true;
        }
        Ok(())
    }
}
