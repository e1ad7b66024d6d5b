//! # Structured Logging Module
//!
//! Environment-aware structured logging for the realtime layer. Development and
//! test builds get a readable console formatter at `debug`; production emits
//! JSON at `info`. `RUST_LOG` always wins when set.

use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));

        let console_layer: Box<dyn Layer<Registry> + Send + Sync> = if environment == "production" {
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        // Embedding applications may already own the global subscriber
        if tracing_subscriber::registry()
            .with(console_layer)
            .try_init()
            .is_err()
        {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            environment = %environment,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("EVENTHUB_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log a backend status emission
pub fn log_status_transition(cycle: u64, from: &str, to: &str, applied: bool) {
    tracing::info!(
        cycle = cycle,
        from = %from,
        to = %to,
        applied = applied,
        timestamp = %Utc::now().to_rfc3339(),
        "📶 BACKEND_STATUS"
    );
}

/// Log a push channel lifecycle operation
pub fn log_push_operation(operation: &str, user: Option<&str>, state: &str, details: Option<&str>) {
    tracing::info!(
        operation = %operation,
        user = user,
        state = %state,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📡 PUSH_OPERATION"
    );
}

/// Log a notification view mutation
pub fn log_notification_operation(
    operation: &str,
    notification_id: Option<i64>,
    visible: usize,
    unread: usize,
) {
    tracing::info!(
        operation = %operation,
        notification_id = notification_id,
        visible = visible,
        unread = unread,
        timestamp = %Utc::now().to_rfc3339(),
        "🔔 NOTIFICATION_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}
