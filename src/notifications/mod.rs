//! # Notifications
//!
//! The user's notification list as seen by the UI shell, kept in step with
//! the backend by explicit refreshes and push-triggered refetches.

pub mod reconciler;

pub use reconciler::NotificationReconciler;
