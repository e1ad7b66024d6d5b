pub mod notification;
pub mod user;

// Re-export core models for easy access
pub use notification::{MarkOutcome, NotificationRecord, NotificationType, NotificationView};
pub use user::{Session, UserProfile, UserRole};
