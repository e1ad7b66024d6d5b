use chrono::NaiveDate;
use eventhub_realtime::models::{
    NotificationRecord, NotificationType, Session, UserProfile, UserRole,
};
use eventhub_realtime::PushSignal;
use std::time::Duration;
use tokio::sync::watch;

/// Notification created `minute` minutes into the test day
pub fn notification(id: i64, minute: u32, read: bool) -> NotificationRecord {
    NotificationRecord {
        id,
        message: format!("Notification {id}"),
        kind: NotificationType::RsvpConfirmed,
        read,
        related_event_id: Some(1000 + id),
        created_at: NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(minute / 60, minute % 60, 0)
            .unwrap(),
    }
}

/// `total` records, newest first by id, the newest `unread` of them unread
pub fn notifications(total: i64, unread: i64) -> Vec<NotificationRecord> {
    (1..=total)
        .map(|id| notification(id, id as u32, id <= total - unread))
        .collect()
}

pub fn session(user_id: i64, token: &str) -> Session {
    Session::new(
        token,
        UserProfile {
            id: user_id,
            email: format!("user{user_id}@example.com"),
            first_name: "Test".to_string(),
            last_name: format!("User{user_id}"),
            role: UserRole::User,
        },
    )
}

pub fn push_signal(body: &str) -> PushSignal {
    PushSignal {
        destination: "/user/queue/notifications".to_string(),
        body: body.to_string(),
        received_at: chrono::Utc::now(),
    }
}

/// Wait (on the test clock) until the watched value satisfies `predicate`
pub async fn wait_until<T, F>(rx: &mut watch::Receiver<T>, predicate: F)
where
    F: FnMut(&T) -> bool,
{
    tokio::time::timeout(Duration::from_secs(60), rx.wait_for(predicate))
        .await
        .expect("condition not reached within 60s")
        .expect("watched value dropped");
}
