use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Kind of event a notification refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    RsvpConfirmed,
    RsvpWaitlist,
    EventUpdate,
    EventCancelled,
    WaitlistPromoted,
    EventReminder,
    /// Kinds added by newer backends
    #[serde(other)]
    Unknown,
}

/// One notification as returned by `GET notifications`
///
/// The backend owns the record; the client only caches it and mirrors the
/// `read` flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: i64,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_event_id: Option<i64>,
    pub created_at: NaiveDateTime,
}

/// Result of marking a single record read in the local view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// Record flipped from unread to read
    Updated,
    /// Record was already read; nothing changed
    AlreadyRead,
    /// Record is not in the visible window
    NotVisible,
}

/// Most recent notifications, newest first, capped at the window size
///
/// The unread count is always derived from the retained records so it can
/// never drift from the list it summarizes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationView {
    records: Vec<NotificationRecord>,
}

impl NotificationView {
    /// Build a view from records in arbitrary order
    pub fn from_records(mut records: Vec<NotificationRecord>, window: usize) -> Self {
        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        records.truncate(window);
        Self { records }
    }

    pub fn records(&self) -> &[NotificationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Unread records within the visible window only
    pub fn unread_count(&self) -> usize {
        self.records.iter().filter(|record| !record.read).count()
    }

    pub fn get(&self, id: i64) -> Option<&NotificationRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn mark_read(&mut self, id: i64) -> MarkOutcome {
        match self.records.iter_mut().find(|record| record.id == id) {
            Some(record) if record.read => MarkOutcome::AlreadyRead,
            Some(record) => {
                record.read = true;
                MarkOutcome::Updated
            }
            None => MarkOutcome::NotVisible,
        }
    }

    /// Mark every visible record read, returning how many changed
    pub fn mark_all_read(&mut self) -> usize {
        let mut changed = 0;
        for record in self.records.iter_mut().filter(|record| !record.read) {
            record.read = true;
            changed += 1;
        }
        changed
    }
}
