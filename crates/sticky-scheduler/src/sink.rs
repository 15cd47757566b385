//! Reminder delivery, the collaborator-facing end of the scheduler.
//! The scheduler never retries: a failed delivery is logged and dropped.

use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

use crate::job::{JobHandle, Reminder};

/// Delivers a fired reminder (chat message, webhook, ...).
#[async_trait]
pub trait ReminderSink: Send + Sync {
    /// Returns Err(reason) on failure; the scheduler only logs it.
    async fn deliver(&self, reminder: &Reminder) -> Result<(), String>;
}

/// Sink that only writes the reminder to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl ReminderSink for LogSink {
    async fn deliver(&self, reminder: &Reminder) -> Result<(), String> {
        tracing::info!(
            "📣 [{} → {}] {}",
            reminder.category,
            reminder.group.channel,
            reminder.message()
        );
        Ok(())
    }
}

/// A reminder that was handed to the sink.
#[derive(Debug, Clone, Serialize)]
pub struct FiredReminder {
    pub handle: JobHandle,
    pub reminder: Reminder,
    pub scheduled_for: NaiveDateTime,
    pub fired_at: DateTime<Utc>,
}

/// In-memory ring buffer of fired reminders (max 100).
#[derive(Debug, Default)]
pub(crate) struct FiredHistory {
    entries: VecDeque<FiredReminder>,
}

impl FiredHistory {
    const CAPACITY: usize = 100;

    pub(crate) fn record(&mut self, fired: FiredReminder) {
        self.entries.push_back(fired);
        if self.entries.len() > Self::CAPACITY {
            self.entries.pop_front();
        }
    }

    pub(crate) fn snapshot(&self) -> Vec<FiredReminder> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sticky_core::model::{PartyId, PartyRef};

    fn fired(n: u64) -> FiredReminder {
        FiredReminder {
            handle: JobHandle(n),
            reminder: Reminder {
                lead_minutes: 1,
                group: PartyRef {
                    id: PartyId(1),
                    name: "G1".into(),
                    channel: "c".into(),
                },
                category: "Sticky".into(),
            },
            scheduled_for: chrono::NaiveDate::from_ymd_opt(2026, 8, 20)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            fired_at: Utc::now(),
        }
    }

    #[test]
    fn test_history_ring_buffer() {
        let mut history = FiredHistory::default();
        for n in 0..105 {
            history.record(fired(n));
        }
        let snap = history.snapshot();
        assert_eq!(snap.len(), 100);
        assert_eq!(snap[0].handle, JobHandle(5));
        assert_eq!(snap[99].handle, JobHandle(104));
    }

    #[tokio::test]
    async fn test_log_sink_accepts() {
        assert!(LogSink.deliver(&fired(1).reminder).await.is_ok());
    }
}
