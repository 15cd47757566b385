//! Job definitions and the seam for swapping the timer.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sticky_core::error::Result;
use sticky_core::model::PartyRef;

/// Opaque ticket for a registered job. Rescheduling issues a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobHandle(pub u64);

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Payload handed to the sink when a job fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    /// Minutes left until the slot.
    pub lead_minutes: u32,
    /// Group to remind; its channel is where the message goes.
    pub group: PartyRef,
    /// Provider category that owns the slot.
    pub category: String,
}

impl Reminder {
    /// Default rendering; collaborators are free to format their own.
    pub fn message(&self) -> String {
        let unit = if self.lead_minutes == 1 { "minute" } else { "minutes" };
        format!(
            "Reminder! You are expected at the registration booth of {} in {} {}.",
            self.category, self.lead_minutes, unit
        )
    }
}

/// A registered, not yet fired job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub handle: JobHandle,
    /// Association label (the category).
    pub label: String,
    pub fire_at: NaiveDateTime,
    pub reminder: Reminder,
}

/// Where jobs are kept and fired. `TimerScheduler` is the in-process
/// implementation; a durable queue can stand in for multi-instance setups.
pub trait JobScheduler: Send + Sync {
    /// Register a one-shot job.
    fn schedule(&self, fire_at: NaiveDateTime, reminder: Reminder) -> JobHandle;

    /// Fire time of a job that has not fired yet.
    fn next_fire(&self, handle: JobHandle) -> Option<NaiveDateTime>;

    /// Move a pending job. The old handle is retired.
    fn reschedule(&self, handle: JobHandle, fire_at: NaiveDateTime) -> Result<JobHandle>;

    /// Drop a pending job. `false` if it already fired or never existed.
    fn cancel(&self, handle: JobHandle) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use sticky_core::model::PartyId;

    #[test]
    fn test_message() {
        let mut r = Reminder {
            lead_minutes: 5,
            group: PartyRef {
                id: PartyId(1),
                name: "G1".into(),
                channel: "chan-g1".into(),
            },
            category: "Sticky".into(),
        };
        assert_eq!(
            r.message(),
            "Reminder! You are expected at the registration booth of Sticky in 5 minutes."
        );
        r.lead_minutes = 1;
        assert!(r.message().ends_with("in 1 minute."));
    }
}
