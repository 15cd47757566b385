//! In-process `JobScheduler`. A job table behind a mutex and a
//! tokio interval that fires whatever is due.
//!
//! Command handlers register and move jobs while the timer loop takes due
//! jobs out of the same table; both sides only hold the lock for a map
//! operation, never across delivery.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration as StdDuration;

use chrono::{Duration, Local, NaiveDateTime, Utc};
use sticky_core::error::{Result, StickyError};
use tokio::task::JoinHandle;

use crate::job::{JobHandle, JobScheduler, Reminder, ScheduledJob};
use crate::sink::{FiredHistory, FiredReminder, ReminderSink};

#[derive(Default)]
struct JobTable {
    next_id: u64,
    jobs: BTreeMap<JobHandle, ScheduledJob>,
}

impl JobTable {
    fn insert(&mut self, fire_at: NaiveDateTime, reminder: Reminder) -> JobHandle {
        self.next_id += 1;
        let handle = JobHandle(self.next_id);
        self.jobs.insert(
            handle,
            ScheduledJob {
                handle,
                label: reminder.category.clone(),
                fire_at,
                reminder,
            },
        );
        handle
    }

    /// Remove and return every job due at `now`, earliest first.
    fn take_due(&mut self, now: NaiveDateTime) -> Vec<ScheduledJob> {
        let due: Vec<JobHandle> = self
            .jobs
            .values()
            .filter(|j| j.fire_at <= now)
            .map(|j| j.handle)
            .collect();
        let mut jobs: Vec<ScheduledJob> = due.iter().filter_map(|h| self.jobs.remove(h)).collect();
        jobs.sort_by_key(|j| (j.fire_at, j.handle));
        jobs
    }
}

/// In-process job scheduler.
pub struct TimerScheduler {
    table: Mutex<JobTable>,
    sink: Arc<dyn ReminderSink>,
    history: Mutex<FiredHistory>,
    /// Jobs overdue by more than this are dropped instead of fired.
    misfire_grace: Duration,
}

impl TimerScheduler {
    pub fn new(sink: Arc<dyn ReminderSink>) -> Self {
        Self {
            table: Mutex::new(JobTable::default()),
            sink,
            history: Mutex::new(FiredHistory::default()),
            misfire_grace: Duration::minutes(1),
        }
    }

    pub fn with_misfire_grace(mut self, grace: Duration) -> Self {
        self.misfire_grace = grace;
        self
    }

    fn table(&self) -> MutexGuard<'_, JobTable> {
        // a panic while holding this lock cannot leave a half-written map entry
        self.table.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Pending jobs, earliest first.
    pub fn pending(&self) -> Vec<ScheduledJob> {
        let mut jobs: Vec<ScheduledJob> = self.table().jobs.values().cloned().collect();
        jobs.sort_by_key(|j| (j.fire_at, j.handle));
        jobs
    }

    pub fn pending_count(&self) -> usize {
        self.table().jobs.len()
    }

    /// Recently fired reminders, oldest first.
    pub fn history(&self) -> Vec<FiredReminder> {
        self.history
            .lock()
            .map(|h| h.snapshot())
            .unwrap_or_default()
    }

    /// Fire every job due at `now`. Must run inside a tokio runtime.
    ///
    /// Returns one handle per delivery; the loop ignores them, tests await them.
    pub fn tick_at(&self, now: NaiveDateTime) -> Vec<JoinHandle<()>> {
        let due = self.table().take_due(now);
        let mut deliveries = Vec::with_capacity(due.len());

        for job in due {
            if now - job.fire_at > self.misfire_grace {
                tracing::warn!(
                    "⏭️ Dropping {} for '{}' ({}): missed by {}s",
                    job.handle,
                    job.reminder.group.name,
                    job.label,
                    (now - job.fire_at).num_seconds()
                );
                continue;
            }

            tracing::info!(
                "🔔 {} fired: '{}' / {} ({} min)",
                job.handle,
                job.reminder.group.name,
                job.label,
                job.reminder.lead_minutes
            );
            if let Ok(mut history) = self.history.lock() {
                history.record(FiredReminder {
                    handle: job.handle,
                    reminder: job.reminder.clone(),
                    scheduled_for: job.fire_at,
                    fired_at: Utc::now(),
                });
            }
            deliveries.push(self.deliver(job));
        }
        deliveries
    }

    /// Fire-and-forget delivery. The inner task isolates sink panics; the
    /// outer one reports how it ended.
    fn deliver(&self, job: ScheduledJob) -> JoinHandle<()> {
        let sink = Arc::clone(&self.sink);
        let handle = job.handle;
        let reminder = job.reminder;
        let inner = tokio::spawn(async move { sink.deliver(&reminder).await });

        tokio::spawn(async move {
            match inner.await {
                Ok(Ok(())) => tracing::debug!("✅ {handle} delivered"),
                Ok(Err(e)) => tracing::warn!("⚠️ {handle} delivery failed: {e}"),
                Err(e) if e.is_panic() => tracing::warn!("⚠️ {handle} sink panicked"),
                Err(e) => tracing::warn!("⚠️ {handle} delivery aborted: {e}"),
            }
        })
    }

    /// Spawn the timer loop as a background tokio task.
    pub fn spawn(self: &Arc<Self>, tick: StdDuration) -> JoinHandle<()> {
        let timer = Arc::clone(self);
        tokio::spawn(async move {
            tracing::info!(
                "⏰ Reminder timer started ({} pending, tick every {:?})",
                timer.pending_count(),
                tick
            );
            let mut interval = tokio::time::interval(tick);
            loop {
                interval.tick().await;
                timer.tick_at(Local::now().naive_local());
            }
        })
    }
}

impl JobScheduler for TimerScheduler {
    fn schedule(&self, fire_at: NaiveDateTime, reminder: Reminder) -> JobHandle {
        let handle = self.table().insert(fire_at, reminder);
        tracing::debug!("📅 {handle} scheduled for {fire_at}");
        handle
    }

    fn next_fire(&self, handle: JobHandle) -> Option<NaiveDateTime> {
        self.table().jobs.get(&handle).map(|j| j.fire_at)
    }

    fn reschedule(&self, handle: JobHandle, fire_at: NaiveDateTime) -> Result<JobHandle> {
        let mut table = self.table();
        let job = table
            .jobs
            .remove(&handle)
            .ok_or_else(|| StickyError::not_found("pending job", handle))?;
        let new_handle = table.insert(fire_at, job.reminder);
        tracing::debug!("📅 {handle} moved to {fire_at} as {new_handle}");
        Ok(new_handle)
    }

    fn cancel(&self, handle: JobHandle) -> bool {
        self.table().jobs.remove(&handle).is_some()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use sticky_core::model::{PartyId, PartyRef};

    /// Sink that remembers what it delivered; fails or panics on request.
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub(crate) delivered: Mutex<Vec<Reminder>>,
    }

    #[async_trait]
    impl ReminderSink for RecordingSink {
        async fn deliver(&self, reminder: &Reminder) -> std::result::Result<(), String> {
            match reminder.group.name.as_str() {
                "fails" => Err("channel unreachable".into()),
                "panics" => panic!("sink bug"),
                _ => {
                    self.delivered.lock().unwrap().push(reminder.clone());
                    Ok(())
                }
            }
        }
    }

    pub(crate) fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 8, 20)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn reminder(group: &str, lead: u32) -> Reminder {
        Reminder {
            lead_minutes: lead,
            group: PartyRef {
                id: PartyId(1),
                name: group.into(),
                channel: format!("chan-{group}"),
            },
            category: "Sticky".into(),
        }
    }

    fn timer() -> (Arc<TimerScheduler>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        (Arc::new(TimerScheduler::new(sink.clone())), sink)
    }

    #[tokio::test]
    async fn test_tick_fires_only_due_jobs() {
        let (timer, sink) = timer();
        timer.schedule(at(13, 55), reminder("G1", 5));
        let later = timer.schedule(at(13, 59), reminder("G1", 1));

        for d in timer.tick_at(at(13, 55)) {
            d.await.unwrap();
        }
        assert_eq!(sink.delivered.lock().unwrap().len(), 1);
        assert_eq!(timer.pending_count(), 1);
        assert_eq!(timer.next_fire(later), Some(at(13, 59)));

        // nothing new is due
        assert!(timer.tick_at(at(13, 56)).is_empty());
        assert_eq!(timer.history().len(), 1);
    }

    #[tokio::test]
    async fn test_failing_and_panicking_sinks_do_not_stop_others() {
        let (timer, sink) = timer();
        timer.schedule(at(10, 0), reminder("fails", 5));
        timer.schedule(at(10, 0), reminder("panics", 5));
        timer.schedule(at(10, 0), reminder("G2", 5));

        let deliveries = timer.tick_at(at(10, 0));
        assert_eq!(deliveries.len(), 3);
        for d in deliveries {
            // the reporting task itself never fails
            d.await.unwrap();
        }
        let delivered = sink.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].group.name, "G2");
        drop(delivered);

        timer.schedule(at(10, 5), reminder("G3", 1));
        for d in timer.tick_at(at(10, 5)) {
            d.await.unwrap();
        }
        assert_eq!(sink.delivered.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_misfired_jobs_are_dropped() {
        let (timer, sink) = timer();
        timer.schedule(at(9, 0), reminder("G1", 5));
        assert!(timer.tick_at(at(9, 30)).is_empty());
        assert_eq!(timer.pending_count(), 0);
        assert!(sink.delivered.lock().unwrap().is_empty());
    }

    #[test]
    fn test_reschedule_and_cancel() {
        let (timer, _) = timer();
        let h = timer.schedule(at(12, 0), reminder("G1", 5));
        let moved = timer.reschedule(h, at(12, 10)).unwrap();
        assert_ne!(h, moved);
        assert_eq!(timer.next_fire(h), None);
        assert_eq!(timer.next_fire(moved), Some(at(12, 10)));
        assert!(matches!(timer.reschedule(h, at(13, 0)), Err(StickyError::NotFound(_))));

        assert!(timer.cancel(moved));
        assert!(!timer.cancel(moved));
        assert!(timer.pending().is_empty());
    }

    #[tokio::test]
    async fn test_spawned_loop_delivers() {
        let (timer, sink) = timer();
        let now = Local::now().naive_local();
        timer.schedule(now - Duration::seconds(1), reminder("G1", 5));

        let handle = timer.spawn(StdDuration::from_millis(10));
        let delivered = tokio::time::timeout(StdDuration::from_secs(2), async {
            loop {
                if !sink.delivered.lock().unwrap().is_empty() {
                    break;
                }
                tokio::time::sleep(StdDuration::from_millis(10)).await;
            }
        })
        .await;
        handle.abort();
        assert!(delivered.is_ok());
    }
}
