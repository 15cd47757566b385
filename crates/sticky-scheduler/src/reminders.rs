//! Slot reminders: which jobs belong to which category, and moving them.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Duration, NaiveDate, NaiveTime};
use sticky_core::error::{Result, StickyError};
use sticky_core::model::{PartyId, PartyRef};
use sticky_store::StateStore;

use crate::job::{JobHandle, JobScheduler, Reminder};

/// Lead times used when the config leaves them out.
pub const DEFAULT_LEAD_TIMES: [u32; 2] = [5, 1];

/// Keeps the handle set of every category on top of a `JobScheduler`.
pub struct ReminderScheduler<S: JobScheduler> {
    jobs: Arc<S>,
    event_date: NaiveDate,
    categories: Mutex<HashMap<String, Vec<JobHandle>>>,
    seeded: Mutex<HashSet<PartyId>>,
}

impl<S: JobScheduler> ReminderScheduler<S> {
    pub fn new(jobs: Arc<S>, event_date: NaiveDate) -> Self {
        Self {
            jobs,
            event_date,
            categories: Mutex::new(HashMap::new()),
            seeded: Mutex::new(HashSet::new()),
        }
    }

    pub fn jobs(&self) -> &Arc<S> {
        &self.jobs
    }

    pub fn event_date(&self) -> NaiveDate {
        self.event_date
    }

    fn categories(&self) -> MutexGuard<'_, HashMap<String, Vec<JobHandle>>> {
        self.categories.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register one job per lead time, firing `lead` minutes before `time`
    /// on the event date. The handles join the category's set.
    pub fn schedule_slot(
        &self,
        category: &str,
        group: PartyRef,
        time: NaiveTime,
        lead_times: &[u32],
    ) -> Vec<JobHandle> {
        let slot = self.event_date.and_time(time);
        let mut categories = self.categories();

        let handles: Vec<JobHandle> = lead_times
            .iter()
            .map(|&lead| {
                let reminder = Reminder {
                    lead_minutes: lead,
                    group: group.clone(),
                    category: category.to_string(),
                };
                self.jobs
                    .schedule(slot - Duration::minutes(i64::from(lead)), reminder)
            })
            .collect();

        categories
            .entry(category.to_string())
            .or_default()
            .extend(handles.iter().copied());
        tracing::info!(
            "📅 {} reminder(s) for '{}' at {} ({category})",
            handles.len(),
            group.name,
            slot.format("%H:%M")
        );
        handles
    }

    /// Push every pending job of `category` back by `delta`.
    ///
    /// Jobs that already fired are dropped from the set; the returned handles
    /// replace it.
    pub fn reschedule_category(&self, category: &str, delta: Duration) -> Result<Vec<JobHandle>> {
        if delta <= Duration::zero() {
            return Err(StickyError::InvalidArgument(format!(
                "only forward delays are supported (got {}s)",
                delta.num_seconds()
            )));
        }

        let mut categories = self.categories();
        let handles = categories
            .get_mut(category)
            .ok_or_else(|| StickyError::InvalidArgument(format!("unknown category '{category}'")))?;

        let mut moved = Vec::with_capacity(handles.len());
        let mut dropped = 0usize;
        for &handle in handles.iter() {
            let Some(fire_at) = self.jobs.next_fire(handle) else {
                dropped += 1;
                continue;
            };
            match self.jobs.reschedule(handle, fire_at + delta) {
                Ok(new_handle) => moved.push(new_handle),
                // fired between the read and the move
                Err(StickyError::NotFound(_)) => dropped += 1,
                Err(e) => return Err(e),
            }
        }
        *handles = moved.clone();

        tracing::info!(
            "⏩ {category}: {} job(s) delayed by {} min, {dropped} already fired",
            moved.len(),
            delta.num_minutes()
        );
        Ok(moved)
    }

    /// Handles currently held for `category`.
    pub fn handles(&self, category: &str) -> Vec<JobHandle> {
        self.categories().get(category).cloned().unwrap_or_default()
    }

    /// Category names with a handle set, sorted.
    pub fn category_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.categories().keys().cloned().collect();
        names.sort();
        names
    }

    /// Schedule the slots of every requester in the store. Groups seeded by
    /// an earlier call are skipped. Returns the number of jobs registered.
    pub fn seed_from_store(&self, store: &StateStore, lead_times: &[u32]) -> Result<usize> {
        let lead_times: &[u32] = if lead_times.is_empty() {
            &DEFAULT_LEAD_TIMES
        } else {
            lead_times
        };

        let mut registered = 0;
        for group in store.requesters()? {
            if group.slots.is_empty() {
                continue;
            }
            let fresh = self
                .seeded
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(group.id);
            if !fresh {
                tracing::debug!("⏭️ '{}' already seeded", group.name);
                continue;
            }
            let group_ref = group.to_ref();
            for (category, time) in &group.slots {
                registered += self
                    .schedule_slot(category, group_ref.clone(), *time, lead_times)
                    .len();
            }
        }
        tracing::info!("📅 Seeded {registered} reminder job(s) for {}", self.event_date);
        Ok(registered)
    }
}
