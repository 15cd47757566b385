//! # Sticky Scheduler
//!
//! Fires reminders ahead of each group's appointment slots on the event day.
//!
//! ## Architecture
//! ```text
//! ReminderScheduler (category -> handles)
//!   ├── schedule_slot("Sticky", G1, 14:00, [5, 1]) → jobs at 13:55, 13:59
//!   ├── reschedule_category("Sticky", +10min)      → every Sticky job shifted
//!   └── JobScheduler (trait)
//!         └── TimerScheduler: job table + tokio interval
//!               └── due job → spawned task → ReminderSink::deliver
//!                                              (errors/panics logged, never fatal)
//! ```
//!
//! The job table lives in memory. Slots are persisted in the state store, so
//! a restarted process rebuilds its jobs with [`ReminderScheduler::seed_from_store`].

pub mod job;
pub mod reminders;
pub mod sink;
pub mod timer;

pub use job::{JobHandle, JobScheduler, Reminder, ScheduledJob};
pub use reminders::ReminderScheduler;
pub use sink::{FiredReminder, LogSink, ReminderSink};
pub use timer::TimerScheduler;
