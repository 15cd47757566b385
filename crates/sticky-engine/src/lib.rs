//! # Sticky Engine
//!
//! The two components that mutate event state on behalf of commands:
//!
//! - [`AssignmentEngine`]: one-to-one pairing of requester groups with
//!   provider units. Claim-and-commit runs under one process-wide lock, so
//!   concurrent requests for the same provider resolve to exactly one
//!   `Paired` and `Conflict` for everyone else.
//! - [`ProgressTracker`]: per-group cells unlocked a unit at a time.
//!
//! Both return outcome enums for expected business conditions and reserve
//! `Err` for unknown ids, bad arguments and storage failures.

pub mod assignment;
pub mod outcome;
pub mod progress;

pub use assignment::AssignmentEngine;
pub use outcome::{AssignOutcome, OutcomeKind, Pairing, ReleaseOutcome, UnlockOutcome};
pub use progress::{ProgressTracker, UnlockedItems};
