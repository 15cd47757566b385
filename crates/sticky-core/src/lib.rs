//! # Sticky Core
//!
//! Shared vocabulary for the pairing engine, the progress tracker and the
//! reminder scheduler: the party/visit model, member roles, configuration
//! and the error taxonomy every other crate returns.

pub mod config;
pub mod error;
pub mod model;

pub use config::{EventConfig, ProgressConfig, StickyConfig, StoreConfig};
pub use error::{Result, StickyError};
pub use model::{
    CellState, ContentItem, Member, PartyId, PartyRecord, PartyRef, Side, Visit, VisitId,
    parse_slot_time,
};
