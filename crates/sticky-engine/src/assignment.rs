//! Assignment Engine: pairs requester groups with provider units.
//!
//! ```text
//! request_explicit / request_random
//!   ├── requester exists? not occupied?        (outside the lock)
//!   └── claim lock ─┬─ re-read occupancy
//!                   ├─ pick provider (random: free − already visited)
//!                   └─ claim_pair: occupied=1 ×2 + insert visit (one transaction)
//! ```
//!
//! The claim lock also owns the random source, so the pick and the commit
//! can never interleave with another caller.

use std::sync::{Arc, Mutex, MutexGuard};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use sticky_core::error::{Result, StickyError};
use sticky_core::model::{PartyId, PartyRecord, Visit};
use sticky_store::StateStore;

use crate::outcome::{AssignOutcome, Pairing, ReleaseOutcome};

/// Pairing engine. Cheap to share behind an `Arc`.
pub struct AssignmentEngine {
    store: Arc<StateStore>,
    claim_lock: Mutex<StdRng>,
}

impl AssignmentEngine {
    pub fn new(store: Arc<StateStore>) -> Self {
        Self::with_rng(store, StdRng::from_entropy())
    }

    /// Engine with a fixed random source (deterministic picks).
    pub fn with_rng(store: Arc<StateStore>, rng: StdRng) -> Self {
        Self {
            store,
            claim_lock: Mutex::new(rng),
        }
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    fn lock(&self) -> Result<MutexGuard<'_, StdRng>> {
        self.claim_lock
            .lock()
            .map_err(|_| StickyError::Invariant("claim lock poisoned".into()))
    }

    /// Requester asks for a specific provider.
    ///
    /// Explicit choice does not apply the no-repeat filter; only random
    /// assignment does.
    pub fn request_explicit(&self, requester: PartyId, provider: PartyId) -> Result<AssignOutcome> {
        let group = self.store.requester(requester)?;
        self.store.provider(provider)?;
        if group.occupied {
            return Ok(AssignOutcome::AlreadyPaired);
        }

        let _guard = self.lock()?;
        let group = self.store.requester(requester)?;
        if group.occupied {
            return Ok(AssignOutcome::AlreadyPaired);
        }
        let unit = self.store.provider(provider)?;
        if unit.occupied {
            tracing::info!("⚔️ '{}' lost the race for '{}'", group.name, unit.name);
            return Ok(AssignOutcome::Conflict);
        }
        self.commit(&group, &unit)
    }

    /// Requester asks for any free provider it has not visited yet.
    pub fn request_random(&self, requester: PartyId) -> Result<AssignOutcome> {
        let group = self.store.requester(requester)?;
        if group.occupied {
            return Ok(AssignOutcome::AlreadyPaired);
        }

        let mut rng = self.lock()?;
        let group = self.store.requester(requester)?;
        if group.occupied {
            return Ok(AssignOutcome::AlreadyPaired);
        }

        let visited = self.store.finished_provider_ids(requester)?;
        let eligible: Vec<PartyRecord> = self
            .store
            .available_providers()?
            .into_iter()
            .filter(|p| !visited.contains(&p.id))
            .collect();

        let Some(unit) = eligible.choose(&mut *rng) else {
            tracing::info!(
                "🫙 No eligible provider for '{}' ({} already visited)",
                group.name,
                visited.len()
            );
            return Ok(AssignOutcome::PoolExhausted);
        };
        tracing::debug!("🎲 Picked '{}' out of {} eligible", unit.name, eligible.len());
        self.commit(&group, unit)
    }

    /// Runs with the claim lock held.
    fn commit(&self, group: &PartyRecord, unit: &PartyRecord) -> Result<AssignOutcome> {
        match self.store.claim_pair(group.id, unit.id)? {
            Some(visit) => {
                tracing::info!("🤝 Paired '{}' ↔ '{}' (visit #{})", group.name, unit.name, visit.id);
                Ok(AssignOutcome::Paired(Pairing {
                    visit: visit.id,
                    requester: group.to_ref(),
                    provider: unit.to_ref(),
                }))
            }
            // a writer outside the engine flipped a flag under us
            None => {
                tracing::warn!("⚠️ Claim of '{}' by '{}' rejected by the store", unit.name, group.name);
                Ok(AssignOutcome::Conflict)
            }
        }
    }

    /// End the provider's current visit and free both sides.
    pub fn release(&self, provider: PartyId) -> Result<ReleaseOutcome> {
        self.store.provider(provider)?;

        let _guard = self.lock()?;
        let unit = self.store.provider(provider)?;
        if !unit.occupied {
            return Ok(ReleaseOutcome::AlreadyReleased);
        }

        let visit = self.single_open_visit(&unit)?;
        let group = self.store.requester(visit.requester)?;
        if !self.store.finish_visit(&visit)? {
            return Err(StickyError::Invariant(format!(
                "visit #{} of '{}' finished outside the engine",
                visit.id, unit.name
            )));
        }

        tracing::info!("👋 Released '{}' from '{}' (visit #{})", unit.name, group.name, visit.id);
        Ok(ReleaseOutcome::Released {
            visit: visit.id,
            requester: group.to_ref(),
            provider: unit.to_ref(),
        })
    }

    fn single_open_visit(&self, unit: &PartyRecord) -> Result<Visit> {
        let mut open = self.store.unfinished_visits_for_provider(unit.id)?;
        if open.len() != 1 {
            tracing::error!(
                "❌ '{}' is occupied with {} unfinished visits",
                unit.name,
                open.len()
            );
            return Err(StickyError::Invariant(format!(
                "provider '{}' is occupied with {} unfinished visits",
                unit.name,
                open.len()
            )));
        }
        Ok(open.remove(0))
    }

    /// Finish every open visit and free everyone. Returns the number of
    /// visits finished.
    pub fn release_all(&self) -> Result<usize> {
        let _guard = self.lock()?;
        let count = self.store.finish_all_visits()?;
        tracing::info!("🧹 Released all pairings ({count} visits finished)");
        Ok(count)
    }

    /// Providers a requester could pick explicitly right now.
    pub fn available_providers(&self) -> Result<Vec<PartyRecord>> {
        self.store.available_providers()
    }

    /// Visit history of a requester group, oldest first.
    pub fn history(&self, requester: PartyId) -> Result<Vec<Visit>> {
        self.store.requester(requester)?;
        self.store.visits_for_requester(requester)
    }
}
