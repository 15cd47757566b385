//! Progress Tracker: per-group content cells unlocked a unit at a time.
//!
//! Cell `i` guards content item `i + 1`. Unit `n` covers cells
//! `n * unit_size .. (n + 1) * unit_size` (the last unit may be short).

use std::sync::Arc;

use sticky_core::config::ProgressConfig;
use sticky_core::error::{Result, StickyError};
use sticky_core::model::{CellState, ContentItem};
use sticky_store::StateStore;

use crate::outcome::UnlockOutcome;

pub struct ProgressTracker {
    store: Arc<StateStore>,
    unit_size: usize,
    total_cells: usize,
}

impl ProgressTracker {
    pub fn new(store: Arc<StateStore>, config: &ProgressConfig) -> Self {
        Self {
            store,
            unit_size: config.unit_size.max(1),
            total_cells: config.total_items,
        }
    }

    pub fn unit_size(&self) -> usize {
        self.unit_size
    }

    /// Number of units a full bitmask holds.
    pub fn unit_count(&self) -> usize {
        self.total_cells.div_ceil(self.unit_size)
    }

    /// Create the all-locked bitmask for a group. Existing progress is kept.
    pub fn register_group(&self, group_key: &str) -> Result<bool> {
        let created = self.store.ensure_bitmask(group_key, self.total_cells)?;
        if created {
            tracing::debug!("🧩 Bitmask created for '{group_key}' ({} cells)", self.total_cells);
        }
        Ok(created)
    }

    /// Unlock every cell of `unit_index` (0-based) for `group_key`.
    ///
    /// Other processes may unlock units of the same group at the same time,
    /// so the row is written with a compare-and-set and re-read on a miss.
    /// Cells never go back to locked, so the retries are bounded by the
    /// cell count.
    pub fn unlock_unit(&self, group_key: &str, unit_index: usize) -> Result<UnlockOutcome> {
        let (start, end) = loop {
            let Some(current) = self.store.bitmask(group_key)? else {
                return Ok(UnlockOutcome::NoSuchGroup);
            };

            let start = unit_index
                .checked_mul(self.unit_size)
                .filter(|s| *s < current.len())
                .ok_or_else(|| {
                    StickyError::InvalidArgument(format!(
                        "unit {unit_index} outside the {} cells of '{group_key}'",
                        current.len()
                    ))
                })?;
            let end = (start + self.unit_size).min(current.len());

            if current[start] != CellState::Locked {
                return Ok(UnlockOutcome::AlreadyUnlocked);
            }
            let mut cells = current.clone();
            cells[start..end].fill(CellState::Unlocked);
            if self.store.swap_bitmask(group_key, &current, &cells)? {
                break (start, end);
            }
            tracing::debug!("🔁 Bitmask of '{group_key}' changed underneath, retrying");
        };

        let items: Vec<ContentItem> = self
            .store
            .content_items()?
            .into_iter()
            .filter(|item| cell_of(item).is_some_and(|c| (start..end).contains(&c)))
            .collect();
        tracing::info!(
            "🔓 Unlocked unit {unit_index} for '{group_key}' ({} items)",
            items.len()
        );
        Ok(UnlockOutcome::Unlocked { items })
    }

    /// Everything currently unlocked for `group_key`, in content order.
    pub fn list_unlocked(&self, group_key: &str) -> Result<UnlockedItems> {
        let cells = self
            .store
            .bitmask(group_key)?
            .ok_or_else(|| StickyError::not_found("progress group", group_key))?;
        Ok(UnlockedItems {
            cells,
            items: self.store.content_items()?,
        })
    }
}

fn cell_of(item: &ContentItem) -> Option<usize> {
    (item.index as usize).checked_sub(1)
}

/// Snapshot of a group's progress. Iterating filters lazily and can be
/// restarted any number of times.
#[derive(Debug, Clone)]
pub struct UnlockedItems {
    cells: Vec<CellState>,
    items: Vec<ContentItem>,
}

impl UnlockedItems {
    pub fn iter(&self) -> UnlockedIter<'_> {
        UnlockedIter {
            cells: &self.cells,
            items: self.items.iter(),
        }
    }

    pub fn cells(&self) -> &[CellState] {
        &self.cells
    }
}

impl<'a> IntoIterator for &'a UnlockedItems {
    type Item = &'a ContentItem;
    type IntoIter = UnlockedIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct UnlockedIter<'a> {
    cells: &'a [CellState],
    items: std::slice::Iter<'a, ContentItem>,
}

impl<'a> Iterator for UnlockedIter<'a> {
    type Item = &'a ContentItem;

    fn next(&mut self) -> Option<Self::Item> {
        let cells = self.cells;
        self.items.by_ref().find(|item| {
            cell_of(item)
                .and_then(|c| cells.get(c))
                .is_some_and(|state| *state == CellState::Unlocked)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(total: usize, unit: usize) -> ProgressTracker {
        let store = Arc::new(StateStore::open_in_memory().unwrap());
        for i in 1..=total as u32 {
            store.upsert_content_item(i, &format!("opdracht {i}")).unwrap();
        }
        let config = ProgressConfig {
            unit_size: unit,
            total_items: total,
        };
        let tracker = ProgressTracker::new(store, &config);
        tracker.register_group("chan-g1").unwrap();
        tracker
    }

    #[test]
    fn test_unlock_then_already_unlocked() {
        let t = tracker(24, 8);
        match t.unlock_unit("chan-g1", 1).unwrap() {
            UnlockOutcome::Unlocked { items } => {
                let idx: Vec<u32> = items.iter().map(|i| i.index).collect();
                assert_eq!(idx, (9..=16).collect::<Vec<_>>());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(t.unlock_unit("chan-g1", 1).unwrap(), UnlockOutcome::AlreadyUnlocked);

        // cells outside unit 1 untouched
        let snapshot = t.list_unlocked("chan-g1").unwrap();
        let cells = snapshot.cells();
        assert!(cells[..8].iter().all(|c| *c == CellState::Locked));
        assert!(cells[8..16].iter().all(|c| *c == CellState::Unlocked));
        assert!(cells[16..].iter().all(|c| *c == CellState::Locked));
    }

    #[test]
    fn test_unknown_group_and_bad_unit() {
        let t = tracker(16, 8);
        assert_eq!(t.unlock_unit("nope", 0).unwrap(), UnlockOutcome::NoSuchGroup);
        assert!(matches!(t.unlock_unit("chan-g1", 2), Err(StickyError::InvalidArgument(_))));
        assert!(matches!(t.unlock_unit("chan-g1", usize::MAX), Err(StickyError::InvalidArgument(_))));
        assert!(matches!(t.list_unlocked("nope"), Err(StickyError::NotFound(_))));
    }

    #[test]
    fn test_short_last_unit() {
        let t = tracker(20, 8);
        assert_eq!(t.unit_count(), 3);
        match t.unlock_unit("chan-g1", 2).unwrap() {
            UnlockOutcome::Unlocked { items } => assert_eq!(items.len(), 4),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_list_unlocked_is_ordered_and_restartable() {
        let t = tracker(24, 8);
        t.unlock_unit("chan-g1", 2).unwrap();
        t.unlock_unit("chan-g1", 0).unwrap();

        let unlocked = t.list_unlocked("chan-g1").unwrap();
        let first: Vec<u32> = unlocked.iter().map(|i| i.index).collect();
        let expected: Vec<u32> = (1..=8).chain(17..=24).collect();
        assert_eq!(first, expected);

        let again: Vec<u32> = (&unlocked).into_iter().map(|i| i.index).collect();
        assert_eq!(again, first);
        assert_eq!(unlocked.iter().take(2).count(), 2);
    }

    #[test]
    fn test_unlocks_from_two_connections_are_not_lost() {
        use std::sync::Barrier;
        use std::thread;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sticky.db");
        let config = ProgressConfig {
            unit_size: 8,
            total_items: 32,
        };
        let groups: Vec<String> = (0..50).map(|g| format!("chan-{g}")).collect();

        let setup = ProgressTracker::new(Arc::new(StateStore::open(&path).unwrap()), &config);
        for g in &groups {
            setup.register_group(g).unwrap();
        }

        // one connection per worker, like two CLI processes
        let barrier = Arc::new(Barrier::new(2));
        let workers: Vec<_> = [0usize, 1]
            .into_iter()
            .map(|parity| {
                let store = Arc::new(StateStore::open(&path).unwrap());
                let tracker = ProgressTracker::new(store, &config);
                let groups = groups.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    let mut unlocked = 0;
                    for g in &groups {
                        for unit in (parity..4).step_by(2) {
                            if matches!(
                                tracker.unlock_unit(g, unit).unwrap(),
                                UnlockOutcome::Unlocked { .. }
                            ) {
                                unlocked += 1;
                            }
                        }
                    }
                    unlocked
                })
            })
            .collect();
        let reported: usize = workers.into_iter().map(|w| w.join().unwrap()).sum();
        assert_eq!(reported, groups.len() * 4);

        for g in &groups {
            let cells = setup.list_unlocked(g).unwrap();
            assert!(
                cells.cells().iter().all(|c| *c == CellState::Unlocked),
                "lost unlock in {g}"
            );
        }
    }

    #[test]
    fn test_register_keeps_progress() {
        let t = tracker(16, 8);
        t.unlock_unit("chan-g1", 0).unwrap();
        assert!(!t.register_group("chan-g1").unwrap());
        assert_eq!(t.list_unlocked("chan-g1").unwrap().iter().count(), 8);
    }
}
