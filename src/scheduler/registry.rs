//! In-flight LBA range registry
//!
//! When LBA-sync is enabled every committed action is recorded here until the
//! worker that owns it completes or abandons it. The scheduler consults the
//! registry before handing out a range so that a writer never shares blocks
//! with any other in-flight action, while readers may share with readers.
//!
//! Capacity equals the worker count: each worker owns at most one entry at a
//! time. Breaking that (or removing an entry that was never added) means the
//! scheduler/worker pairing is broken, so `add` and `remove` abort the
//! process instead of letting the run continue on corrupted bookkeeping.

use super::action::{Action, Operation};
use thiserror::Error;

/// Bookkeeping violations detected by the registry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("attempt to add more in-flight entries than the {capacity} allowed")]
    Full { capacity: usize },

    #[error("attempt to remove lba {lba} from an empty in-flight list")]
    Empty { lba: u64 },

    #[error("lba {lba} is not in the in-flight list")]
    Missing { lba: u64 },
}

/// Bounded, insertion-ordered list of in-flight actions
#[derive(Debug, Clone)]
pub struct LbaLockRegistry {
    entries: Vec<Action>,
    capacity: usize,
}

impl LbaLockRegistry {
    /// Create a registry holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Whether `target` conflicts with anything in flight
    ///
    /// Writers (and any non-transfer request) conflict with every overlapping
    /// entry. Readers conflict only with overlapping writers.
    pub fn in_use(&self, target: &Action) -> bool {
        self.entries
            .iter()
            .filter(|entry| target.overlaps(entry))
            .any(|entry| match target.op {
                Operation::Reader => entry.op == Operation::Writer,
                _ => true,
            })
    }

    /// Record an in-flight action
    pub fn try_add(&mut self, target: Action) -> Result<(), RegistryError> {
        if self.entries.len() >= self.capacity {
            return Err(RegistryError::Full {
                capacity: self.capacity,
            });
        }
        self.entries.push(target);
        Ok(())
    }

    /// Release an in-flight action, keeping the order of the others
    ///
    /// An exact match is preferred; otherwise the first entry with the same
    /// start LBA is released.
    pub fn try_remove(&mut self, target: &Action) -> Result<Action, RegistryError> {
        if self.entries.is_empty() {
            return Err(RegistryError::Empty { lba: target.lba });
        }
        let index = self
            .entries
            .iter()
            .position(|entry| entry == target)
            .or_else(|| self.entries.iter().position(|entry| entry.lba == target.lba))
            .ok_or(RegistryError::Missing { lba: target.lba })?;
        Ok(self.entries.remove(index))
    }

    /// Record an in-flight action, aborting on overflow
    pub fn add(&mut self, target: Action) {
        if let Err(err) = self.try_add(target) {
            invariant_violation(&err);
        }
    }

    /// Release an in-flight action, aborting if it is not present
    pub fn remove(&mut self, target: &Action) {
        if let Err(err) = self.try_remove(target) {
            invariant_violation(&err);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn entries(&self) -> &[Action] {
        &self.entries
    }
}

/// Terminate on a scheduler bookkeeping bug
fn invariant_violation(err: &RegistryError) -> ! {
    log::error!("LBA lock registry invariant violated, code bug: {}", err);
    eprintln!("LBA lock registry invariant violated, code bug: {}", err);
    std::process::abort();
}
