//! Render Slot Allocation
//!
//! Maps participant ids onto a small fixed set of render slots. Assignment
//! is sticky (an id keeps its slot until released) and injective (no two
//! slots share an occupant). Slot 0 is reserved for the local participant
//! and is never handed to a remote id.
//!
//! All mutation happens inside a single critical section, so two producers
//! racing to assign the same id observe one consistent outcome.

use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Index of the slot reserved for the local participant
pub const LOCAL_SLOT: usize = 0;

#[derive(Debug)]
struct SlotTable {
    /// Occupant id per slot; index 0 is the reserved local slot
    occupants: Vec<Option<String>>,
}

impl SlotTable {
    fn new(count: usize) -> Self {
        Self {
            occupants: vec![None; count],
        }
    }

    fn assign(&mut self, id: &str) -> Option<usize> {
        // Sticky: an id that already holds a slot keeps it
        if let Some(index) = self.find(id) {
            return Some(index);
        }

        for (index, occupant) in self.occupants.iter_mut().enumerate().skip(1) {
            if occupant.is_none() {
                *occupant = Some(id.to_string());
                return Some(index);
            }
        }

        None
    }

    fn release(&mut self, id: &str) -> Option<usize> {
        let index = self.find(id)?;
        self.occupants[index] = None;
        Some(index)
    }

    fn find(&self, id: &str) -> Option<usize> {
        self.occupants
            .iter()
            .position(|o| o.as_deref() == Some(id))
    }
}

/// Thread-safe, cheaply cloneable slot allocator
///
/// Shared between the coordinator (assignment on roster changes) and the
/// dispatch consumer (read-only lookups on delivery).
#[derive(Debug, Clone)]
pub struct SlotAllocator {
    inner: Arc<Mutex<SlotTable>>,
}

impl SlotAllocator {
    /// Create an allocator with `count` slots, including the local slot 0
    pub fn new(count: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SlotTable::new(count))),
        }
    }

    /// Assign a slot to `id`, or return the slot it already occupies.
    ///
    /// Returns `None` when every non-reserved slot is taken; the caller
    /// must not render this participant. Capacity exhaustion is a normal
    /// condition, not an error.
    pub fn assign(&self, id: &str) -> Option<usize> {
        let mut table = self.inner.lock().expect("slot table lock poisoned");
        match table.assign(id) {
            Some(index) => {
                debug!("Slot {} assigned to {}", index, id);
                Some(index)
            }
            None => {
                warn!("No free render slot for {}", id);
                None
            }
        }
    }

    /// Release the slot held by `id`, if any. Idempotent.
    ///
    /// Returns the freed slot index so the caller can emit a cleared
    /// assignment for it.
    pub fn release(&self, id: &str) -> Option<usize> {
        let mut table = self.inner.lock().expect("slot table lock poisoned");
        let freed = table.release(id);
        if let Some(index) = freed {
            info!("Slot {} released by {}", index, id);
        }
        freed
    }

    /// Read-only lookup of the slot held by `id`
    pub fn query(&self, id: &str) -> Option<usize> {
        let table = self.inner.lock().expect("slot table lock poisoned");
        table.find(id)
    }

    /// The reserved slot for the local participant
    pub fn local_slot(&self) -> usize {
        LOCAL_SLOT
    }

    /// Total slot count, including the reserved local slot
    pub fn capacity(&self) -> usize {
        let table = self.inner.lock().expect("slot table lock poisoned");
        table.occupants.len()
    }

    /// Number of occupied non-reserved slots
    pub fn occupied_count(&self) -> usize {
        let table = self.inner.lock().expect("slot table lock poisoned");
        table.occupants.iter().skip(1).flatten().count()
    }

    /// Snapshot of current assignments as `(slot, id)` pairs
    pub fn assignments(&self) -> Vec<(usize, String)> {
        let table = self.inner.lock().expect("slot table lock poisoned");
        table
            .occupants
            .iter()
            .enumerate()
            .filter_map(|(i, o)| o.as_ref().map(|id| (i, id.clone())))
            .collect()
    }

    /// Release every slot (session teardown)
    pub fn clear(&self) {
        let mut table = self.inner.lock().expect("slot table lock poisoned");
        for occupant in table.occupants.iter_mut() {
            *occupant = None;
        }
        debug!("Slot table cleared");
    }
}
