use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Ids of jobs currently being handled.
///
/// Membership is held by an [`InFlightGuard`]; dropping the guard removes
/// the id, so an id cannot outlive its handler whether the handler
/// returns, fails or panics.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    ids: Arc<Mutex<HashSet<String>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        // The set stays consistent even if a holder panicked mid-insert
        match self.ids.lock() {
            Ok(ids) => ids,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Claim `id`, or `None` if it is already in flight
    pub fn try_claim(&self, id: &str) -> Option<InFlightGuard> {
        if self.lock().insert(id.to_string()) {
            Some(InFlightGuard {
                id: id.to_string(),
                set: self.clone(),
            })
        } else {
            None
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
pub struct InFlightGuard {
    id: String,
    set: InFlight,
}

impl InFlightGuard {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.lock().remove(&self.id);
    }
}
