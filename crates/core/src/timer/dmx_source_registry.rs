use parking_lot::Mutex;

use super::traits::{same_allocation, SharedDmxSource};
use crate::universe::UniverseArray;

/// Registered DMX sources, written once per tick in registration order.
///
/// When the function registry lock is also needed it must be taken first.
#[derive(Default)]
pub struct DmxSourceRegistry {
    sources: Mutex<Vec<SharedDmxSource>>,
}

impl DmxSourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source. Registering the same source twice is a no-op.
    pub fn register(&self, source: SharedDmxSource) -> bool {
        let mut sources = self.sources.lock();
        if sources.iter().any(|s| same_allocation(s, &source)) {
            log::debug!("Ignoring duplicate DMX source registration");
            return false;
        }
        sources.push(source);
        true
    }

    /// Unregister a source. Unknown sources are ignored.
    pub fn unregister(&self, source: &SharedDmxSource) -> bool {
        let mut sources = self.sources.lock();
        match sources.iter().position(|s| same_allocation(s, source)) {
            Some(index) => {
                sources.remove(index);
                true
            }
            None => {
                log::debug!("Ignoring unregistration of unknown DMX source");
                false
            }
        }
    }

    pub fn is_registered(&self, source: &SharedDmxSource) -> bool {
        self.sources.lock().iter().any(|s| same_allocation(s, source))
    }

    pub fn len(&self) -> usize {
        self.sources.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.lock().is_empty()
    }

    /// Write every source from a snapshot taken under the lock
    pub(crate) fn run_tick(&self, universes: &mut UniverseArray) {
        let snapshot: Vec<SharedDmxSource> = self.sources.lock().clone();
        for source in snapshot {
            source.lock().write_dmx(universes);
        }
    }
}
