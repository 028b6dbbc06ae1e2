use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use super::traits::{same_allocation, SharedFunction};
use crate::fader::FaderHandle;
use crate::universe::UniverseArray;

#[derive(Default)]
struct FunctionLists {
    active: Vec<SharedFunction>,
    start_queue: Vec<SharedFunction>,
}

impl FunctionLists {
    fn position_active(&self, function: &SharedFunction) -> Option<usize> {
        self.active.iter().position(|f| same_allocation(f, function))
    }

    fn is_queued(&self, function: &SharedFunction) -> bool {
        self.start_queue.iter().any(|f| same_allocation(f, function))
    }
}

/// Active functions plus the queue of functions waiting to start.
///
/// Both lists live behind one lock. The lock is only held while the lists are
/// mutated or snapshotted, never while a function runs.
#[derive(Default)]
pub struct FunctionRegistry {
    lists: Mutex<FunctionLists>,
    stop_all: AtomicBool,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a function to start on the next tick. No-op if it is already
    /// running or waiting to start.
    pub fn start_function(&self, function: SharedFunction) {
        let mut lists = self.lists.lock();
        if lists.position_active(&function).is_some() || lists.is_queued(&function) {
            // Function locks are never taken under the registry lock
            log::debug!("Ignoring start request for a function already running or queued");
            return;
        }
        lists.start_queue.push(function);
    }

    /// Request that every function stops at the next tick boundary
    pub fn stop_all_functions(&self) {
        self.stop_all.store(true, Ordering::Release);
    }

    pub fn stop_all_requested(&self) -> bool {
        self.stop_all.load(Ordering::Acquire)
    }

    pub fn running_functions(&self) -> usize {
        self.lists.lock().active.len()
    }

    pub fn queued_functions(&self) -> usize {
        self.lists.lock().start_queue.len()
    }

    pub fn is_active(&self, function: &SharedFunction) -> bool {
        self.lists.lock().position_active(function).is_some()
    }

    pub fn is_queued(&self, function: &SharedFunction) -> bool {
        self.lists.lock().is_queued(function)
    }

    /// Honour a pending stop-all request and promote queued starts.
    /// Returns true when the active set changed.
    pub(crate) fn begin_tick(&self, fader: &FaderHandle, universes: &mut UniverseArray) -> bool {
        let mut changed = false;

        if self.stop_all.swap(false, Ordering::AcqRel) {
            changed |= self.sweep(fader, universes);
        }

        let promoted = {
            let mut lists = self.lists.lock();
            let promoted: Vec<SharedFunction> = lists.start_queue.drain(..).collect();
            lists.active.extend(promoted.iter().cloned());
            promoted
        };

        for function in &promoted {
            let mut function = function.lock();
            log::debug!("Starting function '{}'", function.name());
            function.pre_run();
        }

        changed | !promoted.is_empty()
    }

    /// Write every active function once and remove the ones that finished.
    /// Returns true when the active set changed.
    pub(crate) fn run_tick(&self, fader: &FaderHandle, universes: &mut UniverseArray) -> bool {
        let snapshot: Vec<SharedFunction> = self.lists.lock().active.clone();

        let mut finished = Vec::new();
        for function in snapshot {
            let status = function.lock().write(universes);
            if status.is_finished() {
                finished.push(function);
            }
        }

        if finished.is_empty() {
            return false;
        }

        {
            let mut lists = self.lists.lock();
            for function in &finished {
                if let Some(index) = lists.position_active(function) {
                    lists.active.remove(index);
                }
            }
        }

        for function in &finished {
            let mut function = function.lock();
            log::debug!("Function '{}' finished", function.name());
            function.post_run(fader, universes);
        }
        true
    }

    /// Stop and remove every active function and clear the start queue.
    /// Returns true when anything was removed.
    pub(crate) fn sweep(&self, fader: &FaderHandle, universes: &mut UniverseArray) -> bool {
        let (stopped, dropped) = {
            let mut lists = self.lists.lock();
            let dropped = lists.start_queue.len();
            lists.start_queue.clear();
            (std::mem::take(&mut lists.active), dropped)
        };

        if dropped > 0 {
            log::debug!("Discarded {} queued function start(s)", dropped);
        }

        for function in &stopped {
            let mut function = function.lock();
            function.stop();
            function.post_run(fader, universes);
        }

        if !stopped.is_empty() {
            log::info!("Stopped {} running function(s)", stopped.len());
        }
        !stopped.is_empty()
    }
}
