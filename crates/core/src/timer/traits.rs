use std::sync::Arc;

use parking_lot::Mutex;

use crate::fader::FaderHandle;
use crate::universe::UniverseArray;

/// Outcome of a function's tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionStatus {
    Running,
    Finished,
}

impl FunctionStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, FunctionStatus::Finished)
    }
}

/// A lighting effect driven by the master timer.
///
/// `write` is called exactly once per tick while the function is active and must
/// not block. Identity is the identity of the shared allocation, so the same
/// [`SharedFunction`] can only be running once.
pub trait Function: Send {
    /// Human readable name used in log messages
    fn name(&self) -> &str;

    /// Called once when the function is promoted from the start queue
    fn pre_run(&mut self) {}

    /// Apply one tick worth of change to the buffer
    fn write(&mut self, universes: &mut UniverseArray) -> FunctionStatus;

    /// Called when the function is removed by a stop-all sweep
    fn stop(&mut self) {}

    /// Called once when the function leaves the active set, for whatever reason.
    /// Intensity channels can be handed to the fader here for a soft release.
    fn post_run(&mut self, _fader: &FaderHandle, _universes: &mut UniverseArray) {}
}

/// Directly controlled producer of channel values (sliders, remote inputs)
pub trait DmxSource: Send {
    fn name(&self) -> &str;

    /// Write this tick's values. Called once per tick while registered.
    fn write_dmx(&mut self, universes: &mut UniverseArray);
}

pub type SharedFunction = Arc<Mutex<dyn Function>>;
pub type SharedDmxSource = Arc<Mutex<dyn DmxSource>>;

/// Wrap a function so it can be handed to the master timer
pub fn shared_function<F: Function + 'static>(function: F) -> SharedFunction {
    Arc::new(Mutex::new(function))
}

/// Wrap a DMX source so it can be registered with the master timer
pub fn shared_dmx_source<S: DmxSource + 'static>(source: S) -> SharedDmxSource {
    Arc::new(Mutex::new(source))
}

/// Pointer identity of two shared allocations, ignoring vtable metadata
pub(crate) fn same_allocation<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}
