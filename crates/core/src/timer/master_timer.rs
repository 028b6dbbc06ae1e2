use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use tokio::sync::{broadcast, oneshot};
use tokio::time::{interval, MissedTickBehavior};

use super::dmx_source_registry::DmxSourceRegistry;
use super::fade_out::{FadeOutController, FadeProgress};
use super::function_registry::FunctionRegistry;
use super::traits::{SharedDmxSource, SharedFunction};
use crate::error::EngineError;
use crate::fader::FaderHandle;
use crate::messages::{EngineSettings, TimerEvent};
use crate::output::OutputMap;

const MIN_FREQUENCY: u32 = 1;
const MAX_FREQUENCY: u32 = 1000;

/// State shared between the control surface and the tick thread
struct TimerShared {
    output: Arc<OutputMap>,
    functions: FunctionRegistry,
    dmx_sources: DmxSourceRegistry,
    fade_out: FadeOutController,
    fader: FaderHandle,
    events: broadcast::Sender<TimerEvent>,
    frequency: u32,
    tick_ms: u32,
    ticks: AtomicU64,
    // Serializes ticks even if a stopped thread is still finishing its last one
    tick_lock: Mutex<()>,
}

impl TimerShared {
    fn timer_tick(&self) {
        let _serial = self.tick_lock.lock();
        let mut universes = self.output.claim_universes();
        universes.zero_intensity_channels();

        let mut list_changed = self.functions.begin_tick(&self.fader, &mut universes);
        list_changed |= self.functions.run_tick(&self.fader, &mut universes);

        self.dmx_sources.run_tick(&mut universes);

        self.fader.write(&mut universes, self.tick_ms);

        let grand_master = self.output.grand_master();
        let fade_completed = match self.fade_out.advance(self.tick_ms, grand_master) {
            FadeProgress::Completed { saved_grand_master } => {
                list_changed |= self.functions.sweep(&self.fader, &mut universes);
                // The grand master is already restored, so the swept functions
                // would otherwise go out at full level in this frame
                universes.zero_intensity_channels();
                log::info!(
                    "Fade-out sequence completed, grand master restored to {}",
                    saved_grand_master
                );
                true
            }
            FadeProgress::Fading { remaining_ms } => {
                log::trace!("Fade-out: {} ms remaining", remaining_ms);
                false
            }
            FadeProgress::Idle => false,
        };

        self.output.dump_universes(&universes);
        drop(universes);

        let tick = self.ticks.fetch_add(1, Ordering::AcqRel) + 1;
        log::trace!("Tick {} complete", tick);

        // A send error only means nobody is subscribed
        if list_changed {
            let running = self.functions.running_functions();
            let _ = self.events.send(TimerEvent::FunctionListChanged { running });
        }
        if fade_completed {
            let _ = self.events.send(TimerEvent::FadeSequenceCompleted);
        }
    }
}

struct TickThread {
    handle: thread::JoinHandle<()>,
    shutdown: oneshot::Sender<()>,
}

/// Runs functions, DMX sources and the fader at a fixed frequency and hands the
/// resulting buffer to the output map once per tick.
///
/// Every method takes `&self`, so the timer can be shared across threads in an
/// `Arc` and driven from UI or control-protocol threads while it runs.
pub struct MasterTimer {
    shared: Arc<TimerShared>,
    thread: Mutex<Option<TickThread>>,
    // Held across a whole start or stop, join included
    lifecycle: Mutex<()>,
    tick_thread_id: Mutex<Option<ThreadId>>,
}

impl MasterTimer {
    pub fn new(output: Arc<OutputMap>, settings: &EngineSettings) -> Self {
        let frequency = settings.frequency_hz.clamp(MIN_FREQUENCY, MAX_FREQUENCY);
        if frequency != settings.frequency_hz {
            log::warn!(
                "Timer frequency {} Hz out of range, using {} Hz",
                settings.frequency_hz,
                frequency
            );
        }

        let (events, _) = broadcast::channel(settings.event_capacity.max(1));

        Self {
            shared: Arc::new(TimerShared {
                output,
                functions: FunctionRegistry::new(),
                dmx_sources: DmxSourceRegistry::new(),
                fade_out: FadeOutController::new(),
                fader: FaderHandle::new(),
                events,
                frequency,
                tick_ms: 1000 / frequency,
                ticks: AtomicU64::new(0),
                tick_lock: Mutex::new(()),
            }),
            thread: Mutex::new(None),
            lifecycle: Mutex::new(()),
            tick_thread_id: Mutex::new(None),
        }
    }

    fn on_tick_thread(&self) -> bool {
        *self.tick_thread_id.lock() == Some(thread::current().id())
    }

    /// Serialize start and stop. From the tick thread the lock is only tried,
    /// since its holder may be joining that very thread.
    fn lifecycle_guard(&self) -> Option<MutexGuard<'_, ()>> {
        if self.on_tick_thread() {
            self.lifecycle.try_lock()
        } else {
            Some(self.lifecycle.lock())
        }
    }

    /// Start ticking on a dedicated thread. Does nothing if already running.
    pub fn start(&self) -> Result<(), EngineError> {
        let Some(_lifecycle) = self.lifecycle_guard() else {
            log::debug!("Master timer is being stopped, not starting from its own tick");
            return Ok(());
        };

        let mut thread_slot = self.thread.lock();
        if thread_slot.is_some() {
            log::debug!("Master timer already running");
            return Ok(());
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(EngineError::Runtime)?;

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let shared = Arc::clone(&self.shared);
        let period = Duration::from_secs_f64(1.0 / shared.frequency as f64);

        let handle = thread::Builder::new()
            .name("master-timer".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    let mut ticker = interval(period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                    loop {
                        tokio::select! {
                            biased;
                            // Fires on an explicit stop or when the timer is dropped
                            _ = &mut shutdown_rx => break,
                            _ = ticker.tick() => shared.timer_tick(),
                        }
                    }
                });
            })
            .map_err(EngineError::ThreadSpawn)?;

        *self.tick_thread_id.lock() = Some(handle.thread().id());
        *thread_slot = Some(TickThread {
            handle,
            shutdown: shutdown_tx,
        });
        drop(thread_slot);

        log::info!(
            "Master timer started at {} Hz ({} ms per tick)",
            self.shared.frequency,
            self.shared.tick_ms
        );
        let _ = self.shared.events.send(TimerEvent::Started {
            frequency: self.shared.frequency,
        });
        Ok(())
    }

    /// Stop ticking. Blocks until the tick in flight, if any, has completed.
    ///
    /// A concurrent `start()` waits for the stop to finish, so `Started` and
    /// `Stopped` events always alternate.
    pub fn stop(&self) {
        let Some(_lifecycle) = self.lifecycle_guard() else {
            log::debug!("Master timer is already being stopped");
            return;
        };

        let Some(tick_thread) = self.thread.lock().take() else {
            return;
        };

        let _ = tick_thread.shutdown.send(());

        if tick_thread.handle.thread().id() == thread::current().id() {
            log::warn!("Master timer stopped from its own tick; the current tick will finish");
            return;
        }

        if tick_thread.handle.join().is_err() {
            log::error!("Master timer thread panicked");
        }
        *self.tick_thread_id.lock() = None;

        let ticks = self.ticks();
        log::info!("Master timer stopped after {} ticks", ticks);
        let _ = self.shared.events.send(TimerEvent::Stopped { ticks });
    }

    pub fn is_running(&self) -> bool {
        self.thread.lock().is_some()
    }

    /// Tick frequency in Hz
    pub fn frequency(&self) -> u32 {
        self.shared.frequency
    }

    /// Length of one tick in milliseconds
    pub fn tick(&self) -> u32 {
        self.shared.tick_ms
    }

    /// Number of ticks completed since construction
    pub fn ticks(&self) -> u64 {
        self.shared.ticks.load(Ordering::Acquire)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.shared.events.subscribe()
    }

    pub fn output(&self) -> &Arc<OutputMap> {
        &self.shared.output
    }

    // Functions

    /// Queue a function to start on the next tick
    pub fn start_function(&self, function: SharedFunction) {
        self.shared.functions.start_function(function);
    }

    /// Stop every running function at the next tick. DMX sources keep running.
    pub fn stop_all_functions(&self) {
        self.shared.functions.stop_all_functions();
    }

    /// Fade the grand master down over `timeout_ms`, then stop every function
    /// and restore the grand master. A timeout of zero or less stops at once.
    ///
    /// The frame sent on completion has all intensity channels at zero, DMX
    /// source and fader output included; they are back from the next tick on.
    pub fn fade_and_stop_all(&self, timeout_ms: i32) {
        let grand_master = self.shared.output.grand_master();

        if timeout_ms <= 0 {
            if let Some(saved) = self.shared.fade_out.cancel() {
                grand_master.set_value(saved);
            }
            self.stop_all_functions();
            return;
        }

        log::info!("Fading out all functions over {} ms", timeout_ms);
        self.shared.fade_out.begin(timeout_ms as u32, grand_master);
    }

    pub fn is_fading(&self) -> bool {
        self.shared.fade_out.is_fading()
    }

    pub fn running_functions(&self) -> usize {
        self.shared.functions.running_functions()
    }

    pub fn is_function_running(&self, function: &SharedFunction) -> bool {
        self.shared.functions.is_active(function)
    }

    // DMX sources

    pub fn register_dmx_source(&self, source: SharedDmxSource) {
        self.shared.dmx_sources.register(source);
    }

    pub fn unregister_dmx_source(&self, source: &SharedDmxSource) {
        self.shared.dmx_sources.unregister(source);
    }

    pub fn registered_dmx_sources(&self) -> usize {
        self.shared.dmx_sources.len()
    }

    pub fn is_dmx_source_registered(&self, source: &SharedDmxSource) -> bool {
        self.shared.dmx_sources.is_registered(source)
    }

    // Fader

    /// The fader functions can use to release intensity channels gracefully
    pub fn fader(&self) -> &FaderHandle {
        &self.shared.fader
    }

    #[cfg(test)]
    fn timer_tick(&self) {
        self.shared.timer_tick();
    }
}

impl Drop for MasterTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
