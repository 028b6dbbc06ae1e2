use parking_lot::{Mutex, MutexGuard};

use crate::universe::{GrandMaster, UniverseArray, UNIVERSE_SIZE};

/// Destination for finalized DMX frames (Art-Net, USB interfaces, test recorders).
pub trait OutputSink: Send {
    /// Short name used in log messages
    fn name(&self) -> &str;

    /// Transmit one universe worth of post grand master channel data
    fn send(&mut self, universe: usize, data: &[u8]) -> anyhow::Result<()>;
}

/// Owns the channel buffer, the grand master and the output sinks.
///
/// The master timer claims the buffer once per tick and dumps it back here when
/// the tick's pipeline is complete.
pub struct OutputMap {
    universes: Mutex<UniverseArray>,
    grand_master: GrandMaster,
    sinks: Mutex<Vec<Box<dyn OutputSink>>>,
    // Last dumped post grand master frames, readable without the buffer lock
    frames: Mutex<Vec<Vec<u8>>>,
    universe_count: usize,
}

impl OutputMap {
    pub fn new(universe_count: usize, grand_master: GrandMaster) -> Self {
        Self {
            universes: Mutex::new(UniverseArray::new(universe_count)),
            grand_master,
            sinks: Mutex::new(Vec::new()),
            frames: Mutex::new(vec![vec![0; UNIVERSE_SIZE]; universe_count]),
            universe_count,
        }
    }

    pub fn universe_count(&self) -> usize {
        self.universe_count
    }

    pub fn grand_master(&self) -> &GrandMaster {
        &self.grand_master
    }

    pub fn add_sink(&self, sink: Box<dyn OutputSink>) {
        log::info!("Adding output sink '{}'", sink.name());
        self.sinks.lock().push(sink);
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.lock().len()
    }

    /// Lock the channel buffer. Held by the master timer for one whole tick.
    pub fn claim_universes(&self) -> MutexGuard<'_, UniverseArray> {
        self.universes.lock()
    }

    /// Apply the grand master to every universe and hand the frames to the sinks.
    /// Delivery failures are logged and never retried.
    pub fn dump_universes(&self, universes: &UniverseArray) {
        let mut sinks = self.sinks.lock();
        let mut frames = self.frames.lock();

        for (index, frame) in frames.iter_mut().enumerate() {
            let (Some(values), Some(groups)) =
                (universes.universe(index), universes.universe_groups(index))
            else {
                continue;
            };

            for ((out, value), group) in frame.iter_mut().zip(values).zip(groups) {
                *out = self.grand_master.apply(*value, *group);
            }

            for sink in sinks.iter_mut() {
                if let Err(e) = sink.send(index, frame.as_slice()) {
                    log::warn!(
                        "Output sink '{}' failed to send universe {}: {}",
                        sink.name(),
                        index,
                        e
                    );
                }
            }
        }
    }

    /// Copy of the last frame dumped for a universe, as the sinks received it.
    /// Does not wait for a tick in progress.
    pub fn output_frame(&self, index: usize) -> Option<Vec<u8>> {
        self.frames.lock().get(index).cloned()
    }
}

impl Default for OutputMap {
    fn default() -> Self {
        Self::new(4, GrandMaster::default())
    }
}
