use serde::{Deserialize, Serialize};

use crate::universe::{GrandMasterChannelMode, GrandMasterValueMode};

/// Events published by the master timer to any number of observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    /// The tick thread started
    Started { frequency: u32 },
    /// The tick thread stopped after running `ticks` ticks in total
    Stopped { ticks: u64 },
    /// The set of running functions changed during a tick (at most once per tick)
    FunctionListChanged { running: usize },
    /// A fade-and-stop sequence ran to completion
    FadeSequenceCompleted,
}

/// Engine settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineSettings {
    // Timing
    pub frequency_hz: u32,

    // Output
    pub universes: usize,
    pub grand_master_channel_mode: GrandMasterChannelMode,
    pub grand_master_value_mode: GrandMasterValueMode,

    // Control surface
    pub default_fade_out_ms: u32,
    pub event_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            frequency_hz: 50,
            universes: 4,
            grand_master_channel_mode: GrandMasterChannelMode::Intensity,
            grand_master_value_mode: GrandMasterValueMode::Reduce,
            default_fade_out_ms: 1000,
            event_capacity: 64,
        }
    }
}
