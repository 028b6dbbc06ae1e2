use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

use super::universe_array::ChannelGroup;

/// Which channels the grand master attenuates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrandMasterChannelMode {
    /// Only channels written as intensity
    Intensity,
    /// Every channel
    AllChannels,
}

impl Default for GrandMasterChannelMode {
    fn default() -> Self {
        GrandMasterChannelMode::Intensity
    }
}

/// How the grand master value is applied to a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrandMasterValueMode {
    /// Scale proportionally: `value * gm / 255`
    Reduce,
    /// Clamp to the grand master: `min(value, gm)`
    Limit,
}

impl Default for GrandMasterValueMode {
    fn default() -> Self {
        GrandMasterValueMode::Reduce
    }
}

/// Global output attenuation.
///
/// The value lives in an atomic so the control surface and the tick thread can
/// read and set it without taking the buffer lock.
#[derive(Debug)]
pub struct GrandMaster {
    value: AtomicU8,
    channel_mode: GrandMasterChannelMode,
    value_mode: GrandMasterValueMode,
}

impl GrandMaster {
    pub fn new(channel_mode: GrandMasterChannelMode, value_mode: GrandMasterValueMode) -> Self {
        Self {
            value: AtomicU8::new(u8::MAX),
            channel_mode,
            value_mode,
        }
    }

    pub fn value(&self) -> u8 {
        self.value.load(Ordering::Acquire)
    }

    pub fn set_value(&self, value: u8) {
        self.value.store(value, Ordering::Release);
    }

    /// Grand master as a fraction between 0.0 and 1.0
    pub fn fraction(&self) -> f64 {
        self.value() as f64 / u8::MAX as f64
    }

    pub fn channel_mode(&self) -> GrandMasterChannelMode {
        self.channel_mode
    }

    pub fn value_mode(&self) -> GrandMasterValueMode {
        self.value_mode
    }

    /// Compute the output value of a channel after grand master attenuation
    pub fn apply(&self, value: u8, group: ChannelGroup) -> u8 {
        let affected = match self.channel_mode {
            GrandMasterChannelMode::AllChannels => true,
            GrandMasterChannelMode::Intensity => group == ChannelGroup::Intensity,
        };
        if !affected {
            return value;
        }

        let gm = self.value();
        match self.value_mode {
            GrandMasterValueMode::Reduce => ((value as u16 * gm as u16) / u8::MAX as u16) as u8,
            GrandMasterValueMode::Limit => value.min(gm),
        }
    }
}

impl Default for GrandMaster {
    fn default() -> Self {
        Self::new(
            GrandMasterChannelMode::default(),
            GrandMasterValueMode::default(),
        )
    }
}
