use serde::{Deserialize, Serialize};

/// Number of channels in a single DMX universe
pub const UNIVERSE_SIZE: usize = 512;

/// How a channel merges with other writers during a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelGroup {
    /// Highest takes precedence, scaled by the grand master
    Intensity,
    /// Latest takes precedence
    Other,
}

impl Default for ChannelGroup {
    fn default() -> Self {
        ChannelGroup::Other
    }
}

/// Flat channel buffer covering every universe.
///
/// Addresses are absolute: `universe * UNIVERSE_SIZE + channel`. The buffer is
/// owned by the [`OutputMap`](crate::OutputMap) and lent to the master timer for
/// the duration of one tick.
#[derive(Debug, Clone)]
pub struct UniverseArray {
    values: Vec<u8>,
    groups: Vec<ChannelGroup>,
    universes: usize,
}

impl UniverseArray {
    pub fn new(universes: usize) -> Self {
        let size = universes * UNIVERSE_SIZE;
        Self {
            values: vec![0; size],
            groups: vec![ChannelGroup::Other; size],
            universes,
        }
    }

    /// Number of universes in the buffer
    pub fn universes(&self) -> usize {
        self.universes
    }

    /// Total number of channels across all universes
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Write a channel value. Intensity channels merge HTP, everything else LTP.
    /// Returns false when the address is outside the buffer.
    pub fn write(&mut self, address: u32, value: u8, group: ChannelGroup) -> bool {
        let index = address as usize;
        if index >= self.values.len() {
            log::trace!("Ignoring write to out-of-range address {}", address);
            return false;
        }

        match group {
            ChannelGroup::Intensity => {
                self.values[index] = self.values[index].max(value);
            }
            ChannelGroup::Other => {
                self.values[index] = value;
            }
        }
        self.groups[index] = group;
        true
    }

    /// Current (pre grand master) value of a channel
    pub fn value(&self, address: u32) -> Option<u8> {
        self.values.get(address as usize).copied()
    }

    /// Group the channel was last written with
    pub fn group(&self, address: u32) -> Option<ChannelGroup> {
        self.groups.get(address as usize).copied()
    }

    /// Raw values of a single universe
    pub fn universe(&self, index: usize) -> Option<&[u8]> {
        let start = index.checked_mul(UNIVERSE_SIZE)?;
        self.values.get(start..start + UNIVERSE_SIZE)
    }

    /// Channel groups of a single universe, parallel to [`UniverseArray::universe`]
    pub fn universe_groups(&self, index: usize) -> Option<&[ChannelGroup]> {
        let start = index.checked_mul(UNIVERSE_SIZE)?;
        self.groups.get(start..start + UNIVERSE_SIZE)
    }

    /// Zero every intensity channel so that HTP merging starts from scratch
    pub fn zero_intensity_channels(&mut self) {
        for (value, group) in self.values.iter_mut().zip(&self.groups) {
            if *group == ChannelGroup::Intensity {
                *value = 0;
            }
        }
    }

    /// Zero all channels and forget their groups
    pub fn reset(&mut self) {
        self.values.fill(0);
        self.groups.fill(ChannelGroup::Other);
    }
}
