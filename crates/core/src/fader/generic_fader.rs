use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::universe::{ChannelGroup, UniverseArray};

/// A single channel being faded from `start` to `target`
#[derive(Debug, Clone, PartialEq)]
pub struct FadeChannel {
    pub address: u32,
    pub group: ChannelGroup,
    pub start: u8,
    pub target: u8,
    pub current: u8,
    pub fade_time_ms: u32,
    pub elapsed_ms: u32,
}

impl FadeChannel {
    pub fn new(
        address: u32,
        group: ChannelGroup,
        start: u8,
        target: u8,
        fade_time_ms: u32,
    ) -> Self {
        Self {
            address,
            group,
            start,
            target,
            current: start,
            fade_time_ms,
            elapsed_ms: 0,
        }
    }

    /// Fade an intensity channel from its current value down to zero
    pub fn release(address: u32, current: u8, fade_time_ms: u32) -> Self {
        Self::new(address, ChannelGroup::Intensity, current, 0, fade_time_ms)
    }

    /// Advance by one tick and return the value to write
    fn next_value(&mut self, tick_ms: u32) -> u8 {
        self.elapsed_ms = self.elapsed_ms.saturating_add(tick_ms);

        if self.fade_time_ms == 0 || self.elapsed_ms >= self.fade_time_ms {
            self.current = self.target;
        } else {
            let start = self.start as i64;
            let delta = self.target as i64 - start;
            let value = start + delta * self.elapsed_ms as i64 / self.fade_time_ms as i64;
            self.current = value.clamp(0, u8::MAX as i64) as u8;
        }
        self.current
    }

    pub fn is_ready(&self) -> bool {
        self.current == self.target
            && (self.fade_time_ms == 0 || self.elapsed_ms >= self.fade_time_ms)
    }
}

/// Linear per-channel fader run once per tick after functions and DMX sources
#[derive(Debug, Default)]
pub struct GenericFader {
    channels: BTreeMap<u32, FadeChannel>,
}

impl GenericFader {
    pub fn new() -> Self {
        Self {
            channels: BTreeMap::new(),
        }
    }

    /// Add or replace the fade for a channel. An HTP release already sitting
    /// above the new fade's current value is kept so it never jumps up.
    pub fn add(&mut self, channel: FadeChannel) {
        if let Some(existing) = self.channels.get(&channel.address) {
            if existing.group == ChannelGroup::Intensity && existing.current > channel.current {
                log::trace!(
                    "Keeping higher HTP fade on channel {} ({} > {})",
                    channel.address,
                    existing.current,
                    channel.current
                );
                return;
            }
        }
        self.channels.insert(channel.address, channel);
    }

    pub fn remove(&mut self, address: u32) -> Option<FadeChannel> {
        self.channels.remove(&address)
    }

    pub fn remove_all(&mut self) {
        self.channels.clear();
    }

    pub fn contains(&self, address: u32) -> bool {
        self.channels.contains_key(&address)
    }

    pub fn count(&self) -> usize {
        self.channels.len()
    }

    /// Write every fading channel into the buffer, dropping finished fades
    pub fn write(&mut self, universes: &mut UniverseArray, tick_ms: u32) {
        self.channels.retain(|_, channel| {
            let value = channel.next_value(tick_ms);
            universes.write(channel.address, value, channel.group);
            !channel.is_ready()
        });
    }
}

/// Shared handle to the master timer's fader.
///
/// Functions receive it when they stop so they can hand their intensity channels
/// over for a graceful release instead of snapping to zero.
#[derive(Clone, Default)]
pub struct FaderHandle {
    inner: Arc<Mutex<GenericFader>>,
}

impl FaderHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, channel: FadeChannel) {
        self.inner.lock().add(channel);
    }

    pub fn remove(&self, address: u32) -> Option<FadeChannel> {
        self.inner.lock().remove(address)
    }

    pub fn remove_all(&self) {
        self.inner.lock().remove_all();
    }

    pub fn contains(&self, address: u32) -> bool {
        self.inner.lock().contains(address)
    }

    pub fn count(&self) -> usize {
        self.inner.lock().count()
    }

    pub(crate) fn write(&self, universes: &mut UniverseArray, tick_ms: u32) {
        self.inner.lock().write(universes, tick_ms);
    }
}
