//! Demo functions and sources used by the `lumen` binary.

use std::f64::consts::PI;

use lumen_core::{
    ChannelGroup, DmxSource, FadeChannel, FaderHandle, Function, FunctionStatus, UniverseArray,
};

/// Waveform shapes for the chase, each mapping a phase (0.0 to 1.0) to a level (0.0 to 1.0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl Waveform {
    pub fn apply(&self, phase: f64) -> f64 {
        match self {
            Waveform::Sine => (phase * 2.0 * PI).sin() * 0.5 + 0.5,
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
            Waveform::Sawtooth => phase,
            Waveform::Triangle => {
                if phase < 0.5 {
                    phase * 2.0
                } else {
                    2.0 - phase * 2.0
                }
            }
        }
    }
}

/// Runs a waveform across a row of dimmer channels, each one offset in phase.
/// Never finishes by itself; releases its channels through the fader when stopped.
pub struct Chase {
    name: String,
    waveform: Waveform,
    channels: Vec<u32>,
    period_ms: u32,
    tick_ms: u32,
    elapsed_ms: u64,
    release_ms: u32,
    levels: Vec<u8>,
}

impl Chase {
    pub fn new(
        name: &str,
        waveform: Waveform,
        channels: Vec<u32>,
        period_ms: u32,
        tick_ms: u32,
    ) -> Self {
        let levels = vec![0; channels.len()];
        Self {
            name: name.to_string(),
            waveform,
            channels,
            period_ms: period_ms.max(1),
            tick_ms,
            elapsed_ms: 0,
            release_ms: 500,
            levels,
        }
    }

    pub fn with_release(mut self, release_ms: u32) -> Self {
        self.release_ms = release_ms;
        self
    }

    fn phase(&self, index: usize) -> f64 {
        let base = (self.elapsed_ms % self.period_ms as u64) as f64 / self.period_ms as f64;
        let offset = index as f64 / self.channels.len().max(1) as f64;
        (base + offset) % 1.0
    }
}

impl Function for Chase {
    fn name(&self) -> &str {
        &self.name
    }

    fn pre_run(&mut self) {
        self.elapsed_ms = 0;
    }

    fn write(&mut self, universes: &mut UniverseArray) -> FunctionStatus {
        for index in 0..self.channels.len() {
            let level = (self.waveform.apply(self.phase(index)) * u8::MAX as f64).round() as u8;
            self.levels[index] = level;
            universes.write(self.channels[index], level, ChannelGroup::Intensity);
        }
        self.elapsed_ms += self.tick_ms as u64;
        FunctionStatus::Running
    }

    fn post_run(&mut self, fader: &FaderHandle, _universes: &mut UniverseArray) {
        for (address, level) in self.channels.iter().zip(&self.levels) {
            if *level > 0 {
                fader.add(FadeChannel::release(*address, *level, self.release_ms));
            }
        }
    }
}

/// Flashes a set of channels at full for a number of ticks, then finishes
pub struct Pulse {
    name: String,
    channels: Vec<u32>,
    duration_ticks: u32,
    ticks: u32,
}

impl Pulse {
    pub fn new(name: &str, channels: Vec<u32>, duration_ticks: u32) -> Self {
        Self {
            name: name.to_string(),
            channels,
            duration_ticks,
            ticks: 0,
        }
    }
}

impl Function for Pulse {
    fn name(&self) -> &str {
        &self.name
    }

    fn pre_run(&mut self) {
        self.ticks = 0;
    }

    fn write(&mut self, universes: &mut UniverseArray) -> FunctionStatus {
        for address in &self.channels {
            universes.write(*address, u8::MAX, ChannelGroup::Intensity);
        }
        self.ticks += 1;
        if self.ticks >= self.duration_ticks {
            FunctionStatus::Finished
        } else {
            FunctionStatus::Running
        }
    }
}

/// A fixed value on one channel, standing in for a console slider
pub struct Slider {
    name: String,
    address: u32,
    group: ChannelGroup,
    value: u8,
}

impl Slider {
    pub fn new(name: &str, address: u32, group: ChannelGroup, value: u8) -> Self {
        Self {
            name: name.to_string(),
            address,
            group,
            value,
        }
    }

    pub fn set_value(&mut self, value: u8) {
        self.value = value;
    }
}

impl DmxSource for Slider {
    fn name(&self) -> &str {
        &self.name
    }

    fn write_dmx(&mut self, universes: &mut UniverseArray) {
        universes.write(self.address, self.value, self.group);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waveforms() {
        assert!((Waveform::Sine.apply(0.25) - 1.0).abs() < 1e-9);
        assert!((Waveform::Sine.apply(0.75)).abs() < 1e-9);
        assert_eq!(Waveform::Square.apply(0.2), 1.0);
        assert_eq!(Waveform::Square.apply(0.7), 0.0);
        assert_eq!(Waveform::Sawtooth.apply(0.4), 0.4);
        assert_eq!(Waveform::Triangle.apply(0.25), 0.5);
        assert_eq!(Waveform::Triangle.apply(0.75), 0.5);
    }

    #[test]
    fn test_chase_releases_lit_channels() {
        let mut chase = Chase::new("chase", Waveform::Square, vec![0, 1], 1000, 20);
        let mut universes = UniverseArray::new(1);
        assert_eq!(chase.write(&mut universes), FunctionStatus::Running);
        assert_eq!(universes.value(0), Some(255));
        assert_eq!(universes.value(1), Some(0));

        let fader = FaderHandle::new();
        chase.post_run(&fader, &mut universes);
        assert!(fader.contains(0));
        assert!(!fader.contains(1));
    }

    #[test]
    fn test_pulse_finishes() {
        let mut pulse = Pulse::new("pulse", vec![3], 2);
        let mut universes = UniverseArray::new(1);
        assert_eq!(pulse.write(&mut universes), FunctionStatus::Running);
        assert_eq!(pulse.write(&mut universes), FunctionStatus::Finished);
        assert_eq!(universes.value(3), Some(255));
    }

    #[test]
    fn test_slider_writes_ltp() {
        let mut slider = Slider::new("slider", 7, ChannelGroup::Other, 40);
        let mut universes = UniverseArray::new(1);
        universes.write(7, 200, ChannelGroup::Other);
        slider.write_dmx(&mut universes);
        assert_eq!(universes.value(7), Some(40));

        slider.set_value(90);
        slider.write_dmx(&mut universes);
        assert_eq!(universes.value(7), Some(90));
    }
}
