//! Color channels — named intensities and brightness scaling.

use serde::Serialize;

/// Name of the only channel of a monochrome LED.
pub const SINGLE_CHANNEL: &str = "single";

/// Default maximum brightness when the configuration gives none.
pub const LED_FULL: u32 = 255;

/// Brightness of a freshly built LED.
pub const LED_OFF: u32 = 0;

/// One named intensity of an LED.
///
/// `value` is the color intensity (0..=`max_value`); `raw_value` is that
/// intensity scaled by the device's current brightness and is what the
/// duty mapper consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColorChannel {
    name: String,
    value: u32,
    max_value: u32,
    raw_value: u32,
}

impl ColorChannel {
    /// A channel at full intensity.
    pub fn new(name: impl Into<String>, max_value: u32) -> Self {
        ColorChannel {
            name: name.into(),
            value: max_value,
            max_value,
            raw_value: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn max_value(&self) -> u32 {
        self.max_value
    }

    pub fn raw_value(&self) -> u32 {
        self.raw_value
    }

    /// Set the intensity, capped at `max_value`.
    pub(crate) fn set_value(&mut self, value: u32) {
        self.value = value.min(self.max_value);
    }

    /// `value * brightness / max_brightness`, rounded down.
    ///
    /// `brightness` above `max_brightness` is capped. A zero `max_brightness`
    /// yields zero.
    pub fn raw_value_at(&self, brightness: u32, max_brightness: u32) -> u32 {
        let brightness = brightness.min(max_brightness);
        (u64::from(self.value) * u64::from(brightness))
            .checked_div(u64::from(max_brightness))
            .unwrap_or(0) as u32
    }

    pub(crate) fn scale(&mut self, brightness: u32, max_brightness: u32) {
        self.raw_value = self.raw_value_at(brightness, max_brightness);
    }
}
