//! LED device — channels, elements, and brightness/color updates.

use serde::Serialize;

use crate::error::{PwmLedError, Result};

use super::color::ColorChannel;
use super::element::Element;

/// Monochrome or multi-color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LedKind {
    Single,
    MultiColor,
}

impl std::fmt::Display for LedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedKind::Single => write!(f, "single"),
            LedKind::MultiColor => write!(f, "multi-color"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LedFlags {
    /// Configuration must survive suspend/resume unchanged.
    pub suspend_resume: bool,
    pub multi_color: bool,
}

/// One logical LED: ordered color channels and the PWM elements driving them.
#[derive(Debug)]
pub struct LedDevice {
    name: String,
    default_trigger: Option<String>,
    brightness: u32,
    max_brightness: u32,
    flags: LedFlags,
    channels: Vec<ColorChannel>,
    elements: Vec<Element>,
}

impl LedDevice {
    pub(crate) fn new(
        name: &str,
        default_trigger: Option<&str>,
        max_brightness: u32,
        kind: LedKind,
        channels: Vec<ColorChannel>,
        elements: Vec<Element>,
    ) -> Self {
        LedDevice {
            name: name.to_string(),
            default_trigger: default_trigger.map(str::to_string),
            brightness: super::color::LED_OFF,
            max_brightness,
            flags: LedFlags {
                suspend_resume: true,
                multi_color: kind == LedKind::MultiColor,
            },
            channels,
            elements,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_trigger(&self) -> Option<&str> {
        self.default_trigger.as_deref()
    }

    pub fn brightness(&self) -> u32 {
        self.brightness
    }

    pub fn max_brightness(&self) -> u32 {
        self.max_brightness
    }

    pub fn flags(&self) -> LedFlags {
        self.flags
    }

    pub fn kind(&self) -> LedKind {
        if self.flags.multi_color {
            LedKind::MultiColor
        } else {
            LedKind::Single
        }
    }

    pub fn channels(&self) -> &[ColorChannel] {
        &self.channels
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Set the overall brightness (capped at `max_brightness`), rescale every
    /// channel, and drive each bound element in ascending order.
    pub fn set_brightness(&mut self, level: u32) {
        self.brightness = level.min(self.max_brightness);
        for channel in &mut self.channels {
            channel.scale(self.brightness, self.max_brightness);
        }
        for element in &mut self.elements {
            let Some(index) = element.channel_index() else {
                continue;
            };
            if let Some(channel) = self.channels.get(index) {
                element.apply(channel);
            }
        }
    }

    /// Set every channel's intensity (in channel order) and re-apply the
    /// current brightness. Values are capped at each channel's maximum.
    pub fn set_color_values(&mut self, values: &[u32]) -> Result<()> {
        if values.len() != self.channels.len() {
            return Err(PwmLedError::Color(format!(
                "{}: expected {} value{}, got {}",
                self.name,
                self.channels.len(),
                if self.channels.len() == 1 { "" } else { "s" },
                values.len()
            )));
        }
        for (channel, &value) in self.channels.iter_mut().zip(values) {
            channel.set_value(value);
        }
        self.set_brightness(self.brightness);
        Ok(())
    }

    /// Set one channel's intensity by name and re-apply the current brightness.
    pub fn set_color(&mut self, channel: &str, value: u32) -> Result<()> {
        let Some(ch) = self.channels.iter_mut().find(|c| c.name() == channel) else {
            return Err(PwmLedError::Color(format!(
                "{}: no color channel '{channel}'",
                self.name
            )));
        };
        ch.set_value(value);
        self.set_brightness(self.brightness);
        Ok(())
    }
}
