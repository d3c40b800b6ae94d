//! PWM elements and the duty mapper.

use crate::pwm::{self, PwmChannel};

use super::color::ColorChannel;

/// Duty cycle for a channel: `period * raw / max`, rounded down, and
/// inverted (`period - duty`) for active-low outputs.
///
/// `raw` above `max` is capped so the result never exceeds `period`.
/// `max` must be non-zero.
pub fn compute_duty(period: u32, raw: u32, max: u32, active_low: bool) -> u32 {
    debug_assert!(max != 0, "channel max_value must be non-zero");
    let duty = (u64::from(period) * u64::from(raw.min(max)))
        .checked_div(u64::from(max))
        .unwrap_or(0) as u32;
    if active_low { period - duty } else { duty }
}

/// One physical PWM output bound to a color channel.
pub struct Element {
    /// Index into the owning device's channels; `None` = not driven.
    channel_index: Option<usize>,
    pwm: Box<dyn PwmChannel>,
    active_low: bool,
    /// Nanoseconds, fixed at construction.
    period: u32,
    /// Nanoseconds, last value applied.
    duty: u32,
}

impl Element {
    pub(crate) fn new(
        channel_index: Option<usize>,
        pwm: Box<dyn PwmChannel>,
        active_low: bool,
        period: u32,
    ) -> Self {
        Element {
            channel_index,
            pwm,
            active_low,
            period,
            duty: 0,
        }
    }

    pub fn channel_index(&self) -> Option<usize> {
        self.channel_index
    }

    pub fn active_low(&self) -> bool {
        self.active_low
    }

    pub fn period(&self) -> u32 {
        self.period
    }

    pub fn duty(&self) -> u32 {
        self.duty
    }

    pub fn pwm_label(&self) -> &str {
        self.pwm.label()
    }

    /// Recompute the duty from `channel` and push it to the backend.
    ///
    /// A backend failure on an already-acquired PWM is logged and otherwise
    /// ignored; `duty` still reflects the requested value.
    pub fn apply(&mut self, channel: &ColorChannel) {
        self.duty = compute_duty(
            self.period,
            channel.raw_value(),
            channel.max_value(),
            self.active_low,
        );
        if let Err(e) = self.write() {
            log::error!("{}: {e}", self.pwm.label());
        }
    }

    fn write(&mut self) -> pwm::Result<()> {
        self.pwm.configure(self.duty, self.period)?;
        if self.duty == 0 {
            self.pwm.disable()
        } else {
            self.pwm.enable()
        }
    }
}

impl std::fmt::Debug for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Element")
            .field("channel_index", &self.channel_index)
            .field("pwm", &self.pwm.label())
            .field("active_low", &self.active_low)
            .field("period", &self.period)
            .field("duty", &self.duty)
            .finish()
    }
}
