//! Unified error type for the pwmled-lib crate.
//!
//! [`PwmLedError`] wraps collaborator errors (`PwmError`, `RegistryError`)
//! together with the name of the LED being built, plus domain-specific kinds
//! (`Config`, `Color`). The transient/permanent split of PWM failures survives
//! every layer via [`PwmLedError::is_deferred`].

use std::fmt;

use crate::pwm::PwmError;
use crate::registry::RegistryError;

/// Unified error type for pwmled-lib operations.
#[derive(Debug)]
pub enum PwmLedError {
    /// PWM acquisition or configuration failed while building `led`.
    Pwm { led: String, source: PwmError },
    /// The registry rejected `led`.
    Registration { led: String, source: RegistryError },
    /// A configuration record or property is malformed.
    Config(String),
    /// The record for `led` is malformed.
    InvalidLed { led: String, reason: String },
    /// A brightness or color request could not be applied.
    Color(String),
    /// Standard I/O error (config file read).
    Io(std::io::Error),
}

impl PwmLedError {
    /// Whether the failure is transient and the whole activation may be retried.
    pub fn is_deferred(&self) -> bool {
        matches!(self, PwmLedError::Pwm { source, .. } if source.is_deferred())
    }

    /// Whether the configuration itself is at fault, with or without an LED name.
    pub fn is_config(&self) -> bool {
        matches!(self, PwmLedError::Config(_) | PwmLedError::InvalidLed { .. })
    }

    /// Name of the LED whose construction failed, if any.
    pub fn led_name(&self) -> Option<&str> {
        match self {
            PwmLedError::Pwm { led, .. }
            | PwmLedError::Registration { led, .. }
            | PwmLedError::InvalidLed { led, .. } => Some(led),
            _ => None,
        }
    }

    /// Attach `led` to a bare `Config` error. Other kinds pass through.
    pub fn for_led(self, led: &str) -> Self {
        match self {
            PwmLedError::Config(reason) => PwmLedError::InvalidLed {
                led: led.to_string(),
                reason,
            },
            other => other,
        }
    }
}

impl fmt::Display for PwmLedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PwmLedError::Pwm { led, source } => write!(f, "{led}: {source}"),
            PwmLedError::Registration { led, source } => {
                write!(f, "{led}: registration failed: {source}")
            }
            PwmLedError::Config(e) => write!(f, "Config error: {e}"),
            PwmLedError::InvalidLed { led, reason } => write!(f, "Config error: {led}: {reason}"),
            PwmLedError::Color(e) => write!(f, "Color error: {e}"),
            PwmLedError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for PwmLedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PwmLedError::Pwm { source, .. } => Some(source),
            PwmLedError::Registration { source, .. } => Some(source),
            PwmLedError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PwmLedError {
    fn from(e: std::io::Error) -> Self {
        PwmLedError::Io(e)
    }
}

/// Crate-level Result alias using [`PwmLedError`].
pub type Result<T> = std::result::Result<T, PwmLedError>;
