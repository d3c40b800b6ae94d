//! pwmled — PWM-driven LED devices, monochrome and multi-color.

pub mod config;
pub mod driver;
pub mod error;
pub mod led;
pub mod pwm;
pub mod registry;
pub mod retry;
pub mod tree;

pub use error::PwmLedError;
