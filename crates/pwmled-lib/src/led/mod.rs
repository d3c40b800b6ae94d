//! LED devices — color channels, PWM elements, duty mapping, construction.

mod builder;
mod color;
mod device;
mod element;

pub use builder::{build_device, build_multi, build_single};
pub use color::{ColorChannel, LED_FULL, LED_OFF, SINGLE_CHANNEL};
pub use device::{LedDevice, LedFlags, LedKind};
pub use element::{Element, compute_duty};
