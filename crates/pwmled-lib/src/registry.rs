//! LED registry — where built devices become visible by name.

use std::fmt;

use serde::Serialize;

use crate::led::LedDevice;

// ── Error type ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Another LED is already registered under this name.
    NameCollision(String),
    /// The registry refused the device for another reason.
    Rejected(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::NameCollision(name) => {
                write!(f, "an LED named '{name}' is already registered")
            }
            RegistryError::Rejected(e) => write!(f, "rejected: {e}"),
        }
    }
}

impl std::error::Error for RegistryError {}

pub type Result<T> = std::result::Result<T, RegistryError>;

// ── Trait ──

pub trait LedRegistry {
    fn register(&mut self, led: &LedDevice) -> Result<()>;
    /// Remove `name`. Unknown names are ignored.
    fn unregister(&mut self, name: &str);
}

/// Snapshot of a registered LED.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisteredLed {
    pub name: String,
    pub default_trigger: Option<String>,
    pub max_brightness: u32,
    pub multi_color: bool,
    pub colors: Vec<String>,
}

impl RegisteredLed {
    fn from_device(led: &LedDevice) -> Self {
        RegisteredLed {
            name: led.name().to_string(),
            default_trigger: led.default_trigger().map(str::to_string),
            max_brightness: led.max_brightness(),
            multi_color: led.flags().multi_color,
            colors: led.channels().iter().map(|c| c.name().to_string()).collect(),
        }
    }
}

/// In-memory registry keyed by LED name, in registration order.
#[derive(Debug, Default)]
pub struct LedTable {
    entries: Vec<RegisteredLed>,
}

impl LedTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredLed> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn entries(&self) -> &[RegisteredLed] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl LedRegistry for LedTable {
    fn register(&mut self, led: &LedDevice) -> Result<()> {
        if led.name().trim().is_empty() {
            return Err(RegistryError::Rejected("empty LED name".into()));
        }
        if self.get(led.name()).is_some() {
            return Err(RegistryError::NameCollision(led.name().to_string()));
        }
        self.entries.push(RegisteredLed::from_device(led));
        Ok(())
    }

    fn unregister(&mut self, name: &str) {
        self.entries.retain(|e| e.name != name);
    }
}

// ── Mock registry for testing ──

/// Recording registry for unit and integration tests.
#[doc(hidden)]
pub mod mock {
    use super::*;
    use std::collections::HashSet;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum RegistryCall {
        Register(String),
        Unregister(String),
    }

    /// Wraps a real [`LedTable`] and records every call. Names in `reject`
    /// fail registration with `Rejected`.
    #[derive(Debug, Default)]
    pub struct MockRegistry {
        pub table: LedTable,
        pub calls: Vec<RegistryCall>,
        pub reject: HashSet<String>,
        /// Brightness each device had at registration time, by name.
        pub brightness_at_register: Vec<(String, u32)>,
    }

    impl MockRegistry {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn reject(&mut self, name: &str) {
            self.reject.insert(name.to_string());
        }

        pub fn unregistered(&self) -> Vec<String> {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    RegistryCall::Unregister(name) => Some(name.clone()),
                    _ => None,
                })
                .collect()
        }
    }

    impl LedRegistry for MockRegistry {
        fn register(&mut self, led: &LedDevice) -> Result<()> {
            self.calls
                .push(RegistryCall::Register(led.name().to_string()));
            if self.reject.contains(led.name()) {
                return Err(RegistryError::Rejected(format!(
                    "{}: rejection injected",
                    led.name()
                )));
            }
            self.table.register(led)?;
            self.brightness_at_register
                .push((led.name().to_string(), led.brightness()));
            Ok(())
        }

        fn unregister(&mut self, name: &str) {
            self.calls.push(RegistryCall::Unregister(name.to_string()));
            self.table.unregister(name);
        }
    }
}
