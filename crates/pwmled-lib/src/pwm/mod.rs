//! PWM backend — provider/channel traits, references, sysfs backend, mock.

mod sysfs;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::tree::Node;

pub use sysfs::{DEFAULT_SYSFS_ROOT, SysfsPwm};

// ── Error type ──

/// PWM backend errors.
///
/// String payloads follow the convention **"context: details"**, e.g.
/// `"pwmchip0/export: Device or resource busy"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PwmError {
    /// The provider is not available yet. Retry the activation later.
    Deferred(String),
    /// No PWM matches the lookup.
    NotFound(String),
    /// The PWM exists but could not be acquired.
    RequestFailed(String),
    /// Writing duty/period/enable to an acquired PWM failed.
    ApplyFailed(String),
}

impl PwmError {
    pub fn is_deferred(&self) -> bool {
        matches!(self, PwmError::Deferred(_))
    }
}

impl fmt::Display for PwmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PwmError::Deferred(e) => write!(f, "PWM not ready, retry later: {e}"),
            PwmError::NotFound(e) => write!(f, "PWM not found: {e}"),
            PwmError::RequestFailed(e) => write!(f, "PWM request failed: {e}"),
            PwmError::ApplyFailed(e) => write!(f, "PWM apply failed: {e}"),
        }
    }
}

impl std::error::Error for PwmError {}

pub type Result<T> = std::result::Result<T, PwmError>;

// ── Arguments and references ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    #[default]
    Normal,
    Inversed,
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Polarity::Normal => write!(f, "normal"),
            Polarity::Inversed => write!(f, "inversed"),
        }
    }
}

/// Default arguments a provider reports for an acquired channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PwmArgs {
    /// Period in nanoseconds. Zero means the provider has no default.
    pub period: u32,
    pub polarity: Polarity,
}

/// A PWM reference: `pwmchipN:channel[:period_ns[:inverted]]`.
///
/// The optional period and polarity become the channel's default [`PwmArgs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PwmRef {
    pub chip: u32,
    pub channel: u32,
    pub period: Option<u32>,
    pub polarity: Polarity,
}

impl FromStr for PwmRef {
    type Err = PwmError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |why: &str| {
            PwmError::NotFound(format!(
                "invalid PWM reference '{s}' ({why}; expected pwmchipN:channel[:period_ns[:inverted]])"
            ))
        };
        let mut parts = s.trim().split(':');
        let chip = parts
            .next()
            .and_then(|p| p.trim().strip_prefix("pwmchip"))
            .ok_or_else(|| invalid("missing pwmchip"))?
            .parse::<u32>()
            .map_err(|_| invalid("bad chip number"))?;
        let channel = parts
            .next()
            .ok_or_else(|| invalid("missing channel"))?
            .trim()
            .parse::<u32>()
            .map_err(|_| invalid("bad channel number"))?;
        let period = match parts.next() {
            Some(p) => Some(
                p.trim()
                    .parse::<u32>()
                    .map_err(|_| invalid("bad period"))?,
            ),
            None => None,
        };
        let polarity = match parts.next().map(str::trim) {
            None | Some("normal") => Polarity::Normal,
            Some("inverted") | Some("inversed") => Polarity::Inversed,
            Some(_) => return Err(invalid("bad polarity")),
        };
        if parts.next().is_some() {
            return Err(invalid("too many fields"));
        }
        Ok(PwmRef {
            chip,
            channel,
            period,
            polarity,
        })
    }
}

impl fmt::Display for PwmRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pwmchip{}:{}", self.chip, self.channel)?;
        if let Some(period) = self.period {
            write!(f, ":{period}")?;
            if self.polarity == Polarity::Inversed {
                write!(f, ":inverted")?;
            }
        }
        Ok(())
    }
}

/// How to locate a PWM: by consumer name (static table) or by the
/// `pwms` property of a configuration node.
#[derive(Debug, Clone, Copy)]
pub enum PwmLookup<'a> {
    ByName(&'a str),
    ByNode(&'a Node),
}

impl PwmLookup<'_> {
    /// Key identifying the requested PWM: the name, or the node's `pwms`
    /// string when present, else the node name. A `pwms` property that is
    /// not a string is `NotFound`.
    pub fn key(&self) -> Result<&str> {
        match self {
            PwmLookup::ByName(name) => Ok(*name),
            PwmLookup::ByNode(node) => match node.read_string("pwms") {
                Ok(spec) => Ok(spec.unwrap_or(node.name())),
                Err(e) => Err(PwmError::NotFound(format!("{node}: {e}"))),
            },
        }
    }
}

impl fmt::Display for PwmLookup<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PwmLookup::ByName(name) => write!(f, "{name}"),
            PwmLookup::ByNode(node) => write!(f, "node {node}"),
        }
    }
}

// ── Traits ──

/// One acquired PWM output. Dropping the channel releases it.
pub trait PwmChannel {
    /// Human-readable identity for log messages.
    fn label(&self) -> &str;
    /// Default arguments captured when the channel was acquired.
    fn args(&self) -> PwmArgs;
    fn configure(&mut self, duty_ns: u32, period_ns: u32) -> Result<()>;
    fn enable(&mut self) -> Result<()>;
    fn disable(&mut self) -> Result<()>;
}

/// Source of PWM channels.
pub trait PwmProvider {
    /// Acquire a channel. Returns `Deferred` when the provider may appear later.
    fn request(&self, lookup: PwmLookup<'_>) -> Result<Box<dyn PwmChannel>>;
}

// ── Mock provider for testing ──

/// In-memory mock provider for unit and integration tests.
///
/// Always compiled (zero runtime cost), hidden from public docs.
#[doc(hidden)]
pub mod mock {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::rc::Rc;

    /// One recorded backend call. Channels are identified by lookup key.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum PwmCall {
        Request(String),
        Configure { pwm: String, duty: u32, period: u32 },
        Enable(String),
        Disable(String),
        Release(String),
    }

    /// Hands out channels that log into a shared call list.
    /// `periods` overrides the default period per key; `failures` makes
    /// `request()` fail for a key.
    pub struct MockPwm {
        pub calls: Rc<RefCell<Vec<PwmCall>>>,
        pub periods: RefCell<HashMap<String, u32>>,
        pub default_period: Cell<u32>,
        pub failures: RefCell<HashMap<String, PwmError>>,
        /// If true, `configure` on handed-out channels fails.
        pub fail_configure: Rc<Cell<bool>>,
    }

    impl Default for MockPwm {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockPwm {
        pub fn new() -> Self {
            MockPwm {
                calls: Rc::new(RefCell::new(Vec::new())),
                periods: RefCell::new(HashMap::new()),
                default_period: Cell::new(1000),
                failures: RefCell::new(HashMap::new()),
                fail_configure: Rc::new(Cell::new(false)),
            }
        }

        pub fn set_period(&self, key: &str, period: u32) {
            self.periods.borrow_mut().insert(key.to_string(), period);
        }

        pub fn fail_request(&self, key: &str, error: PwmError) {
            self.failures.borrow_mut().insert(key.to_string(), error);
        }

        /// Snapshot of every call so far.
        pub fn calls(&self) -> Vec<PwmCall> {
            self.calls.borrow().clone()
        }

        /// Keys released so far, in release order.
        pub fn releases(&self) -> Vec<String> {
            self.calls
                .borrow()
                .iter()
                .filter_map(|c| match c {
                    PwmCall::Release(key) => Some(key.clone()),
                    _ => None,
                })
                .collect()
        }

        /// Keys currently held (requested and not yet released).
        pub fn held(&self) -> Vec<String> {
            let mut held = Vec::new();
            for call in self.calls.borrow().iter() {
                match call {
                    PwmCall::Request(key) => held.push(key.clone()),
                    PwmCall::Release(key) => {
                        if let Some(pos) = held.iter().position(|k| k == key) {
                            held.remove(pos);
                        }
                    }
                    _ => {}
                }
            }
            held
        }

        pub fn clear(&self) {
            self.calls.borrow_mut().clear();
        }
    }

    impl PwmProvider for MockPwm {
        fn request(&self, lookup: PwmLookup<'_>) -> Result<Box<dyn PwmChannel>> {
            let key = lookup.key()?.to_string();
            if let Some(err) = self.failures.borrow().get(&key) {
                return Err(err.clone());
            }
            let period = self
                .periods
                .borrow()
                .get(&key)
                .copied()
                .unwrap_or(self.default_period.get());
            self.calls.borrow_mut().push(PwmCall::Request(key.clone()));
            Ok(Box::new(MockChannel {
                key,
                args: PwmArgs {
                    period,
                    polarity: Polarity::Normal,
                },
                calls: Rc::clone(&self.calls),
                fail_configure: Rc::clone(&self.fail_configure),
            }))
        }
    }

    struct MockChannel {
        key: String,
        args: PwmArgs,
        calls: Rc<RefCell<Vec<PwmCall>>>,
        fail_configure: Rc<Cell<bool>>,
    }

    impl PwmChannel for MockChannel {
        fn label(&self) -> &str {
            &self.key
        }

        fn args(&self) -> PwmArgs {
            self.args
        }

        fn configure(&mut self, duty_ns: u32, period_ns: u32) -> Result<()> {
            if self.fail_configure.get() {
                return Err(PwmError::ApplyFailed(format!(
                    "{}: configure failure injected",
                    self.key
                )));
            }
            self.calls.borrow_mut().push(PwmCall::Configure {
                pwm: self.key.clone(),
                duty: duty_ns,
                period: period_ns,
            });
            Ok(())
        }

        fn enable(&mut self) -> Result<()> {
            self.calls
                .borrow_mut()
                .push(PwmCall::Enable(self.key.clone()));
            Ok(())
        }

        fn disable(&mut self) -> Result<()> {
            self.calls
                .borrow_mut()
                .push(PwmCall::Disable(self.key.clone()));
            Ok(())
        }
    }

    impl Drop for MockChannel {
        fn drop(&mut self) {
            self.calls
                .borrow_mut()
                .push(PwmCall::Release(self.key.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{MockPwm, PwmCall};
    use super::*;

    // ── PwmRef ──

    #[test]
    fn parse_chip_and_channel() {
        let r: PwmRef = "pwmchip0:3".parse().unwrap();
        assert_eq!(r.chip, 0);
        assert_eq!(r.channel, 3);
        assert_eq!(r.period, None);
        assert_eq!(r.polarity, Polarity::Normal);
    }

    #[test]
    fn parse_with_period_and_polarity() {
        let r: PwmRef = "pwmchip2:1:7812500:inverted".parse().unwrap();
        assert_eq!(r.chip, 2);
        assert_eq!(r.channel, 1);
        assert_eq!(r.period, Some(7_812_500));
        assert_eq!(r.polarity, Polarity::Inversed);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("pwm0:1".parse::<PwmRef>().is_err());
        assert!("pwmchip0".parse::<PwmRef>().is_err());
        assert!("pwmchip0:x".parse::<PwmRef>().is_err());
        assert!("pwmchip0:1:fast".parse::<PwmRef>().is_err());
        assert!("pwmchip0:1:100:sideways".parse::<PwmRef>().is_err());
        assert!("pwmchip0:1:100:normal:extra".parse::<PwmRef>().is_err());
    }

    #[test]
    fn parse_error_is_not_deferred() {
        let err = "bogus".parse::<PwmRef>().unwrap_err();
        assert!(!err.is_deferred());
    }

    #[test]
    fn display_roundtrips() {
        for s in ["pwmchip0:3", "pwmchip1:0:1000000", "pwmchip1:0:1000000:inverted"] {
            let r: PwmRef = s.parse().unwrap();
            assert_eq!(r.to_string(), s);
        }
    }

    // ── PwmLookup ──

    #[test]
    fn lookup_key_prefers_pwms_property() {
        let node = Node::new("element-red").with_property("pwms", "pwmchip0:1");
        assert_eq!(PwmLookup::ByNode(&node).key(), Ok("pwmchip0:1"));
        let bare = Node::new("element-red");
        assert_eq!(PwmLookup::ByNode(&bare).key(), Ok("element-red"));
        assert_eq!(PwmLookup::ByName("status").key(), Ok("status"));
    }

    #[test]
    fn lookup_key_rejects_non_string_pwms() {
        let node = Node::new("element-red").with_property("pwms", 3u32);
        let err = PwmLookup::ByNode(&node).key().unwrap_err();
        assert!(matches!(err, PwmError::NotFound(_)), "got {err}");
        assert!(err.to_string().contains("element-red"), "got {err}");

        let pwm = MockPwm::new();
        let err = pwm.request(PwmLookup::ByNode(&node)).err().unwrap();
        assert!(matches!(err, PwmError::NotFound(_)));
        assert!(pwm.calls().is_empty());
    }

    // ── MockPwm ──

    #[test]
    fn mock_records_request_and_release() {
        let pwm = MockPwm::new();
        let ch = pwm.request(PwmLookup::ByName("a")).unwrap();
        assert_eq!(ch.args().period, 1000);
        assert_eq!(pwm.held(), ["a"]);
        drop(ch);
        assert!(pwm.held().is_empty());
        assert_eq!(
            pwm.calls(),
            [PwmCall::Request("a".into()), PwmCall::Release("a".into())]
        );
    }

    #[test]
    fn mock_injected_failure_does_not_record_request() {
        let pwm = MockPwm::new();
        pwm.fail_request("a", PwmError::Deferred("not yet".into()));
        let err = pwm.request(PwmLookup::ByName("a")).err().unwrap();
        assert!(err.is_deferred());
        assert!(pwm.calls().is_empty());
    }

    #[test]
    fn mock_period_override() {
        let pwm = MockPwm::new();
        pwm.set_period("a", 0);
        let ch = pwm.request(PwmLookup::ByName("a")).unwrap();
        assert_eq!(ch.args().period, 0);
    }
}
