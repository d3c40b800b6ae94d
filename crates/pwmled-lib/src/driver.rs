//! Driver set — all-or-nothing activation of every configured LED.
//!
//! Records are built strictly in order. If record `k` fails, the `k` devices
//! already built are unregistered and released newest-first before the error
//! is returned, so callers only ever see a complete set or nothing.

use crate::config::{LedRecord, LedSource};
use crate::error::{PwmLedError, Result};
use crate::led::{LedDevice, build_device};
use crate::pwm::PwmProvider;
use crate::registry::LedRegistry;

/// The LED devices created by one activation, in configuration order.
#[derive(Debug, Default)]
pub struct DriverSet {
    leds: Vec<LedDevice>,
}

impl DriverSet {
    /// Build one device per record. On failure the partial set is rolled
    /// back and the error is returned unchanged.
    pub fn build<'a>(
        provider: &impl PwmProvider,
        registry: &mut impl LedRegistry,
        records: impl IntoIterator<Item = LedRecord<'a>>,
    ) -> Result<Self> {
        let mut set = DriverSet::default();
        for record in records {
            match build_device(provider, registry, &record) {
                Ok(led) => set.leds.push(led),
                Err(e) => {
                    if !set.leds.is_empty() {
                        log::debug!(
                            "{}: rolling back {} LED(s)",
                            record.led.name,
                            set.leds.len()
                        );
                    }
                    set.teardown(registry);
                    return Err(e);
                }
            }
        }
        Ok(set)
    }

    /// Unregister and release every device, newest first. Safe to call
    /// again on an already empty set.
    pub fn teardown(&mut self, registry: &mut impl LedRegistry) {
        while let Some(led) = self.leds.pop() {
            registry.unregister(led.name());
            log::debug!("{}: unregistered", led.name());
            drop(led);
        }
    }

    /// Tear down and consume the set.
    pub fn remove(mut self, registry: &mut impl LedRegistry) {
        self.teardown(registry);
    }

    pub fn leds(&self) -> &[LedDevice] {
        &self.leds
    }

    pub fn len(&self) -> usize {
        self.leds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leds.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&LedDevice> {
        self.leds.iter().find(|l| l.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut LedDevice> {
        self.leds.iter_mut().find(|l| l.name() == name)
    }

    /// Brightness callback for the LED named `name`.
    pub fn set_brightness(&mut self, name: &str, level: u32) -> Result<()> {
        self.led_mut(name)?.set_brightness(level);
        Ok(())
    }

    /// Color callback: one value per channel, in channel order.
    pub fn set_color(&mut self, name: &str, values: &[u32]) -> Result<()> {
        self.led_mut(name)?.set_color_values(values)
    }

    fn led_mut(&mut self, name: &str) -> Result<&mut LedDevice> {
        self.get_mut(name)
            .ok_or_else(|| PwmLedError::Color(format!("no LED named '{name}'")))
    }
}

/// Activate every LED `source` describes.
///
/// A source with no records is refused. Deferred PWM failures come back
/// with [`PwmLedError::is_deferred`] set; the caller retries the whole call.
pub fn probe(
    provider: &impl PwmProvider,
    registry: &mut impl LedRegistry,
    source: &LedSource<'_>,
) -> Result<DriverSet> {
    let records = source.records()?;
    if records.is_empty() {
        return Err(PwmLedError::Config(format!(
            "{} source defines no LEDs",
            source.kind_name()
        )));
    }
    let set = DriverSet::build(provider, registry, records)?;
    log::info!("activated {} PWM LED(s)", set.len());
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedPwm;
    use crate::pwm::PwmError;
    use crate::pwm::mock::MockPwm;
    use crate::registry::mock::{MockRegistry, RegistryCall};
    use crate::tree::Node;

    fn leds(names: &[&str]) -> Vec<LedPwm> {
        names
            .iter()
            .map(|n| LedPwm {
                name: n.to_string(),
                ..LedPwm::default()
            })
            .collect()
    }

    #[test]
    fn probe_static_builds_all_in_order() {
        let pwm = MockPwm::new();
        let mut reg = MockRegistry::new();
        let table = leds(&["a", "b", "c"]);
        let set = probe(&pwm, &mut reg, &LedSource::Static(&table)).unwrap();
        let names: Vec<&str> = set.leds().iter().map(|l| l.name()).collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert_eq!(reg.table.len(), 3);
    }

    #[test]
    fn probe_empty_source_is_config_error() {
        let pwm = MockPwm::new();
        let mut reg = MockRegistry::new();
        let err = probe(&pwm, &mut reg, &LedSource::Static(&[])).unwrap_err();
        assert!(matches!(err, PwmLedError::Config(_)));

        let root = Node::new("pwmleds");
        let err = probe(&pwm, &mut reg, &LedSource::Tree(&root)).unwrap_err();
        assert!(err.to_string().contains("tree source"), "got {err}");
        assert!(pwm.calls().is_empty());
    }

    #[test]
    fn failure_rolls_back_newest_first() {
        let pwm = MockPwm::new();
        pwm.fail_request("c", PwmError::NotFound("gone".into()));
        let mut reg = MockRegistry::new();
        let table = leds(&["a", "b", "c", "d"]);
        let err = probe(&pwm, &mut reg, &LedSource::Static(&table)).unwrap_err();

        assert_eq!(err.led_name(), Some("c"));
        assert_eq!(reg.unregistered(), ["b", "a"]);
        assert_eq!(pwm.releases(), ["b", "a"]);
        assert!(reg.table.is_empty());
        assert!(pwm.held().is_empty());
    }

    #[test]
    fn invalid_record_names_led_and_rolls_back() {
        let pwm = MockPwm::new();
        let mut reg = MockRegistry::new();
        let mut table = leds(&["a", "b"]);
        table[1].max_brightness = 0;
        let err = probe(&pwm, &mut reg, &LedSource::Static(&table)).unwrap_err();

        assert!(err.is_config(), "got {err}");
        assert!(!err.is_deferred());
        assert_eq!(err.led_name(), Some("b"));
        assert_eq!(reg.unregistered(), ["a"]);
        assert_eq!(pwm.releases(), ["a"]);
    }

    #[test]
    fn deferred_survives_rollback() {
        let pwm = MockPwm::new();
        pwm.fail_request("b", PwmError::Deferred("pwmchip1 not ready".into()));
        let mut reg = MockRegistry::new();
        let table = leds(&["a", "b"]);
        let err = probe(&pwm, &mut reg, &LedSource::Static(&table)).unwrap_err();
        assert!(err.is_deferred());
        assert_eq!(pwm.releases(), ["a"]);
    }

    #[test]
    fn teardown_unregisters_before_release() {
        let pwm = MockPwm::new();
        let mut reg = MockRegistry::new();
        let table = leds(&["a", "b"]);
        let mut set = probe(&pwm, &mut reg, &LedSource::Static(&table)).unwrap();
        pwm.clear();

        set.teardown(&mut reg);
        assert!(set.is_empty());
        assert_eq!(pwm.releases(), ["b", "a"]);
        assert_eq!(
            &reg.calls[2..],
            [
                RegistryCall::Unregister("b".into()),
                RegistryCall::Unregister("a".into()),
            ]
        );

        set.teardown(&mut reg);
        assert_eq!(reg.unregistered().len(), 2, "second teardown is a no-op");
    }

    #[test]
    fn remove_consumes_set() {
        let pwm = MockPwm::new();
        let mut reg = MockRegistry::new();
        let table = leds(&["a"]);
        let set = probe(&pwm, &mut reg, &LedSource::Static(&table)).unwrap();
        set.remove(&mut reg);
        assert!(reg.table.is_empty());
        assert!(pwm.held().is_empty());
    }

    #[test]
    fn brightness_callback_by_name() {
        let pwm = MockPwm::new();
        let mut reg = MockRegistry::new();
        let table = leds(&["a"]);
        let mut set = probe(&pwm, &mut reg, &LedSource::Static(&table)).unwrap();

        set.set_brightness("a", 255).unwrap();
        assert_eq!(set.get("a").unwrap().elements()[0].duty(), 1000);
        assert!(set.set_brightness("zz", 1).is_err());
    }

    #[test]
    fn color_callback_by_name() {
        let pwm = MockPwm::new();
        let mut reg = MockRegistry::new();
        let root = Node::new("pwmleds").with_child(
            Node::new("rgb")
                .with_child(Node::new("element-red").with_property("max-value", 255u32))
                .with_child(Node::new("element-green").with_property("max-value", 255u32)),
        );
        let mut set = probe(&pwm, &mut reg, &LedSource::Tree(&root)).unwrap();
        set.set_brightness("rgb", 255).unwrap();
        set.set_color("rgb", &[0, 255]).unwrap();
        let rgb = set.get("rgb").unwrap();
        assert_eq!(rgb.elements()[0].duty(), 0);
        assert_eq!(rgb.elements()[1].duty(), 1000);
        assert!(set.set_color("rgb", &[1]).is_err());
    }
}
