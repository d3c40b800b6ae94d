//! Device builder — single-element and multi-element construction paths.
//!
//! Both paths acquire every PWM the record needs, register the finished
//! device, then drive it once to its initial (off) brightness. On any error
//! the partially built device is dropped, which releases whatever PWMs were
//! already acquired for it.

use crate::config::{ChannelSpec, LedPwm, LedRecord};
use crate::error::{PwmLedError, Result};
use crate::pwm::{PwmChannel, PwmLookup, PwmProvider};
use crate::registry::LedRegistry;
use crate::tree::Node;

use super::color::{ColorChannel, SINGLE_CHANNEL};
use super::device::{LedDevice, LedKind};
use super::element::Element;

/// Build one LED from a resolved record, choosing the path by its kind.
pub fn build_device(
    provider: &impl PwmProvider,
    registry: &mut impl LedRegistry,
    record: &LedRecord<'_>,
) -> Result<LedDevice> {
    match record.kind() {
        LedKind::Single => build_single(provider, registry, &record.led, record.node),
        LedKind::MultiColor => build_multi(provider, registry, &record.led, &record.elements),
    }
}

/// Monochrome LED: one `"single"` channel driven by one PWM.
///
/// The PWM is looked up through `node` when given, else by the LED name.
/// A provider period of zero falls back to `led.pwm_period_ns`.
pub fn build_single(
    provider: &impl PwmProvider,
    registry: &mut impl LedRegistry,
    led: &LedPwm,
    node: Option<&Node>,
) -> Result<LedDevice> {
    check_max_brightness(led)?;

    let lookup = match node {
        Some(node) => PwmLookup::ByNode(node),
        None => PwmLookup::ByName(&led.name),
    };
    let pwm = request(provider, &led.name, lookup)?;
    let args = pwm.args();
    let period = if args.period == 0 && led.pwm_period_ns > 0 {
        led.pwm_period_ns
    } else {
        args.period
    };

    let channels = vec![ColorChannel::new(SINGLE_CHANNEL, led.max_brightness)];
    let elements = vec![Element::new(Some(0), pwm, led.active_low, period)];
    let mut device = LedDevice::new(
        &led.name,
        led.default_trigger.as_deref(),
        led.max_brightness,
        LedKind::Single,
        channels,
        elements,
    );

    register(registry, &device)?;
    device.set_brightness(device.brightness());
    log::debug!("{}: single PWM LED, period {period} ns", led.name);
    Ok(device)
}

/// Multi-color LED: one channel and one PWM per `element-*` node, in order.
///
/// Periods come from the provider only; a zero period leaves that element
/// permanently off.
pub fn build_multi(
    provider: &impl PwmProvider,
    registry: &mut impl LedRegistry,
    led: &LedPwm,
    element_nodes: &[&Node],
) -> Result<LedDevice> {
    check_max_brightness(led)?;
    if element_nodes.is_empty() {
        return Err(PwmLedError::InvalidLed {
            led: led.name.clone(),
            reason: "multi-color LED needs at least one element".into(),
        });
    }

    let mut channels = Vec::with_capacity(element_nodes.len());
    let mut elements = Vec::with_capacity(element_nodes.len());
    for (index, node) in element_nodes.iter().enumerate() {
        let spec = ChannelSpec::from_node(node).map_err(|e| e.for_led(&led.name))?;
        channels.push(ColorChannel::new(spec.color, spec.max_value));

        let pwm = request(provider, &led.name, PwmLookup::ByNode(*node))?;
        let period = pwm.args().period;
        elements.push(Element::new(Some(index), pwm, spec.active_low, period));
    }

    let mut device = LedDevice::new(
        &led.name,
        led.default_trigger.as_deref(),
        led.max_brightness,
        LedKind::MultiColor,
        channels,
        elements,
    );

    register(registry, &device)?;
    device.set_brightness(device.brightness());
    log::debug!(
        "{}: multi-color PWM LED with {} elements",
        led.name,
        device.elements().len()
    );
    Ok(device)
}

fn check_max_brightness(led: &LedPwm) -> Result<()> {
    if led.max_brightness == 0 {
        return Err(PwmLedError::InvalidLed {
            led: led.name.clone(),
            reason: "max-brightness must be non-zero".into(),
        });
    }
    Ok(())
}

/// Acquire a PWM. Deferred failures are expected during boot and are not
/// logged as errors.
fn request(
    provider: &impl PwmProvider,
    led: &str,
    lookup: PwmLookup<'_>,
) -> Result<Box<dyn PwmChannel>> {
    provider.request(lookup).map_err(|source| {
        if source.is_deferred() {
            log::debug!("{led}: PWM {lookup} deferred: {source}");
        } else {
            log::error!("unable to request PWM for {led}: {source}");
        }
        PwmLedError::Pwm {
            led: led.to_string(),
            source,
        }
    })
}

fn register(registry: &mut impl LedRegistry, device: &LedDevice) -> Result<()> {
    registry.register(device).map_err(|source| {
        log::error!("failed to register PWM LED {}: {source}", device.name());
        PwmLedError::Registration {
            led: device.name().to_string(),
            source,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pwm::PwmError;
    use crate::pwm::mock::{MockPwm, PwmCall};
    use crate::registry::mock::{MockRegistry, RegistryCall};

    fn mono(name: &str) -> LedPwm {
        LedPwm {
            name: name.into(),
            ..LedPwm::default()
        }
    }

    fn element(name: &str, max: u32) -> Node {
        Node::new(name)
            .with_property("max-value", max)
            .with_property("pwms", format!("pwm-{name}"))
    }

    // ── single path ──

    #[test]
    fn single_defaults() {
        let pwm = MockPwm::new();
        let mut reg = MockRegistry::new();
        let dev = build_single(&pwm, &mut reg, &mono("status"), None).unwrap();

        assert_eq!(dev.kind(), LedKind::Single);
        assert_eq!(dev.channels().len(), 1);
        assert_eq!(dev.channels()[0].name(), "single");
        assert_eq!(dev.channels()[0].max_value(), 255);
        assert_eq!(dev.channels()[0].value(), 255);
        assert_eq!(dev.elements().len(), 1);
        assert_eq!(dev.elements()[0].channel_index(), Some(0));
        assert!(!dev.elements()[0].active_low());
        assert_eq!(reg.calls, [RegistryCall::Register("status".into())]);
    }

    #[test]
    fn single_initial_state_is_off() {
        let pwm = MockPwm::new();
        let mut reg = MockRegistry::new();
        let dev = build_single(&pwm, &mut reg, &mono("status"), None).unwrap();
        assert_eq!(dev.brightness(), 0);
        assert_eq!(dev.elements()[0].duty(), 0);
        assert_eq!(
            pwm.calls(),
            [
                PwmCall::Request("status".into()),
                PwmCall::Configure {
                    pwm: "status".into(),
                    duty: 0,
                    period: 1000
                },
                PwmCall::Disable("status".into()),
            ]
        );
    }

    #[test]
    fn single_active_low_initial_state_is_full_duty() {
        let pwm = MockPwm::new();
        let mut reg = MockRegistry::new();
        let led = LedPwm {
            active_low: true,
            ..mono("status")
        };
        let dev = build_single(&pwm, &mut reg, &led, None).unwrap();
        assert_eq!(dev.elements()[0].duty(), 1000);
    }

    #[test]
    fn single_period_falls_back_to_configured() {
        let pwm = MockPwm::new();
        pwm.set_period("status", 0);
        let mut reg = MockRegistry::new();
        let led = LedPwm {
            pwm_period_ns: 5_000_000,
            ..mono("status")
        };
        let dev = build_single(&pwm, &mut reg, &led, None).unwrap();
        assert_eq!(dev.elements()[0].period(), 5_000_000);
    }

    #[test]
    fn single_provider_period_wins() {
        let pwm = MockPwm::new();
        pwm.set_period("status", 20_000);
        let mut reg = MockRegistry::new();
        let led = LedPwm {
            pwm_period_ns: 5_000_000,
            ..mono("status")
        };
        let dev = build_single(&pwm, &mut reg, &led, None).unwrap();
        assert_eq!(dev.elements()[0].period(), 20_000);
    }

    #[test]
    fn single_looks_up_by_node_when_given() {
        let pwm = MockPwm::new();
        let mut reg = MockRegistry::new();
        let node = Node::new("led-0").with_property("pwms", "pwmchip0:0");
        build_single(&pwm, &mut reg, &mono("status"), Some(&node)).unwrap();
        assert_eq!(pwm.calls()[0], PwmCall::Request("pwmchip0:0".into()));
    }

    #[test]
    fn single_zero_max_brightness_rejected_before_request() {
        let pwm = MockPwm::new();
        let mut reg = MockRegistry::new();
        let led = LedPwm {
            max_brightness: 0,
            ..mono("status")
        };
        let err = build_single(&pwm, &mut reg, &led, None).unwrap_err();
        assert!(err.is_config(), "got {err}");
        assert_eq!(err.led_name(), Some("status"));
        assert!(pwm.calls().is_empty());
        assert!(reg.calls.is_empty());
    }

    #[test]
    fn single_deferred_propagates_unchanged() {
        let pwm = MockPwm::new();
        pwm.fail_request("status", PwmError::Deferred("chip missing".into()));
        let mut reg = MockRegistry::new();
        let err = build_single(&pwm, &mut reg, &mono("status"), None).unwrap_err();
        assert!(err.is_deferred());
        assert_eq!(err.led_name(), Some("status"));
        assert!(reg.calls.is_empty());
    }

    #[test]
    fn single_registration_failure_releases_pwm() {
        let pwm = MockPwm::new();
        let mut reg = MockRegistry::new();
        reg.reject("status");
        let err = build_single(&pwm, &mut reg, &mono("status"), None).unwrap_err();
        assert!(matches!(err, PwmLedError::Registration { .. }));
        assert_eq!(pwm.releases(), ["status"]);
        assert!(pwm.held().is_empty());
        // Nothing driven before registration succeeded.
        assert!(
            !pwm.calls()
                .iter()
                .any(|c| matches!(c, PwmCall::Configure { .. }))
        );
    }

    // ── multi path ──

    #[test]
    fn multi_builds_channel_per_element() {
        let pwm = MockPwm::new();
        let mut reg = MockRegistry::new();
        let red = element("element-red", 255);
        let green = element("element-green", 100).with_property("active-low", true);
        let dev = build_multi(&pwm, &mut reg, &mono("rgb"), &[&red, &green]).unwrap();

        assert_eq!(dev.kind(), LedKind::MultiColor);
        assert!(dev.flags().multi_color);
        let names: Vec<&str> = dev.channels().iter().map(|c| c.name()).collect();
        assert_eq!(names, ["red", "green"]);
        assert_eq!(dev.channels()[1].max_value(), 100);
        assert_eq!(dev.elements()[0].channel_index(), Some(0));
        assert_eq!(dev.elements()[1].channel_index(), Some(1));
        assert!(!dev.elements()[0].active_low());
        assert!(dev.elements()[1].active_low());
    }

    #[test]
    fn multi_color_property_overrides_node_name() {
        let pwm = MockPwm::new();
        let mut reg = MockRegistry::new();
        let node = element("element-0", 255).with_property("color", "amber");
        let dev = build_multi(&pwm, &mut reg, &mono("x"), &[&node]).unwrap();
        assert_eq!(dev.channels()[0].name(), "amber");
    }

    #[test]
    fn multi_zero_period_stays_zero() {
        let pwm = MockPwm::new();
        pwm.set_period("pwm-element-red", 0);
        let mut reg = MockRegistry::new();
        let led = LedPwm {
            pwm_period_ns: 5_000_000,
            ..mono("rgb")
        };
        let red = element("element-red", 255);
        let mut dev = build_multi(&pwm, &mut reg, &led, &[&red]).unwrap();
        assert_eq!(dev.elements()[0].period(), 0);
        dev.set_brightness(255);
        assert_eq!(dev.elements()[0].duty(), 0);
    }

    #[test]
    fn multi_acquisition_failure_releases_earlier_elements() {
        let pwm = MockPwm::new();
        pwm.fail_request(
            "pwm-element-blue",
            PwmError::NotFound("no such chip".into()),
        );
        let mut reg = MockRegistry::new();
        let red = element("element-red", 255);
        let green = element("element-green", 255);
        let blue = element("element-blue", 255);
        let err = build_multi(&pwm, &mut reg, &mono("rgb"), &[&red, &green, &blue]).unwrap_err();

        assert!(!err.is_deferred());
        assert!(pwm.held().is_empty(), "no partial element set is kept");
        assert_eq!(pwm.releases().len(), 2);
        assert!(reg.calls.is_empty());
    }

    #[test]
    fn multi_missing_max_value_is_config_error() {
        let pwm = MockPwm::new();
        let mut reg = MockRegistry::new();
        let bad = Node::new("element-red").with_property("pwms", "p");
        let err = build_multi(&pwm, &mut reg, &mono("rgb"), &[&bad]).unwrap_err();
        assert!(err.is_config(), "got {err}");
        assert_eq!(err.led_name(), Some("rgb"));
        assert!(err.to_string().contains("rgb: element-red"), "got {err}");
        assert!(pwm.calls().is_empty());
    }

    #[test]
    fn multi_initial_state_drives_every_element() {
        let pwm = MockPwm::new();
        let mut reg = MockRegistry::new();
        let red = element("element-red", 255);
        let blue = element("element-blue", 255);
        build_multi(&pwm, &mut reg, &mono("rgb"), &[&red, &blue]).unwrap();
        let disables: Vec<PwmCall> = pwm
            .calls()
            .into_iter()
            .filter(|c| matches!(c, PwmCall::Disable(_)))
            .collect();
        assert_eq!(
            disables,
            [
                PwmCall::Disable("pwm-element-red".into()),
                PwmCall::Disable("pwm-element-blue".into()),
            ]
        );
    }

    #[test]
    fn multi_without_elements_rejected() {
        let pwm = MockPwm::new();
        let mut reg = MockRegistry::new();
        assert!(build_multi(&pwm, &mut reg, &mono("rgb"), &[]).is_err());
    }

    #[test]
    fn build_device_dispatches_on_kind() {
        let pwm = MockPwm::new();
        let mut reg = MockRegistry::new();
        let node = Node::new("rgb")
            .with_child(element("element-red", 255))
            .with_child(Node::new("other"));
        let record = LedRecord::from_node(&node).unwrap();
        let dev = build_device(&pwm, &mut reg, &record).unwrap();
        assert_eq!(dev.kind(), LedKind::MultiColor);
        assert_eq!(dev.channels().len(), 1);

        let static_record = LedRecord::from_static(&mono("plain"));
        let dev = build_device(&pwm, &mut reg, &static_record).unwrap();
        assert_eq!(dev.kind(), LedKind::Single);
    }
}
