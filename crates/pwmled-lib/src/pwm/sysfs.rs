//! Linux sysfs PWM backend (`/sys/class/pwm`).
//!
//! Layout: `<root>/pwmchipN/{export,unexport}` and
//! `<root>/pwmchipN/pwmM/{period,duty_cycle,enable,polarity}`.
//! A missing `pwmchipN` means the chip driver has not probed yet and is
//! reported as `Deferred`.
//!
//! A channel is held by at most one handle per provider. Channels this
//! provider exported are unexported when their handle drops; channels that
//! were already exported are left in place.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::{
    Polarity, PwmArgs, PwmChannel, PwmError, PwmLookup, PwmProvider, PwmRef, Result,
};

pub const DEFAULT_SYSFS_ROOT: &str = "/sys/class/pwm";

/// `(chip, channel)` pairs with a live handle.
type HeldSet = Rc<RefCell<HashSet<(u32, u32)>>>;

/// PWM provider backed by the sysfs class interface.
#[derive(Debug, Clone)]
pub struct SysfsPwm {
    root: PathBuf,
    /// By-name lookup table (static configuration source).
    lookup: HashMap<String, PwmRef>,
    held: HeldSet,
}

impl Default for SysfsPwm {
    fn default() -> Self {
        Self::new(DEFAULT_SYSFS_ROOT)
    }
}

impl SysfsPwm {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        SysfsPwm {
            root: root.into(),
            lookup: HashMap::new(),
            held: HeldSet::default(),
        }
    }

    pub fn with_lookup(mut self, lookup: HashMap<String, PwmRef>) -> Self {
        self.lookup = lookup;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, lookup: PwmLookup<'_>) -> Result<PwmRef> {
        match lookup {
            PwmLookup::ByName(name) => self
                .lookup
                .get(name)
                .cloned()
                .ok_or_else(|| PwmError::NotFound(format!("{name}: no pwm_lookup entry"))),
            PwmLookup::ByNode(node) => match node.read_string("pwms") {
                Ok(Some(spec)) => spec.parse(),
                Ok(None) => Err(PwmError::NotFound(format!("{node}: no pwms property"))),
                Err(e) => Err(PwmError::NotFound(format!("{node}: {e}"))),
            },
        }
    }
}

impl PwmProvider for SysfsPwm {
    fn request(&self, lookup: PwmLookup<'_>) -> Result<Box<dyn PwmChannel>> {
        let pwm_ref = self.resolve(lookup)?;
        let key = (pwm_ref.chip, pwm_ref.channel);
        let label = format!("pwmchip{}/pwm{}", pwm_ref.chip, pwm_ref.channel);
        if self.held.borrow().contains(&key) {
            return Err(PwmError::RequestFailed(format!("{label}: busy")));
        }

        let chip_dir = self.root.join(format!("pwmchip{}", pwm_ref.chip));
        if !chip_dir.is_dir() {
            return Err(PwmError::Deferred(format!(
                "{}: chip not present",
                chip_dir.display()
            )));
        }

        let dir = chip_dir.join(format!("pwm{}", pwm_ref.channel));
        let exported = !dir.is_dir();
        if exported {
            write_attr(&chip_dir.join("export"), pwm_ref.channel)
                .map_err(PwmError::RequestFailed)?;
            if !dir.is_dir() {
                return Err(PwmError::RequestFailed(format!(
                    "{}: not created by export",
                    dir.display()
                )));
            }
        }

        // From here on the handle's Drop undoes both the hold and the export.
        self.held.borrow_mut().insert(key);
        let mut channel = SysfsChannel {
            label,
            chip_dir,
            dir,
            key,
            exported,
            held: Rc::clone(&self.held),
            args: PwmArgs::default(),
            period: 0,
            duty: 0,
        };
        channel.apply_reference(&pwm_ref)?;
        log::debug!("acquired {} via {lookup}", channel.label);
        Ok(Box::new(channel))
    }
}

struct SysfsChannel {
    label: String,
    chip_dir: PathBuf,
    dir: PathBuf,
    key: (u32, u32),
    /// Whether `request` wrote `export` for this channel.
    exported: bool,
    held: HeldSet,
    args: PwmArgs,
    /// Last values written, used to order period/duty writes.
    period: u32,
    duty: u32,
}

impl SysfsChannel {
    /// Write the reference's period/polarity (if any) and capture the
    /// resulting defaults.
    fn apply_reference(&mut self, pwm_ref: &PwmRef) -> Result<()> {
        self.period = read_u32_attr(&self.dir.join("period")).unwrap_or(0);
        self.duty = read_u32_attr(&self.dir.join("duty_cycle")).unwrap_or(0);
        if let Some(period) = pwm_ref.period {
            // A leftover duty above the new period would make the period write fail.
            let duty = if self.duty > period { 0 } else { self.duty };
            self.write_timing(duty, period).map_err(PwmError::RequestFailed)?;
            // Polarity can only change while disabled.
            write_attr(&self.dir.join("enable"), 0).map_err(PwmError::RequestFailed)?;
            write_attr(&self.dir.join("polarity"), pwm_ref.polarity)
                .map_err(PwmError::RequestFailed)?;
        }
        let polarity = match fs::read_to_string(self.dir.join("polarity")) {
            Ok(s) if s.trim() == "inversed" => Polarity::Inversed,
            _ => Polarity::Normal,
        };
        self.args = PwmArgs {
            period: self.period,
            polarity,
        };
        Ok(())
    }

    /// Write duty and period in an order that never leaves duty above period.
    fn write_timing(&mut self, duty_ns: u32, period_ns: u32) -> std::result::Result<(), String> {
        for attr in timing_order(self.duty, period_ns) {
            let value = if attr == "period" { period_ns } else { duty_ns };
            write_attr(&self.dir.join(attr), value)?;
        }
        self.period = period_ns;
        self.duty = duty_ns;
        Ok(())
    }
}

/// Attribute write order for a new period, given the duty currently
/// programmed. The kernel rejects duty_cycle > period at every step.
fn timing_order(current_duty: u32, period_ns: u32) -> [&'static str; 2] {
    if period_ns >= current_duty {
        ["period", "duty_cycle"]
    } else {
        ["duty_cycle", "period"]
    }
}

impl PwmChannel for SysfsChannel {
    fn label(&self) -> &str {
        &self.label
    }

    fn args(&self) -> PwmArgs {
        self.args
    }

    fn configure(&mut self, duty_ns: u32, period_ns: u32) -> Result<()> {
        self.write_timing(duty_ns, period_ns).map_err(PwmError::ApplyFailed)
    }

    fn enable(&mut self) -> Result<()> {
        write_attr(&self.dir.join("enable"), 1).map_err(PwmError::ApplyFailed)
    }

    fn disable(&mut self) -> Result<()> {
        write_attr(&self.dir.join("enable"), 0).map_err(PwmError::ApplyFailed)
    }
}

impl Drop for SysfsChannel {
    fn drop(&mut self) {
        self.held.borrow_mut().remove(&self.key);
        if !self.exported {
            log::debug!("released {} (left exported)", self.label);
            return;
        }
        if let Err(e) = write_attr(&self.chip_dir.join("unexport"), self.key.1) {
            log::warn!("release {}: {e}", self.label);
        }
    }
}

/// Write a sysfs attribute. Errors are formatted as "path: details".
fn write_attr(path: &Path, value: impl std::fmt::Display) -> std::result::Result<(), String> {
    fs::write(path, value.to_string()).map_err(|e| format!("{}: {e}", path.display()))
}

fn read_u32_attr(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}
