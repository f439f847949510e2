// Named GPIO controller
//
// Copyright 2022 Linaro Ltd. All Rights Reserved.
//          Viresh Kumar <viresh.kumar@linaro.org>
//
// SPDX-License-Identifier: Apache-2.0 or BSD-3-Clause

use std::{
    collections::{BTreeSet, HashMap},
    io,
    num::ParseIntError,
    sync::{Mutex, PoisonError},
};

use log::{info, warn};
use thiserror::Error as ThisError;

use crate::{
    gpio::{self, Direction, GpioDevice},
    pin_table::{PinDescriptor, PinTable},
};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, ThisError)]
/// Errors related to named pin access
pub enum Error {
    #[error("Gpio specified not found: {0}")]
    NameNotFound(String),
    #[error("Failed while parsing to integer: {0:?}")]
    ParseError(ParseIntError),
    #[error("Gpio {0} is configured for input, no value being set")]
    WrongDirection(String),
    #[error("Controller not attached")]
    NotAttached,
    #[error("Controller already attached")]
    AlreadyAttached,
    #[error("Gpio lines still held from a failed attach, detach first")]
    DetachRequired,
    #[error("Gpio {0} was not acquired")]
    PinUnavailable(String),
    #[error("Could not acquire gpio {name}: {source}")]
    AcquireFailed { name: String, source: gpio::Error },
    #[error("Could not expose attributes: {0}")]
    AttachFailed(io::Error),
    #[error("Gpio operation failed: {0}")]
    Gpio(gpio::Error),
}

/// Behaviour knobs, lenient by default.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Policy {
    /// Fail writes to input pins with `Error::WrongDirection` instead of
    /// ignoring them.
    pub strict_direction: bool,
    /// Abort attach on the first pin that can't be acquired.
    pub fail_fast: bool,
}

/// Owns the gpio lines named by a `PinTable` between `attach()` and
/// `detach()`, and dispatches reads and writes by logical name.
///
/// `attach()` and `detach()` take `&mut self`, so they can't overlap with
/// each other or with `read()`/`write()`. Accesses to one line are
/// serialized, accesses to distinct lines are not.
pub struct PinController<D: GpioDevice> {
    device: D,
    table: PinTable,
    policy: Policy,
    attached: bool,
    acquired: BTreeSet<u32>,
    locks: HashMap<u32, Mutex<()>>,
}

impl<D: GpioDevice> PinController<D> {
    pub fn new(device: D, table: PinTable) -> Self {
        Self::with_policy(device, table, Policy::default())
    }

    pub fn with_policy(device: D, table: PinTable, policy: Policy) -> Self {
        let locks = table
            .entries()
            .iter()
            .map(|pin| (pin.gpio, Mutex::new(())))
            .collect();

        Self {
            device,
            table,
            policy,
            attached: false,
            acquired: BTreeSet::new(),
            locks,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn table(&self) -> &PinTable {
        &self.table
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Physical lines currently owned, in ascending order.
    pub fn acquired(&self) -> Vec<u32> {
        self.acquired.iter().copied().collect()
    }

    fn acquire(&self, pin: &PinDescriptor, ngpio: u32) -> gpio::Result<()> {
        if pin.gpio >= ngpio {
            return Err(gpio::Error::LineInvalid(pin.gpio));
        }

        self.device.request(pin.gpio, &pin.name)?;

        if let Err(e) = self
            .device
            .set_direction(pin.gpio, pin.direction, pin.default_value)
        {
            // Don't keep a line we couldn't configure.
            if let Err(e) = self.device.release(pin.gpio) {
                warn!("{}: gpio {} release error: {e}", pin.name, pin.gpio);
            }
            return Err(e);
        }

        Ok(())
    }

    /// Acquire and configure every pin of the table, in table order.
    ///
    /// Pins that can't be acquired are skipped unless `Policy::fail_fast`
    /// is set. With fail-fast, the lines acquired so far stay owned until
    /// `detach()`, and `attach()` fails with `Error::DetachRequired` until
    /// then.
    pub fn attach(&mut self) -> Result<()> {
        if self.attached {
            return Err(Error::AlreadyAttached);
        }

        if !self.acquired.is_empty() {
            return Err(Error::DetachRequired);
        }

        let ngpio = self.device.num_gpios().map_err(Error::Gpio)?;

        for pin in self.table.entries() {
            if let Err(e) = self.acquire(pin, ngpio) {
                if self.policy.fail_fast {
                    return Err(Error::AcquireFailed {
                        name: pin.name.clone(),
                        source: e,
                    });
                }

                warn!("{} : gpio {} request error: {e}", pin.name, pin.gpio);
                continue;
            }

            info!(
                "{} : gpio {} acquired as {}",
                pin.name, pin.gpio, pin.direction
            );
            self.acquired.insert(pin.gpio);
        }

        self.attached = true;
        Ok(())
    }

    /// Release every owned line. Calling it again is a no-op.
    pub fn detach(&mut self) {
        for gpio in std::mem::take(&mut self.acquired) {
            match self.device.release(gpio) {
                Ok(()) => info!("gpio {gpio} released"),
                Err(e) => warn!("gpio {gpio} release error: {e}"),
            }
        }

        self.attached = false;
    }

    fn resolve(&self, name: &str) -> Result<&PinDescriptor> {
        let pin = self
            .table
            .lookup(name)
            .ok_or_else(|| Error::NameNotFound(name.to_string()))?;

        if !self.attached {
            return Err(Error::NotAttached);
        }

        if !self.acquired.contains(&pin.gpio) {
            return Err(Error::PinUnavailable(name.to_string()));
        }

        Ok(pin)
    }

    fn with_line<T>(
        &self,
        pin: &PinDescriptor,
        f: impl FnOnce() -> gpio::Result<T>,
    ) -> Result<T> {
        // The lock map is built from the same table, every pin has an entry.
        let _guard = self
            .locks
            .get(&pin.gpio)
            .map(|lock| lock.lock().unwrap_or_else(PoisonError::into_inner));

        f().map_err(Error::Gpio)
    }

    /// Current level of the named pin, whatever its direction.
    pub fn read(&self, name: &str) -> Result<bool> {
        let pin = self.resolve(name)?;

        self.with_line(pin, || self.device.value(pin.gpio))
    }

    /// Parse `raw` as a decimal integer and drive the named output pin,
    /// nonzero meaning high.
    pub fn write(&self, name: &str, raw: &str) -> Result<()> {
        let value = raw.trim().parse::<i64>().map_err(Error::ParseError)? != 0;
        let pin = self.resolve(name)?;

        if pin.direction == Direction::Input {
            if self.policy.strict_direction {
                return Err(Error::WrongDirection(pin.name.clone()));
            }

            warn!("{} is configured for input, no value being set", pin.name);
            return Ok(());
        }

        self.with_line(pin, || self.device.set_value(pin.gpio, value))
    }
}

impl<D: GpioDevice> Drop for PinController<D> {
    fn drop(&mut self) {
        self.detach();
    }
}
