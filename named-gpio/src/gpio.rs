// GPIO line provider
//
// Copyright 2022 Linaro Ltd. All Rights Reserved.
//          Viresh Kumar <viresh.kumar@linaro.org>
//
// SPDX-License-Identifier: Apache-2.0 or BSD-3-Clause

use std::{fmt, sync::Arc};

#[cfg(feature = "libgpiod")]
use std::sync::{Mutex, MutexGuard, PoisonError};

#[cfg(feature = "libgpiod")]
use libgpiod::{chip, line, request, Error as LibGpiodError};
use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Copy, Clone, Debug, PartialEq, ThisError)]
/// Errors related to low level gpio helpers
pub enum Error {
    #[error("Invalid gpio line: {0}")]
    LineInvalid(u32),
    #[error("Gpio line {0} is busy")]
    LineBusy(u32),
    #[error("Gpio line {0} not requested")]
    LineNotRequested(u32),
    #[cfg(feature = "libgpiod")]
    #[error("Gpiod operation failed {0:?}")]
    GpiodFailed(LibGpiodError),
    #[cfg(test)]
    #[error("Gpio test Operation failed {0}")]
    GpioOperationFailed(&'static str),
}

/// Configured direction of a gpio line.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Input => write!(f, "in"),
            Direction::Output => write!(f, "out"),
        }
    }
}

/// Trait that represents a GPIO provider.
///
/// A line must be requested before its direction or value can be touched,
/// and stays owned by the requester until it is released. The mock
/// implementation lets the controller be tested without a physical chip.
pub trait GpioDevice: Send + Sync + 'static {
    fn open(device: u32) -> Result<Self>
    where
        Self: Sized;

    fn num_gpios(&self) -> Result<u32>;
    fn request(&self, gpio: u32, consumer: &str) -> Result<()>;
    fn release(&self, gpio: u32) -> Result<()>;
    /// `value` is only applied for `Direction::Output`.
    fn set_direction(&self, gpio: u32, dir: Direction, value: bool) -> Result<()>;
    fn value(&self, gpio: u32) -> Result<bool>;
    fn set_value(&self, gpio: u32, value: bool) -> Result<()>;
}

// Lets several owners share one chip.
impl<T: GpioDevice> GpioDevice for Arc<T> {
    fn open(device: u32) -> Result<Self>
    where
        Self: Sized,
    {
        T::open(device).map(Arc::new)
    }

    fn num_gpios(&self) -> Result<u32> {
        (**self).num_gpios()
    }

    fn request(&self, gpio: u32, consumer: &str) -> Result<()> {
        (**self).request(gpio, consumer)
    }

    fn release(&self, gpio: u32) -> Result<()> {
        (**self).release(gpio)
    }

    fn set_direction(&self, gpio: u32, dir: Direction, value: bool) -> Result<()> {
        (**self).set_direction(gpio, dir, value)
    }

    fn value(&self, gpio: u32) -> Result<bool> {
        (**self).value(gpio)
    }

    fn set_value(&self, gpio: u32, value: bool) -> Result<()> {
        (**self).set_value(gpio, value)
    }
}

#[cfg(feature = "libgpiod")]
pub struct PhysDevice {
    chip: Mutex<chip::Chip>,
    ngpio: u32,
    requests: Vec<Mutex<Option<request::Request>>>,
}

#[cfg(feature = "libgpiod")]
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(feature = "libgpiod")]
impl PhysDevice {
    fn line(&self, gpio: u32) -> Result<&Mutex<Option<request::Request>>> {
        self.requests
            .get(gpio as usize)
            .ok_or(Error::LineInvalid(gpio))
    }
}

#[cfg(feature = "libgpiod")]
fn gpiod_value(value: bool) -> line::Value {
    if value {
        line::Value::Active
    } else {
        line::Value::InActive
    }
}

#[cfg(feature = "libgpiod")]
impl GpioDevice for PhysDevice {
    fn open(device: u32) -> Result<Self>
    where
        Self: Sized,
    {
        let path = format!("/dev/gpiochip{device}");
        let chip = chip::Chip::open(&path).map_err(Error::GpiodFailed)?;
        let ngpio = chip.info().map_err(Error::GpiodFailed)?.num_lines() as u32;

        let mut requests = Vec::new();
        requests.resize_with(ngpio as usize, || Mutex::new(None));

        Ok(PhysDevice {
            chip: Mutex::new(chip),
            ngpio,
            requests,
        })
    }

    fn num_gpios(&self) -> Result<u32> {
        Ok(self.ngpio)
    }

    fn request(&self, gpio: u32, consumer: &str) -> Result<()> {
        let mut state = lock(self.line(gpio)?);
        if state.is_some() {
            return Err(Error::LineBusy(gpio));
        }

        // Leave the line as is until a direction gets configured.
        let lsettings = line::Settings::new().map_err(Error::GpiodFailed)?;
        let mut lconfig = line::Config::new().map_err(Error::GpiodFailed)?;
        lconfig
            .add_line_settings(&[gpio], lsettings)
            .map_err(Error::GpiodFailed)?;

        let mut rconfig = request::Config::new().map_err(Error::GpiodFailed)?;
        rconfig.set_consumer(consumer).map_err(Error::GpiodFailed)?;

        // The kernel refuses lines owned by another consumer.
        let request = lock(&self.chip)
            .request_lines(Some(&rconfig), &lconfig)
            .map_err(|_| Error::LineBusy(gpio))?;

        *state = Some(request);
        Ok(())
    }

    fn release(&self, gpio: u32) -> Result<()> {
        // Dropping the request hands the line back to the kernel.
        lock(self.line(gpio)?)
            .take()
            .map(|_| ())
            .ok_or(Error::LineNotRequested(gpio))
    }

    fn set_direction(&self, gpio: u32, dir: Direction, value: bool) -> Result<()> {
        let mut lsettings = line::Settings::new().map_err(Error::GpiodFailed)?;

        match dir {
            Direction::Input => {
                lsettings
                    .set_direction(line::Direction::Input)
                    .map_err(Error::GpiodFailed)?;
            }
            Direction::Output => {
                lsettings
                    .set_direction(line::Direction::Output)
                    .map_err(Error::GpiodFailed)?
                    .set_output_value(gpiod_value(value))
                    .map_err(Error::GpiodFailed)?;
            }
        }

        let mut lconfig = line::Config::new().map_err(Error::GpiodFailed)?;
        lconfig
            .add_line_settings(&[gpio], lsettings)
            .map_err(Error::GpiodFailed)?;

        lock(self.line(gpio)?)
            .as_mut()
            .ok_or(Error::LineNotRequested(gpio))?
            .reconfigure_lines(&lconfig)
            .map_err(Error::GpiodFailed)
    }

    fn value(&self, gpio: u32) -> Result<bool> {
        let state = lock(self.line(gpio)?);
        let request = state.as_ref().ok_or(Error::LineNotRequested(gpio))?;

        Ok(request.value(gpio).map_err(Error::GpiodFailed)? == line::Value::Active)
    }

    fn set_value(&self, gpio: u32, value: bool) -> Result<()> {
        let mut state = lock(self.line(gpio)?);
        let request = state.as_mut().ok_or(Error::LineNotRequested(gpio))?;

        request
            .set_value(gpio, gpiod_value(value))
            .map_err(Error::GpiodFailed)?;
        Ok(())
    }
}
