// Mock GPIO provider for testing and simulated chips
//
// Copyright 2023 Linaro Ltd. All Rights Reserved.
//          Viresh Kumar <viresh.kumar@linaro.org>
//
// SPDX-License-Identifier: Apache-2.0 or BSD-3-Clause

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::info;

use crate::gpio::{Direction, Error, GpioDevice, Result};

#[derive(Debug, Clone, Default)]
struct MockLineState {
    consumer: Option<String>,
    busy: bool,
    dir: Option<Direction>,
    val: bool,
}

#[derive(Debug)]
pub struct MockGpioDevice {
    ngpio: u32,
    lines: RwLock<Vec<MockLineState>>,
    pub(crate) set_direction_result: Result<()>,
    pub(crate) value_result: Result<()>,
    pub(crate) set_value_result: Result<()>,
}

impl MockGpioDevice {
    pub fn new(ngpio: u32) -> Self {
        Self {
            ngpio,
            lines: RwLock::new(vec![MockLineState::default(); ngpio as usize]),
            set_direction_result: Ok(()),
            value_result: Ok(()),
            set_value_result: Ok(()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<MockLineState>> {
        self.lines.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<MockLineState>> {
        self.lines.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self, gpio: u32) -> Result<()> {
        if gpio >= self.ngpio {
            return Err(Error::LineInvalid(gpio));
        }
        Ok(())
    }

    fn check_requested(&self, gpio: u32) -> Result<()> {
        self.check(gpio)?;
        if self.read()[gpio as usize].consumer.is_none() {
            return Err(Error::LineNotRequested(gpio));
        }
        Ok(())
    }

    /// Simulate a line held by another consumer.
    pub fn mark_busy(&self, gpio: u32) {
        if let Some(line) = self.write().get_mut(gpio as usize) {
            line.busy = true;
        }
    }

    pub fn consumer(&self, gpio: u32) -> Option<String> {
        self.read().get(gpio as usize)?.consumer.clone()
    }

    pub fn is_requested(&self, gpio: u32) -> bool {
        self.consumer(gpio).is_some()
    }

    pub fn direction(&self, gpio: u32) -> Option<Direction> {
        self.read().get(gpio as usize)?.dir
    }

    /// Level of the line as last driven, regardless of ownership.
    pub fn line_value(&self, gpio: u32) -> Option<bool> {
        self.read().get(gpio as usize).map(|line| line.val)
    }

    /// Drive an input line from the outside world.
    pub fn set_line_value(&self, gpio: u32, value: bool) {
        if let Some(line) = self.write().get_mut(gpio as usize) {
            line.val = value;
        }
    }
}

impl GpioDevice for MockGpioDevice {
    fn open(ngpio: u32) -> Result<Self>
    where
        Self: Sized,
    {
        Ok(MockGpioDevice::new(ngpio))
    }

    fn num_gpios(&self) -> Result<u32> {
        Ok(self.ngpio)
    }

    fn request(&self, gpio: u32, consumer: &str) -> Result<()> {
        self.check(gpio)?;

        let mut lines = self.write();
        let line = &mut lines[gpio as usize];
        if line.busy || line.consumer.is_some() {
            return Err(Error::LineBusy(gpio));
        }

        info!("gpio {} requested by {}", gpio, consumer);
        line.consumer = Some(consumer.to_string());
        Ok(())
    }

    fn release(&self, gpio: u32) -> Result<()> {
        self.check_requested(gpio)?;

        info!("gpio {} released", gpio);
        let mut lines = self.write();
        let line = &mut lines[gpio as usize];
        line.consumer = None;
        line.dir = None;
        Ok(())
    }

    fn set_direction(&self, gpio: u32, dir: Direction, value: bool) -> Result<()> {
        self.check_requested(gpio)?;
        info!("gpio {} set direction to {}", gpio, dir);

        if self.set_direction_result.is_err() {
            return self.set_direction_result;
        }

        let mut lines = self.write();
        let line = &mut lines[gpio as usize];
        line.dir = Some(dir);
        if dir == Direction::Output {
            line.val = value;
        }
        Ok(())
    }

    fn value(&self, gpio: u32) -> Result<bool> {
        self.check_requested(gpio)?;
        self.value_result?;

        Ok(self.read()[gpio as usize].val)
    }

    fn set_value(&self, gpio: u32, value: bool) -> Result<()> {
        self.check_requested(gpio)?;
        info!("gpio {} set value to {}", gpio, value as u8);

        if self.set_value_result.is_err() {
            return self.set_value_result;
        }

        self.write()[gpio as usize].val = value;
        Ok(())
    }
}
