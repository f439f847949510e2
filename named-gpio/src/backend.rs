// Named GPIO attributes over stdin/stdout
//
// Copyright 2022 Linaro Ltd. All Rights Reserved.
//          Viresh Kumar <viresh.kumar@linaro.org>
//
// SPDX-License-Identifier: Apache-2.0 or BSD-3-Clause

use std::{
    io::{self, BufRead, Write},
    num::ParseIntError,
    process::exit,
};

use clap::Parser;
use env_logger::Env;
use log::{error, info};
use thiserror::Error as ThisError;

#[cfg(feature = "libgpiod")]
use crate::gpio::PhysDevice;
use crate::{
    attr::{errno, AttrSet, AttributeGroup, AttributeRegistry},
    controller::{self, PinController, Policy},
    gpio::{self, GpioDevice},
    mock_gpio::MockGpioDevice,
    pin_table::{self, PinTable},
};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, ThisError)]
/// Errors related to starting the attribute backend
pub enum Error {
    #[error("Failed while parsing to integer: {0:?}")]
    ParseFailure(ParseIntError),
    #[error("Invalid pin table: {0}")]
    PinTableInvalid(pin_table::Error),
    #[error("Physical gpio devices need the libgpiod feature: {0}")]
    PhysicalDeviceUnsupported(u32),
    #[error("Could not open gpio device: {0}")]
    CouldNotOpenDevice(gpio::Error),
    #[error("Could not probe gpio attributes: {0}")]
    CouldNotProbe(controller::Error),
    #[error("Attribute I/O failed: {0}")]
    Io(io::Error),
}

const REFERENCE_PINS: &str = "green_led:32:out:0,red_led:36:out:0";

const GPIO_AFTER_HELP: &str = "Pins are listed as name:gpio:dir[:default], dir being `in` or \
                               `out`. Once started, each stdin line `<name>` reads a pin and \
                               `<name>=<value>` writes it. Example, \"-d s64 -p \
                               green_led:32:out:0,button:7:in\"\n";

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None, after_help = GPIO_AFTER_HELP)]
pub struct GpioArgs {
    /// GPIO device, `<N>` for /dev/gpiochipN or `s<N>` for a simulated
    /// chip with N lines.
    #[clap(short, long, default_value = "s64")]
    device: String,

    /// Logical pins to expose.
    #[clap(short, long, default_value = REFERENCE_PINS)]
    pins: String,

    /// Reject writes to input pins instead of ignoring them.
    #[clap(long)]
    strict_direction: bool,

    /// Abort when a pin can't be acquired.
    #[clap(long)]
    fail_fast: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum GpioDeviceType {
    PhysicalDevice { id: u32 },
    SimulatedDevice { num_gpios: u32 },
}

impl GpioDeviceType {
    fn new(cfg: &str) -> Result<Self> {
        match cfg.strip_prefix('s') {
            Some(num) => {
                let num_gpios = num.parse::<u32>().map_err(Error::ParseFailure)?;
                Ok(GpioDeviceType::SimulatedDevice { num_gpios })
            }
            None => {
                let id = cfg.parse::<u32>().map_err(Error::ParseFailure)?;
                Ok(GpioDeviceType::PhysicalDevice { id })
            }
        }
    }
}

#[derive(PartialEq, Debug)]
struct GpioConfiguration {
    device: GpioDeviceType,
    table: PinTable,
    policy: Policy,
}

impl TryFrom<GpioArgs> for GpioConfiguration {
    type Error = Error;

    fn try_from(args: GpioArgs) -> Result<Self> {
        Ok(GpioConfiguration {
            device: GpioDeviceType::new(&args.device)?,
            table: PinTable::try_from(args.pins.as_str()).map_err(Error::PinTableInvalid)?,
            policy: Policy {
                strict_direction: args.strict_direction,
                fail_fast: args.fail_fast,
            },
        })
    }
}

/// Route attribute requests read from `input` to `group`, one per line.
fn serve<D, R>(
    group: &AttributeGroup<D, R>,
    input: impl BufRead,
    mut output: impl Write,
) -> io::Result<()>
where
    D: GpioDevice,
    R: AttributeRegistry,
{
    for line in input.lines() {
        let line = line?;
        let request = line.trim();
        if request.is_empty() {
            continue;
        }

        match request.split_once('=') {
            Some((attr, value)) => {
                let attr = attr.trim();
                match group.store(attr, value) {
                    Ok(count) => writeln!(output, "{attr}: stored {count} bytes")?,
                    Err(e) => writeln!(output, "{attr}: error {}: {e}", errno(&e))?,
                }
            }
            None => match group.show(request) {
                Ok(text) => write!(output, "{request}: {text}")?,
                Err(e) => writeln!(output, "{request}: error {}: {e}", errno(&e))?,
            },
        }
        output.flush()?;
    }

    Ok(())
}

fn start_device_backend<D: GpioDevice>(
    device: D,
    config: GpioConfiguration,
    input: impl BufRead,
    output: impl Write,
) -> Result<()> {
    let controller = PinController::with_policy(device, config.table, config.policy);
    let mut group = AttributeGroup::new(controller, AttrSet::new());

    if let Err(e) = group.probe() {
        group.remove();
        return Err(Error::CouldNotProbe(e));
    }

    let result = serve(&group, input, output).map_err(Error::Io);
    info!("input closed, releasing gpios");
    group.remove();
    result
}

fn start_backend(args: GpioArgs, input: impl BufRead, output: impl Write) -> Result<()> {
    let config = GpioConfiguration::try_from(args)?;

    match config.device {
        #[cfg(feature = "libgpiod")]
        GpioDeviceType::PhysicalDevice { id } => {
            let device = PhysDevice::open(id).map_err(Error::CouldNotOpenDevice)?;
            start_device_backend(device, config, input, output)
        }
        #[cfg(not(feature = "libgpiod"))]
        GpioDeviceType::PhysicalDevice { id } => Err(Error::PhysicalDeviceUnsupported(id)),
        GpioDeviceType::SimulatedDevice { num_gpios } => {
            let device = MockGpioDevice::open(num_gpios).map_err(Error::CouldNotOpenDevice)?;
            start_device_backend(device, config, input, output)
        }
    }
}

pub fn gpio_init() {
    let env = Env::default().filter_or("RUST_LOG", "info");
    env_logger::init_from_env(env);

    if let Err(e) = start_backend(GpioArgs::parse(), io::stdin().lock(), io::stdout().lock()) {
        error!("Fatal error starting backend: {e}");
        exit(1);
    }
}
