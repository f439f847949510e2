// Text attribute exposure for named GPIO lines
//
// Copyright 2023 Linaro Ltd. All Rights Reserved.
//          Viresh Kumar <viresh.kumar@linaro.org>
//
// SPDX-License-Identifier: Apache-2.0 or BSD-3-Clause

use std::{collections::BTreeSet, io};

use log::info;

use crate::{
    controller::{Error, PinController, Result},
    gpio::GpioDevice,
};

/// Something that routes named text attributes to `AttributeGroup`.
pub trait AttributeRegistry {
    fn create_group(&mut self, attrs: &[&str]) -> io::Result<()>;
    fn remove_group(&mut self, attrs: &[&str]);
}

/// In-memory registry, one entry per exposed attribute.
#[derive(Debug, Default)]
pub struct AttrSet {
    names: BTreeSet<String>,
}

impl AttrSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl AttributeRegistry for AttrSet {
    fn create_group(&mut self, attrs: &[&str]) -> io::Result<()> {
        if let Some(name) = attrs.iter().find(|name| self.names.contains(**name)) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("attribute {name} already exists"),
            ));
        }

        self.names.extend(attrs.iter().map(|name| name.to_string()));
        Ok(())
    }

    fn remove_group(&mut self, attrs: &[&str]) {
        for name in attrs {
            self.names.remove(*name);
        }
    }
}

/// Negative errno reported for a failed attribute access.
pub fn errno(err: &Error) -> i32 {
    let code = match err {
        Error::NameNotFound(_) => libc::ENOENT,
        Error::ParseError(_) => libc::EINVAL,
        Error::WrongDirection(_) => libc::EPERM,
        Error::NotAttached | Error::PinUnavailable(_) => libc::ENODEV,
        Error::AlreadyAttached | Error::DetachRequired => libc::EBUSY,
        Error::AttachFailed(_) => libc::EEXIST,
        Error::AcquireFailed { .. } | Error::Gpio(_) => libc::EIO,
    };

    -code
}

/// One readable/writable attribute per table entry, backed by a
/// `PinController`.
pub struct AttributeGroup<D: GpioDevice, R: AttributeRegistry> {
    controller: PinController<D>,
    registry: R,
    exposed: bool,
}

impl<D: GpioDevice, R: AttributeRegistry> AttributeGroup<D, R> {
    pub fn new(controller: PinController<D>, registry: R) -> Self {
        Self {
            controller,
            registry,
            exposed: false,
        }
    }

    pub fn controller(&self) -> &PinController<D> {
        &self.controller
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Acquire the pins, then expose one attribute per pin.
    ///
    /// A registration failure leaves the pins acquired, `remove()` releases
    /// them.
    pub fn probe(&mut self) -> Result<()> {
        self.controller.attach()?;

        let names = self.controller.table().names();
        self.registry
            .create_group(&names)
            .map_err(Error::AttachFailed)?;

        info!("exposed attributes: {}", names.join(", "));
        self.exposed = true;
        Ok(())
    }

    pub fn remove(&mut self) {
        self.controller.detach();

        if self.exposed {
            self.registry.remove_group(&self.controller.table().names());
            self.exposed = false;
        }
    }

    /// Reads render as `"1\n"` or `"0\n"`.
    pub fn show(&self, attr: &str) -> Result<String> {
        let value = self.controller.read(attr)?;
        Ok(format!("{}\n", value as u8))
    }

    /// Returns the number of bytes consumed, i.e. all of `buf`.
    pub fn store(&self, attr: &str, buf: &str) -> Result<usize> {
        self.controller.write(attr, buf)?;
        Ok(buf.len())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::{
        controller::Policy,
        mock_gpio::MockGpioDevice,
        pin_table::{PinDescriptor, PinTable},
    };

    fn group() -> AttributeGroup<MockGpioDevice, AttrSet> {
        let controller = PinController::new(MockGpioDevice::new(64), PinTable::reference());
        AttributeGroup::new(controller, AttrSet::new())
    }

    #[test]
    fn test_attr_set() {
        let mut set = AttrSet::new();

        set.create_group(&["green_led", "red_led"]).unwrap();
        assert!(set.contains("green_led"));
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["green_led", "red_led"]);

        let err = set.create_group(&["blue_led", "red_led"]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert!(!set.contains("blue_led"));

        set.remove_group(&["green_led", "red_led"]);
        assert_eq!(set.names().count(), 0);
    }

    #[test]
    fn test_probe_show_store() {
        let mut group = group();
        group.probe().unwrap();

        assert!(group.registry().contains("green_led"));
        assert!(group.registry().contains("red_led"));

        assert_eq!(group.show("green_led").unwrap(), "0\n");
        assert_eq!(group.store("green_led", "1\n").unwrap(), 2);
        assert_eq!(group.show("green_led").unwrap(), "1\n");
        assert_eq!(group.show("red_led").unwrap(), "0\n");

        group.remove();
        assert_eq!(group.registry().names().count(), 0);
        assert!(!group.controller().device().is_requested(32));
        assert_matches!(group.show("green_led"), Err(Error::NotAttached));
    }

    #[test]
    fn test_probe_registration_failure() {
        let mut registry = AttrSet::new();
        registry.create_group(&["red_led"]).unwrap();

        let controller = PinController::new(MockGpioDevice::new(64), PinTable::reference());
        let mut group = AttributeGroup::new(controller, registry);

        assert_matches!(group.probe(), Err(Error::AttachFailed(_)));

        // No rollback, pins stay acquired until remove()
        assert!(group.controller().is_attached());
        assert!(group.controller().device().is_requested(32));

        group.remove();
        assert!(!group.controller().device().is_requested(32));
        // Somebody else's attribute is left alone
        assert!(group.registry().contains("red_led"));
    }

    #[test]
    fn test_store_failures() {
        let table = PinTable::new(vec![
            PinDescriptor::output("green_led", 32, false),
            PinDescriptor::input("button", 7),
        ])
        .unwrap();
        let policy = Policy {
            strict_direction: true,
            ..Default::default()
        };
        let controller = PinController::with_policy(MockGpioDevice::new(64), table, policy);
        let mut group = AttributeGroup::new(controller, AttrSet::new());

        let err = group.store("green_led", "1").unwrap_err();
        assert_eq!(errno(&err), -libc::ENODEV);

        group.probe().unwrap();
        assert_matches!(group.probe(), Err(Error::AlreadyAttached));

        let err = group.store("green_led", "abc").unwrap_err();
        assert_eq!(errno(&err), -libc::EINVAL);

        let err = group.store("blue_led", "1").unwrap_err();
        assert_eq!(errno(&err), -libc::ENOENT);
        assert_eq!(err.to_string(), "Gpio specified not found: blue_led");

        let err = group.store("button", "1").unwrap_err();
        assert_eq!(errno(&err), -libc::EPERM);
    }
}
