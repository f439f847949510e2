// Logical pin table
//
// Copyright 2023 Linaro Ltd. All Rights Reserved.
//          Viresh Kumar <viresh.kumar@linaro.org>
//
// SPDX-License-Identifier: Apache-2.0 or BSD-3-Clause

//! Read-only mapping from logical pin names to gpio lines.

use std::{collections::HashSet, num::ParseIntError};

use thiserror::Error as ThisError;

use crate::gpio::Direction;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Debug, PartialEq, ThisError)]
/// Errors related to building a pin table
pub enum Error {
    #[error("Empty pin name")]
    NameEmpty,
    #[error("Duplicate pin name: {0}")]
    DuplicateName(String),
    #[error("Duplicate gpio line: {0}")]
    DuplicateLine(u32),
    #[error("Invalid pin entry: {0}")]
    EntryInvalid(String),
    #[error("Failed while parsing to integer: {0:?}")]
    ParseFailure(ParseIntError),
    #[error("Invalid pin direction: {0}")]
    DirectionInvalid(String),
    #[error("Invalid default value: {0}")]
    DefaultInvalid(String),
}

/// One logical pin.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PinDescriptor {
    pub name: String,
    pub gpio: u32,
    pub direction: Direction,
    /// Initial level, only meaningful for `Direction::Output`.
    pub default_value: bool,
}

impl PinDescriptor {
    pub fn output(name: &str, gpio: u32, default_value: bool) -> Self {
        Self {
            name: name.to_string(),
            gpio,
            direction: Direction::Output,
            default_value,
        }
    }

    pub fn input(name: &str, gpio: u32) -> Self {
        Self {
            name: name.to_string(),
            gpio,
            direction: Direction::Input,
            default_value: false,
        }
    }
}

impl TryFrom<&str> for PinDescriptor {
    type Error = Error;

    // `name:gpio:dir[:default]`
    fn try_from(entry: &str) -> Result<Self> {
        let fields: Vec<&str> = entry.trim().split(':').collect();
        let (name, gpio, dir, default) = match fields.as_slice() {
            [name, gpio, dir] => (*name, *gpio, *dir, None),
            [name, gpio, dir, default] => (*name, *gpio, *dir, Some(*default)),
            _ => return Err(Error::EntryInvalid(entry.to_string())),
        };

        let gpio = gpio.parse::<u32>().map_err(Error::ParseFailure)?;

        match (dir, default) {
            ("in", None) => Ok(PinDescriptor::input(name, gpio)),
            ("out", None | Some("0")) => Ok(PinDescriptor::output(name, gpio, false)),
            ("out", Some("1")) => Ok(PinDescriptor::output(name, gpio, true)),
            ("in", Some(_)) => Err(Error::EntryInvalid(entry.to_string())),
            ("out", Some(default)) => Err(Error::DefaultInvalid(default.to_string())),
            (dir, _) => Err(Error::DirectionInvalid(dir.to_string())),
        }
    }
}

/// Immutable pin table, iterated in declaration order.
#[derive(Clone, Debug, PartialEq)]
pub struct PinTable {
    pins: Vec<PinDescriptor>,
}

impl PinTable {
    pub fn new(pins: Vec<PinDescriptor>) -> Result<Self> {
        let mut names = HashSet::new();
        let mut lines = HashSet::new();

        for pin in pins.iter() {
            if pin.name.is_empty() {
                return Err(Error::NameEmpty);
            }
            if !names.insert(pin.name.as_str()) {
                return Err(Error::DuplicateName(pin.name.clone()));
            }
            if !lines.insert(pin.gpio) {
                return Err(Error::DuplicateLine(pin.gpio));
            }
        }

        Ok(Self { pins })
    }

    /// The two board LEDs, both driven low at attach.
    pub fn reference() -> Self {
        Self {
            pins: vec![
                PinDescriptor::output("green_led", 32, false),
                PinDescriptor::output("red_led", 36, false),
            ],
        }
    }

    /// Exact, case sensitive match on the logical name.
    pub fn lookup(&self, name: &str) -> Option<&PinDescriptor> {
        self.pins.iter().find(|pin| pin.name == name)
    }

    pub fn entries(&self) -> &[PinDescriptor] {
        &self.pins
    }

    pub fn names(&self) -> Vec<&str> {
        self.pins.iter().map(|pin| pin.name.as_str()).collect()
    }
}

impl TryFrom<&str> for PinTable {
    type Error = Error;

    fn try_from(list: &str) -> Result<Self> {
        let pins = list
            .split(',')
            .map(PinDescriptor::try_from)
            .collect::<Result<Vec<_>>>()?;

        PinTable::new(pins)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_lookup() {
        let table = PinTable::reference();

        assert_eq!(
            table.lookup("green_led"),
            Some(&PinDescriptor::output("green_led", 32, false))
        );
        assert_eq!(
            table.lookup("red_led"),
            Some(&PinDescriptor::output("red_led", 36, false))
        );

        // No partial or case-insensitive matches
        assert_eq!(table.lookup("green"), None);
        assert_eq!(table.lookup("GREEN_LED"), None);
        assert_eq!(table.lookup("green_led\n"), None);
        assert_eq!(table.lookup(""), None);
    }

    #[test]
    fn test_entries_order() {
        let table = PinTable::new(vec![
            PinDescriptor::input("button", 7),
            PinDescriptor::output("red_led", 36, true),
            PinDescriptor::output("green_led", 32, false),
        ])
        .unwrap();

        assert_eq!(table.names(), vec!["button", "red_led", "green_led"]);
        let lines: Vec<u32> = table.entries().iter().map(|pin| pin.gpio).collect();
        assert_eq!(lines, vec![7, 36, 32]);
    }

    #[test]
    fn test_table_validation() {
        assert_matches!(
            PinTable::new(vec![
                PinDescriptor::output("led", 1, false),
                PinDescriptor::input("led", 2),
            ]),
            Err(Error::DuplicateName(name)) if name == "led"
        );

        assert_matches!(
            PinTable::new(vec![
                PinDescriptor::output("green_led", 32, false),
                PinDescriptor::output("red_led", 32, false),
            ]),
            Err(Error::DuplicateLine(32))
        );

        assert_matches!(
            PinTable::new(vec![PinDescriptor::input("", 2)]),
            Err(Error::NameEmpty)
        );

        assert_eq!(PinTable::new(vec![]).unwrap().entries().len(), 0);
    }

    #[test]
    fn test_parse_successful() {
        let table = PinTable::try_from("green_led:32:out:0, red_led:36:out:1,button:7:in,fan:9:out")
            .unwrap();

        assert_eq!(
            table.entries(),
            &[
                PinDescriptor::output("green_led", 32, false),
                PinDescriptor::output("red_led", 36, true),
                PinDescriptor::input("button", 7),
                PinDescriptor::output("fan", 9, false),
            ]
        );
    }

    #[test]
    fn test_parse_failure() {
        assert_matches!(
            PinTable::try_from("green_led:32"),
            Err(Error::EntryInvalid(_))
        );
        assert_matches!(
            PinTable::try_from("green_led:3x:out"),
            Err(Error::ParseFailure(e)) if e == "3x".parse::<u32>().unwrap_err()
        );
        assert_matches!(
            PinTable::try_from("green_led:32:both"),
            Err(Error::DirectionInvalid(dir)) if dir == "both"
        );
        assert_matches!(
            PinTable::try_from("green_led:32:out:2"),
            Err(Error::DefaultInvalid(val)) if val == "2"
        );
        assert_matches!(
            PinTable::try_from("button:7:in:1"),
            Err(Error::EntryInvalid(_))
        );
        assert_matches!(
            PinTable::try_from("a:1:out,a:2:in"),
            Err(Error::DuplicateName(_))
        );
        assert_matches!(PinTable::try_from(""), Err(Error::EntryInvalid(_)));
    }
}
