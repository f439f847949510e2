// Named GPIO lines exposed as text attributes
//
// Copyright 2023 Linaro Ltd. All Rights Reserved.
//          Viresh Kumar <viresh.kumar@linaro.org>
//
// SPDX-License-Identifier: Apache-2.0 or BSD-3-Clause

//! A fixed table of logical pin names bound to gpio lines, with boolean
//! read/write access by name.
//!
//! [`PinController`] acquires every line of a [`PinTable`] on attach and
//! releases them on detach. [`AttributeGroup`] exposes one text attribute
//! per pin on top of it.

pub mod attr;
pub mod backend;
pub mod controller;
pub mod gpio;
pub mod mock_gpio;
pub mod pin_table;

pub use attr::{AttrSet, AttributeGroup, AttributeRegistry};
pub use controller::{PinController, Policy};
pub use gpio::{Direction, GpioDevice};
pub use pin_table::{PinDescriptor, PinTable};
