// Named GPIO lines exposed as text attributes
//
// Copyright 2022 Linaro Ltd. All Rights Reserved.
//          Viresh Kumar <viresh.kumar@linaro.org>
//
// SPDX-License-Identifier: Apache-2.0 or BSD-3-Clause

fn main() {
    named_gpio::backend::gpio_init()
}
