// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

pub mod driver;
pub mod peripheral;
pub mod phy;
pub mod regs;
pub mod serial;
pub mod terminal;
