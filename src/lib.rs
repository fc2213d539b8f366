// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

pub mod config;
pub mod error;
pub mod event_log;
pub mod lane;
pub mod qspi;
pub mod uart;
