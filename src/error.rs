// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

//! Module for error handling code.
//!
//! Only set-up and client-side conditions live here. Protocol conditions such as backpressure,
//! receive overflow or framing errors are never errors, they surface as status flags.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error
{
	#[error("Flash offset 0x{offset:08x} lies beyond the end of the {capacity} byte flash")]
	OffsetOutOfRange
	{
		offset: usize,
		capacity: usize,
	},

	#[error("Flash image of {size} bytes does not fit at offset 0x{offset:06x} in a {capacity} byte flash")]
	ImageTooLarge
	{
		size: usize,
		offset: usize,
		capacity: usize,
	},

	#[error("Word width of {0} bytes is not supported (expected 1, 2, 4 or 8)")]
	InvalidWordWidth(usize),

	#[error("Divisor {0} does not fit in the 24-bit divisor field")]
	InvalidDivisor(u32),

	#[error("No register is mapped at address 0x{0:03x}")]
	UnmappedRegister(u16),

	#[error("Flash read of address 0x{address:06x} did not complete within {steps} steps")]
	TransactionStalled
	{
		/// The byte address the stalled transaction was reading
		address: u32,
		/// How many lockstep steps were spent before giving up
		steps: usize,
	},

	#[error("Flash read path is in the middle of a transaction")]
	BusBusy,

	#[error("UART {what} did not happen within {steps} steps")]
	UartTimeout
	{
		what: &'static str,
		steps: usize,
	},

	#[error("Invalid configuration: {0}")]
	InvalidConfig(String),

	#[error("Failed to read or write a file")]
	Io(#[from] std::io::Error),

	#[error("Failed to parse or produce JSON")]
	Json(#[from] serde_json::Error),
}

#[macro_export]
macro_rules! log_and_return
{
	($err:expr) => {
		let err = $err;
		log::error!("{}", err);
		return Err(err);
	};
}
