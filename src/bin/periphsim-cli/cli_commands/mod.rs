// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

use clap::Subcommand;

use crate::CompletionArguments;
use crate::cli_commands::flash::FlashArguments;
use crate::cli_commands::uart::UartArguments;

pub mod flash;
pub mod uart;

#[derive(Subcommand)]
pub enum ToplevelCommands
{
	/// Actions performed through the QSPI flash read path
	Flash(FlashArguments),
	/// Actions performed through the UART peripheral
	Uart(UartArguments),
	/// Generate completions data for the shell
	Complete(CompletionArguments),
}

/// Parse a number given either in decimal or, with a 0x prefix, in hex
pub fn parse_number(value: &str) -> Result<u32, String>
{
	let result = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
		Some(hex) => u32::from_str_radix(hex, 16),
		None => value.parse(),
	};
	result.map_err(|err| format!("'{}' is not a valid number: {}", value, err))
}
