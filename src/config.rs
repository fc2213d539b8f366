// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

//! Construction-time configuration for the modelled SoC: clocking, flash geometry and the
//! UART register map. Every field has a default so a config file only needs to name what it
//! changes.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use log::info;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::log_and_return;
use crate::qspi::ReadCommand;
use crate::qspi::sequencer::WORD_WIDTHS;
use crate::uart::regs::{DIVISOR_MAX, RegisterMap};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SocConfig
{
	/// System clock frequency in Hz
	pub clock_frequency: u32,
	/// Baud rate the UART divisors are derived from
	pub baud_rate: u32,
	pub flash: FlashConfig,
	pub uart: UartConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FlashConfig
{
	/// Bytes returned per bus read
	pub word_width: usize,
	pub read_command: ReadCommand,
	/// Offset images are loaded at when none is given explicitly
	pub image_offset: usize,
	/// Steps a software client waits for a read to complete before giving up
	pub step_budget: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UartConfig
{
	/// Base address of the receive register block
	pub rx_base: u16,
	/// Base address of the transmit register block
	pub tx_base: u16,
}

impl Default for SocConfig
{
	fn default() -> Self
	{
		Self {
			clock_frequency: 48_000_000,
			baud_rate: 115_200,
			flash: FlashConfig::default(),
			uart: UartConfig::default(),
		}
	}
}

impl Default for FlashConfig
{
	fn default() -> Self
	{
		Self {
			word_width: 4,
			read_command: ReadCommand::Read,
			image_offset: 0x0010_0000,
			step_budget: 1024,
		}
	}
}

impl Default for UartConfig
{
	fn default() -> Self
	{
		Self {
			rx_base: 0x000,
			tx_base: 0x200,
		}
	}
}

impl UartConfig
{
	pub fn register_map(&self) -> Result<RegisterMap>
	{
		RegisterMap::new(self.rx_base, self.tx_base)
	}
}

impl SocConfig
{
	pub fn from_path(path: &Path) -> Result<Self>
	{
		info!("Loading configuration from {}", path.display());
		Self::from_reader(BufReader::new(File::open(path)?))
	}

	pub fn from_reader(reader: impl Read) -> Result<Self>
	{
		let config: Self = serde_json::from_reader(reader)?;
		config.validate()?;
		Ok(config)
	}

	/// UART divisor giving the configured baud rate at the configured clock
	pub fn divisor(&self) -> u32
	{
		self.clock_frequency / self.baud_rate.max(1)
	}

	pub fn validate(&self) -> Result<()>
	{
		if !WORD_WIDTHS.contains(&self.flash.word_width) {
			log_and_return!(Error::InvalidWordWidth(self.flash.word_width));
		}
		if self.baud_rate == 0 || self.baud_rate > self.clock_frequency {
			log_and_return!(Error::InvalidConfig(format!(
				"baud rate {} cannot be generated from a {}Hz clock",
				self.baud_rate, self.clock_frequency
			)));
		}
		if self.divisor() > DIVISOR_MAX {
			log_and_return!(Error::InvalidDivisor(self.divisor()));
		}
		if self.flash.step_budget == 0 {
			log_and_return!(Error::InvalidConfig("flash step budget must be non-zero".into()));
		}

		if let Err(err) = self.uart.register_map() {
			log_and_return!(err);
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn defaults_match_the_demo_soc()
	{
		let config = SocConfig::default();
		config.validate().unwrap();
		assert_eq!(config.divisor(), 416);
		assert_eq!(config.flash.word_width, 4);
		assert_eq!(config.uart.tx_base - config.uart.rx_base, 0x200);
	}

	#[test]
	fn partial_files_fill_in_defaults()
	{
		let config = SocConfig::from_reader(
			r#"{ "baud_rate": 9600, "flash": { "read_command": "fast-read" } }"#.as_bytes(),
		)
		.unwrap();
		assert_eq!(config.baud_rate, 9600);
		assert_eq!(config.divisor(), 5000);
		assert_eq!(config.flash.read_command, ReadCommand::FastRead);
		assert_eq!(config.flash.word_width, 4);
		assert_eq!(config.uart, UartConfig::default());
	}

	#[test]
	fn overlapping_register_blocks_are_rejected()
	{
		let result = SocConfig::from_reader(r#"{ "uart": { "rx_base": 0, "tx_base": 8 } }"#.as_bytes());
		assert!(matches!(result, Err(Error::InvalidConfig(_))));
	}

	#[test]
	fn bad_word_width_is_rejected()
	{
		let result = SocConfig::from_reader(r#"{ "flash": { "word_width": 16 } }"#.as_bytes());
		assert!(matches!(result, Err(Error::InvalidWordWidth(16))));
		let result = SocConfig::from_reader(r#"{ "flash": { "word_width": 3 } }"#.as_bytes());
		assert!(matches!(result, Err(Error::InvalidWordWidth(3))));
	}

	#[test]
	fn register_blocks_past_the_end_of_the_bus_are_rejected()
	{
		let result = SocConfig::from_reader(r#"{ "uart": { "rx_base": 65520, "tx_base": 0 } }"#.as_bytes());
		assert!(matches!(result, Err(Error::InvalidConfig(_))));
	}
}
