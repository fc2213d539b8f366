// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

//! QSPI flash access: the octet lane the flash sits behind, the opcode table, and the
//! components driving and answering that lane.

use std::fmt::Display;

use clap::ValueEnum;
use clap::builder::PossibleValue;
use serde::Deserialize;

pub mod bus;
pub mod flash;
pub mod sequencer;

/// How an octet offered on the lane is to be clocked out to (or in from) the flash
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum QspiMode
{
	/// Shift the octet out on IO0
	PutX1,
	/// Shift one octet in from IO1
	GetX1,
	/// Shift the octet out on IO0-IO1
	PutX2,
	/// Shift one octet in from IO0-IO1
	GetX2,
	/// Shift the octet out on IO0-IO3
	PutX4,
	/// Shift one octet in from IO0-IO3
	GetX4,
	/// Clock cycles with the data lines released
	Dummy,
}

impl QspiMode
{
	/// Number of data lines this mode moves bits over (0 for dummy cycles)
	pub fn lanes(self) -> u8
	{
		match self {
			Self::PutX1 | Self::GetX1 => 1,
			Self::PutX2 | Self::GetX2 => 2,
			Self::PutX4 | Self::GetX4 => 4,
			Self::Dummy => 0,
		}
	}

	pub fn is_receive(self) -> bool
	{
		matches!(self, Self::GetX1 | Self::GetX2 | Self::GetX4)
	}
}

/// A single item on the sequencer's outbound lane
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Octet
{
	/// Chip select asserted while this octet is clocked
	pub chip: bool,
	pub mode: QspiMode,
	pub data: u8,
}

impl Octet
{
	pub const fn put(data: u8) -> Self
	{
		Self {
			chip: true,
			mode: QspiMode::PutX1,
			data,
		}
	}

	pub const fn get(mode: QspiMode) -> Self
	{
		Self {
			chip: true,
			mode,
			data: 0,
		}
	}

	pub const fn dummy() -> Self
	{
		Self {
			chip: true,
			mode: QspiMode::Dummy,
			data: 0,
		}
	}

	/// The pulse that ends a transaction by releasing chip select
	pub const fn deselect() -> Self
	{
		Self {
			chip: false,
			mode: QspiMode::Dummy,
			data: 0,
		}
	}
}

/// Command opcodes understood by SPI NOR flashes of the kind the SoC boots from
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FlashCommand
{
	Read = 0x03,
	FastRead = 0x0b,
	FastReadDualOut = 0x3b,
	FastReadQuadOut = 0x6b,
	FastReadDualInOut = 0xbb,
	FastReadQuadInOut = 0xeb,
	ReadId = 0x9f,
	ReleasePowerDown = 0xab,
}

impl FlashCommand
{
	pub fn opcode(self) -> u8
	{
		self as u8
	}
}

impl TryFrom<u8> for FlashCommand
{
	type Error = u8;

	fn try_from(opcode: u8) -> Result<Self, Self::Error>
	{
		match opcode {
			0x03 => Ok(Self::Read),
			0x0b => Ok(Self::FastRead),
			0x3b => Ok(Self::FastReadDualOut),
			0x6b => Ok(Self::FastReadQuadOut),
			0xbb => Ok(Self::FastReadDualInOut),
			0xeb => Ok(Self::FastReadQuadInOut),
			0x9f => Ok(Self::ReadId),
			0xab => Ok(Self::ReleasePowerDown),
			_ => Err(opcode),
		}
	}
}

/// The read commands a [`sequencer::FlashReadSequencer`] can be built to issue
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadCommand
{
	/// Plain read: command, address, data
	#[default]
	Read,
	/// Fast read: one dummy byte between address and data
	FastRead,
	/// As [`ReadCommand::FastRead`], data returned over two lines
	FastReadDualOut,
	/// As [`ReadCommand::FastRead`], data returned over four lines
	FastReadQuadOut,
}

impl ReadCommand
{
	pub fn command(self) -> FlashCommand
	{
		match self {
			Self::Read => FlashCommand::Read,
			Self::FastRead => FlashCommand::FastRead,
			Self::FastReadDualOut => FlashCommand::FastReadDualOut,
			Self::FastReadQuadOut => FlashCommand::FastReadQuadOut,
		}
	}

	/// Dummy bytes clocked between the address and the first data byte
	pub fn dummy_bytes(self) -> u8
	{
		match self {
			Self::Read => 0,
			_ => 1,
		}
	}

	/// Lane mode used while receiving data
	pub fn receive_mode(self) -> QspiMode
	{
		match self {
			Self::Read | Self::FastRead => QspiMode::GetX1,
			Self::FastReadDualOut => QspiMode::GetX2,
			Self::FastReadQuadOut => QspiMode::GetX4,
		}
	}
}

impl Display for ReadCommand
{
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result
	{
		match self {
			Self::Read => write!(f, "read"),
			Self::FastRead => write!(f, "fast-read"),
			Self::FastReadDualOut => write!(f, "fast-read-dual-out"),
			Self::FastReadQuadOut => write!(f, "fast-read-quad-out"),
		}
	}
}

impl ValueEnum for ReadCommand
{
	fn value_variants<'a>() -> &'a [Self]
	{
		&[Self::Read, Self::FastRead, Self::FastReadDualOut, Self::FastReadQuadOut]
	}

	fn to_possible_value(&self) -> Option<PossibleValue>
	{
		match self {
			Self::Read => Some("read".into()),
			Self::FastRead => Some("fast-read".into()),
			Self::FastReadDualOut => Some("fast-read-dual-out".into()),
			Self::FastReadQuadOut => Some("fast-read-quad-out".into()),
		}
	}
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn opcode_table_round_trips()
	{
		for command in [
			FlashCommand::Read,
			FlashCommand::FastRead,
			FlashCommand::FastReadDualOut,
			FlashCommand::FastReadQuadOut,
			FlashCommand::FastReadDualInOut,
			FlashCommand::FastReadQuadInOut,
		] {
			assert_eq!(FlashCommand::try_from(command.opcode()), Ok(command));
		}
		assert_eq!(FlashCommand::Read.opcode(), 0x03);
		assert_eq!(FlashCommand::try_from(0x42), Err(0x42));
	}

	#[test]
	fn plain_read_has_no_dummy_phase()
	{
		assert_eq!(ReadCommand::default(), ReadCommand::Read);
		assert_eq!(ReadCommand::Read.dummy_bytes(), 0);
		assert_eq!(ReadCommand::Read.receive_mode(), QspiMode::GetX1);
		assert_eq!(ReadCommand::FastReadQuadOut.receive_mode().lanes(), 4);
	}
}
