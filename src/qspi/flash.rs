// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

//! Byte-level behavioural model of a SPI NOR flash sitting on the far end of the octet lane.

use log::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::lane::Lane;
use crate::qspi::{FlashCommand, Octet, QspiMode};

/// 16MiB, the most a 24-bit address reaches
pub const FLASH_CAPACITY: usize = 16 * 1024 * 1024;
/// Manufacturer/device ID answered to [`FlashCommand::ReadId`]
pub const FLASH_ID: [u8; 4] = [0xca, 0x7c, 0xa7, 0xff];

const ADDRESS_MASK: u32 = 0x00ff_ffff;

/// Per chip-select-assertion state
#[derive(Default)]
struct Transaction
{
	/// Octets clocked since chip select went active, command included
	byte_count: usize,
	command: Option<FlashCommand>,
	/// Set when the command byte was not one we understand
	ignored: bool,
	address: u32,
}

pub struct SpiFlash
{
	contents: Box<[u8]>,
	transaction: Transaction,
	/// An answer the return lane was not ready to take yet
	pending: Option<u8>,
}

impl Default for SpiFlash
{
	fn default() -> Self
	{
		Self::new()
	}
}

impl SpiFlash
{
	/// Construct a blank (fully erased) flash
	pub fn new() -> Self
	{
		Self {
			contents: vec![0xff; FLASH_CAPACITY].into_boxed_slice(),
			transaction: Transaction::default(),
			pending: None,
		}
	}

	pub fn capacity(&self) -> usize
	{
		self.contents.len()
	}

	/// Copy an image into the flash array starting at `offset`
	pub fn load_image(&mut self, image: &[u8], offset: usize) -> Result<()>
	{
		let capacity = self.capacity();
		if offset >= capacity {
			return Err(Error::OffsetOutOfRange {
				offset,
				capacity,
			});
		}
		if image.len() > capacity - offset {
			return Err(Error::ImageTooLarge {
				size: image.len(),
				offset,
				capacity,
			});
		}

		debug!("Loading {} byte image at 0x{:06x}", image.len(), offset);
		self.contents[offset..offset + image.len()].copy_from_slice(image);
		Ok(())
	}

	/// Drop chip select immediately, ending the current transaction and forgetting any answer
	/// still waiting for the return lane
	pub fn deselect(&mut self)
	{
		self.transaction = Transaction::default();
		self.pending = None;
	}

	/// Peek at the array contents directly, bypassing the lane
	pub fn byte_at(&self, address: u32) -> u8
	{
		self.contents[(address & ADDRESS_MASK) as usize]
	}

	/// Advance the flash by one step: take at most one octet off `octets`, and answer receive
	/// octets onto `received`.
	pub fn step(&mut self, octets: &mut Lane<Octet>, received: &mut Lane<u8>)
	{
		// An unanswered receive holds the SPI clock, nothing else moves until it is taken
		if let Some(answer) = self.pending {
			if received.try_push(answer).is_err() {
				return;
			}
			self.pending = None;
		}

		let Some(octet) = octets.try_pop() else {
			return;
		};
		if let Some(answer) = self.clock_octet(octet) {
			if let Err(answer) = received.try_push(answer) {
				self.pending = Some(answer);
			}
		}
	}

	fn clock_octet(&mut self, octet: Octet) -> Option<u8>
	{
		if !octet.chip {
			trace!("Chip deselected after {} bytes", self.transaction.byte_count);
			self.transaction = Transaction::default();
			return None;
		}

		let answer = match octet.mode {
			QspiMode::Dummy => None,
			mode if mode.is_receive() => Some(self.answer(mode)),
			_ => {
				self.accept(octet.data);
				None
			},
		};
		self.transaction.byte_count += 1;
		answer
	}

	fn accept(&mut self, byte: u8)
	{
		let transaction = &mut self.transaction;
		if transaction.byte_count == 0 {
			match FlashCommand::try_from(byte) {
				Ok(command) => {
					trace!("Flash command {:?}", command);
					transaction.command = Some(command);
				},
				Err(opcode) => {
					warn!("Flash received unknown command 0x{:02x}, ignoring until deselected", opcode);
					transaction.ignored = true;
				},
			}
			return;
		}

		let addressed = matches!(
			transaction.command,
			Some(
				FlashCommand::Read |
					FlashCommand::FastRead |
					FlashCommand::FastReadDualOut |
					FlashCommand::FastReadQuadOut
			)
		);
		if addressed && transaction.byte_count <= 3 {
			transaction.address |= u32::from(byte) << ((3 - transaction.byte_count) * 8);
		}
	}

	fn answer(&mut self, mode: QspiMode) -> u8
	{
		let transaction = &mut self.transaction;
		if transaction.ignored {
			return 0xff;
		}

		// Byte index at which the data phase starts, and the width data is returned at
		let (data_start, lanes) = match transaction.command {
			Some(FlashCommand::ReadId) => {
				return FLASH_ID[(transaction.byte_count - 1) % FLASH_ID.len()];
			},
			Some(FlashCommand::Read) => (4, 1),
			Some(FlashCommand::FastRead) => (5, 1),
			Some(FlashCommand::FastReadDualOut) => (5, 2),
			Some(FlashCommand::FastReadQuadOut) => (5, 4),
			_ => return 0xff,
		};

		if transaction.byte_count < data_start {
			return 0xff;
		}
		if mode.lanes() != lanes {
			warn!("Flash data clocked over {} lines, the command returns it over {}", mode.lanes(), lanes);
			return 0xff;
		}

		let byte = self.contents[transaction.address as usize];
		transaction.address = (transaction.address + 1) & ADDRESS_MASK;
		byte
	}
}
