// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

//! The flash read sequencer.
//!
//! This turns bus read requests into a command/address/data exchange on the octet lane in
//! front of a SPI NOR flash. It is strictly sequential: one transaction at a time, each one
//! run to completion once its command byte has been accepted. There is no timeout and no
//! cancellation; a lane that never becomes ready stalls the sequencer in whatever phase it
//! was in.

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::lane::Lane;
use crate::qspi::{Octet, ReadCommand};

/// Number of address bytes sent per transaction (24-bit flash addressing)
pub const ADDRESS_BYTES: u8 = 3;
const ADDRESS_MASK: u32 = 0x00ff_ffff;
/// Bus data path widths, in bytes, a sequencer can be built for
pub const WORD_WIDTHS: [usize; 4] = [1, 2, 4, 8];

/// A request presented by the bus client. The client keeps it presented until it sees `ack`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BusRequest
{
	/// Byte address into the flash
	pub address: u32,
	/// Write requests are never accepted; the bus fabric is expected to filter them out
	pub write: bool,
}

impl BusRequest
{
	pub fn read(address: u32) -> Self
	{
		Self {
			address: address & ADDRESS_MASK,
			write: false,
		}
	}

	/// Build a read request from a bus word address, as presented by a bus whose data path is
	/// `word_width` bytes wide
	pub fn from_word_address(word_address: u32, word_width: usize) -> Result<Self>
	{
		if !WORD_WIDTHS.contains(&word_width) {
			return Err(Error::InvalidWordWidth(word_width));
		}
		Ok(Self::read(word_address << word_width.trailing_zeros()))
	}
}

/// What the sequencer presents back to the bus client after each step
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct BusResponse
{
	/// High for exactly one step per completed transaction
	pub ack: bool,
	/// The assembled word, byte 0 least significant
	pub data: u64,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SequencerState
{
	Idle,
	SendAddress,
	SendDummy,
	ReceiveData,
	Deselect,
}

pub struct FlashReadSequencer
{
	read_command: ReadCommand,
	word_width: usize,

	state: SequencerState,
	/// Address latched when the command byte was accepted
	address: u32,
	/// Index of the next address byte to send, counting down to 0
	address_index: u8,
	dummy_remaining: u8,
	/// Receive offers made so far this transaction
	requested: usize,
	/// Bytes received so far this transaction
	received: usize,

	data: u64,
	ack: bool,
}

impl FlashReadSequencer
{
	/// Construct a sequencer reading `word_width` bytes per request
	pub fn new(read_command: ReadCommand, word_width: usize) -> Result<Self>
	{
		if !WORD_WIDTHS.contains(&word_width) {
			return Err(Error::InvalidWordWidth(word_width));
		}

		Ok(Self {
			read_command,
			word_width,
			state: SequencerState::Idle,
			address: 0,
			address_index: 0,
			dummy_remaining: 0,
			requested: 0,
			received: 0,
			data: 0,
			ack: false,
		})
	}

	pub fn state(&self) -> SequencerState
	{
		self.state
	}

	pub fn is_idle(&self) -> bool
	{
		self.state == SequencerState::Idle
	}

	pub fn word_width(&self) -> usize
	{
		self.word_width
	}

	pub fn read_command(&self) -> ReadCommand
	{
		self.read_command
	}

	/// Abandon any transaction in flight and return to `Idle`. The caller is responsible for
	/// deselecting the flash and clearing the lanes.
	pub fn reset(&mut self)
	{
		if !self.is_idle() {
			debug!("Abandoning {} of 0x{:06x} in {:?}", self.read_command, self.address, self.state);
		}
		self.state = SequencerState::Idle;
		self.address_index = 0;
		self.dummy_remaining = 0;
		self.requested = 0;
		self.received = 0;
		self.data = 0;
		self.ack = false;
	}

	/// Advance the sequencer by one step.
	///
	/// `request` is whatever the bus client is presenting this step. `octets` is the lane
	/// towards the flash and `received` the lane carrying bytes read back from it.
	pub fn step(
		&mut self, request: Option<&BusRequest>, octets: &mut Lane<Octet>, received: &mut Lane<u8>,
	) -> BusResponse
	{
		match self.state {
			SequencerState::Idle => self.step_idle(request, octets),
			SequencerState::SendAddress => self.step_address(octets),
			SequencerState::SendDummy => self.step_dummy(octets),
			SequencerState::ReceiveData => self.step_receive(octets, received),
			SequencerState::Deselect => self.step_deselect(octets),
		}

		BusResponse {
			ack: self.ack,
			data: self.data,
		}
	}

	fn step_idle(&mut self, request: Option<&BusRequest>, octets: &mut Lane<Octet>)
	{
		let request = match request {
			Some(request) if !request.write => request,
			Some(_) => {
				trace!("Ignoring write request, flash is read-only through this path");
				return;
			},
			None => return,
		};

		let command = Octet::put(self.read_command.command().opcode());
		if octets.try_push(command).is_ok() {
			debug!("Starting {} of 0x{:06x}", self.read_command, request.address);
			self.address = request.address & ADDRESS_MASK;
			self.address_index = ADDRESS_BYTES - 1;
			self.data = 0;
			self.state = SequencerState::SendAddress;
		}
	}

	fn step_address(&mut self, octets: &mut Lane<Octet>)
	{
		let byte = (self.address >> (8 * u32::from(self.address_index))) as u8;
		if octets.try_push(Octet::put(byte)).is_err() {
			return;
		}

		if self.address_index != 0 {
			self.address_index -= 1;
		} else if self.read_command.dummy_bytes() != 0 {
			self.dummy_remaining = self.read_command.dummy_bytes();
			self.state = SequencerState::SendDummy;
		} else {
			self.state = SequencerState::ReceiveData;
		}
	}

	fn step_dummy(&mut self, octets: &mut Lane<Octet>)
	{
		if octets.try_push(Octet::dummy()).is_ok() {
			self.dummy_remaining -= 1;
			if self.dummy_remaining == 0 {
				self.state = SequencerState::ReceiveData;
			}
		}
	}

	fn step_receive(&mut self, octets: &mut Lane<Octet>, received: &mut Lane<u8>)
	{
		// Receive offers and incoming bytes progress independently of each other
		if self.requested != self.word_width &&
			octets.try_push(Octet::get(self.read_command.receive_mode())).is_ok()
		{
			self.requested += 1;
		}

		if let Some(byte) = received.try_pop() {
			let shift = 8 * self.received;
			self.data = (self.data & !(0xffu64 << shift)) | (u64::from(byte) << shift);
			trace!("Received byte {} of {}: 0x{:02x}", self.received, self.word_width, byte);

			if self.received != self.word_width - 1 {
				self.received += 1;
			} else {
				self.ack = true;
				self.requested = 0;
				self.received = 0;
				self.state = SequencerState::Deselect;
			}
		}
	}

	fn step_deselect(&mut self, octets: &mut Lane<Octet>)
	{
		self.ack = false;
		if octets.try_push(Octet::deselect()).is_ok() {
			debug!("Read of 0x{:06x} complete", self.address);
			self.state = SequencerState::Idle;
		}
	}
}

#[cfg(test)]
mod tests
{
	use super::*;
	use crate::qspi::QspiMode;

	fn sequencer() -> FlashReadSequencer
	{
		FlashReadSequencer::new(ReadCommand::Read, 4).unwrap()
	}

	#[test]
	fn rejects_unsupported_word_widths()
	{
		assert!(matches!(FlashReadSequencer::new(ReadCommand::Read, 0), Err(Error::InvalidWordWidth(0))));
		assert!(matches!(FlashReadSequencer::new(ReadCommand::Read, 9), Err(Error::InvalidWordWidth(9))));
		for width in [3, 5, 6, 7] {
			assert!(matches!(
				FlashReadSequencer::new(ReadCommand::Read, width),
				Err(Error::InvalidWordWidth(_))
			));
		}
	}

	#[test]
	fn idles_without_a_request()
	{
		let mut sequencer = sequencer();
		let mut octets = Lane::new();
		let mut received = Lane::new();
		for _ in 0..16 {
			let response = sequencer.step(None, &mut octets, &mut received);
			assert!(!response.ack);
			assert!(octets.is_ready());
		}
		assert!(sequencer.is_idle());
	}

	#[test]
	fn write_requests_are_never_accepted()
	{
		let mut sequencer = sequencer();
		let mut octets = Lane::new();
		let mut received = Lane::new();
		let request = BusRequest {
			address: 0x100,
			write: true,
		};
		for _ in 0..8 {
			sequencer.step(Some(&request), &mut octets, &mut received);
		}
		assert!(sequencer.is_idle());
		assert!(octets.is_ready());
	}

	#[test]
	fn backpressure_stalls_the_address_phase()
	{
		let mut sequencer = sequencer();
		let mut octets = Lane::new();
		let mut received = Lane::new();
		let request = BusRequest::read(0x123456);

		sequencer.step(Some(&request), &mut octets, &mut received);
		assert_eq!(sequencer.state(), SequencerState::SendAddress);
		// Nobody drains the lane, so the first address byte cannot go out
		for _ in 0..8 {
			sequencer.step(Some(&request), &mut octets, &mut received);
		}
		assert_eq!(sequencer.state(), SequencerState::SendAddress);
		assert_eq!(octets.try_pop(), Some(Octet::put(0x03)));

		sequencer.step(Some(&request), &mut octets, &mut received);
		assert_eq!(octets.try_pop(), Some(Octet::put(0x12)));
	}

	#[test]
	fn fast_read_inserts_a_dummy_byte()
	{
		let mut sequencer = FlashReadSequencer::new(ReadCommand::FastReadQuadOut, 2).unwrap();
		let mut octets = Lane::new();
		let mut received = Lane::new();
		let request = BusRequest::read(0x000010);

		let mut seen = Vec::new();
		for _ in 0..6 {
			sequencer.step(Some(&request), &mut octets, &mut received);
			seen.extend(octets.try_pop());
		}
		assert_eq!(seen, vec![
			Octet::put(0x6b),
			Octet::put(0x00),
			Octet::put(0x00),
			Octet::put(0x10),
			Octet::dummy(),
			Octet::get(QspiMode::GetX4),
		]);
	}

	#[test]
	fn word_address_is_scaled_by_the_bus_width()
	{
		assert_eq!(BusRequest::from_word_address(0x40, 4).unwrap().address, 0x100);
		assert_eq!(BusRequest::from_word_address(0x40, 1).unwrap().address, 0x40);
		assert_eq!(BusRequest::from_word_address(0x40, 8).unwrap().address, 0x200);
		// Consecutive word addresses land on consecutive words
		assert_eq!(BusRequest::from_word_address(1, 2).unwrap().address, 2);
		assert!(matches!(BusRequest::from_word_address(1, 3), Err(Error::InvalidWordWidth(3))));
		assert_eq!(BusRequest::read(0x1ff_ffff).address, 0xff_ffff);
	}
}
