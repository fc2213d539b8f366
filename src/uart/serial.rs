// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

//! Bit-level asynchronous serial framing: a start bit (low), 8 data bits LSB first and a stop
//! bit (high), each bit lasting `divisor` steps. The line idles high.

use log::trace;

/// Bits in a frame: start, 8 data, stop
const FRAME_BITS: u8 = 10;

pub struct AsyncSerialTx
{
	divisor: u32,
	shift_register: u16,
	/// Bits of the current frame not yet put on the line
	bits_left: u8,
	/// Steps left for the bit currently on the line
	counter: u32,
	line: bool,
}

impl AsyncSerialTx
{
	pub fn new(divisor: u32) -> Self
	{
		Self {
			divisor: divisor.max(1),
			shift_register: 0,
			bits_left: 0,
			counter: 0,
			line: true,
		}
	}

	/// Change the bit period. Only meant to be done while the transmitter is idle or in reset.
	pub fn set_divisor(&mut self, divisor: u32)
	{
		self.divisor = divisor.max(1);
	}

	pub fn divisor(&self) -> u32
	{
		self.divisor
	}

	pub fn is_ready(&self) -> bool
	{
		self.bits_left == 0 && self.counter == 0
	}

	/// Start sending `byte`; refused (returning false) while a frame is still going out
	pub fn submit(&mut self, byte: u8) -> bool
	{
		if !self.is_ready() {
			return false;
		}
		trace!("TX frame 0x{:02x}", byte);
		self.shift_register = (1 << 9) | (u16::from(byte) << 1);
		self.bits_left = FRAME_BITS;
		true
	}

	/// Advance one step, returning the line level for this step
	pub fn tick(&mut self) -> bool
	{
		if self.counter == 0 && self.bits_left != 0 {
			self.line = self.shift_register & 1 != 0;
			self.shift_register >>= 1;
			self.bits_left -= 1;
			self.counter = self.divisor;
		}
		if self.counter != 0 {
			self.counter -= 1;
		}
		self.line
	}

	pub fn line(&self) -> bool
	{
		self.line
	}

	/// Abandon any frame in flight and return the line to idle
	pub fn reset(&mut self)
	{
		self.shift_register = 0;
		self.bits_left = 0;
		self.counter = 0;
		self.line = true;
	}
}

pub struct AsyncSerialRx
{
	divisor: u32,
	busy: bool,
	/// Steps until the next sample point
	counter: u32,
	/// Samples still to take for the current frame
	bits_left: u8,
	shift_register: u16,

	data: u8,
	ready: bool,
	overflow: bool,
	error: bool,
}

impl AsyncSerialRx
{
	pub fn new(divisor: u32) -> Self
	{
		Self {
			divisor: divisor.max(1),
			busy: false,
			counter: 0,
			bits_left: 0,
			shift_register: 0,
			data: 0,
			ready: false,
			overflow: false,
			error: false,
		}
	}

	pub fn set_divisor(&mut self, divisor: u32)
	{
		self.divisor = divisor.max(1);
	}

	pub fn divisor(&self) -> u32
	{
		self.divisor
	}

	/// Advance one step, sampling `line`
	pub fn tick(&mut self, line: bool)
	{
		self.overflow = false;
		self.error = false;

		if !self.busy {
			if line {
				return;
			}
			// Start bit: sample every bit in the middle of its period from here on
			self.busy = true;
			self.counter = self.divisor / 2;
			self.bits_left = FRAME_BITS;
			self.shift_register = 0;
		} else if self.counter != 0 {
			self.counter -= 1;
		}

		if self.counter == 0 {
			self.shift_register = (self.shift_register >> 1) | (u16::from(line) << 9);
			self.bits_left -= 1;
			self.counter = self.divisor;
			if self.bits_left == 0 {
				self.finish_frame();
			}
		}
	}

	fn finish_frame(&mut self)
	{
		self.busy = false;
		let start = self.shift_register & 1;
		let stop = (self.shift_register >> 9) & 1;
		if start != 0 || stop != 1 {
			trace!("RX framing error (frame 0b{:010b})", self.shift_register);
			self.error = true;
			return;
		}

		let byte = (self.shift_register >> 1) as u8;
		if self.ready {
			trace!("RX overflow, dropping 0x{:02x}", byte);
			self.overflow = true;
		} else {
			trace!("RX frame 0x{:02x}", byte);
			self.data = byte;
			self.ready = true;
		}
	}

	/// Whether a received byte is waiting to be taken
	pub fn is_ready(&self) -> bool
	{
		self.ready
	}

	pub fn data(&self) -> u8
	{
		self.data
	}

	/// Take the waiting byte, making room for the next one
	pub fn ack(&mut self) -> Option<u8>
	{
		if !self.ready {
			return None;
		}
		self.ready = false;
		Some(self.data)
	}

	/// A frame completed this step while the previous byte was still waiting
	pub fn overflow(&self) -> bool
	{
		self.overflow
	}

	/// A frame with a bad start or stop bit completed this step
	pub fn error(&self) -> bool
	{
		self.error
	}

	/// Drop any partial frame and the waiting byte
	pub fn reset(&mut self)
	{
		self.busy = false;
		self.counter = 0;
		self.bits_left = 0;
		self.shift_register = 0;
		self.ready = false;
		self.overflow = false;
		self.error = false;
	}
}
