// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

//! The PHY side of the UART: what the register front end drives (per-direction reset and
//! divisor), and what it gets back (symbol streams and error pulses).

use std::collections::VecDeque;

use log::{debug, warn};

use crate::uart::serial::{AsyncSerialRx, AsyncSerialTx};
use crate::uart::terminal::Terminal;

/// Types implementing this trait can sit underneath a [`crate::uart::peripheral::UartPeripheral`]
pub trait UartPhy
{
	// Receive direction
	/// Hold the receive direction in reset (or release it)
	fn set_rx_reset(&mut self, reset: bool);
	fn set_rx_divisor(&mut self, divisor: u32);
	/// The received symbol waiting to be taken, if there is one
	fn rx_symbol(&self) -> Option<u8>;
	/// Take the waiting symbol
	fn rx_ack(&mut self);
	/// A symbol was lost this step because the previous one had not been taken
	fn rx_overflow(&self) -> bool;
	/// A malformed frame was seen this step
	fn rx_error(&self) -> bool;

	// Transmit direction
	/// Hold the transmit direction in reset (or release it)
	fn set_tx_reset(&mut self, reset: bool);
	fn set_tx_divisor(&mut self, divisor: u32);
	fn tx_ready(&self) -> bool;
	/// Present a symbol for sending, returning whether it was taken
	fn tx_submit(&mut self, symbol: u8) -> bool;

	/// Advance one step
	fn tick(&mut self);
}

/// What the far end of the serial wire is connected to
pub enum LineEnd
{
	/// Nothing: the receive line idles high and transmissions go nowhere
	Open,
	/// The transmit line is wired straight back into the receive line
	Loopback,
	/// A terminal model on the other end of the wire
	Terminal(Terminal),
}

/// A PHY doing real asynchronous serial framing over a modelled wire
pub struct SerialPhy
{
	rx: AsyncSerialRx,
	tx: AsyncSerialTx,
	rx_reset: bool,
	tx_reset: bool,
	/// Level the receiver samples on the next step
	rx_line: bool,
	line_end: LineEnd,
}

impl SerialPhy
{
	/// Construct a PHY with both directions held in reset
	pub fn new(divisor: u32, line_end: LineEnd) -> Self
	{
		Self {
			rx: AsyncSerialRx::new(divisor),
			tx: AsyncSerialTx::new(divisor),
			rx_reset: true,
			tx_reset: true,
			rx_line: true,
			line_end,
		}
	}

	pub fn looped(divisor: u32) -> Self
	{
		Self::new(divisor, LineEnd::Loopback)
	}

	/// Level currently driven on the transmit line
	pub fn tx_line(&self) -> bool
	{
		self.tx.line()
	}

	/// Drive the receive line from outside, for when nothing is attached at the far end
	pub fn set_rx_line(&mut self, level: bool)
	{
		self.rx_line = level;
	}

	pub fn terminal(&self) -> Option<&Terminal>
	{
		match &self.line_end {
			LineEnd::Terminal(terminal) => Some(terminal),
			_ => None,
		}
	}

	pub fn terminal_mut(&mut self) -> Option<&mut Terminal>
	{
		match &mut self.line_end {
			LineEnd::Terminal(terminal) => Some(terminal),
			_ => None,
		}
	}
}

impl UartPhy for SerialPhy
{
	fn set_rx_reset(&mut self, reset: bool)
	{
		self.rx_reset = reset;
		if reset {
			self.rx.reset();
		}
	}

	fn set_rx_divisor(&mut self, divisor: u32)
	{
		self.rx.set_divisor(divisor);
	}

	fn rx_symbol(&self) -> Option<u8>
	{
		if self.rx_reset || !self.rx.is_ready() {
			None
		} else {
			Some(self.rx.data())
		}
	}

	fn rx_ack(&mut self)
	{
		self.rx.ack();
	}

	fn rx_overflow(&self) -> bool
	{
		self.rx.overflow()
	}

	fn rx_error(&self) -> bool
	{
		self.rx.error()
	}

	fn set_tx_reset(&mut self, reset: bool)
	{
		self.tx_reset = reset;
		if reset {
			self.tx.reset();
		}
	}

	fn set_tx_divisor(&mut self, divisor: u32)
	{
		self.tx.set_divisor(divisor);
	}

	fn tx_ready(&self) -> bool
	{
		!self.tx_reset && self.tx.is_ready()
	}

	fn tx_submit(&mut self, symbol: u8) -> bool
	{
		!self.tx_reset && self.tx.submit(symbol)
	}

	fn tick(&mut self)
	{
		let tx_line = if self.tx_reset { true } else { self.tx.tick() };

		match &mut self.line_end {
			LineEnd::Open => (),
			LineEnd::Loopback => self.rx_line = tx_line,
			LineEnd::Terminal(terminal) => self.rx_line = terminal.step(tx_line),
		}

		if !self.rx_reset {
			self.rx.tick(self.rx_line);
		}
	}
}

/// Depth of the FIFO joining the two directions of a [`LoopbackPhy`]
pub const LOOPBACK_DEPTH: usize = 4;

/// A PHY without any framing: transmitted symbols go into a small FIFO that the receive side
/// reads straight back out. Resetting either direction empties the FIFO.
pub struct LoopbackPhy
{
	fifo: VecDeque<u8>,
	rx_reset: bool,
	tx_reset: bool,
	overflow: bool,
}

impl Default for LoopbackPhy
{
	fn default() -> Self
	{
		Self::new()
	}
}

impl LoopbackPhy
{
	/// Construct a loopback with both directions held in reset
	pub fn new() -> Self
	{
		Self {
			fifo: VecDeque::with_capacity(LOOPBACK_DEPTH),
			rx_reset: true,
			tx_reset: true,
			overflow: false,
		}
	}

	fn in_reset(&self) -> bool
	{
		self.rx_reset || self.tx_reset
	}

	/// Symbols currently buffered
	pub fn level(&self) -> usize
	{
		self.fifo.len()
	}
}

impl UartPhy for LoopbackPhy
{
	fn set_rx_reset(&mut self, reset: bool)
	{
		self.rx_reset = reset;
		if reset {
			self.fifo.clear();
		}
	}

	fn set_rx_divisor(&mut self, _divisor: u32) {}

	fn rx_symbol(&self) -> Option<u8>
	{
		if self.in_reset() { None } else { self.fifo.front().copied() }
	}

	fn rx_ack(&mut self)
	{
		if !self.in_reset() {
			self.fifo.pop_front();
		}
	}

	fn rx_overflow(&self) -> bool
	{
		self.overflow
	}

	fn rx_error(&self) -> bool
	{
		false
	}

	fn set_tx_reset(&mut self, reset: bool)
	{
		self.tx_reset = reset;
		if reset {
			self.fifo.clear();
		}
	}

	fn set_tx_divisor(&mut self, _divisor: u32) {}

	fn tx_ready(&self) -> bool
	{
		!self.in_reset() && self.fifo.len() < LOOPBACK_DEPTH
	}

	fn tx_submit(&mut self, symbol: u8) -> bool
	{
		if self.in_reset() {
			return false;
		}
		if self.fifo.len() == LOOPBACK_DEPTH {
			warn!("Loopback FIFO full, dropping 0x{:02x}", symbol);
			self.overflow = true;
			return false;
		}
		debug!("Loopback FIFO takes 0x{:02x}", symbol);
		self.fifo.push_back(symbol);
		true
	}

	fn tick(&mut self)
	{
		self.overflow = false;
	}
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn loopback_is_inert_in_reset()
	{
		let mut phy = LoopbackPhy::new();
		assert!(!phy.tx_ready());
		assert!(!phy.tx_submit(b'x'));
		assert_eq!(phy.rx_symbol(), None);
	}

	#[test]
	fn loopback_overflows_when_full()
	{
		let mut phy = LoopbackPhy::new();
		phy.set_rx_reset(false);
		phy.set_tx_reset(false);
		for &byte in b"abcd" {
			assert!(phy.tx_submit(byte));
		}
		assert!(!phy.tx_ready());
		assert!(!phy.tx_submit(b'e'));
		assert!(phy.rx_overflow());
		phy.tick();
		assert!(!phy.rx_overflow());

		assert_eq!(phy.rx_symbol(), Some(b'a'));
		phy.rx_ack();
		assert_eq!(phy.rx_symbol(), Some(b'b'));
		assert!(phy.tx_ready());
	}

	#[test]
	fn resetting_one_direction_empties_the_loopback()
	{
		let mut phy = LoopbackPhy::new();
		phy.set_rx_reset(false);
		phy.set_tx_reset(false);
		phy.tx_submit(b'a');
		phy.set_rx_reset(true);
		phy.set_rx_reset(false);
		assert_eq!(phy.rx_symbol(), None);
		assert_eq!(phy.level(), 0);
	}

	#[test]
	fn serial_loopback_carries_a_byte()
	{
		let mut phy = SerialPhy::looped(8);
		phy.set_rx_reset(false);
		phy.set_tx_reset(false);
		assert!(phy.tx_submit(0x3c));
		for _ in 0..(10 * 8) {
			phy.tick();
		}
		assert_eq!(phy.rx_symbol(), Some(0x3c));
		phy.rx_ack();
		assert_eq!(phy.rx_symbol(), None);
	}

	#[test]
	fn serial_reset_blocks_transmission()
	{
		let mut phy = SerialPhy::looped(8);
		assert!(!phy.tx_ready());
		assert!(!phy.tx_submit(0x00));
		for _ in 0..100 {
			phy.tick();
		}
		assert!(phy.tx_line());
	}
}
