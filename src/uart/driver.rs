// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

//! A polling driver for the UART peripheral, doing what firmware would do through the
//! register interface alone.

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::uart::peripheral::UartPeripheral;
use crate::uart::phy::UartPhy;
use crate::uart::regs::{RxStatus, TxStatus, UartRegister};

pub struct UartDriver<P: UartPhy>
{
	peripheral: UartPeripheral<P>,
	/// Status polls to make before giving up on a byte
	budget: usize,
}

impl<P: UartPhy> UartDriver<P>
{
	pub fn new(peripheral: UartPeripheral<P>, budget: usize) -> Self
	{
		Self {
			peripheral,
			budget,
		}
	}

	/// Set both directions to `divisor` and bring them out of reset
	pub fn configure(&mut self, divisor: u32)
	{
		debug!("Configuring UART for a divisor of {}", divisor);
		self.peripheral.write(UartRegister::RxConfig, 0);
		self.peripheral.write(UartRegister::TxConfig, 0);
		self.peripheral.write(UartRegister::RxPhyConfig, divisor);
		self.peripheral.write(UartRegister::TxPhyConfig, divisor);
		self.peripheral.write(UartRegister::RxConfig, 1);
		self.peripheral.write(UartRegister::TxConfig, 1);
	}

	/// Wait for the transmitter to be ready and hand it `byte`
	pub fn write_byte(&mut self, byte: u8) -> Result<()>
	{
		for _ in 0..self.budget {
			let status = TxStatus::from(self.peripheral.read(UartRegister::TxStatus));
			if status.contains(TxStatus::Ready) {
				self.peripheral.write(UartRegister::TxData, u32::from(byte));
				return Ok(());
			}
		}
		Err(Error::UartTimeout {
			what: "transmitter ready",
			steps: self.budget,
		})
	}

	pub fn write_all(&mut self, bytes: &[u8]) -> Result<()>
	{
		bytes.iter().try_for_each(|&byte| self.write_byte(byte))
	}

	/// Poll the receiver once, taking a byte if one is waiting. Latched overflow and framing
	/// errors are reported and cleared on the way.
	pub fn read_byte(&mut self) -> Option<u8>
	{
		let status = RxStatus::from(self.peripheral.read(UartRegister::RxStatus));
		let flags = status & (RxStatus::Overflow | RxStatus::Error);
		if !flags.is_none() {
			if flags.contains(RxStatus::Overflow) {
				warn!("Receiver overflowed, data was lost");
			}
			if flags.contains(RxStatus::Error) {
				warn!("Receiver saw a framing error");
			}
			self.peripheral.write(UartRegister::RxStatus, flags.bits());
		}

		if status.contains(RxStatus::Ready) {
			Some(self.peripheral.read(UartRegister::RxData) as u8)
		} else {
			None
		}
	}

	/// Poll the receiver until a byte arrives
	pub fn wait_byte(&mut self) -> Result<u8>
	{
		for _ in 0..self.budget {
			if let Some(byte) = self.read_byte() {
				return Ok(byte);
			}
		}
		Err(Error::UartTimeout {
			what: "receive",
			steps: self.budget,
		})
	}

	/// Let the peripheral run for `steps` steps without touching the bus
	pub fn idle(&mut self, steps: usize)
	{
		for _ in 0..steps {
			self.peripheral.tick();
		}
	}

	pub fn peripheral(&self) -> &UartPeripheral<P>
	{
		&self.peripheral
	}

	pub fn peripheral_mut(&mut self) -> &mut UartPeripheral<P>
	{
		&mut self.peripheral
	}

	pub fn into_inner(self) -> UartPeripheral<P>
	{
		self.peripheral
	}
}
