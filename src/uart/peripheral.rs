// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

//! The UART register front end.
//!
//! Each direction has an enable flag, a divisor and its own status. Clearing the enable flag
//! holds that direction of the PHY in reset, and the divisor can only be changed while it is
//! held there. Receive overflow and framing errors latch into sticky flags that software
//! clears by writing 1 to them; reading RxData takes the waiting byte.

use log::{debug, trace, warn};

use crate::config::SocConfig;
use crate::error::{Error, Result};
use crate::uart::phy::UartPhy;
use crate::uart::regs::{
	DIVISOR_MAX, Direction, FieldId, FieldStore, REGISTER_BYTES, REGISTER_COUNT, RegisterMap, RxStatus, TxStatus,
	UartRegister, read_register, write_register,
};

/// State one direction keeps regardless of what the PHY is doing
#[derive(Debug, Default)]
struct DirectionState
{
	enable: bool,
	divisor: u32,
	phy_reserved: u32,
}

/// Byte-lane shadows for one register, as kept by the CSR bus multiplexer
#[derive(Debug, Default, Copy, Clone)]
struct Shadow
{
	read: u32,
	write: u32,
}

pub struct UartPeripheral<P: UartPhy>
{
	phy: P,
	map: RegisterMap,

	rx: DirectionState,
	tx: DirectionState,
	overflow: bool,
	error: bool,
	/// Last byte taken from the receive side, what RxData reads when nothing is waiting
	last_rx_data: u8,

	shadows: [Shadow; REGISTER_COUNT],
	timestamp: u64,
}

impl<P: UartPhy> UartPeripheral<P>
{
	/// Construct the peripheral with both directions disabled and both divisors at
	/// `divisor_init`
	pub fn new(mut phy: P, map: RegisterMap, divisor_init: u32) -> Result<Self>
	{
		if divisor_init > DIVISOR_MAX {
			return Err(Error::InvalidDivisor(divisor_init));
		}

		phy.set_rx_reset(true);
		phy.set_tx_reset(true);
		phy.set_rx_divisor(divisor_init);
		phy.set_tx_divisor(divisor_init);

		Ok(Self {
			phy,
			map,
			rx: DirectionState {
				divisor: divisor_init,
				..Default::default()
			},
			tx: DirectionState {
				divisor: divisor_init,
				..Default::default()
			},
			overflow: false,
			error: false,
			last_rx_data: 0,
			shadows: Default::default(),
			timestamp: 0,
		})
	}

	pub fn from_config(phy: P, config: &SocConfig) -> Result<Self>
	{
		Self::new(phy, config.uart.register_map()?, config.divisor())
	}

	pub fn phy(&self) -> &P
	{
		&self.phy
	}

	pub fn phy_mut(&mut self) -> &mut P
	{
		&mut self.phy
	}

	pub fn map(&self) -> &RegisterMap
	{
		&self.map
	}

	/// Steps taken since construction
	pub fn timestamp(&self) -> u64
	{
		self.timestamp
	}

	/// Advance the peripheral and its PHY by one step
	pub fn tick(&mut self)
	{
		self.phy.tick();
		self.latch_phy_flags();
		self.timestamp += 1;
	}

	fn latch_phy_flags(&mut self)
	{
		if self.phy.rx_overflow() && !self.overflow {
			warn!("UART receive overflow, a byte was lost");
			self.overflow = true;
		}
		if self.phy.rx_error() && !self.error {
			warn!("UART receive framing error");
			self.error = true;
		}
	}

	/// One access on the 8-bit CSR bus.
	///
	/// A read of a register's first byte snapshots the whole register (and performs any read
	/// side effect); the remaining bytes come from that snapshot. Written bytes collect in a
	/// shadow and take effect when the register's last byte is written. When both strobes are
	/// given, the read happens first.
	pub fn csr_access(&mut self, address: u16, read: bool, write: Option<u8>) -> u8
	{
		let Some((index, register, byte)) = self.map.lookup(address) else {
			trace!("CSR access to unmapped address 0x{:03x}", address);
			return 0;
		};
		let shift = 8 * u32::from(byte);

		let mut data = 0;
		if read {
			if byte == 0 {
				self.shadows[index].read = read_register(register, self);
			}
			data = (self.shadows[index].read >> shift) as u8;
		}

		if let Some(value) = write {
			let shadow = &mut self.shadows[index];
			shadow.write = (shadow.write & !(0xff << shift)) | (u32::from(value) << shift);
			if byte == REGISTER_BYTES - 1 {
				let value = shadow.write;
				trace!("{} <- 0x{:08x}", register.name, value);
				write_register(register, value, self);
			}
		}
		data
	}

	/// A full 32-bit register access as a bus bridge performs it: four byte accesses with a
	/// step after each
	pub fn access32(&mut self, address: u16, read: bool, write: Option<u32>) -> Result<u32>
	{
		self.map.register_at(address)?;

		let mut value = 0;
		for byte in 0..REGISTER_BYTES {
			let shift = 8 * u32::from(byte);
			let data = self.csr_access(address + byte, read, write.map(|word| (word >> shift) as u8));
			value |= u32::from(data) << shift;
			self.tick();
		}
		Ok(value)
	}

	pub fn read32(&mut self, address: u16) -> Result<u32>
	{
		self.access32(address, true, None)
	}

	pub fn write32(&mut self, address: u16, value: u32) -> Result<()>
	{
		self.access32(address, false, Some(value))?;
		Ok(())
	}

	pub fn read(&mut self, register: UartRegister) -> u32
	{
		let address = self.map.address(register);
		// Addresses produced by the map are always mapped
		self.read32(address).unwrap_or_default()
	}

	pub fn write(&mut self, register: UartRegister, value: u32)
	{
		let address = self.map.address(register);
		if let Err(error) = self.write32(address, value) {
			warn!("Write to {:?} failed: {}", register, error);
		}
	}

	/// Receive status as software would read it, without touching the bus
	pub fn rx_status(&self) -> RxStatus
	{
		let mut status = RxStatus::none();
		if self.phy.rx_symbol().is_some() {
			status = status | RxStatus::Ready;
		}
		if self.overflow {
			status = status | RxStatus::Overflow;
		}
		if self.error {
			status = status | RxStatus::Error;
		}
		status
	}

	/// Transmit status as software would read it, without touching the bus
	pub fn tx_status(&self) -> TxStatus
	{
		if self.tx.enable && self.phy.tx_ready() { TxStatus::Ready } else { TxStatus::none() }
	}

	fn direction(&mut self, direction: Direction) -> &mut DirectionState
	{
		match direction {
			Direction::Rx => &mut self.rx,
			Direction::Tx => &mut self.tx,
		}
	}

	fn set_enable(&mut self, direction: Direction, enable: bool)
	{
		if self.direction(direction).enable != enable {
			debug!("UART {:?} {}", direction, if enable { "enabled" } else { "disabled" });
		}
		self.direction(direction).enable = enable;
		match direction {
			Direction::Rx => self.phy.set_rx_reset(!enable),
			Direction::Tx => self.phy.set_tx_reset(!enable),
		}
	}

	fn set_divisor(&mut self, direction: Direction, divisor: u32)
	{
		let state = self.direction(direction);
		if state.enable {
			debug!("UART {:?} divisor write of {} ignored while enabled", direction, divisor);
			return;
		}
		if state.divisor != divisor {
			debug!("UART {:?} divisor set to {}", direction, divisor);
		}
		state.divisor = divisor;
		match direction {
			Direction::Rx => self.phy.set_rx_divisor(divisor),
			Direction::Tx => self.phy.set_tx_divisor(divisor),
		}
	}

	fn take_rx_data(&mut self) -> u8
	{
		if let Some(symbol) = self.phy.rx_symbol() {
			self.phy.rx_ack();
			self.last_rx_data = symbol;
		}
		self.last_rx_data
	}

	fn send(&mut self, symbol: u8)
	{
		if !self.tx.enable {
			debug!("UART TX disabled, dropping 0x{:02x}", symbol);
			return;
		}
		if !self.phy.tx_submit(symbol) {
			debug!("UART TX busy, 0x{:02x} not taken", symbol);
		}
		self.latch_phy_flags();
	}
}

impl<P: UartPhy> FieldStore for UartPeripheral<P>
{
	fn read_field(&mut self, direction: Direction, field: FieldId) -> u32
	{
		match (direction, field) {
			(_, FieldId::Enable) => u32::from(self.direction(direction).enable),
			(_, FieldId::Divisor) => self.direction(direction).divisor,
			(_, FieldId::PhyReserved) => self.direction(direction).phy_reserved,
			(Direction::Rx, FieldId::Ready) => u32::from(self.phy.rx_symbol().is_some()),
			(Direction::Tx, FieldId::Ready) => u32::from(self.tx.enable && self.phy.tx_ready()),
			(Direction::Rx, FieldId::Overflow) => u32::from(self.overflow),
			(Direction::Rx, FieldId::Error) => u32::from(self.error),
			(Direction::Rx, FieldId::Data) => u32::from(self.take_rx_data()),
			_ => 0,
		}
	}

	fn write_field(&mut self, direction: Direction, field: FieldId, value: u32)
	{
		match (direction, field) {
			(_, FieldId::Enable) => self.set_enable(direction, value & 1 != 0),
			(_, FieldId::Divisor) => self.set_divisor(direction, value & DIVISOR_MAX),
			(_, FieldId::PhyReserved) => self.direction(direction).phy_reserved = value,
			(Direction::Tx, FieldId::Data) => self.send(value as u8),
			_ => (),
		}
	}

	fn clear_field(&mut self, direction: Direction, field: FieldId, _bits: u32)
	{
		match (direction, field) {
			(Direction::Rx, FieldId::Overflow) => self.overflow = false,
			(Direction::Rx, FieldId::Error) => self.error = false,
			_ => (),
		}
	}
}
