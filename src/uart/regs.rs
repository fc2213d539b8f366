// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

//! The UART register file, described as data.
//!
//! Each register is an ordered list of fields, and each field carries an access policy tag.
//! [`read_register`] and [`write_register`] apply those policies uniformly, so the peripheral
//! only has to know how to load, store and clear the fields it owns.

use bitmask_enum::bitmask;

use crate::error::{Error, Result};

/// Largest divisor the PhyConfig register can hold
pub const DIVISOR_MAX: u32 = 0x00ff_ffff;
/// Address span of one direction's register block
pub const BLOCK_SIZE: u16 = 0x10;
/// Width of every register, in bytes of the CSR bus
pub const REGISTER_BYTES: u16 = 4;
/// Registers across both blocks
pub const REGISTER_COUNT: usize = 8;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Direction
{
	Rx,
	Tx,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FieldAccess
{
	ReadOnly,
	WriteOnly,
	ReadWrite,
	/// Reads the flag, writing 1 clears it, writing 0 leaves it alone
	WriteOneToClear,
	/// Reads as zero, writes are dropped
	ReservedZero,
	/// Not interpreted, but reads back whatever was last written
	ReservedLast,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FieldId
{
	Enable,
	Divisor,
	PhyReserved,
	Ready,
	Overflow,
	Error,
	Data,
	Reserved,
}

#[derive(Debug)]
pub struct Field
{
	pub id: FieldId,
	pub shift: u8,
	pub width: u8,
	pub access: FieldAccess,
}

impl Field
{
	const fn new(id: FieldId, shift: u8, width: u8, access: FieldAccess) -> Self
	{
		Self {
			id,
			shift,
			width,
			access,
		}
	}

	pub fn mask(&self) -> u32
	{
		if self.width >= 32 { u32::MAX } else { (1 << self.width) - 1 }
	}
}

#[derive(Debug)]
pub struct Register
{
	pub name: &'static str,
	pub direction: Direction,
	/// Offset within the direction's block
	pub offset: u16,
	pub fields: &'static [Field],
}

const CONFIG_FIELDS: &[Field] = &[
	Field::new(FieldId::Enable, 0, 1, FieldAccess::ReadWrite),
	Field::new(FieldId::Reserved, 1, 31, FieldAccess::ReservedZero),
];

const PHY_CONFIG_FIELDS: &[Field] = &[
	Field::new(FieldId::Divisor, 0, 24, FieldAccess::ReadWrite),
	Field::new(FieldId::PhyReserved, 24, 8, FieldAccess::ReservedLast),
];

const RX_STATUS_FIELDS: &[Field] = &[
	Field::new(FieldId::Ready, 0, 1, FieldAccess::ReadOnly),
	Field::new(FieldId::Overflow, 1, 1, FieldAccess::WriteOneToClear),
	Field::new(FieldId::Error, 2, 1, FieldAccess::WriteOneToClear),
	Field::new(FieldId::Reserved, 3, 29, FieldAccess::ReservedZero),
];

const RX_DATA_FIELDS: &[Field] = &[
	Field::new(FieldId::Data, 0, 8, FieldAccess::ReadOnly),
	Field::new(FieldId::Reserved, 8, 24, FieldAccess::ReservedZero),
];

const TX_STATUS_FIELDS: &[Field] = &[
	Field::new(FieldId::Ready, 0, 1, FieldAccess::ReadOnly),
	Field::new(FieldId::Reserved, 1, 31, FieldAccess::ReservedZero),
];

const TX_DATA_FIELDS: &[Field] = &[
	Field::new(FieldId::Data, 0, 8, FieldAccess::WriteOnly),
	Field::new(FieldId::Reserved, 8, 24, FieldAccess::ReservedZero),
];

/// Every register, RX block first; the index into this table identifies a register
pub static REGISTERS: [Register; REGISTER_COUNT] = [
	Register {
		name: "RxConfig",
		direction: Direction::Rx,
		offset: 0x0,
		fields: CONFIG_FIELDS,
	},
	Register {
		name: "RxPhyConfig",
		direction: Direction::Rx,
		offset: 0x4,
		fields: PHY_CONFIG_FIELDS,
	},
	Register {
		name: "RxStatus",
		direction: Direction::Rx,
		offset: 0x8,
		fields: RX_STATUS_FIELDS,
	},
	Register {
		name: "RxData",
		direction: Direction::Rx,
		offset: 0xc,
		fields: RX_DATA_FIELDS,
	},
	Register {
		name: "TxConfig",
		direction: Direction::Tx,
		offset: 0x0,
		fields: CONFIG_FIELDS,
	},
	Register {
		name: "TxPhyConfig",
		direction: Direction::Tx,
		offset: 0x4,
		fields: PHY_CONFIG_FIELDS,
	},
	Register {
		name: "TxStatus",
		direction: Direction::Tx,
		offset: 0x8,
		fields: TX_STATUS_FIELDS,
	},
	Register {
		name: "TxData",
		direction: Direction::Tx,
		offset: 0xc,
		fields: TX_DATA_FIELDS,
	},
];

/// Typed names for the entries of [`REGISTERS`]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum UartRegister
{
	RxConfig,
	RxPhyConfig,
	RxStatus,
	RxData,
	TxConfig,
	TxPhyConfig,
	TxStatus,
	TxData,
}

impl UartRegister
{
	pub fn index(self) -> usize
	{
		self as usize
	}

	pub fn descriptor(self) -> &'static Register
	{
		&REGISTERS[self.index()]
	}
}

#[bitmask(u32)]
pub enum RxStatus
{
	Ready = 0b001,
	Overflow = 0b010,
	Error = 0b100,
}

#[bitmask(u32)]
pub enum TxStatus
{
	Ready = 0b1,
}

/// Where the two register blocks sit on the CSR bus
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RegisterMap
{
	rx_base: u16,
	tx_base: u16,
}

impl Default for RegisterMap
{
	fn default() -> Self
	{
		Self {
			rx_base: 0x000,
			tx_base: 0x200,
		}
	}
}

impl RegisterMap
{
	/// Place the two register blocks. Each block must be word aligned, lie wholly inside the
	/// 16-bit CSR address space and not overlap the other.
	pub fn new(rx_base: u16, tx_base: u16) -> Result<Self>
	{
		if rx_base % 4 != 0 || tx_base % 4 != 0 {
			return Err(Error::InvalidConfig(format!(
				"UART register blocks must be word aligned (rx 0x{:03x}, tx 0x{:03x})",
				rx_base, tx_base
			)));
		}
		if rx_base.checked_add(BLOCK_SIZE).is_none() || tx_base.checked_add(BLOCK_SIZE).is_none() {
			return Err(Error::InvalidConfig(format!(
				"UART register blocks at 0x{:04x} and 0x{:04x} run off the end of the bus",
				rx_base, tx_base
			)));
		}
		if rx_base.abs_diff(tx_base) < BLOCK_SIZE {
			return Err(Error::InvalidConfig(format!(
				"UART register blocks at 0x{:03x} and 0x{:03x} overlap",
				rx_base, tx_base
			)));
		}

		Ok(Self {
			rx_base,
			tx_base,
		})
	}

	fn base(&self, direction: Direction) -> u16
	{
		match direction {
			Direction::Rx => self.rx_base,
			Direction::Tx => self.tx_base,
		}
	}

	/// Bus address of a register's first byte
	pub fn address(&self, register: UartRegister) -> u16
	{
		let descriptor = register.descriptor();
		self.base(descriptor.direction) + descriptor.offset
	}

	/// Find the register covering a bus address, along with its index in [`REGISTERS`] and
	/// which of its bytes the address selects
	pub fn lookup(&self, address: u16) -> Option<(usize, &'static Register, u16)>
	{
		REGISTERS.iter().enumerate().find_map(|(index, register)| {
			let start = self.base(register.direction) + register.offset;
			(start..start + REGISTER_BYTES)
				.contains(&address)
				.then(|| (index, register, address - start))
		})
	}

	/// As [`RegisterMap::lookup`], but only accepting the address of a register's first byte
	pub fn register_at(&self, address: u16) -> Result<(usize, &'static Register)>
	{
		match self.lookup(address) {
			Some((index, register, 0)) => Ok((index, register)),
			_ => Err(Error::UnmappedRegister(address)),
		}
	}
}

/// Backing storage for the fields of the register file
pub trait FieldStore
{
	/// Current value of a field. Reading a field may have side effects (RxData takes the
	/// waiting byte).
	fn read_field(&mut self, direction: Direction, field: FieldId) -> u32;
	fn write_field(&mut self, direction: Direction, field: FieldId, value: u32);
	/// Clear the bits of a write-one-to-clear field that are set in `bits`
	fn clear_field(&mut self, direction: Direction, field: FieldId, bits: u32);
}

pub fn read_register(register: &Register, store: &mut impl FieldStore) -> u32
{
	register.fields.iter().fold(0, |value, field| {
		let bits = match field.access {
			FieldAccess::ReadOnly |
			FieldAccess::ReadWrite |
			FieldAccess::WriteOneToClear |
			FieldAccess::ReservedLast => store.read_field(register.direction, field.id) & field.mask(),
			FieldAccess::WriteOnly | FieldAccess::ReservedZero => 0,
		};
		value | (bits << field.shift)
	})
}

pub fn write_register(register: &Register, value: u32, store: &mut impl FieldStore)
{
	for field in register.fields {
		let bits = (value >> field.shift) & field.mask();
		match field.access {
			FieldAccess::ReadWrite | FieldAccess::WriteOnly | FieldAccess::ReservedLast => {
				store.write_field(register.direction, field.id, bits)
			},
			FieldAccess::WriteOneToClear => {
				if bits != 0 {
					store.clear_field(register.direction, field.id, bits);
				}
			},
			FieldAccess::ReadOnly | FieldAccess::ReservedZero => (),
		}
	}
}

#[cfg(test)]
mod tests
{
	use std::collections::HashMap;

	use super::*;

	/// Plain storage with every field independent
	#[derive(Default)]
	struct Fields(HashMap<(Direction, u8), u32>);

	fn key(direction: Direction, field: FieldId) -> (Direction, u8)
	{
		(direction, field as u8)
	}

	impl FieldStore for Fields
	{
		fn read_field(&mut self, direction: Direction, field: FieldId) -> u32
		{
			self.0.get(&key(direction, field)).copied().unwrap_or(0)
		}

		fn write_field(&mut self, direction: Direction, field: FieldId, value: u32)
		{
			self.0.insert(key(direction, field), value);
		}

		fn clear_field(&mut self, direction: Direction, field: FieldId, bits: u32)
		{
			if let Some(value) = self.0.get_mut(&key(direction, field)) {
				*value &= !bits;
			}
		}
	}

	#[test]
	fn field_layouts_cover_each_register()
	{
		for register in &REGISTERS {
			let covered = register
				.fields
				.iter()
				.fold(0u64, |bits, field| bits + u64::from(field.width));
			assert_eq!(covered, 32, "{} does not cover 32 bits", register.name);
		}
	}

	#[test]
	fn sticky_flags_clear_only_on_one()
	{
		let mut fields = Fields::default();
		let status = UartRegister::RxStatus.descriptor();

		// 1 written to a clear flag stays clear
		write_register(status, 0b010, &mut fields);
		assert_eq!(read_register(status, &mut fields), 0);

		fields.write_field(Direction::Rx, FieldId::Overflow, 1);
		fields.write_field(Direction::Rx, FieldId::Error, 1);
		fields.write_field(Direction::Rx, FieldId::Ready, 1);
		assert_eq!(read_register(status, &mut fields), 0b111);

		// 0 never changes anything, and ready cannot be written
		write_register(status, 0b000, &mut fields);
		assert_eq!(read_register(status, &mut fields), 0b111);
		write_register(status, 0b011, &mut fields);
		assert_eq!(read_register(status, &mut fields), 0b101);
		write_register(status, 0b100, &mut fields);
		assert_eq!(read_register(status, &mut fields), 0b001);
	}

	#[test]
	fn reserved_fields()
	{
		let mut fields = Fields::default();
		let config = UartRegister::TxConfig.descriptor();
		write_register(config, 0xffff_ffff, &mut fields);
		assert_eq!(read_register(config, &mut fields), 1);

		let phy_config = UartRegister::TxPhyConfig.descriptor();
		write_register(phy_config, 0xa500_01a1, &mut fields);
		assert_eq!(read_register(phy_config, &mut fields), 0xa500_01a1);
	}

	#[test]
	fn write_only_data_reads_as_zero()
	{
		let mut fields = Fields::default();
		let data = UartRegister::TxData.descriptor();
		write_register(data, 0x61, &mut fields);
		assert_eq!(fields.read_field(Direction::Tx, FieldId::Data), 0x61);
		assert_eq!(read_register(data, &mut fields), 0);
	}

	#[test]
	fn clustered_layout_addresses()
	{
		let map = RegisterMap::default();
		assert_eq!(map.address(UartRegister::RxStatus), 0x008);
		assert_eq!(map.address(UartRegister::TxData), 0x20c);

		let (index, register, byte) = map.lookup(0x20e).unwrap();
		assert_eq!(index, UartRegister::TxData.index());
		assert_eq!(register.name, "TxData");
		assert_eq!(byte, 2);

		assert!(map.lookup(0x010).is_none());
		assert!(matches!(map.register_at(0x20e), Err(Error::UnmappedRegister(0x20e))));
	}

	#[test]
	fn block_placement_is_checked()
	{
		assert!(matches!(RegisterMap::new(0xfff0, 0x0000), Err(Error::InvalidConfig(_))));
		assert!(matches!(RegisterMap::new(0x0000, 0xfffc), Err(Error::InvalidConfig(_))));
		assert!(matches!(RegisterMap::new(0x0100, 0x0108), Err(Error::InvalidConfig(_))));
		assert!(matches!(RegisterMap::new(0x0102, 0x0200), Err(Error::InvalidConfig(_))));

		// The highest blocks that still fit are fine, and every lookup stays in range
		let map = RegisterMap::new(0xffd0, 0xffe0).unwrap();
		assert_eq!(map.address(UartRegister::TxData), 0xffec);
		assert!(map.lookup(0x0100).is_none());
		assert!(map.lookup(0xffff).is_none());
	}

	#[test]
	fn status_bits_match_the_register_layout()
	{
		let status = RxStatus::Ready | RxStatus::Overflow;
		assert_eq!(status.bits(), 0b011);
		assert!(status.contains(RxStatus::Overflow));
		assert!(!status.contains(RxStatus::Error));
		assert_eq!(TxStatus::Ready.bits(), 1);
	}
}
