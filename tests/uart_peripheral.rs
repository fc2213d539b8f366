// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

#[cfg(test)]
mod tests
{
	use color_eyre::eyre::Result;
	use periphsim::config::SocConfig;
	use periphsim::uart::peripheral::UartPeripheral;
	use periphsim::uart::phy::{LineEnd, LoopbackPhy, SerialPhy, UartPhy};
	use periphsim::uart::regs::{RegisterMap, RxStatus, TxStatus, UartRegister};

	const RX_CONFIG: u16 = 0x000;
	const RX_PHY_CONFIG: u16 = 0x004;
	const RX_STATUS: u16 = 0x008;
	const RX_DATA: u16 = 0x00c;
	const TX_CONFIG: u16 = 0x200;
	const TX_STATUS: u16 = 0x208;
	const TX_DATA: u16 = 0x20c;

	/// One register access over the byte-wide CSR bus, checking what was read if `read` is given
	fn csr<P: UartPhy>(uart: &mut UartPeripheral<P>, address: u16, read: Option<u32>, write: Option<u32>) -> Result<()>
	{
		let value = uart.access32(address, read.is_some(), write)?;
		if let Some(expected) = read {
			assert_eq!(value, expected, "read of 0x{:03x}", address);
		}
		Ok(())
	}

	fn run<P: UartPhy>(uart: &mut UartPeripheral<P>, steps: usize)
	{
		for _ in 0..steps {
			uart.tick();
		}
	}

	/// Poll a status register until `bit` comes up
	fn poll<P: UartPhy>(uart: &mut UartPeripheral<P>, register: UartRegister, bit: u32) -> bool
	{
		(0..10_000).any(|_| uart.read(register) & bit != 0)
	}

	#[test]
	fn register_walkthrough_over_a_fifo_loopback() -> Result<()>
	{
		let config = SocConfig::default();
		let mut uart = UartPeripheral::from_config(LoopbackPhy::new(), &config)?;

		// Disabled: nothing ready, and transmitted bytes go nowhere
		csr(&mut uart, RX_STATUS, Some(0b000), None)?;
		csr(&mut uart, TX_STATUS, Some(0), None)?;
		csr(&mut uart, TX_DATA, None, Some(u32::from(b'x')))?;
		uart.tick();
		csr(&mut uart, RX_STATUS, Some(0b000), None)?;

		// Enable both directions, reading the old value on the way
		csr(&mut uart, RX_CONFIG, Some(0), Some(1))?;
		uart.tick();
		csr(&mut uart, TX_CONFIG, Some(0), Some(1))?;
		uart.tick();
		csr(&mut uart, RX_STATUS, Some(0b000), None)?;

		for &byte in b"abcd" {
			csr(&mut uart, TX_STATUS, Some(1), None)?;
			csr(&mut uart, TX_DATA, None, Some(u32::from(byte)))?;
			uart.tick();
		}
		csr(&mut uart, RX_STATUS, Some(0b001), None)?;
		csr(&mut uart, TX_STATUS, Some(0), None)?;

		// The loopback is full, this one is lost
		csr(&mut uart, TX_DATA, None, Some(u32::from(b'e')))?;
		uart.tick();
		csr(&mut uart, RX_STATUS, Some(0b011), Some(0b010))?;
		uart.tick();

		for &byte in b"abcd" {
			csr(&mut uart, RX_STATUS, Some(0b001), None)?;
			csr(&mut uart, RX_DATA, Some(u32::from(byte)), None)?;
		}
		csr(&mut uart, RX_STATUS, Some(0b000), None)?;

		for &byte in b"efgh" {
			csr(&mut uart, TX_STATUS, Some(1), None)?;
			csr(&mut uart, TX_DATA, None, Some(u32::from(byte)))?;
			uart.tick();
		}
		csr(&mut uart, TX_STATUS, Some(0), None)?;
		csr(&mut uart, RX_STATUS, Some(0b001), None)?;

		// Disabling drops whatever was buffered
		csr(&mut uart, RX_CONFIG, Some(1), Some(0))?;
		uart.tick();
		csr(&mut uart, TX_CONFIG, Some(1), Some(0))?;
		uart.tick();
		csr(&mut uart, TX_STATUS, Some(0), None)?;
		csr(&mut uart, RX_STATUS, Some(0b000), None)?;

		csr(&mut uart, RX_CONFIG, Some(0), Some(1))?;
		uart.tick();
		csr(&mut uart, TX_CONFIG, Some(0), Some(1))?;
		uart.tick();
		csr(&mut uart, TX_STATUS, Some(1), None)?;
		csr(&mut uart, RX_STATUS, Some(0b000), None)?;
		Ok(())
	}

	#[test]
	fn bytes_loop_back_over_the_serial_line_in_order() -> Result<()>
	{
		let divisor = 417;
		let mut uart = UartPeripheral::new(SerialPhy::looped(divisor), RegisterMap::default(), 0)?;
		uart.write(UartRegister::RxPhyConfig, divisor);
		uart.write(UartRegister::TxPhyConfig, divisor);
		uart.write(UartRegister::RxConfig, 1);
		uart.write(UartRegister::TxConfig, 1);

		for &byte in b"abcd" {
			assert!(poll(&mut uart, UartRegister::TxStatus, TxStatus::Ready.bits()));
			uart.write(UartRegister::TxData, u32::from(byte));

			assert!(poll(&mut uart, UartRegister::RxStatus, RxStatus::Ready.bits()));
			assert_eq!(uart.read(UartRegister::RxData), u32::from(byte));
			assert_eq!(uart.read(UartRegister::RxStatus), 0);
		}
		Ok(())
	}

	#[test]
	fn disabling_mid_frame_exposes_nothing() -> Result<()>
	{
		let divisor = 417;
		let mut uart = UartPeripheral::new(SerialPhy::looped(divisor), RegisterMap::default(), divisor)?;
		uart.write(UartRegister::RxConfig, 1);
		uart.write(UartRegister::TxConfig, 1);
		uart.write(UartRegister::TxData, u32::from(b'z'));

		run(&mut uart, 5 * divisor as usize);
		uart.write(UartRegister::RxConfig, 0);
		run(&mut uart, 6 * divisor as usize);
		assert_eq!(uart.read(UartRegister::RxStatus), 0);

		// The frame has long finished by the time the receiver listens again
		uart.write(UartRegister::RxConfig, 1);
		run(&mut uart, 12 * divisor as usize);
		assert_eq!(uart.read(UartRegister::RxStatus), 0);
		assert_eq!(uart.read(UartRegister::RxData), 0);
		Ok(())
	}

	#[test]
	fn divisor_changes_only_while_disabled() -> Result<()>
	{
		let mut uart = UartPeripheral::new(LoopbackPhy::new(), RegisterMap::default(), 416)?;
		csr(&mut uart, RX_PHY_CONFIG, Some(416), Some(417))?;
		csr(&mut uart, RX_PHY_CONFIG, Some(417), None)?;

		csr(&mut uart, RX_CONFIG, None, Some(1))?;
		csr(&mut uart, RX_PHY_CONFIG, None, Some(1000))?;
		csr(&mut uart, RX_PHY_CONFIG, Some(417), None)?;

		csr(&mut uart, RX_CONFIG, None, Some(0))?;
		csr(&mut uart, RX_PHY_CONFIG, None, Some(1000))?;
		csr(&mut uart, RX_PHY_CONFIG, Some(1000), None)?;
		Ok(())
	}

	#[test]
	fn framing_errors_stick_until_cleared() -> Result<()>
	{
		let divisor = 8;
		let mut uart = UartPeripheral::new(SerialPhy::new(divisor, LineEnd::Open), RegisterMap::default(), divisor)?;
		uart.write(UartRegister::RxConfig, 1);

		// Hold the line low for a whole frame, so the stop bit is missing
		uart.phy_mut().set_rx_line(false);
		run(&mut uart, 10 * divisor as usize);
		uart.phy_mut().set_rx_line(true);
		run(&mut uart, 20 * divisor as usize);

		assert_eq!(uart.rx_status(), RxStatus::Error);
		run(&mut uart, 20 * divisor as usize);
		assert_eq!(uart.read(UartRegister::RxStatus), RxStatus::Error.bits());

		// Writing zero leaves it alone, writing one clears it
		uart.write(UartRegister::RxStatus, 0);
		assert_eq!(uart.read(UartRegister::RxStatus), RxStatus::Error.bits());
		uart.write(UartRegister::RxStatus, RxStatus::Error.bits());
		assert_eq!(uart.read(UartRegister::RxStatus), 0);
		Ok(())
	}

	#[test]
	fn unmapped_addresses_read_as_zero() -> Result<()>
	{
		let mut uart = UartPeripheral::new(LoopbackPhy::new(), RegisterMap::new(0x040, 0x080)?, 416)?;
		assert_eq!(uart.csr_access(0x000, true, None), 0);
		assert!(uart.read32(0x000).is_err());
		csr(&mut uart, 0x048, Some(0), None)?;
		csr(&mut uart, 0x084, Some(416), None)?;
		Ok(())
	}
}
