// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

use clap::{ArgAction, Args, Subcommand};
use color_eyre::eyre::{OptionExt, Result};
use log::{info, warn};
use periphsim::config::SocConfig;
use periphsim::error::Error;
use periphsim::event_log::EventLog;
use periphsim::log_and_return;
use periphsim::uart::driver::UartDriver;
use periphsim::uart::peripheral::UartPeripheral;
use periphsim::uart::phy::{LineEnd, LoopbackPhy, SerialPhy, UartPhy};
use periphsim::uart::regs::DIVISOR_MAX;
use periphsim::uart::terminal::Terminal;
use serde_json::json;

use crate::cli_commands::parse_number;

#[derive(Args)]
pub struct UartArguments
{
	#[arg(global = true, short = 'd', long = "divisor", value_parser = parse_number)]
	/// Bit period in steps (defaults to the configured clock over the configured baud rate)
	divisor: Option<u32>,

	#[command(subcommand)]
	subcommand: UartCommands,
}

#[derive(Subcommand)]
#[command(arg_required_else_help(true))]
enum UartCommands
{
	/// Type text at the peripheral from a terminal on the far end of the wire and have the
	/// driver echo it back
	Echo(TextArguments),
	/// Send text through the peripheral with its transmit side looped back to its receive side
	Loopback(LoopbackArguments),
}

#[derive(Args)]
struct TextArguments
{
	/// The text to send
	text: String,
}

#[derive(Args)]
struct LoopbackArguments
{
	#[arg(long = "fifo", action = ArgAction::SetTrue)]
	/// Loop back through a small FIFO instead of over a modelled serial wire
	fifo: bool,
	/// The text to send
	text: String,
}

impl UartArguments
{
	pub fn subcommand(&self, config: &SocConfig) -> Result<EventLog>
	{
		let divisor = checked_divisor(self.divisor, config)?;
		match &self.subcommand {
			UartCommands::Echo(text_args) => echo_command(config, divisor, &text_args.text),
			UartCommands::Loopback(loopback_args) => {
				if loopback_args.fifo {
					loopback_command(LoopbackPhy::new(), config, divisor, &loopback_args.text)
				} else {
					loopback_command(SerialPhy::looped(divisor), config, divisor, &loopback_args.text)
				}
			},
		}
	}
}

/// Pick the divisor to run with, refusing one too wide for the divisor registers rather than
/// letting it be truncated on the way in
fn checked_divisor(divisor: Option<u32>, config: &SocConfig) -> periphsim::error::Result<u32>
{
	let divisor = divisor.unwrap_or_else(|| config.divisor());
	if divisor > DIVISOR_MAX {
		log_and_return!(Error::InvalidDivisor(divisor));
	}
	Ok(divisor)
}

/// Polls to allow per byte: comfortably more than one frame's worth of steps
fn poll_budget(divisor: u32) -> usize
{
	4 * divisor.max(1) as usize + 64
}

fn configured_driver<P: UartPhy>(phy: P, config: &SocConfig, divisor: u32) -> Result<UartDriver<P>>
{
	let peripheral = UartPeripheral::from_config(phy, config)?;
	let mut driver = UartDriver::new(peripheral, poll_budget(divisor));
	driver.configure(divisor);
	Ok(driver)
}

fn echo_command(config: &SocConfig, divisor: u32, text: &str) -> Result<EventLog>
{
	let terminal = Terminal::new("terminal", divisor);
	let phy = SerialPhy::new(divisor, LineEnd::Terminal(terminal));
	let mut driver = configured_driver(phy, config, divisor)?;
	// Only start typing once the receiver is listening
	driver
		.peripheral_mut()
		.phy_mut()
		.terminal_mut()
		.ok_or_eyre("No terminal attached to the PHY")?
		.send(text.as_bytes());

	for _ in text.bytes() {
		let byte = driver.wait_byte()?;
		driver.write_byte(byte)?;
	}

	// Let the last echoed frame finish reaching the terminal
	let expected = text.len();
	for _ in 0..poll_budget(divisor) * 4 {
		let terminal = driver
			.peripheral()
			.phy()
			.terminal()
			.ok_or_eyre("No terminal attached to the PHY")?;
		if terminal.received().len() == expected {
			break;
		}
		driver.idle(1);
	}

	let terminal = driver
		.peripheral_mut()
		.phy_mut()
		.terminal_mut()
		.ok_or_eyre("No terminal attached to the PHY")?;
	let echoed = terminal.take_received();
	if echoed.len() != expected {
		warn!("Only {} of {} bytes were echoed back", echoed.len(), expected);
	}
	println!("{}", String::from_utf8_lossy(&echoed));
	Ok(terminal.take_events())
}

fn loopback_command<P: UartPhy>(phy: P, config: &SocConfig, divisor: u32, text: &str) -> Result<EventLog>
{
	let mut driver = configured_driver(phy, config, divisor)?;
	let mut events = EventLog::new();

	let mut looped = Vec::with_capacity(text.len());
	for byte in text.bytes() {
		driver.write_byte(byte)?;
		events.record(driver.peripheral().timestamp(), "uart", "tx", json!(byte));
		let byte = driver.wait_byte()?;
		events.record(driver.peripheral().timestamp(), "uart", "rx", json!(byte));
		looped.push(byte);
	}

	info!("Looped {} bytes in {} steps", looped.len(), driver.peripheral().timestamp());
	println!("{}", String::from_utf8_lossy(&looped));
	Ok(events)
}
