// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

use std::fmt::Write;
use std::path::PathBuf;

use clap::{Args, Subcommand};
use color_eyre::eyre::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use periphsim::config::{FlashConfig, SocConfig};
use periphsim::event_log::EventLog;
use periphsim::qspi::ReadCommand;
use periphsim::qspi::bus::FlashReadBus;
use periphsim::qspi::flash::SpiFlash;

use crate::cli_commands::parse_number;

#[derive(Args)]
pub struct FlashArguments
{
	#[arg(global = true, short = 'i', long = "image")]
	/// Load this file into the flash before doing anything else
	image: Option<PathBuf>,
	#[arg(global = true, long = "image-offset", value_parser = parse_number)]
	/// Where in the flash to load the image (defaults to the configured offset)
	image_offset: Option<u32>,
	#[arg(global = true, long = "read-command", value_enum)]
	/// The read command the sequencer issues (defaults to the configured one)
	read_command: Option<ReadCommand>,
	#[arg(global = true, short = 'w', long = "word-width")]
	/// Bytes returned per bus read (defaults to the configured width)
	word_width: Option<usize>,

	#[command(subcommand)]
	subcommand: FlashCommands,
}

#[derive(Subcommand)]
#[command(arg_required_else_help(true))]
enum FlashCommands
{
	/// Read from the flash through the memory-mapped read path and dump what comes back
	Read(ReadArguments),
	/// Read the flash's identification bytes
	Id,
}

#[derive(Args)]
struct ReadArguments
{
	#[arg(value_parser = parse_number)]
	/// Byte address to start reading at
	address: u32,
	#[arg(default_value_t = 64, value_parser = parse_number)]
	/// Number of bytes to read
	length: u32,
}

impl FlashArguments
{
	pub fn subcommand(&self, config: &SocConfig) -> Result<EventLog>
	{
		let mut bus = self.build_bus(config)?;
		match &self.subcommand {
			FlashCommands::Read(read_args) => read_command(&mut bus, read_args)?,
			FlashCommands::Id => {
				let id = bus.read_id()?;
				println!("Flash ID: {:02x} {:02x} {:02x} {:02x}", id[0], id[1], id[2], id[3]);
			},
		}
		Ok(bus.take_events())
	}

	fn flash_config(&self, config: &SocConfig) -> FlashConfig
	{
		let mut flash_config = config.flash.clone();
		if let Some(read_command) = self.read_command {
			flash_config.read_command = read_command;
		}
		if let Some(word_width) = self.word_width {
			flash_config.word_width = word_width;
		}
		flash_config
	}

	fn build_bus(&self, config: &SocConfig) -> Result<FlashReadBus>
	{
		let flash_config = self.flash_config(config);
		let mut flash = SpiFlash::new();
		if let Some(path) = &self.image {
			let image = std::fs::read(path).wrap_err_with(|| format!("Failed to read image {}", path.display()))?;
			let offset = self
				.image_offset
				.map_or(flash_config.image_offset, |offset| offset as usize);
			flash.load_image(&image, offset)?;
			info!("Loaded {} ({} bytes) at 0x{:06x}", path.display(), image.len(), offset);
		}
		Ok(FlashReadBus::new(&flash_config, flash)?)
	}
}

fn read_command(bus: &mut FlashReadBus, read_args: &ReadArguments) -> Result<()>
{
	let length = read_args.length as usize;
	let progress_bar = ProgressBar::new(length as u64).with_style(
		ProgressStyle::default_bar().template(" {percent:>3}% |{bar:50}| {bytes}/{total_bytes} [{elapsed}]")?,
	);

	let width = bus.sequencer().word_width();
	let data = bus.read_bytes(read_args.address, length, |words| {
		progress_bar.set_position((words * width).min(length) as u64);
	})?;
	progress_bar.finish_and_clear();
	info!("Read {} bytes in {} steps", data.len(), bus.timestamp());

	print!("{}", hexdump(read_args.address, &data));
	Ok(())
}

/// Format `data` as lines of 16 hex bytes, each prefixed with its address
fn hexdump(address: u32, data: &[u8]) -> String
{
	let mut output = String::new();
	for (index, line) in data.chunks(16).enumerate() {
		let line_address = address.wrapping_add(16 * index as u32);
		let _ = write!(output, "{:06x}:", line_address);
		for byte in line {
			let _ = write!(output, " {:02x}", byte);
		}
		output.push('\n');
	}
	output
}
