// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

//! The memory-mapped flash read path assembled end to end: a sequencer and a flash model joined
//! by their lanes, stepped together, with a software-facing read interface on top.

use log::{debug, info, warn};
use serde_json::json;

use crate::config::FlashConfig;
use crate::error::{Error, Result};
use crate::event_log::EventLog;
use crate::lane::Lane;
use crate::qspi::flash::SpiFlash;
use crate::qspi::sequencer::{BusRequest, BusResponse, FlashReadSequencer};
use crate::qspi::{FlashCommand, Octet, QspiMode};

pub struct FlashReadBus
{
	sequencer: FlashReadSequencer,
	flash: SpiFlash,
	octets: Lane<Octet>,
	received: Lane<u8>,

	timestamp: u64,
	step_budget: usize,
	events: EventLog,
}

impl FlashReadBus
{
	pub fn new(config: &FlashConfig, flash: SpiFlash) -> Result<Self>
	{
		Ok(Self {
			sequencer: FlashReadSequencer::new(config.read_command, config.word_width)?,
			flash,
			octets: Lane::new(),
			received: Lane::new(),
			timestamp: 0,
			step_budget: config.step_budget,
			events: EventLog::new(),
		})
	}

	pub fn sequencer(&self) -> &FlashReadSequencer
	{
		&self.sequencer
	}

	pub fn flash(&self) -> &SpiFlash
	{
		&self.flash
	}

	pub fn flash_mut(&mut self) -> &mut SpiFlash
	{
		&mut self.flash
	}

	pub fn step_budget(&self) -> usize
	{
		self.step_budget
	}

	pub fn set_step_budget(&mut self, step_budget: usize)
	{
		self.step_budget = step_budget;
	}

	/// Return the whole read path to idle: abandon the sequencer's transaction, empty both
	/// lanes and deselect the flash
	pub fn reset(&mut self)
	{
		self.sequencer.reset();
		self.octets.clear();
		self.received.clear();
		self.flash.deselect();
	}

	/// Steps taken since construction
	pub fn timestamp(&self) -> u64
	{
		self.timestamp
	}

	pub fn events(&self) -> &EventLog
	{
		&self.events
	}

	pub fn take_events(&mut self) -> EventLog
	{
		std::mem::take(&mut self.events)
	}

	/// Advance both sides of the lane by one step with `request` presented to the sequencer
	pub fn step(&mut self, request: Option<&BusRequest>) -> BusResponse
	{
		let response = self.sequencer.step(request, &mut self.octets, &mut self.received);
		self.flash.step(&mut self.octets, &mut self.received);
		self.timestamp += 1;
		response
	}

	/// Read one word starting at byte `address`, holding the request until it is acknowledged.
	/// A read that runs out of steps is abandoned and leaves the read path idle.
	pub fn read_word(&mut self, address: u32) -> Result<u64>
	{
		if !self.sequencer.is_idle() {
			return Err(Error::BusBusy);
		}

		let request = BusRequest::read(address);
		let result = self.run_read(&request);
		if result.is_err() {
			warn!("Read of 0x{:06x} stalled, resetting the flash read path", request.address);
			self.reset();
		}
		result
	}

	fn run_read(&mut self, request: &BusRequest) -> Result<u64>
	{
		let mut steps = 0;
		let data = loop {
			if steps == self.step_budget {
				return Err(Error::TransactionStalled {
					address: request.address,
					steps,
				});
			}
			steps += 1;
			let response = self.step(Some(request));
			if response.ack {
				break response.data;
			}
		};

		// Let chip select go inactive before anything else is started
		while !self.sequencer.is_idle() {
			if steps == self.step_budget {
				return Err(Error::TransactionStalled {
					address: request.address,
					steps,
				});
			}
			steps += 1;
			self.step(None);
		}

		self.events.record(
			self.timestamp,
			"flash",
			"read",
			json!({ "address": request.address, "data": data }),
		);
		Ok(data)
	}

	/// Read `count` consecutive words from `address` on, calling `progress` with the number of
	/// words read so far after each one
	pub fn read_words(&mut self, address: u32, count: usize, mut progress: impl FnMut(usize)) -> Result<Vec<u64>>
	{
		let width = self.sequencer.word_width() as u32;
		let mut words = Vec::with_capacity(count);
		for index in 0..count {
			let word_address = address.wrapping_add(width.wrapping_mul(index as u32));
			words.push(self.read_word(word_address)?);
			progress(index + 1);
		}
		Ok(words)
	}

	/// Read `length` bytes from `address` on, a word at a time
	pub fn read_bytes(&mut self, address: u32, length: usize, progress: impl FnMut(usize)) -> Result<Vec<u8>>
	{
		let width = self.sequencer.word_width();
		let words = self.read_words(address, length.div_ceil(width), progress)?;
		let mut bytes: Vec<u8> = words
			.iter()
			.flat_map(|word| word.to_le_bytes().into_iter().take(width))
			.collect();
		bytes.truncate(length);
		Ok(bytes)
	}

	/// Read the flash's JEDEC identification bytes by driving the lane directly. Only valid
	/// while no read transaction is in progress.
	pub fn read_id(&mut self) -> Result<[u8; 4]>
	{
		if !self.sequencer.is_idle() {
			return Err(Error::BusBusy);
		}

		let id = match self.run_read_id() {
			Ok(id) => id,
			Err(err) => {
				warn!("Flash ID read stalled, resetting the flash read path");
				self.reset();
				return Err(err);
			},
		};

		info!("Flash ID: {:02x?}", id);
		self.events.record(self.timestamp, "flash", "id", json!(id));
		Ok(id)
	}

	fn run_read_id(&mut self) -> Result<[u8; 4]>
	{
		self.clock(Octet::put(FlashCommand::ReadId.opcode()))?;
		let mut id = [0; 4];
		for byte in &mut id {
			*byte = self.clock(Octet::get(QspiMode::GetX1))?.unwrap_or(0xff);
		}
		self.clock(Octet::deselect())?;
		Ok(id)
	}

	/// Put one octet on the lane and wait for the flash to take it (and answer it, for a
	/// receive octet)
	fn clock(&mut self, octet: Octet) -> Result<Option<u8>>
	{
		let wants_answer = octet.chip && octet.mode.is_receive();
		let mut outstanding = Some(octet);
		for _ in 0..self.step_budget {
			if let Some(octet) = outstanding.take() {
				if let Err(octet) = self.octets.try_push(octet) {
					outstanding = Some(octet);
				}
			}
			self.flash.step(&mut self.octets, &mut self.received);
			self.timestamp += 1;

			if outstanding.is_none() && self.octets.is_ready() {
				if !wants_answer {
					return Ok(None);
				}
				if let Some(byte) = self.received.try_pop() {
					return Ok(Some(byte));
				}
			}
		}
		debug!("Flash did not take {:?}", octet);
		Err(Error::TransactionStalled {
			address: 0,
			steps: self.step_budget,
		})
	}
}
