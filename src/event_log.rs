// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

//! A record of what the modelled peripherals did during a run, keyed by the step it
//! happened on. Serialises to `{"events": [{"timestamp", "peripheral", "event", "payload"}]}`.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event
{
	pub timestamp: u64,
	pub peripheral: String,
	pub event: String,
	pub payload: Value,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct EventLog
{
	events: Vec<Event>,
}

impl EventLog
{
	pub fn new() -> Self
	{
		Self::default()
	}

	pub fn record(&mut self, timestamp: u64, peripheral: &str, event: &str, payload: Value)
	{
		debug!("[{}] {} {}: {}", timestamp, peripheral, event, payload);
		self.events.push(Event {
			timestamp,
			peripheral: peripheral.into(),
			event: event.into(),
			payload,
		});
	}

	pub fn events(&self) -> &[Event]
	{
		&self.events
	}

	/// Events of one kind from one peripheral, in the order they happened
	pub fn filter<'a>(&'a self, peripheral: &'a str, event: &'a str) -> impl Iterator<Item = &'a Event> + 'a
	{
		self.events
			.iter()
			.filter(move |entry| entry.peripheral == peripheral && entry.event == event)
	}

	pub fn from_reader(reader: impl Read) -> Result<Self>
	{
		Ok(serde_json::from_reader(reader)?)
	}

	pub fn write_to(&self, writer: impl Write) -> Result<()>
	{
		serde_json::to_writer_pretty(writer, self)?;
		Ok(())
	}

	pub fn save(&self, path: &Path) -> Result<()>
	{
		let mut writer = BufWriter::new(File::create(path)?);
		self.write_to(&mut writer)?;
		writer.flush()?;
		Ok(())
	}
}
