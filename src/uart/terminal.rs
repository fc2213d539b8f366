// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

//! The far end of the UART wire: something that types bytes at the peripheral and reads back
//! whatever the peripheral transmits.

use std::collections::VecDeque;

use log::warn;
use serde_json::json;

use crate::event_log::EventLog;
use crate::uart::serial::{AsyncSerialRx, AsyncSerialTx};

pub struct Terminal
{
	name: String,
	tx: AsyncSerialTx,
	rx: AsyncSerialRx,
	queue: VecDeque<u8>,
	received: Vec<u8>,
	timestamp: u64,
	events: EventLog,
}

impl Terminal
{
	pub fn new(name: &str, divisor: u32) -> Self
	{
		Self {
			name: name.into(),
			tx: AsyncSerialTx::new(divisor),
			rx: AsyncSerialRx::new(divisor),
			queue: VecDeque::new(),
			received: Vec::new(),
			timestamp: 0,
			events: EventLog::new(),
		}
	}

	/// Queue bytes to be sent down the wire to the peripheral
	pub fn send(&mut self, bytes: &[u8])
	{
		self.queue.extend(bytes);
	}

	/// Whether everything queued has been fully put on the wire
	pub fn is_idle(&self) -> bool
	{
		self.queue.is_empty() && self.tx.is_ready()
	}

	/// Bytes decoded from the peripheral's transmit line so far
	pub fn received(&self) -> &[u8]
	{
		&self.received
	}

	pub fn take_received(&mut self) -> Vec<u8>
	{
		std::mem::take(&mut self.received)
	}

	pub fn events(&self) -> &EventLog
	{
		&self.events
	}

	pub fn take_events(&mut self) -> EventLog
	{
		std::mem::take(&mut self.events)
	}

	/// Advance one step given the level the peripheral drives towards us, returning the level
	/// we drive back towards the peripheral
	pub fn step(&mut self, line_in: bool) -> bool
	{
		if self.tx.is_ready() {
			if let Some(byte) = self.queue.pop_front() {
				self.tx.submit(byte);
				self.events.record(self.timestamp, &self.name, "rx", json!(byte));
			}
		}
		let line_out = self.tx.tick();

		self.rx.tick(line_in);
		if self.rx.error() {
			warn!("{}: framing error on the line from the peripheral", self.name);
		}
		if self.rx.overflow() {
			warn!("{}: byte from the peripheral lost", self.name);
		}
		if let Some(byte) = self.rx.ack() {
			self.events.record(self.timestamp, &self.name, "tx", json!(byte));
			self.received.push(byte);
		}

		self.timestamp += 1;
		line_out
	}
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn terminals_talk_to_each_other()
	{
		let mut left = Terminal::new("left", 16);
		let mut right = Terminal::new("right", 16);
		left.send(b"hi");

		let mut left_line = true;
		let mut right_line = true;
		for _ in 0..(3 * 10 * 16) {
			let next_left = left.step(right_line);
			right_line = right.step(left_line);
			left_line = next_left;
		}

		assert!(left.is_idle());
		assert_eq!(right.received(), b"hi");
		assert_eq!(right.events().filter("right", "tx").count(), 2);
		assert_eq!(left.events().filter("left", "rx").count(), 2);
	}
}
