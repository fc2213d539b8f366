// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

//! Flow-controlled single-slot channels.
//!
//! A [`Lane`] stands in for a valid/ready stream between two components that advance in
//! lockstep. The producer offers an item with [`Lane::try_push`]; the offer only succeeds when
//! the slot is free, so a refused producer keeps its item and offers the very same value again
//! on the next step. The consumer takes the item with [`Lane::try_pop`], which hands it out
//! exactly once.

/// A capacity-1 channel carrying items of type `T` from one producer to one consumer
#[derive(Debug)]
pub struct Lane<T>
{
	slot: Option<T>,
}

impl<T> Default for Lane<T>
{
	fn default() -> Self
	{
		Self::new()
	}
}

impl<T> Lane<T>
{
	pub const fn new() -> Self
	{
		Self {
			slot: None,
		}
	}

	/// Offer an item to the consumer, handing it back if the slot is still occupied
	pub fn try_push(&mut self, item: T) -> Result<(), T>
	{
		if self.slot.is_some() {
			return Err(item);
		}
		self.slot = Some(item);
		Ok(())
	}

	/// Take the pending item, if any
	pub fn try_pop(&mut self) -> Option<T>
	{
		self.slot.take()
	}

	pub fn peek(&self) -> Option<&T>
	{
		self.slot.as_ref()
	}

	/// Whether the producer side may push this step
	pub fn is_ready(&self) -> bool
	{
		self.slot.is_none()
	}

	/// Whether the consumer side has an item waiting
	pub fn is_valid(&self) -> bool
	{
		self.slot.is_some()
	}

	/// Drop whatever is in flight, as a reset of either end would
	pub fn clear(&mut self)
	{
		self.slot = None;
	}
}
