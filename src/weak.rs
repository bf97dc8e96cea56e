//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use std::ptr::NonNull;

use crate::block::{self, ControlBlock};
use crate::shared::Shared;

//--------------------------------------------------------------------------------------------------

/// Weak reference-counted handle.
///
/// Observes the liveness of a payload without keeping it alive. The payload
/// is never dereferenced through a `Weak`; the only way at it is a successful
/// [`upgrade`](Weak::upgrade) or [`Shared::from_weak`] promotion.
///
/// A `Weak` does keep the control block itself allocated, so for inline-block
/// payloads the raw storage (not the resources) stays pinned until the last
/// weak handle goes away.
pub struct Weak<T: ?Sized> {
	pub(crate) ptr: Option<NonNull<T>>,
	pub(crate) block: Option<NonNull<dyn ControlBlock>>,
}

impl<T: ?Sized> Weak<T> {
	/// A handle observing nothing; always expired.
	pub const fn empty() -> Self {
		Self { ptr: None, block: None }
	}

	/// Current strong count of the observed block, 0 for an empty handle.
	pub fn use_count(&self) -> usize {
		match self.block {
			Some(block) => unsafe { block.as_ref() }.strong_count(),
			None => 0,
		}
	}

	/// True iff the payload no longer exists. Empty handles are expired.
	pub fn expired(&self) -> bool {
		self.use_count() == 0
	}

	/// Promotes to a strong handle, `None` if the payload is already gone.
	///
	/// On success the strong count is one higher than before the call.
	pub fn upgrade(&self) -> Option<Shared<T>> {
		Shared::from_weak(self).ok()
	}

	/// Releases the weak unit, leaving the handle empty.
	pub fn reset(&mut self) {
		*self = Self::empty();
	}

	/// O(1) exchange of the two handles' state, no counter traffic.
	pub fn swap(&mut self, other: &mut Self) {
		std::mem::swap(self, other);
	}

	pub fn is_empty(&self) -> bool {
		self.block.is_none()
	}
}

impl<T: ?Sized> Clone for Weak<T> {
	fn clone(&self) -> Self {
		if let Some(block) = self.block {
			unsafe { block.as_ref() }.inc_weak();
		}
		Self { ptr: self.ptr, block: self.block }
	}
}

impl<T: ?Sized> Drop for Weak<T> {
	fn drop(&mut self) {
		if let Some(block) = self.block.take() {
			unsafe { block::release_weak(block) };
		}
		self.ptr = None;
	}
}

impl<T: ?Sized> Default for Weak<T> {
	fn default() -> Self {
		Self::empty()
	}
}

//--------------------------------------------------------------------------------------------------
