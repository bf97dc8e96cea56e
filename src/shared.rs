//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use std::ops::Deref;
use std::ptr::NonNull;

use crate::DanglingWeak;
use crate::block::{self, ControlBlock};
use crate::weak::Weak;

//--------------------------------------------------------------------------------------------------

/// Strong reference-counted handle.
///
/// Every live `Shared` holds one strong unit on its control block; the
/// payload is destroyed when the last strong unit is given up, even if
/// [`Weak`] handles still observe the block. A handle can also be empty,
/// holding neither a payload nor a block.
///
/// The observed pointer and the block are decoupled: [`Shared::project`]
/// builds handles that present a sub-object (or a supertype view) of the
/// payload while the original block keeps governing liveness.
pub struct Shared<T: ?Sized> {
	pub(crate) ptr: Option<NonNull<T>>,
	pub(crate) block: Option<NonNull<dyn ControlBlock>>,
}

impl<T: 'static> Shared<T> {
	/// Creates a handle over `value`, placing the payload and the counters in
	/// a single allocation.
	pub fn new(value: T) -> Self {
		let (block, ptr) = block::new_inline_block(value);
		unsafe { block.as_ref() }.inc_strong();
		Self { ptr: Some(ptr), block: Some(block) }
	}

	/// Raw pointer to the payload, null when empty.
	pub fn as_ptr(&self) -> *const T {
		self.ptr.map_or(std::ptr::null(), |ptr| ptr.as_ptr().cast_const())
	}
}

impl<T: ?Sized + 'static> Shared<T> {
	/// Adopts an already-boxed payload. The counters live in a second
	/// allocation.
	///
	/// Unsized payloads are accepted, so `Shared::<dyn Trait>::from_box`
	/// can adopt any boxed implementor.
	pub fn from_box(value: Box<T>) -> Self {
		let ptr = NonNull::from(Box::leak(value));
		let block = block::new_ptr_block(ptr);
		unsafe { block.as_ref() }.inc_strong();
		Self { ptr: Some(ptr), block: Some(block) }
	}

	/// Releases current ownership and adopts a freshly boxed payload.
	pub fn reset_box(&mut self, value: Box<T>) {
		*self = Self::from_box(value);
	}
}

impl<T: ?Sized> Shared<T> {
	/// A handle that observes nothing and owns nothing.
	pub const fn empty() -> Self {
		Self { ptr: None, block: None }
	}

	/// Promotes a weak handle, failing if the payload is already gone.
	///
	/// `weak` is left untouched either way. Use [`Weak::upgrade`] instead
	/// when expiration is an expected outcome rather than an error.
	pub fn from_weak(weak: &Weak<T>) -> Result<Self, DanglingWeak> {
		let (Some(ptr), Some(block)) = (weak.ptr, weak.block) else {
			return Err(DanglingWeak);
		};
		let handle = unsafe { block.as_ref() };
		if handle.strong_count() == 0 {
			return Err(DanglingWeak);
		}
		handle.inc_strong();
		Ok(Self { ptr: Some(ptr), block: Some(block) })
	}

	/// Creates a weak handle observing the same payload.
	pub fn downgrade(&self) -> Weak<T> {
		if let Some(block) = self.block {
			unsafe { block.as_ref() }.inc_weak();
			Weak { ptr: self.ptr, block: Some(block) }
		} else {
			Weak::empty()
		}
	}

	/// Aliasing handle: observes whatever `f` projects out of the payload,
	/// while this handle's block keeps governing liveness for both.
	///
	/// The projection must borrow from the payload (or be `'static`), which
	/// also makes this the covariant conversion:
	/// `shared.project(|t| t as &dyn Trait)`.
	///
	/// Panics if the handle is empty.
	pub fn project<U: ?Sized, F>(&self, f: F) -> Shared<U>
	where
		F: for<'a> FnOnce(&'a T) -> &'a U,
	{
		let (Some(ptr), Some(block)) = (self.ptr, self.block) else {
			panic!("cannot project an empty shared handle");
		};
		let target = NonNull::from(f(unsafe { ptr.as_ref() }));
		unsafe { block.as_ref() }.inc_strong();
		Shared { ptr: Some(target), block: Some(block) }
	}

	/// Releases ownership, leaving the handle empty.
	pub fn reset(&mut self) {
		*self = Self::empty();
	}

	/// O(1) exchange of the two handles' state, no counter traffic.
	pub fn swap(&mut self, other: &mut Self) {
		std::mem::swap(self, other);
	}

	pub fn get(&self) -> Option<&T> {
		self.ptr.map(|ptr| unsafe { ptr.as_ref() })
	}

	/// Current strong count, 0 for an empty handle.
	pub fn use_count(&self) -> usize {
		match self.block {
			Some(block) => unsafe { block.as_ref() }.strong_count(),
			None => 0,
		}
	}

	pub fn is_empty(&self) -> bool {
		self.block.is_none()
	}

	/// True if both handles observe the same payload address.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		self.ptr == other.ptr
	}
}

impl<T: ?Sized> Clone for Shared<T> {
	fn clone(&self) -> Self {
		if let Some(block) = self.block {
			unsafe { block.as_ref() }.inc_strong();
		}
		Self { ptr: self.ptr, block: self.block }
	}
}

impl<T: ?Sized> Drop for Shared<T> {
	fn drop(&mut self) {
		if let Some(block) = self.block.take() {
			unsafe { block::release_strong(block) };
		}
		self.ptr = None;
	}
}

impl<T: ?Sized> Default for Shared<T> {
	fn default() -> Self {
		Self::empty()
	}
}

impl<T: ?Sized> Deref for Shared<T> {
	type Target = T;

	fn deref(&self) -> &T {
		match self.ptr {
			Some(ptr) => unsafe { ptr.as_ref() },
			None => panic!("dereferenced an empty shared handle"),
		}
	}
}

//--------------------------------------------------------------------------------------------------
