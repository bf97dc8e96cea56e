//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use std::ops::Deref;
use std::ptr::NonNull;

//--------------------------------------------------------------------------------------------------

/// Destruction policy for [`Unique`].
pub trait DestroyPolicy<T: ?Sized> {
	/// # Safety
	/// `ptr` must be the pointer the owning handle adopted, and it must not
	/// be used after this call.
	unsafe fn destroy(&mut self, ptr: NonNull<T>);
}

/// The default policy: the payload came from a `Box` and goes back into one
/// to be freed.
#[derive(Debug, Default, Copy, Clone)]
pub struct BoxDestroy;

impl<T: ?Sized> DestroyPolicy<T> for BoxDestroy {
	unsafe fn destroy(&mut self, ptr: NonNull<T>) {
		drop(unsafe { Box::from_raw(ptr.as_ptr()) });
	}
}

//--------------------------------------------------------------------------------------------------

/// Exclusive-ownership handle with a pluggable destruction policy.
///
/// Move-only (no `Clone`); does not participate in the reference-counting
/// machinery at all. A zero-sized policy adds no storage, so `Unique<T>` is
/// the size of a pointer.
pub struct Unique<T: ?Sized, D: DestroyPolicy<T> = BoxDestroy> {
	ptr: Option<NonNull<T>>,
	policy: D,
}

impl<T: ?Sized> Unique<T, BoxDestroy> {
	pub fn new(value: Box<T>) -> Self {
		Self { ptr: Some(NonNull::from(Box::leak(value))), policy: BoxDestroy }
	}

	/// Destroys the current payload and adopts a freshly boxed one.
	pub fn reset_box(&mut self, value: Box<T>) {
		self.reset();
		self.ptr = Some(NonNull::from(Box::leak(value)));
	}

	/// Gives up ownership, handing the payload back as a `Box`.
	pub fn into_box(mut self) -> Option<Box<T>> {
		self.release().map(|ptr| unsafe { Box::from_raw(ptr.as_ptr()) })
	}
}

impl<T: ?Sized, D: DestroyPolicy<T> + Default> Unique<T, D> {
	pub fn empty() -> Self {
		Self { ptr: None, policy: D::default() }
	}
}

impl<T: ?Sized, D: DestroyPolicy<T>> Unique<T, D> {
	/// # Safety
	/// `ptr` must stay valid until `policy.destroy` consumes it, and running
	/// `policy` on it must be the correct way to free it.
	pub unsafe fn from_raw(ptr: NonNull<T>, policy: D) -> Self {
		Self { ptr: Some(ptr), policy }
	}

	/// Gives up ownership without destroying the payload.
	pub fn release(&mut self) -> Option<NonNull<T>> {
		self.ptr.take()
	}

	/// Destroys the current payload, leaving the handle empty.
	pub fn reset(&mut self) {
		if let Some(ptr) = self.ptr.take() {
			unsafe { self.policy.destroy(ptr) };
		}
	}

	/// O(1) exchange of payload and policy with another handle.
	pub fn swap(&mut self, other: &mut Self) {
		std::mem::swap(self, other);
	}

	pub fn get(&self) -> Option<&T> {
		self.ptr.map(|ptr| unsafe { ptr.as_ref() })
	}

	pub fn policy(&self) -> &D {
		&self.policy
	}

	pub fn policy_mut(&mut self) -> &mut D {
		&mut self.policy
	}

	pub fn is_empty(&self) -> bool {
		self.ptr.is_none()
	}
}

impl<T: ?Sized, D: DestroyPolicy<T>> Drop for Unique<T, D> {
	fn drop(&mut self) {
		self.reset();
	}
}

impl<T: ?Sized, D: DestroyPolicy<T>> Deref for Unique<T, D> {
	type Target = T;

	fn deref(&self) -> &T {
		match self.ptr {
			Some(ptr) => unsafe { ptr.as_ref() },
			None => panic!("dereferenced an empty unique handle"),
		}
	}
}

//--------------------------------------------------------------------------------------------------
