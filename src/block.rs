//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use std::cell::{Cell, UnsafeCell};
use std::mem::MaybeUninit;
use std::ptr::NonNull;

//--------------------------------------------------------------------------------------------------

/// The strong and weak counters of one control block.
///
/// Both counters start at zero. The first owning handle performs the initial
/// increment.
pub(crate) struct RefCounts {
	strong: Cell<usize>,
	weak: Cell<usize>,
}

impl RefCounts {
	pub fn new() -> Self {
		Self { strong: Cell::new(0), weak: Cell::new(0) }
	}

	pub fn strong(&self) -> usize {
		self.strong.get()
	}

	pub fn weak(&self) -> usize {
		self.weak.get()
	}

	pub fn inc_strong(&self) {
		self.strong.set(self.strong.get() + 1);
	}

	/// Returns the count after the decrement.
	pub fn dec_strong(&self) -> usize {
		let count = self.strong.get();
		debug_assert!(count > 0, "strong counter underflow");
		let count = count - 1;
		self.strong.set(count);
		count
	}

	pub fn inc_weak(&self) {
		self.weak.set(self.weak.get() + 1);
	}

	/// Returns the count after the decrement.
	pub fn dec_weak(&self) -> usize {
		let count = self.weak.get();
		debug_assert!(count > 0, "weak counter underflow");
		let count = count - 1;
		self.weak.set(count);
		count
	}
}

//--------------------------------------------------------------------------------------------------

/// One control block exists per original allocation. The two implementations
/// differ only in where the payload lives and how it is destroyed.
///
/// Decrements go through [`release_strong`] and [`release_weak`], which also
/// free the block once nothing references it; the block itself never frees
/// anything but the payload.
pub(crate) trait ControlBlock {
	fn counts(&self) -> &RefCounts;

	/// # Safety
	/// Can only be called on the strong 1 -> 0 transition. `release_strong`
	/// is the only caller.
	unsafe fn destroy_payload(&self);

	fn strong_count(&self) -> usize {
		self.counts().strong()
	}

	fn weak_count(&self) -> usize {
		self.counts().weak()
	}

	fn inc_strong(&self) {
		self.counts().inc_strong();
	}

	fn inc_weak(&self) {
		self.counts().inc_weak();
	}
}

//--------------------------------------------------------------------------------------------------

/// Releases one strong unit, destroying the payload on the 1 -> 0 transition.
///
/// Strong owners share one weak unit on the block, taken when the block is
/// allocated. It is given back only after the payload is fully destroyed, so
/// a payload that drops weak handles to its own block while being destroyed
/// (a self slot is the common case) cannot free the block mid-destruction.
///
/// # Safety
/// The caller gives up its strong unit and must not use `block` afterwards.
pub(crate) unsafe fn release_strong(block: NonNull<dyn ControlBlock>) {
	let handle = unsafe { block.as_ref() };
	if handle.counts().dec_strong() == 0 {
		unsafe { handle.destroy_payload() };
		// The strong owners' shared weak unit; the block is still alive here
		// no matter what the payload's destructor released.
		handle.counts().dec_weak();
	}
	unsafe { release_if_unreferenced(block) };
}

/// Releases one weak unit.
///
/// # Safety
/// The caller gives up its weak unit and must not use `block` afterwards.
pub(crate) unsafe fn release_weak(block: NonNull<dyn ControlBlock>) {
	unsafe { block.as_ref() }.counts().dec_weak();
	unsafe { release_if_unreferenced(block) };
}

/// Frees `block` once neither counter references it any more.
unsafe fn release_if_unreferenced(block: NonNull<dyn ControlBlock>) {
	let counts = unsafe { block.as_ref() }.counts();
	if counts.strong() == 0 && counts.weak() == 0 {
		drop(unsafe { Box::from_raw(block.as_ptr()) });
	}
}

/// Allocates a control block for a separately boxed payload.
pub(crate) fn new_ptr_block<Y: ?Sized + 'static>(payload: NonNull<Y>) -> NonNull<dyn ControlBlock> {
	let block = PtrBlock::new(payload);
	// The strong owners' shared weak unit. See release_strong.
	block.counts.inc_weak();
	let raw = Box::into_raw(Box::new(block));
	// into_raw never returns null
	unsafe { NonNull::new_unchecked(raw as *mut dyn ControlBlock) }
}

/// Allocates a control block that holds the payload in-line. Returns the
/// block together with the pointer to the payload inside it.
pub(crate) fn new_inline_block<Y: 'static>(value: Y) -> (NonNull<dyn ControlBlock>, NonNull<Y>) {
	let block = InlineBlock::new(value);
	// The strong owners' shared weak unit. See release_strong.
	block.counts.inc_weak();
	let raw = Box::into_raw(Box::new(block));
	let payload = unsafe { (*raw).payload_ptr() };
	let block = unsafe { NonNull::new_unchecked(raw as *mut dyn ControlBlock) };
	(block, payload)
}

//--------------------------------------------------------------------------------------------------

/// Control block for a payload that was allocated on its own.
pub(crate) struct PtrBlock<Y: ?Sized> {
	counts: RefCounts,
	payload: Cell<Option<NonNull<Y>>>,
}

impl<Y: ?Sized> PtrBlock<Y> {
	pub fn new(payload: NonNull<Y>) -> Self {
		Self { counts: RefCounts::new(), payload: Cell::new(Some(payload)) }
	}
}

impl<Y: ?Sized> ControlBlock for PtrBlock<Y> {
	fn counts(&self) -> &RefCounts {
		&self.counts
	}

	unsafe fn destroy_payload(&self) {
		// Taking the pointer out makes a second destruction impossible.
		if let Some(payload) = self.payload.take() {
			drop(unsafe { Box::from_raw(payload.as_ptr()) });
		}
	}
}

impl<Y: ?Sized> Drop for PtrBlock<Y> {
	fn drop(&mut self) {
		// The payload goes away when the strong count hits zero, before the
		// block itself can be freed. A pointer still being here means the
		// release protocol was not followed.
		if let Some(payload) = self.payload.take() {
			log::warn!("control block dropped with the payload still alive");
			drop(unsafe { Box::from_raw(payload.as_ptr()) });
		}
	}
}

//--------------------------------------------------------------------------------------------------

/// Control block that co-locates the payload with the counters, so a single
/// allocation serves both.
///
/// The payload's raw storage stays allocated until the weak count also
/// reaches zero; its resources are released on the strong 1 -> 0 transition.
pub(crate) struct InlineBlock<Y> {
	counts: RefCounts,
	live: Cell<bool>,
	payload: UnsafeCell<MaybeUninit<Y>>,
}

impl<Y> InlineBlock<Y> {
	pub fn new(value: Y) -> Self {
		Self {
			counts: RefCounts::new(),
			live: Cell::new(true),
			payload: UnsafeCell::new(MaybeUninit::new(value)),
		}
	}

	pub fn payload_ptr(&self) -> NonNull<Y> {
		// UnsafeCell::get never returns null
		unsafe { NonNull::new_unchecked(self.payload.get().cast::<Y>()) }
	}
}

impl<Y> ControlBlock for InlineBlock<Y> {
	fn counts(&self) -> &RefCounts {
		&self.counts
	}

	unsafe fn destroy_payload(&self) {
		if self.live.replace(false) {
			unsafe { self.payload_ptr().as_ptr().drop_in_place() };
		}
	}
}

impl<Y> Drop for InlineBlock<Y> {
	fn drop(&mut self) {
		if self.live.replace(false) {
			log::warn!("control block dropped with the payload still alive");
			unsafe { self.payload_ptr().as_ptr().drop_in_place() };
		}
	}
}

//--------------------------------------------------------------------------------------------------
