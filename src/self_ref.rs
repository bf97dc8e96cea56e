//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use std::cell::Cell;

use crate::shared::Shared;
use crate::weak::Weak;

//--------------------------------------------------------------------------------------------------

/// Weak back-reference slot embedded by types that opt into
/// [`SelfReferential`].
///
/// Starts out empty and inert; [`Shared::new_with_self`] and
/// [`Shared::from_box_with_self`] fill it right after building the first
/// handle. The slot only ever holds a weak unit. A strong unit here would
/// make the object immortal.
pub struct WeakSelf<T: ?Sized> {
	slot: Cell<Weak<T>>,
}

impl<T: ?Sized> WeakSelf<T> {
	pub const fn new() -> Self {
		Self { slot: Cell::new(Weak::empty()) }
	}

	pub(crate) fn install(&self, weak: Weak<T>) {
		self.slot.set(weak);
	}

	pub(crate) fn get(&self) -> Weak<T> {
		let weak = self.slot.take();
		let copy = weak.clone();
		self.slot.set(weak);
		copy
	}
}

impl<T: ?Sized> Default for WeakSelf<T> {
	fn default() -> Self {
		Self::new()
	}
}

//--------------------------------------------------------------------------------------------------

/// Opt-in capability for objects that hand out handles to themselves.
///
/// A type embeds a [`WeakSelf<Self>`] field and exposes it through
/// [`weak_self`](SelfReferential::weak_self); constructing it via
/// [`Shared::new_with_self`] or [`Shared::from_box_with_self`] installs the
/// back-reference, after which methods of the object can produce shared or
/// weak handles to itself.
pub trait SelfReferential {
	fn weak_self(&self) -> &WeakSelf<Self>;

	/// Shared handle to this object.
	///
	/// Panics when there is no outstanding strong owner: either the object
	/// was not constructed through one of the installing constructors, or
	/// the call happens during destruction. Both are misuse of the
	/// capability, not recoverable conditions.
	fn shared_from_self(&self) -> Shared<Self>
	where
		Self: Sized,
	{
		match self.weak_self().get().upgrade() {
			Some(shared) => shared,
			None => panic!("shared_from_self called with no outstanding strong owner"),
		}
	}

	/// Weak handle to this object. A plain copy of the slot; expired if the
	/// slot was never installed.
	fn weak_from_self(&self) -> Weak<Self>
	where
		Self: Sized,
	{
		self.weak_self().get()
	}
}

//--------------------------------------------------------------------------------------------------

impl<T: SelfReferential + 'static> Shared<T> {
	/// [`Shared::new`] plus installation of the self slot.
	pub fn new_with_self(value: T) -> Self {
		let this = Self::new(value);
		this.weak_self().install(this.downgrade());
		this
	}

	/// [`Shared::from_box`] plus installation of the self slot.
	pub fn from_box_with_self(value: Box<T>) -> Self {
		let this = Self::from_box(value);
		this.weak_self().install(this.downgrade());
		this
	}
}

//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use super::*;

	struct Node {
		value: u32,
		weak_self: WeakSelf<Node>,
	}

	impl Node {
		fn new(value: u32) -> Self {
			Self { value, weak_self: WeakSelf::new() }
		}
	}

	impl SelfReferential for Node {
		fn weak_self(&self) -> &WeakSelf<Node> {
			&self.weak_self
		}
	}

	#[test]
	fn shared_from_self_round_trip() {
		let node = Shared::new_with_self(Node::new(7));
		assert_eq!(node.use_count(), 1);

		let again = node.shared_from_self();
		assert!(again.ptr_eq(&node));
		assert_eq!(again.value, 7);
		// One original owner plus the handle we just produced; the slot
		// itself contributes nothing to the strong count.
		assert_eq!(node.use_count(), 2);
	}

	#[test]
	fn boxed_construction_installs_the_slot_too() {
		let node = Shared::from_box_with_self(Box::new(Node::new(3)));
		let again = node.shared_from_self();
		assert!(again.ptr_eq(&node));
		assert_eq!(node.use_count(), 2);
	}

	#[test]
	fn weak_from_self_observes_without_owning() {
		let node = Shared::new_with_self(Node::new(1));
		let weak = node.weak_from_self();

		assert!(!weak.expired());
		assert_eq!(node.use_count(), 1);

		drop(node);
		assert!(weak.expired());
	}

	#[test]
	fn slot_does_not_leak_the_object() {
		// The back-reference is weak, so the last outside owner going away
		// destroys the object.
		struct Flagged {
			weak_self: WeakSelf<Flagged>,
			drops: std::rc::Rc<std::cell::Cell<usize>>,
		}

		impl SelfReferential for Flagged {
			fn weak_self(&self) -> &WeakSelf<Flagged> {
				&self.weak_self
			}
		}

		impl Drop for Flagged {
			fn drop(&mut self) {
				self.drops.set(self.drops.get() + 1);
			}
		}

		let drops = std::rc::Rc::new(std::cell::Cell::new(0));
		let node = Shared::new_with_self(Flagged {
			weak_self: WeakSelf::new(),
			drops: drops.clone(),
		});
		drop(node);
		assert_eq!(drops.get(), 1);
	}

	#[test]
	fn destruction_tolerates_the_slot_owning_the_last_weak() {
		// With no outside weak handles, the slot's own weak unit is dropped
		// in the middle of the payload's destruction. Fields declared after
		// the slot must still be usable at that point, and the block must be
		// freed exactly once, by whoever finds both counts at zero last.
		struct SelfHolding {
			weak_self: WeakSelf<SelfHolding>,
			drops: std::rc::Rc<std::cell::Cell<usize>>,
		}

		impl SelfReferential for SelfHolding {
			fn weak_self(&self) -> &WeakSelf<SelfHolding> {
				&self.weak_self
			}
		}

		impl Drop for SelfHolding {
			fn drop(&mut self) {
				self.drops.set(self.drops.get() + 1);
			}
		}

		let drops = std::rc::Rc::new(std::cell::Cell::new(0));
		let node = Shared::new_with_self(SelfHolding {
			weak_self: WeakSelf::new(),
			drops: drops.clone(),
		});
		drop(node);
		assert_eq!(drops.get(), 1);

		// Same ordering on the boxed construction path.
		let node = Shared::from_box_with_self(Box::new(SelfHolding {
			weak_self: WeakSelf::new(),
			drops: drops.clone(),
		}));
		drop(node);
		assert_eq!(drops.get(), 2);
	}

	#[test]
	#[should_panic(expected = "no outstanding strong owner")]
	fn uninstalled_slot_is_a_contract_violation() {
		// Built through the plain constructor, so the slot stays empty.
		let node = Shared::new(Node::new(0));
		let _ = node.shared_from_self();
	}

	#[test]
	fn uninstalled_weak_from_self_is_just_expired() {
		let node = Node::new(0);
		assert!(node.weak_from_self().expired());
	}
}
