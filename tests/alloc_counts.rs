//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

//! Allocation accounting for the two construction paths. Lives in its own
//! test binary because the counting allocator has to own the whole process,
//! and a single `#[test]` keeps the counters deterministic.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicUsize, Ordering};

use dualrc::{SelfReferential, Shared, WeakSelf};

struct CountingAlloc;

static ALLOCS: AtomicUsize = AtomicUsize::new(0);
static FREES: AtomicUsize = AtomicUsize::new(0);

unsafe impl GlobalAlloc for CountingAlloc {
	unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
		ALLOCS.fetch_add(1, Ordering::SeqCst);
		unsafe { System.alloc(layout) }
	}

	unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
		FREES.fetch_add(1, Ordering::SeqCst);
		unsafe { System.dealloc(ptr, layout) }
	}
}

#[global_allocator]
static ALLOCATOR: CountingAlloc = CountingAlloc;

fn counted<R>(f: impl FnOnce() -> R) -> (usize, usize, R) {
	let allocs = ALLOCS.load(Ordering::SeqCst);
	let frees = FREES.load(Ordering::SeqCst);
	let result = f();
	(
		ALLOCS.load(Ordering::SeqCst) - allocs,
		FREES.load(Ordering::SeqCst) - frees,
		result,
	)
}

#[test]
fn construction_paths_and_block_lifetime() {
	// Inline path: payload and counters share one allocation.
	let (allocs, _, shared) = counted(|| Shared::new(7_u64));
	assert_eq!(allocs, 1);

	// A weak handle pins that one allocation past the payload's death.
	let weak = shared.downgrade();
	let (_, frees, ()) = counted(|| drop(shared));
	assert_eq!(frees, 0);
	assert!(weak.expired());
	let (_, frees, ()) = counted(|| drop(weak));
	assert_eq!(frees, 1);

	// Boxed path: payload allocation plus a separate metadata block.
	let (allocs, _, shared) = counted(|| Shared::from_box(Box::new(7_u64)));
	assert_eq!(allocs, 2);

	// Here the payload box is freed as soon as the strong count hits zero;
	// only the block waits for the weak handle.
	let weak = shared.downgrade();
	let (_, frees, ()) = counted(|| drop(shared));
	assert_eq!(frees, 1);
	let (_, frees, ()) = counted(|| drop(weak));
	assert_eq!(frees, 1);

	// No weak handles at all: one drop releases everything, exactly once.
	let (allocs, _, shared) = counted(|| Shared::from_box(Box::new([0_u8; 32])));
	assert_eq!(allocs, 2);
	let (_, frees, ()) = counted(|| drop(shared));
	assert_eq!(frees, 2);

	// A self-referential payload whose slot owns the only weak handle: the
	// slot's weak unit dies mid-destruction, and the single allocation still
	// comes back exactly once.
	struct Node {
		weak_self: WeakSelf<Node>,
		_payload: u64,
	}

	impl SelfReferential for Node {
		fn weak_self(&self) -> &WeakSelf<Node> {
			&self.weak_self
		}
	}

	let (allocs, _, node) =
		counted(|| Shared::new_with_self(Node { weak_self: WeakSelf::new(), _payload: 9 }));
	assert_eq!(allocs, 1);
	let (allocs, frees, ()) = counted(|| drop(node));
	assert_eq!(allocs, 0);
	assert_eq!(frees, 1);
}
