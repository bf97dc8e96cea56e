//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

//! Reference-counted ownership handles.
//!
//! [`Shared<T>`] is a strong, multi-owner handle; [`Weak<T>`] observes a
//! payload without keeping it alive and can be promoted back while the
//! payload exists. Both sit on one control block per original allocation,
//! tracking the strong and weak counts independently. Payloads can opt into
//! [`SelfReferential`] to hand out handles to themselves, and [`Unique<T>`]
//! is the single-owner counterpart with a pluggable destruction policy.
//!
//! Counters are plain `Cell`s; the handles are `!Send`/`!Sync`. Strong
//! cycles leak, the same as with any reference-counting scheme without a
//! cycle collector. Break them with [`Weak`].

// clippy
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::module_name_repetitions)]

mod block;

pub mod self_ref;
pub mod shared;
pub mod unique;
pub mod weak;

pub use self_ref::{SelfReferential, WeakSelf};
pub use shared::Shared;
pub use unique::{BoxDestroy, DestroyPolicy, Unique};
pub use weak::Weak;

//--------------------------------------------------------------------------------------------------

/// The payload behind a weak handle no longer exists, so it cannot be
/// promoted to a strong handle.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct DanglingWeak;

impl std::error::Error for DanglingWeak {}

impl std::fmt::Display for DanglingWeak {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "Cannot promote a dangling weak handle")
	}
}

//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn dangling_weak_formats_like_an_error() {
		let err: Box<dyn std::error::Error> = Box::new(DanglingWeak);
		assert_eq!(err.to_string(), "Cannot promote a dangling weak handle");
	}
}
