// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Reacton

//! Monitor synchronization primitive.
//!
//! A monitor couples one mutex with one condition variable. The frame keeps
//! every mutable scheduling field behind a single monitor, so lock ordering
//! across those fields never arises.

use std::time::Duration;

use parking_lot::{Condvar, Mutex, MutexGuard};

/// A mutex and condition variable guarding a single state record.
pub struct Monitor<T> {
	state: Mutex<T>,
	signal: Condvar,
}

impl<T> Monitor<T> {
	/// Creates a monitor around the given state.
	#[inline]
	pub fn new(state: T) -> Self {
		Self {
			state: Mutex::new(state),
			signal: Condvar::new(),
		}
	}

	/// Acquires the lock, blocking until it is available.
	#[inline]
	pub fn lock(&self) -> MutexGuard<'_, T> {
		self.state.lock()
	}

	/// Blocks while `condition` holds, or until the timeout expires.
	///
	/// Returns `true` if the condition was cleared before the timeout.
	#[inline]
	pub fn wait_while_for<F>(&self, guard: &mut MutexGuard<'_, T>, condition: F, timeout: Duration) -> bool
	where
		F: FnMut(&mut T) -> bool,
	{
		!self.signal.wait_while_for(guard, condition, timeout).timed_out()
	}

	/// Wakes up all threads blocked on this monitor.
	#[inline]
	pub fn notify_all(&self) {
		self.signal.notify_all();
	}
}
