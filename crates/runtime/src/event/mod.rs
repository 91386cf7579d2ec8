// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Reacton

//! Event signals and lifecycle events.
//!
//! [`Emitter`] is a synchronous multicast signal: emission happens inline on
//! the calling thread, in subscription order, with no queueing. The frame
//! uses one emitter per connector for event delivery and one per frame for
//! lifecycle events.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Failure;

pub mod queue;

struct Subscriber<T> {
	on_event: Arc<dyn Fn(&T) + Send + Sync>,
	on_done: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl<T> Clone for Subscriber<T> {
	fn clone(&self) -> Self {
		Self {
			on_event: Arc::clone(&self.on_event),
			on_done: self.on_done.clone(),
		}
	}
}

struct EmitterInner<T> {
	subscribers: Vec<Subscriber<T>>,
	closed: bool,
}

/// Synchronous multicast signal.
///
/// Subscribers are snapshotted under the lock and invoked after it is
/// released, so a callback may freely subscribe, open connectors or seal
/// while it runs. Panics from callbacks propagate to the emitting thread.
pub struct Emitter<T> {
	inner: Mutex<EmitterInner<T>>,
}

impl<T> Emitter<T> {
	pub fn new() -> Self {
		Self {
			inner: Mutex::new(EmitterInner {
				subscribers: Vec::new(),
				closed: false,
			}),
		}
	}

	/// Registers an event callback.
	pub fn subscribe<F>(&self, on_event: F)
	where
		F: Fn(&T) + Send + Sync + 'static,
	{
		self.register(Arc::new(on_event), None);
	}

	/// Registers an event callback plus a terminator callback.
	///
	/// The terminator fires once when the signal closes. Subscribing to an
	/// already closed signal fires it immediately.
	pub fn subscribe_with_done<F, D>(&self, on_event: F, on_done: D)
	where
		F: Fn(&T) + Send + Sync + 'static,
		D: Fn() + Send + Sync + 'static,
	{
		self.register(Arc::new(on_event), Some(Arc::new(on_done)));
	}

	fn register(&self, on_event: Arc<dyn Fn(&T) + Send + Sync>, on_done: Option<Arc<dyn Fn() + Send + Sync>>) {
		let fire_done = {
			let mut inner = self.inner.lock();
			if inner.closed {
				on_done.clone()
			} else {
				inner.subscribers.push(Subscriber {
					on_event,
					on_done,
				});
				None
			}
		};
		if let Some(done) = fire_done {
			done();
		}
	}

	/// Delivers an event to every subscriber, in subscription order.
	pub fn emit(&self, event: &T) {
		let subscribers = {
			let inner = self.inner.lock();
			if inner.closed {
				return;
			}
			inner.subscribers.clone()
		};
		for subscriber in &subscribers {
			(subscriber.on_event)(event);
		}
	}

	/// Closes the signal and fires every terminator callback once.
	pub fn close(&self) {
		let subscribers = {
			let mut inner = self.inner.lock();
			if inner.closed {
				return;
			}
			inner.closed = true;
			std::mem::take(&mut inner.subscribers)
		};
		for subscriber in &subscribers {
			if let Some(done) = &subscriber.on_done {
				done();
			}
		}
	}

	pub fn is_closed(&self) -> bool {
		self.inner.lock().closed
	}
}

impl<T> Default for Emitter<T> {
	fn default() -> Self {
		Self::new()
	}
}

/// Lifecycle events a frame emits about its own reactor.
///
/// Orderings: `ReactorStarted` precedes everything else; every batch emits
/// `ReactorScheduled` before deliveries and `ReactorPreempted` after;
/// `ReactorDied` is followed by `ReactorTerminated`; `ReactorTerminated`
/// is emitted exactly once and nothing follows it.
#[derive(Debug, Clone)]
pub enum SysEvent {
	ReactorStarted,
	ReactorScheduled,
	ReactorPreempted,
	ReactorDied(Failure),
	ReactorTerminated,
}

#[cfg(test)]
mod tests {
	use std::sync::{
		atomic::{AtomicUsize, Ordering},
		Arc, Mutex,
	};

	use super::Emitter;

	#[test]
	fn emits_in_subscription_order() {
		let emitter = Emitter::new();
		let seen = Arc::new(Mutex::new(Vec::new()));

		for tag in ["a", "b", "c"] {
			let seen = Arc::clone(&seen);
			emitter.subscribe(move |value: &i32| {
				seen.lock().unwrap().push((tag, *value));
			});
		}

		emitter.emit(&1);
		emitter.emit(&2);

		let seen = seen.lock().unwrap();
		assert_eq!(*seen, vec![("a", 1), ("b", 1), ("c", 1), ("a", 2), ("b", 2), ("c", 2)]);
	}

	#[test]
	fn close_fires_done_once_and_stops_emission() {
		let emitter = Emitter::new();
		let events = Arc::new(AtomicUsize::new(0));
		let dones = Arc::new(AtomicUsize::new(0));

		{
			let events = Arc::clone(&events);
			let dones = Arc::clone(&dones);
			emitter.subscribe_with_done(
				move |_: &i32| {
					events.fetch_add(1, Ordering::SeqCst);
				},
				move || {
					dones.fetch_add(1, Ordering::SeqCst);
				},
			);
		}

		emitter.emit(&1);
		emitter.close();
		emitter.close();
		emitter.emit(&2);

		assert_eq!(events.load(Ordering::SeqCst), 1);
		assert_eq!(dones.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn subscribing_after_close_fires_done_immediately() {
		let emitter = Emitter::<i32>::new();
		emitter.close();

		let dones = Arc::new(AtomicUsize::new(0));
		let counter = Arc::clone(&dones);
		emitter.subscribe_with_done(|_| {}, move || {
			counter.fetch_add(1, Ordering::SeqCst);
		});

		assert_eq!(dones.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn subscriber_may_subscribe_during_emission() {
		let emitter = Arc::new(Emitter::new());
		let late = Arc::new(AtomicUsize::new(0));

		{
			let emitter = Arc::clone(&emitter);
			let late = Arc::clone(&late);
			emitter.clone().subscribe(move |_: &i32| {
				let late = Arc::clone(&late);
				emitter.subscribe(move |_: &i32| {
					late.fetch_add(1, Ordering::SeqCst);
				});
			});
		}

		emitter.emit(&1);
		assert_eq!(late.load(Ordering::SeqCst), 0);
		emitter.emit(&2);
		assert_eq!(late.load(Ordering::SeqCst), 1);
	}
}
