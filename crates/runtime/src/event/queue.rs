// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Reacton

//! Event queues.
//!
//! Queues are multi-producer, single-consumer, and report exact sizes from
//! both ends: `enqueue` returns the new size so a sender can detect the
//! empty-to-non-empty transition, `dequeue` returns the remaining count so
//! the drain loop can decide whether to keep a connector hot.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::frame::ring::UnrolledRing;

/// A concurrent FIFO of events with exact size accounting.
pub trait EventQueue<T: Send>: Send + Sync {
	/// Appends an event and returns the new size, or 0 when the queue no
	/// longer accepts events.
	fn enqueue(&self, event: T) -> usize;

	/// Removes the oldest event, returning it together with the number of
	/// events remaining.
	fn dequeue(&self) -> (Option<T>, usize);

	fn size(&self) -> usize;

	/// Marks end-of-stream. Later enqueues are rejected; already queued
	/// events stay readable.
	fn unreact(&self);

	fn is_live(&self) -> bool;
}

/// Recipe for the queue backing a new connector.
pub type QueueFactory<T> = Arc<dyn Fn() -> Arc<dyn EventQueue<T>> + Send + Sync>;

/// Factory for the default unbounded queue.
pub fn unbounded<T: Send + 'static>() -> QueueFactory<T> {
	Arc::new(|| Arc::new(UnboundedQueue::new()))
}

struct QueueInner<T> {
	ring: UnrolledRing<T>,
	live: bool,
}

/// Unbounded MPSC queue over an unrolled ring.
///
/// A lock scope around the ring is what makes the reported sizes exact:
/// exactly one producer ever observes size 1 per empty-to-non-empty
/// transition.
pub struct UnboundedQueue<T> {
	inner: Mutex<QueueInner<T>>,
}

impl<T: Send> UnboundedQueue<T> {
	pub fn new() -> Self {
		Self {
			inner: Mutex::new(QueueInner {
				ring: UnrolledRing::new(),
				live: true,
			}),
		}
	}
}

impl<T: Send> Default for UnboundedQueue<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T: Send> EventQueue<T> for UnboundedQueue<T> {
	fn enqueue(&self, event: T) -> usize {
		let mut inner = self.inner.lock();
		if !inner.live {
			return 0;
		}
		inner.ring.enqueue(event);
		inner.ring.len()
	}

	fn dequeue(&self) -> (Option<T>, usize) {
		let mut inner = self.inner.lock();
		let event = inner.ring.dequeue();
		(event, inner.ring.len())
	}

	fn size(&self) -> usize {
		self.inner.lock().ring.len()
	}

	fn unreact(&self) {
		self.inner.lock().live = false;
	}

	fn is_live(&self) -> bool {
		self.inner.lock().live
	}
}

#[cfg(test)]
mod tests {
	use std::{sync::Arc, thread};

	use super::{EventQueue, UnboundedQueue};

	#[test]
	fn sizes_are_exact_from_both_ends() {
		let queue = UnboundedQueue::new();
		assert_eq!(queue.enqueue(10), 1);
		assert_eq!(queue.enqueue(20), 2);
		assert_eq!(queue.dequeue(), (Some(10), 1));
		assert_eq!(queue.dequeue(), (Some(20), 0));
		assert_eq!(queue.dequeue(), (None, 0));
	}

	#[test]
	fn unreact_rejects_later_enqueues() {
		let queue = UnboundedQueue::new();
		assert_eq!(queue.enqueue(1), 1);
		queue.unreact();
		assert!(!queue.is_live());
		assert_eq!(queue.enqueue(2), 0);
		// Queued events stay readable.
		assert_eq!(queue.dequeue(), (Some(1), 0));
	}

	#[test]
	fn exactly_one_producer_observes_the_empty_transition() {
		let queue = Arc::new(UnboundedQueue::new());
		let producers = 8;
		let per_producer = 1000;

		let handles: Vec<_> = (0..producers)
			.map(|p| {
				let queue = Arc::clone(&queue);
				thread::spawn(move || {
					let mut transitions = 0;
					for i in 0..per_producer {
						if queue.enqueue(p * per_producer + i) == 1 {
							transitions += 1;
						}
					}
					transitions
				})
			})
			.collect();

		let transitions: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
		// Nothing dequeues, so the queue went empty-to-non-empty exactly once.
		assert_eq!(transitions, 1);
		assert_eq!(queue.size(), producers * per_producer);
	}
}
