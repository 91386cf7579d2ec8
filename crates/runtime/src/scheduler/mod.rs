// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Reacton

//! Scheduler interface.
//!
//! A scheduler owns threads and batch budgets; frames only ask it to queue
//! them ([`Scheduler::schedule`]) and consult its per-frame
//! [`SchedulerState`] to learn when a batch must yield.

use std::sync::{
	atomic::{AtomicI64, Ordering},
	Arc,
};

use crate::{error::Failure, frame::Frame, system::ReactorSystem};

pub mod pool;

/// Policy plugin that owns worker threads and batch budgets.
pub trait Scheduler: Send + Sync + 'static {
	/// Queues a frame for a batch. Called with no frame monitor held.
	fn schedule(&self, frame: Arc<Frame>);

	/// Thread-local setup hook, called before a batch acquires the frame.
	fn preschedule(&self, system: &ReactorSystem) {
		let _ = system;
	}

	/// Called once the batch released the frame, with the failure if the
	/// reactor died.
	fn unschedule(&self, system: &ReactorSystem, failure: Option<&Failure>) {
		let _ = (system, failure);
	}

	/// Creates the opaque per-frame batch state.
	fn new_state(&self, frame: &Frame) -> Box<dyn SchedulerState>;
}

/// Per-frame record owned by the scheduler, consulted during batches.
pub trait SchedulerState: Send + Sync {
	/// Called when a batch begins draining.
	fn on_batch_start(&self, frame: &Frame) {
		let _ = frame;
	}

	/// Called after every delivered event. Returns whether the batch may
	/// continue; `false` preempts the frame.
	fn on_batch_event(&self, frame: &Frame) -> bool;
}

/// Countdown state granting a fixed number of events per batch.
pub struct EventBudget {
	limit: i64,
	remaining: AtomicI64,
}

impl EventBudget {
	pub fn new(limit: u32) -> Self {
		Self {
			limit: i64::from(limit.max(1)),
			remaining: AtomicI64::new(0),
		}
	}
}

impl SchedulerState for EventBudget {
	fn on_batch_start(&self, _frame: &Frame) {
		self.remaining.store(self.limit, Ordering::Release);
	}

	fn on_batch_event(&self, _frame: &Frame) -> bool {
		self.remaining.fetch_sub(1, Ordering::AcqRel) > 1
	}
}
