// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Reacton

//! Deterministic test support.
//!
//! The [`ManualScheduler`] never spawns threads: scheduled frames queue up
//! until the caller drains them, so batch boundaries and interleavings are
//! fully under test control.

use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::{
	frame::Frame,
	scheduler::{EventBudget, Scheduler, SchedulerState},
};

/// Scheduler whose run queue is drained explicitly by the calling thread.
pub struct ManualScheduler {
	tx: Sender<Arc<Frame>>,
	rx: Receiver<Arc<Frame>>,
	batch_budget: u32,
}

impl ManualScheduler {
	pub fn new(batch_budget: u32) -> Arc<Self> {
		let (tx, rx) = unbounded();
		Arc::new(Self {
			tx,
			rx,
			batch_budget,
		})
	}

	/// Executes one queued batch, if any. Returns whether a batch ran.
	///
	/// A batch that kills its reactor is not an error here: the death is
	/// observable through the reactor's lifecycle events.
	pub fn run_one(&self) -> bool {
		match self.rx.try_recv() {
			Ok(frame) => {
				let _ = frame.execute_batch();
				true
			}
			Err(_) => false,
		}
	}

	/// Executes queued batches until no frame is scheduled. Returns the
	/// number of batches run.
	pub fn run_until_idle(&self) -> usize {
		let mut batches = 0;
		while self.run_one() {
			batches += 1;
		}
		batches
	}

	/// Frames currently queued.
	pub fn queued(&self) -> usize {
		self.rx.len()
	}
}

impl Scheduler for ManualScheduler {
	fn schedule(&self, frame: Arc<Frame>) {
		let _ = self.tx.send(frame);
	}

	fn new_state(&self, _frame: &Frame) -> Box<dyn SchedulerState> {
		Box::new(EventBudget::new(self.batch_budget))
	}
}
