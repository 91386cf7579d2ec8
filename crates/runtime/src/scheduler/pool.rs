// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Reacton

//! Thread-pool scheduler.
//!
//! The default scheduler: a fixed set of worker threads pulling frames off a
//! shared channel. Any worker may execute any frame; the frame's own
//! isolation token keeps a reactor on one thread at a time.

use std::{
	sync::Arc,
	thread::{self, JoinHandle},
};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error};

use crate::{
	config::PoolConfig,
	frame::Frame,
	scheduler::{EventBudget, Scheduler, SchedulerState},
};

/// Scheduler running frames on a pool of named worker threads.
///
/// Dropping the scheduler closes the run queue; workers drain what is
/// already queued and stop, and the drop joins them.
pub struct ThreadPoolScheduler {
	queue: Option<Sender<Arc<Frame>>>,
	workers: Mutex<Vec<JoinHandle<()>>>,
	batch_budget: u32,
}

impl ThreadPoolScheduler {
	pub fn new(config: &PoolConfig) -> Self {
		let workers = if config.workers > 0 {
			config.workers
		} else {
			thread::available_parallelism().map(|n| n.get()).unwrap_or(2)
		};

		let (tx, rx) = unbounded::<Arc<Frame>>();
		let handles = (0..workers)
			.map(|index| {
				let rx = rx.clone();
				thread::Builder::new()
					.name(format!("reactor-worker-{}", index))
					.spawn(move || run_worker(rx))
					.expect("Failed to spawn worker thread")
			})
			.collect();

		Self {
			queue: Some(tx),
			workers: Mutex::new(handles),
			batch_budget: config.batch_budget,
		}
	}
}

impl Scheduler for ThreadPoolScheduler {
	fn schedule(&self, frame: Arc<Frame>) {
		if let Some(queue) = &self.queue {
			let _ = queue.send(frame);
		}
	}

	fn new_state(&self, _frame: &Frame) -> Box<dyn SchedulerState> {
		Box::new(EventBudget::new(self.batch_budget))
	}
}

impl Drop for ThreadPoolScheduler {
	fn drop(&mut self) {
		// Closing the queue lets workers finish the backlog and exit.
		self.queue.take();
		for handle in self.workers.lock().drain(..) {
			let _ = handle.join();
		}
	}
}

fn run_worker(rx: Receiver<Arc<Frame>>) {
	debug!("reactor worker starting");
	while let Ok(frame) = rx.recv() {
		if let Err(err) = frame.execute_batch() {
			// The frame already recovered and terminated; the worker only
			// records the failure.
			error!(reactor = %frame.name(), %err, "reactor batch failed");
		}
	}
	debug!("reactor worker stopped");
}
