// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Reacton

//! Reactor prototypes.
//!
//! A [`Proto`] is the recipe a system spawns a reactor from: the constructor
//! closure plus the spawn options. The closure runs inside the first batch,
//! on a scheduler thread; whatever it returns is kept alive as the reactor
//! object for as long as the frame lives.

use std::{any::Any, sync::Arc};

use crate::{
	event::queue::{self, QueueFactory},
	scheduler::Scheduler,
	system::context::ReactorContext,
};

type BuildClosure<T> = Box<dyn FnOnce(&ReactorContext<T>) -> Box<dyn Any + Send> + Send>;

/// Recipe for a reactor whose default connector carries events of type `T`.
pub struct Proto<T: Send + 'static> {
	build: BuildClosure<T>,
	name: Option<String>,
	scheduler: Option<Arc<dyn Scheduler>>,
	queue_factory: QueueFactory<T>,
}

impl<T: Send + 'static> Proto<T> {
	/// Creates a prototype from a constructor closure.
	///
	/// The closure receives the reactor's [`ReactorContext`] and typically
	/// subscribes handlers on connectors. Its return value becomes the
	/// reactor object.
	pub fn from_fn<R, F>(build: F) -> Self
	where
		F: FnOnce(&ReactorContext<T>) -> R + Send + 'static,
		R: Send + 'static,
	{
		Self {
			build: Box::new(move |ctx| Box::new(build(ctx)) as Box<dyn Any + Send>),
			name: None,
			scheduler: None,
			queue_factory: queue::unbounded(),
		}
	}

	/// Requests a stable reactor name instead of a generated one.
	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.name = Some(name.into());
		self
	}

	/// Runs the reactor on the given scheduler instead of the system
	/// default.
	pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
		self.scheduler = Some(scheduler);
		self
	}

	/// Backs the default connector with a custom event queue.
	pub fn with_queue_factory(mut self, factory: QueueFactory<T>) -> Self {
		self.queue_factory = factory;
		self
	}

	#[allow(clippy::type_complexity)]
	pub(crate) fn into_parts(self) -> (BuildClosure<T>, Option<String>, Option<Arc<dyn Scheduler>>, QueueFactory<T>) {
		(self.build, self.name, self.scheduler, self.queue_factory)
	}
}
