// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Reacton

//! Reactor execution context.
//!
//! The context is the handle reactor code uses to reach its own frame:
//! opening and sealing connectors, observing lifecycle events and reading
//! scheduling state. It is cheap to clone into event handlers. Operations
//! that mutate the connector set verify they run on the thread currently
//! executing the reactor.

use std::sync::Arc;

use crate::{
	channel::{
		connector::{Connector, ExtraMap},
		Channel,
	},
	error::Result,
	event::{
		queue::{self, QueueFactory},
		Emitter, SysEvent,
	},
	frame::Frame,
	system::ReactorSystem,
};

/// Handle reactor code uses to reach its own frame.
pub struct ReactorContext<T: Send + 'static> {
	frame: Arc<Frame>,
	default_connector: Arc<Connector<T>>,
}

impl<T: Send + 'static> ReactorContext<T> {
	pub(crate) fn new(frame: Arc<Frame>, default_connector: Arc<Connector<T>>) -> Self {
		Self {
			frame,
			default_connector,
		}
	}

	pub fn frame(&self) -> &Arc<Frame> {
		&self.frame
	}

	pub fn system(&self) -> &ReactorSystem {
		self.frame.system()
	}

	/// The pre-opened connector carrying this reactor's user events.
	pub fn default_connector(&self) -> &Arc<Connector<T>> {
		&self.default_connector
	}

	/// The send handle of the default connector.
	pub fn channel(&self) -> Channel<T> {
		self.default_connector.channel()
	}

	/// Lifecycle events of this reactor. Delivery is synchronous and
	/// ordered with respect to batches.
	pub fn sys_events(&self) -> &Emitter<SysEvent> {
		self.frame.sys_events()
	}

	/// Opens a connector with the full option set.
	pub fn open_connector<U: Send + 'static>(
		&self,
		name: Option<&str>,
		factory: QueueFactory<U>,
		daemon: bool,
		shortcut: bool,
		extras: ExtraMap,
	) -> Result<Arc<Connector<U>>> {
		self.frame.ensure_owner("open_connector")?;
		self.frame.open_connector(name, &factory, daemon, shortcut, extras)
	}

	/// Opens a non-daemon connector with the default unbounded queue.
	pub fn open<U: Send + 'static>(&self, name: Option<&str>) -> Result<Arc<Connector<U>>> {
		self.open_connector(name, queue::unbounded(), false, false, ExtraMap::default())
	}

	/// Opens a daemon connector with the default unbounded queue.
	pub fn open_daemon<U: Send + 'static>(&self, name: Option<&str>) -> Result<Arc<Connector<U>>> {
		self.open_connector(name, queue::unbounded(), true, false, ExtraMap::default())
	}

	/// Seals a connector of this reactor. Sealing twice is a no-op.
	pub fn seal<U: Send + 'static>(&self, connector: &Arc<Connector<U>>) -> Result<bool> {
		connector.seal()
	}

	pub fn has_terminated(&self) -> bool {
		self.frame.has_terminated()
	}

	pub fn has_pending_events(&self) -> bool {
		self.frame.has_pending_events()
	}

	pub fn estimate_total_pending_events(&self) -> usize {
		self.frame.estimate_total_pending_events()
	}
}

impl<T: Send + 'static> Clone for ReactorContext<T> {
	fn clone(&self) -> Self {
		Self {
			frame: Arc::clone(&self.frame),
			default_connector: Arc::clone(&self.default_connector),
		}
	}
}
