// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Reacton

//! Connectors: named event queues owned by a frame.
//!
//! A connector couples a queue with the channel senders use and the emitter
//! the reactor subscribes to. Each connector is owned by exactly one frame;
//! the back-references (connector to frame, local channel to connector) are
//! weak so ownership stays linear.

use std::{
	any::{Any, TypeId},
	collections::HashMap,
	sync::{Arc, Weak},
};

use crate::{
	channel::{Channel, LocalChannel},
	error::Result,
	event::{
		queue::{EventQueue, QueueFactory},
		Emitter,
	},
	frame::Frame,
};

/// Extensible bag of values keyed by type.
#[derive(Default, Clone)]
pub struct ExtraMap {
	entries: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl ExtraMap {
	pub fn insert<V: Any + Send + Sync>(&mut self, value: V) {
		self.entries.insert(TypeId::of::<V>(), Arc::new(value));
	}

	pub fn get<V: Any + Send + Sync>(&self) -> Option<Arc<V>> {
		self.entries.get(&TypeId::of::<V>()).cloned().and_then(|entry| entry.downcast::<V>().ok())
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

/// A typed event queue plus its routing identity.
pub struct Connector<T: Send + 'static> {
	uid: u64,
	name: String,
	daemon: bool,
	shortcut: bool,
	extras: ExtraMap,
	queue: Arc<dyn EventQueue<T>>,
	events: Emitter<T>,
	chan: Channel<T>,
	frame: Weak<Frame>,
}

impl<T: Send + 'static> Connector<T> {
	pub(crate) fn create(
		frame: &Arc<Frame>,
		uid: u64,
		name: String,
		factory: &QueueFactory<T>,
		daemon: bool,
		shortcut: bool,
		extras: ExtraMap,
	) -> Arc<Self> {
		let local = LocalChannel::new();
		let connector = Arc::new(Self {
			uid,
			name,
			daemon,
			shortcut,
			extras,
			queue: factory(),
			events: Emitter::new(),
			chan: Channel::new(Arc::clone(&local)),
			frame: Arc::downgrade(frame),
		});
		local.attach(&connector);
		connector
	}

	pub fn uid(&self) -> u64 {
		self.uid
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn is_daemon(&self) -> bool {
		self.daemon
	}

	/// Whether delivery may take the fast local path.
	pub fn is_shortcut(&self) -> bool {
		self.shortcut
	}

	pub fn extras(&self) -> &ExtraMap {
		&self.extras
	}

	/// The shared send handle.
	pub fn channel(&self) -> Channel<T> {
		self.chan.clone()
	}

	/// The event stream the reactor subscribes to. Events are delivered
	/// inline while the frame drains this connector.
	pub fn events(&self) -> &Emitter<T> {
		&self.events
	}

	pub fn is_sealed(&self) -> bool {
		self.chan.local().is_sealed()
	}

	/// Seals this connector: no further events are accepted and the event
	/// stream is terminated. Must be called from the thread currently
	/// executing the owning reactor. Sealing twice is a no-op returning
	/// `Ok(false)`.
	pub fn seal(self: &Arc<Self>) -> Result<bool> {
		let Some(frame) = self.frame.upgrade() else {
			return Ok(false);
		};
		frame.ensure_owner("seal")?;
		frame.seal(&(Arc::clone(self) as Arc<dyn AnyConnector>))
	}

	pub(crate) fn queue(&self) -> &Arc<dyn EventQueue<T>> {
		&self.queue
	}

	pub(crate) fn frame(&self) -> Option<Arc<Frame>> {
		self.frame.upgrade()
	}
}

/// Type-erased view of a connector, used by the pending ring, the registry
/// and the termination sweep.
pub trait AnyConnector: Send + Sync {
	fn uid(&self) -> u64;

	fn name(&self) -> &str;

	fn is_daemon(&self) -> bool;

	fn is_sealed(&self) -> bool;

	fn queue_size(&self) -> usize;

	/// Dequeues one event, delivers it to subscribers, and returns the
	/// number of events remaining.
	fn deliver_one(&self) -> usize;

	/// Closes the channel. Returns whether it was open before.
	fn close_channel(&self) -> bool;

	/// Terminates the queue and the event stream.
	fn unreact(&self);

	/// The typed [`Channel`] behind an `Any` reference, for listener
	/// fan-out.
	fn channel_any(&self) -> &(dyn Any + Send + Sync);
}

impl<T: Send + 'static> AnyConnector for Connector<T> {
	fn uid(&self) -> u64 {
		self.uid
	}

	fn name(&self) -> &str {
		&self.name
	}

	fn is_daemon(&self) -> bool {
		self.daemon
	}

	fn is_sealed(&self) -> bool {
		Connector::is_sealed(self)
	}

	fn queue_size(&self) -> usize {
		self.queue.size()
	}

	fn deliver_one(&self) -> usize {
		let (event, remaining) = self.queue.dequeue();
		if let Some(event) = event {
			self.events.emit(&event);
		}
		remaining
	}

	fn close_channel(&self) -> bool {
		self.chan.local().close()
	}

	fn unreact(&self) {
		self.queue.unreact();
		self.events.close();
	}

	fn channel_any(&self) -> &(dyn Any + Send + Sync) {
		&self.chan
	}
}
