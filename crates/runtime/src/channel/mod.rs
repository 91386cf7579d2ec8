// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Reacton

//! Channels: the routable send handles of connectors.
//!
//! A [`Channel`] is the value senders share. It forwards events to the queue
//! of exactly one [`Connector`](connector::Connector) through its local
//! variant and never blocks. A channel whose connector was sealed (or whose
//! frame is gone) silently drops events.

use std::{
	fmt,
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc, Weak,
	},
};

use once_cell::sync::OnceCell;

pub mod connector;

use connector::Connector;

/// Shared send handle of a connector.
///
/// Cloning is cheap and all clones address the same connector. Equality is
/// identity: two channels are equal when they deliver to the same connector.
pub struct Channel<T: Send + 'static> {
	local: Arc<LocalChannel<T>>,
}

impl<T: Send + 'static> Channel<T> {
	pub(crate) fn new(local: Arc<LocalChannel<T>>) -> Self {
		Self {
			local,
		}
	}

	/// Enqueues an event without blocking.
	///
	/// Returns `false` when the event was dropped because the connector is
	/// sealed or its reactor is gone.
	pub fn send(&self, event: T) -> bool {
		self.local.send(event)
	}

	pub fn is_open(&self) -> bool {
		self.local.is_open()
	}

	pub(crate) fn local(&self) -> &Arc<LocalChannel<T>> {
		&self.local
	}
}

impl<T: Send + 'static> Clone for Channel<T> {
	fn clone(&self) -> Self {
		Self {
			local: Arc::clone(&self.local),
		}
	}
}

impl<T: Send + 'static> PartialEq for Channel<T> {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.local, &other.local)
	}
}

impl<T: Send + 'static> Eq for Channel<T> {}

impl<T: Send + 'static> fmt::Debug for Channel<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Channel").field("open", &self.is_open()).finish()
	}
}

/// Local delivery endpoint of a channel.
///
/// Holds the open flag and a set-once back-reference to the owning
/// connector. The back-reference is weak; ownership runs strictly from the
/// frame down to the connector and its queue.
pub struct LocalChannel<T: Send + 'static> {
	open: AtomicBool,
	connector: OnceCell<Weak<Connector<T>>>,
}

impl<T: Send + 'static> LocalChannel<T> {
	pub(crate) fn new() -> Arc<Self> {
		Arc::new(Self {
			open: AtomicBool::new(true),
			connector: OnceCell::new(),
		})
	}

	pub(crate) fn attach(&self, connector: &Arc<Connector<T>>) {
		let _ = self.connector.set(Arc::downgrade(connector));
	}

	fn send(&self, event: T) -> bool {
		if !self.open.load(Ordering::Acquire) {
			return false;
		}
		let Some(connector) = self.connector.get().and_then(Weak::upgrade) else {
			return false;
		};
		let Some(frame) = connector.frame() else {
			return false;
		};
		frame.enqueue_event(&connector, event)
	}

	pub fn is_open(&self) -> bool {
		self.open.load(Ordering::Acquire)
	}

	pub fn is_sealed(&self) -> bool {
		!self.is_open()
	}

	/// Closes the channel. Returns whether it was open before.
	pub(crate) fn close(&self) -> bool {
		self.open.swap(false, Ordering::AcqRel)
	}
}
