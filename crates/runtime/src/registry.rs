// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Reacton

//! Frame registry.
//!
//! A striped concurrent map from reactor name to an immutable [`Info`]
//! snapshot. Mutators build a replacement snapshot and compare-and-swap it
//! in; a failed swap means another mutator won and the caller reloads and
//! retries. A slot may exist before its frame does, holding only listener
//! lists for channels that are yet to be opened.

use std::{any::Any, collections::HashMap, sync::Arc};

use dashmap::{mapref::entry::Entry, DashMap};
use once_cell::sync::Lazy;

use crate::{channel::connector::AnyConnector, frame::Frame};

static EMPTY: Lazy<Arc<Info>> = Lazy::new(|| {
	Arc::new(Info {
		frame: None,
		bindings: HashMap::new(),
	})
});

/// A subscriber waiting for a channel that does not exist yet.
///
/// The payload is a typed callback; fan-out downcasts it against the event
/// type of the connector that eventually binds the name.
#[derive(Clone)]
pub struct ChannelListener {
	callback: Arc<dyn Any + Send + Sync>,
}

pub(crate) struct TypedListener<T: Send + 'static>(pub Arc<dyn Fn(crate::channel::Channel<T>) + Send + Sync>);

impl ChannelListener {
	pub(crate) fn new<T: Send + 'static>(callback: Arc<dyn Fn(crate::channel::Channel<T>) + Send + Sync>) -> Self {
		Self {
			callback: Arc::new(TypedListener(callback)),
		}
	}

	pub(crate) fn downcast<T: Send + 'static>(&self) -> Option<Arc<dyn Fn(crate::channel::Channel<T>) + Send + Sync>> {
		self.callback.clone().downcast::<TypedListener<T>>().ok().map(|typed| Arc::clone(&typed.0))
	}
}

/// What a channel name within a reactor currently resolves to.
#[derive(Clone)]
pub enum Binding {
	/// An open connector.
	Bound(Arc<dyn AnyConnector>),
	/// Listeners waiting for a connector of this name to be opened.
	Pending(Vec<ChannelListener>),
}

impl Binding {
	pub fn is_bound(&self) -> bool {
		matches!(self, Binding::Bound(_))
	}
}

/// Immutable registry snapshot for one reactor name.
pub struct Info {
	frame: Option<Arc<Frame>>,
	bindings: HashMap<String, Binding>,
}

impl Info {
	/// The shared sentinel returned for unregistered names.
	pub fn empty() -> Arc<Info> {
		Arc::clone(&EMPTY)
	}

	pub fn frame(&self) -> Option<&Arc<Frame>> {
		self.frame.as_ref()
	}

	pub fn binding(&self, name: &str) -> Option<&Binding> {
		self.bindings.get(name)
	}

	pub fn is_bound(&self, name: &str) -> bool {
		self.bindings.get(name).is_some_and(Binding::is_bound)
	}

	pub fn has_binding(&self, name: &str) -> bool {
		self.bindings.contains_key(name)
	}

	pub fn bindings_len(&self) -> usize {
		self.bindings.len()
	}

	/// Open connectors currently bound under this name.
	pub fn bound_connectors(&self) -> impl Iterator<Item = &Arc<dyn AnyConnector>> {
		self.bindings.values().filter_map(|binding| match binding {
			Binding::Bound(connector) => Some(connector),
			Binding::Pending(_) => None,
		})
	}

	/// A slot can be removed once no bindings remain and its frame, if any,
	/// has terminated.
	pub fn is_releasable(&self) -> bool {
		self.bindings.is_empty() && self.frame.as_ref().map_or(true, |frame| frame.has_terminated())
	}

	pub(crate) fn with_frame(&self, frame: Arc<Frame>) -> Info {
		Info {
			frame: Some(frame),
			bindings: self.bindings.clone(),
		}
	}

	pub(crate) fn with_binding(&self, name: &str, binding: Binding) -> Info {
		let mut bindings = self.bindings.clone();
		bindings.insert(name.to_string(), binding);
		Info {
			frame: self.frame.clone(),
			bindings,
		}
	}

	pub(crate) fn with_listener(&self, name: &str, listener: ChannelListener) -> Info {
		let mut listeners = match self.bindings.get(name) {
			Some(Binding::Pending(existing)) => existing.clone(),
			_ => Vec::new(),
		};
		listeners.push(listener);
		self.with_binding(name, Binding::Pending(listeners))
	}

	pub(crate) fn without_binding(&self, name: &str) -> Info {
		let mut bindings = self.bindings.clone();
		bindings.remove(name);
		Info {
			frame: self.frame.clone(),
			bindings,
		}
	}

	pub(crate) fn without_bindings(&self) -> Info {
		Info {
			frame: self.frame.clone(),
			bindings: HashMap::new(),
		}
	}
}

/// Name-to-[`Info`] map shared by every frame of a reactor system.
pub struct Registry {
	slots: DashMap<String, Arc<Info>>,
}

impl Registry {
	pub(crate) fn new() -> Self {
		Self {
			slots: DashMap::new(),
		}
	}

	/// Returns the current snapshot for `name`, or the empty sentinel when
	/// the name is unregistered.
	pub fn for_name(&self, name: &str) -> Arc<Info> {
		self.slots.get(name).map(|slot| Arc::clone(slot.value())).unwrap_or_else(Info::empty)
	}

	/// Atomically replaces the snapshot for `name`, provided the slot still
	/// holds `expected`. The empty sentinel stands for an absent slot.
	pub fn try_replace(&self, name: &str, expected: &Arc<Info>, next: Info) -> bool {
		match self.slots.entry(name.to_string()) {
			Entry::Occupied(mut slot) => {
				if Arc::ptr_eq(slot.get(), expected) {
					slot.insert(Arc::new(next));
					true
				} else {
					false
				}
			}
			Entry::Vacant(slot) => {
				if Arc::ptr_eq(expected, &EMPTY) {
					slot.insert(Arc::new(next));
					true
				} else {
					false
				}
			}
		}
	}

	/// Removes the slot for `name` if it is releasable. Best effort: a
	/// concurrent listener insertion defeats the release and the slot lives
	/// on as a listener-only snapshot.
	pub fn try_release(&self, name: &str) -> bool {
		self.slots.remove_if(name, |_, info| info.is_releasable()).is_some()
	}

	/// Whether `name` currently has a slot.
	pub fn contains(&self, name: &str) -> bool {
		self.slots.contains_key(name)
	}
}

#[cfg(test)]
mod tests {
	use std::{collections::HashMap, sync::Arc};

	use super::{Binding, ChannelListener, Info, Registry};

	fn listener_only(listener: ChannelListener) -> Info {
		Info {
			frame: None,
			bindings: HashMap::new(),
		}
		.with_listener("future", listener)
	}

	#[test]
	fn for_name_returns_the_shared_empty_sentinel() {
		let registry = Registry::new();
		let a = registry.for_name("missing");
		let b = registry.for_name("missing");
		assert!(Arc::ptr_eq(&a, &b));
		assert!(a.frame().is_none());
		assert_eq!(a.bindings_len(), 0);
	}

	#[test]
	fn try_replace_from_empty_inserts() {
		let registry = Registry::new();
		let expected = registry.for_name("r");
		let listener = ChannelListener::new::<i32>(Arc::new(|_| {}));
		assert!(registry.try_replace("r", &expected, listener_only(listener)));
		assert!(registry.contains("r"));
	}

	#[test]
	fn try_replace_fails_on_stale_snapshot() {
		let registry = Registry::new();
		let stale = registry.for_name("r");
		let listener = ChannelListener::new::<i32>(Arc::new(|_| {}));
		assert!(registry.try_replace("r", &stale, listener_only(listener.clone())));
		// The sentinel no longer matches the stored snapshot.
		assert!(!registry.try_replace("r", &stale, listener_only(listener)));
	}

	#[test]
	fn release_is_defeated_by_listeners() {
		let registry = Registry::new();
		let expected = registry.for_name("r");
		let listener = ChannelListener::new::<i32>(Arc::new(|_| {}));
		assert!(registry.try_replace("r", &expected, listener_only(listener)));
		assert!(!registry.try_release("r"));

		let current = registry.for_name("r");
		assert!(registry.try_replace("r", &current, current.without_binding("future")));
		assert!(registry.try_release("r"));
		assert!(!registry.contains("r"));
	}

	#[test]
	fn listener_downcast_is_typed() {
		let listener = ChannelListener::new::<i32>(Arc::new(|_| {}));
		assert!(listener.downcast::<i32>().is_some());
		assert!(listener.downcast::<String>().is_none());
	}

	#[test]
	fn pending_bindings_accumulate_listeners() {
		let listener = ChannelListener::new::<i32>(Arc::new(|_| {}));
		let info = listener_only(listener.clone()).with_listener("future", listener);
		match info.binding("future") {
			Some(Binding::Pending(listeners)) => assert_eq!(listeners.len(), 2),
			_ => panic!("expected a pending binding"),
		}
	}
}
