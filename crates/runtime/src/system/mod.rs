// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Reacton

//! The reactor system: registry, configuration and spawning.

use std::sync::{
	atomic::{AtomicU64, Ordering},
	Arc,
};

use tracing::{debug, warn};

use crate::{
	channel::Channel,
	config::RuntimeConfig,
	debug::{DebugApi, NoopDebugApi},
	error::{Result, RuntimeError},
	frame::Frame,
	registry::{Binding, ChannelListener, Registry},
	scheduler::{pool::ThreadPoolScheduler, Scheduler},
	system::{context::ReactorContext, proto::Proto},
};

pub mod context;
pub mod proto;

struct SystemInner {
	name: String,
	config: RuntimeConfig,
	registry: Registry,
	debug: Arc<dyn DebugApi>,
	scheduler: Arc<dyn Scheduler>,
	uid_counter: AtomicU64,
}

/// Shared handle on a reactor system.
///
/// The system owns the frame registry, the resolved configuration, the
/// debug hooks and the default scheduler. Cloning the handle is cheap.
#[derive(Clone)]
pub struct ReactorSystem {
	inner: Arc<SystemInner>,
}

impl ReactorSystem {
	/// Creates a system with the default thread-pool scheduler.
	pub fn new(name: impl Into<String>, config: RuntimeConfig) -> Self {
		let scheduler = Arc::new(ThreadPoolScheduler::new(&config.pool));
		Self::with_parts(name, config, scheduler, Arc::new(NoopDebugApi))
	}

	/// Creates a system with a custom default scheduler.
	pub fn with_scheduler(name: impl Into<String>, config: RuntimeConfig, scheduler: Arc<dyn Scheduler>) -> Self {
		Self::with_parts(name, config, scheduler, Arc::new(NoopDebugApi))
	}

	pub fn with_parts(
		name: impl Into<String>,
		config: RuntimeConfig,
		scheduler: Arc<dyn Scheduler>,
		debug: Arc<dyn DebugApi>,
	) -> Self {
		Self {
			inner: Arc::new(SystemInner {
				name: name.into(),
				config,
				registry: Registry::new(),
				debug,
				scheduler,
				uid_counter: AtomicU64::new(0),
			}),
		}
	}

	pub fn name(&self) -> &str {
		&self.inner.name
	}

	pub fn config(&self) -> &RuntimeConfig {
		&self.inner.config
	}

	pub fn registry(&self) -> &Registry {
		&self.inner.registry
	}

	pub(crate) fn debug_api(&self) -> Arc<dyn DebugApi> {
		Arc::clone(&self.inner.debug)
	}

	pub fn default_scheduler(&self) -> Arc<dyn Scheduler> {
		Arc::clone(&self.inner.scheduler)
	}

	pub(crate) fn next_uid(&self) -> u64 {
		self.inner.uid_counter.fetch_add(1, Ordering::Relaxed)
	}

	/// Spawns a reactor and returns the channel of its default connector.
	///
	/// The reactor object itself is constructed lazily, inside the first
	/// batch, on a scheduler thread.
	pub fn spawn<T: Send + 'static>(&self, proto: Proto<T>) -> Result<Channel<T>> {
		let (build, name, scheduler, factory) = proto.into_parts();
		let uid = self.next_uid();
		let name = name.unwrap_or_else(|| format!("reactor-{}", uid));
		let scheduler = scheduler.unwrap_or_else(|| Arc::clone(&self.inner.scheduler));
		let frame = Frame::new(self.clone(), uid, name.clone(), scheduler);

		// Claim the name. A pre-existing slot is fine as long as it only
		// carries listeners waiting for our channels.
		let registry = self.registry();
		loop {
			let info = registry.for_name(&name);
			if info.frame().is_some() {
				return Err(RuntimeError::ReactorExists {
					name,
				});
			}
			let next = info.with_frame(Arc::clone(&frame));
			if registry.try_replace(&name, &info, next) {
				break;
			}
		}

		let default = frame.open_standard_connectors(&factory)?;
		let channel = default.channel();

		let default_for_ctx = Arc::clone(&default);
		frame.install_build(Box::new(move |frame: &Arc<Frame>| {
			let ctx = ReactorContext::new(Arc::clone(frame), default_for_ctx);
			build(&ctx)
		}));

		debug!(reactor = %name, uid, "spawning reactor");
		frame.activate(false);
		Ok(channel)
	}

	/// Subscribes to the channel named `channel` of the reactor named
	/// `reactor`, whether or not it exists yet.
	///
	/// If the channel is already open the callback fires immediately with
	/// its [`Channel`]; otherwise it fires once when a connector of that
	/// name is opened. Each registration fires at most once.
	pub fn watch_channel<T, F>(&self, reactor: &str, channel: &str, callback: F)
	where
		T: Send + 'static,
		F: Fn(Channel<T>) + Send + Sync + 'static,
	{
		let registry = self.registry();
		let callback: Arc<dyn Fn(Channel<T>) + Send + Sync> = Arc::new(callback);
		loop {
			let info = registry.for_name(reactor);
			match info.binding(channel) {
				Some(Binding::Bound(connector)) => {
					match connector.channel_any().downcast_ref::<Channel<T>>() {
						Some(bound) => callback(bound.clone()),
						None => {
							warn!(reactor, channel, "channel watch dropped: event type mismatch");
						}
					}
					return;
				}
				_ => {
					let listener = ChannelListener::new::<T>(Arc::clone(&callback));
					let next = info.with_listener(channel, listener);
					if registry.try_replace(reactor, &info, next) {
						return;
					}
				}
			}
		}
	}
}
