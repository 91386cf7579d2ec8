// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Reacton

//! Frames: the per-reactor scheduling and execution records.
//!
//! A frame owns the reactor's lifecycle state machine, its pending event
//! queues, the isolation token asserting that at most one thread ever runs
//! the reactor, dynamic connector creation, termination detection and the
//! adaptive spin-down policy.
//!
//! # Locking
//!
//! One monitor per frame guards every mutable scheduling field. The monitor
//! is never held across a scheduler call, a debug hook, reactor
//! construction, user event delivery or a queue operation, and two frame
//! monitors are never held at once.

use std::{
	any::Any,
	cell::RefCell,
	panic::{self, AssertUnwindSafe},
	sync::{
		atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
		Arc,
	},
	time::Duration,
};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{
	channel::connector::{AnyConnector, Connector, ExtraMap},
	error::{Failure, Result, RuntimeError},
	event::{
		queue::{self, QueueFactory},
		Emitter, SysEvent,
	},
	registry::Binding,
	scheduler::{Scheduler, SchedulerState},
	sync::Monitor,
	system::ReactorSystem,
};

pub(crate) mod ring;
pub(crate) mod spindown;

use ring::UnrolledRing;
use spindown::SpindownState;

thread_local! {
	static CURRENT_FRAME: RefCell<Option<Arc<Frame>>> = const { RefCell::new(None) };
}

/// The frame currently executing on this thread, if any.
pub fn current_frame() -> Option<Arc<Frame>> {
	CURRENT_FRAME.with(|current| current.borrow().clone())
}

fn set_current(frame: Arc<Frame>) {
	CURRENT_FRAME.with(|current| *current.borrow_mut() = Some(frame));
}

fn clear_current() {
	CURRENT_FRAME.with(|current| *current.borrow_mut() = None);
}

/// Lifecycle of a reactor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
	/// Constructed but the reactor object does not exist yet.
	Fresh,
	/// The first batch ran the constructor; events are being processed.
	Running,
	/// No batch will ever run again.
	Terminated,
}

/// Mutable scheduling fields, all guarded by the frame monitor.
struct FrameState {
	lifecycle: Lifecycle,
	active: bool,
	non_daemon_count: usize,
	pending: UnrolledRing<Arc<dyn AnyConnector>>,
}

/// Recipe producing the reactor object inside the first batch.
pub(crate) type BuildFn = Box<dyn FnOnce(&Arc<Frame>) -> Box<dyn Any + Send> + Send>;

enum Drained {
	/// The current connector is exhausted or sealed; move to the next one.
	Next,
	/// The scheduler budget ran out.
	Preempted,
}

/// Per-reactor scheduling and execution record.
pub struct Frame {
	uid: u64,
	name: String,
	system: ReactorSystem,
	scheduler: Arc<dyn Scheduler>,
	monitor: Monitor<FrameState>,
	id_counter: AtomicU64,
	active_count: AtomicUsize,
	terminated: AtomicBool,
	sys_emitter: Emitter<SysEvent>,
	build: Mutex<Option<BuildFn>>,
	reactor: Mutex<Option<Box<dyn Any + Send>>>,
	scheduler_state: OnceCell<Box<dyn SchedulerState>>,
	default_connector: OnceCell<Arc<dyn AnyConnector>>,
	internal_connector: OnceCell<Arc<dyn AnyConnector>>,
	spindown: Mutex<SpindownState>,
}

impl Frame {
	pub(crate) fn new(system: ReactorSystem, uid: u64, name: String, scheduler: Arc<dyn Scheduler>) -> Arc<Frame> {
		let spindown = SpindownState::new(&system.config().spindown, uid);
		let frame = Arc::new(Frame {
			uid,
			name,
			system,
			scheduler: Arc::clone(&scheduler),
			monitor: Monitor::new(FrameState {
				lifecycle: Lifecycle::Fresh,
				active: false,
				non_daemon_count: 0,
				pending: UnrolledRing::new(),
			}),
			id_counter: AtomicU64::new(0),
			active_count: AtomicUsize::new(0),
			terminated: AtomicBool::new(false),
			sys_emitter: Emitter::new(),
			build: Mutex::new(None),
			reactor: Mutex::new(None),
			scheduler_state: OnceCell::new(),
			default_connector: OnceCell::new(),
			internal_connector: OnceCell::new(),
			spindown: Mutex::new(spindown),
		});
		let _ = frame.scheduler_state.set(scheduler.new_state(&frame));
		frame
	}

	pub fn uid(&self) -> u64 {
		self.uid
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Stable addressing identity of this reactor.
	pub fn url(&self) -> String {
		format!("{}/{}", self.system.name(), self.name)
	}

	pub fn system(&self) -> &ReactorSystem {
		&self.system
	}

	/// Lifecycle events of this reactor, observable from within it.
	pub fn sys_events(&self) -> &Emitter<SysEvent> {
		&self.sys_emitter
	}

	/// The pre-opened non-daemon connector carrying user events.
	pub fn default_connector(&self) -> Option<&Arc<dyn AnyConnector>> {
		self.default_connector.get()
	}

	/// The pre-opened daemon connector reserved for lifecycle signals.
	pub fn internal_connector(&self) -> Option<&Arc<dyn AnyConnector>> {
		self.internal_connector.get()
	}

	pub fn lifecycle(&self) -> Lifecycle {
		self.monitor.lock().lifecycle
	}

	pub fn has_terminated(&self) -> bool {
		self.terminated.load(Ordering::Acquire)
	}

	pub fn has_pending_events(&self) -> bool {
		!self.monitor.lock().pending.is_empty()
	}

	/// Sum of the queue sizes of every pending connector. An estimate:
	/// producers keep enqueueing while it is computed.
	pub fn estimate_total_pending_events(&self) -> usize {
		self.monitor.lock().pending.iter().map(|connector| connector.queue_size()).sum()
	}

	/// Current spin budget of the adaptive spin-down controller.
	pub fn spindown(&self) -> u32 {
		self.spindown.lock().spindown
	}

	/// Blocks until the reactor terminates or the timeout expires.
	pub fn await_terminated(&self, timeout: Duration) -> bool {
		let mut state = self.monitor.lock();
		self.monitor.wait_while_for(&mut state, |state| state.lifecycle != Lifecycle::Terminated, timeout)
	}

	/// Fails unless the calling thread is currently executing this reactor.
	pub(crate) fn ensure_owner(&self, operation: &'static str) -> Result<()> {
		match current_frame() {
			Some(frame) if frame.uid == self.uid => Ok(()),
			_ => Err(RuntimeError::NotOwner {
				name: self.name.clone(),
				operation,
			}),
		}
	}

	// --- event enqueue -------------------------------------------------

	/// Deposits an event into a connector owned by this frame and, when the
	/// queue just turned non-empty, registers the connector as pending and
	/// schedules the frame if it was idle.
	///
	/// The size==1 test collapses bursty sends to an already pending
	/// connector into a pure queue append with no lock taken.
	pub(crate) fn enqueue_event<T: Send + 'static>(self: &Arc<Self>, connector: &Arc<Connector<T>>, event: T) -> bool {
		let size = connector.queue().enqueue(event);
		if size == 0 {
			return false;
		}
		if size == 1 {
			self.register_pending(Arc::clone(connector) as Arc<dyn AnyConnector>);
		}
		true
	}

	fn register_pending(self: &Arc<Self>, connector: Arc<dyn AnyConnector>) {
		let must_schedule = {
			let mut state = self.monitor.lock();
			if state.lifecycle == Lifecycle::Terminated {
				return;
			}
			state.pending.enqueue(connector);
			if !state.active {
				state.active = true;
				true
			} else {
				false
			}
		};
		if must_schedule {
			self.scheduler.schedule(Arc::clone(self));
		}
	}

	/// Forces a scheduling pass even without events. Bootstraps the first
	/// batch and delivers lifecycle signals.
	pub(crate) fn activate(self: &Arc<Self>, schedule_even_if_active: bool) {
		let must_schedule = {
			let mut state = self.monitor.lock();
			if state.lifecycle == Lifecycle::Terminated {
				false
			} else if !state.active || schedule_even_if_active {
				state.active = true;
				true
			} else {
				false
			}
		};
		if must_schedule {
			self.scheduler.schedule(Arc::clone(self));
		}
	}

	// --- connector management ------------------------------------------

	/// Opens a new connector on this frame.
	///
	/// Races only on the registry: the retry loop rebuilds the snapshot
	/// until the compare-and-swap wins. Local frame fields are touched by
	/// the owning thread alone.
	pub(crate) fn open_connector<T: Send + 'static>(
		self: &Arc<Self>,
		name: Option<&str>,
		factory: &QueueFactory<T>,
		daemon: bool,
		shortcut: bool,
		extras: ExtraMap,
	) -> Result<Arc<Connector<T>>> {
		let registry = self.system.registry();
		let (connector, listeners) = loop {
			if self.has_terminated() {
				return Err(RuntimeError::FrameTerminated {
					name: self.name.clone(),
				});
			}
			let uid = self.id_counter.fetch_add(1, Ordering::Relaxed);
			let info = registry.for_name(&self.name);
			debug_assert!(info.frame().is_some(), "frame must stay registered while it is open");

			let channel_name = match name {
				Some(requested) => {
					if info.is_bound(requested) {
						return Err(RuntimeError::NameInUse {
							reactor: self.name.clone(),
							channel: requested.to_string(),
						});
					}
					requested.to_string()
				}
				None => {
					let mut k = 0;
					loop {
						let candidate = format!("channel-{}-{}", uid, k);
						if !info.has_binding(&candidate) {
							break candidate;
						}
						k += 1;
					}
				}
			};

			let connector = Connector::create(self, uid, channel_name.clone(), factory, daemon, shortcut, extras.clone());
			let previous = info.binding(&channel_name).cloned();
			let next = info.with_binding(&channel_name, Binding::Bound(Arc::clone(&connector) as Arc<dyn AnyConnector>));
			if registry.try_replace(&self.name, &info, next) {
				let listeners = match previous {
					Some(Binding::Pending(listeners)) => listeners,
					_ => Vec::new(),
				};
				break (connector, listeners);
			}
			// Lost the registry race; reload and retry.
		};

		// Deliver the new channel to subscribers that were waiting for this
		// name to exist.
		for listener in listeners {
			match listener.downcast::<T>() {
				Some(callback) => callback(connector.channel()),
				None => {
					warn!(
						reactor = %self.name,
						channel = %connector.name(),
						"channel listener dropped: event type mismatch"
					);
				}
			}
		}

		if !daemon {
			let mut state = self.monitor.lock();
			state.non_daemon_count += 1;
		}
		Ok(connector)
	}

	/// Seals a connector: marks its channel closed, retires its registry
	/// binding and signals the terminator to subscribers. Idempotent.
	pub(crate) fn seal(&self, connector: &Arc<dyn AnyConnector>) -> Result<bool> {
		{
			let mut state = self.monitor.lock();
			if !connector.close_channel() {
				return Ok(false);
			}
			if !connector.is_daemon() {
				state.non_daemon_count = state.non_daemon_count.saturating_sub(1);
			}
			let registry = self.system.registry();
			loop {
				let info = registry.for_name(&self.name);
				match info.binding(connector.name()) {
					Some(Binding::Bound(bound)) if bound.uid() == connector.uid() => {
						let next = info.without_binding(connector.name());
						if registry.try_replace(&self.name, &info, next) {
							break;
						}
					}
					_ => break,
				}
			}
		}
		connector.unreact();
		debug!(reactor = %self.name, channel = %connector.name(), "connector sealed");
		Ok(true)
	}

	// --- batch execution -----------------------------------------------

	/// Runs one batch of event deliveries on the calling thread.
	///
	/// The scheduler must never call this concurrently for the same frame,
	/// and never from a thread that is already inside a reactor.
	pub fn execute_batch(self: &Arc<Self>) -> Result<()> {
		if let Some(current) = current_frame() {
			return Err(RuntimeError::NestedExecution {
				current: current.name.clone(),
			});
		}
		self.scheduler.preschedule(&self.system);

		// Acquire the isolation token. The scheduler never queues a frame
		// twice, so contention here is limited to a racing forced
		// activation and resolves in a few spins.
		while self.active_count.compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire).is_err() {
			std::hint::spin_loop();
		}
		set_current(Arc::clone(self));

		let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.process_batch()));
		let termination_check = panic::catch_unwind(AssertUnwindSafe(|| self.check_terminated(false)));

		let failure = match (outcome, termination_check) {
			(Ok(()), Ok(())) => None,
			(Err(payload), _) | (Ok(()), Err(payload)) => Some(self.recover(payload)),
		};

		// Release: runs regardless of how the batch ended.
		clear_current();
		self.active_count.store(0, Ordering::Release);
		let must_schedule = {
			let mut state = self.monitor.lock();
			if !state.pending.is_empty() && state.lifecycle != Lifecycle::Terminated {
				true
			} else {
				state.active = false;
				false
			}
		};
		self.scheduler.unschedule(&self.system, failure.as_ref());
		if must_schedule {
			self.scheduler.schedule(Arc::clone(self));
		}

		match failure {
			Some(failure) => Err(RuntimeError::ReactorDied {
				name: self.name.clone(),
				failure,
			}),
			None => Ok(()),
		}
	}

	/// Recovery path for a panic escaping the batch: emit `ReactorDied`
	/// unless already terminated, then force termination. Panics from the
	/// emission itself are not allowed to skip the terminate path.
	fn recover(&self, payload: Box<dyn Any + Send>) -> Failure {
		let failure = Failure::from_panic(payload);
		if !self.has_terminated() {
			let died = SysEvent::ReactorDied(failure.clone());
			if panic::catch_unwind(AssertUnwindSafe(|| self.sys_emitter.emit(&died))).is_err() {
				warn!(reactor = %self.name, "lifecycle subscriber panicked during ReactorDied");
			}
		}
		if panic::catch_unwind(AssertUnwindSafe(|| self.check_terminated(true))).is_err() {
			warn!(reactor = %self.name, "lifecycle subscriber panicked during termination");
		}
		failure
	}

	fn process_batch(self: &Arc<Self>) {
		let construct = {
			let mut state = self.monitor.lock();
			if state.lifecycle == Lifecycle::Fresh {
				state.lifecycle = Lifecycle::Running;
				true
			} else {
				false
			}
		};
		if construct {
			let debug_api = self.system.debug_api();
			if panic::catch_unwind(AssertUnwindSafe(|| debug_api.reactor_started(self))).is_err() {
				warn!(reactor = %self.name, "debug hook panicked in reactor_started");
			}
			let build = self.build.lock().take();
			if let Some(build) = build {
				let reactor = build(self);
				*self.reactor.lock() = Some(reactor);
			}
			debug!(reactor = %self.name, uid = self.uid, "reactor constructed");
			self.sys_emitter.emit(&SysEvent::ReactorStarted);
		}

		self.sys_emitter.emit(&SysEvent::ReactorScheduled);
		self.drain_and_spin();
		self.sys_emitter.emit(&SysEvent::ReactorPreempted);
	}

	/// The batch core: drain pending connectors until the budget runs out,
	/// then spin for follow-up arrivals, then retune the spin budget.
	fn drain_and_spin(&self) {
		let sched = self
			.scheduler_state
			.get()
			.expect("scheduler state is installed at frame construction");
		sched.on_batch_start(self);

		let mut score: u32 = 0;
		let mut current = self.pop_pending();
		'batch: loop {
			while let Some(connector) = current.take() {
				match self.drain_connector(&connector, sched.as_ref()) {
					Drained::Next => current = self.pop_pending(),
					Drained::Preempted => break 'batch,
				}
			}
			// Every queue is empty. Spin briefly before giving the thread
			// back: a hit resumes draining without a scheduler round trip.
			match self.spin_for_events() {
				Some(connector) => {
					score += 1;
					current = Some(connector);
				}
				None => break 'batch,
			}
		}

		let config = self.system.config().spindown;
		self.spindown.lock().record_batch(score, &config);
	}

	fn drain_connector(&self, connector: &Arc<dyn AnyConnector>, sched: &dyn SchedulerState) -> Drained {
		loop {
			let remaining = connector.deliver_one();
			if sched.on_batch_event(self) {
				if remaining > 0 && !connector.is_sealed() {
					// Keep draining the same connector: locality beats
					// fairness within a batch.
					continue;
				}
				return Drained::Next;
			}
			if remaining > 0 && !connector.is_sealed() {
				let mut state = self.monitor.lock();
				state.pending.enqueue(Arc::clone(connector));
			}
			return Drained::Preempted;
		}
	}

	fn pop_pending(&self) -> Option<Arc<dyn AnyConnector>> {
		let mut state = self.monitor.lock();
		while let Some(connector) = state.pending.dequeue() {
			if !connector.is_sealed() {
				return Some(connector);
			}
		}
		None
	}

	fn spin_for_events(&self) -> Option<Arc<dyn AnyConnector>> {
		let mut spin = self.spindown.lock();
		spin.begin_spin();
		while spin.spins_left > 0 {
			spin.spins_left -= 1;
			if spin.spins_left % 10 == 0 {
				if let Some(connector) = self.pop_pending() {
					return Some(connector);
				}
			}
			std::hint::spin_loop();
		}
		None
	}

	// --- termination ---------------------------------------------------

	/// Detects and performs termination. A frame terminates when a batch
	/// completes with nothing pending and no open non-daemon connector, or
	/// immediately when `forced`.
	pub(crate) fn check_terminated(&self, forced: bool) {
		let terminate = {
			let mut state = self.monitor.lock();
			if state.lifecycle == Lifecycle::Running
				&& (forced || (state.pending.is_empty() && state.non_daemon_count == 0))
			{
				state.lifecycle = Lifecycle::Terminated;
				self.terminated.store(true, Ordering::Release);
				true
			} else {
				false
			}
		};
		if !terminate {
			return;
		}

		self.monitor.notify_all();
		debug!(reactor = %self.name, uid = self.uid, "reactor terminated");

		// Retire whatever bindings remain (daemon connectors, orphaned
		// listeners) so the slot can actually be released.
		self.retire_bindings();

		let debug_api = self.system.debug_api();
		if panic::catch_unwind(AssertUnwindSafe(|| debug_api.reactor_terminated(self))).is_err() {
			warn!(reactor = %self.name, "debug hook panicked in reactor_terminated");
		}
		self.sys_emitter.emit(&SysEvent::ReactorTerminated);
		self.sys_emitter.close();
		self.system.registry().try_release(&self.name);
	}

	fn retire_bindings(&self) {
		let registry = self.system.registry();
		loop {
			let info = registry.for_name(&self.name);
			if info.bindings_len() == 0 {
				break;
			}
			let next = info.without_bindings();
			if registry.try_replace(&self.name, &info, next) {
				for connector in info.bound_connectors() {
					connector.close_channel();
					connector.unreact();
				}
				break;
			}
		}
	}

	// --- spawn support -------------------------------------------------

	pub(crate) fn install_build(&self, build: BuildFn) {
		*self.build.lock() = Some(build);
	}

	pub(crate) fn install_default_connector(&self, connector: Arc<dyn AnyConnector>) {
		let _ = self.default_connector.set(connector);
	}

	pub(crate) fn install_internal_connector(&self, connector: Arc<dyn AnyConnector>) {
		let _ = self.internal_connector.set(connector);
	}

	/// Opens the two connectors every reactor starts with: the non-daemon
	/// "main" connector carrying user events and the daemon "system"
	/// connector carrying lifecycle signals.
	pub(crate) fn open_standard_connectors<T: Send + 'static>(
		self: &Arc<Self>,
		factory: &QueueFactory<T>,
	) -> Result<Arc<Connector<T>>> {
		let default = self.open_connector(Some("main"), factory, false, false, ExtraMap::default())?;
		self.install_default_connector(Arc::clone(&default) as Arc<dyn AnyConnector>);

		let internal =
			self.open_connector::<SysEvent>(Some("system"), &queue::unbounded(), true, false, ExtraMap::default())?;
		self.install_internal_connector(internal as Arc<dyn AnyConnector>);
		Ok(default)
	}
}
