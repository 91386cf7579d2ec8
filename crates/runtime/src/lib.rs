// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Reacton

//! Reactor execution core.
//!
//! This crate runs many lightweight message-driven reactors on a small pool
//! of worker threads. Events are dispatched through typed channels with
//! adaptive batching and cooperative preemption.
//!
//! # Execution Model
//!
//! - Every reactor is backed by a [`Frame`], the record holding its lifecycle
//!   state, its pending event queues and its spin-down controller.
//! - A [`Scheduler`] hands frames to worker threads. Within one frame, all
//!   reactor code runs on a single thread at a time; between batches the
//!   executing thread may change.
//! - Senders hold [`Channel`] values and enqueue without blocking. A frame
//!   whose queue turns non-empty is scheduled exactly once.
//!
//! # Design Goals
//!
//! 1. **Isolation**: at most one thread ever executes a given reactor
//! 2. **Thread-Based**: `std::thread` and `crossbeam-channel`, not async
//! 3. **Cooperative**: batches are bounded by a scheduler-supplied budget
//! 4. **Adaptive**: a per-frame spin-down controller amortizes preemption
//!    cost for bursty reactors and decays to zero for idle ones
//!
//! # Example
//!
//! ```ignore
//! use reacton_runtime::{Proto, ReactorSystem, RuntimeConfig};
//!
//! let system = ReactorSystem::new("app", RuntimeConfig::default());
//!
//! let greeter = system.spawn(Proto::from_fn(|ctx| {
//! 	ctx.default_connector().events().subscribe(|name: &String| {
//! 		println!("hello, {name}");
//! 	});
//! }))?;
//!
//! greeter.send("world".to_string());
//! ```

#![cfg_attr(not(debug_assertions), deny(warnings))]

pub mod channel;
pub mod config;
pub mod debug;
pub mod error;
pub mod event;
pub mod frame;
pub mod registry;
pub mod scheduler;
pub mod sync;
pub mod system;
pub mod testing;

pub use crate::{
	channel::{connector::Connector, Channel},
	config::{PoolConfig, RuntimeConfig, SpindownConfig},
	error::{Failure, Result, RuntimeError},
	event::{Emitter, SysEvent},
	frame::Frame,
	scheduler::{Scheduler, SchedulerState},
	system::{context::ReactorContext, proto::Proto, ReactorSystem},
};
