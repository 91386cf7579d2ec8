// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Reacton

//! Resolved configuration records consumed by the runtime.
//!
//! Parsing and layering happen outside this crate; frames receive these
//! records fully resolved.

use serde::Deserialize;

/// Tuning knobs of the per-frame spin-down controller.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SpindownConfig {
	/// Spin budget a fresh frame starts with.
	pub initial: u32,
	/// Lower clamp applied after every batch.
	pub min: u32,
	/// Upper clamp; the mutation step scales this by the observed hit rate.
	pub max: u32,
	/// Probability of retuning the budget after a batch with no spin hits.
	pub mutation_rate: f64,
	/// Batch count after which the exploratory ramp starts fading.
	pub test_threshold: u64,
	/// Batches over which the exploratory ramp fades to zero.
	pub test_iterations: u64,
	/// Divisor of the unconditional per-batch decay. Values below 1 are
	/// treated as 1.
	pub cooldown_rate: u32,
}

impl Default for SpindownConfig {
	fn default() -> Self {
		Self {
			initial: 16,
			min: 0,
			max: 256,
			mutation_rate: 0.1,
			test_threshold: 128,
			test_iterations: 128,
			cooldown_rate: 8,
		}
	}
}

/// Sizing of the default thread-pool scheduler.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
	/// Worker thread count. Zero selects the available parallelism.
	pub workers: usize,
	/// Events a frame may deliver per batch before it is preempted.
	pub batch_budget: u32,
}

impl Default for PoolConfig {
	fn default() -> Self {
		Self {
			workers: 0,
			batch_budget: 1024,
		}
	}
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
	pub spindown: SpindownConfig,
	pub pool: PoolConfig,
}
