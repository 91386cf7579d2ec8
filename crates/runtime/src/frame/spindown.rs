// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Reacton

//! Adaptive spin-down controller.
//!
//! After a batch drains every pending queue, the frame spins briefly looking
//! for follow-up events instead of paying the preemption plus reschedule
//! round trip. The spin budget is retuned from the observed hit rate: bursty
//! reactors keep a large budget, idle reactors decay to the minimum.

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::config::SpindownConfig;

/// Per-frame controller state. Only the thread executing the frame touches
/// it; the lock around it exists for cross-batch visibility.
pub(crate) struct SpindownState {
	pub spindown: u32,
	pub spins_left: u32,
	total_batches: u64,
	total_score: u64,
	rng: StdRng,
}

impl SpindownState {
	/// Seeding from the frame uid keeps the generator per frame and off any
	/// global lock.
	pub fn new(config: &SpindownConfig, seed: u64) -> Self {
		Self {
			spindown: config.initial.clamp(config.min, config.max),
			spins_left: 0,
			total_batches: 0,
			total_score: 0,
			rng: StdRng::seed_from_u64(seed),
		}
	}

	pub fn begin_spin(&mut self) {
		self.spins_left = self.spindown;
	}

	/// Records a finished batch with the number of spin hits it scored and
	/// retunes the spin budget.
	pub fn record_batch(&mut self, score: u32, config: &SpindownConfig) {
		self.total_batches += 1;
		self.total_score += u64::from(score);

		if score >= 1 || self.rng.gen::<f64>() < config.mutation_rate {
			let mut coefficient = self.total_score as f64 / self.total_batches as f64;
			if self.total_batches >= config.test_threshold {
				let elapsed = (self.total_batches - config.test_threshold) as f64;
				let ramp = 1.0 - elapsed / config.test_iterations.max(1) as f64;
				coefficient += ramp.max(0.0);
			}
			coefficient = coefficient.clamp(0.0, 1.0);
			self.spindown = (config.max as f64 * coefficient).floor() as u32;
		}

		let cooldown = self.spindown / config.cooldown_rate.max(1) + 1;
		self.spindown = self.spindown.saturating_sub(cooldown).max(config.min);
	}
}
