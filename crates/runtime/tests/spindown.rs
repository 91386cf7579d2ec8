// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Reacton

//! Spin-down behavior observed through whole batches.

use std::sync::{
	atomic::{AtomicUsize, Ordering},
	Arc,
};

use reacton_runtime::{
	testing::ManualScheduler, Proto, ReactorSystem, RuntimeConfig, SpindownConfig,
};

fn spin_config() -> RuntimeConfig {
	RuntimeConfig {
		spindown: SpindownConfig {
			initial: 16,
			min: 4,
			max: 64,
			mutation_rate: 1.0,
			test_threshold: 1,
			test_iterations: 1,
			cooldown_rate: 4,
		},
		..RuntimeConfig::default()
	}
}

#[test]
fn isolated_events_decay_the_spin_budget_to_the_minimum() {
	let scheduler = ManualScheduler::new(64);
	let config = spin_config();
	let system = ReactorSystem::with_scheduler("spin", config, scheduler.clone());

	let delivered = Arc::new(AtomicUsize::new(0));

	let channel = {
		let delivered = Arc::clone(&delivered);
		system
			.spawn(
				Proto::<u32>::from_fn(move |ctx| {
					let counter = Arc::clone(&delivered);
					ctx.default_connector().events().subscribe(move |_value: &u32| {
						counter.fetch_add(1, Ordering::SeqCst);
					});
				})
				.with_name("spinner"),
			)
			.unwrap()
	};

	let frame = system.registry().for_name("spinner").frame().cloned().unwrap();
	scheduler.run_until_idle();

	let spindown_config = system.config().spindown;
	for round in 0..1000u32 {
		channel.send(round);
		scheduler.run_until_idle();
		// The budget stays inside its bounds after every batch.
		let spindown = frame.spindown();
		assert!(spindown >= spindown_config.min);
		assert!(spindown <= spindown_config.max);
	}

	assert_eq!(delivered.load(Ordering::SeqCst), 1000);
	// Nothing ever arrived during a spin window, so the budget bottomed out.
	assert_eq!(frame.spindown(), spindown_config.min);
}

#[test]
fn default_configuration_keeps_the_budget_bounded() {
	let scheduler = ManualScheduler::new(8);
	let system = ReactorSystem::with_scheduler("spin-default", RuntimeConfig::default(), scheduler.clone());

	let channel = system
		.spawn(Proto::<u32>::from_fn(|ctx| {
			ctx.default_connector().events().subscribe(|_value: &u32| {});
		}))
		.unwrap();

	let frame = system.registry().for_name("reactor-0").frame().cloned().unwrap();
	let config = system.config().spindown;

	for round in 0..200u32 {
		// Bursts larger than the batch budget force preempted batches with
		// pending work left over.
		for i in 0..20u32 {
			channel.send(round * 100 + i);
		}
		scheduler.run_until_idle();
		let spindown = frame.spindown();
		assert!(spindown >= config.min);
		assert!(spindown <= config.max);
	}
}
