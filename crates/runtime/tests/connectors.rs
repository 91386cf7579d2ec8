// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Reacton

//! Connector creation, naming, sealing and channel watching.

use std::sync::{
	atomic::{AtomicUsize, Ordering},
	Arc, Mutex,
};

use reacton_runtime::{
	testing::ManualScheduler, Channel, Proto, ReactorSystem, RuntimeConfig, RuntimeError,
};

#[test]
fn duplicate_channel_names_are_rejected() {
	let scheduler = ManualScheduler::new(64);
	let system = ReactorSystem::with_scheduler("naming", RuntimeConfig::default(), scheduler.clone());

	let outcome = Arc::new(Mutex::new(None));
	let received = Arc::new(AtomicUsize::new(0));

	{
		let outcome = Arc::clone(&outcome);
		let received = Arc::clone(&received);
		system
			.spawn(Proto::<()>::from_fn(move |ctx| {
				let first = ctx.open::<u32>(Some("foo")).unwrap();
				let second = ctx.open::<u32>(Some("foo"));
				*outcome.lock().unwrap() = Some(second.map(|_| ()));

				let counter = Arc::clone(&received);
				first.events().subscribe(move |value: &u32| {
					counter.fetch_add(*value as usize, Ordering::SeqCst);
				});
				// The first connector keeps working after the rejection.
				first.channel().send(41);
				first.channel().send(1);
			}))
			.unwrap();
	}

	scheduler.run_until_idle();

	match outcome.lock().unwrap().take() {
		Some(Err(RuntimeError::NameInUse {
			channel,
			..
		})) => assert_eq!(channel, "foo"),
		other => panic!("expected NameInUse, got {:?}", other.map(|r| r.is_ok())),
	}
	assert_eq!(received.load(Ordering::SeqCst), 42);
}

#[test]
fn generated_names_avoid_collisions() {
	let scheduler = ManualScheduler::new(64);
	let system = ReactorSystem::with_scheduler("autonaming", RuntimeConfig::default(), scheduler.clone());

	let names = Arc::new(Mutex::new(Vec::new()));

	{
		let names = Arc::clone(&names);
		system
			.spawn(Proto::<()>::from_fn(move |ctx| {
				let a = ctx.open::<u32>(None).unwrap();
				let b = ctx.open::<u32>(None).unwrap();
				let mut names = names.lock().unwrap();
				names.push(a.name().to_string());
				names.push(b.name().to_string());
			}))
			.unwrap();
	}

	scheduler.run_until_idle();

	let names = names.lock().unwrap();
	assert_eq!(names.len(), 2);
	assert_ne!(names[0], names[1]);
	assert!(names.iter().all(|name| name.starts_with("channel-")));
}

#[test]
fn watch_before_open_receives_the_bound_channel_once() {
	let scheduler = ManualScheduler::new(64);
	let system = ReactorSystem::with_scheduler("watching", RuntimeConfig::default(), scheduler.clone());

	let observed: Arc<Mutex<Vec<Channel<String>>>> = Arc::new(Mutex::new(Vec::new()));
	let opened: Arc<Mutex<Option<Channel<String>>>> = Arc::new(Mutex::new(None));

	{
		let observed = Arc::clone(&observed);
		system.watch_channel::<String, _>("echo", "bar", move |channel| {
			observed.lock().unwrap().push(channel);
		});
	}

	{
		let opened = Arc::clone(&opened);
		system
			.spawn(
				Proto::<()>::from_fn(move |ctx| {
					let connector = ctx.open::<String>(Some("bar")).unwrap();
					*opened.lock().unwrap() = Some(connector.channel());
				})
				.with_name("echo"),
			)
			.unwrap();
	}

	scheduler.run_until_idle();

	let observed = observed.lock().unwrap();
	let opened = opened.lock().unwrap();
	assert_eq!(observed.len(), 1);
	assert_eq!(Some(&observed[0]), opened.as_ref());
}

#[test]
fn watch_after_open_fires_immediately() {
	let scheduler = ManualScheduler::new(64);
	let system = ReactorSystem::with_scheduler("watching-late", RuntimeConfig::default(), scheduler.clone());

	let channel = system
		.spawn(Proto::<u64>::from_fn(|_ctx| {}).with_name("late"))
		.unwrap();
	scheduler.run_until_idle();

	let observed = Arc::new(Mutex::new(Vec::new()));
	{
		let observed = Arc::clone(&observed);
		// The default connector of every reactor is named "main".
		system.watch_channel::<u64, _>("late", "main", move |bound| {
			observed.lock().unwrap().push(bound);
		});
	}

	let observed = observed.lock().unwrap();
	assert_eq!(observed.len(), 1);
	assert_eq!(observed[0], channel);
}

#[test]
fn sealing_twice_is_a_no_op() {
	let scheduler = ManualScheduler::new(64);
	let system = ReactorSystem::with_scheduler("sealing", RuntimeConfig::default(), scheduler.clone());

	let seal_results = Arc::new(Mutex::new(Vec::new()));

	let channel = {
		let seal_results = Arc::clone(&seal_results);
		system
			.spawn(Proto::<i32>::from_fn(move |ctx| {
				let seal_ctx = ctx.clone();
				let results = Arc::clone(&seal_results);
				ctx.default_connector().events().subscribe(move |_value: &i32| {
					let connector = seal_ctx.default_connector();
					let mut results = results.lock().unwrap();
					results.push(seal_ctx.seal(connector).unwrap());
					results.push(seal_ctx.seal(connector).unwrap());
				});
			}))
			.unwrap()
	};

	channel.send(1);
	scheduler.run_until_idle();

	assert_eq!(*seal_results.lock().unwrap(), vec![true, false]);
}

#[test]
fn daemon_connectors_do_not_block_termination() {
	let scheduler = ManualScheduler::new(64);
	let system = ReactorSystem::with_scheduler("daemons", RuntimeConfig::default(), scheduler.clone());

	let done = Arc::new(AtomicUsize::new(0));

	let channel = {
		let done = Arc::clone(&done);
		system
			.spawn(
				Proto::<i32>::from_fn(move |ctx| {
					// A daemon connector stays open for the frame's whole life.
					let side = ctx.open_daemon::<u8>(Some("side")).unwrap();
					side.events().subscribe(|_value: &u8| {});

					let seal_ctx = ctx.clone();
					ctx.default_connector().events().subscribe(move |_value: &i32| {
						seal_ctx.seal(seal_ctx.default_connector()).unwrap();
					});
					let done = Arc::clone(&done);
					ctx.sys_events().subscribe(move |event| {
						if matches!(event, reacton_runtime::SysEvent::ReactorTerminated) {
							done.fetch_add(1, Ordering::SeqCst);
						}
					});
				})
				.with_name("daemonized"),
			)
			.unwrap()
	};

	let frame = system.registry().for_name("daemonized").frame().cloned().unwrap();
	channel.send(1);
	scheduler.run_until_idle();

	assert!(frame.has_terminated());
	assert_eq!(done.load(Ordering::SeqCst), 1);
	// Retiring the daemon binding let the slot go.
	assert!(!system.registry().contains("daemonized"));
}

#[test]
fn duplicate_reactor_names_are_rejected() {
	let scheduler = ManualScheduler::new(64);
	let system = ReactorSystem::with_scheduler("unique", RuntimeConfig::default(), scheduler.clone());

	system.spawn(Proto::<i32>::from_fn(|_ctx| {}).with_name("twin")).unwrap();
	let second = system.spawn(Proto::<i32>::from_fn(|_ctx| {}).with_name("twin"));
	assert!(matches!(second, Err(RuntimeError::ReactorExists { .. })));

	// The first registration is untouched.
	assert!(system.registry().for_name("twin").frame().is_some());
	scheduler.run_until_idle();
}

#[test]
fn connector_mutation_requires_the_executing_thread() {
	let scheduler = ManualScheduler::new(64);
	let system = ReactorSystem::with_scheduler("ownership", RuntimeConfig::default(), scheduler.clone());

	let escaped = Arc::new(Mutex::new(None));

	{
		let escaped = Arc::clone(&escaped);
		system
			.spawn(Proto::<i32>::from_fn(move |ctx| {
				*escaped.lock().unwrap() = Some(ctx.clone());
			}))
			.unwrap();
	}
	scheduler.run_until_idle();

	let ctx = escaped.lock().unwrap().take().expect("context escaped");
	// This thread is not executing the reactor.
	let open = ctx.open::<u32>(Some("outside"));
	assert!(matches!(open, Err(RuntimeError::NotOwner { .. })));
	let seal = ctx.seal(ctx.default_connector());
	assert!(matches!(seal, Err(RuntimeError::NotOwner { .. })));
}
