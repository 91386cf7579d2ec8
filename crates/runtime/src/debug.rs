// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Reacton

//! Debug hooks.
//!
//! Embedders (inspectors, test harnesses) can observe reactor construction
//! and termination. Hook panics are swallowed by the caller; a misbehaving
//! inspector never takes a reactor down.

use crate::frame::Frame;

/// Observer of frame lifecycle transitions.
pub trait DebugApi: Send + Sync + 'static {
	/// A frame is about to construct its reactor.
	fn reactor_started(&self, frame: &Frame) {
		let _ = frame;
	}

	/// A frame has terminated.
	fn reactor_terminated(&self, frame: &Frame) {
		let _ = frame;
	}
}

/// Default hooks that observe nothing.
pub struct NoopDebugApi;

impl DebugApi for NoopDebugApi {}
