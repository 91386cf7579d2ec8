// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Reacton

use std::{any::Any, fmt, sync::Arc};

/// Convenience alias used across the runtime.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// A panic captured at the frame boundary, reduced to a cloneable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
	message: Arc<str>,
}

impl Failure {
	pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
		let message: Arc<str> = if let Some(s) = payload.downcast_ref::<&'static str>() {
			(*s).into()
		} else if let Some(s) = payload.downcast_ref::<String>() {
			s.as_str().into()
		} else {
			"reactor panicked".into()
		};
		Self {
			message,
		}
	}

	pub fn message(&self) -> &str {
		&self.message
	}
}

impl fmt::Display for Failure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.message)
	}
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
	#[error("channel name `{channel}` is already in use by reactor `{reactor}`")]
	NameInUse {
		reactor: String,
		channel: String,
	},

	#[error("reactor name `{name}` is already registered")]
	ReactorExists {
		name: String,
	},

	#[error("reactor `{name}` has terminated")]
	FrameTerminated {
		name: String,
	},

	#[error("nested batch execution: this thread is already running reactor `{current}`")]
	NestedExecution {
		current: String,
	},

	#[error("`{operation}` may only be called from the thread executing reactor `{name}`")]
	NotOwner {
		name: String,
		operation: &'static str,
	},

	#[error("reactor `{name}` died: {failure}")]
	ReactorDied {
		name: String,
		failure: Failure,
	},
}
