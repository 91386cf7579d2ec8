// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Reacton

//! Synchronization primitives.

pub mod monitor;

pub use monitor::Monitor;
