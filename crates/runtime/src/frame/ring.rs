// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Reacton

//! Unrolled FIFO ring.
//!
//! Elements live in fixed-size segments chained on a deque spine, so a
//! mostly-short queue stays in one allocation while bursts grow it in
//! segment-sized steps. Backs both the pending-connector list of a frame and
//! the default event queue.

use std::collections::VecDeque;

const SEGMENT_LEN: usize = 8;

struct Segment<T> {
	elems: [Option<T>; SEGMENT_LEN],
	start: usize,
	end: usize,
}

impl<T> Segment<T> {
	fn new() -> Self {
		Self {
			elems: std::array::from_fn(|_| None),
			start: 0,
			end: 0,
		}
	}

	fn is_full(&self) -> bool {
		self.end == SEGMENT_LEN
	}

	fn is_drained(&self) -> bool {
		self.start == self.end
	}
}

/// FIFO queue over a chain of fixed-size segments.
pub struct UnrolledRing<T> {
	segments: VecDeque<Segment<T>>,
	len: usize,
}

impl<T> UnrolledRing<T> {
	pub fn new() -> Self {
		Self {
			segments: VecDeque::new(),
			len: 0,
		}
	}

	pub fn len(&self) -> usize {
		self.len
	}

	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	/// Appends an element at the back.
	pub fn enqueue(&mut self, elem: T) {
		let needs_segment = self.segments.back().map_or(true, Segment::is_full);
		if needs_segment {
			self.segments.push_back(Segment::new());
		}
		let segment = self.segments.back_mut().unwrap();
		segment.elems[segment.end] = Some(elem);
		segment.end += 1;
		self.len += 1;
	}

	/// Removes and returns the oldest element.
	pub fn dequeue(&mut self) -> Option<T> {
		let only_segment = self.segments.len() == 1;
		let segment = self.segments.front_mut()?;
		let elem = segment.elems[segment.start].take()?;
		segment.start += 1;
		self.len -= 1;
		if segment.is_drained() {
			if only_segment {
				// Keep the single segment allocated, rewound for reuse.
				segment.start = 0;
				segment.end = 0;
			} else {
				self.segments.pop_front();
			}
		}
		Some(elem)
	}

	/// Iterates front to back without consuming.
	pub fn iter(&self) -> impl Iterator<Item = &T> {
		self.segments.iter().flat_map(|segment| {
			segment.elems[segment.start..segment.end].iter().filter_map(Option::as_ref)
		})
	}
}

impl<T> Default for UnrolledRing<T> {
	fn default() -> Self {
		Self::new()
	}
}
