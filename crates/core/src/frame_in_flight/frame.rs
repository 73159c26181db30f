use crate::frame_in_flight::FRAMES_LIMIT;
use core::fmt::{Debug, Formatter};
use core::marker::PhantomData;
use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering::Relaxed;

/// Packed as `seed << 8 | (frames_in_flight - 1) << 4 | frame_index`.
type ValueType = u16;

/// The index of a frame slot that is currently being recorded. See [mod](self) for docs.
///
/// The lifetime ties the index to the scope that handed it out, so it can't be stored and used to access a slot after
/// that slot has been submitted and possibly reused.
#[derive(Copy, Clone)]
pub struct FrameInFlight<'a> {
	value: ValueType,
	phantom: PhantomData<&'a ()>,
}

impl FrameInFlight<'_> {
	/// # Safety
	/// One may not use the `FrameInFlight` to access a resource of a frame slot whose GPU work has not completed.
	#[inline]
	pub unsafe fn new(seed: impl Into<SeedInFlight>, frame_index: u32) -> Self {
		let seed = seed.into();
		assert!(
			frame_index < seed.frames_in_flight(),
			"frame_index {} out of bounds for {} frames in flight",
			frame_index,
			seed.frames_in_flight()
		);
		Self {
			value: seed.0 | (frame_index as ValueType & 0xF),
			phantom: PhantomData,
		}
	}

	#[inline]
	pub fn frame_index(&self) -> usize {
		(self.value & 0xF) as usize
	}

	#[inline]
	pub fn seed(&self) -> SeedInFlight {
		SeedInFlight(self.value & 0xFFF0)
	}
}

impl Debug for FrameInFlight<'_> {
	fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("FrameInFlight")
			.field("seed", &self.seed().seed_u8())
			.field("frames_in_flight", &self.seed().frames_in_flight())
			.field("frame_index", &self.frame_index())
			.finish()
	}
}

impl From<FrameInFlight<'_>> for usize {
	fn from(value: FrameInFlight) -> Self {
		value.frame_index()
	}
}

impl From<&FrameInFlight<'_>> for SeedInFlight {
	fn from(value: &FrameInFlight<'_>) -> Self {
		value.seed()
	}
}

/// The configuration of the frame in flight system. See [mod](self) for docs.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct SeedInFlight(ValueType);

impl SeedInFlight {
	#[must_use]
	pub fn new(frames_in_flight: u32) -> Self {
		static SEED_CNT: AtomicU8 = AtomicU8::new(42);
		let seed = SEED_CNT.fetch_add(1, Relaxed);
		// SAFETY: the counter wraps, a seed is distinct among the last 256 seeds handed out
		unsafe { Self::assemble(seed, frames_in_flight) }
	}

	/// # Safety
	/// The seed must differ from every other seed whose frames are still in use. `Self::new()` only hands out the
	/// same seed again after 256 others.
	#[must_use]
	pub unsafe fn assemble(seed: u8, frames_in_flight: u32) -> Self {
		assert_ne!(frames_in_flight, 0, "frames_in_flight must not be 0");
		assert!(
			frames_in_flight <= FRAMES_LIMIT,
			"frames_in_flight of {} is over FRAMES_LIMIT {}",
			frames_in_flight,
			FRAMES_LIMIT
		);
		Self(((seed as ValueType) << 8) | (((frames_in_flight - 1) as ValueType & 0xF) << 4))
	}

	/// Iterates all frame slots of this seed.
	///
	/// # Safety
	/// The returned `FrameInFlight`s may access resources that are in use right now.
	pub unsafe fn iter(&self) -> impl Iterator<Item = FrameInFlight<'static>> {
		let seed = *self;
		(0..self.frames_in_flight()).map(move |frame| unsafe { FrameInFlight::new(seed, frame) })
	}

	#[must_use]
	#[inline]
	pub fn frames_in_flight(&self) -> u32 {
		((self.0 >> 4) & 0xF) as u32 + 1
	}

	#[inline]
	fn seed_u8(&self) -> u8 {
		(self.0 >> 8) as u8
	}
}

impl Debug for SeedInFlight {
	fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("SeedInFlight")
			.field("seed", &self.seed_u8())
			.field("frames_in_flight", &self.frames_in_flight())
			.finish()
	}
}
