use crate::descriptor::BindlessResourceTable;
use crate::frame::{DeferredDestructionQueue, Retired};
use crate::frame_in_flight::FrameInFlight;
use crate::platform::FramePlatform;

/// Access to the frame slot currently being recorded, handed to [`FrameHooks`](crate::frame::FrameHooks).
pub struct FrameContext<'a, P: FramePlatform> {
	platform: &'a P,
	fif: FrameInFlight<'a>,
	cycle: u64,
	recording: &'a mut P::RecordingTarget,
	destruction: &'a mut DeferredDestructionQueue<P>,
	resources: &'a mut BindlessResourceTable<P>,
}

impl<'a, P: FramePlatform> FrameContext<'a, P> {
	pub(crate) fn new(
		platform: &'a P,
		fif: FrameInFlight<'a>,
		cycle: u64,
		recording: &'a mut P::RecordingTarget,
		destruction: &'a mut DeferredDestructionQueue<P>,
		resources: &'a mut BindlessResourceTable<P>,
	) -> Self {
		Self {
			platform,
			fif,
			cycle,
			recording,
			destruction,
			resources,
		}
	}

	#[inline]
	pub fn platform(&self) -> &'a P {
		self.platform
	}

	/// The frame slot being recorded, to index [`ResourceInFlight`](crate::frame_in_flight::ResourceInFlight)s.
	#[inline]
	pub fn frame_in_flight(&self) -> FrameInFlight<'a> {
		self.fif
	}

	/// The submission count this recording will be submitted as.
	#[inline]
	pub fn cycle(&self) -> u64 {
		self.cycle
	}

	/// The single active recording target. Commands recorded here are submitted at the end of the frame.
	#[inline]
	pub fn recording_target(&mut self) -> &mut P::RecordingTarget {
		self.recording
	}

	#[inline]
	pub fn resources(&mut self) -> &mut BindlessResourceTable<P> {
		self.resources
	}

	/// Transfers ownership of `retired` to the current slot. It is destroyed once the GPU has finished this frame's
	/// submission, which is observed when this slot is reused.
	pub fn destroy_after_submit(&mut self, retired: impl Into<Retired<P>>) {
		self.destruction.push(self.cycle, retired.into());
	}

	/// Splits the context to record commands while accessing the resource table.
	pub fn split(&mut self) -> (&'a P, &mut P::RecordingTarget, &mut BindlessResourceTable<P>) {
		(self.platform, self.recording, self.resources)
	}
}
