use crate::descriptor::BindlessResourceTable;
use crate::frame::{DeferredDestructionQueue, FrameContext, Retired};
use crate::frame_in_flight::{FrameInFlight, ResourceInFlight, SeedInFlight};
use crate::platform::FramePlatform;

/// Everything one frame in flight needs exclusively. Allocated once, reused every `frames_in_flight` frames.
pub struct FrameSlot<P: FramePlatform> {
	pub(crate) fence: P::Fence,
	/// False between resetting the fence and a successful submit, waiting on it would never return.
	pub(crate) fence_will_signal: bool,
	pub(crate) image_available: P::Semaphore,
	pub(crate) render_finished: P::Semaphore,
	pub(crate) recording: P::RecordingTarget,
	pub(crate) destruction: DeferredDestructionQueue<P>,
}

impl<P: FramePlatform> FrameSlot<P> {
	unsafe fn new(platform: &P) -> Result<Self, P::Error> {
		unsafe {
			Ok(Self {
				// signaled, so the very first wait on an unused slot returns immediately
				fence: platform.create_fence(true)?,
				fence_will_signal: true,
				image_available: platform.create_semaphore()?,
				render_finished: platform.create_semaphore()?,
				recording: platform.create_recording_target()?,
				destruction: DeferredDestructionQueue::new(),
			})
		}
	}

	#[inline]
	pub fn image_available(&self) -> &P::Semaphore {
		&self.image_available
	}

	#[inline]
	pub fn render_finished(&self) -> &P::Semaphore {
		&self.render_finished
	}

	#[inline]
	pub fn destruction_queue(&self) -> &DeferredDestructionQueue<P> {
		&self.destruction
	}

	/// Waits for the slot's last submission, returns immediately if its last submit failed.
	fn wait(&self, platform: &P) -> Result<(), P::Error> {
		if !self.fence_will_signal {
			return Ok(());
		}
		unsafe { platform.wait_for_fence(&self.fence) }
	}

	unsafe fn destroy(mut self, platform: &P) {
		unsafe {
			self.destruction.drain(platform);
			platform.destroy_recording_target(self.recording);
			platform.destroy_semaphore(self.render_finished);
			platform.destroy_semaphore(self.image_available);
			platform.destroy_fence(self.fence);
		}
	}
}

/// Ring buffer of [`FrameSlot`]s supplying the single recording target of the current frame.
///
/// A slot is only handed out again after [`Self::wait_for_current`] observed its fence signaled, so work submitted in
/// cycle `i` has completed before its slot records cycle `i + frames_in_flight`.
pub struct CommandRing<P: FramePlatform> {
	slots: ResourceInFlight<FrameSlot<P>>,
	frame_index: u32,
	/// Counts submissions, the cycle the current recording will be submitted as.
	cycle: u64,
}

impl<P: FramePlatform> CommandRing<P> {
	/// If creating any slot fails, objects of slots created so far are leaked. Failing here is fatal anyway.
	pub fn new(platform: &P, seed: SeedInFlight) -> Result<Self, P::Error> {
		Ok(Self {
			slots: ResourceInFlight::try_new(seed, |_| unsafe { FrameSlot::new(platform) })?,
			frame_index: 0,
			cycle: 0,
		})
	}

	#[inline]
	pub fn seed(&self) -> SeedInFlight {
		self.slots.seed()
	}

	#[inline]
	pub fn frame_index(&self) -> u32 {
		self.frame_index
	}

	#[inline]
	pub fn cycle(&self) -> u64 {
		self.cycle
	}

	pub fn current(&self) -> &FrameSlot<P> {
		// Safety: frame_index is always below frames_in_flight
		let fif = unsafe { FrameInFlight::new(self.seed(), self.frame_index) };
		self.slots.index(fif)
	}

	fn current_mut(&mut self) -> &mut FrameSlot<P> {
		// Safety: frame_index is always below frames_in_flight
		let fif = unsafe { FrameInFlight::new(self.seed(), self.frame_index) };
		self.slots.index_mut(fif)
	}

	/// Blocks until the GPU has finished the last submission of the current slot.
	pub fn wait_for_current(&self, platform: &P) -> Result<(), P::Error> {
		profiling::scope!("wait for GPU");
		self.current().wait(platform)
	}

	/// Resets the current slot's recording target and destroys everything retired during its previous cycle.
	///
	/// # Safety
	/// [`Self::wait_for_current`] must have returned since the slot's last submission.
	pub unsafe fn begin(&mut self, platform: &P) -> Result<(), P::Error> {
		let slot = self.current_mut();
		{
			profiling::scope!("cleanup GPU resources");
			unsafe { slot.destruction.drain(platform) };
		}
		unsafe { platform.begin_recording(&mut slot.recording) }
	}

	/// The recording target of the current slot.
	pub fn recording_target(&mut self) -> &mut P::RecordingTarget {
		&mut self.current_mut().recording
	}

	/// Transfers ownership of `retired` into the current slot's queue, it is destroyed once this cycle's submission
	/// has completed.
	pub fn destroy_after_submit(&mut self, retired: Retired<P>) {
		let cycle = self.cycle;
		self.current_mut().destruction.push(cycle, retired);
	}

	/// A [`FrameContext`] recording into the current slot.
	pub fn frame_context<'a>(
		&'a mut self,
		platform: &'a P,
		resources: &'a mut BindlessResourceTable<P>,
	) -> FrameContext<'a, P> {
		let cycle = self.cycle;
		// Safety: frame_index is always below frames_in_flight, and the lifetime prevents the index from escaping
		let fif = unsafe { FrameInFlight::new(self.seed(), self.frame_index) };
		let slot = self.slots.index_mut(fif);
		FrameContext::new(
			platform,
			fif,
			cycle,
			&mut slot.recording,
			&mut slot.destruction,
			resources,
		)
	}

	/// Ends recording and submits the current slot, signaling its fence on completion. With `present_sync` execution
	/// waits for the slot's image available semaphore and signals its render finished semaphore.
	///
	/// # Safety
	/// [`Self::begin`] must have been called for this cycle.
	pub unsafe fn submit(&mut self, platform: &P, present_sync: bool) -> Result<(), P::Error> {
		profiling::function_scope!();
		let slot = self.current_mut();
		unsafe {
			platform.end_recording(&mut slot.recording)?;
			platform.reset_fence(&slot.fence)?;
			slot.fence_will_signal = false;
			let (wait, signal) = if present_sync {
				(Some(&slot.image_available), Some(&slot.render_finished))
			} else {
				(None, None)
			};
			platform.submit(&slot.recording, wait, signal, &slot.fence)?;
		}
		slot.fence_will_signal = true;
		self.cycle += 1;
		Ok(())
	}

	/// Advances to the next slot.
	pub fn move_to_next(&mut self) {
		self.frame_index = (self.frame_index + 1) % self.seed().frames_in_flight();
	}

	pub fn reset_frame_index(&mut self) {
		self.frame_index = 0;
	}

	/// Blocks until every slot's last submission has completed.
	pub fn wait_all_idle(&self, platform: &P) -> Result<(), P::Error> {
		profiling::function_scope!();
		for slot in self.slots.iter() {
			slot.wait(platform)?;
		}
		Ok(())
	}

	/// Destroys all slots, including everything still in their deferred destruction queues.
	///
	/// # Safety
	/// The device must be idle.
	pub unsafe fn destroy(self, platform: &P) {
		for slot in self.slots.into_resources() {
			unsafe { slot.destroy(platform) };
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::platform::mock::{MockError, MockEvent, MockPlatform};
	use parking_lot::Mutex;
	use std::mem::take;
	use std::sync::Arc;

	#[test]
	fn slots_rotate_and_reset() -> anyhow::Result<()> {
		let platform = MockPlatform::new();
		let mut ring = CommandRing::new(&platform, SeedInFlight::new(3))?;
		let indices = (0..5)
			.map(|_| {
				let i = ring.frame_index();
				ring.move_to_next();
				i
			})
			.collect::<Vec<_>>();
		assert_eq!(indices, vec![0, 1, 2, 0, 1]);
		ring.reset_frame_index();
		assert_eq!(ring.frame_index(), 0);
		unsafe { ring.destroy(&platform) };
		assert_eq!(platform.alive_objects(), 0);
		Ok(())
	}

	#[test]
	fn retired_released_on_slot_reuse() -> anyhow::Result<()> {
		let platform = MockPlatform::new();
		let mut ring = CommandRing::new(&platform, SeedInFlight::new(2))?;
		let released = Arc::new(Mutex::new(Vec::new()));

		for frame in 0..4u64 {
			ring.wait_for_current(&platform)?;
			unsafe { ring.begin(&platform)? };
			// the slot was last used two frames ago
			let expected = if frame >= 2 { vec![frame - 2] } else { vec![] };
			assert_eq!(take(&mut *released.lock()), expected);

			let released = released.clone();
			ring.destroy_after_submit(Retired::custom(move |_| released.lock().push(frame)));
			assert_eq!(ring.current().destruction_queue().cycle(), Some(frame));
			unsafe { ring.submit(&platform, false)? };
			ring.move_to_next();
		}
		assert_eq!(ring.cycle(), 4);

		ring.wait_all_idle(&platform)?;
		unsafe { ring.destroy(&platform) };
		assert_eq!(take(&mut *released.lock()), vec![2, 3]);
		assert_eq!(platform.alive_objects(), 0);
		Ok(())
	}

	#[test]
	fn failed_submit_does_not_block_teardown() -> anyhow::Result<()> {
		let platform = MockPlatform::new();
		let mut ring = CommandRing::new(&platform, SeedInFlight::new(2))?;
		ring.wait_for_current(&platform)?;
		unsafe { ring.begin(&platform)? };
		platform.fail_next_submit();
		assert_eq!(unsafe { ring.submit(&platform, false) }, Err(MockError::OutOfDeviceMemory));
		assert_eq!(ring.cycle(), 0);

		// the slot is usable again once the failure passed
		ring.wait_for_current(&platform)?;
		unsafe {
			ring.begin(&platform)?;
			ring.submit(&platform, false)?;
		}
		assert_eq!(ring.cycle(), 1);

		platform.fail_next_submit();
		ring.move_to_next();
		ring.wait_for_current(&platform)?;
		unsafe { ring.begin(&platform)? };
		assert!(unsafe { ring.submit(&platform, false) }.is_err());

		ring.wait_all_idle(&platform)?;
		unsafe { ring.destroy(&platform) };
		assert_eq!(platform.alive_objects(), 0);
		Ok(())
	}

	#[test]
	fn submit_waits_on_present_semaphores() -> anyhow::Result<()> {
		let platform = MockPlatform::new();
		let mut ring = CommandRing::new(&platform, SeedInFlight::new(2))?;
		ring.wait_for_current(&platform)?;
		unsafe {
			ring.begin(&platform)?;
			ring.submit(&platform, true)?;
		}
		let submit = platform
			.take_events()
			.into_iter()
			.find_map(|e| match e {
				MockEvent::Submit { wait, signal, .. } => Some((wait, signal)),
				_ => None,
			})
			.unwrap();
		let slot = ring.current();
		assert_eq!(submit, (Some(slot.image_available().id()), Some(slot.render_finished().id())));
		ring.wait_all_idle(&platform)?;
		unsafe { ring.destroy(&platform) };
		Ok(())
	}
}
