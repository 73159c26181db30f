use crate::descriptor::{StoredBuffer, StoredTexture};
use crate::platform::FramePlatform;
use std::collections::VecDeque;
use std::fmt::{Debug, Formatter};

/// A resource whose release has been deferred until the GPU is done with it.
pub enum Retired<P: FramePlatform> {
	Buffer(P::Buffer),
	Image(P::Image),
	Sampler(P::Sampler),
	Texture(StoredTexture<P::Image, P::Sampler>),
	/// Anything else, released by the closure.
	Custom(Box<dyn FnOnce(&P) + Send>),
}

impl<P: FramePlatform> Retired<P> {
	pub fn custom(f: impl FnOnce(&P) + Send + 'static) -> Self {
		Self::Custom(Box::new(f))
	}

	/// # Safety
	/// No pending execution may access the resource.
	pub unsafe fn destroy(self, platform: &P) {
		unsafe {
			match self {
				Retired::Buffer(buffer) => platform.destroy_buffer(buffer),
				Retired::Image(image) => platform.destroy_image(image),
				Retired::Sampler(sampler) => platform.destroy_sampler(sampler),
				Retired::Texture(texture) => {
					platform.destroy_image(texture.image);
					platform.destroy_sampler(texture.sampler);
				}
				Retired::Custom(f) => f(platform),
			}
		}
	}
}

impl<P: FramePlatform> From<StoredBuffer<P::Buffer>> for Retired<P> {
	fn from(value: StoredBuffer<P::Buffer>) -> Self {
		Retired::Buffer(value.buffer)
	}
}

impl<P: FramePlatform> From<StoredTexture<P::Image, P::Sampler>> for Retired<P> {
	fn from(value: StoredTexture<P::Image, P::Sampler>) -> Self {
		Retired::Texture(value)
	}
}

impl<P: FramePlatform> Debug for Retired<P> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(match self {
			Retired::Buffer(_) => "Retired::Buffer",
			Retired::Image(_) => "Retired::Image",
			Retired::Sampler(_) => "Retired::Sampler",
			Retired::Texture(_) => "Retired::Texture",
			Retired::Custom(_) => "Retired::Custom",
		})
	}
}

/// FIFO of resources retired during one cycle of a frame slot. The queue is drained once the slot's fence has
/// signaled, right before the slot records its next cycle, so it never holds entries of more than one cycle.
pub struct DeferredDestructionQueue<P: FramePlatform> {
	queue: VecDeque<Retired<P>>,
	cycle: u64,
}

impl<P: FramePlatform> DeferredDestructionQueue<P> {
	pub fn new() -> Self {
		Self {
			queue: VecDeque::new(),
			cycle: 0,
		}
	}

	/// Registers `retired` to be destroyed once the submission of `cycle` has completed.
	///
	/// # Panics
	/// If the queue still holds entries of a different cycle, meaning it was not drained before the slot was reused.
	pub fn push(&mut self, cycle: u64, retired: Retired<P>) {
		if self.queue.is_empty() {
			self.cycle = cycle;
		} else {
			assert_eq!(
				self.cycle, cycle,
				"deferred destruction queue holds entries of cycle {} while registering for cycle {}",
				self.cycle, cycle
			);
		}
		self.queue.push_back(retired);
	}

	/// Destroys all entries in registration order, returns how many were destroyed.
	///
	/// # Safety
	/// The fence of the submission the entries were registered against must have signaled.
	pub unsafe fn drain(&mut self, platform: &P) -> usize {
		let count = self.queue.len();
		if count != 0 {
			log::trace!("destroying {} resources retired in cycle {}", count, self.cycle);
		}
		while let Some(retired) = self.queue.pop_front() {
			unsafe { retired.destroy(platform) };
		}
		count
	}

	#[inline]
	pub fn len(&self) -> usize {
		self.queue.len()
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.queue.is_empty()
	}

	/// The cycle all entries were registered in, `None` if empty.
	pub fn cycle(&self) -> Option<u64> {
		(!self.queue.is_empty()).then_some(self.cycle)
	}
}

impl<P: FramePlatform> Default for DeferredDestructionQueue<P> {
	fn default() -> Self {
		Self::new()
	}
}

impl<P: FramePlatform> Debug for DeferredDestructionQueue<P> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DeferredDestructionQueue")
			.field("len", &self.queue.len())
			.field("cycle", &self.cycle())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::descriptor::{BufferCreateInfo, BufferUsage};
	use crate::platform::mock::{MockEvent, MockPlatform};
	use std::sync::atomic::{AtomicU32, Ordering::Relaxed};
	use std::sync::Arc;

	fn buffer(platform: &MockPlatform) -> anyhow::Result<<MockPlatform as FramePlatform>::Buffer> {
		Ok(unsafe {
			platform.alloc_buffer(&BufferCreateInfo {
				size: 16,
				usage: BufferUsage::STORAGE_BUFFER,
				name: "retired",
				..BufferCreateInfo::default()
			})?
		})
	}

	#[test]
	fn drain_is_fifo() -> anyhow::Result<()> {
		let platform = MockPlatform::new();
		let mut queue = DeferredDestructionQueue::new();
		let buffers = [buffer(&platform)?, buffer(&platform)?, buffer(&platform)?];
		let ids = buffers.iter().map(|b| b.id()).collect::<Vec<_>>();
		for b in buffers {
			queue.push(7, Retired::Buffer(b));
		}
		assert_eq!(queue.cycle(), Some(7));
		platform.take_events();

		assert_eq!(unsafe { queue.drain(&platform) }, 3);
		let destroyed = platform
			.take_events()
			.into_iter()
			.filter_map(|e| match e {
				MockEvent::BufferDestroyed { buffer } => Some(buffer),
				_ => None,
			})
			.collect::<Vec<_>>();
		assert_eq!(destroyed, ids);
		assert!(queue.is_empty());
		assert_eq!(queue.cycle(), None);
		Ok(())
	}

	#[test]
	fn drain_empty_is_noop() {
		let platform = MockPlatform::new();
		let mut queue = DeferredDestructionQueue::<MockPlatform>::new();
		assert_eq!(unsafe { queue.drain(&platform) }, 0);
		assert!(platform.take_events().is_empty());
	}

	#[test]
	fn custom_runs_on_drain() {
		let platform = MockPlatform::new();
		let counter = Arc::new(AtomicU32::new(0));
		let mut queue = DeferredDestructionQueue::new();
		let c = counter.clone();
		queue.push(
			1,
			Retired::custom(move |_| {
				c.fetch_add(1, Relaxed);
			}),
		);
		assert_eq!(counter.load(Relaxed), 0);
		unsafe { queue.drain(&platform) };
		assert_eq!(counter.load(Relaxed), 1);
	}

	#[test]
	#[should_panic(expected = "holds entries of cycle")]
	fn entries_of_two_cycles_panic() {
		let mut queue = DeferredDestructionQueue::<MockPlatform>::new();
		queue.push(1, Retired::custom(|_| ()));
		queue.push(2, Retired::custom(|_| ()));
	}
}
