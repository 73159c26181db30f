use crate::backing::table::{ResourceTable, SlotAllocationError};
use crate::descriptor::{BufferUsage, StoredBuffer, StoredTexture};
use crate::handle::{Buffer, BufferHandle, Texture, TextureHandle};
use crate::platform::FramePlatform;
use std::fmt::{Debug, Formatter};

/// Default amount of slots per binding.
pub const DEFAULT_DESCRIPTOR_CAPACITY: u32 = 1024;

/// The bindings of the bindless descriptor set.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u32)]
pub enum BindlessBinding {
	UniformBuffer = 0,
	StorageBuffer = 1,
	Texture = 2,
}

impl BindlessBinding {
	pub const ALL: [BindlessBinding; 3] = [Self::UniformBuffer, Self::StorageBuffer, Self::Texture];

	#[inline]
	pub fn binding(&self) -> u32 {
		*self as u32
	}
}

/// A single descriptor update written by [`BindlessResourceTable::resolve_descriptor_table`].
pub enum DescriptorWrite<'a, P: FramePlatform> {
	UniformBuffer { index: u32, buffer: &'a P::Buffer },
	StorageBuffer { index: u32, buffer: &'a P::Buffer },
	Texture {
		index: u32,
		view: P::ImageView,
		sampler: P::Sampler,
	},
}

impl<P: FramePlatform> DescriptorWrite<'_, P> {
	pub fn binding(&self) -> BindlessBinding {
		match self {
			DescriptorWrite::UniformBuffer { .. } => BindlessBinding::UniformBuffer,
			DescriptorWrite::StorageBuffer { .. } => BindlessBinding::StorageBuffer,
			DescriptorWrite::Texture { .. } => BindlessBinding::Texture,
		}
	}

	pub fn index(&self) -> u32 {
		match self {
			DescriptorWrite::UniformBuffer { index, .. }
			| DescriptorWrite::StorageBuffer { index, .. }
			| DescriptorWrite::Texture { index, .. } => *index,
		}
	}
}

/// Result of [`BindlessResourceTable::resolve_descriptor_table`].
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ResolvedDescriptorTable {
	/// Descriptors written by this resolve.
	pub written: usize,
	/// Length of the contiguous buffer array, the same index is used in both buffer bindings.
	pub buffer_array_len: u32,
	/// Length of the contiguous texture array.
	pub texture_array_len: u32,
}

/// Registry of all buffers and textures visible to shaders through the bindless descriptor set. Shaders refer to a
/// resource by the index of its [`BufferHandle`] or [`TextureHandle`].
///
/// Only the frame loop thread may use the table. Freeing a slot does not check whether it is still referenced: the
/// caller must ensure that no pending execution uses the handle anymore, see [handle](crate::handle).
pub struct BindlessResourceTable<P: FramePlatform> {
	buffers: ResourceTable<Buffer, StoredBuffer<P::Buffer>>,
	textures: ResourceTable<Texture, StoredTexture<P::Image, P::Sampler>>,
	descriptor_set: P::DescriptorSet,
}

impl<P: FramePlatform> BindlessResourceTable<P> {
	pub fn new(platform: &P, capacity: u32) -> Result<Self, P::Error> {
		Ok(Self {
			buffers: ResourceTable::new(capacity),
			textures: ResourceTable::new(capacity),
			descriptor_set: unsafe { platform.create_descriptor_set(capacity)? },
		})
	}

	/// Takes ownership of `buffer`. It is registered in the uniform and/or storage binding, depending on `usage`.
	pub fn store_buffer(&mut self, buffer: P::Buffer, usage: BufferUsage) -> Result<BufferHandle, SlotAllocationError> {
		self.buffers.alloc_slot(StoredBuffer { buffer, usage })
	}

	/// Takes ownership of `image` and `sampler`, registering them as a combined image sampler.
	pub fn store_texture(&mut self, image: P::Image, sampler: P::Sampler) -> Result<TextureHandle, SlotAllocationError> {
		self.textures.alloc_slot(StoredTexture { image, sampler })
	}

	/// Frees the slot and returns the buffer, which should be handed to
	/// [`FrameContext::destroy_after_submit`](crate::frame::FrameContext::destroy_after_submit). Returns `None` for
	/// invalid or already freed handles.
	pub fn free_buffer(&mut self, handle: BufferHandle) -> Option<StoredBuffer<P::Buffer>> {
		self.buffers.free_slot(handle)
	}

	pub fn free_texture(&mut self, handle: TextureHandle) -> Option<StoredTexture<P::Image, P::Sampler>> {
		self.textures.free_slot(handle)
	}

	#[inline]
	pub fn buffer(&self, handle: BufferHandle) -> Option<&StoredBuffer<P::Buffer>> {
		self.buffers.get(handle)
	}

	#[inline]
	pub fn buffer_mut(&mut self, handle: BufferHandle) -> Option<&mut StoredBuffer<P::Buffer>> {
		self.buffers.get_mut(handle)
	}

	#[inline]
	pub fn texture(&self, handle: TextureHandle) -> Option<&StoredTexture<P::Image, P::Sampler>> {
		self.textures.get(handle)
	}

	#[inline]
	pub fn descriptor_set(&self) -> &P::DescriptorSet {
		&self.descriptor_set
	}

	pub fn buffer_count(&self) -> usize {
		self.buffers.len()
	}

	pub fn texture_count(&self) -> usize {
		self.textures.len()
	}

	/// Writes the descriptors of all slots stored since the last resolve into the descriptor set.
	///
	/// Freed slots are never cleared, the descriptor keeps pointing at the freed resource until the slot is reused.
	/// Pending executions may still read the old descriptor, which stays valid as long as the resource itself was
	/// retired through the deferred destruction queue.
	pub fn resolve_descriptor_table(&mut self, platform: &P) -> ResolvedDescriptorTable {
		profiling::function_scope!();
		let dirty_buffers = self.buffers.take_dirty();
		let dirty_textures = self.textures.take_dirty();

		let mut writes = Vec::new();
		for index in dirty_buffers.iter() {
			if let Some(stored) = self.buffers.get(BufferHandle::new(index)) {
				if stored.usage.contains(BufferUsage::UNIFORM_BUFFER) {
					writes.push(DescriptorWrite::UniformBuffer {
						index,
						buffer: &stored.buffer,
					});
				}
				if stored.usage.contains(BufferUsage::STORAGE_BUFFER) {
					writes.push(DescriptorWrite::StorageBuffer {
						index,
						buffer: &stored.buffer,
					});
				}
			}
		}
		for index in dirty_textures.iter() {
			if let Some(stored) = self.textures.get(TextureHandle::new(index)) {
				writes.push(DescriptorWrite::Texture {
					index,
					view: P::image_view(&stored.image),
					sampler: stored.sampler,
				});
			}
		}

		if !writes.is_empty() {
			// Safety: only slots that were just stored are written
			unsafe { platform.write_descriptors(&self.descriptor_set, &writes) };
		}
		ResolvedDescriptorTable {
			written: writes.len(),
			buffer_array_len: self.buffers.high_water_mark(),
			texture_array_len: self.textures.high_water_mark(),
		}
	}

	/// Destroys every stored resource and the descriptor set immediately.
	///
	/// # Safety
	/// The device must be idle.
	pub unsafe fn destroy(self, platform: &P) {
		let Self {
			mut buffers,
			mut textures,
			descriptor_set,
		} = self;
		unsafe {
			for stored in buffers.drain() {
				platform.destroy_buffer(stored.buffer);
			}
			for stored in textures.drain() {
				platform.destroy_image(stored.image);
				platform.destroy_sampler(stored.sampler);
			}
			platform.destroy_descriptor_set(descriptor_set);
		}
	}
}

impl<P: FramePlatform> Debug for BindlessResourceTable<P> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("BindlessResourceTable")
			.field("buffers", &self.buffers)
			.field("textures", &self.textures)
			.finish()
	}
}
