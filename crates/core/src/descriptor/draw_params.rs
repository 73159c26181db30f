use crate::descriptor::BufferUsage;
use crate::frame::{FrameContext, FrameError};
use crate::frame_in_flight::{FrameInFlight, ResourceInFlight, SeedInFlight};
use crate::handle::{BufferHandle, DrawParamsHandle};
use crate::platform::FramePlatform;
use crate::upload::StagedUpload;
use rustc_hash::FxHashMap;
use thiserror::Error;

#[derive(Error)]
pub enum DrawParamsError {
	#[error("Draw params were already built")]
	AlreadyBuilt,
	#[error("{0:?} was never declared")]
	Undeclared(DrawParamsHandle),
	#[error("{size} bytes do not fit into the {block} byte block of {handle:?}")]
	TooLarge {
		handle: DrawParamsHandle,
		size: u64,
		block: u64,
	},
	#[error("{size} bytes of draw params exceed the max uniform buffer range of {limit}")]
	ExceedsUniformRange { size: u64, limit: u64 },
}

impl core::fmt::Debug for DrawParamsError {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		core::fmt::Display::fmt(self, f)
	}
}

#[inline]
fn pad_to(size: u64, alignment: u64) -> u64 {
	size.div_ceil(alignment) * alignment
}

/// Per-draw parameter blocks, packed into one uniform buffer per frame slot. A [`DrawParamsHandle`] is the byte offset
/// of its block within these buffers, which shaders use as dynamic offset.
///
/// All blocks are declared and defined up front, then [`Self::build`] uploads them once. Blocks can't be changed
/// afterward.
pub struct BindlessDrawParams<P: FramePlatform> {
	min_alignment: u64,
	max_range: u64,
	size: u64,
	block_sizes: Vec<u64>,
	handle_to_index: FxHashMap<DrawParamsHandle, usize>,
	/// `data[fif][block]`
	data: ResourceInFlight<Vec<Vec<u8>>>,
	buffers: Option<ResourceInFlight<BufferHandle>>,
	_phantom: core::marker::PhantomData<fn() -> P>,
}

impl<P: FramePlatform> BindlessDrawParams<P> {
	pub fn new(platform: &P, seed: SeedInFlight) -> Self {
		Self {
			min_alignment: unsafe { platform.min_uniform_buffer_offset_alignment() }.max(1),
			max_range: unsafe { platform.max_uniform_buffer_range() },
			size: 0,
			block_sizes: Vec::new(),
			handle_to_index: FxHashMap::default(),
			data: ResourceInFlight::new(seed, |_| Vec::new()),
			buffers: None,
			_phantom: core::marker::PhantomData,
		}
	}

	/// Reserves a zeroed block for a `T` in every frame slot.
	pub fn declare_params<T: bytemuck::Pod>(&mut self) -> Result<DrawParamsHandle, DrawParamsError> {
		self.declare_size(core::mem::size_of::<T>() as u64)
	}

	pub fn declare_size(&mut self, size: u64) -> Result<DrawParamsHandle, DrawParamsError> {
		if self.is_built() {
			return Err(DrawParamsError::AlreadyBuilt);
		}
		let handle = DrawParamsHandle::new(self.size as u32);
		let block = pad_to(size.max(1), self.min_alignment);
		self.handle_to_index.insert(handle, self.block_sizes.len());
		self.block_sizes.push(block);
		for blocks in self.data.iter_mut() {
			blocks.push(vec![0; block as usize]);
		}
		self.size += block;
		Ok(handle)
	}

	/// Writes `params` into the block of `handle`, for one frame slot or for all of them if `frame` is `None`.
	pub fn define_params<T: bytemuck::Pod>(
		&mut self,
		handle: DrawParamsHandle,
		params: &T,
		frame: Option<FrameInFlight<'_>>,
	) -> Result<(), DrawParamsError> {
		self.define_bytes(handle, bytemuck::bytes_of(params), frame)
	}

	pub fn define_bytes(
		&mut self,
		handle: DrawParamsHandle,
		bytes: &[u8],
		frame: Option<FrameInFlight<'_>>,
	) -> Result<(), DrawParamsError> {
		if self.is_built() {
			return Err(DrawParamsError::AlreadyBuilt);
		}
		let index = *self
			.handle_to_index
			.get(&handle)
			.ok_or(DrawParamsError::Undeclared(handle))?;
		let block = self.block_sizes[index];
		if bytes.len() as u64 > block {
			return Err(DrawParamsError::TooLarge {
				handle,
				size: bytes.len() as u64,
				block,
			});
		}
		match frame {
			Some(fif) => self.data.index_mut(fif)[index][..bytes.len()].copy_from_slice(bytes),
			None => {
				for blocks in self.data.iter_mut() {
					blocks[index][..bytes.len()].copy_from_slice(bytes);
				}
			}
		}
		Ok(())
	}

	/// Uploads one uniform buffer per frame slot through the context's recording target and registers them in the
	/// bindless table. Without any declared params nothing is built.
	pub fn build(&mut self, ctx: &mut FrameContext<'_, P>) -> Result<(), FrameError<P>> {
		profiling::function_scope!();
		if self.is_built() {
			return Err(DrawParamsError::AlreadyBuilt.into());
		}
		if self.block_sizes.is_empty() {
			return Ok(());
		}

		// the buffer size must be a multiple of the descriptor range
		let size = pad_to(self.size, self.range());
		if size > self.max_range {
			return Err(DrawParamsError::ExceedsUniformRange {
				size,
				limit: self.max_range,
			}
			.into());
		}
		self.size = size;
		let mut handles = Vec::new();
		for (i, blocks) in self.data.iter().enumerate() {
			let mut upload =
				StagedUpload::create(ctx.platform(), size, BufferUsage::UNIFORM_BUFFER, &format!("draw params {i}"))?;
			let mut offset = 0;
			for block in blocks {
				upload.stage_at(offset, block)?;
				offset += block.len() as u64;
			}
			handles.push(upload.finish_buffer(ctx)?);
		}
		let mut handles = handles.into_iter();
		self.buffers = Some(ResourceInFlight::new(self.data.seed(), |_| {
			handles.next().unwrap_or(BufferHandle::INVALID)
		}));
		log::debug!(
			"Built {} draw params blocks into {} byte buffers",
			self.block_sizes.len(),
			size
		);
		Ok(())
	}

	#[inline]
	pub fn is_built(&self) -> bool {
		self.buffers.is_some()
	}

	/// The uniform buffer holding the blocks of frame slot `fif`, `None` before [`Self::build`] or without params.
	pub fn buffer(&self, fif: FrameInFlight<'_>) -> Option<BufferHandle> {
		self.buffers.as_ref().map(|buffers| *buffers.index(fif))
	}

	/// Size of the largest block, the range a dynamic uniform buffer descriptor covers.
	pub fn range(&self) -> u64 {
		self.block_sizes.iter().copied().max().unwrap_or(0)
	}

	/// Total size of each per-frame buffer.
	#[inline]
	pub fn size(&self) -> u64 {
		self.size
	}

	#[inline]
	pub fn min_alignment(&self) -> u64 {
		self.min_alignment
	}

	/// Frees the buffers from the bindless table, they are destroyed once this frame's submission completed.
	pub fn release(&mut self, ctx: &mut FrameContext<'_, P>) {
		if let Some(buffers) = self.buffers.take() {
			for handle in buffers.into_resources() {
				if let Some(buffer) = ctx.resources().free_buffer(handle) {
					ctx.destroy_after_submit(buffer);
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::descriptor::BindlessResourceTable;
	use crate::frame::CommandRing;
	use crate::platform::mock::{MockConfig, MockPlatform};

	type Tint = [f32; 4];

	#[test]
	fn handles_are_aligned_offsets() -> anyhow::Result<()> {
		let platform = MockPlatform::new();
		let mut params = BindlessDrawParams::new(&platform, SeedInFlight::new(2));
		assert_eq!(params.min_alignment(), 256);
		let a = params.declare_params::<u32>()?;
		let b = params.declare_size(300)?;
		let c = params.declare_params::<Tint>()?;
		assert_eq!([a.index(), b.index(), c.index()], [0, 256, 768]);
		assert_eq!(params.range(), 512);
		Ok(())
	}

	#[test]
	fn define_rejects_misuse() -> anyhow::Result<()> {
		let platform = MockPlatform::new();
		let mut params = BindlessDrawParams::new(&platform, SeedInFlight::new(2));
		let handle = params.declare_params::<u32>()?;
		assert!(matches!(
			params.define_params(DrawParamsHandle::new(4), &1u32, None),
			Err(DrawParamsError::Undeclared(_))
		));
		assert!(matches!(
			params.define_bytes(handle, &[0; 257], None),
			Err(DrawParamsError::TooLarge { size: 257, block: 256, .. })
		));
		Ok(())
	}

	#[test]
	fn build_uploads_per_frame_blocks() -> anyhow::Result<()> {
		let platform = MockPlatform::new();
		let seed = SeedInFlight::new(2);
		let mut ring = CommandRing::new(&platform, seed)?;
		let mut table = BindlessResourceTable::new(&platform, 16)?;
		let mut params = BindlessDrawParams::new(&platform, seed);

		let shared = params.declare_params::<u32>()?;
		let tint = params.declare_params::<Tint>()?;
		params.define_params(shared, &7u32, None)?;
		let [first, second] = unsafe { [0, 1].map(|i| FrameInFlight::new(seed, i)) };
		params.define_params(tint, &[1f32; 4], Some(first))?;
		params.define_params(tint, &[2f32; 4], Some(second))?;

		ring.wait_for_current(&platform)?;
		unsafe { ring.begin(&platform)? };
		{
			let mut ctx = ring.frame_context(&platform, &mut table);
			params.build(&mut ctx)?;
		}
		unsafe { ring.submit(&platform, false)? };
		assert!(matches!(params.declare_params::<u32>(), Err(DrawParamsError::AlreadyBuilt)));
		ring.wait_all_idle(&platform)?;

		for (fif, tint) in [(first, 1f32), (second, 2f32)] {
			let handle = params.buffer(fif).unwrap();
			let contents = platform.buffer_contents(&table.buffer(handle).unwrap().buffer);
			assert_eq!(contents.len(), 512);
			assert_eq!(&contents[..4], &7u32.to_ne_bytes());
			assert_eq!(&contents[256..260], &tint.to_ne_bytes());
		}
		assert_eq!(table.buffer_count(), 2);

		unsafe {
			ring.destroy(&platform);
			table.destroy(&platform);
		}
		assert_eq!(platform.alive_objects(), 0);
		Ok(())
	}

	#[test]
	fn build_rejects_buffers_beyond_uniform_range() -> anyhow::Result<()> {
		let platform = MockPlatform::with_config(MockConfig {
			max_uniform_buffer_range: 1024,
			..MockConfig::default()
		});
		let seed = SeedInFlight::new(2);
		let mut ring = CommandRing::new(&platform, seed)?;
		let mut table = BindlessResourceTable::new(&platform, 16)?;
		let mut params = BindlessDrawParams::new(&platform, seed);
		for _ in 0..3 {
			params.declare_size(300)?;
		}

		ring.wait_for_current(&platform)?;
		unsafe { ring.begin(&platform)? };
		let result = params.build(&mut ring.frame_context(&platform, &mut table));
		assert!(matches!(
			result,
			Err(FrameError::DrawParams(DrawParamsError::ExceedsUniformRange {
				size: 1536,
				limit: 1024
			}))
		));
		assert!(!params.is_built());
		assert_eq!(table.buffer_count(), 0);

		unsafe { ring.submit(&platform, false)? };
		ring.wait_all_idle(&platform)?;
		unsafe {
			ring.destroy(&platform);
			table.destroy(&platform);
		}
		assert_eq!(platform.alive_objects(), 0);
		Ok(())
	}

	#[test]
	fn empty_builds_nothing() -> anyhow::Result<()> {
		let platform = MockPlatform::new();
		let seed = SeedInFlight::new(1);
		let mut ring = CommandRing::new(&platform, seed)?;
		let mut table = BindlessResourceTable::new(&platform, 4)?;
		let mut params = BindlessDrawParams::new(&platform, seed);
		ring.wait_for_current(&platform)?;
		unsafe { ring.begin(&platform)? };
		params.build(&mut ring.frame_context(&platform, &mut table))?;
		assert!(!params.is_built());
		assert_eq!(table.buffer_count(), 0);
		unsafe {
			ring.submit(&platform, false)?;
		}
		ring.wait_all_idle(&platform)?;
		unsafe {
			ring.destroy(&platform);
			table.destroy(&platform);
		}
		Ok(())
	}
}
