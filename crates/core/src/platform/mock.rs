//! An in-memory [`FramePlatform`] to test the frame pipeline without a GPU.
//!
//! Submissions stay pending until their fence is waited on, which completes them in submission order and executes
//! their recorded copies. Every call is recorded as a [`MockEvent`]. Violations of the synchronization rules, like
//! destroying a buffer a pending submission still reads from, panic.

use crate::descriptor::{
	BindlessBinding, BufferCreateInfo, BufferUsage, ColorSpace, DescriptorWrite, Extent, Format, ImageCreateInfo,
	SampleCount, SamplerCreateInfo,
};
use crate::platform::{AcquireOutcome, FramePlatform, PresentOutcome, SurfaceSupport, SwapchainCreateInfo};
use ash::vk::{PresentModeKHR, SurfaceCapabilitiesKHR, SurfaceFormatKHR, SurfaceTransformFlagsKHR};
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct MockConfig {
	pub surface_support: SurfaceSupport,
	pub min_uniform_buffer_offset_alignment: u64,
	pub max_sample_count: SampleCount,
	pub max_descriptor_capacity: u32,
	pub max_uniform_buffer_range: u64,
	pub depth_format: Format,
}

impl Default for MockConfig {
	fn default() -> Self {
		Self {
			surface_support: SurfaceSupport {
				capabilities: SurfaceCapabilitiesKHR {
					min_image_count: 2,
					max_image_count: 8,
					current_extent: Extent {
						width: 800,
						height: 600,
					},
					min_image_extent: Extent { width: 1, height: 1 },
					max_image_extent: Extent {
						width: 4096,
						height: 4096,
					},
					max_image_array_layers: 1,
					current_transform: SurfaceTransformFlagsKHR::IDENTITY,
					..SurfaceCapabilitiesKHR::default()
				},
				formats: vec![
					SurfaceFormatKHR {
						format: Format::B8G8R8A8_UNORM,
						color_space: ColorSpace::SRGB_NONLINEAR,
					},
					SurfaceFormatKHR {
						format: Format::R8G8B8A8_SRGB,
						color_space: ColorSpace::SRGB_NONLINEAR,
					},
				],
				present_modes: vec![PresentModeKHR::FIFO, PresentModeKHR::MAILBOX],
			},
			min_uniform_buffer_offset_alignment: 256,
			max_sample_count: SampleCount::Sample8,
			max_descriptor_capacity: 500_000,
			max_uniform_buffer_range: 65536,
			depth_format: Format::D32_SFLOAT,
		}
	}
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum MockError {
	#[error("Device lost")]
	DeviceLost,
	#[error("Out of device memory")]
	OutOfDeviceMemory,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MockEvent {
	BufferCreated {
		buffer: u64,
		size: u64,
	},
	BufferDestroyed {
		buffer: u64,
	},
	ImageCreated {
		image: u64,
	},
	ImageDestroyed {
		image: u64,
	},
	SamplerDestroyed {
		sampler: u64,
	},
	Submit {
		submission: u64,
		fence: u64,
		wait: Option<u64>,
		signal: Option<u64>,
	},
	/// A submission finished executing, emitted while waiting on a fence.
	SubmissionCompleted {
		submission: u64,
		fence: u64,
	},
	FenceWait {
		fence: u64,
	},
	FenceReset {
		fence: u64,
	},
	WaitIdle,
	SwapchainCreated {
		swapchain: u64,
		extent: Extent,
		image_count: u32,
		format: Format,
		present_mode: PresentModeKHR,
		old: Option<u64>,
	},
	SwapchainDestroyed {
		swapchain: u64,
	},
	Acquire {
		swapchain: u64,
		outcome: AcquireOutcome,
	},
	Present {
		swapchain: u64,
		image_index: u32,
		wait: u64,
		outcome: PresentOutcome,
	},
}

impl MockEvent {
	pub fn is_destroy(&self) -> bool {
		matches!(
			self,
			MockEvent::BufferDestroyed { .. }
				| MockEvent::ImageDestroyed { .. }
				| MockEvent::SamplerDestroyed { .. }
				| MockEvent::SwapchainDestroyed { .. }
		)
	}
}

/// A descriptor written into the mock descriptor set.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MockDescriptorWrite {
	pub binding: BindlessBinding,
	pub index: u32,
	/// Id of the buffer or image the descriptor points at.
	pub resource: u64,
}

/// Heap memory shared between a resource and the copies recorded against it.
struct MockMemory {
	ptr: *mut u8,
	len: usize,
}

// Safety: plain heap memory, accesses are ordered by the platform's state lock or the buffer's exclusive borrow
unsafe impl Send for MockMemory {}
unsafe impl Sync for MockMemory {}

impl MockMemory {
	fn new(len: usize) -> Arc<Self> {
		let bytes = vec![0u8; len].into_boxed_slice();
		Arc::new(Self {
			len: bytes.len(),
			ptr: Box::into_raw(bytes) as *mut u8,
		})
	}

	fn read(&self) -> Vec<u8> {
		unsafe { std::slice::from_raw_parts(self.ptr, self.len).to_vec() }
	}

	unsafe fn copy_to(&self, dst: &MockMemory, size: usize) {
		let size = size.min(self.len).min(dst.len);
		unsafe { std::ptr::copy(self.ptr, dst.ptr, size) }
	}
}

impl Drop for MockMemory {
	fn drop(&mut self) {
		unsafe { drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(self.ptr, self.len))) }
	}
}

/// The mapping of a host visible [`MockBuffer`].
pub struct MockSlab {
	memory: Arc<MockMemory>,
}

unsafe impl presser::Slab for MockSlab {
	fn base_ptr(&self) -> *const u8 {
		self.memory.ptr
	}

	fn base_ptr_mut(&mut self) -> *mut u8 {
		self.memory.ptr
	}

	fn size(&self) -> usize {
		self.memory.len
	}
}

pub struct MockBuffer {
	id: u64,
	usage: BufferUsage,
	slab: MockSlab,
}

impl MockBuffer {
	#[inline]
	pub fn id(&self) -> u64 {
		self.id
	}

	#[inline]
	pub fn usage(&self) -> BufferUsage {
		self.usage
	}

	#[inline]
	pub fn size(&self) -> usize {
		self.slab.memory.len
	}
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct MockImageView(pub u64);

pub struct MockImage {
	id: u64,
	create_info: MockImageInfo,
	memory: Arc<MockMemory>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MockImageInfo {
	pub format: Format,
	pub extent: Extent,
	pub samples: SampleCount,
	pub mip_levels: u32,
}

impl MockImage {
	#[inline]
	pub fn id(&self) -> u64 {
		self.id
	}

	#[inline]
	pub fn info(&self) -> MockImageInfo {
		self.create_info
	}
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct MockSampler(pub u64);

pub struct MockFence {
	id: u64,
}

impl MockFence {
	#[inline]
	pub fn id(&self) -> u64 {
		self.id
	}
}

pub struct MockSemaphore {
	id: u64,
}

impl MockSemaphore {
	#[inline]
	pub fn id(&self) -> u64 {
		self.id
	}
}

#[derive(Clone)]
enum MockCommand {
	Copy {
		src: u64,
		dst: u64,
		src_memory: Arc<MockMemory>,
		dst_memory: Arc<MockMemory>,
		size: usize,
	},
}

pub struct MockRecordingTarget {
	id: u64,
	recording: bool,
	commands: Vec<MockCommand>,
}

impl MockRecordingTarget {
	#[inline]
	pub fn id(&self) -> u64 {
		self.id
	}

	/// Amount of commands recorded since recording began.
	#[inline]
	pub fn command_count(&self) -> usize {
		self.commands.len()
	}

	fn record(&mut self, command: MockCommand) {
		assert!(self.recording, "recording target {} is not recording", self.id);
		self.commands.push(command);
	}
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct MockSurface(pub u64);

pub struct MockSwapchain {
	id: u64,
	create_info: SwapchainCreateInfo,
	image_views: Vec<MockImageView>,
}

impl MockSwapchain {
	#[inline]
	pub fn id(&self) -> u64 {
		self.id
	}

	#[inline]
	pub fn create_info(&self) -> &SwapchainCreateInfo {
		&self.create_info
	}
}

pub struct MockDescriptorSet {
	id: u64,
	capacity: u32,
}

impl MockDescriptorSet {
	#[inline]
	pub fn capacity(&self) -> u32 {
		self.capacity
	}
}

struct PendingSubmission {
	submission: u64,
	target: u64,
	fence: u64,
	commands: Vec<MockCommand>,
}

impl PendingSubmission {
	fn references(&self, resource: u64) -> bool {
		self.commands.iter().any(|c| match c {
			MockCommand::Copy { src, dst, .. } => *src == resource || *dst == resource,
		})
	}
}

#[derive(Default)]
struct MockState {
	next_id: u64,
	next_submission: u64,
	alive: FxHashSet<u64>,
	signaled_fences: FxHashSet<u64>,
	pending: VecDeque<PendingSubmission>,
	events: Vec<MockEvent>,
	descriptor_writes: Vec<MockDescriptorWrite>,
	acquire_script: VecDeque<AcquireOutcome>,
	present_script: VecDeque<PresentOutcome>,
	next_image: FxHashMap<u64, u32>,
	device_lost: bool,
	fail_next_submit: bool,
}

impl MockState {
	fn create(&mut self) -> u64 {
		let id = self.next_id;
		self.next_id += 1;
		self.alive.insert(id);
		id
	}

	fn destroy(&mut self, id: u64, kind: &str) {
		assert!(self.alive.remove(&id), "{} {} destroyed twice or never created", kind, id);
		if let Some(pending) = self.pending.iter().find(|p| p.references(id)) {
			panic!(
				"{} {} destroyed while submission {} referencing it is still pending",
				kind, id, pending.submission
			);
		}
	}

	fn check_device(&self) -> Result<(), MockError> {
		if self.device_lost {
			Err(MockError::DeviceLost)
		} else {
			Ok(())
		}
	}

	/// Completes the first `count` pending submissions in submission order.
	fn complete(&mut self, count: usize) {
		for pending in self.pending.drain(..count).collect::<Vec<_>>() {
			for command in &pending.commands {
				match command {
					MockCommand::Copy {
						src_memory,
						dst_memory,
						size,
						..
					} => unsafe { src_memory.copy_to(dst_memory, *size) },
				}
			}
			self.signaled_fences.insert(pending.fence);
			self.events.push(MockEvent::SubmissionCompleted {
				submission: pending.submission,
				fence: pending.fence,
			});
		}
	}
}

/// See [mod](self).
pub struct MockPlatform {
	config: Mutex<MockConfig>,
	state: Mutex<MockState>,
}

impl MockPlatform {
	pub fn new() -> Self {
		Self::with_config(MockConfig::default())
	}

	pub fn with_config(config: MockConfig) -> Self {
		Self {
			config: Mutex::new(config),
			state: Mutex::new(MockState::default()),
		}
	}

	/// A surface to create swapchains for, surfaces are not tracked as objects.
	pub fn create_surface(&self) -> MockSurface {
		let mut state = self.state.lock();
		let id = state.next_id;
		state.next_id += 1;
		MockSurface(id)
	}

	/// Changes what the surface reports, like a window being resized.
	pub fn set_surface_extent(&self, extent: Extent) {
		self.config.lock().surface_support.capabilities.current_extent = extent;
	}

	pub fn set_surface_support(&self, support: SurfaceSupport) {
		self.config.lock().surface_support = support;
	}

	/// The outcome of the next acquire. Without a scripted outcome images are acquired round-robin.
	pub fn push_acquire_outcome(&self, outcome: AcquireOutcome) {
		self.state.lock().acquire_script.push_back(outcome);
	}

	/// The outcome of the next present, [`PresentOutcome::Optimal`] if none is scripted.
	pub fn push_present_outcome(&self, outcome: PresentOutcome) {
		self.state.lock().present_script.push_back(outcome);
	}

	/// Every following fallible call fails with [`MockError::DeviceLost`]. Pending submissions are dropped without
	/// executing, after which their objects may be destroyed.
	pub fn set_device_lost(&self) {
		let mut state = self.state.lock();
		state.device_lost = true;
		state.pending.clear();
	}

	/// The next submit fails with [`MockError::OutOfDeviceMemory`] without being queued. Nothing else fails.
	pub fn fail_next_submit(&self) {
		self.state.lock().fail_next_submit = true;
	}

	pub fn take_events(&self) -> Vec<MockEvent> {
		std::mem::take(&mut self.state.lock().events)
	}

	pub fn events(&self) -> Vec<MockEvent> {
		self.state.lock().events.clone()
	}

	pub fn take_descriptor_writes(&self) -> Vec<MockDescriptorWrite> {
		std::mem::take(&mut self.state.lock().descriptor_writes)
	}

	/// Amount of objects created and not yet destroyed.
	pub fn alive_objects(&self) -> usize {
		self.state.lock().alive.len()
	}

	/// Amount of submissions that have not completed yet.
	pub fn pending_submissions(&self) -> usize {
		self.state.lock().pending.len()
	}

	pub fn buffer_contents(&self, buffer: &MockBuffer) -> Vec<u8> {
		// lock to order against copies executed by fence waits
		let _state = self.state.lock();
		buffer.slab.memory.read()
	}

	pub fn image_contents(&self, image: &MockImage) -> Vec<u8> {
		let _state = self.state.lock();
		image.memory.read()
	}
}

impl Default for MockPlatform {
	fn default() -> Self {
		Self::new()
	}
}

fn texel_bytes(format: Format) -> usize {
	crate::upload::texel_size(format).unwrap_or(4) as usize
}

unsafe impl FramePlatform for MockPlatform {
	type Error = MockError;
	type Buffer = MockBuffer;
	type Image = MockImage;
	type ImageView = MockImageView;
	type Sampler = MockSampler;
	type Fence = MockFence;
	type Semaphore = MockSemaphore;
	type RecordingTarget = MockRecordingTarget;
	type Surface = MockSurface;
	type Swapchain = MockSwapchain;
	type DescriptorSet = MockDescriptorSet;

	unsafe fn create_fence(&self, signaled: bool) -> Result<Self::Fence, Self::Error> {
		let mut state = self.state.lock();
		let id = state.create();
		if signaled {
			state.signaled_fences.insert(id);
		}
		Ok(MockFence { id })
	}

	unsafe fn wait_for_fence(&self, fence: &Self::Fence) -> Result<(), Self::Error> {
		let mut state = self.state.lock();
		state.check_device()?;
		state.events.push(MockEvent::FenceWait { fence: fence.id });
		if let Some(position) = state.pending.iter().position(|p| p.fence == fence.id) {
			state.complete(position + 1);
		}
		assert!(
			state.signaled_fences.contains(&fence.id),
			"waiting on fence {} which no pending submission will ever signal",
			fence.id
		);
		Ok(())
	}

	unsafe fn reset_fence(&self, fence: &Self::Fence) -> Result<(), Self::Error> {
		let mut state = self.state.lock();
		state.check_device()?;
		assert!(
			!state.pending.iter().any(|p| p.fence == fence.id),
			"fence {} reset while its submission is pending",
			fence.id
		);
		state.signaled_fences.remove(&fence.id);
		state.events.push(MockEvent::FenceReset { fence: fence.id });
		Ok(())
	}

	unsafe fn destroy_fence(&self, fence: Self::Fence) {
		let mut state = self.state.lock();
		assert!(
			!state.pending.iter().any(|p| p.fence == fence.id),
			"fence {} destroyed while its submission is pending",
			fence.id
		);
		state.destroy(fence.id, "fence");
		state.signaled_fences.remove(&fence.id);
	}

	unsafe fn create_semaphore(&self) -> Result<Self::Semaphore, Self::Error> {
		Ok(MockSemaphore {
			id: self.state.lock().create(),
		})
	}

	unsafe fn destroy_semaphore(&self, semaphore: Self::Semaphore) {
		self.state.lock().destroy(semaphore.id, "semaphore");
	}

	unsafe fn wait_idle(&self) -> Result<(), Self::Error> {
		let mut state = self.state.lock();
		state.check_device()?;
		state.events.push(MockEvent::WaitIdle);
		let count = state.pending.len();
		state.complete(count);
		Ok(())
	}

	unsafe fn create_recording_target(&self) -> Result<Self::RecordingTarget, Self::Error> {
		Ok(MockRecordingTarget {
			id: self.state.lock().create(),
			recording: false,
			commands: Vec::new(),
		})
	}

	unsafe fn begin_recording(&self, target: &mut Self::RecordingTarget) -> Result<(), Self::Error> {
		let state = self.state.lock();
		state.check_device()?;
		assert!(
			!state.pending.iter().any(|p| p.target == target.id),
			"recording target {} reset while its submission is pending",
			target.id
		);
		target.commands.clear();
		target.recording = true;
		Ok(())
	}

	unsafe fn end_recording(&self, target: &mut Self::RecordingTarget) -> Result<(), Self::Error> {
		assert!(target.recording, "recording target {} ended without begin", target.id);
		target.recording = false;
		Ok(())
	}

	unsafe fn submit(
		&self,
		target: &Self::RecordingTarget,
		wait: Option<&Self::Semaphore>,
		signal: Option<&Self::Semaphore>,
		fence: &Self::Fence,
	) -> Result<(), Self::Error> {
		let mut state = self.state.lock();
		state.check_device()?;
		if std::mem::take(&mut state.fail_next_submit) {
			return Err(MockError::OutOfDeviceMemory);
		}
		assert!(!target.recording, "recording target {} submitted while recording", target.id);
		assert!(
			!state.signaled_fences.contains(&fence.id),
			"submitted with fence {} still signaled",
			fence.id
		);
		assert!(
			!state.pending.iter().any(|p| p.fence == fence.id),
			"fence {} is already used by a pending submission",
			fence.id
		);
		let submission = state.next_submission;
		state.next_submission += 1;
		state.pending.push_back(PendingSubmission {
			submission,
			target: target.id,
			fence: fence.id,
			commands: target.commands.clone(),
		});
		state.events.push(MockEvent::Submit {
			submission,
			fence: fence.id,
			wait: wait.map(|s| s.id),
			signal: signal.map(|s| s.id),
		});
		Ok(())
	}

	unsafe fn destroy_recording_target(&self, target: Self::RecordingTarget) {
		let mut state = self.state.lock();
		assert!(
			!state.pending.iter().any(|p| p.target == target.id),
			"recording target {} destroyed while its submission is pending",
			target.id
		);
		state.destroy(target.id, "recording target");
	}

	unsafe fn alloc_buffer(&self, create_info: &BufferCreateInfo) -> Result<Self::Buffer, Self::Error> {
		let mut state = self.state.lock();
		state.check_device()?;
		let id = state.create();
		state.events.push(MockEvent::BufferCreated {
			buffer: id,
			size: create_info.size,
		});
		Ok(MockBuffer {
			id,
			usage: create_info.usage,
			slab: MockSlab {
				memory: MockMemory::new(create_info.size as usize),
			},
		})
	}

	unsafe fn mapped_buffer_to_slab(buffer: &mut Self::Buffer) -> Option<&mut (impl presser::Slab + '_)> {
		if buffer.usage.is_mappable() {
			Some(&mut buffer.slab)
		} else {
			None
		}
	}

	unsafe fn cmd_copy_buffer(
		&self,
		target: &mut Self::RecordingTarget,
		src: &Self::Buffer,
		dst: &Self::Buffer,
		size: u64,
	) {
		assert!(src.usage.contains(BufferUsage::TRANSFER_SRC), "copy source lacks TRANSFER_SRC");
		assert!(dst.usage.contains(BufferUsage::TRANSFER_DST), "copy destination lacks TRANSFER_DST");
		target.record(MockCommand::Copy {
			src: src.id,
			dst: dst.id,
			src_memory: src.slab.memory.clone(),
			dst_memory: dst.slab.memory.clone(),
			size: size as usize,
		});
	}

	unsafe fn cmd_copy_buffer_to_image(
		&self,
		target: &mut Self::RecordingTarget,
		src: &Self::Buffer,
		dst: &Self::Image,
		extent: Extent,
	) {
		let size = extent.width as usize * extent.height as usize * texel_bytes(dst.create_info.format);
		target.record(MockCommand::Copy {
			src: src.id,
			dst: dst.id,
			src_memory: src.slab.memory.clone(),
			dst_memory: dst.memory.clone(),
			size,
		});
	}

	unsafe fn destroy_buffer(&self, buffer: Self::Buffer) {
		let mut state = self.state.lock();
		state.destroy(buffer.id, "buffer");
		state.events.push(MockEvent::BufferDestroyed { buffer: buffer.id });
	}

	unsafe fn alloc_image(&self, create_info: &ImageCreateInfo) -> Result<Self::Image, Self::Error> {
		let mut state = self.state.lock();
		state.check_device()?;
		let id = state.create();
		state.events.push(MockEvent::ImageCreated { image: id });
		let extent = create_info.extent;
		let len = extent.width as usize * extent.height as usize * texel_bytes(create_info.format);
		Ok(MockImage {
			id,
			create_info: MockImageInfo {
				format: create_info.format,
				extent,
				samples: create_info.samples,
				mip_levels: create_info.mip_levels,
			},
			memory: MockMemory::new(len),
		})
	}

	fn image_view(image: &Self::Image) -> Self::ImageView {
		MockImageView(image.id)
	}

	unsafe fn destroy_image(&self, image: Self::Image) {
		let mut state = self.state.lock();
		state.destroy(image.id, "image");
		state.events.push(MockEvent::ImageDestroyed { image: image.id });
	}

	unsafe fn create_sampler(&self, _create_info: &SamplerCreateInfo) -> Result<Self::Sampler, Self::Error> {
		let mut state = self.state.lock();
		state.check_device()?;
		Ok(MockSampler(state.create()))
	}

	unsafe fn destroy_sampler(&self, sampler: Self::Sampler) {
		let mut state = self.state.lock();
		state.destroy(sampler.0, "sampler");
		state.events.push(MockEvent::SamplerDestroyed { sampler: sampler.0 });
	}

	unsafe fn create_descriptor_set(&self, capacity: u32) -> Result<Self::DescriptorSet, Self::Error> {
		Ok(MockDescriptorSet {
			id: self.state.lock().create(),
			capacity,
		})
	}

	unsafe fn write_descriptors(&self, set: &Self::DescriptorSet, writes: &[DescriptorWrite<'_, Self>]) {
		let mut state = self.state.lock();
		for write in writes {
			assert!(
				write.index() < set.capacity,
				"descriptor index {} exceeds capacity {}",
				write.index(),
				set.capacity
			);
			let resource = match write {
				DescriptorWrite::UniformBuffer { buffer, .. } | DescriptorWrite::StorageBuffer { buffer, .. } => {
					buffer.id
				}
				DescriptorWrite::Texture { view, .. } => view.0,
			};
			state.descriptor_writes.push(MockDescriptorWrite {
				binding: write.binding(),
				index: write.index(),
				resource,
			});
		}
	}

	unsafe fn destroy_descriptor_set(&self, set: Self::DescriptorSet) {
		self.state.lock().destroy(set.id, "descriptor set");
	}

	unsafe fn min_uniform_buffer_offset_alignment(&self) -> u64 {
		self.config.lock().min_uniform_buffer_offset_alignment
	}

	unsafe fn max_sample_count(&self) -> SampleCount {
		self.config.lock().max_sample_count
	}

	unsafe fn max_descriptor_capacity(&self) -> u32 {
		self.config.lock().max_descriptor_capacity
	}

	unsafe fn max_uniform_buffer_range(&self) -> u64 {
		self.config.lock().max_uniform_buffer_range
	}

	unsafe fn depth_format(&self) -> Result<Format, Self::Error> {
		Ok(self.config.lock().depth_format)
	}

	unsafe fn surface_support(&self, _surface: Self::Surface) -> Result<SurfaceSupport, Self::Error> {
		self.state.lock().check_device()?;
		Ok(self.config.lock().surface_support.clone())
	}

	unsafe fn create_swapchain(
		&self,
		_surface: Self::Surface,
		create_info: &SwapchainCreateInfo,
		old_swapchain: Option<&Self::Swapchain>,
	) -> Result<Self::Swapchain, Self::Error> {
		let mut state = self.state.lock();
		state.check_device()?;
		assert!(
			create_info.extent.width != 0 && create_info.extent.height != 0,
			"swapchain created with zero extent {:?}",
			create_info.extent
		);
		let id = state.create();
		// swapchain images are not tracked as objects, tag their views to never collide with image ids
		let image_views = (0..create_info.min_image_count)
			.map(|i| MockImageView(1 << 63 | id << 8 | i as u64))
			.collect();
		state.events.push(MockEvent::SwapchainCreated {
			swapchain: id,
			extent: create_info.extent,
			image_count: create_info.min_image_count,
			format: create_info.format,
			present_mode: create_info.present_mode,
			old: old_swapchain.map(|s| s.id),
		});
		Ok(MockSwapchain {
			id,
			create_info: *create_info,
			image_views,
		})
	}

	fn swapchain_image_views(swapchain: &Self::Swapchain) -> &[Self::ImageView] {
		&swapchain.image_views
	}

	unsafe fn acquire_next_image(
		&self,
		swapchain: &Self::Swapchain,
		_signal: &Self::Semaphore,
	) -> Result<AcquireOutcome, Self::Error> {
		let mut state = self.state.lock();
		state.check_device()?;
		let image_count = swapchain.image_views.len() as u32;
		let outcome = match state.acquire_script.pop_front() {
			Some(outcome) => outcome,
			None => {
				let next = state.next_image.entry(swapchain.id).or_insert(0);
				let image_index = *next;
				*next = (image_index + 1) % image_count;
				AcquireOutcome::Acquired {
					image_index,
					suboptimal: false,
				}
			}
		};
		state.events.push(MockEvent::Acquire {
			swapchain: swapchain.id,
			outcome,
		});
		Ok(outcome)
	}

	unsafe fn present(
		&self,
		swapchain: &Self::Swapchain,
		image_index: u32,
		wait: &Self::Semaphore,
	) -> Result<PresentOutcome, Self::Error> {
		let mut state = self.state.lock();
		state.check_device()?;
		assert!(
			(image_index as usize) < swapchain.image_views.len(),
			"presenting image {} of a swapchain with {} images",
			image_index,
			swapchain.image_views.len()
		);
		let outcome = state.present_script.pop_front().unwrap_or(PresentOutcome::Optimal);
		state.events.push(MockEvent::Present {
			swapchain: swapchain.id,
			image_index,
			wait: wait.id,
			outcome,
		});
		Ok(outcome)
	}

	unsafe fn destroy_swapchain(&self, swapchain: Self::Swapchain) {
		let mut state = self.state.lock();
		state.destroy(swapchain.id, "swapchain");
		state.next_image.remove(&swapchain.id);
		state.events.push(MockEvent::SwapchainDestroyed { swapchain: swapchain.id });
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn copies_execute_on_fence_wait() -> anyhow::Result<()> {
		let platform = MockPlatform::new();
		unsafe {
			let mut src = platform.alloc_buffer(&BufferCreateInfo {
				size: 4,
				usage: BufferUsage::TRANSFER_SRC | BufferUsage::MAP_WRITE,
				..BufferCreateInfo::default()
			})?;
			let dst = platform.alloc_buffer(&BufferCreateInfo {
				size: 4,
				usage: BufferUsage::TRANSFER_DST,
				..BufferCreateInfo::default()
			})?;
			let slab = MockPlatform::mapped_buffer_to_slab(&mut src).unwrap();
			presser::copy_from_slice_to_offset(&[1u8, 2, 3, 4], slab, 0).unwrap();

			let fence = platform.create_fence(false)?;
			let mut target = platform.create_recording_target()?;
			platform.begin_recording(&mut target)?;
			platform.cmd_copy_buffer(&mut target, &src, &dst, 4);
			platform.end_recording(&mut target)?;
			platform.submit(&target, None, None, &fence)?;
			assert_eq!(platform.buffer_contents(&dst), vec![0; 4]);

			platform.wait_for_fence(&fence)?;
			assert_eq!(platform.buffer_contents(&dst), vec![1, 2, 3, 4]);
			assert_eq!(platform.pending_submissions(), 0);

			platform.destroy_buffer(src);
			platform.destroy_buffer(dst);
			platform.destroy_recording_target(target);
			platform.destroy_fence(fence);
		}
		assert_eq!(platform.alive_objects(), 0);
		Ok(())
	}

	#[test]
	#[should_panic(expected = "still pending")]
	fn destroy_while_pending_panics() {
		let platform = MockPlatform::new();
		unsafe {
			let src = platform
				.alloc_buffer(&BufferCreateInfo {
					size: 4,
					usage: BufferUsage::TRANSFER_SRC | BufferUsage::MAP_WRITE,
					..BufferCreateInfo::default()
				})
				.unwrap();
			let dst = platform
				.alloc_buffer(&BufferCreateInfo {
					size: 4,
					usage: BufferUsage::TRANSFER_DST,
					..BufferCreateInfo::default()
				})
				.unwrap();
			let fence = platform.create_fence(false).unwrap();
			let mut target = platform.create_recording_target().unwrap();
			platform.begin_recording(&mut target).unwrap();
			platform.cmd_copy_buffer(&mut target, &src, &dst, 4);
			platform.end_recording(&mut target).unwrap();
			platform.submit(&target, None, None, &fence).unwrap();
			platform.destroy_buffer(src);
		}
	}

	#[test]
	fn scripted_outcomes() -> anyhow::Result<()> {
		let platform = MockPlatform::new();
		let surface = platform.create_surface();
		unsafe {
			let swapchain = platform.create_swapchain(
				surface,
				&SwapchainCreateInfo {
					min_image_count: 3,
					format: Format::B8G8R8A8_UNORM,
					color_space: ColorSpace::SRGB_NONLINEAR,
					present_mode: PresentModeKHR::FIFO,
					extent: Extent {
						width: 800,
						height: 600,
					},
					pre_transform: SurfaceTransformFlagsKHR::IDENTITY,
				},
				None,
			)?;
			let semaphore = platform.create_semaphore()?;
			platform.push_acquire_outcome(AcquireOutcome::OutOfDate);
			platform.push_present_outcome(PresentOutcome::Suboptimal);

			assert_eq!(platform.acquire_next_image(&swapchain, &semaphore)?, AcquireOutcome::OutOfDate);
			assert_eq!(
				platform.acquire_next_image(&swapchain, &semaphore)?,
				AcquireOutcome::Acquired {
					image_index: 0,
					suboptimal: false
				}
			);
			assert_eq!(platform.present(&swapchain, 0, &semaphore)?, PresentOutcome::Suboptimal);
			assert_eq!(platform.present(&swapchain, 0, &semaphore)?, PresentOutcome::Optimal);

			platform.set_device_lost();
			assert_eq!(
				platform.acquire_next_image(&swapchain, &semaphore),
				Err(MockError::DeviceLost)
			);
			platform.destroy_semaphore(semaphore);
			platform.destroy_swapchain(swapchain);
		}
		assert_eq!(platform.alive_objects(), 0);
		Ok(())
	}
}
