use crate::descriptor::AllocationScheme;

bitflags::bitflags! {
	/// Buffer usage specify how you may use a buffer.
	#[repr(transparent)]
	#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
	pub struct BufferUsage: u64 {
		/// Can be used as a source of transfer operations
		const TRANSFER_SRC = 0b1;
		/// Can be used as a destination of transfer operations
		const TRANSFER_DST = 0b10;
		/// Allows a buffer to be mapped into host memory. The mapping will optimize for reading from the device.
		const MAP_READ = 0b100;
		/// Allows a buffer to be persistently mapped into host memory. The mapping will optimize for writing to the
		/// device.
		const MAP_WRITE = 0b1000;
		/// Can be used as uniform buffer, registers in the uniform binding of the bindless descriptor set
		const UNIFORM_BUFFER = 0b1_0000;
		/// Can be used as storage buffer, registers in the storage binding of the bindless descriptor set
		const STORAGE_BUFFER = 0b10_0000;
		/// Can be used as source of fixed-function index fetch (index buffer)
		const INDEX_BUFFER = 0b100_0000;
		/// Can be used as source of fixed-function vertex fetch (VBO)
		const VERTEX_BUFFER = 0b1000_0000;
		/// Can be the source of indirect parameters (e.g. indirect buffer, parameter buffer)
		const INDIRECT_BUFFER = 0b1_0000_0000;
	}
}

impl BufferUsage {
	#[inline]
	pub fn is_mappable(&self) -> bool {
		self.intersects(BufferUsage::MAP_READ | BufferUsage::MAP_WRITE)
	}

	/// Whether the buffer is visible through the bindless descriptor set at all.
	#[inline]
	pub fn is_bindless(&self) -> bool {
		self.intersects(BufferUsage::UNIFORM_BUFFER | BufferUsage::STORAGE_BUFFER)
	}
}

#[derive(Copy, Clone, Debug, Default)]
pub struct BufferCreateInfo<'a> {
	/// Size of the buffer in bytes, must not be 0
	pub size: u64,
	pub usage: BufferUsage,
	/// Determines how this allocation should be managed.
	pub allocation_scheme: AllocationScheme,
	/// Name of the buffer, for tracking and debugging purposes
	pub name: &'a str,
}

/// A buffer registered in the [`BindlessResourceTable`](crate::descriptor::BindlessResourceTable).
pub struct StoredBuffer<B> {
	pub buffer: B,
	pub usage: BufferUsage,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn bindless_usage() {
		assert!(BufferUsage::UNIFORM_BUFFER.is_bindless());
		assert!((BufferUsage::STORAGE_BUFFER | BufferUsage::VERTEX_BUFFER).is_bindless());
		assert!(!(BufferUsage::VERTEX_BUFFER | BufferUsage::TRANSFER_DST).is_bindless());
		assert!((BufferUsage::TRANSFER_SRC | BufferUsage::MAP_WRITE).is_mappable());
	}
}
