#![cfg(test)]

use crate::init_logger;
use frame_pipeline_core::descriptor::{BindlessBinding, BindlessResourceTable, BufferCreateInfo, BufferUsage};
use frame_pipeline_core::frame::CommandRing;
use frame_pipeline_core::frame_in_flight::SeedInFlight;
use frame_pipeline_core::handle::BufferHandle;
use frame_pipeline_core::platform::FramePlatform;
use frame_pipeline_core::platform::mock::{MockBuffer, MockEvent, MockPlatform};

fn storage_buffer(platform: &MockPlatform, name: &str) -> anyhow::Result<MockBuffer> {
	Ok(unsafe {
		platform.alloc_buffer(&BufferCreateInfo {
			size: 256,
			usage: BufferUsage::STORAGE_BUFFER,
			name,
			..BufferCreateInfo::default()
		})?
	})
}

#[test]
fn freed_slot_is_reused_first() -> anyhow::Result<()> {
	init_logger();
	let platform = MockPlatform::new();
	let mut table = BindlessResourceTable::new(&platform, 3)?;
	let handles = (0..3)
		.map(|i| -> anyhow::Result<BufferHandle> {
			let buffer = storage_buffer(&platform, &format!("buffer {i}"))?;
			Ok(table.store_buffer(buffer, BufferUsage::STORAGE_BUFFER)?)
		})
		.collect::<Result<Vec<_>, _>>()?;
	assert_eq!(handles, [0, 1, 2].map(BufferHandle::new));

	let freed = table.free_buffer(handles[1]).expect("slot 1 is occupied");
	assert!(table.free_buffer(handles[1]).is_none());
	assert!(table.buffer(handles[1]).is_none());
	unsafe { platform.destroy_buffer(freed.buffer) };

	let reused = table.store_buffer(storage_buffer(&platform, "reused")?, BufferUsage::STORAGE_BUFFER)?;
	assert_eq!(reused, BufferHandle::new(1));
	assert_eq!(table.buffer_count(), 3);

	unsafe { table.destroy(&platform) };
	assert_eq!(platform.alive_objects(), 0);
	Ok(())
}

#[test]
fn only_stored_slots_are_written() -> anyhow::Result<()> {
	init_logger();
	let platform = MockPlatform::new();
	let mut table = BindlessResourceTable::new(&platform, 8)?;
	let first = table.store_buffer(storage_buffer(&platform, "first")?, BufferUsage::STORAGE_BUFFER)?;
	let second = table.store_buffer(
		storage_buffer(&platform, "second")?,
		BufferUsage::STORAGE_BUFFER | BufferUsage::UNIFORM_BUFFER,
	)?;

	let resolved = table.resolve_descriptor_table(&platform);
	assert_eq!(resolved.written, 3);
	assert_eq!(resolved.buffer_array_len, 2);
	let mut writes = platform
		.take_descriptor_writes()
		.into_iter()
		.map(|w| (w.binding, w.index))
		.collect::<Vec<_>>();
	writes.sort_by_key(|(binding, index)| (binding.binding(), *index));
	assert_eq!(
		writes,
		[
			(BindlessBinding::UniformBuffer, second.index()),
			(BindlessBinding::StorageBuffer, first.index()),
			(BindlessBinding::StorageBuffer, second.index()),
		]
	);

	// nothing changed, nothing written
	assert_eq!(table.resolve_descriptor_table(&platform).written, 0);
	assert!(platform.take_descriptor_writes().is_empty());

	// a slot freed and restored before resolving is written once, with the new buffer
	let freed = table.free_buffer(first).expect("first is stored");
	unsafe { platform.destroy_buffer(freed.buffer) };
	let replacement = storage_buffer(&platform, "replacement")?;
	let replacement_id = replacement.id();
	let restored = table.store_buffer(replacement, BufferUsage::STORAGE_BUFFER)?;
	assert_eq!(restored, first);
	assert_eq!(table.resolve_descriptor_table(&platform).written, 1);
	let writes = platform.take_descriptor_writes();
	assert_eq!(writes.len(), 1);
	assert_eq!(writes[0].index, first.index());
	assert_eq!(writes[0].resource, replacement_id);

	unsafe { table.destroy(&platform) };
	assert_eq!(platform.alive_objects(), 0);
	Ok(())
}

#[test]
fn freed_buffer_survives_pending_frames() -> anyhow::Result<()> {
	init_logger();
	let platform = MockPlatform::new();
	let mut ring = CommandRing::new(&platform, SeedInFlight::new(2))?;
	let mut table = BindlessResourceTable::new(&platform, 4)?;
	let handle = table.store_buffer(storage_buffer(&platform, "short lived")?, BufferUsage::STORAGE_BUFFER)?;
	let id = table.buffer(handle).expect("stored").buffer.id();
	table.resolve_descriptor_table(&platform);

	for frame in 0..4 {
		ring.wait_for_current(&platform)?;
		unsafe { ring.begin(&platform)? };
		{
			let mut ctx = ring.frame_context(&platform, &mut table);
			if frame == 1 {
				let stored = ctx.resources().free_buffer(handle).expect("stored");
				ctx.destroy_after_submit(stored);
			}
		}
		unsafe { ring.submit(&platform, false)? };
		ring.move_to_next();

		let destroyed = platform.events().contains(&MockEvent::BufferDestroyed { buffer: id });
		// frame 3 reuses the slot of frame 1
		assert_eq!(destroyed, frame >= 3, "frame {frame}");
	}

	ring.wait_all_idle(&platform)?;
	unsafe {
		ring.destroy(&platform);
		table.destroy(&platform);
	}
	assert_eq!(platform.alive_objects(), 0);
	Ok(())
}
