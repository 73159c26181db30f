#![cfg(test)]

use crate::init_logger;
use frame_pipeline_core::descriptor::{
	BindlessBinding, BindlessResourceTable, BufferUsage, Extent, Format, SamplerCreateInfo,
};
use frame_pipeline_core::frame::{CommandRing, Retired};
use frame_pipeline_core::frame_in_flight::SeedInFlight;
use frame_pipeline_core::platform::FramePlatform;
use frame_pipeline_core::platform::mock::{MockEvent, MockPlatform};
use frame_pipeline_core::upload::{StagedUpload, UploadState};

fn last_submission(events: &[MockEvent]) -> Option<(u64, u64)> {
	events.iter().rev().find_map(|e| match e {
		MockEvent::Submit { submission, fence, .. } => Some((*submission, *fence)),
		_ => None,
	})
}

fn empty_frame(ring: &mut CommandRing<MockPlatform>, platform: &MockPlatform) -> anyhow::Result<()> {
	ring.wait_for_current(platform)?;
	unsafe {
		ring.begin(platform)?;
		ring.submit(platform, false)?;
	}
	ring.move_to_next();
	Ok(())
}

#[test]
fn staging_buffer_is_destroyed_after_its_copy_completed() -> anyhow::Result<()> {
	init_logger();
	let platform = MockPlatform::new();
	let mut ring = CommandRing::new(&platform, SeedInFlight::new(2))?;
	let mut resources = BindlessResourceTable::new(&platform, 16)?;
	let payload = (0..1024u32).map(|i| (i * 7 % 251) as u8).collect::<Vec<_>>();

	ring.wait_for_current(&platform)?;
	unsafe { ring.begin(&platform)? };
	let (staging, destination) = {
		let mut ctx = ring.frame_context(&platform, &mut resources);
		let mut upload = StagedUpload::create(&platform, 1024, BufferUsage::VERTEX_BUFFER, "vertices")?;
		upload.stage(&payload)?;
		upload.copy_staging_to_gpu(&platform, ctx.recording_target())?;
		assert_eq!(upload.state(), UploadState::CopyRecorded);

		let staging = upload.release_staging_buffer()?;
		assert_eq!(upload.state(), UploadState::Released);
		let id = staging.id();
		ctx.destroy_after_submit(Retired::Buffer(staging));
		(id, upload.into_destination())
	};
	unsafe { ring.submit(&platform, false)? };
	ring.move_to_next();
	let (submission, fence) = last_submission(&platform.events()).expect("frame 0 was submitted");
	assert!(destination.usage.contains(BufferUsage::VERTEX_BUFFER | BufferUsage::TRANSFER_DST));
	assert_eq!(platform.buffer_contents(&destination.buffer), vec![0; 1024]);

	// the other slot does not wait on frame 0
	empty_frame(&mut ring, &platform)?;
	assert!(!platform.events().contains(&MockEvent::BufferDestroyed { buffer: staging }));

	// reusing frame 0's slot waits on it, then drains its queue
	empty_frame(&mut ring, &platform)?;
	let events = platform.take_events();
	let completed = events
		.iter()
		.position(|e| *e == MockEvent::SubmissionCompleted { submission, fence })
		.expect("frame 0 completed");
	let destroyed = events
		.iter()
		.position(|e| *e == MockEvent::BufferDestroyed { buffer: staging })
		.expect("staging buffer destroyed");
	assert!(completed < destroyed);
	assert_eq!(platform.buffer_contents(&destination.buffer), payload);

	ring.wait_all_idle(&platform)?;
	unsafe {
		platform.destroy_buffer(destination.buffer);
		ring.destroy(&platform);
		resources.destroy(&platform);
	}
	assert_eq!(platform.alive_objects(), 0);
	Ok(())
}

#[test]
fn texture_upload_is_registered_and_filled() -> anyhow::Result<()> {
	init_logger();
	let platform = MockPlatform::new();
	let mut ring = CommandRing::new(&platform, SeedInFlight::new(1))?;
	let mut resources = BindlessResourceTable::new(&platform, 16)?;
	let texels: [[u8; 4]; 4] = [[255, 0, 0, 255], [0, 255, 0, 255], [0, 0, 255, 255], [255, 255, 255, 255]];

	ring.wait_for_current(&platform)?;
	unsafe { ring.begin(&platform)? };
	let handle = {
		let mut ctx = ring.frame_context(&platform, &mut resources);
		let mut upload = StagedUpload::create_texture(
			&platform,
			Extent { width: 2, height: 2 },
			Format::R8G8B8A8_UNORM,
			"checker",
		)?;
		assert_eq!(upload.size(), 16);
		upload.stage_pod(&texels)?;
		upload.finish_texture(&mut ctx, &SamplerCreateInfo::default())?
	};
	let resolved = resources.resolve_descriptor_table(&platform);
	assert_eq!(resolved.written, 1);
	assert_eq!(resolved.texture_array_len, 1);
	unsafe { ring.submit(&platform, false)? };
	ring.move_to_next();

	let writes = platform.take_descriptor_writes();
	assert_eq!(writes.len(), 1);
	assert_eq!(writes[0].binding, BindlessBinding::Texture);
	assert_eq!(writes[0].index, handle.index());

	ring.wait_for_current(&platform)?;
	let texture = resources.texture(handle).expect("texture is stored");
	assert_eq!(platform.image_contents(&texture.image), bytemuck::cast_slice::<_, u8>(&texels));

	unsafe {
		ring.destroy(&platform);
		resources.destroy(&platform);
	}
	assert_eq!(platform.alive_objects(), 0);
	Ok(())
}

#[test]
fn staging_past_the_end_is_rejected() -> anyhow::Result<()> {
	let platform = MockPlatform::new();
	let mut upload = StagedUpload::create(&platform, 8, BufferUsage::STORAGE_BUFFER, "small")?;
	assert!(upload.stage_at(4, &[0; 8]).is_err());
	upload.stage_at(4, &[1; 4])?;
	let staging = upload.release_staging_buffer()?;
	assert!(upload.release_staging_buffer().is_err());
	let destination = upload.into_destination();
	unsafe {
		platform.destroy_buffer(staging);
		platform.destroy_buffer(destination.buffer);
	}
	assert_eq!(platform.alive_objects(), 0);
	Ok(())
}
