#![cfg(test)]

use crate::init_logger;
use frame_pipeline_core::descriptor::{BufferCreateInfo, BufferUsage};
use frame_pipeline_core::frame::{CommandRing, DeferredDestructionQueue, Retired};
use frame_pipeline_core::frame_in_flight::SeedInFlight;
use frame_pipeline_core::platform::FramePlatform;
use frame_pipeline_core::platform::mock::{MockEvent, MockPlatform};

#[derive(Copy, Clone, Debug)]
struct Submitted {
	at: usize,
	submission: u64,
	fence: u64,
}

fn submitted(events: &[MockEvent]) -> Vec<Submitted> {
	events
		.iter()
		.enumerate()
		.filter_map(|(at, e)| match e {
			MockEvent::Submit { submission, fence, .. } => Some(Submitted {
				at,
				submission: *submission,
				fence: *fence,
			}),
			_ => None,
		})
		.collect()
}

/// Index of the first `event` after index `after`.
fn position_after(events: &[MockEvent], after: usize, event: &MockEvent) -> usize {
	events[after + 1..]
		.iter()
		.position(|e| e == event)
		.map(|i| i + after + 1)
		.unwrap_or_else(|| panic!("{event:?} never happened after {after} in {events:#?}"))
}

fn run_empty_frame(ring: &mut CommandRing<MockPlatform>, platform: &MockPlatform) -> anyhow::Result<()> {
	ring.wait_for_current(platform)?;
	unsafe {
		ring.begin(platform)?;
		ring.submit(platform, false)?;
	}
	ring.move_to_next();
	Ok(())
}

#[test]
fn reused_slot_waits_for_its_previous_submission() -> anyhow::Result<()> {
	init_logger();
	let platform = MockPlatform::new();
	let mut ring = CommandRing::new(&platform, SeedInFlight::new(2))?;
	for _ in 0..4 {
		run_empty_frame(&mut ring, &platform)?;
	}

	let events = platform.take_events();
	let submits = submitted(&events);
	assert_eq!(submits.len(), 4);
	assert_eq!(submits[0].fence, submits[2].fence);
	assert_eq!(submits[1].fence, submits[3].fence);
	assert_ne!(submits[0].fence, submits[1].fence);

	for (frame, previous) in [(2, 0), (3, 1)] {
		let prev = submits[previous];
		let waited = position_after(&events, prev.at, &MockEvent::FenceWait { fence: prev.fence });
		let completed = position_after(
			&events,
			prev.at,
			&MockEvent::SubmissionCompleted {
				submission: prev.submission,
				fence: prev.fence,
			},
		);
		// the wait only happens when the slot is reused, not any earlier
		assert!(submits[frame - 1].at < waited, "frame {frame} waited too early");
		assert!(waited < completed);
		assert!(completed < submits[frame].at, "frame {frame} submitted before frame {previous} completed");
	}

	ring.wait_all_idle(&platform)?;
	unsafe { ring.destroy(&platform) };
	assert_eq!(platform.alive_objects(), 0);
	Ok(())
}

#[test]
fn at_most_frames_in_flight_submissions_pending() -> anyhow::Result<()> {
	init_logger();
	for frames_in_flight in 1..=3 {
		let platform = MockPlatform::new();
		let mut ring = CommandRing::new(&platform, SeedInFlight::new(frames_in_flight))?;
		for _ in 0..10 {
			run_empty_frame(&mut ring, &platform)?;
			assert!(platform.pending_submissions() <= frames_in_flight as usize);
		}
		assert_eq!(platform.pending_submissions(), frames_in_flight as usize);
		ring.wait_all_idle(&platform)?;
		assert_eq!(platform.pending_submissions(), 0);
		unsafe { ring.destroy(&platform) };
	}
	Ok(())
}

#[test]
fn destruction_queue_holds_a_single_cycle() -> anyhow::Result<()> {
	init_logger();
	let platform = MockPlatform::new();
	let mut ring = CommandRing::new(&platform, SeedInFlight::new(2))?;
	let mut retired = Vec::new();
	for _ in 0..6 {
		ring.wait_for_current(&platform)?;
		unsafe { ring.begin(&platform)? };
		assert!(ring.current().destruction_queue().is_empty());

		let buffer = unsafe {
			platform.alloc_buffer(&BufferCreateInfo {
				size: 64,
				usage: BufferUsage::STORAGE_BUFFER,
				name: "per frame",
				..BufferCreateInfo::default()
			})?
		};
		retired.push(buffer.id());
		ring.destroy_after_submit(Retired::Buffer(buffer));
		assert_eq!(ring.current().destruction_queue().len(), 1);
		assert_eq!(ring.current().destruction_queue().cycle(), Some(ring.cycle()));

		unsafe { ring.submit(&platform, false)? };
		ring.move_to_next();
	}

	// the last two cycles are still queued
	let destroyed = platform
		.events()
		.iter()
		.filter_map(|e| match e {
			MockEvent::BufferDestroyed { buffer } => Some(*buffer),
			_ => None,
		})
		.collect::<Vec<_>>();
	assert_eq!(destroyed, &retired[..4]);

	ring.wait_all_idle(&platform)?;
	unsafe { ring.destroy(&platform) };
	assert_eq!(platform.alive_objects(), 0);
	Ok(())
}

#[test]
#[should_panic(expected = "holds entries of cycle 0 while registering for cycle 2")]
fn destruction_queue_rejects_a_second_cycle() {
	let mut queue = DeferredDestructionQueue::<MockPlatform>::new();
	queue.push(0, Retired::custom(|_| ()));
	queue.push(2, Retired::custom(|_| ()));
}
