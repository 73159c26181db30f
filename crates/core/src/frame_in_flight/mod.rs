//! # Frame in flight
//! A fixed number of frames may have GPU work outstanding at the same time. Everything a frame needs exclusively,
//! like its fence, semaphores, recording target and deferred destruction queue, is allocated once per frame in flight
//! and reused every `frames_in_flight` frames.
//!
//! * [`SeedInFlight`]: the configuration, carrying the amount of frames in flight (at most [`FRAMES_LIMIT`]) and a
//!   unique seed so that resources of two different configurations can never be mixed up.
//! * [`FrameInFlight`]: the index of one frame slot. Creating one is unsafe, as one must ensure that two frames with
//!   the same index never execute at the same time. Only the ring buffer of frame slots hands them out.
//! * [`ResourceInFlight`]: one `T` per frame slot, stored inline, indexed by a [`FrameInFlight`] of the same seed
//!   without a bounds check.

mod frame;
mod resource;

pub use frame::*;
pub use resource::*;

/// Upper bound of frames that may be in flight simultaneously.
pub const FRAMES_LIMIT: u32 = 3;
pub(crate) const FRAMES_SMALLVEC: usize = FRAMES_LIMIT as usize;
