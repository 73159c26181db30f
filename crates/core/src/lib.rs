//! A frame pipeline for Vulkan-style renderers: a ring of frames in flight with fence-paced recording, a swapchain
//! manager, staged uploads into device-local memory and bindless resource tables whose descriptors are written lazily.
//!
//! Everything is generic over a [`platform::FramePlatform`], implemented for [`ash`](platform::ash) and an in-memory
//! [`mock`](platform::mock) for testing.

pub mod backing;
pub mod config;
pub mod descriptor;
pub mod frame;
pub mod frame_in_flight;
pub mod handle;
pub mod platform;
pub mod swapchain;
pub mod upload;
