//! Drives a frame pipeline from a winit event loop: window resizes are forwarded to the pacer and every redraw runs
//! one frame.

#[cfg(feature = "ash")]
pub mod ash;
