#[cfg(feature = "ash")]
pub mod ash;
mod frame_platform;
#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use frame_platform::*;
