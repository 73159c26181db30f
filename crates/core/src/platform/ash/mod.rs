mod convert;
mod device;
mod frame_platform;
mod init;

pub use convert::*;
pub use device::*;
pub use frame_platform::*;
pub use init::*;
