mod context;
mod destruction;
mod error;
mod pacer;
mod ring;

pub use context::*;
pub use destruction::*;
pub use error::*;
pub use pacer::*;
pub use ring::*;
