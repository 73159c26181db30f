//! Backing data structures for the bindless tables: dense slot storage with a free-list, and the range sets tracking
//! which slots need their descriptors written.

pub mod range_set;
pub mod table;
