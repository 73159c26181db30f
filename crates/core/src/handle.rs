//! Bindless handles are small integers that stand in for pointers to GPU-visible resources. Collaborators embed them
//! in their own per-draw data, shaders use them to index the bindless descriptor arrays.
//!
//! # Hazard: no generation tag
//! A handle is nothing more than the index of its slot. After [`free`](crate::descriptor::BindlessResourceTable) the
//! index goes back onto the free-list and the very next store reuses it, so a stale copy of the old handle silently
//! refers to the new resource. Nothing detects this. Holders of a handle must drop it before the slot is freed.

use bytemuck::{Pod, Zeroable};
use core::cmp::Ordering;
use core::fmt::{Debug, Formatter};
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use static_assertions::const_assert_eq;

/// The kind of resource a [`Handle`] refers to.
pub trait HandleKind: Copy + Send + Sync + 'static {
	const NAME: &'static str;
}

#[derive(Copy, Clone, Debug)]
pub enum Buffer {}

impl HandleKind for Buffer {
	const NAME: &'static str = "Buffer";
}

#[derive(Copy, Clone, Debug)]
pub enum Texture {}

impl HandleKind for Texture {
	const NAME: &'static str = "Texture";
}

#[derive(Copy, Clone, Debug)]
pub enum DrawParamsBlock {}

impl HandleKind for DrawParamsBlock {
	const NAME: &'static str = "DrawParamsBlock";
}

pub type BufferHandle = Handle<Buffer>;
pub type TextureHandle = Handle<Texture>;
/// The value of a draw params handle is the byte offset of its block within the per-frame draw params buffer.
pub type DrawParamsHandle = Handle<DrawParamsBlock>;

#[repr(transparent)]
pub struct Handle<K: HandleKind> {
	index: u32,
	_phantom: PhantomData<fn() -> K>,
}

const_assert_eq!(core::mem::size_of::<BufferHandle>(), core::mem::size_of::<u32>());

impl<K: HandleKind> Handle<K> {
	pub const INVALID: Self = Self::new(u32::MAX);

	#[inline]
	pub const fn new(index: u32) -> Self {
		Self {
			index,
			_phantom: PhantomData,
		}
	}

	#[inline]
	pub const fn index(&self) -> u32 {
		self.index
	}

	#[inline]
	pub const fn is_valid(&self) -> bool {
		self.index != u32::MAX
	}
}

impl<K: HandleKind> Default for Handle<K> {
	fn default() -> Self {
		Self::INVALID
	}
}

impl<K: HandleKind> Copy for Handle<K> {}

impl<K: HandleKind> Clone for Handle<K> {
	fn clone(&self) -> Self {
		*self
	}
}

impl<K: HandleKind> PartialEq for Handle<K> {
	fn eq(&self, other: &Self) -> bool {
		self.index == other.index
	}
}

impl<K: HandleKind> Eq for Handle<K> {}

impl<K: HandleKind> PartialOrd for Handle<K> {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl<K: HandleKind> Ord for Handle<K> {
	fn cmp(&self, other: &Self) -> Ordering {
		self.index.cmp(&other.index)
	}
}

impl<K: HandleKind> Hash for Handle<K> {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.index.hash(state)
	}
}

impl<K: HandleKind> Debug for Handle<K> {
	fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
		if self.is_valid() {
			write!(f, "{}Handle({})", K::NAME, self.index)
		} else {
			write!(f, "{}Handle(INVALID)", K::NAME)
		}
	}
}

// Safety: repr(transparent) over u32, the PhantomData is zero sized
unsafe impl<K: HandleKind> Zeroable for Handle<K> {}
unsafe impl<K: HandleKind> Pod for Handle<K> {}
