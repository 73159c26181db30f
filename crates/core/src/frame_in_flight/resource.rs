use crate::frame_in_flight::{FrameInFlight, SeedInFlight, FRAMES_SMALLVEC};
use smallvec::SmallVec;

/// One `T` per frame slot. See [mod](crate::frame_in_flight) for docs.
///
/// Indexing is done with methods instead of [`Index`](core::ops::Index), so that the returned reference can't outlive
/// the [`FrameInFlight`] it was accessed with.
#[derive(Debug)]
pub struct ResourceInFlight<T> {
	vec: SmallVec<[T; FRAMES_SMALLVEC]>,
	seed: SeedInFlight,
}

impl<T> ResourceInFlight<T> {
	/// Calls `f` once per frame slot to create its resource.
	#[must_use]
	pub fn new<F>(seed: impl Into<SeedInFlight>, f: F) -> Self
	where
		F: FnMut(FrameInFlight) -> T,
	{
		let seed = seed.into();
		// SAFETY: only hands out the index of the resource being created
		let vec = unsafe { seed.iter() }.map(f).collect();
		Self { seed, vec }
	}

	/// Like [`Self::new`] but creation may fail, dropping what was created so far.
	pub fn try_new<F, E>(seed: impl Into<SeedInFlight>, f: F) -> Result<Self, E>
	where
		F: FnMut(FrameInFlight) -> Result<T, E>,
	{
		let seed = seed.into();
		// SAFETY: only hands out the index of the resource being created
		let vec = unsafe { seed.iter() }.map(f).collect::<Result<_, _>>()?;
		Ok(Self { seed, vec })
	}

	#[inline(always)]
	pub fn seed(&self) -> SeedInFlight {
		self.seed
	}

	/// Iterates the resources of all frame slots, including ones that may be in flight.
	pub fn iter(&self) -> impl Iterator<Item = &T> {
		self.vec.iter()
	}

	pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
		self.vec.iter_mut()
	}

	pub fn into_resources(self) -> impl Iterator<Item = T> {
		self.vec.into_iter()
	}
}

#[allow(clippy::should_implement_trait)]
impl<T> ResourceInFlight<T> {
	#[must_use]
	#[inline]
	pub fn index<'a>(&'a self, index: FrameInFlight<'a>) -> &'a T {
		assert_eq!(self.seed, index.seed());
		// SAFETY: the seed matches, so the frame index is below frames_in_flight which is the length of vec
		unsafe { self.vec.get_unchecked(index.frame_index()) }
	}

	#[must_use]
	#[inline]
	pub fn index_mut<'a>(&'a mut self, index: FrameInFlight<'a>) -> &'a mut T {
		assert_eq!(self.seed, index.seed());
		// SAFETY: the seed matches, so the frame index is below frames_in_flight which is the length of vec
		unsafe { self.vec.get_unchecked_mut(index.frame_index()) }
	}
}

impl<T> From<&ResourceInFlight<T>> for SeedInFlight {
	fn from(value: &ResourceInFlight<T>) -> Self {
		value.seed()
	}
}
