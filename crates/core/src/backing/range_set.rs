use rangemap::RangeSet;
use std::ops::Range;

#[inline]
pub(crate) fn index_to_range(index: u32) -> Range<u32> {
	index..index + 1
}

/// Set of slot indices, stored as merged ranges so that consecutive stores resolve into a single descriptor write.
#[derive(Debug, Clone, Default)]
pub struct IndexRangeSet {
	range_set: RangeSet<u32>,
}

impl IndexRangeSet {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, index: u32) {
		self.range_set.insert(index_to_range(index));
	}

	pub fn remove(&mut self, index: u32) {
		self.range_set.remove(index_to_range(index));
	}

	pub fn contains(&self, index: u32) -> bool {
		self.range_set.contains(&index)
	}

	pub fn is_empty(&self) -> bool {
		self.range_set.is_empty()
	}

	pub fn iter_ranges(&self) -> impl Iterator<Item = Range<u32>> + '_ {
		self.range_set.iter().cloned()
	}

	pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
		self.iter_ranges().flatten()
	}

	/// Takes all indices out of the set, leaving it empty.
	pub fn take(&mut self) -> IndexRangeSet {
		std::mem::take(self)
	}
}
