use crate::backing::range_set::IndexRangeSet;
use crate::handle::{Handle, HandleKind};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::marker::PhantomData;

/// Dense, index addressed storage of `T`, handing out [`Handle<K>`]s.
///
/// * Slots are never relocated while alive, so a handle stays valid until it is freed.
/// * Freed indices are kept on a LIFO free-list, the next store reuses the most recently freed index.
/// * Allocation, free and lookup are O(1).
///
/// There is no generation counter, see [handle](crate::handle) for the resulting hazard.
pub struct ResourceTable<K: HandleKind, T> {
	slots: Vec<Option<T>>,
	free_list: Vec<u32>,
	capacity: u32,
	/// slots stored since the last [`Self::take_dirty`]
	dirty: IndexRangeSet,
	_phantom: PhantomData<fn() -> K>,
}

impl<K: HandleKind, T> ResourceTable<K, T> {
	pub fn new(capacity: u32) -> Self {
		debug_assert!(capacity < u32::MAX, "capacity must leave room for the INVALID handle");
		Self {
			slots: Vec::new(),
			free_list: Vec::new(),
			capacity,
			dirty: IndexRangeSet::new(),
			_phantom: PhantomData,
		}
	}

	pub fn alloc_slot(&mut self, slot: T) -> Result<Handle<K>, SlotAllocationError> {
		let index = if let Some(index) = self.free_list.pop() {
			debug_assert!(self.slots[index as usize].is_none());
			self.slots[index as usize] = Some(slot);
			index
		} else {
			let index = self.slots.len() as u32;
			if index >= self.capacity {
				return Err(SlotAllocationError::NoMoreCapacity(self.capacity));
			}
			self.slots.push(Some(slot));
			index
		};
		self.dirty.insert(index);
		Ok(Handle::new(index))
	}

	/// Returns the slot's contents and puts its index on the free-list. Returns `None` if the handle is invalid or its
	/// slot is already free, in which case the free-list is left untouched.
	pub fn free_slot(&mut self, handle: Handle<K>) -> Option<T> {
		let slot = self.slots.get_mut(handle.index() as usize)?.take()?;
		self.free_list.push(handle.index());
		self.dirty.remove(handle.index());
		Some(slot)
	}

	#[inline]
	pub fn get(&self, handle: Handle<K>) -> Option<&T> {
		self.slots.get(handle.index() as usize)?.as_ref()
	}

	#[inline]
	pub fn get_mut(&mut self, handle: Handle<K>) -> Option<&mut T> {
		self.slots.get_mut(handle.index() as usize)?.as_mut()
	}

	/// Slots that have been stored since the last call. Slots freed in between are not included.
	pub fn take_dirty(&mut self) -> IndexRangeSet {
		self.dirty.take()
	}

	/// Length of the contiguous slot array, including free slots below the highest ever allocated index.
	#[inline]
	pub fn high_water_mark(&self) -> u32 {
		self.slots.len() as u32
	}

	#[inline]
	pub fn capacity(&self) -> u32 {
		self.capacity
	}

	pub fn len(&self) -> usize {
		self.slots.len() - self.free_list.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn iter(&self) -> impl Iterator<Item = (Handle<K>, &T)> {
		self.slots
			.iter()
			.enumerate()
			.filter_map(|(i, slot)| slot.as_ref().map(|slot| (Handle::new(i as u32), slot)))
	}

	/// Removes every alive slot, resetting the table to empty.
	pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
		self.free_list.clear();
		self.dirty.take();
		self.slots.drain(..).flatten()
	}
}

impl<K: HandleKind, T> Debug for ResourceTable<K, T> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ResourceTable")
			.field("kind", &K::NAME)
			.field("len", &self.len())
			.field("high_water_mark", &self.high_water_mark())
			.field("capacity", &self.capacity)
			.finish()
	}
}

pub enum SlotAllocationError {
	NoMoreCapacity(u32),
}

impl Error for SlotAllocationError {}

impl Display for SlotAllocationError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			SlotAllocationError::NoMoreCapacity(cap) => {
				write!(f, "Ran out of available slots with a capacity of {}!", *cap)
			}
		}
	}
}

impl Debug for SlotAllocationError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		Display::fmt(self, f)
	}
}
