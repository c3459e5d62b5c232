use std::sync::Arc;

use super::schema::TupleDesc;
use super::tuple::{RecordId, SlotId, Tuple};
use crate::file::{PAGE_SIZE, PageId, StorageError, StorageResult, TransactionId};

/// A heap page: an occupancy bitmap followed by fixed-width tuple slots.
///
/// Layout (exactly `PAGE_SIZE` bytes):
/// `[bitmap: ceil(slot_count / 8) bytes] [slot 0] [slot 1] ... [unused tail]`
/// Bit `i` of the bitmap (LSB first) is set iff slot `i` holds a tuple.
#[derive(Debug, Clone)]
pub struct HeapPage {
    pid: PageId,
    desc: Arc<TupleDesc>,
    data: Vec<u8>,
    slot_count: usize,
    dirty: Option<TransactionId>,
}

impl HeapPage {
    /// Calculate the number of slots for a given tuple width
    pub fn calculate_slot_count(tuple_size: usize) -> usize {
        // bitmap_size + slot_count * tuple_size <= PAGE_SIZE
        // where bitmap_size is one bit per slot
        (PAGE_SIZE * 8) / (tuple_size * 8 + 1)
    }

    /// Create an all-empty page
    pub fn empty(pid: PageId, desc: Arc<TupleDesc>) -> Self {
        let slot_count = Self::calculate_slot_count(desc.byte_size());
        Self {
            pid,
            desc,
            data: vec![0u8; PAGE_SIZE],
            slot_count,
            dirty: None,
        }
    }

    /// Wrap the raw bytes of a page read from disk
    pub fn from_bytes(pid: PageId, desc: Arc<TupleDesc>, data: Vec<u8>) -> StorageResult<Self> {
        if data.len() != PAGE_SIZE {
            return Err(StorageError::InvalidPageSize {
                expected: PAGE_SIZE,
                actual: data.len(),
            });
        }

        let slot_count = Self::calculate_slot_count(desc.byte_size());
        Ok(Self {
            pid,
            desc,
            data,
            slot_count,
            dirty: None,
        })
    }

    pub fn id(&self) -> PageId {
        self.pid
    }

    pub fn schema(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    /// Raw page bytes, as written to disk
    pub fn page_data(&self) -> &[u8] {
        &self.data
    }

    /// Get the number of slots in this page
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Size of the occupancy bitmap in bytes
    pub fn header_size(&self) -> usize {
        self.slot_count.div_ceil(8)
    }

    /// The transaction that last dirtied this page, if it is dirty
    pub fn is_dirty(&self) -> Option<TransactionId> {
        self.dirty
    }

    pub fn mark_dirty(&mut self, dirty: bool, tid: TransactionId) {
        self.dirty = if dirty { Some(tid) } else { None };
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = None;
    }

    /// Check if a slot is used
    pub fn is_slot_used(&self, slot_id: SlotId) -> bool {
        if slot_id >= self.slot_count {
            return false;
        }
        (self.data[slot_id / 8] & (1 << (slot_id % 8))) != 0
    }

    fn set_slot(&mut self, slot_id: SlotId, used: bool) {
        let mask = 1 << (slot_id % 8);
        if used {
            self.data[slot_id / 8] |= mask;
        } else {
            self.data[slot_id / 8] &= !mask;
        }
    }

    /// Find a free slot, returns None if page is full
    pub fn find_free_slot(&self) -> Option<SlotId> {
        (0..self.slot_count).find(|&slot_id| !self.is_slot_used(slot_id))
    }

    pub fn num_empty_slots(&self) -> usize {
        (0..self.slot_count)
            .filter(|&slot_id| !self.is_slot_used(slot_id))
            .count()
    }

    pub fn is_full(&self) -> bool {
        self.find_free_slot().is_none()
    }

    fn slot_range(&self, slot_id: SlotId) -> std::ops::Range<usize> {
        let width = self.desc.byte_size();
        let start = self.header_size() + slot_id * width;
        start..start + width
    }

    /// Place a tuple in the first free slot and return where it landed
    pub fn insert_tuple(&mut self, tuple: &Tuple) -> StorageResult<RecordId> {
        let bytes = self.desc.serialize(tuple)?;
        let slot_id = self
            .find_free_slot()
            .ok_or(StorageError::PageFull(self.pid))?;

        let range = self.slot_range(slot_id);
        self.data[range].copy_from_slice(&bytes);
        self.set_slot(slot_id, true);

        Ok(RecordId::new(self.pid, slot_id))
    }

    /// Free the slot a tuple occupies. Slot bytes are left in place.
    pub fn delete_tuple(&mut self, rid: RecordId) -> StorageResult<()> {
        if rid.page_id != self.pid {
            return Err(StorageError::TupleNotFound(rid.page_id, rid.slot_id));
        }
        if rid.slot_id >= self.slot_count {
            return Err(StorageError::InvalidSlot(self.pid, rid.slot_id));
        }
        if !self.is_slot_used(rid.slot_id) {
            return Err(StorageError::TupleNotFound(self.pid, rid.slot_id));
        }

        self.set_slot(rid.slot_id, false);
        Ok(())
    }

    /// Decode the tuple stored in a slot
    pub fn tuple(&self, slot_id: SlotId) -> StorageResult<Tuple> {
        if slot_id >= self.slot_count {
            return Err(StorageError::InvalidSlot(self.pid, slot_id));
        }
        if !self.is_slot_used(slot_id) {
            return Err(StorageError::TupleNotFound(self.pid, slot_id));
        }

        let tuple = self.desc.deserialize(&self.data[self.slot_range(slot_id)])?;
        Ok(tuple.with_record_id(RecordId::new(self.pid, slot_id)))
    }

    /// Decode every occupied slot, in slot order
    pub fn tuples(&self) -> StorageResult<Vec<Tuple>> {
        (0..self.slot_count)
            .filter(|&slot_id| self.is_slot_used(slot_id))
            .map(|slot_id| self.tuple(slot_id))
            .collect()
    }
}
