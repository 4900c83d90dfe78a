//! Segment arena: message-owned byte buffers and allocation.
//!
//! A [`Message`] owns an ordered set of [`Segment`]s, each a contiguous
//! zero-initialized buffer whose length and capacity are multiples of 8.
//! Objects are bump-allocated inside segments; when the current segment is
//! full, the message asks its [`Allocator`] for a new one. Segment ids are
//! assigned sequentially and the first word of segment 0 is reserved for the
//! root pointer.
use {
    crate::error::{allocation_failed, out_of_bounds, Result},
    alloc::{boxed::Box, vec, vec::Vec},
    core::sync::atomic::{AtomicU64, Ordering},
};

/// Index of a segment within its message, as used by far pointers.
pub type SegmentId = u32;

/// Number of bytes in a wire word.
pub const WORD_BYTES: u32 = 8;

/// Default size of the first heap-allocated segment.
pub const DEFAULT_FIRST_SEGMENT_BYTES: u32 = 8 * 1024;

pub(crate) struct Segment {
    data: Box<[u8]>,
    len: u32,
}

impl Segment {
    fn new(data: Box<[u8]>, len: u32) -> Self {
        debug_assert_eq!(data.len() % WORD_BYTES as usize, 0);
        debug_assert!(len as usize <= data.len());
        Self { data, len }
    }

    #[inline]
    pub(crate) fn len(&self) -> u32 {
        self.len
    }

    #[inline]
    pub(crate) fn cap(&self) -> u32 {
        self.data.len() as u32
    }

    /// Bump-allocate `n` bytes (a multiple of 8); returns the byte offset.
    pub(crate) fn try_alloc(&mut self, n: u32) -> Option<u32> {
        debug_assert_eq!(n % WORD_BYTES, 0);
        let off = self.len;
        let end = off.checked_add(n)?;
        if end > self.cap() {
            return None;
        }
        self.len = end;
        Some(off)
    }

    /// The allocated prefix of the buffer.
    #[inline]
    pub(crate) fn bytes(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    #[inline]
    pub(crate) fn get(&self, off: u32, n: u32) -> Option<&[u8]> {
        let end = off.checked_add(n)?;
        if end > self.len {
            return None;
        }
        Some(&self.data[off as usize..end as usize])
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, off: u32, n: u32) -> Option<&mut [u8]> {
        let end = off.checked_add(n)?;
        if end > self.len {
            return None;
        }
        Some(&mut self.data[off as usize..end as usize])
    }

    /// Load the little-endian word at byte offset `off`.
    #[inline]
    pub(crate) fn word(&self, off: u32) -> Option<u64> {
        crate::endian::load_u64(self.get(off, WORD_BYTES)?)
    }
}

/// Segment allocation strategy, the growth half of a message's arena.
///
/// Implementations return a zeroed buffer of at least `min_bytes` bytes whose
/// length is a multiple of 8, or `None` to refuse growth. `id` is the segment
/// id the buffer will receive.
pub trait Allocator {
    fn allocate(&mut self, id: SegmentId, min_bytes: u32) -> Option<Box<[u8]>>;
}

/// Heap allocator that doubles the size of each new segment, so total
/// allocation stays linear in the message size.
pub struct HeapAllocator {
    next: u32,
}

impl HeapAllocator {
    pub fn new() -> Self {
        Self {
            next: DEFAULT_FIRST_SEGMENT_BYTES,
        }
    }

    /// Start from a first segment of `bytes` (rounded up to a whole word)
    /// instead of the default 8 KiB.
    pub fn with_first_segment_size(bytes: u32) -> Self {
        Self {
            next: round_up_to_word(bytes.max(WORD_BYTES)),
        }
    }
}

impl Default for HeapAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl Allocator for HeapAllocator {
    fn allocate(&mut self, _id: SegmentId, min_bytes: u32) -> Option<Box<[u8]>> {
        let size = round_up_to_word(min_bytes).max(self.next);
        self.next = size.saturating_mul(2);
        Some(vec![0u8; size as usize].into_boxed_slice())
    }
}

/// Allocator that refuses all growth: the single-segment mode for callers
/// that forbid new segments (and with them, far pointers to fresh pads).
pub struct NoGrow;

impl Allocator for NoGrow {
    fn allocate(&mut self, _id: SegmentId, _min_bytes: u32) -> Option<Box<[u8]>> {
        None
    }
}

#[inline]
fn round_up_to_word(bytes: u32) -> u32 {
    bytes.div_ceil(WORD_BYTES) * WORD_BYTES
}

static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

/// A message: the arena of segments that together hold one object graph.
///
/// All navigation and mutation go through `Message` methods; handles
/// ([`Ptr`](crate::Ptr)) are plain values that name objects inside it and are
/// only meaningful against the message that produced them.
pub struct Message {
    pub(crate) id: u64,
    segments: Vec<Segment>,
    alloc: Box<dyn Allocator>,
}

impl Message {
    /// An empty message backed by the default [`HeapAllocator`].
    pub fn new() -> Self {
        Self::with_allocator(Box::new(HeapAllocator::new()))
    }

    pub fn with_allocator(alloc: Box<dyn Allocator>) -> Self {
        Self {
            id: NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed),
            segments: Vec::new(),
            alloc,
        }
    }

    /// Replace the growth strategy used for subsequent segment allocations.
    pub fn set_allocator(&mut self, alloc: Box<dyn Allocator>) {
        self.alloc = alloc;
    }

    /// Build a message over already-framed wire segments (`len == cap`).
    pub(crate) fn from_wire_segments(buffers: Vec<Box<[u8]>>) -> Self {
        let mut msg = Self::new();
        for data in buffers {
            debug_assert_eq!(data.len() % WORD_BYTES as usize, 0);
            let len = data.len() as u32;
            msg.segments.push(Segment::new(data, len));
        }
        msg
    }

    /// Register a caller-owned writable segment and return its id.
    ///
    /// The buffer is padded to a whole word and must be zero-initialized; if
    /// it becomes segment 0, its first word is reserved for the root pointer.
    pub fn append_segment(&mut self, mut bytes: Vec<u8>) -> SegmentId {
        let padded = round_up_to_word(bytes.len() as u32);
        bytes.resize(padded as usize, 0);
        let id = self.segments.len() as SegmentId;
        let mut seg = Segment::new(bytes.into_boxed_slice(), 0);
        if id == 0 {
            let _ = seg.try_alloc(WORD_BYTES);
        }
        self.segments.push(seg);
        id
    }

    pub fn segment_count(&self) -> u32 {
        self.segments.len() as u32
    }

    #[inline]
    pub(crate) fn seg(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.get(id as usize)
    }

    #[inline]
    pub(crate) fn seg_mut(&mut self, id: SegmentId) -> Option<&mut Segment> {
        self.segments.get_mut(id as usize)
    }

    /// Allocate `n` zeroed bytes (a multiple of 8) somewhere writable,
    /// preferring the most recent segment.
    pub(crate) fn alloc(&mut self, n: u32) -> Result<(SegmentId, u32)> {
        if let Some(seg) = self.segments.last_mut() {
            if let Some(off) = seg.try_alloc(n) {
                let id = (self.segments.len() - 1) as SegmentId;
                return Ok((id, off));
            }
        }
        let id = self.grow(n)?;
        let seg = &mut self.segments[id as usize];
        // the new segment was sized for at least `n` (plus the root word
        // reservation for segment 0)
        let off = seg.try_alloc(n).ok_or_else(|| allocation_failed(n))?;
        Ok((id, off))
    }

    /// Allocate `n` bytes inside a specific segment, if it has room.
    pub(crate) fn alloc_in(&mut self, id: SegmentId, n: u32) -> Option<u32> {
        self.segments.get_mut(id as usize)?.try_alloc(n)
    }

    /// Make sure segment 0 and the root pointer word exist.
    pub(crate) fn ensure_root(&mut self) -> Result<()> {
        if self.segments.is_empty() {
            self.grow(0)?;
        }
        Ok(())
    }

    fn grow(&mut self, n: u32) -> Result<SegmentId> {
        let id = self.segments.len() as SegmentId;
        let min = if id == 0 {
            n.checked_add(WORD_BYTES).ok_or_else(out_of_bounds)?
        } else {
            n
        };
        let data = self
            .alloc
            .allocate(id, min)
            .ok_or_else(|| allocation_failed(min))?;
        if data.len() % WORD_BYTES as usize != 0 || (data.len() as u64) < min as u64 {
            return Err(allocation_failed(min));
        }
        let mut seg = Segment::new(data, 0);
        if id == 0 {
            let _ = seg.try_alloc(WORD_BYTES);
        }
        self.segments.push(seg);
        Ok(id)
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_allocation_reserves_root_word() {
        let mut msg = Message::new();
        let (seg, off) = msg.alloc(16).unwrap();
        assert_eq!((seg, off), (0, 8));
        assert_eq!(msg.seg(0).unwrap().len(), 24);
    }

    #[test]
    fn allocations_are_word_aligned_and_zeroed() {
        let mut msg = Message::new();
        for _ in 0..100 {
            let (seg, off) = msg.alloc(24).unwrap();
            assert_eq!(off % WORD_BYTES, 0);
            let bytes = msg.seg(seg).unwrap().get(off, 24).unwrap();
            assert!(bytes.iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn exhausted_segment_spills_into_a_new_one() {
        let mut msg =
            Message::with_allocator(Box::new(HeapAllocator::with_first_segment_size(24)));
        let (seg, _) = msg.alloc(16).unwrap();
        assert_eq!(seg, 0);
        let (seg, off) = msg.alloc(8).unwrap();
        assert_eq!((seg, off), (1, 0));
        assert_eq!(msg.segment_count(), 2);
    }

    #[test]
    fn heap_allocator_doubles() {
        let mut alloc = HeapAllocator::with_first_segment_size(64);
        assert_eq!(alloc.allocate(0, 8).unwrap().len(), 64);
        assert_eq!(alloc.allocate(1, 8).unwrap().len(), 128);
        assert_eq!(alloc.allocate(2, 8).unwrap().len(), 256);
        // an oversized request skips ahead and keeps doubling from there
        assert_eq!(alloc.allocate(3, 4096).unwrap().len(), 4096);
        assert_eq!(alloc.allocate(4, 8).unwrap().len(), 8192);
    }

    #[test]
    fn heap_allocator_rounds_to_words() {
        let mut alloc = HeapAllocator::with_first_segment_size(9);
        assert_eq!(alloc.allocate(0, 0).unwrap().len(), 16);
    }

    #[test]
    fn no_grow_refuses() {
        let mut msg = Message::with_allocator(Box::new(NoGrow));
        assert!(msg.alloc(8).is_err());
    }

    #[test]
    fn appended_segment_zero_hosts_the_root_word() {
        let mut msg = Message::with_allocator(Box::new(NoGrow));
        let id = msg.append_segment(vec![0; 64]);
        assert_eq!(id, 0);
        let (seg, off) = msg.alloc(8).unwrap();
        assert_eq!((seg, off), (0, 8));
    }

    #[test]
    fn appended_segment_is_padded_to_a_word() {
        let mut msg = Message::new();
        msg.append_segment(vec![0; 13]);
        assert_eq!(msg.seg(0).unwrap().cap(), 16);
    }

    #[test]
    fn message_ids_are_unique() {
        assert_ne!(Message::new().id, Message::new().id);
    }

    #[test]
    fn segment_bounds_are_enforced() {
        let mut msg = Message::new();
        let (seg, off) = msg.alloc(8).unwrap();
        let seg = msg.seg(seg).unwrap();
        assert!(seg.get(off, 8).is_some());
        assert!(seg.get(off, 16).is_none());
        assert!(seg.get(u32::MAX, 8).is_none());
        assert_eq!(seg.word(off), Some(0));
        assert_eq!(seg.word(seg.len()), None);
    }
}
