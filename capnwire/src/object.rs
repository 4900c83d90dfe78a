//! Typed references and the navigation/mutation surface.
//!
//! A [`Ptr`] is a plain value naming an object inside one [`Message`]: kind,
//! segment id, byte offset, section sizes, element count. Handles are never
//! persisted; only pointer words on the wire are. All reads on malformed or
//! out-of-range input degrade to [`Ptr::NULL`], zero, or `None`; only
//! mutations report errors.
use crate::{
    arena::{Message, SegmentId},
    endian,
    error::{
        foreign_message, invalid_slot, list_member_slot, out_of_bounds, size_limit, Result,
    },
    wire::{ElementSize, WirePtr, MAX_ELEMENTS, MAX_SECTION_WORDS},
};

/// How many chained far pointers a single dereference will follow.
const FAR_DEPTH: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PtrKind {
    Null,
    Struct,
    List,
    PtrList,
    BitList,
}

/// A typed reference into a [`Message`].
///
/// Obtained from root access, the `new_*` constructors, or navigation; valid
/// only against the message that produced it and only while that message is
/// alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ptr {
    pub(crate) kind: PtrKind,
    pub(crate) seg: SegmentId,
    /// Byte offset of the object data (for composite lists: the first
    /// element, just past the tag word).
    pub(crate) off: u32,
    /// Struct data-section bytes, or per-element data bytes for lists.
    pub(crate) datasz: u32,
    /// Struct (or composite element) pointer-section bytes.
    pub(crate) ptrsz: u32,
    /// Element count for lists (bits for bit lists), 1 for structs.
    pub(crate) size: u32,
    pub(crate) msg: u64,
    /// The i-th struct inside a composite list; it has no back-pointer word.
    pub(crate) is_list_member: bool,
    pub(crate) has_composite_tag: bool,
    /// Pointer list whose payload is preceded by a composite tag word.
    pub(crate) has_ptr_tag: bool,
}

impl Ptr {
    /// The null reference: returned on errors and for absent fields.
    pub const NULL: Ptr = Ptr {
        kind: PtrKind::Null,
        seg: 0,
        off: 0,
        datasz: 0,
        ptrsz: 0,
        size: 0,
        msg: 0,
        is_list_member: false,
        has_composite_tag: false,
        has_ptr_tag: false,
    };

    #[inline]
    pub fn is_null(&self) -> bool {
        self.kind == PtrKind::Null
    }

    #[inline]
    pub fn kind(&self) -> PtrKind {
        self.kind
    }

    /// Element count for lists (bits for bit lists), 1 for structs.
    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Data-section bytes (structs) or per-element data bytes (lists).
    #[inline]
    pub fn data_size(&self) -> u32 {
        self.datasz
    }

    /// Number of pointer slots of a struct or composite list element.
    #[inline]
    pub fn ptr_count(&self) -> u32 {
        self.ptrsz / 8
    }

    #[inline]
    pub fn is_list_member(&self) -> bool {
        self.is_list_member
    }

    #[inline]
    pub fn segment(&self) -> SegmentId {
        self.seg
    }
}

/// The re-encodable identity of an object: where its content starts and the
/// pointer shape that describes it.
enum Shape {
    Struct { data_words: u16, ptr_words: u16 },
    List { elem: ElementSize, count: u32 },
}

impl Shape {
    fn encode_at(&self, off: i32) -> u64 {
        match *self {
            Shape::Struct {
                data_words,
                ptr_words,
            } => {
                // zero-sized structs use offset -1 to stay distinguishable
                // from a null word
                let off = if data_words == 0 && ptr_words == 0 { -1 } else { off };
                WirePtr::Struct {
                    off,
                    data_words,
                    ptr_words,
                }
                .encode()
            }
            Shape::List { elem, count } => WirePtr::List { off, elem, count }.encode(),
        }
    }
}

fn object_shape(target: &Ptr) -> (u32, Shape) {
    match target.kind {
        PtrKind::BitList => (
            target.off,
            Shape::List {
                elem: ElementSize::Bit,
                count: target.size,
            },
        ),
        PtrKind::PtrList if target.has_ptr_tag => (
            target.off - 8,
            Shape::List {
                elem: ElementSize::Composite,
                count: target.size,
            },
        ),
        PtrKind::PtrList => (
            target.off,
            Shape::List {
                elem: ElementSize::Pointer,
                count: target.size,
            },
        ),
        PtrKind::List if target.has_composite_tag => {
            let stride_words = (target.datasz + target.ptrsz) / 8;
            (
                target.off - 8,
                Shape::List {
                    elem: ElementSize::Composite,
                    count: target.size * stride_words,
                },
            )
        }
        PtrKind::List => (
            target.off,
            Shape::List {
                elem: ElementSize::for_data_bytes(target.datasz),
                count: target.size,
            },
        ),
        PtrKind::Struct | PtrKind::Null => (
            target.off,
            Shape::Struct {
                data_words: (target.datasz / 8) as u16,
                ptr_words: (target.ptrsz / 8) as u16,
            },
        ),
    }
}

#[inline]
fn word_offset(content: u32, ptr_at: u32) -> i32 {
    ((content as i64 - (ptr_at as i64 + 8)) / 8) as i32
}

macro_rules! field_accessors {
    ($read:ident, $write:ident, $ty:ty, $load:path, $store:path) => {
        /// Read the struct field at byte offset `off`. Fields beyond the
        /// data section read as 0, which is what keeps schema evolution
        /// backward compatible on old data.
        pub fn $read(&self, p: Ptr, off: u32) -> $ty {
            const WIDTH: u32 = core::mem::size_of::<$ty>() as u32;
            if p.msg != self.id || p.kind != PtrKind::Struct {
                return 0;
            }
            match off.checked_add(WIDTH) {
                Some(end) if end <= p.datasz => self
                    .seg(p.seg)
                    .and_then(|s| s.get(p.off + off, WIDTH))
                    .and_then($load)
                    .unwrap_or(0),
                _ => 0,
            }
        }

        /// Write the struct field at byte offset `off`; fails when the field
        /// lies outside the data section, leaving the struct unchanged.
        pub fn $write(&mut self, p: Ptr, off: u32, v: $ty) -> Result<()> {
            const WIDTH: u32 = core::mem::size_of::<$ty>() as u32;
            if p.msg != self.id {
                return Err(foreign_message());
            }
            if p.kind != PtrKind::Struct {
                return Err(out_of_bounds());
            }
            let end = off.checked_add(WIDTH).ok_or_else(out_of_bounds)?;
            if end > p.datasz {
                return Err(out_of_bounds());
            }
            let bytes = self
                .seg_mut(p.seg)
                .and_then(|s| s.get_mut(p.off + off, WIDTH))
                .ok_or_else(out_of_bounds)?;
            $store(bytes, v).ok_or_else(out_of_bounds)
        }
    };
}

macro_rules! list_accessors {
    ($get:ident, $set:ident, $getv:ident, $setv:ident, $ty:ty, $load:path, $store:path) => {
        /// Read list element `idx`, or 0 when the index or element width is
        /// out of range.
        pub fn $get(&self, list: Ptr, idx: u32) -> $ty {
            const WIDTH: u32 = core::mem::size_of::<$ty>() as u32;
            if list.msg != self.id
                || list.kind != PtrKind::List
                || list.has_composite_tag
                || list.datasz != WIDTH
                || idx >= list.size
            {
                return 0;
            }
            self.seg(list.seg)
                .and_then(|s| s.get(list.off + idx * WIDTH, WIDTH))
                .and_then($load)
                .unwrap_or(0)
        }

        /// Write list element `idx`; out-of-range writes are dropped, the
        /// same saturation that makes new-schema writers safe on old data.
        pub fn $set(&mut self, list: Ptr, idx: u32, v: $ty) {
            const WIDTH: u32 = core::mem::size_of::<$ty>() as u32;
            if list.msg != self.id
                || list.kind != PtrKind::List
                || list.has_composite_tag
                || list.datasz != WIDTH
                || idx >= list.size
            {
                return;
            }
            if let Some(bytes) = self
                .seg_mut(list.seg)
                .and_then(|s| s.get_mut(list.off + idx * WIDTH, WIDTH))
            {
                let _ = $store(bytes, v);
            }
        }

        /// Copy elements starting at `idx` into `dst`; returns how many were
        /// read (bounded by the list size).
        pub fn $getv(&self, list: Ptr, idx: u32, dst: &mut [$ty]) -> usize {
            const WIDTH: u32 = core::mem::size_of::<$ty>() as u32;
            if list.msg != self.id
                || list.kind != PtrKind::List
                || list.has_composite_tag
                || list.datasz != WIDTH
            {
                return 0;
            }
            let n = (dst.len() as u64).min(list.size.saturating_sub(idx) as u64) as usize;
            for (i, slot) in dst[..n].iter_mut().enumerate() {
                *slot = self.$get(list, idx + i as u32);
            }
            n
        }

        /// Store elements starting at `idx` from `src`; returns how many
        /// were written (bounded by the list size).
        pub fn $setv(&mut self, list: Ptr, idx: u32, src: &[$ty]) -> usize {
            const WIDTH: u32 = core::mem::size_of::<$ty>() as u32;
            if list.msg != self.id
                || list.kind != PtrKind::List
                || list.has_composite_tag
                || list.datasz != WIDTH
            {
                return 0;
            }
            let n = (src.len() as u64).min(list.size.saturating_sub(idx) as u64) as usize;
            for (i, &v) in src[..n].iter().enumerate() {
                self.$set(list, idx + i as u32, v);
            }
            n
        }
    };
}

impl Message {
    /// The synthetic struct whose single pointer slot is the root word.
    fn root_ptr(&self) -> Ptr {
        Ptr {
            kind: PtrKind::Struct,
            seg: 0,
            off: 0,
            datasz: 0,
            ptrsz: 8,
            size: 1,
            msg: self.id,
            ..Ptr::NULL
        }
    }

    /// Dereference the root pointer (the first word of segment 0).
    pub fn get_root(&self) -> Ptr {
        self.decode_ptr_at(0, 0, FAR_DEPTH)
    }

    /// Make `target` the root object.
    pub fn set_root(&mut self, target: Ptr) -> Result<()> {
        self.ensure_root()?;
        let root = self.root_ptr();
        self.setp(root, 0, target)
    }

    /// Allocate a struct of `datasz` data bytes and `ptrs` pointer slots and
    /// install it as the root.
    pub fn new_root(&mut self, datasz: u32, ptrs: u32) -> Result<Ptr> {
        let p = self.new_struct(datasz, ptrs)?;
        self.set_root(p)?;
        Ok(p)
    }

    /// Allocate a struct; `datasz` is rounded up to a whole word.
    pub fn new_struct(&mut self, datasz: u32, ptrs: u32) -> Result<Ptr> {
        let data_words = datasz.div_ceil(8);
        if data_words > MAX_SECTION_WORDS || ptrs > MAX_SECTION_WORDS {
            return Err(size_limit());
        }
        let (seg, off) = self.alloc((data_words + ptrs) * 8)?;
        Ok(Ptr {
            kind: PtrKind::Struct,
            seg,
            off,
            datasz: data_words * 8,
            ptrsz: ptrs * 8,
            size: 1,
            msg: self.id,
            ..Ptr::NULL
        })
    }

    /// Allocate a list of `size` elements of `datasz` data bytes and `ptrs`
    /// pointer slots each. Pointerless elements of at most a word become a
    /// primitive list (element width rounded up to 1, 2, 4, or 8 bytes);
    /// anything larger becomes a composite list with a leading tag word.
    pub fn new_list(&mut self, size: u32, datasz: u32, ptrs: u32) -> Result<Ptr> {
        if size > MAX_ELEMENTS {
            return Err(size_limit());
        }
        if ptrs > 0 || datasz > 8 {
            return self.new_composite_list(size, datasz.div_ceil(8), ptrs);
        }
        let width = match datasz {
            0 => 0u32,
            1 => 1,
            2 => 2,
            3 | 4 => 4,
            _ => 8,
        };
        let bytes = (size as u64 * width as u64).div_ceil(8) * 8;
        let (seg, off) = self.alloc(bytes as u32)?;
        Ok(Ptr {
            kind: PtrKind::List,
            seg,
            off,
            datasz: width,
            size,
            msg: self.id,
            ..Ptr::NULL
        })
    }

    pub(crate) fn new_composite_list(
        &mut self,
        size: u32,
        data_words: u32,
        ptr_words: u32,
    ) -> Result<Ptr> {
        if size > MAX_ELEMENTS || data_words > MAX_SECTION_WORDS || ptr_words > MAX_SECTION_WORDS
        {
            return Err(size_limit());
        }
        let payload_words = size as u64 * (data_words + ptr_words) as u64;
        let total_bytes = (payload_words + 1) * 8;
        if payload_words > MAX_ELEMENTS as u64 || total_bytes > u32::MAX as u64 {
            return Err(size_limit());
        }
        let (seg, off) = self.alloc(total_bytes as u32)?;
        let tag = WirePtr::Struct {
            off: size as i32,
            data_words: data_words as u16,
            ptr_words: ptr_words as u16,
        };
        self.write_word(seg, off, tag.encode())?;
        let p = Ptr {
            kind: PtrKind::List,
            seg,
            off: off + 8,
            datasz: data_words * 8,
            ptrsz: ptr_words * 8,
            size,
            msg: self.id,
            ..Ptr::NULL
        };
        Ok(if data_words == 0 && ptr_words == 1 {
            Ptr {
                kind: PtrKind::PtrList,
                has_ptr_tag: true,
                ..p
            }
        } else {
            Ptr {
                has_composite_tag: true,
                ..p
            }
        })
    }

    /// Allocate a list of `size` bits.
    pub fn new_bit_list(&mut self, size: u32) -> Result<Ptr> {
        if size > MAX_ELEMENTS {
            return Err(size_limit());
        }
        let bytes = (size as u64).div_ceil(8).div_ceil(8) * 8;
        let (seg, off) = self.alloc(bytes as u32)?;
        Ok(Ptr {
            kind: PtrKind::BitList,
            seg,
            off,
            size,
            msg: self.id,
            ..Ptr::NULL
        })
    }

    /// Allocate a list of `size` pointers.
    pub fn new_ptr_list(&mut self, size: u32) -> Result<Ptr> {
        if size > MAX_ELEMENTS {
            return Err(size_limit());
        }
        let bytes = size as u64 * 8;
        if bytes > u32::MAX as u64 {
            return Err(size_limit());
        }
        let (seg, off) = self.alloc(bytes as u32)?;
        Ok(Ptr {
            kind: PtrKind::PtrList,
            seg,
            off,
            size,
            msg: self.id,
            ..Ptr::NULL
        })
    }

    /// Allocate a byte list holding `bytes` verbatim.
    pub fn new_data(&mut self, bytes: &[u8]) -> Result<Ptr> {
        let len = u32::try_from(bytes.len()).map_err(|_| size_limit())?;
        let p = self.new_list(len, 1, 0)?;
        if len > 0 {
            self.seg_mut(p.seg)
                .and_then(|s| s.get_mut(p.off, len))
                .ok_or_else(out_of_bounds)?
                .copy_from_slice(bytes);
        }
        Ok(p)
    }

    /// Allocate a NUL-terminated text object; the terminator is included in
    /// the list but excluded from the logical text size.
    pub fn new_string(&mut self, s: &str) -> Result<Ptr> {
        let len = u32::try_from(s.len())
            .ok()
            .and_then(|n| n.checked_add(1))
            .ok_or_else(size_limit)?;
        let p = self.new_list(len, 1, 0)?;
        if !s.is_empty() {
            // the trailing NUL is already there: segments are zeroed
            self.seg_mut(p.seg)
                .and_then(|seg| seg.get_mut(p.off, len - 1))
                .ok_or_else(out_of_bounds)?
                .copy_from_slice(s.as_bytes());
        }
        Ok(p)
    }

    /// Dereference the pointer at `slot` of `parent`.
    ///
    /// For struct parents `slot` indexes the pointer section; for pointer
    /// lists it indexes (and dereferences) the element; for composite lists
    /// it yields the inline `slot`-th struct.
    pub fn getp(&self, parent: Ptr, slot: u32) -> Ptr {
        if parent.msg != self.id {
            return Ptr::NULL;
        }
        match parent.kind {
            PtrKind::Struct => {
                if slot >= parent.ptrsz / 8 {
                    return Ptr::NULL;
                }
                self.decode_ptr_at(parent.seg, parent.off + parent.datasz + slot * 8, FAR_DEPTH)
            }
            PtrKind::PtrList => {
                if slot >= parent.size {
                    return Ptr::NULL;
                }
                self.decode_ptr_at(parent.seg, parent.off + slot * 8, FAR_DEPTH)
            }
            PtrKind::List if parent.has_composite_tag => {
                if slot >= parent.size {
                    return Ptr::NULL;
                }
                let stride = parent.datasz + parent.ptrsz;
                Ptr {
                    kind: PtrKind::Struct,
                    seg: parent.seg,
                    off: parent.off + slot * stride,
                    datasz: parent.datasz,
                    ptrsz: parent.ptrsz,
                    size: 1,
                    msg: self.id,
                    is_list_member: true,
                    ..Ptr::NULL
                }
            }
            _ => Ptr::NULL,
        }
    }

    /// Write a pointer so that `target` becomes the child at `slot` of
    /// `parent`. A null target zeroes the slot. The target must live in this
    /// message; same-segment targets get a direct pointer, others a far (or,
    /// when the target segment has no pad room, double-far) pointer. On
    /// error the slot is left unchanged.
    pub fn setp(&mut self, parent: Ptr, slot: u32, target: Ptr) -> Result<()> {
        if parent.msg != self.id {
            return Err(foreign_message());
        }
        let (slot_seg, slot_off) = self.ptr_slot(&parent, slot)?;
        if target.is_null() {
            return self.write_word(slot_seg, slot_off, 0);
        }
        if target.msg != self.id {
            return Err(foreign_message());
        }
        self.link(slot_seg, slot_off, &target)
    }

    /// Resolve the writable pointer word addressed by `parent`/`slot`.
    fn ptr_slot(&self, parent: &Ptr, slot: u32) -> Result<(SegmentId, u32)> {
        match parent.kind {
            PtrKind::Struct => {
                if slot >= parent.ptrsz / 8 {
                    return Err(invalid_slot(slot));
                }
                Ok((parent.seg, parent.off + parent.datasz + slot * 8))
            }
            PtrKind::List if parent.has_composite_tag => Err(list_member_slot()),
            PtrKind::PtrList => {
                if slot >= parent.size {
                    return Err(invalid_slot(slot));
                }
                Ok((parent.seg, parent.off + slot * 8))
            }
            _ => Err(invalid_slot(slot)),
        }
    }

    pub(crate) fn link(&mut self, slot_seg: SegmentId, slot_off: u32, target: &Ptr) -> Result<()> {
        let (content, shape) = object_shape(target);
        if target.seg == slot_seg {
            let off = word_offset(content, slot_off);
            self.write_word(slot_seg, slot_off, shape.encode_at(off))
        } else if let Some(pad) = self.alloc_in(target.seg, 8) {
            let off = word_offset(content, pad);
            self.write_word(target.seg, pad, shape.encode_at(off))?;
            let far = WirePtr::Far {
                double: false,
                pad: pad / 8,
                seg: target.seg,
            };
            self.write_word(slot_seg, slot_off, far.encode())
        } else {
            // no pad room next to the target: double-far through a scratch
            // pad in whatever segment can host two words
            let (pad_seg, pad_off) = self.alloc(16)?;
            let to_content = WirePtr::Far {
                double: false,
                pad: content / 8,
                seg: target.seg,
            };
            self.write_word(pad_seg, pad_off, to_content.encode())?;
            self.write_word(pad_seg, pad_off + 8, shape.encode_at(0))?;
            let far = WirePtr::Far {
                double: true,
                pad: pad_off / 8,
                seg: pad_seg,
            };
            self.write_word(slot_seg, slot_off, far.encode())
        }
    }

    pub(crate) fn write_word(&mut self, seg: SegmentId, off: u32, word: u64) -> Result<()> {
        let bytes = self
            .seg_mut(seg)
            .and_then(|s| s.get_mut(off, 8))
            .ok_or_else(out_of_bounds)?;
        bytes.copy_from_slice(&word.to_le_bytes());
        Ok(())
    }

    fn decode_ptr_at(&self, seg: SegmentId, ptr_off: u32, depth: u32) -> Ptr {
        let Some(word) = self.seg(seg).and_then(|s| s.word(ptr_off)) else {
            return Ptr::NULL;
        };
        match WirePtr::decode(word) {
            WirePtr::Null | WirePtr::Other => Ptr::NULL,
            WirePtr::Struct {
                off,
                data_words,
                ptr_words,
            } => {
                let base = ptr_off as i64 + 8 + off as i64 * 8;
                self.struct_ptr(seg, base, data_words, ptr_words)
            }
            WirePtr::List { off, elem, count } => {
                let base = ptr_off as i64 + 8 + off as i64 * 8;
                self.list_ptr(seg, base, elem, count)
            }
            WirePtr::Far {
                double,
                pad,
                seg: far_seg,
            } => {
                if depth == 0 {
                    return Ptr::NULL;
                }
                self.resolve_far(far_seg, pad * 8, double, depth - 1)
            }
        }
    }

    fn resolve_far(&self, seg: SegmentId, pad_off: u32, double: bool, depth: u32) -> Ptr {
        if !double {
            return self.decode_ptr_at(seg, pad_off, depth);
        }
        let Some(pad) = self.seg(seg) else {
            return Ptr::NULL;
        };
        let (Some(content), Some(shape)) = (pad.word(pad_off), pad_off.checked_add(8).and_then(|o| pad.word(o)))
        else {
            return Ptr::NULL;
        };
        let WirePtr::Far {
            double: false,
            pad: obj_words,
            seg: obj_seg,
        } = WirePtr::decode(content)
        else {
            return Ptr::NULL;
        };
        let base = obj_words as i64 * 8;
        match WirePtr::decode(shape) {
            WirePtr::Struct {
                data_words,
                ptr_words,
                ..
            } => self.struct_ptr(obj_seg, base, data_words, ptr_words),
            WirePtr::List { elem, count, .. } => self.list_ptr(obj_seg, base, elem, count),
            _ => Ptr::NULL,
        }
    }

    fn struct_ptr(&self, seg: SegmentId, base: i64, data_words: u16, ptr_words: u16) -> Ptr {
        let datasz = data_words as u32 * 8;
        let ptrsz = ptr_words as u32 * 8;
        let Some(off) = self.check_range(seg, base, datasz + ptrsz) else {
            return Ptr::NULL;
        };
        Ptr {
            kind: PtrKind::Struct,
            seg,
            off,
            datasz,
            ptrsz,
            size: 1,
            msg: self.id,
            ..Ptr::NULL
        }
    }

    fn list_ptr(&self, seg: SegmentId, base: i64, elem: ElementSize, count: u32) -> Ptr {
        match elem {
            ElementSize::Bit => {
                let Some(off) = self.check_range(seg, base, count.div_ceil(8)) else {
                    return Ptr::NULL;
                };
                Ptr {
                    kind: PtrKind::BitList,
                    seg,
                    off,
                    size: count,
                    msg: self.id,
                    ..Ptr::NULL
                }
            }
            ElementSize::Pointer => {
                let Some(off) = self.check_range(seg, base, count.saturating_mul(8)) else {
                    return Ptr::NULL;
                };
                Ptr {
                    kind: PtrKind::PtrList,
                    seg,
                    off,
                    size: count,
                    msg: self.id,
                    ..Ptr::NULL
                }
            }
            ElementSize::Composite => self.composite_list_ptr(seg, base, count),
            _ => {
                let width = elem.data_bytes();
                let span = count as u64 * width as u64;
                let Ok(span) = u32::try_from(span) else {
                    return Ptr::NULL;
                };
                let Some(off) = self.check_range(seg, base, span) else {
                    return Ptr::NULL;
                };
                Ptr {
                    kind: PtrKind::List,
                    seg,
                    off,
                    datasz: width,
                    size: count,
                    msg: self.id,
                    ..Ptr::NULL
                }
            }
        }
    }

    /// `count` is the payload word count; a tag word in struct-pointer shape
    /// precedes the payload and carries the element count and sizes.
    fn composite_list_ptr(&self, seg: SegmentId, base: i64, count: u32) -> Ptr {
        let Some(span) = count.checked_add(1).and_then(|words| words.checked_mul(8)) else {
            return Ptr::NULL;
        };
        let Some(tag_off) = self.check_range(seg, base, span) else {
            return Ptr::NULL;
        };
        let Some(tag) = self.seg(seg).and_then(|s| s.word(tag_off)) else {
            return Ptr::NULL;
        };
        let WirePtr::Struct {
            off: elems,
            data_words,
            ptr_words,
        } = WirePtr::decode(tag)
        else {
            return Ptr::NULL;
        };
        if elems < 0 {
            return Ptr::NULL;
        }
        let elems = elems as u32;
        let stride_words = data_words as u32 + ptr_words as u32;
        if elems as u64 * stride_words as u64 > count as u64 {
            return Ptr::NULL;
        }
        let p = Ptr {
            kind: PtrKind::List,
            seg,
            off: tag_off + 8,
            datasz: data_words as u32 * 8,
            ptrsz: ptr_words as u32 * 8,
            size: elems,
            msg: self.id,
            ..Ptr::NULL
        };
        if data_words == 0 && ptr_words == 1 {
            Ptr {
                kind: PtrKind::PtrList,
                has_ptr_tag: true,
                ..p
            }
        } else {
            Ptr {
                has_composite_tag: true,
                ..p
            }
        }
    }

    fn check_range(&self, seg: SegmentId, base: i64, len: u32) -> Option<u32> {
        if base < 0 {
            return None;
        }
        let end = base.checked_add(len as i64)?;
        if end > self.seg(seg)?.len() as i64 {
            return None;
        }
        Some(base as u32)
    }

    /// Dereference `slot` as text: a NUL-terminated byte list. The returned
    /// slice borrows the segment directly and excludes the terminator.
    pub fn get_text(&self, parent: Ptr, slot: u32) -> Option<&str> {
        let bytes = self.byte_list(self.getp(parent, slot))?;
        let (nul, text) = bytes.split_last()?;
        if *nul != 0 {
            return None;
        }
        core::str::from_utf8(text).ok()
    }

    /// Dereference `slot` as a raw byte list.
    pub fn get_data(&self, parent: Ptr, slot: u32) -> Option<&[u8]> {
        self.byte_list(self.getp(parent, slot))
    }

    /// Allocate a text object for `s` and link it at `slot`.
    pub fn set_text(&mut self, parent: Ptr, slot: u32, s: &str) -> Result<Ptr> {
        let text = self.new_string(s)?;
        self.setp(parent, slot, text)?;
        Ok(text)
    }

    /// Allocate a byte list for `bytes` and link it at `slot`.
    pub fn set_data(&mut self, parent: Ptr, slot: u32, bytes: &[u8]) -> Result<Ptr> {
        let data = self.new_data(bytes)?;
        self.setp(parent, slot, data)?;
        Ok(data)
    }

    fn byte_list(&self, list: Ptr) -> Option<&[u8]> {
        if list.msg != self.id
            || list.kind != PtrKind::List
            || list.has_composite_tag
            || list.datasz != 1
        {
            return None;
        }
        self.seg(list.seg)?.get(list.off, list.size)
    }

    field_accessors!(read8, write8, u8, endian::load_u8, endian::store_u8);
    field_accessors!(read16, write16, u16, endian::load_u16, endian::store_u16);
    field_accessors!(read32, write32, u32, endian::load_u32, endian::store_u32);
    field_accessors!(read64, write64, u64, endian::load_u64, endian::store_u64);

    list_accessors!(get8, set8, getv8, setv8, u8, endian::load_u8, endian::store_u8);
    list_accessors!(get16, set16, getv16, setv16, u16, endian::load_u16, endian::store_u16);
    list_accessors!(get32, set32, getv32, setv32, u32, endian::load_u32, endian::store_u32);
    list_accessors!(get64, set64, getv64, setv64, u64, endian::load_u64, endian::store_u64);

    /// Read bit `idx` of a bit list; out of range reads as `false`.
    pub fn get1(&self, list: Ptr, idx: u32) -> bool {
        if list.msg != self.id || list.kind != PtrKind::BitList || idx >= list.size {
            return false;
        }
        self.seg(list.seg)
            .and_then(|s| s.get(list.off, list.size.div_ceil(8)))
            .and_then(|b| endian::load_bit(b, idx))
            .unwrap_or(false)
    }

    /// Write bit `idx` of a bit list; out-of-range writes are dropped.
    pub fn set1(&mut self, list: Ptr, idx: u32, v: bool) {
        if list.msg != self.id || list.kind != PtrKind::BitList || idx >= list.size {
            return;
        }
        let span = list.size.div_ceil(8);
        if let Some(bytes) = self.seg_mut(list.seg).and_then(|s| s.get_mut(list.off, span)) {
            let _ = endian::store_bit(bytes, idx, v);
        }
    }

    /// Bulk-read bits starting at bit `idx` into `dst`, returning the number
    /// of bits copied. `idx` must be byte aligned; a misaligned `idx` reads
    /// nothing.
    pub fn getv1(&self, list: Ptr, idx: u32, dst: &mut [u8]) -> usize {
        if list.msg != self.id || list.kind != PtrKind::BitList || idx % 8 != 0 || idx >= list.size
        {
            return 0;
        }
        let bits = ((dst.len() as u64 * 8).min((list.size - idx) as u64)) as u32;
        let Some(src) = self
            .seg(list.seg)
            .and_then(|s| s.get(list.off + idx / 8, bits.div_ceil(8)))
        else {
            return 0;
        };
        let full = (bits / 8) as usize;
        dst[..full].copy_from_slice(&src[..full]);
        let rest = bits % 8;
        if rest > 0 {
            dst[full] = src[full] & ((1 << rest) - 1);
        }
        bits as usize
    }

    /// Bulk-write bits starting at byte-aligned bit `idx` from `src`,
    /// returning the number of bits stored.
    pub fn setv1(&mut self, list: Ptr, idx: u32, src: &[u8]) -> usize {
        if list.msg != self.id || list.kind != PtrKind::BitList || idx % 8 != 0 || idx >= list.size
        {
            return 0;
        }
        let bits = ((src.len() as u64 * 8).min((list.size - idx) as u64)) as u32;
        let full = bits / 8;
        if full > 0 {
            let Some(dst) = self
                .seg_mut(list.seg)
                .and_then(|s| s.get_mut(list.off + idx / 8, full))
            else {
                return 0;
            };
            dst.copy_from_slice(&src[..full as usize]);
        }
        for i in 0..bits % 8 {
            let bit = src[full as usize] & (1 << i) != 0;
            self.set1(list, idx + full * 8 + i, bit);
        }
        bits as usize
    }

    /// Read a float field against its schema default: zero stored bytes
    /// decode to exactly `default`.
    pub fn read_f32(&self, p: Ptr, off: u32, default: f32) -> f32 {
        f32::from_bits(self.read32(p, off) ^ default.to_bits())
    }

    /// Write a float field against its schema default, so a value equal to
    /// the default stores as zeros.
    pub fn write_f32(&mut self, p: Ptr, off: u32, v: f32, default: f32) -> Result<()> {
        self.write32(p, off, v.to_bits() ^ default.to_bits())
    }

    /// Read a double field against its schema default.
    pub fn read_f64(&self, p: Ptr, off: u32, default: f64) -> f64 {
        f64::from_bits(self.read64(p, off) ^ default.to_bits())
    }

    /// Write a double field against its schema default.
    pub fn write_f64(&mut self, p: Ptr, off: u32, v: f64, default: f64) -> Result<()> {
        self.write64(p, off, v.to_bits() ^ default.to_bits())
    }
}
