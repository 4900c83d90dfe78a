//! Cross-message deep copy.
//!
//! Linking an object from another message clones it, pre-order, into the
//! destination arena. A tracking map keyed by source identity is populated
//! *before* recursing into a node's pointers, so shared sub-graphs stay
//! shared in the copy and cycles terminate.
use {
    crate::{
        arena::{Message, SegmentId},
        error::{foreign_message, out_of_bounds, Result},
        object::{Ptr, PtrKind},
    },
    alloc::collections::BTreeMap,
};

type Seen = BTreeMap<(SegmentId, u32), Ptr>;

impl Message {
    /// Clone `target` (an object of `src`) into this message and link the
    /// copy at `slot` of `parent`. Returns the copied handle.
    ///
    /// This is the cross-message counterpart of [`setp`](Message::setp): the
    /// clone is recursive over the target's pointer slots, already-copied
    /// objects are linked rather than duplicated, and the source message is
    /// left untouched.
    pub fn copy_from(
        &mut self,
        parent: Ptr,
        slot: u32,
        src: &Message,
        target: Ptr,
    ) -> Result<Ptr> {
        if target.is_null() {
            self.setp(parent, slot, Ptr::NULL)?;
            return Ok(Ptr::NULL);
        }
        if target.msg != src.id {
            return Err(foreign_message());
        }
        let mut seen = Seen::new();
        let copy = self.clone_object(src, target, &mut seen)?;
        self.setp(parent, slot, copy)?;
        Ok(copy)
    }

    fn clone_object(&mut self, src: &Message, obj: Ptr, seen: &mut Seen) -> Result<Ptr> {
        if let Some(&done) = seen.get(&(obj.seg, obj.off)) {
            return Ok(done);
        }
        match obj.kind {
            PtrKind::Null => Ok(Ptr::NULL),
            PtrKind::Struct => {
                let dst = self.new_struct(obj.datasz, obj.ptrsz / 8)?;
                seen.insert((obj.seg, obj.off), dst);
                self.copy_section(src, &obj, &dst, obj.datasz)?;
                for slot in 0..obj.ptrsz / 8 {
                    self.clone_child(src, obj, dst, slot, seen)?;
                }
                Ok(dst)
            }
            PtrKind::BitList => {
                let dst = self.new_bit_list(obj.size)?;
                seen.insert((obj.seg, obj.off), dst);
                self.copy_section(src, &obj, &dst, obj.size.div_ceil(8))?;
                Ok(dst)
            }
            PtrKind::PtrList => {
                let dst = if obj.has_ptr_tag {
                    self.new_composite_list(obj.size, 0, 1)?
                } else {
                    self.new_ptr_list(obj.size)?
                };
                seen.insert((obj.seg, obj.off), dst);
                for slot in 0..obj.size {
                    self.clone_child(src, obj, dst, slot, seen)?;
                }
                Ok(dst)
            }
            PtrKind::List if obj.has_composite_tag => {
                let dst =
                    self.new_composite_list(obj.size, obj.datasz / 8, obj.ptrsz / 8)?;
                seen.insert((obj.seg, obj.off), dst);
                for i in 0..obj.size {
                    let from = src.getp(obj, i);
                    let to = self.getp(dst, i);
                    self.copy_section(src, &from, &to, obj.datasz)?;
                    for slot in 0..obj.ptrsz / 8 {
                        self.clone_child(src, from, to, slot, seen)?;
                    }
                }
                Ok(dst)
            }
            PtrKind::List => {
                let dst = self.new_list(obj.size, obj.datasz, 0)?;
                seen.insert((obj.seg, obj.off), dst);
                let span = obj.size.saturating_mul(obj.datasz);
                self.copy_section(src, &obj, &dst, span)?;
                Ok(dst)
            }
        }
    }

    /// Copy one source child pointer: clone the pointee, then link it with
    /// the in-message `setp` machinery.
    fn clone_child(
        &mut self,
        src: &Message,
        from: Ptr,
        to: Ptr,
        slot: u32,
        seen: &mut Seen,
    ) -> Result<()> {
        let child = src.getp(from, slot);
        if child.is_null() {
            return Ok(());
        }
        let copy = self.clone_object(src, child, seen)?;
        self.setp(to, slot, copy)
    }

    /// Raw byte copy of a data section; both sides are wire-native.
    fn copy_section(&mut self, src: &Message, from: &Ptr, to: &Ptr, n: u32) -> Result<()> {
        if n == 0 {
            return Ok(());
        }
        let bytes = src
            .seg(from.seg)
            .and_then(|s| s.get(from.off, n))
            .ok_or_else(out_of_bounds)?;
        self.seg_mut(to.seg)
            .and_then(|s| s.get_mut(to.off, n))
            .ok_or_else(out_of_bounds)?
            .copy_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            arena::{HeapAllocator, NoGrow},
            error::Error,
        },
        alloc::boxed::Box,
    };

    fn src_message() -> (Message, Ptr) {
        let mut src = Message::new();
        let root = src.new_root(16, 2).unwrap();
        src.write64(root, 0, 0xaaaa_bbbb_cccc_dddd).unwrap();
        src.set_text(root, 0, "shared").unwrap();
        (src, root)
    }

    #[test]
    fn deep_copy_detaches_from_the_source() {
        let (mut src, src_root) = src_message();
        let mut dst = Message::new();
        let dst_root = dst.new_root(0, 1).unwrap();
        dst.copy_from(dst_root, 0, &src, src_root).unwrap();

        let copy = dst.getp(dst_root, 0);
        assert_eq!(dst.read64(copy, 0), 0xaaaa_bbbb_cccc_dddd);
        assert_eq!(dst.get_text(copy, 0), Some("shared"));

        // mutating the source afterwards must not show through
        src.write64(src_root, 0, 0).unwrap();
        src.set_text(src_root, 0, "changed").unwrap();
        assert_eq!(dst.read64(copy, 0), 0xaaaa_bbbb_cccc_dddd);
        assert_eq!(dst.get_text(copy, 0), Some("shared"));
    }

    #[test]
    fn copy_preserves_shared_subgraphs() {
        let mut src = Message::new();
        let root = src.new_root(0, 2).unwrap();
        let shared = src.new_struct(8, 0).unwrap();
        src.write64(shared, 0, 7).unwrap();
        src.setp(root, 0, shared).unwrap();
        src.setp(root, 1, shared).unwrap();

        let mut dst = Message::new();
        let dst_root = dst.new_root(0, 1).unwrap();
        dst.copy_from(dst_root, 0, &src, root).unwrap();

        let copy = dst.getp(dst_root, 0);
        let a = dst.getp(copy, 0);
        let b = dst.getp(copy, 1);
        assert_eq!(dst.read64(a, 0), 7);
        // one copied object, referenced twice
        assert_eq!((a.segment(), a.off), (b.segment(), b.off));
    }

    #[test]
    fn copy_terminates_on_cycles() {
        let mut src = Message::new();
        let root = src.new_root(0, 1).unwrap();
        let a = src.new_struct(8, 1).unwrap();
        let b = src.new_struct(8, 1).unwrap();
        src.write64(a, 0, 1).unwrap();
        src.write64(b, 0, 2).unwrap();
        src.setp(a, 0, b).unwrap();
        src.setp(b, 0, a).unwrap();
        src.setp(root, 0, a).unwrap();

        let mut dst = Message::new();
        let dst_root = dst.new_root(0, 1).unwrap();
        dst.copy_from(dst_root, 0, &src, src.getp(root, 0)).unwrap();

        let ca = dst.getp(dst_root, 0);
        let cb = dst.getp(ca, 0);
        let ca_again = dst.getp(cb, 0);
        assert_eq!(dst.read64(ca, 0), 1);
        assert_eq!(dst.read64(cb, 0), 2);
        assert_eq!((ca.segment(), ca.off), (ca_again.segment(), ca_again.off));
    }

    #[test]
    fn copy_covers_every_object_kind() {
        let mut src = Message::new();
        let root = src.new_root(8, 4).unwrap();
        src.write64(root, 0, 99).unwrap();

        let nums = src.new_list(4, 4, 0).unwrap();
        for i in 0..4 {
            src.set32(nums, i, 10 + i);
        }
        src.setp(root, 0, nums).unwrap();

        let bits = src.new_bit_list(9).unwrap();
        src.set1(bits, 0, true);
        src.set1(bits, 8, true);
        src.setp(root, 1, bits).unwrap();

        let people = src.new_list(2, 8, 1).unwrap();
        for i in 0..2 {
            let m = src.getp(people, i);
            src.write64(m, 0, i as u64).unwrap();
            src.set_text(m, 0, if i == 0 { "a" } else { "b" }).unwrap();
        }
        src.setp(root, 2, people).unwrap();

        let ptrs = src.new_ptr_list(2).unwrap();
        let t = src.new_string("tail").unwrap();
        src.setp(ptrs, 1, t).unwrap();
        src.setp(root, 3, ptrs).unwrap();

        let mut dst = Message::new();
        let dst_root = dst.new_root(0, 1).unwrap();
        dst.copy_from(dst_root, 0, &src, root).unwrap();
        let copy = dst.getp(dst_root, 0);

        assert_eq!(dst.read64(copy, 0), 99);
        let nums = dst.getp(copy, 0);
        for i in 0..4 {
            assert_eq!(dst.get32(nums, i), 10 + i);
        }
        let bits = dst.getp(copy, 1);
        assert_eq!(bits.size(), 9);
        assert!(dst.get1(bits, 0));
        assert!(!dst.get1(bits, 1));
        assert!(dst.get1(bits, 8));
        let people = dst.getp(copy, 2);
        assert_eq!(people.size(), 2);
        assert!(people.has_composite_tag);
        for i in 0..2 {
            let m = dst.getp(people, i);
            assert_eq!(dst.read64(m, 0), i as u64);
            assert_eq!(dst.get_text(m, 0), Some(if i == 0 { "a" } else { "b" }));
        }
        let ptrs = dst.getp(copy, 3);
        assert!(dst.getp(ptrs, 0).is_null());
        assert_eq!(dst.get_text(ptrs, 1), Some("tail"));
    }

    #[test]
    fn copy_of_null_zeroes_the_slot() {
        let (src, src_root) = src_message();
        let mut dst = Message::new();
        let dst_root = dst.new_root(0, 1).unwrap();
        dst.copy_from(dst_root, 0, &src, src_root).unwrap();
        let copied = dst.copy_from(dst_root, 0, &src, Ptr::NULL).unwrap();
        assert!(copied.is_null());
        assert!(dst.getp(dst_root, 0).is_null());
    }

    #[test]
    fn copy_rejects_handles_from_a_third_message() {
        let (src, _) = src_message();
        let mut other = Message::new();
        let other_root = other.new_root(8, 0).unwrap();
        let mut dst = Message::new();
        let dst_root = dst.new_root(0, 1).unwrap();
        assert_eq!(
            dst.copy_from(dst_root, 0, &src, other_root),
            Err(Error::ForeignMessage)
        );
    }

    #[test]
    fn failed_copy_leaves_the_slot_untouched() {
        let (src, src_root) = src_message();
        let mut dst = Message::with_allocator(Box::new(HeapAllocator::with_first_segment_size(
            24,
        )));
        let dst_root = dst.new_root(8, 1).unwrap();
        dst.write64(dst_root, 0, 5).unwrap();
        // swap in an allocator that refuses growth, so the clone cannot
        // allocate its objects
        dst.set_allocator(Box::new(NoGrow));
        assert!(dst.copy_from(dst_root, 0, &src, src_root).is_err());
        assert!(dst.getp(dst_root, 0).is_null());
        assert_eq!(dst.read64(dst_root, 0), 5);
    }
}
