//! Wire pointer words.
//!
//! A pointer is one little-endian word whose low two bits select the kind:
//!
//! - `00` struct: signed word offset in bits 2..31, data-section words in
//!   32..47, pointer-section words in 48..63.
//! - `01` list: signed word offset in bits 2..31, element-size code in
//!   32..34, element count (composite: payload word count) in 35..63.
//! - `10` far: double-far flag in bit 2, landing-pad word offset in 3..31,
//!   target segment id in 32..63.
//! - `11` other (capabilities): unsupported here, decodes as null.
//!
//! A composite list's payload is preceded by a tag word in struct-pointer
//! shape whose offset field carries the element count.
use crate::arena::SegmentId;

/// Largest encodable element count (and composite payload word count).
pub(crate) const MAX_ELEMENTS: u32 = (1 << 29) - 1;

/// Largest encodable per-section word count.
pub(crate) const MAX_SECTION_WORDS: u32 = u16::MAX as u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ElementSize {
    Void,
    Bit,
    Byte,
    TwoBytes,
    FourBytes,
    EightBytes,
    Pointer,
    Composite,
}

impl ElementSize {
    pub(crate) fn from_code(code: u8) -> ElementSize {
        match code & 7 {
            0 => ElementSize::Void,
            1 => ElementSize::Bit,
            2 => ElementSize::Byte,
            3 => ElementSize::TwoBytes,
            4 => ElementSize::FourBytes,
            5 => ElementSize::EightBytes,
            6 => ElementSize::Pointer,
            _ => ElementSize::Composite,
        }
    }

    pub(crate) fn code(self) -> u8 {
        match self {
            ElementSize::Void => 0,
            ElementSize::Bit => 1,
            ElementSize::Byte => 2,
            ElementSize::TwoBytes => 3,
            ElementSize::FourBytes => 4,
            ElementSize::EightBytes => 5,
            ElementSize::Pointer => 6,
            ElementSize::Composite => 7,
        }
    }

    /// Per-element data bytes for the fixed-width codes.
    pub(crate) fn data_bytes(self) -> u32 {
        match self {
            ElementSize::Byte => 1,
            ElementSize::TwoBytes => 2,
            ElementSize::FourBytes => 4,
            ElementSize::EightBytes => 8,
            _ => 0,
        }
    }

    /// The code a primitive list of `bytes`-wide elements encodes with.
    pub(crate) fn for_data_bytes(bytes: u32) -> ElementSize {
        match bytes {
            0 => ElementSize::Void,
            1 => ElementSize::Byte,
            2 => ElementSize::TwoBytes,
            4 => ElementSize::FourBytes,
            _ => ElementSize::EightBytes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WirePtr {
    Null,
    Struct {
        off: i32,
        data_words: u16,
        ptr_words: u16,
    },
    List {
        off: i32,
        elem: ElementSize,
        count: u32,
    },
    Far {
        double: bool,
        pad: u32,
        seg: SegmentId,
    },
    Other,
}

impl WirePtr {
    pub(crate) fn decode(word: u64) -> WirePtr {
        if word == 0 {
            return WirePtr::Null;
        }
        match (word & 3) as u8 {
            0 => WirePtr::Struct {
                off: signed_offset(word),
                data_words: (word >> 32) as u16,
                ptr_words: (word >> 48) as u16,
            },
            1 => WirePtr::List {
                off: signed_offset(word),
                elem: ElementSize::from_code((word >> 32) as u8),
                count: ((word >> 35) as u32) & MAX_ELEMENTS,
            },
            2 => WirePtr::Far {
                double: word & 4 != 0,
                pad: (word as u32) >> 3,
                seg: (word >> 32) as SegmentId,
            },
            _ => WirePtr::Other,
        }
    }

    pub(crate) fn encode(self) -> u64 {
        match self {
            WirePtr::Null => 0,
            WirePtr::Struct {
                off,
                data_words,
                ptr_words,
            } => {
                debug_assert!((-(1 << 29)..1 << 29).contains(&off));
                ((off as u32) << 2) as u64
                    | (data_words as u64) << 32
                    | (ptr_words as u64) << 48
            }
            WirePtr::List { off, elem, count } => {
                debug_assert!((-(1 << 29)..1 << 29).contains(&off));
                debug_assert!(count <= MAX_ELEMENTS);
                (((off as u32) << 2) | 1) as u64
                    | (elem.code() as u64) << 32
                    | (count as u64) << 35
            }
            WirePtr::Far { double, pad, seg } => {
                debug_assert!(pad <= MAX_ELEMENTS);
                (((pad << 3) | ((double as u32) << 2) | 2) as u64) | (seg as u64) << 32
            }
            WirePtr::Other => 3,
        }
    }
}

/// Sign-extend the 30-bit word offset in bits 2..31.
#[inline]
fn signed_offset(word: u64) -> i32 {
    (word as u32 as i32) >> 2
}

#[cfg(test)]
mod tests {
    use {super::*, crate::proptest_config::proptest_cfg, proptest::prelude::*};

    #[test]
    fn zero_word_is_null() {
        assert_eq!(WirePtr::decode(0), WirePtr::Null);
        assert_eq!(WirePtr::Null.encode(), 0);
    }

    #[test]
    fn capability_pointers_are_other() {
        assert_eq!(WirePtr::decode(3), WirePtr::Other);
        assert_eq!(WirePtr::decode(0xdead_beef_0000_0003), WirePtr::Other);
    }

    #[test]
    fn struct_field_layout() {
        let word = WirePtr::Struct {
            off: -2,
            data_words: 3,
            ptr_words: 1,
        }
        .encode();
        assert_eq!(word & 3, 0);
        assert_eq!(word, 0x0001_0003_ffff_fff8);
    }

    #[test]
    fn far_field_layout() {
        let word = WirePtr::Far {
            double: false,
            pad: 1,
            seg: 1,
        }
        .encode();
        // kind 10, no double flag, pad word 1, segment 1
        assert_eq!(word, 0x0000_0001_0000_000a);
        let double = WirePtr::Far {
            double: true,
            pad: 0,
            seg: 7,
        }
        .encode();
        assert_eq!(double, 0x0000_0007_0000_0006);
    }

    #[test]
    fn element_size_codes_roundtrip() {
        for code in 0..8 {
            assert_eq!(ElementSize::from_code(code).code(), code);
        }
    }

    proptest! {
        #![proptest_config(proptest_cfg())]

        #[test]
        fn struct_roundtrip(off in -(1i32 << 29)..(1 << 29), dw in any::<u16>(), pw in any::<u16>()) {
            let p = WirePtr::Struct { off, data_words: dw, ptr_words: pw };
            prop_assert_eq!(WirePtr::decode(p.encode()), if p.encode() == 0 { WirePtr::Null } else { p });
        }

        #[test]
        fn list_roundtrip(off in -(1i32 << 29)..(1 << 29), code in 0u8..8, count in 0..=MAX_ELEMENTS) {
            let p = WirePtr::List { off, elem: ElementSize::from_code(code), count };
            prop_assert_eq!(WirePtr::decode(p.encode()), p);
        }

        #[test]
        fn far_roundtrip(double in any::<bool>(), pad in 0..=MAX_ELEMENTS, seg in any::<u32>()) {
            let p = WirePtr::Far { double, pad, seg };
            prop_assert_eq!(WirePtr::decode(p.encode()), p);
        }
    }
}
