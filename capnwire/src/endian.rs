//! Little-endian load/store and bit helpers.
//!
//! Everything on the wire is little-endian; these assemble values byte-wise
//! so reads and writes behave identically on any host.

#[inline]
pub(crate) fn load_u8(bytes: &[u8]) -> Option<u8> {
    bytes.first().copied()
}

#[inline]
pub(crate) fn load_u16(bytes: &[u8]) -> Option<u16> {
    Some(u16::from_le_bytes(*bytes.first_chunk::<2>()?))
}

#[inline]
pub(crate) fn load_u32(bytes: &[u8]) -> Option<u32> {
    Some(u32::from_le_bytes(*bytes.first_chunk::<4>()?))
}

#[inline]
pub(crate) fn load_u64(bytes: &[u8]) -> Option<u64> {
    Some(u64::from_le_bytes(*bytes.first_chunk::<8>()?))
}

#[inline]
pub(crate) fn store_u8(bytes: &mut [u8], v: u8) -> Option<()> {
    *bytes.first_mut()? = v;
    Some(())
}

#[inline]
pub(crate) fn store_u16(bytes: &mut [u8], v: u16) -> Option<()> {
    *bytes.first_chunk_mut::<2>()? = v.to_le_bytes();
    Some(())
}

#[inline]
pub(crate) fn store_u32(bytes: &mut [u8], v: u32) -> Option<()> {
    *bytes.first_chunk_mut::<4>()? = v.to_le_bytes();
    Some(())
}

#[inline]
pub(crate) fn store_u64(bytes: &mut [u8], v: u64) -> Option<()> {
    *bytes.first_chunk_mut::<8>()? = v.to_le_bytes();
    Some(())
}

/// Read bit `idx` of a little-endian bit sequence.
#[inline]
pub(crate) fn load_bit(bytes: &[u8], idx: u32) -> Option<bool> {
    let byte = bytes.get((idx / 8) as usize)?;
    Some(byte & (1 << (idx % 8)) != 0)
}

/// Write bit `idx` of a little-endian bit sequence.
#[inline]
pub(crate) fn store_bit(bytes: &mut [u8], idx: u32, v: bool) -> Option<()> {
    let byte = bytes.get_mut((idx / 8) as usize)?;
    let mask = 1u8 << (idx % 8);
    if v {
        *byte |= mask;
    } else {
        *byte &= !mask;
    }
    Some(())
}

#[cfg(test)]
mod tests {
    use {super::*, crate::proptest_config::proptest_cfg, proptest::prelude::*};

    #[test]
    fn load_short_buffer_is_none() {
        assert_eq!(load_u16(&[1]), None);
        assert_eq!(load_u32(&[1, 2, 3]), None);
        assert_eq!(load_u64(&[0; 7]), None);
        assert_eq!(load_bit(&[], 0), None);
    }

    #[test]
    fn store_short_buffer_is_none() {
        assert_eq!(store_u16(&mut [0], 1), None);
        assert_eq!(store_u64(&mut [0; 7], 1), None);
        assert_eq!(store_bit(&mut [], 0, true), None);
    }

    proptest! {
        #![proptest_config(proptest_cfg())]

        #[test]
        fn u64_roundtrip_is_little_endian(v in any::<u64>(), pad in 0usize..8) {
            let mut buf = [0u8; 16];
            store_u64(&mut buf[pad..], v).unwrap();
            prop_assert_eq!(load_u64(&buf[pad..]), Some(v));
            prop_assert_eq!(&buf[pad..pad + 8], &v.to_le_bytes());
        }

        #[test]
        fn u16_u32_roundtrip(a in any::<u16>(), b in any::<u32>()) {
            let mut buf = [0u8; 8];
            store_u16(&mut buf, a).unwrap();
            prop_assert_eq!(load_u16(&buf), Some(a));
            store_u32(&mut buf, b).unwrap();
            prop_assert_eq!(load_u32(&buf), Some(b));
        }

        #[test]
        fn bit_roundtrip(bits in proptest::collection::vec(any::<bool>(), 1..128)) {
            let mut buf = [0u8; 16];
            for (i, &b) in bits.iter().enumerate() {
                store_bit(&mut buf, i as u32, b).unwrap();
            }
            for (i, &b) in bits.iter().enumerate() {
                prop_assert_eq!(load_bit(&buf, i as u32), Some(b));
            }
        }

        #[test]
        fn bit_clear_does_not_disturb_neighbors(idx in 0u32..64) {
            let mut buf = [0xffu8; 8];
            store_bit(&mut buf, idx, false).unwrap();
            for i in 0..64 {
                prop_assert_eq!(load_bit(&buf, i), Some(i != idx));
            }
        }
    }
}
