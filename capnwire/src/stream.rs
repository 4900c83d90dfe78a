//! Message framing: the unpacked segment-table stream and packed wrappers.
//!
//! An unpacked stream is `(segment_count - 1)` as a little-endian u32,
//! followed by each segment's length in words, padded with zeros to an
//! 8-byte boundary, followed by the segment payloads. The root pointer is
//! the first word of segment 0. The packed forms run the same stream
//! through the packed codec.
use {
    crate::{
        arena::{Message, WORD_BYTES},
        endian,
        error::FrameError,
        packed,
    },
    alloc::{boxed::Box, vec::Vec},
};

/// Decode refuses streams declaring more segments than this.
pub const MAX_SEGMENTS: u32 = 512;

/// Serialize `msg` as an unpacked stream.
pub fn to_bytes(msg: &Message) -> Vec<u8> {
    let count = msg.segment_count().max(1);
    let table_len = (4 + 4 * count as usize).next_multiple_of(WORD_BYTES as usize);
    let payload: usize = (0..msg.segment_count())
        .filter_map(|id| msg.seg(id))
        .map(|seg| seg.len() as usize)
        .sum();
    let mut out = Vec::with_capacity(table_len + payload);
    out.extend_from_slice(&(count - 1).to_le_bytes());
    for id in 0..count {
        let words = msg.seg(id).map_or(0, |seg| seg.len() / WORD_BYTES);
        out.extend_from_slice(&words.to_le_bytes());
    }
    out.resize(table_len, 0);
    for id in 0..count {
        if let Some(seg) = msg.seg(id) {
            out.extend_from_slice(seg.bytes());
        }
    }
    out
}

/// Serialize `msg` through the packed codec.
pub fn to_packed_bytes(msg: &Message) -> Vec<u8> {
    packed::pack(&to_bytes(msg)).expect("framed messages are word aligned")
}

/// Decode an unpacked stream into an owned message.
///
/// Trailing bytes beyond the declared segments are ignored. The returned
/// message is mutable; growth goes to fresh segments.
pub fn from_bytes(bytes: &[u8]) -> Result<Message, FrameError> {
    let first = endian::load_u32(bytes).ok_or(FrameError::Truncated)?;
    let count = first.checked_add(1).ok_or(FrameError::TooManySegments(u32::MAX))?;
    if count > MAX_SEGMENTS {
        return Err(FrameError::TooManySegments(count));
    }
    let table_len = (4 + 4 * count as usize).next_multiple_of(WORD_BYTES as usize);
    if bytes.len() < table_len {
        return Err(FrameError::Truncated);
    }
    let mut buffers = Vec::with_capacity(count as usize);
    let mut at = table_len;
    for id in 0..count {
        let words = endian::load_u32(&bytes[4 + 4 * id as usize..])
            .ok_or(FrameError::Truncated)?;
        let len = (words as u64)
            .checked_mul(WORD_BYTES as u64)
            .filter(|&n| n <= u32::MAX as u64)
            .ok_or(FrameError::WordCountOverflow)? as usize;
        let end = at.checked_add(len).ok_or(FrameError::Truncated)?;
        let payload = bytes.get(at..end).ok_or(FrameError::Truncated)?;
        buffers.push(Box::<[u8]>::from(payload));
        at = end;
    }
    Ok(Message::from_wire_segments(buffers))
}

/// Decode a packed stream into an owned message.
pub fn from_packed_bytes(bytes: &[u8]) -> Result<Message, FrameError> {
    from_bytes(&packed::unpack(bytes)?)
}

#[cfg(feature = "std")]
pub use io::{read_message, read_packed_message, write_message, write_packed_message};

#[cfg(feature = "std")]
mod io {
    use {super::*, std::io::{Read, Write}};

    /// Write `msg` as an unpacked stream.
    pub fn write_message(w: &mut impl Write, msg: &Message) -> std::io::Result<()> {
        w.write_all(&to_bytes(msg))
    }

    /// Write `msg` through the packed codec.
    pub fn write_packed_message(w: &mut impl Write, msg: &Message) -> std::io::Result<()> {
        w.write_all(&to_packed_bytes(msg))
    }

    /// Read one unpacked message, consuming exactly its framed length.
    pub fn read_message(r: &mut impl Read) -> Result<Message, FrameError> {
        let mut head = [0u8; 4];
        r.read_exact(&mut head)?;
        let first = u32::from_le_bytes(head);
        let count = first
            .checked_add(1)
            .ok_or(FrameError::TooManySegments(u32::MAX))?;
        if count > MAX_SEGMENTS {
            return Err(FrameError::TooManySegments(count));
        }
        let table_len = (4 + 4 * count as usize).next_multiple_of(WORD_BYTES as usize);
        let mut table = alloc::vec![0u8; table_len];
        table[..4].copy_from_slice(&head);
        r.read_exact(&mut table[4..])?;
        let mut buffers = Vec::with_capacity(count as usize);
        for id in 0..count {
            let words = endian::load_u32(&table[4 + 4 * id as usize..])
                .ok_or(FrameError::Truncated)?;
            let len = (words as u64)
                .checked_mul(WORD_BYTES as u64)
                .filter(|&n| n <= u32::MAX as u64)
                .ok_or(FrameError::WordCountOverflow)? as usize;
            let mut payload = alloc::vec![0u8; len];
            r.read_exact(&mut payload)?;
            buffers.push(payload.into_boxed_slice());
        }
        Ok(Message::from_wire_segments(buffers))
    }

    /// Read a packed message stream to its end.
    pub fn read_packed_message(r: &mut impl Read) -> Result<Message, FrameError> {
        let mut bytes = Vec::new();
        r.read_to_end(&mut bytes)?;
        from_packed_bytes(&bytes)
    }
}
