//! Streaming codec for the packed stream format.
//!
//! Packing works on 8-byte words. Each word produces a tag byte whose bit
//! `i` marks byte `i` as nonzero, followed by the nonzero bytes in order.
//! Two tags are special:
//!
//! - `0x00`: a count byte follows, giving the number of *additional*
//!   all-zero words beyond the tagged one.
//! - `0xff`: the word's eight bytes follow, then a count byte giving the
//!   number of following words stored raw (uncompressed), used where
//!   compression would not pay off.
//!
//! [`deflate`](PackState::deflate) and [`inflate`](PackState::inflate) run
//! over caller-provided windows and can be re-invoked with refilled buffers;
//! [`pack`] and [`unpack`] are the one-shot forms.
use {
    crate::error::PackError,
    alloc::{vec, vec::Vec},
    core::mem,
};

const WORD: usize = 8;

/// Outcome of driving a codec call over a window pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Everything the window pair allowed was processed: the input is fully
    /// consumed (deflate) or fully decoded (inflate).
    Done,
    /// The call stopped early; grow the input past its unconsumed tail or
    /// provide fresh output room and call again.
    NeedMore,
}

/// Carry-over state between windowed codec calls.
///
/// `zeros` and `raw` are runs that were announced in the output (or read
/// from the input) but not yet fully emitted when a window ran dry.
#[derive(Debug, Default, Clone, Copy)]
pub struct PackState {
    zeros: u32,
    raw: u32,
}

impl PackState {
    pub const fn new() -> Self {
        Self { zeros: 0, raw: 0 }
    }

    /// Pack words from `input` into `output`, advancing both slices.
    ///
    /// `input` must hold whole words. Output windows smaller than ten bytes
    /// (the largest single unit) may make no progress.
    pub fn deflate(
        &mut self,
        input: &mut &[u8],
        output: &mut &mut [u8],
    ) -> Result<Progress, PackError> {
        if input.len() % WORD != 0 {
            return Err(PackError::Misaligned);
        }
        if !copy_raw(&mut self.raw, input, output) {
            return Ok(Progress::NeedMore);
        }
        while let Some(&word) = input.first_chunk::<WORD>() {
            let tag = tag_byte(&word);
            match tag {
                0x00 => {
                    if output.len() < 2 {
                        return Ok(Progress::NeedMore);
                    }
                    let run = count_words(&input[WORD..], |w| *w == [0; WORD]);
                    put(output, &[0x00, run as u8]);
                    advance(input, (1 + run) * WORD);
                }
                0xff => {
                    if output.len() < 2 + WORD {
                        return Ok(Progress::NeedMore);
                    }
                    // raw runs extend while following words still carry a
                    // nonzero byte; an all-zero word restarts compression
                    let run = count_words(&input[WORD..], |w| *w != [0; WORD]);
                    put(output, &[0xff]);
                    put(output, &word);
                    put(output, &[run as u8]);
                    advance(input, WORD);
                    self.raw = run as u32;
                    if !copy_raw(&mut self.raw, input, output) {
                        return Ok(Progress::NeedMore);
                    }
                }
                _ => {
                    let n = tag.count_ones() as usize;
                    if output.len() < 1 + n {
                        return Ok(Progress::NeedMore);
                    }
                    let mut unit = [0u8; 1 + WORD];
                    unit[0] = tag;
                    let mut at = 1;
                    for &b in &word {
                        if b != 0 {
                            unit[at] = b;
                            at += 1;
                        }
                    }
                    put(output, &unit[..at]);
                    advance(input, WORD);
                }
            }
        }
        Ok(Progress::Done)
    }

    /// Unpack words from `input` into `output`, advancing both slices.
    ///
    /// `output` must hold whole words. A unit split across the end of the
    /// input window is not consumed; the caller regrows the input past the
    /// unconsumed tail.
    pub fn inflate(
        &mut self,
        input: &mut &[u8],
        output: &mut &mut [u8],
    ) -> Result<Progress, PackError> {
        if output.len() % WORD != 0 {
            return Err(PackError::Misaligned);
        }
        loop {
            while self.zeros > 0 {
                if output.len() < WORD {
                    return Ok(Progress::NeedMore);
                }
                put(output, &[0; WORD]);
                self.zeros -= 1;
            }
            if !copy_raw(&mut self.raw, input, output) {
                return Ok(Progress::NeedMore);
            }
            let Some((&tag, rest)) = input.split_first() else {
                return Ok(Progress::Done);
            };
            match tag {
                0x00 => {
                    let Some(&run) = rest.first() else {
                        return Ok(Progress::NeedMore);
                    };
                    self.zeros = run as u32 + 1;
                    advance(input, 2);
                }
                0xff => {
                    if rest.len() < WORD + 1 {
                        return Ok(Progress::NeedMore);
                    }
                    if output.len() < WORD {
                        return Ok(Progress::NeedMore);
                    }
                    put(output, &rest[..WORD]);
                    self.raw = rest[WORD] as u32;
                    advance(input, 2 + WORD);
                }
                _ => {
                    let n = tag.count_ones() as usize;
                    if rest.len() < n {
                        return Ok(Progress::NeedMore);
                    }
                    if output.len() < WORD {
                        return Ok(Progress::NeedMore);
                    }
                    let mut word = [0u8; WORD];
                    let mut at = 0;
                    for (i, slot) in word.iter_mut().enumerate() {
                        if tag & (1 << i) != 0 {
                            *slot = rest[at];
                            at += 1;
                        }
                    }
                    put(output, &word);
                    advance(input, 1 + n);
                }
            }
        }
    }
}

fn tag_byte(word: &[u8; WORD]) -> u8 {
    let mut tag = 0u8;
    for (i, &b) in word.iter().enumerate() {
        if b != 0 {
            tag |= 1 << i;
        }
    }
    tag
}

/// Count leading words of `rest` satisfying `pred`, capped at 255.
fn count_words(mut rest: &[u8], pred: impl Fn(&[u8; WORD]) -> bool) -> usize {
    let mut n = 0;
    while n < 255 {
        match rest.first_chunk::<WORD>() {
            Some(w) if pred(w) => {
                n += 1;
                rest = &rest[WORD..];
            }
            _ => break,
        }
    }
    n
}

/// Move up to `raw` pending words verbatim; true once the run is drained.
fn copy_raw(raw: &mut u32, input: &mut &[u8], output: &mut &mut [u8]) -> bool {
    while *raw > 0 {
        let words = (*raw as usize)
            .min(input.len() / WORD)
            .min(output.len() / WORD);
        if words == 0 {
            return false;
        }
        let n = words * WORD;
        put(output, &input[..n]);
        advance(input, n);
        *raw -= words as u32;
    }
    true
}

fn put<'a>(output: &mut &'a mut [u8], bytes: &[u8]) {
    let (dst, rest) = mem::take(output).split_at_mut(bytes.len());
    dst.copy_from_slice(bytes);
    *output = rest;
}

fn advance(input: &mut &[u8], n: usize) {
    *input = &input[n..];
}

/// Pack `bytes` (whole words) in one call.
///
/// The output never exceeds `bytes.len() + bytes.len().div_ceil(64) + 2`.
pub fn pack(bytes: &[u8]) -> Result<Vec<u8>, PackError> {
    let cap = bytes.len() + bytes.len().div_ceil(64) + 2;
    let mut out = vec![0u8; cap];
    let mut state = PackState::new();
    let mut input = bytes;
    let mut pos = 0;
    loop {
        let mut window = &mut out[pos..];
        let before = window.len();
        let status = state.deflate(&mut input, &mut window)?;
        pos += before - window.len();
        match status {
            Progress::Done => break,
            Progress::NeedMore => {
                let grown = out.len() + out.len() / 2 + 64;
                out.resize(grown, 0);
            }
        }
    }
    out.truncate(pos);
    Ok(out)
}

/// Unpack a complete packed stream in one call.
pub fn unpack(bytes: &[u8]) -> Result<Vec<u8>, PackError> {
    let mut out = vec![0u8; (bytes.len() * 2 + 64).next_multiple_of(WORD)];
    let mut state = PackState::new();
    let mut input = bytes;
    let mut pos = 0;
    loop {
        let mut window = &mut out[pos..];
        let before = window.len();
        let status = state.inflate(&mut input, &mut window)?;
        let left = window.len();
        pos += before - left;
        match status {
            Progress::Done => break,
            // output room was available, so the stream itself ran dry
            Progress::NeedMore if left >= WORD => return Err(PackError::Truncated),
            Progress::NeedMore => {
                let grown = out.len() * 2;
                out.resize(grown, 0);
            }
        }
    }
    out.truncate(pos);
    Ok(out)
}
