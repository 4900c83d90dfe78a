//! capnwire is a runtime core for the Cap'n Proto wire format: messages are
//! built, navigated, and mutated in the exact layout they have on the wire,
//! so reading a field is a bounds-checked load rather than a decode step.
//!
//! A [`Message`] owns an arena of 8-byte-aligned segments. Objects inside it
//! are named by [`Ptr`] handles, plain values carrying the object's kind,
//! location, and section sizes. Pointer words on the wire encode structs,
//! lists, and cross-segment (far) references; handles are the decoded,
//! in-memory view of those words and are never themselves persisted.
//!
//! # Quickstart
//!
//! ```
//! use capnwire::Message;
//!
//! let mut msg = Message::new();
//! let root = msg.new_root(8, 2).unwrap();
//! msg.write64(root, 0, 0x0123_4567_89ab_cdef).unwrap();
//! msg.set_text(root, 0, "hello").unwrap();
//! let scores = msg.new_list(3, 8, 0).unwrap();
//! msg.setv64(scores, 0, &[10, 20, 30]);
//! msg.setp(root, 1, scores).unwrap();
//!
//! let bytes = capnwire::to_bytes(&msg);
//! let back = capnwire::from_bytes(&bytes).unwrap();
//! let root = back.get_root();
//! assert_eq!(back.read64(root, 0), 0x0123_4567_89ab_cdef);
//! assert_eq!(back.get_text(root, 0), Some("hello"));
//! assert_eq!(back.get64(back.getp(root, 1), 2), 30);
//! ```
//!
//! # Transport
//!
//! [`to_bytes`]/[`from_bytes`] frame a message as the standard
//! segment-table stream; [`to_packed_bytes`]/[`from_packed_bytes`] run the
//! same stream through the byte-packing compression, which is also available
//! as a windowed codec ([`PackState`]) for streaming transports.
//!
//! # Error model
//!
//! Reading is total: navigation of malformed or truncated input yields
//! [`Ptr::NULL`], zero, or `None`, never a panic or an out-of-bounds access.
//! Mutation reports failures ([`Error`]) and leaves the destination
//! unchanged. Fields read as zero beyond a struct's data section and writes
//! there fail, which is what makes schema evolution safe: old data simply
//! shows defaults for fields it predates.
//!
//! Deep copies across messages go through
//! [`copy_from`](Message::copy_from), preserving shared sub-graphs and
//! terminating on cycles.
#![cfg_attr(not(feature = "std"), no_std)]
extern crate alloc;

pub mod error;
pub use error::{Error, FrameError, PackError, Result};
mod endian;
pub mod arena;
pub use arena::{Allocator, HeapAllocator, Message, NoGrow, SegmentId};
mod wire;
mod object;
pub use object::{Ptr, PtrKind};
mod copy;
pub mod packed;
pub use packed::{pack, unpack, PackState, Progress};
pub mod stream;
pub use stream::{from_bytes, from_packed_bytes, to_bytes, to_packed_bytes, MAX_SEGMENTS};
#[cfg(feature = "std")]
pub use stream::{read_message, read_packed_message, write_message, write_packed_message};
#[cfg(test)]
mod proptest_config;
