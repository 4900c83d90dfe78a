//! Error types and helpers.
use thiserror::Error;

/// Errors from message mutation and object construction.
///
/// Read paths never produce these: navigating or reading a malformed message
/// yields [`Ptr::NULL`](crate::Ptr::NULL), zero, or `None` instead.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("offset and size exceed the object's section")]
    OutOfBounds,
    #[error("segment allocator refused to provide {0} bytes")]
    AllocationFailed(u32),
    #[error("object size exceeds the wire format's encoding limits")]
    SizeLimit,
    #[error("slot {0} is not a pointer slot of this object")]
    InvalidSlot(u32),
    #[error("struct list elements are inline and cannot be relinked")]
    ListMemberSlot,
    #[error("handle belongs to a different message")]
    ForeignMessage,
}

/// Errors from decoding a framed message stream.
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("stream ended before the declared segment data")]
    Truncated,
    #[error("stream declares {0} segments, above the decoder limit")]
    TooManySegments(u32),
    #[error("segment word count does not fit the addressable range")]
    WordCountOverflow,
    #[error(transparent)]
    Pack(#[from] PackError),
    #[cfg(feature = "std")]
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors from the packed stream codec.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackError {
    #[error("unpacked window length is not a multiple of 8 bytes")]
    Misaligned,
    #[error("packed stream ended mid-word")]
    Truncated,
}

pub type Result<T> = core::result::Result<T, Error>;

#[cold]
pub(crate) const fn out_of_bounds() -> Error {
    Error::OutOfBounds
}

#[cold]
pub(crate) const fn allocation_failed(bytes: u32) -> Error {
    Error::AllocationFailed(bytes)
}

#[cold]
pub(crate) const fn size_limit() -> Error {
    Error::SizeLimit
}

#[cold]
pub(crate) const fn invalid_slot(slot: u32) -> Error {
    Error::InvalidSlot(slot)
}

#[cold]
pub(crate) const fn list_member_slot() -> Error {
    Error::ListMemberSlot
}

#[cold]
pub(crate) const fn foreign_message() -> Error {
    Error::ForeignMessage
}
