// Errors raised while encoding or decoding the OCTA stream.
//
// Some variants are fatal (the stream cannot be realigned) and abort the
// load; the rest are collected as warnings in the load report. The split is
// exposed through `FormatError::is_fatal`.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    #[error("unsupported map version {version} (supported {min}..={max})")]
    UnsupportedVersion { version: i32, min: i32, max: i32 },

    #[error("stream ended before the map was complete")]
    TruncatedStream,

    #[error("corrupt octree: {0}")]
    CorruptOctree(String),

    #[error("vslot {slot} refers back to missing slot {prev}")]
    InvalidVSlotBackref { slot: usize, prev: i32 },

    #[error("corrupt vslot table: {0}")]
    CorruptVSlots(String),

    #[error("variable #{index} has unknown type {ty}")]
    InvalidVariableType { index: usize, ty: u8 },

    #[error("face {orient} of cube at {origin:?} has a degenerate plane")]
    DegenerateSurface { orient: usize, origin: [i32; 3] },

    #[error("I/O error: {0}")]
    Io(#[source] io::Error),
}

impl FormatError {
    /// Whether decoding has to stop at this error.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::CorruptOctree(_)
                | Self::InvalidVSlotBackref { .. }
                | Self::InvalidVariableType { .. }
                | Self::DegenerateSurface { .. }
        )
    }
}

impl From<io::Error> for FormatError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Self::TruncatedStream
        } else {
            Self::Io(e)
        }
    }
}

pub type Result<T> = std::result::Result<T, FormatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eof_maps_to_truncated_stream() {
        let e: FormatError = io::Error::from(io::ErrorKind::UnexpectedEof).into();
        assert!(matches!(e, FormatError::TruncatedStream));
        let e: FormatError = io::Error::from(io::ErrorKind::PermissionDenied).into();
        assert!(matches!(e, FormatError::Io(_)));
    }

    #[test]
    fn fatality() {
        assert!(FormatError::TruncatedStream.is_fatal());
        assert!(FormatError::CorruptVSlots("x".into()).is_fatal());
        assert!(!FormatError::CorruptOctree("x".into()).is_fatal());
        assert!(!FormatError::InvalidVSlotBackref { slot: 1, prev: 9 }.is_fatal());
        assert!(!FormatError::InvalidVariableType { index: 0, ty: 7 }.is_fatal());
    }
}
