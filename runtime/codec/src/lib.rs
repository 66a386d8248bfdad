//! Value Codecs - Fixed-width binary encodings for the controller channel
//!
//! # Purpose
//! Every value that crosses the command channel is an exact byte buffer.
//! This crate provides the encoders/decoders that turn typed values into
//! those buffers and back again.
//!
//! # Integration Points
//! - Depends on: nothing (leaf crate)
//! - Provides to: `fermlink-connector` (object value and definition codecs)
//!
//! # Encoding Rules
//! - Little-endian, two's complement
//! - Every fixed-width codec declares its exact width; decoders reject any
//!   buffer whose length differs (no truncation, no padding)
//! - Composite codecs splice fixed-width sub-codecs at fixed offsets
//!
//! ```text
//! Byte       [b0]
//! Short      [lo, hi]
//! Long       [b0, b1, b2, b3]
//! SystemTime [time: Long][scale: Short]
//! ValueThreshold [value: Short][threshold: Short]
//! ```
//!
//! # Testing Strategy
//! - Unit tests: boundary values per codec, length rejection
//! - Benchmarks: `benches/codec.rs`

mod buffer;
mod composite;
mod integer;

pub use buffer::BufferCodec;
pub use composite::{Pair, SystemTime, SystemTimeCodec, ValueThresholdCodec};
pub use integer::{signed_byte, unsigned_byte, ByteCodec, LongCodec, ShortCodec};

use thiserror::Error;

/// Error types for codec operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

pub type Result<T> = core::result::Result<T, CodecError>;

/// Decodes a byte buffer into a typed value
pub trait ValueDecoder {
    /// Decoded value type
    type Value;

    /// Number of bytes in the encoding, or `None` when the length is
    /// defined by the caller (opaque buffers)
    fn encoded_len(&self) -> Option<usize>;

    /// Decode `buf` into a value
    ///
    /// # Errors
    /// Returns `CodecError::LengthMismatch` if `buf` is not exactly
    /// `encoded_len()` bytes long
    fn decode(&self, buf: &[u8]) -> Result<Self::Value>;
}

/// Encodes a typed value into a byte buffer
pub trait ValueEncoder: ValueDecoder {
    /// Encode `value` into a freshly allocated buffer of `encoded_len()` bytes
    fn encode(&self, value: &Self::Value) -> Result<Vec<u8>>;
}

/// Codecs whose encoding has a width known at compile time
///
/// Only fixed-width codecs can be spliced into a [`Pair`].
pub trait FixedWidth {
    const WIDTH: usize;
}

/// Check that `buf` is exactly `expected` bytes long
pub(crate) fn expect_len(expected: usize, buf: &[u8]) -> Result<()> {
    if buf.len() != expected {
        return Err(CodecError::LengthMismatch {
            expected,
            actual: buf.len(),
        });
    }
    Ok(())
}
