//! Signed integer codecs (1, 2 and 4 bytes)

use crate::{expect_len, FixedWidth, Result, ValueDecoder, ValueEncoder};

/// Interpret a raw byte as a two's-complement signed value
#[inline]
pub fn signed_byte(b: u8) -> i8 {
    b as i8
}

/// Wrap a signed value into the unsigned 0-255 range
#[inline]
pub fn unsigned_byte(v: i8) -> u8 {
    v as u8
}

/// 1-byte signed value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ByteCodec;

impl FixedWidth for ByteCodec {
    const WIDTH: usize = 1;
}

impl ValueDecoder for ByteCodec {
    type Value = i8;

    fn encoded_len(&self) -> Option<usize> {
        Some(Self::WIDTH)
    }

    fn decode(&self, buf: &[u8]) -> Result<i8> {
        expect_len(Self::WIDTH, buf)?;
        Ok(signed_byte(buf[0]))
    }
}

impl ValueEncoder for ByteCodec {
    fn encode(&self, value: &i8) -> Result<Vec<u8>> {
        Ok(vec![unsigned_byte(*value)])
    }
}

/// 2-byte little-endian signed value
///
/// Decoding computes `signed(high) * 256 + low`; encoding biases negative
/// values by 65536 before splitting into low/high bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShortCodec;

impl FixedWidth for ShortCodec {
    const WIDTH: usize = 2;
}

impl ValueDecoder for ShortCodec {
    type Value = i16;

    fn encoded_len(&self) -> Option<usize> {
        Some(Self::WIDTH)
    }

    fn decode(&self, buf: &[u8]) -> Result<i16> {
        expect_len(Self::WIDTH, buf)?;
        Ok(i16::from(signed_byte(buf[1])) * 256 + i16::from(buf[0]))
    }
}

impl ValueEncoder for ShortCodec {
    fn encode(&self, value: &i16) -> Result<Vec<u8>> {
        let biased = if *value < 0 {
            i32::from(*value) + 0x1_0000
        } else {
            i32::from(*value)
        };
        Ok(vec![(biased % 256) as u8, (biased / 256) as u8])
    }
}

/// 4-byte little-endian signed value
///
/// Same layout as [`ShortCodec`] extended to four bytes; negative values
/// are biased by 2^32 on encode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LongCodec;

impl FixedWidth for LongCodec {
    const WIDTH: usize = 4;
}

impl ValueDecoder for LongCodec {
    type Value = i32;

    fn encoded_len(&self) -> Option<usize> {
        Some(Self::WIDTH)
    }

    fn decode(&self, buf: &[u8]) -> Result<i32> {
        expect_len(Self::WIDTH, buf)?;
        // Only the most significant byte carries the sign
        let value = buf[..3]
            .iter()
            .rev()
            .fold(i64::from(signed_byte(buf[3])), |acc, b| acc * 256 + i64::from(*b));
        Ok(value as i32)
    }
}

impl ValueEncoder for LongCodec {
    fn encode(&self, value: &i32) -> Result<Vec<u8>> {
        let mut biased = if *value < 0 {
            i64::from(*value) + (1i64 << 32)
        } else {
            i64::from(*value)
        };
        let mut buf = Vec::with_capacity(Self::WIDTH);
        for _ in 0..Self::WIDTH {
            buf.push((biased % 256) as u8);
            biased /= 256;
        }
        Ok(buf)
    }
}
