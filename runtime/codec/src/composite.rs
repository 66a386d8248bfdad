//! Composite codecs built by splicing fixed-width codecs

use crate::{expect_len, FixedWidth, LongCodec, Result, ShortCodec, ValueDecoder, ValueEncoder};
use static_assertions::const_assert_eq;

/// Two fixed-width codecs laid out back to back
///
/// `A` occupies bytes `[0, A::WIDTH)`, `B` the following `B::WIDTH` bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pair<A, B> {
    first: A,
    second: B,
}

impl<A, B> Pair<A, B> {
    pub const fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A: FixedWidth, B: FixedWidth> FixedWidth for Pair<A, B> {
    const WIDTH: usize = A::WIDTH + B::WIDTH;
}

impl<A, B> ValueDecoder for Pair<A, B>
where
    A: FixedWidth + ValueDecoder,
    B: FixedWidth + ValueDecoder,
{
    type Value = (A::Value, B::Value);

    fn encoded_len(&self) -> Option<usize> {
        Some(Self::WIDTH)
    }

    fn decode(&self, buf: &[u8]) -> Result<Self::Value> {
        expect_len(Self::WIDTH, buf)?;
        let (head, tail) = buf.split_at(A::WIDTH);
        Ok((self.first.decode(head)?, self.second.decode(tail)?))
    }
}

impl<A, B> ValueEncoder for Pair<A, B>
where
    A: FixedWidth + ValueEncoder,
    B: FixedWidth + ValueEncoder,
{
    fn encode(&self, value: &Self::Value) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(Self::WIDTH);
        buf.extend(self.first.encode(&value.0)?);
        buf.extend(self.second.encode(&value.1)?);
        Ok(buf)
    }
}

/// Controller clock reading
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SystemTime {
    /// Tick count
    pub time: i32,
    /// Clock scale factor
    pub scale: i16,
}

/// `Short(value) ++ Short(threshold)`, 4 bytes
pub type ValueThresholdCodec = Pair<ShortCodec, ShortCodec>;

const_assert_eq!(<ValueThresholdCodec as FixedWidth>::WIDTH, 4);

/// `Long(time) ++ Short(scale)`, 6 bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystemTimeCodec {
    inner: Pair<LongCodec, ShortCodec>,
}

impl FixedWidth for SystemTimeCodec {
    const WIDTH: usize = <Pair<LongCodec, ShortCodec> as FixedWidth>::WIDTH;
}

const_assert_eq!(<SystemTimeCodec as FixedWidth>::WIDTH, 6);

impl ValueDecoder for SystemTimeCodec {
    type Value = SystemTime;

    fn encoded_len(&self) -> Option<usize> {
        Some(Self::WIDTH)
    }

    fn decode(&self, buf: &[u8]) -> Result<SystemTime> {
        let (time, scale) = self.inner.decode(buf)?;
        Ok(SystemTime { time, scale })
    }
}

impl ValueEncoder for SystemTimeCodec {
    fn encode(&self, value: &SystemTime) -> Result<Vec<u8>> {
        self.inner.encode(&(value.time, value.scale))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CodecError;

    #[test]
    fn test_system_time_layout() {
        let t = SystemTime {
            time: 0x0102_0304,
            scale: -2,
        };
        let buf = SystemTimeCodec::default().encode(&t).unwrap();
        assert_eq!(buf, vec![0x04, 0x03, 0x02, 0x01, 0xFE, 0xFF]);
        assert_eq!(SystemTimeCodec::default().decode(&buf).unwrap(), t);
    }

    #[test]
    fn test_value_threshold_layout() {
        let codec = ValueThresholdCodec::new(ShortCodec, ShortCodec);
        assert_eq!(codec.encoded_len(), Some(4));
        assert_eq!(codec.encode(&(100, 5)).unwrap(), vec![100, 0, 5, 0]);
        assert_eq!(codec.decode(&[100, 0, 5, 0]).unwrap(), (100, 5));
        assert_eq!(codec.encode(&(-1, 0)).unwrap(), vec![0xFF, 0xFF, 0, 0]);
    }

    #[test]
    fn test_pair_rejects_short_buffer() {
        let codec = Pair::new(LongCodec, ShortCodec);
        assert_eq!(
            codec.decode(&[0, 0, 0, 0, 0]),
            Err(CodecError::LengthMismatch {
                expected: 6,
                actual: 5,
            })
        );
    }
}
