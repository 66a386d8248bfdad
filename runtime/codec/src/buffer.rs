//! Opaque buffer passthrough

use crate::{expect_len, Result, ValueDecoder, ValueEncoder};

/// Identity codec for opaque byte blocks
///
/// The length is chosen by the caller: [`BufferCodec::fixed`] enforces an
/// exact length in both directions, [`BufferCodec::any`] accepts whatever the
/// device stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferCodec {
    len: Option<usize>,
}

impl BufferCodec {
    /// Buffer of exactly `len` bytes
    pub const fn fixed(len: usize) -> Self {
        Self { len: Some(len) }
    }

    /// Buffer whose length is defined by the stored data
    pub const fn any() -> Self {
        Self { len: None }
    }
}

impl ValueDecoder for BufferCodec {
    type Value = Vec<u8>;

    fn encoded_len(&self) -> Option<usize> {
        self.len
    }

    fn decode(&self, buf: &[u8]) -> Result<Vec<u8>> {
        if let Some(len) = self.len {
            expect_len(len, buf)?;
        }
        Ok(buf.to_vec())
    }
}

impl ValueEncoder for BufferCodec {
    fn encode(&self, value: &Vec<u8>) -> Result<Vec<u8>> {
        if let Some(len) = self.len {
            expect_len(len, value)?;
        }
        Ok(value.clone())
    }
}
