//! Response encoding for outgoing Kafka protocol messages.

mod fetch;
mod metadata;
mod offsets;
mod produce;

use bytes::{BufMut, Bytes, BytesMut};

use crate::encode::ToByte;
use crate::error::Result;

pub use fetch::*;
pub use metadata::*;
pub use offsets::*;
pub use produce::*;

/// Response wrapper that includes correlation ID and response body.
pub struct Response {
    pub correlation_id: i32,
    body: Vec<u8>,
}

impl Response {
    pub fn new<T: ToByte>(correlation_id: i32, body: &T) -> Result<Self> {
        let mut buf = Vec::new();
        body.encode(&mut buf)?;
        Ok(Self {
            correlation_id,
            body: buf,
        })
    }

    /// Encode as a size-prefixed frame: `size i32, correlation_id i32, body`.
    pub fn encode_with_size(&self) -> Result<Bytes> {
        let total_size = (4 + self.body.len()) as i32;
        let mut result = BytesMut::with_capacity(4 + total_size as usize);
        total_size.encode(&mut result)?;
        self.correlation_id.encode(&mut result)?;
        result.put_slice(&self.body);
        Ok(result.freeze())
    }
}
