//! Internal Fetch (Version: 0).
//!
//! ```text
//! request  => max_wait_ms fetch_offset min_bytes max_bytes
//!   max_wait_ms => INT32
//!   fetch_offset => INT64
//!   min_bytes => INT32
//!   max_bytes => INT32
//! response => error_code high_watermark message_set
//!   error_code => INT16
//!   high_watermark => INT64
//!   message_set => BYTES
//! ```

use bytes::{BufMut, Bytes};
use nom::{
    IResult,
    number::complete::{be_i32, be_i64},
};
use nombytes::NomBytes;

use crate::encode::ToByte;
use crate::error::{Error, KafkaCode, Result};
use crate::parser::{parse_bytes, parse_error_code};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InternalFetchRequest {
    pub max_wait_ms: i32,
    pub fetch_offset: i64,
    pub min_bytes: i32,
    pub max_bytes: i32,
}

impl ToByte for InternalFetchRequest {
    fn encode<T: BufMut>(&self, buffer: &mut T) -> Result<()> {
        self.max_wait_ms.encode(buffer)?;
        self.fetch_offset.encode(buffer)?;
        self.min_bytes.encode(buffer)?;
        self.max_bytes.encode(buffer)
    }
}

pub fn parse_internal_fetch_request(s: NomBytes) -> IResult<NomBytes, InternalFetchRequest> {
    let (s, max_wait_ms) = be_i32(s)?;
    let (s, fetch_offset) = be_i64(s)?;
    let (s, min_bytes) = be_i32(s)?;
    let (s, max_bytes) = be_i32(s)?;
    Ok((
        s,
        InternalFetchRequest {
            max_wait_ms,
            fetch_offset,
            min_bytes,
            max_bytes,
        },
    ))
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InternalFetchResponse {
    pub error_code: KafkaCode,
    pub high_watermark: i64,
    pub message_set: Bytes,
}

impl InternalFetchResponse {
    /// A response carrying no data.
    pub fn error(error_code: KafkaCode, high_watermark: i64) -> Self {
        Self {
            error_code,
            high_watermark,
            message_set: Bytes::new(),
        }
    }

    pub fn parse(data: Bytes) -> Result<Self> {
        let (_, response) = parse_internal_fetch_response(NomBytes::new(data.clone()))
            .map_err(|_| Error::ParsingError(data))?;
        Ok(response)
    }
}

impl ToByte for InternalFetchResponse {
    fn encode<T: BufMut>(&self, buffer: &mut T) -> Result<()> {
        self.error_code.encode(buffer)?;
        self.high_watermark.encode(buffer)?;
        self.message_set.encode(buffer)
    }
}

pub fn parse_internal_fetch_response(s: NomBytes) -> IResult<NomBytes, InternalFetchResponse> {
    let (s, error_code) = parse_error_code(s)?;
    let (s, high_watermark) = be_i64(s)?;
    let (s, message_set) = parse_bytes(s)?;
    Ok((
        s,
        InternalFetchResponse {
            error_code,
            high_watermark,
            message_set,
        },
    ))
}
