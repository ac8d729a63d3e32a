//! Internal ListOffsets (Version: 0).
//!
//! ```text
//! request  => timestamp max_num_offsets
//!   timestamp => INT64
//!   max_num_offsets => INT32
//! response => error_code [offset]
//!   error_code => INT16
//!   offset => INT64
//! ```

use bytes::{BufMut, Bytes};
use nom::{
    IResult,
    number::complete::{be_i32, be_i64},
};
use nombytes::NomBytes;

use crate::encode::{ToByte, encode_array};
use crate::error::{Error, KafkaCode, Result};
use crate::parser::{parse_array, parse_error_code};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InternalListOffsetsRequest {
    pub timestamp: i64,
    pub max_num_offsets: i32,
}

impl ToByte for InternalListOffsetsRequest {
    fn encode<T: BufMut>(&self, buffer: &mut T) -> Result<()> {
        self.timestamp.encode(buffer)?;
        self.max_num_offsets.encode(buffer)
    }
}

pub fn parse_internal_list_offsets_request(
    s: NomBytes,
) -> IResult<NomBytes, InternalListOffsetsRequest> {
    let (s, timestamp) = be_i64(s)?;
    let (s, max_num_offsets) = be_i32(s)?;
    Ok((
        s,
        InternalListOffsetsRequest {
            timestamp,
            max_num_offsets,
        },
    ))
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InternalListOffsetsResponse {
    pub error_code: KafkaCode,
    pub offsets: Vec<i64>,
}

impl InternalListOffsetsResponse {
    pub fn error(error_code: KafkaCode) -> Self {
        Self {
            error_code,
            offsets: Vec::new(),
        }
    }

    pub fn parse(data: Bytes) -> Result<Self> {
        let (_, response) = parse_internal_list_offsets_response(NomBytes::new(data.clone()))
            .map_err(|_| Error::ParsingError(data))?;
        Ok(response)
    }
}

impl ToByte for InternalListOffsetsResponse {
    fn encode<T: BufMut>(&self, buffer: &mut T) -> Result<()> {
        self.error_code.encode(buffer)?;
        encode_array(buffer, &self.offsets)
    }
}

pub fn parse_internal_list_offsets_response(
    s: NomBytes,
) -> IResult<NomBytes, InternalListOffsetsResponse> {
    let (s, error_code) = parse_error_code(s)?;
    let (s, offsets) = parse_array(be_i64)(s)?;
    Ok((s, InternalListOffsetsResponse { error_code, offsets }))
}
