//! Internal Produce (Version: 0).
//!
//! ```text
//! request  => acks message_set
//!   acks => INT16
//!   message_set => BYTES
//! response => error_code base_offset
//!   error_code => INT16
//!   base_offset => INT64
//! ```

use bytes::{BufMut, Bytes};
use nom::{
    IResult,
    number::complete::{be_i16, be_i64},
};
use nombytes::NomBytes;

use crate::encode::ToByte;
use crate::error::{Error, KafkaCode, Result};
use crate::parser::{parse_bytes, parse_error_code};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalProduceRequest {
    pub acks: i16,
    pub message_set: Bytes,
}

impl ToByte for InternalProduceRequest {
    fn encode<T: BufMut>(&self, buffer: &mut T) -> Result<()> {
        self.acks.encode(buffer)?;
        self.message_set.encode(buffer)
    }
}

pub fn parse_internal_produce_request(s: NomBytes) -> IResult<NomBytes, InternalProduceRequest> {
    let (s, acks) = be_i16(s)?;
    let (s, message_set) = parse_bytes(s)?;
    Ok((s, InternalProduceRequest { acks, message_set }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InternalProduceResponse {
    pub error_code: KafkaCode,
    pub base_offset: i64,
}

impl InternalProduceResponse {
    pub fn error(error_code: KafkaCode) -> Self {
        Self {
            error_code,
            base_offset: 0,
        }
    }

    pub fn parse(data: Bytes) -> Result<Self> {
        let (_, response) = parse_internal_produce_response(NomBytes::new(data.clone()))
            .map_err(|_| Error::ParsingError(data))?;
        Ok(response)
    }
}

impl ToByte for InternalProduceResponse {
    fn encode<T: BufMut>(&self, buffer: &mut T) -> Result<()> {
        self.error_code.encode(buffer)?;
        self.base_offset.encode(buffer)
    }
}

pub fn parse_internal_produce_response(s: NomBytes) -> IResult<NomBytes, InternalProduceResponse> {
    let (s, error_code) = parse_error_code(s)?;
    let (s, base_offset) = be_i64(s)?;
    Ok((
        s,
        InternalProduceResponse {
            error_code,
            base_offset,
        },
    ))
}
