//! Internal sub-request codec.
//!
//! Partition sub-requests reuse the Kafka request header
//! (`api_key i16, api_version i16, correlation_id i32, client_id`), followed
//! by a body specific to the partition API. Every sub-response is the
//! correlation id echoed verbatim, followed by the body.

pub mod fetch;
pub mod list_offsets;
pub mod produce;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use nom::{
    IResult,
    number::complete::{be_i16, be_i32},
};
use nombytes::NomBytes;

use crate::constants::SUPPORTED_API_VERSION;
use crate::encode::ToByte;
use crate::error::{Error, Result};
use crate::parser::{bytes_to_string_opt, parse_nullable_string};

pub use fetch::{InternalFetchRequest, InternalFetchResponse};
pub use list_offsets::{InternalListOffsetsRequest, InternalListOffsetsResponse};
pub use produce::{InternalProduceRequest, InternalProduceResponse};

/// APIs served by a partition. Values match the Kafka api keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum PartitionApiKey {
    Produce = 0,
    Fetch = 1,
    ListOffsets = 2,
}

impl TryFrom<i16> for PartitionApiKey {
    type Error = Error;

    fn try_from(value: i16) -> Result<Self> {
        match value {
            0 => Ok(PartitionApiKey::Produce),
            1 => Ok(PartitionApiKey::Fetch),
            2 => Ok(PartitionApiKey::ListOffsets),
            n => Err(Error::UnknownApiKey(n)),
        }
    }
}

impl From<PartitionApiKey> for i16 {
    fn from(key: PartitionApiKey) -> Self {
        key as i16
    }
}

impl PartitionApiKey {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            PartitionApiKey::Produce => "Produce",
            PartitionApiKey::Fetch => "Fetch",
            PartitionApiKey::ListOffsets => "ListOffsets",
        }
    }
}

/// Header of every internal sub-request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalRequestHeader {
    pub api_key: PartitionApiKey,
    pub api_version: i16,
    pub correlation_id: i32,
    pub client_id: Option<String>,
}

impl InternalRequestHeader {
    pub fn new(api_key: PartitionApiKey, correlation_id: i32, client_id: Option<String>) -> Self {
        Self {
            api_key,
            api_version: SUPPORTED_API_VERSION,
            correlation_id,
            client_id,
        }
    }
}

impl ToByte for InternalRequestHeader {
    fn encode<T: BufMut>(&self, buffer: &mut T) -> Result<()> {
        i16::from(self.api_key).encode(buffer)?;
        self.api_version.encode(buffer)?;
        self.correlation_id.encode(buffer)?;
        self.client_id.encode(buffer)
    }
}

fn parse_raw_header(s: NomBytes) -> IResult<NomBytes, (i16, i16, i32, Option<String>)> {
    let (s, api_key) = be_i16(s)?;
    let (s, api_version) = be_i16(s)?;
    let (s, correlation_id) = be_i32(s)?;
    let (s, client_id) = parse_nullable_string(s)?;
    let client_id = bytes_to_string_opt(client_id)?;
    Ok((s, (api_key, api_version, correlation_id, client_id)))
}

/// A decoded sub-request as received by a partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalRequest {
    Produce(InternalRequestHeader, InternalProduceRequest),
    Fetch(InternalRequestHeader, InternalFetchRequest),
    ListOffsets(InternalRequestHeader, InternalListOffsetsRequest),
}

impl InternalRequest {
    pub fn header(&self) -> &InternalRequestHeader {
        match self {
            InternalRequest::Produce(h, _) => h,
            InternalRequest::Fetch(h, _) => h,
            InternalRequest::ListOffsets(h, _) => h,
        }
    }

    /// Parse a sub-request from raw bytes.
    pub fn parse(data: Bytes) -> Result<Self> {
        let input = NomBytes::new(data.clone());
        let (remaining, (api_key, api_version, correlation_id, client_id)) =
            parse_raw_header(input).map_err(|_| Error::ParsingError(data.clone()))?;

        let api_key = PartitionApiKey::try_from(api_key)?;
        if api_version != SUPPORTED_API_VERSION {
            return Err(Error::UnsupportedVersion {
                api_key: api_key.into(),
                api_version,
            });
        }
        let header = InternalRequestHeader {
            api_key,
            api_version,
            correlation_id,
            client_id,
        };

        match api_key {
            PartitionApiKey::Produce => {
                let (_, body) = produce::parse_internal_produce_request(remaining)
                    .map_err(|_| Error::ParsingError(data))?;
                Ok(InternalRequest::Produce(header, body))
            }
            PartitionApiKey::Fetch => {
                let (_, body) = fetch::parse_internal_fetch_request(remaining)
                    .map_err(|_| Error::ParsingError(data))?;
                Ok(InternalRequest::Fetch(header, body))
            }
            PartitionApiKey::ListOffsets => {
                let (_, body) = list_offsets::parse_internal_list_offsets_request(remaining)
                    .map_err(|_| Error::ParsingError(data))?;
                Ok(InternalRequest::ListOffsets(header, body))
            }
        }
    }
}

/// Encode a sub-request: header followed by body.
pub fn encode_internal_request<B: ToByte>(header: &InternalRequestHeader, body: &B) -> Result<Bytes> {
    let mut buffer = BytesMut::with_capacity(64);
    header.encode(&mut buffer)?;
    body.encode(&mut buffer)?;
    Ok(buffer.freeze())
}

/// Encode a sub-response: the echoed correlation id followed by body.
pub fn encode_internal_response<B: ToByte>(correlation_id: i32, body: &B) -> Result<Bytes> {
    let mut buffer = BytesMut::with_capacity(64);
    correlation_id.encode(&mut buffer)?;
    body.encode(&mut buffer)?;
    Ok(buffer.freeze())
}

/// Split the leading correlation id off a sub-response.
pub fn split_correlation_id(mut message: Bytes) -> Option<(i32, Bytes)> {
    if message.len() < 4 {
        return None;
    }
    let correlation_id = message.get_i32();
    Some((correlation_id, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_api_key_conversion() {
        assert_eq!(PartitionApiKey::try_from(0).unwrap(), PartitionApiKey::Produce);
        assert_eq!(PartitionApiKey::try_from(2).unwrap(), PartitionApiKey::ListOffsets);
        assert_eq!(PartitionApiKey::try_from(3), Err(Error::UnknownApiKey(3)));
        assert_eq!(i16::from(PartitionApiKey::Fetch), 1);
    }

    #[test]
    fn test_header_wire_format() {
        let header = InternalRequestHeader::new(PartitionApiKey::Fetch, 7, Some("c".to_string()));
        let mut buf = Vec::new();
        header.encode(&mut buf).unwrap();
        assert_eq!(buf, vec![0, 1, 0, 0, 0, 0, 0, 7, 0, 1, b'c']);
    }

    #[test]
    fn test_parse_produce_request() {
        let header = InternalRequestHeader::new(PartitionApiKey::Produce, 42, None);
        let body = InternalProduceRequest {
            acks: 1,
            message_set: Bytes::from_static(b"abc"),
        };
        let bytes = encode_internal_request(&header, &body).unwrap();
        assert_eq!(
            InternalRequest::parse(bytes).unwrap(),
            InternalRequest::Produce(header, body)
        );
    }

    #[test]
    fn test_parse_rejects_unsupported_version() {
        let mut header = InternalRequestHeader::new(PartitionApiKey::ListOffsets, 1, None);
        header.api_version = 1;
        let body = InternalListOffsetsRequest {
            timestamp: -1,
            max_num_offsets: 1,
        };
        let bytes = encode_internal_request(&header, &body).unwrap();
        assert_eq!(
            InternalRequest::parse(bytes),
            Err(Error::UnsupportedVersion {
                api_key: 2,
                api_version: 1
            })
        );
    }

    #[test]
    fn test_parse_rejects_unknown_key_and_truncation() {
        let bytes = Bytes::from_static(&[0, 9, 0, 0, 0, 0, 0, 1, 0xff, 0xff]);
        assert_eq!(InternalRequest::parse(bytes), Err(Error::UnknownApiKey(9)));

        let truncated = Bytes::from_static(&[0, 1, 0, 0, 0, 0, 0, 1, 0xff, 0xff, 0, 0]);
        assert!(matches!(
            InternalRequest::parse(truncated),
            Err(Error::ParsingError(_))
        ));
    }

    #[test]
    fn test_split_correlation_id() {
        let body = InternalProduceResponse {
            error_code: crate::error::KafkaCode::None,
            base_offset: 3,
        };
        let bytes = encode_internal_response(-5, &body).unwrap();
        let (correlation_id, rest) = split_correlation_id(bytes).unwrap();
        assert_eq!(correlation_id, -5);
        assert_eq!(rest.len(), 2 + 8);
        assert_eq!(split_correlation_id(Bytes::from_static(&[1, 2])), None);
    }
}
