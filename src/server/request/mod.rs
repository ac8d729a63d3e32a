//! Request parsing for incoming Kafka protocol messages.
//!
//! Only version 0 of Produce, Fetch, ListOffsets and Metadata is served.

mod fetch;
mod metadata;
mod offsets;
mod produce;

use bytes::Bytes;
use nom::{
    IResult,
    number::complete::{be_i16, be_i32},
};
use nombytes::NomBytes;

use crate::constants::SUPPORTED_API_VERSION;
use crate::error::{Error, Result};
use crate::parser::{bytes_to_string_opt, parse_nullable_string};

pub use fetch::*;
pub use metadata::*;
pub use offsets::*;
pub use produce::*;

/// API keys for the Kafka protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKey {
    Produce,
    Fetch,
    ListOffsets,
    Metadata,
    Unknown(i16),
}

impl From<i16> for ApiKey {
    fn from(value: i16) -> Self {
        match value {
            0 => ApiKey::Produce,
            1 => ApiKey::Fetch,
            2 => ApiKey::ListOffsets,
            3 => ApiKey::Metadata,
            n => ApiKey::Unknown(n),
        }
    }
}

impl From<ApiKey> for i16 {
    fn from(key: ApiKey) -> Self {
        match key {
            ApiKey::Produce => 0,
            ApiKey::Fetch => 1,
            ApiKey::ListOffsets => 2,
            ApiKey::Metadata => 3,
            ApiKey::Unknown(n) => n,
        }
    }
}

impl ApiKey {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiKey::Produce => "Produce",
            ApiKey::Fetch => "Fetch",
            ApiKey::ListOffsets => "ListOffsets",
            ApiKey::Metadata => "Metadata",
            ApiKey::Unknown(_) => "Unknown",
        }
    }
}

/// Parsed request header from incoming Kafka messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeader {
    pub api_key: ApiKey,
    pub api_version: i16,
    pub correlation_id: i32,
    pub client_id: Option<String>,
}

pub fn parse_request_header(s: NomBytes) -> IResult<NomBytes, RequestHeader> {
    let (s, api_key) = be_i16(s)?;
    let (s, api_version) = be_i16(s)?;
    let (s, correlation_id) = be_i32(s)?;
    let (s, client_id) = parse_nullable_string(s)?;

    Ok((
        s,
        RequestHeader {
            api_key: ApiKey::from(api_key),
            api_version,
            correlation_id,
            client_id: bytes_to_string_opt(client_id)?,
        },
    ))
}

/// Parsed Kafka request with header and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Produce(RequestHeader, ProduceRequestData),
    Fetch(RequestHeader, FetchRequestData),
    ListOffsets(RequestHeader, ListOffsetsRequestData),
    Metadata(RequestHeader, MetadataRequestData),
}

impl Request {
    pub fn header(&self) -> &RequestHeader {
        match self {
            Request::Produce(h, _) => h,
            Request::Fetch(h, _) => h,
            Request::ListOffsets(h, _) => h,
            Request::Metadata(h, _) => h,
        }
    }

    /// Parse a request from raw bytes (without the size prefix).
    ///
    /// Unknown api keys and versions other than 0 are errors.
    pub fn parse(data: Bytes) -> Result<Self> {
        let input = NomBytes::new(data.clone());
        let (remaining, header) =
            parse_request_header(input).map_err(|_| Error::ParsingError(data.clone()))?;

        if header.api_version != SUPPORTED_API_VERSION {
            return Err(Error::UnsupportedVersion {
                api_key: header.api_key.into(),
                api_version: header.api_version,
            });
        }

        match header.api_key {
            ApiKey::Produce => {
                let (_, body) =
                    parse_produce_request(remaining).map_err(|_| Error::ParsingError(data))?;
                Ok(Request::Produce(header, body))
            }
            ApiKey::Fetch => {
                let (_, body) =
                    parse_fetch_request(remaining).map_err(|_| Error::ParsingError(data))?;
                Ok(Request::Fetch(header, body))
            }
            ApiKey::ListOffsets => {
                let (_, body) =
                    parse_list_offsets_request(remaining).map_err(|_| Error::ParsingError(data))?;
                Ok(Request::ListOffsets(header, body))
            }
            ApiKey::Metadata => {
                let (_, body) =
                    parse_metadata_request(remaining).map_err(|_| Error::ParsingError(data))?;
                Ok(Request::Metadata(header, body))
            }
            ApiKey::Unknown(n) => Err(Error::UnknownApiKey(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;

    /// Helper to build a request header in wire format
    fn build_header(
        api_key: i16,
        api_version: i16,
        correlation_id: i32,
        client_id: Option<&str>,
    ) -> Vec<u8> {
        let mut data = Vec::new();
        data.put_i16(api_key);
        data.put_i16(api_version);
        data.put_i32(correlation_id);
        match client_id {
            Some(s) => {
                data.put_i16(s.len() as i16);
                data.extend_from_slice(s.as_bytes());
            }
            None => data.put_i16(-1),
        }
        data
    }

    fn put_string(data: &mut Vec<u8>, s: &str) {
        data.put_i16(s.len() as i16);
        data.extend_from_slice(s.as_bytes());
    }

    #[test]
    fn test_api_key_conversion() {
        assert_eq!(ApiKey::from(0), ApiKey::Produce);
        assert_eq!(ApiKey::from(3), ApiKey::Metadata);
        assert_eq!(ApiKey::from(18), ApiKey::Unknown(18));
        for i in 0..=5 {
            assert_eq!(i16::from(ApiKey::from(i)), i);
        }
    }

    #[test]
    fn test_parse_request_header() {
        let data = build_header(1, 0, 12345, Some("test-client"));
        let (_, header) = parse_request_header(NomBytes::new(Bytes::from(data))).unwrap();

        assert_eq!(header.api_key, ApiKey::Fetch);
        assert_eq!(header.api_version, 0);
        assert_eq!(header.correlation_id, 12345);
        assert_eq!(header.client_id, Some("test-client".to_string()));
    }

    #[test]
    fn test_parse_produce_request() {
        let mut data = build_header(0, 0, 7, None);
        data.put_i16(1); // acks
        data.put_i32(1500); // timeout
        data.put_i32(1); // topics
        put_string(&mut data, "events");
        data.put_i32(2); // partitions
        data.put_i32(0);
        data.put_i32(3);
        data.extend_from_slice(b"abc");
        data.put_i32(1);
        data.put_i32(-1);

        let request = Request::parse(Bytes::from(data)).unwrap();
        let Request::Produce(header, body) = request else {
            panic!("Expected Produce request");
        };
        assert_eq!(header.correlation_id, 7);
        assert_eq!(body.acks, 1);
        assert_eq!(body.timeout_ms, 1500);
        assert_eq!(body.topics[0].name, "events");
        assert_eq!(body.topics[0].partitions[0].message_set.as_ref(), b"abc");
        assert_eq!(body.topics[0].partitions[1].partition_index, 1);
        assert!(body.topics[0].partitions[1].message_set.is_empty());
    }

    #[test]
    fn test_parse_fetch_request() {
        let mut data = build_header(1, 0, 8, Some("c"));
        data.put_i32(-1); // replica
        data.put_i32(500); // max wait
        data.put_i32(1); // min bytes
        data.put_i32(1);
        put_string(&mut data, "events");
        data.put_i32(1);
        data.put_i32(4);
        data.put_i64(42);
        data.put_i32(1024);

        let Request::Fetch(_, body) = Request::parse(Bytes::from(data)).unwrap() else {
            panic!("Expected Fetch request");
        };
        assert_eq!(body.max_wait_ms, 500);
        assert_eq!(body.min_bytes, 1);
        assert_eq!(
            body.topics[0].partitions[0],
            FetchPartitionData {
                partition_index: 4,
                fetch_offset: 42,
                max_bytes: 1024
            }
        );
    }

    #[test]
    fn test_parse_list_offsets_request() {
        let mut data = build_header(2, 0, 9, None);
        data.put_i32(-1);
        data.put_i32(1);
        put_string(&mut data, "events");
        data.put_i32(1);
        data.put_i32(0);
        data.put_i64(-2);
        data.put_i32(1);

        let Request::ListOffsets(_, body) = Request::parse(Bytes::from(data)).unwrap() else {
            panic!("Expected ListOffsets request");
        };
        assert_eq!(body.topics[0].partitions[0].timestamp, -2);
        assert_eq!(body.topics[0].partitions[0].max_num_offsets, 1);
    }

    #[test]
    fn test_parse_metadata_request() {
        let mut data = build_header(3, 0, 10, None);
        data.put_i32(2);
        put_string(&mut data, "a");
        put_string(&mut data, "b");

        let Request::Metadata(_, body) = Request::parse(Bytes::from(data)).unwrap() else {
            panic!("Expected Metadata request");
        };
        assert_eq!(body.topics, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_rejects_other_versions_and_apis() {
        let data = build_header(3, 1, 1, None);
        assert_eq!(
            Request::parse(Bytes::from(data)),
            Err(Error::UnsupportedVersion {
                api_key: 3,
                api_version: 1
            })
        );

        let data = build_header(18, 0, 1, None);
        assert_eq!(
            Request::parse(Bytes::from(data)),
            Err(Error::UnknownApiKey(18))
        );
    }

    #[test]
    fn test_truncated_body_is_parse_error() {
        let mut data = build_header(1, 0, 1, None);
        data.put_i32(-1);
        assert!(matches!(
            Request::parse(Bytes::from(data)),
            Err(Error::ParsingError(_))
        ));
    }
}
