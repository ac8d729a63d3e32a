//! Crate & protocol level errors.
//!
//! Two layers of failure live here:
//!
//! - [`Error`]: faults raised by I/O, parsing, storage and request plumbing.
//!   These never cross the partition boundary as values of a response.
//! - [`KafkaCode`]: wire error codes carried inside responses. Every
//!   per-partition outcome, success or failure, is reported as one of these.

use bytes::Bytes;
use num_derive::FromPrimitive;
use std::{io, result};
use thiserror::Error as ThisError;

pub type Result<T> = result::Result<T, Error>;

/// Protocol, storage and connection level errors.
#[derive(Clone, Debug, ThisError)]
pub enum Error {
    /// An error in the network.
    #[error("IO error: {0:?}")]
    IoError(io::ErrorKind),

    /// Could not parse the data.
    #[error("Parsing error: invalid data ({} bytes)", .0.len())]
    ParsingError(Bytes),

    /// Missing data or connection closed.
    #[error("Missing data: {0}")]
    MissingData(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The partition key-value store failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Only version 0 of each API is served.
    #[error("Unsupported version {api_version} of api {api_key}")]
    UnsupportedVersion { api_key: i16, api_version: i16 },

    #[error("Unknown api key {0}")]
    UnknownApiKey(i16),

    /// A request reused a correlation id that is still in flight.
    #[error("Correlation id {0} is already in flight")]
    DuplicateCorrelationId(i32),

    /// The connection to a partition went away before the message was sent.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The request was abandoned because its owning session closed.
    #[error("Request aborted")]
    Aborted,
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Error::IoError(a), Error::IoError(b)) => a == b,
            (Error::ParsingError(a), Error::ParsingError(b)) => a == b,
            (Error::MissingData(a), Error::MissingData(b)) => a == b,
            (Error::Config(a), Error::Config(b)) => a == b,
            (Error::Storage(a), Error::Storage(b)) => a == b,
            (
                Error::UnsupportedVersion {
                    api_key: a,
                    api_version: av,
                },
                Error::UnsupportedVersion {
                    api_key: b,
                    api_version: bv,
                },
            ) => a == b && av == bv,
            (Error::UnknownApiKey(a), Error::UnknownApiKey(b)) => a == b,
            (Error::DuplicateCorrelationId(a), Error::DuplicateCorrelationId(b)) => a == b,
            (Error::ConnectionClosed, Error::ConnectionClosed) => true,
            (Error::Aborted, Error::Aborted) => true,
            _ => false,
        }
    }
}

impl Eq for Error {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::IoError(e.kind())
    }
}

impl From<slatedb::Error> for Error {
    fn from(e: slatedb::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

impl From<object_store::Error> for Error {
    fn from(e: object_store::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Config(e.to_string())
    }
}

/// Error codes carried in Kafka v0 responses.
/// See also [Kafka Errors](http://kafka.apache.org/protocol.html)
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, FromPrimitive, Default)]
#[repr(i16)]
pub enum KafkaCode {
    /// An unexpected server error: storage faults, unsupported message
    /// attributes or format markers.
    Unknown = -1,
    #[default]
    None = 0,
    /// The requested offset is outside `[0, high watermark]`.
    OffsetOutOfRange = 1,
    /// A message's contents do not match its CRC.
    CorruptMessage = 2,
    /// The topic or partition is not in the cluster directory.
    UnknownTopicOrPartition = 3,
    /// A message declared a negative (or impossibly small) size.
    InvalidMessageSize = 4,
    LeaderNotAvailable = 5,
    NotLeaderForPartition = 6,
    /// The request deadline passed before every partition answered.
    RequestTimedOut = 7,
    BrokerNotAvailable = 8,
    ReplicaNotAvailable = 9,
    /// A single message cannot fit into one chunk.
    MessageSizeTooLarge = 10,
    /// The connection to a partition closed while a sub-request was outstanding.
    NetworkException = 13,
}

impl KafkaCode {
    /// Decode a wire value, mapping anything unrecognised to [`KafkaCode::Unknown`].
    pub fn from_wire(value: i16) -> Self {
        num_traits::FromPrimitive::from_i16(value).unwrap_or(KafkaCode::Unknown)
    }

    pub fn is_ok(self) -> bool {
        self == KafkaCode::None
    }
}

impl From<KafkaCode> for i16 {
    fn from(code: KafkaCode) -> Self {
        code as i16
    }
}
