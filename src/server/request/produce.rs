//! Produce request parsing (Version: 0).
//!
//! ```text
//! request => acks timeout_ms [topic_data]
//!   acks => INT16
//!   timeout_ms => INT32
//!   topic_data => name [partition_data]
//!     name => STRING
//!     partition_data => index message_set
//!       index => INT32
//!       message_set => BYTES
//! ```

use bytes::Bytes;
use nom::{
    IResult,
    number::complete::{be_i16, be_i32},
};
use nombytes::NomBytes;

use crate::parser::{bytes_to_string, parse_array, parse_bytes, parse_string};

/// Produce request data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceRequestData {
    pub acks: i16,
    pub timeout_ms: i32,
    pub topics: Vec<ProduceTopicData>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceTopicData {
    pub name: String,
    pub partitions: Vec<ProducePartitionData>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducePartitionData {
    pub partition_index: i32,
    pub message_set: Bytes,
}

pub fn parse_produce_request(s: NomBytes) -> IResult<NomBytes, ProduceRequestData> {
    let (s, acks) = be_i16(s)?;
    let (s, timeout_ms) = be_i32(s)?;
    let (s, topics) = parse_array(parse_produce_topic)(s)?;

    Ok((
        s,
        ProduceRequestData {
            acks,
            timeout_ms,
            topics,
        },
    ))
}

fn parse_produce_topic(s: NomBytes) -> IResult<NomBytes, ProduceTopicData> {
    let (s, name) = parse_string(s)?;
    let (s, partitions) = parse_array(parse_produce_partition)(s)?;

    Ok((
        s,
        ProduceTopicData {
            name: bytes_to_string(&name)?,
            partitions,
        },
    ))
}

fn parse_produce_partition(s: NomBytes) -> IResult<NomBytes, ProducePartitionData> {
    let (s, partition_index) = be_i32(s)?;
    let (s, message_set) = parse_bytes(s)?;

    Ok((
        s,
        ProducePartitionData {
            partition_index,
            message_set,
        },
    ))
}
