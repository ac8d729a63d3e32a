//! ListOffsets request parsing (Version: 0).
//!
//! ```text
//! request => replica_id [topics]
//!   topics => name [partitions]
//!     partitions => index timestamp max_num_offsets
//! ```

use nom::{
    IResult,
    number::complete::{be_i32, be_i64},
};
use nombytes::NomBytes;

use crate::parser::{bytes_to_string, parse_array, parse_string};

/// ListOffsets request data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOffsetsRequestData {
    pub replica_id: i32,
    pub topics: Vec<ListOffsetsTopicData>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOffsetsTopicData {
    pub name: String,
    pub partitions: Vec<ListOffsetsPartitionData>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListOffsetsPartitionData {
    pub partition_index: i32,
    pub timestamp: i64,
    pub max_num_offsets: i32,
}

pub fn parse_list_offsets_request(s: NomBytes) -> IResult<NomBytes, ListOffsetsRequestData> {
    let (s, replica_id) = be_i32(s)?;
    let (s, topics) = parse_array(parse_list_offsets_topic)(s)?;

    Ok((s, ListOffsetsRequestData { replica_id, topics }))
}

fn parse_list_offsets_topic(s: NomBytes) -> IResult<NomBytes, ListOffsetsTopicData> {
    let (s, name) = parse_string(s)?;
    let (s, partitions) = parse_array(parse_list_offsets_partition)(s)?;

    Ok((
        s,
        ListOffsetsTopicData {
            name: bytes_to_string(&name)?,
            partitions,
        },
    ))
}

fn parse_list_offsets_partition(s: NomBytes) -> IResult<NomBytes, ListOffsetsPartitionData> {
    let (s, partition_index) = be_i32(s)?;
    let (s, timestamp) = be_i64(s)?;
    let (s, max_num_offsets) = be_i32(s)?;

    Ok((
        s,
        ListOffsetsPartitionData {
            partition_index,
            timestamp,
            max_num_offsets,
        },
    ))
}
