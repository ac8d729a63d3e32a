//! Metadata request parsing (Version: 0).

use nom::IResult;
use nombytes::NomBytes;

use crate::parser::{bytes_to_string, parse_array, parse_string};

/// Metadata request data. An empty topic list asks for every topic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataRequestData {
    pub topics: Vec<String>,
}

pub fn parse_metadata_request(s: NomBytes) -> IResult<NomBytes, MetadataRequestData> {
    let (s, names) = parse_array(parse_string)(s)?;
    let topics = names
        .iter()
        .map(bytes_to_string)
        .collect::<Result<Vec<_>, _>>()?;

    Ok((s, MetadataRequestData { topics }))
}
