//! The persisted write position of a partition log.

use bytes::{BufMut, Bytes, BytesMut};
use nom::{IResult, number::complete::be_i64};
use nombytes::NomBytes;

use crate::encode::{ToByte, encode_array};
use crate::error::{Error, Result};
use crate::parser::parse_array;

/// `next_offset` plus the start offset of every chunk, in creation order.
///
/// The last entry of `chunk_offsets` is the writable chunk, and
/// `next_offset` equals its start plus the number of frames it holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    pub next_offset: i64,
    pub chunk_offsets: Vec<i64>,
}

impl Cursor {
    /// Start offset of the writable chunk, if any chunk exists.
    pub fn current_chunk(&self) -> Option<i64> {
        self.chunk_offsets.last().copied()
    }

    /// Index into `chunk_offsets` of the chunk a read at `offset` should
    /// start from: the last chunk starting at or before `offset`, or the most
    /// recent chunk when `offset` lies past every recorded start.
    pub fn start_chunk_index(&self, offset: i64) -> Option<usize> {
        if self.chunk_offsets.is_empty() {
            return None;
        }
        match self.chunk_offsets.iter().position(|start| offset < *start) {
            Some(0) => Some(0),
            Some(right) => Some(right - 1),
            None => Some(self.chunk_offsets.len() - 1),
        }
    }

    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(8 + 4 + self.chunk_offsets.len() * 8);
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    pub fn from_bytes(data: Bytes) -> Result<Self> {
        let (_, cursor) =
            parse_cursor(NomBytes::new(data.clone())).map_err(|_| Error::ParsingError(data))?;
        Ok(cursor)
    }
}

impl ToByte for Cursor {
    fn encode<T: BufMut>(&self, buffer: &mut T) -> Result<()> {
        self.next_offset.encode(buffer)?;
        encode_array(buffer, &self.chunk_offsets)
    }
}

pub fn parse_cursor(s: NomBytes) -> IResult<NomBytes, Cursor> {
    let (s, next_offset) = be_i64(s)?;
    let (s, chunk_offsets) = parse_array(be_i64)(s)?;
    Ok((
        s,
        Cursor {
            next_offset,
            chunk_offsets,
        },
    ))
}
