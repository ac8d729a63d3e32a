//! Fixed-capacity chunks and the filler that copies framed messages into them.
//!
//! A chunk is the unit of persistence: a byte buffer holding a contiguous
//! run of frames plus the frame index. Chunks are append-only and are never
//! written again once a newer chunk exists.
//!
//! # Persisted Layout
//!
//! ```text
//! offset_start  i64
//! capacity      i32
//! frames        [start i32, size i32]
//! data          bytes (only the written prefix of the buffer)
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use nom::{IResult, number::complete::{be_i32, be_i64}, sequence::tuple};
use nombytes::NomBytes;

use crate::encode::{ToByte, encode_as_array};
use crate::error::{Error, Result};
use crate::parser::{parse_array, parse_bytes};

/// Byte range of one message inside a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub start: usize,
    pub size: usize,
}

impl Frame {
    #[inline]
    pub fn end(&self) -> usize {
        self.start + self.size
    }
}

/// A fixed-capacity append-only buffer of frames.
///
/// Offsets in a chunk are exactly `offset_start, offset_start + 1, ...` and
/// the written length always equals the end of the last frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    offset_start: i64,
    capacity: usize,
    data: Vec<u8>,
    frames: Vec<Frame>,
}

impl Chunk {
    pub fn new(offset_start: i64, capacity: usize) -> Self {
        Self {
            offset_start,
            capacity,
            data: Vec::with_capacity(capacity),
            frames: Vec::new(),
        }
    }

    #[inline]
    pub fn offset_start(&self) -> i64 {
        self.offset_start
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Index in the buffer where the next frame will be written.
    #[inline]
    pub fn next_index(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity - self.data.len()
    }

    #[inline]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    #[inline]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// One past the last offset held by this chunk.
    #[inline]
    pub fn end_offset(&self) -> i64 {
        self.offset_start + self.frames.len() as i64
    }

    /// Whether `offset` names a frame held by this chunk.
    pub fn contains(&self, offset: i64) -> bool {
        offset >= self.offset_start && offset < self.end_offset()
    }

    /// Bytes of the frame at `position` in this chunk.
    pub fn frame_bytes(&self, position: usize) -> Option<&[u8]> {
        let frame = self.frames.get(position)?;
        self.data.get(frame.start..frame.end())
    }

    /// Serialize for storage.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(8 + 4 + 4 + self.frames.len() * 8 + 4 + self.data.len());
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Deserialize a stored chunk, checking that the frame index agrees with
    /// the data it describes.
    pub fn from_bytes(data: Bytes) -> Result<Self> {
        let (_, chunk) = parse_chunk(NomBytes::new(data.clone()))
            .map_err(|_| Error::ParsingError(data))?;
        chunk.check()?;
        Ok(chunk)
    }

    fn check(&self) -> Result<()> {
        if self.data.len() > self.capacity {
            return Err(Error::Storage(format!(
                "chunk {} holds {} bytes over capacity {}",
                self.offset_start,
                self.data.len(),
                self.capacity
            )));
        }
        let mut expected_start = 0;
        for frame in &self.frames {
            if frame.start != expected_start || frame.size == 0 {
                return Err(Error::Storage(format!(
                    "chunk {} has a gap in its frame index",
                    self.offset_start
                )));
            }
            expected_start = frame.end();
        }
        if expected_start != self.data.len() {
            return Err(Error::Storage(format!(
                "chunk {} frame index ends at {} but data ends at {}",
                self.offset_start,
                expected_start,
                self.data.len()
            )));
        }
        Ok(())
    }
}

impl ToByte for Chunk {
    fn encode<T: BufMut>(&self, buffer: &mut T) -> Result<()> {
        self.offset_start.encode(buffer)?;
        (self.capacity as i32).encode(buffer)?;
        encode_as_array(buffer, &self.frames, |buffer, frame| {
            (frame.start as i32).encode(buffer)?;
            (frame.size as i32).encode(buffer)
        })?;
        self.data.as_slice().encode(buffer)
    }
}

fn parse_frame(s: NomBytes) -> IResult<NomBytes, Frame> {
    let (s, (start, size)) = tuple((be_i32, be_i32))(s)?;
    if start < 0 || size < 0 {
        return Err(nom::Err::Failure(nom::error::Error::new(
            s,
            nom::error::ErrorKind::Verify,
        )));
    }
    Ok((
        s,
        Frame {
            start: start as usize,
            size: size as usize,
        },
    ))
}

pub fn parse_chunk(s: NomBytes) -> IResult<NomBytes, Chunk> {
    let (s, offset_start) = be_i64(s)?;
    let (s, capacity) = be_i32(s)?;
    let (s, frames) = parse_array(parse_frame)(s)?;
    let (s, data) = parse_bytes(s)?;

    if capacity < 0 {
        return Err(nom::Err::Failure(nom::error::Error::new(
            s,
            nom::error::ErrorKind::Verify,
        )));
    }

    let capacity = capacity as usize;
    let mut buffer = Vec::with_capacity(capacity.max(data.len()));
    buffer.extend_from_slice(&data);

    Ok((
        s,
        Chunk {
            offset_start,
            capacity,
            data: buffer,
            frames,
        },
    ))
}

/// A validated, offset-stamped message set waiting to be written into one or
/// more chunks.
///
/// Frame positions are relative to the unwritten remainder of the batch.
#[derive(Debug)]
pub struct ChunkFiller {
    message_set: BytesMut,
    frames: Vec<Frame>,
}

impl ChunkFiller {
    pub(crate) fn new(message_set: BytesMut, frames: Vec<Frame>) -> Self {
        Self {
            message_set,
            frames,
        }
    }

    /// Copy as many whole frames as fit into `chunk`, returning how many were
    /// written. Frames are never split; zero means the chunk is full for the
    /// next frame.
    pub fn fill_chunk(&mut self, chunk: &mut Chunk) -> usize {
        let chunk_space = chunk.remaining();
        let frame_count = self
            .frames
            .iter()
            .position(|frame| frame.end() > chunk_space)
            .unwrap_or(self.frames.len());
        if frame_count == 0 {
            return 0;
        }

        let copy_size = self.frames[frame_count - 1].end();
        let base = chunk.next_index();
        let copied = self.message_set.split_to(copy_size);
        chunk.data.extend_from_slice(&copied);
        chunk
            .frames
            .extend(self.frames.drain(..frame_count).map(|frame| Frame {
                start: frame.start + base,
                size: frame.size,
            }));

        for frame in &mut self.frames {
            frame.start -= copy_size;
        }

        frame_count
    }

    /// Returns true when every frame has been written.
    pub fn is_done(&self) -> bool {
        self.frames.is_empty()
    }

    /// Number of frames still waiting to be written.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Size of the largest frame still waiting to be written.
    pub fn largest_frame(&self) -> usize {
        self.frames.iter().map(|frame| frame.size).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filler(sizes: &[usize]) -> ChunkFiller {
        let mut data = BytesMut::new();
        let mut frames = Vec::new();
        for (i, size) in sizes.iter().enumerate() {
            frames.push(Frame {
                start: data.len(),
                size: *size,
            });
            data.put_bytes(i as u8 + 1, *size);
        }
        ChunkFiller::new(data, frames)
    }

    #[test]
    fn test_fill_empty_chunk_with_everything() {
        let mut f = filler(&[3, 4, 5]);
        let mut chunk = Chunk::new(0, 64);
        assert_eq!(f.fill_chunk(&mut chunk), 3);
        assert!(f.is_done());
        assert_eq!(chunk.next_index(), 12);
        assert_eq!(chunk.frame_count(), 3);
        assert_eq!(chunk.frame_bytes(1), Some(&[2u8, 2, 2, 2][..]));
        assert_eq!(chunk.end_offset(), 3);
    }

    #[test]
    fn test_fill_splits_across_chunks() {
        let mut f = filler(&[4, 4, 4]);
        let mut first = Chunk::new(0, 10);
        assert_eq!(f.fill_chunk(&mut first), 2);
        assert!(!f.is_done());
        assert_eq!(f.frame_count(), 1);

        let mut second = Chunk::new(2, 10);
        assert_eq!(f.fill_chunk(&mut second), 1);
        assert!(f.is_done());
        assert_eq!(second.frames(), &[Frame { start: 0, size: 4 }]);
        assert_eq!(second.frame_bytes(0), Some(&[3u8, 3, 3, 3][..]));
    }

    #[test]
    fn test_fill_appends_after_existing_frames() {
        let mut chunk = Chunk::new(5, 20);
        let mut f = filler(&[6]);
        f.fill_chunk(&mut chunk);
        let mut g = filler(&[7]);
        assert_eq!(g.fill_chunk(&mut chunk), 1);
        assert_eq!(chunk.frames()[1], Frame { start: 6, size: 7 });
        assert_eq!(chunk.next_index(), 13);
        assert!(chunk.contains(6));
        assert!(!chunk.contains(7));
    }

    #[test]
    fn test_fill_full_chunk_returns_zero() {
        let mut chunk = Chunk::new(0, 8);
        let mut f = filler(&[6, 6]);
        assert_eq!(f.fill_chunk(&mut chunk), 1);
        assert_eq!(f.fill_chunk(&mut chunk), 0);
        assert_eq!(f.frame_count(), 1);
    }

    #[test]
    fn test_largest_frame() {
        assert_eq!(filler(&[3, 9, 2]).largest_frame(), 9);
        assert_eq!(filler(&[]).largest_frame(), 0);
    }

    #[test]
    fn test_chunk_persisted_layout() {
        let mut chunk = Chunk::new(7, 32);
        filler(&[2, 3]).fill_chunk(&mut chunk);
        let bytes = chunk.to_bytes().unwrap();

        let mut expected = BytesMut::new();
        expected.put_i64(7);
        expected.put_i32(32);
        expected.put_i32(2);
        expected.put_i32(0);
        expected.put_i32(2);
        expected.put_i32(2);
        expected.put_i32(3);
        expected.put_i32(5);
        expected.put_slice(&[1, 1, 2, 2, 2]);
        assert_eq!(bytes, expected.freeze());

        let decoded = Chunk::from_bytes(bytes).unwrap();
        assert_eq!(decoded, chunk);
        assert_eq!(decoded.remaining(), 27);
    }

    #[test]
    fn test_chunk_decode_rejects_inconsistent_index() {
        let mut buf = BytesMut::new();
        buf.put_i64(0);
        buf.put_i32(16);
        buf.put_i32(1);
        buf.put_i32(0);
        buf.put_i32(9);
        buf.put_i32(4);
        buf.put_slice(&[0; 4]);
        assert!(matches!(
            Chunk::from_bytes(buf.freeze()),
            Err(Error::Storage(_))
        ));
    }

    #[test]
    fn test_chunk_decode_truncated() {
        assert!(matches!(
            Chunk::from_bytes(Bytes::from_static(&[0, 0, 0])),
            Err(Error::ParsingError(_))
        ));
    }
}
