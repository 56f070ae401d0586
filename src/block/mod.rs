
//! Divide the scan lines of an image into blocks.
//! Each block is compressed on its own and stored as one chunk in the file.

pub mod chunk;
pub mod lines;

use crate::compression::{ByteVec, Compression};
use crate::error::{Error, Result};
use crate::math::RoundingMode;
use crate::meta::attribute::{ChannelList, IntegerBounds};
use crate::meta::header::Header;
use self::chunk::Chunk;


/// Specifies where a block of scan lines lies inside the image.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub struct BlockIndex {

    /// Position of the block in the offset table.
    pub index: usize,

    /// The first scan line of this block.
    pub y: i32,

    /// Number of scan lines in this block. Only the last block may contain fewer lines.
    pub line_count: usize,
}

impl BlockIndex {

    /// The scan lines of this block, from top to bottom.
    pub fn lines(self) -> impl Iterator<Item = i32> {
        (0 .. self.line_count).map(move |line| self.y + line as i32)
    }

    /// The last scan line of this block.
    pub fn last_line(self) -> i32 {
        self.y + self.line_count as i32 - 1
    }
}


/// How the scan lines of an image are divided into blocks,
/// and how many bytes each line occupies.
#[derive(Clone, Debug, PartialEq)]
pub struct ScanLineBlocks {

    /// The region that contains pixel data.
    pub data_window: IntegerBounds,

    /// The compression method of all blocks.
    pub compression: Compression,

    /// Number of scan lines in a complete block.
    pub lines_per_block: usize,

    /// The channels of the image, sorted by name, as they appear inside each line.
    pub channels: ChannelList,
}

impl ScanLineBlocks {

    /// The block layout of a validated header.
    pub fn new(header: &Header) -> Self {
        ScanLineBlocks {
            data_window: header.data_window,
            compression: header.compression,
            lines_per_block: header.compression.scan_lines_per_block(),
            channels: header.channel_list(),
        }
    }

    /// Number of blocks, which is also the number of entries in the offset table.
    pub fn block_count(&self) -> usize {
        RoundingMode::Up.divide(self.data_window.size.height(), self.lines_per_block)
    }

    /// The block with the specified position in the offset table.
    pub fn block(&self, index: usize) -> Result<BlockIndex> {
        if index >= self.block_count() {
            return Err(Error::invalid("block index"));
        }

        let first_line = index * self.lines_per_block;
        let line_count = self.lines_per_block.min(self.data_window.size.height() - first_line);

        Ok(BlockIndex {
            index, line_count,
            y: self.data_window.position.y() + first_line as i32,
        })
    }

    /// The position in the offset table of the block that contains the scan line.
    pub fn block_index_of_line(&self, y: i32) -> Result<usize> {
        let top = i64::from(self.data_window.position.y());
        let line = i64::from(y) - top;

        if line < 0 || line >= self.data_window.size.height() as i64 {
            return Err(Error::invalid(format!("scan line {} is outside the data window", y)));
        }

        Ok(line as usize / self.lines_per_block)
    }

    /// The block that starts at the scan line, as stored in a chunk.
    pub fn block_starting_at(&self, y: i32) -> Result<BlockIndex> {
        let block = self.block(self.block_index_of_line(y)?)?;

        if block.y != y {
            return Err(Error::invalid(format!("chunk coordinate {} is not the start of a block", y)));
        }

        Ok(block)
    }

    /// Number of bytes that the uncompressed samples of all channels of the scan line occupy.
    /// Subsampled channels do not contribute to every line.
    pub fn line_byte_size(&self, y: i32) -> usize {
        self.channels.list.iter()
            .filter(|(_, channel)| channel.has_line(y))
            .map(|(_, channel)| channel.samples_per_line(self.data_window) * channel.sample_type.bytes_per_sample())
            .sum()
    }

    /// Number of bytes of the uncompressed block.
    pub fn block_byte_size(&self, block: BlockIndex) -> usize {
        block.lines().map(|y| self.line_byte_size(y)).sum()
    }
}


/// The little-endian samples of all lines of a block.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct UncompressedBlock {

    /// Where the block lies inside the image.
    pub index: BlockIndex,

    /// The samples of each line, ordered by y, then by channel name, then by x.
    pub data: ByteVec,
}

impl UncompressedBlock {

    /// Decompress the pixels of a chunk, given its scan line coordinate and its compressed bytes.
    /// Fails if the coordinate does not start a block, or if the data is too large.
    pub fn decompress(y_coordinate: i32, compressed: &[u8], blocks: &ScanLineBlocks) -> Result<Self> {
        let index = blocks.block_starting_at(y_coordinate)?;
        let expected_byte_size = blocks.block_byte_size(index);

        if compressed.len() > expected_byte_size {
            return Err(Error::invalid("chunk is larger than its uncompressed pixels"));
        }

        let data = blocks.compression.decompress_block(compressed, expected_byte_size)?;
        Ok(UncompressedBlock { index, data })
    }

    /// Decompress a chunk that was read from a file.
    pub fn decompress_chunk(chunk: &Chunk, blocks: &ScanLineBlocks) -> Result<Self> {
        Self::decompress(chunk.y_coordinate, &chunk.compressed_pixels, blocks)
    }

    /// Compress this block, ready to be written to a file.
    pub fn compress_to_chunk(self, blocks: &ScanLineBlocks) -> Result<Chunk> {
        let y_coordinate = self.index.y;
        let compressed_pixels = blocks.compression.compress_block(self.data)?;
        Ok(Chunk { y_coordinate, compressed_pixels })
    }

    /// The bytes of each scan line in this block, from top to bottom.
    pub fn lines<'s>(&'s self, blocks: &'s ScanLineBlocks) -> impl 's + Iterator<Item = (i32, &'s [u8])> {
        let mut remaining = self.data.as_slice();

        self.index.lines().map(move |y| {
            let size = blocks.line_byte_size(y).min(remaining.len());
            let (line, rest) = remaining.split_at(size);
            remaining = rest;
            (y, line)
        })
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::meta::attribute::{Channel, SampleType};

    fn blocks(height: usize, compression: Compression) -> ScanLineBlocks {
        let header = Header::from_dimensions((3, height))
            .with_channel("Y", Channel::new(SampleType::F32)).unwrap()
            .with_channel("C", Channel::detailed(SampleType::F16, (1, 2), false)).unwrap()
            .with_compression(compression);

        ScanLineBlocks::new(&header)
    }

    #[test]
    fn last_block_is_shorter(){
        let blocks = blocks(40, Compression::ZIP16);
        assert_eq!(blocks.block_count(), 3);
        assert_eq!(blocks.block(2).unwrap(), BlockIndex { index: 2, y: 32, line_count: 8 });
        assert!(blocks.block(3).is_err());

        assert_eq!(blocks.block_index_of_line(15).unwrap(), 0);
        assert_eq!(blocks.block_index_of_line(16).unwrap(), 1);
        assert!(blocks.block_index_of_line(40).is_err());
        assert!(blocks.block_index_of_line(-1).is_err());
    }

    #[test]
    fn chunk_coordinates_start_blocks(){
        let blocks = blocks(40, Compression::ZIP16);
        assert_eq!(blocks.block_starting_at(16).unwrap().index, 1);
        assert!(blocks.block_starting_at(17).is_err());
    }

    #[test]
    fn subsampled_lines_are_smaller(){
        let blocks = blocks(4, Compression::Uncompressed);
        assert_eq!(blocks.line_byte_size(0), 3 * 4 + 3 * 2);
        assert_eq!(blocks.line_byte_size(1), 3 * 4);

        let block = blocks.block(0).unwrap();
        assert_eq!(block.line_count, 1);
        assert_eq!(blocks.block_byte_size(block), 18);
    }

    #[test]
    fn oversized_chunks_are_rejected(){
        let blocks = blocks(4, Compression::RLE);
        assert!(UncompressedBlock::decompress(0, &[0; 19], &blocks).is_err());

        let block = UncompressedBlock::decompress(0, &[7; 18], &blocks).unwrap();
        let lines: Vec<_> = block.lines(&blocks).collect();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].1.len(), 18);
    }
}
