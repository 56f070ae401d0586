
//! Read the header and the scan lines of a file into frame buffers.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::block::{ScanLineBlocks, UncompressedBlock};
use crate::block::chunk::{Chunk, ChunkHeader};
use crate::block::lines::ChannelBindings;
use crate::compression::Compression;
use crate::error::{usize_to_i32, Error, Result, UnitResult};
use crate::frame_buffer::FrameBuffer;
use crate::io::PeekRead;
use crate::meta::{self, MetaData, OffsetTable};
use crate::meta::header::Header;
use crate::stream::{CallbackInputStream, InputStream, MemoryInputStream};
use crate::stream::input::StreamReader;
use crate::stream::IoCallbacks;
use crate::threads::WorkerPool;


/// An open file, ready to read scan lines.
/// The header is available as soon as the file is opened.
pub struct InputFile<'s> {
    stream: Box<dyn InputStream + 's>,
    meta_data: MetaData,
    blocks: ScanLineBlocks,
    offsets: OffsetTable,
    chunks_start: u64,
    pool: WorkerPool,
}

/// An input file with a bound frame buffer.
/// Reads scan lines into the memory of the frame buffer.
pub struct ScanlineReader<'f, 's, 'm> {
    file: &'f mut InputFile<'s>,
    frame_buffer: FrameBuffer<'m>,
    bindings: ChannelBindings,
}


impl InputFile<'static> {

    /// Open the file at the path.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "opening input file");

        let file = BufReader::new(File::open(path)?);
        Self::from_stream(CallbackInputStream::new(IoCallbacks(file))?)
    }
}

impl<'s> InputFile<'s> {

    /// Read from bytes in memory. Pixels are decompressed without copying the file contents.
    pub fn from_slice(bytes: &'s [u8]) -> Result<Self> {
        Self::from_stream(MemoryInputStream::new("memory", bytes))
    }

    /// Read from any input stream, using the global worker threads.
    pub fn from_stream(stream: impl InputStream + 's) -> Result<Self> {
        Self::from_stream_with_pool(stream, WorkerPool::global())
    }

    /// Read from any input stream, decompressing with the specified worker threads.
    /// Reads the header and the offset table from the current stream position.
    pub fn from_stream_with_pool(stream: impl InputStream + 's, pool: WorkerPool) -> Result<Self> {
        let mut stream: Box<dyn InputStream + 's> = Box::new(stream);

        let (meta_data, offsets) = {
            let mut read = PeekRead::new(StreamReader::new(&mut stream));
            let meta_data = MetaData::read_from_buffered_peekable(&mut read)?;
            meta_data.header.validate()?;

            // the offset table of other layouts is not understood
            let offsets = if meta_data.requirements.is_flat_single_part_scan_lines() {
                let block_count = ScanLineBlocks::new(&meta_data.header).block_count();
                meta::read_offset_table(&mut read, block_count)?
            }
            else {
                OffsetTable::new()
            };

            (meta_data, offsets)
        };

        let header = &meta_data.header;
        tracing::debug!(
            stream = stream.name(),
            width = header.data_window.size.width(),
            height = header.data_window.size.height(),
            compression = %header.compression,
            threads = pool.thread_count(),
            "opened input file"
        );

        Ok(InputFile {
            chunks_start: stream.tell(),
            blocks: ScanLineBlocks::new(header),
            stream, meta_data, offsets, pool,
        })
    }

    /// The header of the file.
    pub fn header(&self) -> &Header {
        &self.meta_data.header
    }

    /// The header and the version flags of the file.
    pub fn meta_data(&self) -> &MetaData {
        &self.meta_data
    }

    /// Bind a frame buffer, so that pixels can be read into its memory.
    ///
    /// Fails if a slice references read-only memory,
    /// or if the sampling of a slice differs from the channel in the file.
    /// The file stays usable if binding fails.
    pub fn set_frame_buffer<'m>(&mut self, frame_buffer: FrameBuffer<'m>) -> Result<ScanlineReader<'_, 's, 'm>> {
        let bindings = ChannelBindings::for_reading(&self.blocks.channels, &frame_buffer)?;
        Ok(ScanlineReader { file: self, frame_buffer, bindings })
    }

    /// Read `line_count` scan lines, starting at `first_line`,
    /// into a frame buffer whose row zero holds the scan line `first_line`.
    /// This reads a large image piece by piece into a small buffer.
    pub fn read_pixels_partial(&mut self, first_line: i32, frame_buffer: &mut FrameBuffer<'_>, line_count: usize) -> UnitResult {
        if line_count == 0 { return Ok(()); }

        let last_line = usize_to_i32(line_count - 1, "scan line count")
            .ok().and_then(|lines| first_line.checked_add(lines))
            .ok_or_else(|| Error::invalid("scan line range"))?;

        let mut view = frame_buffer.offset_scanlines(first_line)?;
        let bindings = ChannelBindings::for_reading(&self.blocks.channels, &view)?;
        self.read_lines(&mut view, &bindings, first_line, last_line)
    }

    /// Read the inclusive range of scan lines into the frame buffer.
    fn read_lines(&mut self, frame_buffer: &mut FrameBuffer<'_>, bindings: &ChannelBindings, first_line: i32, last_line: i32) -> UnitResult {
        if !self.meta_data.requirements.is_flat_single_part_scan_lines() {
            return Err(Error::unsupported("reading tiled, deep, or multi-part files"));
        }

        self.blocks.compression.validate_supported()?;

        let first_block = self.blocks.block_index_of_line(first_line)?;
        let last_block = self.blocks.block_index_of_line(last_line)?;
        bindings.validate_coverage(frame_buffer, self.blocks.data_window, (first_line, last_line))?;

        let range = (first_line, last_line);

        if self.pool.thread_count() == 0 || self.blocks.compression == Compression::Uncompressed {
            for block_index in first_block ..= last_block {
                let block = self.read_block(block_index)?;
                unpack_lines(&self.blocks, &block, frame_buffer, bindings, range)?;
            }
        }
        else {
            let block_indices: Vec<usize> = (first_block ..= last_block).collect();

            for batch in block_indices.chunks(self.pool.batch_size()) {
                let chunks = batch.iter()
                    .map(|&block_index| self.read_chunk(block_index))
                    .collect::<Result<Vec<Chunk>>>()?;

                let blocks = &self.blocks;
                let decompressed = self.pool.map(chunks, |chunk| UncompressedBlock::decompress_chunk(&chunk, blocks));

                for (block, &block_index) in decompressed.into_iter().zip(batch) {
                    let block = validate_block_index(block?, block_index)?;
                    unpack_lines(&self.blocks, &block, frame_buffer, bindings, range)?;
                }
            }
        }

        Ok(())
    }

    /// Move the stream to the chunk of the block.
    fn seek_to_block(&mut self, block_index: usize) -> Result<usize> {
        let offset = *self.offsets.get(block_index)
            .ok_or_else(|| Error::invalid("offset table is too small"))?;

        if offset < self.chunks_start {
            return Err(Error::invalid(format!("block {} is missing from the file", block_index)));
        }

        self.stream.seek(offset)?;

        let block = self.blocks.block(block_index)?;
        Ok(self.blocks.block_byte_size(block))
    }

    /// Read the compressed bytes of the block.
    fn read_chunk(&mut self, block_index: usize) -> Result<Chunk> {
        let max_byte_size = self.seek_to_block(block_index)?;
        Chunk::read(&mut self.stream, max_byte_size)
    }

    /// Read and decompress the block, borrowing its bytes if the stream is memory mapped.
    fn read_block(&mut self, block_index: usize) -> Result<UncompressedBlock> {
        let block = if self.stream.is_memory_mapped() {
            let max_byte_size = self.seek_to_block(block_index)?;
            let chunk = ChunkHeader::read(&mut self.stream, max_byte_size)?;
            let compressed = self.stream.read_memory_mapped(chunk.byte_size)?;
            UncompressedBlock::decompress(chunk.y_coordinate, compressed, &self.blocks)?
        }
        else {
            let chunk = self.read_chunk(block_index)?;
            UncompressedBlock::decompress_chunk(&chunk, &self.blocks)?
        };

        validate_block_index(block, block_index)
    }
}

/// Fails if the chunk found at the offset of a block belongs to a different block.
fn validate_block_index(block: UncompressedBlock, expected: usize) -> Result<UncompressedBlock> {
    if block.index.index == expected { Ok(block) }
    else { Err(Error::invalid("offset table points to the wrong chunk")) }
}

/// Store the lines of the block that are inside the inclusive range.
fn unpack_lines(
    blocks: &ScanLineBlocks, block: &UncompressedBlock, frame_buffer: &mut FrameBuffer<'_>,
    bindings: &ChannelBindings, (first_line, last_line): (i32, i32),
) -> UnitResult
{
    for (y, line) in block.lines(blocks) {
        if y >= first_line && y <= last_line {
            bindings.read_line(frame_buffer, blocks, y, line)?;
        }
    }

    Ok(())
}


impl<'f, 's, 'm> ScanlineReader<'f, 's, 'm> {

    /// Read the scan lines from `first_line` to `last_line`, inclusive, into the frame buffer.
    /// The lines may be specified in any order.
    ///
    /// Fails if a line is outside the data window, or if the memory of a slice
    /// does not contain all pixels of the lines. A failure does not affect lines read before.
    pub fn read_pixels(&mut self, first_line: i32, last_line: i32) -> UnitResult {
        let (first_line, last_line) = (first_line.min(last_line), first_line.max(last_line));
        self.file.read_lines(&mut self.frame_buffer, &self.bindings, first_line, last_line)
    }

    /// Read a single scan line.
    pub fn read_line(&mut self, y: i32) -> UnitResult {
        self.read_pixels(y, y)
    }

    /// The header of the file.
    pub fn header(&self) -> &Header {
        self.file.header()
    }

    /// The bound frame buffer.
    pub fn frame_buffer(&self) -> &FrameBuffer<'m> {
        &self.frame_buffer
    }

    /// Unbind the frame buffer and return it.
    pub fn into_frame_buffer(self) -> FrameBuffer<'m> {
        self.frame_buffer
    }
}

impl std::fmt::Debug for InputFile<'_> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.debug_struct("InputFile")
            .field("stream", &self.stream.name())
            .field("header", &self.meta_data.header)
            .field("pool", &self.pool)
            .finish()
    }
}
