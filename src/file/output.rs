
//! Write a header and scan lines from frame buffers into a file.

use std::fs::File;
use std::path::Path;

use crate::block::{BlockIndex, ScanLineBlocks, UncompressedBlock};
use crate::block::lines::ChannelBindings;
use crate::compression::ByteVec;
use crate::error::{usize_to_i32, Error, Result, UnitResult};
use crate::frame_buffer::FrameBuffer;
use crate::meta::{self, MetaData, OffsetTable};
use crate::meta::attribute::LineOrder;
use crate::meta::header::Header;
use crate::stream::{CallbackOutputStream, IoCallbacks, OutputStream};
use crate::threads::WorkerPool;


/// A file that scan lines are written to, in the line order of its header.
///
/// The header and a placeholder for the offset table are written on creation.
/// The offset table is written by `finish`, or when the file is dropped.
pub struct OutputFile<'s> {
    stream: Box<dyn OutputStream + 's>,
    header: Header,
    blocks: ScanLineBlocks,
    pool: WorkerPool,

    offset_table_position: u64,
    offsets: OffsetTable,

    /// The next scan line to be written.
    next_line: i32,
    remaining_lines: usize,

    /// The lines of the block that is currently being filled.
    pending: Option<PendingBlock>,
    finished: bool,
}

/// An output file with a bound frame buffer.
/// Writes scan lines from the memory of the frame buffer.
pub struct ScanlineWriter<'f, 's, 'm> {
    file: &'f mut OutputFile<'s>,
    frame_buffer: FrameBuffer<'m>,
    bindings: ChannelBindings,
}

/// A block whose lines have only partially been written.
#[derive(Debug)]
struct PendingBlock {
    index: BlockIndex,

    /// The bytes of each line, in the order they were written.
    lines: Vec<ByteVec>,
}


impl OutputFile<'static> {

    /// Create a file at the path, replacing an existing file.
    pub fn from_path(path: impl AsRef<Path>, header: Header) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "creating output file");

        let file = File::create(path)?;
        Self::from_stream(CallbackOutputStream::new(IoCallbacks(file))?, header)
    }
}

impl<'s> OutputFile<'s> {

    /// Write to any output stream, using the global worker threads.
    pub fn from_stream(stream: impl OutputStream + 's, header: Header) -> Result<Self> {
        Self::from_stream_with_pool(stream, header, WorkerPool::global())
    }

    /// Write to any output stream, compressing with the specified worker threads.
    /// Validates the header and writes it at the current stream position.
    ///
    /// Fails if the compression method is not supported,
    /// or if the line order is `Unspecified`.
    pub fn from_stream_with_pool(stream: impl OutputStream + 's, header: Header, pool: WorkerPool) -> Result<Self> {
        header.compression.validate_supported()?;

        let next_line = match header.line_order {
            LineOrder::Increasing => header.data_window.position.y(),
            LineOrder::Decreasing => header.data_window.max().y(),
            LineOrder::Unspecified => return Err(Error::unsupported("writing scan lines in unspecified order")),
        };

        let mut bytes = Vec::new();
        MetaData::write_validating(&header, &mut bytes)?;

        let mut stream: Box<dyn OutputStream + 's> = Box::new(stream);
        let blocks = ScanLineBlocks::new(&header);
        let offsets = vec![0; blocks.block_count()];

        let offset_table_position = stream.tell() + bytes.len() as u64;
        meta::write_offset_table(&mut bytes, &offsets)?;
        stream.write(&bytes)?;

        tracing::debug!(
            width = header.data_window.size.width(),
            height = header.data_window.size.height(),
            compression = %header.compression,
            threads = pool.thread_count(),
            "created output file"
        );

        Ok(OutputFile {
            remaining_lines: header.data_window.size.height(),
            pending: None,
            finished: false,
            stream, header, blocks, pool,
            offset_table_position, offsets, next_line,
        })
    }

    /// The header of the file.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The next scan line that will be written.
    /// After all lines have been written, this is just outside the data window.
    pub fn current_scanline(&self) -> i32 {
        self.next_line
    }

    /// Number of scan lines that have not yet been written.
    pub fn remaining_lines(&self) -> usize {
        self.remaining_lines
    }

    /// Bind a frame buffer, so that pixels can be written from its memory.
    /// Slices without a channel in the header are ignored,
    /// and channels without a slice are written as zeroes.
    ///
    /// Fails if the sampling of a slice differs from the channel in the header.
    /// The file stays usable if binding fails.
    pub fn set_frame_buffer<'m>(&mut self, frame_buffer: FrameBuffer<'m>) -> Result<ScanlineWriter<'_, 's, 'm>> {
        let bindings = ChannelBindings::for_writing(&self.blocks.channels, &frame_buffer)?;
        Ok(ScanlineWriter { file: self, frame_buffer, bindings })
    }

    /// Write the next `line_count` scan lines from a frame buffer
    /// whose row zero holds the top line of those lines.
    /// This writes a large image piece by piece from a small buffer.
    pub fn write_pixels_incremental(&mut self, frame_buffer: &mut FrameBuffer<'_>, line_count: usize) -> UnitResult {
        let (top, _) = self.next_line_range(line_count)?;
        if line_count == 0 { return Ok(()); }

        let view = frame_buffer.offset_scanlines(top)?;
        let bindings = ChannelBindings::for_writing(&self.blocks.channels, &view)?;
        self.write_lines(&view, &bindings, line_count)
    }

    /// Write the offset table and close the file.
    /// Blocks that were not completely written remain missing in the file.
    pub fn finish(mut self) -> UnitResult {
        self.write_offset_table()
    }

    /// The inclusive range of the next lines, from top to bottom.
    fn next_line_range(&self, line_count: usize) -> Result<(i32, i32)> {
        if self.finished {
            return Err(Error::invalid("the file is already finished"));
        }

        if line_count > self.remaining_lines {
            return Err(Error::invalid(format!(
                "cannot write {} scan lines, only {} remain", line_count, self.remaining_lines
            )));
        }

        let span = usize_to_i32(line_count.saturating_sub(1), "scan line count")?;

        Ok(match self.header.line_order {
            LineOrder::Decreasing => (self.next_line - span, self.next_line),
            _ => (self.next_line, self.next_line + span),
        })
    }

    fn write_lines(&mut self, frame_buffer: &FrameBuffer<'_>, bindings: &ChannelBindings, line_count: usize) -> UnitResult {
        let lines = self.next_line_range(line_count)?;
        if line_count == 0 { return Ok(()); }

        bindings.validate_coverage(frame_buffer, self.blocks.data_window, lines)?;

        let mut complete_blocks = Vec::new();
        let packed = self.pack_lines(frame_buffer, bindings, line_count, &mut complete_blocks);

        // blocks completed before a failure are still written
        let written = self.write_blocks(complete_blocks);
        packed.and(written)
    }

    /// Add the next lines to the pending block, collecting every block that becomes complete.
    fn pack_lines(
        &mut self, frame_buffer: &FrameBuffer<'_>, bindings: &ChannelBindings,
        line_count: usize, complete_blocks: &mut Vec<UncompressedBlock>,
    ) -> UnitResult
    {
        let decreasing = self.header.line_order == LineOrder::Decreasing;

        for _ in 0 .. line_count {
            let y = self.next_line;

            let mut bytes = Vec::with_capacity(self.blocks.line_byte_size(y));
            bindings.write_line(frame_buffer, &self.blocks, y, &mut bytes)?;

            let mut pending = match self.pending.take() {
                Some(pending) => pending,
                None => PendingBlock {
                    index: self.blocks.block(self.blocks.block_index_of_line(y)?)?,
                    lines: Vec::new(),
                },
            };

            pending.lines.push(bytes);

            if pending.lines.len() == pending.index.line_count {
                if decreasing { pending.lines.reverse(); }

                complete_blocks.push(UncompressedBlock {
                    index: pending.index,
                    data: pending.lines.concat(),
                });
            }
            else {
                self.pending = Some(pending);
            }

            self.remaining_lines -= 1;
            self.next_line = if decreasing { y - 1 } else { y + 1 };
        }

        Ok(())
    }

    /// Compress the blocks, possibly in parallel, and write them in the order of the lines.
    fn write_blocks(&mut self, blocks: Vec<UncompressedBlock>) -> UnitResult {
        if blocks.is_empty() { return Ok(()); }

        let layout = &self.blocks;
        let chunks = self.pool.map(blocks, |block| {
            let index = block.index.index;
            block.compress_to_chunk(layout).map(|chunk| (index, chunk))
        });

        for chunk in chunks {
            let (index, chunk) = chunk?;

            let offset = self.offsets.get_mut(index)
                .ok_or_else(|| Error::invalid("block index"))?;

            *offset = self.stream.tell();
            chunk.write(&mut self.stream)?;

            tracing::trace!(block = index, bytes = chunk.compressed_pixels.len(), "wrote block");
        }

        Ok(())
    }

    fn write_offset_table(&mut self) -> UnitResult {
        if self.finished { return Ok(()); }
        self.finished = true;

        if let Some(pending) = self.pending.take() {
            tracing::debug!(block = pending.index.index, "discarding incomplete block");
        }

        let mut bytes = Vec::with_capacity(self.offsets.len() * 8);
        meta::write_offset_table(&mut bytes, &self.offsets)?;

        let end = self.stream.tell();
        self.stream.seek(self.offset_table_position)?;
        self.stream.write(&bytes)?;
        self.stream.seek(end)?;

        tracing::debug!(blocks = self.offsets.len(), missing_lines = self.remaining_lines, "finished output file");
        Ok(())
    }
}

impl Drop for OutputFile<'_> {
    fn drop(&mut self) {
        if let Err(error) = self.write_offset_table() {
            tracing::warn!(%error, "failed to finish output file");
        }
    }
}

impl std::fmt::Debug for OutputFile<'_> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.debug_struct("OutputFile")
            .field("header", &self.header)
            .field("next_line", &self.next_line)
            .field("remaining_lines", &self.remaining_lines)
            .field("pool", &self.pool)
            .finish()
    }
}


impl<'f, 's, 'm> ScanlineWriter<'f, 's, 'm> {

    /// Write the next `line_count` scan lines from the frame buffer,
    /// in the line order of the file.
    ///
    /// Fails if fewer lines remain, or if the memory of a slice
    /// does not contain all pixels of the lines.
    pub fn write_pixels(&mut self, line_count: usize) -> UnitResult {
        self.file.write_lines(&self.frame_buffer, &self.bindings, line_count)
    }

    /// The next scan line that will be written.
    pub fn current_scanline(&self) -> i32 {
        self.file.current_scanline()
    }

    /// The header of the file.
    pub fn header(&self) -> &Header {
        self.file.header()
    }

    /// Unbind the frame buffer and return it.
    pub fn into_frame_buffer(self) -> FrameBuffer<'m> {
        self.frame_buffer
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::compression::Compression;
    use crate::frame_buffer::Slice;
    use crate::meta::attribute::{Channel, SampleType};
    use crate::stream::MemoryOutputStream;

    fn header() -> Header {
        Header::from_dimensions((2, 20))
            .with_channel("Y", Channel::new(SampleType::F32)).unwrap()
            .with_compression(Compression::ZIP16)
    }

    #[test]
    fn unspecified_order_is_rejected(){
        let mut output = MemoryOutputStream::new();
        let header = header().with_line_order(LineOrder::Unspecified);
        assert!(matches!(OutputFile::from_stream(&mut output, header), Err(Error::NotSupported(_))));
        assert!(output.bytes().is_empty());
    }

    #[test]
    fn invalid_headers_write_nothing(){
        let mut output = MemoryOutputStream::new();
        let mut header = header();
        header.pixel_aspect = f32::NAN;
        assert!(OutputFile::from_stream(&mut output, header).is_err());
        assert!(output.bytes().is_empty());
    }

    #[test]
    fn scan_lines_advance_in_line_order(){
        let values = vec![1.0_f32; 40];
        let mut output = MemoryOutputStream::new();

        let header = header().with_line_order(LineOrder::Decreasing);
        let mut file = OutputFile::from_stream_with_pool(&mut output, header, WorkerPool::sequential()).unwrap();
        assert_eq!(file.current_scanline(), 19);

        let mut frame_buffer = FrameBuffer::new();
        let memory = frame_buffer.add_memory(&values);
        frame_buffer.insert("Y", Slice::new(SampleType::F32, memory, 0, 4, 8)).unwrap();

        let mut writer = file.set_frame_buffer(frame_buffer).unwrap();
        writer.write_pixels(5).unwrap();
        assert_eq!(writer.current_scanline(), 14);

        assert!(writer.write_pixels(16).is_err());
        writer.write_pixels(15).unwrap();
        assert_eq!(writer.current_scanline(), -1);
        assert!(writer.write_pixels(1).is_err());
        drop(writer);

        assert_eq!(file.remaining_lines(), 0);
        assert!(file.offsets.iter().all(|&offset| offset > file.offset_table_position));
        file.finish().unwrap();
    }

    #[test]
    fn dropping_writes_the_offset_table(){
        let values = vec![1.0_f32; 40];
        let mut output = MemoryOutputStream::new();

        {
            let mut file = OutputFile::from_stream(&mut output, header()).unwrap();
            let mut frame_buffer = FrameBuffer::new();
            let memory = frame_buffer.add_memory(&values);
            frame_buffer.insert("Y", Slice::new(SampleType::F32, memory, 0, 4, 8)).unwrap();
            file.set_frame_buffer(frame_buffer).unwrap().write_pixels(20).unwrap();
        }

        let bytes = output.into_inner();
        let mut file = crate::file::input::InputFile::from_slice(&bytes).unwrap();

        let mut read = vec![0.0_f32; 40];
        let mut frame_buffer = FrameBuffer::new();
        let memory = frame_buffer.add_memory(&mut read);
        frame_buffer.insert("Y", Slice::new(SampleType::F32, memory, 0, 4, 8)).unwrap();
        file.set_frame_buffer(frame_buffer).unwrap().read_pixels(0, 19).unwrap();

        assert_eq!(read, values);
    }
}
