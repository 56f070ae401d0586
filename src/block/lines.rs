
//! Move the samples of single scan lines between a frame buffer and the bytes of a block.

use smallvec::SmallVec;
use crate::compression::ByteVec;
use crate::error::{Error, Result, UnitResult};
use crate::frame_buffer::{FrameBuffer, Slice};
use crate::frame_buffer::sample::Sample;
use crate::math::{is_sampled, Vec2};
use crate::meta::attribute::{ChannelList, IntegerBounds};
use super::ScanLineBlocks;


/// The slices of a frame buffer that correspond to the channels of a file.
#[derive(Debug, Clone)]
pub struct ChannelBindings {

    /// For each channel of the file, sorted by name, the slice with the same name.
    channels: SmallVec<[Option<Slice>; 5]>,

    /// Slices that have no channel in the file. When reading, they receive their fill value.
    unmatched: SmallVec<[Slice; 2]>,
}

impl ChannelBindings {

    /// Match the slices for reading pixels into the frame buffer.
    /// Fails if a slice references read-only memory,
    /// or if its sampling differs from the channel in the file.
    pub fn for_reading(channels: &ChannelList, frame_buffer: &FrameBuffer<'_>) -> Result<Self> {
        let bindings = Self::new(channels, frame_buffer, true)?;

        let all_slices = bindings.channels.iter().flatten().chain(bindings.unmatched.iter());
        for slice in all_slices {
            if !frame_buffer.memory_is_exclusive(slice) {
                return Err(Error::invalid("cannot read pixels into read-only frame buffer memory"));
            }
        }

        Ok(bindings)
    }

    /// Match the slices for writing pixels from the frame buffer.
    /// Slices without a channel are ignored.
    /// Fails if the sampling of a slice differs from the channel in the file.
    pub fn for_writing(channels: &ChannelList, frame_buffer: &FrameBuffer<'_>) -> Result<Self> {
        Self::new(channels, frame_buffer, false)
    }

    fn new(channels: &ChannelList, frame_buffer: &FrameBuffer<'_>, keep_unmatched: bool) -> Result<Self> {
        let mut matched: SmallVec<[Option<Slice>; 5]> = channels.list.iter().map(|_| None).collect();
        let mut unmatched = SmallVec::new();

        for (name, slice) in frame_buffer.slices() {
            match channels.find_index_of_channel(name.bytes()) {
                Some(index) => {
                    let channel = &channels.list[index].1;

                    if channel.sampling != slice.sampling {
                        return Err(Error::invalid(format!(
                            "slice `{}` has sampling {:?} but the channel has sampling {:?}",
                            name, slice.sampling, channel.sampling
                        )));
                    }

                    matched[index] = Some(*slice);
                },

                None if keep_unmatched => unmatched.push(*slice),
                None => tracing::trace!(slice = %name, "ignoring slice without channel"),
            }
        }

        Ok(ChannelBindings { channels: matched, unmatched })
    }

    /// Check that the memory of all bound slices covers every sampled pixel
    /// of the inclusive scan line range, across the whole data window.
    pub fn validate_coverage(&self, frame_buffer: &FrameBuffer<'_>, data_window: IntegerBounds, lines: (i32, i32)) -> UnitResult {
        let columns = (data_window.position.x(), data_window.max().x());

        self.channels.iter().flatten().chain(self.unmatched.iter())
            .try_for_each(|slice| frame_buffer.validate_coverage(slice, columns, lines))
    }

    /// Store the samples of one scan line into the frame buffer,
    /// converting them to the type of each slice.
    /// Slices without a channel receive their fill value.
    pub fn read_line(&self, frame_buffer: &mut FrameBuffer<'_>, blocks: &ScanLineBlocks, y: i32, mut bytes: &[u8]) -> UnitResult {
        let data_window = blocks.data_window;

        for ((_, channel), slice) in blocks.channels.list.iter().zip(&self.channels) {
            if !channel.has_line(y) { continue; }

            let byte_size = channel.samples_per_line(data_window) * channel.sample_type.bytes_per_sample();
            if bytes.len() < byte_size {
                return Err(Error::invalid("scan line is missing samples"));
            }

            let (mut samples, rest) = bytes.split_at(byte_size);
            bytes = rest;

            if let Some(slice) = slice {
                for x in sampled_columns(data_window, channel.sampling.x()) {
                    let sample = Sample::read(channel.sample_type, &mut samples)?;
                    frame_buffer.store(slice, Vec2(x, y), sample)?;
                }
            }
        }

        if !bytes.is_empty() {
            return Err(Error::invalid("scan line has too many samples"));
        }

        self.fill_line(frame_buffer, data_window, y)
    }

    /// Store the fill value of each slice that has no channel in the file.
    fn fill_line(&self, frame_buffer: &mut FrameBuffer<'_>, data_window: IntegerBounds, y: i32) -> UnitResult {
        for slice in &self.unmatched {
            if !is_sampled(y, slice.sampling.y()) { continue; }

            let fill = Sample::from_f64(slice.sample_type, slice.fill_value);
            for x in sampled_columns(data_window, slice.sampling.x()) {
                frame_buffer.store(slice, Vec2(x, y), fill)?;
            }
        }

        Ok(())
    }

    /// Append the samples of one scan line in the layout of the file,
    /// converting them to the type of each channel.
    /// Channels without a slice are written as zeroes.
    pub fn write_line(&self, frame_buffer: &FrameBuffer<'_>, blocks: &ScanLineBlocks, y: i32, bytes: &mut ByteVec) -> UnitResult {
        let data_window = blocks.data_window;

        for ((_, channel), slice) in blocks.channels.list.iter().zip(&self.channels) {
            if !channel.has_line(y) { continue; }

            match slice {
                Some(slice) => {
                    for x in sampled_columns(data_window, channel.sampling.x()) {
                        let sample = frame_buffer.load(slice, Vec2(x, y))?;
                        sample.convert(channel.sample_type).write(bytes)?;
                    }
                },

                None => {
                    let byte_size = channel.samples_per_line(data_window) * channel.sample_type.bytes_per_sample();
                    bytes.resize(bytes.len() + byte_size, 0);
                },
            }
        }

        Ok(())
    }
}

/// The x coordinates inside the data window that are a multiple of the sampling.
fn sampled_columns(data_window: IntegerBounds, sampling: usize) -> impl Iterator<Item = i32> {
    let left = data_window.position.x();

    (0 .. data_window.size.width())
        .map(move |column| left + column as i32)
        .filter(move |&x| is_sampled(x, sampling))
}


#[cfg(test)]
mod test {
    use super::*;
    use half::f16;
    use crate::compression::Compression;
    use crate::meta::attribute::{Channel, SampleType};
    use crate::meta::header::Header;

    fn blocks() -> ScanLineBlocks {
        let header = Header::from_dimensions((2, 2))
            .with_channel("A", Channel::new(SampleType::F16)).unwrap()
            .with_channel("B", Channel::new(SampleType::U32)).unwrap()
            .with_compression(Compression::Uncompressed);

        ScanLineBlocks::new(&header)
    }

    #[test]
    fn lines_are_ordered_by_channel_name(){
        let blocks = blocks();
        let b_values = vec![1_u32, 2, 3, 4];
        let mut frame_buffer = FrameBuffer::new();
        let memory = frame_buffer.add_memory(&b_values);
        frame_buffer.insert("B", Slice::new(SampleType::U32, memory, 0, 4, 8)).unwrap();

        let bindings = ChannelBindings::for_writing(&blocks.channels, &frame_buffer).unwrap();
        let mut bytes = Vec::new();
        bindings.write_line(&frame_buffer, &blocks, 1, &mut bytes).unwrap();

        // channel A is missing and written as zeroes
        assert_eq!(bytes, vec![0, 0, 0, 0, 3, 0, 0, 0, 4, 0, 0, 0]);
    }

    #[test]
    fn missing_channels_are_filled(){
        let blocks = blocks();
        let mut a_values = vec![f16::ZERO; 4];
        let mut z_values = vec![0.0_f32; 4];

        let mut frame_buffer = FrameBuffer::new();
        let a = frame_buffer.add_memory(&mut a_values);
        let z = frame_buffer.add_memory(&mut z_values);
        frame_buffer.insert("A", Slice::new(SampleType::F16, a, 0, 2, 4)).unwrap();
        frame_buffer.insert("Z", Slice::new(SampleType::F32, z, 0, 4, 8).with_fill_value(0.5)).unwrap();

        let bindings = ChannelBindings::for_reading(&blocks.channels, &frame_buffer).unwrap();
        let line = [0x00, 0x3c, 0x00, 0x40, 1, 0, 0, 0, 2, 0, 0, 0];
        bindings.read_line(&mut frame_buffer, &blocks, 0, &line).unwrap();

        assert!(bindings.read_line(&mut frame_buffer, &blocks, 1, &line[.. 11]).is_err());
        drop(frame_buffer);

        assert_eq!(a_values[.. 2], [f16::ONE, f16::from_f32(2.0)]);
        assert_eq!(z_values, vec![0.5, 0.5, 0.0, 0.0]);
    }

    #[test]
    fn bindings_validate_slices(){
        let blocks = blocks();
        let values = vec![0_u32; 4];

        let mut frame_buffer = FrameBuffer::new();
        let memory = frame_buffer.add_memory(&values);
        frame_buffer.insert("B", Slice::new(SampleType::U32, memory, 0, 4, 8)).unwrap();
        assert!(ChannelBindings::for_reading(&blocks.channels, &frame_buffer).is_err());

        frame_buffer.insert("B", Slice::new(SampleType::U32, memory, 0, 4, 8).with_sampling((2, 1))).unwrap();
        assert!(ChannelBindings::for_writing(&blocks.channels, &frame_buffer).is_err());
    }

    #[test]
    fn coverage_of_line_ranges(){
        let blocks = blocks();
        let values = vec![0_u32; 2];

        let mut frame_buffer = FrameBuffer::new();
        let memory = frame_buffer.add_memory(&values);
        frame_buffer.insert("B", Slice::new(SampleType::U32, memory, 0, 4, 8)).unwrap();

        let bindings = ChannelBindings::for_writing(&blocks.channels, &frame_buffer).unwrap();
        assert!(bindings.validate_coverage(&frame_buffer, blocks.data_window, (0, 0)).is_ok());
        assert!(bindings.validate_coverage(&frame_buffer, blocks.data_window, (0, 1)).is_err());
    }
}
