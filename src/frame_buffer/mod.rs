
//! Describe where the pixels of each channel live in caller-owned memory.
//!
//! A frame buffer borrows one or more regions of typed samples
//! and contains a named slice for each channel that should be read or written.
//! A slice locates the sample of pixel `(x, y)` at the byte address
//! `base + (x / x_sampling) * x_stride + (y / y_sampling) * y_stride`
//! inside its region, where `x` and `y` are absolute pixel coordinates
//! of the data window. Every address is checked before it is used.

pub mod offset;
pub mod sample;

use std::convert::TryFrom;
use half::f16;
use smallvec::SmallVec;
use crate::error::{Error, Result, UnitResult};
use crate::math::{Vec2, is_sampled};
use crate::meta::attribute::{SampleType, Text};
use self::sample::Sample;


/// Borrows the memory of all slices and contains the slices.
#[derive(Debug, Default)]
pub struct FrameBuffer<'m> {
    memory: SmallVec<[Memory<'m>; 2]>,
    slices: SmallVec<[(Text, Slice); 5]>,
}

/// Identifies a region of memory inside a frame buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MemoryId(usize);

/// A region of caller memory that slices point into.
/// Only exclusive memory can receive pixels when reading a file.
#[derive(Debug)]
pub enum Memory<'m> {

    /// Samples that can only be read, for example to write a file.
    Shared(SampleSlice<'m>),

    /// Samples that can also be replaced, for example to read a file into.
    Exclusive(SampleSliceMut<'m>),
}

/// Borrowed samples of one type.
#[derive(Debug, Clone, Copy)]
pub enum SampleSlice<'m> {

    /// 16-bit float samples.
    F16(&'m [f16]),

    /// 32-bit float samples.
    F32(&'m [f32]),

    /// Unsigned integer samples.
    U32(&'m [u32]),
}

/// Mutably borrowed samples of one type.
#[derive(Debug)]
pub enum SampleSliceMut<'m> {

    /// 16-bit float samples.
    F16(&'m mut [f16]),

    /// 32-bit float samples.
    F32(&'m mut [f32]),

    /// Unsigned integer samples.
    U32(&'m mut [u32]),
}

/// Describes where the samples of one channel are located.
/// The slice never owns the samples.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Slice {

    /// The type of the samples in memory.
    /// Must match the type of the memory region.
    /// Samples are converted from and to the type of the channel in the file.
    pub sample_type: SampleType,

    /// The region of memory that contains the samples.
    pub memory: MemoryId,

    /// The byte position of the sample of pixel `(0, 0)`, relative to the start of the region.
    /// May be negative, as long as all pixels that are actually used are inside the region.
    pub base: isize,

    /// The distance in bytes from one sample to the next sample in the same row.
    pub x_stride: isize,

    /// The distance in bytes from one row of samples to the next row.
    pub y_stride: isize,

    /// Must match the sampling of the channel in the file.
    pub sampling: Vec2<usize>,

    /// The value used for pixels of channels that the file does not contain.
    pub fill_value: f64,

    /// Whether the coordinates are relative to a tile instead of the data window.
    /// Only tiled files distinguish these, scan line files always use absolute coordinates.
    pub tile_coordinates: Vec2<bool>,
}


impl Slice {

    /// A slice with sampling `(1, 1)`, fill value zero, and absolute coordinates.
    pub fn new(sample_type: SampleType, memory: MemoryId, base: isize, x_stride: isize, y_stride: isize) -> Self {
        Slice {
            sample_type, memory, base, x_stride, y_stride,
            sampling: Vec2(1, 1),
            fill_value: 0.0,
            tile_coordinates: Vec2(false, false),
        }
    }

    /// Set the sampling.
    pub fn with_sampling(self, sampling: impl Into<Vec2<usize>>) -> Self {
        Slice { sampling: sampling.into(), ..self }
    }

    /// Set the fill value.
    pub fn with_fill_value(self, fill_value: f64) -> Self {
        Slice { fill_value, ..self }
    }

    /// Set the tile coordinate flags.
    pub fn with_tile_coordinates(self, tile_coordinates: Vec2<bool>) -> Self {
        Slice { tile_coordinates, ..self }
    }

    /// The byte address of the sample of the pixel, relative to the start of the memory region.
    /// The pixel must be sampled by this slice.
    pub fn byte_address(&self, position: Vec2<i32>) -> Result<isize> {
        let x_index = i64::from(position.x()).div_euclid(self.sampling.x() as i64);
        let y_index = i64::from(position.y()).div_euclid(self.sampling.y() as i64);

        let address = (self.x_stride as i64).checked_mul(x_index)
            .and_then(|x| (self.y_stride as i64).checked_mul(y_index).and_then(|y| x.checked_add(y)))
            .and_then(|offset| offset.checked_add(self.base as i64))
            .and_then(|address| isize::try_from(address).ok());

        address.ok_or_else(|| Error::invalid("frame buffer address overflow"))
    }

    /// Whether this slice contains a sample for the pixel.
    pub fn samples(&self, position: Vec2<i32>) -> bool {
        is_sampled(position.x(), self.sampling.x()) && is_sampled(position.y(), self.sampling.y())
    }
}


impl<'m> FrameBuffer<'m> {

    /// A frame buffer without memory and without slices.
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow a region of memory, to be referenced by slices.
    /// Accepts `&[T]`, which can only be written to a file,
    /// and `&mut [T]`, which can also be read into, where `T` is `f16`, `f32`, or `u32`.
    pub fn add_memory(&mut self, memory: impl Into<Memory<'m>>) -> MemoryId {
        self.memory.push(memory.into());
        MemoryId(self.memory.len() - 1)
    }

    /// Add a slice. If a slice with this name exists,
    /// it is replaced and keeps its position.
    ///
    /// Fails if the name cannot be stored in a file, if the memory does not exist,
    /// if the sample type does not match the memory, or if a sampling factor is zero.
    pub fn insert(&mut self, name: &str, slice: Slice) -> UnitResult {
        let name = Text::new(name)?;
        name.validate_name()?;

        let memory = self.memory.get(slice.memory.0)
            .ok_or_else(|| Error::invalid("slice references unknown memory"))?;

        if memory.sample_type() != slice.sample_type {
            return Err(Error::invalid(format!(
                "slice `{}` has sample type {:?} but its memory contains {:?}",
                name, slice.sample_type, memory.sample_type()
            )));
        }

        if slice.sampling.x() == 0 || slice.sampling.y() == 0 {
            return Err(Error::invalid("zero sampling factor"));
        }

        match self.slices.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, existing)) => *existing = slice,
            None => self.slices.push((name, slice)),
        }

        Ok(())
    }

    /// Borrow a region of interleaved samples, such as `RGBRGB`, and add a slice for each name.
    /// The samples are stored row by row, with `width` pixels per row,
    /// and the first sample is the pixel at `origin`, which usually is the data window position.
    pub fn insert_interleaved(
        &mut self, names: &[&str], memory: impl Into<Memory<'m>>,
        width: usize, origin: impl Into<Vec2<i32>>,
    ) -> Result<MemoryId>
    {
        let memory = memory.into();
        let sample_type = memory.sample_type();
        let sample_size = sample_type.bytes_per_sample() as i64;
        let origin = origin.into();

        let geometry = || Error::invalid("interleaved frame buffer geometry");
        let x_stride = sample_size.checked_mul(names.len() as i64).ok_or_else(geometry)?;
        let y_stride = x_stride.checked_mul(width as i64).ok_or_else(geometry)?;

        let origin_offset = x_stride.checked_mul(i64::from(origin.x()))
            .and_then(|x| y_stride.checked_mul(i64::from(origin.y())).and_then(|y| x.checked_add(y)))
            .ok_or_else(geometry)?;

        let to_isize = |value: i64| isize::try_from(value).map_err(|_| geometry());
        let memory = self.add_memory(memory);

        for (index, &name) in names.iter().enumerate() {
            let base = index as i64 * sample_size - origin_offset;

            self.insert(name, Slice::new(
                sample_type, memory, to_isize(base)?,
                to_isize(x_stride)?, to_isize(y_stride)?,
            ))?;
        }

        Ok(memory)
    }

    /// Look up a slice by its exact name.
    /// Returns `None` if there is no such slice.
    pub fn slice(&self, name: &str) -> Option<&Slice> {
        self.slices.iter()
            .find(|(existing, _)| existing.eq(name))
            .map(|(_, slice)| slice)
    }

    /// Iterate all slices in insertion order.
    pub fn slices(&self) -> impl '_ + Iterator<Item = (&Text, &Slice)> {
        self.slices.iter().map(|(name, slice)| (name, slice))
    }

    /// Number of slices.
    pub fn len(&self) -> usize {
        self.slices.len()
    }

    /// Whether this frame buffer contains no slices.
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// Create a view of the same memory, in which scan line `y + offset`
    /// addresses the samples of scan line `y` of this frame buffer.
    /// No samples are copied.
    ///
    /// Fails if the offset is not a multiple of the vertical sampling of every slice.
    pub fn offset_scanlines(&mut self, offset: i32) -> Result<FrameBuffer<'_>> {
        let mut slices = self.slices.clone();

        for (_, slice) in slices.iter_mut() {
            slice.base = offset::offset_base(slice.base, slice.y_stride, slice.sampling.y(), offset)?;
        }

        let memory = self.memory.iter_mut()
            .map(Memory::reborrow)
            .collect();

        Ok(FrameBuffer { memory, slices })
    }

    pub(crate) fn memory_is_exclusive(&self, slice: &Slice) -> bool {
        matches!(self.memory.get(slice.memory.0), Some(Memory::Exclusive(_)))
    }

    /// The index of the sample of the pixel inside the memory of the slice.
    fn sample_index(&self, slice: &Slice, position: Vec2<i32>) -> Result<usize> {
        let memory = self.memory.get(slice.memory.0)
            .ok_or_else(|| Error::invalid("slice references unknown memory"))?;

        let address = slice.byte_address(position)?;
        let sample_size = slice.sample_type.bytes_per_sample() as isize;

        if address % sample_size != 0 {
            return Err(Error::invalid("frame buffer address is not aligned to the sample size"));
        }

        usize::try_from(address / sample_size).ok()
            .filter(|&index| index < memory.len())
            .ok_or_else(|| Error::invalid(format!(
                "frame buffer slice has no memory for pixel ({}, {})",
                position.x(), position.y()
            )))
    }

    /// Check that every sampled pixel of the rectangle is inside the memory of the slice.
    /// As the address is linear in the coordinates, it suffices to check the corners.
    pub(crate) fn validate_coverage(&self, slice: &Slice, x_range: (i32, i32), y_range: (i32, i32)) -> UnitResult {
        let xs = sampled_corners(x_range, slice.sampling.x());
        let ys = sampled_corners(y_range, slice.sampling.y());

        if let (Some((left, right)), Some((top, bottom))) = (xs, ys) {
            for &x in &[left, right] {
                for &y in &[top, bottom] {
                    self.sample_index(slice, Vec2(x, y))?;
                }
            }
        }

        Ok(())
    }

    /// Read the sample of the pixel from the slice.
    pub(crate) fn load(&self, slice: &Slice, position: Vec2<i32>) -> Result<Sample> {
        let index = self.sample_index(slice, position)?;

        Ok(match &self.memory[slice.memory.0] {
            Memory::Shared(samples) => samples.get(index),
            Memory::Exclusive(samples) => samples.get(index),
        })
    }

    /// Replace the sample of the pixel in the slice, converting it to the type of the memory.
    pub(crate) fn store(&mut self, slice: &Slice, position: Vec2<i32>, sample: Sample) -> UnitResult {
        let index = self.sample_index(slice, position)?;

        match &mut self.memory[slice.memory.0] {
            Memory::Exclusive(samples) => {
                samples.set(index, sample);
                Ok(())
            },

            Memory::Shared(_) => Err(Error::invalid("frame buffer memory is read only")),
        }
    }
}

/// The smallest and largest sampled coordinate in the inclusive range, if any.
fn sampled_corners((first, last): (i32, i32), sampling: usize) -> Option<(i32, i32)> {
    let sampling = sampling as i64;
    let (first, last) = (i64::from(first), i64::from(last));

    let smallest = first + (sampling - first.rem_euclid(sampling)) % sampling;
    let largest = last - last.rem_euclid(sampling);

    if smallest > largest { return None; }
    Some((i32::try_from(smallest).ok()?, i32::try_from(largest).ok()?))
}


impl<'m> Memory<'m> {

    /// The type of all samples in this region.
    pub fn sample_type(&self) -> SampleType {
        match self {
            Memory::Shared(samples) => samples.sample_type(),
            Memory::Exclusive(samples) => samples.sample_type(),
        }
    }

    /// Number of samples in this region.
    pub fn len(&self) -> usize {
        match self {
            Memory::Shared(samples) => samples.len(),
            Memory::Exclusive(samples) => samples.len(),
        }
    }

    /// Whether this region has no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the same samples for a shorter lifetime.
    fn reborrow(&mut self) -> Memory<'_> {
        match self {
            Memory::Shared(samples) => Memory::Shared(*samples),
            Memory::Exclusive(SampleSliceMut::F16(samples)) => Memory::Exclusive(SampleSliceMut::F16(&mut **samples)),
            Memory::Exclusive(SampleSliceMut::F32(samples)) => Memory::Exclusive(SampleSliceMut::F32(&mut **samples)),
            Memory::Exclusive(SampleSliceMut::U32(samples)) => Memory::Exclusive(SampleSliceMut::U32(&mut **samples)),
        }
    }
}

impl SampleSlice<'_> {
    fn sample_type(&self) -> SampleType {
        match self {
            SampleSlice::F16(_) => SampleType::F16,
            SampleSlice::F32(_) => SampleType::F32,
            SampleSlice::U32(_) => SampleType::U32,
        }
    }

    fn len(&self) -> usize {
        match self {
            SampleSlice::F16(samples) => samples.len(),
            SampleSlice::F32(samples) => samples.len(),
            SampleSlice::U32(samples) => samples.len(),
        }
    }

    fn get(&self, index: usize) -> Sample {
        match self {
            SampleSlice::F16(samples) => Sample::F16(samples[index]),
            SampleSlice::F32(samples) => Sample::F32(samples[index]),
            SampleSlice::U32(samples) => Sample::U32(samples[index]),
        }
    }
}

impl SampleSliceMut<'_> {
    fn sample_type(&self) -> SampleType {
        match self {
            SampleSliceMut::F16(_) => SampleType::F16,
            SampleSliceMut::F32(_) => SampleType::F32,
            SampleSliceMut::U32(_) => SampleType::U32,
        }
    }

    fn len(&self) -> usize {
        match self {
            SampleSliceMut::F16(samples) => samples.len(),
            SampleSliceMut::F32(samples) => samples.len(),
            SampleSliceMut::U32(samples) => samples.len(),
        }
    }

    fn get(&self, index: usize) -> Sample {
        match self {
            SampleSliceMut::F16(samples) => Sample::F16(samples[index]),
            SampleSliceMut::F32(samples) => Sample::F32(samples[index]),
            SampleSliceMut::U32(samples) => Sample::U32(samples[index]),
        }
    }

    fn set(&mut self, index: usize, sample: Sample) {
        match self {
            SampleSliceMut::F16(samples) => samples[index] = sample.to_f16(),
            SampleSliceMut::F32(samples) => samples[index] = sample.to_f32(),
            SampleSliceMut::U32(samples) => samples[index] = sample.to_u32(),
        }
    }
}

macro_rules! implement_memory_conversions {
    ($sample: ty, $variant: ident) => {
        impl<'m> From<&'m [$sample]> for Memory<'m> {
            fn from(samples: &'m [$sample]) -> Self {
                Memory::Shared(SampleSlice::$variant(samples))
            }
        }

        impl<'m> From<&'m mut [$sample]> for Memory<'m> {
            fn from(samples: &'m mut [$sample]) -> Self {
                Memory::Exclusive(SampleSliceMut::$variant(samples))
            }
        }

        impl<'m> From<&'m Vec<$sample>> for Memory<'m> {
            fn from(samples: &'m Vec<$sample>) -> Self {
                Memory::Shared(SampleSlice::$variant(samples.as_slice()))
            }
        }

        impl<'m> From<&'m mut Vec<$sample>> for Memory<'m> {
            fn from(samples: &'m mut Vec<$sample>) -> Self {
                Memory::Exclusive(SampleSliceMut::$variant(samples.as_mut_slice()))
            }
        }
    };
}

implement_memory_conversions!(f16, F16);
implement_memory_conversions!(f32, F32);
implement_memory_conversions!(u32, U32);
