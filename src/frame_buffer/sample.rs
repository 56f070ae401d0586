
//! Convert single samples between the types a channel can have.

use half::f16;
use crate::io::*;
use crate::error::Result;
use crate::meta::attribute::SampleType;


/// A single value of a channel, in any of the supported types.
#[derive(Copy, Clone, Debug)]
pub enum Sample {

    /// A 16-bit float sample.
    F16(f16),

    /// A 32-bit float sample.
    F32(f32),

    /// An unsigned integer sample.
    U32(u32)
}

impl Sample {

    /// Convert a fill value to a sample of the specified type.
    pub fn from_f64(sample_type: SampleType, value: f64) -> Self {
        match sample_type {
            SampleType::F16 => Sample::F16(f16::from_f64(value)),
            SampleType::F32 => Sample::F32(value as f32),
            SampleType::U32 => Sample::U32(value as u32),
        }
    }

    /// The type of this sample.
    pub fn sample_type(self) -> SampleType {
        match self {
            Sample::F16(_) => SampleType::F16,
            Sample::F32(_) => SampleType::F32,
            Sample::U32(_) => SampleType::U32,
        }
    }

    /// Convert the sample to an f16 value. This has lower precision than f32.
    #[inline]
    pub fn to_f16(self) -> f16 {
        match self {
            Sample::F16(sample) => sample,
            Sample::F32(sample) => f16::from_f32(sample),
            Sample::U32(sample) => f16::from_f32(sample as f32),
        }
    }

    /// Convert the sample to an f32 value.
    /// Integers above `16777216` lose precision.
    #[inline]
    pub fn to_f32(self) -> f32 {
        match self {
            Sample::F32(sample) => sample,
            Sample::F16(sample) => sample.to_f32(),
            Sample::U32(sample) => sample as f32,
        }
    }

    /// Convert the sample to a u32. Negative values become zero,
    /// too large values become `u32::MAX`, and not-a-number becomes zero.
    #[inline]
    pub fn to_u32(self) -> u32 {
        match self {
            Sample::F16(sample) => sample.to_f32() as u32,
            Sample::F32(sample) => sample as u32,
            Sample::U32(sample) => sample,
        }
    }

    /// Convert this sample to the specified type.
    #[inline]
    pub fn convert(self, sample_type: SampleType) -> Self {
        match sample_type {
            SampleType::F16 => Sample::F16(self.to_f16()),
            SampleType::F32 => Sample::F32(self.to_f32()),
            SampleType::U32 => Sample::U32(self.to_u32()),
        }
    }

    /// Read a little-endian sample of the specified type.
    pub fn read(sample_type: SampleType, read: &mut impl Read) -> Result<Self> {
        Ok(match sample_type {
            SampleType::F16 => Sample::F16(f16::read(read)?),
            SampleType::F32 => Sample::F32(f32::read(read)?),
            SampleType::U32 => Sample::U32(u32::read(read)?),
        })
    }

    /// Write this sample in little-endian byte order.
    pub fn write(self, write: &mut impl Write) -> Result<()> {
        match self {
            Sample::F16(value) => value.write(write),
            Sample::F32(value) => value.write(write),
            Sample::U32(value) => value.write(write),
        }
    }
}

impl PartialEq for Sample {
    fn eq(&self, other: &Self) -> bool {
        match *self {
            Sample::F16(num) => num == other.to_f16(),
            Sample::F32(num) => num == other.to_f32(),
            Sample::U32(num) => num == other.to_u32(),
        }
    }
}

impl From<f16> for Sample { #[inline] fn from(f: f16) -> Self { Sample::F16(f) } }
impl From<f32> for Sample { #[inline] fn from(f: f32) -> Self { Sample::F32(f) } }
impl From<u32> for Sample { #[inline] fn from(f: u32) -> Self { Sample::U32(f) } }


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn float_to_integer_clamps(){
        assert_eq!(Sample::F32(-3.5).to_u32(), 0);
        assert_eq!(Sample::F32(f32::NAN).to_u32(), 0);
        assert_eq!(Sample::F32(1e20).to_u32(), u32::MAX);
        assert_eq!(Sample::F16(f16::from_f32(7.9)).to_u32(), 7);
    }

    #[test]
    fn half_precision(){
        assert_eq!(Sample::F32(0.5).convert(SampleType::F16), Sample::F16(f16::from_f32(0.5)));
        assert_eq!(Sample::U32(3).to_f16().to_f32(), 3.0);
        assert_eq!(Sample::from_f64(SampleType::F16, 0.25).to_f32(), 0.25);
        assert_eq!(Sample::from_f64(SampleType::U32, -1.0).to_u32(), 0);
    }

    #[test]
    fn little_endian_bytes(){
        let mut bytes = Vec::new();
        Sample::U32(0x01020304).write(&mut bytes).unwrap();
        Sample::F16(f16::ONE).write(&mut bytes).unwrap();
        assert_eq!(bytes, vec![4, 3, 2, 1, 0x00, 0x3c]);

        let reader = &mut bytes.as_slice();
        assert_eq!(Sample::read(SampleType::U32, reader).unwrap().to_u32(), 0x01020304);
        assert_eq!(Sample::read(SampleType::F16, reader).unwrap().sample_type(), SampleType::F16);
        assert!(Sample::read(SampleType::F32, reader).is_err());
    }
}
